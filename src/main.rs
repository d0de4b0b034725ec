#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod db;
mod env;
mod error;
mod models;
mod policy;
mod progress;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use api::{
    api_create_goal, api_create_process_goal, api_dashboard, api_get_goal, api_get_player,
    api_list_coaches, api_list_goals, api_list_players, api_list_process_goals, api_login,
    api_logout, api_me, api_me_unauthorized, api_profile, api_register_user, api_update_goal,
    api_update_process_goal, goal_progress_update, health, process_goal_progress_update,
};
use auth::{bad_request_api, forbidden_api, not_found_api, unauthorized_api, unprocessable_api};
use db::clean_expired_sessions;
use error::AppError;
use rocket::{Build, Rocket, tokio};
use telemetry::TelemetryFairing;
use telemetry::init_tracing;
use thiserror::Error;

use sqlx::SqlitePool;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("{0}")]
    Figment(rocket::figment::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Anyhow(value)
    }
}

impl From<rocket::figment::Error> for Error {
    fn from(value: rocket::figment::Error) -> Self {
        Error::Figment(value)
    }
}

#[launch]
async fn rocket() -> _ {
    if let Err(e) = env::load_environment() {
        eprintln!("Failed to load environment files: {}", e);
    }

    init_tracing();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://goals.db".to_string());

    let pool = db::connect(&database_url)
        .await
        .expect("Failed to connect to SQLite database");

    let pool_clone = pool.clone();

    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool_clone).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;
        }
    });

    info!("Running database migrations...");
    match sqlx::migrate!("./migrations").run(&pool).await {
        Ok(_) => info!("Migrations completed successfully"),
        Err(e) => {
            error!("Failed to run migrations: {}", e);
            panic!("Database migration failed: {}", e);
        }
    }

    init_rocket(pool).await
}

pub async fn init_rocket(pool: SqlitePool) -> Rocket<Build> {
    info!("Starting team goal tracker");

    rocket::build()
        .manage(pool)
        .mount(
            "/api",
            routes![
                api_login,
                api_logout,
                api_me,
                api_me_unauthorized,
                api_dashboard,
                api_profile,
                api_list_coaches,
                api_list_players,
                api_get_player,
                api_list_goals,
                api_get_goal,
                api_create_goal,
                api_update_goal,
                api_list_process_goals,
                api_create_process_goal,
                api_update_process_goal,
                goal_progress_update,
                process_goal_progress_update,
                api_register_user,
            ],
        )
        .register(
            "/api",
            catchers![
                unauthorized_api,
                forbidden_api,
                bad_request_api,
                not_found_api,
                unprocessable_api
            ],
        )
        .mount("/api", routes![health])
        .attach(TelemetryFairing)
}
