#[cfg(test)]
pub mod test_db {
    use crate::auth::Role;
    use crate::db::{
        create_coach, create_goal, create_player, create_process_goal, create_user,
        update_goal_progress,
    };
    use crate::error::AppError;
    use crate::progress::{GoalArea, Progress, Timeframe};
    use chrono::NaiveDate;
    use rocket::local::asynchronous::Client;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::str::FromStr;
    use std::sync::Once;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        goals: Vec<TestGoal>,
        process_goals: Vec<TestProcessGoal>,
    }

    pub struct TestUser {
        pub username: String,
        pub first_name: String,
        pub last_name: String,
        pub role: Role,
        pub password: String,
        pub with_profile: bool,
        pub coach_username: Option<String>,
        pub jersey_number: Option<i64>,
    }

    pub struct TestGoal {
        pub name: String,
        pub player_username: String,
        pub coach_username: String,
        pub area: GoalArea,
        pub timeframe: Timeframe,
        pub progress: Progress,
        pub target_date: Option<NaiveDate>,
    }

    pub struct TestProcessGoal {
        pub goal_name: String,
        pub name: String,
        pub progress: Progress,
        pub sort_order: i64,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn admin(mut self, username: &str, first_name: &str, last_name: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                role: Role::Admin,
                password: STANDARD_PASSWORD.to_string(),
                with_profile: false,
                coach_username: None,
                jersey_number: None,
            });
            self
        }

        pub fn coach(mut self, username: &str, first_name: &str, last_name: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                role: Role::Coach,
                password: STANDARD_PASSWORD.to_string(),
                with_profile: true,
                coach_username: None,
                jersey_number: None,
            });
            self
        }

        pub fn player(
            mut self,
            username: &str,
            first_name: &str,
            last_name: &str,
            coach_username: Option<&str>,
        ) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                role: Role::Player,
                password: STANDARD_PASSWORD.to_string(),
                with_profile: true,
                coach_username: coach_username.map(String::from),
                jersey_number: None,
            });
            self
        }

        pub fn player_with_jersey(
            mut self,
            username: &str,
            first_name: &str,
            last_name: &str,
            coach_username: Option<&str>,
            jersey_number: i64,
        ) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                role: Role::Player,
                password: STANDARD_PASSWORD.to_string(),
                with_profile: true,
                coach_username: coach_username.map(String::from),
                jersey_number: Some(jersey_number),
            });
            self
        }

        /// A user whose role-specific profile row is deliberately missing.
        pub fn user_without_profile(mut self, username: &str, role: Role) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                first_name: String::new(),
                last_name: String::new(),
                role,
                password: STANDARD_PASSWORD.to_string(),
                with_profile: false,
                coach_username: None,
                jersey_number: None,
            });
            self
        }

        pub fn goal(mut self, name: &str, player_username: &str, coach_username: &str) -> Self {
            self.goals.push(TestGoal {
                name: name.to_string(),
                player_username: player_username.to_string(),
                coach_username: coach_username.to_string(),
                area: GoalArea::Technical,
                timeframe: Timeframe::MediumTerm,
                progress: Progress::NotStarted,
                target_date: None,
            });
            self
        }

        pub fn goal_with(
            mut self,
            name: &str,
            player_username: &str,
            coach_username: &str,
            area: GoalArea,
            timeframe: Timeframe,
            progress: Progress,
            target_date: Option<NaiveDate>,
        ) -> Self {
            self.goals.push(TestGoal {
                name: name.to_string(),
                player_username: player_username.to_string(),
                coach_username: coach_username.to_string(),
                area,
                timeframe,
                progress,
                target_date,
            });
            self
        }

        pub fn process_goal(
            mut self,
            goal_name: &str,
            name: &str,
            progress: Progress,
            sort_order: i64,
        ) -> Self {
            self.process_goals.push(TestProcessGoal {
                goal_name: goal_name.to_string(),
                name: name.to_string(),
                progress,
                sort_order,
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder().is_test(true).try_init();
            });

            // A single connection keeps the in-memory database alive for the
            // whole test; foreign keys drive the cascade rules under test.
            let options = SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(AppError::Database)?
                .foreign_keys(true);
            let pool = SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();
            let mut coach_id_map: HashMap<String, i64> = HashMap::new();
            let mut player_id_map: HashMap<String, i64> = HashMap::new();
            let mut goal_id_map: HashMap<String, i64> = HashMap::new();
            let mut process_goal_id_map: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let user_id = create_user(
                    &pool,
                    &user.username,
                    &user.password,
                    user.role.clone(),
                    &format!("{}@example.com", user.username),
                    &user.first_name,
                    &user.last_name,
                )
                .await?;

                user_id_map.insert(user.username.clone(), user_id);

                if !user.with_profile {
                    continue;
                }

                match user.role {
                    Role::Coach => {
                        let coach_id =
                            create_coach(&pool, user_id, "General", 5, "Test coach").await?;
                        coach_id_map.insert(user.username.clone(), coach_id);
                    }
                    Role::Player => {
                        let coach_id = user
                            .coach_username
                            .as_ref()
                            .and_then(|name| coach_id_map.get(name).copied());

                        let player_id = create_player(
                            &pool,
                            user_id,
                            coach_id,
                            "Midfielder",
                            user.jersey_number,
                            None,
                            None,
                        )
                        .await?;
                        player_id_map.insert(user.username.clone(), player_id);
                    }
                    Role::Admin => {}
                }
            }

            for goal in &self.goals {
                let player_id = player_id_map
                    .get(&goal.player_username)
                    .copied()
                    .ok_or_else(|| {
                        AppError::Internal(format!("Unknown player {}", goal.player_username))
                    })?;
                let coach_id = coach_id_map
                    .get(&goal.coach_username)
                    .copied()
                    .ok_or_else(|| {
                        AppError::Internal(format!("Unknown coach {}", goal.coach_username))
                    })?;

                let goal_id = create_goal(
                    &pool,
                    &goal.name,
                    player_id,
                    coach_id,
                    goal.area,
                    goal.timeframe,
                    "",
                    goal.target_date,
                )
                .await?;

                if goal.progress != Progress::NotStarted {
                    update_goal_progress(&pool, goal_id, goal.progress, None).await?;
                }

                goal_id_map.insert(goal.name.clone(), goal_id);
            }

            for pg in &self.process_goals {
                let goal_id = goal_id_map.get(&pg.goal_name).copied().ok_or_else(|| {
                    AppError::Internal(format!("Unknown goal {}", pg.goal_name))
                })?;

                let process_goal_id = create_process_goal(
                    &pool,
                    goal_id,
                    &pg.name,
                    "",
                    None,
                    pg.sort_order,
                    pg.progress,
                )
                .await?;

                process_goal_id_map.insert(pg.name.clone(), process_goal_id);
            }

            Ok(TestDb {
                pool,
                user_id_map,
                coach_id_map,
                player_id_map,
                goal_id_map,
                process_goal_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
        pub coach_id_map: HashMap<String, i64>,
        pub player_id_map: HashMap<String, i64>,
        pub goal_id_map: HashMap<String, i64>,
        pub process_goal_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> Option<i64> {
            self.user_id_map.get(username).copied()
        }

        pub fn coach_id(&self, username: &str) -> Option<i64> {
            self.coach_id_map.get(username).copied()
        }

        pub fn player_id(&self, username: &str) -> Option<i64> {
            self.player_id_map.get(username).copied()
        }

        pub fn goal_id(&self, name: &str) -> Option<i64> {
            self.goal_id_map.get(name).copied()
        }

        pub fn process_goal_id(&self, name: &str) -> Option<i64> {
            self.process_goal_id_map.get(name).copied()
        }
    }

    /// Two coaches, two players, one goal with two process goals. Enough for
    /// most scoping and progress scenarios.
    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .admin("admin_user", "Admin", "User")
            .coach("coach_user", "Coach", "User")
            .coach("coach_b", "Coach", "Bee")
            .player_with_jersey("player_user", "Player", "User", Some("coach_user"), 10)
            .player_with_jersey("player_b", "Player", "Bee", Some("coach_b"), 7)
            .goal("Improve passing accuracy", "player_user", "coach_user")
            .process_goal("Improve passing accuracy", "Daily wall passes", Progress::NotStarted, 0)
            .process_goal(
                "Improve passing accuracy",
                "Weekly drill session",
                Progress::NotStarted,
                1,
            )
            .build()
            .await
            .expect("Failed to build test DB")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let instance = crate::init_rocket(test_db.pool.clone()).await;
        let client = Client::tracked(instance)
            .await
            .expect("valid rocket instance");

        (client, test_db)
    }

    /// Logs in through the API so the tracked client carries the session
    /// cookies for subsequent requests.
    pub async fn login_test_user(client: &Client, username: &str, password: &str) {
        use rocket::http::{ContentType, Status};
        use serde_json::json;

        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": username,
                    "password": password
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok, "Login request failed");
    }
}
