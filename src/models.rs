use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::progress::{self, GoalArea, Progress, Timeframe};

#[derive(Serialize, Clone)]
pub struct Coach {
    pub id: i64,
    pub user_id: i64,
    pub display_name: String, // Denormalized from users for convenience
    pub email: String,
    pub specialization: String,
    pub experience_years: i64,
    pub bio: String,
    pub hire_date: NaiveDate,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbCoach {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub specialization: Option<String>,
    pub experience_years: Option<i64>,
    pub bio: Option<String>,
    pub hire_date: Option<NaiveDate>,
}

impl From<DbCoach> for Coach {
    fn from(coach: DbCoach) -> Self {
        Self {
            id: coach.id.unwrap_or_default(),
            user_id: coach.user_id.unwrap_or_default(),
            display_name: coach.display_name.unwrap_or_default(),
            email: coach.email.unwrap_or_default(),
            specialization: coach.specialization.unwrap_or_default(),
            experience_years: coach.experience_years.unwrap_or_default(),
            bio: coach.bio.unwrap_or_default(),
            hire_date: coach
                .hire_date
                .unwrap_or_else(|| Utc::now().date_naive()),
        }
    }
}

#[derive(Serialize, Clone)]
pub struct Player {
    pub id: i64,
    pub user_id: i64,
    pub display_name: String,
    pub coach_id: Option<i64>,
    pub coach_name: String, // Empty when no coach is assigned
    pub position: String,
    pub jersey_number: Option<i64>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub join_date: NaiveDate,
    pub is_active: bool,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbPlayer {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub display_name: Option<String>,
    pub coach_id: Option<i64>,
    pub coach_name: Option<String>,
    pub position: Option<String>,
    pub jersey_number: Option<i64>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub join_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

impl From<DbPlayer> for Player {
    fn from(player: DbPlayer) -> Self {
        Self {
            id: player.id.unwrap_or_default(),
            user_id: player.user_id.unwrap_or_default(),
            display_name: player.display_name.unwrap_or_default(),
            coach_id: player.coach_id,
            coach_name: player.coach_name.unwrap_or_default(),
            position: player.position.unwrap_or_default(),
            jersey_number: player.jersey_number,
            height: player.height,
            weight: player.weight,
            join_date: player
                .join_date
                .unwrap_or_else(|| Utc::now().date_naive()),
            is_active: player.is_active.unwrap_or(true),
        }
    }
}

#[derive(Serialize, Clone)]
pub struct Goal {
    pub id: i64,
    pub name: String,
    pub player_id: i64,
    pub player_name: String,
    pub coach_id: i64,
    pub coach_name: String,
    pub area: GoalArea,
    pub timeframe: Timeframe,
    pub progress: Progress,
    pub description: String,
    pub target_date: Option<NaiveDate>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbGoal {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub player_id: Option<i64>,
    pub player_name: Option<String>,
    pub coach_id: Option<i64>,
    pub coach_name: Option<String>,
    pub area: Option<String>,
    pub timeframe: Option<String>,
    pub progress: Option<String>,
    pub description: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl From<DbGoal> for Goal {
    fn from(goal: DbGoal) -> Self {
        Self {
            id: goal.id.unwrap_or_default(),
            name: goal.name.unwrap_or_default(),
            player_id: goal.player_id.unwrap_or_default(),
            player_name: goal.player_name.unwrap_or_default(),
            coach_id: goal.coach_id.unwrap_or_default(),
            coach_name: goal.coach_name.unwrap_or_default(),
            area: GoalArea::from_str(&goal.area.unwrap_or_default()).unwrap_or_default(),
            timeframe: Timeframe::from_str(&goal.timeframe.unwrap_or_default())
                .unwrap_or_default(),
            progress: Progress::from_str(&goal.progress.unwrap_or_default())
                .unwrap_or_default(),
            description: goal.description.unwrap_or_default(),
            target_date: goal.target_date,
            notes: goal.notes.unwrap_or_default(),
            created_at: to_utc(goal.created_at),
            updated_at: to_utc(goal.updated_at),
        }
    }
}

impl Goal {
    pub fn progress_percentage(&self) -> i64 {
        self.progress.percentage()
    }

    pub fn is_overdue(&self) -> bool {
        progress::is_overdue(self.target_date, self.progress)
    }
}

#[derive(Serialize, Clone)]
pub struct ProcessGoal {
    pub id: i64,
    pub name: String,
    pub main_goal_id: i64,
    pub progress: Progress,
    pub description: String,
    pub target_date: Option<NaiveDate>,
    pub order: i64,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbProcessGoal {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub main_goal_id: Option<i64>,
    pub progress: Option<String>,
    pub description: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub sort_order: Option<i64>,
    pub notes: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl From<DbProcessGoal> for ProcessGoal {
    fn from(pg: DbProcessGoal) -> Self {
        Self {
            id: pg.id.unwrap_or_default(),
            name: pg.name.unwrap_or_default(),
            main_goal_id: pg.main_goal_id.unwrap_or_default(),
            progress: Progress::from_str(&pg.progress.unwrap_or_default()).unwrap_or_default(),
            description: pg.description.unwrap_or_default(),
            target_date: pg.target_date,
            order: pg.sort_order.unwrap_or_default(),
            notes: pg.notes.unwrap_or_default(),
            created_at: to_utc(pg.created_at),
            updated_at: to_utc(pg.updated_at),
        }
    }
}

impl ProcessGoal {
    pub fn progress_percentage(&self) -> i64 {
        self.progress.percentage()
    }

    pub fn is_overdue(&self) -> bool {
        progress::is_overdue(self.target_date, self.progress)
    }
}

fn to_utc(dt: Option<NaiveDateTime>) -> DateTime<Utc> {
    dt.map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        .unwrap_or_else(Utc::now)
}
