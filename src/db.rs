use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::{info, instrument};

use crate::auth::{DbUser, DbUserSession, Role, User, UserSession};
use crate::error::AppError;
use crate::models::{Coach, DbCoach, DbGoal, DbPlayer, DbProcessGoal, Goal, Player, ProcessGoal};
use crate::policy::Scope;
use crate::progress::{self, GoalArea, Progress, Timeframe};

pub const PAGE_SIZE: i64 = 10;

#[derive(Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub total_count: i64,
}

impl<T> Page<T> {
    pub fn empty(page: i64) -> Self {
        Self {
            items: Vec::new(),
            page,
            total_count: 0,
        }
    }
}

fn page_offset(page: i64) -> (i64, i64) {
    let page = page.max(1);
    (page, (page - 1) * PAGE_SIZE)
}

/// Foreign keys are enforced per connection in SQLite, so they are switched
/// on in the connect options rather than in a migration.
pub async fn connect(database_url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(AppError::Database)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    Ok(pool)
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, role, email, first_name, last_name, date_of_birth, phone_number
         FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn find_user_by_username(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<User>, AppError> {
    info!("Looking up user by username");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, role, email, first_name, last_name, date_of_birth, phone_number
         FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(User::from))
}

#[instrument(skip_all, fields(username, role))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
    role: Role,
    email: &str,
    first_name: &str,
    last_name: &str,
) -> Result<i64, AppError> {
    info!("Creating new user");

    let existing_user = sqlx::query("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    if existing_user.is_some() {
        return Err(AppError::Validation(format!(
            "Username '{}' already exists",
            username
        )));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query(
        "INSERT INTO users (username, password, role, email, first_name, last_name)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(username)
    .bind(hashed_password)
    .bind(role.as_str())
    .bind(email)
    .bind(first_name)
    .bind(last_name)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

/// Returns the user on a correct password, `None` otherwise. Unknown user
/// and wrong password are indistinguishable to the caller.
#[instrument(skip_all, fields(username))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let row = sqlx::query("SELECT id, password FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let id: i64 = row.try_get("id")?;
            let hash: String = row.try_get("password")?;

            match bcrypt::verify(password, &hash) {
                Ok(true) => Ok(Some(get_user(pool, id).await?)),
                _ => Ok(None),
            }
        }
        _ => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[instrument(skip(pool, token))]
pub async fn create_user_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating user session");

    let res = sqlx::query("INSERT INTO user_sessions (user_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<UserSession, AppError> {
    info!("Getting session by token");

    let session = sqlx::query_as::<_, DbUserSession>(
        "SELECT id, user_id, token, created_at, expires_at FROM user_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(UserSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM user_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Cleaning expired sessions");

    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// Coaches
// ---------------------------------------------------------------------------

const COACH_SELECT: &str = "
    SELECT c.id, c.user_id,
           TRIM(u.first_name || ' ' || u.last_name) AS display_name,
           u.email, c.specialization, c.experience_years, c.bio, c.hire_date
    FROM coaches c
    JOIN users u ON u.id = c.user_id";

#[instrument(skip(pool))]
pub async fn create_coach(
    pool: &Pool<Sqlite>,
    user_id: i64,
    specialization: &str,
    experience_years: i64,
    bio: &str,
) -> Result<i64, AppError> {
    info!("Creating coach profile");
    let res = sqlx::query(
        "INSERT INTO coaches (user_id, specialization, experience_years, bio)
         VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(specialization)
    .bind(experience_years)
    .bind(bio)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn get_coach_profile(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Option<Coach>, AppError> {
    info!("Fetching coach profile for user");
    let row = sqlx::query_as::<_, DbCoach>(&format!("{} WHERE c.user_id = ?", COACH_SELECT))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(Coach::from))
}

#[instrument]
pub async fn get_coach(pool: &Pool<Sqlite>, id: i64) -> Result<Coach, AppError> {
    info!("Fetching coach by ID");
    let row = sqlx::query_as::<_, DbCoach>(&format!("{} WHERE c.id = ?", COACH_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(coach) => Ok(Coach::from(coach)),
        _ => Err(AppError::NotFound(format!(
            "Coach with id {} not found in database",
            id
        ))),
    }
}

fn push_coach_search(qb: &mut QueryBuilder<'_, Sqlite>, search: &str) {
    let pattern = format!("%{}%", search);
    qb.push(" AND (u.first_name LIKE ")
        .push_bind(pattern.clone())
        .push(" OR u.last_name LIKE ")
        .push_bind(pattern.clone())
        .push(" OR u.email LIKE ")
        .push_bind(pattern.clone())
        .push(" OR c.specialization LIKE ")
        .push_bind(pattern)
        .push(")");
}

#[instrument(skip(pool))]
pub async fn list_coaches(
    pool: &Pool<Sqlite>,
    search: Option<&str>,
    page: i64,
) -> Result<Page<Coach>, AppError> {
    info!("Listing coaches");
    let (page, offset) = page_offset(page);

    let mut count_qb = QueryBuilder::new(
        "SELECT COUNT(*) FROM coaches c JOIN users u ON u.id = c.user_id WHERE 1=1",
    );
    if let Some(search) = search {
        push_coach_search(&mut count_qb, search);
    }
    let total_count: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::new(format!("{} WHERE 1=1", COACH_SELECT));
    if let Some(search) = search {
        push_coach_search(&mut qb, search);
    }
    qb.push(" ORDER BY u.first_name, u.last_name LIMIT ")
        .push_bind(PAGE_SIZE)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows: Vec<DbCoach> = qb.build_query_as().fetch_all(pool).await?;

    Ok(Page {
        items: rows.into_iter().map(Coach::from).collect(),
        page,
        total_count,
    })
}

#[instrument(skip(pool))]
pub async fn recent_coaches(pool: &Pool<Sqlite>, limit: i64) -> Result<Vec<Coach>, AppError> {
    info!("Fetching most recently hired coaches");
    let rows = sqlx::query_as::<_, DbCoach>(&format!(
        "{} ORDER BY c.hire_date DESC, c.id DESC LIMIT ?",
        COACH_SELECT
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Coach::from).collect())
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

const PLAYER_SELECT: &str = "
    SELECT p.id, p.user_id,
           TRIM(u.first_name || ' ' || u.last_name) AS display_name,
           p.coach_id,
           COALESCE(TRIM(cu.first_name || ' ' || cu.last_name), '') AS coach_name,
           p.position, p.jersey_number, p.height, p.weight, p.join_date, p.is_active
    FROM players p
    JOIN users u ON u.id = p.user_id
    LEFT JOIN coaches c ON c.id = p.coach_id
    LEFT JOIN users cu ON cu.id = c.user_id";

#[instrument(skip(pool))]
pub async fn jersey_number_taken(
    pool: &Pool<Sqlite>,
    jersey_number: i64,
) -> Result<bool, AppError> {
    let existing = sqlx::query("SELECT id FROM players WHERE jersey_number = ?")
        .bind(jersey_number)
        .fetch_optional(pool)
        .await?;

    Ok(existing.is_some())
}

#[instrument(skip(pool))]
pub async fn create_player(
    pool: &Pool<Sqlite>,
    user_id: i64,
    coach_id: Option<i64>,
    position: &str,
    jersey_number: Option<i64>,
    height: Option<f64>,
    weight: Option<f64>,
) -> Result<i64, AppError> {
    info!("Creating player profile");

    if let Some(jersey_number) = jersey_number {
        if jersey_number_taken(pool, jersey_number).await? {
            return Err(AppError::Validation(format!(
                "Jersey number {} is already taken",
                jersey_number
            )));
        }
    }

    let res = sqlx::query(
        "INSERT INTO players (user_id, coach_id, position, jersey_number, height, weight)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(coach_id)
    .bind(position)
    .bind(jersey_number)
    .bind(height)
    .bind(weight)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn get_player_profile(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Option<Player>, AppError> {
    info!("Fetching player profile for user");
    let row = sqlx::query_as::<_, DbPlayer>(&format!("{} WHERE p.user_id = ?", PLAYER_SELECT))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(Player::from))
}

#[instrument]
pub async fn get_player(pool: &Pool<Sqlite>, id: i64) -> Result<Player, AppError> {
    info!("Fetching player by ID");
    let row = sqlx::query_as::<_, DbPlayer>(&format!("{} WHERE p.id = ?", PLAYER_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(player) => Ok(Player::from(player)),
        _ => Err(AppError::NotFound(format!(
            "Player with id {} not found in database",
            id
        ))),
    }
}

fn push_player_scope(qb: &mut QueryBuilder<'_, Sqlite>, scope: Scope) {
    match scope {
        Scope::All => {}
        Scope::Coach(coach_id) => {
            qb.push(" AND p.coach_id = ").push_bind(coach_id);
        }
        Scope::Player(player_id) => {
            qb.push(" AND p.id = ").push_bind(player_id);
        }
        // Callers bail out before building a query for Scope::Nothing
        Scope::Nothing => {
            qb.push(" AND 0");
        }
    }
}

fn push_player_search(qb: &mut QueryBuilder<'_, Sqlite>, search: &str) {
    let pattern = format!("%{}%", search);
    qb.push(" AND (u.first_name LIKE ")
        .push_bind(pattern.clone())
        .push(" OR u.last_name LIKE ")
        .push_bind(pattern.clone())
        .push(" OR p.position LIKE ")
        .push_bind(pattern.clone())
        .push(" OR CAST(p.jersey_number AS TEXT) LIKE ")
        .push_bind(pattern)
        .push(")");
}

#[instrument(skip(pool))]
pub async fn list_players(
    pool: &Pool<Sqlite>,
    scope: Scope,
    search: Option<&str>,
    page: i64,
) -> Result<Page<Player>, AppError> {
    info!("Listing players");
    let (page, offset) = page_offset(page);

    if scope == Scope::Nothing {
        return Ok(Page::empty(page));
    }

    let mut count_qb = QueryBuilder::new(
        "SELECT COUNT(*) FROM players p JOIN users u ON u.id = p.user_id WHERE 1=1",
    );
    push_player_scope(&mut count_qb, scope);
    if let Some(search) = search {
        push_player_search(&mut count_qb, search);
    }
    let total_count: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::new(format!("{} WHERE 1=1", PLAYER_SELECT));
    push_player_scope(&mut qb, scope);
    if let Some(search) = search {
        push_player_search(&mut qb, search);
    }
    qb.push(" ORDER BY u.first_name, u.last_name LIMIT ")
        .push_bind(PAGE_SIZE)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows: Vec<DbPlayer> = qb.build_query_as().fetch_all(pool).await?;

    Ok(Page {
        items: rows.into_iter().map(Player::from).collect(),
        page,
        total_count,
    })
}

#[instrument(skip(pool))]
pub async fn players_for_coach(pool: &Pool<Sqlite>, coach_id: i64) -> Result<Vec<Player>, AppError> {
    info!("Fetching active players for coach");
    let rows = sqlx::query_as::<_, DbPlayer>(&format!(
        "{} WHERE p.coach_id = ? AND p.is_active = TRUE ORDER BY u.first_name, u.last_name",
        PLAYER_SELECT
    ))
    .bind(coach_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Player::from).collect())
}

#[instrument(skip(pool))]
pub async fn recent_players(pool: &Pool<Sqlite>, limit: i64) -> Result<Vec<Player>, AppError> {
    info!("Fetching most recently joined players");
    let rows = sqlx::query_as::<_, DbPlayer>(&format!(
        "{} ORDER BY p.join_date DESC, p.id DESC LIMIT ?",
        PLAYER_SELECT
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Player::from).collect())
}

pub struct DashboardCounts {
    pub total_users: i64,
    pub total_coaches: i64,
    pub total_players: i64,
    pub active_players: i64,
}

#[instrument(skip(pool))]
pub async fn dashboard_counts(pool: &Pool<Sqlite>) -> Result<DashboardCounts, AppError> {
    info!("Collecting dashboard counts");

    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    let total_coaches: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM coaches")
        .fetch_one(pool)
        .await?;
    let total_players: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM players")
        .fetch_one(pool)
        .await?;
    let active_players: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM players WHERE is_active = TRUE")
            .fetch_one(pool)
            .await?;

    Ok(DashboardCounts {
        total_users,
        total_coaches,
        total_players,
        active_players,
    })
}

// ---------------------------------------------------------------------------
// Goals
// ---------------------------------------------------------------------------

const GOAL_SELECT: &str = "
    SELECT g.id, g.name, g.player_id,
           TRIM(pu.first_name || ' ' || pu.last_name) AS player_name,
           g.coach_id,
           TRIM(cu.first_name || ' ' || cu.last_name) AS coach_name,
           g.area, g.timeframe, g.progress, g.description, g.target_date,
           g.notes, g.created_at, g.updated_at
    FROM goals g
    JOIN players p ON p.id = g.player_id
    JOIN users pu ON pu.id = p.user_id
    JOIN coaches c ON c.id = g.coach_id
    JOIN users cu ON cu.id = c.user_id";

#[derive(Debug, Default, Clone, Copy)]
pub struct GoalFilters<'a> {
    pub search: Option<&'a str>,
    pub area: Option<GoalArea>,
    pub progress: Option<Progress>,
    pub timeframe: Option<Timeframe>,
}

#[instrument(skip(pool))]
pub async fn create_goal(
    pool: &Pool<Sqlite>,
    name: &str,
    player_id: i64,
    coach_id: i64,
    area: GoalArea,
    timeframe: Timeframe,
    description: &str,
    target_date: Option<NaiveDate>,
) -> Result<i64, AppError> {
    info!("Creating goal");
    let res = sqlx::query(
        "INSERT INTO goals (name, player_id, coach_id, area, timeframe, description, target_date)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(name)
    .bind(player_id)
    .bind(coach_id)
    .bind(area.as_str())
    .bind(timeframe.as_str())
    .bind(description)
    .bind(target_date)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn get_goal(pool: &Pool<Sqlite>, id: i64) -> Result<Goal, AppError> {
    info!("Fetching goal by ID");
    let row = sqlx::query_as::<_, DbGoal>(&format!("{} WHERE g.id = ?", GOAL_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(goal) => Ok(Goal::from(goal)),
        _ => Err(AppError::NotFound(format!(
            "Goal with id {} not found in database",
            id
        ))),
    }
}

fn push_goal_scope(qb: &mut QueryBuilder<'_, Sqlite>, scope: Scope) {
    match scope {
        Scope::All => {}
        Scope::Coach(coach_id) => {
            qb.push(" AND g.coach_id = ").push_bind(coach_id);
        }
        Scope::Player(player_id) => {
            qb.push(" AND g.player_id = ").push_bind(player_id);
        }
        Scope::Nothing => {
            qb.push(" AND 0");
        }
    }
}

fn push_goal_filters(qb: &mut QueryBuilder<'_, Sqlite>, filters: GoalFilters<'_>) {
    if let Some(search) = filters.search {
        let pattern = format!("%{}%", search);
        qb.push(" AND (g.name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR pu.first_name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR pu.last_name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR g.area LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(area) = filters.area {
        qb.push(" AND g.area = ").push_bind(area.as_str());
    }
    if let Some(progress) = filters.progress {
        qb.push(" AND g.progress = ").push_bind(progress.as_str());
    }
    if let Some(timeframe) = filters.timeframe {
        qb.push(" AND g.timeframe = ").push_bind(timeframe.as_str());
    }
}

#[instrument(skip(pool))]
pub async fn list_goals(
    pool: &Pool<Sqlite>,
    scope: Scope,
    filters: GoalFilters<'_>,
    page: i64,
) -> Result<Page<Goal>, AppError> {
    info!("Listing goals");
    let (page, offset) = page_offset(page);

    if scope == Scope::Nothing {
        return Ok(Page::empty(page));
    }

    let mut count_qb = QueryBuilder::new(
        "SELECT COUNT(*) FROM goals g
         JOIN players p ON p.id = g.player_id
         JOIN users pu ON pu.id = p.user_id
         WHERE 1=1",
    );
    push_goal_scope(&mut count_qb, scope);
    push_goal_filters(&mut count_qb, filters);
    let total_count: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::new(format!("{} WHERE 1=1", GOAL_SELECT));
    push_goal_scope(&mut qb, scope);
    push_goal_filters(&mut qb, filters);
    qb.push(" ORDER BY g.created_at DESC, g.id DESC LIMIT ")
        .push_bind(PAGE_SIZE)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows: Vec<DbGoal> = qb.build_query_as().fetch_all(pool).await?;

    Ok(Page {
        items: rows.into_iter().map(Goal::from).collect(),
        page,
        total_count,
    })
}

#[instrument(skip(pool))]
pub async fn update_goal_details(
    pool: &Pool<Sqlite>,
    id: i64,
    name: &str,
    player_id: i64,
    area: GoalArea,
    timeframe: Timeframe,
    description: &str,
    target_date: Option<NaiveDate>,
    notes: &str,
) -> Result<(), AppError> {
    info!("Updating goal details");
    let now = Utc::now().naive_utc();
    sqlx::query(
        "UPDATE goals
         SET name = ?, player_id = ?, area = ?, timeframe = ?, description = ?,
             target_date = ?, notes = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(name)
    .bind(player_id)
    .bind(area.as_str())
    .bind(timeframe.as_str())
    .bind(description)
    .bind(target_date)
    .bind(notes)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Empty notes leave the stored notes untouched.
#[instrument(skip(pool))]
pub async fn update_goal_progress(
    pool: &Pool<Sqlite>,
    id: i64,
    progress: Progress,
    notes: Option<&str>,
) -> Result<(), AppError> {
    info!("Updating goal progress");
    let now = Utc::now().naive_utc();

    match notes.filter(|n| !n.is_empty()) {
        Some(notes) => {
            sqlx::query("UPDATE goals SET progress = ?, notes = ?, updated_at = ? WHERE id = ?")
                .bind(progress.as_str())
                .bind(notes)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await?;
        }
        None => {
            sqlx::query("UPDATE goals SET progress = ?, updated_at = ? WHERE id = ?")
                .bind(progress.as_str())
                .bind(now)
                .bind(id)
                .execute(pool)
                .await?;
        }
    }

    Ok(())
}

/// (total, completed) process-goal counts for a goal.
#[instrument(skip(pool))]
pub async fn process_goal_counts(
    pool: &Pool<Sqlite>,
    goal_id: i64,
) -> Result<(i64, i64), AppError> {
    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM process_goals WHERE main_goal_id = ?")
            .bind(goal_id)
            .fetch_one(pool)
            .await?;

    let completed: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM process_goals WHERE main_goal_id = ? AND progress = 'completed'",
    )
    .bind(goal_id)
    .fetch_one(pool)
    .await?;

    Ok((total, completed))
}

/// Re-evaluates the auto-completion rule for a goal and promotes it to
/// completed when every one of its process goals is done. One-way: nothing
/// here ever moves a goal out of completed.
#[instrument(skip(pool))]
pub async fn maybe_auto_complete_goal(pool: &Pool<Sqlite>, goal_id: i64) -> Result<bool, AppError> {
    let (total, completed) = process_goal_counts(pool, goal_id).await?;

    if !progress::should_auto_complete(total, completed) {
        return Ok(false);
    }

    info!(goal_id, "All process goals completed, promoting main goal");
    let now = Utc::now().naive_utc();
    sqlx::query("UPDATE goals SET progress = 'completed', updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(goal_id)
        .execute(pool)
        .await?;

    Ok(true)
}

// ---------------------------------------------------------------------------
// Process goals
// ---------------------------------------------------------------------------

const PROCESS_GOAL_SELECT: &str = "
    SELECT id, name, main_goal_id, progress, description, target_date,
           sort_order, notes, created_at, updated_at
    FROM process_goals";

#[instrument(skip(pool))]
pub async fn create_process_goal(
    pool: &Pool<Sqlite>,
    main_goal_id: i64,
    name: &str,
    description: &str,
    target_date: Option<NaiveDate>,
    sort_order: i64,
    progress: Progress,
) -> Result<i64, AppError> {
    info!("Creating process goal");
    let res = sqlx::query(
        "INSERT INTO process_goals (main_goal_id, name, description, target_date, sort_order, progress)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(main_goal_id)
    .bind(name)
    .bind(description)
    .bind(target_date)
    .bind(sort_order)
    .bind(progress.as_str())
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn get_process_goal(pool: &Pool<Sqlite>, id: i64) -> Result<ProcessGoal, AppError> {
    info!("Fetching process goal by ID");
    let row =
        sqlx::query_as::<_, DbProcessGoal>(&format!("{} WHERE id = ?", PROCESS_GOAL_SELECT))
            .bind(id)
            .fetch_optional(pool)
            .await?;

    match row {
        Some(pg) => Ok(ProcessGoal::from(pg)),
        _ => Err(AppError::NotFound(format!(
            "Process goal with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn list_process_goals(
    pool: &Pool<Sqlite>,
    goal_id: i64,
    page: i64,
) -> Result<Page<ProcessGoal>, AppError> {
    info!("Listing process goals for goal");
    let (page, offset) = page_offset(page);

    let total_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM process_goals WHERE main_goal_id = ?")
            .bind(goal_id)
            .fetch_one(pool)
            .await?;

    let rows = sqlx::query_as::<_, DbProcessGoal>(&format!(
        "{} WHERE main_goal_id = ? ORDER BY sort_order, created_at LIMIT ? OFFSET ?",
        PROCESS_GOAL_SELECT
    ))
    .bind(goal_id)
    .bind(PAGE_SIZE)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(Page {
        items: rows.into_iter().map(ProcessGoal::from).collect(),
        page,
        total_count,
    })
}

#[instrument(skip(pool))]
pub async fn update_process_goal_details(
    pool: &Pool<Sqlite>,
    id: i64,
    name: &str,
    description: &str,
    target_date: Option<NaiveDate>,
    sort_order: i64,
    notes: &str,
) -> Result<(), AppError> {
    info!("Updating process goal details");
    let now = Utc::now().naive_utc();
    sqlx::query(
        "UPDATE process_goals
         SET name = ?, description = ?, target_date = ?, sort_order = ?, notes = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(name)
    .bind(description)
    .bind(target_date)
    .bind(sort_order)
    .bind(notes)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn update_process_goal_progress(
    pool: &Pool<Sqlite>,
    id: i64,
    progress: Progress,
    notes: Option<&str>,
) -> Result<(), AppError> {
    info!("Updating process goal progress");
    let now = Utc::now().naive_utc();

    match notes.filter(|n| !n.is_empty()) {
        Some(notes) => {
            sqlx::query(
                "UPDATE process_goals SET progress = ?, notes = ?, updated_at = ? WHERE id = ?",
            )
            .bind(progress.as_str())
            .bind(notes)
            .bind(now)
            .bind(id)
            .execute(pool)
            .await?;
        }
        None => {
            sqlx::query("UPDATE process_goals SET progress = ?, updated_at = ? WHERE id = ?")
                .bind(progress.as_str())
                .bind(now)
                .bind(id)
                .execute(pool)
                .await?;
        }
    }

    Ok(())
}
