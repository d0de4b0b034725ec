use chrono::NaiveDate;
use rocket::FromForm;
use rocket::Request;
use rocket::State;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use serde_json::{Value, json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, Role, User, UserSession};
use crate::db::{
    authenticate_user, create_coach, create_goal, create_player, create_process_goal,
    create_user, create_user_session, dashboard_counts, find_user_by_username, get_coach,
    get_goal, get_player, get_process_goal, invalidate_session, jersey_number_taken,
    list_coaches, list_goals, list_players, list_process_goals, maybe_auto_complete_goal,
    players_for_coach,
    process_goal_counts, recent_coaches, recent_players, update_goal_details,
    update_goal_progress, update_process_goal_details, update_process_goal_progress,
};
use crate::db::{GoalFilters, Page};
use crate::error::AppError;
use crate::models::{Coach, Goal, Player, ProcessGoal};
use crate::policy::{FieldSet, Principal};
use crate::progress::{self, GoalArea, Progress, Timeframe};
use crate::validation::AppErrorExt;
use crate::validation::JsonValidateExt;
use crate::validation::PermissionCheckExt;
use crate::validation::ToValidationResponse;
use crate::validation::ValidationResponse;

const SESSION_HOURS: i64 = 1;

/// Marker guard for the two progress endpoints: only same-origin
/// asynchronous submissions carry the XMLHttpRequest header. Anything else
/// is rejected as an invalid request before the body is even looked at.
pub struct AjaxRequest;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AjaxRequest {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match request.headers().get_one("X-Requested-With") {
            Some("XMLHttpRequest") => Outcome::Success(AjaxRequest),
            _ => Outcome::Error((Status::BadRequest, ())),
        }
    }
}

fn json_error(err: AppError) -> Custom<Json<Value>> {
    let message = err.to_string();
    let status = err.to_status_with_log("API request");
    Custom(status, Json(json!({ "error": message })))
}

// ---------------------------------------------------------------------------
// Auth endpoints
// ---------------------------------------------------------------------------

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserData>,
    pub error: Option<String>,
    pub redirect_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UserData {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub email: String,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.full_name(),
            role: user.role.to_string(),
            email: user.email.clone(),
        }
    }
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<LoginResponse>, Custom<Json<ValidationResponse>>> {
    use chrono::Utc;
    use rocket::http::{Cookie, SameSite};

    let validated = login.validate_custom()?;

    match authenticate_user(db, &validated.username, &validated.password)
        .await
        .validate_custom()?
    {
        Some(user) => {
            let token = UserSession::generate_token();
            let expires_at = Utc::now() + chrono::Duration::hours(SESSION_HOURS);

            create_user_session(db, user.id, &token, expires_at.naive_utc())
                .await
                .validate_custom()?;

            let cookie = Cookie::build(("session_token", token))
                .same_site(SameSite::Lax)
                .http_only(true)
                .max_age(rocket::time::Duration::hours(SESSION_HOURS));
            cookies.add_private(cookie);

            cookies.add_private(
                Cookie::build(("user_id", user.id.to_string()))
                    .same_site(SameSite::Lax)
                    .http_only(true)
                    .max_age(rocket::time::Duration::hours(SESSION_HOURS)),
            );

            cookies.add_private(
                Cookie::build(("user_role", user.role.to_string()))
                    .same_site(SameSite::Lax)
                    .max_age(rocket::time::Duration::hours(SESSION_HOURS)),
            );

            let redirect_url = match user.role {
                Role::Player => "/ui/my-goals".to_string(),
                _ => "/ui/dashboard".to_string(),
            };

            Ok(Json(LoginResponse {
                success: true,
                user: Some(UserData::from(user)),
                error: None,
                redirect_url: Some(redirect_url),
            }))
        }
        None => Ok(Json(LoginResponse {
            success: false,
            user: None,
            error: Some("Invalid username or password".to_string()),
            redirect_url: None,
        })),
    }
}

#[post("/logout")]
pub async fn api_logout(
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Json<Value> {
    let token = cookies
        .get_private("session_token")
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        let _ = invalidate_session(db, &token).await;
    }

    cookies.remove_private(rocket::http::Cookie::build("session_token"));
    cookies.remove_private(rocket::http::Cookie::build("user_id"));
    cookies.remove_private(rocket::http::Cookie::build("user_role"));

    Json(json!({
        "success": true,
        "message": "You have been successfully logged out.",
        "redirect_url": "/ui/login"
    }))
}

#[get("/me")]
pub async fn api_me(user: User) -> Json<UserData> {
    Json(UserData::from(user))
}

#[get("/me", rank = 2)]
pub async fn api_me_unauthorized() -> Status {
    Status::Unauthorized
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

// ---------------------------------------------------------------------------
// Dashboard and profile
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
pub struct CoachData {
    pub id: i64,
    pub user_id: i64,
    pub display_name: String,
    pub email: String,
    pub specialization: String,
    pub experience_years: i64,
    pub bio: String,
    pub hire_date: String,
}

impl From<Coach> for CoachData {
    fn from(coach: Coach) -> Self {
        Self {
            id: coach.id,
            user_id: coach.user_id,
            display_name: coach.display_name,
            email: coach.email,
            specialization: coach.specialization,
            experience_years: coach.experience_years,
            bio: coach.bio,
            hire_date: coach.hire_date.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct PlayerData {
    pub id: i64,
    pub user_id: i64,
    pub display_name: String,
    pub coach_id: Option<i64>,
    pub coach_name: String,
    pub position: String,
    pub jersey_number: Option<i64>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub join_date: String,
    pub is_active: bool,
}

impl From<Player> for PlayerData {
    fn from(player: Player) -> Self {
        Self {
            id: player.id,
            user_id: player.user_id,
            display_name: player.display_name,
            coach_id: player.coach_id,
            coach_name: player.coach_name,
            position: player.position,
            jersey_number: player.jersey_number,
            height: player.height,
            weight: player.weight,
            join_date: player.join_date.to_string(),
            is_active: player.is_active,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct AdminDashboard {
    pub total_users: i64,
    pub total_coaches: i64,
    pub total_players: i64,
    pub active_players: i64,
    pub recent_players: Vec<PlayerData>,
    pub recent_coaches: Vec<CoachData>,
}

#[derive(Serialize, Deserialize)]
pub struct CoachDashboard {
    pub coach: CoachData,
    pub players: Vec<PlayerData>,
    pub total_players: i64,
}

#[derive(Serialize, Deserialize)]
pub struct PlayerDashboard {
    pub player: PlayerData,
    pub coach: Option<CoachData>,
}

#[derive(Serialize, Deserialize)]
pub struct DashboardResponse {
    pub success: bool,
    pub role: String,
    pub notice: Option<String>,
    pub redirect_url: Option<String>,
    pub admin: Option<AdminDashboard>,
    pub coach: Option<CoachDashboard>,
    pub player: Option<PlayerDashboard>,
}

impl DashboardResponse {
    fn empty(role: &Role) -> Self {
        Self {
            success: true,
            role: role.to_string(),
            notice: None,
            redirect_url: None,
            admin: None,
            coach: None,
            player: None,
        }
    }

    fn missing_profile(role: &Role, notice: &str) -> Self {
        Self {
            success: false,
            role: role.to_string(),
            notice: Some(format!("{}. Please contact administrator.", notice)),
            redirect_url: Some("/ui/login".to_string()),
            admin: None,
            coach: None,
            player: None,
        }
    }
}

#[get("/dashboard")]
pub async fn api_dashboard(
    principal: Principal,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<DashboardResponse>, Custom<Json<ValidationResponse>>> {
    let mut response = DashboardResponse::empty(&principal.user.role);

    match principal.user.role {
        Role::Admin => {
            let counts = dashboard_counts(db).await.validate_custom()?;
            let players = recent_players(db, 5).await.validate_custom()?;
            let coaches = recent_coaches(db, 5).await.validate_custom()?;

            response.admin = Some(AdminDashboard {
                total_users: counts.total_users,
                total_coaches: counts.total_coaches,
                total_players: counts.total_players,
                active_players: counts.active_players,
                recent_players: players.into_iter().map(PlayerData::from).collect(),
                recent_coaches: coaches.into_iter().map(CoachData::from).collect(),
            });
        }
        Role::Coach => match &principal.coach {
            Some(coach) => {
                let players = players_for_coach(db, coach.id).await.validate_custom()?;
                let total_players = players.len() as i64;

                response.coach = Some(CoachDashboard {
                    coach: CoachData::from(coach.clone()),
                    players: players.into_iter().map(PlayerData::from).collect(),
                    total_players,
                });
            }
            None => {
                return Ok(Json(DashboardResponse::missing_profile(
                    &principal.user.role,
                    "Coach profile not found",
                )));
            }
        },
        Role::Player => match &principal.player {
            Some(player) => {
                let coach = match player.coach_id {
                    Some(coach_id) => Some(get_coach(db, coach_id).await.validate_custom()?),
                    None => None,
                };

                response.player = Some(PlayerDashboard {
                    player: PlayerData::from(player.clone()),
                    coach: coach.map(CoachData::from),
                });
            }
            None => {
                return Ok(Json(DashboardResponse::missing_profile(
                    &principal.user.role,
                    "Player profile not found",
                )));
            }
        },
    }

    Ok(Json(response))
}

#[derive(Serialize, Deserialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub role: String,
    pub notice: Option<String>,
    pub redirect_url: Option<String>,
    pub user: UserData,
    pub coach: Option<CoachData>,
    pub player: Option<PlayerData>,
}

#[get("/profile")]
pub async fn api_profile(principal: Principal) -> Json<ProfileResponse> {
    let notice = principal
        .missing_profile_notice()
        .map(|notice| format!("{}. Please contact administrator.", notice));
    let success = notice.is_none();

    Json(ProfileResponse {
        success,
        role: principal.role_str().to_string(),
        redirect_url: (!success).then(|| "/ui/dashboard".to_string()),
        notice,
        user: UserData::from(principal.user.clone()),
        coach: principal.coach.clone().map(CoachData::from),
        player: principal.player.clone().map(PlayerData::from),
    })
}

// ---------------------------------------------------------------------------
// Coach and player listings
// ---------------------------------------------------------------------------

#[derive(FromForm)]
pub struct ListQueryParams {
    search: Option<String>,
    page: Option<i64>,
}

#[derive(Serialize, Deserialize)]
pub struct CoachListResponse {
    pub coaches: Vec<CoachData>,
    pub page: i64,
    pub total_count: i64,
}

#[get("/coaches?<params..>")]
pub async fn api_list_coaches(
    params: ListQueryParams,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<CoachListResponse>, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::ViewAllCoaches)
        .validate_custom()?;

    let page = list_coaches(db, params.search.as_deref(), params.page.unwrap_or(1))
        .await
        .validate_custom()?;

    Ok(Json(CoachListResponse {
        coaches: page.items.into_iter().map(CoachData::from).collect(),
        page: page.page,
        total_count: page.total_count,
    }))
}

#[derive(Serialize, Deserialize)]
pub struct PlayerListResponse {
    pub players: Vec<PlayerData>,
    pub page: i64,
    pub total_count: i64,
}

#[get("/players?<params..>")]
pub async fn api_list_players(
    params: ListQueryParams,
    principal: Principal,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<PlayerListResponse>, Custom<Json<ValidationResponse>>> {
    let page = list_players(
        db,
        principal.scope(),
        params.search.as_deref(),
        params.page.unwrap_or(1),
    )
    .await
    .validate_custom()?;

    Ok(Json(PlayerListResponse {
        players: page.items.into_iter().map(PlayerData::from).collect(),
        page: page.page,
        total_count: page.total_count,
    }))
}

#[get("/players/<id>")]
pub async fn api_get_player(
    id: i64,
    principal: Principal,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<PlayerData>, Custom<Json<ValidationResponse>>> {
    let player = get_player(db, id).await.validate_custom()?;

    // Out-of-scope rows are indistinguishable from missing ones
    if !principal.can_view_player(&player) {
        return Err(AppError::NotFound(format!(
            "Player with id {} not found in database",
            id
        ))
        .to_validation_response());
    }

    Ok(Json(PlayerData::from(player)))
}

// ---------------------------------------------------------------------------
// Goals
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
pub struct GoalData {
    pub id: i64,
    pub name: String,
    pub player_id: i64,
    pub player_name: String,
    pub coach_id: i64,
    pub coach_name: String,
    pub area: String,
    pub timeframe: String,
    pub progress: String,
    pub progress_percentage: i64,
    pub is_overdue: bool,
    pub description: String,
    pub target_date: Option<String>,
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Goal> for GoalData {
    fn from(goal: Goal) -> Self {
        Self {
            id: goal.id,
            name: goal.name.clone(),
            player_id: goal.player_id,
            player_name: goal.player_name.clone(),
            coach_id: goal.coach_id,
            coach_name: goal.coach_name.clone(),
            area: goal.area.to_string(),
            timeframe: goal.timeframe.to_string(),
            progress: goal.progress.to_string(),
            progress_percentage: goal.progress_percentage(),
            is_overdue: goal.is_overdue(),
            description: goal.description.clone(),
            target_date: goal.target_date.map(|d| d.to_string()),
            notes: goal.notes.clone(),
            created_at: goal.created_at.to_rfc3339(),
            updated_at: goal.updated_at.to_rfc3339(),
        }
    }
}

#[derive(FromForm)]
pub struct GoalQueryParams {
    search: Option<String>,
    area: Option<String>,
    progress: Option<String>,
    timeframe: Option<String>,
    page: Option<i64>,
}

#[derive(Serialize, Deserialize)]
pub struct GoalListResponse {
    pub goals: Vec<GoalData>,
    pub page: i64,
    pub total_count: i64,
}

#[get("/goals?<params..>")]
pub async fn api_list_goals(
    params: GoalQueryParams,
    principal: Principal,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<GoalListResponse>, Custom<Json<ValidationResponse>>> {
    let area = params
        .area
        .as_deref()
        .map(GoalArea::from_str)
        .transpose()
        .validate_custom()?;
    let progress_filter = params
        .progress
        .as_deref()
        .map(Progress::from_str)
        .transpose()
        .validate_custom()?;
    let timeframe = params
        .timeframe
        .as_deref()
        .map(Timeframe::from_str)
        .transpose()
        .validate_custom()?;

    let filters = GoalFilters {
        search: params.search.as_deref(),
        area,
        progress: progress_filter,
        timeframe,
    };

    let page: Page<Goal> = list_goals(db, principal.scope(), filters, params.page.unwrap_or(1))
        .await
        .validate_custom()?;

    Ok(Json(GoalListResponse {
        goals: page.items.into_iter().map(GoalData::from).collect(),
        page: page.page,
        total_count: page.total_count,
    }))
}

#[derive(Serialize, Deserialize)]
pub struct GoalDetailResponse {
    pub goal: GoalData,
    pub completion_percentage: i64,
    pub process_goal_count: i64,
    pub completed_process_goal_count: i64,
}

#[get("/goals/<id>")]
pub async fn api_get_goal(
    id: i64,
    principal: Principal,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<GoalDetailResponse>, Custom<Json<ValidationResponse>>> {
    let goal = get_goal(db, id).await.validate_custom()?;

    if !principal.can_view_goal(&goal) {
        return Err(AppError::NotFound(format!(
            "Goal with id {} not found in database",
            id
        ))
        .to_validation_response());
    }

    let (total, completed) = process_goal_counts(db, goal.id).await.validate_custom()?;

    Ok(Json(GoalDetailResponse {
        completion_percentage: progress::completion_percentage(goal.progress, total, completed),
        process_goal_count: total,
        completed_process_goal_count: completed,
        goal: GoalData::from(goal),
    }))
}

#[derive(Deserialize, Validate, Clone)]
pub struct CreateGoalRequest {
    #[validate(length(min = 1, max = 200, message = "Goal name must be 1 to 200 characters"))]
    name: String,
    player_id: i64,
    #[serde(default)]
    area: GoalArea,
    #[serde(default)]
    timeframe: Timeframe,
    #[serde(default)]
    description: String,
    target_date: Option<NaiveDate>,
}

#[post("/goals", data = "<request>")]
pub async fn api_create_goal(
    request: Json<CreateGoalRequest>,
    principal: Principal,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    principal
        .user
        .require_permission(Permission::CreateGoals)
        .validate_custom()?;

    // The assigning coach is always the caller's own profile
    let coach = match &principal.coach {
        Some(coach) => coach,
        None => {
            return Err(
                AppError::Authorization("Coach profile not found".to_string())
                    .to_validation_response(),
            );
        }
    };

    let validated = request.validate_custom()?;

    let player = get_player(db, validated.player_id).await.validate_custom()?;
    if player.coach_id != Some(coach.id) || !player.is_active {
        return Err(AppError::Validation(
            "Player is not an active member of your roster".to_string(),
        )
        .to_validation_response());
    }

    create_goal(
        db,
        &validated.name,
        validated.player_id,
        coach.id,
        validated.area,
        validated.timeframe,
        &validated.description,
        validated.target_date,
    )
    .await
    .validate_custom()?;

    Ok(Status::Created)
}

#[derive(Deserialize, Clone)]
pub struct UpdateGoalRequest {
    name: Option<String>,
    player_id: Option<i64>,
    area: Option<GoalArea>,
    timeframe: Option<Timeframe>,
    description: Option<String>,
    target_date: Option<NaiveDate>,
    notes: Option<String>,
    progress: Option<String>,
}

#[put("/goals/<id>", data = "<request>")]
pub async fn api_update_goal(
    id: i64,
    request: Json<UpdateGoalRequest>,
    principal: Principal,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<Value>>> {
    let goal = get_goal(db, id).await.map_err(json_error)?;

    match principal.editable_fields() {
        FieldSet::Full => {
            if !principal.can_edit_goal_details(&goal) {
                return Err(Custom(
                    Status::Forbidden,
                    Json(json!({
                        "error": principal
                            .missing_profile_notice()
                            .unwrap_or("Permission denied"),
                        "user_role": principal.role_str(),
                        "goal_id": goal.id,
                    })),
                ));
            }

            // A coach may only reassign the goal within their own roster
            if let Some(player_id) = request.player_id {
                if player_id != goal.player_id {
                    let player = get_player(db, player_id).await.map_err(json_error)?;
                    if !principal.can_view_player(&player) {
                        return Err(Custom(
                            Status::BadRequest,
                            Json(json!({ "error": "Player is not part of your roster" })),
                        ));
                    }
                }
            }

            update_goal_details(
                db,
                goal.id,
                request.name.as_deref().unwrap_or(&goal.name),
                request.player_id.unwrap_or(goal.player_id),
                request.area.unwrap_or(goal.area),
                request.timeframe.unwrap_or(goal.timeframe),
                request.description.as_deref().unwrap_or(&goal.description),
                request.target_date.or(goal.target_date),
                request.notes.as_deref().unwrap_or(&goal.notes),
            )
            .await
            .map_err(json_error)?;
        }
        FieldSet::ProgressOnly => {
            if !principal.can_update_goal_progress(&goal) {
                return Err(Custom(
                    Status::Forbidden,
                    Json(json!({
                        "error": principal
                            .missing_profile_notice()
                            .unwrap_or("Permission denied"),
                        "user_role": principal.role_str(),
                        "goal_id": goal.id,
                    })),
                ));
            }

            let progress = match request.progress.as_deref() {
                Some(value) => match Progress::from_str(value) {
                    Ok(progress) => progress,
                    Err(_) => {
                        return Err(Custom(
                            Status::BadRequest,
                            Json(json!({ "error": "Invalid progress value" })),
                        ));
                    }
                },
                None => goal.progress,
            };

            update_goal_progress(db, goal.id, progress, request.notes.as_deref())
                .await
                .map_err(json_error)?;
        }
    }

    Ok(Status::Ok)
}

// ---------------------------------------------------------------------------
// Process goals
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
pub struct ProcessGoalData {
    pub id: i64,
    pub name: String,
    pub main_goal_id: i64,
    pub progress: String,
    pub progress_percentage: i64,
    pub is_overdue: bool,
    pub description: String,
    pub target_date: Option<String>,
    pub order: i64,
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ProcessGoal> for ProcessGoalData {
    fn from(pg: ProcessGoal) -> Self {
        Self {
            id: pg.id,
            name: pg.name.clone(),
            main_goal_id: pg.main_goal_id,
            progress: pg.progress.to_string(),
            progress_percentage: pg.progress_percentage(),
            is_overdue: pg.is_overdue(),
            description: pg.description.clone(),
            target_date: pg.target_date.map(|d| d.to_string()),
            order: pg.order,
            notes: pg.notes.clone(),
            created_at: pg.created_at.to_rfc3339(),
            updated_at: pg.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct ProcessGoalListResponse {
    pub goal_id: i64,
    pub process_goals: Vec<ProcessGoalData>,
    pub page: i64,
    pub total_count: i64,
}

#[get("/goals/<goal_id>/process-goals?<page>")]
pub async fn api_list_process_goals(
    goal_id: i64,
    page: Option<i64>,
    principal: Principal,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ProcessGoalListResponse>, Custom<Json<ValidationResponse>>> {
    let goal = get_goal(db, goal_id).await.validate_custom()?;

    // Out-of-scope callers get an empty listing rather than an error
    if !principal.can_view_goal(&goal) {
        return Ok(Json(ProcessGoalListResponse {
            goal_id,
            process_goals: Vec::new(),
            page: page.unwrap_or(1).max(1),
            total_count: 0,
        }));
    }

    let listing = list_process_goals(db, goal_id, page.unwrap_or(1))
        .await
        .validate_custom()?;

    Ok(Json(ProcessGoalListResponse {
        goal_id,
        process_goals: listing.items.into_iter().map(ProcessGoalData::from).collect(),
        page: listing.page,
        total_count: listing.total_count,
    }))
}

#[derive(Deserialize, Validate, Clone)]
pub struct CreateProcessGoalRequest {
    #[validate(length(min = 1, max = 200, message = "Process goal name must be 1 to 200 characters"))]
    name: String,
    #[serde(default)]
    description: String,
    target_date: Option<NaiveDate>,
    #[serde(default)]
    order: i64,
    progress: Option<String>,
}

#[post("/goals/<goal_id>/process-goals", data = "<request>")]
pub async fn api_create_process_goal(
    goal_id: i64,
    request: Json<CreateProcessGoalRequest>,
    principal: Principal,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<Value>>> {
    if principal
        .user
        .require_permission(Permission::CreateGoals)
        .is_err()
    {
        return Err(Custom(
            Status::Forbidden,
            Json(json!({
                "error": "Permission denied",
                "user_role": principal.role_str(),
            })),
        ));
    }

    let coach = match &principal.coach {
        Some(coach) => coach,
        None => {
            return Err(Custom(
                Status::Forbidden,
                Json(json!({
                    "error": "Coach profile not found",
                    "user_role": principal.role_str(),
                })),
            ));
        }
    };

    let goal = get_goal(db, goal_id).await.map_err(json_error)?;

    if goal.coach_id != coach.id {
        return Err(Custom(
            Status::Forbidden,
            Json(json!({
                "error": "You can only add process goals to your own goals",
                "user_role": principal.role_str(),
            })),
        ));
    }

    let validated = match request.validate_custom() {
        Ok(validated) => validated,
        Err(_) => {
            return Err(Custom(
                Status::BadRequest,
                Json(json!({ "error": "Invalid process goal" })),
            ));
        }
    };

    let progress = match validated.progress.as_deref() {
        Some(value) => match Progress::from_str(value) {
            Ok(progress) => progress,
            Err(_) => {
                return Err(Custom(
                    Status::BadRequest,
                    Json(json!({ "error": "Invalid progress value" })),
                ));
            }
        },
        None => Progress::NotStarted,
    };

    create_process_goal(
        db,
        goal.id,
        &validated.name,
        &validated.description,
        validated.target_date,
        validated.order,
        progress,
    )
    .await
    .map_err(json_error)?;

    Ok(Status::Created)
}

#[derive(Deserialize, Clone)]
pub struct UpdateProcessGoalRequest {
    name: Option<String>,
    description: Option<String>,
    target_date: Option<NaiveDate>,
    order: Option<i64>,
    notes: Option<String>,
    progress: Option<String>,
}

#[put("/process-goals/<id>", data = "<request>")]
pub async fn api_update_process_goal(
    id: i64,
    request: Json<UpdateProcessGoalRequest>,
    principal: Principal,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<Value>>> {
    let process_goal = get_process_goal(db, id).await.map_err(json_error)?;
    let main_goal = get_goal(db, process_goal.main_goal_id)
        .await
        .map_err(json_error)?;

    match principal.editable_fields() {
        FieldSet::Full => {
            if !principal.can_edit_goal_details(&main_goal) {
                return Err(Custom(
                    Status::Forbidden,
                    Json(json!({
                        "error": principal
                            .missing_profile_notice()
                            .unwrap_or("Permission denied"),
                        "user_role": principal.role_str(),
                        "process_goal_id": process_goal.id,
                    })),
                ));
            }

            update_process_goal_details(
                db,
                process_goal.id,
                request.name.as_deref().unwrap_or(&process_goal.name),
                request
                    .description
                    .as_deref()
                    .unwrap_or(&process_goal.description),
                request.target_date.or(process_goal.target_date),
                request.order.unwrap_or(process_goal.order),
                request.notes.as_deref().unwrap_or(&process_goal.notes),
            )
            .await
            .map_err(json_error)?;
        }
        FieldSet::ProgressOnly => {
            if !principal.can_update_goal_progress(&main_goal) {
                return Err(Custom(
                    Status::Forbidden,
                    Json(json!({
                        "error": principal
                            .missing_profile_notice()
                            .unwrap_or("Permission denied"),
                        "user_role": principal.role_str(),
                        "process_goal_id": process_goal.id,
                    })),
                ));
            }

            let progress = match request.progress.as_deref() {
                Some(value) => match Progress::from_str(value) {
                    Ok(progress) => progress,
                    Err(_) => {
                        return Err(Custom(
                            Status::BadRequest,
                            Json(json!({ "error": "Invalid progress value" })),
                        ));
                    }
                },
                None => process_goal.progress,
            };

            update_process_goal_progress(db, process_goal.id, progress, request.notes.as_deref())
                .await
                .map_err(json_error)?;

            maybe_auto_complete_goal(db, main_goal.id)
                .await
                .map_err(json_error)?;
        }
    }

    Ok(Status::Ok)
}

// ---------------------------------------------------------------------------
// AJAX progress updates
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ProgressUpdateRequest {
    progress: Option<String>,
    notes: Option<String>,
}

#[post("/goals/<id>/progress", data = "<request>")]
pub async fn goal_progress_update(
    id: i64,
    _ajax: AjaxRequest,
    request: Json<ProgressUpdateRequest>,
    principal: Principal,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Value>, Custom<Json<Value>>> {
    let goal = get_goal(db, id).await.map_err(json_error)?;

    if !principal.can_update_goal_progress(&goal) {
        return Err(Custom(
            Status::Forbidden,
            Json(json!({
                "error": principal
                    .missing_profile_notice()
                    .unwrap_or("Permission denied"),
                "user_role": principal.role_str(),
                "goal_player_id": goal.player_id,
                "user_profile_id": principal.player.as_ref().map(|p| p.id),
            })),
        ));
    }

    let progress = match request.progress.as_deref().map(Progress::from_str) {
        Some(Ok(progress)) => progress,
        _ => {
            return Err(Custom(
                Status::BadRequest,
                Json(json!({ "error": "Invalid progress value" })),
            ));
        }
    };

    update_goal_progress(db, goal.id, progress, request.notes.as_deref())
        .await
        .map_err(json_error)?;

    Ok(Json(json!({
        "success": true,
        "progress": progress.as_str(),
        "progress_percentage": progress.percentage(),
        "is_overdue": progress::is_overdue(goal.target_date, progress),
    })))
}

#[post("/process-goals/<id>/progress", data = "<request>")]
pub async fn process_goal_progress_update(
    id: i64,
    _ajax: AjaxRequest,
    request: Json<ProgressUpdateRequest>,
    principal: Principal,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Value>, Custom<Json<Value>>> {
    let process_goal = get_process_goal(db, id).await.map_err(json_error)?;
    let main_goal = get_goal(db, process_goal.main_goal_id)
        .await
        .map_err(json_error)?;

    if !principal.can_update_goal_progress(&main_goal) {
        return Err(Custom(
            Status::Forbidden,
            Json(json!({
                "error": principal
                    .missing_profile_notice()
                    .unwrap_or("Permission denied"),
                "user_role": principal.role_str(),
            })),
        ));
    }

    let progress = match request.progress.as_deref().map(Progress::from_str) {
        Some(Ok(progress)) => progress,
        _ => {
            return Err(Custom(
                Status::BadRequest,
                Json(json!({ "error": "Invalid progress value" })),
            ));
        }
    };

    update_process_goal_progress(db, process_goal.id, progress, request.notes.as_deref())
        .await
        .map_err(json_error)?;

    let auto_completed = maybe_auto_complete_goal(db, main_goal.id)
        .await
        .map_err(json_error)?;

    // A previously completed parent stays completed even when a process
    // goal regresses; the promotion is one-way.
    let main_goal_completed = auto_completed || main_goal.progress == Progress::Completed;

    Ok(Json(json!({
        "success": true,
        "progress": progress.as_str(),
        "progress_percentage": progress.percentage(),
        "is_overdue": progress::is_overdue(process_goal.target_date, progress),
        "main_goal_completed": main_goal_completed,
    })))
}

// ---------------------------------------------------------------------------
// Registration (admin)
// ---------------------------------------------------------------------------

#[derive(Deserialize, Validate, Clone)]
pub struct RegistrationRequest {
    #[validate(length(min = 3, max = 30, message = "Username must be 3 to 30 characters"))]
    username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: String,
    role: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    specialization: String,
    #[serde(default)]
    experience_years: i64,
    #[serde(default)]
    bio: String,
    coach_id: Option<i64>,
    #[serde(default)]
    position: String,
    jersey_number: Option<i64>,
    height: Option<f64>,
    weight: Option<f64>,
}

#[post("/register", data = "<registration>")]
pub async fn api_register_user(
    registration: Json<RegistrationRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::RegisterUsers)
        .validate_custom()?;

    let validated = registration.validate_custom()?;

    let role = Role::from_str(&validated.role)
        .map_err(|err| AppError::Validation(err.to_string()))
        .validate_custom()?;

    let existing_user = find_user_by_username(db, &validated.username)
        .await
        .validate_custom()?;

    if existing_user.is_some() {
        return Err(Custom(
            Status::Conflict,
            Json(ValidationResponse::with_error(
                "username",
                "Username already exists",
            )),
        ));
    }

    // Checked up front so a rejected jersey number leaves no orphan user row
    if role == Role::Player {
        if let Some(jersey) = validated.jersey_number {
            if jersey_number_taken(db, jersey).await.validate_custom()? {
                return Err(AppError::Validation(format!(
                    "Jersey number {} is already taken",
                    jersey
                ))
                .to_validation_response());
            }
        }
    }

    let user_id = create_user(
        db,
        &validated.username,
        &validated.password,
        role.clone(),
        &validated.email,
        &validated.first_name,
        &validated.last_name,
    )
    .await
    .validate_custom()?;

    match role {
        Role::Coach => {
            create_coach(
                db,
                user_id,
                &validated.specialization,
                validated.experience_years,
                &validated.bio,
            )
            .await
            .validate_custom()?;
        }
        Role::Player => {
            create_player(
                db,
                user_id,
                validated.coach_id,
                &validated.position,
                validated.jersey_number,
                validated.height,
                validated.weight,
            )
            .await
            .validate_custom()?;
        }
        Role::Admin => {}
    }

    Ok(Status::Created)
}
