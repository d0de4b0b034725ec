use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use sqlx::SqlitePool;

use crate::auth::{Role, User};
use crate::db::{get_coach_profile, get_player_profile};
use crate::models::{Coach, Goal, Player};

/// An authenticated caller together with its role-specific profile row, if
/// one exists. The profile lookup happens once, here, so the handlers only
/// deal with plain options instead of catching lookup failures everywhere.
pub struct Principal {
    pub user: User,
    pub coach: Option<Coach>,
    pub player: Option<Player>,
}

/// Visibility scope derived from role and profile linkage. `Nothing` is the
/// fail-closed case for a non-admin user whose profile row is missing: every
/// listing scoped by it comes back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Coach(i64),
    Player(i64),
    Nothing,
}

/// Which fields of a goal or process goal an update may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSet {
    Full,
    ProgressOnly,
}

impl Principal {
    pub fn scope(&self) -> Scope {
        match self.user.role {
            Role::Admin => Scope::All,
            Role::Coach => match &self.coach {
                Some(coach) => Scope::Coach(coach.id),
                None => Scope::Nothing,
            },
            Role::Player => match &self.player {
                Some(player) => Scope::Player(player.id),
                None => Scope::Nothing,
            },
        }
    }

    /// Full-field edits: admin anywhere, coach on their own assigned goals.
    pub fn can_edit_goal_details(&self, goal: &Goal) -> bool {
        match self.user.role {
            Role::Admin => true,
            Role::Coach => self
                .coach
                .as_ref()
                .is_some_and(|coach| coach.id == goal.coach_id),
            Role::Player => false,
        }
    }

    /// Progress/notes updates: admin, the assigning coach, or the owning
    /// player. A missing profile denies rather than erroring.
    pub fn can_update_goal_progress(&self, goal: &Goal) -> bool {
        match self.user.role {
            Role::Admin => true,
            Role::Coach => self
                .coach
                .as_ref()
                .is_some_and(|coach| coach.id == goal.coach_id),
            Role::Player => self
                .player
                .as_ref()
                .is_some_and(|player| player.id == goal.player_id),
        }
    }

    pub fn can_view_goal(&self, goal: &Goal) -> bool {
        match self.scope() {
            Scope::All => true,
            Scope::Coach(coach_id) => goal.coach_id == coach_id,
            Scope::Player(player_id) => goal.player_id == player_id,
            Scope::Nothing => false,
        }
    }

    /// The field-set selector: coaches and admins edit the full business
    /// fields, players only progress and notes.
    pub fn editable_fields(&self) -> FieldSet {
        match self.user.role {
            Role::Admin | Role::Coach => FieldSet::Full,
            Role::Player => FieldSet::ProgressOnly,
        }
    }

    /// The diagnostic message for a denial caused by a missing profile row,
    /// if that is what happened.
    pub fn missing_profile_notice(&self) -> Option<&'static str> {
        match self.user.role {
            Role::Coach if self.coach.is_none() => Some("Coach profile not found"),
            Role::Player if self.player.is_none() => Some("Player profile not found"),
            _ => None,
        }
    }

    pub fn can_view_player(&self, player: &Player) -> bool {
        match self.scope() {
            Scope::All => true,
            Scope::Coach(coach_id) => player.coach_id == Some(coach_id),
            Scope::Player(player_id) => player.id == player_id,
            Scope::Nothing => false,
        }
    }

    pub fn role_str(&self) -> &str {
        self.user.role.as_str()
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Principal {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let user = match request.guard::<User>().await {
            Outcome::Success(user) => user,
            Outcome::Forward(status) => return Outcome::Forward(status),
            Outcome::Error(err) => return Outcome::Error(err),
        };

        let db = match request.rocket().state::<SqlitePool>() {
            Some(pool) => pool,
            _ => {
                tracing::error!("Database pool not found in managed state");
                return Outcome::Error((Status::InternalServerError, ()));
            }
        };

        let (coach, player) = match user.role {
            Role::Coach => match get_coach_profile(db, user.id).await {
                Ok(coach) => (coach, None),
                Err(err) => {
                    tracing::error!(user_id = %user.id, error = ?err, "Failed to look up coach profile");
                    return Outcome::Error((Status::InternalServerError, ()));
                }
            },
            Role::Player => match get_player_profile(db, user.id).await {
                Ok(player) => (None, player),
                Err(err) => {
                    tracing::error!(user_id = %user.id, error = ?err, "Failed to look up player profile");
                    return Outcome::Error((Status::InternalServerError, ()));
                }
            },
            Role::Admin => (None, None),
        };

        Outcome::Success(Principal {
            user,
            coach,
            player,
        })
    }
}
