use chrono::{NaiveDateTime, Utc};
use rand::RngCore;
use uuid::Uuid;

pub struct UserSession {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUserSession {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub token: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub expires_at: Option<NaiveDateTime>,
}

impl From<DbUserSession> for UserSession {
    fn from(session: DbUserSession) -> Self {
        Self {
            id: session.id.unwrap_or_default(),
            user_id: session.user_id.unwrap_or_default(),
            token: session.token.unwrap_or_default(),
            created_at: session.created_at.unwrap_or_else(|| Utc::now().naive_utc()),
            expires_at: session.expires_at.unwrap_or_else(|| Utc::now().naive_utc()),
        }
    }
}

impl UserSession {
    /// Opaque session token: a v4 UUID plus 16 random bytes, hex encoded.
    pub fn generate_token() -> String {
        let mut entropy = [0u8; 16];
        rand::rng().fill_bytes(&mut entropy);

        let suffix: String = entropy.iter().map(|b| format!("{:02x}", b)).collect();
        format!("{}{}", Uuid::new_v4().simple(), suffix)
    }

    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now().naive_utc()
    }
}
