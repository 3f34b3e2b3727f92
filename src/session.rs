use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Role, TeamPolicy};
use crate::errors::AppError;

/// An authenticated caller: the GitHub credential, the identity it resolved
/// to, and the policy snapshot taken at login.
///
/// Constructed on login, destroyed on logout or on the first 401 from
/// GitHub; nothing else mutates it.
#[derive(Clone)]
pub struct Session {
    pub id: Uuid,
    pub credential: String,
    pub login: String,
    pub role: Role,
    pub policy: TeamPolicy,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(credential: String, login: String, role: Role, policy: TeamPolicy) -> Self {
        Self {
            id: Uuid::new_v4(),
            credential,
            login,
            role,
            policy,
            created_at: Utc::now(),
        }
    }
}

// Manual Debug: the credential must never end up in a log line.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("credential", &"<redacted>")
            .field("login", &self.login)
            .field("role", &self.role)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Storage seam for sessions. The portal ships the in-memory backend;
/// anything else (shared cache, database) can slot in behind the trait.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn insert(&self, session: Session);
    async fn get(&self, id: Uuid) -> Option<Session>;
    /// Returns whether a session was actually removed. Removing an unknown
    /// id is not an error; logout must be idempotent.
    async fn remove(&self, id: Uuid) -> bool;
}

#[derive(Debug, Default)]
pub struct MemorySessions {
    inner: RwLock<HashMap<Uuid, Session>>,
}

#[async_trait]
impl SessionBackend for MemorySessions {
    async fn insert(&self, session: Session) {
        self.inner.write().await.insert(session.id, session);
    }

    async fn get(&self, id: Uuid) -> Option<Session> {
        self.inner.read().await.get(&id).cloned()
    }

    async fn remove(&self, id: Uuid) -> bool {
        self.inner.write().await.remove(&id).is_some()
    }
}

/// Pending OAuth CSRF states: opaque, single-use, short-lived.
#[derive(Debug, Default)]
pub struct StateRegistry {
    inner: RwLock<HashMap<Uuid, DateTime<Utc>>>,
}

const STATE_TTL_MINUTES: i64 = 10;

impl StateRegistry {
    pub async fn issue(&self) -> Uuid {
        let state = Uuid::new_v4();
        self.inner.write().await.insert(state, Utc::now());
        state
    }

    /// Consumes a state value; valid only once and only while fresh.
    pub async fn consume(&self, raw: &str) -> bool {
        let Ok(state) = raw.parse::<Uuid>() else {
            return false;
        };
        match self.inner.write().await.remove(&state) {
            Some(issued_at) => Utc::now() - issued_at <= Duration::minutes(STATE_TTL_MINUTES),
            None => false,
        }
    }
}

/// Extracts the session for the bearer token on the request.
#[derive(Debug, Clone)]
pub struct SessionUser(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::unauthorized("Authorization header missing"))?;

        let id = token
            .parse::<Uuid>()
            .map_err(|_| AppError::unauthorized("malformed session token"))?;

        let session = state
            .sessions
            .get(id)
            .await
            .ok_or_else(|| AppError::unauthorized("session expired or logged out"))?;

        Ok(SessionUser(session))
    }
}
