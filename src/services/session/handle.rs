use axum::http::HeaderValue;
use cookie::{Cookie, SameSite};
use uuid::Uuid;

use crate::services::session::store::{Session, SessionResult, SessionStore};

/// Name and attributes of the cookie that carries the session id.
///
/// The same name is used as the query parameter for cookie-less clients.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    pub name: String,
}

impl SessionCookie {
    pub const DEFAULT_NAME: &'static str = "CASCLIENTSESSION";

    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn header_value(&self, id: &str, secure: bool) -> Option<HeaderValue> {
        let cookie = Cookie::build((self.name.clone(), id.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(secure)
            .build();

        HeaderValue::from_str(&cookie.to_string()).ok()
    }
}

impl Default for SessionCookie {
    fn default() -> Self {
        Self::new(Self::DEFAULT_NAME)
    }
}

/// The session as seen by one request.
///
/// Mirrors servlet semantics: `get` never creates, `get_or_create` does.
/// Mutations are tracked and written back once by `commit`.
#[derive(Debug, Default)]
pub struct RequestSession {
    id: Option<String>,
    data: Option<Session>,
    created: bool,
    dirty: bool,
}

impl RequestSession {
    pub fn none() -> Self {
        Self::default()
    }

    /// Resolve `id` against the store.
    ///
    /// Unknown ids and backend failures both yield "no session"; the failure is
    /// logged.
    pub async fn open(store: &dyn SessionStore, id: Option<&str>) -> Self {
        let Some(id) = id else {
            return Self::none();
        };

        match store.load(id).await {
            Ok(Some(data)) => Self {
                id: Some(id.to_string()),
                data: Some(data),
                created: false,
                dirty: false,
            },
            Ok(None) => {
                tracing::debug!(session_id = %id, "session not found or expired");
                Self::none()
            }
            Err(err) => {
                tracing::warn!(
                    error = ?err,
                    backend = store.backend_name(),
                    "session load failed; continuing without session"
                );
                Self::none()
            }
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn get(&self) -> Option<&Session> {
        self.data.as_ref()
    }

    /// Mutable access to an existing session; marks it for write-back.
    pub fn get_mut(&mut self) -> Option<&mut Session> {
        let data = self.data.as_mut()?;
        self.dirty = true;
        Some(data)
    }

    pub fn get_or_create(&mut self) -> &mut Session {
        if self.data.is_none() {
            self.id = Some(Uuid::new_v4().to_string());
            self.created = true;
        }
        self.dirty = true;
        self.data.get_or_insert_with(Session::new)
    }

    pub fn is_new(&self) -> bool {
        self.created
    }

    pub async fn commit(&self, store: &dyn SessionStore) -> SessionResult<()> {
        if !self.dirty {
            return Ok(());
        }
        match (&self.id, &self.data) {
            (Some(id), Some(data)) => store.save(id, data).await,
            _ => Ok(()),
        }
    }

    /// `Set-Cookie` value announcing a session created during this request.
    pub fn set_cookie(&self, cookie: &SessionCookie, secure: bool) -> Option<HeaderValue> {
        if !self.created {
            return None;
        }
        cookie.header_value(self.id.as_deref()?, secure)
    }
}
