//! Caller identification and permission checks.
//!
//! Callers authenticate with a bearer API key. Each key maps to a set of
//! [`Permission`]s; handlers check the permission they need explicitly
//! through the [`Caller`] the middleware attaches to the request.

use std::collections::{HashMap, HashSet};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};

/// What a caller may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewTarget,
    ChangeTarget,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewTarget => "view_target",
            Self::ChangeTarget => "change_target",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "view_target" => Some(Self::ViewTarget),
            "change_target" => Some(Self::ChangeTarget),
            _ => None,
        }
    }
}

/// The identity behind a request, reduced to its permissions.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    permissions: HashSet<Permission>,
}

impl Caller {
    pub fn new(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            permissions: permissions.into_iter().collect(),
        }
    }

    /// A caller holding every permission (local mode).
    pub fn unrestricted() -> Self {
        Self::new([Permission::ViewTarget, Permission::ChangeTarget])
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn require(&self, permission: Permission) -> Result<(), (StatusCode, String)> {
        if self.has(permission) {
            Ok(())
        } else {
            tracing::warn!("Caller lacks permission {}", permission.as_str());
            Err((
                StatusCode::FORBIDDEN,
                format!("Missing permission: {}", permission.as_str()),
            ))
        }
    }
}

/// API keys and the permissions they grant.
#[derive(Clone, Debug, Default)]
pub struct AccessConfig {
    /// `None` means local mode: no key required, every permission granted.
    keys: Option<HashMap<String, HashSet<Permission>>>,
}

impl AccessConfig {
    /// Load keys from TNS_REPORTER_API_KEYS, formatted as
    /// `key=view_target,change_target;other=view_target`.
    pub fn from_env() -> Self {
        match std::env::var("TNS_REPORTER_API_KEYS") {
            Ok(raw) if !raw.trim().is_empty() => Self::parse(&raw),
            _ => Self::disabled(),
        }
    }

    pub fn parse(raw: &str) -> Self {
        let mut keys = HashMap::new();
        for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, perms) = entry.split_once('=').unwrap_or((entry, ""));
            let mut granted = HashSet::new();
            for perm in perms.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                match Permission::from_str(perm) {
                    Some(p) => {
                        granted.insert(p);
                    }
                    None => tracing::warn!("Ignoring unknown permission '{}'", perm),
                }
            }
            keys.insert(key.trim().to_string(), granted);
        }
        Self { keys: Some(keys) }
    }

    /// No authentication (for local development/testing).
    pub fn disabled() -> Self {
        Self { keys: None }
    }

    pub fn with_key(
        mut self,
        key: impl Into<String>,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        self.keys
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), permissions.into_iter().collect());
        self
    }

    /// Resolve the caller for a bearer token, if the token is acceptable.
    pub fn caller(&self, token: Option<&str>) -> Option<Caller> {
        match &self.keys {
            None => Some(Caller::unrestricted()),
            Some(keys) => {
                let granted = keys.get(token?)?;
                Some(Caller::new(granted.iter().copied()))
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.keys.is_some()
    }
}

/// Authenticate the request and attach its [`Caller`].
pub async fn auth_middleware(
    State(config): State<AccessConfig>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    if config.is_enabled() && token.is_none() {
        tracing::warn!("Missing or malformed Authorization header");
        return Err(StatusCode::UNAUTHORIZED);
    }

    match config.caller(token) {
        Some(caller) => {
            request.extensions_mut().insert(caller);
            Ok(next.run(request).await)
        }
        None => {
            tracing::warn!("Invalid API key provided");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
