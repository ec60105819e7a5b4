//! Flat-file user directory backing the dashboard login
//!
//! Passwords are stored and compared as plain text; this directory only gates
//! the dashboard UI and is not a security boundary.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Marker in `created` for built-in accounts, which cannot be removed
pub const SYSTEM_CREATED: &str = "SYSTEM";

const MIN_ID_LEN: usize = 3;

const MIN_PASSWORD_LEN: usize = 6;

const DEFAULT_ROLE: &str = "guest";

const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pw: Option<String>,
    pub role: String,
    #[serde(default)]
    pub created: String,
}

impl User {
    fn matches_id(&self, id: &str) -> bool {
        self.id.eq_ignore_ascii_case(id)
    }

    fn matches(&self, id: &str, pw: &str) -> bool {
        self.matches_id(id) && self.pw.as_deref().unwrap_or("") == pw
    }

    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            role: self.role.clone(),
            created: self.created.clone(),
        }
    }
}

/// User as exposed over the API, without the password
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub role: String,
    pub created: String,
}

/// Account requested by an admin
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub id: String,
    pub pw: String,
    pub role: Option<String>,
}

/// Errors for user management operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserError {
    /// Acting user is unknown, has a wrong password or is not an admin
    AdminRequired,

    /// Requested id is too short
    InvalidId,

    /// Requested password is too short
    WeakPassword,

    /// Requested id already exists (case-insensitive)
    AlreadyExists,

    /// Built-in account
    Protected,

    /// An admin tried to remove its own account
    SelfRemoval,
}

impl fmt::Display for UserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserError::AdminRequired => write!(f, "Admin required"),
            UserError::InvalidId => {
                write!(f, "Username required (≥{MIN_ID_LEN} chars)")
            }
            UserError::WeakPassword => {
                write!(f, "Password must be ≥{MIN_PASSWORD_LEN} characters")
            }
            UserError::AlreadyExists => write!(f, "Username already exists"),
            UserError::Protected => write!(f, "Protected user"),
            UserError::SelfRemoval => write!(f, "Cannot remove your own account"),
        }
    }
}

impl std::error::Error for UserError {}

/// Seed accounts for a fresh installation
pub fn default_users() -> Vec<User> {
    vec![
        User {
            id: "admin".into(),
            pw: Some("groundstation".into()),
            role: ADMIN_ROLE.into(),
            created: SYSTEM_CREATED.into(),
        },
        User {
            id: "guest".into(),
            pw: Some("guest123".into()),
            role: DEFAULT_ROLE.into(),
            created: SYSTEM_CREATED.into(),
        },
    ]
}

/// Shared, file-backed user list
#[derive(Debug, Clone)]
pub struct UserDirectory {
    users: Arc<RwLock<Vec<User>>>,
    path: PathBuf,
}

impl UserDirectory {
    /// In-memory store that persists to `path` on change
    pub fn new(path: impl Into<PathBuf>, users: Vec<User>) -> Self {
        Self {
            users: Arc::new(RwLock::new(users)),
            path: path.into(),
        }
    }

    /// Load from `path`; a missing, invalid or empty file yields the default
    /// accounts. A missing file is created with them.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let users = match read_users(&path).await {
            Some(users) => users,
            None => {
                info!("using default users");
                default_users()
            }
        };

        let store = Self::new(path, users);
        if !store.path.exists() {
            let users = store.users.read().await;
            store.persist(&users).await;
        }
        store
    }

    pub async fn public_users(&self) -> Vec<PublicUser> {
        self.users.read().await.iter().map(User::public).collect()
    }

    /// Check credentials: id case-insensitive, password exact.
    pub async fn authenticate(&self, id: &str, pw: &str) -> Option<PublicUser> {
        let id = id.trim();
        self.users
            .read()
            .await
            .iter()
            .find(|user| user.matches(id, pw))
            .map(User::public)
    }

    pub async fn add_user(
        &self,
        admin_id: &str,
        admin_pw: &str,
        request: NewUser,
    ) -> Result<PublicUser, UserError> {
        let id = request.id.trim();
        let role = request
            .role
            .as_deref()
            .map(str::trim)
            .filter(|role| !role.is_empty())
            .unwrap_or(DEFAULT_ROLE);

        let user = {
            let mut users = self.users.write().await;
            require_admin(&users, admin_id, admin_pw)?;

            if id.chars().count() < MIN_ID_LEN {
                return Err(UserError::InvalidId);
            }
            if request.pw.chars().count() < MIN_PASSWORD_LEN {
                return Err(UserError::WeakPassword);
            }
            if users.iter().any(|user| user.matches_id(id)) {
                return Err(UserError::AlreadyExists);
            }

            let user = User {
                id: id.to_string(),
                pw: Some(request.pw),
                role: role.to_string(),
                created: Utc::now().format("%Y-%m-%d").to_string(),
            };
            users.push(user.clone());
            // saved under the lock so concurrent changes reach the file in order
            self.persist(&users).await;
            user
        };

        debug!("added user {} ({})", user.id, user.role);
        Ok(user.public())
    }

    pub async fn remove_user(
        &self,
        admin_id: &str,
        admin_pw: &str,
        target_id: &str,
    ) -> Result<(), UserError> {
        let admin_id = admin_id.trim();
        let target_id = target_id.trim();

        {
            let mut users = self.users.write().await;
            require_admin(&users, admin_id, admin_pw)?;

            if users
                .iter()
                .any(|user| user.matches_id(target_id) && user.created == SYSTEM_CREATED)
            {
                return Err(UserError::Protected);
            }
            if target_id.eq_ignore_ascii_case(admin_id) {
                return Err(UserError::SelfRemoval);
            }

            users.retain(|user| !user.matches_id(target_id));
            self.persist(&users).await;
        }

        debug!("removed user {target_id}");
        Ok(())
    }

    /// Write the current list; failures are logged and the in-memory state kept.
    async fn persist(&self, users: &[User]) {
        let json = match serde_json::to_string_pretty(users) {
            Ok(json) => json,
            Err(e) => {
                error!("failed to encode users: {e}");
                return;
            }
        };
        if let Err(e) = tokio::fs::write(&self.path, json).await {
            error!("failed to save users to {}: {e}", self.path.display());
        }
    }
}

fn require_admin(users: &[User], admin_id: &str, admin_pw: &str) -> Result<(), UserError> {
    let admin_id = admin_id.trim();
    match users.iter().find(|user| user.matches(admin_id, admin_pw)) {
        Some(user) if user.role == ADMIN_ROLE => Ok(()),
        _ => Err(UserError::AdminRequired),
    }
}

async fn read_users(path: &Path) -> Option<Vec<User>> {
    let content = tokio::fs::read_to_string(path).await.ok()?;
    match serde_json::from_str::<Vec<User>>(&content) {
        Ok(users) if !users.is_empty() => Some(users),
        Ok(_) => None,
        Err(e) => {
            warn!("ignoring invalid users file {}: {e}", path.display());
            None
        }
    }
}
