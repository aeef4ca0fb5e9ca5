//! Persisted session keys and the storage they live in.
//!
//! Storage is the source of truth for the credential and the branch
//! selection: the HTTP adapter re-reads it on every request.
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use api_types::{BranchId, auth::Role, user::User};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The signed-in user as cached on the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: i64,
    pub name: String,
    pub role: Role,
    /// Resolved once from `role` at sign-in.
    pub can_override_branch: bool,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            role: user.role.clone(),
            can_override_branch: user.role.is_privileged(),
        }
    }
}

/// Everything the client keeps across restarts.
///
/// Absent keys mean "no session" and "no override".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedSession {
    pub token: Option<String>,
    pub user: Option<CurrentUser>,
    pub own_branch_id: Option<BranchId>,
    pub override_branch_id: Option<BranchId>,
}

impl PersistedSession {
    pub fn signed_in(token: String, user: &User) -> Self {
        Self {
            token: Some(token),
            user: Some(CurrentUser::from(user)),
            own_branch_id: user.branch_id,
            override_branch_id: None,
        }
    }

    pub fn can_override_branch(&self) -> bool {
        self.user
            .as_ref()
            .is_some_and(|user| user.can_override_branch)
    }
}

/// Key/value storage for [`PersistedSession`].
pub trait SessionStorage: fmt::Debug + Send + Sync {
    fn load(&self) -> Result<PersistedSession>;

    fn save(&self, session: &PersistedSession) -> Result<()>;

    fn clear(&self) -> Result<()>;

    /// Loads, applies `f` and writes the result back.
    fn update(&self, f: &mut dyn FnMut(&mut PersistedSession)) -> Result<PersistedSession> {
        let mut session = self.load()?;
        f(&mut session);
        self.save(&session)?;
        Ok(session)
    }
}

/// JSON file storage.
#[derive(Debug)]
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for FileSessionStorage {
    fn load(&self) -> Result<PersistedSession> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PersistedSession::default());
            }
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_str(&content) {
            Ok(session) => Ok(session),
            Err(err) => {
                tracing::warn!(
                    "ignoring unreadable session file {}: {err}",
                    self.path.display()
                );
                Ok(PersistedSession::default())
            }
        }
    }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(session)
            .map_err(|err| std::io::Error::other(err.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        if fs::rename(&tmp, &self.path).is_err() {
            fs::copy(&tmp, &self.path)?;
            if let Err(err) = fs::remove_file(&tmp) {
                tracing::warn!("failed to remove {}: {err}", tmp.display());
            }
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-process storage, one per test or embedding.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    inner: Mutex<PersistedSession>,
}

impl MemorySessionStorage {
    pub fn new(session: PersistedSession) -> Self {
        Self {
            inner: Mutex::new(session),
        }
    }

    /// Current content, for assertions.
    pub fn snapshot(&self) -> PersistedSession {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self) -> Result<PersistedSession> {
        Ok(self.snapshot())
    }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = session.clone();
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.save(&PersistedSession::default())
    }
}

/// Why the session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignOutReason {
    /// Nothing was persisted at start-up.
    NoSession,
    Logout,
    /// The server answered 401; views must go back to the login entry point.
    Unauthorized,
}

/// Authentication state broadcast to consumers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthStatus {
    /// Start-up, before the persisted token has been re-validated.
    Unknown,
    SignedIn,
    SignedOut(SignOutReason),
}

impl AuthStatus {
    pub fn requires_login(self) -> bool {
        matches!(self, Self::SignedOut(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> User {
        User {
            id: 1,
            name: "Ana".to_string(),
            email: None,
            role: Role::parse("ADMIN"),
            branch_id: Some(BranchId(1)),
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join("esponja-session-tests")
            .join(format!("{name}-{}.json", std::process::id()))
    }

    #[test]
    fn capability_is_resolved_from_role_at_sign_in() {
        let session = PersistedSession::signed_in("t".to_string(), &admin());
        assert!(session.can_override_branch());
        assert_eq!(session.own_branch_id, Some(BranchId(1)));
        assert_eq!(session.override_branch_id, None);
    }

    #[test]
    fn missing_file_loads_as_no_session() {
        let storage = FileSessionStorage::new(temp_path("missing"));
        assert_eq!(storage.load().unwrap(), PersistedSession::default());
    }

    #[test]
    fn file_storage_survives_reload_and_clear() {
        let path = temp_path("reload");
        let storage = FileSessionStorage::new(&path);
        let mut session = PersistedSession::signed_in("t".to_string(), &admin());
        session.override_branch_id = Some(BranchId(4));
        storage.save(&session).unwrap();

        let reopened = FileSessionStorage::new(&path);
        assert_eq!(reopened.load().unwrap(), session);

        reopened.clear().unwrap();
        assert_eq!(reopened.load().unwrap(), PersistedSession::default());
        reopened.clear().unwrap();
    }

    #[test]
    fn save_leaves_no_temporary_file() {
        let path = temp_path("overwrite");
        let storage = FileSessionStorage::new(&path);
        storage.save(&PersistedSession::default()).unwrap();
        let session = PersistedSession::signed_in("t".to_string(), &admin());
        storage.save(&session).unwrap();

        assert!(!path.with_extension("tmp").exists());
        assert_eq!(storage.load().unwrap(), session);
        storage.clear().unwrap();
    }

    #[test]
    fn corrupt_file_is_treated_as_absent() {
        let path = temp_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();
        let storage = FileSessionStorage::new(&path);
        assert_eq!(storage.load().unwrap(), PersistedSession::default());
        storage.clear().unwrap();
    }

    #[test]
    fn partial_keys_default_the_rest() {
        let session: PersistedSession = serde_json::from_str(r#"{"token": "abc"}"#).unwrap();
        assert_eq!(session.token.as_deref(), Some("abc"));
        assert!(session.user.is_none());
        assert!(!session.can_override_branch());
    }
}
