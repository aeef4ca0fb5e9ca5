//! Branch (sucursal) context.
//!
//! Two states: every session starts in [`BranchMode::Own`]; a session whose
//! user can override the branch may move to [`BranchMode::Override`] and back.
//! The choice is persisted so it survives a restart, and is dropped on logout.
use api_types::{BranchId, branch::Branch};

use crate::{
    error::{ClientError, Result},
    session::{PersistedSession, SessionStorage},
};

/// Header naming the branch a request is scoped to.
pub const BRANCH_HEADER: &str = "x-sucursal-id";

/// Branch the server must scope a request to, or `None` to let it apply its
/// own default.
///
/// An override only counts for sessions with the override capability; a
/// stale override left in storage for any other session is ignored.
pub fn effective_branch(session: &PersistedSession) -> Option<BranchId> {
    if session.can_override_branch() {
        if let Some(branch) = session.override_branch_id {
            return Some(branch);
        }
    }
    session.own_branch_id
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchMode {
    Own,
    Override(BranchId),
}

/// Result of a branch selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BranchChange {
    pub previous: Option<BranchId>,
    pub current: Option<BranchId>,
}

impl BranchChange {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

#[derive(Clone, Debug)]
pub struct BranchContext {
    available: Vec<Branch>,
    own_branch_id: Option<BranchId>,
    can_override: bool,
    mode: BranchMode,
}

impl Default for BranchContext {
    fn default() -> Self {
        Self {
            available: Vec::new(),
            own_branch_id: None,
            can_override: false,
            mode: BranchMode::Own,
        }
    }
}

impl BranchContext {
    /// Rebuilds the context from persisted keys (start-up, sign-in).
    pub fn from_session(session: &PersistedSession) -> Self {
        let can_override = session.can_override_branch();
        let mode = match session.override_branch_id {
            Some(branch) if can_override => BranchMode::Override(branch),
            _ => BranchMode::Own,
        };
        Self {
            available: Vec::new(),
            own_branch_id: session.own_branch_id,
            can_override,
            mode,
        }
    }

    pub fn mode(&self) -> BranchMode {
        self.mode
    }

    pub fn can_override(&self) -> bool {
        self.can_override
    }

    pub fn own_branch(&self) -> Option<BranchId> {
        self.own_branch_id
    }

    pub fn effective_branch(&self) -> Option<BranchId> {
        match self.mode {
            BranchMode::Override(branch) => Some(branch),
            BranchMode::Own => self.own_branch_id,
        }
    }

    pub fn available_branches(&self) -> &[Branch] {
        &self.available
    }

    pub fn set_available_branches(&mut self, branches: Vec<Branch>) {
        self.available = branches;
    }

    /// Switches to `branch`, or back to the own branch with `None`.
    ///
    /// The selection is written to storage before the in-memory state so the
    /// next request already carries it.
    pub fn select_override(
        &mut self,
        storage: &dyn SessionStorage,
        branch: Option<BranchId>,
    ) -> Result<BranchChange> {
        if !self.can_override {
            return Err(ClientError::Forbidden);
        }

        let previous = self.effective_branch();
        storage.update(&mut |session| session.override_branch_id = branch)?;
        self.mode = match branch {
            Some(branch) => BranchMode::Override(branch),
            None => BranchMode::Own,
        };

        let change = BranchChange {
            previous,
            current: self.effective_branch(),
        };
        tracing::info!(
            "branch context {:?} -> {:?}",
            change.previous,
            change.current
        );
        Ok(change)
    }

    /// Back to the signed-out state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use api_types::{auth::Role, user::User};

    use super::*;
    use crate::session::MemorySessionStorage;

    fn session(role: &str, own: Option<i64>, override_branch: Option<i64>) -> PersistedSession {
        let user = User {
            id: 9,
            name: "Luis".to_string(),
            email: None,
            role: Role::parse(role),
            branch_id: own.map(BranchId),
        };
        let mut session = PersistedSession::signed_in("token".to_string(), &user);
        session.override_branch_id = override_branch.map(BranchId);
        session
    }

    #[test]
    fn header_follows_role_and_override() {
        // standard user: always own branch, override ignored
        assert_eq!(effective_branch(&session("vendedor", Some(7), None)), Some(BranchId(7)));
        assert_eq!(effective_branch(&session("vendedor", Some(7), Some(4))), Some(BranchId(7)));
        // admin: override wins, falls back to own
        assert_eq!(effective_branch(&session("admin", Some(1), Some(4))), Some(BranchId(4)));
        assert_eq!(effective_branch(&session("ADMIN", Some(1), None)), Some(BranchId(1)));
        // nothing to send
        assert_eq!(effective_branch(&session("admin", None, None)), None);
        assert_eq!(effective_branch(&session("vendedor", None, Some(4))), None);
        assert_eq!(effective_branch(&PersistedSession::default()), None);
    }

    #[test]
    fn admin_can_override_and_clear() {
        let storage = MemorySessionStorage::new(session("admin", Some(1), None));
        let mut ctx = BranchContext::from_session(&storage.snapshot());
        assert_eq!(ctx.mode(), BranchMode::Own);

        let change = ctx.select_override(&storage, Some(BranchId(4))).unwrap();
        assert!(change.changed());
        assert_eq!(ctx.effective_branch(), Some(BranchId(4)));
        assert_eq!(storage.snapshot().override_branch_id, Some(BranchId(4)));
        assert_eq!(effective_branch(&storage.snapshot()), Some(BranchId(4)));

        ctx.select_override(&storage, None).unwrap();
        assert_eq!(ctx.mode(), BranchMode::Own);
        assert_eq!(effective_branch(&storage.snapshot()), Some(BranchId(1)));
    }

    #[test]
    fn standard_user_cannot_override() {
        let storage = MemorySessionStorage::new(session("vendedor", Some(7), None));
        let mut ctx = BranchContext::from_session(&storage.snapshot());
        let err = ctx.select_override(&storage, Some(BranchId(4))).unwrap_err();
        assert!(matches!(err, ClientError::Forbidden));
        assert_eq!(storage.snapshot().override_branch_id, None);
        assert_eq!(ctx.effective_branch(), Some(BranchId(7)));
    }

    #[test]
    fn persisted_override_is_restored() {
        let ctx = BranchContext::from_session(&session("admin", Some(1), Some(3)));
        assert_eq!(ctx.mode(), BranchMode::Override(BranchId(3)));
    }
}
