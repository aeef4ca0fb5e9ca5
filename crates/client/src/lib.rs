//! Branch-aware data layer of the La Esponja ERP client.
//!
//! The crate is a thin client: it talks to the REST API through one
//! [`Client`], keeps the last answers in a [`Store`] of per-entity caches and
//! tracks which branch (sucursal) the user is looking at.
//!
//! ```text
//! view ──► Esponja (actions) ──► services ──► Client ──► REST API
//!              │                                 │
//!              ▼                                 ▼
//!            Store ◄── BranchContext      SessionStorage
//! ```
//!
//! The branch header is computed from [`SessionStorage`] on every request, so
//! a branch switch takes effect on the very next call.

pub mod branch;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod resource;
pub mod services;
pub mod session;
pub mod store;

pub use branch::{BRANCH_HEADER, BranchChange, BranchContext, BranchMode, effective_branch};
pub use cache::{EntityCache, Operation, OrderingPolicy, Ticket};
pub use config::ClientConfig;
pub use dashboard::DashboardSummary;
pub use dispatch::Esponja;
pub use error::{ClientError, ErrorKind, Result};
pub use http::Client;
pub use resource::{ListFilters, Resource, SearchCriteria, SearchKind, StockKey};
pub use session::{
    AuthStatus, CurrentUser, FileSessionStorage, MemorySessionStorage, PersistedSession,
    SessionStorage, SignOutReason,
};
pub use store::{Cached, Store};
