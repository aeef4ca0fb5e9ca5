//! What the core needs to know about each entity: where it lives on the API,
//! how it is identified and whether the server scopes it to a branch.
use std::{collections::BTreeMap, fmt};

use api_types::{
    BranchId,
    branch::{Branch, BranchDraft},
    cash::{CashMovement, CashMovementDraft},
    party::{Client, PartyDraft, Supplier},
    product::{Product, ProductDraft},
    purchase::{Purchase, PurchaseDraft},
    sale::{Sale, SaleDraft},
    stock::{StockByBranch, StockDraft},
    user::{User, UserDraft},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::http::Params;

pub trait Resource: Clone + fmt::Debug + DeserializeOwned + Send + Sync + 'static {
    type Key: Clone + PartialEq + fmt::Debug + Send + Sync;
    /// Body of create and update requests.
    type Draft: Serialize + Send + Sync;

    /// Name used in logs and shape errors.
    const NAME: &'static str;
    const PATH: &'static str;
    /// Whether the server filters this entity by the branch header.
    const BRANCH_SCOPED: bool;

    fn key(&self) -> Self::Key;

    /// Path segment(s) addressing one record under [`Resource::PATH`].
    fn key_path(key: &Self::Key) -> String;

    fn item_path(key: &Self::Key) -> String {
        format!("{}/{}", Self::PATH, Self::key_path(key))
    }
}

macro_rules! id_resource {
    ($ty:ty, $draft:ty, $name:literal, $path:literal, $scoped:literal) => {
        impl Resource for $ty {
            type Key = i64;
            type Draft = $draft;

            const NAME: &'static str = $name;
            const PATH: &'static str = $path;
            const BRANCH_SCOPED: bool = $scoped;

            fn key(&self) -> i64 {
                self.id
            }

            fn key_path(key: &i64) -> String {
                key.to_string()
            }
        }
    };
}

id_resource!(Product, ProductDraft, "product", "productos", true);
id_resource!(Client, PartyDraft, "client", "clientes", false);
id_resource!(Supplier, PartyDraft, "supplier", "proveedores", false);
id_resource!(Sale, SaleDraft, "sale", "ventas", true);
id_resource!(Purchase, PurchaseDraft, "purchase", "compras", true);
id_resource!(CashMovement, CashMovementDraft, "cash movement", "caja/movimientos", true);
id_resource!(User, UserDraft, "user", "usuarios", false);

impl Resource for Branch {
    type Key = BranchId;
    type Draft = BranchDraft;

    const NAME: &'static str = "branch";
    const PATH: &'static str = "sucursales";
    const BRANCH_SCOPED: bool = false;

    fn key(&self) -> BranchId {
        self.id
    }

    fn key_path(key: &BranchId) -> String {
        key.to_string()
    }
}

/// Identity of a [`StockByBranch`] record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StockKey {
    pub product_id: i64,
    pub branch_id: BranchId,
}

impl Resource for StockByBranch {
    type Key = StockKey;
    type Draft = StockDraft;

    const NAME: &'static str = "stock";
    const PATH: &'static str = "stock";
    const BRANCH_SCOPED: bool = true;

    fn key(&self) -> StockKey {
        StockKey {
            product_id: self.product_id,
            branch_id: self.branch_id,
        }
    }

    fn key_path(key: &StockKey) -> String {
        format!("{}/{}", key.product_id, key.branch_id)
    }
}

/// Criteria kept by a cache and sent as query parameters on list requests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListFilters(BTreeMap<String, String>);

impl ListFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.0.insert(key.into(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn params(&self) -> Params {
        self.0
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// Field a search is matched against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchKind {
    Code,
    Name,
    Document,
    Category,
}

impl SearchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "codigo",
            Self::Name => "nombre",
            Self::Document => "documento",
            Self::Category => "categoria",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchCriteria {
    pub kind: SearchKind,
    pub term: String,
}

impl SearchCriteria {
    pub fn new(kind: SearchKind, term: impl Into<String>) -> Self {
        Self {
            kind,
            term: term.into(),
        }
    }

    pub fn params(&self) -> Params {
        vec![
            ("tipo".to_string(), self.kind.as_str().to_string()),
            ("valor".to_string(), self.term.trim().to_string()),
        ]
    }
}
