use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use money::{Money, MoneyError};

mod money;

/// Identifier of a branch (sucursal).
///
/// Serialized as a plain JSON number and sent as the decimal value of the
/// branch-selector header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(pub i64);

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for BranchId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

pub mod envelope {
    use super::*;

    /// Wrapper every endpoint answers with.
    ///
    /// `success == false` carries the server-authored reason in `message`;
    /// `data` holds the payload on success and may be absent for commands
    /// (delete, cancel) that return nothing.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct Envelope<T> {
        pub success: bool,
        pub message: Option<String>,
        pub data: Option<T>,
    }

    impl<T> Envelope<T> {
        pub fn ok(data: T) -> Self {
            Self {
                success: true,
                message: None,
                data: Some(data),
            }
        }

        pub fn failure(message: impl Into<String>) -> Self {
            Self {
                success: false,
                message: Some(message.into()),
                data: None,
            }
        }
    }
}

pub mod auth {
    use super::*;

    /// Role of the signed-in user.
    ///
    /// The server is not consistent about casing (`admin`, `ADMIN`), so the
    /// privileged role is matched case-insensitively and always serialized as
    /// lowercase `admin`. Every other role is kept verbatim and is treated as
    /// non-privileged.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Role {
        Admin,
        Staff(String),
    }

    impl Role {
        pub const ADMIN: &'static str = "admin";

        pub fn parse(raw: &str) -> Self {
            let raw = raw.trim();
            if raw.eq_ignore_ascii_case(Self::ADMIN) {
                Self::Admin
            } else {
                Self::Staff(raw.to_string())
            }
        }

        pub fn as_str(&self) -> &str {
            match self {
                Self::Admin => Self::ADMIN,
                Self::Staff(name) => name,
            }
        }

        /// Whether this role may look at branches other than its own.
        pub fn is_privileged(&self) -> bool {
            matches!(self, Self::Admin)
        }
    }

    impl fmt::Display for Role {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    impl Serialize for Role {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(self.as_str())
        }
    }

    impl<'de> Deserialize<'de> for Role {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let raw = String::deserialize(deserializer)?;
            Ok(Self::parse(&raw))
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoginRequest {
        pub email: String,
        pub password: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoginResponse {
        pub token: String,
        pub user: super::user::User,
    }
}

pub mod user {
    use super::*;
    use crate::auth::Role;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct User {
        pub id: i64,
        pub name: String,
        pub email: Option<String>,
        pub role: Role,
        /// Branch the user is assigned to; admins may have none.
        pub branch_id: Option<BranchId>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct UserDraft {
        pub name: String,
        pub email: String,
        pub role: Role,
        pub branch_id: Option<BranchId>,
        /// Only sent on create or when changing the password.
        #[serde(skip_serializing_if = "Option::is_none")]
        pub password: Option<String>,
    }
}

pub mod branch {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Branch {
        pub id: BranchId,
        pub name: String,
        pub address: Option<String>,
        #[serde(default = "active_default")]
        pub active: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct BranchDraft {
        pub name: String,
        pub address: Option<String>,
        pub active: bool,
    }

    fn active_default() -> bool {
        true
    }
}

pub mod product {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Product {
        pub id: i64,
        pub code: String,
        pub name: String,
        pub category: Option<String>,
        pub price: Money,
        pub cost: Option<Money>,
        /// Branch the listing was scoped to, when the server reports it.
        pub branch_id: Option<BranchId>,
        /// Stock in the scoped branch.
        pub stock: Option<i64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ProductDraft {
        pub code: String,
        pub name: String,
        pub category: Option<String>,
        pub price: Money,
        pub cost: Option<Money>,
    }
}

pub mod party {
    //! Customers and suppliers share the same shape: a tax document plus
    //! contact data.
    use super::*;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Client {
        pub id: i64,
        /// DNI/CUIT.
        pub document: String,
        pub name: String,
        pub email: Option<String>,
        pub phone: Option<String>,
        pub address: Option<String>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Supplier {
        pub id: i64,
        pub document: String,
        pub name: String,
        pub email: Option<String>,
        pub phone: Option<String>,
        pub address: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PartyDraft {
        pub document: String,
        pub name: String,
        pub email: Option<String>,
        pub phone: Option<String>,
        pub address: Option<String>,
    }
}

pub mod sale {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum SaleStatus {
        #[default]
        Completed,
        Cancelled,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SaleLine {
        pub product_id: i64,
        pub quantity: i64,
        pub unit_price: Money,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Sale {
        pub id: i64,
        pub branch_id: BranchId,
        pub client_id: Option<i64>,
        /// RFC3339 timestamp, including the branch's offset.
        pub date: DateTime<FixedOffset>,
        pub total: Money,
        #[serde(default)]
        pub status: SaleStatus,
        pub payment_method: Option<String>,
        #[serde(default)]
        pub items: Vec<SaleLine>,
    }

    /// Request body for a new sale.
    ///
    /// `branch_id` may be omitted: the server then books the sale in the branch
    /// named by the request's branch-selector header.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SaleDraft {
        pub branch_id: Option<BranchId>,
        pub client_id: Option<i64>,
        pub payment_method: Option<String>,
        pub items: Vec<SaleLine>,
    }
}

pub mod purchase {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PurchaseLine {
        pub product_id: i64,
        pub quantity: i64,
        pub unit_cost: Money,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Purchase {
        pub id: i64,
        pub branch_id: BranchId,
        pub supplier_id: i64,
        pub date: DateTime<FixedOffset>,
        pub total: Money,
        pub invoice_number: Option<String>,
        #[serde(default)]
        pub items: Vec<PurchaseLine>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PurchaseDraft {
        pub branch_id: Option<BranchId>,
        pub supplier_id: i64,
        pub invoice_number: Option<String>,
        pub items: Vec<PurchaseLine>,
    }
}

pub mod cash {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum MovementKind {
        Income,
        Expense,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CashMovement {
        pub id: i64,
        pub branch_id: BranchId,
        pub kind: MovementKind,
        /// Always positive; `kind` carries the sign.
        pub amount: Money,
        pub concept: String,
        pub date: DateTime<FixedOffset>,
    }

    impl CashMovement {
        /// Amount with the sign implied by `kind`, `None` if it does not fit.
        pub fn signed_amount(&self) -> Option<Money> {
            match self.kind {
                MovementKind::Income => Some(self.amount),
                MovementKind::Expense => self.amount.checked_neg(),
            }
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CashMovementDraft {
        pub branch_id: Option<BranchId>,
        pub kind: MovementKind,
        pub amount: Money,
        pub concept: String,
    }
}

pub mod stock {
    use super::*;

    /// Stock of one product in one branch.
    ///
    /// Identity is the `(product_id, branch_id)` pair: the same product shows
    /// up once per branch in the global view.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct StockByBranch {
        pub product_id: i64,
        pub branch_id: BranchId,
        pub quantity: i64,
        pub min_quantity: Option<i64>,
    }

    impl StockByBranch {
        pub fn is_below_minimum(&self) -> bool {
            self.min_quantity.is_some_and(|min| self.quantity < min)
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct StockDraft {
        pub product_id: i64,
        pub branch_id: BranchId,
        pub quantity: i64,
        pub min_quantity: Option<i64>,
    }

    /// Relative correction of a stock record (positive adds units).
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct StockAdjustment {
        pub delta: i64,
        pub reason: Option<String>,
    }
}

#[cfg(test)]
mod tests {
    use super::{auth::Role, envelope::Envelope, stock::StockByBranch, user::User, *};

    #[test]
    fn role_matches_admin_case_insensitively() {
        let roles: Vec<Role> =
            serde_json::from_str(r#"["admin", "ADMIN", " Admin ", "vendedor"]"#).unwrap();
        assert_eq!(roles[0], Role::Admin);
        assert_eq!(roles[1], Role::Admin);
        assert_eq!(roles[2], Role::Admin);
        assert_eq!(roles[3], Role::Staff("vendedor".to_string()));
        assert!(!roles[3].is_privileged());
    }

    #[test]
    fn role_serializes_canonical_lowercase() {
        assert_eq!(serde_json::to_string(&Role::parse("ADMIN")).unwrap(), r#""admin""#);
    }

    #[test]
    fn envelope_tolerates_missing_message_and_data() {
        let env: Envelope<User> = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(env.success);
        assert!(env.message.is_none());
        assert!(env.data.is_none());
    }

    #[test]
    fn stock_below_minimum() {
        let row = StockByBranch {
            product_id: 1,
            branch_id: BranchId(2),
            quantity: 3,
            min_quantity: Some(5),
        };
        assert!(row.is_below_minimum());
        let row = StockByBranch {
            min_quantity: None,
            ..row
        };
        assert!(!row.is_below_minimum());
    }
}
