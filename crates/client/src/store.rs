//! The application store: one cache per entity plus the branch context.
//!
//! A store is a plain value; every test or embedding creates its own.
use api_types::{
    BranchId,
    branch::Branch,
    cash::CashMovement,
    party::{Client, Supplier},
    product::Product,
    purchase::Purchase,
    sale::Sale,
    stock::StockByBranch,
    user::User,
};

use crate::{
    branch::{BranchChange, BranchContext},
    cache::{EntityCache, OrderingPolicy},
    error::Result,
    resource::Resource,
    session::{PersistedSession, SessionStorage},
};

#[derive(Clone, Debug)]
pub struct Store {
    pub products: EntityCache<Product>,
    pub clients: EntityCache<Client>,
    pub suppliers: EntityCache<Supplier>,
    pub sales: EntityCache<Sale>,
    pub purchases: EntityCache<Purchase>,
    pub cash_movements: EntityCache<CashMovement>,
    pub stock: EntityCache<StockByBranch>,
    pub branches: EntityCache<Branch>,
    pub users: EntityCache<User>,
    pub branch: BranchContext,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(OrderingPolicy::default())
    }
}

/// Entities that have a cache in the [`Store`].
pub trait Cached: Resource {
    fn cache(store: &Store) -> &EntityCache<Self>;

    fn cache_mut(store: &mut Store) -> &mut EntityCache<Self>;
}

macro_rules! cached {
    ($ty:ty, $field:ident) => {
        impl Cached for $ty {
            fn cache(store: &Store) -> &EntityCache<Self> {
                &store.$field
            }

            fn cache_mut(store: &mut Store) -> &mut EntityCache<Self> {
                &mut store.$field
            }
        }
    };
}

cached!(Product, products);
cached!(Client, clients);
cached!(Supplier, suppliers);
cached!(Sale, sales);
cached!(Purchase, purchases);
cached!(CashMovement, cash_movements);
cached!(StockByBranch, stock);
cached!(Branch, branches);
cached!(User, users);

impl Store {
    /// Every cache uses `policy` for overlapping list and search results.
    pub fn new(policy: OrderingPolicy) -> Self {
        Self {
            products: EntityCache::new(policy),
            clients: EntityCache::new(policy),
            suppliers: EntityCache::new(policy),
            sales: EntityCache::new(policy),
            purchases: EntityCache::new(policy),
            cash_movements: EntityCache::new(policy),
            stock: EntityCache::new(policy),
            branches: EntityCache::new(policy),
            users: EntityCache::new(policy),
            branch: BranchContext::default(),
        }
    }

    pub fn cache<T: Cached>(&self) -> &EntityCache<T> {
        T::cache(self)
    }

    pub fn cache_mut<T: Cached>(&mut self) -> &mut EntityCache<T> {
        T::cache_mut(self)
    }

    /// Flags the caches whose content depends on the branch header.
    pub fn mark_branch_scoped_stale(&mut self) {
        fn mark<T: Cached>(store: &mut Store) {
            if T::BRANCH_SCOPED {
                store.cache_mut::<T>().mark_stale();
            }
        }
        mark::<Product>(self);
        mark::<Client>(self);
        mark::<Supplier>(self);
        mark::<Sale>(self);
        mark::<Purchase>(self);
        mark::<CashMovement>(self);
        mark::<StockByBranch>(self);
        mark::<Branch>(self);
        mark::<User>(self);
    }

    /// Starts a session from freshly persisted keys.
    pub fn sign_in(&mut self, session: &PersistedSession) {
        let available = self.branches.items().to_vec();
        self.branch = BranchContext::from_session(session);
        self.branch.set_available_branches(available);
        self.mark_branch_scoped_stale();
    }

    /// Drops the branch selection; cached data stays but is no longer trusted.
    pub fn sign_out(&mut self) {
        self.branch.reset();
        self.mark_branch_scoped_stale();
    }

    /// Branch selection; a change leaves branch-scoped caches stale until the
    /// views fetch them again.
    pub fn select_branch(
        &mut self,
        storage: &dyn SessionStorage,
        branch: Option<BranchId>,
    ) -> Result<BranchChange> {
        let change = self.branch.select_override(storage, branch)?;
        if change.changed() {
            self.mark_branch_scoped_stale();
        }
        Ok(change)
    }
}
