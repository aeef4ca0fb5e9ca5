//! Async actions: the only code that moves data from services into the store.
//!
//! Each action runs `requested`, awaits the service without holding the store
//! lock, then settles the ticket. Failures are written to the cache and also
//! returned so a form can react; a 401 tears the session down instead.
use std::sync::Arc;

use api_types::{
    BranchId,
    branch::Branch,
    cash::CashMovement,
    party::{Client as Customer, Supplier},
    product::Product,
    purchase::Purchase,
    sale::Sale,
    stock::{StockAdjustment, StockByBranch},
};
use chrono::NaiveDate;
use tokio::sync::{Mutex, MutexGuard};

use crate::{
    branch::{BranchChange, BranchContext},
    cache::{EntityCache, Operation, OrderingPolicy, Ticket},
    dashboard::DashboardSummary,
    error::{ClientError, Result},
    http::Client,
    resource::{ListFilters, SearchCriteria, StockKey},
    session::{AuthStatus, CurrentUser, PersistedSession, SignOutReason},
    store::{Cached, Store},
};

/// Client plus store, handed to every view.
#[derive(Clone, Debug)]
pub struct Esponja {
    client: Client,
    store: Arc<Mutex<Store>>,
}

impl Esponja {
    pub fn new(client: Client) -> Self {
        Self::with_policy(client, OrderingPolicy::default())
    }

    pub fn with_policy(client: Client, policy: OrderingPolicy) -> Self {
        let mut store = Store::new(policy);
        match client.storage().load() {
            Ok(session) => store.branch = BranchContext::from_session(&session),
            Err(err) => tracing::error!("failed to read persisted session: {err}"),
        }
        Self {
            client,
            store: Arc::new(Mutex::new(store)),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().await
    }

    /// Copy of one cache, for rendering outside the lock.
    pub async fn snapshot<T: Cached>(&self) -> EntityCache<T> {
        self.store.lock().await.cache::<T>().clone()
    }

    async fn begin<T: Cached>(&self, op: Operation) -> Ticket {
        self.store.lock().await.cache_mut::<T>().requested(op)
    }

    /// Applies `result` to the cache of `T`; the value `apply` returns is
    /// handed back to the caller.
    async fn settle<T: Cached, R, O>(
        &self,
        ticket: Ticket,
        result: Result<R>,
        apply: impl FnOnce(&mut EntityCache<T>, Ticket, R) -> O,
    ) -> Result<O> {
        let mut store = self.store.lock().await;
        match result {
            Ok(value) => Ok(apply(store.cache_mut::<T>(), ticket, value)),
            Err(ClientError::Unauthorized) => {
                store.cache_mut::<T>().abandoned(ticket);
                store.sign_out();
                Err(ClientError::Unauthorized)
            }
            Err(err) => {
                tracing::debug!("{:?} {} failed: {err}", ticket.op(), T::NAME);
                store.cache_mut::<T>().rejected(ticket, err.to_string());
                Err(err)
            }
        }
    }

    /// Replaces the cached list with the server's, filtered by `filters`.
    pub async fn fetch_list<T: Cached>(&self, filters: ListFilters) -> Result<()> {
        let ticket = {
            let mut store = self.store.lock().await;
            let cache = store.cache_mut::<T>();
            cache.set_filters(filters.clone());
            cache.requested(Operation::List)
        };
        let result = self.client.resources::<T>().list(&filters).await;
        self.settle::<T, _, _>(ticket, result, |cache, ticket, items| {
            cache.list_fulfilled(ticket, items)
        })
        .await
    }

    /// Re-runs the list fetch with the filters the cache already holds.
    pub async fn refresh<T: Cached>(&self) -> Result<()> {
        let filters = self.store.lock().await.cache::<T>().filters().clone();
        self.fetch_list::<T>(filters).await
    }

    /// Loads one record into `selected`; a missing record selects nothing.
    pub async fn fetch_one<T: Cached>(&self, key: T::Key) -> Result<()> {
        let ticket = self.begin::<T>(Operation::One).await;
        let result = self.client.resources::<T>().get(&key).await;
        self.settle::<T, _, _>(ticket, result, |cache, ticket, item| {
            cache.one_fulfilled(ticket, item)
        })
        .await
    }

    pub async fn create<T: Cached>(&self, draft: T::Draft) -> Result<T> {
        let ticket = self.begin::<T>(Operation::Create).await;
        let result = self.client.resources::<T>().create(&draft).await;
        self.settle::<T, _, _>(ticket, result, |cache, ticket, item| {
            cache.create_fulfilled(ticket, item.clone());
            item
        })
        .await
    }

    pub async fn update<T: Cached>(&self, key: T::Key, draft: T::Draft) -> Result<T> {
        let ticket = self.begin::<T>(Operation::Update).await;
        let result = self.client.resources::<T>().update(&key, &draft).await;
        self.apply_update(ticket, result).await
    }

    async fn apply_update<T: Cached>(&self, ticket: Ticket, result: Result<T>) -> Result<T> {
        self.settle::<T, _, _>(ticket, result, |cache, ticket, item| {
            cache.update_fulfilled(ticket, item.clone());
            item
        })
        .await
    }

    pub async fn delete<T: Cached>(&self, key: T::Key) -> Result<()> {
        let ticket = self.begin::<T>(Operation::Delete).await;
        let result = self.client.resources::<T>().delete(&key).await;
        self.settle::<T, _, _>(ticket, result, |cache, ticket, ()| {
            cache.delete_fulfilled(ticket, &key)
        })
        .await
    }

    /// Fills `search_results`; `items` is left as it was.
    pub async fn search<T: Cached>(&self, criteria: SearchCriteria) -> Result<()> {
        let ticket = self.begin::<T>(Operation::Search).await;
        let result = self.client.resources::<T>().search(&criteria).await;
        self.settle::<T, _, _>(ticket, result, |cache, ticket, results| {
            cache.search_fulfilled(ticket, results)
        })
        .await
    }

    pub async fn clear_search<T: Cached>(&self) {
        self.store.lock().await.cache_mut::<T>().clear_search();
    }

    async fn select_with<T: Cached>(
        &self,
        result: Result<Option<T>>,
        ticket: Ticket,
    ) -> Result<Option<T>> {
        self.settle::<T, _, _>(ticket, result, |cache, ticket, item| {
            cache.one_fulfilled(ticket, item.clone());
            item
        })
        .await
    }

    pub async fn product_by_code(&self, code: &str) -> Result<Option<Product>> {
        let ticket = self.begin::<Product>(Operation::One).await;
        let result = self.client.resources::<Product>().by_code(code).await;
        self.select_with(result, ticket).await
    }

    pub async fn client_by_document(&self, document: &str) -> Result<Option<Customer>> {
        let ticket = self.begin::<Customer>(Operation::One).await;
        let result = self.client.resources::<Customer>().by_document(document).await;
        self.select_with(result, ticket).await
    }

    pub async fn supplier_by_document(&self, document: &str) -> Result<Option<Supplier>> {
        let ticket = self.begin::<Supplier>(Operation::One).await;
        let result = self.client.resources::<Supplier>().by_document(document).await;
        self.select_with(result, ticket).await
    }

    pub async fn cancel_sale(&self, id: i64) -> Result<Sale> {
        let ticket = self.begin::<Sale>(Operation::Update).await;
        let result = self.client.resources::<Sale>().cancel(id).await;
        self.apply_update(ticket, result).await
    }

    /// Replaces the stock cache with one branch's records.
    pub async fn fetch_stock_for_branch(&self, branch: BranchId) -> Result<()> {
        let ticket = self.begin::<StockByBranch>(Operation::List).await;
        let result = self
            .client
            .resources::<StockByBranch>()
            .for_branch(branch)
            .await;
        self.settle::<StockByBranch, _, _>(ticket, result, |cache, ticket, items| {
            cache.list_fulfilled(ticket, items)
        })
        .await
    }

    pub async fn adjust_stock(
        &self,
        key: StockKey,
        adjustment: StockAdjustment,
    ) -> Result<StockByBranch> {
        let ticket = self.begin::<StockByBranch>(Operation::Update).await;
        let result = self
            .client
            .resources::<StockByBranch>()
            .adjust(&key, &adjustment)
            .await;
        self.apply_update(ticket, result).await
    }

    /// Fetches the branch list and offers it to the branch selector.
    pub async fn load_branches(&self) -> Result<()> {
        self.fetch_list::<Branch>(ListFilters::default()).await?;
        let mut store = self.store.lock().await;
        let branches = store.branches.items().to_vec();
        store.branch.set_available_branches(branches);
        Ok(())
    }

    /// Fetches the dashboard sources concurrently. A failing source leaves
    /// its error in its own cache and the summary is built from the rest.
    pub async fn load_dashboard(&self, filters: ListFilters, today: NaiveDate) -> DashboardSummary {
        let (sales, purchases, movements) = tokio::join!(
            self.fetch_list::<Sale>(filters.clone()),
            self.fetch_list::<Purchase>(filters.clone()),
            self.fetch_list::<CashMovement>(filters),
        );
        for (source, result) in [("sales", sales), ("purchases", purchases), ("cash", movements)] {
            if let Err(err) = result {
                tracing::debug!("dashboard source {source} failed: {err}");
            }
        }
        DashboardSummary::from_store(&*self.store.lock().await, today)
    }

    /// Signs in and persists the session; any previous branch override is
    /// dropped.
    pub async fn login(&self, email: &str, password: &str) -> Result<CurrentUser> {
        let response = self.client.auth().login(email, password).await?;
        let session = PersistedSession::signed_in(response.token, &response.user);
        self.client.storage().save(&session)?;
        self.store.lock().await.sign_in(&session);
        self.client.set_auth_status(AuthStatus::SignedIn);

        tracing::info!("signed in as {} ({})", response.user.name, response.user.role);
        Ok(CurrentUser::from(&response.user))
    }

    /// Re-validates a persisted token before trusting the cached user.
    ///
    /// Returns `None` when there is nothing to restore.
    pub async fn restore_session(&self) -> Result<Option<CurrentUser>> {
        let persisted = self.client.storage().load()?;
        if persisted.token.is_none() {
            self.client
                .set_auth_status(AuthStatus::SignedOut(SignOutReason::NoSession));
            return Ok(None);
        }

        let user = match self.client.auth().me().await {
            Ok(user) => user,
            Err(ClientError::Unauthorized) => {
                self.store.lock().await.sign_out();
                return Err(ClientError::Unauthorized);
            }
            Err(err) => return Err(err),
        };

        let current = CurrentUser::from(&user);
        let session = self.client.storage().update(&mut |session| {
            session.user = Some(current.clone());
            session.own_branch_id = user.branch_id;
            if !current.can_override_branch {
                session.override_branch_id = None;
            }
        })?;
        self.store.lock().await.sign_in(&session);
        self.client.set_auth_status(AuthStatus::SignedIn);

        tracing::info!("restored session for {}", current.name);
        Ok(Some(current))
    }

    pub async fn logout(&self) {
        self.client.teardown(SignOutReason::Logout);
        self.store.lock().await.sign_out();
        tracing::info!("signed out");
    }

    /// Switches the branch the next requests are scoped to (`None` goes back
    /// to the user's own branch).
    pub async fn select_branch(&self, branch: Option<BranchId>) -> Result<BranchChange> {
        self.store
            .lock()
            .await
            .select_branch(self.client.storage(), branch)
    }

    pub async fn effective_branch(&self) -> Option<BranchId> {
        self.store.lock().await.branch.effective_branch()
    }
}
