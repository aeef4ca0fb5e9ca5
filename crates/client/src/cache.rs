//! Per-entity cache ("slice") and its reducers.
//!
//! Every async operation goes through three phases: `requested` hands out a
//! [`Ticket`], then exactly one of the `*_fulfilled` reducers or
//! [`EntityCache::rejected`] settles it. Reducers never fail.
//!
//! Results are applied in arrival order: when two list requests overlap, the
//! one that resolves last wins. [`OrderingPolicy::Fenced`] drops list and
//! search results older than the last applied one instead.
use crate::resource::{ListFilters, Resource};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrderingPolicy {
    #[default]
    LastWriteWins,
    Fenced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    List,
    One,
    Create,
    Update,
    Delete,
    Search,
}

/// Handle of one in-flight operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket {
    seq: u64,
    op: Operation,
}

impl Ticket {
    pub fn op(self) -> Operation {
        self.op
    }

    pub fn seq(self) -> u64 {
        self.seq
    }
}

#[derive(Clone, Debug)]
pub struct EntityCache<T: Resource> {
    /// `None` until the first successful list fetch.
    items: Option<Vec<T>>,
    selected: Option<T>,
    loading: bool,
    error: Option<String>,
    search_results: Vec<T>,
    search_active: bool,
    filters: ListFilters,
    stale: bool,
    policy: OrderingPolicy,
    next_seq: u64,
    applied_list: u64,
    applied_search: u64,
}

impl<T: Resource> Default for EntityCache<T> {
    fn default() -> Self {
        Self::new(OrderingPolicy::default())
    }
}

impl<T: Resource> EntityCache<T> {
    pub fn new(policy: OrderingPolicy) -> Self {
        Self {
            items: None,
            selected: None,
            loading: false,
            error: None,
            search_results: Vec::new(),
            search_active: false,
            filters: ListFilters::default(),
            stale: false,
            policy,
            next_seq: 0,
            applied_list: 0,
            applied_search: 0,
        }
    }

    /// Last fetched list; empty until a list fetch succeeded.
    pub fn items(&self) -> &[T] {
        self.items.as_deref().unwrap_or_default()
    }

    pub fn is_initialized(&self) -> bool {
        self.items.is_some()
    }

    pub fn selected(&self) -> Option<&T> {
        self.selected.as_ref()
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn search_results(&self) -> &[T] {
        &self.search_results
    }

    pub fn search_active(&self) -> bool {
        self.search_active
    }

    /// What a list view shows: search results while searching, else `items`.
    pub fn visible(&self) -> &[T] {
        if self.search_active {
            &self.search_results
        } else {
            self.items()
        }
    }

    pub fn filters(&self) -> &ListFilters {
        &self.filters
    }

    pub fn set_filters(&mut self, filters: ListFilters) {
        self.filters = filters;
    }

    /// Whether `items` may belong to another branch than the current one.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn policy(&self) -> OrderingPolicy {
        self.policy
    }

    pub fn find(&self, key: &T::Key) -> Option<&T> {
        self.items().iter().find(|item| item.key() == *key)
    }

    pub fn requested(&mut self, op: Operation) -> Ticket {
        self.next_seq += 1;
        self.loading = true;
        self.error = None;
        Ticket {
            seq: self.next_seq,
            op,
        }
    }

    /// Whether a fenced cache must drop the result of `ticket`.
    fn superseded(&self, ticket: Ticket) -> bool {
        if self.policy != OrderingPolicy::Fenced {
            return false;
        }
        let applied = match ticket.op {
            Operation::List => self.applied_list,
            Operation::Search => self.applied_search,
            _ => return false,
        };
        if ticket.seq < applied {
            tracing::warn!(
                "dropping {:?} result #{} for {}: #{} already applied",
                ticket.op,
                ticket.seq,
                T::NAME,
                applied
            );
            return true;
        }
        false
    }

    fn mark_applied(&mut self, ticket: Ticket) {
        match ticket.op {
            Operation::List => self.applied_list = self.applied_list.max(ticket.seq),
            Operation::Search => self.applied_search = self.applied_search.max(ticket.seq),
            _ => {}
        }
    }

    /// Replaces `items` wholesale.
    pub fn list_fulfilled(&mut self, ticket: Ticket, items: Vec<T>) {
        if self.superseded(ticket) {
            return;
        }
        self.mark_applied(ticket);
        self.items = Some(items);
        self.stale = false;
        self.loading = false;
    }

    /// Sets `selected`; `None` is "no match", not an error.
    pub fn one_fulfilled(&mut self, _ticket: Ticket, item: Option<T>) {
        self.selected = item;
        self.loading = false;
    }

    /// Appends to an initialized list. An uninitialized list stays
    /// uninitialized: a single record is not a complete listing.
    pub fn create_fulfilled(&mut self, _ticket: Ticket, item: T) {
        if let Some(items) = self.items.as_mut() {
            items.push(item);
        }
        self.loading = false;
    }

    /// Patches the matching record in place; unknown keys are not inserted.
    pub fn update_fulfilled(&mut self, _ticket: Ticket, item: T) {
        let key = item.key();
        if self.selected.as_ref().is_some_and(|selected| selected.key() == key) {
            self.selected = Some(item.clone());
        }
        if let Some(slot) = self
            .items
            .as_mut()
            .and_then(|items| items.iter_mut().find(|existing| existing.key() == key))
        {
            *slot = item;
        }
        self.loading = false;
    }

    pub fn delete_fulfilled(&mut self, _ticket: Ticket, key: &T::Key) {
        if let Some(items) = self.items.as_mut() {
            items.retain(|item| item.key() != *key);
        }
        if self.selected.as_ref().is_some_and(|selected| selected.key() == *key) {
            self.selected = None;
        }
        self.loading = false;
    }

    /// Stores search results without touching `items`.
    pub fn search_fulfilled(&mut self, ticket: Ticket, results: Vec<T>) {
        if self.superseded(ticket) {
            return;
        }
        self.mark_applied(ticket);
        self.search_results = results;
        self.search_active = true;
        self.loading = false;
    }

    /// Back to browse mode.
    pub fn clear_search(&mut self) {
        self.search_results.clear();
        self.search_active = false;
    }

    /// Records a failure; previously loaded data is kept.
    pub fn rejected(&mut self, ticket: Ticket, message: impl Into<String>) {
        if self.superseded(ticket) {
            return;
        }
        self.error = Some(message.into());
        self.loading = false;
    }

    /// Settles a ticket without recording an error (session teardown).
    pub fn abandoned(&mut self, _ticket: Ticket) {
        self.loading = false;
    }
}

#[cfg(test)]
mod tests {
    use api_types::{BranchId, Money, party::Client, product::Product, stock::StockByBranch};

    use super::*;
    use crate::resource::StockKey;

    fn product(id: i64, name: &str) -> Product {
        Product {
            id,
            code: format!("P{id}"),
            name: name.to_string(),
            category: None,
            price: Money::new(1000),
            cost: None,
            branch_id: Some(BranchId(1)),
            stock: None,
        }
    }

    fn client(id: i64) -> Client {
        Client {
            id,
            document: format!("{id}"),
            name: format!("Client {id}"),
            email: None,
            phone: None,
            address: None,
        }
    }

    fn loaded(items: Vec<Product>) -> EntityCache<Product> {
        let mut cache = EntityCache::default();
        let ticket = cache.requested(Operation::List);
        cache.list_fulfilled(ticket, items);
        cache
    }

    #[test]
    fn list_lifecycle() {
        let mut cache = EntityCache::<Product>::default();
        assert!(!cache.is_initialized());

        let ticket = cache.requested(Operation::List);
        assert!(cache.loading());
        assert!(cache.error().is_none());

        cache.list_fulfilled(ticket, vec![product(1, "a"), product(2, "b")]);
        assert!(!cache.loading());
        assert_eq!(cache.items().len(), 2);
    }

    #[test]
    fn failed_refresh_keeps_previous_items() {
        let mut cache = loaded(vec![product(1, "a")]);
        let ticket = cache.requested(Operation::List);
        cache.rejected(ticket, "could not reach the server");
        assert!(!cache.loading());
        assert_eq!(cache.error(), Some("could not reach the server"));
        assert_eq!(cache.items().len(), 1);
    }

    #[test]
    fn last_resolved_list_wins() {
        let mut cache = EntityCache::<Product>::default();
        let first = cache.requested(Operation::List);
        let second = cache.requested(Operation::List);

        // second resolves first, first arrives late
        cache.list_fulfilled(second, vec![product(2, "second")]);
        cache.list_fulfilled(first, vec![product(1, "first")]);
        assert_eq!(cache.items(), &[product(1, "first")]);

        // and in issue order the later-issued one resolves last
        let third = cache.requested(Operation::List);
        let fourth = cache.requested(Operation::List);
        cache.list_fulfilled(third, vec![product(3, "third")]);
        cache.list_fulfilled(fourth, vec![product(4, "fourth")]);
        assert_eq!(cache.items(), &[product(4, "fourth")]);
    }

    #[test]
    fn fenced_cache_drops_older_results() {
        let mut cache = EntityCache::<Product>::new(OrderingPolicy::Fenced);
        let first = cache.requested(Operation::List);
        let second = cache.requested(Operation::List);

        cache.list_fulfilled(second, vec![product(2, "second")]);
        cache.list_fulfilled(first, vec![product(1, "first")]);
        assert_eq!(cache.items(), &[product(2, "second")]);

        cache.rejected(first, "late failure");
        assert!(cache.error().is_none());
    }

    #[test]
    fn update_of_unknown_id_is_a_no_op() {
        let mut cache = loaded(vec![product(1, "a"), product(2, "b")]);
        let before = cache.items().to_vec();
        let ticket = cache.requested(Operation::Update);
        cache.update_fulfilled(ticket, product(99, "ghost"));
        assert_eq!(cache.items(), before.as_slice());
        assert!(!cache.loading());
    }

    #[test]
    fn update_patches_items_and_selected() {
        let mut cache = loaded(vec![product(1, "a"), product(2, "b")]);
        let ticket = cache.requested(Operation::One);
        cache.one_fulfilled(ticket, Some(product(2, "b")));

        let ticket = cache.requested(Operation::Update);
        cache.update_fulfilled(ticket, product(2, "renamed"));
        assert_eq!(cache.items()[1].name, "renamed");
        assert_eq!(cache.selected().map(|p| p.name.as_str()), Some("renamed"));
        assert_eq!(cache.items()[0].name, "a");
    }

    #[test]
    fn create_on_uninitialized_list_does_not_fabricate_a_listing() {
        let mut cache = EntityCache::<Product>::default();
        let ticket = cache.requested(Operation::Create);
        cache.create_fulfilled(ticket, product(1, "new"));
        assert!(!cache.is_initialized());
        assert!(cache.items().is_empty());
        assert!(!cache.loading());
    }

    #[test]
    fn create_appends_to_loaded_list() {
        let mut cache = loaded(vec![product(1, "a")]);
        let ticket = cache.requested(Operation::Create);
        cache.create_fulfilled(ticket, product(2, "b"));
        assert_eq!(cache.items().len(), 2);
    }

    #[test]
    fn failed_create_keeps_items_and_selection() {
        let mut cache = loaded(vec![product(1, "a")]);
        let ticket = cache.requested(Operation::One);
        cache.one_fulfilled(ticket, Some(product(1, "a")));

        let ticket = cache.requested(Operation::Create);
        cache.rejected(ticket, "El código ya existe");
        assert_eq!(cache.items().len(), 1);
        assert!(cache.selected().is_some());
        assert_eq!(cache.error(), Some("El código ya existe"));
    }

    #[test]
    fn delete_removes_item_and_selection() {
        let mut cache = loaded(vec![product(1, "a"), product(2, "b")]);
        let ticket = cache.requested(Operation::One);
        cache.one_fulfilled(ticket, Some(product(1, "a")));

        let ticket = cache.requested(Operation::Delete);
        cache.delete_fulfilled(ticket, &1);
        assert_eq!(cache.items(), &[product(2, "b")]);
        assert!(cache.selected().is_none());
    }

    #[test]
    fn fetch_one_does_not_touch_items() {
        let mut cache = EntityCache::<Client>::default();
        let ticket = cache.requested(Operation::List);
        cache.list_fulfilled(ticket, vec![client(1)]);
        let ticket = cache.requested(Operation::One);
        cache.one_fulfilled(ticket, Some(client(7)));
        assert_eq!(cache.items(), &[client(1)]);
        assert_eq!(cache.selected(), Some(&client(7)));

        let ticket = cache.requested(Operation::One);
        cache.one_fulfilled(ticket, None);
        assert!(cache.selected().is_none());
        assert!(cache.error().is_none());
    }

    #[test]
    fn search_and_browse_coexist() {
        let all: Vec<Product> = (1..=5).map(|id| product(id, "x")).collect();
        let mut cache = loaded(all.clone());

        let ticket = cache.requested(Operation::Search);
        cache.search_fulfilled(ticket, vec![product(2, "x"), product(4, "x")]);
        assert_eq!(cache.items().len(), 5);
        assert_eq!(cache.search_results().len(), 2);
        assert_eq!(cache.visible().len(), 2);

        cache.clear_search();
        assert_eq!(cache.visible(), all.as_slice());
        assert_eq!(cache.items(), all.as_slice());
    }

    #[test]
    fn stock_records_are_keyed_per_branch() {
        let row = |branch: i64, quantity: i64| StockByBranch {
            product_id: 10,
            branch_id: BranchId(branch),
            quantity,
            min_quantity: None,
        };
        let mut cache = EntityCache::<StockByBranch>::default();
        let ticket = cache.requested(Operation::List);
        cache.list_fulfilled(ticket, vec![row(1, 5), row(2, 8)]);

        let ticket = cache.requested(Operation::Update);
        cache.update_fulfilled(ticket, row(2, 3));
        assert_eq!(cache.items(), &[row(1, 5), row(2, 3)]);

        let key = StockKey {
            product_id: 10,
            branch_id: BranchId(1),
        };
        assert_eq!(cache.find(&key).map(|r| r.quantity), Some(5));
    }

    #[test]
    fn successful_list_clears_staleness() {
        let mut cache = loaded(vec![product(1, "a")]);
        cache.mark_stale();
        assert!(cache.is_stale());
        let ticket = cache.requested(Operation::List);
        cache.list_fulfilled(ticket, vec![]);
        assert!(!cache.is_stale());
    }
}
