//! In-memory implementation of every storage capability.
//!
//! Used by the test suites and for running the server without a database.
//! It honours the same contracts as the `PostgreSQL` repositories:
//!
//! - each product keeps its available and held units packed in one
//!   `AtomicU64`; a reservation is a single `fetch_update` with a floor at
//!   zero, so products never contend
//! - units reserved by an uncommitted [`FulfillmentTx`] are counted as held
//!   and still reported by catalog reads until the order is committed, and
//!   moving units between the two halves is one atomic step
//! - orders become visible in one step at commit, after a tracking id
//!   uniqueness check under the order table lock
//! - replacing a principal's session token happens under one mutex

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use shopfront_core::{
    ActivityLogId, CategoryId, Email, Money, OrderId, OrderItemId, OrderStatus, PrincipalId,
    ProductId, Role, TrackingId,
};

use super::{
    AuditStore, Catalog, FulfillmentTx, HealthCheck, OrderStore, PrincipalStore, Reservation,
    StatusUpdate, StockLedger, StoreError, TokenStore,
};
use crate::models::{
    ActivityLog, Category, NewActivity, NewOrder, NewPrincipal, Order, OrderItem, Page,
    PageRequest, Principal, Product, SessionToken,
};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Monotonic id source for one table.
#[derive(Debug)]
struct Sequence(AtomicI32);

impl Default for Sequence {
    fn default() -> Self {
        Self(AtomicI32::new(1))
    }
}

impl Sequence {
    fn next(&self) -> i32 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// One product: descriptive data behind a lock, counters outside it.
#[derive(Debug)]
struct ProductRow {
    product: RwLock<Product>,
    /// Available units in the high half, units held by uncommitted units of
    /// work in the low half. Both halves change in one atomic update so a
    /// reader never sees one without the other.
    counters: AtomicU64,
}

fn pack(available: u32, held: u32) -> u64 {
    (u64::from(available) << 32) | u64::from(held)
}

#[allow(clippy::cast_possible_truncation)]
const fn unpack(counters: u64) -> (u32, u32) {
    ((counters >> 32) as u32, counters as u32)
}

impl ProductRow {
    fn new(product: Product) -> Self {
        let stock = product.stock;
        Self {
            product: RwLock::new(product),
            counters: AtomicU64::new(pack(stock, 0)),
        }
    }

    /// `(available, held)` from a single load.
    fn counters(&self) -> (u32, u32) {
        unpack(self.counters.load(Ordering::SeqCst))
    }

    /// Committed stock: held units still count until their order commits.
    fn stock(&self) -> u32 {
        let (available, held) = self.counters();
        available.saturating_add(held)
    }

    fn snapshot(&self) -> Product {
        let mut product = read(&self.product).clone();
        product.stock = self.stock();
        product
    }

    fn price(&self) -> Money {
        read(&self.product).price
    }

    /// Take `quantity` available units in one step. With `hold` the units
    /// stay counted as stock until the unit of work settles them.
    fn take(&self, quantity: u32, hold: bool) -> Reservation {
        let outcome = self
            .counters
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                let (available, held) = unpack(current);
                let available = available.checked_sub(quantity)?;
                // `available + held` never exceeds `u32::MAX`, so this fits.
                let held = if hold { held + quantity } else { held };
                Some(pack(available, held))
            });

        match outcome {
            Ok(previous) => Reservation::Reserved {
                remaining: unpack(previous).0 - quantity,
                unit_price: self.price(),
            },
            Err(current) => Reservation::Insufficient {
                shortfall: quantity - unpack(current).0,
            },
        }
    }

    /// Reserve outside any unit of work.
    fn try_take(&self, quantity: u32) -> Reservation {
        self.take(quantity, false)
    }

    /// Reserve inside a unit of work.
    fn hold(&self, quantity: u32) -> Reservation {
        self.take(quantity, true)
    }

    /// Add units to available stock. Returns the new committed stock.
    fn put_back(&self, quantity: u32) -> Result<u32, StoreError> {
        self.counters
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                let (available, held) = unpack(current);
                available.checked_add(held)?.checked_add(quantity)?;
                Some(pack(available + quantity, held))
            })
            .map(|previous| {
                let (available, held) = unpack(previous);
                available + held + quantity
            })
            .map_err(|_| StoreError::Conflict("stock overflow".to_owned()))
    }

    /// Whether `quantity` more units would still fit.
    fn has_room_for(&self, quantity: u32) -> bool {
        let (available, held) = self.counters();
        available
            .checked_add(held)
            .and_then(|total| total.checked_add(quantity))
            .is_some()
    }

    /// Return held units to available (rollback).
    fn release(&self, quantity: u32) {
        let _ = self
            .counters
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                let (available, held) = unpack(current);
                Some(pack(
                    available.saturating_add(quantity),
                    held.saturating_sub(quantity),
                ))
            });
    }

    /// Drop the hold on committed units; they leave stock for good.
    fn settle(&self, quantity: u32) {
        let _ = self
            .counters
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                let (available, held) = unpack(current);
                Some(pack(available, held.saturating_sub(quantity)))
            });
    }
}

#[derive(Debug, Default)]
struct OrderTable {
    rows: BTreeMap<OrderId, Order>,
    by_tracking_id: HashMap<TrackingId, OrderId>,
}

#[derive(Debug, Default)]
struct Inner {
    principals: RwLock<BTreeMap<PrincipalId, (Principal, String)>>,
    tokens: Mutex<HashMap<String, SessionToken>>,
    categories: RwLock<BTreeMap<CategoryId, Category>>,
    products: RwLock<BTreeMap<ProductId, Arc<ProductRow>>>,
    orders: RwLock<OrderTable>,
    activity: Mutex<Vec<ActivityLog>>,
    principal_ids: Sequence,
    category_ids: Sequence,
    product_ids: Sequence,
    order_ids: Sequence,
    item_ids: Sequence,
    activity_ids: Sequence,
}

/// Process-local store. Cloning shares the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Fixtures
    // =========================================================================

    /// Insert a category.
    pub fn add_category(&self, name: &str) -> Category {
        let category = Category {
            id: CategoryId::new(self.inner.category_ids.next()),
            name: name.to_owned(),
            description: None,
            created_at: Utc::now(),
        };
        write(&self.inner.categories).insert(category.id, category.clone());
        category
    }

    /// Insert a product with the given price and stock.
    pub fn add_product(
        &self,
        name: &str,
        price: Money,
        stock: u32,
        category_id: Option<CategoryId>,
    ) -> Product {
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(self.inner.product_ids.next()),
            name: name.to_owned(),
            description: None,
            price,
            stock,
            category_id,
            created_at: now,
            updated_at: now,
        };
        write(&self.inner.products).insert(product.id, Arc::new(ProductRow::new(product.clone())));
        product
    }

    /// Change a product's current price.
    pub fn set_price(&self, id: ProductId, price: Money) -> bool {
        let Some(row) = self.row(id) else {
            return false;
        };
        let mut product = write(&row.product);
        product.price = price;
        product.updated_at = Utc::now();
        true
    }

    /// Stock as a reader would see it.
    #[must_use]
    pub fn stock_of(&self, id: ProductId) -> Option<u32> {
        self.row(id).map(|row| row.snapshot().stock)
    }

    /// Number of committed orders.
    #[must_use]
    pub fn order_count(&self) -> usize {
        read(&self.inner.orders).rows.len()
    }

    /// Number of stored session tokens, live or expired.
    #[must_use]
    pub fn token_count(&self) -> usize {
        lock(&self.inner.tokens).len()
    }

    fn row(&self, id: ProductId) -> Option<Arc<ProductRow>> {
        read(&self.inner.products).get(&id).cloned()
    }
}

// =============================================================================
// Principals
// =============================================================================

#[async_trait]
impl PrincipalStore for MemoryStore {
    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<Principal>, StoreError> {
        Ok(read(&self.inner.principals)
            .get(&id)
            .map(|(principal, _)| principal.clone()))
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<Principal>, StoreError> {
        Ok(self
            .find_with_password_hash(email)
            .await?
            .map(|(principal, _)| principal))
    }

    async fn find_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(Principal, String)>, StoreError> {
        Ok(read(&self.inner.principals)
            .values()
            .find(|(principal, _)| &principal.email == email)
            .cloned())
    }

    async fn insert(&self, new: NewPrincipal) -> Result<Principal, StoreError> {
        let mut principals = write(&self.inner.principals);
        if principals.values().any(|(p, _)| p.email == new.email) {
            return Err(StoreError::Conflict("email already exists".to_owned()));
        }

        let principal = Principal {
            id: PrincipalId::new(self.inner.principal_ids.next()),
            name: new.name,
            email: new.email,
            role: new.role,
            created_at: new.created_at,
        };
        principals.insert(principal.id, (principal.clone(), new.password_hash));
        Ok(principal)
    }

    async fn list(&self, role: Option<Role>) -> Result<Vec<Principal>, StoreError> {
        Ok(read(&self.inner.principals)
            .values()
            .filter(|(p, _)| role.is_none_or(|role| p.role == role))
            .map(|(p, _)| p.clone())
            .collect())
    }

    async fn delete(&self, id: PrincipalId) -> Result<bool, StoreError> {
        let removed = write(&self.inner.principals).remove(&id).is_some();
        if removed {
            lock(&self.inner.tokens).retain(|_, token| token.principal_id != id);
            for entry in lock(&self.inner.activity).iter_mut() {
                if entry.actor_id == Some(id) {
                    entry.actor_id = None;
                }
            }
        }
        Ok(removed)
    }

    async fn any_admin_exists(&self) -> Result<bool, StoreError> {
        Ok(read(&self.inner.principals)
            .values()
            .any(|(p, _)| p.is_admin()))
    }
}

// =============================================================================
// Session tokens
// =============================================================================

#[async_trait]
impl TokenStore for MemoryStore {
    async fn replace_for_principal(&self, token: &SessionToken) -> Result<(), StoreError> {
        let mut tokens = lock(&self.inner.tokens);
        tokens.retain(|_, existing| existing.principal_id != token.principal_id);
        tokens.insert(token.value.clone(), token.clone());
        Ok(())
    }

    async fn find(&self, value: &str) -> Result<Option<SessionToken>, StoreError> {
        Ok(lock(&self.inner.tokens).get(value).cloned())
    }

    async fn delete(&self, value: &str) -> Result<bool, StoreError> {
        Ok(lock(&self.inner.tokens).remove(value).is_some())
    }

    async fn extend(&self, value: &str, expires_at: DateTime<Utc>) -> Result<bool, StoreError> {
        Ok(lock(&self.inner.tokens)
            .get_mut(value)
            .map(|token| token.expires_at = expires_at)
            .is_some())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tokens = lock(&self.inner.tokens);
        let before = tokens.len();
        tokens.retain(|_, token| token.expires_at >= now);
        Ok(u64::try_from(before - tokens.len()).unwrap_or(u64::MAX))
    }
}

// =============================================================================
// Catalog and stock
// =============================================================================

#[async_trait]
impl Catalog for MemoryStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.row(id).map(|row| row.snapshot()))
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        Ok(read(&self.inner.categories).get(&id).cloned())
    }

    async fn list_low_stock(&self, threshold: u32) -> Result<Vec<Product>, StoreError> {
        let mut products: Vec<Product> = read(&self.inner.products)
            .values()
            .map(|row| row.snapshot())
            .filter(|product| product.stock < threshold)
            .collect();
        products.sort_by_key(|product| (product.stock, product.id));
        Ok(products)
    }
}

#[async_trait]
impl StockLedger for MemoryStore {
    async fn reserve(
        &self,
        product: ProductId,
        quantity: u32,
    ) -> Result<Reservation, StoreError> {
        Ok(self
            .row(product)
            .map_or(Reservation::UnknownProduct, |row| row.try_take(quantity)))
    }

    async fn restock(&self, product: ProductId, quantity: u32) -> Result<Option<u32>, StoreError> {
        let Some(row) = self.row(product) else {
            return Ok(None);
        };
        row.put_back(quantity)?;
        write(&row.product).updated_at = Utc::now();
        Ok(Some(row.snapshot().stock))
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Unit of work over the in-memory tables.
struct MemoryTx {
    store: MemoryStore,
    held: Vec<(Arc<ProductRow>, u32)>,
    pending: Option<Order>,
}

impl MemoryTx {
    fn release_all(&mut self) {
        for (row, quantity) in self.held.drain(..) {
            row.release(quantity);
        }
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[async_trait]
impl FulfillmentTx for MemoryTx {
    async fn reserve(
        &mut self,
        product: ProductId,
        quantity: u32,
    ) -> Result<Reservation, StoreError> {
        let Some(row) = self.store.row(product) else {
            return Ok(Reservation::UnknownProduct);
        };

        let outcome = row.hold(quantity);
        if matches!(outcome, Reservation::Reserved { .. }) {
            self.held.push((row, quantity));
        }
        Ok(outcome)
    }

    async fn insert_order(&mut self, new: &NewOrder) -> Result<Order, StoreError> {
        if self.store.tracking_id_taken(&new.tracking_id) {
            return Err(StoreError::Conflict(format!(
                "tracking id {} already exists",
                new.tracking_id
            )));
        }

        let items = new
            .lines
            .iter()
            .map(|line| OrderItem {
                id: OrderItemId::new(self.store.inner.item_ids.next()),
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();

        let order = Order {
            id: OrderId::new(self.store.inner.order_ids.next()),
            tracking_id: new.tracking_id.clone(),
            customer: new.customer.clone(),
            total_amount: new.total_amount,
            status: OrderStatus::Pending,
            created_at: new.created_at,
            items,
        };
        self.pending = Some(order.clone());
        Ok(order)
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        let mut orders = write(&self.store.inner.orders);

        if let Some(order) = self.pending.take() {
            if orders.by_tracking_id.contains_key(&order.tracking_id) {
                return Err(StoreError::Conflict(format!(
                    "tracking id {} already exists",
                    order.tracking_id
                )));
            }
            orders
                .by_tracking_id
                .insert(order.tracking_id.clone(), order.id);
            orders.rows.insert(order.id, order);
        }

        for (row, quantity) in self.held.drain(..) {
            row.settle(quantity);
        }
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), StoreError> {
        self.pending = None;
        self.release_all();
        Ok(())
    }
}

impl MemoryStore {
    /// Put every item's units back, or none of them.
    fn return_units(&self, items: &[OrderItem]) -> Result<(), StoreError> {
        let mut per_product: BTreeMap<ProductId, (Arc<ProductRow>, u32)> = BTreeMap::new();
        for item in items {
            let Some(row) = self.row(item.product_id) else {
                continue;
            };
            let entry = per_product.entry(item.product_id).or_insert((row, 0));
            entry.1 = entry
                .1
                .checked_add(item.quantity)
                .ok_or_else(|| StoreError::Conflict("stock overflow".to_owned()))?;
        }

        if per_product
            .values()
            .any(|(row, quantity)| !row.has_room_for(*quantity))
        {
            return Err(StoreError::Conflict("stock overflow".to_owned()));
        }

        let mut applied: Vec<(Arc<ProductRow>, u32)> = Vec::with_capacity(per_product.len());
        for (row, quantity) in per_product.into_values() {
            if let Err(err) = row.put_back(quantity) {
                // A concurrent restock filled the row after the check.
                for (row, quantity) in applied {
                    let _ = row.try_take(quantity);
                }
                return Err(err);
            }
            applied.push((row, quantity));
        }
        Ok(())
    }

    fn tracking_id_taken(&self, tracking_id: &TrackingId) -> bool {
        read(&self.inner.orders)
            .by_tracking_id
            .contains_key(tracking_id)
    }
}

fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn FulfillmentTx>, StoreError> {
        Ok(Box::new(MemoryTx {
            store: self.clone(),
            held: Vec::new(),
            pending: None,
        }))
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(read(&self.inner.orders).rows.get(&id).cloned())
    }

    async fn find_by_tracking_id(
        &self,
        tracking_id: &TrackingId,
    ) -> Result<Option<Order>, StoreError> {
        let orders = read(&self.inner.orders);
        Ok(orders
            .by_tracking_id
            .get(tracking_id)
            .and_then(|id| orders.rows.get(id))
            .cloned())
    }

    async fn tracking_id_exists(&self, tracking_id: &TrackingId) -> Result<bool, StoreError> {
        Ok(self.tracking_id_taken(tracking_id))
    }

    async fn list_by_email(&self, email: &Email) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = read(&self.inner.orders)
            .rows
            .values()
            .filter(|order| order.customer.email.as_ref() == Some(email))
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn list(
        &self,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Page<Order>, StoreError> {
        let mut orders: Vec<Order> = read(&self.inner.orders)
            .rows
            .values()
            .filter(|order| status.is_none_or(|status| order.status == status))
            .cloned()
            .collect();
        newest_first(&mut orders);

        let total = u64::try_from(orders.len()).unwrap_or(u64::MAX);
        let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(page.size()).unwrap_or(usize::MAX);

        Ok(Page {
            items: orders.into_iter().skip(skip).take(take).collect(),
            page: page.page(),
            size: page.size(),
            total,
        })
    }

    async fn transition(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        release_stock: bool,
    ) -> Result<StatusUpdate, StoreError> {
        let mut orders = write(&self.inner.orders);
        let Some(order) = orders.rows.get_mut(&id) else {
            return Ok(StatusUpdate::NotFound);
        };
        if order.status != from {
            return Ok(StatusUpdate::Stale {
                current: order.status,
            });
        }

        if release_stock {
            self.return_units(&order.items)?;
        }
        order.status = to;
        Ok(StatusUpdate::Applied(order.clone()))
    }
}

// =============================================================================
// Activity log
// =============================================================================

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append(&self, entry: NewActivity) -> Result<ActivityLog, StoreError> {
        let log = ActivityLog {
            id: ActivityLogId::new(self.inner.activity_ids.next()),
            actor_id: entry.actor_id,
            action: entry.action.as_str().to_owned(),
            details: entry.details,
            recorded_at: entry.recorded_at,
        };
        lock(&self.inner.activity).push(log.clone());
        Ok(log)
    }

    async fn list_all(&self) -> Result<Vec<ActivityLog>, StoreError> {
        Ok(lock(&self.inner.activity).iter().rev().cloned().collect())
    }

    async fn list_by_actor(&self, actor: PrincipalId) -> Result<Vec<ActivityLog>, StoreError> {
        Ok(lock(&self.inner.activity)
            .iter()
            .rev()
            .filter(|entry| entry.actor_id == Some(actor))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::{CustomerInfo, NewOrderLine};

    fn order_for(product: ProductId, quantity: u32, tracking: u8) -> NewOrder {
        NewOrder {
            tracking_id: TrackingId::from_entropy([tracking; 10]),
            customer: CustomerInfo {
                name: "Ada Lovelace".to_owned(),
                phone: "5550100".to_owned(),
                email: None,
                address: "12 Analytical Row".to_owned(),
            },
            lines: vec![NewOrderLine {
                product_id: product,
                quantity,
                unit_price: Money::from_cents(1000),
            }],
            total_amount: Money::from_cents(1000).times(quantity).unwrap(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_reserve_floors_at_zero() {
        let store = MemoryStore::new();
        let product = store.add_product("Mug", Money::from_cents(1000), 5, None);

        assert!(matches!(
            StockLedger::reserve(&store, product.id, 3).await.unwrap(),
            Reservation::Reserved { remaining: 2, .. }
        ));
        assert_eq!(
            StockLedger::reserve(&store, product.id, 3).await.unwrap(),
            Reservation::Insufficient { shortfall: 1 }
        );
        assert_eq!(store.stock_of(product.id), Some(2));
        assert_eq!(
            StockLedger::reserve(&store, ProductId::new(99), 1).await.unwrap(),
            Reservation::UnknownProduct
        );
    }

    #[tokio::test]
    async fn test_dropped_unit_releases_stock() {
        let store = MemoryStore::new();
        let product = store.add_product("Mug", Money::from_cents(1000), 5, None);

        let mut tx = store.begin().await.unwrap();
        tx.reserve(product.id, 4).await.unwrap();
        tx.insert_order(&order_for(product.id, 4, 1)).await.unwrap();
        assert_eq!(store.order_count(), 0);
        assert_eq!(store.stock_of(product.id), Some(5));
        drop(tx);

        assert_eq!(store.stock_of(product.id), Some(5));
        assert!(matches!(
            StockLedger::reserve(&store, product.id, 5).await.unwrap(),
            Reservation::Reserved { remaining: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_commit_publishes_order_and_stock() {
        let store = MemoryStore::new();
        let product = store.add_product("Mug", Money::from_cents(1000), 5, None);

        let mut tx = store.begin().await.unwrap();
        tx.reserve(product.id, 2).await.unwrap();
        let order = tx.insert_order(&order_for(product.id, 2, 1)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.order_count(), 1);
        assert_eq!(store.stock_of(product.id), Some(3));
        assert!(
            store
                .tracking_id_exists(&order.tracking_id)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_commit_rejects_duplicate_tracking_id() {
        let store = MemoryStore::new();
        let product = store.add_product("Mug", Money::from_cents(1000), 5, None);

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.reserve(product.id, 1).await.unwrap();
        second.reserve(product.id, 1).await.unwrap();
        first.insert_order(&order_for(product.id, 1, 7)).await.unwrap();
        second.insert_order(&order_for(product.id, 1, 7)).await.unwrap();

        first.commit().await.unwrap();
        assert!(matches!(
            second.commit().await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(store.order_count(), 1);
        assert_eq!(store.stock_of(product.id), Some(4));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_rolled_back_units_never_show_in_stock() {
        use std::sync::atomic::AtomicBool;

        let store = MemoryStore::new();
        let plenty = store.add_product("Kettle", Money::from_cents(3000), 5, None).id;
        let empty = store.add_product("Filter", Money::from_cents(200), 0, None).id;
        let done = Arc::new(AtomicBool::new(false));

        let mut writers = Vec::new();
        for _ in 0..3 {
            let store = store.clone();
            writers.push(tokio::spawn(async move {
                for _ in 0..2_000 {
                    let mut tx = store.begin().await.unwrap();
                    tx.reserve(plenty, 3).await.unwrap();
                    let second = tx.reserve(empty, 1).await.unwrap();
                    assert!(matches!(second, Reservation::Insufficient { .. }));
                    tx.rollback().await.unwrap();
                }
            }));
        }

        let reader = {
            let store = store.clone();
            let done = Arc::clone(&done);
            tokio::spawn(async move {
                let mut reads = 0_u64;
                while !done.load(Ordering::SeqCst) {
                    assert_eq!(store.stock_of(plenty), Some(5));
                    reads += 1;
                    tokio::task::yield_now().await;
                }
                reads
            })
        };

        for writer in writers {
            writer.await.unwrap();
        }
        done.store(true, Ordering::SeqCst);

        assert!(reader.await.unwrap() > 0);
        assert_eq!(store.stock_of(plenty), Some(5));
        assert_eq!(store.order_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_restock_is_all_or_nothing() {
        let store = MemoryStore::new();
        let mug = store.add_product("Mug", Money::from_cents(1000), 5, None);
        let cap = store.add_product("Cap", Money::from_cents(1000), 5, None);

        let mut draft = order_for(mug.id, 2, 3);
        draft.lines.push(NewOrderLine {
            product_id: cap.id,
            quantity: 2,
            unit_price: Money::from_cents(1000),
        });
        let mut tx = store.begin().await.unwrap();
        tx.reserve(mug.id, 2).await.unwrap();
        tx.reserve(cap.id, 2).await.unwrap();
        let order = tx.insert_order(&draft).await.unwrap();
        tx.commit().await.unwrap();

        // Fill the cap counter so returning two units would overflow it.
        StockLedger::restock(&store, cap.id, u32::MAX - 3).await.unwrap();

        let result = store
            .transition(order.id, OrderStatus::Pending, OrderStatus::Cancelled, true)
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(store.stock_of(mug.id), Some(3));
        assert_eq!(store.stock_of(cap.id), Some(u32::MAX));
        assert_eq!(
            store.get(order.id).await.unwrap().unwrap().status,
            OrderStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_replace_for_principal_keeps_one_token() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let token = |value: &str| SessionToken {
            value: value.to_owned(),
            principal_id: PrincipalId::new(1),
            created_at: now,
            expires_at: now + chrono::Duration::days(7),
        };

        store.replace_for_principal(&token("first")).await.unwrap();
        store.replace_for_principal(&token("second")).await.unwrap();

        assert!(store.find("first").await.unwrap().is_none());
        assert!(store.find("second").await.unwrap().is_some());
        assert_eq!(store.token_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_transition_restocks() {
        let store = MemoryStore::new();
        let product = store.add_product("Mug", Money::from_cents(1000), 5, None);

        let mut tx = store.begin().await.unwrap();
        tx.reserve(product.id, 2).await.unwrap();
        let order = tx.insert_order(&order_for(product.id, 2, 1)).await.unwrap();
        tx.commit().await.unwrap();

        let stale = store
            .transition(order.id, OrderStatus::Shipped, OrderStatus::Delivered, false)
            .await
            .unwrap();
        assert!(matches!(
            stale,
            StatusUpdate::Stale {
                current: OrderStatus::Pending
            }
        ));

        let applied = store
            .transition(order.id, OrderStatus::Pending, OrderStatus::Cancelled, true)
            .await
            .unwrap();
        assert!(matches!(applied, StatusUpdate::Applied(ref o) if o.status == OrderStatus::Cancelled));
        assert_eq!(store.stock_of(product.id), Some(5));
    }
}
