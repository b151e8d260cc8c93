use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, PoisonError};

use async_trait::async_trait;
use common::{DeliveryStatus, Order, OrderId, Product, ProductId, User, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    OrderQuery, Result, StoreError,
    error::{PRODUCTS_NAME_KEY, USERS_EMAIL_KEY},
    store::{Store, Transaction},
};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    products: Vec<Product>,
    orders: HashMap<OrderId, Order>,
}

impl Tables {
    fn product(&self, id: ProductId) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }
}

/// Per-row exclusive locks keyed by id.
///
/// Each row gets its own async mutex; the owned guard is parked in the
/// transaction that took it. An entry lives only while some transaction
/// holds or waits for it.
struct RowLocks<K> {
    rows: Arc<std::sync::Mutex<HashMap<K, Arc<Mutex<()>>>>>,
}

impl<K> Clone for RowLocks<K> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<K> Default for RowLocks<K> {
    fn default() -> Self {
        Self {
            rows: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }
}

impl<K: Eq + Hash + Copy> RowLocks<K> {
    async fn lock(&self, key: K) -> RowGuard<K> {
        let row = {
            let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(rows.entry(key).or_default())
        };
        RowGuard {
            key,
            rows: Arc::clone(&self.rows),
            guard: Some(row.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Held row lock. Releasing the last reference to a row removes its entry.
struct RowGuard<K: Eq + Hash + Copy> {
    key: K,
    rows: Arc<std::sync::Mutex<HashMap<K, Arc<Mutex<()>>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Copy> Drop for RowGuard<K> {
    fn drop(&mut self) {
        // Waiters clone the row under the map lock, so the count is stable here.
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        drop(self.guard.take());
        if rows
            .get(&self.key)
            .is_some_and(|row| Arc::strong_count(row) == 1)
        {
            rows.remove(&self.key);
        }
    }
}

/// In-memory store implementation.
///
/// Provides the same transactional guarantees as the PostgreSQL
/// implementation: row locks block concurrent lockers of the same row,
/// writes are buffered until commit, and an abandoned transaction leaves
/// no trace.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    product_locks: RowLocks<ProductId>,
    order_locks: RowLocks<OrderId>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        Ok(InMemoryTransaction {
            tables: Arc::clone(&self.tables),
            product_locks: self.product_locks.clone(),
            order_locks: self.order_locks.clone(),
            held_products: HashMap::new(),
            held_orders: HashMap::new(),
            stock_writes: HashMap::new(),
            status_writes: HashMap::new(),
            new_orders: Vec::new(),
        })
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation {
                constraint: USERS_EMAIL_KEY,
            });
        }
        tables.users.push(user.clone());
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.tables.read().await.users.clone())
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.products.iter().any(|p| p.name == product.name) {
            return Err(StoreError::UniqueViolation {
                constraint: PRODUCTS_NAME_KEY,
            });
        }
        tables.products.push(product.clone());
        Ok(())
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.read().await.product(id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.tables.read().await.products.clone())
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn query_orders(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<_> = tables
            .orders
            .values()
            .filter(|o| query.matches(o))
            .cloned()
            .collect();

        orders.sort_by(|a, b| {
            b.ordered_at
                .cmp(&a.ordered_at)
                .then(b.id.as_uuid().cmp(&a.id.as_uuid()))
        });

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(orders.into_iter().skip(offset).take(limit).collect())
    }
}

/// Transaction over an [`InMemoryStore`].
pub struct InMemoryTransaction {
    tables: Arc<RwLock<Tables>>,
    product_locks: RowLocks<ProductId>,
    order_locks: RowLocks<OrderId>,
    held_products: HashMap<ProductId, RowGuard<ProductId>>,
    held_orders: HashMap<OrderId, RowGuard<OrderId>>,
    stock_writes: HashMap<ProductId, u32>,
    status_writes: HashMap<OrderId, DeliveryStatus>,
    new_orders: Vec<Order>,
}

impl InMemoryTransaction {
    async fn lock_product(&mut self, id: ProductId) {
        if !self.held_products.contains_key(&id) {
            let guard = self.product_locks.lock(id).await;
            tracing::debug!(product_id = %id, "product row locked");
            self.held_products.insert(id, guard);
        }
    }

    async fn lock_order(&mut self, id: OrderId) {
        if !self.held_orders.contains_key(&id) {
            let guard = self.order_locks.lock(id).await;
            tracing::debug!(order_id = %id, "order row locked");
            self.held_orders.insert(id, guard);
        }
    }

    fn overlay_order(&self, mut order: Order) -> Order {
        if let Some(status) = self.status_writes.get(&order.id) {
            order.status = *status;
        }
        order
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn find_user(&mut self, id: UserId) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_product_for_update(&mut self, id: ProductId) -> Result<Option<Product>> {
        if self.tables.read().await.product(id).is_none() {
            return Ok(None);
        }

        self.lock_product(id).await;

        // Every committed stock write happened under this lock, so the read
        // below observes the latest value.
        let mut product = self.tables.read().await.product(id).cloned();
        if let Some(ref mut product) = product
            && let Some(stock) = self.stock_writes.get(&id)
        {
            product.stock = *stock;
        }
        Ok(product)
    }

    async fn update_product_stock(&mut self, id: ProductId, stock: u32) -> Result<()> {
        if !self.held_products.contains_key(&id) {
            return Err(StoreError::LockNotHeld(id));
        }
        self.stock_writes.insert(id, stock);
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        {
            let tables = self.tables.read().await;
            if !tables.users.iter().any(|u| u.id == order.user_id) {
                return Err(StoreError::NotFound {
                    entity: "User",
                    id: order.user_id.to_string(),
                });
            }
            if tables.product(order.product_id).is_none() {
                return Err(StoreError::NotFound {
                    entity: "Product",
                    id: order.product_id.to_string(),
                });
            }
        }
        self.new_orders.push(order.clone());
        Ok(())
    }

    async fn find_order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        if let Some(order) = self.new_orders.iter().find(|o| o.id == id) {
            return Ok(Some(order.clone()));
        }
        if self.tables.read().await.orders.get(&id).is_none() {
            return Ok(None);
        }

        self.lock_order(id).await;

        let order = self.tables.read().await.orders.get(&id).cloned();
        Ok(order.map(|o| self.overlay_order(o)))
    }

    async fn update_order_status(&mut self, id: OrderId, status: DeliveryStatus) -> Result<()> {
        if let Some(order) = self.new_orders.iter_mut().find(|o| o.id == id) {
            order.status = status;
            return Ok(());
        }
        if self.tables.read().await.orders.get(&id).is_none() {
            return Err(StoreError::NotFound {
                entity: "Order",
                id: id.to_string(),
            });
        }

        self.lock_order(id).await;
        self.status_writes.insert(id, status);
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let InMemoryTransaction {
            tables,
            held_products,
            held_orders,
            stock_writes,
            status_writes,
            new_orders,
            ..
        } = self;

        {
            let mut tables = tables.write().await;
            for (id, stock) in stock_writes {
                if let Some(product) = tables.products.iter_mut().find(|p| p.id == id) {
                    product.stock = stock;
                }
            }
            for order in new_orders {
                tables.orders.insert(order.id, order);
            }
            for (id, status) in status_writes {
                if let Some(order) = tables.orders.get_mut(&id) {
                    order.status = status;
                }
            }
        }

        // Writes are visible before the next lock holder gets in.
        drop(held_products);
        drop(held_orders);
        tracing::debug!("in-memory transaction committed");
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        tracing::debug!("in-memory transaction rolled back");
        Ok(())
    }
}
