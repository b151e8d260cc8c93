use async_trait::async_trait;
use common::{DeliveryStatus, Order, OrderId, Product, ProductId, User, UserId};

use crate::{OrderQuery, Result};

/// Core trait for store implementations.
///
/// A store persists users, products, and orders. Plain reads and inserts
/// go straight through the store; anything that must be atomic with a
/// stock change runs inside a [`Transaction`] obtained from [`Store::begin`].
/// All implementations must be thread-safe and cheap to clone.
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    /// The transaction type handed out by [`Store::begin`].
    type Tx: Transaction;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Persists a new user.
    ///
    /// Fails with `UniqueViolation` if the email is already registered.
    async fn insert_user(&self, user: &User) -> Result<()>;

    /// Retrieves a user by id.
    async fn find_user(&self, id: UserId) -> Result<Option<User>>;

    /// Retrieves a user by email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Retrieves every user, oldest registration first.
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Persists a new product.
    ///
    /// Fails with `UniqueViolation` if the name is already taken.
    async fn insert_product(&self, product: &Product) -> Result<()>;

    /// Retrieves a product by id without locking it.
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Retrieves every product.
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Retrieves an order by id without locking it.
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Retrieves orders matching a query, newest first.
    async fn query_orders(&self, query: OrderQuery) -> Result<Vec<Order>>;
}

/// A unit of work against the store.
///
/// Row locks taken through the `_for_update` methods are held until the
/// transaction commits, rolls back, or is dropped. Writes become visible to
/// other callers only on commit; dropping an uncommitted transaction
/// discards them.
#[async_trait]
pub trait Transaction: Send + Sized {
    /// Retrieves a user by id.
    async fn find_user(&mut self, id: UserId) -> Result<Option<User>>;

    /// Retrieves a product and takes its exclusive row lock.
    ///
    /// Blocks while another transaction holds the lock. Taking a lock this
    /// transaction already holds returns immediately.
    async fn find_product_for_update(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Overwrites a product's stock.
    ///
    /// The product must have been locked by this transaction.
    async fn update_product_stock(&mut self, id: ProductId, stock: u32) -> Result<()>;

    /// Persists a new order.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Retrieves an order and takes its exclusive row lock.
    async fn find_order_for_update(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Overwrites an order's delivery status.
    async fn update_order_status(&mut self, id: OrderId, status: DeliveryStatus) -> Result<()>;

    /// Makes every write visible and releases all locks.
    async fn commit(self) -> Result<()>;

    /// Discards every write and releases all locks.
    async fn rollback(self) -> Result<()>;
}
