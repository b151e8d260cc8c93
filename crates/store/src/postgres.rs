use async_trait::async_trait;
use common::{DeliveryStatus, Order, OrderId, Product, ProductId, Role, User, UserId};
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    OrderQuery, Result, StoreError,
    error::{PRODUCTS_NAME_KEY, USERS_EMAIL_KEY},
    store::{Store, Transaction},
};

const ORDER_COLUMNS: &str =
    "id, user_id, product_id, product_name, quantity, shipping_address, status, ordered_at";

/// PostgreSQL-backed store implementation.
///
/// Row locks map onto `SELECT ... FOR UPDATE`, held until the enclosing
/// database transaction ends.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn row_to_user(row: PgRow) -> Result<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        credential_secret: row.try_get("credential_secret")?,
        role: Role::parse(&role)
            .ok_or_else(|| StoreError::InvalidRow(format!("unknown role {role}")))?,
    })
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        price: row.try_get("price")?,
        stock: to_u32("stock", row.try_get("stock")?)?,
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        product_name: row.try_get("product_name")?,
        quantity: to_u32("quantity", row.try_get("quantity")?)?,
        shipping_address: row.try_get("shipping_address")?,
        status: status
            .parse::<DeliveryStatus>()
            .map_err(|e| StoreError::InvalidRow(e.to_string()))?,
        ordered_at: row.try_get("ordered_at")?,
    })
}

fn to_u32(column: &str, value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::InvalidRow(format!("{column} out of range: {value}")))
}

/// Maps unique-constraint violations onto `UniqueViolation`.
fn map_unique(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        match db_err.constraint() {
            Some(USERS_EMAIL_KEY) => {
                return StoreError::UniqueViolation {
                    constraint: USERS_EMAIL_KEY,
                };
            }
            Some(PRODUCTS_NAME_KEY) => {
                return StoreError::UniqueViolation {
                    constraint: PRODUCTS_NAME_KEY,
                };
            }
            _ => {}
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTransaction {
            tx,
            locked_products: Vec::new(),
        })
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, credential_secret, role)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.credential_secret)
        .bind(user.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_unique)?;
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        sqlx::query("SELECT id, name, email, credential_secret, role FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(row_to_user)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query("SELECT id, name, email, credential_secret, role FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(row_to_user)
            .transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, name, email, credential_secret, role FROM users ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_user).collect()
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        sqlx::query("INSERT INTO products (id, name, price, stock) VALUES ($1, $2, $3, $4)")
            .bind(product.id.as_uuid())
            .bind(&product.name)
            .bind(product.price)
            .bind(i64::from(product.stock))
            .execute(&self.pool)
            .await
            .map_err(map_unique)?;
        Ok(())
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
        sqlx::query("SELECT id, name, price, stock FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(row_to_product)
            .transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query("SELECT id, name, price, stock FROM products ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_product).collect()
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(row_to_order)
            .transpose()
    }

    async fn query_orders(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let mut sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1=1");
        let mut param_count = 0;

        if query.user_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND user_id = ${param_count}"));
        }
        if query.statuses.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ANY(${param_count})"));
        }

        sql.push_str(" ORDER BY ordered_at DESC, id DESC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(user_id) = query.user_id {
            sqlx_query = sqlx_query.bind(user_id.as_uuid());
        }
        if let Some(statuses) = query.statuses {
            let names: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
            sqlx_query = sqlx_query.bind(names);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_order).collect()
    }
}

/// Transaction over a [`PostgresStore`].
///
/// Dropping it without committing rolls the database transaction back.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
    locked_products: Vec<ProductId>,
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn find_user(&mut self, id: UserId) -> Result<Option<User>> {
        sqlx::query("SELECT id, name, email, credential_secret, role FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(row_to_user)
            .transpose()
    }

    async fn find_product_for_update(&mut self, id: ProductId) -> Result<Option<Product>> {
        let product = sqlx::query("SELECT id, name, price, stock FROM products WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(row_to_product)
            .transpose()?;

        if product.is_some() && !self.locked_products.contains(&id) {
            tracing::debug!(product_id = %id, "product row locked");
            self.locked_products.push(id);
        }
        Ok(product)
    }

    async fn update_product_stock(&mut self, id: ProductId, stock: u32) -> Result<()> {
        if !self.locked_products.contains(&id) {
            return Err(StoreError::LockNotHeld(id));
        }
        sqlx::query("UPDATE products SET stock = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(i64::from(stock))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.product_id.as_uuid())
        .bind(&order.product_name)
        .bind(i64::from(order.quantity))
        .bind(&order.shipping_address)
        .bind(order.status.as_str())
        .bind(order.ordered_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn find_order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?
        .map(row_to_order)
        .transpose()
    }

    async fn update_order_status(&mut self, id: OrderId, status: DeliveryStatus) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "Order",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        tracing::debug!("postgres transaction committed");
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        tracing::debug!("postgres transaction rolled back");
        Ok(())
    }
}
