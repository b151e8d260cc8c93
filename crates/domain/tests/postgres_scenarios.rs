//! Order scenarios against PostgreSQL row locks.
//!
//! The pool is smaller than the number of concurrent tasks, so callers queue
//! for connections while others hold `FOR UPDATE` locks. These tests need a
//! running Docker daemon and are ignored by default. Run with:
//!
//! ```bash
//! cargo test -p domain --test postgres_scenarios -- --ignored --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use domain::{
    DeliveryStatus, DomainError, Order, OrderService, PlaceOrder, ProductCatalog, ProductId,
    UserDirectory, UserId,
};
use futures_util::future::join_all;
use serial_test::serial;
use sqlx::PgPool;
use store::{OrderQuery, PostgresStore, Store};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

const POOL_SIZE: u32 = 5;
const DEADLINE: Duration = Duration::from_secs(60);

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

struct Fixture {
    store: PostgresStore,
    service: Arc<OrderService<PostgresStore>>,
    user_id: UserId,
    product_id: ProductId,
}

async fn fixture(stock: u32) -> Fixture {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(POOL_SIZE)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE orders, products, users")
        .execute(&pool)
        .await
        .unwrap();

    let store = PostgresStore::new(pool);
    let user = UserDirectory::new(store.clone())
        .register_user("Kim", "kim@example.com", "secret")
        .await
        .unwrap();
    let product = ProductCatalog::new(store.clone())
        .add_product("Widget", 1500, stock)
        .await
        .unwrap();

    Fixture {
        service: Arc::new(OrderService::new(store.clone())),
        store,
        user_id: user.id,
        product_id: product.id,
    }
}

impl Fixture {
    fn order(&self, quantity: u32) -> PlaceOrder {
        PlaceOrder::new(self.user_id, self.product_id, quantity, "1 Main St")
    }

    async fn stock(&self) -> u32 {
        self.store
            .find_product(self.product_id)
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    async fn orders(&self) -> Vec<Order> {
        self.store.query_orders(OrderQuery::new()).await.unwrap()
    }

    async fn place_concurrently(
        &self,
        count: usize,
        quantity: u32,
    ) -> Vec<Result<Order, DomainError>> {
        let handles: Vec<_> = (0..count)
            .map(|_| {
                let service = Arc::clone(&self.service);
                let cmd = self.order(quantity);
                tokio::spawn(async move { service.place_order(cmd).await })
            })
            .collect();

        let joined = tokio::time::timeout(DEADLINE, join_all(handles))
            .await
            .expect("placements did not finish; lock or pool starvation");
        joined.into_iter().map(|r| r.unwrap()).collect()
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Docker"]
    #[serial]
    async fn place_then_cancel_restores_stock() {
        let fx = fixture(100).await;

        let order = fx.service.place_order(fx.order(3)).await.unwrap();
        assert_eq!(fx.stock().await, 97);

        let info = fx.service.cancel_order(order.id).await.unwrap();
        assert_eq!(info.status, DeliveryStatus::Cancelled);
        assert_eq!(info.ordered_at, order.ordered_at);
        assert_eq!(fx.stock().await, 100);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    #[serial]
    async fn cancel_after_preparing_is_rejected() {
        let fx = fixture(10).await;
        let order = fx.service.place_order(fx.order(4)).await.unwrap();

        fx.service
            .update_delivery_status(order.id, DeliveryStatus::Preparing)
            .await
            .unwrap();

        let result = fx.service.cancel_order(order.id).await;
        assert!(matches!(
            result,
            Err(DomainError::InvalidStateTransition {
                current_status: DeliveryStatus::Preparing
            })
        ));
        assert_eq!(fx.stock().await, 6);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    #[serial]
    async fn rejected_placement_releases_product_lock() {
        let fx = fixture(3).await;

        let result = fx.service.place_order(fx.order(5)).await;
        assert!(matches!(
            result,
            Err(DomainError::InsufficientStock {
                current_stock: 3,
                ..
            })
        ));
        assert_eq!(fx.stock().await, 3);
        assert!(fx.orders().await.is_empty());

        // A lock left behind by the failed attempt would stall this call.
        let order = tokio::time::timeout(
            Duration::from_secs(10),
            fx.service.place_order(fx.order(3)),
        )
        .await
        .expect("product row still locked")
        .unwrap();
        assert_eq!(order.quantity, 3);
        assert_eq!(fx.stock().await, 0);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    #[serial]
    async fn unknown_user_leaves_stock_untouched() {
        let fx = fixture(10).await;

        let result = fx
            .service
            .place_order(PlaceOrder::new(UserId::new(), fx.product_id, 1, "1 Main St"))
            .await;

        assert!(matches!(result, Err(DomainError::UserNotFound(_))));
        assert_eq!(fx.stock().await, 10);
        assert!(fx.orders().await.is_empty());
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    #[ignore = "requires Docker"]
    #[serial]
    async fn hundred_placements_against_hundred_units() {
        let fx = fixture(100).await;

        let results = fx.place_concurrently(100, 1).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(fx.stock().await, 0);
        assert_eq!(fx.orders().await.len(), 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    #[ignore = "requires Docker"]
    #[serial]
    async fn hundred_placements_against_ten_units() {
        let fx = fixture(10).await;

        let results = fx.place_concurrently(100, 1).await;

        let mut succeeded = 0;
        let mut insufficient = 0;
        for result in results {
            match result {
                Ok(_) => succeeded += 1,
                Err(DomainError::InsufficientStock { .. }) => insufficient += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(succeeded, 10);
        assert_eq!(insufficient, 90);
        assert_eq!(fx.stock().await, 0);
        assert_eq!(fx.orders().await.len(), 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    #[ignore = "requires Docker"]
    #[serial]
    async fn racing_cancellations_restore_once() {
        let fx = fixture(10).await;
        let order_id = fx.service.place_order(fx.order(4)).await.unwrap().id;

        let results = tokio::time::timeout(
            DEADLINE,
            join_all((0..8).map(|_| {
                let service = Arc::clone(&fx.service);
                async move { service.cancel_order(order_id).await }
            })),
        )
        .await
        .expect("cancellations did not finish");

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().all(|r| matches!(
            r,
            Ok(_)
                | Err(DomainError::InvalidStateTransition {
                    current_status: DeliveryStatus::Cancelled
                })
        )));
        assert_eq!(fx.stock().await, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    #[ignore = "requires Docker"]
    #[serial]
    async fn cancellation_racing_status_update_restores_at_most_once() {
        let fx = fixture(10).await;
        let order_id = fx.service.place_order(fx.order(4)).await.unwrap().id;

        let cancel = {
            let service = Arc::clone(&fx.service);
            tokio::spawn(async move { service.cancel_order(order_id).await })
        };
        let update = {
            let service = Arc::clone(&fx.service);
            tokio::spawn(async move {
                service
                    .update_delivery_status(order_id, DeliveryStatus::Preparing)
                    .await
            })
        };

        let (cancel, update) = tokio::time::timeout(DEADLINE, async {
            (cancel.await.unwrap(), update.await.unwrap())
        })
        .await
        .expect("order row lock was never released");
        update.unwrap();

        let status = fx.store.find_order(order_id).await.unwrap().unwrap().status;
        match cancel {
            // Cancel won: stock restored, then the update overwrote the status.
            Ok(_) => {
                assert_eq!(status, DeliveryStatus::Preparing);
                assert_eq!(fx.stock().await, 10);
            }
            Err(DomainError::InvalidStateTransition {
                current_status: DeliveryStatus::Preparing,
            }) => {
                assert_eq!(status, DeliveryStatus::Preparing);
                assert_eq!(fx.stock().await, 6);
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    #[ignore = "requires Docker"]
    #[serial]
    async fn mixed_placements_and_cancellations_conserve_stock() {
        let initial = 50;
        let fx = fixture(initial).await;

        let mut seeded = Vec::new();
        for _ in 0..10 {
            seeded.push(fx.service.place_order(fx.order(2)).await.unwrap());
        }

        let mut handles = Vec::new();
        for order in &seeded {
            let service = Arc::clone(&fx.service);
            let order_id = order.id;
            handles.push(tokio::spawn(async move {
                service.cancel_order(order_id).await.map(|_| ())
            }));
        }
        for _ in 0..40 {
            let service = Arc::clone(&fx.service);
            let cmd = fx.order(1);
            handles.push(tokio::spawn(async move {
                service.place_order(cmd).await.map(|_| ())
            }));
        }

        let results = tokio::time::timeout(DEADLINE, join_all(handles))
            .await
            .expect("mixed workload did not finish");
        for result in results {
            match result.unwrap() {
                Ok(()) | Err(DomainError::InsufficientStock { .. }) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        let orders = fx.orders().await;
        let cancelled = orders.iter().filter(|o| o.status.is_cancelled()).count();
        let active: u32 = orders
            .iter()
            .filter(|o| !o.status.is_cancelled())
            .map(|o| o.quantity)
            .sum();
        assert_eq!(cancelled, seeded.len());
        assert_eq!(fx.stock().await + active, initial);
    }
}
