//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p inventory --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::{OrderId, ProductId};
use inventory::{
    InMemoryInventoryStore, InventoryError, InventoryRecord, InventoryStore,
    PostgresInventoryStore, StockLine,
};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Apply the schema once through the embedded migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresInventoryStore::new(temp_pool.clone())
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

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresInventoryStore {
    let info = get_container_info().await;

    // Create a fresh pool for each test to avoid connection issues
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation
    sqlx::query("TRUNCATE TABLE inventory_holds, inventory_records")
        .execute(&pool)
        .await
        .unwrap();

    PostgresInventoryStore::new(pool)
}

async fn seed(store: &PostgresInventoryStore, product: &str, on_hand: u32) {
    store
        .create_record(InventoryRecord::new(product, on_hand, "WH-A"))
        .await
        .unwrap();
}

async fn counters(store: &PostgresInventoryStore, product: &str) -> (u32, u32) {
    let record = store
        .get_record(&ProductId::new(product))
        .await
        .unwrap()
        .unwrap();
    (record.on_hand, record.reserved)
}

#[tokio::test]
async fn create_and_get_record() {
    let store = get_test_store().await;

    store
        .create_record(InventoryRecord::new("SKU-001", 10, "WH-A").with_reorder(3, 50))
        .await
        .unwrap();

    let record = store
        .get_record(&ProductId::new("SKU-001"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.on_hand, 10);
    assert_eq!(record.reserved, 0);
    assert_eq!(record.warehouse_location, "WH-A");
    assert_eq!(record.reorder_threshold, 3);
    assert!(record.active);

    assert!(
        store
            .get_record(&ProductId::new("SKU-404"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn duplicate_create_conflicts() {
    let store = get_test_store().await;
    seed(&store, "SKU-001", 10).await;

    let result = store
        .create_record(InventoryRecord::new("SKU-001", 5, "WH-B"))
        .await;
    assert!(matches!(result, Err(InventoryError::AlreadyExists(_))));
    // The existing record is untouched.
    assert_eq!(counters(&store, "SKU-001").await, (10, 0));
}

#[tokio::test]
async fn reserve_updates_counters() {
    let store = get_test_store().await;
    seed(&store, "SKU-001", 10).await;

    store
        .reserve(OrderId::new(), &[StockLine::new("SKU-001", 8)])
        .await
        .unwrap();

    let record = store
        .get_record(&ProductId::new("SKU-001"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.reserved, 8);
    assert_eq!(record.available(), 2);
}

#[tokio::test]
async fn reserve_beyond_available_fails() {
    let store = get_test_store().await;
    seed(&store, "SKU-001", 10).await;
    store
        .reserve(OrderId::new(), &[StockLine::new("SKU-001", 8)])
        .await
        .unwrap();

    let result = store
        .reserve(OrderId::new(), &[StockLine::new("SKU-001", 5)])
        .await;

    match result {
        Err(InventoryError::InsufficientStock {
            requested,
            available,
            ..
        }) => {
            assert_eq!(requested, 5);
            assert_eq!(available, 2);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert_eq!(counters(&store, "SKU-001").await, (10, 8));
}

#[tokio::test]
async fn reserve_is_idempotent_per_order() {
    let store = get_test_store().await;
    seed(&store, "SKU-001", 10).await;
    let order = OrderId::new();
    let lines = [StockLine::new("SKU-001", 4)];

    store.reserve(order, &lines).await.unwrap();
    store.reserve(order, &lines).await.unwrap();

    assert_eq!(counters(&store, "SKU-001").await, (10, 4));
}

#[tokio::test]
async fn replay_with_different_items_conflicts() {
    let store = get_test_store().await;
    seed(&store, "SKU-001", 10).await;
    let order = OrderId::new();
    store
        .reserve(order, &[StockLine::new("SKU-001", 4)])
        .await
        .unwrap();

    let result = store
        .reserve(order, &[StockLine::new("SKU-001", 5)])
        .await;
    assert!(matches!(
        result,
        Err(InventoryError::ReservationConflict(o)) if o == order
    ));
    assert_eq!(counters(&store, "SKU-001").await, (10, 4));
}

#[tokio::test]
async fn multi_item_reserve_is_all_or_nothing() {
    let store = get_test_store().await;
    seed(&store, "SKU-001", 10).await;
    seed(&store, "SKU-002", 1).await;

    let result = store
        .reserve(
            OrderId::new(),
            &[StockLine::new("SKU-001", 5), StockLine::new("SKU-002", 2)],
        )
        .await;

    assert!(matches!(
        result,
        Err(InventoryError::InsufficientStock { .. })
    ));
    // The aborted transaction left both rows unchanged.
    assert_eq!(counters(&store, "SKU-001").await, (10, 0));
    assert_eq!(counters(&store, "SKU-002").await, (1, 0));
}

#[tokio::test]
async fn release_is_clamped_to_the_orders_hold() {
    let store = get_test_store().await;
    seed(&store, "SKU-001", 10).await;
    let order_a = OrderId::new();
    let order_b = OrderId::new();
    store
        .reserve(order_a, &[StockLine::new("SKU-001", 5)])
        .await
        .unwrap();
    store
        .reserve(order_b, &[StockLine::new("SKU-001", 3)])
        .await
        .unwrap();

    // Double release of order A must not consume order B's hold.
    store
        .release(order_a, &[StockLine::new("SKU-001", 5)])
        .await
        .unwrap();
    store
        .release(order_a, &[StockLine::new("SKU-001", 5)])
        .await
        .unwrap();

    assert_eq!(counters(&store, "SKU-001").await, (10, 3));
}

#[tokio::test]
async fn release_for_unknown_order_is_a_no_op() {
    let store = get_test_store().await;
    seed(&store, "SKU-001", 10).await;

    store
        .release(OrderId::new(), &[StockLine::new("SKU-001", 4)])
        .await
        .unwrap();
    assert_eq!(counters(&store, "SKU-001").await, (10, 0));
}

#[tokio::test]
async fn confirm_round_trip_is_clamped_on_replay() {
    let store = get_test_store().await;
    seed(&store, "SKU-001", 10).await;
    let order = OrderId::new();
    store
        .reserve(order, &[StockLine::new("SKU-001", 4)])
        .await
        .unwrap();

    store
        .confirm(order, &[StockLine::new("SKU-001", 4)])
        .await
        .unwrap();
    store
        .confirm(order, &[StockLine::new("SKU-001", 4)])
        .await
        .unwrap();

    assert_eq!(counters(&store, "SKU-001").await, (6, 0));
}

#[tokio::test]
async fn failed_confirm_rolls_back_entirely() {
    let store = get_test_store().await;
    seed(&store, "SKU-001", 10).await;
    let order = OrderId::new();
    store
        .reserve(order, &[StockLine::new("SKU-001", 4)])
        .await
        .unwrap();

    let result = store
        .confirm(
            order,
            &[StockLine::new("SKU-001", 4), StockLine::new("SKU-404", 1)],
        )
        .await;

    assert!(matches!(result, Err(InventoryError::NotFound(_))));
    assert_eq!(counters(&store, "SKU-001").await, (10, 4));

    // The hold survived the rollback; the corrected retry still works.
    store
        .confirm(order, &[StockLine::new("SKU-001", 4)])
        .await
        .unwrap();
    assert_eq!(counters(&store, "SKU-001").await, (6, 0));
}

#[tokio::test]
async fn adjust_stock_cannot_shrink_below_reserved() {
    let store = get_test_store().await;
    seed(&store, "SKU-001", 10).await;
    store
        .reserve(OrderId::new(), &[StockLine::new("SKU-001", 6)])
        .await
        .unwrap();

    let result = store.adjust_stock(&ProductId::new("SKU-001"), 4).await;
    assert!(matches!(result, Err(InventoryError::InvalidArgument(_))));

    store
        .adjust_stock(&ProductId::new("SKU-001"), 20)
        .await
        .unwrap();
    assert_eq!(counters(&store, "SKU-001").await, (20, 6));
}

#[tokio::test]
async fn inactive_product_rejects_reservations() {
    let store = get_test_store().await;
    seed(&store, "SKU-001", 10).await;
    store
        .set_active(&ProductId::new("SKU-001"), false)
        .await
        .unwrap();

    let result = store
        .reserve(OrderId::new(), &[StockLine::new("SKU-001", 1)])
        .await;
    assert!(matches!(result, Err(InventoryError::Inactive(_))));
}

#[tokio::test]
async fn concurrent_reservations_never_oversell() {
    let store = get_test_store().await;
    seed(&store, "SKU-001", 10).await;

    let mut tasks = Vec::new();
    for _ in 0..25 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store
                .reserve(OrderId::new(), &[StockLine::new("SKU-001", 1)])
                .await
                .is_ok()
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 10);
    assert_eq!(counters(&store, "SKU-001").await, (10, 10));
}

#[tokio::test]
async fn matches_in_memory_store_on_the_saga_sequence() {
    let pg = get_test_store().await;
    let mem = InMemoryInventoryStore::new();
    let order = OrderId::new();
    let lines = [StockLine::new("SKU-001", 4)];

    for store in [&pg as &dyn InventoryStore, &mem as &dyn InventoryStore] {
        store
            .create_record(InventoryRecord::new("SKU-001", 10, "WH-A"))
            .await
            .unwrap();
        store.reserve(order, &lines).await.unwrap();
        store.release(order, &lines).await.unwrap();
        store.reserve(order, &lines).await.unwrap();
    }

    let pg_record = pg
        .get_record(&ProductId::new("SKU-001"))
        .await
        .unwrap()
        .unwrap();
    let mem_record = mem
        .get_record(&ProductId::new("SKU-001"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pg_record, mem_record);
}
