//! OrderDesk interface step definitions.

use std::sync::Arc;
use std::time::Duration;

use cucumber::{gherkin::Step, given, then, when, World};
use serde_json::json;

use liveorder::config::Config;
use liveorder::inventory::columns;
use liveorder::orders::{
    final_price, OrderDesk, OrderError, OrderForm, OrderSession, SubmitOutcome, ORDER_COLUMNS,
};
use liveorder::storage::{CachedStore, MockStore, RemoteStore, RetryingStore, StoreError};
use liveorder::utils::retry::{CallExecutor, RetryConfig};

/// Test context for OrderDesk scenarios.
#[derive(World)]
#[world(init = Self::new)]
pub struct OrderDeskWorld {
    mock: Arc<MockStore>,
    config: Config,
    desk: Option<OrderDesk>,
    session: OrderSession,
    form: OrderForm,
    last_result: Option<Result<SubmitOutcome, OrderError>>,
}

impl std::fmt::Debug for OrderDeskWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderDeskWorld")
            .field("mock", &"<MockStore>")
            .field("desk", &self.desk.as_ref().map(|_| "<OrderDesk>"))
            .field("session", &self.session)
            .field("form", &self.form)
            .field("last_result", &self.last_result)
            .finish()
    }
}

impl OrderDeskWorld {
    fn new() -> Self {
        Self {
            mock: Arc::new(MockStore::new()),
            config: Config::for_test(),
            desk: None,
            session: OrderSession::new(),
            form: OrderForm::default(),
            last_result: None,
        }
    }

    /// Build the desk on first use so Given steps can adjust configuration.
    fn desk(&mut self) -> &OrderDesk {
        if self.desk.is_none() {
            let executor = CallExecutor::new(RetryConfig {
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(10),
                ..Default::default()
            });
            let backend: Arc<dyn RemoteStore> = self.mock.clone();
            let retrying: Arc<dyn RemoteStore> = Arc::new(RetryingStore::new(backend, executor));
            let cached = Arc::new(CachedStore::new(retrying, Duration::from_secs(120)));
            let desk = OrderDesk::from_config(cached, &self.config).expect("Invalid config");
            self.desk = Some(desk);
        }
        self.desk.as_ref().expect("desk initialized")
    }

    /// Load inventory into the cache so scripted failures hit the write.
    async fn warm_cache(&mut self) {
        self.desk()
            .inventory()
            .snapshot()
            .await
            .expect("Inventory read failed");
    }

    fn accepted_final_price(&self) -> f64 {
        match &self.last_result {
            Some(Ok(SubmitOutcome::Accepted(receipt))) => receipt.record.final_price,
            other => panic!("Expected an accepted order, got {:?}", other),
        }
    }
}

// --- Given steps ---

#[given("the inventory:")]
async fn given_inventory(world: &mut OrderDeskWorld, step: &Step) {
    let table = step.table.as_ref().expect("inventory table required");
    let rows = table
        .rows
        .iter()
        .skip(1)
        .map(|row| {
            let price: f64 = row[1].parse().expect("Invalid price");
            vec![json!(row[0]), json!(price), json!(row[2]), json!("")]
        })
        .collect();
    world.mock.put_rows("Inventory", &columns::ALL, rows).await;
    world.mock.create_table("Orders", &ORDER_COLUMNS).await;
}

#[given(expr = "the allowed discounts are {string}")]
async fn given_discounts(world: &mut OrderDeskWorld, discounts: String) {
    world.config.orders.discounts = discounts
        .split(',')
        .map(|d| d.trim().parse().expect("Invalid discount"))
        .collect();
}

#[given(expr = "a buyer {string} with phone {string} and address {string}")]
async fn given_buyer(world: &mut OrderDeskWorld, name: String, phone: String, address: String) {
    world.form.buyer_name = name;
    world.form.buyer_phone = phone;
    world.form.buyer_address = address;
}

#[given(expr = "the store fails the next {int} writes transiently")]
async fn given_transient_failures(world: &mut OrderDeskWorld, count: usize) {
    world.warm_cache().await;
    world
        .mock
        .fail_next(count, StoreError::Transient("429 quota exceeded".to_string()))
        .await;
}

#[given("the store rejects the next write permanently")]
async fn given_permanent_failure(world: &mut OrderDeskWorld) {
    world.warm_cache().await;
    world
        .mock
        .push_failure(StoreError::Permanent("403 forbidden".to_string()))
        .await;
}

// --- When steps ---

#[when(expr = "the buyer orders {string} with a {float}% discount")]
async fn when_buyer_orders(world: &mut OrderDeskWorld, item: String, discount: f64) {
    world.form.item_name = item;
    world.form.discount_percent = discount;

    let form = world.form.clone();
    world.desk();
    let desk = world.desk.as_ref().expect("desk initialized");
    let result = desk.submit(&mut world.session, &form).await;
    world.last_result = Some(result);
}

#[when(expr = "the buyer waits {int} second(s)")]
async fn when_buyer_waits(_world: &mut OrderDeskWorld, seconds: u64) {
    tokio::time::sleep(Duration::from_secs(seconds)).await;
}

// --- Then steps ---

#[then(expr = "the order is accepted with final price {float}")]
async fn then_accepted_with_price(world: &mut OrderDeskWorld, expected: f64) {
    assert_eq!(world.accepted_final_price(), expected);
}

#[then(expr = "the order is accepted with the formula price for {float} at {float}%")]
async fn then_accepted_with_formula(world: &mut OrderDeskWorld, price: f64, discount: f64) {
    assert_eq!(world.accepted_final_price(), final_price(price, discount));
}

#[then("the order is held back with a wait notice")]
async fn then_held_back(world: &mut OrderDeskWorld) {
    match &world.last_result {
        Some(Ok(SubmitOutcome::Throttled { retry_after })) => {
            assert!(*retry_after <= Duration::from_secs(1));
        }
        other => panic!("Expected a throttled submission, got {:?}", other),
    }
}

#[then(expr = "the submission fails with {string}")]
async fn then_fails_with(world: &mut OrderDeskWorld, message: String) {
    match &world.last_result {
        Some(Err(e)) => assert_eq!(e.user_message(), message),
        other => panic!("Expected a failed submission, got {:?}", other),
    }
}

#[then(expr = "the orders table has {int} row(s)")]
async fn then_orders_table_rows(world: &mut OrderDeskWorld, count: usize) {
    assert_eq!(world.mock.stored_rows("Orders").await.len(), count);
}

#[then(expr = "the store saw {int} write attempt(s)")]
async fn then_write_attempts(world: &mut OrderDeskWorld, count: usize) {
    assert_eq!(world.mock.append_calls(), count);
}
