//! Interface tests for the catalog view and order desk using Cucumber.
//!
//! Scenarios run against in-memory tables, so no remote store is needed:
//!
//! ```bash
//! cargo test --test interfaces
//! ```

mod steps;

use cucumber::World;
use steps::catalog_view::CatalogWorld;
use steps::order_desk::OrderDeskWorld;

#[tokio::main]
async fn main() {
    // Run CatalogView tests
    println!("\n=== Running CatalogView Interface Tests ===\n");
    CatalogWorld::cucumber()
        .fail_on_skipped()
        .run_and_exit("tests/interfaces/features/catalog_view.feature")
        .await;

    // Run OrderDesk tests
    println!("\n=== Running OrderDesk Interface Tests ===\n");
    OrderDeskWorld::cucumber()
        .fail_on_skipped()
        .run_and_exit("tests/interfaces/features/order_desk.feature")
        .await;
}
