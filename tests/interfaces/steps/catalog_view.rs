//! CatalogView interface step definitions.

use cucumber::{gherkin::Step, given, then, when, World};

use liveorder::catalog::{page_count, CatalogBody, CatalogView, SortMode, ViewEvent, ViewState};
use liveorder::inventory::{InventoryItem, InventorySnapshot};

/// Test context for CatalogView scenarios.
#[derive(Debug, Default, World)]
pub struct CatalogWorld {
    snapshot: InventorySnapshot,
    state: ViewState,
}

impl CatalogWorld {
    fn apply(&mut self, event: ViewEvent) {
        self.state = CatalogView::new(&self.snapshot).apply(&self.state, event);
    }
}

// --- Given steps ---

#[given("the inventory:")]
async fn given_inventory(world: &mut CatalogWorld, step: &Step) {
    let table = step.table.as_ref().expect("inventory table required");
    let items = table
        .rows
        .iter()
        .skip(1)
        .map(|row| {
            let price: f64 = row[1].parse().expect("Invalid price");
            InventoryItem::new(row[0].clone(), price, row[2].clone())
        })
        .collect();
    world.snapshot = InventorySnapshot::new(items);
    world.state = ViewState::default();
}

#[given(expr = "an inventory of {int} items")]
async fn given_inventory_of(world: &mut CatalogWorld, count: usize) {
    let items = (1..=count)
        .map(|i| {
            let category = if i % 2 == 0 { "Even" } else { "Odd" };
            InventoryItem::new(format!("Item{:02}", i), (i * 100) as f64, category)
        })
        .collect();
    world.snapshot = InventorySnapshot::new(items);
    world.state = ViewState::default();
}

// --- When steps ---

#[when(expr = "I select category {string}")]
async fn when_select_category(world: &mut CatalogWorld, category: String) {
    world.apply(ViewEvent::SelectCategory(category));
}

#[when(expr = "I search for {string}")]
async fn when_search(world: &mut CatalogWorld, query: String) {
    world.apply(ViewEvent::Search(query));
}

#[when(expr = "I sort by {string}")]
async fn when_sort(world: &mut CatalogWorld, mode: String) {
    let mode: SortMode = mode.parse().expect("Invalid sort mode");
    world.apply(ViewEvent::Sort(mode));
}

#[when("I go to the next page")]
async fn when_next_page(world: &mut CatalogWorld) {
    world.apply(ViewEvent::NextPage);
}

#[when("I go to the previous page")]
async fn when_prev_page(world: &mut CatalogWorld) {
    world.apply(ViewEvent::PrevPage);
}

#[when(expr = "I select item {string}")]
async fn when_select_item(world: &mut CatalogWorld, name: String) {
    world.apply(ViewEvent::SelectItem(name));
}

// --- Then steps ---

#[then(expr = "the catalog shows {string}")]
async fn then_catalog_shows(world: &mut CatalogWorld, expected: String) {
    let expected: Vec<&str> = expected.split(',').map(str::trim).collect();
    let shown: Vec<&str> = CatalogView::new(&world.snapshot)
        .filter(&world.state)
        .into_iter()
        .map(|item| item.name.as_str())
        .collect();
    assert_eq!(shown, expected);
}

#[then(expr = "the current page is {int} of {int}")]
async fn then_current_page(world: &mut CatalogWorld, page: usize, pages: usize) {
    let view = CatalogView::new(&world.snapshot);
    assert_eq!(world.state.current_page, page);
    assert_eq!(page_count(view.filter(&world.state).len()), pages);
}

#[then(expr = "the resolved selection is {string}")]
async fn then_resolved_selection(world: &mut CatalogWorld, name: String) {
    match CatalogView::new(&world.snapshot).render(&world.state).body {
        CatalogBody::Page { selected, .. } => assert_eq!(selected.name, name),
        CatalogBody::NoResults => panic!("Expected a page, got no results"),
    }
}

#[then("the catalog reports no results")]
async fn then_no_results(world: &mut CatalogWorld) {
    let render = CatalogView::new(&world.snapshot).render(&world.state);
    assert_eq!(render.body, CatalogBody::NoResults);
}
