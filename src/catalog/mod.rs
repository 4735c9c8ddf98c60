//! Catalog view: filter, sort, paginate and select over an inventory snapshot.
//!
//! [`CatalogView`] is stateless. Callers own a [`ViewState`] per session and
//! pass it in with each event; the view returns the next state and derives
//! what to render from `(snapshot, state)`.
//!
//! Derivation order is fixed: category filter, text filter, stable sort,
//! pagination. An empty filtered set renders as [`CatalogBody::NoResults`].

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::inventory::{InventoryItem, InventorySnapshot};

/// Items per page.
pub const PAGE_SIZE: usize = 6;

/// Category selection that disables the category filter.
pub const ALL_CATEGORIES: &str = "All";

/// Sort order applied after filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Snapshot order.
    #[default]
    None,
    /// Cheapest first; unpriced items last.
    PriceAscending,
    /// Most expensive first; unpriced items last.
    PriceDescending,
    /// Case-insensitive by name.
    NameAscending,
}

impl SortMode {
    /// Options offered to the user, in display order.
    pub const ALL: [SortMode; 4] = [
        SortMode::None,
        SortMode::PriceAscending,
        SortMode::PriceDescending,
        SortMode::NameAscending,
    ];

    /// Wire name, as used in query strings.
    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::None => "none",
            SortMode::PriceAscending => "price_ascending",
            SortMode::PriceDescending => "price_descending",
            SortMode::NameAscending => "name_ascending",
        }
    }

    /// Display text for the sort control.
    pub fn label(self) -> &'static str {
        match self {
            SortMode::None => "Default",
            SortMode::PriceAscending => "Price: low to high",
            SortMode::PriceDescending => "Price: high to low",
            SortMode::NameAscending => "Name: A to Z",
        }
    }
}

impl std::str::FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| format!("unknown sort mode '{}'", s))
    }
}

/// Per-session view state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewState {
    pub selected_category: String,
    pub search_query: String,
    pub sort_mode: SortMode,
    /// 1-based.
    pub current_page: usize,
    pub selected_item_name: Option<String>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            selected_category: ALL_CATEGORIES.to_string(),
            search_query: String::new(),
            sort_mode: SortMode::None,
            current_page: 1,
            selected_item_name: None,
        }
    }
}

/// User-driven transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    SelectCategory(String),
    Search(String),
    Sort(SortMode),
    PrevPage,
    NextPage,
    SelectItem(String),
}

/// Pagination metadata for the rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub current_page: usize,
    pub page_count: usize,
    pub total_count: usize,
}

impl PageInfo {
    pub fn has_prev(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.page_count
    }
}

/// One card on the rendered page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogItem {
    pub name: String,
    pub price: Option<f64>,
    pub category: String,
    pub image_url: String,
}

impl From<&InventoryItem> for CatalogItem {
    fn from(item: &InventoryItem) -> Self {
        Self {
            name: item.name.clone(),
            price: item.price,
            category: item.category.clone(),
            image_url: item.image_url().to_string(),
        }
    }
}

/// The item whose price is previewed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedItem {
    pub name: String,
    pub price: Option<f64>,
    /// `false` when this is the first-item fallback rather than a user selection.
    pub explicit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CatalogBody {
    NoResults,
    Page {
        items: Vec<CatalogItem>,
        selected: SelectedItem,
        page: PageInfo,
    },
}

/// One entry of the sort control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SortOption {
    pub value: SortMode,
    pub label: &'static str,
}

impl From<SortMode> for SortOption {
    fn from(mode: SortMode) -> Self {
        Self {
            value: mode,
            label: mode.label(),
        }
    }
}

/// Everything the presentation layer needs for one render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogRender {
    /// Distinct categories in first-seen order, with [`ALL_CATEGORIES`] first.
    pub categories: Vec<String>,
    pub sort_options: Vec<SortOption>,
    #[serde(flatten)]
    pub body: CatalogBody,
}

/// Number of pages for `count` items; never less than one.
pub fn page_count(count: usize) -> usize {
    count.div_ceil(PAGE_SIZE).max(1)
}

/// Pure derivations over one snapshot.
#[derive(Debug, Clone, Copy)]
pub struct CatalogView<'a> {
    snapshot: &'a InventorySnapshot,
}

impl<'a> CatalogView<'a> {
    pub fn new(snapshot: &'a InventorySnapshot) -> Self {
        Self { snapshot }
    }

    /// Filtered and sorted items for `state`, before pagination.
    pub fn filter(&self, state: &ViewState) -> Vec<&'a InventoryItem> {
        let query = state.search_query.trim().to_lowercase();

        let mut items: Vec<&InventoryItem> = self
            .snapshot
            .items()
            .iter()
            .filter(|item| {
                state.selected_category == ALL_CATEGORIES
                    || item.category == state.selected_category
            })
            .filter(|item| query.is_empty() || item.name.to_lowercase().contains(&query))
            .collect();

        match state.sort_mode {
            SortMode::None => {}
            SortMode::PriceAscending => {
                items.sort_by(|a, b| compare_prices(a.price, b.price, false))
            }
            SortMode::PriceDescending => {
                items.sort_by(|a, b| compare_prices(a.price, b.price, true))
            }
            SortMode::NameAscending => items.sort_by_cached_key(|item| item.name.to_lowercase()),
        }

        items
    }

    /// Apply `event` to `state`, returning the next state.
    ///
    /// The returned page is always within `[1, page_count]` for the new
    /// filter. Filter and sort changes reset it to 1.
    pub fn apply(&self, state: &ViewState, event: ViewEvent) -> ViewState {
        let mut next = state.clone();
        match event {
            ViewEvent::SelectCategory(category) => {
                next.selected_category = category;
                next.current_page = 1;
            }
            ViewEvent::Search(query) => {
                next.search_query = query;
                next.current_page = 1;
            }
            ViewEvent::Sort(mode) => {
                next.sort_mode = mode;
                next.current_page = 1;
            }
            ViewEvent::PrevPage => {
                next.current_page = self.clamp_page(&next).saturating_sub(1);
            }
            ViewEvent::NextPage => {
                next.current_page = self.clamp_page(&next) + 1;
            }
            ViewEvent::SelectItem(name) => {
                next.selected_item_name = Some(name);
            }
        }
        next.current_page = self.clamp_page(&next);
        next
    }

    /// Derive the render for `state` without changing it.
    pub fn render(&self, state: &ViewState) -> CatalogRender {
        let categories = std::iter::once(ALL_CATEGORIES.to_string())
            .chain(
                self.snapshot
                    .categories()
                    .into_iter()
                    .filter(|c| c != ALL_CATEGORIES),
            )
            .collect();

        CatalogRender {
            categories,
            sort_options: SortMode::ALL.into_iter().map(SortOption::from).collect(),
            body: self.body(state),
        }
    }

    fn body(&self, state: &ViewState) -> CatalogBody {
        let filtered = self.filter(state);
        let Some(first) = filtered.first() else {
            return CatalogBody::NoResults;
        };

        let page_count = page_count(filtered.len());
        let current_page = state.current_page.clamp(1, page_count);
        let start = (current_page - 1) * PAGE_SIZE;
        let end = (start + PAGE_SIZE).min(filtered.len());
        let on_page = &filtered[start..end];

        let fallback = on_page.first().unwrap_or(first);
        let selected = match state
            .selected_item_name
            .as_deref()
            .and_then(|name| self.snapshot.find(name))
        {
            Some(item) => SelectedItem {
                name: item.name.clone(),
                price: item.price,
                explicit: true,
            },
            None => SelectedItem {
                name: fallback.name.clone(),
                price: fallback.price,
                explicit: false,
            },
        };

        CatalogBody::Page {
            items: on_page.iter().map(|item| CatalogItem::from(*item)).collect(),
            selected,
            page: PageInfo {
                current_page,
                page_count,
                total_count: filtered.len(),
            },
        }
    }

    fn clamp_page(&self, state: &ViewState) -> usize {
        let pages = page_count(self.filter(state).len());
        state.current_page.clamp(1, pages)
    }
}

/// Priced items before unpriced ones in either direction; unpriced ties keep order.
fn compare_prices(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
