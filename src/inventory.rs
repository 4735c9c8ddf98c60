//! Inventory snapshot.
//!
//! Inventory rows are maintained by an operator outside this system; we only
//! read them. A snapshot is the decoded table as of the last cache refresh.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::storage::{CachedStore, RemoteStore, Row, StoreError};

/// Inventory table column headers.
pub mod columns {
    pub const ITEM_NAME: &str = "ItemName";
    pub const PRICE: &str = "Price";
    pub const CATEGORY: &str = "Category";
    pub const IMAGE_URL: &str = "ImageURL";

    /// Header row in table order.
    pub const ALL: [&str; 4] = [ITEM_NAME, PRICE, CATEGORY, IMAGE_URL];
}

/// Category assigned to rows without one.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Image shown for items without a usable image reference.
pub const PLACEHOLDER_IMAGE: &str = "https://placehold.co/300x300?text=No+Image";

/// One row of the inventory table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryItem {
    /// Unique within a snapshot.
    pub name: String,
    /// `None` when the price cell is not a non-negative number.
    pub price: Option<f64>,
    pub category: String,
    pub image_ref: Option<String>,
}

impl InventoryItem {
    pub fn new(name: impl Into<String>, price: f64, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price: Some(price),
            category: category.into(),
            image_ref: None,
        }
    }

    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    /// Decode a table row. Returns `None` for rows without a name.
    pub fn from_row(row: &Row) -> Option<Self> {
        let name = row.get(columns::ITEM_NAME).map(cell_text).unwrap_or_default();
        if name.is_empty() {
            return None;
        }

        let price = row.get(columns::PRICE).and_then(parse_price);

        let category = row
            .get(columns::CATEGORY)
            .map(cell_text)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| UNCATEGORIZED.to_string());

        let image_ref = row
            .get(columns::IMAGE_URL)
            .map(cell_text)
            .filter(|s| !s.is_empty());

        Some(Self {
            name,
            price,
            category,
            image_ref,
        })
    }

    /// Image to display: the item's own http(s) or data URI, else the placeholder.
    pub fn image_url(&self) -> &str {
        match self.image_ref.as_deref() {
            Some(uri) if is_displayable_uri(uri) => uri,
            _ => PLACEHOLDER_IMAGE,
        }
    }
}

fn is_displayable_uri(uri: &str) -> bool {
    let lower = uri.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:")
}

/// Render a cell as trimmed text.
pub(crate) fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Coerce a price cell to a non-negative number.
pub(crate) fn parse_price(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (price.is_finite() && price >= 0.0).then_some(price)
}

/// Decoded inventory table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventorySnapshot {
    items: Vec<InventoryItem>,
}

impl InventorySnapshot {
    /// Build from already-decoded items. Later duplicates of a name are dropped.
    pub fn new(items: Vec<InventoryItem>) -> Self {
        let mut seen = HashSet::new();
        let items = items
            .into_iter()
            .filter(|item| {
                let first = seen.insert(item.name.clone());
                if !first {
                    warn!(item = %item.name, "Duplicate inventory item name, keeping first row");
                }
                first
            })
            .collect();
        Self { items }
    }

    /// Decode table rows, skipping rows without a name.
    pub fn from_rows(rows: &[Row]) -> Self {
        let mut items = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            match InventoryItem::from_row(row) {
                Some(item) => {
                    if item.price.is_none() {
                        warn!(item = %item.name, row = index + 2, "Inventory price is not a non-negative number");
                    }
                    items.push(item);
                }
                None => warn!(row = index + 2, "Skipping inventory row without ItemName"),
            }
        }
        Self::new(items)
    }

    /// Items in table order.
    pub fn items(&self) -> &[InventoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&InventoryItem> {
        self.items.iter().find(|item| item.name == name)
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.items
            .iter()
            .filter(|item| seen.insert(item.category.as_str()))
            .map(|item| item.category.clone())
            .collect()
    }
}

/// Reads inventory snapshots through the shared read-through cache.
#[derive(Clone)]
pub struct InventoryReader {
    store: Arc<CachedStore>,
    table: String,
}

impl InventoryReader {
    pub fn new(store: Arc<CachedStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Current snapshot; served from cache within the TTL.
    pub async fn snapshot(&self) -> Result<InventorySnapshot, StoreError> {
        let rows = self.store.read_table(&self.table).await?;
        Ok(InventorySnapshot::from_rows(&rows))
    }

    /// Drop the cached table and fetch it again.
    pub async fn reload(&self) -> Result<InventorySnapshot, StoreError> {
        let rows = self.store.reload(&self.table).await?;
        Ok(InventorySnapshot::from_rows(&rows))
    }
}
