//! Order submission.
//!
//! [`OrderDesk::submit`] validates buyer input, applies the per-session
//! debounce, prices the order against the current inventory snapshot and
//! appends one row to the orders table. Validation failures never reach the
//! store. A store failure is reported once, with nothing to roll back.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::{Config, ConfigError};
use crate::inventory::InventoryReader;
use crate::storage::{CachedStore, RemoteStore, StoreError};

/// Orders table header, in append order.
pub const ORDER_COLUMNS: [&str; 8] = [
    "Timestamp",
    "Name",
    "WhatsApp",
    "Address",
    "ItemName",
    "Price",
    "DiscountPercent",
    "FinalPrice",
];

/// Timestamp format written to the orders table.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DISCOUNT_EPSILON: f64 = 1e-9;

/// Buyer input for one submission.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OrderForm {
    pub buyer_name: String,
    pub buyer_phone: String,
    pub buyer_address: String,
    pub item_name: String,
    pub discount_percent: f64,
}

/// Buyer input rejected before any store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please fill in {0}")]
    MissingField(&'static str),

    #[error("WhatsApp number must contain digits only")]
    InvalidPhoneFormat,
}

/// Check buyer fields: presence first, then phone format.
pub fn validate_buyer(form: &OrderForm) -> Result<(), ValidationError> {
    let required = [
        ("name", &form.buyer_name),
        ("WhatsApp number", &form.buyer_phone),
        ("address", &form.buyer_address),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(ValidationError::MissingField(field));
        }
    }

    if !form.buyer_phone.trim().chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidPhoneFormat);
    }
    Ok(())
}

/// `original * (1 - discount / 100)`, unrounded.
pub fn final_price(original: f64, discount_percent: f64) -> f64 {
    original * (1.0 - discount_percent / 100.0)
}

/// Whole-rupiah amount with thousands separators, e.g. `Rp 100,000`.
pub fn format_rupiah(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-Rp {}", grouped)
    } else {
        format!("Rp {}", grouped)
    }
}

/// Allowed discount percentages.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountSet {
    values: Vec<f64>,
}

impl DiscountSet {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The configured value matching `percent`, if any.
    pub fn resolve(&self, percent: f64) -> Option<f64> {
        self.values
            .iter()
            .copied()
            .find(|allowed| (allowed - percent).abs() < DISCOUNT_EPSILON)
    }
}

/// One row of the orders table. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRecord {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<FixedOffset>,
    pub buyer_name: String,
    pub buyer_phone: String,
    pub buyer_address: String,
    pub item_name: String,
    pub original_price: f64,
    pub discount_percent: f64,
    pub final_price: f64,
}

fn serialize_timestamp<S: Serializer>(
    timestamp: &DateTime<FixedOffset>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&timestamp.format(TIMESTAMP_FORMAT))
}

impl OrderRecord {
    /// Values in [`ORDER_COLUMNS`] order.
    pub fn to_row(&self) -> Vec<Value> {
        vec![
            json!(self.timestamp.format(TIMESTAMP_FORMAT).to_string()),
            json!(self.buyer_name),
            json!(self.buyer_phone),
            json!(self.buyer_address),
            json!(self.item_name),
            json!(self.original_price),
            json!(self.discount_percent),
            json!(self.final_price),
        ]
    }
}

/// Confirmation for a written order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderReceipt {
    pub record: OrderRecord,
    pub payment_instructions: String,
}

impl OrderReceipt {
    /// Human-readable order summary.
    pub fn summary(&self) -> String {
        let r = &self.record;
        format!(
            "{} | {} | {}% off | pay {}",
            r.item_name,
            format_rupiah(r.original_price),
            r.discount_percent,
            format_rupiah(r.final_price)
        )
    }
}

/// Result of a submission that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Accepted(OrderReceipt),
    /// Too soon after this session's last write; nothing was written.
    Throttled { retry_after: Duration },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unknown item: {0}")]
    UnknownItem(String),

    #[error("Discount {0}% is not offered")]
    DiscountNotAllowed(f64),

    #[error("Item has no valid price: {0}")]
    Unpriced(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OrderError {
    /// Text shown to the buyer. Store failures are never itemized.
    pub fn user_message(&self) -> String {
        match self {
            OrderError::Store(_) => {
                "Submission failed, please try again later.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Per-session submission state, owned by the caller.
#[derive(Debug, Clone, Default)]
pub struct OrderSession {
    last_write: Option<Instant>,
}

impl OrderSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_write(&self) -> Option<Instant> {
        self.last_write
    }
}

/// Prices and records orders.
pub struct OrderDesk {
    inventory: InventoryReader,
    writer: Arc<dyn RemoteStore>,
    orders_table: String,
    discounts: DiscountSet,
    debounce: Duration,
    offset: FixedOffset,
    payment_template: String,
}

impl OrderDesk {
    pub fn new(
        inventory: InventoryReader,
        writer: Arc<dyn RemoteStore>,
        orders_table: impl Into<String>,
        discounts: DiscountSet,
        debounce: Duration,
        offset: FixedOffset,
        payment_template: impl Into<String>,
    ) -> Self {
        Self {
            inventory,
            writer,
            orders_table: orders_table.into(),
            discounts,
            debounce,
            offset,
            payment_template: payment_template.into(),
        }
    }

    /// Build from configuration over the shared cached store.
    pub fn from_config(store: Arc<CachedStore>, config: &Config) -> Result<Self, ConfigError> {
        let inventory = InventoryReader::new(store.clone(), &config.store.inventory_table);
        Ok(Self::new(
            inventory,
            store,
            &config.store.orders_table,
            DiscountSet::new(config.orders.discounts.clone()),
            Duration::from_millis(config.orders.debounce_ms),
            config.orders.offset()?,
            &config.orders.payment_template,
        ))
    }

    pub fn discounts(&self) -> &DiscountSet {
        &self.discounts
    }

    pub fn inventory(&self) -> &InventoryReader {
        &self.inventory
    }

    /// Validate, price and append one order.
    #[tracing::instrument(name = "orders.submit", skip_all, fields(item = %form.item_name))]
    pub async fn submit(
        &self,
        session: &mut OrderSession,
        form: &OrderForm,
    ) -> Result<SubmitOutcome, OrderError> {
        validate_buyer(form)?;

        if let Some(last) = session.last_write {
            let since = last.elapsed();
            if since < self.debounce {
                let retry_after = self.debounce - since;
                info!(retry_after_ms = retry_after.as_millis() as u64, "Submission debounced");
                return Ok(SubmitOutcome::Throttled { retry_after });
            }
        }

        let discount_percent = self
            .discounts
            .resolve(form.discount_percent)
            .ok_or(OrderError::DiscountNotAllowed(form.discount_percent))?;

        let item_name = form.item_name.trim();
        let snapshot = self.inventory.snapshot().await?;
        let item = snapshot
            .find(item_name)
            .ok_or_else(|| OrderError::UnknownItem(item_name.to_string()))?;
        let original_price = item
            .price
            .ok_or_else(|| OrderError::Unpriced(item.name.clone()))?;

        let record = OrderRecord {
            timestamp: Utc::now().with_timezone(&self.offset),
            buyer_name: form.buyer_name.trim().to_string(),
            buyer_phone: form.buyer_phone.trim().to_string(),
            buyer_address: form.buyer_address.trim().to_string(),
            item_name: item.name.clone(),
            original_price,
            discount_percent,
            final_price: final_price(original_price, discount_percent),
        };

        if let Err(e) = self
            .writer
            .append_row(&self.orders_table, record.to_row())
            .await
        {
            warn!(error = %e, "Order was not recorded");
            return Err(e.into());
        }
        session.last_write = Some(Instant::now());

        info!(
            item = %record.item_name,
            final_price = record.final_price,
            "Order recorded"
        );

        let payment_instructions = self.payment_template.replace("{name}", &record.buyer_name);
        Ok(SubmitOutcome::Accepted(OrderReceipt {
            record,
            payment_instructions,
        }))
    }
}
