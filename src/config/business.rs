//! Order desk configuration.

use chrono::FixedOffset;
use serde::Deserialize;

use super::ConfigError;

/// Default payment instructions shown after a successful order.
pub const DEFAULT_PAYMENT_TEMPLATE: &str = "Transfer the final amount to the store account \
and add the note \"Payment for {name}\". After transferring, confirm your payment via WhatsApp.";

/// Order submission settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrdersConfig {
    /// Allowed discount percentages.
    pub discounts: Vec<f64>,
    /// Minimum spacing between successful submissions of one session, in milliseconds.
    pub debounce_ms: u64,
    /// Store's local UTC offset, e.g. "+07:00".
    pub utc_offset: String,
    /// Payment instructions; `{name}` is replaced with the buyer's name.
    pub payment_template: String,
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            discounts: vec![10.0, 15.0, 20.0, 30.0, 35.0, 50.0],
            debounce_ms: 1000,
            utc_offset: "+07:00".to_string(),
            payment_template: DEFAULT_PAYMENT_TEMPLATE.to_string(),
        }
    }
}

impl OrdersConfig {
    /// Parse the configured offset.
    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        self.utc_offset
            .parse::<FixedOffset>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "orders.utc_offset",
                reason: format!("'{}': {}", self.utc_offset, e),
            })
    }
}
