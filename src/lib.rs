//! Liveorder - order desk for live-selling
//!
//! Reads an operator-maintained inventory table through a read-through
//! cache, derives a filterable, sortable, paginated catalog view, and
//! appends validated orders to an orders table. Every call to the remote
//! store goes through a retrying executor with exponential backoff.

pub mod catalog;
pub mod config;
pub mod handlers;
pub mod inventory;
pub mod orders;
pub mod storage;
pub mod utils;
