//! Cucumber step definitions for interface tests.

pub mod catalog_view;
pub mod order_desk;
