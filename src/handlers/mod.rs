//! Outer surfaces over the catalog and order desk.

pub mod rest;
