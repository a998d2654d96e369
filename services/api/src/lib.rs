//! services/api/src/lib.rs
//!
//! Library crate for the API service. The binaries pull the adapters, the
//! configuration loader and the web router from here, and the integration
//! tests drive the router directly against in-memory adapters.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
