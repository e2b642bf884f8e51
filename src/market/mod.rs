//! Gateway implementations
//!
//! [`rest`] talks to a Binance-style REST API; [`paper`] simulates
//! execution over any market-data source for dry runs.

pub mod paper;
pub mod rest;

pub use paper::PaperGateway;
pub use rest::{Credentials, RestGateway};
