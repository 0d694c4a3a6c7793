//! Campaign aggregation.
//!
//! This module provides the pagination walker, retry policy, record
//! normalizer and the driver that fans out across accounts.

pub mod driver;
pub mod fetcher;
pub mod normalize;
pub mod retry;

pub use driver::Aggregator;
