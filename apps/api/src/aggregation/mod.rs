//! Aggregation engine: the per-product monitoring pass, the batch
//! competitor scoring pass and the multi-term snapshot.

pub mod metrics;
pub mod monitor;
pub mod scoring;
pub mod snapshot;
