//! Pipeline services: artifact storage, embedding plans, orchestration and
//! progress reporting.

pub mod artifact_store;
pub mod embedding;
pub mod pipeline;
pub mod progress;
