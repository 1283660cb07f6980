//! Sampler Layer
//!
//! Bridges the `powermetrics` output stream and the scrape path. A single
//! background Tokio task reads the facility's stdout line by line and writes
//! matching readings into a [`SampleStore`]; scrapes read the store through a
//! [`SnapshotPublisher`] without ever waiting on the stream.
//!
//! # Architecture
//!
//! - [`ReadingSet`]: fixed set of readings to look for
//! - [`SampleStore`]: latest `(value, populated)` pair per reading
//! - [`StreamReader`]: line decoding and matching loop
//! - [`SamplerTask`]: process spawning, background task, shutdown
//! - [`SnapshotPublisher`]: `prometheus_client` collector over the store
//!
//! # Example
//!
//! ```rust,no_run
//! use powerscope::{ReadingSet, SamplerConfig, SamplerTask, default_readings};
//! use prometheus_client::registry::Registry;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SamplerConfig::default();
//! let readings = ReadingSet::new(default_readings(&config.namespace))?;
//! let task = SamplerTask::start(&config, readings);
//!
//! let mut registry = Registry::default();
//! registry.register_collector(Box::new(task.publisher()));
//! # Ok(())
//! # }
//! ```

mod error;
pub mod parser;
mod publisher;
mod reader;
mod reading;
mod store;
mod task;

pub use error::SamplerError;
pub use publisher::{PublishedSample, SnapshotPublisher};
pub use reader::{ReaderExit, StreamReader};
pub use reading::{
    MetricFamily, POINT_LABEL, ReadingDefinition, ReadingId, ReadingSet, build_fq_name,
    default_readings,
};
pub use store::{Sample, SampleStore};
pub use task::{DEFAULT_SHUTDOWN_TIMEOUT, SamplerConfig, SamplerHandle, SamplerStatus, SamplerTask};
