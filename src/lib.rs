//! powerscope - powermetrics Prometheus exporter
//!
//! This crate samples readings from the macOS `powermetrics` facility in the
//! background and exposes the latest value of each reading on a Prometheus
//! scrape endpoint. It can be used as a library, or run as a standalone binary
//! with the `powerscope` executable.
//!
//! # Architecture
//!
//! - **Sampler**: background task reading the facility output into a latest-value store
//! - **Publisher**: `prometheus_client` collector reading that store on each scrape
//! - **Server**: Axum endpoint serving `/metrics` and health checks
//!
//! # Example
//!
//! ```rust,ignore
//! use powerscope::{AppConfig, ReadingSet, SamplerTask, default_readings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load("configs/config.yaml")?;
//!     let readings = ReadingSet::new(default_readings(&config.sampler.namespace))?;
//!     let task = SamplerTask::start(&config.sampler, readings);
//!
//!     for sample in task.publisher().collect() {
//!         println!("{}{{point=\"{}\"}} {}", sample.family.name, sample.label, sample.value);
//!     }
//!
//!     task.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod sampler;
pub mod server;

pub use config::{AppConfig, ConfigError, ServerConfig};
pub use sampler::{
    MetricFamily, PublishedSample, ReaderExit, ReadingDefinition, ReadingId, ReadingSet, Sample,
    SampleStore, SamplerConfig, SamplerError, SamplerHandle, SamplerStatus, SamplerTask,
    SnapshotPublisher, StreamReader, build_fq_name, default_readings,
};
