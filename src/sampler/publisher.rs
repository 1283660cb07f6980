//! Snapshot publisher: exposes the store on each scrape.

use std::sync::Arc;

use prometheus_client::collector::Collector;
use prometheus_client::encoding::{DescriptorEncoder, EncodeMetric};
use prometheus_client::metrics::MetricType;
use prometheus_client::metrics::gauge::ConstGauge;

use super::{MetricFamily, POINT_LABEL, ReadingSet, SampleStore};

/// One exported gauge sample.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedSample {
    pub family: Arc<MetricFamily>,
    pub label: String,
    pub value: f64,
}

/// Reads every entry of a [`SampleStore`] on demand.
///
/// Unpopulated entries are omitted. Reading never waits on the stream: each
/// entry lock is only ever held for a copy.
#[derive(Debug, Clone)]
pub struct SnapshotPublisher {
    readings: Arc<ReadingSet>,
    store: Arc<SampleStore>,
}

impl SnapshotPublisher {
    pub fn new(readings: Arc<ReadingSet>, store: Arc<SampleStore>) -> Self {
        Self { readings, store }
    }

    /// Current value of every populated reading, in definition order.
    pub fn collect(&self) -> Vec<PublishedSample> {
        self.readings
            .iter()
            .filter_map(|(id, def)| {
                let sample = self.store.read(id);
                sample.populated.then(|| PublishedSample {
                    family: Arc::clone(&def.family),
                    label: def.exported_label.clone(),
                    value: sample.value,
                })
            })
            .collect()
    }
}

/// Group samples by family, keeping first-seen order.
fn group_by_family(samples: Vec<PublishedSample>) -> Vec<(Arc<MetricFamily>, Vec<(String, f64)>)> {
    let mut groups: Vec<(Arc<MetricFamily>, Vec<(String, f64)>)> = Vec::new();
    for sample in samples {
        match groups.iter_mut().find(|(family, _)| *family == sample.family) {
            Some((_, points)) => points.push((sample.label, sample.value)),
            None => groups.push((sample.family, vec![(sample.label, sample.value)])),
        }
    }
    groups
}

impl Collector for SnapshotPublisher {
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), std::fmt::Error> {
        for (family, points) in group_by_family(self.collect()) {
            let mut metric_encoder =
                encoder.encode_descriptor(&family.name, &family.help, None, MetricType::Gauge)?;
            for (label, value) in points {
                let labels = [(POINT_LABEL, label.as_str())];
                ConstGauge::new(value).encode(metric_encoder.encode_family(&labels)?)?;
            }
        }
        Ok(())
    }
}
