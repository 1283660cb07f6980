//! Reading definitions: which lines to look for and how to export them.

use std::collections::HashSet;
use std::sync::Arc;

use super::SamplerError;

/// Label key distinguishing readings that share a metric family.
pub const POINT_LABEL: &str = "point";

/// Subsystem segment of every exported family name.
const SUBSYSTEM: &str = "powermetrics";

/// Join non-empty name parts with `_`, Prometheus `BuildFQName` style.
///
/// ```
/// use powerscope::build_fq_name;
///
/// assert_eq!(build_fq_name("node", "powermetrics", "temperature"), "node_powermetrics_temperature");
/// assert_eq!(build_fq_name("", "powermetrics", "temperature"), "powermetrics_temperature");
/// ```
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Descriptor of an exported gauge family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricFamily {
    /// Fully-qualified metric name.
    pub name: String,
    /// Help text.
    pub help: String,
}

impl MetricFamily {
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
        }
    }
}

/// One reading the sampler looks for in the facility output.
#[derive(Debug, Clone)]
pub struct ReadingDefinition {
    /// Exact key text preceding `": "` in the facility output.
    pub source_key: String,
    /// Value of the [`POINT_LABEL`] label on the exported sample.
    pub exported_label: String,
    /// Family the sample is exported under.
    pub family: Arc<MetricFamily>,
}

impl ReadingDefinition {
    pub fn new(
        source_key: impl Into<String>,
        exported_label: impl Into<String>,
        family: Arc<MetricFamily>,
    ) -> Self {
        Self {
            source_key: source_key.into(),
            exported_label: exported_label.into(),
            family,
        }
    }
}

/// Stable index of a reading inside a [`ReadingSet`] and its [`SampleStore`](super::SampleStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadingId(usize);

impl ReadingId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The built-in readings: CPU and GPU die temperature.
pub fn default_readings(namespace: &str) -> Vec<ReadingDefinition> {
    let temperature = Arc::new(MetricFamily::new(
        build_fq_name(namespace, SUBSYSTEM, "temperature"),
        "Temperature reading",
    ));

    vec![
        ReadingDefinition::new("CPU die temperature", "cpu", Arc::clone(&temperature)),
        ReadingDefinition::new("GPU die temperature", "gpu", temperature),
    ]
}

/// Validated, immutable set of reading definitions.
#[derive(Debug, Clone)]
pub struct ReadingSet {
    definitions: Vec<ReadingDefinition>,
}

impl ReadingSet {
    /// Validate and freeze a list of definitions.
    ///
    /// # Errors
    /// Returns `SamplerError::Config` if the list is empty, a key or label is
    /// empty, or two definitions export the same family/label pair.
    pub fn new(definitions: Vec<ReadingDefinition>) -> Result<Self, SamplerError> {
        if definitions.is_empty() {
            return Err(SamplerError::Config(
                "at least one reading must be defined".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for def in &definitions {
            if def.source_key.is_empty() {
                return Err(SamplerError::Config(
                    "reading source key cannot be empty".to_string(),
                ));
            }
            if def.exported_label.is_empty() {
                return Err(SamplerError::Config(format!(
                    "reading '{}' has an empty label",
                    def.source_key
                )));
            }
            if def.family.name.is_empty() {
                return Err(SamplerError::Config(format!(
                    "reading '{}' has an empty metric name",
                    def.source_key
                )));
            }
            if !seen.insert((def.family.name.as_str(), def.exported_label.as_str())) {
                return Err(SamplerError::Config(format!(
                    "duplicate reading: {}{{{}=\"{}\"}}",
                    def.family.name, POINT_LABEL, def.exported_label
                )));
            }
        }

        Ok(Self { definitions })
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn get(&self, id: ReadingId) -> Option<&ReadingDefinition> {
        self.definitions.get(id.0)
    }

    /// Look up the id of the definition exported under `label`.
    pub fn id_of(&self, label: &str) -> Option<ReadingId> {
        self.definitions
            .iter()
            .position(|def| def.exported_label == label)
            .map(ReadingId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ReadingId, &ReadingDefinition)> {
        self.definitions
            .iter()
            .enumerate()
            .map(|(i, def)| (ReadingId(i), def))
    }

    /// Ids of every definition whose source key equals `key` exactly.
    pub fn matching<'a>(&'a self, key: &'a str) -> impl Iterator<Item = ReadingId> + 'a {
        self.iter()
            .filter(move |(_, def)| def.source_key == key)
            .map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_readings_share_family() {
        let defs = default_readings("node");
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].family.name, "node_powermetrics_temperature");
        assert!(Arc::ptr_eq(&defs[0].family, &defs[1].family));
        assert_eq!(defs[0].exported_label, "cpu");
        assert_eq!(defs[1].exported_label, "gpu");
    }

    #[test]
    fn test_reading_set_rejects_empty() {
        let err = ReadingSet::new(vec![]).unwrap_err();
        assert!(err.to_string().contains("at least one reading"));
    }

    #[test]
    fn test_reading_set_rejects_duplicate_label() {
        let family = Arc::new(MetricFamily::new("temp", "help"));
        let defs = vec![
            ReadingDefinition::new("A", "cpu", Arc::clone(&family)),
            ReadingDefinition::new("B", "cpu", family),
        ];
        let err = ReadingSet::new(defs).unwrap_err();
        assert!(err.to_string().contains("duplicate reading"));
    }

    #[test]
    fn test_reading_set_allows_same_label_in_other_family() {
        let defs = vec![
            ReadingDefinition::new("A", "cpu", Arc::new(MetricFamily::new("temp", "t"))),
            ReadingDefinition::new("B", "cpu", Arc::new(MetricFamily::new("power", "p"))),
        ];
        assert!(ReadingSet::new(defs).is_ok());
    }

    #[test]
    fn test_reading_set_matching() {
        let set = ReadingSet::new(default_readings("node")).unwrap();
        let ids: Vec<_> = set.matching("GPU die temperature").collect();
        assert_eq!(ids, vec![set.id_of("gpu").unwrap()]);
        assert_eq!(set.matching("gpu die temperature").count(), 0);
        assert_eq!(set.matching("Fan speed").count(), 0);
    }
}
