//! Stream reader: turns facility output into store updates.

use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, Split};
use tokio_util::sync::CancellationToken;

use super::parser::parse_line;
use super::{ReadingSet, SampleStore};

/// Why a [`StreamReader`] loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderExit {
    /// The stream reached end of file.
    Eof,
    /// Shutdown was requested.
    Cancelled,
    /// Reading from the stream failed.
    Failed(String),
}

impl fmt::Display for ReaderExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eof => write!(f, "eof"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Reads newline-delimited text and writes matching readings to the store.
pub struct StreamReader<R> {
    segments: Split<R>,
    readings: Arc<ReadingSet>,
    store: Arc<SampleStore>,
}

impl<R> fmt::Debug for StreamReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamReader")
            .field("readings", &self.readings.len())
            .finish_non_exhaustive()
    }
}

impl<R: AsyncBufRead + Unpin> StreamReader<R> {
    pub fn new(stream: R, readings: Arc<ReadingSet>, store: Arc<SampleStore>) -> Self {
        Self {
            segments: stream.split(b'\n'),
            readings,
            store,
        }
    }

    /// Apply one line to the store, returning how many entries were updated.
    ///
    /// Lines without the delimiter, with an unknown key, or whose value does
    /// not start with a number leave the store untouched.
    pub fn apply_line(&self, line: &str) -> usize {
        let Some(raw) = parse_line(line) else {
            return 0;
        };

        let mut matches = self.readings.matching(raw.key).peekable();
        if matches.peek().is_none() {
            return 0;
        }
        let Some(value) = raw.value() else {
            tracing::trace!(key = raw.key, remainder = raw.remainder, "Skipping unparsable value");
            return 0;
        };

        let mut updated = 0;
        for id in matches {
            self.store.write(id, value);
            updated += 1;
            if let Some(def) = self.readings.get(id) {
                tracing::trace!(
                    metric = %def.family.name,
                    point = %def.exported_label,
                    value,
                    "Reading updated"
                );
            }
        }
        updated
    }

    /// Consume the stream until it ends, fails, or `cancel` fires.
    ///
    /// Cancellation is checked between line reads. Invalid UTF-8 is replaced
    /// rather than treated as a failure.
    pub async fn run(mut self, cancel: &CancellationToken) -> ReaderExit {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return ReaderExit::Cancelled,
                next = self.segments.next_segment() => next,
            };

            match next {
                Ok(Some(segment)) => {
                    let line = String::from_utf8_lossy(&segment);
                    self.apply_line(line.strip_suffix('\r').unwrap_or(&line));
                }
                Ok(None) => return ReaderExit::Eof,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read facility output");
                    return ReaderExit::Failed(e.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncWriteExt, BufReader};

    use super::*;
    use crate::sampler::{Sample, default_readings};

    fn fixture() -> (Arc<ReadingSet>, Arc<SampleStore>) {
        let readings = Arc::new(ReadingSet::new(default_readings("node")).unwrap());
        let store = Arc::new(SampleStore::new(readings.len()));
        (readings, store)
    }

    fn reader(
        input: &'static [u8],
        readings: &Arc<ReadingSet>,
        store: &Arc<SampleStore>,
    ) -> StreamReader<BufReader<&'static [u8]>> {
        StreamReader::new(
            BufReader::new(input),
            Arc::clone(readings),
            Arc::clone(store),
        )
    }

    fn snapshot(readings: &ReadingSet, store: &SampleStore) -> Vec<Sample> {
        readings.iter().map(|(id, _)| store.read(id)).collect()
    }

    #[test]
    fn test_apply_line_ignores_unmatched() {
        let (readings, store) = fixture();
        let r = reader(b"", &readings, &store);

        for line in [
            "",
            "**** SMC sensors ****",
            "CPU die temperature 45.3 C",
            "Fan speed: 1200 rpm",
            "cpu die temperature: 45.3 C",
            "CPU die temperature:45.3 C",
        ] {
            assert_eq!(r.apply_line(line), 0, "line {line:?}");
        }
        assert!(snapshot(&readings, &store).iter().all(|s| !s.populated));
    }

    #[test]
    fn test_apply_line_updates_only_matching_entry() {
        let (readings, store) = fixture();
        let r = reader(b"", &readings, &store);

        assert_eq!(r.apply_line("CPU die temperature: 45.3 C"), 1);

        let cpu = readings.id_of("cpu").unwrap();
        let gpu = readings.id_of("gpu").unwrap();
        assert_eq!(
            store.read(cpu),
            Sample {
                value: 45.3,
                populated: true
            }
        );
        assert_eq!(store.read(gpu), Sample::EMPTY);
    }

    #[test]
    fn test_apply_line_malformed_keeps_previous_value() {
        let (readings, store) = fixture();
        let r = reader(b"", &readings, &store);
        let cpu = readings.id_of("cpu").unwrap();

        r.apply_line("CPU die temperature: 45.3 C");
        assert_eq!(r.apply_line("CPU die temperature: notanumber C"), 0);
        assert_eq!(store.read(cpu).value, 45.3);
        assert!(store.read(cpu).populated);
    }

    #[test]
    fn test_apply_line_updates_every_definition_with_key() {
        let family = Arc::new(crate::sampler::MetricFamily::new("t", "h"));
        let readings = Arc::new(
            ReadingSet::new(vec![
                crate::sampler::ReadingDefinition::new("Die", "a", Arc::clone(&family)),
                crate::sampler::ReadingDefinition::new("Die", "b", family),
            ])
            .unwrap(),
        );
        let store = Arc::new(SampleStore::new(readings.len()));
        let r = reader(b"", &readings, &store);

        assert_eq!(r.apply_line("Die: 7"), 2);
        assert!(snapshot(&readings, &store).iter().all(|s| s.value == 7.0));
    }

    #[tokio::test]
    async fn test_run_until_eof() {
        let (readings, store) = fixture();
        let input = b"CPU die temperature: 40.0 C\r\n\
                      Fan speed: 1200 rpm\n\
                      GPU die temperature: 52.0 C\n\
                      CPU die temperature: 45.3 C";
        let exit = reader(input, &readings, &store)
            .run(&CancellationToken::new())
            .await;

        assert_eq!(exit, ReaderExit::Eof);
        assert_eq!(store.read(readings.id_of("cpu").unwrap()).value, 45.3);
        assert_eq!(store.read(readings.id_of("gpu").unwrap()).value, 52.0);
    }

    #[tokio::test]
    async fn test_run_survives_invalid_utf8() {
        let (readings, store) = fixture();
        let input = b"\xff\xfe garbage\nGPU die temperature: 50.5 C\n";
        let exit = reader(input, &readings, &store)
            .run(&CancellationToken::new())
            .await;

        assert_eq!(exit, ReaderExit::Eof);
        assert_eq!(store.read(readings.id_of("gpu").unwrap()).value, 50.5);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let (readings, store) = fixture();
        let (mut tx, rx) = tokio::io::duplex(64);
        let r = StreamReader::new(BufReader::new(rx), Arc::clone(&readings), Arc::clone(&store));
        let cancel = CancellationToken::new();

        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move { r.run(&cancel).await })
        };

        tx.write_all(b"CPU die temperature: 41.0 C\n").await.unwrap();
        let cpu = readings.id_of("cpu").unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !store.read(cpu).populated {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("line was not applied");

        // The writer stays open, so only cancellation can end the loop.
        cancel.cancel();
        let exit = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("reader did not stop")
            .unwrap();
        assert_eq!(exit, ReaderExit::Cancelled);
        assert_eq!(store.read(cpu).value, 41.0);
    }
}
