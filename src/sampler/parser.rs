//! Line grammar of the facility output.
//!
//! Lines of interest look like `<reading-name>: <number>[ <unit/suffix>]`.
//! Anything else is ignored; nothing here is an error.

/// Separator between a reading name and its value.
pub const DELIMITER: &str = ": ";

/// A line split into a candidate reading name and its value-bearing remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawReading<'a> {
    pub key: &'a str,
    pub remainder: &'a str,
}

impl RawReading<'_> {
    /// Leading number of the remainder, if any.
    pub fn value(&self) -> Option<f64> {
        parse_value(self.remainder)
    }
}

/// Split a line on the first [`DELIMITER`].
///
/// ```
/// use powerscope::sampler::parser::parse_line;
///
/// let raw = parse_line("CPU die temperature: 45.3 C").unwrap();
/// assert_eq!(raw.key, "CPU die temperature");
/// assert_eq!(raw.value(), Some(45.3));
/// assert!(parse_line("**** SMC sensors ****").is_none());
/// ```
pub fn parse_line(line: &str) -> Option<RawReading<'_>> {
    let (key, remainder) = line.split_once(DELIMITER)?;
    Some(RawReading { key, remainder })
}

/// Parse the first whitespace-separated token of `remainder` as `f64`.
pub fn parse_value(remainder: &str) -> Option<f64> {
    remainder.split_whitespace().next()?.parse().ok()
}
