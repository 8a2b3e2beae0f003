use metrics::{Key, Label};
use std::fmt::Write;

/// Name of the single field carried by every sample.
pub const FIELD: &str = "value";

const MEASUREMENT_ESCAPES: &[char] = &[',', ' '];
const TAG_ESCAPES: &[char] = &[',', '=', ' '];

/// Identity of the published series: a measurement name plus static tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    key: Key,
}

impl Series {
    pub fn new(measurement: impl Into<String>) -> Self {
        let measurement: String = measurement.into();

        Self {
            key: Key::from_name(measurement),
        }
    }

    /// Attach a static tag to every sample of this series.
    ///
    /// Tags are written in the order they were added.
    pub fn with_tag(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut labels: Vec<Label> = self.key.labels().cloned().collect();
        let (key, value): (String, String) = (key.into(), value.into());
        labels.push(Label::new(key, value));

        Self {
            key: Key::from_parts(self.key.name().to_owned(), labels),
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn measurement(&self) -> &str {
        self.key.name()
    }

    /// Format one sample as a single line protocol record, without a
    /// trailing newline.
    pub fn format_line(&self, value: f64, timestamp_ns: i64) -> String {
        let mut line = String::with_capacity(64);

        escape_into(&mut line, self.key.name(), MEASUREMENT_ESCAPES);

        for label in self.key.labels() {
            line.push(',');
            escape_into(&mut line, label.key(), TAG_ESCAPES);
            line.push('=');
            escape_into(&mut line, label.value(), TAG_ESCAPES);
        }

        write!(line, " {FIELD}={value} {timestamp_ns}").ok();

        line
    }
}

fn escape_into(out: &mut String, raw: &str, special: &[char]) {
    for c in raw.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_measurement() {
        let series = Series::new("value");

        assert_eq!(
            series.format_line(0.5, 1_700_000_000_000_000_000),
            "value value=0.5 1700000000000000000"
        );
    }

    #[test]
    fn tags_keep_insertion_order() {
        let series = Series::new("series")
            .with_tag("language", "rust")
            .with_tag("hostname", "box");

        assert_eq!(
            series.format_line(0.2, 1465839830100400200),
            "series,language=rust,hostname=box value=0.2 1465839830100400200"
        );
        assert_eq!(series.measurement(), "series");
        assert_eq!(series.key().labels().count(), 2);
    }

    #[test]
    fn accumulated_float_keeps_full_precision() {
        let series = Series::new("value");
        let value = 0.1 + 0.2;

        assert_eq!(
            series.format_line(value, 1),
            "value value=0.30000000000000004 1"
        );
    }

    #[test]
    fn special_characters_are_escaped() {
        let series = Series::new("cpu load").with_tag("host name", "a,b=c");

        assert_eq!(
            series.format_line(1.0, 5),
            r"cpu\ load,host\ name=a\,b\=c value=1 5"
        );
    }
}
