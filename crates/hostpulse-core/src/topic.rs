//! Topic routing shared by the broker transport, the broker listener and
//! the HTTP transport (where the topic becomes the event type).

use crate::reading::MetricName;

/// Placeholder replaced by the client id.
pub const CLIENT_ID_PLACEHOLDER: &str = "{client_id}";
/// Placeholder replaced by the metric name.
pub const METRIC_PLACEHOLDER: &str = "{metric}";

pub const DEFAULT_TEMPLATE: &str = "/ef/machine/{client_id}/stats/{metric}";

/// Suffix appended to a metric topic for its deltas.
pub const DELTA_SUFFIX: &str = "/diff";

/// Immutable topic pattern with `{client_id}` and `{metric}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicTemplate {
    pattern: String,
}

impl Default for TopicTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl TopicTemplate {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Topic for absolute readings of `metric`.
    pub fn topic(&self, client_id: &str, metric: MetricName) -> String {
        self.pattern
            .replace(CLIENT_ID_PLACEHOLDER, client_id)
            .replace(METRIC_PLACEHOLDER, metric.as_str())
    }

    /// Topic for deltas of `metric`.
    pub fn delta_topic(&self, client_id: &str, metric: MetricName) -> String {
        self.topic(client_id, metric) + DELTA_SUFFIX
    }
}

impl std::fmt::Display for TopicTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_topics() {
        let t = TopicTemplate::default();
        assert_eq!(t.topic("abc", MetricName::Mem), "/ef/machine/abc/stats/mem");
        assert_eq!(
            t.delta_topic("abc", MetricName::Fs),
            "/ef/machine/abc/stats/fs/diff"
        );
    }

    #[test]
    fn custom_pattern_without_client_id() {
        let t = TopicTemplate::new("hosts/{metric}");
        assert_eq!(t.topic("ignored", MetricName::Cpu), "hosts/cpu");
    }
}
