use crate::metrics::{FieldValue, Metric, Stat};
use std::collections::BTreeMap;
use std::time::SystemTime;

/// Collects the metrics produced by one input during one gather.
///
/// Global tags are merged into every metric; tags set by the input win.
pub struct Accumulator {
    global_tags: BTreeMap<String, String>,
    metrics: Vec<Metric>,
    gathered: Option<Stat>,
    timestamp: SystemTime,
}

impl Accumulator {
    pub fn new(global_tags: BTreeMap<String, String>) -> Self {
        Self {
            global_tags,
            metrics: Vec::new(),
            gathered: None,
            timestamp: SystemTime::now(),
        }
    }

    /// Count every accepted metric against `stat`.
    pub fn with_counter(mut self, stat: Stat) -> Self {
        self.gathered = Some(stat);
        self
    }

    pub fn add_fields<F, T>(&mut self, measurement: &str, fields: F, tags: T)
    where
        F: IntoIterator<Item = (String, FieldValue)>,
        T: IntoIterator<Item = (String, String)>,
    {
        let fields: BTreeMap<String, FieldValue> = fields.into_iter().collect();
        if fields.is_empty() {
            return;
        }

        let mut merged = self.global_tags.clone();
        merged.extend(tags);

        self.push(Metric::new(measurement, merged, fields, self.timestamp));
    }

    pub fn add_metric(&mut self, mut metric: Metric) {
        for (k, v) in &self.global_tags {
            metric.tags.entry(k.clone()).or_insert_with(|| v.clone());
        }
        self.push(metric);
    }

    fn push(&mut self, metric: Metric) {
        if let Some(stat) = &self.gathered {
            stat.incr(1);
        }
        self.metrics.push(metric);
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn into_metrics(self) -> Vec<Metric> {
        self.metrics
    }
}
