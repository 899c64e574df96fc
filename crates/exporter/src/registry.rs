use crate::ExportError;
use prometheus::{Counter, Gauge, Opts, Registry, TextEncoder};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Name plus label set; identifies one exported series within a run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MetricIdentity {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

impl MetricIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
        }
    }

    pub fn label(mut self, key: &str, value: impl Into<String>) -> Self {
        self.labels.insert(key.to_string(), value.into());
        self
    }
}

impl fmt::Display for MetricIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        f.write_str("{")?;
        for (index, (key, value)) in self.labels.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}=\"{}\"", key, value)?;
        }
        f.write_str("}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

/// Metric registry scoped to one export run. Each identity may be
/// registered once; a second registration is an error rather than an
/// overwrite.
pub struct ExportRegistry {
    registry: Registry,
    seen: BTreeSet<MetricIdentity>,
}

impl ExportRegistry {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            seen: BTreeSet::new(),
        }
    }

    pub fn register(
        &mut self,
        identity: MetricIdentity,
        kind: MetricKind,
        help: &str,
        value: f64,
    ) -> Result<(), ExportError> {
        if self.seen.contains(&identity) {
            return Err(ExportError::DuplicateMetric(identity.to_string()));
        }
        let labels: HashMap<String, String> = identity
            .labels
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let opts = Opts::new(identity.name.clone(), help).const_labels(labels);
        match kind {
            MetricKind::Counter => {
                let counter = Counter::with_opts(opts)?;
                counter.inc_by(value);
                self.registry.register(Box::new(counter))?;
            }
            MetricKind::Gauge => {
                let gauge = Gauge::with_opts(opts)?;
                gauge.set(value);
                self.registry.register(Box::new(gauge))?;
            }
        }
        self.seen.insert(identity);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn contains(&self, identity: &MetricIdentity) -> bool {
        self.seen.contains(identity)
    }

    /// Text exposition of everything registered, families sorted by name and
    /// series by label values.
    pub fn render(&self) -> Result<String, ExportError> {
        let families = self.registry.gather();
        let mut output = String::new();
        TextEncoder::new().encode_utf8(&families, &mut output)?;
        Ok(output)
    }
}

impl Default for ExportRegistry {
    fn default() -> Self {
        Self::new()
    }
}
