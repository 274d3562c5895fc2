//! Internal metric registry for the agent's own operational counters
//!
//! Stats are keyed by a 64-bit hash of their identity (measurement name plus
//! sorted tag set). Inserting a new identity or a new field takes a shard lock
//! in the map; incrementing an existing stat is a single atomic operation and
//! never touches the map.

use crate::metrics::{FieldValue, Metric};
use crate::{PulseError, Result};
use dashmap::DashMap;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// Measurement under which the agent reports its own counters.
pub const AGENT_MEASUREMENT: &str = "agent";

/// Measurement name plus tag set. Tags are stored sorted, so two identities
/// built from the same pairs in different order compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatIdentity {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
}

impl StatIdentity {
    pub fn new<I, K, V>(measurement: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            measurement: measurement.into(),
            tags: tags
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl fmt::Display for StatIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.measurement)?;
        for (k, v) in &self.tags {
            write!(f, ",{}={}", k, v)?;
        }
        Ok(())
    }
}

/// Handle to one counter. Clones share the same value.
#[derive(Debug, Clone)]
pub struct Stat {
    field: Arc<str>,
    value: Arc<AtomicI64>,
}

impl Stat {
    fn new(field: &str) -> Self {
        Self {
            field: Arc::from(field),
            value: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.field
    }

    pub fn incr(&self, v: i64) {
        self.value.fetch_add(v, Ordering::Relaxed);
    }

    pub fn set(&self, v: i64) {
        self.value.store(v, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// All counters registered under one identity.
#[derive(Debug)]
pub struct StatBundle {
    identity: StatIdentity,
    fields: DashMap<String, Stat>,
}

impl StatBundle {
    fn new(identity: StatIdentity) -> Self {
        Self {
            identity,
            fields: DashMap::new(),
        }
    }

    pub fn identity(&self) -> &StatIdentity {
        &self.identity
    }

    /// Get the counter for `field`, creating it at zero on first use.
    pub fn stat(&self, field: &str) -> Stat {
        if let Some(existing) = self.fields.get(field) {
            return existing.clone();
        }
        self.fields
            .entry(field.to_string())
            .or_insert_with(|| Stat::new(field))
            .clone()
    }

    fn snapshot(&self) -> StatSnapshot {
        StatSnapshot {
            measurement: self.identity.measurement.clone(),
            tags: self.identity.tags.clone(),
            fields: self
                .fields
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().get()))
                .collect(),
        }
    }
}

/// Point-in-time copy of one bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatSnapshot {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, i64>,
}

impl StatSnapshot {
    pub fn to_metric(&self, prefix: &str, timestamp: SystemTime) -> Metric {
        Metric::new(
            format!("{}{}", prefix, self.measurement),
            self.tags.clone(),
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), FieldValue::Int(*v)))
                .collect(),
            timestamp,
        )
    }
}

/// Process-wide table of internal stats.
///
/// Cheap to clone; every clone refers to the same table.
#[derive(Debug, Clone, Default)]
pub struct StatRegistry {
    bundles: Arc<DashMap<u64, Arc<StatBundle>>>,
}

impl StatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an identity, returning the existing bundle if it is already known.
    ///
    /// A different identity landing on an occupied hash is rejected rather than
    /// silently sharing counters.
    pub fn register<I, K, V>(&self, measurement: &str, tags: I) -> Result<Arc<StatBundle>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let identity = StatIdentity::new(measurement, tags);
        let key = identity.key();

        let bundle = self
            .bundles
            .entry(key)
            .or_insert_with(|| Arc::new(StatBundle::new(identity.clone())))
            .clone();

        if bundle.identity != identity {
            return Err(PulseError::StatCollision {
                hash: key,
                existing: bundle.identity.to_string(),
                requested: identity.to_string(),
            });
        }

        Ok(bundle)
    }

    /// Register a single counter, `measurement` + `tags` identifying its bundle.
    pub fn register_stat<I, K, V>(&self, measurement: &str, field: &str, tags: I) -> Result<Stat>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Ok(self.register(measurement, tags)?.stat(field))
    }

    /// Copy of every bundle, ordered by measurement then tags.
    pub fn snapshot(&self) -> Vec<StatSnapshot> {
        let mut snapshots: Vec<StatSnapshot> = self
            .bundles
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        snapshots.sort_by(|a, b| (&a.measurement, &a.tags).cmp(&(&b.measurement, &b.tags)));
        snapshots
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

/// Counters the agent runtime reports about itself.
#[derive(Debug, Clone)]
pub struct AgentStats {
    pub gather_errors: Stat,
    pub metrics_written: Stat,
    pub metrics_dropped: Stat,
    pub metrics_gathered: Stat,
}

impl AgentStats {
    pub fn register(registry: &StatRegistry) -> Result<Self> {
        let bundle = registry.register(AGENT_MEASUREMENT, Vec::<(String, String)>::new())?;
        Ok(Self {
            gather_errors: bundle.stat("gather_errors"),
            metrics_written: bundle.stat("metrics_written"),
            metrics_dropped: bundle.stat("metrics_dropped"),
            metrics_gathered: bundle.stat("metrics_gathered"),
        })
    }
}
