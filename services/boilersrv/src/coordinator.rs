//! Caching coordinator over one boiler
//!
//! Shields consumers from protocol flakiness:
//! - lazy discovery of which interesting slugs the boiler actually serves
//! - per-slug TTL cache, refreshed on demand by the poll loop
//! - validation of every fresh value before it replaces the cached one
//! - optimistic writes followed by repeated best-effort delivery
//!
//! The cache lock is only held for in-memory updates, never across an await.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Weekday;
use econet_protocol::{schedule_slugs, DataType, DaySchedule, DeviceClient, ParamValue};
use errors::{EconetError, EconetResult};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::validation::{is_sentinel, validate};

/// Coordinator timing and retry policy
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Cached values younger than this are served without a device read
    pub ttl: Duration,
    /// Read attempts per slug during discovery
    pub discovery_retries: u32,
    /// Read attempts per stale slug during refresh
    pub refresh_retries: u32,
    /// Physical sends per accepted write
    pub write_repeats: u32,
    /// Gap between repeated sends
    pub write_gap: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            discovery_retries: 5,
            refresh_retries: 2,
            write_repeats: 5,
            write_gap: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: ParamValue,
    updated: Instant,
}

#[derive(Debug)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// `None` until discovery found at least one slug
    available: Option<Vec<String>>,
    last_refresh_ok: bool,
}

struct WriteTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Read-through / write-through cache in front of a [`DeviceClient`]
pub struct Coordinator {
    device: Arc<dyn DeviceClient>,
    config: CoordinatorConfig,
    interesting: Vec<String>,
    state: Mutex<CacheState>,
    writes: Mutex<HashMap<String, WriteTask>>,
    discovery: tokio::sync::Mutex<()>,
    changes: watch::Sender<u64>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.config)
            .field("interesting", &self.interesting)
            .field("cached", &self.state.lock().entries.len())
            .finish()
    }
}

impl Coordinator {
    /// `slugs` is deduplicated and processed in sorted order
    pub fn new<I, S>(device: Arc<dyn DeviceClient>, slugs: I, config: CoordinatorConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let interesting: BTreeSet<String> = slugs.into_iter().map(Into::into).collect();
        let (changes, _) = watch::channel(0);
        Self {
            device,
            config,
            interesting: interesting.into_iter().collect(),
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                available: None,
                last_refresh_ok: true,
            }),
            writes: Mutex::new(HashMap::new()),
            discovery: tokio::sync::Mutex::new(()),
            changes,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Change counter, bumped on every cache mutation
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Slugs retained by discovery, empty before the first refresh
    pub fn list_available_slugs(&self) -> Vec<String> {
        self.state.lock().available.clone().unwrap_or_default()
    }

    /// False when the last refresh attempted reads and none was accepted
    pub fn last_refresh_succeeded(&self) -> bool {
        self.state.lock().last_refresh_ok
    }

    /// Last known value, fresh or not
    pub fn get_value(&self, slug: &str) -> Option<ParamValue> {
        self.state.lock().entries.get(slug).map(|e| e.value.clone())
    }

    fn fresh_value(&self, slug: &str) -> Option<ParamValue> {
        let state = self.state.lock();
        state
            .entries
            .get(slug)
            .filter(|e| e.updated.elapsed() < self.config.ttl)
            .map(|e| e.value.clone())
    }

    fn store(&self, slug: &str, value: ParamValue) {
        self.state.lock().entries.insert(
            slug.to_string(),
            CacheEntry {
                value,
                updated: Instant::now(),
            },
        );
        self.changes.send_modify(|n| *n = n.wrapping_add(1));
    }

    /// Probe every interesting slug; once any answered, later calls return
    /// the stored result. An empty result is not stored, so a boiler that
    /// was offline at startup is discovered on a later refresh.
    pub async fn discover(&self) -> Vec<String> {
        let _guard = self.discovery.lock().await;
        if let Some(available) = self.state.lock().available.clone() {
            return available;
        }

        let params = self.device.parameters();
        let mut available = Vec::new();
        for slug in &self.interesting {
            let Some(def) = params.get(slug) else {
                warn!("{}: not in the parameter map, skipped", slug);
                continue;
            };
            match self
                .device
                .get_value(slug, self.config.discovery_retries)
                .await
            {
                Ok(Some(value)) if is_sentinel(&value) => {
                    debug!("{}: sentinel value, not connected", slug);
                },
                Ok(Some(value)) => {
                    if validate(def, Some(&value), None).is_ok() {
                        self.store(slug, value);
                    }
                    available.push(slug.clone());
                },
                Ok(None) => debug!("{}: no answer during discovery", slug),
                Err(e) => warn!("{}: discovery failed: {}", slug, e),
            }
        }

        info!(
            "Discovered {}/{} parameters",
            available.len(),
            self.interesting.len()
        );
        if !available.is_empty() {
            self.state.lock().available = Some(available.clone());
        }
        available
    }

    /// One refresh cycle; returns the values known after it
    pub async fn refresh(&self) -> BTreeMap<String, ParamValue> {
        let available = self.discover().await;
        let params = self.device.parameters();

        let mut snapshot = BTreeMap::new();
        let mut attempted = 0usize;
        let mut accepted = 0usize;

        for slug in &available {
            if let Some(value) = self.fresh_value(slug) {
                snapshot.insert(slug.clone(), value);
                continue;
            }
            let Some(def) = params.get(slug) else {
                continue;
            };

            attempted += 1;
            let read = match self
                .device
                .get_value(slug, self.config.refresh_retries)
                .await
            {
                Ok(value) => value,
                Err(e) => {
                    warn!("{}: read failed: {}", slug, e);
                    None
                },
            };

            let previous = self.get_value(slug);
            match (validate(def, read.as_ref(), previous.as_ref()), read) {
                (Ok(()), Some(value)) => {
                    accepted += 1;
                    self.store(slug, value.clone());
                    snapshot.insert(slug.clone(), value);
                },
                (result, _) => {
                    if let Err(reason) = result {
                        debug!("{}: rejected ({}), keeping last good", slug, reason);
                    }
                    if let Some(prev) = previous {
                        snapshot.insert(slug.clone(), prev);
                    }
                },
            }
        }

        let ok = attempted == 0 || accepted > 0;
        self.state.lock().last_refresh_ok = ok;
        if !ok {
            warn!("Refresh cycle failed: {} reads, none accepted", attempted);
        } else {
            debug!(
                "Refresh cycle: {} cached, {}/{} reads accepted",
                snapshot.len() - accepted,
                accepted,
                attempted
            );
        }
        snapshot
    }

    /// Accept a write: cache it now, deliver it in the background
    ///
    /// A newer write to the same slug cancels the pending delivery. A value
    /// the declared type cannot carry is refused before touching the cache.
    pub fn set_value(&self, slug: &str, value: ParamValue) -> EconetResult<bool> {
        let def = self
            .device
            .parameters()
            .get(slug)
            .ok_or_else(|| EconetError::UnknownParameter(slug.to_string()))?;
        let fits = match def.data_type {
            DataType::Bool => value.as_bool().is_some(),
            DataType::String => value.as_str().is_some(),
            _ => value.as_f64().is_some_and(f64::is_finite),
        };
        if !fits {
            return Err(EconetError::Encode {
                slug: slug.to_string(),
                reason: format!("{} parameter cannot take {}", def.data_type, value),
            });
        }

        self.store(slug, value.clone());

        let mut writes = self.writes.lock();
        if let Some(previous) = writes.remove(slug) {
            if !previous.handle.is_finished() {
                debug!("{}: superseding pending write", slug);
            }
            previous.token.cancel();
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(deliver(
            Arc::clone(&self.device),
            slug.to_string(),
            value,
            self.config.write_repeats.max(1),
            self.config.write_gap,
            token.clone(),
        ));
        writes.insert(slug.to_string(), WriteTask { token, handle });
        Ok(true)
    }

    /// Number of deliveries still running
    pub fn pending_writes(&self) -> usize {
        self.writes
            .lock()
            .values()
            .filter(|t| !t.handle.is_finished())
            .count()
    }

    /// Decoded schedule from the cached `<prefix><day>am/pm` registers
    pub fn day_schedule(&self, prefix: &str, day: Weekday) -> Option<DaySchedule> {
        let (am_slug, pm_slug) = schedule_slugs(prefix, day);
        let am = self.get_value(&am_slug).as_ref().and_then(register)?;
        let pm = self.get_value(&pm_slug).as_ref().and_then(register)?;
        Some(DaySchedule::from_registers(am, pm))
    }

    /// Cancel and wait for all pending deliveries
    pub async fn shutdown(&self) {
        let tasks: Vec<(String, WriteTask)> = self.writes.lock().drain().collect();
        for (slug, task) in tasks {
            task.token.cancel();
            if let Err(e) = task.handle.await {
                if !e.is_cancelled() {
                    error!("{}: write task ended abnormally: {}", slug, e);
                }
            }
        }
        debug!("Coordinator stopped");
    }
}

fn register(value: &ParamValue) -> Option<u32> {
    match value {
        ParamValue::Int(v) => u32::try_from(*v).ok(),
        ParamValue::Float(v) if *v >= 0.0 && v.fract() == 0.0 && *v <= f64::from(u32::MAX) => {
            Some(*v as u32)
        },
        _ => None,
    }
}

async fn deliver(
    device: Arc<dyn DeviceClient>,
    slug: String,
    value: ParamValue,
    repeats: u32,
    gap: Duration,
    token: CancellationToken,
) {
    for n in 1..=repeats {
        let result = tokio::select! {
            () = token.cancelled() => {
                debug!("{}: write of {} cancelled", slug, value);
                return;
            }
            result = device.set_value(&slug, &value, None) => result,
        };
        match result {
            Ok(true) => debug!("{} <- {} sent ({}/{})", slug, value, n, repeats),
            Ok(false) => warn!("{} <- {} not acknowledged ({}/{})", slug, value, n, repeats),
            Err(e) => {
                error!("{} <- {} abandoned: {}", slug, value, e);
                return;
            },
        }
        if n < repeats {
            tokio::select! {
                () = token.cancelled() => return,
                () = tokio::time::sleep(gap) => {},
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use async_trait::async_trait;
    use econet_protocol::{Credentials, DataType, ParameterDef, ParameterMap};
    use tracing_test::traced_test;

    /// Answers every mapped slug with a constant
    struct FixedDevice {
        params: ParameterMap,
        value: ParamValue,
    }

    #[async_trait]
    impl DeviceClient for FixedDevice {
        fn parameters(&self) -> &ParameterMap {
            &self.params
        }

        async fn get_value(
            &self,
            _slug: &str,
            _retries: u32,
        ) -> econet_protocol::Result<Option<ParamValue>> {
            Ok(Some(self.value.clone()))
        }

        async fn set_value(
            &self,
            _slug: &str,
            _value: &ParamValue,
            _credentials: Option<&Credentials>,
        ) -> econet_protocol::Result<bool> {
            Ok(true)
        }
    }

    fn fixed(value: ParamValue) -> Arc<dyn DeviceClient> {
        Arc::new(FixedDevice {
            params: ParameterMap::from_defs([ParameterDef {
                slug: "tempcwu".into(),
                id: 1281,
                data_type: DataType::Byte,
                exponent: 0,
                min: None,
                max: None,
                max_delta: None,
            }]),
            value,
        })
    }

    #[tokio::test]
    #[traced_test]
    async fn test_discovery_logs_summary() {
        let coord = Coordinator::new(
            fixed(ParamValue::Int(45)),
            ["tempcwu", "unmapped"],
            CoordinatorConfig::default(),
        );
        assert_eq!(coord.discover().await, vec!["tempcwu"]);
        assert!(logs_contain("unmapped: not in the parameter map"));
        assert!(logs_contain("Discovered 1/2 parameters"));
    }

    #[tokio::test]
    async fn test_sentinel_device_discovers_nothing() {
        let coord = Coordinator::new(
            fixed(ParamValue::Int(999)),
            ["tempcwu"],
            CoordinatorConfig::default(),
        );
        assert!(coord.refresh().await.is_empty());
        assert!(coord.list_available_slugs().is_empty());
        // nothing to read is not a failure
        assert!(coord.last_refresh_succeeded());
    }

    #[test]
    fn test_register_values() {
        assert_eq!(register(&ParamValue::Int(0x00FF_F000)), Some(0x00FF_F000));
        assert_eq!(register(&ParamValue::Int(-1)), None);
        assert_eq!(register(&ParamValue::Float(4096.0)), Some(4096));
        assert_eq!(register(&ParamValue::Float(1.5)), None);
        assert_eq!(register(&ParamValue::Text("x".into())), None);
    }

    #[test]
    fn test_default_config() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(300));
        assert_eq!(config.discovery_retries, 5);
        assert_eq!(config.refresh_retries, 2);
        assert_eq!(config.write_repeats, 5);
        assert_eq!(config.write_gap, Duration::from_secs(2));
    }
}
