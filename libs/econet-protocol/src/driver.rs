//! Device driver: per-parameter get/set with retries
//!
//! Read request payload: `session (LE16) | count=1 | sub-index=1 | id (LE16)`.
//! The response echoes the session in its first two bytes (0 matches any
//! request) and carries the value from offset 7.
//!
//! Write request payload: `user NUL | password NUL | 0x01 | id (LE16) | value`.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, trace, warn};

use crate::constants::{
    DEFAULT_DEST_ADDRESS, DEFAULT_SOURCE_ADDRESS, FORCE_WRITE_MARKER, FUNC_READ, FUNC_WRITE,
    READ_DATA_OFFSET, SESSION_INITIAL, SESSION_MODULUS, SESSION_WILDCARD,
};
use crate::error::{ProtocolError, Result};
use crate::frame::Frame;
use crate::params::{ExponentConvention, ParameterDef, ParameterMap};
use crate::transport::{TcpLink, TcpTransportConfig, Transaction};
use crate::value::{decode_value, encode_value, ParamValue};

/// Login sent with every write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            user: "admin".to_string(),
            password: "0000".to_string(),
        }
    }
}

/// Timing and addressing of the driver
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub dest_address: u16,
    pub source_address: u16,
    /// Per-attempt ceiling for reads
    pub read_timeout: Duration,
    /// Per-attempt ceiling for writes
    pub write_timeout: Duration,
    /// Backoff after read attempt n is `read_backoff * n`
    pub read_backoff: Duration,
    pub write_attempts: u32,
    pub write_retry_delay: Duration,
    pub exponent_convention: ExponentConvention,
    pub credentials: Credentials,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            dest_address: DEFAULT_DEST_ADDRESS,
            source_address: DEFAULT_SOURCE_ADDRESS,
            read_timeout: Duration::from_secs(2),
            write_timeout: Duration::from_secs(2),
            read_backoff: Duration::from_millis(200),
            write_attempts: 3,
            write_retry_delay: Duration::from_secs(1),
            exponent_convention: ExponentConvention::Multiply,
            credentials: Credentials::default(),
        }
    }
}

/// Wrapping transaction counter used for response correlation
#[derive(Debug)]
pub struct SessionCounter(AtomicU16);

impl Default for SessionCounter {
    fn default() -> Self {
        Self(AtomicU16::new(SESSION_INITIAL))
    }
}

impl SessionCounter {
    /// Advance and return the new session id
    pub fn next(&self) -> u16 {
        let advance = |v: u16| (v + 1) % SESSION_MODULUS;
        match self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| Some(advance(v)))
        {
            Ok(prev) | Err(prev) => advance(prev),
        }
    }

    pub fn current(&self) -> u16 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Consumer-facing device API
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Loaded parameter definitions
    fn parameters(&self) -> &ParameterMap;

    /// Read one parameter; `Ok(None)` when every attempt failed
    async fn get_value(&self, slug: &str, retries: u32) -> Result<Option<ParamValue>>;

    /// Write one parameter; `Ok(false)` when the device never acknowledged
    async fn set_value(
        &self,
        slug: &str,
        value: &ParamValue,
        credentials: Option<&Credentials>,
    ) -> Result<bool>;
}

/// ecoNET boiler driver
pub struct EconetDevice {
    link: Arc<dyn Transaction>,
    params: Arc<ParameterMap>,
    config: DriverConfig,
    session: SessionCounter,
}

impl std::fmt::Debug for EconetDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EconetDevice")
            .field("params", &self.params.len())
            .field("config", &self.config)
            .field("session", &self.session.current())
            .finish()
    }
}

impl EconetDevice {
    pub fn new(link: Arc<dyn Transaction>, params: Arc<ParameterMap>, config: DriverConfig) -> Self {
        Self {
            link,
            params,
            config,
            session: SessionCounter::default(),
        }
    }

    /// Driver over a TCP link to `endpoint`
    pub fn with_tcp(
        endpoint: TcpTransportConfig,
        params: Arc<ParameterMap>,
        config: DriverConfig,
    ) -> Result<Self> {
        let link = TcpLink::new(endpoint)?;
        Ok(Self::new(Arc::new(link), params, config))
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    fn lookup(&self, slug: &str) -> Result<&ParameterDef> {
        self.params
            .get(slug)
            .ok_or_else(|| ProtocolError::UnknownParameter(slug.to_string()))
    }

    fn request(&self, func: u8, payload: Vec<u8>) -> Frame {
        Frame::new(
            self.config.dest_address,
            self.config.source_address,
            func,
            payload,
        )
    }

    /// Build a read request for `def` under `session`
    pub fn read_request(&self, def: &ParameterDef, session: u16) -> Frame {
        let mut payload = Vec::with_capacity(6);
        payload.extend_from_slice(&session.to_le_bytes());
        payload.push(1);
        payload.push(1);
        payload.extend_from_slice(&def.id.to_le_bytes());
        self.request(FUNC_READ, payload)
    }

    /// Build a write request carrying an already encoded value
    pub fn write_request(&self, def: &ParameterDef, encoded: &[u8], credentials: &Credentials) -> Frame {
        let mut payload = Vec::with_capacity(
            credentials.user.len() + credentials.password.len() + 5 + encoded.len(),
        );
        payload.extend_from_slice(credentials.user.as_bytes());
        payload.push(0x00);
        payload.extend_from_slice(credentials.password.as_bytes());
        payload.push(0x00);
        payload.push(FORCE_WRITE_MARKER);
        payload.extend_from_slice(&def.id.to_le_bytes());
        payload.extend_from_slice(encoded);
        self.request(FUNC_WRITE, payload)
    }

    async fn read_once(&self, def: &ParameterDef) -> Result<ParamValue> {
        let session = self.session.next();
        let request = self.read_request(def, session);

        let response = self
            .link
            .transact(&request, self.config.read_timeout)
            .await?
            .ok_or_else(|| {
                ProtocolError::timeout(format!("no response within {:?}", self.config.read_timeout))
            })?;

        let payload = &response.payload;
        if payload.len() < 2 {
            return Err(ProtocolError::invalid_frame("response payload too short"));
        }
        let echoed = u16::from_le_bytes([payload[0], payload[1]]);
        if echoed == SESSION_WILDCARD {
            trace!("{}: wildcard session in response", def.slug);
        } else if echoed != session {
            return Err(ProtocolError::invalid_frame(format!(
                "session mismatch: sent {}, got {}",
                session, echoed
            )));
        }

        let data = payload.get(READ_DATA_OFFSET..).ok_or_else(|| {
            ProtocolError::decode(format!("response has {} payload bytes, no data", payload.len()))
        })?;
        decode_value(
            data,
            def.data_type,
            def.exponent,
            self.config.exponent_convention,
        )
    }
}

#[async_trait]
impl DeviceClient for EconetDevice {
    fn parameters(&self) -> &ParameterMap {
        &self.params
    }

    async fn get_value(&self, slug: &str, retries: u32) -> Result<Option<ParamValue>> {
        let def = self.lookup(slug)?;
        let attempts = retries.max(1);

        for attempt in 1..=attempts {
            match self.read_once(def).await {
                Ok(value) => {
                    debug!("{} = {}", slug, value);
                    return Ok(Some(value));
                },
                Err(e) => warn!("{} read {}/{}: {}", slug, attempt, attempts, e),
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.read_backoff * attempt).await;
            }
        }

        error!("{} unavailable after {} attempts", slug, attempts);
        Ok(None)
    }

    async fn set_value(
        &self,
        slug: &str,
        value: &ParamValue,
        credentials: Option<&Credentials>,
    ) -> Result<bool> {
        let def = self.lookup(slug)?;
        let encoded = encode_value(
            value,
            def.data_type,
            def.exponent,
            self.config.exponent_convention,
        )
        .map_err(|e| ProtocolError::encode(format!("{}: {}", slug, e)))?;
        let credentials = credentials.unwrap_or(&self.config.credentials);
        let request = self.write_request(def, &encoded, credentials);
        let attempts = self.config.write_attempts.max(1);

        for attempt in 1..=attempts {
            self.session.next();
            match self.link.transact(&request, self.config.write_timeout).await {
                Ok(Some(_)) => {
                    debug!("{} <- {} acknowledged", slug, value);
                    return Ok(true);
                },
                Ok(None) => warn!("{} write {}/{}: no ack", slug, attempt, attempts),
                Err(e) => warn!("{} write {}/{}: {}", slug, attempt, attempts, e),
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.write_retry_delay).await;
            }
        }

        error!("{} write failed after {} attempts", slug, attempts);
        Ok(false)
    }
}
