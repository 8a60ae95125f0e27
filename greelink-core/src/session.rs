//! Session state for one appliance
//!
//! A session tracks everything negotiated with a single appliance over one
//! connection: identity, encryption scheme and key, bound flag, and the
//! last-known property map. The driver task is the only writer; handles
//! held by the embedding application only read. Identity, scheme and key
//! are write-once per binding cycle; losing a binding (the appliance
//! reboots and stops honouring the key) means starting a fresh session.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::constants::KEY_LEN;
use crate::crypto::{CipherContext, Scheme, GENERIC_KEY};
use crate::error::{Error, Result};

/// Protocol phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Probe sent, waiting for the handshake reply
    Scanning,

    /// Identified and bind request sent, waiting for the acknowledgement
    Binding,

    /// Session key in hand; polling and commanding are allowed
    Bound,
}

/// Session handle
///
/// Thread-safe and cheap to clone (Arc internally). All mutation happens
/// through the driver task; clones held elsewhere are read-only in
/// practice.
///
/// # Examples
///
/// ```
/// use greelink_core::session::{Phase, Session};
/// use greelink_core::crypto::Scheme;
///
/// let session = Session::new();
/// assert_eq!(session.phase(), Phase::Scanning);
///
/// let endpoint = "192.168.1.60:7000".parse().unwrap();
/// let scheme = session
///     .identify("f4911e7aca59", None, Some("V2.1.0".into()), endpoint)
///     .unwrap();
/// assert_eq!(scheme, Scheme::Gcm);
///
/// session.bind("0123456789abcdef").unwrap();
/// assert!(session.is_bound());
/// ```
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    /// Envelope counter; looks monotonic on the wire, never checked on
    /// receipt
    seq: AtomicU32,

    state: RwLock<State>,
}

#[derive(Debug)]
struct State {
    phase: Phase,
    id: Option<String>,
    name: Option<String>,
    firmware: Option<String>,
    /// Endpoint the appliance reported by replying from it; supersedes the
    /// configured address for all outbound control traffic
    control: Option<SocketAddr>,
    scheme: Scheme,
    key: [u8; KEY_LEN],
    properties: HashMap<String, Value>,
}

impl Session {
    /// Create a fresh session: scanning phase, legacy scheme, generic key
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                seq: AtomicU32::new(1),
                state: RwLock::new(State {
                    phase: Phase::Scanning,
                    id: None,
                    name: None,
                    firmware: None,
                    control: None,
                    scheme: Scheme::Ecb,
                    key: *GENERIC_KEY,
                    properties: HashMap::new(),
                }),
            }),
        }
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.read().phase
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.phase(), Phase::Bound)
    }

    /// Whether the handshake reply has been processed
    pub fn identified(&self) -> bool {
        !matches!(self.phase(), Phase::Scanning)
    }

    /// Record the handshake reply: identity, firmware, the encryption
    /// scheme negotiated from it, and the control endpoint the appliance
    /// replied from. Valid only once, from the scanning phase.
    pub fn identify(
        &self,
        id: &str,
        name: Option<String>,
        firmware: Option<String>,
        control: SocketAddr,
    ) -> Result<Scheme> {
        let mut state = self.inner.state.write();

        if state.phase != Phase::Scanning {
            return Err(Error::InvalidPhase(format!(
                "cannot identify from {:?}",
                state.phase
            )));
        }

        let scheme = Scheme::for_firmware(firmware.as_deref());
        debug!(%id, ?scheme, %control, firmware = firmware.as_deref().unwrap_or("<none>"), "session identified");

        state.id = Some(id.to_owned());
        state.name = name;
        state.firmware = firmware;
        state.control = Some(control);
        state.scheme = scheme;
        state.phase = Phase::Binding;

        Ok(scheme)
    }

    /// Record the bind acknowledgement: store the appliance-issued session
    /// key and open the bound phase. Valid only once, from the binding
    /// phase.
    pub fn bind(&self, key: &str) -> Result<()> {
        let mut state = self.inner.state.write();

        if state.phase != Phase::Binding {
            return Err(Error::InvalidPhase(format!(
                "cannot bind from {:?}",
                state.phase
            )));
        }

        let bytes = key.as_bytes();
        if bytes.len() != KEY_LEN {
            return Err(Error::KeyLength {
                expected: KEY_LEN,
                actual: bytes.len(),
            });
        }

        state.key.copy_from_slice(bytes);
        state.phase = Phase::Bound;
        debug!("session bound");

        Ok(())
    }

    /// The encryption context current traffic must use: negotiated scheme
    /// with the generic key before binding, the session key after
    pub fn cipher(&self) -> CipherContext {
        let state = self.inner.state.read();
        match state.phase {
            Phase::Bound => CipherContext::bound(state.scheme, state.key),
            _ => CipherContext::handshake(state.scheme),
        }
    }

    pub fn scheme(&self) -> Scheme {
        self.inner.state.read().scheme
    }

    /// Stable appliance identifier from the handshake, if identified
    pub fn device_id(&self) -> Option<String> {
        self.inner.state.read().id.clone()
    }

    /// Where control traffic goes: the endpoint learned from the
    /// handshake reply
    pub fn control(&self) -> Option<SocketAddr> {
        self.inner.state.read().control
    }

    /// Human-readable appliance name from the handshake
    pub fn device_name(&self) -> Option<String> {
        self.inner.state.read().name.clone()
    }

    pub fn firmware(&self) -> Option<String> {
        self.inner.state.read().firmware.clone()
    }

    /// Last-known value of one property
    pub fn property(&self, code: &str) -> Option<Value> {
        self.inner.state.read().properties.get(code).cloned()
    }

    /// Snapshot of the whole property map
    pub fn properties(&self) -> HashMap<String, Value> {
        self.inner.state.read().properties.clone()
    }

    /// Merge reported values into the property map, returning how many
    /// entries changed or appeared
    pub fn merge_properties(&self, pairs: impl IntoIterator<Item = (String, Value)>) -> usize {
        let mut state = self.inner.state.write();
        let mut merged = 0;
        for (code, value) in pairs {
            if state.properties.get(&code) != Some(&value) {
                merged += 1;
            }
            state.properties.insert(code, value);
        }
        merged
    }

    /// Next envelope counter value
    pub fn next_seq(&self) -> u32 {
        self.inner.seq.fetch_add(1, Ordering::AcqRel)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn endpoint() -> SocketAddr {
        "192.168.1.60:7000".parse().unwrap()
    }

    #[test]
    fn test_session_new() {
        let session = Session::new();
        assert_eq!(session.phase(), Phase::Scanning);
        assert!(!session.is_bound());
        assert!(!session.identified());
        assert_eq!(session.device_id(), None);
        assert_eq!(session.scheme(), Scheme::Ecb);
    }

    #[test]
    fn test_identify_negotiates_scheme() {
        let session = Session::new();
        let scheme = session
            .identify("ac1", Some("bedroom".into()), Some("V2.1.0".into()), endpoint())
            .unwrap();

        assert_eq!(scheme, Scheme::Gcm);
        assert_eq!(session.phase(), Phase::Binding);
        assert_eq!(session.device_id().as_deref(), Some("ac1"));
        assert_eq!(session.device_name().as_deref(), Some("bedroom"));
        assert_eq!(session.firmware().as_deref(), Some("V2.1.0"));
    }

    #[test]
    fn test_identify_without_version_stays_legacy() {
        let session = Session::new();
        let scheme = session.identify("ac1", None, None, endpoint()).unwrap();
        assert_eq!(scheme, Scheme::Ecb);
    }

    #[test]
    fn test_pre_bind_cipher_uses_generic_key() {
        let session = Session::new();
        session.identify("ac1", None, None, endpoint()).unwrap();
        assert_eq!(session.cipher(), CipherContext::handshake(Scheme::Ecb));
    }

    #[test]
    fn test_bind_switches_to_session_key() {
        let session = Session::new();
        session.identify("ac1", None, None, endpoint()).unwrap();
        session.bind("0123456789abcdef").unwrap();

        assert!(session.is_bound());
        assert_eq!(
            session.cipher(),
            CipherContext::bound(Scheme::Ecb, *b"0123456789abcdef")
        );
    }

    #[test]
    fn test_bind_rejects_short_key() {
        let session = Session::new();
        session.identify("ac1", None, None, endpoint()).unwrap();

        let err = session.bind("short").unwrap_err();
        assert!(matches!(
            err,
            Error::KeyLength {
                expected: 16,
                actual: 5
            }
        ));
        assert!(!session.is_bound());
    }

    #[test]
    fn test_invalid_phase_transitions() {
        let session = Session::new();

        // Cannot bind before identifying
        assert!(session.bind("0123456789abcdef").is_err());

        session.identify("ac1", None, None, endpoint()).unwrap();

        // Cannot identify twice
        assert!(session.identify("ac2", None, None, endpoint()).is_err());

        session.bind("0123456789abcdef").unwrap();

        // Cannot re-bind a bound session
        assert!(session.bind("fedcba9876543210").is_err());
    }

    #[test]
    fn test_merge_properties() {
        let session = Session::new();

        let merged = session.merge_properties([
            ("Pow".to_string(), json!(1)),
            ("Mod".to_string(), json!(2)),
        ]);
        assert_eq!(merged, 2);
        assert_eq!(session.property("Pow"), Some(json!(1)));
        assert_eq!(session.property("Mod"), Some(json!(2)));

        // Re-reporting the same value is not a change
        let merged = session.merge_properties([("Pow".to_string(), json!(1))]);
        assert_eq!(merged, 0);

        let merged = session.merge_properties([("Pow".to_string(), json!(0))]);
        assert_eq!(merged, 1);
        assert_eq!(session.property("Pow"), Some(json!(0)));
    }

    #[test]
    fn test_seq_is_monotonic() {
        let session = Session::new();
        assert_eq!(session.next_seq(), 1);
        assert_eq!(session.next_seq(), 2);
        assert_eq!(session.next_seq(), 3);
    }

    #[test]
    fn test_clone_shares_state() {
        let session = Session::new();
        let clone = session.clone();

        session.identify("ac1", None, None, endpoint()).unwrap();
        assert!(clone.identified());
    }
}
