//! High-level appliance interface
//!
//! [`Device::connect`] spawns the driver task that owns the socket and the
//! protocol state machine; the returned handle is the command facade the
//! embedding application talks to, and the event receiver is where the
//! driver reports its life.
//!
//! The protocol proceeds in strict phases. The driver sends one bare
//! discovery probe to the well-known port, waits for the handshake reply
//! (which fixes the identity, the encryption scheme and the control
//! address), binds to obtain the session key, then polls status on a fixed
//! cadence and dispatches caller commands. Replies carry no correlation
//! ids; the appliance matches nothing, so neither do we. One logical
//! exchange is in flight per phase, and replies are interpreted purely by
//! payload type against the current phase.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use bytes::BytesMut;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use greelink_core::constants::{DEFAULT_POLL_INTERVAL, DISCOVERY_PORT, REBIND_DELAY};
use greelink_core::payload::res_values;
use greelink_core::{CipherContext, Envelope, Error as CoreError, Payload, Phase, Scheme, Session};
use greelink_transport::UdpLink;
use greelink_types::DeviceInfo;

use crate::error::{Error, Result};
use crate::event::Event;

/// One batch of (code, target value) pairs for a single `cmd` request
type CommandBatch = Vec<(String, Value)>;

/// Configuration for one appliance session
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    addr: IpAddr,
    discovery_port: u16,
    poll_interval: Duration,
    rebind_delay: Duration,
    poll_cols: Vec<String>,
}

impl DeviceConfig {
    /// Configuration with protocol defaults for the appliance at `addr`
    pub fn new(addr: IpAddr) -> Self {
        Self {
            addr,
            discovery_port: DISCOVERY_PORT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            rebind_delay: REBIND_DELAY,
            poll_cols: Vec::new(),
        }
    }

    /// Override the discovery port (the appliance listens on 7000)
    pub fn with_discovery_port(mut self, port: u16) -> Self {
        self.discovery_port = port;
        self
    }

    /// Override the status poll cadence (default 10 s)
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Override the delay between local bind attempts (default 5 s)
    pub fn with_rebind_delay(mut self, delay: Duration) -> Self {
        self.rebind_delay = delay;
        self
    }

    /// The command codes every status poll asks for, typically
    /// `CommandTable::codes()` from the embedding application's table
    pub fn with_poll_columns(mut self, cols: impl IntoIterator<Item = String>) -> Self {
        self.poll_cols = cols.into_iter().collect();
        self
    }

    /// Spawn the session driver; see [`Device::connect`]
    pub fn connect(self) -> (Device, mpsc::UnboundedReceiver<Event>) {
        Device::connect(self)
    }
}

/// Handle to one appliance session
///
/// Cheap operations over the shared session record plus a queue into the
/// driver task. Dropping the handle tears the session down: the driver
/// notices the closed queue, stops the poll and closes the socket.
///
/// # Examples
///
/// ```no_run
/// use greelink::{CommandTable, DeviceConfig, Event};
///
/// #[tokio::main]
/// async fn main() -> greelink::Result<()> {
///     let table = CommandTable::new()
///         .define_with_values("power", "Pow", [("off", 0), ("on", 1)]);
///
///     let (device, mut events) = DeviceConfig::new("192.168.1.60".parse().unwrap())
///         .with_poll_columns(table.codes())
///         .connect();
///
///     while let Some(event) = events.recv().await {
///         match event {
///             Event::Connected => device.set_property("Pow", 1)?,
///             Event::Status => println!("power: {:?}", device.property("Pow")),
///             _ => {}
///         }
///     }
///     Ok(())
/// }
/// ```
pub struct Device {
    session: Session,
    ops: mpsc::UnboundedSender<CommandBatch>,
    driver: JoinHandle<()>,
}

impl Device {
    /// Spawn the driver task for one appliance and return the command
    /// facade plus the event stream.
    ///
    /// Must be called within a tokio runtime. The driver keeps running
    /// until the handle (and with it the command queue) is dropped.
    pub fn connect(cfg: DeviceConfig) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let session = Session::new();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (op_tx, op_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            cfg,
            session: session.clone(),
            events: event_tx,
            ops: op_rx,
        };
        let task = tokio::spawn(driver.run());

        (
            Self {
                session,
                ops: op_tx,
                driver: task,
            },
            event_rx,
        )
    }

    /// The shared session record
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_bound(&self) -> bool {
        self.session.is_bound()
    }

    /// Identity learned during the handshake, once identified
    pub fn info(&self) -> Option<DeviceInfo> {
        self.session.device_id().map(|id| {
            DeviceInfo::new(id, self.session.device_name(), self.session.firmware())
        })
    }

    /// Last-known value of one property, straight from the session record
    pub fn property(&self, code: &str) -> Option<Value> {
        self.session.property(code)
    }

    /// Snapshot of all last-known properties
    pub fn properties(&self) -> HashMap<String, Value> {
        self.session.properties()
    }

    /// Queue a `cmd` request setting a single property.
    ///
    /// No value-range validation happens here; the command table
    /// collaborator owns that knowledge.
    pub fn set_property(&self, code: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        self.set_properties([(code.into(), value.into())])
    }

    /// Queue one `cmd` request setting several properties at once
    pub fn set_properties(&self, pairs: impl IntoIterator<Item = (String, Value)>) -> Result<()> {
        if !self.session.is_bound() {
            return Err(Error::NotBound);
        }
        let batch: CommandBatch = pairs.into_iter().collect();
        if batch.is_empty() {
            return Ok(());
        }
        self.ops.send(batch).map_err(|_| Error::Closed)
    }

    /// Tear the session down and wait for the driver to finish
    pub async fn shutdown(self) {
        drop(self.ops);
        let _ = self.driver.await;
    }
}

/// What one iteration of the driver loop woke up for
enum Step {
    Datagram(greelink_transport::Result<(BytesMut, SocketAddr)>),
    Poll,
    Op(Option<CommandBatch>),
}

/// The session driver: owns the socket, the poll timer and every write to
/// the session record
struct Driver {
    cfg: DeviceConfig,
    session: Session,
    events: mpsc::UnboundedSender<Event>,
    ops: mpsc::UnboundedReceiver<CommandBatch>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            match UdpLink::bind(self.cfg.addr).await {
                Ok(link) => {
                    self.drive(link).await;
                    return;
                }
                Err(e) => {
                    warn!(error = %e, delay = ?self.cfg.rebind_delay, "socket unavailable, will retry");
                    self.emit(Event::Disconnected);
                    tokio::select! {
                        _ = sleep(self.cfg.rebind_delay) => {}
                        // Commands are rejected at the handle while
                        // unbound, so only channel closure wakes this arm.
                        _ = self.ops.recv() => return,
                    }
                }
            }
        }
    }

    async fn drive(&mut self, link: UdpLink) {
        info!(device = %self.cfg.addr, "scanning for appliance");
        if let Err(e) = self.send_scan(&link).await {
            self.fail(e);
        }

        let mut poll: Option<Interval> = None;

        loop {
            let step = tokio::select! {
                r = link.recv_from() => Step::Datagram(r),
                _ = poll_tick(&mut poll) => Step::Poll,
                op = self.ops.recv() => Step::Op(op),
            };

            match step {
                Step::Datagram(Ok((data, from))) => {
                    self.on_datagram(&link, &data, from, &mut poll).await
                }
                Step::Datagram(Err(e)) => self.fail(e.into()),
                Step::Poll => self.send_status(&link).await,
                Step::Op(Some(batch)) => self.send_command(&link, batch).await,
                Step::Op(None) => {
                    debug!("handle dropped, session torn down");
                    return;
                }
            }
        }
    }

    async fn on_datagram(
        &self,
        link: &UdpLink,
        data: &[u8],
        from: SocketAddr,
        poll: &mut Option<Interval>,
    ) {
        // Trust boundary: only the configured address may speak for the
        // appliance, no matter where we send control traffic.
        if from.ip() != self.cfg.addr {
            trace!(%from, "discarding datagram from unexpected sender");
            return;
        }

        let envelope = match Envelope::decode(data) {
            Ok(env) => env,
            Err(e) => return self.fail(e.into()),
        };
        trace!(?envelope, "inbound envelope");

        let cipher = if self.session.identified() {
            self.session.cipher()
        } else {
            // Scheme not negotiated yet; the tag field tells us which one
            // the appliance speaks.
            CipherContext::handshake(if envelope.tag.is_some() {
                Scheme::Gcm
            } else {
                Scheme::Ecb
            })
        };

        let value = match envelope.open(&cipher) {
            Ok(v) => v,
            Err(e) => return self.fail(e.into()),
        };
        let payload = match Payload::from_value(value) {
            Ok(p) => p,
            Err(e) => return self.fail(e.into()),
        };
        debug!(tag = payload.tag(), phase = ?self.session.phase(), "inbound payload");

        match (self.session.phase(), payload) {
            (Phase::Scanning, Payload::Dev { cid, name, ver }) => {
                // The appliance reported its control endpoint by replying
                // from it; all further traffic goes there.
                let scheme = match self.session.identify(&cid, name, ver, from) {
                    Ok(s) => s,
                    Err(e) => return self.fail(e.into()),
                };
                info!(id = %cid, ?scheme, endpoint = %from, "appliance identified, binding");
                self.send_bind(link, from, &cid).await;
            }

            (Phase::Binding, Payload::BindOk { key }) => {
                if let Err(e) = self.session.bind(&key) {
                    return self.fail(e.into());
                }
                info!("bound, starting poll loop");
                self.emit(Event::Connected);

                let mut ticker = interval(self.cfg.poll_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // The first tick completes immediately, which issues the
                // initial status request.
                *poll = Some(ticker);
            }

            (Phase::Bound, Payload::Dat { cols, dat }) => {
                let merged = self.session.merge_properties(cols.into_iter().zip(dat));
                debug!(merged, "status merged");
                self.emit(Event::Status);
            }

            (Phase::Bound, Payload::Res { opt, val, p }) => {
                let pairs: Vec<(String, Value)> = res_values(&opt, val.as_deref(), p.as_deref())
                    .map(|(code, value)| (code.to_owned(), value.clone()))
                    .collect();
                let merged = self.session.merge_properties(pairs);
                debug!(merged, "command result merged");
                self.emit(Event::Update);
            }

            (_, other) => self.fail(CoreError::UnexpectedPayload(other.tag().to_owned()).into()),
        }
    }

    async fn send_scan(&self, link: &UdpLink) -> Result<()> {
        let probe = Payload::Scan.encode().map_err(Error::from)?;
        link.send_to(
            &probe,
            SocketAddr::new(self.cfg.addr, self.cfg.discovery_port),
        )
        .await?;
        Ok(())
    }

    async fn send_sealed(&self, link: &UdpLink, payload: &Payload, to: SocketAddr) -> Result<()> {
        let envelope = Envelope::seal(&self.session.cipher(), self.session.next_seq(), payload)?;
        link.send_to(&envelope.encode()?, to).await?;
        Ok(())
    }

    async fn send_bind(&self, link: &UdpLink, to: SocketAddr, mac: &str) {
        let bind = Payload::Bind {
            mac: mac.to_owned(),
            uid: 0,
        };
        if let Err(e) = self.send_sealed(link, &bind, to).await {
            self.fail(e);
        }
    }

    async fn send_status(&self, link: &UdpLink) {
        let Some(to) = self.session.control() else {
            return;
        };
        let Some(mac) = self.session.device_id() else {
            return;
        };

        debug!(cols = self.cfg.poll_cols.len(), "polling status");
        let status = Payload::Status {
            cols: self.cfg.poll_cols.clone(),
            mac,
        };
        if let Err(e) = self.send_sealed(link, &status, to).await {
            self.fail(e);
        }
    }

    async fn send_command(&self, link: &UdpLink, batch: CommandBatch) {
        if !self.session.is_bound() {
            return self.fail(Error::NotBound);
        }
        let Some(to) = self.session.control() else {
            return;
        };

        let (opt, p): (Vec<String>, Vec<Value>) = batch.into_iter().unzip();
        debug!(?opt, "dispatching command");
        let cmd = Payload::Cmd { opt, p };
        if let Err(e) = self.send_sealed(link, &cmd, to).await {
            self.fail(e);
        }
    }

    fn emit(&self, event: Event) {
        let _ = self.events.send(event);
    }

    fn fail(&self, err: Error) {
        warn!(error = %err, "protocol error");
        let _ = self.events.send(Event::Error(err));
    }
}

/// Wait for the next poll tick, or forever while polling has not started
async fn poll_tick(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let cfg = DeviceConfig::new("192.168.1.60".parse().unwrap());
        assert_eq!(cfg.discovery_port, 7000);
        assert_eq!(cfg.poll_interval, Duration::from_secs(10));
        assert_eq!(cfg.rebind_delay, Duration::from_secs(5));
        assert!(cfg.poll_cols.is_empty());
    }

    #[tokio::test]
    async fn test_set_property_rejected_while_unbound() {
        let (device, _events) = DeviceConfig::new("127.0.0.77".parse().unwrap()).connect();

        let err = device.set_property("Pow", 1).unwrap_err();
        assert!(matches!(err, Error::NotBound));

        device.shutdown().await;
    }

    #[tokio::test]
    async fn test_unbound_check_precedes_batch_inspection() {
        let (device, _events) = DeviceConfig::new("127.0.0.78".parse().unwrap()).connect();

        // Even an empty batch is refused while unbound
        assert!(matches!(
            device.set_properties(std::iter::empty()),
            Err(Error::NotBound)
        ));

        device.shutdown().await;
    }
}
