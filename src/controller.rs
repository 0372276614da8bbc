//! Session driver
//!
//! A [`Session`] owns the transport, a reader thread and the terminal state.
//! The reader thread strips Telnet control, extracts GDS records, applies
//! them to the screen under the state lock and then notifies listeners.
//! Callers read snapshots of the screen and submit keystrokes from any
//! thread.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use log::{debug, error, info, trace, warn};
use tokio::sync::broadcast;

use crate::config::SessionConfig;
use crate::error::{CharacterConversionError, ConnectionError, SessionError, SessionResult, UnlockError};
use crate::events::{EventHub, ListenerId, PendingKeys, ScreenEvent, ScreenListener};
use crate::keyboard::{parse_keys, EncodedKeys, Key, KeystrokeEncoder};
use crate::lib5250::protocol::{decode_frame, encode_frame};
use crate::lib5250::{oia, FieldView, InhibitReason, OiaState, QueryReply, Screen, StreamDecoder};
use crate::network::Transport;
use crate::protocol_common::CodePage;
use crate::telnet_negotiation::{TelnetEvent, TelnetNegotiator, CLIENT_OPTIONS};

const READ_BUFFER_SIZE: usize = 8192;

/// What `send_keys_with` does while the keyboard is locked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendMode {
    /// Fail with `SessionError::KeyboardLocked`
    #[default]
    Immediate,
    /// Keep the keys and send them on the next unlock
    Queue,
}

/// Everything guarded by the session's single lock
#[derive(Debug)]
struct TerminalState {
    screen: Screen,
    oia: OiaState,
    queued: VecDeque<String>,
    server_seed: Option<Vec<u8>>,
    /// Set by `disconnect` so the reader reports a local close
    closing: bool,
}

struct Shared {
    state: Mutex<TerminalState>,
    /// Notified on every unlock and on disconnect
    unlocked: Condvar,
    transport: Arc<Transport>,
    events: EventHub,
    encoder: KeystrokeEncoder,
    /// Held from encoding to the write so key batches reach the host in the
    /// order they were applied. The state lock is not held while writing.
    send_order: Mutex<()>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, TerminalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Encode `keys` against the live screen, apply the local edits, then
    /// write the record with the state unlocked. A failed write leaves the
    /// edits applied; the reader ends the session on the broken socket.
    fn submit(&self, keys: &str, mode: SendMode) -> SessionResult<()> {
        let starts_with_reset = matches!(parse_keys(keys)?.first(), Some((Key::Reset, _)));

        let _sending = self.send_order.lock().unwrap_or_else(PoisonError::into_inner);
        let mut state = self.lock();
        if state.oia.disconnected {
            return Err(SessionError::NotConnected);
        }
        let before = Snapshot::of(&state);
        if state.oia.keyboard_locked && starts_with_reset {
            state.oia.reset();
        }
        if state.oia.keyboard_locked {
            if mode == SendMode::Queue {
                debug!("keyboard locked, queuing {} key bytes", keys.len());
                state.queued.push_back(keys.to_string());
                return Ok(());
            }
            return Err(SessionError::KeyboardLocked);
        }

        let encoded = self.encoder.encode(keys, &state.screen, state.oia.insert_mode)?;
        let locks = encoded.locks_keyboard();
        let bytes = encoded.to_bytes()?;
        let EncodedKeys { screen, insert_mode, reset, .. } = encoded;

        state.screen = screen;
        state.oia.insert_mode = insert_mode;
        if reset {
            state.oia.reset();
        }
        if locks {
            state.oia.lock(InhibitReason::SystemWait);
        }
        let events = before.diff(&state);
        drop(state);

        if let Some(bytes) = bytes {
            self.transport.write_all(&bytes)?;
        }

        for event in &events {
            self.events.publish(event);
        }
        Ok(())
    }

    /// Send queued keys, oldest first, until one of them locks the keyboard
    fn flush_queued(&self) {
        loop {
            let keys = {
                let mut state = self.lock();
                if state.oia.keyboard_locked || state.oia.disconnected {
                    return;
                }
                match state.queued.pop_front() {
                    Some(keys) => keys,
                    None => return,
                }
            };

            let pending = PendingKeys::new(keys);
            if !self.events.offer_pending(&pending) {
                info!("queued keys {:?} vetoed by a listener", pending.keys);
                continue;
            }
            if let Err(e) = self.submit(&pending.keys, SendMode::Queue) {
                warn!("queued keys {:?} dropped: {}", pending.keys, e);
            }
        }
    }

    /// Mark the session disconnected once, wake waiters and tell listeners
    fn finish(&self, reason: Option<String>) {
        let event = {
            let mut state = self.lock();
            if state.oia.disconnected {
                return;
            }
            state.oia.set_disconnected();
            state.queued.clear();
            ScreenEvent::Disconnected { reason }
        };
        self.unlocked.notify_all();
        self.events.publish(&event);
    }
}

/// Screen and OIA before a change, to derive the events it caused
struct Snapshot {
    screen: Screen,
    oia: OiaState,
}

impl Snapshot {
    fn of(state: &TerminalState) -> Self {
        Self { screen: state.screen.clone(), oia: state.oia.clone() }
    }

    fn diff(&self, state: &TerminalState) -> Vec<ScreenEvent> {
        let mut events = Vec::new();
        let after = &state.screen;
        let rows: Vec<usize> = if self.screen.size() != after.size() {
            events.push(ScreenEvent::SizeChanged { rows: after.rows(), cols: after.cols() });
            (0..after.rows()).collect()
        } else {
            let cols = after.cols();
            (0..after.rows())
                .filter(|&row| {
                    let range = row * cols..(row + 1) * cols;
                    self.screen.cells()[range.clone()] != after.cells()[range]
                })
                .collect()
        };
        if !rows.is_empty() || self.screen.cursor() != after.cursor() {
            events.push(ScreenEvent::Changed { rows, cursor: after.cursor() });
        }
        if self.oia != state.oia {
            events.push(ScreenEvent::OiaChanged(state.oia.clone()));
        }
        events
    }
}

/// Telnet and record buffering owned by whoever is reading the socket
struct Inbound {
    negotiator: TelnetNegotiator,
    telnet: Vec<u8>,
    records: Vec<u8>,
}

impl Inbound {
    /// Feed socket bytes through the negotiator, answering it at once.
    /// Returns the host seed when one arrived.
    fn feed(&mut self, bytes: &[u8], transport: &Transport) -> Result<Option<Vec<u8>>, ConnectionError> {
        self.telnet.extend_from_slice(bytes);
        let (used, events) = self.negotiator.feed(&self.telnet);
        self.telnet.drain(..used);

        let mut seed = None;
        for event in events {
            match event {
                TelnetEvent::Data(data) => self.records.extend(data),
                TelnetEvent::Send(reply) => transport.write_all(&reply)?,
                TelnetEvent::OptionChanged { option, side, enabled } => {
                    debug!("option {} {:?} {}", option, side, if enabled { "enabled" } else { "disabled" });
                }
                TelnetEvent::ServerSeed(value) => seed = Some(value),
                TelnetEvent::Command(command) => trace!("ignoring telnet command {}", command),
                TelnetEvent::Error(e) => warn!("negotiation: {}", e),
            }
        }
        Ok(seed)
    }
}

/// A connected 5250 display session
pub struct Session {
    shared: Arc<Shared>,
    codepage: &'static CodePage,
    reader: Mutex<Option<JoinHandle<()>>>,
    reader_id: Option<ThreadId>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("transport", &self.shared.transport)
            .field("ccsid", &self.codepage.ccsid())
            .field("events", &self.shared.events)
            .finish()
    }
}

impl Session {
    /// Connect, negotiate, and start the reader thread. Blocks until
    /// negotiation completes or the negotiation timeout elapses.
    pub fn connect(config: &SessionConfig) -> Result<Session, ConnectionError> {
        config.validate()?;
        let codepage = config.codepage()?;
        let environment = config.environment()?;
        let tls = config.tls_options();
        let transport = Transport::connect(&config.host, config.port, tls.as_ref(), config.connect_timeout())?;

        let mut inbound = Inbound {
            negotiator: TelnetNegotiator::new(&config.terminal_type, environment),
            telnet: Vec::new(),
            records: Vec::new(),
        };
        let server_seed = match negotiate(&mut inbound, &transport, config.negotiation_timeout()) {
            Ok(seed) => seed,
            Err(e) => {
                transport.shutdown();
                return Err(e);
            }
        };
        info!("negotiation with {} complete", transport.peer());

        let (rows, cols) = config.screen_size();
        let shared = Arc::new(Shared {
            state: Mutex::new(TerminalState {
                screen: Screen::new(rows, cols),
                oia: OiaState::new(),
                queued: VecDeque::new(),
                server_seed,
                closing: false,
            }),
            unlocked: Condvar::new(),
            transport,
            events: EventHub::new(config.event_channel_capacity),
            encoder: KeystrokeEncoder::new(codepage),
            send_order: Mutex::new(()),
        });

        let decoder = StreamDecoder::new(QueryReply::for_terminal_type(&config.terminal_type), codepage);
        let reader_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("tn5250e-reader".to_string())
            .spawn(move || read_loop(reader_shared, inbound, decoder))?;
        let reader_id = Some(handle.thread().id());

        Ok(Session { shared, codepage, reader: Mutex::new(Some(handle)), reader_id })
    }

    /// Close the connection. Waiters get `ConnectionClosed`; safe to call
    /// more than once and from a listener.
    pub fn disconnect(&self) {
        self.shared.lock().closing = true;
        self.shared.transport.shutdown();
        self.shared.finish(None);

        if Some(thread::current().id()) == self.reader_id {
            return;
        }
        let handle = self.reader.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("reader thread panicked");
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        !self.shared.lock().oia.disconnected
    }

    /// Type `keys` now; fails with `KeyboardLocked` while input is inhibited
    pub fn send_keys(&self, keys: &str) -> SessionResult<()> {
        self.shared.submit(keys, SendMode::Immediate)
    }

    pub fn send_keys_with(&self, keys: &str, mode: SendMode) -> SessionResult<()> {
        self.shared.submit(keys, mode)
    }

    /// Key batches waiting for the keyboard to unlock
    pub fn queued_keys(&self) -> Vec<String> {
        self.shared.lock().queued.iter().cloned().collect()
    }

    pub fn current_screen_text(&self) -> Result<String, CharacterConversionError> {
        self.shared.lock().screen.text(self.codepage)
    }

    pub fn current_fields(&self) -> Result<Vec<FieldView>, CharacterConversionError> {
        self.shared.lock().screen.field_views(self.codepage)
    }

    pub fn current_screen(&self) -> Screen {
        self.shared.lock().screen.clone()
    }

    pub fn oia(&self) -> OiaState {
        self.shared.lock().oia.clone()
    }

    /// IBMRSEED the host sent, for callers computing a substitute password
    pub fn server_seed(&self) -> Option<Vec<u8>> {
        self.shared.lock().server_seed.clone()
    }

    pub fn wait_for_unlock(&self, timeout: Duration) -> Result<(), UnlockError> {
        oia::wait_for_unlock(&self.shared.state, &self.shared.unlocked, timeout, |state| &state.oia)
    }

    pub fn subscribe(&self, listener: impl ScreenListener + 'static) -> ListenerId {
        self.shared.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.shared.events.unsubscribe(id)
    }

    pub fn subscribe_channel(&self) -> broadcast::Receiver<ScreenEvent> {
        self.shared.events.subscribe_channel()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Read until BINARY, END-OF-RECORD and TERMINAL-TYPE are agreed
fn negotiate(inbound: &mut Inbound, transport: &Transport, timeout: Duration) -> Result<Option<Vec<u8>>, ConnectionError> {
    let offer = inbound.negotiator.start_negotiation(&CLIENT_OPTIONS);
    transport.write_all(&offer)?;

    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let mut seed = None;
    while !inbound.negotiator.is_negotiation_complete() {
        let n = transport
            .read(&mut buf, Some(deadline))?
            .ok_or(ConnectionError::NegotiationTimeout { timeout })?;
        if let Some(value) = inbound.feed(&buf[..n], transport)? {
            seed = Some(value);
        }
    }
    Ok(seed)
}

fn read_loop(shared: Arc<Shared>, mut inbound: Inbound, mut decoder: StreamDecoder) {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let reason = loop {
        if let Err(e) = apply_records(&shared, &mut inbound.records, &mut decoder) {
            break Some(e.to_string());
        }

        let n = match shared.transport.read(&mut buf, None) {
            Ok(Some(n)) => n,
            Ok(None) => continue,
            Err(ConnectionError::Closed) => break Some("connection closed by host".to_string()),
            Err(e) => break Some(e.to_string()),
        };
        match inbound.feed(&buf[..n], &shared.transport) {
            Ok(Some(seed)) => shared.lock().server_seed = Some(seed),
            Ok(None) => {}
            Err(e) => break Some(e.to_string()),
        }
    };

    let reason = if shared.lock().closing { None } else { reason };
    if let Some(reason) = &reason {
        warn!("session ended: {}", reason);
    }
    shared.transport.shutdown();
    shared.finish(reason);
}

/// Apply every complete record in `records`, answering and notifying after
/// each one
fn apply_records(shared: &Shared, records: &mut Vec<u8>, decoder: &mut StreamDecoder) -> Result<(), ConnectionError> {
    loop {
        let record = match decode_frame(records) {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!("dropping record: {}", e);
                continue;
            }
        };

        let (events, unlocked) = {
            let mut guard = shared.lock();
            let state = &mut *guard;
            let before = Snapshot::of(state);
            if let Err(e) = decoder.apply_record(&record, &mut state.screen, &mut state.oia) {
                warn!("record with opcode 0x{:02X} applied partially: {}", record.opcode, e);
            }
            let unlocked = before.oia.keyboard_locked && !state.oia.keyboard_locked;
            (before.diff(state), unlocked)
        };

        for response in decoder.take_responses() {
            match encode_frame(&response) {
                Ok(wire) => shared.transport.write_all(&wire)?,
                Err(e) => warn!("dropping response with opcode 0x{:02X}: {}", response.opcode, e),
            }
        }
        for event in &events {
            shared.events.publish(event);
        }
        if unlocked {
            shared.unlocked.notify_all();
            shared.flush_queued();
        }
    }
}
