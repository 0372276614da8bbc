//! Operator Information Area
//!
//! Keyboard lock state and the indicators shown on the status line. The lock
//! moves `Unlocked -> Locked(reason) -> Unlocked`; `Disconnected` is terminal.
//! Only host data (through the stream decoder) and the session's own AID
//! submission change it.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

use super::codes;
use crate::error::UnlockError;

/// Why input is inhibited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InhibitReason {
    /// Waiting for the host to answer an AID
    SystemWait,
    CommCheck,
    ProgCheck,
    MachineCheck,
    /// Operator error or any other host-requested lock
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OiaState {
    pub keyboard_locked: bool,
    pub insert_mode: bool,
    pub error_code: Option<u16>,
    pub message: Option<String>,
    pub inhibit: Option<InhibitReason>,
    pub message_waiting: bool,
    pub alarm: bool,
    /// ERR flag of the last record header
    pub error: bool,
    pub attention: bool,
    pub system_request: bool,
    pub test_request: bool,
    pub help_requested: bool,
    pub disconnected: bool,
}

impl Default for OiaState {
    /// Locked until the host's first screen unlocks the keyboard
    fn default() -> Self {
        Self {
            keyboard_locked: true,
            insert_mode: false,
            error_code: None,
            message: None,
            inhibit: Some(InhibitReason::SystemWait),
            message_waiting: false,
            alarm: false,
            error: false,
            attention: false,
            system_request: false,
            test_request: false,
            help_requested: false,
            disconnected: false,
        }
    }
}

impl OiaState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self) -> bool {
        self.keyboard_locked
    }

    pub fn lock(&mut self, reason: InhibitReason) {
        self.keyboard_locked = true;
        self.inhibit = Some(reason);
    }

    /// Host unlock. An operator error stays in force until Reset.
    pub fn unlock(&mut self) {
        if self.disconnected || self.inhibit == Some(InhibitReason::Other) {
            return;
        }
        self.keyboard_locked = false;
        self.inhibit = None;
    }

    /// Operator error: show the code and its text, lock until Reset
    pub fn set_error(&mut self, code: u16) {
        self.error_code = Some(code);
        self.message = Some(
            codes::error_message(code)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Operator error {code:04X}")),
        );
        self.lock(InhibitReason::Other);
    }

    /// Error line text written by the host; input waits for Reset
    pub fn set_message(&mut self, message: String) {
        self.message = Some(message);
        self.lock(InhibitReason::Other);
    }

    /// Reset key: clear an operator error and the lock it caused
    pub fn reset(&mut self) {
        if self.disconnected {
            return;
        }
        self.error_code = None;
        self.message = None;
        self.help_requested = false;
        if self.inhibit == Some(InhibitReason::Other) {
            self.keyboard_locked = false;
            self.inhibit = None;
        }
    }

    /// Clear Unit: drop error state and insert mode, wait for the host
    pub fn clear_unit(&mut self) {
        if self.disconnected {
            return;
        }
        self.error_code = None;
        self.message = None;
        self.insert_mode = false;
        self.lock(InhibitReason::SystemWait);
    }

    pub fn set_disconnected(&mut self) {
        self.disconnected = true;
        self.keyboard_locked = true;
        self.inhibit = Some(InhibitReason::CommCheck);
    }

    /// Apply the header flags of an inbound record
    pub fn apply_record_flags(&mut self, flags: u16) {
        self.error = flags & codes::FLAG_ERR != 0;
        self.attention = flags & codes::FLAG_ATN != 0;
        self.system_request = flags & codes::FLAG_SRQ != 0;
        self.test_request = flags & codes::FLAG_TRQ != 0;
        self.help_requested = flags & codes::FLAG_HLP != 0;
    }
}

/// Block until the OIA inside `lock` unlocks, the session disconnects, or
/// `timeout` elapses. `condvar` must be notified on every unlock and on
/// disconnect.
pub fn wait_for_unlock<T>(
    lock: &Mutex<T>,
    condvar: &Condvar,
    timeout: Duration,
    oia: impl Fn(&T) -> &OiaState,
) -> Result<(), UnlockError> {
    let started = Instant::now();
    let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
    let (guard, _) = condvar
        .wait_timeout_while(guard, timeout, |state| {
            let oia = oia(&*state);
            oia.keyboard_locked && !oia.disconnected
        })
        .unwrap_or_else(PoisonError::into_inner);

    let state = oia(&*guard);
    if state.disconnected {
        Err(UnlockError::ConnectionClosed)
    } else if state.keyboard_locked {
        Err(UnlockError::Timeout { waited: started.elapsed() })
    } else {
        Ok(())
    }
}
