//! Telnet option negotiation for TN5250E
//!
//! Implements the RFC 1143 "Q method": every option keeps an independent
//! state for our side (`us`, WILL/WONT) and the host's side (`him`, DO/DONT),
//! each with a one-deep queue for a request made while the opposite request
//! is still outstanding. This avoids negotiation loops when both ends ask at
//! the same time.
//!
//! [`TelnetNegotiator::feed`] strips Telnet control from the byte stream,
//! answers negotiation and TERMINAL-TYPE / NEW-ENVIRON subnegotiations, and
//! hands record bytes (with `IAC IAC` and `IAC EOR` intact) to the frame
//! codec.

use log::{debug, trace, warn};

use crate::error::NegotiationError;
use crate::lib5250::telnet::{
    self, build_environ, parse_environ, terminal_type_is, EnvVar, EnvVarKind, DO, DONT, ENV_IS,
    ENV_SEND, EOR, IAC, IBMRSEED, IBMSUBSPW, OPT_BINARY, OPT_END_OF_RECORD, OPT_NEW_ENVIRON,
    OPT_SGA, OPT_TERMINAL_TYPE, SB, SE, TTYPE_SEND, WILL, WONT,
};

/// Negotiation state of one side of one option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QState {
    #[default]
    No,
    Yes,
    WantNo,
    WantYes,
}

/// Request queued behind the one in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueBit {
    #[default]
    Empty,
    Opposite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelnetOptionState {
    pub us: QState,
    pub us_queue: QueueBit,
    pub him: QState,
    pub him_queue: QueueBit,
}

/// Which end performs the option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// We perform it (WILL/WONT from us)
    Local,
    /// The host performs it (DO/DONT from us)
    Remote,
}

/// Output of [`TelnetNegotiator::feed`], in stream order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelnetEvent {
    /// Record bytes for the frame codec
    Data(Vec<u8>),
    /// Bytes to write back to the host
    Send(Vec<u8>),
    OptionChanged { option: u8, side: Side, enabled: bool },
    /// Two-byte command such as NOP, AYT or IP
    Command(u8),
    /// IBMRSEED value from the host's NEW-ENVIRON SEND
    ServerSeed(Vec<u8>),
    Error(NegotiationError),
}

/// Options the client offers when it starts negotiating
pub const CLIENT_OPTIONS: [(u8, Side); 6] = [
    (OPT_BINARY, Side::Local),
    (OPT_BINARY, Side::Remote),
    (OPT_END_OF_RECORD, Side::Local),
    (OPT_END_OF_RECORD, Side::Remote),
    (OPT_TERMINAL_TYPE, Side::Local),
    (OPT_NEW_ENVIRON, Side::Local),
];

#[derive(Debug, Clone)]
pub struct TelnetNegotiator {
    options: [TelnetOptionState; 256],
    terminal_type: String,
    environment: Vec<EnvVar>,
    server_seed: Option<Vec<u8>>,
}

impl Default for TelnetNegotiator {
    fn default() -> Self {
        Self::new(telnet::TerminalType::default().as_str(), Vec::new())
    }
}

impl TelnetNegotiator {
    /// `environment` is offered in answer to NEW-ENVIRON SEND
    pub fn new(terminal_type: &str, environment: Vec<EnvVar>) -> Self {
        Self {
            options: [TelnetOptionState::default(); 256],
            terminal_type: terminal_type.to_string(),
            environment,
            server_seed: None,
        }
    }

    pub fn terminal_type(&self) -> &str {
        &self.terminal_type
    }

    pub fn option_state(&self, option: u8) -> TelnetOptionState {
        self.options[option as usize]
    }

    pub fn is_enabled(&self, option: u8, side: Side) -> bool {
        let state = self.options[option as usize];
        match side {
            Side::Local => state.us == QState::Yes,
            Side::Remote => state.him == QState::Yes,
        }
    }

    /// Host seed for substitute password generation, once received
    pub fn server_seed(&self) -> Option<&[u8]> {
        self.server_seed.as_deref()
    }

    /// BINARY and END-OF-RECORD agreed both ways, TERMINAL-TYPE on our side
    pub fn is_negotiation_complete(&self) -> bool {
        self.is_enabled(OPT_BINARY, Side::Local)
            && self.is_enabled(OPT_BINARY, Side::Remote)
            && self.is_enabled(OPT_END_OF_RECORD, Side::Local)
            && self.is_enabled(OPT_END_OF_RECORD, Side::Remote)
            && self.is_enabled(OPT_TERMINAL_TYPE, Side::Local)
    }

    fn eor_active(&self) -> bool {
        self.is_enabled(OPT_END_OF_RECORD, Side::Local) && self.is_enabled(OPT_END_OF_RECORD, Side::Remote)
    }

    /// Requests to enable each option; options already agreed or in flight
    /// are skipped
    pub fn start_negotiation(&mut self, options: &[(u8, Side)]) -> Vec<u8> {
        let mut out = Vec::new();
        for &(option, side) in options {
            match self.request(option, side, true) {
                Ok(Some(bytes)) => out.extend(bytes),
                Ok(None) => {}
                Err(e) => debug!("not requesting option {}: {}", option, e),
            }
        }
        out
    }

    /// Ask to enable or disable an option. Returns the command to send, or
    /// `None` when the request was queued behind one in flight.
    pub fn request(&mut self, option: u8, side: Side, enable: bool) -> Result<Option<Vec<u8>>, NegotiationError> {
        let state = &mut self.options[option as usize];
        let (q, queue) = match side {
            Side::Local => (&mut state.us, &mut state.us_queue),
            Side::Remote => (&mut state.him, &mut state.him_queue),
        };
        let invalid = |reason| NegotiationError::InvalidRequest { option, reason };

        let send = match (enable, *q, *queue) {
            (true, QState::No, _) => {
                *q = QState::WantYes;
                true
            }
            (true, QState::Yes, _) => return Err(invalid("already enabled")),
            (true, QState::WantNo, QueueBit::Empty) => {
                *queue = QueueBit::Opposite;
                false
            }
            (true, QState::WantNo, QueueBit::Opposite) => return Err(invalid("enable already queued")),
            (true, QState::WantYes, QueueBit::Empty) => return Err(invalid("already negotiating for enable")),
            (true, QState::WantYes, QueueBit::Opposite) => {
                *queue = QueueBit::Empty;
                false
            }
            (false, QState::No, _) => return Err(invalid("already disabled")),
            (false, QState::Yes, _) => {
                *q = QState::WantNo;
                true
            }
            (false, QState::WantNo, QueueBit::Empty) => return Err(invalid("already negotiating for disable")),
            (false, QState::WantNo, QueueBit::Opposite) => {
                *queue = QueueBit::Empty;
                false
            }
            (false, QState::WantYes, QueueBit::Empty) => {
                *queue = QueueBit::Opposite;
                false
            }
            (false, QState::WantYes, QueueBit::Opposite) => return Err(invalid("disable already queued")),
        };

        if !send {
            return Ok(None);
        }
        let command = match (side, enable) {
            (Side::Local, true) => WILL,
            (Side::Local, false) => WONT,
            (Side::Remote, true) => DO,
            (Side::Remote, false) => DONT,
        };
        debug!("sending {} {}", command_name(command), option);
        Ok(Some(vec![IAC, command, option]))
    }

    /// Options we agree to perform
    fn accept_local(option: u8) -> bool {
        matches!(
            option,
            OPT_BINARY | OPT_END_OF_RECORD | OPT_TERMINAL_TYPE | OPT_NEW_ENVIRON | OPT_SGA
        )
    }

    /// Options we let the host perform
    fn accept_remote(option: u8) -> bool {
        matches!(option, OPT_BINARY | OPT_END_OF_RECORD | OPT_SGA)
    }

    /// Process host bytes. Returns how many bytes were consumed, which
    /// stops short of a trailing incomplete command, and the events in
    /// stream order.
    pub fn feed(&mut self, bytes: &[u8]) -> (usize, Vec<TelnetEvent>) {
        let mut events = Vec::new();
        let mut data = Vec::new();
        let mut pos = 0;

        while pos < bytes.len() {
            if bytes[pos] != IAC {
                let run = bytes[pos..].iter().position(|&b| b == IAC).unwrap_or(bytes.len() - pos);
                data.extend_from_slice(&bytes[pos..pos + run]);
                pos += run;
                continue;
            }

            let Some(&command) = bytes.get(pos + 1) else { break };
            match command {
                IAC => {
                    data.extend_from_slice(&[IAC, IAC]);
                    pos += 2;
                }
                EOR => {
                    if self.eor_active() {
                        data.extend_from_slice(&[IAC, EOR]);
                    } else {
                        flush_data(&mut data, &mut events);
                        warn!("IAC EOR before END-OF-RECORD was negotiated");
                        events.push(TelnetEvent::Error(NegotiationError::PrematureEndOfRecord));
                    }
                    pos += 2;
                }
                WILL | WONT | DO | DONT => {
                    let Some(&option) = bytes.get(pos + 2) else { break };
                    flush_data(&mut data, &mut events);
                    self.handle_negotiation(command, option, &mut events);
                    pos += 3;
                }
                SB => match find_subnegotiation_end(bytes, pos + 2) {
                    SubnegotiationEnd::Complete { body, next } => {
                        flush_data(&mut data, &mut events);
                        self.handle_subnegotiation(&body, &mut events);
                        pos = next;
                    }
                    SubnegotiationEnd::Interrupted { option, at } => {
                        flush_data(&mut data, &mut events);
                        warn!("subnegotiation for option {:?} not terminated by IAC SE", option);
                        events.push(TelnetEvent::Error(NegotiationError::UnterminatedSubnegotiation {
                            option: option.unwrap_or(0),
                        }));
                        pos = at;
                    }
                    SubnegotiationEnd::Incomplete => break,
                },
                other => {
                    flush_data(&mut data, &mut events);
                    trace!("telnet command {}", other);
                    events.push(TelnetEvent::Command(other));
                    pos += 2;
                }
            }
        }

        flush_data(&mut data, &mut events);
        (pos, events)
    }

    fn handle_negotiation(&mut self, command: u8, option: u8, events: &mut Vec<TelnetEvent>) {
        trace!("received {} {}", command_name(command), option);
        let side = if matches!(command, WILL | WONT) { Side::Remote } else { Side::Local };
        let enable = matches!(command, WILL | DO);
        let accepted = match side {
            Side::Local => Self::accept_local(option),
            Side::Remote => Self::accept_remote(option),
        };
        let (yes, no) = match side {
            Side::Local => (WILL, WONT),
            Side::Remote => (DO, DONT),
        };

        let state = &mut self.options[option as usize];
        let (q, queue) = match side {
            Side::Local => (&mut state.us, &mut state.us_queue),
            Side::Remote => (&mut state.him, &mut state.him_queue),
        };
        let before = *q == QState::Yes;
        let mut reply = None;

        if enable {
            match (*q, *queue) {
                (QState::No, _) => {
                    if accepted {
                        *q = QState::Yes;
                        reply = Some(yes);
                    } else {
                        reply = Some(no);
                    }
                }
                (QState::Yes, _) => {}
                (QState::WantNo, QueueBit::Empty) => {
                    events.push(TelnetEvent::Error(NegotiationError::UnexpectedReply { option, command }));
                    *q = QState::No;
                }
                (QState::WantNo, QueueBit::Opposite) => {
                    events.push(TelnetEvent::Error(NegotiationError::UnexpectedReply { option, command }));
                    *q = QState::Yes;
                    *queue = QueueBit::Empty;
                }
                (QState::WantYes, QueueBit::Empty) => *q = QState::Yes,
                (QState::WantYes, QueueBit::Opposite) => {
                    *q = QState::WantNo;
                    *queue = QueueBit::Empty;
                    reply = Some(no);
                }
            }
        } else {
            match (*q, *queue) {
                (QState::No, _) => {}
                (QState::Yes, _) => {
                    *q = QState::No;
                    reply = Some(no);
                }
                (QState::WantNo, QueueBit::Empty) => *q = QState::No,
                (QState::WantNo, QueueBit::Opposite) => {
                    *q = QState::WantYes;
                    *queue = QueueBit::Empty;
                    reply = Some(yes);
                }
                (QState::WantYes, _) => {
                    *q = QState::No;
                    *queue = QueueBit::Empty;
                }
            }
        }

        let after = *q == QState::Yes;
        if let Some(reply) = reply {
            debug!("answering {} {} with {}", command_name(command), option, command_name(reply));
            events.push(TelnetEvent::Send(vec![IAC, reply, option]));
        }
        if before != after {
            debug!("option {} {:?} {}", option, side, if after { "enabled" } else { "disabled" });
            events.push(TelnetEvent::OptionChanged { option, side, enabled: after });
        }
    }

    fn handle_subnegotiation(&mut self, body: &[u8], events: &mut Vec<TelnetEvent>) {
        let Some((&option, data)) = body.split_first() else {
            events.push(TelnetEvent::Error(NegotiationError::MalformedSubnegotiation {
                option: 0,
                data: Vec::new(),
            }));
            return;
        };
        if !self.is_enabled(option, Side::Local) {
            warn!("subnegotiation for option {} which is not enabled", option);
            events.push(TelnetEvent::Error(NegotiationError::OptionNotEnabled { option }));
            return;
        }

        match option {
            OPT_TERMINAL_TYPE => {
                if data != [TTYPE_SEND] {
                    events.push(TelnetEvent::Error(NegotiationError::MalformedSubnegotiation {
                        option,
                        data: data.to_vec(),
                    }));
                    return;
                }
                debug!("sending terminal type {}", self.terminal_type);
                events.push(TelnetEvent::Send(terminal_type_is(&self.terminal_type)));
            }
            OPT_NEW_ENVIRON => match parse_environ(data) {
                Ok(message) if message.command == ENV_SEND => {
                    if let Some(seed) = message.value_of(IBMRSEED) {
                        debug!("host sent an {} byte seed", seed.len());
                        self.server_seed = Some(seed.to_vec());
                        events.push(TelnetEvent::ServerSeed(seed.to_vec()));
                    }
                    let reply = self.environment_reply(&message.vars);
                    events.push(TelnetEvent::Send(build_environ(ENV_IS, &reply)));
                }
                Ok(message) => debug!("ignoring NEW-ENVIRON command {}", message.command),
                Err(e) => {
                    warn!("{}", e);
                    events.push(TelnetEvent::Error(e));
                }
            },
            other => {
                debug!("ignoring subnegotiation for option {}", other);
            }
        }
    }

    /// Variables answering a SEND. An empty request means everything; an
    /// empty name means every variable of that kind. Unknown names are
    /// returned without a value. Asking for IBMRSEED also returns the
    /// substitute password computed from it.
    fn environment_reply(&self, requested: &[EnvVar]) -> Vec<EnvVar> {
        if requested.is_empty() {
            return self.environment.clone();
        }
        let mut reply: Vec<EnvVar> = Vec::new();
        let mut push = |var: &EnvVar| {
            if !reply.iter().any(|r| r.kind == var.kind && r.name == var.name) {
                reply.push(var.clone());
            }
        };
        for request in requested {
            if request.name.is_empty() {
                self.environment.iter().filter(|v| v.kind == request.kind).for_each(&mut push);
                continue;
            }
            match self.environment.iter().find(|v| v.kind == request.kind && v.name == request.name) {
                Some(var) => push(var),
                None => push(&EnvVar { kind: request.kind, name: request.name.clone(), value: None }),
            }
            if request.kind == EnvVarKind::UserVar && request.name == IBMRSEED {
                if let Some(password) = self
                    .environment
                    .iter()
                    .find(|v| v.kind == EnvVarKind::UserVar && v.name == IBMSUBSPW)
                {
                    push(password);
                }
            }
        }
        reply
    }
}

enum SubnegotiationEnd {
    /// Body with IAC doubling removed, and the index after IAC SE
    Complete { body: Vec<u8>, next: usize },
    /// IAC followed by something other than IAC or SE at `at`
    Interrupted { option: Option<u8>, at: usize },
    Incomplete,
}

fn find_subnegotiation_end(bytes: &[u8], start: usize) -> SubnegotiationEnd {
    let mut body = Vec::new();
    let mut i = start;
    while i < bytes.len() {
        if bytes[i] != IAC {
            body.push(bytes[i]);
            i += 1;
            continue;
        }
        match bytes.get(i + 1) {
            None => return SubnegotiationEnd::Incomplete,
            Some(&IAC) => {
                body.push(IAC);
                i += 2;
            }
            Some(&SE) => return SubnegotiationEnd::Complete { body, next: i + 2 },
            Some(_) => {
                return SubnegotiationEnd::Interrupted { option: body.first().copied(), at: i };
            }
        }
    }
    SubnegotiationEnd::Incomplete
}

fn flush_data(data: &mut Vec<u8>, events: &mut Vec<TelnetEvent>) {
    if !data.is_empty() {
        events.push(TelnetEvent::Data(std::mem::take(data)));
    }
}

fn command_name(command: u8) -> &'static str {
    match command {
        WILL => "WILL",
        WONT => "WONT",
        DO => "DO",
        DONT => "DONT",
        _ => "command",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib5250::telnet::{ENV_USERVAR, ENV_VALUE, ENV_VAR, OPT_ECHO};

    fn sends(events: &[TelnetEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                TelnetEvent::Send(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn negotiated() -> TelnetNegotiator {
        let mut negotiator = TelnetNegotiator::default();
        let host = [
            IAC, DO, OPT_TERMINAL_TYPE, IAC, DO, OPT_NEW_ENVIRON,
            IAC, DO, OPT_BINARY, IAC, WILL, OPT_BINARY,
            IAC, DO, OPT_END_OF_RECORD, IAC, WILL, OPT_END_OF_RECORD,
        ];
        negotiator.feed(&host);
        negotiator
    }

    #[test]
    fn test_host_initiated_negotiation_completes() {
        let mut negotiator = TelnetNegotiator::default();
        let (consumed, events) = negotiator.feed(&[IAC, DO, OPT_BINARY, IAC, WILL, OPT_BINARY]);
        assert_eq!(consumed, 6);
        assert_eq!(sends(&events), vec![IAC, WILL, OPT_BINARY, IAC, DO, OPT_BINARY]);
        assert!(!negotiator.is_negotiation_complete());

        assert!(negotiated().is_negotiation_complete());
    }

    #[test]
    fn test_unsupported_options_refused() {
        let mut negotiator = TelnetNegotiator::default();
        let (_, events) = negotiator.feed(&[IAC, DO, OPT_ECHO, IAC, WILL, 99]);
        assert_eq!(sends(&events), vec![IAC, WONT, OPT_ECHO, IAC, DONT, 99]);
        assert_eq!(negotiator.option_state(OPT_ECHO), TelnetOptionState::default());
    }

    #[test]
    fn test_our_request_is_not_answered_twice() {
        let mut negotiator = TelnetNegotiator::default();
        let opening = negotiator.start_negotiation(&[(OPT_BINARY, Side::Local)]);
        assert_eq!(opening, vec![IAC, WILL, OPT_BINARY]);
        assert_eq!(negotiator.option_state(OPT_BINARY).us, QState::WantYes);

        // The host's DO acknowledges our WILL; no reply, no loop
        let (_, events) = negotiator.feed(&[IAC, DO, OPT_BINARY]);
        assert!(sends(&events).is_empty());
        assert!(negotiator.is_enabled(OPT_BINARY, Side::Local));
        assert!(events.contains(&TelnetEvent::OptionChanged { option: OPT_BINARY, side: Side::Local, enabled: true }));
    }

    #[test]
    fn test_queued_disable_while_enabling() {
        let mut negotiator = TelnetNegotiator::default();
        negotiator.request(OPT_BINARY, Side::Remote, true).unwrap();
        assert_eq!(negotiator.request(OPT_BINARY, Side::Remote, false), Ok(None));
        assert_eq!(negotiator.option_state(OPT_BINARY).him_queue, QueueBit::Opposite);

        // WILL arrives for the first request; the queued disable goes out
        let (_, events) = negotiator.feed(&[IAC, WILL, OPT_BINARY]);
        assert_eq!(sends(&events), vec![IAC, DONT, OPT_BINARY]);
        assert_eq!(negotiator.option_state(OPT_BINARY).him, QState::WantNo);

        assert!(matches!(
            negotiator.request(OPT_BINARY, Side::Remote, false),
            Err(NegotiationError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_terminal_type_reply() {
        let mut negotiator = negotiated();
        let (_, events) = negotiator.feed(&[IAC, SB, OPT_TERMINAL_TYPE, TTYPE_SEND, IAC, SE]);
        assert_eq!(sends(&events), terminal_type_is("IBM-3477-FC"));
    }

    #[test]
    fn test_subnegotiation_for_refused_option() {
        let mut negotiator = TelnetNegotiator::default();
        let (_, events) = negotiator.feed(&[IAC, SB, OPT_TERMINAL_TYPE, TTYPE_SEND, IAC, SE]);
        assert_eq!(
            events,
            vec![TelnetEvent::Error(NegotiationError::OptionNotEnabled { option: OPT_TERMINAL_TYPE })]
        );
    }

    #[test]
    fn test_environ_send_with_seed() {
        let environment = vec![
            EnvVar::var("USER", "QUSER"),
            EnvVar::var("DEVNAME", "QPADEV0001"),
            EnvVar::user_var(IBMRSEED, vec![9, 9, 9, 9, 9, 9, 9, 9]),
            EnvVar::user_var(IBMSUBSPW, vec![7, 7, 7, 7, 7, 7, 7, 7]),
            EnvVar::user_var("KBDTYPE", "USB"),
        ];
        let mut negotiator = TelnetNegotiator::new("IBM-3179-2", environment);
        negotiator.feed(&[IAC, DO, OPT_NEW_ENVIRON]);

        let mut send = vec![IAC, SB, OPT_NEW_ENVIRON, ENV_SEND, ENV_VAR, ENV_USERVAR];
        send.extend_from_slice(IBMRSEED.as_bytes());
        send.push(ENV_VALUE);
        send.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        send.extend_from_slice(&[IAC, SE]);
        let (consumed, events) = negotiator.feed(&send);
        assert_eq!(consumed, send.len());

        assert!(events.contains(&TelnetEvent::ServerSeed(vec![1, 2, 3, 4, 5, 6, 7, 8])));
        assert_eq!(negotiator.server_seed(), Some(&[1, 2, 3, 4, 5, 6, 7, 8][..]));

        let reply = sends(&events);
        let body: Vec<u8> = reply[3..reply.len() - 2].to_vec();
        let message = parse_environ(&body).unwrap();
        let names: Vec<&str> = message.vars.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["USER", "DEVNAME", IBMRSEED, IBMSUBSPW]);
    }

    #[test]
    fn test_data_keeps_escapes_and_eor_after_negotiation() {
        let mut negotiator = negotiated();
        let (consumed, events) = negotiator.feed(&[0x00, IAC, IAC, 0x01, IAC, EOR, 0x02]);
        assert_eq!(consumed, 7);
        assert_eq!(events, vec![TelnetEvent::Data(vec![0x00, IAC, IAC, 0x01, IAC, EOR, 0x02])]);
    }

    #[test]
    fn test_premature_eor_is_dropped() {
        let mut negotiator = TelnetNegotiator::default();
        let (_, events) = negotiator.feed(&[0x01, IAC, EOR, 0x02]);
        assert_eq!(
            events,
            vec![
                TelnetEvent::Data(vec![0x01]),
                TelnetEvent::Error(NegotiationError::PrematureEndOfRecord),
                TelnetEvent::Data(vec![0x02]),
            ]
        );
    }

    #[test]
    fn test_incomplete_commands_are_not_consumed() {
        let mut negotiator = TelnetNegotiator::default();
        assert_eq!(negotiator.feed(&[0x41, IAC]).0, 1);
        assert_eq!(negotiator.feed(&[IAC, DO]).0, 0);
        assert_eq!(negotiator.feed(&[IAC, SB, OPT_TERMINAL_TYPE, TTYPE_SEND]).0, 0);
    }

    #[test]
    fn test_interrupted_subnegotiation() {
        let mut negotiator = negotiated();
        let (consumed, events) = negotiator.feed(&[IAC, SB, OPT_TERMINAL_TYPE, TTYPE_SEND, IAC, 241]);
        assert_eq!(consumed, 6);
        assert_eq!(
            events,
            vec![
                TelnetEvent::Error(NegotiationError::UnterminatedSubnegotiation { option: OPT_TERMINAL_TYPE }),
                TelnetEvent::Command(241),
            ]
        );
    }
}
