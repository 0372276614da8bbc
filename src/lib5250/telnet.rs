//! Telnet codes and subnegotiation payloads used by TN5250E
//!
//! Builds and parses the TERMINAL-TYPE (RFC 1091) and NEW-ENVIRON
//! (RFC 1572, RFC 4777 variables) subnegotiations. The option state machine
//! lives in [`crate::telnet_negotiation`].

use crate::error::NegotiationError;

pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
pub const SB: u8 = 250;
pub const GA: u8 = 249;
pub const EL: u8 = 248;
pub const EC: u8 = 247;
pub const AYT: u8 = 246;
pub const AO: u8 = 245;
pub const IP: u8 = 244;
pub const BRK: u8 = 243;
pub const DM: u8 = 242;
pub const NOP: u8 = 241;
pub const SE: u8 = 240;
/// End of record marker (RFC 885)
pub const EOR: u8 = 239;

pub const OPT_BINARY: u8 = 0;
pub const OPT_ECHO: u8 = 1;
pub const OPT_SGA: u8 = 3;
pub const OPT_TERMINAL_TYPE: u8 = 24;
pub const OPT_END_OF_RECORD: u8 = 25;
pub const OPT_NAWS: u8 = 31;
pub const OPT_NEW_ENVIRON: u8 = 39;

pub const TTYPE_IS: u8 = 0;
pub const TTYPE_SEND: u8 = 1;

pub const ENV_IS: u8 = 0;
pub const ENV_SEND: u8 = 1;
pub const ENV_INFO: u8 = 2;

pub const ENV_VAR: u8 = 0;
pub const ENV_VALUE: u8 = 1;
pub const ENV_ESC: u8 = 2;
pub const ENV_USERVAR: u8 = 3;

/// Random seed the server sends for substitute password generation
pub const IBMRSEED: &str = "IBMRSEED";
pub const IBMSUBSPW: &str = "IBMSUBSPW";
pub const IBMTICKET: &str = "IBMTICKET";

/// 5250 display station models known to OS/400 Telnet
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TerminalType {
    IBM3179,
    IBM3180,
    IBM3196,
    IBM3477FC,
    IBM3477FG,
    IBM5251,
    IBM5291,
    IBM5292,
    IBM5555B01,
    IBM5555C01,
    Custom(String),
}

impl Default for TerminalType {
    fn default() -> Self {
        TerminalType::IBM3477FC
    }
}

impl TerminalType {
    pub fn as_str(&self) -> &str {
        match self {
            TerminalType::IBM3179 => "IBM-3179-2",
            TerminalType::IBM3180 => "IBM-3180-2",
            TerminalType::IBM3196 => "IBM-3196-A1",
            TerminalType::IBM3477FC => "IBM-3477-FC",
            TerminalType::IBM3477FG => "IBM-3477-FG",
            TerminalType::IBM5251 => "IBM-5251-11",
            TerminalType::IBM5291 => "IBM-5291-1",
            TerminalType::IBM5292 => "IBM-5292-2",
            TerminalType::IBM5555B01 => "IBM-5555-B01",
            TerminalType::IBM5555C01 => "IBM-5555-C01",
            TerminalType::Custom(name) => name,
        }
    }

    /// Map a TERMINAL-TYPE string to a model; unknown names are kept as is
    pub fn from_name(name: &str) -> Self {
        let known = [
            TerminalType::IBM3179,
            TerminalType::IBM3180,
            TerminalType::IBM3196,
            TerminalType::IBM3477FC,
            TerminalType::IBM3477FG,
            TerminalType::IBM5251,
            TerminalType::IBM5291,
            TerminalType::IBM5292,
            TerminalType::IBM5555B01,
            TerminalType::IBM5555C01,
        ];
        known
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(name))
            .unwrap_or_else(|| TerminalType::Custom(name.to_string()))
    }

    /// Rows and columns of the display; 27x132 models also do 24x80
    pub fn screen_size(&self) -> (usize, usize) {
        match self {
            TerminalType::IBM3180 | TerminalType::IBM3477FC | TerminalType::IBM3477FG => (27, 132),
            _ => (24, 80),
        }
    }

    pub fn is_wide(&self) -> bool {
        self.screen_size() == (27, 132)
    }

    pub fn is_color(&self) -> bool {
        matches!(
            self,
            TerminalType::IBM3179
                | TerminalType::IBM3477FC
                | TerminalType::IBM5292
                | TerminalType::IBM5555C01
        )
    }
}

impl std::fmt::Display for TerminalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `IAC SB TERMINAL-TYPE IS <name> IAC SE`
pub fn terminal_type_is(name: &str) -> Vec<u8> {
    let mut out = vec![IAC, SB, OPT_TERMINAL_TYPE, TTYPE_IS];
    out.extend(double_iac(name.as_bytes()));
    out.extend_from_slice(&[IAC, SE]);
    out
}

/// VAR (well-known) or USERVAR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvVarKind {
    Var,
    UserVar,
}

impl EnvVarKind {
    fn to_u8(self) -> u8 {
        match self {
            EnvVarKind::Var => ENV_VAR,
            EnvVarKind::UserVar => ENV_USERVAR,
        }
    }
}

/// One NEW-ENVIRON variable; `value` is `None` when only the name was sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub kind: EnvVarKind,
    pub name: String,
    pub value: Option<Vec<u8>>,
}

impl EnvVar {
    pub fn var(name: &str, value: impl Into<Vec<u8>>) -> Self {
        Self { kind: EnvVarKind::Var, name: name.to_string(), value: Some(value.into()) }
    }

    pub fn user_var(name: &str, value: impl Into<Vec<u8>>) -> Self {
        Self { kind: EnvVarKind::UserVar, name: name.to_string(), value: Some(value.into()) }
    }
}

/// Decoded NEW-ENVIRON subnegotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironMessage {
    /// IS, SEND or INFO
    pub command: u8,
    pub vars: Vec<EnvVar>,
}

impl EnvironMessage {
    /// Value of a variable by name, either kind
    pub fn value_of(&self, name: &str) -> Option<&[u8]> {
        self.vars
            .iter()
            .find(|v| v.name == name)
            .and_then(|v| v.value.as_deref())
    }
}

/// Parse the body of a NEW-ENVIRON subnegotiation (after the option byte,
/// IAC doubling already removed)
pub fn parse_environ(data: &[u8]) -> Result<EnvironMessage, NegotiationError> {
    let malformed = || NegotiationError::MalformedSubnegotiation {
        option: OPT_NEW_ENVIRON,
        data: data.to_vec(),
    };
    let (&command, rest) = data.split_first().ok_or_else(malformed)?;
    if !matches!(command, ENV_IS | ENV_SEND | ENV_INFO) {
        return Err(malformed());
    }

    let mut vars = Vec::new();
    let mut i = 0;
    while i < rest.len() {
        let kind = match rest[i] {
            ENV_VAR => EnvVarKind::Var,
            ENV_USERVAR => EnvVarKind::UserVar,
            _ => return Err(malformed()),
        };
        i += 1;
        let name = read_env_token(rest, &mut i).ok_or_else(malformed)?;
        let value = if rest.get(i) == Some(&ENV_VALUE) {
            i += 1;
            Some(read_env_token(rest, &mut i).ok_or_else(malformed)?)
        } else {
            None
        };
        vars.push(EnvVar {
            kind,
            name: String::from_utf8_lossy(&name).into_owned(),
            value,
        });
    }
    Ok(EnvironMessage { command, vars })
}

/// Bytes up to the next unescaped VAR, VALUE or USERVAR
fn read_env_token(data: &[u8], i: &mut usize) -> Option<Vec<u8>> {
    let mut token = Vec::new();
    while let Some(&byte) = data.get(*i) {
        match byte {
            ENV_ESC => {
                token.push(*data.get(*i + 1)?);
                *i += 2;
            }
            ENV_VAR | ENV_VALUE | ENV_USERVAR => break,
            _ => {
                token.push(byte);
                *i += 1;
            }
        }
    }
    Some(token)
}

fn escape_env(bytes: &[u8], out: &mut Vec<u8>) {
    for &byte in bytes {
        if matches!(byte, ENV_VAR | ENV_VALUE | ENV_ESC | ENV_USERVAR) {
            out.push(ENV_ESC);
        }
        out.push(byte);
    }
}

/// `IAC SB NEW-ENVIRON <command> vars… IAC SE`, escaped and IAC doubled
pub fn build_environ(command: u8, vars: &[EnvVar]) -> Vec<u8> {
    let mut body = vec![OPT_NEW_ENVIRON, command];
    for var in vars {
        body.push(var.kind.to_u8());
        escape_env(var.name.as_bytes(), &mut body);
        if let Some(value) = &var.value {
            body.push(ENV_VALUE);
            escape_env(value, &mut body);
        }
    }
    let mut out = vec![IAC, SB];
    out.extend(double_iac(&body));
    out.extend_from_slice(&[IAC, SE]);
    out
}

fn double_iac(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for &byte in bytes {
        out.push(byte);
        if byte == IAC {
            out.push(IAC);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_type_sizes() {
        assert_eq!(TerminalType::default().as_str(), "IBM-3477-FC");
        assert_eq!(TerminalType::from_name("IBM-3179-2"), TerminalType::IBM3179);
        assert_eq!(TerminalType::IBM3179.screen_size(), (24, 80));
        assert!(TerminalType::from_name("ibm-3477-fc").is_wide());
        assert_eq!(
            TerminalType::from_name("IBM-9999-X"),
            TerminalType::Custom("IBM-9999-X".to_string())
        );
        assert_eq!(TerminalType::Custom("X".into()).screen_size(), (24, 80));
    }

    #[test]
    fn test_terminal_type_is_frame() {
        assert_eq!(
            terminal_type_is("IBM-3179-2"),
            [&[IAC, SB, 24, 0][..], b"IBM-3179-2", &[IAC, SE]].concat()
        );
    }

    #[test]
    fn test_parse_server_send_with_seed() {
        // SEND VAR USERVAR "IBMRSEED" VALUE <8 bytes, one needing escape>
        let mut data = vec![ENV_SEND, ENV_VAR, ENV_USERVAR];
        data.extend_from_slice(b"IBMRSEED");
        data.push(ENV_VALUE);
        data.extend_from_slice(&[0x11, ENV_ESC, 0x01, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77]);

        let message = parse_environ(&data).unwrap();
        assert_eq!(message.command, ENV_SEND);
        assert_eq!(message.vars.len(), 2);
        assert_eq!(message.vars[0].name, "");
        assert_eq!(message.vars[0].kind, EnvVarKind::Var);
        assert_eq!(
            message.value_of(IBMRSEED),
            Some(&[0x11, 0x01, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77][..])
        );
    }

    #[test]
    fn test_build_escapes_and_doubles_iac() {
        let vars = [EnvVar::var("USER", "QSECOFR"), EnvVar::user_var("IBMRSEED", vec![0x01, 0xFF])];
        let frame = build_environ(ENV_IS, &vars);
        assert_eq!(&frame[..4], &[IAC, SB, OPT_NEW_ENVIRON, ENV_IS]);
        assert_eq!(&frame[frame.len() - 2..], &[IAC, SE]);
        assert!(frame.windows(3).any(|w| w == [ENV_ESC, 0x01, IAC]));
        assert!(frame.windows(2).any(|w| w == [IAC, IAC]));

        // Undo IAC doubling and parse back
        let body = &frame[3..frame.len() - 2];
        let mut plain = Vec::new();
        let mut i = 0;
        while i < body.len() {
            plain.push(body[i]);
            i += if body[i] == IAC { 2 } else { 1 };
        }
        let message = parse_environ(&plain).unwrap();
        assert_eq!(message.vars, vars.to_vec());
    }

    #[test]
    fn test_malformed_environ() {
        assert!(parse_environ(&[]).is_err());
        assert!(parse_environ(&[0x07]).is_err());
        assert!(parse_environ(&[ENV_IS, 0x41]).is_err());
        assert!(parse_environ(&[ENV_IS, ENV_VAR, b'A', ENV_ESC]).is_err());
    }
}
