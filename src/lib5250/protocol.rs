//! GDS record envelope
//!
//! Every 5250 record travels as
//!
//! ```text
//! LRL(2) | type 0x12A0(2) | reserved(2) | var hdr len(1) | flags(2) | opcode(1) | payload | IAC EOR
//! ```
//!
//! The logical record length counts every header and payload byte, itself
//! included, and is computed before IAC (0xFF) bytes are doubled for the wire.
//! Decoding therefore de-escapes while it counts.

use log::{debug, warn};

use super::codes::{
    Opcode, FLAG_ATN, FLAG_ERR, FLAG_HLP, FLAG_SRQ, FLAG_TRQ, GDS_RECORD_TYPE,
    VARIABLE_HEADER_LEN,
};
use crate::error::{DecodeError, DecodeResult, EncodeError};

pub const IAC: u8 = 0xFF;
pub const EOR: u8 = 0xEF;

/// Bytes before the payload when the variable header is the usual 4 bytes
pub const HEADER_LEN: usize = 10;

/// One 5250 record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GdsRecord {
    /// Logical length including the length field itself
    pub length: u16,
    pub record_type: u16,
    pub reserved: u16,
    pub flags: u16,
    pub opcode: u8,
    /// Variable header bytes beyond flags and opcode, normally empty
    pub header_extension: Vec<u8>,
    pub payload: Vec<u8>,
}

impl GdsRecord {
    pub fn new(opcode: Opcode, payload: Vec<u8>) -> Self {
        Self::new_with_flags(opcode, 0, payload)
    }

    /// Create a record with header flags
    pub fn new_with_flags(opcode: Opcode, flags: u16, payload: Vec<u8>) -> Self {
        let mut record = Self {
            length: 0,
            record_type: GDS_RECORD_TYPE,
            reserved: 0,
            flags,
            opcode: opcode.to_u8(),
            header_extension: Vec::new(),
            payload,
        };
        // Oversized records keep a saturated length; `to_bytes` refuses them
        record.length = u16::try_from(record.logical_len()).unwrap_or(u16::MAX);
        record
    }

    /// Typed opcode, `None` for values outside the defined set
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::from_u8(self.opcode)
    }

    pub fn has_flag(&self, mask: u16) -> bool {
        self.flags & mask != 0
    }

    pub fn is_error(&self) -> bool {
        self.has_flag(FLAG_ERR)
    }

    pub fn is_attention(&self) -> bool {
        self.has_flag(FLAG_ATN)
    }

    pub fn is_system_request(&self) -> bool {
        self.has_flag(FLAG_SRQ)
    }

    pub fn is_test_request(&self) -> bool {
        self.has_flag(FLAG_TRQ)
    }

    pub fn is_help(&self) -> bool {
        self.has_flag(FLAG_HLP)
    }

    fn logical_len(&self) -> usize {
        HEADER_LEN + self.header_extension.len() + self.payload.len()
    }

    /// Header and payload before IAC doubling. Fails when the record does not
    /// fit the 16-bit length or the variable header its 8-bit length.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        let length = u16::try_from(self.logical_len())
            .map_err(|_| EncodeError::RecordTooLong { length: self.logical_len() })?;
        let variable_header_len = u8::try_from(self.header_extension.len())
            .ok()
            .and_then(|extra| VARIABLE_HEADER_LEN.checked_add(extra))
            .ok_or(EncodeError::RecordTooLong { length: self.logical_len() })?;
        let mut bytes = Vec::with_capacity(length as usize);
        bytes.extend_from_slice(&length.to_be_bytes());
        bytes.extend_from_slice(&self.record_type.to_be_bytes());
        bytes.extend_from_slice(&self.reserved.to_be_bytes());
        bytes.push(variable_header_len);
        bytes.extend_from_slice(&self.flags.to_be_bytes());
        bytes.push(self.opcode);
        bytes.extend_from_slice(&self.header_extension);
        bytes.extend_from_slice(&self.payload);
        Ok(bytes)
    }

    /// Parse an unescaped record (without the trailing IAC EOR)
    pub fn from_bytes(bytes: &[u8]) -> DecodeResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(DecodeError::TruncatedRecord {
                expected: HEADER_LEN,
                available: bytes.len(),
            });
        }

        let length = u16::from_be_bytes([bytes[0], bytes[1]]);
        if (length as usize) < HEADER_LEN {
            return Err(DecodeError::InvalidHeader {
                reason: format!("logical record length {length} is shorter than the header"),
            });
        }
        if (length as usize) > bytes.len() {
            return Err(DecodeError::TruncatedRecord {
                expected: length as usize,
                available: bytes.len(),
            });
        }
        if (length as usize) < bytes.len() {
            return Err(DecodeError::InvalidHeader {
                reason: format!(
                    "logical record length {length} but {} bytes before end of record",
                    bytes.len()
                ),
            });
        }

        let record_type = u16::from_be_bytes([bytes[2], bytes[3]]);
        if record_type != GDS_RECORD_TYPE {
            return Err(DecodeError::InvalidHeader {
                reason: format!("record type 0x{record_type:04X} is not 0x{GDS_RECORD_TYPE:04X}"),
            });
        }

        let var_len = bytes[6] as usize;
        if var_len < VARIABLE_HEADER_LEN as usize || 6 + var_len > bytes.len() {
            return Err(DecodeError::InvalidHeader {
                reason: format!("variable header length {var_len} not valid"),
            });
        }

        Ok(Self {
            length,
            record_type,
            reserved: u16::from_be_bytes([bytes[4], bytes[5]]),
            flags: u16::from_be_bytes([bytes[7], bytes[8]]),
            opcode: bytes[9],
            header_extension: bytes[HEADER_LEN..6 + var_len].to_vec(),
            payload: bytes[6 + var_len..].to_vec(),
        })
    }
}

/// Double every IAC byte
pub fn escape_iac(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 16 + 2);
    for &byte in data {
        out.push(byte);
        if byte == IAC {
            out.push(IAC);
        }
    }
    out
}

/// Wire form of a record: LRL fixed first, IAC doubled, IAC EOR appended
pub fn encode_frame(record: &GdsRecord) -> Result<Vec<u8>, EncodeError> {
    let mut wire = escape_iac(&record.to_bytes()?);
    wire.extend_from_slice(&[IAC, EOR]);
    Ok(wire)
}

/// Take one complete record from the front of `buf`.
///
/// Returns `Ok(None)` and leaves `buf` untouched until a full record up to
/// IAC EOR is present. On `Err` the damaged bytes, through the terminating
/// marker or the interrupting Telnet command, are removed so the caller can
/// keep decoding.
pub fn decode_frame(buf: &mut Vec<u8>) -> DecodeResult<Option<GdsRecord>> {
    let mut logical = Vec::with_capacity(buf.len());
    let mut i = 0;

    let end = loop {
        if i >= buf.len() {
            return Ok(None);
        }
        if buf[i] != IAC {
            logical.push(buf[i]);
            i += 1;
            continue;
        }
        match buf.get(i + 1) {
            None => return Ok(None),
            Some(&IAC) => {
                logical.push(IAC);
                i += 2;
            }
            Some(&EOR) => break i + 2,
            Some(&command) => {
                let expected = declared_length(&logical);
                warn!("Telnet command 0x{command:02X} inside a 5250 record after {} bytes", logical.len());
                buf.drain(..i + 2);
                return Err(DecodeError::TruncatedRecord {
                    expected,
                    available: logical.len(),
                });
            }
        }
    };

    buf.drain(..end);

    let expected = declared_length(&logical);
    if logical.len() < 2 || logical.len() < expected {
        debug!("End of record after {} of {} bytes", logical.len(), expected);
        return Err(DecodeError::TruncatedRecord {
            expected,
            available: logical.len(),
        });
    }

    GdsRecord::from_bytes(&logical).map(Some)
}

fn declared_length(logical: &[u8]) -> usize {
    if logical.len() >= 2 {
        u16::from_be_bytes([logical[0], logical[1]]) as usize
    } else {
        HEADER_LEN
    }
}
