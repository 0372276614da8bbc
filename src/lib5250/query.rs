//! 5250 Query Reply structured field
//!
//! Answer to the host's Write Structured Field Query (class 0xD9, type 0x70).
//! The reply describes the emulated controller and display; its 2-byte length
//! counts itself, so a length of 0x003A is 58 bytes starting at the length
//! field.

use log::warn;

use super::codes::{AID_QUERY_REPLY, SF_5250_QUERY, SF_CLASS_5250};
use crate::error::{DecodeError, DecodeResult};
use crate::protocol_common::ebcdic::default_page;

/// Length of the reply, length field included
pub const QUERY_REPLY_LEN: usize = 58;

const DEVICE_TYPE_OFFSET: usize = 27;
const MODEL_OFFSET: usize = 31;
const KEYBOARD_OFFSET: usize = 34;
const SERIAL_OFFSET: usize = 37;
const MAX_FIELDS_OFFSET: usize = 41;
const CUSTOMIZATION_OFFSET: usize = 43;
const CAPABILITIES_OFFSET: usize = 46;

/// Query Reply contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryReply {
    pub flags: u8,
    pub controller_hardware_class: u16,
    pub code_level: [u8; 3],
    /// 0x01 for a display station
    pub device_class: u8,
    /// Four character machine type, e.g. "3477"
    pub device_type: String,
    /// Model, at most three characters, e.g. "FC"
    pub device_model: String,
    pub keyboard_id: u8,
    pub extended_keyboard_id: u8,
    pub serial_number: [u8; 4],
    pub max_input_fields: u16,
    pub customization: u8,
    pub capabilities: [u8; 5],
}

impl Default for QueryReply {
    fn default() -> Self {
        Self::new("3477", "FC")
    }
}

impl QueryReply {
    pub fn new(device_type: &str, device_model: &str) -> Self {
        Self {
            flags: 0x80,
            controller_hardware_class: 0x0600,
            code_level: [0x01, 0x01, 0x00],
            device_class: 0x01,
            device_type: device_type.to_string(),
            device_model: device_model.to_string(),
            keyboard_id: 0x02,
            extended_keyboard_id: 0x00,
            serial_number: [0x00, 0x61, 0x50, 0x00],
            max_input_fields: 0xFFFF,
            customization: 0x00,
            capabilities: [0x23, 0x31, 0x00, 0x00, 0x00],
        }
    }

    /// Build the reply for a Telnet terminal type such as "IBM-3477-FC"
    pub fn for_terminal_type(terminal_type: &str) -> Self {
        let mut parts = terminal_type.trim_start_matches("IBM-").splitn(2, '-');
        let device_type = parts.next().unwrap_or("3477");
        let model = parts.next().unwrap_or("");
        Self::new(device_type, model)
    }

    /// Serialize the 58 byte structured field
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; QUERY_REPLY_LEN];
        out[0..2].copy_from_slice(&(QUERY_REPLY_LEN as u16).to_be_bytes());
        out[2] = SF_CLASS_5250;
        out[3] = SF_5250_QUERY;
        out[4] = self.flags;
        out[5..7].copy_from_slice(&self.controller_hardware_class.to_be_bytes());
        out[7..10].copy_from_slice(&self.code_level);
        // 10..26 reserved
        out[26] = self.device_class;
        write_ebcdic(&mut out[DEVICE_TYPE_OFFSET..MODEL_OFFSET], &self.device_type);
        write_ebcdic(&mut out[MODEL_OFFSET..KEYBOARD_OFFSET], &self.device_model);
        out[KEYBOARD_OFFSET] = self.keyboard_id;
        out[KEYBOARD_OFFSET + 1] = self.extended_keyboard_id;
        out[SERIAL_OFFSET..MAX_FIELDS_OFFSET].copy_from_slice(&self.serial_number);
        out[MAX_FIELDS_OFFSET..CUSTOMIZATION_OFFSET].copy_from_slice(&self.max_input_fields.to_be_bytes());
        out[CUSTOMIZATION_OFFSET] = self.customization;
        out[CAPABILITIES_OFFSET..CAPABILITIES_OFFSET + 5].copy_from_slice(&self.capabilities);
        out
    }

    /// Inbound record payload: cursor 0,0, AID 0x88, reply
    pub fn to_response_payload(&self) -> Vec<u8> {
        let mut payload = vec![0x00, 0x00, AID_QUERY_REPLY];
        payload.extend(self.to_bytes());
        payload
    }

    /// Parse a reply starting at its length field. Bytes past the declared
    /// length belong to whatever follows and are not examined.
    pub fn parse(bytes: &[u8]) -> DecodeResult<Self> {
        if bytes.len() < 2 {
            return Err(DecodeError::TruncatedRecord { expected: QUERY_REPLY_LEN, available: bytes.len() });
        }
        let length = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        if length < QUERY_REPLY_LEN {
            return Err(DecodeError::InvalidHeader {
                reason: format!("query reply length {length} is shorter than {QUERY_REPLY_LEN}"),
            });
        }
        if bytes.len() < length {
            return Err(DecodeError::TruncatedRecord { expected: length, available: bytes.len() });
        }
        let reply = &bytes[..length];
        if reply[2] != SF_CLASS_5250 || reply[3] != SF_5250_QUERY {
            return Err(DecodeError::InvalidHeader {
                reason: format!("structured field {:02X} {:02X} is not a query reply", reply[2], reply[3]),
            });
        }

        let mut code_level = [0u8; 3];
        code_level.copy_from_slice(&reply[7..10]);
        let mut serial_number = [0u8; 4];
        serial_number.copy_from_slice(&reply[SERIAL_OFFSET..MAX_FIELDS_OFFSET]);
        let mut capabilities = [0u8; 5];
        capabilities.copy_from_slice(&reply[CAPABILITIES_OFFSET..CAPABILITIES_OFFSET + 5]);

        Ok(Self {
            flags: reply[4],
            controller_hardware_class: u16::from_be_bytes([reply[5], reply[6]]),
            code_level,
            device_class: reply[26],
            device_type: read_ebcdic(&reply[DEVICE_TYPE_OFFSET..MODEL_OFFSET])?,
            device_model: read_ebcdic(&reply[MODEL_OFFSET..KEYBOARD_OFFSET])?,
            keyboard_id: reply[KEYBOARD_OFFSET],
            extended_keyboard_id: reply[KEYBOARD_OFFSET + 1],
            serial_number,
            max_input_fields: u16::from_be_bytes([reply[MAX_FIELDS_OFFSET], reply[MAX_FIELDS_OFFSET + 1]]),
            customization: reply[CUSTOMIZATION_OFFSET],
            capabilities,
        })
    }
}

/// Device identifiers are blank padded EBCDIC in CCSID 37
fn write_ebcdic(dest: &mut [u8], text: &str) {
    dest.fill(0x40);
    let page = default_page();
    for (slot, ch) in dest.iter_mut().zip(text.chars()) {
        match page.to_ebcdic(ch) {
            Ok(byte) => *slot = byte,
            Err(e) => warn!("device identifier {:?}: {}, sending a blank", text, e),
        }
    }
}

fn read_ebcdic(bytes: &[u8]) -> DecodeResult<String> {
    let text = default_page()
        .decode(bytes)
        .map_err(|e| DecodeError::InvalidHeader { reason: format!("device identifier: {e}") })?;
    Ok(text.trim_end().to_string())
}
