//! 5250 protocol constants
//!
//! Record opcodes, commands, orders, AID bytes, header flags and the 5494
//! operator error table. Opcodes and commands are separate namespaces; the
//! typed enums below keep them from being mixed up.

/// Escape byte that precedes every command in a record payload
pub const ESC: u8 = 0x04;

/// GDS record type for 5250 display data
pub const GDS_RECORD_TYPE: u16 = 0x12A0;

/// Variable header length used by every record we build
pub const VARIABLE_HEADER_LEN: u8 = 0x04;

/// Record header flags (MSB-0 bit numbering, tested by mask only)
pub const FLAG_ERR: u16 = 0x8000; // bit 0: data stream output error
pub const FLAG_ATN: u16 = 0x4000; // bit 1: attention key
pub const FLAG_SRQ: u16 = 0x0400; // bit 5: system request
pub const FLAG_TRQ: u16 = 0x0200; // bit 6: test request
pub const FLAG_HLP: u16 = 0x0100; // bit 7: help in error state

/// Record opcodes
pub const OP_NO_OP: u8 = 0x00;
pub const OP_INVITE: u8 = 0x01;
pub const OP_OUTPUT_ONLY: u8 = 0x02;
pub const OP_PUT_GET: u8 = 0x03;
pub const OP_SAVE_SCREEN: u8 = 0x04;
pub const OP_RESTORE_SCREEN: u8 = 0x05;
pub const OP_READ_IMMEDIATE: u8 = 0x06;
pub const OP_READ_SCREEN: u8 = 0x08;
pub const OP_CANCEL_INVITE: u8 = 0x0A;
pub const OP_MESSAGE_LIGHT_ON: u8 = 0x0B;
pub const OP_MESSAGE_LIGHT_OFF: u8 = 0x0C;

/// Commands (each preceded by ESC)
pub const CMD_CLEAR_UNIT: u8 = 0x40;
pub const CMD_CLEAR_UNIT_ALTERNATE: u8 = 0x20;
pub const CMD_CLEAR_FORMAT_TABLE: u8 = 0x50;
pub const CMD_WRITE_TO_DISPLAY: u8 = 0x11;
pub const CMD_WRITE_ERROR_CODE: u8 = 0x21;
pub const CMD_WRITE_ERROR_CODE_WINDOW: u8 = 0x22;
pub const CMD_READ_INPUT_FIELDS: u8 = 0x42;
pub const CMD_READ_MDT_FIELDS: u8 = 0x52;
pub const CMD_READ_MDT_FIELDS_ALT: u8 = 0x82;
pub const CMD_READ_SCREEN_IMMEDIATE: u8 = 0x62;
pub const CMD_READ_IMMEDIATE: u8 = 0x72;
pub const CMD_SAVE_SCREEN: u8 = 0x02;
pub const CMD_SAVE_PARTIAL_SCREEN: u8 = 0x03;
pub const CMD_RESTORE_SCREEN: u8 = 0x12;
pub const CMD_RESTORE_PARTIAL_SCREEN: u8 = 0x13;
pub const CMD_ROLL: u8 = 0x23;
pub const CMD_WRITE_STRUCTURED_FIELD: u8 = 0xF3;

/// Write To Display control character 2
pub const CC2_MESSAGE_ON: u8 = 0x01;
pub const CC2_MESSAGE_OFF: u8 = 0x02;
pub const CC2_ALARM: u8 = 0x04;
pub const CC2_UNLOCK: u8 = 0x08; // also resets a pending AID
pub const CC2_SET_BLINK: u8 = 0x10;
pub const CC2_RESET_BLINK: u8 = 0x20;
pub const CC2_CURSOR_MOVES_ON_UNLOCK: u8 = 0x40;

/// Orders inside Write To Display
pub const SOH: u8 = 0x01; // Start of header
pub const RA: u8 = 0x02; // Repeat to address
pub const EA: u8 = 0x03; // Erase to address
pub const TD: u8 = 0x10; // Transparent data
pub const SBA: u8 = 0x11; // Set buffer address
pub const WEA: u8 = 0x12; // Write extended attribute
pub const IC: u8 = 0x13; // Insert cursor
pub const MC: u8 = 0x14; // Move cursor
pub const WDSF: u8 = 0x15; // Write to display structured field
pub const SF: u8 = 0x1D; // Start of field

/// Structured field class and types carried by Write Structured Field
pub const SF_CLASS_5250: u8 = 0xD9;
pub const SF_5250_QUERY: u8 = 0x70;
pub const SF_5250_QUERY_STATION_STATE: u8 = 0x72;

/// AID bytes
pub const AID_ENTER: u8 = 0xF1;
pub const AID_F1: u8 = 0x31;
pub const AID_F13: u8 = 0xB1;
pub const AID_CLEAR: u8 = 0xBD;
pub const AID_HELP: u8 = 0xF3;
pub const AID_ROLL_DOWN: u8 = 0xF4;
pub const AID_ROLL_UP: u8 = 0xF5;
pub const AID_PRINT: u8 = 0xF6;
pub const AID_RECORD_BACKSPACE: u8 = 0xF8;
/// AID carried in front of a Query Reply
pub const AID_QUERY_REPLY: u8 = 0x88;

/// Shift-in / shift-out bytes, also legal data characters in a WTD
pub const SO: u8 = 0x0E;
pub const SI: u8 = 0x0F;
/// DUP character
pub const DUP: u8 = 0x1C;

/// Operator error codes, 5494 User's Guide 2.3.4
pub const ERR_DONT_KNOW: u16 = 0x0001;
pub const ERR_BYPASS_FIELD: u16 = 0x0004;
pub const ERR_NO_FIELD: u16 = 0x0005;
pub const ERR_INVALID_SYSREQ: u16 = 0x0006;
pub const ERR_MANDATORY_ENTRY: u16 = 0x0007;
pub const ERR_ALPHA_ONLY: u16 = 0x0008;
pub const ERR_NUMERIC_ONLY: u16 = 0x0009;
pub const ERR_DIGITS_ONLY: u16 = 0x0010;
pub const ERR_LAST_SIGNED: u16 = 0x0011;
pub const ERR_NO_ROOM: u16 = 0x0012;
pub const ERR_MANDATORY_FILL: u16 = 0x0014;
pub const ERR_CHECK_DIGIT: u16 = 0x0015;
pub const ERR_NOT_SIGNED: u16 = 0x0016;
pub const ERR_EXIT_NOT_VALID: u16 = 0x0018;
pub const ERR_DUP_NOT_ENABLED: u16 = 0x0019;
pub const ERR_NO_FIELD_EXIT: u16 = 0x0020;
pub const ERR_NO_INPUT: u16 = 0x0026;
pub const ERR_BAD_CHAR: u16 = 0x0027;
pub const ERR_DBCS_WRONG_TYPE: u16 = 0x0060;
pub const ERR_SBCS_WRONG_TYPE: u16 = 0x0061;

/// Text shown in the OIA for an operator error code
pub fn error_message(code: u16) -> Option<&'static str> {
    let text = match code {
        ERR_DONT_KNOW => "Keyboard overrun.",
        ERR_BYPASS_FIELD => "Entry of data not allowed in this input/output field.",
        ERR_NO_FIELD => "Cursor in protected area of display.",
        ERR_INVALID_SYSREQ => "Key pressed following System Request key was not valid.",
        ERR_MANDATORY_ENTRY => "Mandatory data entry field. Must have data entered.",
        ERR_ALPHA_ONLY => "Field requires alphabetic characters.",
        ERR_NUMERIC_ONLY => "Field requires numeric characters.",
        ERR_DIGITS_ONLY => "Only characters 0 through 9 allowed.",
        ERR_LAST_SIGNED => "Key for sign position of field not valid.",
        ERR_NO_ROOM => "No room to insert data.",
        ERR_MANDATORY_FILL => "Mandatory fill field. Must fill to exit.",
        ERR_CHECK_DIGIT => "Modulo 10 or 11 check digit error.",
        ERR_NOT_SIGNED => "Field Minus key not valid in field.",
        ERR_EXIT_NOT_VALID => "The key used to exit field not valid.",
        ERR_DUP_NOT_ENABLED => "Duplicate key or Field Mark key not allowed in field.",
        ERR_NO_FIELD_EXIT => "Enter key not allowed in field.",
        ERR_NO_INPUT => "Field- entry not allowed.",
        ERR_BAD_CHAR => "Cannot use undefined key.",
        ERR_DBCS_WRONG_TYPE => "Field requires alphanumeric characters.",
        ERR_SBCS_WRONG_TYPE => "Field requires double-byte characters.",
        _ => return None,
    };
    Some(text)
}

/// Field attribute bytes, 5494 Functions Reference 15.6.12.3.
/// Bits 0-2 are always 001.
pub const ATTR_GREEN: u8 = 0x20;
pub const ATTR_REVERSE: u8 = 0x21;
pub const ATTR_WHITE: u8 = 0x22;
pub const ATTR_UNDERLINE: u8 = 0x24;
pub const ATTR_NONDISPLAY: u8 = 0x27;
pub const ATTR_RED: u8 = 0x28;
pub const ATTR_TURQUOISE: u8 = 0x30;
pub const ATTR_YELLOW: u8 = 0x32;
pub const ATTR_PINK: u8 = 0x38;
pub const ATTR_BLUE: u8 = 0x3A;
pub const ATTR_NORMAL: u8 = ATTR_GREEN;

/// True for bytes 0x20..=0x3F
pub fn is_attribute(byte: u8) -> bool {
    byte & 0xE0 == 0x20
}

/// Attribute bytes whose low three bits are all set hide the field contents
pub fn is_nondisplay(attribute: u8) -> bool {
    is_attribute(attribute) && attribute & 0x07 == 0x07
}

/// Record opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    NoOp,
    Invite,
    OutputOnly,
    PutGet,
    SaveScreen,
    RestoreScreen,
    ReadImmediate,
    ReadScreen,
    CancelInvite,
    MessageLightOn,
    MessageLightOff,
}

impl Opcode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            OP_NO_OP => Some(Self::NoOp),
            OP_INVITE => Some(Self::Invite),
            OP_OUTPUT_ONLY => Some(Self::OutputOnly),
            OP_PUT_GET => Some(Self::PutGet),
            OP_SAVE_SCREEN => Some(Self::SaveScreen),
            OP_RESTORE_SCREEN => Some(Self::RestoreScreen),
            OP_READ_IMMEDIATE => Some(Self::ReadImmediate),
            OP_READ_SCREEN => Some(Self::ReadScreen),
            OP_CANCEL_INVITE => Some(Self::CancelInvite),
            OP_MESSAGE_LIGHT_ON => Some(Self::MessageLightOn),
            OP_MESSAGE_LIGHT_OFF => Some(Self::MessageLightOff),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::NoOp => OP_NO_OP,
            Self::Invite => OP_INVITE,
            Self::OutputOnly => OP_OUTPUT_ONLY,
            Self::PutGet => OP_PUT_GET,
            Self::SaveScreen => OP_SAVE_SCREEN,
            Self::RestoreScreen => OP_RESTORE_SCREEN,
            Self::ReadImmediate => OP_READ_IMMEDIATE,
            Self::ReadScreen => OP_READ_SCREEN,
            Self::CancelInvite => OP_CANCEL_INVITE,
            Self::MessageLightOn => OP_MESSAGE_LIGHT_ON,
            Self::MessageLightOff => OP_MESSAGE_LIGHT_OFF,
        }
    }
}

/// Command following ESC in a record payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCode {
    ClearUnit = CMD_CLEAR_UNIT as isize,
    ClearUnitAlternate = CMD_CLEAR_UNIT_ALTERNATE as isize,
    ClearFormatTable = CMD_CLEAR_FORMAT_TABLE as isize,
    WriteToDisplay = CMD_WRITE_TO_DISPLAY as isize,
    WriteErrorCode = CMD_WRITE_ERROR_CODE as isize,
    WriteErrorCodeWindow = CMD_WRITE_ERROR_CODE_WINDOW as isize,
    ReadInputFields = CMD_READ_INPUT_FIELDS as isize,
    ReadMdtFields = CMD_READ_MDT_FIELDS as isize,
    ReadMdtFieldsAlt = CMD_READ_MDT_FIELDS_ALT as isize,
    ReadScreenImmediate = CMD_READ_SCREEN_IMMEDIATE as isize,
    ReadImmediate = CMD_READ_IMMEDIATE as isize,
    SaveScreen = CMD_SAVE_SCREEN as isize,
    SavePartialScreen = CMD_SAVE_PARTIAL_SCREEN as isize,
    RestoreScreen = CMD_RESTORE_SCREEN as isize,
    RestorePartialScreen = CMD_RESTORE_PARTIAL_SCREEN as isize,
    Roll = CMD_ROLL as isize,
    WriteStructuredField = CMD_WRITE_STRUCTURED_FIELD as isize,
}

impl CommandCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            CMD_CLEAR_UNIT => Some(Self::ClearUnit),
            CMD_CLEAR_UNIT_ALTERNATE => Some(Self::ClearUnitAlternate),
            CMD_CLEAR_FORMAT_TABLE => Some(Self::ClearFormatTable),
            CMD_WRITE_TO_DISPLAY => Some(Self::WriteToDisplay),
            CMD_WRITE_ERROR_CODE => Some(Self::WriteErrorCode),
            CMD_WRITE_ERROR_CODE_WINDOW => Some(Self::WriteErrorCodeWindow),
            CMD_READ_INPUT_FIELDS => Some(Self::ReadInputFields),
            CMD_READ_MDT_FIELDS => Some(Self::ReadMdtFields),
            CMD_READ_MDT_FIELDS_ALT => Some(Self::ReadMdtFieldsAlt),
            CMD_READ_SCREEN_IMMEDIATE => Some(Self::ReadScreenImmediate),
            CMD_READ_IMMEDIATE => Some(Self::ReadImmediate),
            CMD_SAVE_SCREEN => Some(Self::SaveScreen),
            CMD_SAVE_PARTIAL_SCREEN => Some(Self::SavePartialScreen),
            CMD_RESTORE_SCREEN => Some(Self::RestoreScreen),
            CMD_RESTORE_PARTIAL_SCREEN => Some(Self::RestorePartialScreen),
            CMD_ROLL => Some(Self::Roll),
            CMD_WRITE_STRUCTURED_FIELD => Some(Self::WriteStructuredField),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Commands that leave a read pending for the next AID
    pub fn is_read(self) -> bool {
        matches!(
            self,
            Self::ReadInputFields | Self::ReadMdtFields | Self::ReadMdtFieldsAlt
        )
    }
}

/// Order inside a Write To Display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderCode {
    StartOfHeader = SOH as isize,
    RepeatToAddress = RA as isize,
    EraseToAddress = EA as isize,
    TransparentData = TD as isize,
    SetBufferAddress = SBA as isize,
    WriteExtendedAttribute = WEA as isize,
    InsertCursor = IC as isize,
    MoveCursor = MC as isize,
    WriteDisplayStructuredField = WDSF as isize,
    StartOfField = SF as isize,
}

impl OrderCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            SOH => Some(Self::StartOfHeader),
            RA => Some(Self::RepeatToAddress),
            EA => Some(Self::EraseToAddress),
            TD => Some(Self::TransparentData),
            SBA => Some(Self::SetBufferAddress),
            WEA => Some(Self::WriteExtendedAttribute),
            IC => Some(Self::InsertCursor),
            MC => Some(Self::MoveCursor),
            WDSF => Some(Self::WriteDisplayStructuredField),
            SF => Some(Self::StartOfField),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Bytes a WTD writes as display characters rather than interpreting as orders
pub fn is_data_character(byte: u8) -> bool {
    byte >= 0x40 || matches!(byte, 0x00 | DUP | SO | SI)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_and_command_namespaces() {
        // 0x04 is Save Screen as an opcode but the ESC byte in a payload
        assert_eq!(Opcode::from_u8(0x04), Some(Opcode::SaveScreen));
        assert_eq!(CommandCode::from_u8(0x04), None);
        assert_eq!(Opcode::from_u8(0x07), None);
        assert_eq!(Opcode::PutGet.to_u8(), 3);
    }

    #[test]
    fn test_command_code_conversion() {
        assert_eq!(CommandCode::from_u8(CMD_WRITE_TO_DISPLAY), Some(CommandCode::WriteToDisplay));
        assert_eq!(CommandCode::WriteToDisplay.to_u8(), CMD_WRITE_TO_DISPLAY);
        assert_eq!(CommandCode::from_u8(0xFF), None);
        assert!(CommandCode::ReadMdtFieldsAlt.is_read());
        assert!(!CommandCode::ReadScreenImmediate.is_read());
    }

    #[test]
    fn test_order_code_conversion() {
        for order in [SOH, RA, EA, TD, SBA, WEA, IC, MC, WDSF, SF] {
            assert_eq!(OrderCode::from_u8(order).map(OrderCode::to_u8), Some(order));
        }
        assert_eq!(OrderCode::from_u8(0x07), None);
    }

    #[test]
    fn test_data_characters() {
        assert!(is_data_character(0x40));
        assert!(is_data_character(0x00));
        assert!(is_data_character(SO));
        assert!(!is_data_character(SBA));
        assert!(!is_data_character(0x07));
        assert!(is_attribute(0x20) && is_attribute(0x3F));
        assert!(!is_attribute(0x40));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(error_message(ERR_NO_FIELD), Some("Cursor in protected area of display."));
        assert_eq!(error_message(0x00FF), None);
        assert!(is_nondisplay(ATTR_NONDISPLAY));
        assert!(!is_nondisplay(ATTR_WHITE));
    }
}
