//! 5250 data stream interpreter
//!
//! Applies the commands and orders of host records to a [`Screen`] and its
//! [`OiaState`]. Records that need an answer (Query, Read Screen, Save
//! Screen, Read Immediate, Cancel Invite) queue a response which the
//! session drains with [`StreamDecoder::take_responses`].
//!
//! A failing command aborts the rest of its record. Everything applied
//! before the failure stays applied; the connection carries on.

use log::{debug, trace, warn};

use super::codes::{
    self, CommandCode, Opcode, OrderCode, ATTR_NORMAL, ESC, SF_5250_QUERY,
    SF_5250_QUERY_STATION_STATE, SF_CLASS_5250,
};
use super::display::{ExtendedAttr, Screen, DEFAULT_COLS, DEFAULT_ROWS, WIDE_COLS, WIDE_ROWS};
use super::field::{Field, FieldFormat};
use super::oia::{InhibitReason, OiaState};
use super::protocol::GdsRecord;
use super::query::QueryReply;
use crate::error::{DecodeError, DecodeResult};
use crate::protocol_common::ebcdic::{default_page, CodePage};

const MAX_HEADER_LEN: usize = 7;

/// Cursor over a record payload
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_done(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn get_byte(&mut self) -> DecodeResult<u8> {
        let byte = self.peek().ok_or(DecodeError::TruncatedRecord {
            expected: self.pos + 1,
            available: self.data.len(),
        })?;
        self.pos += 1;
        Ok(byte)
    }

    fn get_u16(&mut self) -> DecodeResult<u16> {
        Ok(u16::from_be_bytes([self.get_byte()?, self.get_byte()?]))
    }

    fn take(&mut self, count: usize) -> DecodeResult<&'a [u8]> {
        let end = self.pos + count;
        if end > self.data.len() {
            return Err(DecodeError::TruncatedRecord { expected: end, available: self.data.len() });
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

/// Write state of one Write To Display
struct WriteState {
    address: usize,
    attribute: u8,
    insert_cursor: Option<usize>,
}

/// Applies host records to the screen model
#[derive(Debug, Clone)]
pub struct StreamDecoder {
    query_reply: QueryReply,
    codepage: &'static CodePage,
    /// Size restored by Clear Unit
    default_size: (usize, usize),
    responses: Vec<GdsRecord>,
}

impl StreamDecoder {
    pub fn new(query_reply: QueryReply, codepage: &'static CodePage) -> Self {
        Self {
            query_reply,
            codepage,
            default_size: (DEFAULT_ROWS, DEFAULT_COLS),
            responses: Vec::new(),
        }
    }

    pub fn query_reply(&self) -> &QueryReply {
        &self.query_reply
    }

    /// Response records queued since the last call
    pub fn take_responses(&mut self) -> Vec<GdsRecord> {
        std::mem::take(&mut self.responses)
    }

    /// Apply the header flags, then the opcode, then the payload commands
    pub fn apply_record(
        &mut self,
        record: &GdsRecord,
        screen: &mut Screen,
        oia: &mut OiaState,
    ) -> DecodeResult<()> {
        oia.apply_record_flags(record.flags);

        let opcode = record.opcode().ok_or_else(|| DecodeError::InvalidHeader {
            reason: format!("unknown opcode 0x{:02X}", record.opcode),
        })?;
        trace!("record opcode {:?}, {} payload bytes", opcode, record.payload.len());

        match opcode {
            Opcode::NoOp => Ok(()),
            Opcode::Invite | Opcode::OutputOnly | Opcode::PutGet | Opcode::RestoreScreen => {
                self.apply(&record.payload, screen, oia)
            }
            Opcode::SaveScreen => {
                self.save_screen(screen, oia);
                self.apply(&record.payload, screen, oia)
            }
            Opcode::ReadImmediate => {
                self.read_immediate(screen);
                Ok(())
            }
            Opcode::ReadScreen => {
                self.read_screen(screen);
                Ok(())
            }
            Opcode::CancelInvite => {
                self.responses.push(GdsRecord::new(Opcode::CancelInvite, Vec::new()));
                Ok(())
            }
            Opcode::MessageLightOn => {
                oia.message_waiting = true;
                Ok(())
            }
            Opcode::MessageLightOff => {
                oia.message_waiting = false;
                Ok(())
            }
        }
    }

    /// Apply a payload of ESC-prefixed commands
    pub fn apply(&mut self, payload: &[u8], screen: &mut Screen, oia: &mut OiaState) -> DecodeResult<()> {
        let mut reader = Reader::new(payload);
        while !reader.is_done() {
            let byte = reader.get_byte()?;
            if byte != ESC {
                warn!("expected ESC at offset {}, found 0x{:02X}", reader.pos - 1, byte);
                return Err(DecodeError::UnsupportedCommand { command: byte });
            }
            let command = reader.get_byte()?;
            self.process_command(command, &mut reader, screen, oia)?;
        }
        Ok(())
    }

    fn process_command(
        &mut self,
        command: u8,
        reader: &mut Reader<'_>,
        screen: &mut Screen,
        oia: &mut OiaState,
    ) -> DecodeResult<()> {
        let Some(code) = CommandCode::from_u8(command) else {
            warn!("unsupported command 0x{:02X}", command);
            return Err(DecodeError::UnsupportedCommand { command });
        };
        debug!("command {:?}", code);

        match code {
            CommandCode::ClearUnit => {
                let (rows, cols) = self.default_size;
                screen.clear_unit(rows, cols);
                oia.clear_unit();
            }
            CommandCode::ClearUnitAlternate => {
                let parameter = reader.get_byte()?;
                match parameter {
                    0x00 => screen.clear_unit(WIDE_ROWS, WIDE_COLS),
                    0x80 => screen.clear_unit(screen.rows(), screen.cols()),
                    other => {
                        warn!("clear unit alternate parameter 0x{:02X}", other);
                        return Err(DecodeError::UnsupportedCommand { command });
                    }
                }
                oia.clear_unit();
            }
            CommandCode::ClearFormatTable => {
                screen.clear_format_table();
                oia.lock(InhibitReason::SystemWait);
            }
            CommandCode::WriteToDisplay => self.write_to_display(reader, screen, oia)?,
            CommandCode::WriteErrorCode => self.write_error_code(reader, screen, oia, false)?,
            CommandCode::WriteErrorCodeWindow => self.write_error_code(reader, screen, oia, true)?,
            CommandCode::ReadInputFields | CommandCode::ReadMdtFields | CommandCode::ReadMdtFieldsAlt => {
                self.read_command(code, reader, screen, oia)?
            }
            CommandCode::ReadScreenImmediate => self.read_screen(screen),
            CommandCode::ReadImmediate => self.read_immediate(screen),
            CommandCode::SaveScreen | CommandCode::SavePartialScreen => self.save_screen(screen, oia),
            // The restore data that follows is an ordinary stream of commands
            CommandCode::RestoreScreen | CommandCode::RestorePartialScreen => {}
            CommandCode::Roll => self.roll(reader, screen)?,
            CommandCode::WriteStructuredField => self.write_structured_field(reader)?,
        }
        Ok(())
    }

    fn write_to_display(
        &mut self,
        reader: &mut Reader<'_>,
        screen: &mut Screen,
        oia: &mut OiaState,
    ) -> DecodeResult<()> {
        let cc1 = reader.get_byte()?;
        let cc2 = reader.get_byte()?;
        self.handle_cc1(cc1, screen, oia);

        let mut state = WriteState {
            address: screen.cursor_address(),
            attribute: ATTR_NORMAL,
            insert_cursor: None,
        };

        while let Some(byte) = reader.peek() {
            if byte == ESC {
                break;
            }
            let offset = reader.pos;
            reader.get_byte()?;

            match OrderCode::from_u8(byte) {
                Some(OrderCode::StartOfHeader) => self.start_of_header(reader, screen, oia)?,
                Some(OrderCode::RepeatToAddress) => self.repeat_to_address(reader, screen, &mut state)?,
                Some(OrderCode::EraseToAddress) => self.erase_to_address(reader, screen, &mut state)?,
                Some(OrderCode::TransparentData) => {
                    let length = reader.get_u16()? as usize;
                    for &data in reader.take(length)? {
                        self.add_char(data, screen, &mut state)?;
                    }
                }
                Some(OrderCode::SetBufferAddress) => {
                    state.address = read_address(reader, screen, "SBA")?;
                }
                Some(OrderCode::WriteExtendedAttribute) => {
                    let kind = reader.get_byte()?;
                    let value = reader.get_byte()?;
                    screen.set_extended(state.address, ExtendedAttr { kind, value });
                }
                Some(OrderCode::InsertCursor) => {
                    state.insert_cursor = Some(read_address(reader, screen, "IC")?);
                }
                Some(OrderCode::MoveCursor) => {
                    let address = read_address(reader, screen, "MC")?;
                    screen.set_cursor_address(address);
                    state.insert_cursor = Some(address);
                }
                Some(OrderCode::WriteDisplayStructuredField) => {
                    let length = reader.get_u16()? as usize;
                    let body = reader.take(length.saturating_sub(2))?;
                    debug!(
                        "skipping display structured field of {} bytes (type {:02X?})",
                        length,
                        body.get(1)
                    );
                }
                Some(OrderCode::StartOfField) => self.start_of_field(reader, screen, &mut state)?,
                None if codes::is_attribute(byte) => {
                    check_in_buffer(state.address, screen)?;
                    screen.put_attribute(state.address, byte);
                    state.attribute = byte;
                    state.address += 1;
                }
                None if codes::is_data_character(byte) => self.add_char(byte, screen, &mut state)?,
                None => {
                    warn!("unknown order 0x{:02X} at offset {}", byte, offset);
                    return Err(DecodeError::UnknownOrder { order: byte, offset });
                }
            }
        }

        match state.insert_cursor {
            Some(address) => screen.set_cursor_address(address),
            None => screen.set_cursor_home(),
        }
        self.handle_cc2(cc2, oia);
        Ok(())
    }

    fn add_char(&self, byte: u8, screen: &mut Screen, state: &mut WriteState) -> DecodeResult<()> {
        check_in_buffer(state.address, screen)?;
        screen.put_char(state.address, byte, state.attribute);
        state.address += 1;
        Ok(())
    }

    /// Lock, then reset MDT and null fields as CC1 asks
    fn handle_cc1(&self, cc1: u8, screen: &mut Screen, oia: &mut OiaState) {
        let action = cc1 & 0xE0;
        if action == 0 {
            return;
        }
        oia.lock(InhibitReason::SystemWait);

        let (null_all, null_modified) = match action {
            0x80 | 0xC0 => (false, true),
            0xA0 | 0xE0 => (true, false),
            _ => (false, false),
        };
        let (reset_bypass_too, reset) = match action {
            0x40 | 0xA0 | 0xC0 => (false, true),
            0x60 | 0xE0 => (true, true),
            _ => (false, false),
        };

        let cols = screen.cols();
        let mut to_null = Vec::new();
        for field in screen.fields().iter().filter(|f| !f.is_bypass()) {
            if null_all || (null_modified && field.modified) {
                to_null.push((field.start_address(cols), field.end_address(cols)));
            }
        }
        for (start, end) in to_null {
            screen.null_range(start, end);
        }
        if reset {
            for field in screen.fields_mut().iter_mut() {
                if reset_bypass_too || !field.is_bypass() {
                    field.set_modified(false);
                }
            }
        }
    }

    /// Indicators first, then the unlock. Blink and cursor-move bits have
    /// no model state.
    fn handle_cc2(&self, cc2: u8, oia: &mut OiaState) {
        if cc2 & codes::CC2_ALARM != 0 {
            oia.alarm = true;
        }
        if cc2 & codes::CC2_MESSAGE_ON != 0 {
            oia.message_waiting = true;
        }
        if cc2 & codes::CC2_MESSAGE_OFF != 0 {
            oia.message_waiting = false;
        }
        if cc2 & (codes::CC2_SET_BLINK | codes::CC2_RESET_BLINK | codes::CC2_CURSOR_MOVES_ON_UNLOCK) != 0 {
            trace!("cc2 0x{:02X}: blink and cursor bits ignored", cc2);
        }
        if cc2 & codes::CC2_UNLOCK != 0 {
            oia.unlock();
        }
    }

    fn start_of_header(&self, reader: &mut Reader<'_>, screen: &mut Screen, oia: &mut OiaState) -> DecodeResult<()> {
        let length = reader.get_byte()? as usize;
        if length > MAX_HEADER_LEN {
            warn!("start of header length {}", length);
            return Err(DecodeError::InvalidHeader {
                reason: format!("start of header length {length} exceeds {MAX_HEADER_LEN}"),
            });
        }
        let header = reader.take(length)?;
        trace!("start of header {:02X?}", header);
        screen.clear_format_table();
        oia.lock(InhibitReason::SystemWait);
        Ok(())
    }

    fn repeat_to_address(&self, reader: &mut Reader<'_>, screen: &mut Screen, state: &mut WriteState) -> DecodeResult<()> {
        let target = read_address(reader, screen, "RA")?;
        let byte = reader.get_byte()?;
        if target < state.address {
            let (row, col) = screen.position(target);
            return Err(DecodeError::InvalidField {
                row: row + 1,
                col: col + 1,
                reason: "repeat to address before the current address".to_string(),
            });
        }
        for address in state.address..=target {
            screen.put_char(address, byte, state.attribute);
        }
        state.address = target + 1;
        Ok(())
    }

    fn erase_to_address(&self, reader: &mut Reader<'_>, screen: &mut Screen, state: &mut WriteState) -> DecodeResult<()> {
        let target = read_address(reader, screen, "EA")?;
        let length = reader.get_byte()? as usize;
        let (row, col) = screen.position(target);
        if !(2..=5).contains(&length) {
            return Err(DecodeError::InvalidField {
                row: row + 1,
                col: col + 1,
                reason: format!("erase to address length {length} outside 2..=5"),
            });
        }
        let types = reader.take(length - 1)?;
        trace!("erase to address, attribute types {:02X?}", types);
        if target < state.address {
            return Err(DecodeError::InvalidField {
                row: row + 1,
                col: col + 1,
                reason: "erase to address before the current address".to_string(),
            });
        }
        screen.erase(state.address, target);
        state.address = target + 1;
        Ok(())
    }

    fn start_of_field(&self, reader: &mut Reader<'_>, screen: &mut Screen, state: &mut WriteState) -> DecodeResult<()> {
        let first = reader.get_byte()?;
        let (format_word, control_words, attribute) = if codes::is_attribute(first) {
            (None, Vec::new(), first)
        } else {
            let format_word = FieldFormat::from_bytes(first, reader.get_byte()?);
            let mut control_words = Vec::new();
            let attribute = loop {
                let byte = reader.get_byte()?;
                if codes::is_attribute(byte) {
                    break byte;
                }
                control_words.push(u16::from_be_bytes([byte, reader.get_byte()?]));
            };
            (Some(format_word), control_words, attribute)
        };
        let length = reader.get_u16()? as usize;

        check_in_buffer(state.address, screen)?;
        screen.put_attribute(state.address, attribute);
        let start = state.address + 1;
        if start >= screen.len() {
            let (row, col) = screen.position(state.address);
            return Err(DecodeError::InvalidField {
                row: row + 1,
                col: col + 1,
                reason: "field attribute in the last display position".to_string(),
            });
        }

        let (row, col) = screen.position(start);
        let field = Field::new(row, col, length, format_word, control_words, attribute);
        let (rows, cols) = screen.size();
        screen.fields_mut().define(field, rows, cols)?;
        screen.set_attribute_range(start, start + length, attribute);
        trace!("field at {},{} length {} attribute {:02X}", row + 1, col + 1, length, attribute);

        state.attribute = attribute;
        state.address = start;
        Ok(())
    }

    fn write_error_code(
        &self,
        reader: &mut Reader<'_>,
        screen: &mut Screen,
        oia: &mut OiaState,
        window: bool,
    ) -> DecodeResult<()> {
        if window {
            let start = reader.get_byte()? as usize;
            let end = reader.get_byte()? as usize;
            if start == 0 || start > screen.rows() || end == 0 || end > screen.cols() {
                return Err(DecodeError::InvalidField {
                    row: start,
                    col: end,
                    reason: "error window outside the display".to_string(),
                });
            }
        }

        let error_row = screen.rows() - 1;
        let mut address = screen.address(error_row, 0);
        let row_end = address + screen.cols();
        let mut attribute = ATTR_NORMAL;
        let mut text = String::new();

        while let Some(byte) = reader.peek() {
            if byte == ESC {
                break;
            }
            reader.get_byte()?;
            if byte == codes::IC {
                let cursor = read_address(reader, screen, "IC")?;
                screen.set_cursor_address(cursor);
                continue;
            }
            if codes::is_attribute(byte) {
                attribute = byte;
                if address < row_end {
                    screen.put_attribute(address, byte);
                }
                text.push(' ');
            } else {
                if address < row_end {
                    screen.put_char(address, byte, attribute);
                }
                text.push(self.message_char(byte));
            }
            address += 1;
        }

        let message = text.trim().to_string();
        debug!("error line: {}", message);
        oia.set_message(message);
        Ok(())
    }

    /// Error line text for one byte. The cell keeps the raw byte whatever
    /// this returns.
    fn message_char(&self, byte: u8) -> char {
        if byte < 0x40 {
            return ' ';
        }
        match self.codepage.to_unicode(byte) {
            Ok(ch) => ch,
            Err(e) => {
                warn!("error line: {}", e);
                ' '
            }
        }
    }

    fn read_command(
        &self,
        code: CommandCode,
        reader: &mut Reader<'_>,
        screen: &mut Screen,
        oia: &mut OiaState,
    ) -> DecodeResult<()> {
        let cc1 = reader.get_byte()?;
        let cc2 = reader.get_byte()?;
        self.handle_cc1(cc1, screen, oia);
        screen.set_pending_read(Some(code));
        oia.unlock();
        self.handle_cc2(cc2, oia);
        Ok(())
    }

    fn read_screen(&mut self, screen: &Screen) {
        self.responses.push(GdsRecord::new(Opcode::NoOp, screen.buffer_bytes()));
    }

    fn read_immediate(&mut self, screen: &Screen) {
        let payload = screen.read_payload(0x00, Some(CommandCode::ReadInputFields), true);
        self.responses.push(GdsRecord::new(Opcode::PutGet, payload));
    }

    fn save_screen(&mut self, screen: &Screen, oia: &OiaState) {
        let stream = screen.to_restore_stream(!oia.keyboard_locked);
        debug!("saving screen as {} byte restore stream", stream.len());
        self.responses.push(GdsRecord::new(Opcode::NoOp, stream));
    }

    fn roll(&self, reader: &mut Reader<'_>, screen: &mut Screen) -> DecodeResult<()> {
        let direction = reader.get_byte()?;
        let top = reader.get_byte()? as usize;
        let bottom = reader.get_byte()? as usize;
        for row in [top, bottom] {
            if row == 0 || row > screen.rows() {
                return Err(DecodeError::InvalidField {
                    row,
                    col: 1,
                    reason: "roll row outside the display".to_string(),
                });
            }
        }
        if top > bottom {
            return Err(DecodeError::InvalidField {
                row: top,
                col: 1,
                reason: format!("roll top row {top} below bottom row {bottom}"),
            });
        }
        let lines = (direction & 0x1F) as isize;
        let lines = if direction & 0x80 != 0 { lines } else { -lines };
        screen.roll(top - 1, bottom - 1, lines);
        Ok(())
    }

    fn write_structured_field(&mut self, reader: &mut Reader<'_>) -> DecodeResult<()> {
        while let Some(byte) = reader.peek() {
            if byte == ESC {
                break;
            }
            let length = reader.get_u16()? as usize;
            if length < 4 {
                return Err(DecodeError::InvalidHeader {
                    reason: format!("structured field length {length} is shorter than its header"),
                });
            }
            let body = reader.take(length - 2)?;
            let (class, kind) = (body[0], body[1]);

            if class == SF_CLASS_5250 && (kind == SF_5250_QUERY || kind == SF_5250_QUERY_STATION_STATE) {
                debug!("answering 5250 query (type 0x{:02X})", kind);
                self.responses
                    .push(GdsRecord::new(Opcode::NoOp, self.query_reply.to_response_payload()));
            } else {
                debug!("skipping structured field class 0x{:02X} type 0x{:02X}", class, kind);
            }
        }
        Ok(())
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new(QueryReply::default(), default_page())
    }
}

/// Row and column bytes of an order, 1-based, as a buffer address
fn read_address(reader: &mut Reader<'_>, screen: &Screen, order: &str) -> DecodeResult<usize> {
    let row = reader.get_byte()? as usize;
    let col = reader.get_byte()? as usize;
    if row == 0 || col == 0 || row > screen.rows() || col > screen.cols() {
        warn!("{} to row {} col {} outside {}x{}", order, row, col, screen.rows(), screen.cols());
        return Err(DecodeError::InvalidField {
            row,
            col,
            reason: format!("{order} address outside the {}x{} display", screen.rows(), screen.cols()),
        });
    }
    Ok(screen.address(row - 1, col - 1))
}

fn check_in_buffer(address: usize, screen: &Screen) -> DecodeResult<()> {
    if address < screen.len() {
        return Ok(());
    }
    Err(DecodeError::InvalidField {
        row: screen.rows() + 1,
        col: 1,
        reason: "write past the end of the display".to_string(),
    })
}
