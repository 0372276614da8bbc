//! Keystroke encoding for 5250 input
//!
//! Keys arrive as text with bracketed mnemonics, e.g. `"QSECOFR[tab]pw[enter]"`.
//! Literal characters are typed into the field under the cursor; editing and
//! navigation keys act on a copy of the screen; an AID key ends the batch and
//! produces the inbound record the host is waiting for.

use log::debug;

use crate::error::EncodeError;
use crate::lib5250::codes::{
    AID_CLEAR, AID_ENTER, AID_F1, AID_F13, AID_HELP, AID_PRINT, AID_ROLL_DOWN, AID_ROLL_UP,
    FLAG_ATN, FLAG_SRQ,
};
use crate::lib5250::field::{Field, FillMode, ShiftEdit};
use crate::lib5250::protocol::{encode_frame, GdsRecord};
use crate::lib5250::{Opcode, Screen};
use crate::protocol_common::ebcdic::CodePage;

/// One key of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    /// F1 through F24
    Function(u8),
    Tab,
    Backtab,
    Backspace,
    Delete,
    Home,
    Left,
    Right,
    Up,
    Down,
    Newline,
    EraseEof,
    EraseField,
    FieldExit,
    FieldMinus,
    Insert,
    Reset,
    Clear,
    Help,
    RollDown,
    RollUp,
    Print,
    SysReq,
    Attn,
}

impl Key {
    /// Key for a mnemonic name, without brackets, any case
    pub fn from_mnemonic(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        let key = match name.as_str() {
            "enter" => Key::Enter,
            "tab" => Key::Tab,
            "backtab" => Key::Backtab,
            "backspace" => Key::Backspace,
            "delete" => Key::Delete,
            "home" => Key::Home,
            "left" => Key::Left,
            "right" => Key::Right,
            "up" => Key::Up,
            "down" => Key::Down,
            "newline" => Key::Newline,
            "eof" => Key::EraseEof,
            "erasefld" => Key::EraseField,
            "fieldexit" | "field+" => Key::FieldExit,
            "field-" => Key::FieldMinus,
            "insert" => Key::Insert,
            "reset" => Key::Reset,
            "clear" => Key::Clear,
            "help" => Key::Help,
            "pageup" | "pgup" | "rolldown" => Key::RollDown,
            "pagedown" | "pgdown" | "rollup" => Key::RollUp,
            "print" | "hostprint" => Key::Print,
            "sysreq" => Key::SysReq,
            "attn" => Key::Attn,
            other => {
                let number = other.strip_prefix("pf").or_else(|| other.strip_prefix('f'))?;
                match number.parse::<u8>() {
                    Ok(n @ 1..=24) => Key::Function(n),
                    _ => return None,
                }
            }
        };
        Some(key)
    }

    /// AID byte sent for this key, if it is an AID key
    pub fn aid(self) -> Option<u8> {
        match self {
            Key::Enter => Some(AID_ENTER),
            Key::Function(n @ 1..=12) => Some(AID_F1 + n - 1),
            Key::Function(n @ 13..=24) => Some(AID_F13 + n - 13),
            Key::Clear => Some(AID_CLEAR),
            Key::Help => Some(AID_HELP),
            Key::RollDown => Some(AID_ROLL_DOWN),
            Key::RollUp => Some(AID_ROLL_UP),
            Key::Print => Some(AID_PRINT),
            _ => None,
        }
    }

    /// Whether the AID carries field data
    fn sends_fields(self) -> bool {
        !matches!(self, Key::Clear | Key::Help | Key::Print | Key::RollDown | Key::RollUp)
    }

    /// Keys after which nothing else may be typed in the same batch
    pub fn ends_batch(self) -> bool {
        self.aid().is_some() || matches!(self, Key::SysReq | Key::Attn)
    }
}

/// Split a key string into keys, each with the byte offset just past it.
/// `[[` and `]]` are literal brackets.
pub fn parse_keys(keys: &str) -> Result<Vec<(Key, usize)>, EncodeError> {
    let mut parsed = Vec::new();
    let mut chars = keys.char_indices().peekable();

    while let Some((position, ch)) = chars.next() {
        match ch {
            '[' if matches!(chars.peek(), Some((_, '['))) => {
                chars.next();
                parsed.push((Key::Char('['), position + 2));
            }
            ']' if matches!(chars.peek(), Some((_, ']'))) => {
                chars.next();
                parsed.push((Key::Char(']'), position + 2));
            }
            '[' => {
                let close = keys[position..]
                    .find(']')
                    .map(|i| position + i)
                    .ok_or(EncodeError::UnterminatedMnemonic { position })?;
                let mnemonic = &keys[position + 1..close];
                let key = Key::from_mnemonic(mnemonic).ok_or_else(|| EncodeError::UnknownMnemonic {
                    mnemonic: mnemonic.to_string(),
                })?;
                while matches!(chars.peek(), Some(&(i, _)) if i <= close) {
                    chars.next();
                }
                parsed.push((key, close + 1));
            }
            other => parsed.push((Key::Char(other), position + other.len_utf8())),
        }
    }
    Ok(parsed)
}

/// Result of a key batch. Nothing is applied to the live session until the
/// caller takes `screen` and sends `record`.
#[derive(Debug, Clone)]
pub struct EncodedKeys {
    /// Screen after local editing
    pub screen: Screen,
    pub insert_mode: bool,
    /// `[reset]` was pressed
    pub reset: bool,
    /// AID of the key that ended the batch
    pub aid: Option<u8>,
    /// Inbound record for the host
    pub record: Option<GdsRecord>,
}

impl EncodedKeys {
    /// Wire bytes of the record, IAC EOR included
    pub fn to_bytes(&self) -> Result<Option<Vec<u8>>, EncodeError> {
        self.record.as_ref().map(encode_frame).transpose()
    }

    /// An AID hands the keyboard to the host until it answers
    pub fn locks_keyboard(&self) -> bool {
        self.aid.is_some()
    }
}

/// Encodes keys against a screen using one codepage
#[derive(Debug, Clone, Copy)]
pub struct KeystrokeEncoder {
    page: &'static CodePage,
}

impl KeystrokeEncoder {
    pub fn new(page: &'static CodePage) -> Self {
        Self { page }
    }

    pub fn codepage(&self) -> &'static CodePage {
        self.page
    }

    /// Apply `keys` to a copy of `screen`. Any error rejects the whole batch.
    pub fn encode(&self, keys: &str, screen: &Screen, insert_mode: bool) -> Result<EncodedKeys, EncodeError> {
        let parsed = parse_keys(keys)?;
        let mut result = EncodedKeys {
            screen: screen.clone(),
            insert_mode,
            reset: false,
            aid: None,
            record: None,
        };

        let mut i = 0;
        while i < parsed.len() {
            let (key, end) = parsed[i];
            if let Key::Char(_) = key {
                let run_len = parsed[i..].iter().take_while(|(k, _)| matches!(k, Key::Char(_))).count();
                let text: Vec<char> = parsed[i..i + run_len]
                    .iter()
                    .filter_map(|(k, _)| match k {
                        Key::Char(c) => Some(*c),
                        _ => None,
                    })
                    .collect();
                let run_end = parsed[i + run_len - 1].1;
                i += run_len;
                if self.type_text(&mut result.screen, &text, result.insert_mode)? {
                    debug!("auto-enter field filled");
                    self.finish(&mut result, Key::Enter);
                    check_trailing(keys, run_end)?;
                    return Ok(result);
                }
                continue;
            }

            i += 1;
            let cols = result.screen.cols() as isize;
            match key {
                Key::Tab => tab(&mut result.screen),
                Key::Backtab => backtab(&mut result.screen),
                Key::Home => result.screen.set_cursor_home(),
                Key::Left => step_cursor(&mut result.screen, -1),
                Key::Right => step_cursor(&mut result.screen, 1),
                Key::Up => step_cursor(&mut result.screen, -cols),
                Key::Down => step_cursor(&mut result.screen, cols),
                Key::Newline => newline(&mut result.screen),
                Key::Backspace => backspace(&mut result.screen)?,
                Key::Delete => delete(&mut result.screen)?,
                Key::EraseEof => erase_eof(&mut result.screen)?,
                Key::EraseField => erase_field(&mut result.screen)?,
                Key::FieldExit => field_exit(&mut result.screen, false)?,
                Key::FieldMinus => field_exit(&mut result.screen, true)?,
                Key::Insert => result.insert_mode = !result.insert_mode,
                Key::Reset => {
                    result.reset = true;
                    result.insert_mode = false;
                }
                key if key.ends_batch() => {
                    self.finish(&mut result, key);
                    check_trailing(keys, end)?;
                    return Ok(result);
                }
                _ => {}
            }
        }
        Ok(result)
    }

    /// Build the record for an AID, SysReq or Attn key
    fn finish(&self, result: &mut EncodedKeys, key: Key) {
        let screen = &mut result.screen;
        let record = match key {
            Key::SysReq => GdsRecord::new_with_flags(Opcode::NoOp, FLAG_SRQ, Vec::new()),
            Key::Attn => GdsRecord::new_with_flags(Opcode::NoOp, FLAG_ATN, Vec::new()),
            _ => {
                let Some(aid) = key.aid() else { return };
                let payload = screen.read_payload(aid, screen.pending_read(), key.sends_fields());
                screen.set_pending_read(None);
                result.aid = Some(aid);
                GdsRecord::new(Opcode::PutGet, payload)
            }
        };
        debug!("encoded {:?}: {} byte record", key, record.length);
        result.record = Some(record);
    }

    /// Type a run of literal characters at the cursor. Returns true when an
    /// auto-enter field was filled.
    fn type_text(&self, screen: &mut Screen, text: &[char], insert: bool) -> Result<bool, EncodeError> {
        let field = input_field(screen)?;
        let cols = screen.cols();
        let address = screen.cursor_address();
        let end = field.end_address(cols);

        let room = if insert {
            (address..end).rev().take_while(|&a| char_at(screen, a) == 0x00).count()
        } else {
            end - address
        };
        if text.len() > room {
            let (row, col) = screen.position(address);
            return Err(EncodeError::FieldOverflow {
                row: row + 1,
                col: col + 1,
                remaining: room,
                requested: text.len(),
            });
        }

        let mut bytes = Vec::with_capacity(text.len());
        for &ch in text {
            field
                .accepts(ch)
                .map_err(|reason| EncodeError::InvalidCharacter { ch, reason })?;
            let ch = if field.monocase { ch.to_uppercase().next().unwrap_or(ch) } else { ch };
            let byte = self.page.to_ebcdic(ch)?;
            if byte < 0x40 {
                return Err(EncodeError::InvalidCharacter { ch, reason: "not a display character" });
            }
            bytes.push(byte);
        }

        if insert {
            for a in (address..end - bytes.len()).rev() {
                let byte = char_at(screen, a);
                put(screen, a + bytes.len(), byte);
            }
        }
        for (offset, &byte) in bytes.iter().enumerate() {
            put(screen, address + offset, byte);
        }
        mark_modified(screen, &field);

        let next = address + bytes.len();
        if next < end {
            screen.set_cursor_address(next);
            return Ok(false);
        }
        if field.auto_enter() {
            return Ok(true);
        }
        if field.field_exit_required() {
            screen.set_cursor_address(end - 1);
        } else {
            advance_to_next_field(screen, end - 1);
        }
        Ok(false)
    }
}

impl Default for KeystrokeEncoder {
    fn default() -> Self {
        Self::new(crate::protocol_common::default_page())
    }
}

/// Encode with the default encoder
pub fn encode(keys: &str, screen: &Screen) -> Result<EncodedKeys, EncodeError> {
    KeystrokeEncoder::default().encode(keys, screen, false)
}

fn check_trailing(keys: &str, end: usize) -> Result<(), EncodeError> {
    if end < keys.len() {
        return Err(EncodeError::InputAfterAid { remaining: keys[end..].to_string() });
    }
    Ok(())
}

fn char_at(screen: &Screen, address: usize) -> u8 {
    screen.cell_at(address).map_or(0x00, |c| c.char)
}

fn put(screen: &mut Screen, address: usize, byte: u8) {
    let attribute = screen.cell_at(address).map_or(0x20, |c| c.attribute);
    screen.put_char(address, byte, attribute);
}

fn mark_modified(screen: &mut Screen, field: &Field) {
    let cols = screen.cols();
    if let Some(live) = screen.fields_mut().field_at_mut(field.start_address(cols), cols) {
        live.set_modified(true);
    }
}

/// Input field under the cursor
fn input_field(screen: &Screen) -> Result<Field, EncodeError> {
    match screen.current_field() {
        Some(field) if field.is_input() => Ok(field.clone()),
        _ => {
            let cursor = screen.cursor();
            Err(EncodeError::ProtectedPosition { row: cursor.row + 1, col: cursor.col + 1 })
        }
    }
}

fn advance_to_next_field(screen: &mut Screen, address: usize) {
    let cols = screen.cols();
    match screen.fields().next_input(address, cols).map(|f| f.start_address(cols)) {
        Some(start) => screen.set_cursor_address(start),
        None => screen.set_cursor_home(),
    }
}

fn tab(screen: &mut Screen) {
    let address = screen.cursor_address();
    advance_to_next_field(screen, address);
}

fn backtab(screen: &mut Screen) {
    let cols = screen.cols();
    let address = screen.cursor_address();
    if let Some(start) = screen.fields().previous_input(address, cols).map(|f| f.start_address(cols)) {
        screen.set_cursor_address(start);
    }
}

/// Move by `delta` positions, wrapping around the buffer
fn step_cursor(screen: &mut Screen, delta: isize) {
    let len = screen.len() as isize;
    let address = (screen.cursor_address() as isize + delta).rem_euclid(len);
    screen.set_cursor_address(address as usize);
}

/// First input field on a later row, wrapping to the first one
fn newline(screen: &mut Screen) {
    let row = screen.cursor().row;
    let target = screen
        .fields()
        .iter()
        .find(|f| f.is_input() && f.start_row > row)
        .or_else(|| screen.fields().first_input())
        .map(|f| (f.start_row, f.start_col));
    match target {
        Some((row, col)) => screen.set_cursor(row, col),
        None => screen.set_cursor((row + 1) % screen.rows(), 0),
    }
}

/// Cursor left within the field
fn backspace(screen: &mut Screen) -> Result<(), EncodeError> {
    let field = input_field(screen)?;
    let address = screen.cursor_address();
    if address > field.start_address(screen.cols()) {
        screen.set_cursor_address(address - 1);
    }
    Ok(())
}

/// Remove the character at the cursor, shifting the rest of the field left
fn delete(screen: &mut Screen) -> Result<(), EncodeError> {
    let field = input_field(screen)?;
    let address = screen.cursor_address();
    let end = field.end_address(screen.cols());
    for a in address..end - 1 {
        let byte = char_at(screen, a + 1);
        put(screen, a, byte);
    }
    put(screen, end - 1, 0x00);
    mark_modified(screen, &field);
    Ok(())
}

fn erase_eof(screen: &mut Screen) -> Result<(), EncodeError> {
    let field = input_field(screen)?;
    let address = screen.cursor_address();
    screen.null_range(address, field.end_address(screen.cols()));
    mark_modified(screen, &field);
    Ok(())
}

fn erase_field(screen: &mut Screen) -> Result<(), EncodeError> {
    let field = input_field(screen)?;
    let cols = screen.cols();
    screen.null_range(field.start_address(cols), field.end_address(cols));
    screen.set_cursor_address(field.start_address(cols));
    mark_modified(screen, &field);
    Ok(())
}

/// Field Exit (`negative == false`) or Field Minus: erase to the end of the
/// field, apply right adjust and sign rules, move to the next input field
fn field_exit(screen: &mut Screen, negative: bool) -> Result<(), EncodeError> {
    let field = input_field(screen)?;
    let cols = screen.cols();
    let start = field.start_address(cols);
    let end = field.end_address(cols);
    let signed = field.shift_edit() == Some(ShiftEdit::SignedNumeric);
    let numeric = field.shift_edit() == Some(ShiftEdit::NumericOnly);
    if negative && !signed && !numeric {
        return Err(EncodeError::InvalidCharacter { ch: '-', reason: "Field- not valid in this field" });
    }

    screen.null_range(screen.cursor_address(), end);

    let width = if signed { field.length - 1 } else { field.length };
    let mut data = screen.field_data(&field);
    data.truncate(width);
    while data.last() == Some(&0x00) {
        data.pop();
    }

    if negative && numeric {
        match data.last_mut() {
            Some(last) if (0xF0..=0xF9).contains(last) => *last = (*last & 0x0F) | 0xD0,
            _ => {
                return Err(EncodeError::InvalidCharacter { ch: '-', reason: "Field- needs a digit to sign" });
            }
        }
    }

    let fill = match field.fill() {
        FillMode::RightAdjustZeroFill => Some(0xF0),
        FillMode::RightAdjustBlankFill => Some(0x40),
        _ if signed => Some(0x40),
        _ => None,
    };
    if let Some(fill) = fill {
        let pad = width - data.len();
        for offset in 0..width {
            let byte = if offset < pad { fill } else { data[offset - pad] };
            put(screen, start + offset, byte);
        }
    } else if negative {
        for (offset, &byte) in data.iter().enumerate() {
            put(screen, start + offset, byte);
        }
    }
    if signed {
        put(screen, end - 1, if negative { 0x60 } else { 0x40 });
    }

    mark_modified(screen, &field);
    advance_to_next_field(screen, end - 1);
    Ok(())
}
