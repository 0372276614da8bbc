//! Field definitions and the format table
//!
//! A field is created by a Start Field order. Input fields carry a Field
//! Format Word (FFW) and optional Field Control Words (FCW); output-only
//! fields have just an attribute. Addresses are zero-based `row * cols + col`
//! offsets into the display buffer.

use serde::Serialize;

use crate::error::{DecodeError, DecodeResult};

/// Field Format Word bits (MSB-0 numbering over the 16-bit word)
pub const FFW_ID_MASK: u16 = 0xC000;
pub const FFW_ID: u16 = 0x4000;
pub const FFW_BYPASS: u16 = 0x2000;
pub const FFW_DUP_ENABLE: u16 = 0x1000;
pub const FFW_MDT: u16 = 0x0800;
pub const FFW_SHIFT_MASK: u16 = 0x0700;
pub const FFW_AUTO_ENTER: u16 = 0x0080;
pub const FFW_FIELD_EXIT_REQUIRED: u16 = 0x0040;
pub const FFW_MONOCASE: u16 = 0x0020;
pub const FFW_MANDATORY_ENTER: u16 = 0x0008;
pub const FFW_FILL_MASK: u16 = 0x0007;

/// FCW marking a continued (multi-line) field
pub const FCW_CONTINUED: u8 = 0x86;
/// FCW carrying a cursor progression entry
pub const FCW_CURSOR_PROGRESSION: u8 = 0x88;

/// Shift/edit specification, FFW bits 5-7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShiftEdit {
    AlphaShift,
    AlphaOnly,
    NumericShift,
    NumericOnly,
    Katakana,
    DigitsOnly,
    Io,
    SignedNumeric,
}

/// Adjust/fill specification, FFW bits 13-15
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FillMode {
    None,
    RightAdjustZeroFill,
    RightAdjustBlankFill,
    MandatoryFill,
}

/// Field Format Word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldFormat(pub u16);

impl FieldFormat {
    pub fn from_bytes(high: u8, low: u8) -> Self {
        Self(u16::from_be_bytes([high, low]))
    }

    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    fn has(self, mask: u16) -> bool {
        self.0 & mask != 0
    }

    pub fn bypass(self) -> bool {
        self.has(FFW_BYPASS)
    }

    pub fn dup_enable(self) -> bool {
        self.has(FFW_DUP_ENABLE)
    }

    pub fn modified(self) -> bool {
        self.has(FFW_MDT)
    }

    pub fn auto_enter(self) -> bool {
        self.has(FFW_AUTO_ENTER)
    }

    pub fn field_exit_required(self) -> bool {
        self.has(FFW_FIELD_EXIT_REQUIRED)
    }

    pub fn monocase(self) -> bool {
        self.has(FFW_MONOCASE)
    }

    pub fn mandatory_enter(self) -> bool {
        self.has(FFW_MANDATORY_ENTER)
    }

    pub fn shift_edit(self) -> ShiftEdit {
        match (self.0 & FFW_SHIFT_MASK) >> 8 {
            0 => ShiftEdit::AlphaShift,
            1 => ShiftEdit::AlphaOnly,
            2 => ShiftEdit::NumericShift,
            3 => ShiftEdit::NumericOnly,
            4 => ShiftEdit::Katakana,
            5 => ShiftEdit::DigitsOnly,
            6 => ShiftEdit::Io,
            _ => ShiftEdit::SignedNumeric,
        }
    }

    pub fn fill(self) -> FillMode {
        match self.0 & FFW_FILL_MASK {
            5 => FillMode::RightAdjustZeroFill,
            6 => FillMode::RightAdjustBlankFill,
            7 => FillMode::MandatoryFill,
            _ => FillMode::None,
        }
    }

    pub fn set_modified(&mut self, modified: bool) {
        if modified {
            self.0 |= FFW_MDT;
        } else {
            self.0 &= !FFW_MDT;
        }
    }
}

/// One entry of the format table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Zero-based row of the first data position
    pub start_row: usize,
    /// Zero-based column of the first data position
    pub start_col: usize,
    pub length: usize,
    /// `None` for output-only fields defined without an FFW
    pub format_word: Option<FieldFormat>,
    /// FCWs in the order received, kept verbatim
    pub control_words: Vec<u16>,
    pub attribute: u8,
    pub protected: bool,
    pub numeric_only: bool,
    pub mandatory_fill: bool,
    pub mandatory_enter: bool,
    pub monocase: bool,
    pub modified: bool,
}

impl Field {
    /// Build a field from the parts of a Start Field order
    pub fn new(
        start_row: usize,
        start_col: usize,
        length: usize,
        format_word: Option<FieldFormat>,
        control_words: Vec<u16>,
        attribute: u8,
    ) -> Self {
        let ffw = format_word.unwrap_or_default();
        let protected = format_word.map_or(true, |f| f.bypass());
        Self {
            start_row,
            start_col,
            length,
            format_word,
            control_words,
            attribute,
            protected,
            numeric_only: format_word.is_some()
                && matches!(
                    ffw.shift_edit(),
                    ShiftEdit::NumericOnly | ShiftEdit::DigitsOnly | ShiftEdit::SignedNumeric
                ),
            mandatory_fill: ffw.fill() == FillMode::MandatoryFill,
            mandatory_enter: ffw.mandatory_enter(),
            monocase: ffw.monocase(),
            modified: ffw.modified(),
        }
    }

    pub fn start_address(&self, cols: usize) -> usize {
        self.start_row * cols + self.start_col
    }

    /// One past the last data position
    pub fn end_address(&self, cols: usize) -> usize {
        self.start_address(cols) + self.length
    }

    pub fn contains(&self, address: usize, cols: usize) -> bool {
        address >= self.start_address(cols) && address < self.end_address(cols)
    }

    pub fn is_input(&self) -> bool {
        !self.protected
    }

    pub fn is_bypass(&self) -> bool {
        self.format_word.map_or(true, |f| f.bypass())
    }

    pub fn shift_edit(&self) -> Option<ShiftEdit> {
        self.format_word.map(FieldFormat::shift_edit)
    }

    pub fn auto_enter(&self) -> bool {
        self.format_word.map_or(false, |f| f.auto_enter())
    }

    pub fn field_exit_required(&self) -> bool {
        self.format_word.map_or(false, |f| f.field_exit_required())
    }

    pub fn fill(&self) -> FillMode {
        self.format_word.map_or(FillMode::None, |f| f.fill())
    }

    pub fn is_continued(&self) -> bool {
        self.control_words.iter().any(|w| (w >> 8) as u8 == FCW_CONTINUED)
    }

    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
        if let Some(ffw) = self.format_word.as_mut() {
            ffw.set_modified(modified);
        }
    }

    /// Check a character against the shift/edit specification
    pub fn accepts(&self, ch: char) -> Result<(), &'static str> {
        match self.shift_edit() {
            Some(ShiftEdit::DigitsOnly) if !ch.is_ascii_digit() => {
                Err("only characters 0 through 9 allowed")
            }
            Some(ShiftEdit::NumericOnly) | Some(ShiftEdit::SignedNumeric)
                if !(ch.is_ascii_digit() || matches!(ch, '+' | '-' | ',' | '.' | ' ')) =>
            {
                Err("field requires numeric characters")
            }
            Some(ShiftEdit::AlphaOnly)
                if !(ch.is_alphabetic() || matches!(ch, ',' | '.' | '-' | ' ')) =>
            {
                Err("field requires alphabetic characters")
            }
            _ => Ok(()),
        }
    }
}

/// Read-only snapshot of a field handed to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldView {
    /// Position in the format table
    pub index: usize,
    /// 1-based row of the first data position
    pub row: usize,
    /// 1-based column of the first data position
    pub col: usize,
    pub length: usize,
    pub protected: bool,
    pub numeric_only: bool,
    pub mandatory_fill: bool,
    pub mandatory_enter: bool,
    pub modified: bool,
    pub attribute: u8,
    pub text: String,
}

/// Fields of the current format, ordered by start address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTable {
    fields: Vec<Field>,
}

impl FieldTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Field> {
        self.fields.iter_mut()
    }

    pub fn get(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Insert a field, replacing one that starts at the same address.
    /// Any other overlap, or an extent past the end of the buffer, is an
    /// `InvalidField`.
    pub fn define(&mut self, field: Field, rows: usize, cols: usize) -> DecodeResult<()> {
        let start = field.start_address(cols);
        let end = field.end_address(cols);
        let invalid = |reason: String| DecodeError::InvalidField {
            row: field.start_row + 1,
            col: field.start_col + 1,
            reason,
        };

        if field.length == 0 {
            return Err(invalid("field length is 0".to_string()));
        }
        if end > rows * cols {
            return Err(invalid(format!(
                "field of length {} runs past the end of the {rows}x{cols} display",
                field.length
            )));
        }

        if let Some(existing) = self.fields.iter().position(|f| f.start_address(cols) == start) {
            self.fields.remove(existing);
        }
        if let Some(other) = self
            .fields
            .iter()
            .find(|f| start < f.end_address(cols) && f.start_address(cols) < end)
        {
            return Err(invalid(format!(
                "overlaps the field at row {} col {}",
                other.start_row + 1,
                other.start_col + 1
            )));
        }

        let at = self.fields.partition_point(|f| f.start_address(cols) < start);
        self.fields.insert(at, field);
        Ok(())
    }

    /// Index of the field containing `address`
    pub fn index_at(&self, address: usize, cols: usize) -> Option<usize> {
        self.fields.iter().position(|f| f.contains(address, cols))
    }

    pub fn field_at(&self, address: usize, cols: usize) -> Option<&Field> {
        self.index_at(address, cols).map(|i| &self.fields[i])
    }

    pub fn field_at_mut(&mut self, address: usize, cols: usize) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.contains(address, cols))
    }

    pub fn first_input(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.is_input())
    }

    /// Next input field starting after `address`, wrapping to the first
    pub fn next_input(&self, address: usize, cols: usize) -> Option<&Field> {
        self.fields
            .iter()
            .find(|f| f.is_input() && f.start_address(cols) > address)
            .or_else(|| self.first_input())
    }

    /// Input field before the one holding `address`, wrapping to the last.
    /// From inside a field past its first position this is the field itself.
    pub fn previous_input(&self, address: usize, cols: usize) -> Option<&Field> {
        self.fields
            .iter()
            .rev()
            .find(|f| f.is_input() && f.start_address(cols) < address)
            .or_else(|| self.fields.iter().rev().find(|f| f.is_input()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(row: usize, col: usize, len: usize) -> Field {
        Field::new(row, col, len, Some(FieldFormat(0x4000)), Vec::new(), 0x24)
    }

    #[test]
    fn test_ffw_bits() {
        let ffw = FieldFormat::from_bytes(0x43, 0x27);
        assert_eq!(ffw.shift_edit(), ShiftEdit::NumericOnly);
        assert!(ffw.monocase());
        assert_eq!(ffw.fill(), FillMode::MandatoryFill);
        assert!(!ffw.bypass());
        assert!(!ffw.modified());

        let ffw = FieldFormat::from_bytes(0x68, 0x08);
        assert!(ffw.bypass());
        assert!(ffw.modified());
        assert!(ffw.mandatory_enter());
        assert_eq!(ffw.to_bytes(), [0x68, 0x08]);
    }

    #[test]
    fn test_field_flags_from_ffw() {
        let field = Field::new(0, 0, 5, Some(FieldFormat(0x4507)), Vec::new(), 0x20);
        assert!(field.numeric_only);
        assert!(field.mandatory_fill);
        assert!(field.is_input());

        let output = Field::new(0, 0, 5, None, Vec::new(), 0x20);
        assert!(output.protected);
        assert!(!output.is_input());
    }

    #[test]
    fn test_field_accepts() {
        let digits = Field::new(0, 0, 5, Some(FieldFormat(0x4500)), Vec::new(), 0x20);
        assert!(digits.accepts('7').is_ok());
        assert!(digits.accepts('A').is_err());
        let alpha = input(0, 0, 5);
        assert!(alpha.accepts('A').is_ok());
    }

    #[test]
    fn test_define_replaces_same_start() {
        let mut table = FieldTable::new();
        table.define(input(0, 5, 10), 24, 80).unwrap();
        table.define(input(0, 5, 4), 24, 80).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0).unwrap().length, 4);
    }

    #[test]
    fn test_define_rejects_overlap_and_overrun() {
        let mut table = FieldTable::new();
        table.define(input(0, 5, 10), 24, 80).unwrap();
        let err = table.define(input(0, 10, 10), 24, 80).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidField { row: 1, col: 11, .. }));

        let err = table.define(input(23, 75, 10), 24, 80).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidField { row: 24, col: 76, .. }));
    }

    #[test]
    fn test_field_wraps_rows() {
        let mut table = FieldTable::new();
        table.define(input(0, 75, 10), 24, 80).unwrap();
        assert!(table.field_at(81, 80).is_some());
        assert!(table.field_at(85, 80).is_none());
    }

    #[test]
    fn test_navigation() {
        let mut table = FieldTable::new();
        table.define(input(0, 10, 5), 24, 80).unwrap();
        table.define(Field::new(1, 0, 5, None, Vec::new(), 0x20), 24, 80).unwrap();
        table.define(input(2, 10, 5), 24, 80).unwrap();

        assert_eq!(table.first_input().unwrap().start_row, 0);
        assert_eq!(table.next_input(10, 80).unwrap().start_row, 2);
        assert_eq!(table.next_input(170, 80).unwrap().start_row, 0);
        assert_eq!(table.previous_input(170, 80).unwrap().start_row, 0);
        assert_eq!(table.previous_input(5, 80).unwrap().start_row, 2);
    }
}
