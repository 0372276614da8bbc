//! Display buffer for the 5250 session
//!
//! `Screen` is the write target of the stream decoder and the read source of
//! the keystroke encoder: a `rows x cols` grid of EBCDIC cells, the format
//! table, the cursor, and the read command the host left pending.

use super::codes::{
    self, CommandCode, ATTR_NORMAL, CMD_CLEAR_UNIT, CMD_CLEAR_UNIT_ALTERNATE,
    CMD_WRITE_TO_DISPLAY, ESC, IC, SBA, SF, WEA,
};
use super::field::{Field, FieldTable, FieldView};
use crate::error::CharacterConversionError;
use crate::protocol_common::ebcdic::CodePage;

pub const DEFAULT_ROWS: usize = 24;
pub const DEFAULT_COLS: usize = 80;
pub const WIDE_ROWS: usize = 27;
pub const WIDE_COLS: usize = 132;

/// Extended attribute written by a WEA order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedAttr {
    pub kind: u8,
    pub value: u8,
}

/// One display position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// EBCDIC character, or the attribute byte itself when `is_attribute`
    pub char: u8,
    /// Attribute in effect at this position
    pub attribute: u8,
    pub extended: Option<ExtendedAttr>,
    pub is_attribute: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            char: 0x00,
            attribute: ATTR_NORMAL,
            extended: None,
            is_attribute: false,
        }
    }
}

/// Zero-based cursor position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub row: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
    cursor: Cursor,
    fields: FieldTable,
    pending_read: Option<CommandCode>,
}

impl Default for Screen {
    fn default() -> Self {
        Self::new(DEFAULT_ROWS, DEFAULT_COLS)
    }
}

impl Screen {
    pub fn new(rows: usize, cols: usize) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        Self {
            rows,
            cols,
            cells: vec![Cell::default(); rows * cols],
            cursor: Cursor::default(),
            fields: FieldTable::new(),
            pending_read: None,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn size(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn address(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// Zero-based (row, col) of a buffer address
    pub fn position(&self, address: usize) -> (usize, usize) {
        (address / self.cols, address % self.cols)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        if row < self.rows && col < self.cols {
            self.cells.get(self.address(row, col))
        } else {
            None
        }
    }

    pub fn cell_at(&self, address: usize) -> Option<&Cell> {
        self.cells.get(address)
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn cursor_address(&self) -> usize {
        self.address(self.cursor.row, self.cursor.col)
    }

    /// Move the cursor, clamping to the buffer
    pub fn set_cursor(&mut self, row: usize, col: usize) {
        self.cursor = Cursor {
            row: row.min(self.rows - 1),
            col: col.min(self.cols - 1),
        };
    }

    pub fn set_cursor_address(&mut self, address: usize) {
        let address = address % self.cells.len();
        let (row, col) = self.position(address);
        self.cursor = Cursor { row, col };
    }

    /// Home position: first input field, else row 1 col 1
    pub fn set_cursor_home(&mut self) {
        match self.fields.first_input() {
            Some(field) => self.set_cursor(field.start_row, field.start_col),
            None => self.set_cursor(0, 0),
        }
    }

    pub fn fields(&self) -> &FieldTable {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FieldTable {
        &mut self.fields
    }

    /// Field holding the cursor
    pub fn current_field(&self) -> Option<&Field> {
        self.fields.field_at(self.cursor_address(), self.cols)
    }

    pub fn pending_read(&self) -> Option<CommandCode> {
        self.pending_read
    }

    pub fn set_pending_read(&mut self, command: Option<CommandCode>) {
        self.pending_read = command;
    }

    /// Blank the buffer at a new size and drop the format table
    pub fn clear_unit(&mut self, rows: usize, cols: usize) {
        *self = Self::new(rows, cols);
    }

    pub fn clear_format_table(&mut self) {
        self.fields.clear();
        self.pending_read = None;
    }

    /// Store a data character
    pub fn put_char(&mut self, address: usize, byte: u8, attribute: u8) {
        if let Some(cell) = self.cells.get_mut(address) {
            *cell = Cell {
                char: byte,
                attribute,
                extended: cell.extended,
                is_attribute: false,
            };
        }
    }

    /// Store an attribute byte; it occupies the position and displays blank
    pub fn put_attribute(&mut self, address: usize, attribute: u8) {
        if let Some(cell) = self.cells.get_mut(address) {
            *cell = Cell {
                char: attribute,
                attribute,
                extended: None,
                is_attribute: true,
            };
        }
    }

    pub fn set_extended(&mut self, address: usize, extended: ExtendedAttr) {
        if let Some(cell) = self.cells.get_mut(address) {
            cell.extended = Some(extended);
        }
    }

    /// Set `[from, to]` (inclusive) to nulls
    pub fn erase(&mut self, from: usize, to: usize) {
        let end = to.min(self.cells.len().saturating_sub(1));
        for address in from..=end {
            self.cells[address] = Cell::default();
        }
    }

    /// Null the characters of `[start, end)`, keeping attributes
    pub fn null_range(&mut self, start: usize, end: usize) {
        let end = end.min(self.cells.len());
        for cell in self.cells.iter_mut().take(end).skip(start) {
            cell.char = 0x00;
            cell.is_attribute = false;
        }
    }

    /// Attribute in effect over `[start, end)`
    pub fn set_attribute_range(&mut self, start: usize, end: usize, attribute: u8) {
        let end = end.min(self.cells.len());
        for cell in self.cells.iter_mut().take(end).skip(start) {
            if !cell.is_attribute {
                cell.attribute = attribute;
            }
        }
    }

    /// Shift rows `top..=bottom` by `lines`; positive moves text down
    pub fn roll(&mut self, top: usize, bottom: usize, lines: isize) {
        if top > bottom || bottom >= self.rows || lines == 0 {
            return;
        }
        let span = bottom - top + 1;
        let shift = lines.unsigned_abs().min(span);
        let cols = self.cols;
        let region = &mut self.cells[top * cols..(bottom + 1) * cols];
        if lines > 0 {
            region.rotate_right(shift * cols);
            region[..shift * cols].fill(Cell::default());
        } else {
            region.rotate_left(shift * cols);
            let keep = (span - shift) * cols;
            region[keep..].fill(Cell::default());
        }
    }

    /// Raw EBCDIC content of a field
    pub fn field_data(&self, field: &Field) -> Vec<u8> {
        let start = field.start_address(self.cols);
        self.cells[start..field.end_address(self.cols)]
            .iter()
            .map(|c| c.char)
            .collect()
    }

    fn display_char(&self, cell: &Cell, page: &CodePage) -> Result<char, CharacterConversionError> {
        if cell.is_attribute || cell.char < 0x40 || codes::is_nondisplay(cell.attribute) {
            Ok(' ')
        } else {
            page.to_unicode(cell.char)
        }
    }

    /// One row as text
    pub fn row_text(&self, row: usize, page: &CodePage) -> Result<String, CharacterConversionError> {
        let start = self.address(row, 0);
        self.cells[start..start + self.cols]
            .iter()
            .map(|c| self.display_char(c, page))
            .collect()
    }

    /// Whole screen, rows separated by newlines
    pub fn text(&self, page: &CodePage) -> Result<String, CharacterConversionError> {
        let mut lines = Vec::with_capacity(self.rows);
        for row in 0..self.rows {
            lines.push(self.row_text(row, page)?);
        }
        Ok(lines.join("\n"))
    }

    /// Field contents as text; nulls and hidden fields read as blanks
    pub fn field_text(&self, field: &Field, page: &CodePage) -> Result<String, CharacterConversionError> {
        let start = field.start_address(self.cols);
        self.cells[start..field.end_address(self.cols)]
            .iter()
            .map(|c| {
                if codes::is_nondisplay(field.attribute) {
                    Ok(' ')
                } else {
                    self.display_char(c, page)
                }
            })
            .collect()
    }

    pub fn field_views(&self, page: &CodePage) -> Result<Vec<FieldView>, CharacterConversionError> {
        self.fields
            .iter()
            .enumerate()
            .map(|(index, field)| {
                Ok(FieldView {
                    index,
                    row: field.start_row + 1,
                    col: field.start_col + 1,
                    length: field.length,
                    protected: field.protected,
                    numeric_only: field.numeric_only,
                    mandatory_fill: field.mandatory_fill,
                    mandatory_enter: field.mandatory_enter,
                    modified: field.modified,
                    attribute: field.attribute,
                    text: self.field_text(field, page)?,
                })
            })
            .collect()
    }

    /// Inbound data for an AID: cursor (1-based), the AID, then field data
    /// shaped by `read`. Read Input Fields sends every input field in full;
    /// Read MDT sends each modified field behind an SBA with trailing nulls
    /// trimmed. Read MDT Alternate leaves nulls as they are.
    pub fn read_payload(&self, aid: u8, read: Option<CommandCode>, with_fields: bool) -> Vec<u8> {
        let mut out = vec![self.cursor.row as u8 + 1, self.cursor.col as u8 + 1, aid];
        if !with_fields {
            return out;
        }
        match read.unwrap_or(CommandCode::ReadMdtFields) {
            CommandCode::ReadInputFields => {
                for field in self.fields.iter().filter(|f| f.is_input()) {
                    out.extend(self.field_data(field).into_iter().map(null_to_blank));
                }
            }
            mode => {
                for field in self.fields.iter().filter(|f| f.is_input() && f.modified) {
                    let mut data = self.field_data(field);
                    if mode != CommandCode::ReadMdtFieldsAlt {
                        while data.last() == Some(&0x00) {
                            data.pop();
                        }
                        data = data.into_iter().map(null_to_blank).collect();
                    }
                    out.extend_from_slice(&[SBA, field.start_row as u8 + 1, field.start_col as u8 + 1]);
                    out.extend(data);
                }
            }
        }
        out
    }

    /// Raw character buffer, one byte per position
    pub fn buffer_bytes(&self) -> Vec<u8> {
        self.cells.iter().map(|c| c.char).collect()
    }

    /// Data stream that rebuilds this screen when applied to any display:
    /// clear unit, one Write To Display of every used position with its
    /// Start Field and Write Extended Attribute orders, the cursor, and the
    /// pending read command.
    pub fn to_restore_stream(&self, unlock_keyboard: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.cells.len() + 64);
        if self.size() == (WIDE_ROWS, WIDE_COLS) {
            out.extend_from_slice(&[ESC, CMD_CLEAR_UNIT_ALTERNATE, 0x00]);
        } else {
            out.extend_from_slice(&[ESC, CMD_CLEAR_UNIT]);
        }
        let cc2 = if unlock_keyboard { codes::CC2_UNLOCK } else { 0x00 };
        out.extend_from_slice(&[ESC, CMD_WRITE_TO_DISPLAY, 0x00, cc2, SBA, 1, 1]);

        // Untouched positions are skipped with an SBA so the clear leaves them as is
        let mut skipped = false;
        for address in 0..self.cells.len() {
            let cell = &self.cells[address];
            let field = self
                .fields
                .iter()
                .find(|f| f.start_address(self.cols) == address + 1);
            if field.is_none() && *cell == Cell::default() {
                skipped = true;
                continue;
            }
            if skipped {
                let (row, col) = self.position(address);
                out.extend_from_slice(&[SBA, row as u8 + 1, col as u8 + 1]);
                skipped = false;
            }
            // WEA does not advance the address, so it goes before the character
            if let (Some(extended), false) = (cell.extended, cell.is_attribute) {
                out.extend_from_slice(&[WEA, extended.kind, extended.value]);
            }
            if let Some(field) = field {
                out.push(SF);
                if let Some(ffw) = field.format_word {
                    out.extend_from_slice(&ffw.to_bytes());
                    for fcw in &field.control_words {
                        out.extend_from_slice(&fcw.to_be_bytes());
                    }
                }
                out.push(field.attribute);
                out.extend_from_slice(&(field.length as u16).to_be_bytes());
            } else if cell.is_attribute || codes::is_data_character(cell.char) {
                out.push(cell.char);
            } else {
                out.push(0x00);
            }
            // Writing an attribute clears its extended attribute, so set it afterwards
            if let (Some(extended), true) = (cell.extended, cell.is_attribute) {
                let (row, col) = self.position(address);
                out.extend_from_slice(&[SBA, row as u8 + 1, col as u8 + 1, WEA, extended.kind, extended.value]);
                skipped = true;
            }
        }

        out.extend_from_slice(&[IC, self.cursor.row as u8 + 1, self.cursor.col as u8 + 1]);
        if let Some(read) = self.pending_read {
            out.extend_from_slice(&[ESC, read.to_u8(), 0x00, 0x00]);
        }
        out
    }
}

fn null_to_blank(byte: u8) -> u8 {
    if byte == 0x00 {
        0x40
    } else {
        byte
    }
}
