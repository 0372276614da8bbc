//! 5250 display station protocol
//!
//! Everything between the Telnet layer and the session driver: the GDS
//! record envelope, the data stream interpreter, and the screen, field and
//! OIA model it writes to.

pub mod codes;
pub mod display;
pub mod field;
pub mod oia;
pub mod protocol;
pub mod query;
pub mod stream;
pub mod telnet;

pub use codes::{CommandCode, Opcode, OrderCode};
pub use display::{Cell, Cursor, ExtendedAttr, Screen};
pub use field::{Field, FieldFormat, FieldTable, FieldView};
pub use oia::{wait_for_unlock, InhibitReason, OiaState};
pub use protocol::{decode_frame, encode_frame, GdsRecord};
pub use query::QueryReply;
pub use stream::StreamDecoder;
pub use telnet::TerminalType;
