//! Character set support shared by the protocol layers
//!
//! The 5250 data stream carries text as EBCDIC in the session's CCSID. This
//! module owns the codepage tables and the lookups used by the stream decoder
//! (host to screen) and the keystroke encoder (caller to host).
//!
//! # Examples
//!
//! ```
//! use tn5250e::protocol_common::ebcdic::{to_ebcdic, to_unicode};
//!
//! assert_eq!(to_unicode(37, 0xC1).unwrap(), 'A');
//! assert_eq!(to_ebcdic(1140, '€').unwrap(), 0x9F);
//! assert!(to_ebcdic(37, '€').is_err());
//! ```

pub mod ebcdic;

pub use ebcdic::{default_page, supported_ccsids, to_ebcdic, to_unicode, CodePage};

/// CCSID used when the configuration does not name one
pub const DEFAULT_CCSID: u16 = 37;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ccsid_is_supported() {
        assert!(supported_ccsids().contains(&DEFAULT_CCSID));
        assert!(CodePage::for_ccsid(DEFAULT_CCSID).is_ok());
    }
}
