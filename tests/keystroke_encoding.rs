use tn5250e::keyboard::{encode, KeystrokeEncoder};
use tn5250e::lib5250::codes::{self, ESC, SBA, SF};
use tn5250e::lib5250::protocol::decode_frame;
use tn5250e::lib5250::{OiaState, Opcode, Screen, StreamDecoder};
use tn5250e::protocol_common::ebcdic::CodePage;
use tn5250e::EncodeError;

/// Screen built by the decoder: two 10-byte input fields at 1,8 and 2,8
fn host_screen(read_command: Option<u8>) -> Screen {
    let mut stream = vec![ESC, codes::CMD_CLEAR_UNIT, ESC, codes::CMD_WRITE_TO_DISPLAY, 0x00, 0x08];
    stream.extend_from_slice(&[SBA, 1, 7, SF, 0x40, 0x00, 0x24, 0x00, 0x0A]);
    stream.extend_from_slice(&[SBA, 2, 7, SF, 0x40, 0x00, 0x24, 0x00, 0x0A]);
    if let Some(command) = read_command {
        stream.extend_from_slice(&[ESC, command, 0x00, 0x00]);
    }
    let mut screen = Screen::default();
    let mut oia = OiaState::new();
    StreamDecoder::default().apply(&stream, &mut screen, &mut oia).unwrap();
    screen
}

fn cp037() -> &'static CodePage {
    CodePage::for_ccsid(37).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signon_keys_after_read_mdt() {
        let screen = host_screen(Some(codes::CMD_READ_MDT_FIELDS));
        let result = encode("QSECOFR[tab]SECRET[enter]", &screen).unwrap();
        assert!(result.locks_keyboard());

        let mut expected = vec![2, 14, codes::AID_ENTER, SBA, 1, 8];
        expected.extend(cp037().encode("QSECOFR").unwrap());
        expected.extend_from_slice(&[SBA, 2, 8]);
        expected.extend(cp037().encode("SECRET").unwrap());
        assert_eq!(result.record.as_ref().unwrap().payload, expected);
        assert_eq!(result.screen.pending_read(), None);
    }

    #[test]
    fn test_wire_bytes_decode_back() {
        let screen = host_screen(None);
        let result = encode("x[pf24]", &screen).unwrap();
        let mut wire = result.to_bytes().unwrap().unwrap();
        assert_eq!(&wire[wire.len() - 2..], &[0xFF, 0xEF]);
        let record = decode_frame(&mut wire).unwrap().unwrap();
        assert_eq!(record.opcode(), Some(Opcode::PutGet));
        assert_eq!(record.payload[2], 0xBC);
    }

    #[test]
    fn test_keys_without_fields_are_local_only() {
        let screen = host_screen(None);
        let result = encode("ab[left][backspace]", &screen).unwrap();
        assert!(result.record.is_none());
        assert!(result.to_bytes().unwrap().is_none());
        assert_eq!((result.screen.cursor().row, result.screen.cursor().col), (0, 7));
    }

    #[test]
    fn test_help_and_roll_send_no_field_data() {
        let screen = host_screen(Some(codes::CMD_READ_INPUT_FIELDS));
        for (keys, aid) in [("abc[help]", codes::AID_HELP), ("abc[pageup]", codes::AID_ROLL_DOWN), ("abc[rollup]", codes::AID_ROLL_UP)] {
            let result = encode(keys, &screen).unwrap();
            assert_eq!(result.record.unwrap().payload, vec![1, 11, aid], "{keys}");
        }
    }

    #[test]
    fn test_literal_brackets() {
        let screen = host_screen(None);
        let result = encode("[[x]]", &screen).unwrap();
        let field = result.screen.fields().get(0).unwrap().clone();
        assert_eq!(result.screen.field_text(&field, cp037()).unwrap().trim_end(), "[x]");
    }

    #[test]
    fn test_literals_use_session_ccsid() {
        let screen = host_screen(None);
        let german = CodePage::for_ccsid(273).unwrap();
        let result = KeystrokeEncoder::new(german).encode("Ä", &screen, false).unwrap();
        let field = result.screen.fields().get(0).unwrap();
        assert_eq!(result.screen.field_data(field)[0], german.to_ebcdic('Ä').unwrap());
        assert_eq!(KeystrokeEncoder::new(german).codepage().ccsid(), 273);
    }

    #[test]
    fn test_errors_leave_nothing_to_send() {
        let screen = host_screen(None);
        assert!(matches!(encode("[nosuchkey]", &screen), Err(EncodeError::UnknownMnemonic { .. })));
        assert!(matches!(encode("abc[enter", &screen), Err(EncodeError::UnterminatedMnemonic { position: 3 })));
        assert!(matches!(encode("01234567890", &screen), Err(EncodeError::FieldOverflow { remaining: 10, .. })));
        assert!(matches!(encode("[enter][enter]", &screen), Err(EncodeError::InputAfterAid { .. })));
    }
}
