use tn5250e::lib5250::codes::{self, ESC, IC, SBA, SF};
use tn5250e::lib5250::protocol::{decode_frame, encode_frame};
use tn5250e::lib5250::{GdsRecord, OiaState, Opcode, QueryReply, Screen, StreamDecoder};
use tn5250e::protocol_common::ebcdic::CodePage;
use tn5250e::DecodeError;

fn cp037() -> &'static CodePage {
    CodePage::for_ccsid(37).unwrap()
}

/// Decode every complete record in `wire` and apply it, collecting errors
fn apply_wire(wire: &[u8], decoder: &mut StreamDecoder, screen: &mut Screen, oia: &mut OiaState) -> Vec<DecodeError> {
    let mut buf = wire.to_vec();
    let mut errors = Vec::new();
    loop {
        match decode_frame(&mut buf) {
            Ok(Some(record)) => {
                if let Err(e) = decoder.apply_record(&record, screen, oia) {
                    errors.push(e);
                }
            }
            Ok(None) => return errors,
            Err(e) => errors.push(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_screen_addresses() {
        let mut stream = vec![ESC, codes::CMD_CLEAR_UNIT_ALTERNATE, 0x00, ESC, codes::CMD_WRITE_TO_DISPLAY, 0x00, 0x08];
        stream.extend_from_slice(&[SBA, 27, 132, 0xC1, IC, 27, 132]);
        let wire = encode_frame(&GdsRecord::new(Opcode::OutputOnly, stream)).unwrap();

        let mut decoder = StreamDecoder::default();
        let mut screen = Screen::default();
        let mut oia = OiaState::new();
        assert!(apply_wire(&wire, &mut decoder, &mut screen, &mut oia).is_empty());
        assert_eq!(screen.size(), (27, 132));
        assert_eq!(screen.cell(26, 131).map(|c| c.char), Some(0xC1));
        assert_eq!((screen.cursor().row, screen.cursor().col), (26, 131));
    }

    #[test]
    fn test_bad_record_does_not_stop_later_records() {
        let bad = GdsRecord::new(Opcode::PutGet, vec![ESC, codes::CMD_WRITE_TO_DISPLAY, 0x00, 0x00, SBA, 0, 1]);
        let good = GdsRecord::new(
            Opcode::PutGet,
            vec![ESC, codes::CMD_WRITE_TO_DISPLAY, 0x00, 0x08, SBA, 3, 1, 0xC8, 0xC9],
        );
        let mut wire = encode_frame(&bad).unwrap();
        // A record cut short by its own end marker
        wire.extend_from_slice(&[0x00, 0x40, 0x12, 0xA0, 0x00, 0x00, 0x04, 0x00, 0x00, 0x03, 0xFF, 0xEF]);
        wire.extend(encode_frame(&good).unwrap());

        let mut decoder = StreamDecoder::default();
        let mut screen = Screen::default();
        let mut oia = OiaState::new();
        let errors = apply_wire(&wire, &mut decoder, &mut screen, &mut oia);
        assert!(matches!(errors[0], DecodeError::InvalidField { row: 0, col: 1, .. }));
        assert!(matches!(errors[1], DecodeError::TruncatedRecord { expected: 0x40, .. }));
        assert_eq!(errors.len(), 2);
        assert!(screen.row_text(2, cp037()).unwrap().starts_with("HI"));
        assert!(!oia.keyboard_locked);
    }

    #[test]
    fn test_query_reply_round_trip_through_decoder() {
        let query = GdsRecord::new(
            Opcode::PutGet,
            vec![ESC, codes::CMD_WRITE_STRUCTURED_FIELD, 0x00, 0x05, codes::SF_CLASS_5250, codes::SF_5250_QUERY, 0x00],
        );
        let mut decoder = StreamDecoder::new(QueryReply::for_terminal_type("IBM-3179-2"), cp037());
        let mut screen = Screen::default();
        let mut oia = OiaState::new();
        decoder.apply_record(&query, &mut screen, &mut oia).unwrap();

        let responses = decoder.take_responses();
        assert_eq!(responses.len(), 1);
        let payload = &responses[0].payload;
        assert_eq!(u16::from_be_bytes([payload[3], payload[4]]), 0x003A);

        // Trailing bytes after the declared length are not part of the reply
        let mut bytes = payload[3..].to_vec();
        bytes.extend_from_slice(&[0xDE, 0xAD]);
        let reply = QueryReply::parse(&bytes).unwrap();
        assert_eq!(reply.device_type, "3179");
        assert_eq!(reply.device_model, "2");
        assert_eq!(reply.to_bytes().len(), 58);
    }

    #[test]
    fn test_header_flags_reach_oia() {
        let mut decoder = StreamDecoder::default();
        let mut screen = Screen::default();
        let mut oia = OiaState::new();

        let help = GdsRecord::new_with_flags(Opcode::NoOp, 0x0100, Vec::new());
        decoder.apply_record(&help, &mut screen, &mut oia).unwrap();
        assert!(oia.help_requested);
        assert!(!oia.error);

        let error = GdsRecord::new_with_flags(Opcode::NoOp, 0x8000, Vec::new());
        decoder.apply_record(&error, &mut screen, &mut oia).unwrap();
        assert!(oia.error);
        assert!(!oia.help_requested);
    }

    #[test]
    fn test_fields_and_text_from_signon_record() {
        let page = cp037();
        let mut stream = vec![ESC, codes::CMD_CLEAR_UNIT, ESC, codes::CMD_WRITE_TO_DISPLAY, 0x00, 0x08];
        stream.extend_from_slice(&[SBA, 1, 30]);
        stream.extend(page.encode("Sign On").unwrap());
        stream.extend_from_slice(&[SBA, 6, 17]);
        stream.extend(page.encode("User").unwrap());
        stream.extend_from_slice(&[SBA, 6, 52, SF, 0x40, 0x00, 0x24, 0x00, 0x0A]);
        // Non-display password field
        stream.extend_from_slice(&[SBA, 7, 52, SF, 0x40, 0x00, 0x27, 0x00, 0x0A]);

        let mut screen = Screen::default();
        let mut oia = OiaState::new();
        StreamDecoder::default()
            .apply_record(&GdsRecord::new(Opcode::PutGet, stream), &mut screen, &mut oia)
            .unwrap();

        let text = screen.text(page).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 24);
        assert_eq!(&lines[0][29..36], "Sign On");
        assert_eq!(&lines[5][16..20], "User");

        let views = screen.field_views(page).unwrap();
        assert_eq!(views.len(), 2);
        // Views report 1-based positions
        assert_eq!((views[0].row, views[0].col, views[0].length), (6, 53, 10));
        assert!(!views[0].protected);
        assert_eq!((screen.cursor().row, screen.cursor().col), (5, 52));
        assert!(!oia.keyboard_locked);
    }

    #[test]
    fn test_message_light_bits_do_not_unlock() {
        let mut decoder = StreamDecoder::default();
        let mut screen = Screen::default();
        let mut oia = OiaState::new();

        let message_off = GdsRecord::new(
            Opcode::OutputOnly,
            vec![ESC, codes::CMD_WRITE_TO_DISPLAY, 0x00, codes::CC2_MESSAGE_OFF],
        );
        decoder.apply_record(&message_off, &mut screen, &mut oia).unwrap();
        assert!(oia.keyboard_locked);

        let unlock = GdsRecord::new(
            Opcode::OutputOnly,
            vec![ESC, codes::CMD_WRITE_TO_DISPLAY, 0x00, codes::CC2_UNLOCK | codes::CC2_MESSAGE_ON],
        );
        decoder.apply_record(&unlock, &mut screen, &mut oia).unwrap();
        assert!(!oia.keyboard_locked);
        assert!(oia.message_waiting);
    }
}
