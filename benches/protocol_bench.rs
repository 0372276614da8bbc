use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tn5250e::keyboard::KeystrokeEncoder;
use tn5250e::lib5250::codes::{self, ESC, SBA, SF};
use tn5250e::lib5250::protocol::{decode_frame, encode_frame};
use tn5250e::lib5250::{GdsRecord, OiaState, Opcode, Screen, StreamDecoder};
use tn5250e::protocol_common::ebcdic::CodePage;
use tn5250e::telnet_negotiation::TelnetNegotiator;

/// Sign-on style screen: a title row and two input fields
fn signon_payload() -> Vec<u8> {
    let page = CodePage::for_ccsid(37).unwrap();
    let mut data = vec![ESC, codes::CMD_CLEAR_UNIT, ESC, codes::CMD_WRITE_TO_DISPLAY, 0x00, 0x08];
    data.extend_from_slice(&[SBA, 1, 30]);
    data.extend(page.encode("Sign On").unwrap());
    for row in [6u8, 7] {
        data.extend_from_slice(&[SBA, row, 17]);
        data.extend(page.encode(if row == 6 { "User" } else { "Password" }).unwrap());
        data.extend_from_slice(&[SBA, row, 52, SF, 0x40, 0x00, 0x24, 0x00, 0x0A]);
    }
    data
}

fn bench_decode_and_apply(c: &mut Criterion) {
    let record = GdsRecord::new(Opcode::PutGet, signon_payload());
    let wire = encode_frame(&record).unwrap();

    c.bench_function("decode_frame", |b| {
        b.iter(|| {
            let mut buf = wire.clone();
            black_box(decode_frame(black_box(&mut buf)).unwrap())
        })
    });

    c.bench_function("apply_signon_record", |b| {
        b.iter(|| {
            let mut decoder = StreamDecoder::default();
            let mut screen = Screen::default();
            let mut oia = OiaState::new();
            decoder.apply_record(black_box(&record), &mut screen, &mut oia).unwrap();
            black_box(screen)
        })
    });
}

fn bench_encode_keys(c: &mut Criterion) {
    let mut screen = Screen::default();
    let mut oia = OiaState::new();
    StreamDecoder::default()
        .apply(&signon_payload(), &mut screen, &mut oia)
        .unwrap();
    let encoder = KeystrokeEncoder::default();

    c.bench_function("encode_signon_keys", |b| {
        b.iter(|| black_box(encoder.encode(black_box("QSECOFR[tab]secret[enter]"), &screen, false).unwrap()))
    });
}

fn bench_negotiator_data(c: &mut Criterion) {
    let wire = encode_frame(&GdsRecord::new(Opcode::PutGet, vec![0xFF; 4096])).unwrap();

    c.bench_function("negotiator_feed_4k", |b| {
        b.iter(|| {
            let mut negotiator = TelnetNegotiator::default();
            black_box(negotiator.feed(black_box(&wire)))
        })
    });
}

criterion_group!(benches, bench_decode_and_apply, bench_encode_keys, bench_negotiator_data);
criterion_main!(benches);
