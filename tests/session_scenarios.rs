//! End-to-end sessions against a loopback host that speaks just enough
//! TN5250E to negotiate and exchange records

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tn5250e::lib5250::codes::{self, ESC, SBA, SF};
use tn5250e::lib5250::protocol::{decode_frame, encode_frame};
use tn5250e::lib5250::telnet::{DO, DONT, IAC, OPT_BINARY, OPT_END_OF_RECORD, OPT_NEW_ENVIRON, OPT_TERMINAL_TYPE, WILL};
use tn5250e::lib5250::{GdsRecord, Opcode, QueryReply};
use tn5250e::{ScreenEvent, SendMode, Session, SessionConfig, SessionError, UnlockError};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct FakeHost {
    stream: TcpStream,
    inbound: Vec<u8>,
}

impl FakeHost {
    fn listen() -> (TcpListener, SessionConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut config = SessionConfig::new("127.0.0.1", port);
        config.negotiation_timeout_secs = 5;
        (listener, config)
    }

    /// Accept the client and agree to everything but NEW-ENVIRON
    fn accept(listener: &TcpListener) -> Self {
        let (mut stream, _) = listener.accept().unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        stream
            .write_all(&[
                IAC, DO, OPT_BINARY, IAC, WILL, OPT_BINARY,
                IAC, DO, OPT_END_OF_RECORD, IAC, WILL, OPT_END_OF_RECORD,
                IAC, DO, OPT_TERMINAL_TYPE, IAC, DONT, OPT_NEW_ENVIRON,
            ])
            .unwrap();
        Self { stream, inbound: Vec::new() }
    }

    fn send(&mut self, opcode: Opcode, payload: Vec<u8>) {
        self.stream.write_all(&encode_frame(&GdsRecord::new(opcode, payload)).unwrap()).unwrap();
    }

    /// Next record from the client, skipping its option negotiation
    fn read_record(&mut self) -> GdsRecord {
        let mut buf = [0u8; 1024];
        loop {
            while self.inbound.len() >= 3 && self.inbound[0] == IAC && (0xFB..=0xFE).contains(&self.inbound[1]) {
                self.inbound.drain(..3);
            }
            if let Some(record) = decode_frame(&mut self.inbound).unwrap() {
                return record;
            }
            let n = self.stream.read(&mut buf).unwrap();
            assert!(n > 0, "client closed the connection");
            self.inbound.extend_from_slice(&buf[..n]);
        }
    }
}

/// "USER" at 1,2 with an input field at 1,8 and another at 2,8, unlocked
fn signon_payload() -> Vec<u8> {
    let mut payload = vec![ESC, codes::CMD_CLEAR_UNIT, ESC, codes::CMD_WRITE_TO_DISPLAY, 0x00, 0x08];
    payload.extend_from_slice(&[SBA, 1, 2, 0xE4, 0xE2, 0xC5, 0xD9]);
    payload.extend_from_slice(&[SBA, 1, 7, SF, 0x40, 0x00, 0x24, 0x00, 0x0A]);
    payload.extend_from_slice(&[SBA, 2, 7, SF, 0x40, 0x00, 0x24, 0x00, 0x0A]);
    payload
}

fn unlock_payload() -> Vec<u8> {
    vec![ESC, codes::CMD_WRITE_TO_DISPLAY, 0x00, 0x08]
}

fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    done()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signon_tab_enter_and_unlock() {
        init_logging();
        let (listener, config) = FakeHost::listen();
        let (record_tx, record_rx) = mpsc::channel();
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let host = thread::spawn(move || {
            let mut host = FakeHost::accept(&listener);
            host.send(Opcode::PutGet, signon_payload());
            record_tx.send(host.read_record()).unwrap();
            go_rx.recv().unwrap();
            host.send(Opcode::PutGet, unlock_payload());
            go_rx.recv().unwrap();
        });

        let session = Session::connect(&config).unwrap();
        session.wait_for_unlock(Duration::from_secs(5)).unwrap();
        assert!(session.current_screen_text().unwrap().starts_with(" USER "));

        session.send_keys("USER[tab]").unwrap();
        let cursor = session.current_screen().cursor();
        assert_eq!((cursor.row, cursor.col), (1, 7));
        let fields = session.current_fields().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].text.trim_end(), "USER");
        assert!(fields[0].modified);

        session.send_keys("[enter]").unwrap();
        assert!(session.oia().keyboard_locked);
        assert!(matches!(session.send_keys("x"), Err(SessionError::KeyboardLocked)));

        let record = record_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(record.opcode(), Some(Opcode::PutGet));
        assert_eq!(record.payload, vec![2, 8, codes::AID_ENTER, SBA, 1, 8, 0xE4, 0xE2, 0xC5, 0xD9]);

        let result = session.wait_for_unlock(Duration::from_millis(200));
        assert!(matches!(result, Err(UnlockError::Timeout { .. })));

        go_tx.send(()).unwrap();
        assert_eq!(session.wait_for_unlock(Duration::from_secs(5)), Ok(()));
        assert!(!session.oia().keyboard_locked);

        go_tx.send(()).unwrap();
        session.disconnect();
        host.join().unwrap();
    }

    #[test]
    fn test_listeners_observe_same_events_despite_panic() {
        init_logging();
        let (listener, config) = FakeHost::listen();
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let host = thread::spawn(move || {
            let mut host = FakeHost::accept(&listener);
            go_rx.recv().unwrap();
            host.send(Opcode::PutGet, signon_payload());
            host.send(Opcode::PutGet, vec![ESC, codes::CMD_WRITE_TO_DISPLAY, 0x00, 0x00, SBA, 5, 1, 0xC1]);
            go_rx.recv().unwrap();
        });

        let session = Session::connect(&config).unwrap();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&first);
        session.subscribe(move |event: &ScreenEvent| sink.lock().unwrap().push(event.clone()));
        session.subscribe(|_: &ScreenEvent| panic!("listener bug"));
        let sink = Arc::clone(&second);
        session.subscribe(move |event: &ScreenEvent| sink.lock().unwrap().push(event.clone()));

        go_tx.send(()).unwrap();
        assert!(wait_until(|| {
            second
                .lock()
                .unwrap()
                .iter()
                .any(|e| matches!(e, ScreenEvent::Changed { rows, .. } if rows == &vec![4]))
        }));

        let first = first.lock().unwrap().clone();
        let second = second.lock().unwrap().clone();
        assert_eq!(first, second);
        // The default terminal is 27x132; Clear Unit goes back to 24x80
        assert_eq!(first[0], ScreenEvent::SizeChanged { rows: 24, cols: 80 });
        assert!(matches!(&first[1], ScreenEvent::Changed { rows, .. } if rows.len() == 24));
        assert!(first.iter().any(|e| matches!(e, ScreenEvent::OiaChanged(oia) if !oia.keyboard_locked)));

        go_tx.send(()).unwrap();
        session.disconnect();
        host.join().unwrap();
    }

    #[test]
    fn test_query_is_answered_with_reply() {
        init_logging();
        let (listener, config) = FakeHost::listen();
        let host = thread::spawn(move || {
            let mut host = FakeHost::accept(&listener);
            host.send(Opcode::PutGet, vec![ESC, codes::CMD_WRITE_STRUCTURED_FIELD, 0x00, 0x05, 0xD9, 0x70, 0x00]);
            host.read_record()
        });

        let session = Session::connect(&config).unwrap();
        let record = host.join().unwrap();
        assert_eq!(&record.payload[..3], &[0x00, 0x00, codes::AID_QUERY_REPLY]);
        let reply = QueryReply::parse(&record.payload[3..]).unwrap();
        assert_eq!(reply, QueryReply::for_terminal_type("IBM-3477-FC"));
        session.disconnect();
    }

    #[test]
    fn test_host_close_ends_session() {
        init_logging();
        let (listener, config) = FakeHost::listen();
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let host = thread::spawn(move || {
            let host = FakeHost::accept(&listener);
            go_rx.recv().unwrap();
            drop(host);
        });

        let session = Session::connect(&config).unwrap();
        let reasons = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reasons);
        session.subscribe(move |event: &ScreenEvent| {
            if let ScreenEvent::Disconnected { reason } = event {
                sink.lock().unwrap().push(reason.clone());
            }
        });
        session.send_keys_with("abc", SendMode::Queue).unwrap();

        go_tx.send(()).unwrap();
        assert_eq!(session.wait_for_unlock(Duration::from_secs(5)), Err(UnlockError::ConnectionClosed));
        assert!(wait_until(|| !reasons.lock().unwrap().is_empty()));
        let reasons = reasons.lock().unwrap().clone();
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].is_some());
        assert!(session.oia().disconnected);
        assert!(matches!(session.send_keys("abc"), Err(SessionError::NotConnected)));
        host.join().unwrap();
    }

    #[test]
    fn test_disconnect_wakes_waiter() {
        init_logging();
        let (listener, config) = FakeHost::listen();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let host = thread::spawn(move || {
            let _host = FakeHost::accept(&listener);
            let _ = done_rx.recv_timeout(Duration::from_secs(10));
        });

        let session = Arc::new(Session::connect(&config).unwrap());
        let waiter_session = Arc::clone(&session);
        let waiter = thread::spawn(move || waiter_session.wait_for_unlock(Duration::from_secs(10)));
        thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        session.disconnect();
        assert_eq!(waiter.join().unwrap(), Err(UnlockError::ConnectionClosed));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!session.is_connected());

        done_tx.send(()).unwrap();
        host.join().unwrap();
    }

    #[tokio::test]
    async fn test_channel_subscriber_receives_events() {
        init_logging();
        let (listener, config) = FakeHost::listen();
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let host = thread::spawn(move || {
            let mut host = FakeHost::accept(&listener);
            go_rx.recv().unwrap();
            host.send(Opcode::PutGet, signon_payload());
            go_rx.recv().unwrap();
        });

        let session = Session::connect(&config).unwrap();
        let mut receiver = session.subscribe_channel();
        go_tx.send(()).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("no event within 5s")
            .unwrap();
        assert_eq!(event, ScreenEvent::SizeChanged { rows: 24, cols: 80 });
        let event = receiver.recv().await.unwrap();
        assert!(matches!(event, ScreenEvent::Changed { ref rows, .. } if rows.len() == 24));

        go_tx.send(()).unwrap();
        session.disconnect();
        host.join().unwrap();
    }
}
