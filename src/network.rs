//! TCP and TLS transport for TN5250E sessions
//!
//! [`Transport`] owns the socket. Reads poll with a short socket timeout so a
//! blocked reader notices `shutdown()` and lets writers through on TLS
//! streams, where reading and writing share one rustls connection.

use std::fs;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::{debug, info, warn};
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

use crate::error::ConnectionError;

/// Socket read timeout used to poll for shutdown and pending writes
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Upper bound on a CA bundle read from disk
const MAX_CA_BUNDLE_LEN: u64 = 10_000_000;

/// Trust anchors for TLS connections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsOptions {
    /// PEM or DER bundle; when set it replaces the built-in roots
    pub ca_bundle: Option<PathBuf>,
}

enum Stream {
    Plain(TcpStream),
    Tls(Mutex<StreamOwned<ClientConnection, TcpStream>>),
}

pub struct Transport {
    stream: Stream,
    /// Handle used to shut the socket down from another thread
    socket: TcpStream,
    closed: AtomicBool,
    pending_writes: AtomicUsize,
    peer: String,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("peer", &self.peer)
            .field("tls", &self.is_tls())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Transport {
    /// Resolve, connect within `connect_timeout`, and run the TLS handshake
    /// when `tls` is given
    pub fn connect(
        host: &str,
        port: u16,
        tls: Option<&TlsOptions>,
        connect_timeout: Duration,
    ) -> Result<Arc<Self>, ConnectionError> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|_| ConnectionError::DnsResolution { host: host.to_string() })?
            .collect();
        if addrs.is_empty() {
            return Err(ConnectionError::DnsResolution { host: host.to_string() });
        }

        let mut last_error = None;
        let mut tcp = None;
        for addr in &addrs {
            match TcpStream::connect_timeout(addr, connect_timeout) {
                Ok(stream) => {
                    tcp = Some(stream);
                    break;
                }
                Err(e) => {
                    debug!("connect to {} failed: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }
        let tcp = tcp.ok_or_else(|| ConnectionError::ConnectFailed {
            host: host.to_string(),
            port,
            source: last_error.unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address")),
        })?;
        info!("connected to {}:{}{}", host, port, if tls.is_some() { " (TLS)" } else { "" });

        match tls {
            Some(options) => Self::wrap_tls(tcp, host, options, connect_timeout),
            None => Self::from_tcp(tcp),
        }
    }

    /// Plain transport over an established socket
    pub fn from_tcp(tcp: TcpStream) -> Result<Arc<Self>, ConnectionError> {
        tcp.set_nodelay(true)?;
        tcp.set_read_timeout(Some(POLL_INTERVAL))?;
        let socket = tcp.try_clone()?;
        let peer = peer_name(&tcp);
        Ok(Arc::new(Self {
            stream: Stream::Plain(tcp),
            socket,
            closed: AtomicBool::new(false),
            pending_writes: AtomicUsize::new(0),
            peer,
        }))
    }

    fn wrap_tls(
        tcp: TcpStream,
        host: &str,
        options: &TlsOptions,
        handshake_timeout: Duration,
    ) -> Result<Arc<Self>, ConnectionError> {
        let config = build_client_config(options)?;
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| ConnectionError::Tls { message: format!("invalid server name: {host}") })?;
        let mut connection = ClientConnection::new(Arc::new(config), server_name)
            .map_err(|e| ConnectionError::Tls { message: e.to_string() })?;

        tcp.set_nodelay(true)?;
        tcp.set_read_timeout(Some(handshake_timeout))?;
        let mut handshake_socket = tcp.try_clone()?;
        while connection.is_handshaking() {
            connection
                .complete_io(&mut handshake_socket)
                .map_err(|e| ConnectionError::Tls { message: format!("handshake failed: {e}") })?;
        }
        debug!(
            "TLS established: {:?} {:?}",
            connection.protocol_version(),
            connection.negotiated_cipher_suite().map(|s| s.suite())
        );

        tcp.set_read_timeout(Some(POLL_INTERVAL))?;
        let socket = tcp.try_clone()?;
        let peer = peer_name(&tcp);
        Ok(Arc::new(Self {
            stream: Stream::Tls(Mutex::new(StreamOwned::new(connection, tcp))),
            socket,
            closed: AtomicBool::new(false),
            pending_writes: AtomicUsize::new(0),
            peer,
        }))
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn is_tls(&self) -> bool {
        matches!(self.stream, Stream::Tls(_))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Block until bytes arrive, the peer closes, or `shutdown` is called.
    /// Returns `Ok(None)` if `deadline` passes first.
    pub fn read(&self, buf: &mut [u8], deadline: Option<Instant>) -> Result<Option<usize>, ConnectionError> {
        loop {
            if self.is_closed() {
                return Err(ConnectionError::Closed);
            }
            if deadline.map_or(false, |d| Instant::now() >= d) {
                return Ok(None);
            }

            let result = match &self.stream {
                Stream::Plain(tcp) => (&*tcp).read(buf),
                Stream::Tls(stream) => {
                    while self.pending_writes.load(Ordering::SeqCst) > 0 {
                        thread::yield_now();
                    }
                    stream.lock().unwrap_or_else(PoisonError::into_inner).read(buf)
                }
            };

            match result {
                Ok(0) => {
                    self.closed.store(true, Ordering::SeqCst);
                    return Err(ConnectionError::Closed);
                }
                Ok(n) => return Ok(Some(n)),
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => continue,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    if self.is_closed() {
                        return Err(ConnectionError::Closed);
                    }
                    return Err(e.into());
                }
            }
        }
    }

    pub fn write_all(&self, data: &[u8]) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        let result = match &self.stream {
            Stream::Plain(tcp) => (&*tcp).write_all(data).and_then(|_| (&*tcp).flush()),
            Stream::Tls(stream) => {
                self.pending_writes.fetch_add(1, Ordering::SeqCst);
                let result = {
                    let mut guard = stream.lock().unwrap_or_else(PoisonError::into_inner);
                    guard.write_all(data).and_then(|_| guard.flush())
                };
                self.pending_writes.fetch_sub(1, Ordering::SeqCst);
                result
            }
        };
        result.map_err(ConnectionError::from)
    }

    /// Close both directions; blocked and future reads return `Closed`
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Stream::Tls(stream) = &self.stream {
            if let Ok(mut guard) = stream.try_lock() {
                guard.conn.send_close_notify();
                let _ = guard.flush();
            }
        }
        if let Err(e) = self.socket.shutdown(Shutdown::Both) {
            debug!("socket shutdown for {}: {}", self.peer, e);
        }
        info!("connection to {} closed", self.peer);
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if !self.is_closed() {
            let _ = self.socket.shutdown(Shutdown::Both);
        }
    }
}

fn peer_name(tcp: &TcpStream) -> String {
    tcp.peer_addr().map(|a| a.to_string()).unwrap_or_else(|_| "unknown".to_string())
}

/// rustls client config: the CA bundle if one is given, else the
/// platform's trust store plus the bundled webpki roots
pub fn build_client_config(options: &TlsOptions) -> Result<ClientConfig, ConnectionError> {
    let roots = build_root_store(options)?;
    Ok(ClientConfig::builder().with_root_certificates(roots).with_no_client_auth())
}

fn build_root_store(options: &TlsOptions) -> Result<RootCertStore, ConnectionError> {
    let mut roots = RootCertStore::empty();

    if let Some(path) = &options.ca_bundle {
        let certs = load_ca_bundle(path)?;
        let (added, ignored) = roots.add_parsable_certificates(certs);
        if added == 0 {
            return Err(ConnectionError::Tls {
                message: format!("no usable certificates in CA bundle {}", path.display()),
            });
        }
        debug!("CA bundle {}: {} added, {} ignored", path.display(), added, ignored);
        return Ok(roots);
    }

    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            let (added, ignored) = roots.add_parsable_certificates(certs);
            debug!("platform trust store: {} added, {} ignored", added, ignored);
        }
        Err(e) => warn!("could not load platform certificates: {}", e),
    }
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    Ok(roots)
}

/// Certificates from a DER file or a PEM bundle
pub fn load_ca_bundle(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConnectionError> {
    let tls_error = |message: String| ConnectionError::Tls { message };
    let metadata = fs::metadata(path).map_err(|e| tls_error(format!("{}: {e}", path.display())))?;
    if metadata.len() > MAX_CA_BUNDLE_LEN {
        return Err(tls_error(format!("CA bundle {} is too large", path.display())));
    }
    let bytes = fs::read(path).map_err(|e| tls_error(format!("{}: {e}", path.display())))?;
    parse_certificates(&bytes).map_err(tls_error)
}

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

fn parse_certificates(bytes: &[u8]) -> Result<Vec<CertificateDer<'static>>, String> {
    let Ok(text) = std::str::from_utf8(bytes) else {
        // Binary input is a single DER certificate
        return Ok(vec![CertificateDer::from(bytes.to_vec())]);
    };
    if !text.contains(PEM_BEGIN) {
        return Err("no PEM certificate found".to_string());
    }

    let mut certs = Vec::new();
    let mut rest = text;
    while let Some(begin) = rest.find(PEM_BEGIN) {
        let body_start = begin + PEM_BEGIN.len();
        let Some(end) = rest[body_start..].find(PEM_END) else {
            return Err("unterminated PEM certificate".to_string());
        };
        let body: String = rest[body_start..body_start + end].split_whitespace().collect();
        let der = BASE64.decode(body.as_bytes()).map_err(|e| format!("invalid certificate encoding: {e}"))?;
        certs.push(CertificateDer::from(der));
        rest = &rest[body_start + end + PEM_END.len()..];
    }
    Ok(certs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn pair() -> (Arc<Transport>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let transport = Transport::connect("127.0.0.1", port, None, Duration::from_secs(5)).unwrap();
        let (server, _) = listener.accept().unwrap();
        (transport, server)
    }

    #[test]
    fn test_plain_round_trip() {
        let (transport, mut server) = pair();
        assert!(!transport.is_tls());
        transport.write_all(b"hello").unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        server.write_all(b"world").unwrap();
        let mut buf = [0u8; 16];
        let n = transport.read(&mut buf, None).unwrap().unwrap();
        assert_eq!(&buf[..n], b"world");
    }

    #[test]
    fn test_read_deadline() {
        let (transport, _server) = pair();
        let mut buf = [0u8; 16];
        let started = Instant::now();
        let result = transport.read(&mut buf, Some(Instant::now() + Duration::from_millis(120))).unwrap();
        assert_eq!(result, None);
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_shutdown_unblocks_reader() {
        let (transport, _server) = pair();
        let reader = Arc::clone(&transport);
        let handle = thread::spawn(move || {
            let mut buf = [0u8; 16];
            reader.read(&mut buf, None)
        });
        thread::sleep(Duration::from_millis(100));
        transport.shutdown();
        assert!(matches!(handle.join().unwrap(), Err(ConnectionError::Closed)));
        assert!(matches!(transport.write_all(b"x"), Err(ConnectionError::Closed)));
    }

    #[test]
    fn test_peer_close() {
        let (transport, server) = pair();
        drop(server);
        let mut buf = [0u8; 16];
        assert!(matches!(transport.read(&mut buf, None), Err(ConnectionError::Closed)));
        assert!(transport.is_closed());
    }

    #[test]
    fn test_dns_failure() {
        let result = Transport::connect("host.invalid", 23, None, Duration::from_secs(1));
        assert!(matches!(result, Err(ConnectionError::DnsResolution { .. })));
    }

    #[test]
    fn test_pem_parsing() {
        let pem = format!("{PEM_BEGIN}\nAQID\nBA==\n{PEM_END}\n{PEM_BEGIN}\nBQY=\n{PEM_END}\n");
        let certs = parse_certificates(pem.as_bytes()).unwrap();
        assert_eq!(certs.len(), 2);
        assert_eq!(certs[0].to_vec(), vec![1, 2, 3, 4]);
        assert_eq!(certs[1].to_vec(), vec![5, 6]);

        assert!(parse_certificates(b"not a certificate").is_err());
        assert!(parse_certificates(format!("{PEM_BEGIN}\n!!!\n{PEM_END}").as_bytes()).is_err());
    }

    #[test]
    fn test_empty_ca_bundle_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.pem");
        fs::write(&path, format!("{PEM_BEGIN}\nAQID\n{PEM_END}\n")).unwrap();
        let options = TlsOptions { ca_bundle: Some(path) };
        assert!(matches!(build_client_config(&options), Err(ConnectionError::Tls { .. })));
    }
}
