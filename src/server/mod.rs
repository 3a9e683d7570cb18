use std::fmt;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::logging::Logger;
use crate::wire::{from_ascii_bytes, to_ascii_bytes, INVALID_REQUEST_REPLY, READ_BUFFER_SIZE_BYTES};

pub type RequestHandler = Arc<dyn Fn(&str) -> String + Send + Sync>;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub enum ServerError {
    Bind {
        address: String,
        source: io::Error,
    },
    SetNonBlocking {
        source: io::Error,
    },
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind { address, source } => {
                write!(f, "failed to bind dispatch server on {address}: {source}")
            }
            Self::SetNonBlocking { source } => {
                write!(f, "failed to set dispatch listener to non-blocking mode: {source}")
            }
        }
    }
}

impl std::error::Error for ServerError {}

/// Worker-side accept loop. Each accepted connection gets its own thread
/// running a read-decode-handle-write cycle until the peer closes it; a
/// failed accept is logged and never terminates the listener. The handler
/// runs inline on the connection thread and must return promptly.
pub struct DispatchServer {
    listener: TcpListener,
    logger: Arc<Logger>,
}

impl DispatchServer {
    pub fn bind(host: &str, port: u16, logger: Arc<Logger>) -> Result<Self, ServerError> {
        let address = format!("{host}:{port}");
        let listener = TcpListener::bind(&address)
            .map_err(|source| ServerError::Bind { address, source })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| ServerError::SetNonBlocking { source })?;

        Ok(Self { listener, logger })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn serve(&self, handler: RequestHandler, stop: Arc<AtomicBool>) {
        while !stop.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer_addr)) => {
                    self.logger.debug(
                        Some("server::accept"),
                        &format!("accepted connection from {peer_addr}"),
                    );
                    let handler = Arc::clone(&handler);
                    let logger = Arc::clone(&self.logger);
                    thread::spawn(move || connection_loop(stream, peer_addr, handler, logger));
                }
                Err(source) if source.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(source) => {
                    self.logger.warn(
                        Some("server::accept"),
                        &format!("accept failed: {source}; listener continues"),
                    );
                }
            }
        }
    }
}

fn connection_loop(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    handler: RequestHandler,
    logger: Arc<Logger>,
) {
    // accepted streams inherit the listener's non-blocking flag on some
    // platforms; the per-connection loop wants plain blocking reads
    if let Err(source) = stream.set_nonblocking(false) {
        logger.warn(
            Some("server::connection"),
            &format!("failed to configure stream for {peer_addr}: {source}"),
        );
        return;
    }

    let mut buffer = [0_u8; READ_BUFFER_SIZE_BYTES];
    loop {
        let received = match stream.read(&mut buffer) {
            Ok(0) => {
                logger.debug(
                    Some("server::connection"),
                    &format!("peer {peer_addr} closed the connection"),
                );
                break;
            }
            Ok(received) => received,
            Err(source) => {
                logger.debug(
                    Some("server::connection"),
                    &format!("read from {peer_addr} failed: {source}"),
                );
                break;
            }
        };

        let reply = match from_ascii_bytes(&buffer[..received]) {
            Ok(text) => handler(text),
            Err(_) => INVALID_REQUEST_REPLY.to_owned(),
        };

        if let Err(source) = stream.write_all(&to_ascii_bytes(&reply)) {
            logger.debug(
                Some("server::connection"),
                &format!("write to {peer_addr} failed: {source}"),
            );
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use crate::logging::{Logger, LoggerConfig};
    use crate::wire::{INVALID_REQUEST_REPLY, READ_BUFFER_SIZE_BYTES};

    use super::{DispatchServer, RequestHandler};

    fn quiet_logger() -> Arc<Logger> {
        Arc::new(Logger::new(LoggerConfig {
            min_level: crate::logging::LogLevel::Error,
            human_friendly: false,
        }))
    }

    fn start_server(handler: RequestHandler) -> (std::net::SocketAddr, Arc<AtomicBool>, thread::JoinHandle<()>) {
        let server = Arc::new(
            DispatchServer::bind("127.0.0.1", 0, quiet_logger()).expect("server should bind"),
        );
        let addr = server.local_addr().expect("server addr should exist");
        let stop = Arc::new(AtomicBool::new(false));

        let serve_stop = Arc::clone(&stop);
        let serve_server = Arc::clone(&server);
        let worker = thread::spawn(move || {
            serve_server.serve(handler, serve_stop);
        });

        (addr, stop, worker)
    }

    fn round_trip(stream: &mut TcpStream, request: &str) -> String {
        stream
            .write_all(request.as_bytes())
            .expect("request write should pass");
        let mut buffer = [0_u8; READ_BUFFER_SIZE_BYTES];
        let received = stream.read(&mut buffer).expect("reply read should pass");
        String::from_utf8(buffer[..received].to_vec()).expect("reply should be text")
    }

    #[test]
    fn one_connection_carries_sequential_round_trips_in_order() {
        let handler: RequestHandler = Arc::new(|request| format!("echo:{request}"));
        let (addr, stop, worker) = start_server(handler);

        let mut stream = TcpStream::connect(addr).expect("client should connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("read timeout should apply");

        for n in 0..3 {
            let request = format!("message-{n}");
            let reply = round_trip(&mut stream, &request);
            assert_eq!(reply, format!("echo:message-{n}"));
        }

        stop.store(true, Ordering::SeqCst);
        worker.join().expect("serve thread should exit");
    }

    #[test]
    fn peer_close_stops_handler_invocations_for_that_connection() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let handler_calls = Arc::clone(&calls);
        let handler: RequestHandler = Arc::new(move |request| {
            handler_calls.fetch_add(1, Ordering::SeqCst);
            request.to_owned()
        });
        let (addr, stop, worker) = start_server(handler);

        let mut stream = TcpStream::connect(addr).expect("client should connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("read timeout should apply");
        let _ = round_trip(&mut stream, "only-message");
        drop(stream);

        thread::sleep(Duration::from_millis(150));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        stop.store(true, Ordering::SeqCst);
        worker.join().expect("serve thread should exit");
    }

    #[test]
    fn concurrent_connections_are_served_independently() {
        let handler: RequestHandler = Arc::new(|request| request.to_uppercase());
        let (addr, stop, worker) = start_server(handler);

        let mut first = TcpStream::connect(addr).expect("first client should connect");
        let mut second = TcpStream::connect(addr).expect("second client should connect");
        for stream in [&first, &second] {
            stream
                .set_read_timeout(Some(Duration::from_secs(2)))
                .expect("read timeout should apply");
        }

        // interleave the two connections; neither blocks the other
        assert_eq!(round_trip(&mut first, "alpha"), "ALPHA");
        assert_eq!(round_trip(&mut second, "beta"), "BETA");
        assert_eq!(round_trip(&mut first, "gamma"), "GAMMA");

        stop.store(true, Ordering::SeqCst);
        worker.join().expect("serve thread should exit");
    }

    #[test]
    fn non_ascii_bytes_are_answered_with_the_sentinel() {
        let handler: RequestHandler = Arc::new(|request| request.to_owned());
        let (addr, stop, worker) = start_server(handler);

        let mut stream = TcpStream::connect(addr).expect("client should connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("read timeout should apply");

        stream
            .write_all(&[0xff, 0xfe, 0x01])
            .expect("raw write should pass");
        let mut buffer = [0_u8; READ_BUFFER_SIZE_BYTES];
        let received = stream.read(&mut buffer).expect("reply read should pass");
        assert_eq!(&buffer[..received], INVALID_REQUEST_REPLY.as_bytes());

        stop.store(true, Ordering::SeqCst);
        worker.join().expect("serve thread should exit");
    }
}
