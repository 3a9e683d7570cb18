use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use crate::wire::messages::{Request, ResponseEnvelope, TypedResponse};
use crate::wire::{from_ascii_bytes, to_ascii_bytes, INVALID_REQUEST_REPLY, READ_BUFFER_SIZE_BYTES};

pub type TransportFailureHandler = Arc<dyn Fn() + Send + Sync>;

/// Synchronous request/response client for one worker endpoint. Every call
/// opens its own connection and blocks the caller for one round trip. All
/// failures degrade to `None`; connect/write/read failures additionally
/// invoke the transport-failure handler so the owner can react between
/// heartbeat probes.
pub struct RpcClient {
    target: SocketAddr,
    timeout: Duration,
    on_transport_failure: TransportFailureHandler,
}

impl RpcClient {
    pub fn new(
        target: SocketAddr,
        timeout: Duration,
        on_transport_failure: TransportFailureHandler,
    ) -> Self {
        Self {
            target,
            timeout,
            on_transport_failure,
        }
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn call<R: TypedResponse>(&self, request: &Request) -> Option<R> {
        let encoded = serde_json::to_string(request).ok()?;

        let reply_bytes = match self.exchange(&encoded) {
            Ok(bytes) => bytes,
            Err(_) => {
                (self.on_transport_failure)();
                return None;
            }
        };

        let raw = from_ascii_bytes(&reply_bytes).ok()?;
        if raw == INVALID_REQUEST_REPLY {
            return None;
        }

        let envelope: ResponseEnvelope = serde_json::from_str(raw).ok()?;
        if envelope.response != R::KIND {
            return None;
        }

        serde_json::from_str(raw).ok()
    }

    fn exchange(&self, encoded: &str) -> io::Result<Vec<u8>> {
        let mut stream = TcpStream::connect_timeout(&self.target, self.timeout)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        stream.write_all(&to_ascii_bytes(encoded))?;

        let mut buffer = [0_u8; READ_BUFFER_SIZE_BYTES];
        let received = stream.read(&mut buffer)?;
        if received == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before a reply arrived",
            ));
        }

        Ok(buffer[..received].to_vec())
    }
}
