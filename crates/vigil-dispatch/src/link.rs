//! ZeroMQ DEALER link to the external worker process

use tracing::{debug, info};
use vigil_core::{Error, Result};

/// One inbound frame set: correlation id plus reply payload.
#[derive(Debug)]
pub struct InboundFrame {
    pub correlation_id: String,
    pub payload: Vec<u8>,
}

/// Exclusive owner of the socket to the worker.
///
/// Jobs go out as `[correlation_id, "", payload]` multipart messages; the
/// worker echoes the correlation id back on its reply. All socket
/// operations are non-blocking so the dispatcher's poll loop never stalls
/// on the transport.
pub struct WorkerLink {
    // Context must outlive the socket; dropping both tears the link down.
    _context: zmq::Context,
    socket: zmq::Socket,
}

impl WorkerLink {
    /// Connect a DEALER socket to the worker endpoint.
    pub fn connect(endpoint: &str) -> Result<Self> {
        let context = zmq::Context::new();
        let socket = context
            .socket(zmq::DEALER)
            .map_err(|e| Error::Transport(format!("failed to create worker socket: {e}")))?;
        socket
            .connect(endpoint)
            .map_err(|e| Error::Transport(format!("failed to connect to {endpoint}: {e}")))?;

        info!(endpoint = %endpoint, "Worker link connected");

        Ok(Self {
            _context: context,
            socket,
        })
    }

    /// Write one framed job without blocking.
    ///
    /// A full outbound queue surfaces as a transport error to the submitter
    /// rather than stalling the dispatcher.
    pub fn send(&self, correlation_id: &str, payload: &[u8]) -> Result<()> {
        let frames: [&[u8]; 3] = [correlation_id.as_bytes(), b"", payload];
        self.socket
            .send_multipart(frames, zmq::DONTWAIT)
            .map_err(|e| Error::Transport(format!("worker send failed: {e}")))
    }

    /// Read one framed reply if available.
    ///
    /// Returns `Ok(None)` when no message is waiting. Frames missing a
    /// payload are reported as transport errors and dropped by the caller.
    pub fn try_recv(&self) -> Result<Option<InboundFrame>> {
        let frames = match self.socket.recv_multipart(zmq::DONTWAIT) {
            Ok(frames) => frames,
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(Error::Transport(format!("worker receive failed: {e}"))),
        };

        // Expected layout: [correlation_id, "", payload]. Tolerate a
        // missing delimiter frame from older workers.
        let mut frames = frames.into_iter().filter(|f| !f.is_empty());
        let correlation_id = frames
            .next()
            .map(|f| String::from_utf8_lossy(&f).into_owned())
            .ok_or_else(|| Error::Transport("empty reply message".into()))?;
        let payload = frames
            .next()
            .ok_or_else(|| Error::Transport("reply message missing payload frame".into()))?;

        debug!(
            correlation_id = %correlation_id,
            bytes = payload.len(),
            "Received worker reply"
        );

        Ok(Some(InboundFrame {
            correlation_id,
            payload,
        }))
    }
}
