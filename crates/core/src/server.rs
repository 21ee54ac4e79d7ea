//! Single-session streaming server.
//!
//! The server accepts exactly one control connection and serves it for the
//! rest of the process lifetime: TEARDOWN (or a control-channel failure)
//! ends [`Server::serve`] rather than returning to accept. Control requests
//! are read on the calling thread; frame delivery runs on a separate sender
//! thread paced by the wall clock (see [`crate::sender`]).

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::error::{ProtocolErrorKind, Result, StreamError};
use crate::media::FrameReader;
use crate::protocol::{DispatchOutcome, Request, RequestDispatcher, ServerAction};
use crate::sender::RtpSender;
use crate::session::StopFlag;

/// Upper bound on one control message, mirroring the read chunking on the
/// client side. One read is one message; the protocol has no terminator.
const CONTROL_READ_LEN: usize = 256;

/// Streaming server bound to a control port.
pub struct Server {
    listener: TcpListener,
}

impl Server {
    /// Bind the control listener on all interfaces.
    pub fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        tracing::info!(addr = %listener.local_addr()?, "control channel listening");
        Ok(Self { listener })
    }

    /// Actual bound address (useful when bound to port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept one client and serve it until teardown or connection loss.
    ///
    /// Control-channel I/O errors and protocol violations are fatal and
    /// propagate to the caller after the data loop has been stopped.
    pub fn serve(&self) -> Result<()> {
        let (stream, peer) = self.listener.accept()?;
        tracing::info!(%peer, "client connected");

        let mut connection = Connection {
            dispatcher: RequestDispatcher::new(peer.ip()),
            stream,
            sender: None,
        };

        let result = connection.run();
        connection.shutdown();

        tracing::info!(%peer, ok = result.is_ok(), "client session ended");
        result
    }
}

/// The single control connection and its streaming thread.
struct Connection {
    stream: TcpStream,
    dispatcher: RequestDispatcher,
    sender: Option<JoinHandle<()>>,
}

impl Connection {
    fn run(&mut self) -> Result<()> {
        let mut buf = [0u8; CONTROL_READ_LEN];

        loop {
            let n = self.stream.read(&mut buf)?;
            if n == 0 {
                tracing::info!("control connection closed by client");
                return Ok(());
            }

            let text = std::str::from_utf8(&buf[..n]).map_err(|_| StreamError::Protocol {
                kind: ProtocolErrorKind::InvalidEncoding,
            })?;
            let request = Request::parse(text.trim())?;
            tracing::debug!(sequence = request.sequence, command = ?request.command.kind(), "request");

            let DispatchOutcome { reply, action } = self.dispatcher.dispatch(&request);

            if let Some(reply) = reply {
                tracing::debug!(reply = %reply.encode(), "reply");
                self.stream.write_all(reply.encode().as_bytes())?;
            }

            match action {
                Some(ServerAction::StartStreaming { video, dest }) => {
                    self.start_streaming(video, dest)?;
                }
                Some(ServerAction::Shutdown) => return Ok(()),
                None => {}
            }
        }
    }

    fn start_streaming(&mut self, video: Arc<Mutex<FrameReader>>, dest: SocketAddr) -> Result<()> {
        let stop = self.dispatcher.stop_flag();

        // At most one sender per session: retire the previous burst before
        // re-arming the flag for the new one.
        self.join_sender(&stop);
        stop.clear();

        let sender = RtpSender::new(dest, video, stop)?;
        self.sender = Some(sender.spawn());
        Ok(())
    }

    fn join_sender(&mut self, stop: &StopFlag) {
        if let Some(handle) = self.sender.take() {
            stop.set();
            if handle.join().is_err() {
                tracing::warn!("sender thread panicked");
            }
        }
    }

    fn shutdown(&mut self) {
        let stop = self.dispatcher.stop_flag();
        self.join_sender(&stop);
        stop.set();
    }
}
