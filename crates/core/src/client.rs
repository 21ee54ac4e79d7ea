//! Headless streaming client.
//!
//! The client is split into a pure state machine ([`ClientCore`]) and a
//! driver ([`Client`]) that owns the sockets and threads. The core gates
//! outgoing requests by the legality table — an illegal PLAY or PAUSE is
//! dropped before it reaches the wire — matches replies to requests by
//! echoed sequence number and session id, and expresses follow-up work as
//! data so it can be tested without a network.
//!
//! There is no rendering dependency: decoded frame bytes and user-visible
//! failures are delivered over a channel of [`StreamEvent`] to whatever
//! presentation layer is attached.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, UdpSocket};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

use crate::error::{ProtocolErrorKind, Result, StreamError};
use crate::protocol::{Command, Reply, Request, RequestKind};
use crate::receiver::{RECV_TIMEOUT, RtpReceiver};
use crate::session::{self, Session, SessionState, StopFlag};

/// Upper bound on one control reply read.
const REPLY_READ_LEN: usize = 1024;

/// Connection parameters for a client session.
///
/// Defaults mirror the documented CLI defaults.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server host name or address.
    pub server_host: String,
    /// Server control port.
    pub server_port: u16,
    /// Local port to receive the data channel on.
    pub data_port: u16,
    /// Video file to request.
    pub file_name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 7777,
            data_port: 7778,
            file_name: "movie.Mjpeg".to_string(),
        }
    }
}

/// What the protocol core delivers to the attached presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// An accepted, in-order frame from the data channel.
    Frame { sequence: u16, payload: Vec<u8> },
    /// The server replied 404; the session stays in Init and SETUP may be
    /// retried.
    SetupFailed { file_name: String },
    /// The server replied 500.
    ServerError,
    /// The data-channel port could not be bound; the session cannot reach
    /// Playing.
    BindFailed { port: u16 },
    /// Teardown completed or the control connection was lost.
    Closed,
}

/// Follow-up work a processed reply requires from the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyEffect {
    /// 200-to-SETUP: bind the data socket and automatically issue PLAY.
    SessionReady,
    /// 404: surface the failure to the presentation layer.
    ReportNotFound,
    /// 500: surface the failure to the presentation layer.
    ReportServerError,
    /// 200-to-TEARDOWN: shut the control connection down.
    CloseConnection,
}

/// The client half of the session state machine. No I/O.
struct ClientCore {
    session: Session,
    /// Which request the next matching reply answers.
    pending: Option<RequestKind>,
    stop: StopFlag,
    file_name: String,
    data_port: u16,
}

impl ClientCore {
    fn new(file_name: String, data_port: u16, stop: StopFlag) -> Self {
        Self {
            session: Session::new(),
            pending: None,
            stop,
            file_name,
            data_port,
        }
    }

    /// Gate and number an outgoing request.
    ///
    /// Returns `None` — nothing to send — when the request is illegal in
    /// the current state.
    fn compose_request(&mut self, kind: RequestKind) -> Option<Request> {
        if !session::request_allowed(kind, self.session.state) {
            tracing::debug!(?kind, state = ?self.session.state, "request dropped");
            return None;
        }

        self.session.last_sequence += 1;
        self.pending = Some(kind);

        let command = match kind {
            RequestKind::Setup => Command::Setup {
                file_name: self.file_name.clone(),
                data_port: self.data_port,
            },
            RequestKind::Play => Command::Play,
            RequestKind::Pause => Command::Pause,
            RequestKind::Teardown => Command::Teardown,
        };

        Some(Request {
            sequence: self.session.last_sequence,
            command,
        })
    }

    /// Process one reply, returning the effects the driver must execute.
    ///
    /// A reply is accepted only when its echoed sequence number matches the
    /// most recent request and — once a session id is known — its session id
    /// matches too; anything stale or foreign is ignored. 200-to-PAUSE and
    /// 200-to-TEARDOWN set the cancellation flag here, on the control
    /// thread, the flag's only writer.
    fn handle_reply(&mut self, reply: &Reply) -> Vec<ReplyEffect> {
        match *reply {
            Reply::Ok {
                sequence,
                session_id,
            } => {
                if sequence != self.session.last_sequence {
                    tracing::debug!(
                        sequence,
                        expected = self.session.last_sequence,
                        "stale reply ignored"
                    );
                    return Vec::new();
                }

                self.session.assign_id(session_id);
                if self.session.id() != Some(session_id) {
                    tracing::warn!(session_id, "reply for foreign session ignored");
                    return Vec::new();
                }

                match self.pending {
                    Some(RequestKind::Setup) => {
                        self.session.set_state(SessionState::Ready);
                        vec![ReplyEffect::SessionReady]
                    }
                    Some(RequestKind::Play) => {
                        self.session.set_state(SessionState::Playing);
                        Vec::new()
                    }
                    Some(RequestKind::Pause) => {
                        self.session.set_state(SessionState::Ready);
                        self.stop.set();
                        Vec::new()
                    }
                    Some(RequestKind::Teardown) => {
                        self.session.set_state(SessionState::Ready);
                        self.stop.set();
                        vec![ReplyEffect::CloseConnection]
                    }
                    None => Vec::new(),
                }
            }
            Reply::NotFound => {
                tracing::warn!(file_name = %self.file_name, "server has no such file");
                vec![ReplyEffect::ReportNotFound]
            }
            Reply::ServerError => {
                tracing::error!("server reported an internal error");
                vec![ReplyEffect::ReportServerError]
            }
        }
    }
}

/// Where this session's receive loop currently lives.
enum ReceiverSlot {
    /// No data socket bound yet (or binding failed).
    Empty,
    /// Bound and idle between play bursts.
    Parked(RtpReceiver),
    /// Loop running (or finished and waiting to be joined).
    Running(JoinHandle<RtpReceiver>),
}

/// State shared between the caller, the reply-reader thread, and the
/// receive loop.
struct ClientInner {
    core: Mutex<ClientCore>,
    control: Mutex<TcpStream>,
    stop: StopFlag,
    events_tx: Sender<StreamEvent>,
    receiver: Mutex<ReceiverSlot>,
    data_port: u16,
}

impl ClientInner {
    /// Compose, gate, and transmit one request.
    fn send(&self, kind: RequestKind) -> Result<()> {
        let request = match self.core.lock().compose_request(kind) {
            Some(request) => request,
            None => return Ok(()),
        };

        if kind == RequestKind::Play && !self.start_receiver() {
            tracing::warn!("no data socket bound, PLAY suppressed");
            return Ok(());
        }

        let encoded = request.encode();
        self.control.lock().write_all(encoded.as_bytes())?;
        tracing::debug!(message = %encoded, "request sent");
        Ok(())
    }

    /// Ensure the receive loop is running before PLAY goes out.
    ///
    /// A parked receiver is spawned; one left over from a previous burst is
    /// joined first so the socket and the running sequence maximum carry
    /// over. Returns false when no data socket was ever bound.
    fn start_receiver(&self) -> bool {
        let mut slot = self.receiver.lock();
        match std::mem::replace(&mut *slot, ReceiverSlot::Empty) {
            ReceiverSlot::Parked(receiver) => {
                self.stop.clear();
                *slot = ReceiverSlot::Running(receiver.spawn());
                true
            }
            ReceiverSlot::Running(handle) => {
                self.stop.set();
                match handle.join() {
                    Ok(receiver) => {
                        self.stop.clear();
                        *slot = ReceiverSlot::Running(receiver.spawn());
                        true
                    }
                    Err(_) => {
                        tracing::warn!("receiver thread panicked");
                        false
                    }
                }
            }
            ReceiverSlot::Empty => false,
        }
    }

    /// Stop and reap the receive loop, if any.
    fn stop_receiver(&self) {
        self.stop.set();
        let mut slot = self.receiver.lock();
        if let ReceiverSlot::Running(handle) = std::mem::replace(&mut *slot, ReceiverSlot::Empty)
            && handle.join().is_err()
        {
            tracing::warn!("receiver thread panicked");
        }
    }
}

/// A connected streaming client.
///
/// `connect` establishes the control channel; `setup` starts the protocol
/// handshake (a successful SETUP automatically binds the data socket and
/// issues PLAY). Frames and failures arrive on [`Client::events`].
pub struct Client {
    inner: Arc<ClientInner>,
    events: Receiver<StreamEvent>,
    reader: Option<JoinHandle<()>>,
}

impl Client {
    /// Connect the control channel and start the reply reader.
    ///
    /// A connect failure is fatal and returned to the caller; there is no
    /// retry in the single-session design.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let stream = TcpStream::connect((config.server_host.as_str(), config.server_port))?;
        tracing::info!(
            host = %config.server_host,
            port = config.server_port,
            "control channel connected"
        );
        let reader_stream = stream.try_clone()?;

        let stop = StopFlag::new();
        let (events_tx, events) = unbounded();
        let inner = Arc::new(ClientInner {
            core: Mutex::new(ClientCore::new(
                config.file_name,
                config.data_port,
                stop.clone(),
            )),
            control: Mutex::new(stream),
            stop,
            events_tx,
            receiver: Mutex::new(ReceiverSlot::Empty),
            data_port: config.data_port,
        });

        let reader = thread::spawn({
            let inner = inner.clone();
            move || reply_loop(&inner, reader_stream)
        });

        Ok(Self {
            inner,
            events,
            reader: Some(reader),
        })
    }

    /// Request session setup. No-op outside Init.
    pub fn setup(&self) -> Result<()> {
        self.inner.send(RequestKind::Setup)
    }

    /// Request playback. No-op outside Ready.
    pub fn play(&self) -> Result<()> {
        self.inner.send(RequestKind::Play)
    }

    /// Request pause. No-op outside Playing.
    pub fn pause(&self) -> Result<()> {
        self.inner.send(RequestKind::Pause)
    }

    /// Request teardown. Always dispatched.
    pub fn teardown(&self) -> Result<()> {
        self.inner.send(RequestKind::Teardown)
    }

    /// Stream of frames and user-visible failures for the presentation
    /// layer. Ends with [`StreamEvent::Closed`].
    pub fn events(&self) -> &Receiver<StreamEvent> {
        &self.events
    }

    /// Wait for the session to finish and reap both threads.
    pub fn join(mut self) {
        if let Some(handle) = self.reader.take()
            && handle.join().is_err()
        {
            tracing::warn!("reply reader thread panicked");
        }
        self.inner.stop_receiver();
    }
}

/// Control-channel reply loop: runs until teardown completes, the server
/// disconnects, or a protocol violation forces a teardown.
fn reply_loop(inner: &Arc<ClientInner>, mut stream: TcpStream) {
    let mut buf = [0u8; REPLY_READ_LEN];

    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => {
                tracing::info!("control connection closed by server");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                if !inner.stop.is_set() {
                    tracing::error!(error = %e, "control read failed");
                }
                break;
            }
        };

        let reply = match std::str::from_utf8(&buf[..n])
            .map_err(|_| StreamError::Protocol {
                kind: ProtocolErrorKind::InvalidEncoding,
            })
            .and_then(|text| Reply::parse(text.trim()))
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "malformed reply, tearing down");
                let _ = inner.send(RequestKind::Teardown);
                break;
            }
        };
        tracing::debug!(?reply, "reply received");

        let effects = inner.core.lock().handle_reply(&reply);

        let mut close = false;
        for effect in effects {
            match effect {
                ReplyEffect::SessionReady => on_session_ready(inner),
                ReplyEffect::ReportNotFound => {
                    let file_name = inner.core.lock().file_name.clone();
                    let _ = inner.events_tx.send(StreamEvent::SetupFailed { file_name });
                }
                ReplyEffect::ReportServerError => {
                    let _ = inner.events_tx.send(StreamEvent::ServerError);
                }
                ReplyEffect::CloseConnection => close = true,
            }
        }

        if close {
            let _ = inner.control.lock().shutdown(Shutdown::Both);
            break;
        }
    }

    inner.stop.set();
    let _ = inner.events_tx.send(StreamEvent::Closed);
}

/// 200-to-SETUP: bind the data socket, park the receive loop on it, and
/// automatically issue PLAY.
fn on_session_ready(inner: &Arc<ClientInner>) {
    match bind_data_socket(inner.data_port) {
        Ok(socket) => {
            *inner.receiver.lock() = ReceiverSlot::Parked(RtpReceiver::new(
                socket,
                inner.stop.clone(),
                inner.events_tx.clone(),
            ));
            if let Err(e) = inner.send(RequestKind::Play) {
                tracing::error!(error = %e, "autoplay failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "cannot bind data port");
            let _ = inner.events_tx.send(StreamEvent::BindFailed {
                port: inner.data_port,
            });
        }
    }
}

fn bind_data_socket(port: u16) -> Result<UdpSocket> {
    let socket =
        UdpSocket::bind(("0.0.0.0", port)).map_err(|source| StreamError::Bind { port, source })?;
    socket.set_read_timeout(Some(RECV_TIMEOUT))?;
    Ok(socket)
}
