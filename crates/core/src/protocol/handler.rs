use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::RngExt;

use crate::media::FrameReader;
use crate::protocol::reply::Reply;
use crate::protocol::request::{Command, Request};
use crate::session::{Session, SessionState, StopFlag};

/// Follow-up work the connection loop performs after a reply is written.
pub enum ServerAction {
    /// Spawn (or restart) the paced sender toward `dest`, reading from
    /// `video`. The shared reader keeps its offset across play bursts.
    StartStreaming {
        video: Arc<Mutex<FrameReader>>,
        dest: SocketAddr,
    },
    /// TEARDOWN was processed: end the serving loop.
    Shutdown,
}

/// Result of dispatching one request.
///
/// `reply: None` means the request was silently ignored — no bytes on the
/// wire, no state change.
pub struct DispatchOutcome {
    pub reply: Option<Reply>,
    pub action: Option<ServerAction>,
}

impl DispatchOutcome {
    fn ignored() -> Self {
        Self {
            reply: None,
            action: None,
        }
    }

    fn reply(reply: Reply) -> Self {
        Self {
            reply: Some(reply),
            action: None,
        }
    }
}

/// Handles control requests for the single connected client.
///
/// Enforces the legality table with the protocol's deliberate asymmetry:
/// PLAY and PAUSE are ignored outright when their precondition fails, while
/// SETUP and TEARDOWN are dispatched from any state — SETUP always attempts
/// to open the requested file, TEARDOWN always tears down.
pub struct RequestDispatcher {
    session: Session,
    video: Option<Arc<Mutex<FrameReader>>>,
    stop: StopFlag,
    peer_ip: IpAddr,
}

impl RequestDispatcher {
    pub fn new(peer_ip: IpAddr) -> Self {
        Self {
            session: Session::new(),
            video: None,
            stop: StopFlag::new(),
            peer_ip,
        }
    }

    /// The cancellation flag shared with this session's sender thread.
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Read access to the session record (state assertions in tests).
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn dispatch(&mut self, request: &Request) -> DispatchOutcome {
        self.session.last_sequence = request.sequence;

        match &request.command {
            Command::Setup {
                file_name,
                data_port,
            } => self.handle_setup(request.sequence, file_name, *data_port),
            Command::Play => self.handle_play(request.sequence),
            Command::Pause => self.handle_pause(request.sequence),
            Command::Teardown => self.handle_teardown(request.sequence),
        }
    }

    fn handle_setup(&mut self, sequence: u32, file_name: &str, data_port: u16) -> DispatchOutcome {
        let reader = match FrameReader::open(file_name) {
            Ok(reader) => reader,
            Err(e) => {
                tracing::warn!(file_name, error = %e, "SETUP failed");
                return DispatchOutcome::reply(Reply::NotFound);
            }
        };

        self.video = Some(Arc::new(Mutex::new(reader)));
        self.session
            .assign_id(rand::rng().random_range(100_000..=999_999));
        self.session.data_port = Some(data_port);
        self.session.set_state(SessionState::Ready);

        let session_id = self.session.id().unwrap_or(0);
        tracing::info!(session_id, file_name, data_port, "session set up");

        DispatchOutcome::reply(Reply::Ok {
            sequence,
            session_id,
        })
    }

    fn handle_play(&mut self, sequence: u32) -> DispatchOutcome {
        if self.session.state != SessionState::Ready {
            tracing::debug!(state = ?self.session.state, "PLAY ignored outside Ready");
            return DispatchOutcome::ignored();
        }

        let (Some(video), Some(data_port)) = (&self.video, self.session.data_port) else {
            // Ready without a stream cannot happen through dispatch; treat
            // like a failed precondition.
            tracing::debug!("PLAY ignored: no stream set up");
            return DispatchOutcome::ignored();
        };

        self.session.set_state(SessionState::Playing);
        tracing::info!("streaming started");

        DispatchOutcome {
            reply: Some(self.ok_reply(sequence)),
            action: Some(ServerAction::StartStreaming {
                video: video.clone(),
                dest: SocketAddr::new(self.peer_ip, data_port),
            }),
        }
    }

    fn handle_pause(&mut self, sequence: u32) -> DispatchOutcome {
        if self.session.state != SessionState::Playing {
            tracing::debug!(state = ?self.session.state, "PAUSE ignored outside Playing");
            return DispatchOutcome::ignored();
        }

        self.session.set_state(SessionState::Ready);
        self.stop.set();
        tracing::info!("streaming paused");

        DispatchOutcome::reply(self.ok_reply(sequence))
    }

    fn handle_teardown(&mut self, sequence: u32) -> DispatchOutcome {
        self.stop.set();
        tracing::info!("session torn down");

        DispatchOutcome {
            reply: Some(self.ok_reply(sequence)),
            action: Some(ServerAction::Shutdown),
        }
    }

    fn ok_reply(&self, sequence: u32) -> Reply {
        // TEARDOWN before any successful SETUP has no session id; 0 marks
        // the unassigned case since real ids are six digits.
        Reply::Ok {
            sequence,
            session_id: self.session.id().unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FrameWriter;
    use std::net::Ipv4Addr;

    fn dispatcher() -> RequestDispatcher {
        RequestDispatcher::new(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    fn setup_request(file_name: &str) -> Request {
        Request {
            sequence: 1,
            command: Command::Setup {
                file_name: file_name.to_string(),
                data_port: 7778,
            },
        }
    }

    fn temp_movie() -> tempfile::TempPath {
        let path = tempfile::NamedTempFile::new().unwrap().into_temp_path();
        let mut writer = FrameWriter::create(&path).unwrap();
        writer.write_frame(b"frame one").unwrap();
        writer.finish().unwrap();
        path
    }

    #[test]
    fn setup_with_present_file_replies_ok_and_becomes_ready() {
        let movie = temp_movie();
        let mut dispatcher = dispatcher();

        let outcome = dispatcher.dispatch(&setup_request(&movie.to_string_lossy()));

        let Some(Reply::Ok {
            sequence,
            session_id,
        }) = outcome.reply
        else {
            panic!("expected 200 reply");
        };
        assert_eq!(sequence, 1);
        assert!((100_000..=999_999).contains(&session_id));
        assert_eq!(dispatcher.session().state, SessionState::Ready);
        assert_eq!(dispatcher.session().data_port, Some(7778));
    }

    #[test]
    fn setup_with_missing_file_replies_not_found_and_stays_init() {
        let mut dispatcher = dispatcher();

        let outcome = dispatcher.dispatch(&setup_request("missing.Mjpeg"));

        assert_eq!(outcome.reply, Some(Reply::NotFound));
        assert_eq!(dispatcher.session().state, SessionState::Init);
        assert!(dispatcher.session().id().is_none());
    }

    #[test]
    fn session_id_survives_repeated_setup() {
        let movie = temp_movie();
        let mut dispatcher = dispatcher();
        let raw = movie.to_string_lossy().to_string();

        let first = dispatcher.dispatch(&setup_request(&raw));
        let second = dispatcher.dispatch(&setup_request(&raw));

        let (Some(Reply::Ok { session_id: a, .. }), Some(Reply::Ok { session_id: b, .. })) =
            (first.reply, second.reply)
        else {
            panic!("expected two 200 replies");
        };
        assert_eq!(a, b);
    }

    #[test]
    fn play_outside_ready_is_silently_ignored() {
        let mut dispatcher = dispatcher();

        let outcome = dispatcher.dispatch(&Request {
            sequence: 1,
            command: Command::Play,
        });

        assert!(outcome.reply.is_none());
        assert!(outcome.action.is_none());
        assert_eq!(dispatcher.session().state, SessionState::Init);
    }

    #[test]
    fn pause_outside_playing_is_silently_ignored() {
        let movie = temp_movie();
        let mut dispatcher = dispatcher();
        dispatcher.dispatch(&setup_request(&movie.to_string_lossy()));

        let outcome = dispatcher.dispatch(&Request {
            sequence: 2,
            command: Command::Pause,
        });

        assert!(outcome.reply.is_none());
        assert_eq!(dispatcher.session().state, SessionState::Ready);
    }

    #[test]
    fn play_pause_cycle_drives_state_and_flag() {
        let movie = temp_movie();
        let mut dispatcher = dispatcher();
        let stop = dispatcher.stop_flag();
        dispatcher.dispatch(&setup_request(&movie.to_string_lossy()));

        let play = dispatcher.dispatch(&Request {
            sequence: 2,
            command: Command::Play,
        });
        assert!(matches!(
            play.action,
            Some(ServerAction::StartStreaming { .. })
        ));
        assert_eq!(dispatcher.session().state, SessionState::Playing);

        let pause = dispatcher.dispatch(&Request {
            sequence: 3,
            command: Command::Pause,
        });
        assert!(pause.reply.is_some());
        assert_eq!(dispatcher.session().state, SessionState::Ready);
        assert!(stop.is_set());
    }

    #[test]
    fn teardown_is_dispatched_from_any_state() {
        let mut dispatcher = dispatcher();
        let stop = dispatcher.stop_flag();

        let outcome = dispatcher.dispatch(&Request {
            sequence: 1,
            command: Command::Teardown,
        });

        assert!(matches!(outcome.action, Some(ServerAction::Shutdown)));
        assert_eq!(
            outcome.reply,
            Some(Reply::Ok {
                sequence: 1,
                session_id: 0,
            })
        );
        assert!(stop.is_set());
    }
}
