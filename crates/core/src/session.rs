//! Session state shared by both ends of the control channel.
//!
//! A session is the logical association between one client and one server
//! process, identified by a server-assigned id. Both sides drive the same
//! state machine:
//!
//! ```text
//! SETUP     Init    -> Ready
//! PLAY      Ready   -> Playing
//! PAUSE     Playing -> Ready
//! TEARDOWN  any     -> (terminal, connection closed)
//! ```
//!
//! The table is enforced twice with a deliberate asymmetry: the client drops
//! illegal requests before they reach the wire, while the server silently
//! ignores PLAY/PAUSE whose precondition fails but dispatches SETUP and
//! TEARDOWN unconditionally. SETUP/TEARDOWN are safe to repeat; PLAY/PAUSE
//! are not.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::protocol::RequestKind;

/// Playback state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No stream set up yet (also the state after a failed SETUP).
    Init,
    /// Stream set up, not delivering (reached via SETUP or PAUSE).
    Ready,
    /// Frames are being delivered on the data channel.
    Playing,
}

/// Whether `kind` may be issued from `state` per the legality table.
pub fn request_allowed(kind: RequestKind, state: SessionState) -> bool {
    matches!(
        (kind, state),
        (RequestKind::Setup, SessionState::Init)
            | (RequestKind::Play, SessionState::Ready)
            | (RequestKind::Pause, SessionState::Playing)
            | (RequestKind::Teardown, _)
    )
}

/// Per-connection session record.
///
/// Mutated only by the control-channel thread on either side; data-loop
/// threads never touch it (they observe the [`StopFlag`] instead).
#[derive(Debug)]
pub struct Session {
    id: Option<u32>,
    /// Current playback state.
    pub state: SessionState,
    /// Control-channel sequence number of the most recent request.
    pub last_sequence: u32,
    /// Negotiated destination port for the data channel.
    pub data_port: Option<u16>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: None,
            state: SessionState::Init,
            last_sequence: 0,
            data_port: None,
        }
    }

    /// Server-assigned session identifier, once the first SETUP succeeded.
    pub fn id(&self) -> Option<u32> {
        self.id
    }

    /// Bind the session identifier. The id is immutable once assigned;
    /// later calls are ignored.
    pub fn assign_id(&mut self, id: u32) {
        if self.id.is_none() {
            tracing::debug!(session_id = id, "session id assigned");
            self.id = Some(id);
        }
    }

    /// Transition to a new playback state.
    pub fn set_state(&mut self, state: SessionState) {
        tracing::debug!(old_state = ?self.state, new_state = ?state, "state transition");
        self.state = state;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative cancellation flag for a session's data loop.
///
/// One writer (the control-channel thread, on PAUSE/TEARDOWN) and any number
/// of polling readers. Data threads check it at each iteration boundary; an
/// in-flight send or receive completes before the flag is observed. Cleared
/// by the driver at the start of each play burst, after the previous data
/// thread has been joined.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the data loop to stop after its current iteration.
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Re-arm the flag for a new play burst.
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legality_table() {
        use RequestKind::*;
        use SessionState::*;

        assert!(request_allowed(Setup, Init));
        assert!(!request_allowed(Setup, Ready));
        assert!(!request_allowed(Setup, Playing));

        assert!(!request_allowed(Play, Init));
        assert!(request_allowed(Play, Ready));
        assert!(!request_allowed(Play, Playing));

        assert!(!request_allowed(Pause, Init));
        assert!(!request_allowed(Pause, Ready));
        assert!(request_allowed(Pause, Playing));

        assert!(request_allowed(Teardown, Init));
        assert!(request_allowed(Teardown, Ready));
        assert!(request_allowed(Teardown, Playing));
    }

    #[test]
    fn session_id_assigned_once() {
        let mut session = Session::new();
        assert_eq!(session.id(), None);

        session.assign_id(123_456);
        session.assign_id(654_321);
        assert_eq!(session.id(), Some(123_456));
    }

    #[test]
    fn stop_flag_set_clear() {
        let flag = StopFlag::new();
        let observer = flag.clone();

        assert!(!observer.is_set());
        flag.set();
        assert!(observer.is_set());
        flag.clear();
        assert!(!observer.is_set());
    }
}
