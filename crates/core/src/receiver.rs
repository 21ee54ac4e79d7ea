//! RTP receiver and sequencer — the client side of the data channel.
//!
//! The receive loop runs on its own thread with a bounded socket timeout so
//! cancellation is observed promptly. Late, duplicate, and out-of-order
//! packets are discarded silently: ordering is enforced only by the
//! monotonic filter in [`Sequencer`], never by buffering or retransmission,
//! and none of it surfaces to the control plane.

use std::io::ErrorKind;
use std::net::UdpSocket;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;

use crate::client::StreamEvent;
use crate::media::rtp;
use crate::session::StopFlag;

/// Socket read timeout; bounds how long cancellation can go unobserved.
pub const RECV_TIMEOUT: Duration = Duration::from_millis(500);

/// Receive buffer size, comfortably above any frame the sender produces.
const RECV_BUF_LEN: usize = 20_480;

/// Monotonic sequence filter.
///
/// Accepts a sequence number only when it is strictly greater than every
/// previously accepted one — the accepted subsequence is exactly the greedy
/// running-maximum filter of the input.
#[derive(Debug, Default)]
pub struct Sequencer {
    last_accepted: Option<u16>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `sequence` if it advances the stream; returns whether the
    /// packet should be kept.
    pub fn accept(&mut self, sequence: u16) -> bool {
        match self.last_accepted {
            Some(last) if sequence <= last => false,
            _ => {
                self.last_accepted = Some(sequence);
                true
            }
        }
    }
}

/// Receive loop for one play burst.
///
/// Owns the bound data socket and the sequencer, and is recovered from the
/// thread when a burst ends so the next burst continues with the same
/// socket and the same running maximum.
pub struct RtpReceiver {
    socket: UdpSocket,
    stop: StopFlag,
    sequencer: Sequencer,
    events: Sender<StreamEvent>,
}

impl RtpReceiver {
    pub fn new(socket: UdpSocket, stop: StopFlag, events: Sender<StreamEvent>) -> Self {
        Self {
            socket,
            stop,
            sequencer: Sequencer::new(),
            events,
        }
    }

    /// Run the receive loop on a dedicated thread; the receiver is handed
    /// back through the join handle when the loop exits.
    pub fn spawn(self) -> JoinHandle<RtpReceiver> {
        thread::spawn(move || self.run())
    }

    fn run(mut self) -> RtpReceiver {
        let mut buf = vec![0u8; RECV_BUF_LEN];

        loop {
            if self.stop.is_set() {
                tracing::debug!("receiver stopped");
                break;
            }

            let len = match self.socket.recv(&mut buf) {
                Ok(len) => len,
                // A timeout is not an error; re-check the flag and retry.
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "data socket receive failed");
                    continue;
                }
            };

            let (header, payload) = match rtp::split_packet(&buf[..len]) {
                Ok(parts) => parts,
                Err(e) => {
                    tracing::debug!(len, error = %e, "discarding malformed datagram");
                    continue;
                }
            };

            if !self.sequencer.accept(header.sequence) {
                tracing::trace!(sequence = header.sequence, "discarding late packet");
                continue;
            }

            tracing::trace!(sequence = header.sequence, bytes = payload.len(), "frame received");
            if self
                .events
                .send(StreamEvent::Frame {
                    sequence: header.sequence,
                    payload: payload.to_vec(),
                })
                .is_err()
            {
                // Presentation side went away; nothing left to deliver to.
                break;
            }
        }

        self
    }
}
