//! Paced RTP sender — the server side of the data channel.
//!
//! One frame per tick, one datagram per frame. The loop runs on its own
//! thread so pacing stays on the wall clock regardless of control-channel
//! activity, and stops only through the session's [`StopFlag`] — running
//! out of frames just leaves it ticking idle.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rand::RngExt;

use crate::error::Result;
use crate::media::{FrameReader, MJPEG_PAYLOAD_TYPE, rtp};
use crate::session::StopFlag;

/// Interval between frame transmissions. Caps the stream at a nominal
/// 20 fps, independent of the source file's real frame rate.
pub const PACE_INTERVAL: Duration = Duration::from_millis(50);

/// Paced sender for one play burst.
///
/// Created when PLAY is dispatched and dropped when the stop flag is
/// observed. The frame reader is shared with the dispatcher so a later
/// burst resumes from the current file offset.
pub struct RtpSender {
    socket: UdpSocket,
    dest: SocketAddr,
    video: Arc<Mutex<FrameReader>>,
    stop: StopFlag,
    ssrc: u32,
}

impl RtpSender {
    /// Bind an ephemeral socket for outbound datagrams.
    ///
    /// The SSRC is chosen randomly per RFC 3550 §8.1 and kept for the
    /// sender's lifetime.
    pub fn new(dest: SocketAddr, video: Arc<Mutex<FrameReader>>, stop: StopFlag) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        let ssrc = rand::rng().random::<u32>();
        tracing::debug!(%dest, ssrc = format_args!("{ssrc:#010X}"), "RTP sender ready");

        Ok(Self {
            socket,
            dest,
            video,
            stop,
            ssrc,
        })
    }

    /// Run the pacing loop on a dedicated thread.
    pub fn spawn(self) -> JoinHandle<()> {
        thread::spawn(move || self.run())
    }

    fn run(self) {
        loop {
            thread::sleep(PACE_INTERVAL);
            if self.stop.is_set() {
                tracing::debug!("sender stopped");
                break;
            }

            let frame = match self.video.lock().next_frame() {
                Ok(Some(frame)) => frame,
                // End of file keeps the loop ticking; only PAUSE/TEARDOWN
                // terminate it.
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "video stream unreadable, stopping");
                    self.stop.set();
                    break;
                }
            };

            let header = rtp::RtpHeader::for_frame(
                MJPEG_PAYLOAD_TYPE,
                frame.number,
                unix_time_secs(),
                self.ssrc,
            );
            let packet = rtp::build_packet(&header, &frame.payload);

            // A lost datagram never aborts streaming; the transport is
            // unreliable by design.
            match self.socket.send_to(&packet, self.dest) {
                Ok(_) => {
                    tracing::trace!(sequence = header.sequence, bytes = packet.len(), "frame sent");
                }
                Err(e) => {
                    tracing::warn!(sequence = header.sequence, error = %e, "frame send failed");
                }
            }
        }
    }
}

/// Current Unix time truncated to whole seconds.
fn unix_time_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FrameWriter;
    use std::time::Instant;

    fn shared_movie(frames: &[&[u8]]) -> (tempfile::TempPath, Arc<Mutex<FrameReader>>) {
        let path = tempfile::NamedTempFile::new().unwrap().into_temp_path();
        let mut writer = FrameWriter::create(&path).unwrap();
        for frame in frames {
            writer.write_frame(frame).unwrap();
        }
        writer.finish().unwrap();
        let reader = FrameReader::open(&path).unwrap();
        (path, Arc::new(Mutex::new(reader)))
    }

    #[test]
    fn streams_paced_frames_until_stopped() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let dest = receiver.local_addr().unwrap();

        let (_path, video) = shared_movie(&[b"one".as_slice(), b"two"]);
        let stop = StopFlag::new();
        let sender = RtpSender::new(dest, video, stop.clone()).unwrap();
        let handle = sender.spawn();

        let mut buf = [0u8; 2048];
        let started = Instant::now();

        let len = receiver.recv(&mut buf).unwrap();
        let (header, payload) = rtp::split_packet(&buf[..len]).unwrap();
        assert_eq!(header.sequence, 1);
        assert_eq!(header.payload_type, MJPEG_PAYLOAD_TYPE);
        assert_eq!(payload, b"one");
        // First frame only arrives after a full pacing tick.
        assert!(started.elapsed() >= Duration::from_millis(40));

        let len = receiver.recv(&mut buf).unwrap();
        let (header, payload) = rtp::split_packet(&buf[..len]).unwrap();
        assert_eq!(header.sequence, 2);
        assert_eq!(payload, b"two");

        stop.set();
        handle.join().unwrap();
    }

    #[test]
    fn stop_flag_ends_the_loop_promptly() {
        let sink = UdpSocket::bind("127.0.0.1:0").unwrap();
        let (_path, video) = shared_movie(&[b"frame".as_slice()]);
        let stop = StopFlag::new();
        stop.set();

        let sender = RtpSender::new(sink.local_addr().unwrap(), video, stop).unwrap();
        let handle = sender.spawn();
        handle.join().unwrap();
    }
}
