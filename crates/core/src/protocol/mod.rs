//! Control-channel protocol: codec and server-side dispatch.
//!
//! The control channel carries pipe-delimited ASCII messages over TCP, one
//! message per read — there is no terminator and no framing beyond the
//! datagram-like read boundary.
//!
//! ## Requests (client → server)
//!
//! | Request  | Wire format                       |
//! |----------|-----------------------------------|
//! | SETUP    | `<seq>\|0\|<fileName>\|<dataPort>` |
//! | PLAY     | `<seq>\|1`                        |
//! | PAUSE    | `<seq>\|2`                        |
//! | TEARDOWN | `<seq>\|3`                        |
//!
//! ## Replies (server → client)
//!
//! | Outcome        | Wire format                  |
//! |----------------|------------------------------|
//! | Success        | `200\|<echoedSeq>\|<sessionId>` |
//! | File not found | literal `404`                |
//! | Internal error | literal `500`                |
//!
//! Encoding is pure and stateless; a decode failure is a protocol violation,
//! fatal to the connection — the caller tears down rather than retrying.

pub mod handler;
pub mod reply;
pub mod request;

pub use handler::{DispatchOutcome, RequestDispatcher, ServerAction};
pub use reply::Reply;
pub use request::{Command, Request, RequestKind};
