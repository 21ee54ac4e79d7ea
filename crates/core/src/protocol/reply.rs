use crate::error::{ProtocolErrorKind, Result, StreamError};

/// A control-channel reply.
///
/// Success replies echo the request's sequence number and carry the session
/// identifier; the two failure replies are bare status literals with no
/// fields at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// `200|<echoedSeq>|<sessionId>`
    Ok { sequence: u32, session_id: u32 },
    /// Literal `404` — the requested file is missing or unreadable.
    NotFound,
    /// Literal `500` — internal server error.
    ServerError,
}

impl Reply {
    /// Serialize to the wire format.
    pub fn encode(&self) -> String {
        match self {
            Self::Ok {
                sequence,
                session_id,
            } => format!("200|{sequence}|{session_id}"),
            Self::NotFound => "404".to_string(),
            Self::ServerError => "500".to_string(),
        }
    }

    /// Parse a reply from its text representation.
    ///
    /// Anything other than a well-formed 200 reply or a bare 404/500 literal
    /// is a [`StreamError::Protocol`]; the client treats the connection as
    /// broken and initiates teardown.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(violation(ProtocolErrorKind::EmptyMessage));
        }

        match raw {
            "404" => return Ok(Self::NotFound),
            "500" => return Ok(Self::ServerError),
            _ => {}
        }

        let fields: Vec<&str> = raw.split('|').collect();
        if fields[0] != "200" {
            return Err(violation(ProtocolErrorKind::UnknownStatus));
        }
        if fields.len() != 3 {
            return Err(violation(ProtocolErrorKind::FieldCount));
        }

        let sequence: u32 = fields[1]
            .parse()
            .map_err(|_| violation(ProtocolErrorKind::NonNumericField))?;
        let session_id: u32 = fields[2]
            .parse()
            .map_err(|_| violation(ProtocolErrorKind::NonNumericField))?;

        Ok(Self::Ok {
            sequence,
            session_id,
        })
    }
}

fn violation(kind: ProtocolErrorKind) -> StreamError {
    StreamError::Protocol { kind }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_ok() {
        let reply = Reply::Ok {
            sequence: 1,
            session_id: 123_456,
        };
        assert_eq!(reply.encode(), "200|1|123456");
    }

    #[test]
    fn encode_failure_literals() {
        assert_eq!(Reply::NotFound.encode(), "404");
        assert_eq!(Reply::ServerError.encode(), "500");
    }

    #[test]
    fn parse_ok() {
        assert_eq!(
            Reply::parse("200|7|654321").unwrap(),
            Reply::Ok {
                sequence: 7,
                session_id: 654_321,
            }
        );
    }

    #[test]
    fn parse_failure_literals() {
        assert_eq!(Reply::parse("404").unwrap(), Reply::NotFound);
        assert_eq!(Reply::parse("500").unwrap(), Reply::ServerError);
    }

    #[test]
    fn parse_malformed_is_violation() {
        for raw in ["", "200", "200|1", "200|1|2|3", "302|1|2", "200|x|2", "200|1|y"] {
            assert!(
                matches!(Reply::parse(raw), Err(StreamError::Protocol { .. })),
                "expected protocol violation for {raw:?}"
            );
        }
    }
}
