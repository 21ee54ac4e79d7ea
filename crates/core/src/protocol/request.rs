use crate::error::{ProtocolErrorKind, Result, StreamError};

/// The four request types, without payload.
///
/// Used by the legality table and for tracking which request a reply
/// answers. Wire codes appear only at the codec boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Setup,
    Play,
    Pause,
    Teardown,
}

impl RequestKind {
    /// Numeric wire code for this request type.
    fn code(self) -> u8 {
        match self {
            Self::Setup => 0,
            Self::Play => 1,
            Self::Pause => 2,
            Self::Teardown => 3,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Setup),
            1 => Some(Self::Play),
            2 => Some(Self::Pause),
            3 => Some(Self::Teardown),
            _ => None,
        }
    }
}

/// Request payload. Only SETUP carries parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Setup { file_name: String, data_port: u16 },
    Play,
    Pause,
    Teardown,
}

impl Command {
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Setup { .. } => RequestKind::Setup,
            Self::Play => RequestKind::Play,
            Self::Pause => RequestKind::Pause,
            Self::Teardown => RequestKind::Teardown,
        }
    }
}

/// A parsed control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Client-assigned control sequence number, echoed in the reply.
    pub sequence: u32,
    pub command: Command,
}

impl Request {
    /// Serialize to the pipe-delimited wire format.
    pub fn encode(&self) -> String {
        let code = self.command.kind().code();
        match &self.command {
            Command::Setup {
                file_name,
                data_port,
            } => format!("{}|{}|{}|{}", self.sequence, code, file_name, data_port),
            _ => format!("{}|{}", self.sequence, code),
        }
    }

    /// Parse a request from its text representation.
    ///
    /// SETUP requires exactly four fields; the other requests exactly two.
    /// Any mismatch is a [`StreamError::Protocol`] — fatal to the connection.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(violation(ProtocolErrorKind::EmptyMessage));
        }

        let fields: Vec<&str> = raw.split('|').collect();
        if fields.len() < 2 {
            return Err(violation(ProtocolErrorKind::FieldCount));
        }

        let sequence: u32 = fields[0]
            .parse()
            .map_err(|_| violation(ProtocolErrorKind::NonNumericField))?;
        let code: u8 = fields[1]
            .parse()
            .map_err(|_| violation(ProtocolErrorKind::NonNumericField))?;
        let kind = RequestKind::from_code(code)
            .ok_or_else(|| violation(ProtocolErrorKind::UnknownRequestCode))?;

        let command = match kind {
            RequestKind::Setup => {
                if fields.len() != 4 {
                    return Err(violation(ProtocolErrorKind::FieldCount));
                }
                let data_port: u16 = fields[3]
                    .parse()
                    .map_err(|_| violation(ProtocolErrorKind::NonNumericField))?;
                Command::Setup {
                    file_name: fields[2].to_string(),
                    data_port,
                }
            }
            _ => {
                if fields.len() != 2 {
                    return Err(violation(ProtocolErrorKind::FieldCount));
                }
                match kind {
                    RequestKind::Play => Command::Play,
                    RequestKind::Pause => Command::Pause,
                    _ => Command::Teardown,
                }
            }
        };

        Ok(Request { sequence, command })
    }
}

fn violation(kind: ProtocolErrorKind) -> StreamError {
    StreamError::Protocol { kind }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_setup() {
        let request = Request {
            sequence: 1,
            command: Command::Setup {
                file_name: "movie.Mjpeg".to_string(),
                data_port: 7778,
            },
        };
        assert_eq!(request.encode(), "1|0|movie.Mjpeg|7778");
    }

    #[test]
    fn encode_bare_requests() {
        let play = Request {
            sequence: 2,
            command: Command::Play,
        };
        let pause = Request {
            sequence: 3,
            command: Command::Pause,
        };
        let teardown = Request {
            sequence: 4,
            command: Command::Teardown,
        };
        assert_eq!(play.encode(), "2|1");
        assert_eq!(pause.encode(), "3|2");
        assert_eq!(teardown.encode(), "4|3");
    }

    #[test]
    fn parse_setup() {
        let request = Request::parse("1|0|movie.Mjpeg|7778").unwrap();
        assert_eq!(request.sequence, 1);
        assert_eq!(
            request.command,
            Command::Setup {
                file_name: "movie.Mjpeg".to_string(),
                data_port: 7778,
            }
        );
    }

    #[test]
    fn parse_roundtrip_all_kinds() {
        for raw in ["1|0|a.Mjpeg|9000", "2|1", "3|2", "4|3"] {
            let request = Request::parse(raw).unwrap();
            assert_eq!(request.encode(), raw);
        }
    }

    #[test]
    fn parse_empty_is_violation() {
        assert!(matches!(
            Request::parse("").unwrap_err(),
            StreamError::Protocol { .. }
        ));
    }

    #[test]
    fn parse_unknown_code_is_violation() {
        assert!(Request::parse("1|9").is_err());
    }

    #[test]
    fn parse_wrong_field_count_is_violation() {
        // PLAY with trailing fields, SETUP with missing ones.
        assert!(Request::parse("1|1|extra").is_err());
        assert!(Request::parse("1|0|movie.Mjpeg").is_err());
    }

    #[test]
    fn parse_non_numeric_fields_are_violations() {
        assert!(Request::parse("one|1").is_err());
        assert!(Request::parse("1|zero").is_err());
        assert!(Request::parse("1|0|movie.Mjpeg|port").is_err());
    }
}
