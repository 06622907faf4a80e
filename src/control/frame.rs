//! Inbound control datagram grammar
//!
//! ```text
//! N | N>port | N>port>module     heartbeat
//! C | C>port                     stop notification
//! D@domain                       resolution query
//! E@message                      diagnostic line
//! ```

use thiserror::Error;

/// A decoded control datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFrame {
    Heartbeat {
        port: Option<String>,
        module: Option<String>,
    },
    Stop {
        port: Option<String>,
    },
    Resolve {
        domain: String,
    },
    Echo {
        message: String,
    },
}

/// Reasons a datagram is dropped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Empty datagram")]
    Empty,

    #[error("Unknown frame tag '{0}'")]
    UnknownTag(char),

    #[error("Frame '{tag}' is missing its '{delimiter}' delimiter")]
    MissingDelimiter { tag: char, delimiter: char },
}

impl FrameError {
    /// Whether the dropped frame was a resolution query that still expects a reply
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::MissingDelimiter { tag: 'D', .. })
    }
}

impl ControlFrame {
    /// Decode one datagram payload. Trailing CR/LF are ignored.
    pub fn parse(payload: &str) -> Result<Self, FrameError> {
        let payload = payload.trim_end_matches(['\r', '\n']);
        let mut chars = payload.chars();
        let tag = chars.next().ok_or(FrameError::Empty)?;
        let rest = chars.as_str();

        match tag {
            'N' => {
                let mut fields = delimited_fields(tag, rest)?;
                let port = fields.next().flatten();
                let module = port.as_ref().and(fields.next().flatten());
                Ok(Self::Heartbeat { port, module })
            }
            'C' => {
                let mut fields = delimited_fields(tag, rest)?;
                Ok(Self::Stop {
                    port: fields.next().flatten(),
                })
            }
            'D' => {
                let (_, domain) = rest.split_once('@').ok_or(FrameError::MissingDelimiter {
                    tag,
                    delimiter: '@',
                })?;
                Ok(Self::Resolve {
                    domain: domain.to_string(),
                })
            }
            'E' => {
                let (_, message) = rest.split_once('@').ok_or(FrameError::MissingDelimiter {
                    tag,
                    delimiter: '@',
                })?;
                Ok(Self::Echo {
                    message: message.to_string(),
                })
            }
            other => Err(FrameError::UnknownTag(other)),
        }
    }
}

/// `>`-separated fields after the tag; empty fields read as `None`
fn delimited_fields(
    tag: char,
    rest: &str,
) -> Result<impl Iterator<Item = Option<String>> + '_, FrameError> {
    let body = if rest.is_empty() {
        None
    } else {
        Some(rest.strip_prefix('>').ok_or(FrameError::MissingDelimiter {
            tag,
            delimiter: '>',
        })?)
    };
    Ok(body
        .into_iter()
        .flat_map(|b| b.split('>'))
        .map(|f| (!f.is_empty()).then(|| f.to_string())))
}
