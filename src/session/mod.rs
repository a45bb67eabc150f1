mod codec;
mod endpoint;

use std::convert::From;
use std::error;
use std::fmt;
use std::io;

pub use codec::{MessageCodec, MessageProtocol};
pub use endpoint::{Endpoint, Endpoints};

#[derive(Debug)]
pub enum SessionError {
    /// A datagram did not decode as a protocol message. [reason]
    Decode(String),
    /// Something happened in transport. [reason]
    Transport(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Session Error: ")?;
        use SessionError::*;
        match self {
            Decode(reason) => write!(f, "Decode error [{}]", reason)?,
            Transport(reason) => write!(f, "Transport error [{}]", reason)?,
        }
        Ok(())
    }
}

impl From<io::Error> for SessionError {
    fn from(error: io::Error) -> Self {
        SessionError::Transport(error.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(error: serde_json::Error) -> Self {
        SessionError::Decode(error.to_string())
    }
}

impl error::Error for SessionError {}
