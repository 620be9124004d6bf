//! Wire protocol
//!
//! Two kinds of datagram share the socket. Channel traffic starts with the
//! channel prefix and carries opcode-tagged payloads; everything else is a
//! connectionless command, a single NUL-terminated ASCII line such as
//! `connect 3 "Alice" 4711`.

use std::fmt;

use arena_engine::net::{Message, MessageError};
use thiserror::Error;

/// Bumped whenever the wire format changes
pub const PROTOCOL_VERSION: u32 = 3;

/// Hard limit on player slots
pub const MAX_PLAYERS: usize = 16;

/// Default server port
pub const DEFAULT_PORT: u16 = 28100;

/// Client-to-server opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientOp {
    /// Input for the next tick
    Command = 1,
    /// Leaving the game
    Disconnect = 2,
    /// Chat line
    Say = 3,
    /// Weapon change
    Upgrade = 4,
}

impl ClientOp {
    /// Decode an opcode byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Command),
            2 => Some(Self::Disconnect),
            3 => Some(Self::Say),
            4 => Some(Self::Upgrade),
            _ => None,
        }
    }
}

/// Server-to-client opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerOp {
    /// Connection closed by the server
    Disconnect = 1,
    /// Chat or notice line
    Message = 2,
    /// A player's score changed
    Score = 3,
    /// A player's slot changed
    Info = 4,
    /// World state for one tick
    Snapshot = 5,
    /// New round
    Restart = 6,
}

impl ServerOp {
    /// Decode an opcode byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Disconnect),
            2 => Some(Self::Message),
            3 => Some(Self::Score),
            4 => Some(Self::Info),
            5 => Some(Self::Snapshot),
            6 => Some(Self::Restart),
            _ => None,
        }
    }
}

/// Connectionless command parse failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Blank line
    #[error("empty command")]
    Empty,

    /// First word is not a known command
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// Too few arguments
    #[error("missing argument '{0}'")]
    MissingArgument(&'static str),

    /// Argument did not parse
    #[error("invalid {name} '{value}'")]
    InvalidArgument {
        /// Argument name
        name: &'static str,
        /// Offending text
        value: String,
    },

    /// Packet body unreadable
    #[error(transparent)]
    Message(#[from] MessageError),
}

/// Split a command line into words; double quotes group words
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else {
            break;
        };
        let mut token = String::new();
        if first == '"' {
            chars.next();
            for c in chars.by_ref() {
                if c == '"' {
                    break;
                }
                token.push(c);
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                token.push(c);
            }
        }
        tokens.push(token);
    }
    tokens
}

/// Quote a free-form argument so it survives [`tokenize`]
pub fn quote(text: &str) -> String {
    let clean: String = text.chars().filter(|c| *c != '"' && !c.is_control()).collect();
    format!("\"{clean}\"")
}

fn argument<'a>(tokens: &'a [String], index: usize, name: &'static str) -> Result<&'a str, ProtocolError> {
    tokens.get(index).map(String::as_str).ok_or(ProtocolError::MissingArgument(name))
}

fn parse_argument<T: std::str::FromStr>(tokens: &[String], index: usize, name: &'static str) -> Result<T, ProtocolError> {
    let text = argument(tokens, index, name)?;
    text.parse().map_err(|_| ProtocolError::InvalidArgument {
        name,
        value: text.to_owned(),
    })
}

/// Connectionless commands sent to a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Server discovery
    Info,
    /// Join request
    Connect {
        /// Client protocol version
        version: u32,
        /// Player name
        name: String,
        /// Client channel netport
        netport: u16,
    },
}

impl Request {
    /// Parse a command line
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let tokens = tokenize(line);
        let command = tokens.first().ok_or(ProtocolError::Empty)?;
        match command.as_str() {
            "info" => Ok(Self::Info),
            "connect" => Ok(Self::Connect {
                version: parse_argument(&tokens, 1, "version")?,
                name: argument(&tokens, 2, "name")?.to_owned(),
                netport: parse_argument(&tokens, 3, "netport")?,
            }),
            other => Err(ProtocolError::UnknownCommand(other.to_owned())),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Connect { version, name, netport } => {
                write!(f, "connect {} {} {}", version, quote(name), netport)
            }
        }
    }
}

/// Connectionless replies sent by a server
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Discovery answer
    Info {
        /// Server name
        name: String,
        /// Connected players
        players: usize,
        /// Player slots
        max_players: usize,
        /// Server protocol version
        version: u32,
    },
    /// Join accepted
    Connect {
        /// Slot assigned to the client
        client_index: u8,
        /// Server world time
        time: f32,
    },
    /// Join rejected
    Fail {
        /// Human-readable reason
        reason: String,
    },
}

impl Response {
    /// Parse a command line
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let tokens = tokenize(line);
        let command = tokens.first().ok_or(ProtocolError::Empty)?;
        match command.as_str() {
            "info" => Ok(Self::Info {
                name: argument(&tokens, 1, "name")?.to_owned(),
                players: parse_argument(&tokens, 2, "players")?,
                max_players: parse_argument(&tokens, 3, "max_players")?,
                version: parse_argument(&tokens, 4, "version")?,
            }),
            "connect" => Ok(Self::Connect {
                client_index: parse_argument(&tokens, 1, "client_index")?,
                time: parse_argument(&tokens, 2, "time")?,
            }),
            "fail" => Ok(Self::Fail {
                reason: argument(&tokens, 1, "reason")?.to_owned(),
            }),
            other => Err(ProtocolError::UnknownCommand(other.to_owned())),
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info {
                name,
                players,
                max_players,
                version,
            } => write!(f, "info {} {} {} {}", quote(name), players, max_players, version),
            Self::Connect { client_index, time } => write!(f, "connect {client_index} {time}"),
            Self::Fail { reason } => write!(f, "fail {}", quote(reason)),
        }
    }
}

/// Encode a connectionless command line
pub fn write_connectionless(message: &mut Message, command: &impl fmt::Display) -> Result<(), MessageError> {
    message.clear();
    message.write_string(&command.to_string())
}

/// Decode a connectionless command line
pub fn read_connectionless(message: &mut Message) -> Result<String, MessageError> {
    message.read_string()
}
