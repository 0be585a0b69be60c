// In: src/store/key.rs

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// How a flight is addressed by the caller.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub enum FlightDescriptor {
    /// A path of opaque segments. The path is an identifier, not a file on disk.
    Path(Vec<String>),
    /// An opaque, caller-defined command.
    Command(Vec<u8>),
}

impl FlightDescriptor {
    /// The single-segment path descriptor used for every well-known channel.
    pub fn for_path(channel: impl Into<String>) -> Self {
        FlightDescriptor::Path(vec![channel.into()])
    }

    pub fn for_command(command: impl Into<Vec<u8>>) -> Self {
        FlightDescriptor::Command(command.into())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorKind {
    Path,
    Command,
}

/// The identity of one logical channel: `(kind, command, path)`.
///
/// Two stagings under equal keys address the same channel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    pub kind: DescriptorKind,
    pub command: Option<Vec<u8>>,
    pub path: Vec<String>,
}

impl ChannelKey {
    pub fn from_descriptor(descriptor: &FlightDescriptor) -> Self {
        match descriptor {
            FlightDescriptor::Path(path) => Self {
                kind: DescriptorKind::Path,
                command: None,
                path: path.clone(),
            },
            FlightDescriptor::Command(command) => Self {
                kind: DescriptorKind::Command,
                command: Some(command.clone()),
                path: Vec::new(),
            },
        }
    }

    /// Key of a well-known channel such as `toPython`.
    pub fn for_channel(name: &str) -> Self {
        Self::from_descriptor(&FlightDescriptor::for_path(name))
    }

    /// Rebuilds the descriptor the key was derived from.
    pub fn descriptor(&self) -> FlightDescriptor {
        match (&self.kind, &self.command) {
            (DescriptorKind::Command, Some(command)) => FlightDescriptor::Command(command.clone()),
            _ => FlightDescriptor::Path(self.path.clone()),
        }
    }
}

impl From<&FlightDescriptor> for ChannelKey {
    fn from(descriptor: &FlightDescriptor) -> Self {
        ChannelKey::from_descriptor(descriptor)
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.command) {
            (DescriptorKind::Command, Some(command)) => {
                write!(f, "command:{}", String::from_utf8_lossy(command))
            }
            _ => write!(f, "path:{}", self.path.join("/")),
        }
    }
}

/// An opaque retrieval handle for one staged batch.
///
/// The payload is the JSON encoding of the `ChannelKey` it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub ticket: Vec<u8>,
}

impl Ticket {
    pub fn for_key(key: &ChannelKey) -> Result<Self> {
        Ok(Self {
            ticket: serde_json::to_vec(key)?,
        })
    }

    pub fn key(&self) -> Result<ChannelKey> {
        serde_json::from_slice(&self.ticket)
            .map_err(|e| BridgeError::InvalidTicket(format!("{}", e)))
    }
}
