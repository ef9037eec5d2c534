//! Identifiers for CCU entities
//!
//! Devices are keyed by the opaque address the CCU reports. Channels and
//! parameters hang below their device and use `/`-joined composite ids:
//! `{device}/{channel}` and `{device}/{channel}/{parameter}`. Rooms,
//! functions, programs and system variables use integer ids.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub type DeviceId = String;
pub type RoomId = u32;
pub type FunctionId = u32;
pub type ProgramId = u32;
pub type VariableId = u32;

/// Separator used to join composite ids and resource paths.
pub const PATH_SEPARATOR: char = '/';

/// The kinds of entity the CCU exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Room,
    Device,
    Channel,
    Parameter,
    Function,
    Program,
    Variable,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Room => "room",
            Self::Device => "device",
            Self::Channel => "channel",
            Self::Parameter => "parameter",
            Self::Function => "function",
            Self::Program => "program",
            Self::Variable => "variable",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a name for indexing and lookup: trimmed and lowercased.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Identifier of a device channel: `{device}/{number}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId {
    device: DeviceId,
    number: u32,
}

impl ChannelId {
    pub fn new(device: impl Into<DeviceId>, number: u32) -> Self {
        Self {
            device: device.into(),
            number,
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Build the id of a parameter on this channel.
    pub fn parameter(&self, name: impl Into<String>) -> ParameterId {
        ParameterId::new(self.clone(), name)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.device, PATH_SEPARATOR, self.number)
    }
}

impl FromStr for ChannelId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::not_found(EntityKind::Channel, s);
        let (device, number) = s.split_once(PATH_SEPARATOR).ok_or_else(invalid)?;
        if device.is_empty() {
            return Err(invalid());
        }
        let number = number.parse().map_err(|_| invalid())?;
        Ok(Self::new(device, number))
    }
}

impl TryFrom<String> for ChannelId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChannelId> for String {
    fn from(id: ChannelId) -> Self {
        id.to_string()
    }
}

/// Identifier of a channel parameter: `{device}/{number}/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterId {
    channel: ChannelId,
    name: String,
}

impl ParameterId {
    pub fn new(channel: ChannelId, name: impl Into<String>) -> Self {
        Self {
            channel,
            name: name.into(),
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.channel, PATH_SEPARATOR, self.name)
    }
}

impl FromStr for ParameterId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::not_found(EntityKind::Parameter, s);
        let (channel, name) = s.rsplit_once(PATH_SEPARATOR).ok_or_else(invalid)?;
        if name.is_empty() {
            return Err(invalid());
        }
        let channel = channel.parse().map_err(|_| invalid())?;
        Ok(Self::new(channel, name))
    }
}
