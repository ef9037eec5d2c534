//! Attribute records parsed from CCU responses
//!
//! The CCU describes every resource as a JSON object with a `title`, some
//! kind-specific attributes and a `~links` array of related resources, each
//! tagged with a relation (`rel`) and a target path (`href`). The records
//! here are the normalized, cacheable form of those responses.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::ids::{normalize_name, ChannelId, FunctionId, RoomId, PATH_SEPARATOR};

/// Link hrefs that point back at the parent or at the settings paramset.
const NON_ENTITY_LINKS: &[&str] = &["..", "$MASTER"];

/// Prefix of channel paths in room and function links.
const DEVICE_PREFIX: &str = "/device/";

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(default, deserialize_with = "string_or_null")]
    rel: String,
    #[serde(default, deserialize_with = "string_or_null")]
    href: String,
    #[serde(default, deserialize_with = "string_or_null")]
    title: String,
}

#[derive(Debug, Deserialize)]
struct Resource {
    #[serde(default, deserialize_with = "string_or_null")]
    title: String,
    #[serde(default, deserialize_with = "string_or_null")]
    description: String,
    #[serde(default, rename = "type", deserialize_with = "string_or_null")]
    kind: String,
    #[serde(default, deserialize_with = "string_or_null")]
    unit: String,
    #[serde(default, deserialize_with = "string_or_null")]
    firmware: String,
    #[serde(default, rename = "aesActive", deserialize_with = "lenient_bool")]
    aes_active: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    active: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    visible: bool,
    #[serde(default, rename = "~links")]
    links: Vec<Link>,
}

impl Resource {
    fn parse(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    fn links<'a>(&'a self, rel: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links
            .iter()
            .filter(move |link| link.rel == rel && !NON_ENTITY_LINKS.contains(&link.href.as_str()))
    }
}

fn string_or_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Accept the CCU's booleans in any of the shapes it emits them in.
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    })
}

fn last_segment(href: &str) -> &str {
    href.trim_end_matches(PATH_SEPARATOR)
        .rsplit(PATH_SEPARATOR)
        .next()
        .unwrap_or(href)
}

fn parse_segment<T: FromStr>(href: &str) -> Option<T> {
    let parsed = last_segment(href).parse().ok();
    if parsed.is_none() {
        log::debug!("skipping link with unexpected href {:?}", href);
    }
    parsed
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

/// A channel as listed by its device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLink {
    pub number: u32,
    pub id: ChannelId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub firmware: String,
    pub secured: bool,
    /// Channels in the order the CCU lists them
    pub channels: Vec<ChannelLink>,
}

impl DeviceRecord {
    pub fn parse(device_id: &str, value: Value) -> Result<Self, serde_json::Error> {
        let resource = Resource::parse(value)?;
        let mut channels = Vec::new();
        for link in resource.links("channel") {
            let Some(number) = parse_segment::<u32>(&link.href) else {
                continue;
            };
            channels.push(ChannelLink {
                number,
                id: ChannelId::new(device_id, number),
                name: link.title.trim().to_string(),
            });
        }

        Ok(Self {
            name: resource.title.trim().to_string(),
            device_type: resource.kind.trim().to_string(),
            firmware: resource.firmware.trim().to_string(),
            secured: resource.aes_active,
            channels,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub name: String,
    pub rooms: Vec<RoomId>,
    pub functions: Vec<FunctionId>,
    /// Parameter names
    pub parameters: Vec<String>,
}

impl ChannelRecord {
    pub fn parse(value: Value) -> Result<Self, serde_json::Error> {
        let resource = Resource::parse(value)?;
        let mut rooms = Vec::new();
        let mut functions = Vec::new();
        let mut parameters = Vec::new();

        for link in resource.links("room") {
            if let Some(id) = parse_segment(&link.href) {
                push_unique(&mut rooms, id);
            }
        }
        for link in resource.links("function") {
            if let Some(id) = parse_segment(&link.href) {
                push_unique(&mut functions, id);
            }
        }
        for link in resource.links("parameter") {
            push_unique(&mut parameters, link.href.clone());
        }

        Ok(Self {
            name: resource.title.trim().to_string(),
            rooms,
            functions,
            parameters,
        })
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.iter().any(|p| p == name)
    }
}

/// Rooms and functions share one shape: a name, a description and the
/// channels assigned to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: String,
    pub description: String,
    pub channels: Vec<ChannelId>,
}

impl GroupRecord {
    pub fn parse(value: Value) -> Result<Self, serde_json::Error> {
        let resource = Resource::parse(value)?;
        let mut channels = Vec::new();
        for link in resource.links("channel") {
            let path = link.href.strip_prefix(DEVICE_PREFIX).unwrap_or(&link.href);
            match path.parse::<ChannelId>() {
                Ok(id) => push_unique(&mut channels, id),
                Err(_) => log::debug!("skipping channel link with unexpected href {:?}", link.href),
            }
        }

        Ok(Self {
            name: resource.title.trim().to_string(),
            description: resource.description.trim().to_string(),
            channels,
        })
    }
}

pub type RoomRecord = GroupRecord;
pub type FunctionRecord = GroupRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub unit: String,
}

impl ParameterRecord {
    pub fn parse(value: Value) -> Result<Self, serde_json::Error> {
        let resource = Resource::parse(value)?;
        Ok(Self {
            name: resource.title.trim().to_string(),
            data_type: resource.kind.trim().to_string(),
            unit: resource.unit.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramRecord {
    pub name: String,
    pub description: String,
    pub active: bool,
    pub visible: bool,
}

impl ProgramRecord {
    pub fn parse(value: Value) -> Result<Self, serde_json::Error> {
        let resource = Resource::parse(value)?;
        Ok(Self {
            name: resource.title.trim().to_string(),
            description: resource.description.trim().to_string(),
            active: resource.active,
            visible: resource.visible,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableRecord {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub unit: String,
}

impl VariableRecord {
    pub fn parse(value: Value) -> Result<Self, serde_json::Error> {
        let resource = Resource::parse(value)?;
        Ok(Self {
            name: resource.title.trim().to_string(),
            description: resource.description.trim().to_string(),
            data_type: resource.kind.trim().to_string(),
            unit: resource.unit.trim().to_string(),
        })
    }
}

/// Current value of a parameter or variable, as served by `~pv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    #[serde(rename = "v", default)]
    pub value: Value,
    /// Milliseconds since the epoch
    #[serde(rename = "ts", default)]
    pub timestamp: i64,
}

impl StateRecord {
    pub fn parse(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// A record for a value written just now.
    pub fn now(value: Value) -> Self {
        Self {
            value,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or_default()
    }
}

/// Build a normalized name -> id index from a collection resource, keeping
/// only links tagged `rel`. Later duplicates overwrite earlier ones.
pub fn parse_name_index<I: FromStr>(value: Value, rel: &str) -> Result<IndexMap<String, I>, serde_json::Error> {
    let resource = Resource::parse(value)?;
    let mut index = IndexMap::new();
    for link in resource.links(rel) {
        if let Some(id) = parse_segment(&link.href) {
            index.insert(normalize_name(&link.title), id);
        }
    }
    Ok(index)
}

/// The ids (last href segments) of all links tagged `rel` in a collection
/// resource, in CCU order.
pub fn parse_link_targets(value: Value, rel: &str) -> Result<Vec<String>, serde_json::Error> {
    let resource = Resource::parse(value)?;
    Ok(resource
        .links(rel)
        .map(|link| last_segment(&link.href).to_string())
        .collect())
}
