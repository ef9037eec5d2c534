//! Command implementations

pub mod cache;
pub mod channel;
pub mod completions;
pub mod config;
pub mod device;
pub mod function;
pub mod parameter;
pub mod program;
pub mod room;
pub mod variable;

use std::rc::Rc;

use anyhow::Result;
use hmip::{Ccu, Channel, Device};
use serde::Serialize;

/// Numeric ids are looked up directly, anything else by name.
fn by_id_or_name<T>(
    input: &str,
    by_id: impl FnOnce(u32) -> hmip::Result<T>,
    by_name: impl FnOnce(&str) -> hmip::Result<T>,
) -> Result<T> {
    let found = match input.trim().parse::<u32>() {
        Ok(id) => by_id(id),
        Err(_) => by_name(input),
    };
    Ok(found?)
}

/// Devices are tried by name first, then by serial.
fn find_device(ccu: &Ccu, input: &str) -> Result<Rc<Device>> {
    match ccu.device_by_name(input) {
        Err(err) if err.is_not_found() => Ok(ccu.device(input.trim())?),
        other => Ok(other?),
    }
}

/// `SERIAL/NUMBER` is a channel id, anything else a channel name.
fn find_channel(ccu: &Ccu, input: &str) -> Result<Rc<Channel>> {
    if input.contains('/') {
        Ok(ccu.channel(input.trim())?)
    } else {
        Ok(ccu.channel_by_name(input)?)
    }
}

/// A channel as listed under its device, room or function.
#[derive(Debug, Serialize)]
struct ChannelSummary {
    id: String,
    name: String,
}

impl ChannelSummary {
    fn of(channel: &Channel) -> Result<Self> {
        Ok(Self {
            id: channel.id().to_string(),
            name: channel.name()?,
        })
    }
}

fn summarize<'a, K: 'a>(
    channels: impl IntoIterator<Item = (&'a K, &'a Rc<Channel>)>,
) -> Result<Vec<ChannelSummary>> {
    channels
        .into_iter()
        .map(|(_, channel)| ChannelSummary::of(channel))
        .collect()
}
