//! Device command implementations

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use super::{find_device, summarize, ChannelSummary};
use crate::cli::DeviceCommand;
use crate::config::RuntimeContext;
use crate::output;

pub fn run(ctx: &RuntimeContext, command: DeviceCommand) -> Result<()> {
    let ccu = ctx.connect()?;
    match command {
        DeviceCommand::List => list(ctx, &ccu)?,
        DeviceCommand::Get { device } => get(ctx, &ccu, &device)?,
    }
    ccu.close()?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct DeviceRow {
    #[tabled(rename = "SERIAL")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "TYPE")]
    device_type: String,
    #[tabled(rename = "FIRMWARE")]
    firmware: String,
}

#[derive(Debug, Serialize)]
struct DeviceView {
    id: String,
    name: String,
    #[serde(rename = "type")]
    device_type: String,
    firmware: String,
    secured: bool,
    channels: Vec<ChannelSummary>,
}

fn list(ctx: &RuntimeContext, ccu: &hmip::Ccu) -> Result<()> {
    let mut rows = Vec::new();
    for (id, device) in ccu.devices()? {
        rows.push(DeviceRow {
            name: device.name()?,
            device_type: device.device_type()?,
            firmware: output::or_dash(device.firmware()?),
            id,
        });
    }

    output::print_table(ctx, &rows)
}

fn get(ctx: &RuntimeContext, ccu: &hmip::Ccu, input: &str) -> Result<()> {
    let device = find_device(ccu, input)?;

    let view = DeviceView {
        id: device.id().to_string(),
        name: device.name()?,
        device_type: device.device_type()?,
        firmware: device.firmware()?,
        secured: device.is_secured()?,
        channels: summarize(&device.channels()?)?,
    };

    output::print_output(ctx, &view)
}
