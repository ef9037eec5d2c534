//! Channel command implementations

use anyhow::Result;
use serde::Serialize;

use super::find_channel;
use crate::cli::ChannelCommand;
use crate::config::RuntimeContext;
use crate::output;

pub fn run(ctx: &RuntimeContext, command: ChannelCommand) -> Result<()> {
    let ccu = ctx.connect()?;
    match command {
        ChannelCommand::Get { channel } => get(ctx, &ccu, &channel)?,
    }
    ccu.close()?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct ChannelView {
    id: String,
    name: String,
    device: String,
    rooms: Vec<String>,
    functions: Vec<String>,
    parameters: Vec<String>,
}

fn get(ctx: &RuntimeContext, ccu: &hmip::Ccu, input: &str) -> Result<()> {
    let channel = find_channel(ccu, input)?;

    let rooms = channel
        .rooms()?
        .values()
        .map(|room| room.name())
        .collect::<hmip::Result<Vec<_>>>()?;
    let functions = channel
        .functions()?
        .values()
        .map(|function| function.name())
        .collect::<hmip::Result<Vec<_>>>()?;

    let view = ChannelView {
        id: channel.id().to_string(),
        name: channel.name()?,
        device: channel.device().name()?,
        rooms,
        functions,
        parameters: channel.parameters()?.into_keys().collect(),
    };

    output::print_output(ctx, &view)
}
