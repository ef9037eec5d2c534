//! Room command implementations

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use super::{by_id_or_name, summarize, ChannelSummary};
use crate::cli::GroupCommand;
use crate::config::RuntimeContext;
use crate::output;

pub fn run(ctx: &RuntimeContext, command: GroupCommand) -> Result<()> {
    let ccu = ctx.connect()?;
    match command {
        GroupCommand::List => list(ctx, &ccu)?,
        GroupCommand::Get { name } => get(ctx, &ccu, &name)?,
    }
    ccu.close()?;
    Ok(())
}

/// Row shared by the room and function listings
#[derive(Debug, Clone, Serialize, Tabled)]
pub(super) struct GroupRow {
    #[tabled(rename = "ID")]
    pub id: u32,
    #[tabled(rename = "NAME")]
    pub name: String,
    #[tabled(rename = "CHANNELS")]
    pub channels: usize,
}

#[derive(Debug, Serialize)]
pub(super) struct GroupView {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub channels: Vec<ChannelSummary>,
}

fn list(ctx: &RuntimeContext, ccu: &hmip::Ccu) -> Result<()> {
    let mut rows = Vec::new();
    for (id, room) in ccu.rooms()? {
        rows.push(GroupRow {
            id,
            name: room.name()?,
            channels: room.channels()?.len(),
        });
    }

    output::print_table(ctx, &rows)
}

fn get(ctx: &RuntimeContext, ccu: &hmip::Ccu, input: &str) -> Result<()> {
    let room = by_id_or_name(input, |id| ccu.room(id), |name| ccu.room_by_name(name))?;

    let view = GroupView {
        id: room.id(),
        name: room.name()?,
        description: room.description()?,
        channels: summarize(&room.channels()?)?,
    };

    output::print_output(ctx, &view)
}
