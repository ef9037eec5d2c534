//! Function (Gewerk) command implementations

use anyhow::Result;

use super::room::{GroupRow, GroupView};
use super::{by_id_or_name, summarize};
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

fn list(ctx: &RuntimeContext, ccu: &hmip::Ccu) -> Result<()> {
    let mut rows = Vec::new();
    for (id, function) in ccu.functions()? {
        rows.push(GroupRow {
            id,
            name: function.name()?,
            channels: function.channels()?.len(),
        });
    }

    output::print_table(ctx, &rows)
}

fn get(ctx: &RuntimeContext, ccu: &hmip::Ccu, input: &str) -> Result<()> {
    let function = by_id_or_name(
        input,
        |id| ccu.function(id),
        |name| ccu.function_by_name(name),
    )?;

    let view = GroupView {
        id: function.id(),
        name: function.name()?,
        description: function.description()?,
        channels: summarize(&function.channels()?)?,
    };

    output::print_output(ctx, &view)
}
