//! Program command implementations

use anyhow::{bail, Result};
use serde::Serialize;
use tabled::Tabled;

use super::by_id_or_name;
use crate::cli::ProgramCommand;
use crate::config::RuntimeContext;
use crate::output;

pub fn run(ctx: &RuntimeContext, command: ProgramCommand) -> Result<()> {
    let ccu = ctx.connect()?;
    match command {
        ProgramCommand::List => list(ctx, &ccu)?,
        ProgramCommand::Get { program } => get(ctx, &ccu, &program)?,
        ProgramCommand::Run { program } => execute(ctx, &ccu, &program)?,
    }
    ccu.close()?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct ProgramRow {
    #[tabled(rename = "ID")]
    id: u32,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "ACTIVE")]
    active: bool,
    #[tabled(rename = "VISIBLE")]
    visible: bool,
}

#[derive(Debug, Serialize)]
struct ProgramView {
    id: u32,
    name: String,
    description: String,
    active: bool,
    visible: bool,
    last_run: String,
}

fn find(ccu: &hmip::Ccu, input: &str) -> Result<std::rc::Rc<hmip::Program>> {
    by_id_or_name(input, |id| ccu.program(id), |name| ccu.program_by_name(name))
}

fn list(ctx: &RuntimeContext, ccu: &hmip::Ccu) -> Result<()> {
    let mut rows = Vec::new();
    for (id, program) in ccu.programs()? {
        rows.push(ProgramRow {
            id,
            name: program.name()?,
            active: program.is_active()?,
            visible: program.is_visible()?,
        });
    }

    output::print_table(ctx, &rows)
}

fn get(ctx: &RuntimeContext, ccu: &hmip::Ccu, input: &str) -> Result<()> {
    let program = find(ccu, input)?;

    let view = ProgramView {
        id: program.id(),
        name: program.name()?,
        description: program.description()?,
        active: program.is_active()?,
        visible: program.is_visible()?,
        last_run: output::format_timestamp(program.last_update()?),
    };

    output::print_output(ctx, &view)
}

fn execute(ctx: &RuntimeContext, ccu: &hmip::Ccu, input: &str) -> Result<()> {
    let program = find(ccu, input)?;
    let name = program.name()?;

    if !program.execute()? {
        bail!("the CCU did not confirm running program '{name}'");
    }

    if !ctx.global.quiet {
        println!("Program '{name}' started");
    }
    Ok(())
}
