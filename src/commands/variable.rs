//! System variable command implementations

use std::rc::Rc;

use anyhow::{bail, Result};
use hmip::Variable;
use serde::Serialize;
use serde_json::Value;
use tabled::Tabled;

use super::by_id_or_name;
use crate::cli::VariableCommand;
use crate::config::RuntimeContext;
use crate::output;

pub fn run(ctx: &RuntimeContext, command: VariableCommand) -> Result<()> {
    let ccu = ctx.connect()?;
    match command {
        VariableCommand::List => list(ctx, &ccu)?,
        VariableCommand::Get { variable, cached } => get(ctx, &ccu, &variable, cached)?,
        VariableCommand::Set { variable, value } => set(ctx, &ccu, &variable, &value)?,
    }
    ccu.close()?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct VariableRow {
    #[tabled(rename = "ID")]
    id: u32,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "TYPE")]
    data_type: String,
    #[tabled(rename = "VALUE")]
    value: String,
    #[tabled(rename = "UNIT")]
    unit: String,
}

#[derive(Debug, Serialize)]
struct VariableView {
    id: u32,
    name: String,
    description: String,
    #[serde(rename = "type")]
    data_type: String,
    unit: String,
    value: Value,
    last_update: String,
}

fn find(ccu: &hmip::Ccu, input: &str) -> Result<Rc<Variable>> {
    by_id_or_name(input, |id| ccu.variable(id), |name| ccu.variable_by_name(name))
}

fn list(ctx: &RuntimeContext, ccu: &hmip::Ccu) -> Result<()> {
    let mut rows = Vec::new();
    for (id, variable) in ccu.variables()? {
        rows.push(VariableRow {
            id,
            name: variable.name()?,
            data_type: variable.data_type()?,
            // Listing accepts values up to an hour old
            value: output::display_value(&variable.state(false)?),
            unit: output::or_dash(variable.unit()?),
        });
    }

    output::print_table(ctx, &rows)
}

fn get(ctx: &RuntimeContext, ccu: &hmip::Ccu, input: &str, cached: bool) -> Result<()> {
    let variable = find(ccu, input)?;
    let value = variable.state(!cached)?;

    let view = VariableView {
        id: variable.id(),
        name: variable.name()?,
        description: variable.description()?,
        data_type: variable.data_type()?,
        unit: variable.unit()?,
        value,
        last_update: output::format_timestamp(variable.last_update()?),
    };

    output::print_output(ctx, &view)
}

fn set(ctx: &RuntimeContext, ccu: &hmip::Ccu, input: &str, raw: &str) -> Result<()> {
    let variable = find(ccu, input)?;
    let value = output::parse_value(raw);

    if !variable.set_state(value.clone())? {
        bail!(
            "the CCU did not confirm writing {} to variable {}",
            value,
            variable.id()
        );
    }

    if !ctx.global.quiet {
        println!("{} = {}", variable.name()?, output::display_value(&value));
    }
    Ok(())
}
