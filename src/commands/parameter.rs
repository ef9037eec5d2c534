//! Parameter command implementations

use anyhow::{bail, Result};
use serde::Serialize;
use serde_json::Value;

use crate::cli::ParameterCommand;
use crate::config::RuntimeContext;
use crate::output;

pub fn run(ctx: &RuntimeContext, command: ParameterCommand) -> Result<()> {
    let ccu = ctx.connect()?;
    match command {
        ParameterCommand::Get { parameter, cached } => get(ctx, &ccu, &parameter, cached)?,
        ParameterCommand::Set { parameter, value } => set(ctx, &ccu, &parameter, &value)?,
    }
    ccu.close()?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct ParameterView {
    id: String,
    title: String,
    #[serde(rename = "type")]
    data_type: String,
    unit: String,
    value: Value,
    last_update: String,
}

fn get(ctx: &RuntimeContext, ccu: &hmip::Ccu, id: &str, cached: bool) -> Result<()> {
    let parameter = ccu.parameter(id.trim())?;
    let value = parameter.state(!cached)?;

    let view = ParameterView {
        id: parameter.id().to_string(),
        title: parameter.title()?,
        data_type: parameter.data_type()?,
        unit: parameter.unit()?,
        value,
        last_update: output::format_timestamp(parameter.last_update()?),
    };

    output::print_output(ctx, &view)
}

fn set(ctx: &RuntimeContext, ccu: &hmip::Ccu, id: &str, raw: &str) -> Result<()> {
    let parameter = ccu.parameter(id.trim())?;
    let value = output::parse_value(raw);

    if !parameter.set_state(value.clone())? {
        bail!("the CCU did not confirm writing {} to {}", value, parameter.id());
    }

    if !ctx.global.quiet {
        println!("{} = {}", parameter.id(), output::display_value(&value));
    }
    Ok(())
}
