//! Config command implementations

use anyhow::Result;

use crate::cli::ConfigCommand;
use crate::config::{self as app_config, RuntimeContext};
use crate::output::print_output;

pub fn run(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => show(ctx),
        ConfigCommand::Path => path(ctx),
        ConfigCommand::Get { key } => get(ctx, key.as_deref()),
        ConfigCommand::Reset => reset(ctx),
    }
}

fn show(ctx: &RuntimeContext) -> Result<()> {
    print_output(ctx, &redacted(&ctx.config))?;
    Ok(())
}

/// A copy of the config that is safe to print
fn redacted(config: &app_config::AppConfig) -> app_config::AppConfig {
    let mut config = config.clone();
    if config.ccu.password.is_some() {
        config.ccu.password = Some("********".to_string());
    }
    config
}

fn path(ctx: &RuntimeContext) -> Result<()> {
    println!("{}", ctx.config_path().display());
    Ok(())
}

fn get(ctx: &RuntimeContext, key: Option<&str>) -> Result<()> {
    if let Some(key) = key {
        let value = get_config_value(&redacted(&ctx.config), key)?;
        println!("{value}");
    } else {
        show(ctx)?;
    }
    Ok(())
}

fn reset(ctx: &RuntimeContext) -> Result<()> {
    app_config::write_default_config(ctx.config_path())?;
    println!(
        "Configuration reset to defaults at: {}",
        ctx.config_path().display()
    );
    Ok(())
}

fn get_config_value(config: &app_config::AppConfig, key: &str) -> Result<String> {
    let json = serde_json::to_value(config)?;

    let parts: Vec<&str> = key.split('.').collect();
    let mut current = &json;

    for part in &parts {
        current = current
            .get(part)
            .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {key}"))?;
    }

    Ok(match current {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "null".to_string(),
        other => serde_json::to_string(other)?,
    })
}
