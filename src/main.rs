//! hmip - Query and control a Homematic CCU from the terminal
//!
//! Thin command-line front end over the `hmip` library.

mod cli;
mod commands;
mod config;
mod output;

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Command};
use crate::config::RuntimeContext;

fn main() -> ExitCode {
    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = writeln!(io::stderr(), "Error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = RuntimeContext::new(&cli.global)?;
    ctx.init_logging()?;

    log::debug!("Config loaded from: {:?}", ctx.config_path());

    run_command(&ctx, cli.command)
}

fn run_command(ctx: &RuntimeContext, command: Command) -> Result<()> {
    match command {
        Command::Device { command } => commands::device::run(ctx, command),
        Command::Channel { command } => commands::channel::run(ctx, command),
        Command::Parameter { command } => commands::parameter::run(ctx, command),
        Command::Room { command } => commands::room::run(ctx, command),
        Command::Function { command } => commands::function::run(ctx, command),
        Command::Program { command } => commands::program::run(ctx, command),
        Command::Variable { command } => commands::variable::run(ctx, command),
        Command::Cache { command } => commands::cache::run(ctx, command),
        Command::Config { command } => commands::config::run(ctx, command),
        Command::Completions { shell } => commands::completions::run(shell),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_parameter_set() {
        let cli = Cli::parse_from(["hmip", "parameter", "set", "ABC1234567/1/STATE", "true"]);
        match cli.command {
            Command::Parameter {
                command: cli::ParameterCommand::Set { parameter, value },
            } => {
                assert_eq!(parameter, "ABC1234567/1/STATE");
                assert_eq!(value, "true");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
