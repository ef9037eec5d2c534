//! CLI argument parsing and command definitions

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Query and control a Homematic CCU from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "hmip",
    author,
    version,
    about = "Query and control a Homematic CCU from the terminal",
    propagate_version = true,
    after_help = "Use 'hmip <command> --help' for more information about a command."
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,
    #[command(subcommand)]
    pub command: Command,
}

/// Global options available to all commands
#[derive(Debug, Clone, Args)]
pub struct GlobalOpts {
    /// Output format (json, yaml, table, auto)
    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        global = true,
        conflicts_with = "json"
    )]
    pub output_format: Option<OutputFormat>,

    /// Output as JSON (shorthand for -o json)
    #[arg(long, global = true)]
    pub json: bool,

    /// CCU REST base URL
    #[arg(short = 'u', long, env = "HMIP_URL", global = true)]
    pub url: Option<String>,

    /// HTTP basic auth user
    #[arg(long, env = "HMIP_USERNAME", global = true)]
    pub username: Option<String>,

    /// HTTP basic auth password
    #[arg(long, env = "HMIP_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Skip SSL certificate verification
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Language for room and function names
    #[arg(long, value_enum, global = true)]
    pub language: Option<LanguageArg>,

    /// Neither read nor write the on-disk cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Override config file path
    #[arg(long, value_name = "PATH", env = "HMIP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Reduce output to only errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase logging verbosity (stackable: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Enable debug logging (equivalent to -vv)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Enable trace logging
    #[arg(long, global = true)]
    pub trace: bool,

    /// Disable colored output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Hide table headers
    #[arg(long, global = true)]
    pub no_headers: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[non_exhaustive]
pub enum OutputFormat {
    Json,
    Yaml,
    Table,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LanguageArg {
    En,
    De,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect devices
    Device {
        #[command(subcommand)]
        command: DeviceCommand,
    },

    /// Inspect channels
    Channel {
        #[command(subcommand)]
        command: ChannelCommand,
    },

    /// Read and write channel parameters
    Parameter {
        #[command(subcommand)]
        command: ParameterCommand,
    },

    /// Inspect rooms
    Room {
        #[command(subcommand)]
        command: GroupCommand,
    },

    /// Inspect functions (Gewerke)
    Function {
        #[command(subcommand)]
        command: GroupCommand,
    },

    /// Inspect and run programs
    Program {
        #[command(subcommand)]
        command: ProgramCommand,
    },

    /// Read and write system variables
    Variable {
        #[command(subcommand)]
        command: VariableCommand,
    },

    /// Manage the local cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// Inspect and manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
pub enum DeviceCommand {
    /// List all devices
    List,

    /// Show a device and its channels
    Get {
        /// Device serial or name
        device: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ChannelCommand {
    /// Show a channel with its rooms, functions and parameters
    Get {
        /// Channel id (SERIAL/NUMBER) or name
        channel: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ParameterCommand {
    /// Read the current value
    Get {
        /// Parameter id (e.g., ABC1234567/1/STATE)
        parameter: String,

        /// Allow a cached value up to an hour old
        #[arg(long)]
        cached: bool,
    },

    /// Write a new value
    Set {
        /// Parameter id (e.g., ABC1234567/1/STATE)
        parameter: String,

        /// New value, parsed as JSON with fallback to a plain string
        value: String,
    },
}

/// Subcommands shared by rooms and functions
#[derive(Debug, Subcommand)]
pub enum GroupCommand {
    /// List all entries
    List,

    /// Show one entry and its channels
    Get {
        /// Numeric id or name
        name: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ProgramCommand {
    /// List all programs
    List,

    /// Show a program
    Get {
        /// Numeric id or name
        program: String,
    },

    /// Execute a program
    Run {
        /// Numeric id or name
        program: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum VariableCommand {
    /// List all system variables
    List,

    /// Read a system variable
    Get {
        /// Numeric id or name
        variable: String,

        /// Allow a cached value up to an hour old
        #[arg(long)]
        cached: bool,
    },

    /// Write a system variable
    Set {
        /// Numeric id or name
        variable: String,

        /// New value, parsed as JSON with fallback to a plain string
        value: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Show cache status
    Status,

    /// Remove all cached data
    Clear,

    /// Print the cache directory
    Path,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show effective configuration
    Show,

    /// Print config file path
    Path,

    /// Get a specific configuration value
    Get {
        /// Configuration key (dot-separated path)
        key: Option<String>,
    },

    /// Reset configuration to defaults
    Reset,
}
