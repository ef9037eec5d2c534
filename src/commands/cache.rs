//! Cache management commands

use std::time::Duration;

use anyhow::Result;
use hmip::cache::{cache_status, clear_cache, CacheStatus};
use tabled::{Table, Tabled};

use crate::cli::{CacheCommand, OutputFormat};
use crate::config::RuntimeContext;
use crate::output::print_output;

/// Execute cache commands
pub fn run(ctx: &RuntimeContext, command: CacheCommand) -> Result<()> {
    match command {
        CacheCommand::Status => status(ctx),
        CacheCommand::Clear => clear(ctx),
        CacheCommand::Path => path(ctx),
    }
}

#[derive(Tabled)]
struct PoolRow {
    #[tabled(rename = "Pool")]
    name: String,
    #[tabled(rename = "Live")]
    live: usize,
    #[tabled(rename = "Expired")]
    expired: usize,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Oldest")]
    oldest: String,
    #[tabled(rename = "Next expiry")]
    next_expiry: String,
    #[tabled(rename = "Status")]
    status: String,
}

fn status(ctx: &RuntimeContext) -> Result<()> {
    let dir = ctx.cache_dir()?;
    let status = cache_status(&dir)?;

    match ctx.output_format() {
        OutputFormat::Json | OutputFormat::Yaml => print_output(ctx, &status),
        _ => {
            let server_url = ctx.session_config()?.base_url;
            println!("Cache directory: {}", status.cache_dir.display());
            println!("Server: {server_url}");
            println!();

            if status.pools.is_empty() {
                println!("Nothing cached yet.");
                return Ok(());
            }

            println!("{}", Table::new(pool_rows(&status, &server_url)));
            println!();
            println!("Total size: {}", format_bytes(status.total_size_bytes));
            Ok(())
        }
    }
}

fn pool_rows(status: &CacheStatus, server_url: &str) -> Vec<PoolRow> {
    let server_url = server_url.trim_end_matches('/');
    status
        .pools
        .iter()
        .map(|pool| PoolRow {
            name: pool.name.clone(),
            live: pool.live,
            expired: pool.expired,
            size: format_bytes(pool.size_bytes),
            oldest: pool
                .oldest_age_secs
                .map(format_age)
                .unwrap_or_else(|| "-".to_string()),
            next_expiry: pool
                .next_expiry_secs
                .map(format_age)
                .unwrap_or_else(|| "-".to_string()),
            status: if pool.server_url == server_url {
                "valid".to_string()
            } else {
                "different server".to_string()
            },
        })
        .collect()
}

fn clear(ctx: &RuntimeContext) -> Result<()> {
    let dir = ctx.cache_dir()?;

    if !dir.exists() {
        if !ctx.global.quiet {
            println!("Cache directory does not exist: {}", dir.display());
        }
        return Ok(());
    }

    clear_cache(&dir)?;

    if !ctx.global.quiet {
        println!("Cache cleared: {}", dir.display());
    }

    Ok(())
}

fn path(ctx: &RuntimeContext) -> Result<()> {
    let dir = ctx.cache_dir()?;

    match ctx.output_format() {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({ "path": dir.display().to_string() })
            );
        }
        OutputFormat::Yaml => {
            println!("path: {}", dir.display());
        }
        _ => {
            println!("{}", dir.display());
        }
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Age rounded to its largest unit, e.g. `3h`
fn format_age(secs: u64) -> String {
    let unit = match secs {
        0..=59 => 1,
        60..=3599 => 60,
        3600..=86_399 => 3600,
        _ => 86_400,
    };
    humantime::format_duration(Duration::from_secs(secs / unit * unit)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmip::cache::PoolStatus;
    use std::path::PathBuf;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(42), "42s");
        assert_eq!(format_age(150), "2m");
        assert_eq!(format_age(7300), "2h");
        assert_eq!(format_age(3 * 86_400 + 5), "3days");
    }

    #[test]
    fn test_pool_rows_flag_other_server() {
        let status = CacheStatus {
            cache_dir: PathBuf::from("/tmp/hmip"),
            pools: vec![PoolStatus {
                name: "roomData".to_string(),
                path: PathBuf::from("/tmp/hmip/roomData.json"),
                live: 2,
                expired: 1,
                size_bytes: 300,
                oldest_age_secs: Some(90),
                next_expiry_secs: None,
                server_url: "https://other:2122".to_string(),
            }],
            total_size_bytes: 300,
        };

        let rows = pool_rows(&status, "https://ccu3-webui:2122/");
        assert_eq!(rows[0].status, "different server");
        assert_eq!(rows[0].oldest, "1m");
        assert_eq!(rows[0].next_expiry, "-");

        let rows = pool_rows(&status, "https://other:2122");
        assert_eq!(rows[0].status, "valid");
    }
}
