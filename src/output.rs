//! Output formatting utilities
//!
//! Handles JSON, YAML, and table output formats.

use std::io::IsTerminal;

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use serde_json::Value;
use tabled::settings::object::Rows;
use tabled::settings::{Remove, Style};
use tabled::{Table, Tabled};

use crate::cli::OutputFormat;
use crate::config::RuntimeContext;

/// Format and print data according to the configured output format
pub fn print_output<T: Serialize>(ctx: &RuntimeContext, data: &T) -> Result<()> {
    let output = format_output(ctx.output_format(), std::io::stdout().is_terminal(), data)?;
    println!("{output}");
    Ok(())
}

fn format_output<T: Serialize>(format: OutputFormat, is_tty: bool, data: &T) -> Result<String> {
    match format {
        OutputFormat::Yaml => Ok(serde_yaml::to_string(data)?),
        OutputFormat::Json | OutputFormat::Table | OutputFormat::Auto if is_tty => {
            Ok(serde_json::to_string_pretty(data)?)
        }
        _ => Ok(serde_json::to_string(data)?),
    }
}

/// Print rows as a table, or serialized when a structured format is
/// requested or stdout is piped
pub fn print_table<T: Tabled + Serialize>(ctx: &RuntimeContext, items: &[T]) -> Result<()> {
    let format = ctx.output_format();
    let is_tty = std::io::stdout().is_terminal();

    if wants_table(format, is_tty) {
        let no_headers = ctx.global.no_headers || ctx.config.output.no_headers;
        println!("{}", build_table(items, no_headers));
        Ok(())
    } else {
        print_output(ctx, &items)
    }
}

fn wants_table(format: OutputFormat, is_tty: bool) -> bool {
    match format {
        OutputFormat::Table => true,
        OutputFormat::Auto => is_tty,
        _ => false,
    }
}

fn build_table<T: Tabled>(items: &[T], no_headers: bool) -> Table {
    let mut table = Table::new(items);
    table.with(Style::sharp());

    if no_headers {
        table.with(Remove::row(Rows::first()));
    }

    table
}

/// Parse a value given on the command line: JSON when it parses, otherwise
/// the raw string
pub fn parse_value(input: &str) -> Value {
    serde_json::from_str(input.trim()).unwrap_or_else(|_| Value::String(input.to_string()))
}

/// Render a CCU value for table cells
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

pub fn or_dash(value: String) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize, Tabled)]
    struct Row {
        #[tabled(rename = "ID")]
        id: u32,
        #[tabled(rename = "NAME")]
        name: String,
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("21.5"), json!(21.5));
        assert_eq!(parse_value(r#"{"a": 1}"#), json!({"a": 1}));
        assert_eq!(parse_value("Kitchen"), json!("Kitchen"));
        assert_eq!(parse_value(" 1 "), json!(1));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("on")), "on");
        assert_eq!(display_value(&json!(false)), "false");
        assert_eq!(display_value(&Value::Null), "-");
    }

    #[test]
    fn test_format_output_piped_is_compact() {
        let data = json!({"id": 1});
        assert_eq!(
            format_output(OutputFormat::Auto, false, &data).unwrap(),
            r#"{"id":1}"#
        );
        assert!(format_output(OutputFormat::Json, true, &data)
            .unwrap()
            .contains('\n'));
        assert_eq!(
            format_output(OutputFormat::Yaml, false, &data).unwrap(),
            "id: 1\n"
        );
    }

    #[test]
    fn test_wants_table() {
        assert!(wants_table(OutputFormat::Table, false));
        assert!(wants_table(OutputFormat::Auto, true));
        assert!(!wants_table(OutputFormat::Auto, false));
        assert!(!wants_table(OutputFormat::Json, true));
    }

    #[test]
    fn test_build_table_without_headers() {
        let rows = vec![Row {
            id: 1234,
            name: "Kitchen".to_string(),
        }];

        let with = build_table(&rows, false).to_string();
        assert!(with.contains("NAME"));
        assert!(with.contains("Kitchen"));

        let without = build_table(&rows, true).to_string();
        assert!(!without.contains("NAME"));
        assert!(without.contains("Kitchen"));
    }
}
