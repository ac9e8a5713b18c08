//! Command-line argument parsing for Metagate.
//!
//! The binary is thin glue around the gateway: it resolves configuration,
//! reads a batch, and renders the returned record set.

use crate::config::MetastoreConfig;
use crate::db::RecordSet;
use crate::error::Result;
use anyhow::Context;
use clap::Parser;
use std::io::Read;
use std::path::PathBuf;

/// Output format for the returned record set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned text table.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {s}. Expected: text or json")),
        }
    }
}

/// A SQL execution gateway for metadata stores.
#[derive(Parser, Debug)]
#[command(name = "metagate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// SQL batch to execute (reads stdin when omitted and --file is unset)
    #[arg(value_name = "SQL")]
    pub sql: Option<String>,

    /// Read the SQL batch from a file
    #[arg(short = 'f', long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Config file path (TOML)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Metadata store URL (e.g. postgres://host:port/database)
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Metastore driver identifier
    #[arg(long, value_name = "DRIVER")]
    pub driver: Option<String>,

    /// Metastore user
    #[arg(short = 'U', long, value_name = "USER")]
    pub user: Option<String>,

    /// Metastore password
    #[arg(long, value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Pool size ceiling
    #[arg(long, value_name = "N")]
    pub max_active: Option<u32>,

    /// Acquisition timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub max_wait_ms: Option<u64>,

    /// Output format (text or json)
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub output: String,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Builds the final pool configuration with precedence:
    /// CLI flags over config file over environment defaults.
    pub fn resolve_config(&self) -> Result<MetastoreConfig> {
        let mut config = match &self.config {
            Some(path) => MetastoreConfig::load_from_file(path)?,
            None => MetastoreConfig::default(),
        };

        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        if let Some(driver) = &self.driver {
            config.driver = driver.clone();
        }
        if let Some(user) = &self.user {
            config.user = Some(user.clone());
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone());
        }
        if let Some(max_active) = self.max_active {
            config.max_active = max_active;
        }
        if let Some(max_wait_ms) = self.max_wait_ms {
            config.max_wait_ms = max_wait_ms;
        }

        config.apply_env_defaults();
        Ok(config)
    }

    /// Reads the batch from the positional argument, file, or stdin.
    pub fn read_batch(&self) -> anyhow::Result<String> {
        if let Some(sql) = &self.sql {
            return Ok(sql.clone());
        }

        if let Some(path) = &self.file {
            return std::fs::read_to_string(path)
                .with_context(|| format!("failed to read batch from {}", path.display()));
        }

        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read batch from stdin")?;
        Ok(buffer)
    }

    /// Parses the requested output format.
    pub fn output_format(&self) -> anyhow::Result<OutputFormat> {
        self.output.parse().map_err(anyhow::Error::msg)
    }
}

/// Renders a record set in the requested format.
pub fn render(result: &RecordSet, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(result)),
        OutputFormat::Json => {
            serde_json::to_string_pretty(result).context("failed to serialize record set")
        }
    }
}

/// Renders a record set as an aligned text table.
fn render_text(result: &RecordSet) -> String {
    if result.columns.is_empty() {
        return format!("({} rows)", result.row_count);
    }

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.name.len()).collect();
    let rendered_rows: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(|v| v.to_display_string()).collect())
        .collect();

    for row in &rendered_rows {
        for (i, cell) in row.iter().enumerate() {
            if cell.len() > widths[i] {
                widths[i] = cell.len();
            }
        }
    }

    let mut out = String::new();

    let header: Vec<String> = result
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{:<width$}", c.name, width = widths[i]))
        .collect();
    out.push_str(header.join(" | ").trim_end());
    out.push('\n');

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&separator.join("-+-"));
    out.push('\n');

    for row in &rendered_rows {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect();
        out.push_str(line.join(" | ").trim_end());
        out.push('\n');
    }

    out.push_str(&format!("({} rows)", result.row_count));
    out
}
