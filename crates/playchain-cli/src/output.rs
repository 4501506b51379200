//! Output formatting for CLI

use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

/// One resource line of `urls` and `probe`
#[derive(Debug, Serialize, Tabled)]
pub struct ResourceRow {
    pub technology: String,
    pub stream: String,
    pub status: String,
    pub url: String,
}

/// Render rows in the selected format
pub fn render_rows(rows: &[ResourceRow], format: &str) -> String {
    match OutputFormat::from(format) {
        OutputFormat::Json => {
            serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Table => Table::new(rows).to_string(),
        OutputFormat::Text => rows
            .iter()
            .map(|r| format!("{:<7} {:<12} {:<10} {}", r.technology, r.stream, r.status, r.url))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}
