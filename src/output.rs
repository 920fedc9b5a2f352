//! Text and JSON output formatting for CLI commands.

use serde_json::Value;

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Print a single JSON document in the selected format
pub fn print_document(document: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Text => match document.as_object() {
            Some(fields) => {
                for (key, value) in fields {
                    print_kv(key, &render(value));
                }
            }
            None => println!("{}", render(document)),
        },
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(document).unwrap_or_else(|_| "{}".to_string());
            println!("{}", json);
        }
    }
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("⚠ {}", msg);
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {}", msg);
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<24} {}", format!("{}:", key), value);
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
