//! Output formatting utilities

use console::{style, Style};
use serde::Serialize;

use extpilot_stores::{Outcome, Payload, StoreKind, Verb};

use crate::cli::{Cli, OutputFormat};

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    eprintln!("{} {}", style("!").yellow().bold(), message);
}

/// Style for paths
pub fn path_style() -> Style {
    Style::new().cyan()
}

/// Machine readable form of an [`Outcome`]
#[derive(Debug, Serialize)]
pub struct OutcomeReport {
    pub store: StoreKind,
    pub verb: Verb,
    /// Store response; raw bodies that are JSON are embedded as JSON
    pub result: serde_json::Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl From<&Outcome> for OutcomeReport {
    fn from(outcome: &Outcome) -> Self {
        let result = match &outcome.payload {
            Payload::Raw(body) => serde_json::from_str(body)
                .unwrap_or_else(|_| serde_json::Value::String(body.clone())),
            Payload::Json(value) => value.clone(),
            Payload::File(path) => serde_json::json!({ "file": path.display().to_string() }),
            Payload::Done => serde_json::Value::Null,
        };

        Self {
            store: outcome.store,
            verb: outcome.verb,
            result,
            warnings: outcome.warnings.clone(),
        }
    }
}

/// Print the terminal result of a verb
///
/// Store bodies go to stdout untouched so they can be piped; decoration
/// and warnings go to stderr.
pub fn outcome(cli: &Cli, outcome: &Outcome) -> anyhow::Result<()> {
    match cli.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&OutcomeReport::from(outcome))?
            );
        }
        OutputFormat::Text => {
            for message in &outcome.warnings {
                warning(message);
            }
            match &outcome.payload {
                Payload::Raw(body) => println!("{}", body),
                Payload::Json(value) => println!("{}", serde_json::to_string_pretty(value)?),
                Payload::File(path) => {
                    if cli.quiet {
                        println!("{}", path.display());
                    } else {
                        success(&format!(
                            "Signed package written to {}",
                            path_style().apply_to(path.display())
                        ));
                    }
                }
                Payload::Done => {
                    if !cli.quiet {
                        success(&format!("{} finished on {}", outcome.verb, outcome.store));
                    }
                }
            }
        }
    }
    Ok(())
}
