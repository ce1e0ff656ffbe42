//! Output format selection for structured reports.

use std::io::IsTerminal as _;

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

/// Output format for command reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Compact plain text (agent-friendly, stable to parse by line).
    Text,
    /// Machine-parseable JSON.
    Json,
    /// Colored, human-friendly text.
    Pretty,
}

impl OutputFormat {
    /// Apply the hidden `--json` shorthand on top of an explicit `--format`.
    #[must_use]
    pub fn with_json_flag(format: Option<Self>, json: bool) -> Option<Self> {
        if json { Some(Self::Json) } else { format }
    }

    /// Resolve an optional user choice: explicit flag wins, then the `FORMAT`
    /// env var, then TTY auto-detection (pretty for terminals, text for pipes).
    #[must_use]
    pub fn resolve(format: Option<Self>) -> Self {
        if let Some(f) = format {
            return f;
        }
        if let Ok(var) = std::env::var("FORMAT")
            && let Ok(f) = Self::from_str(&var, true)
        {
            return f;
        }
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Text
        }
    }

    /// Serialize data for the machine-readable formats.
    ///
    /// # Errors
    /// Fails on serialization errors, or when called for a text format —
    /// text output is printed directly by each command, not serialized.
    pub fn serialize<T: Serialize>(self, data: &T) -> Result<String> {
        match self {
            Self::Json => serde_json::to_string_pretty(data)
                .map_err(|e| anyhow::anyhow!("JSON serialization failed: {e}")),
            Self::Text | Self::Pretty => {
                anyhow::bail!("text formats do not use serialize()")
            }
        }
    }

    /// Whether ANSI color should be emitted.
    #[must_use]
    pub fn should_use_color(self) -> bool {
        self == Self::Pretty && std::io::stdout().is_terminal()
    }
}
