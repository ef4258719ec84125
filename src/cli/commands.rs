//! CLI subcommand definitions

use clap::Subcommand;

use crate::consts::HOURS_PER_DAY;

/// Main CLI commands
#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Print the shard paths the current selection resolves to
    Paths {
        /// Day identifier (YYYY-MM-DD, repeatable)
        #[arg(long = "hourly", value_name = "DAY")]
        days: Vec<String>,
        /// Month identifier (YYYY-MM, repeatable)
        #[arg(long = "monthly", value_name = "MONTH")]
        months: Vec<String>,
    },
    /// Show the hour-of-day distribution per day
    Hourly {
        /// Day identifier (YYYY-MM-DD, repeatable)
        #[arg(long = "date", value_name = "DAY")]
        dates: Vec<String>,
        /// Focused hour of day
        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..HOURS_PER_DAY as i64))]
        hour: u8,
        /// Rows shown per day in the focused hour
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Show the per-day series for each month
    Monthly {
        /// Month identifier (YYYY-MM, repeatable)
        #[arg(long = "month", value_name = "MONTH")]
        months: Vec<String>,
    },
    /// List the selectable days of each month
    Days {
        /// Month identifier (YYYY-MM, repeatable)
        #[arg(long = "month", value_name = "MONTH")]
        months: Vec<String>,
    },
    /// Read selection commands from stdin and keep the series in sync
    Session {
        /// Rows shown per day in the focused hour
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
}

/// One line of session input
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionCommand {
    Toggle { dimension: String, option: String },
    Dates(Vec<String>),
    Months(Vec<String>),
    Hour(String),
    Show,
}

impl SessionCommand {
    /// Parse a whitespace separated session line; blank lines and `#` comments yield `None`
    pub(crate) fn parse(line: &str) -> Option<Result<Self, String>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let mut words = line.split_whitespace();
        let verb = words.next()?;
        let rest: Vec<String> = words.map(str::to_string).collect();

        let parsed = match (verb, rest.as_slice()) {
            ("toggle", [dimension, option]) => Ok(SessionCommand::Toggle {
                dimension: dimension.clone(),
                option: option.clone(),
            }),
            ("toggle", _) => Err("usage: toggle <dimension> <option>".to_string()),
            ("dates", _) => Ok(SessionCommand::Dates(rest)),
            ("months", _) => Ok(SessionCommand::Months(rest)),
            ("hour", [hour]) => Ok(SessionCommand::Hour(hour.clone())),
            ("hour", _) => Err("usage: hour <0-23>".to_string()),
            ("show", []) => Ok(SessionCommand::Show),
            _ => Err(format!("unknown session command: {line}")),
        };
        Some(parsed)
    }
}
