//! The status table printed at the end of a run.
//!
//! One column per daemon, one line per field:
//!
//! ```text
//!               bitcoind      lnd
//! Latest        0.21.0        0.17.0-beta
//! Installed     0.21.0        0.17.0-beta
//! Running       0.20.1        locked
//! ```

use colored::Colorize;

use crate::constants::COLUMN_WIDTH;
use crate::daemon::{DaemonOutcome, RunReport};

const FAILED: &str = "failed";
const ABSENT: &str = "-";

/// The table as plain text lines, without trailing whitespace.
pub fn table_lines(report: &RunReport) -> Vec<String> {
    let mut columns: Vec<[String; 4]> = vec![[
        String::new(),
        "Latest".to_string(),
        "Installed".to_string(),
        "Running".to_string(),
    ]];
    for outcome in &report.outcomes {
        columns.push(match outcome {
            DaemonOutcome::Done(row) => [
                row.name.clone(),
                row.latest.to_string(),
                row.installed.as_ref().map_or_else(|| ABSENT.to_string(), ToString::to_string),
                row.running.to_string(),
            ],
            DaemonOutcome::Failed { name, .. } => {
                [name.clone(), FAILED.to_string(), ABSENT.to_string(), ABSENT.to_string()]
            }
        });
    }

    (0..4)
        .map(|line| {
            let text: String = columns
                .iter()
                .map(|column| format!("{:<width$}", column[line], width = COLUMN_WIDTH))
                .collect();
            text.trim_end().to_string()
        })
        .collect()
}

/// Print the table to stdout with a bold header line.
pub fn print_table(report: &RunReport) {
    for (index, line) in table_lines(report).into_iter().enumerate() {
        if index == 0 {
            println!("{}", line.bold());
        } else {
            println!("{line}");
        }
    }
}
