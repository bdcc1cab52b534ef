//! Console messages of the CLI
//!
//! Everything here goes to stderr: stdout is reserved for result rows.

use crate::core::{DriverKind, RunConfig, Workload};
use crate::runtime::{BatchReport, RunSummary};
use colored::Colorize;

const RULE: &str = "------------------------------------------------------------------------";

/// Turn colors on or off for the whole process
pub fn set_color(enabled: bool) {
    colored::control::set_override(enabled);
}

/// Printed once before the first batch
pub fn print_run_header(kind: DriverKind, config: &RunConfig, workload: &Workload) {
    eprintln!(
        "{} {} batches, {} executions against {} across {} workers",
        "Starting".green().bold(),
        workload.batch_count(),
        workload.execution_count(),
        kind.to_string().cyan(),
        config.concurrency_factor
    );
    if let Some(limit) = config.rate_limit {
        eprintln!("  rate limit: {limit:.2}/s");
    }
    if config.async_invocations {
        eprintln!("  async invocations, polled every {:?}", config.poll_interval);
    }
    if config.run_forever {
        eprintln!("  {}", "running until interrupted (Ctrl-C)".yellow());
    }
    eprintln!("{}", RULE.dimmed());
}

pub fn format_batch(report: &BatchReport) -> String {
    format!(
        "Batch #{} completed {} executions in {} ms",
        report.batch,
        report.executions,
        report.elapsed.as_millis()
    )
}

pub fn print_batch(report: &BatchReport) {
    eprintln!("{}", format_batch(report).blue());
}

pub fn format_summary(summary: &RunSummary) -> Vec<String> {
    vec![
        format!("Total time: {} ms", summary.elapsed.as_millis()),
        format!("Total executions: {}", summary.executions),
        format!("Execution Rate: {:.2}", summary.rate),
    ]
}

pub fn print_summary(summary: &RunSummary) {
    eprintln!("{}", RULE.dimmed());
    if summary.interrupted {
        eprintln!("{}", "Run interrupted".yellow().bold());
    }
    for line in format_summary(summary) {
        eprintln!("{}", line.bold());
    }
    eprintln!("{} {}", "Run id:".dimmed(), summary.run_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn test_batch_line() {
        let report = BatchReport {
            pass: 0,
            batch: 3,
            executions: 12,
            elapsed: Duration::from_millis(1530),
        };
        assert_eq!(
            format_batch(&report),
            "Batch #3 completed 12 executions in 1530 ms"
        );
    }

    #[test]
    fn test_summary_lines() {
        let summary = RunSummary {
            run_id: Uuid::new_v4(),
            executions: 50,
            elapsed: Duration::from_secs(4),
            rate: 12.5,
            batches: 5,
            interrupted: false,
        };
        assert_eq!(
            format_summary(&summary),
            vec![
                "Total time: 4000 ms",
                "Total executions: 50",
                "Execution Rate: 12.50"
            ]
        );
    }
}
