use std::io::{self, Write};

use serde::Serialize;
use tracing::info;

use crate::app::{ProgressEvent, ProgressSink, RunReport, TargetStatus};
use crate::checks::Severity;

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalizeResult {
    pub input: String,
    pub output: String,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &RunReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_normalized(result: &NormalizeResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Forwards progress events to the log.
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_report(report: &RunReport) {
        println!("{CYAN}ds-lint summary for {} ({:?}){RESET}", report.root, report.kind);
        println!(
            "{GREEN}passed: {}{RESET}  {YELLOW}failed: {}{RESET}  {RED}errors: {}{RESET}",
            report.count(TargetStatus::Passed),
            report.count(TargetStatus::Failed),
            report.count(TargetStatus::Error)
        );

        for target in &report.targets {
            let (label, color) = match target.status {
                TargetStatus::Passed => ("PASS", GREEN),
                TargetStatus::Failed => ("FAIL", YELLOW),
                TargetStatus::Error => ("ERROR", RED),
            };
            println!("{color}{label:<5} {} {}{RESET}", target.canonical_type, target.path);
            if let Some(reference) = &target.reference {
                println!("      reference: {reference}");
            }
            for finding in &target.findings {
                let color = match finding.severity {
                    Severity::Warning => YELLOW,
                    Severity::Error => RED,
                };
                match finding.line {
                    Some(line) => println!("{color}      line {line}: {}{RESET}", finding.message),
                    None => println!("{color}      {}{RESET}", finding.message),
                }
            }
            if let Some(error) = &target.error {
                println!("{RED}      {error}{RESET}");
            }
            if let Some(path) = &target.validator_report {
                println!("      validator report: {path}");
            }
            if let Some(path) = &target.normalized {
                println!("{CYAN}      normalized: {path}{RESET}");
            }
        }

        for readme in &report.readmes {
            println!("{CYAN}README {}{RESET}", readme.path);
            for check in &readme.checks {
                let (label, color) = if check.resolved {
                    ("resolved", GREEN)
                } else {
                    ("unresolved", YELLOW)
                };
                println!("{color}      {:?} {} {label}{RESET}", check.field, check.doi);
            }
            if let Some(error) = &readme.error {
                println!("{RED}      {error}{RESET}");
            }
        }
    }

    pub fn print_normalized(result: &NormalizeResult) {
        println!("{GREEN}normalized {} -> {}{RESET}", result.input, result.output);
    }
}
