// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Choreography script commands
//!
//! Commands: check

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use flockstep_core::domain::script::DanceScript;
use flockstep_core::infrastructure::script_parser::{ParsedScripts, ScriptParser};

#[derive(Subcommand)]
pub enum ScriptCommand {
    /// Parse a script and summarize its performances
    Check {
        /// Script file, e.g. dance_1.txt
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Fail if the parser reported any warning
        #[arg(long)]
        strict: bool,
    },
}

pub async fn handle_command(command: ScriptCommand) -> Result<()> {
    match command {
        ScriptCommand::Check { file, strict } => check(&file, strict),
    }
}

fn check(file: &Path, strict: bool) -> Result<()> {
    let parsed = ScriptParser::parse_file(file)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    print!("{}", render_summary(file, &parsed));

    if strict && !parsed.warnings.is_empty() {
        anyhow::bail!("{} warning(s) in {}", parsed.warnings.len(), file.display());
    }
    println!("{}", "✓ Script parsed".green());
    Ok(())
}

/// Human-readable report of a parsed script.
pub fn render_summary(file: &Path, parsed: &ParsedScripts) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} {}\n", "Script:".bold(), file.display()));
    out.push_str(&format!("  Performances: {}\n", parsed.performances.len()));

    for (index, performance) in parsed.performances.iter().enumerate() {
        out.push_str(&format!("\n{}\n", format!("Performance {}:", index).bold()));
        out.push_str(&describe(performance, "  "));
    }

    if !parsed.warnings.is_empty() {
        out.push_str(&format!("\n{}\n", "Warnings:".yellow().bold()));
        for warning in &parsed.warnings {
            out.push_str(&format!("  - {}\n", warning.to_string().yellow()));
        }
    }
    out
}

fn describe(script: &DanceScript, indent: &str) -> String {
    let mut out = format!(
        "{indent}Instructions: {}\n{indent}Duration: {} ms\n",
        script.len(),
        script.duration()
    );
    match script.landing_time {
        Some(time) => out.push_str(&format!("{indent}Landing at: {} ms\n", time)),
        None => out.push_str(&format!("{indent}Landing at: {}\n", "(no LAND)".dimmed())),
    }

    let mut names: Vec<&String> = script.procedures.keys().collect();
    names.sort();
    for name in names {
        if let Some(body) = script.procedures.get(name) {
            out.push_str(&format!(
                "{indent}Procedure {}: {} instruction(s), {} ms\n",
                name,
                body.len(),
                body.duration()
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lists_performances_and_procedures() {
        colored::control::set_override(false);
        let parsed = ScriptParser::parse_str(
            "number_of_performances = 1\n\
             PROCEDURE wave\n\
             0 LEDS ON\n\
             300 LEDS OFF\n\
             ENDP\n\
             0 TAKEOFF\n\
             100 RUN wave\n\
             900 LAND\n\
             1000 END\n",
        )
        .unwrap();

        let summary = render_summary(Path::new("dance_1.txt"), &parsed);
        assert!(summary.contains("Performances: 1"));
        assert!(summary.contains("Instructions: 4"));
        assert!(summary.contains("Landing at: 900 ms"));
        assert!(summary.contains("Procedure WAVE: 2 instruction(s), 300 ms"));
        assert!(!summary.contains("Warnings"));
    }

    #[test]
    fn test_strict_check_fails_on_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dance_1.txt");
        std::fs::write(&path, "number_of_performances = 1\n0 WIGGLE\n10 END\n").unwrap();

        assert!(check(&path, false).is_ok());
        assert!(check(&path, true).is_err());
    }
}
