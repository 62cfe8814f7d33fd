use std::process::ExitCode;

use anyhow::Result;

use pitchline::config::Config;
use pitchline::pipeline::{self, RunOptions};

fn print_usage() {
    println!("pitchline — deterministic match-analytics build pipeline");
    println!();
    println!("Usage:");
    println!("  pitchline [--from-step ID] [--to-step ID] [--fail-fast] [--rebuild-all]");
    println!("  pitchline --list-steps");
    println!();
    println!("Runs the inclusive step range (default: everything), logging each run");
    println!("to the pipeline run log. Only a fully successful run updates the");
    println!("latest-success marker.");
}

fn parse_flag_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn main() -> Result<ExitCode> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(ExitCode::SUCCESS);
    }
    if args.iter().any(|a| a == "--list-steps") {
        for step in pipeline::STEPS {
            println!("{:<18} {}", step.id, step.label);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let opts = RunOptions {
        from_step: parse_flag_value(&args, "--from-step"),
        to_step: parse_flag_value(&args, "--to-step"),
        fail_fast: args.iter().any(|a| a == "--fail-fast"),
        rebuild_all: args.iter().any(|a| a == "--rebuild-all"),
    };

    let config = Config::from_env();
    let outcome = pipeline::run(&config, &opts)?;
    Ok(ExitCode::from(u8::try_from(outcome.exit_code).unwrap_or(1)))
}
