use std::process::ExitCode;

use anyhow::{Context, Result};

use pitchline::config::Config;
use pitchline::quality;

/// Standalone data-quality pass over every processed artifact.
///
/// Exits non-zero iff at least one FAIL-level check fires; WARNs never
/// affect the exit code.
fn main() -> Result<ExitCode> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let write_json = args.iter().any(|a| a == "--json");

    let config = Config::from_env();
    let report = quality::run(&config)?;
    report.print();

    if write_json {
        let path = config.processed("dq_report.json");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let json = serde_json::to_string_pretty(&report.to_json())
            .context("serialize dq report")?;
        std::fs::write(&path, json)
            .with_context(|| format!("write {}", path.display()))?;
        println!("Wrote {}", path.display());
    }

    if report.n_fail() > 0 {
        println!();
        println!("FAILURES DETECTED — exiting with code 1");
        return Ok(ExitCode::FAILURE);
    }
    println!();
    println!("All checks passed (with warnings noted above).");
    Ok(ExitCode::SUCCESS)
}
