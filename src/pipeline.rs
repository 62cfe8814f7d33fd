use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::{
    age_curves, benchmarks, consistency, managers, match_summary, momentum, opponent_context,
    percentiles, player_career, player_season, progression, quality, rolling_form, scores,
    scouting, substitutions, tactical, team_season,
};

/// One pipeline step: a named, independently-runnable unit.
pub struct Step {
    pub id: &'static str,
    pub label: &'static str,
    pub run: fn(&Config) -> Result<()>,
}

fn check_index(config: &Config) -> Result<()> {
    let path = config.matches_index();
    if !path.exists() {
        bail!("missing match index: {}", path.display());
    }
    Ok(())
}

fn run_quality(config: &Config) -> Result<()> {
    let report = quality::run(config)?;
    report.print();
    if report.n_fail() > 0 {
        bail!("{} data-quality check(s) failed", report.n_fail());
    }
    Ok(())
}

/// Fixed step order. Extraction happens upstream; `index` is the
/// reconciliation point that asserts its output is present.
pub const STEPS: &[Step] = &[
    Step { id: "index", label: "Index check", run: check_index },
    Step { id: "scores", label: "00_match_scores", run: scores::build },
    Step { id: "team-season", label: "01_team_season_stats", run: team_season::build },
    Step { id: "match-summary", label: "02_match_summary", run: match_summary::build },
    Step { id: "player-season", label: "03_player_season_stats", run: player_season::build },
    Step { id: "player-career", label: "04_player_career_stats", run: player_career::build },
    Step { id: "benchmarks", label: "05_competition_benchmarks", run: benchmarks::build },
    Step { id: "percentiles", label: "06_player_percentile_ranks", run: percentiles::build },
    Step { id: "rolling-form", label: "07_player_rolling_form", run: rolling_form::build },
    Step { id: "scouting", label: "08_player_scouting_profiles", run: scouting::build },
    Step { id: "progression", label: "09_player_progression", run: progression::build },
    Step { id: "consistency", label: "10_player_consistency", run: consistency::build },
    Step { id: "opponent-context", label: "11_player_opponent_context", run: opponent_context::build },
    Step { id: "substitutions", label: "12_substitution_impact", run: substitutions::build },
    Step { id: "momentum", label: "13_match_momentum", run: momentum::build },
    Step { id: "managers", label: "14_managers", run: managers::build },
    Step { id: "tactical", label: "15_team_tactical_profiles", run: tactical::build },
    Step { id: "age-curves", label: "16_player_age_curves", run: age_curves::build },
    Step { id: "quality", label: "dq_check", run: run_quality },
];

pub fn step_ids() -> Vec<&'static str> {
    STEPS.iter().map(|s| s.id).collect()
}

// ---------------------------------------------------------------------------
// Run log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRow {
    pub run_id: String,
    pub started_utc: String,
    pub ended_utc: Option<String>,
    pub steps_run: String,
    pub status: String,
    pub failed_step: String,
    pub env: String,
}

/// Append-only run log backed by sqlite. Completion goes through an upsert
/// keyed on run_id, so a retried start never duplicates a row.
pub struct RunLog {
    conn: Connection,
}

impl RunLog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open run log {}", path.display()))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS pipeline_runs (
                run_id TEXT PRIMARY KEY,
                started_utc TEXT NOT NULL,
                ended_utc TEXT NULL,
                steps_run TEXT NOT NULL,
                status TEXT NOT NULL,
                failed_step TEXT NOT NULL DEFAULT '',
                env TEXT NOT NULL
            );
            "#,
        )
        .context("create run log schema")?;
        Ok(Self { conn })
    }

    /// A run interrupted mid-flight leaves a `running` row behind; close it
    /// out instead of letting it dangle, then upsert the new row.
    pub fn start(&self, run_id: &str, started_utc: &str, steps_run: &str, env: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE pipeline_runs
                 SET status = 'fail', failed_step = 'interrupted', ended_utc = ?1
                 WHERE status = 'running'",
                params![started_utc],
            )
            .context("close stale running rows")?;
        self.conn
            .execute(
                "INSERT INTO pipeline_runs(run_id, started_utc, ended_utc, steps_run, status, failed_step, env)
                 VALUES (?1, ?2, NULL, ?3, 'running', '', ?4)
                 ON CONFLICT(run_id) DO UPDATE SET
                     started_utc = excluded.started_utc,
                     ended_utc = NULL,
                     steps_run = excluded.steps_run,
                     status = 'running',
                     failed_step = ''",
                params![run_id, started_utc, steps_run, env],
            )
            .context("insert run row")?;
        Ok(())
    }

    pub fn finish(
        &self,
        run_id: &str,
        ended_utc: &str,
        status: &str,
        failed_step: &str,
    ) -> Result<()> {
        self.conn
            .execute(
                "UPDATE pipeline_runs
                 SET ended_utc = ?1, status = ?2, failed_step = ?3
                 WHERE run_id = ?4",
                params![ended_utc, status, failed_step, run_id],
            )
            .context("finish run row")?;
        Ok(())
    }

    pub fn get(&self, run_id: &str) -> Result<Option<RunRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, started_utc, ended_utc, steps_run, status, failed_step, env
             FROM pipeline_runs WHERE run_id = ?1",
        )?;
        let mut rows = stmt.query(params![run_id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        Ok(Some(RunRow {
            run_id: row.get(0)?,
            started_utc: row.get(1)?,
            ended_utc: row.get(2)?,
            steps_run: row.get(3)?,
            status: row.get(4)?,
            failed_step: row.get(5)?,
            env: row.get(6)?,
        }))
    }

    pub fn count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM pipeline_runs", [], |row| row.get(0))
            .context("count run rows")
    }
}

// ---------------------------------------------------------------------------
// Latest-success marker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LatestSuccess {
    pub run_id: String,
    pub ended_utc: String,
    pub steps_run: String,
    pub env: String,
}

pub fn write_marker(path: &Path, marker: &LatestSuccess) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let json = serde_json::to_string_pretty(marker).context("serialize marker")?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).context("write marker")?;
    std::fs::rename(&tmp, path).context("swap marker")?;
    Ok(())
}

pub fn read_marker(path: &Path) -> Option<LatestSuccess> {
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub from_step: Option<String>,
    pub to_step: Option<String>,
    pub fail_fast: bool,
    pub rebuild_all: bool,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub status: String,
    pub failed_step: String,
    pub exit_code: i32,
}

fn step_index(id: &str) -> Result<usize> {
    STEPS
        .iter()
        .position(|s| s.id == id)
        .ok_or_else(|| anyhow!("unknown step id: {id} (see --list-steps)"))
}

pub fn run(config: &Config, opts: &RunOptions) -> Result<RunOutcome> {
    let mut from_idx = match &opts.from_step {
        Some(id) => step_index(id)?,
        None => 0,
    };
    let mut to_idx = match &opts.to_step {
        Some(id) => step_index(id)?,
        None => STEPS.len() - 1,
    };
    if opts.rebuild_all {
        from_idx = 0;
        to_idx = STEPS.len() - 1;
    }
    if from_idx > to_idx {
        bail!("invalid range: from-step must be before or equal to to-step");
    }

    let selected = &STEPS[from_idx..=to_idx];
    let steps_run: Vec<&str> = selected.iter().map(|s| s.id).collect();
    let steps_run_str = steps_run.join(",");

    let run_id = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let log = RunLog::open(&config.run_log_db())?;
    log.start(&run_id, &run_id, &steps_run_str, &config.env)?;

    let mut failed_step = String::new();
    for step in selected {
        println!("\n--- {}: {} ---", step.id, step.label);
        match (step.run)(config) {
            Ok(()) => {}
            Err(err) => {
                eprintln!("  FAILED: {err:#}");
                if failed_step.is_empty() {
                    failed_step = step.id.to_string();
                }
                if opts.fail_fast {
                    let ended = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
                    log.finish(&run_id, &ended, "fail", &failed_step)?;
                    return Ok(RunOutcome {
                        run_id,
                        status: "fail".to_string(),
                        failed_step,
                        exit_code: 1,
                    });
                }
            }
        }
    }

    let status = if failed_step.is_empty() { "ok" } else { "fail" };
    let ended = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    log.finish(&run_id, &ended, status, &failed_step)?;
    // Only a fully successful run may move the marker.
    if status == "ok" {
        write_marker(
            &config.latest_success_marker(),
            &LatestSuccess {
                run_id: run_id.clone(),
                ended_utc: ended,
                steps_run: steps_run_str,
                env: config.env.clone(),
            },
        )?;
    }
    println!("\nPipeline run finished.");
    if !failed_step.is_empty() {
        println!("First failed step: {failed_step} (re-run with --from-step {failed_step})");
    }
    Ok(RunOutcome {
        run_id,
        status: status.to_string(),
        failed_step,
        exit_code: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_ids_are_unique_and_ordered() {
        let ids = step_ids();
        let mut dedup = ids.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(dedup.len(), ids.len());
        assert_eq!(ids.first(), Some(&"index"));
        assert_eq!(ids.last(), Some(&"quality"));
        assert!(step_index("scores").unwrap() < step_index("percentiles").unwrap());
    }

    #[test]
    fn unknown_step_is_rejected() {
        assert!(step_index("no-such-step").is_err());
    }
}
