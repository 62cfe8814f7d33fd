use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

use crate::config::Config;
use crate::table::Table;

/// Processed artifact names, in build order. Stage numbering mirrors the
/// on-disk layout consumed by the dashboards.
pub const MATCH_SCORES: &str = "00_match_scores_full.parquet";
pub const TEAM_SEASON_STATS: &str = "01_team_season_stats.parquet";
pub const MATCH_SUMMARY: &str = "02_match_summary.parquet";
pub const PLAYER_SEASON_STATS: &str = "03_player_season_stats.parquet";
pub const PLAYER_CAREER_STATS: &str = "04_player_career_stats.parquet";
pub const COMPETITION_BENCHMARKS: &str = "05_competition_benchmarks.parquet";
pub const PLAYER_PERCENTILE_RANKS: &str = "06_player_percentile_ranks.parquet";
pub const PLAYER_ROLLING_FORM: &str = "07_player_rolling_form.parquet";
pub const PLAYER_SCOUTING_PROFILES: &str = "08_player_scouting_profiles.parquet";
pub const PLAYER_PROGRESSION: &str = "09_player_progression.parquet";
pub const PLAYER_CONSISTENCY: &str = "10_player_consistency.parquet";
pub const PLAYER_OPPONENT_CONTEXT: &str = "11_player_opponent_context.parquet";
pub const PLAYER_OPPONENT_CONTEXT_SUMMARY: &str = "11_player_opponent_context_summary.parquet";
pub const SUBSTITUTION_IMPACT: &str = "12_substitution_impact.parquet";
pub const MATCH_MOMENTUM: &str = "13_match_momentum.parquet";
pub const MATCH_MOMENTUM_SUMMARY: &str = "match_momentum_summary.parquet";
pub const MANAGERS: &str = "14_managers.parquet";
pub const MANAGER_CAREER_STATS: &str = "manager_career_stats.parquet";
pub const TEAM_TACTICAL_PROFILES: &str = "15_team_tactical_profiles.parquet";
pub const PLAYER_AGE_CURVES: &str = "16_player_age_curves.parquet";
pub const PEAK_AGE_BY_POSITION: &str = "16_peak_age_by_position.parquet";

/// Tables mirrored to CSV for human auditing.
pub const CSV_MIRRORED: &[&str] = &[MATCH_SCORES, PLAYER_SCOUTING_PROFILES];

pub fn artifact_path(config: &Config, name: &str) -> PathBuf {
    config.processed(name)
}

/// A stage's declared upstream input must already exist; a hole in the chain
/// aborts the stage naming the missing path.
pub fn require_input(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("missing input artifact: {}", path.display());
    }
    Ok(())
}

/// Load a processed artifact for a downstream stage (missing input is fatal).
pub fn load_artifact(config: &Config, name: &str) -> Result<Table> {
    let path = artifact_path(config, name);
    require_input(&path)?;
    Table::read_parquet(&path)
}

/// Save an artifact, plus a CSV mirror for the audited subset.
pub fn save_artifact(config: &Config, name: &str, table: &Table) -> Result<()> {
    let path = artifact_path(config, name);
    table.write_parquet(&path)?;
    if CSV_MIRRORED.contains(&name) {
        let csv_path = path.with_extension("csv");
        table.write_csv(&csv_path)?;
    }
    println!("Wrote {} ({} rows)", path.display(), table.n_rows());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_input_names_the_path() {
        let err = require_input(Path::new("/nonexistent/03_player_season_stats.parquet"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("missing input artifact"));
        assert!(err.contains("03_player_season_stats.parquet"));
    }
}
