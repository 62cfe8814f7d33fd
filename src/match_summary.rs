use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::DateTime;

use crate::config::Config;
use crate::raw;
use crate::store;
use crate::table::Table;

#[derive(Debug, Clone, Default)]
struct SummaryRow {
    home_xg: Option<f64>,
    away_xg: Option<f64>,
    home_possession: Option<f64>,
    away_possession: Option<f64>,
    home_shots: Option<f64>,
    away_shots: Option<f64>,
    home_shots_on_target: Option<f64>,
    away_shots_on_target: Option<f64>,
    home_big_chances: Option<f64>,
    away_big_chances: Option<f64>,
    home_xg_first_half: Option<f64>,
    away_xg_first_half: Option<f64>,
    home_xg_second_half: Option<f64>,
    away_xg_second_half: Option<f64>,
    home_manager_name: Option<String>,
    home_manager_id: Option<i64>,
    away_manager_name: Option<String>,
    away_manager_id: Option<i64>,
}

pub fn build(config: &Config) -> Result<()> {
    let matches = raw::load_match_index(&config.matches_index())
        .context("load match index")?;

    let scores_path = store::artifact_path(config, store::MATCH_SCORES);
    store::require_input(&scores_path)?;
    let scores = Table::read_parquet(&scores_path)?;
    let ids = scores.str_col("match_id")?;
    let home_scores = scores.i64_col("home_score")?;
    let away_scores = scores.i64_col("away_score")?;
    let totals = scores.i64_col("total_goals")?;
    let results = scores.str_col("result")?;
    let score_map: HashMap<&str, usize> = ids
        .iter()
        .enumerate()
        .filter_map(|(i, id)| id.as_deref().map(|id| (id, i)))
        .collect();

    let mut unreadable_stats = 0usize;
    let mut unreadable_managers = 0usize;

    let mut rows: Vec<SummaryRow> = Vec::with_capacity(matches.len());
    for m in &matches {
        let mut row = SummaryRow::default();
        let dir = config.raw_match_dir(&m.season, &m.competition_slug, &m.match_id);
        if dir.exists() {
            let stats_path = dir.join("team_statistics.csv");
            if stats_path.exists() {
                match raw::read_team_statistics(&stats_path) {
                    Ok(lines) => {
                        let all = raw::period_stats(&lines, "ALL");
                        let get = |name: &str| all.get(name).copied().unwrap_or((None, None));
                        (row.home_xg, row.away_xg) = get("Expected goals");
                        (row.home_possession, row.away_possession) = get("Ball possession");
                        (row.home_shots, row.away_shots) = get("Total shots");
                        (row.home_shots_on_target, row.away_shots_on_target) =
                            get("Shots on target");
                        (row.home_big_chances, row.away_big_chances) = get("Big chances");
                        let first = raw::period_stats(&lines, "1ST");
                        if let Some(cell) = first.get("Expected goals") {
                            (row.home_xg_first_half, row.away_xg_first_half) = *cell;
                        }
                        let second = raw::period_stats(&lines, "2ND");
                        if let Some(cell) = second.get("Expected goals") {
                            (row.home_xg_second_half, row.away_xg_second_half) = *cell;
                        }
                    }
                    Err(_) => unreadable_stats += 1,
                }
            }
            let managers_path = dir.join("managers.json");
            if managers_path.exists() {
                match raw::read_managers(&managers_path) {
                    Ok(managers) => {
                        if let Some(mgr) = managers.home_manager {
                            row.home_manager_name = mgr.name;
                            row.home_manager_id = mgr.id;
                        }
                        if let Some(mgr) = managers.away_manager {
                            row.away_manager_name = mgr.name;
                            row.away_manager_id = mgr.id;
                        }
                    }
                    Err(_) => unreadable_managers += 1,
                }
            }
        }
        rows.push(row);
    }

    let score_at = |match_id: &str| score_map.get(match_id).copied();

    let mut table = Table::new();
    table.add_str(
        "match_id",
        matches.iter().map(|m| Some(m.match_id.clone())).collect(),
    );
    table.add_str(
        "season",
        matches.iter().map(|m| Some(m.season.clone())).collect(),
    );
    table.add_str(
        "competition_slug",
        matches
            .iter()
            .map(|m| Some(m.competition_slug.clone()))
            .collect(),
    );
    table.add_str(
        "match_date_utc",
        matches
            .iter()
            .map(|m| {
                m.match_date
                    .and_then(|secs| DateTime::from_timestamp(secs, 0))
                    .map(|dt| dt.to_rfc3339())
            })
            .collect(),
    );
    table.add_i64("round", matches.iter().map(|m| m.round).collect());
    table.add_str(
        "home_team_name",
        matches
            .iter()
            .map(|m| Some(m.home_team_name.clone()))
            .collect(),
    );
    table.add_str(
        "away_team_name",
        matches
            .iter()
            .map(|m| Some(m.away_team_name.clone()))
            .collect(),
    );
    table.add_i64(
        "home_score",
        matches
            .iter()
            .map(|m| score_at(&m.match_id).and_then(|i| home_scores[i]))
            .collect(),
    );
    table.add_i64(
        "away_score",
        matches
            .iter()
            .map(|m| score_at(&m.match_id).and_then(|i| away_scores[i]))
            .collect(),
    );
    table.add_str(
        "result",
        matches
            .iter()
            .map(|m| score_at(&m.match_id).and_then(|i| results[i].clone()))
            .collect(),
    );
    table.add_i64(
        "total_goals",
        matches
            .iter()
            .map(|m| score_at(&m.match_id).and_then(|i| totals[i]))
            .collect(),
    );

    table.add_f64("home_xg", rows.iter().map(|r| r.home_xg).collect());
    table.add_f64("away_xg", rows.iter().map(|r| r.away_xg).collect());
    table.add_f64(
        "home_possession",
        rows.iter().map(|r| r.home_possession).collect(),
    );
    table.add_f64(
        "away_possession",
        rows.iter().map(|r| r.away_possession).collect(),
    );
    table.add_f64("home_shots", rows.iter().map(|r| r.home_shots).collect());
    table.add_f64("away_shots", rows.iter().map(|r| r.away_shots).collect());
    table.add_f64(
        "home_shots_on_target",
        rows.iter().map(|r| r.home_shots_on_target).collect(),
    );
    table.add_f64(
        "away_shots_on_target",
        rows.iter().map(|r| r.away_shots_on_target).collect(),
    );
    table.add_f64(
        "home_big_chances",
        rows.iter().map(|r| r.home_big_chances).collect(),
    );
    table.add_f64(
        "away_big_chances",
        rows.iter().map(|r| r.away_big_chances).collect(),
    );
    table.add_f64(
        "home_xg_first_half",
        rows.iter().map(|r| r.home_xg_first_half).collect(),
    );
    table.add_f64(
        "away_xg_first_half",
        rows.iter().map(|r| r.away_xg_first_half).collect(),
    );
    table.add_f64(
        "home_xg_second_half",
        rows.iter().map(|r| r.home_xg_second_half).collect(),
    );
    table.add_f64(
        "away_xg_second_half",
        rows.iter().map(|r| r.away_xg_second_half).collect(),
    );
    table.add_str(
        "home_manager_name",
        rows.iter().map(|r| r.home_manager_name.clone()).collect(),
    );
    table.add_i64(
        "home_manager_id",
        rows.iter().map(|r| r.home_manager_id).collect(),
    );
    table.add_str(
        "away_manager_name",
        rows.iter().map(|r| r.away_manager_name.clone()).collect(),
    );
    table.add_i64(
        "away_manager_id",
        rows.iter().map(|r| r.away_manager_id).collect(),
    );
    table.add_f64(
        "xg_swing",
        rows.iter()
            .map(|r| match (r.home_xg, r.away_xg) {
                (Some(h), Some(a)) => Some(h - a),
                _ => None,
            })
            .collect(),
    );
    table.add_f64(
        "home_xg_overperformance",
        matches
            .iter()
            .zip(&rows)
            .map(|(m, r)| {
                let score = score_at(&m.match_id).and_then(|i| home_scores[i]);
                match (score, r.home_xg) {
                    (Some(s), Some(xg)) => Some(s as f64 - xg),
                    _ => None,
                }
            })
            .collect(),
    );
    table.add_f64(
        "away_xg_overperformance",
        matches
            .iter()
            .zip(&rows)
            .map(|(m, r)| {
                let score = score_at(&m.match_id).and_then(|i| away_scores[i]);
                match (score, r.away_xg) {
                    (Some(s), Some(xg)) => Some(s as f64 - xg),
                    _ => None,
                }
            })
            .collect(),
    );

    store::save_artifact(config, store::MATCH_SUMMARY, &table)?;
    if unreadable_stats > 0 || unreadable_managers > 0 {
        println!(
            "  Warnings: unreadable_stats={unreadable_stats}, unreadable_managers={unreadable_managers}"
        );
    }
    Ok(())
}
