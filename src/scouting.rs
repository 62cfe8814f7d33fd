use std::collections::HashMap;

use anyhow::{Context, Result};

use crate::config::{Config, MIN_MINUTES_SEASON};
use crate::player_career;
use crate::player_season;
use crate::raw;
use crate::store;
use crate::table::Table;

const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 3600.0;

#[derive(Debug, Clone, Default)]
struct LatestSeason {
    season: String,
    competition: String,
    rating: Option<f64>,
    minutes: f64,
    appearances: i64,
}

#[derive(Debug, Clone, Default)]
struct FormSnapshot {
    rating: Option<f64>,
    goals: Option<f64>,
    xg: Option<f64>,
    xa: Option<f64>,
}

#[derive(Debug, Clone)]
struct Highlight {
    stat_name: String,
    stat_value: f64,
    pct: f64,
}

pub fn build(config: &Config) -> Result<()> {
    let players = raw::load_player_index(&config.players_index())
        .context("load player index")?;

    store::require_input(&config.appearances_path())?;
    let appearances = raw::load_appearances(&config.appearances_path())?;
    // Deterministic "as of" moment: the newest match in the dataset, not the
    // wall clock, so re-runs on unchanged inputs reproduce the artifact.
    let as_of = appearances.iter().filter_map(|a| a.match_date).max();
    let mut dob: HashMap<i64, i64> = HashMap::new();
    for app in &appearances {
        if let Some(d) = app.date_of_birth {
            dob.entry(app.player_id).or_insert(d);
        }
    }

    let season_rows = player_season::load_rows(config)?;
    let careers = player_career::load_rows(config)?;
    let career_map: HashMap<i64, &player_career::CareerRow> =
        careers.iter().map(|c| (c.player_id, c)).collect();

    let mut latest: HashMap<i64, LatestSeason> = HashMap::new();
    for row in season_rows.iter().filter(|r| r.sufficient_minutes) {
        let candidate = LatestSeason {
            season: row.season.clone(),
            competition: row.competition_slug.clone(),
            rating: row.avg_rating,
            minutes: row.total_minutes,
            appearances: row.appearances,
        };
        latest
            .entry(row.player_id)
            .and_modify(|cur| {
                // Most recent season wins; competition slug breaks ties.
                let newer = candidate.season > cur.season
                    || (candidate.season == cur.season
                        && candidate.competition < cur.competition);
                if newer {
                    *cur = candidate.clone();
                }
            })
            .or_insert(candidate);
    }

    let rolling = store::load_artifact(config, store::PLAYER_ROLLING_FORM)?;
    let mut form: HashMap<i64, FormSnapshot> = HashMap::new();
    {
        let ids = rolling.i64_col("player_id")?;
        let windows = rolling.i64_col("window")?;
        let ratings = rolling.f64_col("avg_rating")?;
        let goals = rolling.f64_col("goals")?;
        let xg = rolling.f64_col("xg_total")?;
        let xa = rolling.f64_col("xa_total")?;
        for row in 0..rolling.n_rows() {
            if windows[row] != Some(10) {
                continue;
            }
            let Some(pid) = ids[row] else { continue };
            form.insert(
                pid,
                FormSnapshot {
                    rating: ratings[row],
                    goals: goals[row],
                    xg: xg[row],
                    xa: xa[row],
                },
            );
        }
    }

    let percentiles = store::load_artifact(config, store::PLAYER_PERCENTILE_RANKS)?;
    let mut highlights: HashMap<i64, Vec<Highlight>> = HashMap::new();
    {
        let ids = percentiles.i64_col("player_id")?;
        let stat_names = percentiles.str_col("stat_name")?;
        let values = percentiles.f64_col("stat_value")?;
        let pcts = percentiles.f64_col("pct_in_competition")?;
        let mut all: Vec<(i64, Highlight)> = Vec::new();
        for row in 0..percentiles.n_rows() {
            let (Some(pid), Some(name), Some(value), Some(pct)) =
                (ids[row], &stat_names[row], values[row], pcts[row])
            else {
                continue;
            };
            all.push((
                pid,
                Highlight {
                    stat_name: name.clone(),
                    stat_value: value,
                    pct,
                },
            ));
        }
        // Stable sort: pct descending, input order breaks ties.
        all.sort_by(|a, b| b.1.pct.partial_cmp(&a.1.pct).unwrap());
        for (pid, h) in all {
            let entry = highlights.entry(pid).or_default();
            if entry.len() < 3 {
                entry.push(h);
            }
        }
    }

    let mut table = Table::new();
    table.add_i64(
        "player_id",
        players.iter().map(|p| Some(p.player_id)).collect(),
    );
    table.add_str(
        "player_name",
        players.iter().map(|p| Some(p.player_name.clone())).collect(),
    );
    table.add_str(
        "player_slug",
        players.iter().map(|p| p.player_slug.clone()).collect(),
    );
    table.add_str(
        "player_shortName",
        players.iter().map(|p| p.player_short_name.clone()).collect(),
    );
    table.add_i64("n_matches", players.iter().map(|p| p.n_matches).collect());
    table.add_f64(
        "age_today",
        players
            .iter()
            .map(|p| {
                let (Some(dob), Some(as_of)) = (dob.get(&p.player_id), as_of) else {
                    return None;
                };
                if as_of > *dob {
                    Some((as_of - dob) as f64 / SECONDS_PER_YEAR)
                } else {
                    None
                }
            })
            .collect(),
    );
    let career_at = |pid: i64| career_map.get(&pid);
    table.add_str(
        "player_position",
        players
            .iter()
            .map(|p| career_at(p.player_id).and_then(|c| c.player_position.clone()))
            .collect(),
    );
    table.add_f64(
        "total_minutes",
        players
            .iter()
            .map(|p| career_at(p.player_id).map(|c| c.total_minutes))
            .collect(),
    );
    table.add_i64(
        "goals",
        players
            .iter()
            .map(|p| career_at(p.player_id).map(|c| c.goals))
            .collect(),
    );
    table.add_i64(
        "assists",
        players
            .iter()
            .map(|p| career_at(p.player_id).map(|c| c.assists))
            .collect(),
    );
    table.add_str(
        "first_season",
        players
            .iter()
            .map(|p| career_at(p.player_id).and_then(|c| c.first_season.clone()))
            .collect(),
    );
    table.add_str(
        "last_season",
        players
            .iter()
            .map(|p| career_at(p.player_id).and_then(|c| c.last_season.clone()))
            .collect(),
    );
    table.add_i64(
        "n_seasons",
        players
            .iter()
            .map(|p| career_at(p.player_id).map(|c| c.n_seasons))
            .collect(),
    );
    table.add_i64(
        "n_competitions",
        players
            .iter()
            .map(|p| career_at(p.player_id).map(|c| c.n_competitions))
            .collect(),
    );
    table.add_str(
        "latest_season",
        players
            .iter()
            .map(|p| latest.get(&p.player_id).map(|l| l.season.clone()))
            .collect(),
    );
    table.add_str(
        "latest_competition",
        players
            .iter()
            .map(|p| latest.get(&p.player_id).map(|l| l.competition.clone()))
            .collect(),
    );
    table.add_f64(
        "latest_rating",
        players
            .iter()
            .map(|p| latest.get(&p.player_id).and_then(|l| l.rating))
            .collect(),
    );
    table.add_f64(
        "latest_minutes",
        players
            .iter()
            .map(|p| latest.get(&p.player_id).map(|l| l.minutes))
            .collect(),
    );
    table.add_i64(
        "latest_appearances",
        players
            .iter()
            .map(|p| latest.get(&p.player_id).map(|l| l.appearances))
            .collect(),
    );
    table.add_f64(
        "form_rating",
        players
            .iter()
            .map(|p| form.get(&p.player_id).and_then(|f| f.rating))
            .collect(),
    );
    table.add_f64(
        "form_goals",
        players
            .iter()
            .map(|p| form.get(&p.player_id).and_then(|f| f.goals))
            .collect(),
    );
    table.add_f64(
        "form_xg",
        players
            .iter()
            .map(|p| form.get(&p.player_id).and_then(|f| f.xg))
            .collect(),
    );
    table.add_f64(
        "form_xa",
        players
            .iter()
            .map(|p| form.get(&p.player_id).and_then(|f| f.xa))
            .collect(),
    );
    for i in 0..3 {
        let slot = i + 1;
        table.add_str(
            format!("top_pct_stat_{slot}_name"),
            players
                .iter()
                .map(|p| {
                    highlights
                        .get(&p.player_id)
                        .and_then(|h| h.get(i))
                        .map(|h| h.stat_name.clone())
                })
                .collect(),
        );
        table.add_f64(
            format!("top_pct_stat_{slot}_value"),
            players
                .iter()
                .map(|p| {
                    highlights
                        .get(&p.player_id)
                        .and_then(|h| h.get(i))
                        .map(|h| h.stat_value)
                })
                .collect(),
        );
        table.add_f64(
            format!("top_pct_stat_{slot}_pct"),
            players
                .iter()
                .map(|p| {
                    highlights
                        .get(&p.player_id)
                        .and_then(|h| h.get(i))
                        .map(|h| h.pct)
                })
                .collect(),
        );
    }
    table.add_bool(
        "active",
        players
            .iter()
            .map(|p| Some(career_at(p.player_id).and_then(|c| c.last_season.clone()).is_some()))
            .collect(),
    );
    table.add_bool(
        "sufficient_minutes_latest_season",
        players
            .iter()
            .map(|p| {
                Some(
                    latest
                        .get(&p.player_id)
                        .is_some_and(|l| l.minutes >= MIN_MINUTES_SEASON),
                )
            })
            .collect(),
    );

    store::save_artifact(config, store::PLAYER_SCOUTING_PROFILES, &table)
}
