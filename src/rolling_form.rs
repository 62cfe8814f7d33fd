use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::DateTime;

use crate::config::Config;
use crate::raw::{self, Appearance};
use crate::schema::StatKey;
use crate::stats;
use crate::store;
use crate::table::Table;

pub const WINDOWS: &[usize] = &[5, 10, 20];

#[derive(Debug)]
struct FormRow {
    player_id: i64,
    player_name: String,
    player_position: Option<String>,
    as_of_match_id: String,
    as_of_date: Option<i64>,
    window: i64,
    n_available: i64,
    avg_rating: Option<f64>,
    goals: f64,
    assists: f64,
    xg_total: f64,
    xa_total: f64,
    total_minutes: f64,
    avg_key_passes: Option<f64>,
    avg_shots: Option<f64>,
    avg_tackles: Option<f64>,
    avg_interceptions: Option<f64>,
    avg_dribbles_won: Option<f64>,
    avg_touches: Option<f64>,
}

fn window_row(player_id: i64, history: &[&Appearance], window: usize) -> FormRow {
    let start = history.len().saturating_sub(window);
    let tail = &history[start..];
    let latest = history.last().expect("non-empty history");

    let sum = |key: StatKey| -> f64 { tail.iter().filter_map(|a| a.stat(key)).sum() };
    let avg = |key: StatKey| -> Option<f64> {
        let values: Vec<f64> = tail.iter().filter_map(|a| a.stat(key)).collect();
        stats::mean(&values)
    };

    FormRow {
        player_id,
        player_name: latest.player_name.clone(),
        player_position: latest.player_position.clone(),
        as_of_match_id: latest.match_id.clone(),
        as_of_date: latest.match_date,
        window: window as i64,
        n_available: tail.len() as i64,
        avg_rating: avg(StatKey::Rating),
        goals: sum(StatKey::Goals),
        assists: sum(StatKey::Assists),
        xg_total: sum(StatKey::ExpectedGoals),
        xa_total: sum(StatKey::ExpectedAssists),
        total_minutes: sum(StatKey::Minutes),
        avg_key_passes: avg(StatKey::KeyPasses),
        avg_shots: avg(StatKey::TotalShots),
        avg_tackles: avg(StatKey::TotalTackles),
        avg_interceptions: avg(StatKey::Interceptions),
        avg_dribbles_won: avg(StatKey::DribblesWon),
        avg_touches: avg(StatKey::Touches),
    }
}

pub fn build(config: &Config) -> Result<()> {
    store::require_input(&config.appearances_path())?;
    let mut appearances = raw::load_appearances(&config.appearances_path())
        .context("load player appearances")?;
    // Chronological per player; match id breaks date ties deterministically.
    appearances.sort_by(|a, b| {
        (a.player_id, a.match_date, &a.match_id).cmp(&(b.player_id, b.match_date, &b.match_id))
    });

    let mut per_player: BTreeMap<i64, Vec<&Appearance>> = BTreeMap::new();
    for app in &appearances {
        per_player.entry(app.player_id).or_default().push(app);
    }

    let mut rows: Vec<FormRow> = Vec::new();
    for (player_id, history) in &per_player {
        if history.is_empty() {
            continue;
        }
        for window in WINDOWS {
            rows.push(window_row(*player_id, history, *window));
        }
    }

    let mut table = Table::new();
    table.add_i64("player_id", rows.iter().map(|r| Some(r.player_id)).collect());
    table.add_str(
        "player_name",
        rows.iter().map(|r| Some(r.player_name.clone())).collect(),
    );
    table.add_str(
        "player_position",
        rows.iter().map(|r| r.player_position.clone()).collect(),
    );
    table.add_str(
        "as_of_match_id",
        rows.iter().map(|r| Some(r.as_of_match_id.clone())).collect(),
    );
    table.add_str(
        "as_of_date",
        rows.iter()
            .map(|r| {
                r.as_of_date
                    .and_then(|secs| DateTime::from_timestamp(secs, 0))
                    .map(|dt| dt.to_rfc3339())
            })
            .collect(),
    );
    table.add_i64("window", rows.iter().map(|r| Some(r.window)).collect());
    table.add_i64(
        "n_available",
        rows.iter().map(|r| Some(r.n_available)).collect(),
    );
    table.add_bool("is_current", rows.iter().map(|_| Some(true)).collect());
    table.add_f64("avg_rating", rows.iter().map(|r| r.avg_rating).collect());
    table.add_f64("goals", rows.iter().map(|r| Some(r.goals)).collect());
    table.add_f64("assists", rows.iter().map(|r| Some(r.assists)).collect());
    table.add_f64("xg_total", rows.iter().map(|r| Some(r.xg_total)).collect());
    table.add_f64("xa_total", rows.iter().map(|r| Some(r.xa_total)).collect());
    table.add_f64(
        "total_minutes",
        rows.iter().map(|r| Some(r.total_minutes)).collect(),
    );
    table.add_f64(
        "avg_key_passes",
        rows.iter().map(|r| r.avg_key_passes).collect(),
    );
    table.add_f64("avg_shots", rows.iter().map(|r| r.avg_shots).collect());
    table.add_f64("avg_tackles", rows.iter().map(|r| r.avg_tackles).collect());
    table.add_f64(
        "avg_interceptions",
        rows.iter().map(|r| r.avg_interceptions).collect(),
    );
    table.add_f64(
        "avg_dribbles_won",
        rows.iter().map(|r| r.avg_dribbles_won).collect(),
    );
    table.add_f64("avg_touches", rows.iter().map(|r| r.avg_touches).collect());

    store::save_artifact(config, store::PLAYER_ROLLING_FORM, &table)
}
