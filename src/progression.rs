use std::collections::BTreeMap;

use anyhow::Result;

use crate::config::Config;
use crate::player_season::{self, PlayerSeasonRow};
use crate::store;
use crate::table::Table;

/// Stats compared season-over-season.
pub const DELTA_STATS: &[&str] = &[
    "avg_rating",
    "expectedGoals_per90",
    "expectedAssists_per90",
    "goals_per90",
    "goalAssist_per90",
    "keyPass_per90",
    "totalTackle_per90",
    "duel_win_rate",
    "pass_accuracy",
];

const RATING_DELTA_THRESHOLD: f64 = 0.1;

pub fn direction(rating_delta: Option<f64>) -> Option<&'static str> {
    let delta = rating_delta?;
    Some(if delta > RATING_DELTA_THRESHOLD {
        "improving"
    } else if delta < -RATING_DELTA_THRESHOLD {
        "declining"
    } else {
        "stable"
    })
}

#[derive(Debug)]
struct ProgressionRow<'a> {
    from: &'a PlayerSeasonRow,
    to: &'a PlayerSeasonRow,
    deltas: BTreeMap<&'static str, f64>,
}

pub fn build(config: &Config) -> Result<()> {
    let season_rows = player_season::load_rows(config)?;
    let qualified: Vec<&PlayerSeasonRow> = season_rows
        .iter()
        .filter(|r| r.sufficient_minutes)
        .collect();

    let mut per_player: BTreeMap<i64, Vec<&PlayerSeasonRow>> = BTreeMap::new();
    for row in qualified {
        per_player.entry(row.player_id).or_default().push(row);
    }

    let mut rows: Vec<ProgressionRow> = Vec::new();
    for history in per_player.values_mut() {
        if history.len() < 2 {
            continue;
        }
        history.sort_by(|a, b| {
            (&a.season, &a.competition_slug).cmp(&(&b.season, &b.competition_slug))
        });
        for pair in history.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let mut deltas = BTreeMap::new();
            for stat in DELTA_STATS {
                if let (Some(v_from), Some(v_to)) = (from.stat(stat), to.stat(stat)) {
                    deltas.insert(*stat, v_to - v_from);
                }
            }
            rows.push(ProgressionRow { from, to, deltas });
        }
    }

    let mut table = Table::new();
    table.add_i64(
        "player_id",
        rows.iter().map(|r| Some(r.to.player_id)).collect(),
    );
    table.add_str(
        "player_name",
        rows.iter().map(|r| Some(r.to.player_name.clone())).collect(),
    );
    table.add_str(
        "player_position",
        rows.iter().map(|r| r.to.player_position.clone()).collect(),
    );
    table.add_str(
        "season_from",
        rows.iter().map(|r| Some(r.from.season.clone())).collect(),
    );
    table.add_str(
        "season_to",
        rows.iter().map(|r| Some(r.to.season.clone())).collect(),
    );
    table.add_str(
        "competition_from",
        rows.iter()
            .map(|r| Some(r.from.competition_slug.clone()))
            .collect(),
    );
    table.add_str(
        "competition_to",
        rows.iter()
            .map(|r| Some(r.to.competition_slug.clone()))
            .collect(),
    );
    table.add_bool(
        "same_competition",
        rows.iter()
            .map(|r| Some(r.from.competition_slug == r.to.competition_slug))
            .collect(),
    );
    table.add_f64(
        "age_at_season_to",
        rows.iter().map(|r| r.to.age_at_season_start).collect(),
    );
    for stat in DELTA_STATS {
        table.add_f64(
            format!("{stat}_delta"),
            rows.iter().map(|r| r.deltas.get(stat).copied()).collect(),
        );
    }
    table.add_f64(
        "rating_delta",
        rows.iter()
            .map(|r| r.deltas.get("avg_rating").copied())
            .collect(),
    );
    table.add_str(
        "progression_direction",
        rows.iter()
            .map(|r| direction(r.deltas.get("avg_rating").copied()).map(|s| s.to_string()))
            .collect(),
    );
    table.add_f64(
        "minutes_delta",
        rows.iter()
            .map(|r| Some(r.to.total_minutes - r.from.total_minutes))
            .collect(),
    );

    store::save_artifact(config, store::PLAYER_PROGRESSION, &table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_thresholds() {
        assert_eq!(direction(Some(0.2)), Some("improving"));
        assert_eq!(direction(Some(0.1)), Some("stable"));
        assert_eq!(direction(Some(0.05)), Some("stable"));
        assert_eq!(direction(Some(-0.05)), Some("stable"));
        assert_eq!(direction(Some(-0.11)), Some("declining"));
        assert_eq!(direction(None), None);
    }
}
