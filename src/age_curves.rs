use std::collections::BTreeMap;

use anyhow::Result;

use crate::config::Config;
use crate::player_season::{self, PlayerSeasonRow};
use crate::schema::{PER90_STATS, RATIO_STATS};
use crate::stats;
use crate::store;
use crate::table::Table;

const AGE_MIN: i64 = 16;
const AGE_MAX: i64 = 45;
const RELIABLE_N: i64 = 20;

fn curve_stat_names() -> Vec<String> {
    let mut names: Vec<String> = PER90_STATS.clone();
    names.extend(RATIO_STATS.iter().map(|s| s.name.to_string()));
    names
}

fn median_of(rows: &[&PlayerSeasonRow], stat: &str) -> Option<f64> {
    let mut values: Vec<f64> = rows.iter().filter_map(|r| r.stat(stat)).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    stats::quantile_sorted(&values, 0.5)
}

pub fn build(config: &Config) -> Result<()> {
    let season_rows = player_season::load_rows(config)?;
    let stat_names = curve_stat_names();

    let mut groups: BTreeMap<(String, i64), Vec<&PlayerSeasonRow>> = BTreeMap::new();
    for row in season_rows.iter().filter(|r| r.sufficient_minutes) {
        let Some(position) = row.player_position.clone() else {
            continue;
        };
        let age_bin = row.age_at_season_start.unwrap_or(0.0).floor() as i64;
        if !(AGE_MIN..=AGE_MAX).contains(&age_bin) {
            continue;
        }
        groups.entry((position, age_bin)).or_default().push(row);
    }

    let keys: Vec<&(String, i64)> = groups.keys().collect();
    let members: Vec<&Vec<&PlayerSeasonRow>> = groups.values().collect();

    let mut table = Table::new();
    table.add_str(
        "player_position",
        keys.iter().map(|(p, _)| Some(p.clone())).collect(),
    );
    table.add_i64("age_bin", keys.iter().map(|(_, bin)| Some(*bin)).collect());
    table.add_i64(
        "n_player_seasons",
        members.iter().map(|m| Some(m.len() as i64)).collect(),
    );
    table.add_bool(
        "reliable",
        members
            .iter()
            .map(|m| Some(m.len() as i64 >= RELIABLE_N))
            .collect(),
    );
    table.add_f64(
        "median_avg_rating",
        members.iter().map(|m| median_of(m, "avg_rating")).collect(),
    );
    for stat in &stat_names {
        table.add_f64(
            format!("median_{stat}"),
            members.iter().map(|m| median_of(m, stat)).collect(),
        );
    }
    store::save_artifact(config, store::PLAYER_AGE_CURVES, &table)?;

    // Peak age per position among reliable bins.
    let mut peaks: BTreeMap<String, (Option<(f64, i64)>, Option<(f64, i64)>)> = BTreeMap::new();
    for ((position, age_bin), rows) in &groups {
        if (rows.len() as i64) < RELIABLE_N {
            continue;
        }
        let entry = peaks.entry(position.clone()).or_default();
        if let Some(rating) = median_of(rows, "avg_rating") {
            let better = entry.0.is_none_or(|(best, _)| rating > best);
            if better {
                entry.0 = Some((rating, *age_bin));
            }
        }
        if let Some(xg) = median_of(rows, "expectedGoals_per90") {
            let better = entry.1.is_none_or(|(best, _)| xg > best);
            if better {
                entry.1 = Some((xg, *age_bin));
            }
        }
    }

    let mut peak_table = Table::new();
    peak_table.add_str(
        "player_position",
        peaks.keys().map(|p| Some(p.clone())).collect(),
    );
    peak_table.add_i64(
        "peak_rating_age",
        peaks
            .values()
            .map(|(rating, _)| rating.map(|(_, age)| age))
            .collect(),
    );
    peak_table.add_i64(
        "peak_xg_age",
        peaks.values().map(|(_, xg)| xg.map(|(_, age)| age)).collect(),
    );
    store::save_artifact(config, store::PEAK_AGE_BY_POSITION, &peak_table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;

    fn row(age: f64, rating: f64) -> PlayerSeasonRow {
        PlayerSeasonRow {
            player_id: 1,
            season: "24/25".into(),
            competition_slug: "league-x".into(),
            player_name: "P".into(),
            player_short_name: None,
            player_position: Some("F".into()),
            appearances: 10,
            starts: 10,
            total_minutes: 900.0,
            sufficient_minutes: true,
            avg_rating: Some(rating),
            goals: 0,
            assists: 0,
            yellow_cards: 0,
            red_cards: 0,
            age_at_season_start: Some(age),
            stats: Map::new(),
        }
    }

    #[test]
    fn median_is_robust_to_order() {
        let rows = vec![row(24.0, 7.4), row(24.0, 6.2), row(24.0, 6.8)];
        let refs: Vec<&PlayerSeasonRow> = rows.iter().collect();
        assert_eq!(median_of(&refs, "avg_rating"), Some(6.8));
        assert_eq!(median_of(&refs, "goals_per90"), None);
    }
}
