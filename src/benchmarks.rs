use std::collections::BTreeMap;

use anyhow::Result;

use crate::config::Config;
use crate::player_season::{self, PlayerSeasonRow};
use crate::schema::{ALL_COMPETITIONS, PER90_STATS, RATIO_STATS};
use crate::stats;
use crate::store;
use crate::table::Table;

/// Stats benchmarked per peer group: every per-90 plus the ratio stats.
pub fn benchmark_stat_names() -> Vec<String> {
    let mut names: Vec<String> = PER90_STATS.clone();
    names.extend(RATIO_STATS.iter().map(|s| s.name.to_string()));
    names
}

#[derive(Debug)]
struct BenchmarkRow {
    position: String,
    competition: String,
    season: String,
    stat_name: String,
    n_players: i64,
    mean: f64,
    median: f64,
    p25: f64,
    p75: f64,
    p90: f64,
    std: Option<f64>,
}

fn group_rows(
    position: &str,
    competition: &str,
    season: &str,
    members: &[&PlayerSeasonRow],
    stat_names: &[String],
) -> Vec<BenchmarkRow> {
    let mut out = Vec::new();
    for stat in stat_names {
        let mut values: Vec<f64> = members.iter().filter_map(|r| r.stat(stat)).collect();
        // Percentiles below 2 observations are noise, not statistics.
        if values.len() < 2 {
            continue;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        out.push(BenchmarkRow {
            position: position.to_string(),
            competition: competition.to_string(),
            season: season.to_string(),
            stat_name: stat.clone(),
            n_players: values.len() as i64,
            mean: stats::mean(&values).unwrap_or_default(),
            median: stats::quantile_sorted(&values, 0.50).unwrap_or_default(),
            p25: stats::quantile_sorted(&values, 0.25).unwrap_or_default(),
            p75: stats::quantile_sorted(&values, 0.75).unwrap_or_default(),
            p90: stats::quantile_sorted(&values, 0.90).unwrap_or_default(),
            std: stats::sample_std(&values),
        });
    }
    out
}

pub fn build(config: &Config) -> Result<()> {
    let season_rows = player_season::load_rows(config)?;
    let qualified: Vec<&PlayerSeasonRow> = season_rows
        .iter()
        .filter(|r| r.sufficient_minutes && r.player_position.is_some())
        .collect();
    let stat_names = benchmark_stat_names();

    let mut by_competition: BTreeMap<(String, String, String), Vec<&PlayerSeasonRow>> =
        BTreeMap::new();
    let mut by_season: BTreeMap<(String, String), Vec<&PlayerSeasonRow>> = BTreeMap::new();
    for &row in &qualified {
        let position = row.player_position.clone().unwrap_or_default();
        by_competition
            .entry((position.clone(), row.competition_slug.clone(), row.season.clone()))
            .or_default()
            .push(row);
        by_season
            .entry((position, row.season.clone()))
            .or_default()
            .push(row);
    }

    let mut rows: Vec<BenchmarkRow> = Vec::new();
    for ((position, competition, season), members) in &by_competition {
        rows.extend(group_rows(position, competition, season, members, &stat_names));
    }
    // Synthetic pool over every competition, per position and season.
    for ((position, season), members) in &by_season {
        rows.extend(group_rows(
            position,
            ALL_COMPETITIONS,
            season,
            members,
            &stat_names,
        ));
    }

    let mut table = Table::new();
    table.add_str(
        "player_position",
        rows.iter().map(|r| Some(r.position.clone())).collect(),
    );
    table.add_str(
        "competition_slug",
        rows.iter().map(|r| Some(r.competition.clone())).collect(),
    );
    table.add_str("season", rows.iter().map(|r| Some(r.season.clone())).collect());
    table.add_str(
        "stat_name",
        rows.iter().map(|r| Some(r.stat_name.clone())).collect(),
    );
    table.add_i64("n_players", rows.iter().map(|r| Some(r.n_players)).collect());
    table.add_f64("mean", rows.iter().map(|r| Some(r.mean)).collect());
    table.add_f64("median", rows.iter().map(|r| Some(r.median)).collect());
    table.add_f64("p25", rows.iter().map(|r| Some(r.p25)).collect());
    table.add_f64("p75", rows.iter().map(|r| Some(r.p75)).collect());
    table.add_f64("p90", rows.iter().map(|r| Some(r.p90)).collect());
    table.add_f64("std", rows.iter().map(|r| r.std).collect());

    store::save_artifact(config, store::COMPETITION_BENCHMARKS, &table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;

    fn row(stat: &str, value: f64) -> PlayerSeasonRow {
        let mut stats = Map::new();
        stats.insert(stat.to_string(), value);
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
            avg_rating: None,
            goals: 0,
            assists: 0,
            yellow_cards: 0,
            red_cards: 0,
            age_at_season_start: None,
            stats,
        }
    }

    #[test]
    fn quantiles_stay_monotone_per_row() {
        let rows: Vec<PlayerSeasonRow> = [0.3, 1.2, 0.7, 2.4, 0.1]
            .iter()
            .map(|v| row("goals_per90", *v))
            .collect();
        let members: Vec<&PlayerSeasonRow> = rows.iter().collect();
        let out = group_rows("F", "league-x", "24/25", &members, &["goals_per90".to_string()]);
        assert_eq!(out.len(), 1);
        let b = &out[0];
        assert!(b.p25 <= b.median && b.median <= b.p75 && b.p75 <= b.p90);
        assert_eq!(b.n_players, 5);
    }

    #[test]
    fn single_observation_group_is_skipped() {
        let rows = vec![row("goals_per90", 1.0)];
        let members: Vec<&PlayerSeasonRow> = rows.iter().collect();
        let out = group_rows("F", "league-x", "24/25", &members, &["goals_per90".to_string()]);
        assert!(out.is_empty());
    }
}
