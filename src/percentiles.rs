use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use rayon::prelude::*;

use crate::config::Config;
use crate::player_season::{self, PlayerSeasonRow};
use crate::schema::{LOWER_IS_BETTER, PER90_STATS, PERCENTILE_RATIO_STATS};
use crate::stats;
use crate::store;
use crate::table::Table;

/// Stats ranked per peer group: per-90s, the headline ratios and card totals.
pub fn percentile_stat_names() -> Vec<String> {
    let mut names: Vec<String> = PER90_STATS.clone();
    names.extend(PERCENTILE_RATIO_STATS.iter().map(|s| s.to_string()));
    names.push("yellow_cards".to_string());
    names.push("red_cards".to_string());
    names
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Percentile of `value` within its peer values, polarity-corrected so 100
/// always reads as elite.
pub fn ranked_percentile(stat: &str, peers: &[f64], value: f64) -> f64 {
    let raw = stats::percentile_strictly_below(peers, value);
    if LOWER_IS_BETTER.contains(stat) {
        round1(100.0 - raw)
    } else {
        round1(raw)
    }
}

#[derive(Debug)]
struct PercentileRow {
    player_id: i64,
    player_name: String,
    position: String,
    season: String,
    competition: String,
    stat_name: String,
    stat_value: f64,
    pct_in_competition: f64,
    n_players_in_competition: i64,
}

pub fn build(config: &Config) -> Result<()> {
    let season_rows = player_season::load_rows(config)?;
    let qualified: Vec<&PlayerSeasonRow> = season_rows
        .iter()
        .filter(|r| r.sufficient_minutes && r.player_position.is_some())
        .collect();
    let stat_names = percentile_stat_names();

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

    // Peer groups are independent; rayon fan-out, then ordered flatten — the
    // output is identical to the sequential pass.
    let competition_groups: Vec<(&(String, String, String), &Vec<&PlayerSeasonRow>)> =
        by_competition.iter().collect();
    let rows: Vec<PercentileRow> = competition_groups
        .par_iter()
        .map(|((position, competition, season), members)| {
            let mut out = Vec::new();
            let n_group = members.len() as i64;
            for stat in &stat_names {
                let peers: Vec<f64> = members.iter().filter_map(|r| r.stat(stat)).collect();
                if peers.len() < 2 {
                    continue;
                }
                for member in members.iter() {
                    let Some(value) = member.stat(stat) else {
                        continue;
                    };
                    out.push(PercentileRow {
                        player_id: member.player_id,
                        player_name: member.player_name.clone(),
                        position: position.clone(),
                        season: season.clone(),
                        competition: competition.clone(),
                        stat_name: stat.clone(),
                        stat_value: value,
                        pct_in_competition: ranked_percentile(stat, &peers, value),
                        n_players_in_competition: n_group,
                    });
                }
            }
            out
        })
        .flatten()
        .collect();

    // Global scope: one rank per (player, position, season, stat), using the
    // player's first row when they span several competitions in a season.
    let mut global: HashMap<(i64, String, String, String), (f64, i64)> = HashMap::new();
    for ((position, season), members) in &by_season {
        let n_group = members.len() as i64;
        for stat in &stat_names {
            let peers: Vec<f64> = members.iter().filter_map(|r| r.stat(stat)).collect();
            if peers.len() < 2 {
                continue;
            }
            for member in members.iter() {
                let Some(value) = member.stat(stat) else {
                    continue;
                };
                global
                    .entry((
                        member.player_id,
                        position.clone(),
                        season.clone(),
                        stat.clone(),
                    ))
                    .or_insert_with(|| (ranked_percentile(stat, &peers, value), n_group));
            }
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
        rows.iter().map(|r| Some(r.position.clone())).collect(),
    );
    table.add_str("season", rows.iter().map(|r| Some(r.season.clone())).collect());
    table.add_str(
        "competition_slug",
        rows.iter().map(|r| Some(r.competition.clone())).collect(),
    );
    table.add_str(
        "stat_name",
        rows.iter().map(|r| Some(r.stat_name.clone())).collect(),
    );
    table.add_f64(
        "stat_value",
        rows.iter().map(|r| Some(r.stat_value)).collect(),
    );
    table.add_f64(
        "pct_in_competition",
        rows.iter().map(|r| Some(r.pct_in_competition)).collect(),
    );
    table.add_i64(
        "n_players_in_competition",
        rows.iter()
            .map(|r| Some(r.n_players_in_competition))
            .collect(),
    );
    table.add_f64(
        "pct_global",
        rows.iter()
            .map(|r| {
                global
                    .get(&(
                        r.player_id,
                        r.position.clone(),
                        r.season.clone(),
                        r.stat_name.clone(),
                    ))
                    .map(|(pct, _)| *pct)
            })
            .collect(),
    );
    table.add_i64(
        "n_players_global",
        rows.iter()
            .map(|r| {
                global
                    .get(&(
                        r.player_id,
                        r.position.clone(),
                        r.season.clone(),
                        r.stat_name.clone(),
                    ))
                    .map(|(_, n)| *n)
            })
            .collect(),
    );

    store::save_artifact(config, store::PLAYER_PERCENTILE_RANKS, &table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_is_better_by_default() {
        let peers = vec![0.1, 0.5, 0.9, 1.3];
        assert_eq!(ranked_percentile("goals_per90", &peers, 1.3), 75.0);
        assert_eq!(ranked_percentile("goals_per90", &peers, 0.1), 0.0);
    }

    #[test]
    fn lower_is_better_stats_invert() {
        let peers = vec![0.5, 1.0, 2.0, 4.0];
        // Most fouls -> worst -> 100 - 75 = 25.
        assert_eq!(ranked_percentile("fouls_per90", &peers, 4.0), 25.0);
        // Fewest fouls -> elite -> 100 - 0 = 100.
        assert_eq!(ranked_percentile("fouls_per90", &peers, 0.5), 100.0);
        assert_eq!(ranked_percentile("yellow_cards", &peers, 0.5), 100.0);
    }

    #[test]
    fn percentiles_stay_in_bounds() {
        let peers = vec![1.0, 1.0, 1.0];
        let pct = ranked_percentile("goals_per90", &peers, 1.0);
        assert!((0.0..=100.0).contains(&pct));
        let inv = ranked_percentile("fouls_per90", &peers, 1.0);
        assert!((0.0..=100.0).contains(&inv));
    }
}
