use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};

use crate::config::{Config, MIN_MINUTES_OPPONENT_SPLIT};
use crate::raw::{self, Appearance};
use crate::schema::StatKey;
use crate::stats;
use crate::store;
use crate::table::Table;

pub const TIER_TOP: &str = "top_third";
pub const TIER_MID: &str = "mid_third";
pub const TIER_BOTTOM: &str = "bottom_third";

/// Tier teams inside one (season, competition) by conceded expected goals.
/// Lowest conceded xG is the strongest defense and lands in `top_third`.
///
/// Terciles need at least 3 distinct values; with exactly 2 the split
/// degrades to a median halving with no `mid_third`. Below 2 values the
/// group stays untiered.
pub fn tier_teams(xg_against: &[(String, f64)]) -> HashMap<String, &'static str> {
    let mut out = HashMap::new();
    if xg_against.len() < 2 {
        return out;
    }
    let mut values: Vec<f64> = xg_against.iter().map(|(_, v)| *v).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mut distinct = values.clone();
    distinct.dedup();

    if distinct.len() >= 3 {
        let q33 = stats::quantile_sorted(&values, 1.0 / 3.0).unwrap();
        let q67 = stats::quantile_sorted(&values, 2.0 / 3.0).unwrap();
        for (team, v) in xg_against {
            let tier = if *v <= q33 {
                TIER_TOP
            } else if *v <= q67 {
                TIER_MID
            } else {
                TIER_BOTTOM
            };
            out.insert(team.clone(), tier);
        }
    } else {
        let median = stats::quantile_sorted(&values, 0.5).unwrap();
        for (team, v) in xg_against {
            let tier = if *v < median { TIER_TOP } else { TIER_BOTTOM };
            out.insert(team.clone(), tier);
        }
    }
    out
}

pub fn build(config: &Config) -> Result<()> {
    let team_stats = store::load_artifact(config, store::TEAM_SEASON_STATS)?;
    let team_names = team_stats.str_col("team_name")?;
    let seasons = team_stats.str_col("season")?;
    let competitions = team_stats.str_col("competition_slug")?;
    let xg_against = team_stats.f64_col("xg_against_total")?;

    let mut defense_by_group: BTreeMap<(String, String), Vec<(String, f64)>> = BTreeMap::new();
    for row in 0..team_stats.n_rows() {
        let (Some(team), Some(season), Some(comp), Some(xga)) = (
            &team_names[row],
            &seasons[row],
            &competitions[row],
            xg_against[row],
        ) else {
            continue;
        };
        defense_by_group
            .entry((season.clone(), comp.clone()))
            .or_default()
            .push((team.clone(), xga));
    }
    let mut tier_map: HashMap<(String, String, String), &'static str> = HashMap::new();
    for ((season, comp), teams) in &defense_by_group {
        for (team, tier) in tier_teams(teams) {
            tier_map.insert((team, season.clone(), comp.clone()), tier);
        }
    }

    let matches = raw::load_match_index(&config.matches_index())?;
    let match_meta: HashMap<&str, &raw::MatchIndexRow> =
        matches.iter().map(|m| (m.match_id.as_str(), m)).collect();

    store::require_input(&config.appearances_path())?;
    let appearances = raw::load_appearances(&config.appearances_path())
        .context("load player appearances")?;

    // (player, season, competition, tier) -> appearances against that tier.
    let mut groups: BTreeMap<(i64, String, String, &'static str), Vec<&Appearance>> =
        BTreeMap::new();
    for app in &appearances {
        let Some(meta) = match_meta.get(app.match_id.as_str()) else {
            continue;
        };
        let opponent = match app.side.as_deref() {
            Some("home") => &meta.away_team_name,
            Some("away") => &meta.home_team_name,
            _ => continue,
        };
        let Some(&tier) = tier_map.get(&(
            opponent.clone(),
            app.season.clone(),
            app.competition_slug.clone(),
        )) else {
            continue;
        };
        groups
            .entry((
                app.player_id,
                app.season.clone(),
                app.competition_slug.clone(),
                tier,
            ))
            .or_default()
            .push(app);
    }

    struct TierRow {
        player_id: i64,
        player_name: String,
        player_position: Option<String>,
        season: String,
        competition: String,
        tier: &'static str,
        n_appearances: i64,
        avg_rating: Option<f64>,
        goals: f64,
        xg_total: f64,
        xg_per90: Option<f64>,
        key_passes_per90: Option<f64>,
        tackles_per90: Option<f64>,
    }

    let mut rows: Vec<TierRow> = Vec::new();
    for ((player_id, season, competition, tier), apps) in &groups {
        let minutes: f64 = apps.iter().map(|a| a.minutes()).sum();
        if minutes < MIN_MINUTES_OPPONENT_SPLIT {
            continue;
        }
        let ratings: Vec<f64> = apps.iter().filter_map(|a| a.stat(StatKey::Rating)).collect();
        let xg: f64 = apps.iter().filter_map(|a| a.stat(StatKey::ExpectedGoals)).sum();
        let key_passes: f64 = apps.iter().filter_map(|a| a.stat(StatKey::KeyPasses)).sum();
        let tackles: f64 = apps.iter().filter_map(|a| a.stat(StatKey::TotalTackles)).sum();
        rows.push(TierRow {
            player_id: *player_id,
            player_name: apps[0].player_name.clone(),
            player_position: apps[0].player_position.clone(),
            season: season.clone(),
            competition: competition.clone(),
            tier: *tier,
            n_appearances: apps.len() as i64,
            avg_rating: stats::mean(&ratings),
            goals: apps.iter().filter_map(|a| a.stat(StatKey::Goals)).sum(),
            xg_total: xg,
            xg_per90: stats::per90(xg, minutes),
            key_passes_per90: stats::per90(key_passes, minutes),
            tackles_per90: stats::per90(tackles, minutes),
        });
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
    table.add_str("season", rows.iter().map(|r| Some(r.season.clone())).collect());
    table.add_str(
        "competition_slug",
        rows.iter().map(|r| Some(r.competition.clone())).collect(),
    );
    table.add_str(
        "opponent_tier",
        rows.iter().map(|r| Some(r.tier.to_string())).collect(),
    );
    table.add_i64(
        "n_appearances",
        rows.iter().map(|r| Some(r.n_appearances)).collect(),
    );
    table.add_f64("avg_rating", rows.iter().map(|r| r.avg_rating).collect());
    table.add_f64("goals", rows.iter().map(|r| Some(r.goals)).collect());
    table.add_f64("xg_total", rows.iter().map(|r| Some(r.xg_total)).collect());
    table.add_f64("xg_per90", rows.iter().map(|r| r.xg_per90).collect());
    table.add_f64(
        "key_passes_per90",
        rows.iter().map(|r| r.key_passes_per90).collect(),
    );
    table.add_f64(
        "tackles_per90",
        rows.iter().map(|r| r.tackles_per90).collect(),
    );
    store::save_artifact(config, store::PLAYER_OPPONENT_CONTEXT, &table)?;

    // Summary pivot: rating against the strongest vs weakest tier.
    let mut pivot: BTreeMap<(i64, String, String), (Option<f64>, Option<f64>, String, Option<String>)> =
        BTreeMap::new();
    for row in &rows {
        let entry = pivot
            .entry((row.player_id, row.season.clone(), row.competition.clone()))
            .or_insert((None, None, row.player_name.clone(), row.player_position.clone()));
        match row.tier {
            TIER_TOP => entry.0 = row.avg_rating,
            TIER_BOTTOM => entry.1 = row.avg_rating,
            _ => {}
        }
    }

    let mut summary = Table::new();
    summary.add_i64(
        "player_id",
        pivot.keys().map(|(pid, _, _)| Some(*pid)).collect(),
    );
    summary.add_str(
        "player_name",
        pivot.values().map(|(_, _, name, _)| Some(name.clone())).collect(),
    );
    summary.add_str(
        "player_position",
        pivot.values().map(|(_, _, _, pos)| pos.clone()).collect(),
    );
    summary.add_str(
        "season",
        pivot.keys().map(|(_, season, _)| Some(season.clone())).collect(),
    );
    summary.add_str(
        "competition_slug",
        pivot.keys().map(|(_, _, comp)| Some(comp.clone())).collect(),
    );
    summary.add_f64(
        "rating_vs_top",
        pivot.values().map(|(top, _, _, _)| *top).collect(),
    );
    summary.add_f64(
        "rating_vs_bottom",
        pivot.values().map(|(_, bottom, _, _)| *bottom).collect(),
    );
    summary.add_f64(
        "big_game_rating_delta",
        pivot
            .values()
            .map(|(top, bottom, _, _)| match (top, bottom) {
                (Some(t), Some(b)) => Some(t - b),
                _ => None,
            })
            .collect(),
    );
    store::save_artifact(config, store::PLAYER_OPPONENT_CONTEXT_SUMMARY, &summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_distinct_values_make_terciles() {
        let teams = vec![
            ("Solid FC".to_string(), 10.0),
            ("Mid FC".to_string(), 20.0),
            ("Leaky FC".to_string(), 30.0),
        ];
        let tiers = tier_teams(&teams);
        assert_eq!(tiers.get("Solid FC"), Some(&TIER_TOP));
        assert_eq!(tiers.get("Mid FC"), Some(&TIER_MID));
        assert_eq!(tiers.get("Leaky FC"), Some(&TIER_BOTTOM));
    }

    #[test]
    fn two_distinct_values_fall_back_to_halves() {
        let teams = vec![
            ("Solid FC".to_string(), 10.0),
            ("Leaky FC".to_string(), 30.0),
        ];
        let tiers = tier_teams(&teams);
        assert_eq!(tiers.get("Solid FC"), Some(&TIER_TOP));
        assert_eq!(tiers.get("Leaky FC"), Some(&TIER_BOTTOM));
        assert!(!tiers.values().any(|t| *t == TIER_MID));
    }

    #[test]
    fn lone_team_stays_untiered() {
        let teams = vec![("Solo FC".to_string(), 12.0)];
        assert!(tier_teams(&teams).is_empty());
    }

    #[test]
    fn duplicate_values_with_two_distinct_avoid_mid() {
        let teams = vec![
            ("A".to_string(), 10.0),
            ("B".to_string(), 10.0),
            ("C".to_string(), 30.0),
            ("D".to_string(), 30.0),
        ];
        let tiers = tier_teams(&teams);
        assert!(!tiers.values().any(|t| *t == TIER_MID));
        assert_eq!(tiers.get("A"), Some(&TIER_TOP));
        assert_eq!(tiers.get("C"), Some(&TIER_BOTTOM));
    }
}
