use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};

use crate::config::{Config, MIN_MINUTES_SEASON};
use crate::raw::{self, Appearance};
use crate::schema::{ALL_STAT_KEYS, RATIO_STATS, StatKey, VALUE_AVG_STATS};
use crate::stats;
use crate::store;
use crate::table::Table;

const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 3600.0;

/// A loaded 03_player_season_stats row, as consumed by downstream stages.
#[derive(Debug, Clone)]
pub struct PlayerSeasonRow {
    pub player_id: i64,
    pub season: String,
    pub competition_slug: String,
    pub player_name: String,
    pub player_short_name: Option<String>,
    pub player_position: Option<String>,
    pub appearances: i64,
    pub starts: i64,
    pub total_minutes: f64,
    pub sufficient_minutes: bool,
    pub avg_rating: Option<f64>,
    pub goals: i64,
    pub assists: i64,
    pub yellow_cards: i64,
    pub red_cards: i64,
    pub age_at_season_start: Option<f64>,
    /// Per-90, ratio and value-average stats by output column name.
    pub stats: BTreeMap<String, f64>,
}

impl PlayerSeasonRow {
    /// Stat lookup by output column name, covering the non-map columns the
    /// benchmark/percentile/progression stages also rank.
    pub fn stat(&self, name: &str) -> Option<f64> {
        match name {
            "avg_rating" => self.avg_rating,
            "yellow_cards" => Some(self.yellow_cards as f64),
            "red_cards" => Some(self.red_cards as f64),
            _ => self.stats.get(name).copied(),
        }
    }
}

pub fn build(config: &Config) -> Result<()> {
    store::require_input(&config.appearances_path())?;
    let appearances = raw::load_appearances(&config.appearances_path())
        .context("load player appearances")?;
    store::require_input(&config.incidents_path())?;
    let incidents = raw::load_incidents(&config.incidents_path())
        .context("load player incidents")?;

    // Card counts per (player, season, competition).
    let mut cards: HashMap<(i64, String, String), (i64, i64)> = HashMap::new();
    for incident in &incidents {
        let (Some(pid), Some(season), Some(comp)) = (
            incident.player_id,
            incident.season.as_ref(),
            incident.competition_slug.as_ref(),
        ) else {
            continue;
        };
        if !incident.is_card() {
            continue;
        }
        let entry = cards
            .entry((pid, season.clone(), comp.clone()))
            .or_default();
        if incident.card_class_contains("yellow") {
            entry.0 += 1;
        }
        if incident.card_class_contains("red") {
            entry.1 += 1;
        }
    }

    // Only appearances with recorded playing time feed season aggregates.
    let mut groups: BTreeMap<(i64, String, String), Vec<&Appearance>> = BTreeMap::new();
    for app in appearances.iter().filter(|a| a.minutes() >= 1.0) {
        groups
            .entry((app.player_id, app.season.clone(), app.competition_slug.clone()))
            .or_default()
            .push(app);
    }

    let rows: Vec<PlayerSeasonRow> = groups
        .iter()
        .map(|((player_id, season, comp), apps)| {
            aggregate_group(*player_id, season, comp, apps, &cards)
        })
        .collect();

    let table = rows_to_table(&rows);
    store::save_artifact(config, store::PLAYER_SEASON_STATS, &table)
}

fn aggregate_group(
    player_id: i64,
    season: &str,
    competition: &str,
    apps: &[&Appearance],
    cards: &HashMap<(i64, String, String), (i64, i64)>,
) -> PlayerSeasonRow {
    let first = apps[0];
    let appearances = {
        let mut ids: Vec<&str> = apps.iter().map(|a| a.match_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len() as i64
    };
    let starts = apps.iter().filter(|a| !a.substitute).count() as i64;
    let total_minutes: f64 = apps.iter().map(|a| a.minutes()).sum();

    let ratings: Vec<f64> = apps.iter().filter_map(|a| a.stat(StatKey::Rating)).collect();
    let avg_rating = stats::mean(&ratings);

    let mut totals: HashMap<StatKey, f64> = HashMap::new();
    for key in ALL_STAT_KEYS.iter().filter(|k| k.agg() == crate::schema::Agg::Sum) {
        let sum: f64 = apps.iter().filter_map(|a| a.stat(*key)).sum();
        totals.insert(*key, sum);
    }

    let goals = totals.get(&StatKey::Goals).copied().unwrap_or(0.0) as i64;
    let assists = totals.get(&StatKey::Assists).copied().unwrap_or(0.0) as i64;

    let (yellow_cards, red_cards) = cards
        .get(&(player_id, season.to_string(), competition.to_string()))
        .copied()
        .unwrap_or((0, 0));

    // Age at season start: DOB vs the player's first match in this group.
    let dob = apps.iter().find_map(|a| a.date_of_birth);
    let first_match = apps.iter().filter_map(|a| a.match_date).min();
    let age_at_season_start = match (dob, first_match) {
        (Some(dob), Some(first)) if first > dob => {
            Some((first - dob) as f64 / SECONDS_PER_YEAR)
        }
        _ => None,
    };

    let mut stat_map: BTreeMap<String, f64> = BTreeMap::new();
    for key in ALL_STAT_KEYS.iter().filter(|k| k.has_per90()) {
        let total = totals.get(key).copied().unwrap_or(0.0);
        if let Some(v) = stats::per90(total, total_minutes) {
            stat_map.insert(format!("{}_per90", key.base()), v);
        }
    }
    for spec in RATIO_STATS {
        let num = totals.get(&spec.num).copied().unwrap_or(0.0);
        let den: f64 = spec
            .den
            .iter()
            .map(|k| totals.get(k).copied().unwrap_or(0.0))
            .sum();
        if let Some(v) = stats::ratio(num, den) {
            stat_map.insert(spec.name.to_string(), v);
        }
    }
    for (key, out_name) in VALUE_AVG_STATS {
        let values: Vec<f64> = apps.iter().filter_map(|a| a.stat(*key)).collect();
        if let Some(v) = stats::mean(&values) {
            stat_map.insert(out_name.to_string(), v);
        }
    }

    PlayerSeasonRow {
        player_id,
        season: season.to_string(),
        competition_slug: competition.to_string(),
        player_name: first.player_name.clone(),
        player_short_name: first.player_short_name.clone(),
        player_position: first.player_position.clone(),
        appearances,
        starts,
        total_minutes,
        sufficient_minutes: total_minutes >= MIN_MINUTES_SEASON,
        avg_rating,
        goals,
        assists,
        yellow_cards,
        red_cards,
        age_at_season_start,
        stats: stat_map,
    }
}

fn rows_to_table(rows: &[PlayerSeasonRow]) -> Table {
    let mut table = Table::new();
    table.add_i64("player_id", rows.iter().map(|r| Some(r.player_id)).collect());
    table.add_str("season", rows.iter().map(|r| Some(r.season.clone())).collect());
    table.add_str(
        "competition_slug",
        rows.iter().map(|r| Some(r.competition_slug.clone())).collect(),
    );
    table.add_str(
        "player_name",
        rows.iter().map(|r| Some(r.player_name.clone())).collect(),
    );
    table.add_str(
        "player_shortName",
        rows.iter().map(|r| r.player_short_name.clone()).collect(),
    );
    table.add_str(
        "player_position",
        rows.iter().map(|r| r.player_position.clone()).collect(),
    );
    table.add_i64(
        "appearances",
        rows.iter().map(|r| Some(r.appearances)).collect(),
    );
    table.add_i64("starts", rows.iter().map(|r| Some(r.starts)).collect());
    table.add_i64(
        "sub_appearances",
        rows.iter().map(|r| Some(r.appearances - r.starts)).collect(),
    );
    table.add_f64(
        "total_minutes",
        rows.iter().map(|r| Some(r.total_minutes)).collect(),
    );
    table.add_f64(
        "avg_minutes_per_game",
        rows.iter()
            .map(|r| {
                if r.appearances > 0 {
                    Some(r.total_minutes / r.appearances as f64)
                } else {
                    None
                }
            })
            .collect(),
    );
    table.add_bool(
        "sufficient_minutes",
        rows.iter().map(|r| Some(r.sufficient_minutes)).collect(),
    );
    table.add_f64("avg_rating", rows.iter().map(|r| r.avg_rating).collect());
    table.add_i64("goals", rows.iter().map(|r| Some(r.goals)).collect());
    table.add_i64("assists", rows.iter().map(|r| Some(r.assists)).collect());
    table.add_i64(
        "goal_contributions",
        rows.iter().map(|r| Some(r.goals + r.assists)).collect(),
    );
    table.add_i64(
        "yellow_cards",
        rows.iter().map(|r| Some(r.yellow_cards)).collect(),
    );
    table.add_i64("red_cards", rows.iter().map(|r| Some(r.red_cards)).collect());
    table.add_f64(
        "age_at_season_start",
        rows.iter().map(|r| r.age_at_season_start).collect(),
    );
    for name in crate::schema::PER90_STATS.iter() {
        table.add_f64(
            name.clone(),
            rows.iter().map(|r| r.stats.get(name).copied()).collect(),
        );
    }
    for spec in RATIO_STATS {
        table.add_f64(
            spec.name,
            rows.iter().map(|r| r.stats.get(spec.name).copied()).collect(),
        );
    }
    for (_, out_name) in VALUE_AVG_STATS {
        table.add_f64(
            *out_name,
            rows.iter().map(|r| r.stats.get(*out_name).copied()).collect(),
        );
    }
    table
}

/// Reload the season artifact into typed rows for downstream stages.
pub fn load_rows(config: &Config) -> Result<Vec<PlayerSeasonRow>> {
    let table = store::load_artifact(config, store::PLAYER_SEASON_STATS)?;
    let n = table.n_rows();
    let player_id = table.i64_col("player_id")?;
    let season = table.str_col("season")?;
    let competition = table.str_col("competition_slug")?;
    let player_name = table.str_col("player_name")?;
    let short_name = table.str_col("player_shortName")?;
    let position = table.str_col("player_position")?;
    let appearances = table.i64_col("appearances")?;
    let starts = table.i64_col("starts")?;
    let total_minutes = table.f64_col("total_minutes")?;
    let sufficient = table.bool_col("sufficient_minutes")?;
    let avg_rating = table.f64_col("avg_rating")?;
    let goals = table.i64_col("goals")?;
    let assists = table.i64_col("assists")?;
    let yellow = table.i64_col("yellow_cards")?;
    let red = table.i64_col("red_cards")?;
    let age = table.f64_col("age_at_season_start")?;

    let mut stat_cols: Vec<(String, Vec<Option<f64>>)> = Vec::new();
    for name in crate::schema::PER90_STATS.iter() {
        stat_cols.push((name.clone(), table.f64_col(name)?));
    }
    for spec in RATIO_STATS {
        stat_cols.push((spec.name.to_string(), table.f64_col(spec.name)?));
    }
    for (_, out_name) in VALUE_AVG_STATS {
        stat_cols.push((out_name.to_string(), table.f64_col(out_name)?));
    }

    let mut out = Vec::with_capacity(n);
    for row in 0..n {
        let mut stat_map = BTreeMap::new();
        for (name, col) in &stat_cols {
            if let Some(v) = col[row] {
                stat_map.insert(name.clone(), v);
            }
        }
        out.push(PlayerSeasonRow {
            player_id: player_id[row].unwrap_or_default(),
            season: season[row].clone().unwrap_or_default(),
            competition_slug: competition[row].clone().unwrap_or_default(),
            player_name: player_name[row].clone().unwrap_or_default(),
            player_short_name: short_name[row].clone(),
            player_position: position[row].clone(),
            appearances: appearances[row].unwrap_or_default(),
            starts: starts[row].unwrap_or_default(),
            total_minutes: total_minutes[row].unwrap_or_default(),
            sufficient_minutes: sufficient[row].unwrap_or_default(),
            avg_rating: avg_rating[row],
            goals: goals[row].unwrap_or_default(),
            assists: assists[row].unwrap_or_default(),
            yellow_cards: yellow[row].unwrap_or_default(),
            red_cards: red[row].unwrap_or_default(),
            age_at_season_start: age[row],
            stats: stat_map,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appearance(minutes: f64, goals: f64) -> Appearance {
        let mut stats = HashMap::new();
        stats.insert(StatKey::Minutes, minutes);
        stats.insert(StatKey::Goals, goals);
        stats.insert(StatKey::TotalPasses, 50.0);
        stats.insert(StatKey::AccuratePasses, 40.0);
        Appearance {
            match_id: "m1".into(),
            player_id: 10,
            player_name: "Test Player".into(),
            player_short_name: None,
            player_position: Some("F".into()),
            season: "24/25".into(),
            competition_slug: "league-x".into(),
            side: Some("home".into()),
            substitute: false,
            match_date: Some(1_700_000_000),
            date_of_birth: Some(1_000_000_000),
            stats,
        }
    }

    #[test]
    fn per90_and_ratio_derivation() {
        let a = appearance(90.0, 2.0);
        let apps = vec![&a];
        let row = aggregate_group(10, "24/25", "league-x", &apps, &HashMap::new());
        assert_eq!(row.stat("goals_per90"), Some(2.0));
        assert_eq!(row.stat("pass_accuracy"), Some(0.8));
        assert!(!row.sufficient_minutes);
        assert_eq!(row.goals, 2);
    }

    #[test]
    fn sufficient_minutes_exactly_at_threshold() {
        let a = appearance(450.0, 0.0);
        let apps = vec![&a];
        let row = aggregate_group(10, "24/25", "league-x", &apps, &HashMap::new());
        assert!(row.sufficient_minutes);
    }

    #[test]
    fn age_is_computed_from_first_match() {
        let a = appearance(90.0, 0.0);
        let apps = vec![&a];
        let row = aggregate_group(10, "24/25", "league-x", &apps, &HashMap::new());
        let age = row.age_at_season_start.unwrap();
        assert!((age - (700_000_000.0 / SECONDS_PER_YEAR)).abs() < 1e-9);
    }

    #[test]
    fn missing_stats_yield_no_ratio() {
        let mut a = appearance(90.0, 0.0);
        a.stats.remove(&StatKey::TotalPasses);
        a.stats.remove(&StatKey::AccuratePasses);
        let apps = vec![&a];
        let row = aggregate_group(10, "24/25", "league-x", &apps, &HashMap::new());
        assert_eq!(row.stat("pass_accuracy"), None);
    }
}
