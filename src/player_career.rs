use std::collections::BTreeMap;

use anyhow::Result;

use crate::config::{Config, MIN_MINUTES_CAREER};
use crate::player_season::{self, PlayerSeasonRow};
use crate::stats;
use crate::store;
use crate::table::Table;

#[derive(Debug, Default)]
struct CareerAccum {
    player_name: String,
    player_position: Option<String>,
    appearances: i64,
    starts: i64,
    total_minutes: f64,
    goals: i64,
    assists: i64,
    yellow_cards: i64,
    red_cards: i64,
    seasons: Vec<String>,
    competitions: Vec<String>,
    peak_rating: Option<(f64, String)>,
}

pub fn build(config: &Config) -> Result<()> {
    let seasons = player_season::load_rows(config)?;

    let mut groups: BTreeMap<i64, CareerAccum> = BTreeMap::new();
    for row in &seasons {
        let acc = groups.entry(row.player_id).or_default();
        if acc.player_name.is_empty() {
            acc.player_name = row.player_name.clone();
            acc.player_position = row.player_position.clone();
        }
        acc.appearances += row.appearances;
        acc.starts += row.starts;
        acc.total_minutes += row.total_minutes;
        acc.goals += row.goals;
        acc.assists += row.assists;
        acc.yellow_cards += row.yellow_cards;
        acc.red_cards += row.red_cards;
        acc.seasons.push(row.season.clone());
        acc.competitions.push(row.competition_slug.clone());
        if let Some(rating) = row.avg_rating {
            let better = match &acc.peak_rating {
                Some((best, _)) => rating > *best,
                None => true,
            };
            if better {
                acc.peak_rating = Some((rating, row.season.clone()));
            }
        }
    }

    fn uniq_sorted(values: &[String]) -> Vec<String> {
        let mut v = values.to_vec();
        v.sort();
        v.dedup();
        v
    }

    let ids: Vec<i64> = groups.keys().copied().collect();
    let accs: Vec<&CareerAccum> = groups.values().collect();

    let mut table = Table::new();
    table.add_i64("player_id", ids.iter().map(|id| Some(*id)).collect());
    table.add_str(
        "player_name",
        accs.iter().map(|a| Some(a.player_name.clone())).collect(),
    );
    table.add_str(
        "player_position",
        accs.iter().map(|a| a.player_position.clone()).collect(),
    );
    table.add_i64(
        "appearances",
        accs.iter().map(|a| Some(a.appearances)).collect(),
    );
    table.add_i64("starts", accs.iter().map(|a| Some(a.starts)).collect());
    table.add_i64(
        "sub_appearances",
        accs.iter().map(|a| Some(a.appearances - a.starts)).collect(),
    );
    table.add_f64(
        "total_minutes",
        accs.iter().map(|a| Some(a.total_minutes)).collect(),
    );
    table.add_f64(
        "avg_minutes_per_game",
        accs.iter()
            .map(|a| {
                if a.appearances > 0 {
                    Some(a.total_minutes / a.appearances as f64)
                } else {
                    None
                }
            })
            .collect(),
    );
    table.add_bool(
        "sufficient_minutes",
        accs.iter()
            .map(|a| Some(a.total_minutes >= MIN_MINUTES_CAREER))
            .collect(),
    );
    table.add_i64("goals", accs.iter().map(|a| Some(a.goals)).collect());
    table.add_i64("assists", accs.iter().map(|a| Some(a.assists)).collect());
    table.add_i64(
        "goal_contributions",
        accs.iter().map(|a| Some(a.goals + a.assists)).collect(),
    );
    table.add_i64(
        "yellow_cards",
        accs.iter().map(|a| Some(a.yellow_cards)).collect(),
    );
    table.add_i64("red_cards", accs.iter().map(|a| Some(a.red_cards)).collect());
    table.add_f64(
        "goals_per90",
        accs.iter()
            .map(|a| stats::per90(a.goals as f64, a.total_minutes))
            .collect(),
    );
    table.add_f64(
        "assists_per90",
        accs.iter()
            .map(|a| stats::per90(a.assists as f64, a.total_minutes))
            .collect(),
    );
    table.add_f64(
        "goal_contributions_per90",
        accs.iter()
            .map(|a| stats::per90((a.goals + a.assists) as f64, a.total_minutes))
            .collect(),
    );
    table.add_str(
        "first_season",
        accs.iter()
            .map(|a| uniq_sorted(&a.seasons).first().cloned())
            .collect(),
    );
    table.add_str(
        "last_season",
        accs.iter()
            .map(|a| uniq_sorted(&a.seasons).last().cloned())
            .collect(),
    );
    table.add_i64(
        "n_seasons",
        accs.iter()
            .map(|a| Some(uniq_sorted(&a.seasons).len() as i64))
            .collect(),
    );
    table.add_i64(
        "n_competitions",
        accs.iter()
            .map(|a| Some(uniq_sorted(&a.competitions).len() as i64))
            .collect(),
    );
    table.add_str(
        "seasons_list",
        accs.iter()
            .map(|a| Some(uniq_sorted(&a.seasons).join(",")))
            .collect(),
    );
    table.add_str(
        "competitions_list",
        accs.iter()
            .map(|a| Some(uniq_sorted(&a.competitions).join(",")))
            .collect(),
    );
    table.add_str(
        "peak_rating_season",
        accs.iter()
            .map(|a| a.peak_rating.as_ref().map(|(_, s)| s.clone()))
            .collect(),
    );
    table.add_f64(
        "peak_rating",
        accs.iter()
            .map(|a| a.peak_rating.as_ref().map(|(r, _)| *r))
            .collect(),
    );

    store::save_artifact(config, store::PLAYER_CAREER_STATS, &table)
}

/// Minimal career view for the scouting composer.
#[derive(Debug, Clone)]
pub struct CareerRow {
    pub player_id: i64,
    pub player_position: Option<String>,
    pub total_minutes: f64,
    pub goals: i64,
    pub assists: i64,
    pub first_season: Option<String>,
    pub last_season: Option<String>,
    pub n_seasons: i64,
    pub n_competitions: i64,
}

pub fn load_rows(config: &Config) -> Result<Vec<CareerRow>> {
    let table = store::load_artifact(config, store::PLAYER_CAREER_STATS)?;
    let player_id = table.i64_col("player_id")?;
    let position = table.str_col("player_position")?;
    let minutes = table.f64_col("total_minutes")?;
    let goals = table.i64_col("goals")?;
    let assists = table.i64_col("assists")?;
    let first = table.str_col("first_season")?;
    let last = table.str_col("last_season")?;
    let n_seasons = table.i64_col("n_seasons")?;
    let n_competitions = table.i64_col("n_competitions")?;
    let mut out = Vec::with_capacity(table.n_rows());
    for row in 0..table.n_rows() {
        out.push(CareerRow {
            player_id: player_id[row].unwrap_or_default(),
            player_position: position[row].clone(),
            total_minutes: minutes[row].unwrap_or_default(),
            goals: goals[row].unwrap_or_default(),
            assists: assists[row].unwrap_or_default(),
            first_season: first[row].clone(),
            last_season: last[row].clone(),
            n_seasons: n_seasons[row].unwrap_or_default(),
            n_competitions: n_competitions[row].unwrap_or_default(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn career_per90_uses_summed_minutes() {
        assert_eq!(stats::per90(9.0, 900.0), Some(0.9));
        assert_eq!(stats::per90(9.0, 0.0), None);
    }

    #[test]
    fn season_lists_are_sorted_and_unique() {
        let seasons = vec![
            "24/25".to_string(),
            "23/24".to_string(),
            "24/25".to_string(),
        ];
        let mut v = seasons.clone();
        v.sort();
        v.dedup();
        assert_eq!(v, vec!["23/24".to_string(), "24/25".to_string()]);
        assert!(v.first().unwrap() <= v.last().unwrap());
    }
}
