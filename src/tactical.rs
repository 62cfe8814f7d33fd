use std::collections::BTreeMap;

use anyhow::Result;

use crate::config::Config;
use crate::store;
use crate::table::Table;

/// Style indices derived from team-season stats. Each is also expressed as a
/// within-(season, competition) percentile so profiles compare across leagues.
const INDEX_COLS: &[&str] = &[
    "possession_index",
    "directness_index",
    "pressing_index",
    "aerial_index",
    "crossing_index",
    "chance_creation_index",
    "defensive_solidity",
    "home_away_consistency",
    "second_half_intensity",
];

/// Fractional rank (pandas-style average rank / n), in (0, 1].
fn pct_ranks(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let n = present.len() as f64;
    values
        .iter()
        .map(|v| {
            let v = (*v)?;
            let less = present.iter().filter(|x| **x < v).count() as f64;
            let equal = present.iter().filter(|x| **x == v).count() as f64;
            Some((less + (equal + 1.0) / 2.0) / n)
        })
        .collect()
}

pub fn build(config: &Config) -> Result<()> {
    let team_stats = store::load_artifact(config, store::TEAM_SEASON_STATS)?;
    let n = team_stats.n_rows();
    let team_name = team_stats.str_col("team_name")?;
    let season = team_stats.str_col("season")?;
    let competition = team_stats.str_col("competition_slug")?;

    let get = |name: &str| team_stats.f64_col_opt(name).unwrap_or_else(|| vec![None; n]);
    let possession = get("possession_avg");
    let passes = get("passes_total");
    let long_balls = get("long_balls");
    let tackles = get("tackles_total");
    let interceptions = get("interceptions_total");
    let aerials = get("aerial_duels");
    let crosses = get("crosses");
    let big_chances = get("big_chances_total");
    let xg_against = get("xg_against_total");
    let xg_home = get("xg_for_home");
    let xg_away = get("xg_for_away");
    let matches_home = team_stats.f64_col("matches_home")?;
    let matches_away = team_stats.f64_col("matches_away")?;
    let shots_first = get("shots_first_half");
    let shots_second = get("shots_second_half");

    let div = |num: Option<f64>, den: Option<f64>| -> Option<f64> {
        match (num, den) {
            (Some(n), Some(d)) if d != 0.0 => Some(n / d),
            _ => None,
        }
    };

    let mut indices: BTreeMap<&str, Vec<Option<f64>>> = BTreeMap::new();
    indices.insert("possession_index", possession.clone());
    indices.insert(
        "directness_index",
        (0..n).map(|i| div(long_balls[i], passes[i])).collect(),
    );
    indices.insert(
        "pressing_index",
        (0..n)
            .map(|i| match (tackles[i], interceptions[i]) {
                (Some(t), Some(x)) => Some(t + x),
                _ => None,
            })
            .collect(),
    );
    indices.insert("aerial_index", aerials.clone());
    indices.insert("crossing_index", crosses.clone());
    indices.insert("chance_creation_index", big_chances.clone());
    indices.insert(
        "defensive_solidity",
        xg_against
            .iter()
            .map(|v| match v {
                Some(x) if *x != 0.0 => Some(1.0 / x),
                _ => None,
            })
            .collect(),
    );
    indices.insert(
        "home_away_consistency",
        (0..n)
            .map(|i| {
                let home_pg = div(xg_home[i], matches_home[i])?;
                let away_pg = div(xg_away[i], matches_away[i])?;
                Some(1.0 / (1.0 + (home_pg - away_pg).abs()))
            })
            .collect(),
    );
    indices.insert(
        "second_half_intensity",
        (0..n).map(|i| div(shots_second[i], shots_first[i])).collect(),
    );

    // Percentile ranks within each (season, competition).
    let mut group_rows: BTreeMap<(String, String), Vec<usize>> = BTreeMap::new();
    for i in 0..n {
        if let (Some(s), Some(c)) = (&season[i], &competition[i]) {
            group_rows
                .entry((s.clone(), c.clone()))
                .or_default()
                .push(i);
        }
    }
    let mut pct_cols: BTreeMap<&str, Vec<Option<f64>>> = BTreeMap::new();
    for name in INDEX_COLS {
        let col = &indices[name];
        let mut pct = vec![None; n];
        for members in group_rows.values() {
            let values: Vec<Option<f64>> = members.iter().map(|i| col[*i]).collect();
            for (slot, rank) in members.iter().zip(pct_ranks(&values)) {
                pct[*slot] = rank;
            }
        }
        pct_cols.insert(name, pct);
    }

    let mut table = Table::new();
    table.add_str("team_name", team_name.to_vec());
    table.add_str("season", season.to_vec());
    table.add_str("competition_slug", competition.to_vec());
    for name in INDEX_COLS {
        table.add_f64(*name, indices[name].clone());
    }
    for name in INDEX_COLS {
        table.add_f64(format!("{name}_pct"), pct_cols[name].clone());
    }
    store::save_artifact(config, store::TEAM_TACTICAL_PROFILES, &table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pct_ranks_are_in_unit_interval() {
        let values = vec![Some(1.0), Some(2.0), Some(3.0), None];
        let ranks = pct_ranks(&values);
        assert!((ranks[0].unwrap() - 1.0 / 3.0).abs() < 1e-12);
        assert!((ranks[1].unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(ranks[2], Some(1.0));
        assert_eq!(ranks[3], None);
    }

    #[test]
    fn ties_share_average_rank() {
        let values = vec![Some(5.0), Some(5.0)];
        let ranks = pct_ranks(&values);
        assert_eq!(ranks[0], Some(0.75));
        assert_eq!(ranks[1], Some(0.75));
    }
}
