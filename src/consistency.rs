use std::collections::BTreeMap;

use anyhow::{Context, Result};

use crate::config::{Config, MIN_APPEARANCES_CONSISTENCY};
use crate::raw::{self, Appearance};
use crate::schema::StatKey;
use crate::stats;
use crate::store;
use crate::table::Table;

/// Stats profiled for match-to-match spread.
const SPREAD_STATS: &[(StatKey, &str)] = &[
    (StatKey::Rating, "rating"),
    (StatKey::ExpectedGoals, "expectedGoals"),
    (StatKey::ExpectedAssists, "expectedAssists"),
    (StatKey::KeyPasses, "keyPass"),
    (StatKey::Touches, "touches"),
];

/// Rating-CV tier. CV in [0.15, 0.2) deliberately falls through to
/// `variable`; the gap is part of the tier definition, not an oversight.
pub fn consistency_tier(rating_cv: Option<f64>) -> &'static str {
    match rating_cv {
        Some(cv) if cv < 0.08 => "very_consistent",
        Some(cv) if cv < 0.15 => "consistent",
        Some(cv) if cv >= 0.2 => "very_variable",
        _ => "variable",
    }
}

#[derive(Debug, Default)]
struct SpreadRow {
    mean: Option<f64>,
    std: Option<f64>,
    cv: Option<f64>,
}

fn spread(values: &[f64]) -> SpreadRow {
    if values.len() < 2 {
        return SpreadRow {
            mean: if values.len() == 1 { Some(values[0]) } else { None },
            std: None,
            cv: None,
        };
    }
    let mean = stats::mean(values);
    let std = stats::sample_std(values);
    let cv = match (mean, std) {
        (Some(mu), Some(sd)) if mu != 0.0 => Some(sd / mu),
        _ => None,
    };
    SpreadRow { mean, std, cv }
}

pub fn build(config: &Config) -> Result<()> {
    store::require_input(&config.appearances_path())?;
    let appearances = raw::load_appearances(&config.appearances_path())
        .context("load player appearances")?;

    let mut groups: BTreeMap<(i64, String, String), Vec<&Appearance>> = BTreeMap::new();
    for app in appearances.iter().filter(|a| a.minutes() >= 1.0) {
        groups
            .entry((app.player_id, app.season.clone(), app.competition_slug.clone()))
            .or_default()
            .push(app);
    }

    struct OutRow {
        player_id: i64,
        season: String,
        competition: String,
        player_name: String,
        player_position: Option<String>,
        n_appearances: i64,
        spreads: Vec<SpreadRow>,
        rating_min: Option<f64>,
        rating_max: Option<f64>,
        tier: &'static str,
    }

    let mut rows: Vec<OutRow> = Vec::new();
    for ((player_id, season, competition), apps) in &groups {
        if apps.len() < MIN_APPEARANCES_CONSISTENCY {
            continue;
        }
        let spreads: Vec<SpreadRow> = SPREAD_STATS
            .iter()
            .map(|(key, _)| {
                let values: Vec<f64> = apps.iter().filter_map(|a| a.stat(*key)).collect();
                spread(&values)
            })
            .collect();
        let ratings: Vec<f64> = apps.iter().filter_map(|a| a.stat(StatKey::Rating)).collect();
        let rating_cv = spreads[0].cv;
        rows.push(OutRow {
            player_id: *player_id,
            season: season.clone(),
            competition: competition.clone(),
            player_name: apps[0].player_name.clone(),
            player_position: apps[0].player_position.clone(),
            n_appearances: apps.len() as i64,
            spreads,
            rating_min: ratings.iter().copied().reduce(f64::min),
            rating_max: ratings.iter().copied().reduce(f64::max),
            tier: consistency_tier(rating_cv),
        });
    }

    let mut table = Table::new();
    table.add_i64("player_id", rows.iter().map(|r| Some(r.player_id)).collect());
    table.add_str("season", rows.iter().map(|r| Some(r.season.clone())).collect());
    table.add_str(
        "competition_slug",
        rows.iter().map(|r| Some(r.competition.clone())).collect(),
    );
    table.add_str(
        "player_name",
        rows.iter().map(|r| Some(r.player_name.clone())).collect(),
    );
    table.add_str(
        "player_position",
        rows.iter().map(|r| r.player_position.clone()).collect(),
    );
    table.add_i64(
        "n_appearances",
        rows.iter().map(|r| Some(r.n_appearances)).collect(),
    );
    for (idx, (_, label)) in SPREAD_STATS.iter().enumerate() {
        table.add_f64(
            format!("{label}_mean"),
            rows.iter().map(|r| r.spreads[idx].mean).collect(),
        );
        table.add_f64(
            format!("{label}_std"),
            rows.iter().map(|r| r.spreads[idx].std).collect(),
        );
        table.add_f64(
            format!("{label}_cv"),
            rows.iter().map(|r| r.spreads[idx].cv).collect(),
        );
    }
    table.add_f64("rating_min", rows.iter().map(|r| r.rating_min).collect());
    table.add_f64("rating_max", rows.iter().map(|r| r.rating_max).collect());
    table.add_str(
        "consistency_tier",
        rows.iter().map(|r| Some(r.tier.to_string())).collect(),
    );

    store::save_artifact(config, store::PLAYER_CONSISTENCY, &table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries_and_the_gap() {
        assert_eq!(consistency_tier(Some(0.05)), "very_consistent");
        assert_eq!(consistency_tier(Some(0.08)), "consistent");
        assert_eq!(consistency_tier(Some(0.149)), "consistent");
        // The [0.15, 0.2) gap stays at the default tier.
        assert_eq!(consistency_tier(Some(0.15)), "variable");
        assert_eq!(consistency_tier(Some(0.19)), "variable");
        assert_eq!(consistency_tier(Some(0.2)), "very_variable");
        assert_eq!(consistency_tier(Some(0.5)), "very_variable");
        assert_eq!(consistency_tier(None), "variable");
    }

    #[test]
    fn spread_handles_small_samples() {
        let single = spread(&[7.2]);
        assert_eq!(single.mean, Some(7.2));
        assert_eq!(single.std, None);
        assert_eq!(single.cv, None);

        let pair = spread(&[6.0, 8.0]);
        assert_eq!(pair.mean, Some(7.0));
        assert!(pair.std.unwrap() > 0.0);
        assert!(pair.cv.unwrap() > 0.0);
    }
}
