use anyhow::{Context, Result};

use crate::config::Config;
use crate::raw;
use crate::schema::StatKey;
use crate::store;
use crate::table::Table;

/// One row per substitute appearance with recorded playing time.
///
/// The incident feed has no substitution events, so the entry minute is
/// estimated from minutes played against a 90-minute match; the confidence
/// tier labels that approximation for downstream consumers, and the
/// outgoing player is unknowable (always null).
pub fn build(config: &Config) -> Result<()> {
    store::require_input(&config.appearances_path())?;
    let appearances = raw::load_appearances(&config.appearances_path())
        .context("load player appearances")?;

    // Zero-minute substitutes sat on the bench; they carry no impact signal.
    let subs: Vec<&raw::Appearance> = appearances
        .iter()
        .filter(|a| a.substitute && a.minutes() > 0.0)
        .collect();

    let mut table = Table::new();
    table.add_str(
        "match_id",
        subs.iter().map(|a| Some(a.match_id.clone())).collect(),
    );
    table.add_i64(
        "player_in_id",
        subs.iter().map(|a| Some(a.player_id)).collect(),
    );
    table.add_str(
        "player_in_name",
        subs.iter().map(|a| Some(a.player_name.clone())).collect(),
    );
    table.add_str(
        "player_in_position",
        subs.iter().map(|a| a.player_position.clone()).collect(),
    );
    table.add_i64("player_out_id", subs.iter().map(|_| None).collect());
    table.add_str("player_out_name", subs.iter().map(|_| None).collect());
    table.add_f64(
        "sub_minute",
        subs.iter()
            .map(|a| Some((90.0 - a.minutes()).max(0.0)))
            .collect(),
    );
    table.add_f64(
        "minutes_after_sub",
        subs.iter().map(|a| Some(a.minutes())).collect(),
    );
    table.add_bool(
        "sub_minute_estimated",
        subs.iter().map(|_| Some(true)).collect(),
    );
    table.add_str(
        "confidence_tier",
        subs.iter()
            .map(|_| Some("estimated_90min".to_string()))
            .collect(),
    );
    table.add_f64(
        "player_in_rating",
        subs.iter().map(|a| a.stat(StatKey::Rating)).collect(),
    );
    table.add_i64(
        "player_in_goals",
        subs.iter()
            .map(|a| Some(a.stat(StatKey::Goals).unwrap_or(0.0) as i64))
            .collect(),
    );
    table.add_i64(
        "player_in_assists",
        subs.iter()
            .map(|a| Some(a.stat(StatKey::Assists).unwrap_or(0.0) as i64))
            .collect(),
    );
    table.add_f64(
        "player_in_xg",
        subs.iter().map(|a| a.stat(StatKey::ExpectedGoals)).collect(),
    );
    table.add_i64(
        "player_in_key_passes",
        subs.iter()
            .map(|a| Some(a.stat(StatKey::KeyPasses).unwrap_or(0.0) as i64))
            .collect(),
    );
    table.add_str(
        "season",
        subs.iter().map(|a| Some(a.season.clone())).collect(),
    );
    table.add_str(
        "competition_slug",
        subs.iter().map(|a| Some(a.competition_slug.clone())).collect(),
    );

    store::save_artifact(config, store::SUBSTITUTION_IMPACT, &table)
}
