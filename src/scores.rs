use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};

use crate::config::Config;
use crate::raw;
use crate::store;
use crate::table::Table;

/// Confidence label attached to a resolved match score, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSource {
    Original,
    DerivedFromIncidents,
    ZeroZeroAssumed,
    NotScraped,
}

impl ScoreSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ScoreSource::Original => "original",
            ScoreSource::DerivedFromIncidents => "derived_from_incidents",
            ScoreSource::ZeroZeroAssumed => "zero_zero_assumed",
            ScoreSource::NotScraped => "not_scraped",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedScore {
    pub match_id: String,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub source: ScoreSource,
    pub total_goals: Option<i64>,
    pub result: Option<char>,
}

/// Inputs to the resolution cascade, keyed by match id.
#[derive(Debug, Default)]
pub struct ScoreInputs {
    /// Pre-existing trusted scores (only entries with both sides known).
    pub trusted: HashMap<String, (i64, i64)>,
    /// Maximum running score reconstructed from incident events.
    pub from_incidents: HashMap<String, (i64, i64)>,
    /// Matches with any recorded player participation.
    pub with_appearances: HashSet<String>,
}

/// Priority cascade, one output row per spine match, spine order:
/// trusted > incident-derived > 0-0 with appearances > not scraped.
/// An incident-derived 0-0 is indistinguishable from "no goals recorded"
/// and is relabeled to the weaker zero_zero_assumed.
pub fn resolve_scores(spine: &[String], inputs: &ScoreInputs) -> Vec<ResolvedScore> {
    spine
        .iter()
        .map(|match_id| {
            let (home_score, away_score, mut source) =
                if let Some((h, a)) = inputs.trusted.get(match_id) {
                    (Some(*h), Some(*a), ScoreSource::Original)
                } else if let Some((h, a)) = inputs.from_incidents.get(match_id) {
                    (Some(*h), Some(*a), ScoreSource::DerivedFromIncidents)
                } else if inputs.with_appearances.contains(match_id) {
                    (Some(0), Some(0), ScoreSource::ZeroZeroAssumed)
                } else {
                    (None, None, ScoreSource::NotScraped)
                };

            let total_goals = match (home_score, away_score) {
                (Some(h), Some(a)) => Some(h + a),
                _ => None,
            };
            if source == ScoreSource::DerivedFromIncidents && total_goals == Some(0) {
                source = ScoreSource::ZeroZeroAssumed;
            }
            let result = match (home_score, away_score) {
                (Some(h), Some(a)) if h > a => Some('H'),
                (Some(h), Some(a)) if h < a => Some('A'),
                (Some(_), Some(_)) => Some('D'),
                _ => None,
            };
            ResolvedScore {
                match_id: match_id.clone(),
                home_score,
                away_score,
                source,
                total_goals,
                result,
            }
        })
        .collect()
}

fn incident_score_map(incidents: &[raw::Incident]) -> HashMap<String, (i64, i64)> {
    let mut out: HashMap<String, (i64, i64)> = HashMap::new();
    for incident in incidents {
        let (Some(h), Some(a)) = (incident.home_score, incident.away_score) else {
            continue;
        };
        let entry = out.entry(incident.match_id.clone()).or_insert((0, 0));
        entry.0 = entry.0.max(h as i64);
        entry.1 = entry.1.max(a as i64);
    }
    out
}

fn load_trusted(config: &Config) -> Result<HashMap<String, (i64, i64)>> {
    let path = config.trusted_scores_path();
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let table = Table::read_parquet(&path)?;
    let match_id = table.str_col("match_id")?;
    let home = table.f64_col("home_score")?;
    let away = table.f64_col("away_score")?;
    let mut out = HashMap::new();
    for row in 0..table.n_rows() {
        if let (Some(mid), Some(h), Some(a)) = (&match_id[row], home[row], away[row]) {
            out.insert(mid.clone(), (h as i64, a as i64));
        }
    }
    Ok(out)
}

pub fn build(config: &Config) -> Result<()> {
    let spine_rows = raw::load_match_index(&config.matches_index())
        .context("load match index spine")?;
    let spine: Vec<String> = spine_rows.into_iter().map(|m| m.match_id).collect();

    store::require_input(&config.incidents_path())?;
    let incidents = raw::load_incidents(&config.incidents_path())?;

    store::require_input(&config.appearances_path())?;
    let appearances = raw::load_appearances(&config.appearances_path())?;
    let with_appearances: HashSet<String> =
        appearances.into_iter().map(|a| a.match_id).collect();

    let inputs = ScoreInputs {
        trusted: load_trusted(config)?,
        from_incidents: incident_score_map(&incidents),
        with_appearances,
    };
    let resolved = resolve_scores(&spine, &inputs);

    let mut table = Table::new();
    table.add_str(
        "match_id",
        resolved.iter().map(|r| Some(r.match_id.clone())).collect(),
    );
    table.add_i64("home_score", resolved.iter().map(|r| r.home_score).collect());
    table.add_i64("away_score", resolved.iter().map(|r| r.away_score).collect());
    table.add_str(
        "score_source",
        resolved
            .iter()
            .map(|r| Some(r.source.as_str().to_string()))
            .collect(),
    );
    table.add_i64(
        "total_goals",
        resolved.iter().map(|r| r.total_goals).collect(),
    );
    table.add_str(
        "result",
        resolved
            .iter()
            .map(|r| r.result.map(|c| c.to_string()))
            .collect(),
    );
    store::save_artifact(config, store::MATCH_SCORES, &table)?;

    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    for r in &resolved {
        *counts.entry(r.source.as_str()).or_default() += 1;
    }
    let mut breakdown: Vec<(&str, usize)> = counts.into_iter().collect();
    breakdown.sort();
    println!("  score_source breakdown: {breakdown:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> ScoreInputs {
        let mut inputs = ScoreInputs::default();
        inputs.trusted.insert("1".into(), (2, 1));
        inputs.from_incidents.insert("1".into(), (3, 1));
        inputs.from_incidents.insert("2".into(), (0, 0));
        inputs.with_appearances.insert("1".into());
        inputs.with_appearances.insert("2".into());
        inputs
    }

    #[test]
    fn trusted_score_beats_incidents() {
        let rows = resolve_scores(&["1".into()], &inputs());
        assert_eq!(rows[0].home_score, Some(2));
        assert_eq!(rows[0].away_score, Some(1));
        assert_eq!(rows[0].source, ScoreSource::Original);
        assert_eq!(rows[0].result, Some('H'));
        assert_eq!(rows[0].total_goals, Some(3));
    }

    #[test]
    fn incident_zero_total_relabels_to_assumed() {
        let rows = resolve_scores(&["2".into()], &inputs());
        assert_eq!(rows[0].home_score, Some(0));
        assert_eq!(rows[0].away_score, Some(0));
        assert_eq!(rows[0].source, ScoreSource::ZeroZeroAssumed);
        assert_eq!(rows[0].result, Some('D'));
    }

    #[test]
    fn appearance_only_match_assumes_goalless() {
        let mut inputs = ScoreInputs::default();
        inputs.with_appearances.insert("7".into());
        let rows = resolve_scores(&["7".into()], &inputs);
        assert_eq!(rows[0].source, ScoreSource::ZeroZeroAssumed);
        assert_eq!(rows[0].total_goals, Some(0));
    }

    #[test]
    fn unknown_match_stays_unscraped_with_null_scores() {
        let rows = resolve_scores(&["9".into()], &ScoreInputs::default());
        assert_eq!(rows[0].home_score, None);
        assert_eq!(rows[0].away_score, None);
        assert_eq!(rows[0].source, ScoreSource::NotScraped);
        assert_eq!(rows[0].result, None);
        assert_eq!(rows[0].total_goals, None);
    }

    #[test]
    fn spine_is_covered_exactly_once_in_order() {
        let spine: Vec<String> = vec!["1".into(), "2".into(), "9".into()];
        let rows = resolve_scores(&spine, &inputs());
        let ids: Vec<&str> = rows.iter().map(|r| r.match_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "9"]);
    }

    #[test]
    fn incident_maximum_wins_per_side() {
        let incidents = vec![
            raw::Incident {
                match_id: "5".into(),
                player_id: None,
                season: None,
                competition_slug: None,
                incident_type: Some("goal".into()),
                incident_class: None,
                home_score: Some(1.0),
                away_score: Some(0.0),
            },
            raw::Incident {
                match_id: "5".into(),
                player_id: None,
                season: None,
                competition_slug: None,
                incident_type: Some("goal".into()),
                incident_class: None,
                home_score: Some(1.0),
                away_score: Some(2.0),
            },
        ];
        let map = incident_score_map(&incidents);
        assert_eq!(map.get("5"), Some(&(1, 2)));
    }
}
