use std::collections::{BTreeMap, HashMap};

use anyhow::Result;

use crate::config::Config;
use crate::raw;
use crate::store;
use crate::table::Table;

#[derive(Debug, Clone)]
struct ManagerMatchRow {
    match_id: String,
    manager_id: Option<i64>,
    manager_name: Option<String>,
    manager_slug: Option<String>,
    side: &'static str,
    team_name: String,
    season: String,
    competition_slug: String,
    result: String,
}

/// W/D/L from one side's perspective given the match result (H/D/A).
fn side_result(result: &str, is_home: bool) -> &'static str {
    match (result, is_home) {
        ("H", true) | ("A", false) => "W",
        ("H", false) | ("A", true) => "L",
        _ => "D",
    }
}

pub fn build(config: &Config) -> Result<()> {
    let matches = raw::load_match_index(&config.matches_index())?;
    let match_meta: HashMap<&str, &raw::MatchIndexRow> =
        matches.iter().map(|m| (m.match_id.as_str(), m)).collect();

    let scores = store::load_artifact(config, store::MATCH_SCORES)?;
    let ids = scores.str_col("match_id")?;
    let results = scores.str_col("result")?;
    let result_map: HashMap<&str, &str> = ids
        .iter()
        .zip(results)
        .filter_map(|(id, res)| match (id.as_deref(), res.as_deref()) {
            (Some(id), Some(res)) => Some((id, res)),
            _ => None,
        })
        .collect();

    let mut rows: Vec<ManagerMatchRow> = Vec::new();
    for (season, competition, match_id, dir) in raw::iter_raw_match_dirs(config) {
        let path = dir.join("managers.json");
        if !path.exists() {
            continue;
        }
        let Some(meta) = match_meta.get(match_id.as_str()) else {
            continue;
        };
        let managers = match raw::read_managers(&path) {
            Ok(managers) => managers,
            Err(err) => {
                eprintln!("Skip {}: {err}", path.display());
                continue;
            }
        };
        let result = result_map.get(match_id.as_str()).copied().unwrap_or("D");
        for (mgr, side, is_home) in [
            (managers.home_manager, "home", true),
            (managers.away_manager, "away", false),
        ] {
            let Some(mgr) = mgr else { continue };
            rows.push(ManagerMatchRow {
                match_id: match_id.clone(),
                manager_id: mgr.id,
                manager_name: mgr.name,
                manager_slug: mgr.slug,
                side,
                team_name: if is_home {
                    meta.home_team_name.clone()
                } else {
                    meta.away_team_name.clone()
                },
                season: season.clone(),
                competition_slug: competition.clone(),
                result: side_result(result, is_home).to_string(),
            });
        }
    }

    let mut table = Table::new();
    table.add_str(
        "match_id",
        rows.iter().map(|r| Some(r.match_id.clone())).collect(),
    );
    table.add_i64("manager_id", rows.iter().map(|r| r.manager_id).collect());
    table.add_str(
        "manager_name",
        rows.iter().map(|r| r.manager_name.clone()).collect(),
    );
    table.add_str(
        "manager_slug",
        rows.iter().map(|r| r.manager_slug.clone()).collect(),
    );
    table.add_str("side", rows.iter().map(|r| Some(r.side.to_string())).collect());
    table.add_str(
        "team_name",
        rows.iter().map(|r| Some(r.team_name.clone())).collect(),
    );
    table.add_str("season", rows.iter().map(|r| Some(r.season.clone())).collect());
    table.add_str(
        "competition_slug",
        rows.iter().map(|r| Some(r.competition_slug.clone())).collect(),
    );
    table.add_str("result", rows.iter().map(|r| Some(r.result.clone())).collect());
    store::save_artifact(config, store::MANAGERS, &table)?;

    // Career rollup per manager (rows without an id can't be attributed).
    #[derive(Default)]
    struct CareerAccum {
        manager_name: Option<String>,
        matches: Vec<String>,
        wins: i64,
        draws: i64,
        losses: i64,
        seasons: Vec<String>,
        competitions: Vec<String>,
        teams: Vec<String>,
    }
    let mut careers: BTreeMap<i64, CareerAccum> = BTreeMap::new();
    for row in &rows {
        let Some(manager_id) = row.manager_id else {
            continue;
        };
        let acc = careers.entry(manager_id).or_default();
        if acc.manager_name.is_none() {
            acc.manager_name = row.manager_name.clone();
        }
        acc.matches.push(row.match_id.clone());
        match row.result.as_str() {
            "W" => acc.wins += 1,
            "L" => acc.losses += 1,
            _ => acc.draws += 1,
        }
        acc.seasons.push(row.season.clone());
        acc.competitions.push(row.competition_slug.clone());
        acc.teams.push(row.team_name.clone());
    }

    fn joined(values: &[String]) -> String {
        let mut v = values.to_vec();
        v.sort();
        v.dedup();
        v.join(",")
    }

    let mut career = Table::new();
    career.add_i64(
        "manager_id",
        careers.keys().map(|id| Some(*id)).collect(),
    );
    career.add_str(
        "manager_name",
        careers.values().map(|a| a.manager_name.clone()).collect(),
    );
    career.add_i64(
        "total_matches",
        careers
            .values()
            .map(|a| {
                let mut m = a.matches.clone();
                m.sort();
                m.dedup();
                Some(m.len() as i64)
            })
            .collect(),
    );
    career.add_i64("wins", careers.values().map(|a| Some(a.wins)).collect());
    career.add_i64("draws", careers.values().map(|a| Some(a.draws)).collect());
    career.add_i64("losses", careers.values().map(|a| Some(a.losses)).collect());
    career.add_str(
        "seasons",
        careers.values().map(|a| Some(joined(&a.seasons))).collect(),
    );
    career.add_str(
        "competitions",
        careers
            .values()
            .map(|a| Some(joined(&a.competitions)))
            .collect(),
    );
    career.add_str(
        "teams",
        careers.values().map(|a| Some(joined(&a.teams))).collect(),
    );
    career.add_f64(
        "win_rate",
        careers
            .values()
            .map(|a| {
                let total = a.wins + a.draws + a.losses;
                if total > 0 {
                    Some(a.wins as f64 / total as f64)
                } else {
                    None
                }
            })
            .collect(),
    );
    store::save_artifact(config, store::MANAGER_CAREER_STATS, &career)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_results_flip_for_away() {
        assert_eq!(side_result("H", true), "W");
        assert_eq!(side_result("H", false), "L");
        assert_eq!(side_result("A", true), "L");
        assert_eq!(side_result("A", false), "W");
        assert_eq!(side_result("D", true), "D");
        assert_eq!(side_result("D", false), "D");
    }
}
