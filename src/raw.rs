use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::config::Config;
use crate::schema::{ALL_STAT_KEYS, StatKey};
use crate::table::Table;

/// Parse "23/56 (41%)" into (made, attempted, fraction).
pub fn parse_ratio(raw: &str) -> Option<(i64, i64, f64)> {
    let s = raw.trim();
    let (num_part, rest) = s.split_once('/')?;
    let made = num_part.trim().parse::<i64>().ok()?;
    let rest = rest.trim_start();
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let attempted = rest[..digits_end].parse::<i64>().ok()?;
    let tail = rest[digits_end..].trim_start();
    let inner = tail.strip_prefix('(')?;
    let pct_str = inner.split(')').next()?.trim().trim_end_matches('%').trim();
    let pct = pct_str.parse::<f64>().ok()?;
    Some((made, attempted, pct / 100.0))
}

/// Parse "52%" (or a bare 0-100 number carrying a percent meaning) into 0.52.
pub fn parse_pct(raw: &str) -> Option<f64> {
    let s = raw.trim().trim_end_matches('%').trim();
    if s.is_empty() {
        return None;
    }
    let v = s.parse::<f64>().ok()?;
    if v > 1.0 { Some(v / 100.0) } else { Some(v) }
}

/// Parse one team-statistics cell. Three raw shapes:
///   "38/71 (54%)" -> 0.54      (ratio; undefined when attempted == 0)
///   "52%"         -> 0.52      (only when '%' is present)
///   "7"           -> 7.0       (a bare count must never become 0.07)
pub fn parse_stat_value(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() || s == "-" {
        return None;
    }
    if let Some((_, attempted, fraction)) = parse_ratio(s) {
        return if attempted > 0 { Some(fraction) } else { None };
    }
    if s.contains('%') {
        return parse_pct(s);
    }
    s.parse::<f64>().ok()
}

// ---------------------------------------------------------------------------
// Index files
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MatchIndexRow {
    pub match_id: String,
    pub season: String,
    pub competition_slug: String,
    pub home_team_name: String,
    pub away_team_name: String,
    pub match_date: Option<i64>,
    pub round: Option<i64>,
}

/// The authoritative spine: every match ever indexed, one row each.
pub fn load_match_index(path: &Path) -> Result<Vec<MatchIndexRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open match index {}", path.display()))?;
    let headers = reader.headers().context("match index headers")?.clone();
    let col = |name: &str| headers.iter().position(|h| h == name);
    let (Some(id_idx), Some(season_idx), Some(comp_idx), Some(home_idx), Some(away_idx)) = (
        col("match_id"),
        col("season"),
        col("competition_slug"),
        col("home_team_name"),
        col("away_team_name"),
    ) else {
        bail!("match index {} missing required columns", path.display());
    };
    let date_idx = col("match_date");
    let round_idx = col("round");

    let mut out = Vec::new();
    for record in reader.records() {
        let record = record.context("read match index row")?;
        let match_id = record.get(id_idx).unwrap_or("").trim().to_string();
        if match_id.is_empty() {
            eprintln!("Skip match index row with empty match_id");
            continue;
        }
        out.push(MatchIndexRow {
            match_id,
            season: record.get(season_idx).unwrap_or("").trim().to_string(),
            competition_slug: record.get(comp_idx).unwrap_or("").trim().to_string(),
            home_team_name: record.get(home_idx).unwrap_or("").trim().to_string(),
            away_team_name: record.get(away_idx).unwrap_or("").trim().to_string(),
            match_date: date_idx
                .and_then(|i| record.get(i))
                .and_then(|s| s.trim().parse::<f64>().ok())
                .map(|v| v as i64),
            round: round_idx
                .and_then(|i| record.get(i))
                .and_then(|s| s.trim().parse::<i64>().ok()),
        });
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct PlayerIndexRow {
    pub player_id: i64,
    pub player_name: String,
    pub player_slug: Option<String>,
    pub player_short_name: Option<String>,
    pub n_matches: Option<i64>,
}

pub fn load_player_index(path: &Path) -> Result<Vec<PlayerIndexRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open player index {}", path.display()))?;
    let headers = reader.headers().context("player index headers")?.clone();
    let col = |name: &str| headers.iter().position(|h| h == name);
    let (Some(id_idx), Some(name_idx)) = (col("player_id"), col("player_name")) else {
        bail!("player index {} missing required columns", path.display());
    };
    let slug_idx = col("player_slug");
    let short_idx = col("player_short_name").or_else(|| col("player_shortName"));
    let n_idx = col("n_matches");

    let mut out = Vec::new();
    for record in reader.records() {
        let record = record.context("read player index row")?;
        let Some(player_id) = record
            .get(id_idx)
            .and_then(|s| s.trim().parse::<i64>().ok())
        else {
            eprintln!("Skip player index row with bad player_id");
            continue;
        };
        out.push(PlayerIndexRow {
            player_id,
            player_name: record.get(name_idx).unwrap_or("").trim().to_string(),
            player_slug: slug_idx
                .and_then(|i| record.get(i))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            player_short_name: short_idx
                .and_then(|i| record.get(i))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            n_matches: n_idx
                .and_then(|i| record.get(i))
                .and_then(|s| s.trim().parse::<i64>().ok()),
        });
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Derived parquet inputs (produced by the extraction collaborator)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Appearance {
    pub match_id: String,
    pub player_id: i64,
    pub player_name: String,
    pub player_short_name: Option<String>,
    pub player_position: Option<String>,
    pub season: String,
    pub competition_slug: String,
    pub side: Option<String>,
    pub substitute: bool,
    pub match_date: Option<i64>,
    pub date_of_birth: Option<i64>,
    pub stats: HashMap<StatKey, f64>,
}

impl Appearance {
    pub fn stat(&self, key: StatKey) -> Option<f64> {
        self.stats.get(&key).copied()
    }

    pub fn minutes(&self) -> f64 {
        self.stat(StatKey::Minutes).unwrap_or(0.0)
    }
}

fn string_col_lenient(table: &Table, name: &str) -> Result<Vec<Option<String>>> {
    if let Ok(col) = table.str_col(name) {
        return Ok(col.to_vec());
    }
    // Extraction sometimes writes id columns as integers.
    let col = table.i64_col(name)?;
    Ok(col.iter().map(|v| v.map(|n| n.to_string())).collect())
}

fn bool_col_lenient(table: &Table, name: &str) -> Result<Vec<Option<bool>>> {
    if let Ok(col) = table.bool_col(name) {
        return Ok(col.to_vec());
    }
    let col = table.f64_col(name)?;
    Ok(col.iter().map(|v| v.map(|n| n != 0.0)).collect())
}

fn i64_col_lenient(table: &Table, name: &str) -> Result<Vec<Option<i64>>> {
    let col = table.f64_col(name)?;
    Ok(col.iter().map(|v| v.map(|x| x as i64)).collect())
}

pub fn load_appearances(path: &Path) -> Result<Vec<Appearance>> {
    let table = Table::read_parquet(path)?;
    let n = table.n_rows();
    let match_id = string_col_lenient(&table, "match_id")?;
    let player_id = i64_col_lenient(&table, "player_id")?;
    let player_name = table.str_col("player_name")?.to_vec();
    let short_name = if table.has_column("player_shortName") {
        table.str_col("player_shortName")?.to_vec()
    } else {
        vec![None; n]
    };
    let position = if table.has_column("player_position") {
        table.str_col("player_position")?.to_vec()
    } else {
        vec![None; n]
    };
    let season = table.str_col("season")?.to_vec();
    let competition = table.str_col("competition_slug")?.to_vec();
    let side = if table.has_column("side") {
        table.str_col("side")?.to_vec()
    } else {
        vec![None; n]
    };
    let substitute = if table.has_column("substitute") {
        bool_col_lenient(&table, "substitute")?
    } else {
        vec![None; n]
    };
    let match_date = if table.has_column("match_date") {
        i64_col_lenient(&table, "match_date")?
    } else {
        vec![None; n]
    };
    let dob = if table.has_column("player_dateOfBirthTimestamp") {
        i64_col_lenient(&table, "player_dateOfBirthTimestamp")?
    } else {
        vec![None; n]
    };

    let mut stat_cols: Vec<(StatKey, Vec<Option<f64>>)> = Vec::new();
    for key in ALL_STAT_KEYS {
        if table.has_column(key.column()) {
            stat_cols.push((*key, table.f64_col(key.column())?));
        }
    }

    let mut out = Vec::with_capacity(n);
    for row in 0..n {
        let (Some(mid), Some(pid)) = (match_id[row].clone(), player_id[row]) else {
            eprintln!("Skip appearance row {row}: missing match_id or player_id");
            continue;
        };
        let mut stats = HashMap::new();
        for (key, col) in &stat_cols {
            if let Some(v) = col[row] {
                stats.insert(*key, v);
            }
        }
        out.push(Appearance {
            match_id: mid,
            player_id: pid,
            player_name: player_name[row].clone().unwrap_or_default(),
            player_short_name: short_name[row].clone(),
            player_position: position[row].clone(),
            season: season[row].clone().unwrap_or_default(),
            competition_slug: competition[row].clone().unwrap_or_default(),
            side: side[row].clone(),
            substitute: substitute[row].unwrap_or(false),
            match_date: match_date[row],
            date_of_birth: dob[row],
            stats,
        });
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct Incident {
    pub match_id: String,
    pub player_id: Option<i64>,
    pub season: Option<String>,
    pub competition_slug: Option<String>,
    pub incident_type: Option<String>,
    pub incident_class: Option<String>,
    pub home_score: Option<f64>,
    pub away_score: Option<f64>,
}

impl Incident {
    pub fn is_card(&self) -> bool {
        self.incident_type.as_deref() == Some("card")
    }

    pub fn card_class_contains(&self, needle: &str) -> bool {
        self.incident_class
            .as_deref()
            .is_some_and(|c| c.to_ascii_lowercase().contains(needle))
    }
}

pub fn load_incidents(path: &Path) -> Result<Vec<Incident>> {
    let table = Table::read_parquet(path)?;
    let n = table.n_rows();
    let match_id = string_col_lenient(&table, "match_id")?;
    let player_id = if table.has_column("player_id") {
        i64_col_lenient(&table, "player_id")?
    } else {
        vec![None; n]
    };
    let opt_str = |name: &str| -> Result<Vec<Option<String>>> {
        if table.has_column(name) {
            Ok(table.str_col(name)?.to_vec())
        } else {
            Ok(vec![None; n])
        }
    };
    let season = opt_str("season")?;
    let competition = opt_str("competition_slug")?;
    let incident_type = opt_str("incidentType")?;
    let incident_class = opt_str("incidentClass")?;
    let opt_f64 = |name: &str| -> Result<Vec<Option<f64>>> {
        if table.has_column(name) {
            table.f64_col(name)
        } else {
            Ok(vec![None; n])
        }
    };
    let home_score = opt_f64("homeScore")?;
    let away_score = opt_f64("awayScore")?;

    let mut out = Vec::with_capacity(n);
    for row in 0..n {
        let Some(mid) = match_id[row].clone() else {
            continue;
        };
        out.push(Incident {
            match_id: mid,
            player_id: player_id[row],
            season: season[row].clone(),
            competition_slug: competition[row].clone(),
            incident_type: incident_type[row].clone(),
            incident_class: incident_class[row].clone(),
            home_score: home_score[row],
            away_score: away_score[row],
        });
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Raw per-match sidecar files
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TeamStatLine {
    pub period: String,
    pub name: String,
    pub home: Option<f64>,
    pub away: Option<f64>,
}

/// One match's team_statistics.csv: period,name,home,away.
pub fn read_team_statistics(path: &Path) -> Result<Vec<TeamStatLine>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    let headers = reader.headers().context("team statistics headers")?.clone();
    let col = |name: &str| headers.iter().position(|h| h == name);
    let (Some(period_idx), Some(name_idx), Some(home_idx), Some(away_idx)) =
        (col("period"), col("name"), col("home"), col("away"))
    else {
        bail!("team statistics {} missing required columns", path.display());
    };
    let mut out = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("read row of {}", path.display()))?;
        out.push(TeamStatLine {
            period: record.get(period_idx).unwrap_or("").trim().to_string(),
            name: record.get(name_idx).unwrap_or("").trim().to_string(),
            home: record.get(home_idx).and_then(parse_stat_value),
            away: record.get(away_idx).and_then(parse_stat_value),
        });
    }
    Ok(out)
}

/// Per-period stat map, first occurrence wins on duplicate names.
pub fn period_stats(lines: &[TeamStatLine], period: &str) -> HashMap<String, (Option<f64>, Option<f64>)> {
    let mut out = HashMap::new();
    for line in lines.iter().filter(|l| l.period == period) {
        out.entry(line.name.clone())
            .or_insert((line.home, line.away));
    }
    out
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManagerRef {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ManagersFile {
    #[serde(rename = "homeManager")]
    pub home_manager: Option<ManagerRef>,
    #[serde(rename = "awayManager")]
    pub away_manager: Option<ManagerRef>,
}

pub fn read_managers(path: &Path) -> Result<ManagersFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphPoint {
    pub minute: Option<f64>,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GraphFile {
    #[serde(rename = "graphPoints", default)]
    pub graph_points: Vec<GraphPoint>,
}

pub fn read_graph(path: &Path) -> Result<GraphFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}

/// Sorted walk of the raw tree: (season, competition_slug, match_id, dir).
pub fn iter_raw_match_dirs(config: &Config) -> Vec<(String, String, String, PathBuf)> {
    let mut out = Vec::new();
    let raw = config.raw_dir();
    let Ok(seasons) = sorted_dirs(&raw) else {
        return out;
    };
    for season_dir in seasons {
        let season = dir_name(&season_dir);
        let club = season_dir.join("club");
        let Ok(comps) = sorted_dirs(&club) else {
            continue;
        };
        for comp_dir in comps {
            let competition = dir_name(&comp_dir);
            let Ok(matches) = sorted_dirs(&comp_dir) else {
                continue;
            };
            for match_dir in matches {
                let match_id = dir_name(&match_dir);
                out.push((season.clone(), competition.clone(), match_id, match_dir));
            }
        }
    }
    out
}

fn sorted_dirs(path: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_dir())
        .filter(|p| !dir_name(p).starts_with('.'))
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ratio_handles_spacing() {
        assert_eq!(parse_ratio("23/56 (41%)"), Some((23, 56, 0.41)));
        assert_eq!(parse_ratio("3/16 (19%)"), Some((3, 16, 0.19)));
        assert_eq!(parse_ratio("38 / 71 ( 54 %)"), Some((38, 71, 0.54)));
        assert_eq!(parse_ratio("52%"), None);
        assert_eq!(parse_ratio("7"), None);
    }

    #[test]
    fn parse_stat_value_never_percents_bare_counts() {
        assert_eq!(parse_stat_value("7"), Some(7.0));
        assert_eq!(parse_stat_value("345"), Some(345.0));
        assert_eq!(parse_stat_value("35%"), Some(0.35));
        assert_eq!(parse_stat_value("38/71 (54%)"), Some(0.54));
        assert_eq!(parse_stat_value("0/0 (0%)"), None);
        assert_eq!(parse_stat_value("-"), None);
        assert_eq!(parse_stat_value(""), None);
        assert_eq!(parse_stat_value("1.87"), Some(1.87));
    }

    #[test]
    fn graph_file_tolerates_missing_points() {
        let g: GraphFile = serde_json::from_str("{}").unwrap();
        assert!(g.graph_points.is_empty());
        let g: GraphFile =
            serde_json::from_str(r#"{"graphPoints":[{"minute":12,"value":-35}]}"#).unwrap();
        assert_eq!(g.graph_points[0].minute, Some(12.0));
        assert_eq!(g.graph_points[0].value, Some(-35.0));
    }

    #[test]
    fn managers_file_tolerates_partial_sides() {
        let m: ManagersFile =
            serde_json::from_str(r#"{"homeManager":{"id":9,"name":"A. Coach"}}"#).unwrap();
        assert_eq!(m.home_manager.as_ref().unwrap().id, Some(9));
        assert!(m.away_manager.is_none());
    }
}
