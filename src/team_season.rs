use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};

use crate::config::Config;
use crate::raw;
use crate::store;
use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TeamAgg {
    /// Counting stat, summed across matches.
    Sum,
    /// Percentage/ratio stat, averaged across matches.
    Mean,
}

/// Raw stat name -> output column + aggregation. The raw CSV mixes plain
/// counts, "52%" percentages and "38/71 (54%)" ratios; parsing happens in
/// raw::parse_stat_value, this table only names what survives.
const TEAM_STATS: &[(&str, &str, TeamAgg)] = &[
    ("Expected goals", "xg_for_total", TeamAgg::Sum),
    ("Ball possession", "possession_avg", TeamAgg::Mean),
    ("Total shots", "shots_total", TeamAgg::Sum),
    ("Shots on target", "shots_on_target", TeamAgg::Sum),
    ("Shots off target", "shots_off_target", TeamAgg::Sum),
    ("Blocked shots", "blocked_shots", TeamAgg::Sum),
    ("Big chances", "big_chances_total", TeamAgg::Sum),
    ("Big chances scored", "big_chances_scored", TeamAgg::Sum),
    ("Big chances missed", "big_chances_missed", TeamAgg::Sum),
    ("Corner kicks", "corners_total", TeamAgg::Sum),
    ("Fouls", "fouls_total", TeamAgg::Sum),
    ("Free kicks", "free_kicks", TeamAgg::Sum),
    ("Offsides", "offsides", TeamAgg::Sum),
    ("Passes", "passes_total", TeamAgg::Sum),
    ("Accurate passes", "accurate_passes_total", TeamAgg::Sum),
    ("Long balls", "long_balls", TeamAgg::Sum),
    ("Crosses", "crosses", TeamAgg::Sum),
    ("Throw-ins", "throw_ins", TeamAgg::Sum),
    ("Touches in penalty area", "touches_penalty_area", TeamAgg::Sum),
    ("Final third entries", "final_third_entries", TeamAgg::Sum),
    ("Final third phase", "final_third_phase", TeamAgg::Mean),
    ("Duels", "duels", TeamAgg::Mean),
    ("Ground duels", "ground_duels", TeamAgg::Mean),
    ("Aerial duels", "aerial_duels", TeamAgg::Mean),
    ("Dribbles", "dribbles", TeamAgg::Mean),
    ("Dispossessed", "dispossessed", TeamAgg::Sum),
    ("Total tackles", "tackles_total", TeamAgg::Sum),
    ("Tackles won", "tackles_won", TeamAgg::Sum),
    ("Interceptions", "interceptions_total", TeamAgg::Sum),
    ("Recoveries", "recoveries_total", TeamAgg::Sum),
    ("Clearances", "clearances_total", TeamAgg::Sum),
    ("Errors lead to a shot", "errors_lead_to_shot", TeamAgg::Sum),
    ("Errors lead to a goal", "errors_lead_to_goal", TeamAgg::Sum),
    ("Total saves", "goalkeeper_saves_total", TeamAgg::Sum),
    ("Goals prevented", "goals_prevented", TeamAgg::Sum),
    ("High claims", "high_claims", TeamAgg::Sum),
    ("Punches", "punches", TeamAgg::Sum),
    ("Goal kicks", "goal_kicks", TeamAgg::Sum),
    ("Yellow cards", "yellow_cards_total", TeamAgg::Sum),
    ("Red cards", "red_cards_total", TeamAgg::Sum),
];

/// One team's side of one match, parsed from team_statistics.csv.
#[derive(Debug, Clone)]
struct MatchTeamRow {
    match_id: String,
    team_name: String,
    is_home: bool,
    values: HashMap<&'static str, f64>,
    xg_against: Option<f64>,
    xg_first_half: Option<f64>,
    xg_second_half: Option<f64>,
    shots_first_half: Option<f64>,
    shots_second_half: Option<f64>,
    goals_for: Option<i64>,
    goals_against: Option<i64>,
}

#[derive(Debug, Default)]
struct TeamAccum {
    matches_total: i64,
    matches_home: i64,
    matches_away: i64,
    sums: HashMap<&'static str, f64>,
    means: HashMap<&'static str, (f64, usize)>,
    xg_for_home: f64,
    xg_for_away: f64,
    xg_against_total: f64,
    goals_for: f64,
    goals_against: f64,
    xg_first_half: f64,
    xg_second_half: f64,
    shots_first_half: f64,
    shots_second_half: f64,
}

pub fn build(config: &Config) -> Result<()> {
    let matches = raw::load_match_index(&config.matches_index())
        .context("load match index")?;
    let meta: HashMap<&str, &raw::MatchIndexRow> =
        matches.iter().map(|m| (m.match_id.as_str(), m)).collect();

    let scores_path = store::artifact_path(config, store::MATCH_SCORES);
    store::require_input(&scores_path)?;
    let scores = Table::read_parquet(&scores_path)?;
    let score_ids = scores.str_col("match_id")?;
    let home_scores = scores.i64_col("home_score")?;
    let away_scores = scores.i64_col("away_score")?;
    let score_map: HashMap<&str, (Option<i64>, Option<i64>)> = score_ids
        .iter()
        .enumerate()
        .filter_map(|(i, id)| id.as_deref().map(|id| (id, (home_scores[i], away_scores[i]))))
        .collect();

    let mut skipped = 0usize;
    let mut rows: Vec<(String, String, MatchTeamRow)> = Vec::new();
    for (season, competition, match_id, dir) in raw::iter_raw_match_dirs(config) {
        let Some(m) = meta.get(match_id.as_str()) else {
            continue;
        };
        if m.season != season || m.competition_slug != competition {
            continue;
        }
        let stats_path = dir.join("team_statistics.csv");
        if !stats_path.exists() {
            continue;
        }
        let lines = match raw::read_team_statistics(&stats_path) {
            Ok(lines) => lines,
            Err(err) => {
                eprintln!("Skip {}: {err}", stats_path.display());
                skipped += 1;
                continue;
            }
        };
        let all = raw::period_stats(&lines, "ALL");
        if all.is_empty() {
            continue;
        }
        let first = raw::period_stats(&lines, "1ST");
        let second = raw::period_stats(&lines, "2ND");

        let (home_goals, away_goals) = score_map
            .get(match_id.as_str())
            .copied()
            .unwrap_or((None, None));

        let home_xg = all.get("Expected goals").and_then(|v| v.0);
        let away_xg = all.get("Expected goals").and_then(|v| v.1);

        for is_home in [true, false] {
            let pick = |cell: &(Option<f64>, Option<f64>)| if is_home { cell.0 } else { cell.1 };
            let mut values = HashMap::new();
            for (raw_name, out_name, _) in TEAM_STATS {
                if let Some(v) = all.get(*raw_name).and_then(|cell| pick(cell)) {
                    values.insert(*out_name, v);
                }
            }
            rows.push((
                season.clone(),
                competition.clone(),
                MatchTeamRow {
                    match_id: match_id.clone(),
                    team_name: if is_home {
                        m.home_team_name.clone()
                    } else {
                        m.away_team_name.clone()
                    },
                    is_home,
                    values,
                    xg_against: if is_home { away_xg } else { home_xg },
                    xg_first_half: first.get("Expected goals").map(pick).flatten(),
                    xg_second_half: second.get("Expected goals").map(pick).flatten(),
                    shots_first_half: first.get("Total shots").map(pick).flatten(),
                    shots_second_half: second.get("Total shots").map(pick).flatten(),
                    goals_for: if is_home { home_goals } else { away_goals },
                    goals_against: if is_home { away_goals } else { home_goals },
                },
            ));
        }
    }
    if skipped > 0 {
        eprintln!("  {skipped} unreadable team_statistics files skipped");
    }

    // Group by (team, season, competition); BTreeMap keeps output order stable.
    let mut groups: BTreeMap<(String, String, String), TeamAccum> = BTreeMap::new();
    for (season, competition, row) in rows {
        let acc = groups
            .entry((row.team_name.clone(), season, competition))
            .or_default();
        acc.matches_total += 1;
        if row.is_home {
            acc.matches_home += 1;
            acc.xg_for_home += row.values.get("xg_for_total").copied().unwrap_or(0.0);
        } else {
            acc.matches_away += 1;
            acc.xg_for_away += row.values.get("xg_for_total").copied().unwrap_or(0.0);
        }
        for (_, out_name, agg) in TEAM_STATS {
            let Some(v) = row.values.get(out_name).copied() else {
                continue;
            };
            match agg {
                TeamAgg::Sum => *acc.sums.entry(out_name).or_default() += v,
                TeamAgg::Mean => {
                    let slot = acc.means.entry(out_name).or_insert((0.0, 0));
                    slot.0 += v;
                    slot.1 += 1;
                }
            }
        }
        acc.xg_against_total += row.xg_against.unwrap_or(0.0);
        acc.goals_for += row.goals_for.unwrap_or(0) as f64;
        acc.goals_against += row.goals_against.unwrap_or(0) as f64;
        acc.xg_first_half += row.xg_first_half.unwrap_or(0.0);
        acc.xg_second_half += row.xg_second_half.unwrap_or(0.0);
        acc.shots_first_half += row.shots_first_half.unwrap_or(0.0);
        acc.shots_second_half += row.shots_second_half.unwrap_or(0.0);
    }

    let keys: Vec<&(String, String, String)> = groups.keys().collect();
    let mut table = Table::new();
    table.add_str(
        "team_name",
        keys.iter().map(|k| Some(k.0.clone())).collect(),
    );
    table.add_str("season", keys.iter().map(|k| Some(k.1.clone())).collect());
    table.add_str(
        "competition_slug",
        keys.iter().map(|k| Some(k.2.clone())).collect(),
    );
    let accs: Vec<&TeamAccum> = groups.values().collect();
    table.add_i64(
        "matches_total",
        accs.iter().map(|a| Some(a.matches_total)).collect(),
    );
    table.add_i64(
        "matches_home",
        accs.iter().map(|a| Some(a.matches_home)).collect(),
    );
    table.add_i64(
        "matches_away",
        accs.iter().map(|a| Some(a.matches_away)).collect(),
    );
    for (_, out_name, agg) in TEAM_STATS {
        match agg {
            TeamAgg::Sum => table.add_f64(
                *out_name,
                accs.iter()
                    .map(|a| Some(a.sums.get(out_name).copied().unwrap_or(0.0)))
                    .collect(),
            ),
            TeamAgg::Mean => table.add_f64(
                *out_name,
                accs.iter()
                    .map(|a| {
                        a.means
                            .get(out_name)
                            .filter(|(_, n)| *n > 0)
                            .map(|(sum, n)| sum / *n as f64)
                    })
                    .collect(),
            ),
        }
    }
    table.add_f64(
        "xg_for_home",
        accs.iter().map(|a| Some(a.xg_for_home)).collect(),
    );
    table.add_f64(
        "xg_for_away",
        accs.iter().map(|a| Some(a.xg_for_away)).collect(),
    );
    table.add_f64(
        "xg_against_total",
        accs.iter().map(|a| Some(a.xg_against_total)).collect(),
    );
    table.add_f64(
        "goals_for",
        accs.iter().map(|a| Some(a.goals_for)).collect(),
    );
    table.add_f64(
        "goals_against",
        accs.iter().map(|a| Some(a.goals_against)).collect(),
    );
    table.add_f64(
        "goal_diff",
        accs.iter()
            .map(|a| Some(a.goals_for - a.goals_against))
            .collect(),
    );
    table.add_f64(
        "xg_for_first_half",
        accs.iter().map(|a| Some(a.xg_first_half)).collect(),
    );
    table.add_f64(
        "xg_for_second_half",
        accs.iter().map(|a| Some(a.xg_second_half)).collect(),
    );
    table.add_f64(
        "shots_first_half",
        accs.iter().map(|a| Some(a.shots_first_half)).collect(),
    );
    table.add_f64(
        "shots_second_half",
        accs.iter().map(|a| Some(a.shots_second_half)).collect(),
    );
    table.add_f64(
        "pass_accuracy_avg",
        accs.iter()
            .map(|a| {
                let passes = a.sums.get("passes_total").copied().unwrap_or(0.0);
                let accurate = a.sums.get("accurate_passes_total").copied().unwrap_or(0.0);
                crate::stats::ratio(accurate, passes)
            })
            .collect(),
    );

    store::save_artifact(config, store::TEAM_SEASON_STATS, &table)
}
