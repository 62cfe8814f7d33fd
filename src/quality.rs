use std::collections::HashSet;

use anyhow::Result;
use serde::Serialize;

use crate::config::Config;
use crate::percentiles::percentile_stat_names;
use crate::schema::{NEGATIVE_ALLOWED, PER90_STATS, POSITIONS, RATIO_STATS, VALUE_AVG_STATS};
use crate::store;
use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckStatus {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "WARN")]
    Warn,
    #[serde(rename = "FAIL")]
    Fail,
}

impl CheckStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Warn => "WARN",
            CheckStatus::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub artifact: String,
    pub check: String,
    pub status: CheckStatus,
    pub detail: String,
}

/// Accumulates PASS/WARN/FAIL rows across all artifact checks.
///
/// FAIL is reserved for violations that would make downstream analysis
/// wrong; WARN covers known, expected sparsity. Nothing is ever silently
/// corrected.
#[derive(Debug, Default)]
pub struct Report {
    results: Vec<CheckResult>,
}

impl Report {
    /// Record a FAIL-level check: FAIL when the condition is false.
    fn check(&mut self, artifact: &str, name: &str, condition: bool, detail: impl Into<String>) {
        self.results.push(CheckResult {
            artifact: artifact.to_string(),
            check: name.to_string(),
            status: if condition {
                CheckStatus::Pass
            } else {
                CheckStatus::Fail
            },
            detail: detail.into(),
        });
    }

    /// Record a WARN-level check: WARN when the condition is false.
    fn warn(&mut self, artifact: &str, name: &str, condition: bool, detail: impl Into<String>) {
        self.results.push(CheckResult {
            artifact: artifact.to_string(),
            check: name.to_string(),
            status: if condition {
                CheckStatus::Pass
            } else {
                CheckStatus::Warn
            },
            detail: detail.into(),
        });
    }

    fn fail(&mut self, artifact: &str, name: &str, detail: impl Into<String>) {
        self.results.push(CheckResult {
            artifact: artifact.to_string(),
            check: name.to_string(),
            status: CheckStatus::Fail,
            detail: detail.into(),
        });
    }

    pub fn results(&self) -> &[CheckResult] {
        &self.results
    }

    pub fn n_pass(&self) -> usize {
        self.count(CheckStatus::Pass)
    }

    pub fn n_warn(&self) -> usize {
        self.count(CheckStatus::Warn)
    }

    pub fn n_fail(&self) -> usize {
        self.count(CheckStatus::Fail)
    }

    fn count(&self, status: CheckStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn print(&self) {
        let artifact_width = self
            .results
            .iter()
            .map(|r| r.artifact.len())
            .max()
            .unwrap_or(0)
            + 2;
        let check_width = self
            .results
            .iter()
            .map(|r| r.check.len())
            .max()
            .unwrap_or(0)
            + 2;
        for r in &self.results {
            let label = format!("[{}]", r.status.as_str());
            let detail = if r.detail.is_empty() {
                String::new()
            } else {
                format!("  ({})", r.detail)
            };
            println!(
                "{:<7} {:<artifact_width$} {:<check_width$}{detail}",
                label, r.artifact, r.check
            );
        }
        println!();
        println!(
            "Summary: {} PASS, {} WARN, {} FAIL",
            self.n_pass(),
            self.n_warn(),
            self.n_fail()
        );
        if self.n_fail() > 0 {
            let spine_broken = self
                .results
                .iter()
                .any(|r| r.status == CheckStatus::Fail && r.check == "all_index_match_ids_present");
            if spine_broken {
                println!();
                println!("Remediation: processed artifacts are out of sync with the match index;");
                println!("  re-run from the scores step:  pitchline --from-step scores");
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "summary": {
                "pass": self.n_pass(),
                "warn": self.n_warn(),
                "fail": self.n_fail(),
            },
            "checks": self.results,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load(report: &mut Report, config: &Config, name: &str) -> Option<Table> {
    let path = store::artifact_path(config, name);
    if !path.exists() {
        report.fail(name, "file_exists", format!("Missing: {}", path.display()));
        return None;
    }
    match Table::read_parquet(&path) {
        Ok(table) => Some(table),
        Err(err) => {
            report.fail(name, "file_readable", format!("{err:#}"));
            None
        }
    }
}

fn present(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().collect()
}

fn in_range(values: &[Option<f64>], lo: f64, hi: f64) -> bool {
    present(values).iter().all(|v| *v >= lo && *v <= hi)
}

fn no_negatives(values: &[Option<f64>]) -> bool {
    present(values).iter().all(|v| *v >= 0.0)
}

fn null_rate(values_null: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        values_null as f64 / total as f64
    }
}

fn str_set(values: &[Option<String>]) -> HashSet<&str> {
    values.iter().flatten().map(|s| s.as_str()).collect()
}

// ---------------------------------------------------------------------------
// Per-artifact checks
// ---------------------------------------------------------------------------

fn check_scores(report: &mut Report, df: &Table, spine: &HashSet<String>) -> Result<()> {
    let f = store::MATCH_SCORES;
    let match_ids = df.str_col("match_id")?;
    report.check(
        f,
        "no_null_match_id",
        match_ids.iter().all(|m| m.is_some()),
        "",
    );

    let sources = df.str_col("score_source")?;
    let valid: HashSet<&str> = HashSet::from([
        "original",
        "derived_from_incidents",
        "zero_zero_assumed",
        "not_scraped",
    ]);
    let seen = str_set(sources);
    let unknown: Vec<&&str> = seen.iter().filter(|s| !valid.contains(*s)).collect();
    report.check(
        f,
        "score_source_values_valid",
        unknown.is_empty(),
        format!("{unknown:?}"),
    );

    let home = df.f64_col("home_score")?;
    let away = df.f64_col("away_score")?;
    report.check(f, "home_score_non_negative", no_negatives(&home), "");
    report.check(f, "away_score_non_negative", no_negatives(&away), "");
    report.check(
        f,
        "home_score_max_15",
        in_range(&home, 0.0, 15.0),
        format!("max={:?}", present(&home).iter().copied().reduce(f64::max)),
    );
    report.check(
        f,
        "away_score_max_15",
        in_range(&away, 0.0, 15.0),
        format!("max={:?}", present(&away).iter().copied().reduce(f64::max)),
    );

    let totals = df.f64_col("total_goals")?;
    let results = df.str_col("result")?;
    let mut total_mismatches = 0usize;
    let mut result_mismatches = 0usize;
    for i in 0..df.n_rows() {
        let (Some(h), Some(a)) = (home[i], away[i]) else {
            continue;
        };
        if totals[i] != Some(h + a) {
            total_mismatches += 1;
        }
        let expected = if h > a {
            "H"
        } else if h < a {
            "A"
        } else {
            "D"
        };
        if results[i].as_deref() != Some(expected) {
            result_mismatches += 1;
        }
    }
    report.check(
        f,
        "total_goals_consistent",
        total_mismatches == 0,
        format!("{total_mismatches} mismatches"),
    );
    report.check(
        f,
        "result_consistent_with_scores",
        result_mismatches == 0,
        format!("{result_mismatches} mismatches"),
    );

    let scraped = sources
        .iter()
        .filter(|s| s.as_deref() != Some("not_scraped"))
        .count();
    let coverage = if df.n_rows() > 0 {
        scraped as f64 / df.n_rows() as f64
    } else {
        0.0
    };
    report.warn(
        f,
        "coverage_gte_85pct",
        coverage >= 0.85,
        format!(
            "{:.1}% ({} not_scraped matches)",
            coverage * 100.0,
            df.n_rows() - scraped
        ),
    );

    // The pipeline's top invariant: every spine match resolved exactly once.
    let df_ids: HashSet<String> = match_ids.iter().flatten().cloned().collect();
    let missing = spine.difference(&df_ids).count();
    let extra = df_ids.difference(spine).count();
    let duplicated = match_ids.len() != df_ids.len();
    report.check(
        f,
        "all_index_match_ids_present",
        missing == 0 && extra == 0 && !duplicated,
        format!("missing={missing}, extra={extra}, duplicates={duplicated}"),
    );
    Ok(())
}

fn check_team_season(report: &mut Report, df: &Table) -> Result<()> {
    let f = store::TEAM_SEASON_STATS;
    let teams = df.str_col("team_name")?;
    let seasons = df.str_col("season")?;
    let comps = df.str_col("competition_slug")?;
    let mut keys = HashSet::new();
    let mut duplicate = false;
    for i in 0..df.n_rows() {
        if !keys.insert((teams[i].clone(), seasons[i].clone(), comps[i].clone())) {
            duplicate = true;
        }
    }
    report.check(f, "no_duplicate_team_season_comp", !duplicate, "");

    let total = df.f64_col("matches_total")?;
    let home = df.f64_col("matches_home")?;
    let away = df.f64_col("matches_away")?;
    let split_ok = (0..df.n_rows()).all(|i| match (home[i], away[i], total[i]) {
        (Some(h), Some(a), Some(t)) => h + a == t,
        _ => false,
    });
    report.check(f, "matches_home_plus_away_eq_total", split_ok, "");

    let xg_for = df.f64_col("xg_for_total")?;
    report.check(
        f,
        "xg_for_total_no_null",
        xg_for.iter().all(|v| v.is_some()),
        "",
    );
    report.check(f, "xg_for_total_non_negative", no_negatives(&xg_for), "");
    let goals_for = df.f64_col("goals_for")?;
    let goals_against = df.f64_col("goals_against")?;
    report.check(f, "goals_for_non_negative", no_negatives(&goals_for), "");
    report.check(
        f,
        "goals_against_non_negative",
        no_negatives(&goals_against),
        "",
    );
    let goal_diff = df.f64_col("goal_diff")?;
    let diff_ok = (0..df.n_rows()).all(|i| match (goals_for[i], goals_against[i], goal_diff[i]) {
        (Some(gf), Some(ga), Some(d)) => d == gf - ga,
        _ => false,
    });
    report.check(f, "goal_diff_correct", diff_ok, "");

    for col in ["pass_accuracy_avg", "possession_avg"] {
        if let Some(values) = df.f64_col_opt(col) {
            report.check(
                f,
                &format!("{col}_in_range_0_1"),
                in_range(&values, 0.0, 1.0),
                "",
            );
        }
    }

    if let (Some(xg_home), Some(xg_away)) =
        (df.f64_col_opt("xg_for_home"), df.f64_col_opt("xg_for_away"))
    {
        let bad = (0..df.n_rows())
            .filter(|i| {
                xg_home[*i].unwrap_or(0.0) + xg_away[*i].unwrap_or(0.0)
                    > xg_for[*i].unwrap_or(0.0) + 0.1
            })
            .count();
        report.warn(
            f,
            "xg_home_plus_away_lte_total",
            bad == 0,
            format!("{bad} rows exceed total"),
        );
    }
    Ok(())
}

fn check_match_summary(
    report: &mut Report,
    df: &Table,
    scores: &Table,
    spine: &HashSet<String>,
) -> Result<()> {
    let f = store::MATCH_SUMMARY;
    let ids = df.str_col("match_id")?;
    let df_ids: HashSet<String> = ids.iter().flatten().cloned().collect();
    let missing = spine.difference(&df_ids).count();
    let extra = df_ids.difference(spine).count();
    report.check(
        f,
        "all_index_match_ids_present",
        missing == 0 && extra == 0,
        format!("missing={missing}, extra={extra}"),
    );

    let home_team = df.str_col("home_team_name")?;
    let away_team = df.str_col("away_team_name")?;
    let same = (0..df.n_rows())
        .filter(|i| {
            matches!(
                (&home_team[*i], &away_team[*i]),
                (Some(h), Some(a)) if h.trim() == a.trim()
            )
        })
        .count();
    report.check(
        f,
        "home_away_team_names_differ",
        same == 0,
        format!("{same} rows with identical home/away team"),
    );

    // Scores must agree with the resolver's artifact row for row.
    let score_ids = scores.str_col("match_id")?;
    let score_home = scores.f64_col("home_score")?;
    let score_away = scores.f64_col("away_score")?;
    let score_map: std::collections::HashMap<&str, (Option<f64>, Option<f64>)> = score_ids
        .iter()
        .enumerate()
        .filter_map(|(i, id)| id.as_deref().map(|id| (id, (score_home[i], score_away[i]))))
        .collect();
    let home = df.f64_col("home_score")?;
    let away = df.f64_col("away_score")?;
    let mut mismatches = 0usize;
    for i in 0..df.n_rows() {
        let Some(id) = ids[i].as_deref() else { continue };
        let Some((h00, a00)) = score_map.get(id) else {
            continue;
        };
        if let (Some(h), Some(h0)) = (home[i], *h00)
            && h != h0
        {
            mismatches += 1;
            continue;
        }
        if let (Some(a), Some(a0)) = (away[i], *a00)
            && a != a0
        {
            mismatches += 1;
        }
    }
    report.check(
        f,
        "scores_consistent_with_resolver",
        mismatches == 0,
        format!("{mismatches} mismatches"),
    );

    let home_xg = df.f64_col("home_xg")?;
    let away_xg = df.f64_col("away_xg")?;
    let swing = df.f64_col("xg_swing")?;
    let swing_bad = (0..df.n_rows())
        .filter(|i| {
            matches!(
                (home_xg[*i], away_xg[*i], swing[*i]),
                (Some(h), Some(a), Some(s)) if (s - (h - a)).abs() > 0.001
            )
        })
        .count();
    report.warn(
        f,
        "xg_swing_consistent",
        swing_bad <= 5,
        format!("{swing_bad} rows with xg_swing != home_xg - away_xg"),
    );

    let over = df.f64_col("home_xg_overperformance")?;
    let over_bad = (0..df.n_rows())
        .filter(|i| {
            matches!(
                (home[*i], home_xg[*i], over[*i]),
                (Some(score), Some(xg), Some(op)) if (op - (score - xg)).abs() > 0.001
            )
        })
        .count();
    report.warn(
        f,
        "home_xg_overperformance_consistent",
        over_bad <= 5,
        format!("{over_bad} rows inconsistent"),
    );

    let null_xg = home_xg.iter().filter(|v| v.is_none()).count();
    let xg_rate = null_rate(null_xg, df.n_rows());
    report.warn(
        f,
        "null_home_xg_lt_25pct",
        xg_rate < 0.25,
        format!("{:.1}% null", xg_rate * 100.0),
    );
    let managers = df.str_col("home_manager_name")?;
    let null_mgr = managers.iter().filter(|v| v.is_none()).count();
    let mgr_rate = null_rate(null_mgr, df.n_rows());
    report.warn(
        f,
        "null_home_manager_lt_15pct",
        mgr_rate < 0.15,
        format!("{:.1}% null", mgr_rate * 100.0),
    );

    let seasons = df.str_col("season")?;
    let comps = df.str_col("competition_slug")?;
    let mut counts: std::collections::HashMap<(String, String), usize> =
        std::collections::HashMap::new();
    for i in 0..df.n_rows() {
        if let (Some(s), Some(c)) = (&seasons[i], &comps[i]) {
            *counts.entry((c.clone(), s.clone())).or_default() += 1;
        }
    }
    let over_limit = counts.values().filter(|n| **n > 600).count();
    report.check(
        f,
        "competition_season_count_plausible",
        over_limit == 0,
        format!("{over_limit} competition-seasons with >600 matches"),
    );
    Ok(())
}

fn check_player_season(report: &mut Report, df: &Table) -> Result<()> {
    let f = store::PLAYER_SEASON_STATS;
    let ids = df.i64_col("player_id")?;
    let seasons = df.str_col("season")?;
    let comps = df.str_col("competition_slug")?;
    let mut keys = HashSet::new();
    let mut duplicate = false;
    for i in 0..df.n_rows() {
        if !keys.insert((ids[i], seasons[i].clone(), comps[i].clone())) {
            duplicate = true;
        }
    }
    report.check(f, "no_duplicate_player_season_comp", !duplicate, "");

    let minutes = df.f64_col("total_minutes")?;
    report.check(
        f,
        "total_minutes_gte_1",
        present(&minutes).iter().all(|m| *m >= 1.0),
        format!(
            "min={:?}",
            present(&minutes).iter().copied().reduce(f64::min)
        ),
    );
    let sufficient = df.bool_col("sufficient_minutes")?;
    let flag_ok = (0..df.n_rows()).all(|i| match (minutes[i], sufficient[i]) {
        (Some(m), Some(flag)) => (m >= 450.0) == flag,
        _ => false,
    });
    report.check(f, "sufficient_minutes_flag_correct", flag_ok, "");

    let ratings = df.f64_col("avg_rating")?;
    report.check(
        f,
        "avg_rating_in_range_1_10",
        in_range(&ratings, 1.0, 10.0),
        "",
    );

    // Only the declared allow-list may go negative; everything else per-90
    // must be non-negative by construction.
    let mut bad_per90: Vec<&str> = Vec::new();
    for name in PER90_STATS.iter() {
        if NEGATIVE_ALLOWED.contains(name.as_str()) {
            continue;
        }
        if let Some(values) = df.f64_col_opt(name)
            && !no_negatives(&values)
        {
            bad_per90.push(name.as_str());
        }
    }
    report.check(
        f,
        "all_per90_non_negative",
        bad_per90.is_empty(),
        format!("negative values in: {:?}", &bad_per90[..bad_per90.len().min(5)]),
    );

    let mut bad_rate: Vec<&str> = Vec::new();
    for spec in RATIO_STATS {
        if let Some(values) = df.f64_col_opt(spec.name)
            && !in_range(&values, 0.0, 1.0)
        {
            bad_rate.push(spec.name);
        }
    }
    report.check(
        f,
        "rate_cols_in_range_0_1",
        bad_rate.is_empty(),
        format!("out-of-range: {bad_rate:?}"),
    );

    for (_, col) in VALUE_AVG_STATS {
        report.check(f, &format!("column_{col}_exists"), df.has_column(col), "");
    }

    let goals = df.f64_col("goals")?;
    report.check(
        f,
        "goals_in_range_0_50",
        in_range(&goals, 0.0, 50.0),
        format!("max={:?}", present(&goals).iter().copied().reduce(f64::max)),
    );
    let null_ratings = ratings.iter().filter(|v| v.is_none()).count();
    let rate = null_rate(null_ratings, df.n_rows());
    report.warn(
        f,
        "null_avg_rating_lt_5pct",
        rate < 0.05,
        format!("{:.1}% null", rate * 100.0),
    );
    Ok(())
}

fn check_player_career(report: &mut Report, df: &Table, season: &Table) -> Result<()> {
    let f = store::PLAYER_CAREER_STATS;
    let ids = df.i64_col("player_id")?;
    let unique: HashSet<_> = ids.iter().flatten().collect();
    report.check(f, "no_duplicate_player_id", unique.len() == ids.len(), "");

    let season_ids: HashSet<i64> = season.i64_col("player_id")?.iter().flatten().copied().collect();
    let orphans = ids
        .iter()
        .flatten()
        .filter(|id| !season_ids.contains(id))
        .count();
    report.check(
        f,
        "all_player_ids_in_season_stats",
        orphans == 0,
        format!("{orphans} career ids missing from season stats"),
    );

    let minutes = df.f64_col("total_minutes")?;
    let sufficient = df.bool_col("sufficient_minutes")?;
    let flag_ok = (0..df.n_rows()).all(|i| match (minutes[i], sufficient[i]) {
        (Some(m), Some(flag)) => (m >= 900.0) == flag,
        _ => false,
    });
    report.check(f, "sufficient_minutes_flag_correct", flag_ok, "");

    let first = df.str_col("first_season")?;
    let last = df.str_col("last_season")?;
    let order_ok = (0..df.n_rows()).all(|i| match (&first[i], &last[i]) {
        (Some(a), Some(b)) => a <= b,
        _ => true,
    });
    report.check(f, "first_season_lte_last_season", order_ok, "");
    let n_seasons = df.f64_col("n_seasons")?;
    report.check(
        f,
        "n_seasons_gte_1",
        present(&n_seasons).iter().all(|n| *n >= 1.0),
        "",
    );
    let n_comps = df.f64_col("n_competitions")?;
    report.check(
        f,
        "n_competitions_gte_1",
        present(&n_comps).iter().all(|n| *n >= 1.0),
        "",
    );

    // Cross-artifact: career totals must reconcile with season totals.
    let mut season_goals: std::collections::HashMap<i64, i64> = std::collections::HashMap::new();
    let s_ids = season.i64_col("player_id")?;
    let s_goals = season.i64_col("goals")?;
    for i in 0..season.n_rows() {
        if let (Some(id), Some(g)) = (s_ids[i], s_goals[i]) {
            *season_goals.entry(id).or_default() += g;
        }
    }
    let career_goals = df.i64_col("goals")?;
    let mut mismatches = 0usize;
    for i in 0..df.n_rows() {
        if let (Some(id), Some(g)) = (ids[i], career_goals[i])
            && season_goals.get(&id).copied().unwrap_or(0) != g
        {
            mismatches += 1;
        }
    }
    report.check(
        f,
        "career_goals_eq_sum_of_season_goals",
        mismatches == 0,
        format!("{mismatches} mismatches"),
    );

    for col in ["goals_per90", "assists_per90"] {
        if let Some(values) = df.f64_col_opt(col) {
            report.check(f, &format!("{col}_non_negative"), no_negatives(&values), "");
        }
    }
    Ok(())
}

fn check_benchmarks(report: &mut Report, df: &Table) -> Result<()> {
    let f = store::COMPETITION_BENCHMARKS;
    let p25 = df.f64_col("p25")?;
    let median = df.f64_col("median")?;
    let p75 = df.f64_col("p75")?;
    let p90 = df.f64_col("p90")?;
    let eps = 1e-9;
    let count_violations = |lo: &[Option<f64>], hi: &[Option<f64>]| {
        (0..df.n_rows())
            .filter(|i| {
                matches!((lo[*i], hi[*i]), (Some(a), Some(b)) if a > b + eps)
            })
            .count()
    };
    let v1 = count_violations(&p25, &median);
    report.check(f, "p25_lte_median", v1 == 0, format!("{v1} violations"));
    let v2 = count_violations(&median, &p75);
    report.check(f, "median_lte_p75", v2 == 0, format!("{v2} violations"));
    let v3 = count_violations(&p75, &p90);
    report.check(f, "p75_lte_p90", v3 == 0, format!("{v3} violations"));

    let n_players = df.f64_col("n_players")?;
    report.check(
        f,
        "n_players_gte_2",
        present(&n_players).iter().all(|n| *n >= 2.0),
        "",
    );
    let positions = df.str_col("player_position")?;
    let valid: HashSet<&str> = POSITIONS.iter().copied().collect();
    let unknown: Vec<&str> = str_set(positions)
        .into_iter()
        .filter(|p| !valid.contains(p))
        .collect();
    report.check(
        f,
        "player_position_values_valid",
        unknown.is_empty(),
        format!("{unknown:?}"),
    );

    let mean = df.f64_col("mean")?;
    let mean_below = (0..df.n_rows())
        .filter(|i| matches!((mean[*i], p25[*i]), (Some(m), Some(q)) if m < q))
        .count();
    report.warn(
        f,
        "mean_gte_p25_for_all_rows",
        mean_below == 0,
        format!("{mean_below} rows (expected for left-skewed sparse GK stats)"),
    );
    Ok(())
}

fn check_percentiles(report: &mut Report, df: &Table, season: &Table) -> Result<()> {
    let f = store::PLAYER_PERCENTILE_RANKS;
    let in_comp = df.f64_col("pct_in_competition")?;
    report.check(
        f,
        "pct_in_competition_range_0_100",
        in_range(&in_comp, 0.0, 100.0),
        "",
    );
    let global = df.f64_col("pct_global")?;
    report.check(f, "pct_global_range_0_100", in_range(&global, 0.0, 100.0), "");
    let null_global = global.iter().filter(|v| v.is_none()).count();
    report.warn(
        f,
        "null_pct_global_lt_10_rows",
        null_global < 10,
        format!("{null_global} null pct_global rows"),
    );

    let season_ids: HashSet<i64> = season.i64_col("player_id")?.iter().flatten().copied().collect();
    let ids = df.i64_col("player_id")?;
    let orphans = ids
        .iter()
        .flatten()
        .filter(|id| !season_ids.contains(id))
        .count();
    report.check(
        f,
        "all_player_ids_in_season_stats",
        orphans == 0,
        format!("{orphans} ids missing from season stats"),
    );

    let known: HashSet<String> = percentile_stat_names().into_iter().collect();
    let stat_names = df.str_col("stat_name")?;
    let unknown: Vec<&str> = str_set(stat_names)
        .into_iter()
        .filter(|s| !known.contains(*s))
        .collect();
    report.check(
        f,
        "stat_names_in_catalog",
        unknown.is_empty(),
        format!("unknown: {:?}", &unknown[..unknown.len().min(5)]),
    );
    Ok(())
}

fn check_rolling_form(report: &mut Report, df: &Table) -> Result<()> {
    let f = store::PLAYER_ROLLING_FORM;
    let windows = df.f64_col("window")?;
    let valid = present(&windows)
        .iter()
        .all(|w| *w == 5.0 || *w == 10.0 || *w == 20.0);
    report.check(f, "window_values_valid", valid, "");

    let ids = df.i64_col("player_id")?;
    let mut keys = HashSet::new();
    let mut duplicate = false;
    for i in 0..df.n_rows() {
        if !keys.insert((ids[i], windows[i].map(|w| w as i64))) {
            duplicate = true;
        }
    }
    report.check(f, "no_duplicate_player_window", !duplicate, "");

    let available = df.f64_col("n_available")?;
    let within = (0..df.n_rows()).all(|i| match (available[i], windows[i]) {
        (Some(n), Some(w)) => n <= w,
        _ => false,
    });
    report.check(f, "n_available_lte_window", within, "");

    let ratings = df.f64_col("avg_rating")?;
    report.check(
        f,
        "avg_rating_in_range_1_10",
        in_range(&ratings, 1.0, 10.0),
        "",
    );
    let minutes = df.f64_col("total_minutes")?;
    report.check(f, "total_minutes_non_negative", no_negatives(&minutes), "");
    Ok(())
}

fn check_scouting(report: &mut Report, df: &Table, career: &Table) -> Result<()> {
    let f = store::PLAYER_SCOUTING_PROFILES;
    let ids = df.i64_col("player_id")?;
    let unique: HashSet<_> = ids.iter().flatten().collect();
    report.check(f, "no_duplicate_player_id", unique.len() == ids.len(), "");

    // The profile spine is the tracked-player index; careers only cover
    // players with recorded minutes, so a gap is expected, not an error.
    let career_ids: HashSet<i64> = career.i64_col("player_id")?.iter().flatten().copied().collect();
    let untracked = ids
        .iter()
        .flatten()
        .filter(|id| !career_ids.contains(id))
        .count();
    report.warn(
        f,
        "all_player_ids_in_career_stats",
        untracked == 0,
        format!("{untracked} tracked players with no appearance data (expected)"),
    );

    if let Some(ages) = df.f64_col_opt("age_today") {
        report.check(f, "age_today_in_range_15_60", in_range(&ages, 15.0, 60.0), "");
    }
    let flags = df.bool_col("sufficient_minutes_latest_season")?;
    report.check(
        f,
        "sufficient_minutes_latest_season_no_null",
        flags.iter().all(|v| v.is_some()),
        "",
    );

    let active = df.bool_col("active")?;
    let latest = df.str_col("latest_season")?;
    let active_total = active.iter().filter(|v| **v == Some(true)).count();
    let active_without_latest = (0..df.n_rows())
        .filter(|i| active[*i] == Some(true) && latest[*i].is_none())
        .count();
    let ratio = if active_total > 0 {
        active_without_latest as f64 / active_total as f64
    } else {
        0.0
    };
    report.warn(
        f,
        "active_players_with_no_latest_season_lt_40pct",
        ratio < 0.40,
        format!(
            "{active_without_latest} active players without a qualifying season (expected for low-minute players)"
        ),
    );
    Ok(())
}

fn check_progression(report: &mut Report, df: &Table) -> Result<()> {
    let f = store::PLAYER_PROGRESSION;
    let from = df.str_col("season_from")?;
    let to = df.str_col("season_to")?;
    let backward = (0..df.n_rows())
        .filter(|i| matches!((&from[*i], &to[*i]), (Some(a), Some(b)) if a > b))
        .count();
    report.warn(
        f,
        "season_from_lte_season_to",
        backward == 0,
        format!("{backward} backward violations (same-season pairs expected)"),
    );

    let directions = df.str_col("progression_direction")?;
    let valid: HashSet<&str> = HashSet::from(["improving", "declining", "stable"]);
    let unknown: Vec<&str> = str_set(directions)
        .into_iter()
        .filter(|d| !valid.contains(*d))
        .collect();
    report.check(
        f,
        "progression_direction_values_valid",
        unknown.is_empty(),
        format!("{unknown:?}"),
    );
    report.check(
        f,
        "goalAssist_per90_delta_column_exists",
        df.has_column("goalAssist_per90_delta"),
        "",
    );
    if let Some(deltas) = df.f64_col_opt("avg_rating_delta") {
        let nulls = deltas.iter().filter(|v| v.is_none()).count();
        let rate = null_rate(nulls, df.n_rows());
        report.warn(
            f,
            "null_avg_rating_delta_lt_30pct",
            rate < 0.30,
            format!("{:.1}% null", rate * 100.0),
        );
    }
    Ok(())
}

fn check_consistency(report: &mut Report, df: &Table) -> Result<()> {
    let f = store::PLAYER_CONSISTENCY;
    let n = df.f64_col("n_appearances")?;
    report.check(
        f,
        "n_appearances_gte_5",
        present(&n).iter().all(|v| *v >= 5.0),
        format!("min={:?}", present(&n).iter().copied().reduce(f64::min)),
    );
    let tiers = df.str_col("consistency_tier")?;
    let valid: HashSet<&str> =
        HashSet::from(["very_consistent", "consistent", "variable", "very_variable"]);
    let unknown: Vec<&str> = str_set(tiers)
        .into_iter()
        .filter(|t| !valid.contains(*t))
        .collect();
    report.check(
        f,
        "consistency_tier_values_valid",
        unknown.is_empty(),
        format!("{unknown:?}"),
    );
    for col in ["rating_cv", "rating_std"] {
        if let Some(values) = df.f64_col_opt(col) {
            report.check(f, &format!("{col}_non_negative"), no_negatives(&values), "");
        }
    }
    Ok(())
}

fn check_opponent_context(report: &mut Report, df: &Table, season: &Table) -> Result<()> {
    let f = store::PLAYER_OPPONENT_CONTEXT;
    let tiers = df.str_col("opponent_tier")?;
    let valid: HashSet<&str> = HashSet::from(["top_third", "mid_third", "bottom_third"]);
    let unknown: Vec<&str> = str_set(tiers)
        .into_iter()
        .filter(|t| !valid.contains(*t))
        .collect();
    report.check(
        f,
        "opponent_tier_values_valid",
        unknown.is_empty(),
        format!("{unknown:?}"),
    );
    let null_tiers = tiers.iter().filter(|t| t.is_none()).count();
    report.check(
        f,
        "no_null_opponent_tier",
        null_tiers == 0,
        format!("{null_tiers} nulls"),
    );

    let season_ids: HashSet<i64> = season.i64_col("player_id")?.iter().flatten().copied().collect();
    let ids = df.i64_col("player_id")?;
    let orphans = ids
        .iter()
        .flatten()
        .filter(|id| !season_ids.contains(id))
        .count();
    report.check(
        f,
        "all_player_ids_in_season_stats",
        orphans == 0,
        format!("{orphans} ids missing from season stats"),
    );

    // Coverage of qualifying season rows by at least one tier split.
    let s_ids = season.i64_col("player_id")?;
    let s_season = season.str_col("season")?;
    let s_comp = season.str_col("competition_slug")?;
    let s_sufficient = season.bool_col("sufficient_minutes")?;
    let o_season = df.str_col("season")?;
    let o_comp = df.str_col("competition_slug")?;
    let covered: HashSet<(Option<i64>, Option<String>, Option<String>)> = (0..df.n_rows())
        .map(|i| (ids[i], o_season[i].clone(), o_comp[i].clone()))
        .collect();
    let mut qualifying = 0usize;
    let mut hit = 0usize;
    for i in 0..season.n_rows() {
        if s_sufficient[i] != Some(true) {
            continue;
        }
        qualifying += 1;
        if covered.contains(&(s_ids[i], s_season[i].clone(), s_comp[i].clone())) {
            hit += 1;
        }
    }
    let coverage = if qualifying > 0 {
        hit as f64 / qualifying as f64
    } else {
        1.0
    };
    report.warn(
        f,
        "sufficient_minutes_players_coverage_gte_80pct",
        coverage >= 0.80,
        format!("{:.1}% covered ({} uncovered)", coverage * 100.0, qualifying - hit),
    );
    Ok(())
}

fn check_substitutions(report: &mut Report, df: &Table) -> Result<()> {
    let f = store::SUBSTITUTION_IMPACT;
    if df.is_empty() {
        report.warn(f, "has_rows", false, "table is empty");
        return Ok(());
    }
    let minutes = df.f64_col("minutes_after_sub")?;
    report.check(
        f,
        "minutes_after_sub_gt_0",
        present(&minutes).iter().all(|m| *m > 0.0),
        "",
    );
    let sub_minute = df.f64_col("sub_minute")?;
    report.check(
        f,
        "sub_minute_in_range_0_120",
        in_range(&sub_minute, 0.0, 120.0),
        "",
    );
    let out_ids = df.i64_col("player_out_id")?;
    let all_null = out_ids.iter().all(|v| v.is_none());
    report.warn(
        f,
        "player_out_id_null_documented",
        all_null,
        "player_out_id always null (source has no sub incidents) — expected",
    );
    let ratings = df.f64_col("player_in_rating")?;
    let nulls = ratings.iter().filter(|v| v.is_none()).count();
    let rate = null_rate(nulls, df.n_rows());
    report.warn(
        f,
        "null_player_in_rating_lt_65pct",
        rate < 0.65,
        format!("{:.1}% null player_in_rating", rate * 100.0),
    );
    Ok(())
}

fn check_momentum(
    report: &mut Report,
    df: &Table,
    summary: &Table,
    scores: &Table,
) -> Result<()> {
    let f = store::MATCH_MOMENTUM;
    let minutes = df.f64_col("minute")?;
    report.check(f, "minute_in_range_0_130", in_range(&minutes, 0.0, 130.0), "");
    let periods = df.str_col("period")?;
    let unknown: Vec<&str> = str_set(periods)
        .into_iter()
        .filter(|p| *p != "1ST" && *p != "2ND")
        .collect();
    report.check(f, "period_values_valid", unknown.is_empty(), format!("{unknown:?}"));
    let ids = df.str_col("match_id")?;
    report.check(f, "no_null_match_id", ids.iter().all(|m| m.is_some()), "");

    let score_ids = scores.str_col("match_id")?;
    let sources = scores.str_col("score_source")?;
    let scored: HashSet<&str> = score_ids
        .iter()
        .zip(sources)
        .filter_map(|(id, src)| match (id.as_deref(), src.as_deref()) {
            (Some(id), Some(src)) if src != "not_scraped" => Some(id),
            _ => None,
        })
        .collect();
    let summary_ids: HashSet<&str> = summary
        .str_col("match_id")?
        .iter()
        .flatten()
        .map(|s| s.as_str())
        .collect();
    let coverage = if scored.is_empty() {
        1.0
    } else {
        scored.iter().filter(|id| summary_ids.contains(*id)).count() as f64 / scored.len() as f64
    };
    report.warn(
        f,
        "momentum_summary_coverage_gte_95pct",
        coverage >= 0.95,
        format!("{:.1}% of scored matches have momentum data", coverage * 100.0),
    );

    let halftime = summary.f64_col("halftime_momentum")?;
    report.check(
        f,
        "momentum_summary_no_null_halftime",
        halftime.iter().all(|v| v.is_some()),
        "",
    );
    Ok(())
}

fn check_managers(report: &mut Report, df: &Table, career: &Table) -> Result<()> {
    let f = store::MANAGERS;
    let results = df.str_col("result")?;
    let valid: HashSet<&str> = HashSet::from(["W", "D", "L"]);
    let unknown: Vec<&str> = str_set(results)
        .into_iter()
        .filter(|r| !valid.contains(*r))
        .collect();
    report.check(f, "result_values_valid", unknown.is_empty(), format!("{unknown:?}"));
    let ids = df.i64_col("manager_id")?;
    let nulls = ids.iter().filter(|v| v.is_none()).count();
    report.warn(
        f,
        "null_manager_id_lt_10",
        nulls < 10,
        format!("{nulls} null manager_id rows"),
    );

    if !career.is_empty() {
        let wins = career.f64_col("wins")?;
        let draws = career.f64_col("draws")?;
        let losses = career.f64_col("losses")?;
        let total = career.f64_col("total_matches")?;
        let mismatches = (0..career.n_rows())
            .filter(|i| {
                match (wins[*i], draws[*i], losses[*i], total[*i]) {
                    (Some(w), Some(d), Some(l), Some(t)) => w + d + l != t,
                    _ => true,
                }
            })
            .count();
        report.check(
            f,
            "wins_draws_losses_eq_total_matches",
            mismatches == 0,
            format!("{mismatches} mismatches"),
        );
        let win_rate = career.f64_col("win_rate")?;
        report.check(f, "win_rate_in_range_0_1", in_range(&win_rate, 0.0, 1.0), "");
    }
    Ok(())
}

fn check_tactical(report: &mut Report, df: &Table, team_season: &Table) -> Result<()> {
    let f = store::TEAM_TACTICAL_PROFILES;
    let teams = df.str_col("team_name")?;
    let seasons = df.str_col("season")?;
    let comps = df.str_col("competition_slug")?;
    let mut keys = HashSet::new();
    let mut duplicate = false;
    for i in 0..df.n_rows() {
        if !keys.insert((teams[i].clone(), seasons[i].clone(), comps[i].clone())) {
            duplicate = true;
        }
    }
    report.check(f, "no_duplicate_team_season_comp", !duplicate, "");

    let mut bad_pct: Vec<String> = Vec::new();
    for name in df.column_names() {
        if !name.ends_with("_pct") {
            continue;
        }
        if let Some(values) = df.f64_col_opt(name)
            && !in_range(&values, 0.0, 1.0)
        {
            bad_pct.push(name.to_string());
        }
    }
    report.check(
        f,
        "all_pct_cols_in_range_0_1",
        bad_pct.is_empty(),
        format!("out-of-range: {bad_pct:?}"),
    );

    let known_teams = str_set(team_season.str_col("team_name")?);
    let stale = str_set(teams)
        .into_iter()
        .filter(|t| !known_teams.contains(t))
        .count();
    report.warn(
        f,
        "team_names_all_in_team_season_stats",
        stale == 0,
        format!("{stale} team(s) unknown to team-season stats — re-run from team-season"),
    );
    Ok(())
}

fn check_age_curves(report: &mut Report, df: &Table, peak: &Table) -> Result<()> {
    let f = store::PLAYER_AGE_CURVES;
    let bins = df.f64_col("age_bin")?;
    report.check(f, "age_bin_in_range_16_45", in_range(&bins, 16.0, 45.0), "");
    let n = df.f64_col("n_player_seasons")?;
    let reliable = df.bool_col("reliable")?;
    let flag_ok = (0..df.n_rows()).all(|i| match (n[i], reliable[i]) {
        (Some(count), Some(flag)) => (count >= 20.0) == flag,
        _ => false,
    });
    report.check(f, "reliable_flag_correct", flag_ok, "");
    report.check(
        f,
        "peak_age_covers_positions",
        peak.n_rows() == POSITIONS.len(),
        format!("found {} rows (expected {}: G/D/M/F)", peak.n_rows(), POSITIONS.len()),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Load every artifact fresh from disk and run its checks. A missing or
/// unreadable artifact fails its own file check; everything downstream of it
/// is simply skipped.
pub fn run(config: &Config) -> Result<Report> {
    let mut report = Report::default();

    let spine: HashSet<String> = match crate::raw::load_match_index(&config.matches_index()) {
        Ok(rows) => rows.into_iter().map(|m| m.match_id).collect(),
        Err(err) => {
            report.fail("index/matches.csv", "file_exists", format!("{err:#}"));
            HashSet::new()
        }
    };

    let scores = load(&mut report, config, store::MATCH_SCORES);
    let team_season = load(&mut report, config, store::TEAM_SEASON_STATS);
    let summary = load(&mut report, config, store::MATCH_SUMMARY);
    let player_season = load(&mut report, config, store::PLAYER_SEASON_STATS);
    let career = load(&mut report, config, store::PLAYER_CAREER_STATS);
    let benchmarks = load(&mut report, config, store::COMPETITION_BENCHMARKS);
    let percentiles = load(&mut report, config, store::PLAYER_PERCENTILE_RANKS);
    let rolling = load(&mut report, config, store::PLAYER_ROLLING_FORM);
    let scouting = load(&mut report, config, store::PLAYER_SCOUTING_PROFILES);
    let progression = load(&mut report, config, store::PLAYER_PROGRESSION);
    let consistency = load(&mut report, config, store::PLAYER_CONSISTENCY);
    let opponent = load(&mut report, config, store::PLAYER_OPPONENT_CONTEXT);
    let substitutions = load(&mut report, config, store::SUBSTITUTION_IMPACT);
    let momentum = load(&mut report, config, store::MATCH_MOMENTUM);
    let momentum_summary = load(&mut report, config, store::MATCH_MOMENTUM_SUMMARY);
    let managers = load(&mut report, config, store::MANAGERS);
    let manager_career = load(&mut report, config, store::MANAGER_CAREER_STATS);
    let tactical = load(&mut report, config, store::TEAM_TACTICAL_PROFILES);
    let age_curves = load(&mut report, config, store::PLAYER_AGE_CURVES);
    let peak_age = load(&mut report, config, store::PEAK_AGE_BY_POSITION);

    if let Some(df) = &scores {
        check_scores(&mut report, df, &spine)?;
    }
    if let Some(df) = &team_season {
        check_team_season(&mut report, df)?;
    }
    if let (Some(df), Some(scores)) = (&summary, &scores) {
        check_match_summary(&mut report, df, scores, &spine)?;
    }
    if let Some(df) = &player_season {
        check_player_season(&mut report, df)?;
    }
    if let (Some(df), Some(season)) = (&career, &player_season) {
        check_player_career(&mut report, df, season)?;
    }
    if let Some(df) = &benchmarks {
        check_benchmarks(&mut report, df)?;
    }
    if let (Some(df), Some(season)) = (&percentiles, &player_season) {
        check_percentiles(&mut report, df, season)?;
    }
    if let Some(df) = &rolling {
        check_rolling_form(&mut report, df)?;
    }
    if let (Some(df), Some(career)) = (&scouting, &career) {
        check_scouting(&mut report, df, career)?;
    }
    if let Some(df) = &progression {
        check_progression(&mut report, df)?;
    }
    if let Some(df) = &consistency {
        check_consistency(&mut report, df)?;
    }
    if let (Some(df), Some(season)) = (&opponent, &player_season) {
        check_opponent_context(&mut report, df, season)?;
    }
    if let Some(df) = &substitutions {
        check_substitutions(&mut report, df)?;
    }
    if let (Some(df), Some(summary_df), Some(scores)) = (&momentum, &momentum_summary, &scores) {
        check_momentum(&mut report, df, summary_df, scores)?;
    }
    if let (Some(df), Some(career_df)) = (&managers, &manager_career) {
        check_managers(&mut report, df, career_df)?;
    }
    if let (Some(df), Some(ts)) = (&tactical, &team_season) {
        check_tactical(&mut report, df, ts)?;
    }
    if let (Some(df), Some(peak)) = (&age_curves, &peak_age) {
        check_age_curves(&mut report, df, peak)?;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_only_when_condition_false() {
        let mut report = Report::default();
        report.check("a", "always_true", true, "");
        report.check("a", "always_false", false, "boom");
        report.warn("a", "warned", false, "sparse");
        assert_eq!(report.n_pass(), 1);
        assert_eq!(report.n_fail(), 1);
        assert_eq!(report.n_warn(), 1);
    }

    #[test]
    fn range_helpers_ignore_nulls() {
        let values = vec![Some(0.5), None, Some(0.9)];
        assert!(in_range(&values, 0.0, 1.0));
        assert!(no_negatives(&values));
        let bad = vec![Some(-0.1), None];
        assert!(!no_negatives(&bad));
    }

    #[test]
    fn json_report_carries_summary() {
        let mut report = Report::default();
        report.check("x", "ok", true, "");
        let json = report.to_json();
        assert_eq!(json["summary"]["pass"], 1);
        assert_eq!(json["summary"]["fail"], 0);
        assert_eq!(json["checks"][0]["status"], "PASS");
    }
}
