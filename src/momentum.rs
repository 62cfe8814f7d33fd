use std::collections::BTreeMap;

use anyhow::Result;

use crate::config::Config;
use crate::raw;
use crate::store;
use crate::table::Table;

#[derive(Debug, Clone, Copy)]
struct Point {
    minute: i64,
    value: i64,
}

/// Parse every graph.json under the raw tree into per-minute momentum rows
/// plus a per-match summary (positive values lean home, negative lean away).
pub fn build(config: &Config) -> Result<()> {
    let mut per_match: BTreeMap<String, Vec<Point>> = BTreeMap::new();
    for (_, _, match_id, dir) in raw::iter_raw_match_dirs(config) {
        let path = dir.join("graph.json");
        if !path.exists() {
            continue;
        }
        let graph = match raw::read_graph(&path) {
            Ok(graph) => graph,
            Err(err) => {
                eprintln!("Skip {}: {err}", path.display());
                continue;
            }
        };
        let points: Vec<Point> = graph
            .graph_points
            .iter()
            .map(|p| Point {
                minute: p.minute.unwrap_or(0.0) as i64,
                value: p.value.unwrap_or(0.0) as i64,
            })
            .collect();
        if !points.is_empty() {
            per_match.insert(match_id, points);
        }
    }

    let mut detail_match: Vec<String> = Vec::new();
    let mut detail_minute: Vec<i64> = Vec::new();
    let mut detail_value: Vec<i64> = Vec::new();
    for (match_id, points) in &per_match {
        for p in points {
            detail_match.push(match_id.clone());
            detail_minute.push(p.minute);
            detail_value.push(p.value);
        }
    }

    let mut detail = Table::new();
    detail.add_str("match_id", detail_match.iter().map(|m| Some(m.clone())).collect());
    detail.add_i64("minute", detail_minute.iter().map(|m| Some(*m)).collect());
    detail.add_i64(
        "momentum_value",
        detail_value.iter().map(|v| Some(*v)).collect(),
    );
    detail.add_str(
        "period",
        detail_minute
            .iter()
            .map(|m| Some(if *m <= 45 { "1ST" } else { "2ND" }.to_string()))
            .collect(),
    );
    store::save_artifact(config, store::MATCH_MOMENTUM, &detail)?;

    let match_ids: Vec<&String> = per_match.keys().collect();
    let mut summary = Table::new();
    summary.add_str(
        "match_id",
        match_ids.iter().map(|m| Some((*m).clone())).collect(),
    );
    summary.add_f64(
        "avg_home_momentum",
        per_match
            .values()
            .map(|points| {
                Some(points.iter().map(|p| p.value as f64).sum::<f64>() / points.len() as f64)
            })
            .collect(),
    );
    summary.add_i64(
        "home_dominated_minutes",
        per_match
            .values()
            .map(|points| Some(points.iter().filter(|p| p.value > 0).count() as i64))
            .collect(),
    );
    summary.add_i64(
        "away_dominated_minutes",
        per_match
            .values()
            .map(|points| Some(points.iter().filter(|p| p.value < 0).count() as i64))
            .collect(),
    );
    summary.add_i64(
        "momentum_swings",
        per_match
            .values()
            .map(|points| {
                Some(
                    points
                        .windows(2)
                        .filter(|pair| pair[1].value != pair[0].value)
                        .count() as i64,
                )
            })
            .collect(),
    );
    summary.add_i64(
        "halftime_momentum",
        per_match
            .values()
            .map(|points| {
                points
                    .iter()
                    .filter(|p| p.minute <= 45)
                    .next_back()
                    .map(|p| p.value)
            })
            .collect(),
    );
    summary.add_i64(
        "final_momentum",
        per_match.values().map(|points| points.last().map(|p| p.value)).collect(),
    );
    store::save_artifact(config, store::MATCH_MOMENTUM_SUMMARY, &summary)
}
