use std::fs;
use std::path::Path;

use pitchline::config::Config;
use pitchline::scores;
use pitchline::store;
use pitchline::table::Table;

fn write_matches_index(config: &Config, rows: &[(&str, &str, &str, &str, &str)]) {
    fs::create_dir_all(config.index_dir()).unwrap();
    let mut csv = String::from("match_id,season,competition_slug,home_team_name,away_team_name,match_date,round\n");
    for (id, season, comp, home, away) in rows {
        csv.push_str(&format!("{id},{season},{comp},{home},{away},1700000000,1\n"));
    }
    fs::write(config.matches_index(), csv).unwrap();
}

fn write_trusted_scores(config: &Config, rows: &[(&str, i64, i64)]) {
    let mut table = Table::new();
    table.add_str(
        "match_id",
        rows.iter().map(|(id, _, _)| Some(id.to_string())).collect(),
    );
    table.add_i64("home_score", rows.iter().map(|(_, h, _)| Some(*h)).collect());
    table.add_i64("away_score", rows.iter().map(|(_, _, a)| Some(*a)).collect());
    table.write_parquet(&config.trusted_scores_path()).unwrap();
}

fn write_incidents(config: &Config, rows: &[(&str, Option<(f64, f64)>)]) {
    let mut table = Table::new();
    table.add_str(
        "match_id",
        rows.iter().map(|(id, _)| Some(id.to_string())).collect(),
    );
    table.add_i64("player_id", rows.iter().map(|_| None).collect());
    table.add_str(
        "incidentType",
        rows.iter()
            .map(|(_, score)| Some(if score.is_some() { "goal" } else { "card" }.to_string()))
            .collect(),
    );
    table.add_str("incidentClass", rows.iter().map(|_| None).collect());
    table.add_f64(
        "homeScore",
        rows.iter().map(|(_, score)| score.map(|(h, _)| h)).collect(),
    );
    table.add_f64(
        "awayScore",
        rows.iter().map(|(_, score)| score.map(|(_, a)| a)).collect(),
    );
    table.write_parquet(&config.incidents_path()).unwrap();
}

fn write_appearances(config: &Config, match_ids: &[&str]) {
    let mut table = Table::new();
    table.add_str(
        "match_id",
        match_ids.iter().map(|id| Some(id.to_string())).collect(),
    );
    table.add_i64("player_id", match_ids.iter().map(|_| Some(11)).collect());
    table.add_str(
        "player_name",
        match_ids.iter().map(|_| Some("Test Player".to_string())).collect(),
    );
    table.add_str(
        "season",
        match_ids.iter().map(|_| Some("2024-2025".to_string())).collect(),
    );
    table.add_str(
        "competition_slug",
        match_ids.iter().map(|_| Some("league-x".to_string())).collect(),
    );
    table.add_f64(
        "stat_minutesPlayed",
        match_ids.iter().map(|_| Some(90.0)).collect(),
    );
    table.write_parquet(&config.appearances_path()).unwrap();
}

/// Three-match scenario: trusted score beats a conflicting incident-derived
/// one, appearance-only matches assume 0-0, untouched matches stay null.
fn setup(root: &Path) -> Config {
    let config = Config::with_root(root);
    write_matches_index(
        &config,
        &[
            ("1", "2024-2025", "league-x", "Alpha FC", "Beta FC"),
            ("2", "2024-2025", "league-x", "Beta FC", "Alpha FC"),
            ("3", "2024-2025", "league-x", "Alpha FC", "Beta FC"),
        ],
    );
    write_trusted_scores(&config, &[("1", 2, 1)]);
    // Match 1 also has conflicting incident evidence (3-1); trusted wins.
    write_incidents(
        &config,
        &[
            ("1", Some((1.0, 0.0))),
            ("1", Some((3.0, 1.0))),
            ("2", None),
        ],
    );
    // Matches 1 and 2 have lineups; match 3 was never scraped.
    write_appearances(&config, &["1", "2"]);
    config
}

#[test]
fn resolves_the_three_match_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    scores::build(&config).unwrap();

    let table = Table::read_parquet(&store::artifact_path(&config, store::MATCH_SCORES)).unwrap();
    assert_eq!(table.n_rows(), 3);
    let ids = table.str_col("match_id").unwrap();
    let home = table.i64_col("home_score").unwrap();
    let away = table.i64_col("away_score").unwrap();
    let sources = table.str_col("score_source").unwrap();
    let results = table.str_col("result").unwrap();

    assert_eq!(ids[0].as_deref(), Some("1"));
    assert_eq!((home[0], away[0]), (Some(2), Some(1)));
    assert_eq!(sources[0].as_deref(), Some("original"));
    assert_eq!(results[0].as_deref(), Some("H"));

    assert_eq!((home[1], away[1]), (Some(0), Some(0)));
    assert_eq!(sources[1].as_deref(), Some("zero_zero_assumed"));
    assert_eq!(results[1].as_deref(), Some("D"));

    assert_eq!((home[2], away[2]), (None, None));
    assert_eq!(sources[2].as_deref(), Some("not_scraped"));
    assert_eq!(results[2], None);
}

#[test]
fn incident_derived_scores_fill_gaps() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_root(dir.path());
    write_matches_index(
        &config,
        &[("9", "2024-2025", "league-x", "Alpha FC", "Beta FC")],
    );
    write_incidents(&config, &[("9", Some((1.0, 0.0))), ("9", Some((1.0, 2.0)))]);
    write_appearances(&config, &["9"]);
    scores::build(&config).unwrap();

    let table = Table::read_parquet(&store::artifact_path(&config, store::MATCH_SCORES)).unwrap();
    assert_eq!(table.i64_col("home_score").unwrap()[0], Some(1));
    assert_eq!(table.i64_col("away_score").unwrap()[0], Some(2));
    assert_eq!(
        table.str_col("score_source").unwrap()[0].as_deref(),
        Some("derived_from_incidents")
    );
    assert_eq!(table.str_col("result").unwrap()[0].as_deref(), Some("A"));
}

#[test]
fn writes_a_csv_mirror() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    scores::build(&config).unwrap();
    let mirror = store::artifact_path(&config, store::MATCH_SCORES).with_extension("csv");
    let raw = fs::read_to_string(mirror).unwrap();
    assert!(raw.starts_with("match_id,home_score,away_score,score_source"));
    assert!(raw.contains("zero_zero_assumed"));
}

#[test]
fn rebuild_on_unchanged_inputs_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    scores::build(&config).unwrap();
    let path = store::artifact_path(&config, store::MATCH_SCORES);
    let first = fs::read(&path).unwrap();
    scores::build(&config).unwrap();
    let second = fs::read(&path).unwrap();
    assert_eq!(first, second);
}

#[test]
fn missing_incidents_input_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_root(dir.path());
    write_matches_index(
        &config,
        &[("1", "2024-2025", "league-x", "Alpha FC", "Beta FC")],
    );
    let err = scores::build(&config).unwrap_err().to_string();
    assert!(err.contains("missing input artifact"));
    assert!(err.contains("player_incidents.parquet"));
}
