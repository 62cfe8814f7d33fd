use std::fs;

use pitchline::config::Config;
use pitchline::pipeline::{self, LatestSuccess, RunLog, RunOptions};

#[test]
fn start_appends_one_running_row_and_finish_completes_it() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("pipeline_runs.sqlite");
    let log = RunLog::open(&db).unwrap();

    log.start("run-1", "2026-01-01T00:00:00Z", "scores,team-season", "test")
        .unwrap();
    assert_eq!(log.count().unwrap(), 1);
    let row = log.get("run-1").unwrap().unwrap();
    assert_eq!(row.status, "running");
    assert_eq!(row.ended_utc, None);
    assert_eq!(row.steps_run, "scores,team-season");

    log.finish("run-1", "2026-01-01T00:05:00Z", "ok", "").unwrap();
    assert_eq!(log.count().unwrap(), 1);
    let row = log.get("run-1").unwrap().unwrap();
    assert_eq!(row.status, "ok");
    assert_eq!(row.ended_utc.as_deref(), Some("2026-01-01T00:05:00Z"));
    assert_eq!(row.failed_step, "");
}

#[test]
fn repeated_start_upserts_instead_of_duplicating() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("pipeline_runs.sqlite");
    let log = RunLog::open(&db).unwrap();
    log.start("run-1", "2026-01-01T00:00:00Z", "scores", "test").unwrap();
    log.start("run-1", "2026-01-01T00:00:01Z", "scores", "test").unwrap();
    assert_eq!(log.count().unwrap(), 1);
}

#[test]
fn stale_running_rows_are_closed_by_the_next_start() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("pipeline_runs.sqlite");
    let log = RunLog::open(&db).unwrap();
    // A run that crashed mid-flight never called finish.
    log.start("run-1", "2026-01-01T00:00:00Z", "scores", "test").unwrap();
    log.start("run-2", "2026-01-02T00:00:00Z", "scores", "test").unwrap();

    let stale = log.get("run-1").unwrap().unwrap();
    assert_eq!(stale.status, "fail");
    assert_eq!(stale.failed_step, "interrupted");
    assert_eq!(stale.ended_utc.as_deref(), Some("2026-01-02T00:00:00Z"));
    let fresh = log.get("run-2").unwrap().unwrap();
    assert_eq!(fresh.status, "running");
    assert_eq!(log.count().unwrap(), 2);
}

#[test]
fn marker_round_trips_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("latest_successful_run.json");
    let marker = LatestSuccess {
        run_id: "2026-01-01T00:00:00Z".to_string(),
        ended_utc: "2026-01-01T00:10:00Z".to_string(),
        steps_run: "index,scores".to_string(),
        env: "test".to_string(),
    };
    pipeline::write_marker(&path, &marker).unwrap();
    assert_eq!(pipeline::read_marker(&path), Some(marker));
    assert!(!path.with_extension("json.tmp").exists());
}

#[test]
fn failed_run_records_first_failure_and_never_moves_the_marker() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_root(dir.path());
    // No matches.csv: the index step fails, and with the default
    // non-fail-fast mode every later step still gets its chance.
    let outcome = pipeline::run(&config, &RunOptions::default()).unwrap();
    assert_eq!(outcome.status, "fail");
    assert_eq!(outcome.failed_step, "index");
    assert_eq!(outcome.exit_code, 0);

    let log = RunLog::open(&config.run_log_db()).unwrap();
    let row = log.get(&outcome.run_id).unwrap().unwrap();
    assert_eq!(row.status, "fail");
    assert_eq!(row.failed_step, "index");
    assert!(row.ended_utc.is_some());
    assert!(!config.latest_success_marker().exists());
}

#[test]
fn fail_fast_aborts_with_nonzero_exit() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_root(dir.path());
    let outcome = pipeline::run(
        &config,
        &RunOptions {
            fail_fast: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(outcome.status, "fail");
    assert_eq!(outcome.failed_step, "index");
    assert_eq!(outcome.exit_code, 1);

    let log = RunLog::open(&config.run_log_db()).unwrap();
    let row = log.get(&outcome.run_id).unwrap().unwrap();
    assert_eq!(row.status, "fail");
}

#[test]
fn successful_range_updates_the_marker() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_root(dir.path());
    fs::create_dir_all(config.index_dir()).unwrap();
    fs::write(
        config.matches_index(),
        "match_id,season,competition_slug,home_team_name,away_team_name,match_date,round\n",
    )
    .unwrap();

    let outcome = pipeline::run(
        &config,
        &RunOptions {
            from_step: Some("index".to_string()),
            to_step: Some("index".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(outcome.status, "ok");
    assert_eq!(outcome.exit_code, 0);

    let marker = pipeline::read_marker(&config.latest_success_marker()).unwrap();
    assert_eq!(marker.run_id, outcome.run_id);
    assert_eq!(marker.steps_run, "index");
}

#[test]
fn invalid_ranges_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_root(dir.path());
    let err = pipeline::run(
        &config,
        &RunOptions {
            from_step: Some("quality".to_string()),
            to_step: Some("scores".to_string()),
            ..Default::default()
        },
    )
    .unwrap_err()
    .to_string();
    assert!(err.contains("from-step must be before or equal"));

    let err = pipeline::run(
        &config,
        &RunOptions {
            from_step: Some("no-such-step".to_string()),
            ..Default::default()
        },
    )
    .unwrap_err()
    .to_string();
    assert!(err.contains("unknown step id"));
}
