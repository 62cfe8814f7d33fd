use std::fs;
use std::path::Path;

use pitchline::config::Config;
use pitchline::pipeline::{self, RunOptions};
use pitchline::quality;
use pitchline::store;
use pitchline::table::Table;

const SEASON: &str = "2024-2025";
const COMP: &str = "league-x";
const TEAM_A: &str = "Alpha FC";
const TEAM_B: &str = "Beta FC";
const N_PLAYERS: usize = 80;
const BASE_DATE: i64 = 1_727_740_800; // 2024-10-01
const WEEK: i64 = 7 * 24 * 3600;
const DOB: i64 = 946_684_800; // 2000-01-01

const POSITIONS: [&str; 4] = ["G", "D", "M", "F"];
// Home team alternates; final scores per match.
const FINAL_SCORES: [(i64, i64); 6] = [(2, 1), (1, 1), (0, 3), (2, 0), (1, 0), (2, 2)];

fn match_id(m: usize) -> String {
    format!("m{}", m + 1)
}

fn home_is_alpha(m: usize) -> bool {
    m % 2 == 0
}

fn player_team_is_alpha(p: usize) -> bool {
    p < N_PLAYERS / 2
}

fn write_indexes(config: &Config) {
    fs::create_dir_all(config.index_dir()).unwrap();
    let mut matches = String::from(
        "match_id,season,competition_slug,home_team_name,away_team_name,match_date,round\n",
    );
    for m in 0..FINAL_SCORES.len() {
        let (home, away) = if home_is_alpha(m) {
            (TEAM_A, TEAM_B)
        } else {
            (TEAM_B, TEAM_A)
        };
        matches.push_str(&format!(
            "{},{SEASON},{COMP},{home},{away},{},{}\n",
            match_id(m),
            BASE_DATE + m as i64 * WEEK,
            m + 1
        ));
    }
    fs::write(config.matches_index(), matches).unwrap();

    let mut players = String::from("player_id,player_name,player_slug,player_short_name,n_matches\n");
    for p in 0..N_PLAYERS {
        players.push_str(&format!(
            "{},Player {p},player-{p},P. {p},{}\n",
            100 + p,
            FINAL_SCORES.len()
        ));
    }
    fs::write(config.players_index(), players).unwrap();
}

fn write_appearances(config: &Config) {
    let n_matches = FINAL_SCORES.len();
    let mut match_ids = Vec::new();
    let mut player_ids = Vec::new();
    let mut names = Vec::new();
    let mut short_names = Vec::new();
    let mut positions = Vec::new();
    let mut seasons = Vec::new();
    let mut comps = Vec::new();
    let mut sides = Vec::new();
    let mut subs = Vec::new();
    let mut dates = Vec::new();
    let mut dobs = Vec::new();

    let mut minutes = Vec::new();
    let mut ratings = Vec::new();
    let mut goals = Vec::new();
    let mut assists = Vec::new();
    let mut xg = Vec::new();
    let mut xa = Vec::new();
    let mut key_passes = Vec::new();
    let mut shots = Vec::new();
    let mut tackles = Vec::new();
    let mut interceptions = Vec::new();
    let mut dribbles_won = Vec::new();
    let mut touches = Vec::new();
    let mut fouls = Vec::new();
    let mut total_pass = Vec::new();
    let mut accurate_pass = Vec::new();

    for m in 0..n_matches {
        for p in 0..N_PLAYERS {
            let on_home_side = player_team_is_alpha(p) == home_is_alpha(m);
            match_ids.push(Some(match_id(m)));
            player_ids.push(Some(100 + p as i64));
            names.push(Some(format!("Player {p}")));
            short_names.push(Some(format!("P. {p}")));
            positions.push(Some(POSITIONS[p % 4].to_string()));
            seasons.push(Some(SEASON.to_string()));
            comps.push(Some(COMP.to_string()));
            sides.push(Some(if on_home_side { "home" } else { "away" }.to_string()));
            subs.push(Some(false));
            dates.push(Some(BASE_DATE + m as i64 * WEEK));
            dobs.push(Some(DOB));

            minutes.push(Some(90.0));
            ratings.push(Some(6.0 + ((p * 7 + m * 3) % 15) as f64 / 10.0));
            goals.push(Some(if (p + m) % 17 == 0 { 1.0 } else { 0.0 }));
            assists.push(Some(if (p + 2 * m) % 23 == 0 { 1.0 } else { 0.0 }));
            xg.push(Some(((p * 3 + m) % 10) as f64 / 20.0));
            xa.push(Some(((p + m) % 8) as f64 / 20.0));
            key_passes.push(Some(((p + m) % 4) as f64));
            shots.push(Some(((p + m) % 5) as f64));
            tackles.push(Some(((p * 2 + m) % 6) as f64));
            interceptions.push(Some(((p + m) % 3) as f64));
            dribbles_won.push(Some(((p + m) % 2) as f64));
            touches.push(Some(40.0 + ((p + m) % 30) as f64));
            fouls.push(Some(((p / 4 + m) % 4) as f64));
            let passes = 30.0 + ((p + m) % 20) as f64;
            total_pass.push(Some(passes));
            accurate_pass.push(Some((passes * 0.8).floor()));
        }
    }

    let mut table = Table::new();
    table.add_str("match_id", match_ids);
    table.add_i64("player_id", player_ids);
    table.add_str("player_name", names);
    table.add_str("player_shortName", short_names);
    table.add_str("player_position", positions);
    table.add_str("season", seasons);
    table.add_str("competition_slug", comps);
    table.add_str("side", sides);
    table.add_bool("substitute", subs);
    table.add_i64("match_date", dates);
    table.add_i64("player_dateOfBirthTimestamp", dobs);
    table.add_f64("stat_minutesPlayed", minutes);
    table.add_f64("stat_rating", ratings);
    table.add_f64("stat_goals", goals);
    table.add_f64("stat_goalAssist", assists);
    table.add_f64("stat_expectedGoals", xg);
    table.add_f64("stat_expectedAssists", xa);
    table.add_f64("stat_keyPass", key_passes);
    table.add_f64("stat_totalShots", shots);
    table.add_f64("stat_totalTackle", tackles);
    table.add_f64("stat_interceptionWon", interceptions);
    table.add_f64("stat_wonContest", dribbles_won);
    table.add_f64("stat_touches", touches);
    table.add_f64("stat_fouls", fouls);
    table.add_f64("stat_totalPass", total_pass);
    table.add_f64("stat_accuratePass", accurate_pass);
    table.write_parquet(&config.appearances_path()).unwrap();
}

fn write_incidents(config: &Config) {
    let mut match_ids = Vec::new();
    let mut player_ids = Vec::new();
    let mut seasons = Vec::new();
    let mut comps = Vec::new();
    let mut types = Vec::new();
    let mut classes = Vec::new();
    let mut home_scores = Vec::new();
    let mut away_scores = Vec::new();

    for (m, (h, a)) in FINAL_SCORES.iter().enumerate() {
        // Goal incidents carry the running score; the resolver takes maxima.
        for step in 1..=(h + a).max(1) {
            let running_home = (*h).min(step);
            let running_away = (step - running_home).min(*a);
            match_ids.push(Some(match_id(m)));
            player_ids.push(None);
            seasons.push(Some(SEASON.to_string()));
            comps.push(Some(COMP.to_string()));
            types.push(Some("goal".to_string()));
            classes.push(Some("regular".to_string()));
            home_scores.push(Some(running_home as f64));
            away_scores.push(Some(running_away as f64));
        }
        // One booking per match.
        match_ids.push(Some(match_id(m)));
        player_ids.push(Some(100 + m as i64));
        seasons.push(Some(SEASON.to_string()));
        comps.push(Some(COMP.to_string()));
        types.push(Some("card".to_string()));
        classes.push(Some("yellow".to_string()));
        home_scores.push(None);
        away_scores.push(None);
    }

    let mut table = Table::new();
    table.add_str("match_id", match_ids);
    table.add_i64("player_id", player_ids);
    table.add_str("season", seasons);
    table.add_str("competition_slug", comps);
    table.add_str("incidentType", types);
    table.add_str("incidentClass", classes);
    table.add_f64("homeScore", home_scores);
    table.add_f64("awayScore", away_scores);
    table.write_parquet(&config.incidents_path()).unwrap();
}

fn write_trusted_scores(config: &Config) {
    let mut table = Table::new();
    table.add_str("match_id", vec![Some(match_id(0))]);
    table.add_i64("home_score", vec![Some(FINAL_SCORES[0].0)]);
    table.add_i64("away_score", vec![Some(FINAL_SCORES[0].1)]);
    table.write_parquet(&config.trusted_scores_path()).unwrap();
}

fn write_raw_match_files(config: &Config) {
    for m in 0..FINAL_SCORES.len() {
        let dir = config.raw_match_dir(SEASON, COMP, &match_id(m));
        fs::create_dir_all(&dir).unwrap();

        let home_xg = 1.0 + m as f64 * 0.1;
        let stats = format!(
            "period,name,home,away\n\
             ALL,Expected goals,{home_xg:.2},0.80\n\
             ALL,Ball possession,55%,45%\n\
             ALL,Total shots,12,8\n\
             ALL,Shots on target,5,3\n\
             ALL,Big chances,3,2\n\
             ALL,Passes,500,400\n\
             ALL,Accurate passes,450,330\n\
             ALL,Long balls,60,50\n\
             ALL,Crosses,15,11\n\
             ALL,Total tackles,18,20\n\
             ALL,Tackles won,12,14\n\
             ALL,Interceptions,10,12\n\
             ALL,Duels,55%,45%\n\
             ALL,Aerial duels,60%,40%\n\
             ALL,Dribbles,10/18 (56%),8/15 (53%)\n\
             ALL,Fouls,10,12\n\
             ALL,Corner kicks,5,4\n\
             ALL,Yellow cards,2,1\n\
             ALL,Red cards,0,0\n\
             1ST,Expected goals,0.70,0.30\n\
             1ST,Total shots,6,3\n\
             2ND,Expected goals,0.80,0.50\n\
             2ND,Total shots,6,5\n"
        );
        fs::write(dir.join("team_statistics.csv"), stats).unwrap();

        let (home_mgr, away_mgr) = if home_is_alpha(m) { (900, 901) } else { (901, 900) };
        let managers = format!(
            r#"{{"homeManager":{{"id":{home_mgr},"name":"Manager {home_mgr}","slug":"manager-{home_mgr}"}},"awayManager":{{"id":{away_mgr},"name":"Manager {away_mgr}","slug":"manager-{away_mgr}"}}}}"#
        );
        fs::write(dir.join("managers.json"), managers).unwrap();

        let graph = r#"{"graphPoints":[{"minute":5,"value":10},{"minute":40,"value":-5},{"minute":60,"value":8},{"minute":90,"value":3}]}"#;
        fs::write(dir.join("graph.json"), graph).unwrap();
    }
}

fn setup(root: &Path) -> Config {
    let config = Config::with_root(root);
    write_indexes(&config);
    write_appearances(&config);
    write_incidents(&config);
    write_trusted_scores(&config);
    write_raw_match_files(&config);
    config
}

fn run_build(config: &Config) {
    let outcome = pipeline::run(
        config,
        &RunOptions {
            from_step: Some("scores".to_string()),
            to_step: Some("age-curves".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(outcome.status, "ok", "failed step: {}", outcome.failed_step);
}

#[test]
fn full_build_passes_the_quality_gate() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    run_build(&config);

    let report = quality::run(&config).unwrap();
    let failures: Vec<String> = report
        .results()
        .iter()
        .filter(|r| r.status == quality::CheckStatus::Fail)
        .map(|r| format!("{} / {}: {}", r.artifact, r.check, r.detail))
        .collect();
    assert!(failures.is_empty(), "unexpected FAILs: {failures:#?}");
    assert!(report.n_pass() > 50);
}

#[test]
fn team_season_aggregates_opponent_xg() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    run_build(&config);

    let table =
        Table::read_parquet(&store::artifact_path(&config, store::TEAM_SEASON_STATS)).unwrap();
    assert_eq!(table.n_rows(), 2);
    let teams = table.str_col("team_name").unwrap();
    let alpha = teams
        .iter()
        .position(|t| t.as_deref() == Some(TEAM_A))
        .unwrap();
    let total = table.f64_col("matches_total").unwrap();
    let home = table.f64_col("matches_home").unwrap();
    let away = table.f64_col("matches_away").unwrap();
    assert_eq!(total[alpha], Some(6.0));
    assert_eq!(home[alpha], Some(3.0));
    assert_eq!(away[alpha], Some(3.0));

    // Alpha concedes 0.8 xG in each of 3 home matches, and the varying
    // home xG in its 3 away matches (m2, m4, m6 -> 1.1, 1.3, 1.5).
    let xga = table.f64_col("xg_against_total").unwrap()[alpha].unwrap();
    assert!((xga - (0.8 * 3.0 + 1.1 + 1.3 + 1.5)).abs() < 1e-9);

    let pass_acc = table.f64_col("pass_accuracy_avg").unwrap()[alpha].unwrap();
    assert!((pass_acc - 2340.0 / 2700.0).abs() < 1e-9);
}

#[test]
fn opponent_tiers_fall_back_to_halves_for_two_teams() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    run_build(&config);

    let table =
        Table::read_parquet(&store::artifact_path(&config, store::PLAYER_OPPONENT_CONTEXT))
            .unwrap();
    assert!(table.n_rows() > 0);
    let tiers = table.str_col("opponent_tier").unwrap();
    assert!(tiers.iter().all(|t| {
        matches!(t.as_deref(), Some("top_third") | Some("bottom_third"))
    }));
}

#[test]
fn percentile_ranks_invert_lower_is_better_stats() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    run_build(&config);

    let table =
        Table::read_parquet(&store::artifact_path(&config, store::PLAYER_PERCENTILE_RANKS))
            .unwrap();
    let stat_names = table.str_col("stat_name").unwrap();
    let values = table.f64_col("stat_value").unwrap();
    let pcts = table.f64_col("pct_in_competition").unwrap();

    // For fouls, the row holding the group's maximum must never rank as
    // elite, and every percentile stays inside [0, 100].
    let mut worst: Option<(f64, f64)> = None;
    for i in 0..table.n_rows() {
        if stat_names[i].as_deref() != Some("fouls_per90") {
            continue;
        }
        let (value, pct) = (values[i].unwrap(), pcts[i].unwrap());
        assert!((0.0..=100.0).contains(&pct));
        if worst.is_none_or(|(v, _)| value > v) {
            worst = Some((value, pct));
        }
    }
    let (_, worst_pct) = worst.expect("fouls_per90 rows should exist");
    assert!(worst_pct < 50.0);
}

#[test]
fn player_season_flags_and_career_rollup_agree() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    run_build(&config);

    let season =
        Table::read_parquet(&store::artifact_path(&config, store::PLAYER_SEASON_STATS)).unwrap();
    assert_eq!(season.n_rows(), N_PLAYERS);
    let minutes = season.f64_col("total_minutes").unwrap();
    let sufficient = season.bool_col("sufficient_minutes").unwrap();
    for i in 0..season.n_rows() {
        assert_eq!(minutes[i], Some(540.0));
        assert_eq!(sufficient[i], Some(true));
    }

    let career =
        Table::read_parquet(&store::artifact_path(&config, store::PLAYER_CAREER_STATS)).unwrap();
    assert_eq!(career.n_rows(), N_PLAYERS);
    // 540 career minutes stay below the 900-minute career threshold.
    let career_sufficient = career.bool_col("sufficient_minutes").unwrap();
    assert!(career_sufficient.iter().all(|v| *v == Some(false)));

    let season_goals: i64 = season.i64_col("goals").unwrap().iter().flatten().sum();
    let career_goals: i64 = career.i64_col("goals").unwrap().iter().flatten().sum();
    assert_eq!(season_goals, career_goals);
}

#[test]
fn rerunning_a_stage_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    run_build(&config);

    let path = store::artifact_path(&config, store::PLAYER_SEASON_STATS);
    let before = fs::read(&path).unwrap();
    pitchline::player_season::build(&config).unwrap();
    let after = fs::read(&path).unwrap();
    assert_eq!(before, after);

    let bench_path = store::artifact_path(&config, store::COMPETITION_BENCHMARKS);
    let before = fs::read(&bench_path).unwrap();
    pitchline::benchmarks::build(&config).unwrap();
    let after = fs::read(&bench_path).unwrap();
    assert_eq!(before, after);
}
