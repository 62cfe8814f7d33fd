use std::path::PathBuf;

pub const MIN_MINUTES_SEASON: f64 = 450.0;
pub const MIN_MINUTES_CAREER: f64 = 900.0;
pub const MIN_MINUTES_OPPONENT_SPLIT: f64 = 90.0;
pub const MIN_APPEARANCES_CONSISTENCY: usize = 5;

/// Resolved data-directory layout for one pipeline invocation.
///
/// Defaults to `./data`; `PITCHLINE_DATA_DIR` overrides the root so CI and
/// production can point at a shared volume. `PITCHLINE_ENV` tags run-log rows.
#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub env: String,
}

impl Config {
    pub fn from_env() -> Self {
        let root = std::env::var("PITCHLINE_DATA_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));
        let env = std::env::var("PITCHLINE_ENV")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "dev".to_string());
        Self { root, env }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            env: "test".to_string(),
        }
    }

    pub fn index_dir(&self) -> PathBuf {
        self.root.join("index")
    }

    pub fn derived_dir(&self) -> PathBuf {
        self.root.join("derived")
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.root.join("processed")
    }

    pub fn matches_index(&self) -> PathBuf {
        self.index_dir().join("matches.csv")
    }

    pub fn players_index(&self) -> PathBuf {
        self.index_dir().join("players.csv")
    }

    pub fn run_log_db(&self) -> PathBuf {
        self.index_dir().join("pipeline_runs.sqlite")
    }

    pub fn latest_success_marker(&self) -> PathBuf {
        self.index_dir().join("latest_successful_run.json")
    }

    pub fn appearances_path(&self) -> PathBuf {
        self.derived_dir().join("player_appearances.parquet")
    }

    pub fn incidents_path(&self) -> PathBuf {
        self.derived_dir().join("player_incidents.parquet")
    }

    pub fn trusted_scores_path(&self) -> PathBuf {
        self.derived_dir().join("match_scores.parquet")
    }

    /// Raw per-match directory: `raw/<season>/club/<competition>/<match_id>/`.
    pub fn raw_match_dir(&self, season: &str, competition: &str, match_id: &str) -> PathBuf {
        self.raw_dir()
            .join(season)
            .join("club")
            .join(competition)
            .join(match_id)
    }

    pub fn processed(&self, name: &str) -> PathBuf {
        self.processed_dir().join(name)
    }
}
