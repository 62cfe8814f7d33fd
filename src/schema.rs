use std::collections::HashSet;

use once_cell::sync::Lazy;

/// How a per-match stat rolls up to season level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Agg {
    /// Cumulative count — summed, then normalized per-90.
    Sum,
    /// Already-normalized per-match value — averaged across matches.
    MatchMean,
}

/// Catalogued per-match stat columns from player_appearances.parquet.
///
/// Every stage that touches player stats goes through this enum; nothing
/// downstream detects columns by name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKey {
    Minutes,
    Rating,
    Goals,
    Assists,
    ExpectedGoals,
    ExpectedAssists,
    TotalShots,
    ShotsOnTarget,
    KeyPasses,
    BigChancesCreated,
    Touches,
    TotalPasses,
    AccuratePasses,
    TotalLongBalls,
    AccurateLongBalls,
    TotalCrosses,
    AccurateCrosses,
    DuelsWon,
    DuelsLost,
    AerialsWon,
    AerialsLost,
    TotalTackles,
    TacklesWon,
    Interceptions,
    Clearances,
    BallRecoveries,
    DribbleAttempts,
    DribblesWon,
    Dispossessed,
    PossessionLost,
    Fouls,
    WasFouled,
    Offsides,
    Saves,
    GoalsPrevented,
    PassValue,
    ShotValue,
    DefensiveValue,
    DribbleValue,
    GkValue,
}

pub const ALL_STAT_KEYS: &[StatKey] = &[
    StatKey::Minutes,
    StatKey::Rating,
    StatKey::Goals,
    StatKey::Assists,
    StatKey::ExpectedGoals,
    StatKey::ExpectedAssists,
    StatKey::TotalShots,
    StatKey::ShotsOnTarget,
    StatKey::KeyPasses,
    StatKey::BigChancesCreated,
    StatKey::Touches,
    StatKey::TotalPasses,
    StatKey::AccuratePasses,
    StatKey::TotalLongBalls,
    StatKey::AccurateLongBalls,
    StatKey::TotalCrosses,
    StatKey::AccurateCrosses,
    StatKey::DuelsWon,
    StatKey::DuelsLost,
    StatKey::AerialsWon,
    StatKey::AerialsLost,
    StatKey::TotalTackles,
    StatKey::TacklesWon,
    StatKey::Interceptions,
    StatKey::Clearances,
    StatKey::BallRecoveries,
    StatKey::DribbleAttempts,
    StatKey::DribblesWon,
    StatKey::Dispossessed,
    StatKey::PossessionLost,
    StatKey::Fouls,
    StatKey::WasFouled,
    StatKey::Offsides,
    StatKey::Saves,
    StatKey::GoalsPrevented,
    StatKey::PassValue,
    StatKey::ShotValue,
    StatKey::DefensiveValue,
    StatKey::DribbleValue,
    StatKey::GkValue,
];

impl StatKey {
    /// Raw column name in player_appearances.parquet.
    pub fn column(self) -> &'static str {
        match self {
            StatKey::Minutes => "stat_minutesPlayed",
            StatKey::Rating => "stat_rating",
            StatKey::Goals => "stat_goals",
            StatKey::Assists => "stat_goalAssist",
            StatKey::ExpectedGoals => "stat_expectedGoals",
            StatKey::ExpectedAssists => "stat_expectedAssists",
            StatKey::TotalShots => "stat_totalShots",
            StatKey::ShotsOnTarget => "stat_onTargetScoringAttempt",
            StatKey::KeyPasses => "stat_keyPass",
            StatKey::BigChancesCreated => "stat_bigChanceCreated",
            StatKey::Touches => "stat_touches",
            StatKey::TotalPasses => "stat_totalPass",
            StatKey::AccuratePasses => "stat_accuratePass",
            StatKey::TotalLongBalls => "stat_totalLongBalls",
            StatKey::AccurateLongBalls => "stat_accurateLongBalls",
            StatKey::TotalCrosses => "stat_totalCross",
            StatKey::AccurateCrosses => "stat_accurateCross",
            StatKey::DuelsWon => "stat_duelWon",
            StatKey::DuelsLost => "stat_duelLost",
            StatKey::AerialsWon => "stat_aerialWon",
            StatKey::AerialsLost => "stat_aerialLost",
            StatKey::TotalTackles => "stat_totalTackle",
            StatKey::TacklesWon => "stat_wonTackle",
            StatKey::Interceptions => "stat_interceptionWon",
            StatKey::Clearances => "stat_totalClearance",
            StatKey::BallRecoveries => "stat_ballRecovery",
            StatKey::DribbleAttempts => "stat_totalContest",
            StatKey::DribblesWon => "stat_wonContest",
            StatKey::Dispossessed => "stat_dispossessed",
            StatKey::PossessionLost => "stat_possessionLostCtrl",
            StatKey::Fouls => "stat_fouls",
            StatKey::WasFouled => "stat_wasFouled",
            StatKey::Offsides => "stat_totalOffside",
            StatKey::Saves => "stat_saves",
            StatKey::GoalsPrevented => "stat_goalsPrevented",
            StatKey::PassValue => "stat_passValueNormalized",
            StatKey::ShotValue => "stat_shotValueNormalized",
            StatKey::DefensiveValue => "stat_defensiveValueNormalized",
            StatKey::DribbleValue => "stat_dribbleValueNormalized",
            StatKey::GkValue => "stat_goalkeeperValueNormalized",
        }
    }

    /// Column name without the `stat_` prefix; per-90 columns derive from it.
    pub fn base(self) -> &'static str {
        &self.column()["stat_".len()..]
    }

    pub fn agg(self) -> Agg {
        match self {
            StatKey::Rating
            | StatKey::PassValue
            | StatKey::ShotValue
            | StatKey::DefensiveValue
            | StatKey::DribbleValue
            | StatKey::GkValue => Agg::MatchMean,
            _ => Agg::Sum,
        }
    }

    /// Sum-kind stats that get a `<base>_per90` column (minutes normalizes,
    /// it is not itself normalized).
    pub fn has_per90(self) -> bool {
        self.agg() == Agg::Sum && self != StatKey::Minutes
    }
}

/// Per-90 column names emitted by the player-season stage, catalog order.
pub static PER90_STATS: Lazy<Vec<String>> = Lazy::new(|| {
    ALL_STAT_KEYS
        .iter()
        .filter(|k| k.has_per90())
        .map(|k| format!("{}_per90", k.base()))
        .collect()
});

/// Averaged value-added metrics and their output column names.
pub const VALUE_AVG_STATS: &[(StatKey, &str)] = &[
    (StatKey::PassValue, "pass_value_avg"),
    (StatKey::ShotValue, "shot_value_avg"),
    (StatKey::DefensiveValue, "defensive_value_avg"),
    (StatKey::DribbleValue, "dribble_value_avg"),
    (StatKey::GkValue, "gk_value_avg"),
];

/// Ratio stat = sum(num) / sum(den parts), defined only when the denominator
/// is positive; in [0,1] by construction.
pub struct RatioSpec {
    pub name: &'static str,
    pub num: StatKey,
    pub den: &'static [StatKey],
}

pub const RATIO_STATS: &[RatioSpec] = &[
    RatioSpec {
        name: "pass_accuracy",
        num: StatKey::AccuratePasses,
        den: &[StatKey::TotalPasses],
    },
    RatioSpec {
        name: "duel_win_rate",
        num: StatKey::DuelsWon,
        den: &[StatKey::DuelsWon, StatKey::DuelsLost],
    },
    RatioSpec {
        name: "aerial_win_rate",
        num: StatKey::AerialsWon,
        den: &[StatKey::AerialsWon, StatKey::AerialsLost],
    },
    RatioSpec {
        name: "tackle_success_rate",
        num: StatKey::TacklesWon,
        den: &[StatKey::TotalTackles],
    },
    RatioSpec {
        name: "dribble_success_rate",
        num: StatKey::DribblesWon,
        den: &[StatKey::DribbleAttempts],
    },
    RatioSpec {
        name: "cross_accuracy",
        num: StatKey::AccurateCrosses,
        den: &[StatKey::TotalCrosses],
    },
    RatioSpec {
        name: "long_ball_accuracy",
        num: StatKey::AccurateLongBalls,
        den: &[StatKey::TotalLongBalls],
    },
];

/// Ratio stats included in percentile ranking (the headline four).
pub const PERCENTILE_RATIO_STATS: &[&str] = &[
    "pass_accuracy",
    "duel_win_rate",
    "aerial_win_rate",
    "tackle_success_rate",
];

/// Stats where a lower value is the better one; percentile ranks are
/// inverted (100 - pct) so 100 always reads as elite. Shared by the
/// percentile engine and the validator.
pub static LOWER_IS_BETTER: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "fouls_per90",
        "totalOffside_per90",
        "possessionLostCtrl_per90",
        "dispossessed_per90",
        "yellow_cards",
        "red_cards",
    ])
});

/// The only stats allowed to be negative:
///   goalsPrevented_per90 — a keeper conceding above expectation
///   *_value_avg — normalized value-added metrics below baseline
/// Everything else non-negative by construction; the validator enforces it.
pub static NEGATIVE_ALLOWED: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "goalsPrevented_per90",
        "pass_value_avg",
        "shot_value_avg",
        "defensive_value_avg",
        "dribble_value_avg",
        "gk_value_avg",
    ])
});

pub const POSITIONS: &[&str] = &["G", "D", "M", "F"];

pub const ALL_COMPETITIONS: &str = "all_competitions";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per90_names_follow_raw_columns() {
        assert!(PER90_STATS.iter().any(|s| s == "expectedGoals_per90"));
        assert!(PER90_STATS.iter().any(|s| s == "goalAssist_per90"));
        assert!(!PER90_STATS.iter().any(|s| s == "minutesPlayed_per90"));
        assert!(!PER90_STATS.iter().any(|s| s == "rating_per90"));
    }

    #[test]
    fn lower_is_better_covers_card_totals() {
        assert!(LOWER_IS_BETTER.contains("yellow_cards"));
        assert!(LOWER_IS_BETTER.contains("fouls_per90"));
        assert!(!LOWER_IS_BETTER.contains("goals_per90"));
    }

    #[test]
    fn value_stats_are_match_means() {
        for (key, _) in VALUE_AVG_STATS {
            assert_eq!(key.agg(), Agg::MatchMean);
            assert!(!key.has_per90());
        }
    }
}
