use crate::game::gameplay::EngineConfig;
use crate::game::hold::HoldRules;
use crate::game::judgment::{Judgement, ScoreTable};
use crate::game::life::LifeRules;
use crate::game::timing_windows::{TimingProfile, WindowUnit};
use ini::Ini;
use log::{info, warn};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub const CONFIG_PATH: &str = "stepsync.ini";

const WINDOW_KEYS: [&str; 5] = ["Marvelous", "Perfect", "Great", "Good", "Boo"];
const WEIGHT_KEYS: [&str; 6] = [
    "WeightMarvelous",
    "WeightPerfect",
    "WeightGreat",
    "WeightGood",
    "WeightBoo",
    "WeightMiss",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Ini(#[from] ini::ParseError),
}

impl From<ini::Error> for ConfigError {
    fn from(e: ini::Error) -> Self {
        match e {
            ini::Error::Io(e) => Self::Io(e),
            ini::Error::Parse(e) => Self::Ini(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub log_level: LogLevel,
    pub timing: TimingProfile,
    pub holds: HoldRules,
    pub scoring: ScoreTable,
    pub life: LifeRules,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            timing: TimingProfile::beats(),
            holds: HoldRules::default(),
            scoring: ScoreTable::default(),
            life: LifeRules::default(),
        }
    }
}

// --- value readers ---

fn read_parsed<T: FromStr + Copy>(conf: &Ini, section: &str, key: &str, default: T) -> T {
    match conf.get_from(Some(section), key) {
        None => default,
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("Invalid value '{}' for [{}] {}; using default.", raw, section, key);
            default
        }),
    }
}

fn read_f64(conf: &Ini, section: &str, key: &str, default: f64) -> f64 {
    let v = read_parsed(conf, section, key, default);
    if v.is_finite() {
        v
    } else {
        warn!("Non-finite value for [{}] {}; using default.", section, key);
        default
    }
}

fn read_non_negative(conf: &Ini, section: &str, key: &str, default: f64) -> f64 {
    let v = read_f64(conf, section, key, default);
    if v >= 0.0 {
        v
    } else {
        warn!("Negative value for [{}] {}; using default.", section, key);
        default
    }
}

impl Config {
    /// Builds a config from parsed INI. Missing keys take their defaults;
    /// malformed ones do too, with a warning.
    pub fn from_ini(conf: &Ini) -> Self {
        let default = Self::default();

        let log_level = conf
            .get_from(Some("Options"), "LogLevel")
            .map_or(Some(default.log_level), |v| {
                LogLevel::from_str(v).ok().or_else(|| {
                    warn!("Unknown LogLevel '{}'; using {}.", v, default.log_level.as_str());
                    None
                })
            })
            .unwrap_or(default.log_level);

        let unit = conf
            .get_from(Some("Timing"), "WindowUnit")
            .map_or(Some(WindowUnit::Beats), |v| {
                WindowUnit::from_str(v).ok().or_else(|| {
                    warn!("Unknown WindowUnit '{}'; using Beats.", v);
                    None
                })
            })
            .unwrap_or(WindowUnit::Beats);
        let base = match unit {
            WindowUnit::Beats => TimingProfile::beats(),
            WindowUnit::Seconds => TimingProfile::itg_seconds(),
        };
        let mut timing = base;
        for (slot, key) in timing.windows.iter_mut().zip(WINDOW_KEYS) {
            *slot = read_f64(conf, "Timing", key, *slot);
        }
        if !timing.is_well_ordered() {
            warn!(
                "Timing windows {:?} are not positive and widening; using {} defaults.",
                timing.windows,
                unit.as_str()
            );
            timing = base;
        }

        let holds = HoldRules {
            hold_forgiveness: read_non_negative(conf, "Timing", "HoldForgiveness", default.holds.hold_forgiveness),
            roll_forgiveness: read_non_negative(conf, "Timing", "RollForgiveness", default.holds.roll_forgiveness),
            roll_required_intervals: read_non_negative(
                conf,
                "Timing",
                "RollRequiredIntervals",
                default.holds.roll_required_intervals,
            ),
            roll_short_threshold_beats: read_non_negative(
                conf,
                "Timing",
                "RollShortThresholdBeats",
                default.holds.roll_short_threshold_beats,
            ),
        };

        let mut scoring = default.scoring;
        for j in Judgement::ALL {
            let i = j.index();
            scoring.scores[i] = read_parsed(conf, "Scoring", j.label(), scoring.scores[i]);
            let weight = read_non_negative(conf, "Scoring", WEIGHT_KEYS[i], scoring.weights[i]);
            scoring.weights[i] = if weight <= 1.0 {
                weight
            } else {
                warn!("[Scoring] {} above 1.0; clamping.", WEIGHT_KEYS[i]);
                1.0
            };
        }

        let mut life = LifeRules {
            max: read_f64(conf, "Life", "Max", default.life.max),
            initial: read_f64(conf, "Life", "Initial", default.life.initial),
            hit: read_f64(conf, "Life", "Hit", default.life.hit),
            miss: read_f64(conf, "Life", "Miss", default.life.miss),
            mine_hit: read_f64(conf, "Life", "MineHit", default.life.mine_hit),
        };
        if life.max <= 0.0 {
            warn!("[Life] Max must be positive; using {}.", default.life.max);
            life.max = default.life.max;
        }

        Self {
            log_level,
            timing,
            holds,
            scoring,
            life,
        }
    }

    pub fn from_ini_str(s: &str) -> Result<Self, ConfigError> {
        Ok(Self::from_ini(&Ini::load_from_str(s)?))
    }

    /// Reads `path`, surfacing I/O and syntax errors. Individual values are
    /// still lenient.
    pub fn from_path_strict(path: &Path) -> Result<Self, ConfigError> {
        let conf = Ini::load_from_file(path)?;
        Ok(Self::from_ini(&conf))
    }

    pub fn to_ini(&self) -> Ini {
        let mut conf = Ini::new();
        let mut put = |section: &str, key: &str, value: String| {
            conf.set_to(Some(section), key.to_string(), value);
        };

        put("Options", "LogLevel", self.log_level.as_str().to_string());

        put("Timing", "WindowUnit", self.timing.unit.as_str().to_string());
        for (key, w) in WINDOW_KEYS.iter().zip(self.timing.windows) {
            put("Timing", key, w.to_string());
        }
        put("Timing", "HoldForgiveness", self.holds.hold_forgiveness.to_string());
        put("Timing", "RollForgiveness", self.holds.roll_forgiveness.to_string());
        put("Timing", "RollRequiredIntervals", self.holds.roll_required_intervals.to_string());
        put("Timing", "RollShortThresholdBeats", self.holds.roll_short_threshold_beats.to_string());

        for j in Judgement::ALL {
            put("Scoring", j.label(), self.scoring.score_for(j).to_string());
        }
        for j in Judgement::ALL {
            put("Scoring", WEIGHT_KEYS[j.index()], self.scoring.weight_for(j).to_string());
        }

        put("Life", "Max", self.life.max.to_string());
        put("Life", "Initial", self.life.initial.to_string());
        put("Life", "Hit", self.life.hit.to_string());
        put("Life", "Miss", self.life.miss.to_string());
        put("Life", "MineHit", self.life.mine_hit.to_string());
        conf
    }

    #[inline(always)]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            profile: self.timing,
            holds: self.holds,
            scoring: self.scoring,
            life: self.life,
        }
    }
}

fn create_default_config_file(path: &Path) -> Result<(), std::io::Error> {
    info!("'{}' not found, creating with default values.", path.display());
    Config::default().to_ini().write_to_file(path)
}

/// Loads `path`, writing a default file first if there is none. Any failure
/// falls back to defaults with a warning; this never fails.
pub fn load_or_create(path: &Path) -> Config {
    if !path.exists()
        && let Err(e) = create_default_config_file(path)
    {
        warn!("Failed to create default config file: {e}");
    }
    match Config::from_path_strict(path) {
        Ok(cfg) => {
            info!("Configuration loaded from '{}'.", path.display());
            cfg
        }
        Err(e) => {
            warn!("{e}; using default configuration.");
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigError, LogLevel, load_or_create};
    use crate::game::judgment::Judgement;
    use crate::game::timing_windows::{TimingProfile, WindowUnit};
    use std::fs;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Config::from_ini_str("").unwrap(), Config::default());
    }

    #[test]
    fn values_are_read_per_section() {
        let cfg = Config::from_ini_str(
            "[Options]\nLogLevel=debug\n\
             [Timing]\nWindowUnit=Seconds\nBoo=0.2\nHoldForgiveness=0.25\nRollRequiredIntervals=2\n\
             [Scoring]\nGreat=600\nWeightGood=0.4\n\
             [Life]\nMineHit=-20\n",
        )
        .unwrap();
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert_eq!(cfg.timing.unit, WindowUnit::Seconds);
        assert_eq!(cfg.timing.windows[0], TimingProfile::itg_seconds().windows[0]);
        assert_eq!(cfg.timing.windows[4], 0.2);
        assert_eq!(cfg.holds.hold_forgiveness, 0.25);
        assert_eq!(cfg.holds.roll_required_intervals, 2.0);
        assert_eq!(cfg.scoring.score_for(Judgement::Great), 600);
        assert_eq!(cfg.scoring.weight_for(Judgement::Good), 0.4);
        assert_eq!(cfg.life.mine_hit, -20.0);
        assert_eq!(cfg.engine_config().profile, cfg.timing);
    }

    #[test]
    fn malformed_values_fall_back() {
        let cfg = Config::from_ini_str(
            "[Options]\nLogLevel=loud\n[Timing]\nMarvelous=abc\nHoldForgiveness=-1\n[Life]\nMax=0\n",
        )
        .unwrap();
        let default = Config::default();
        assert_eq!(cfg.log_level, default.log_level);
        assert_eq!(cfg.timing, default.timing);
        assert_eq!(cfg.holds.hold_forgiveness, default.holds.hold_forgiveness);
        assert_eq!(cfg.life.max, default.life.max);
    }

    #[test]
    fn inverted_windows_are_rejected() {
        let cfg = Config::from_ini_str("[Timing]\nPerfect=0.5\n").unwrap();
        assert_eq!(cfg.timing, TimingProfile::beats());
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stepsync.ini");
        let cfg = load_or_create(&path);
        assert_eq!(cfg, Config::default());
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("[Timing]"));
        assert!(written.contains("WindowUnit=Beats"));
        assert_eq!(Config::from_path_strict(&path).unwrap(), Config::default());
    }

    #[test]
    fn edited_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.ini");
        let mut cfg = Config::default();
        cfg.log_level = LogLevel::Warn;
        cfg.holds.roll_forgiveness = 0.5;
        cfg.to_ini().write_to_file(&path).unwrap();
        assert_eq!(load_or_create(&path), cfg);
    }

    #[test]
    fn strict_loading_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_path_strict(&dir.path().join("nope.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
