use crate::errors::ReplayError;
use crate::runtime::FileSystem;
use crate::types::Role;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub delay_ms: Option<u64>,
    pub filter: Option<Role>,
    pub no_streaming: bool,
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub playback: PlaybackConfig,
    pub streaming: StreamingConfig,
    pub history: HistoryConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
    pub filter: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackConfig {
    pub base_interval_ms: u64,
    pub initial_speed: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub speed_step: f64,
    pub idle_poll_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamingConfig {
    pub enabled: bool,
    pub char_delay_ms: u64,
    pub word_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryConfig {
    pub max_displayed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisplayConfig {
    pub edit_excerpt_lines: usize,
    pub output_max_lines: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LoggingConfig {
    pub path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            playback: PlaybackConfig {
                base_interval_ms: 1000,
                initial_speed: 1.0,
                min_speed: 0.5,
                max_speed: 5.0,
                speed_step: 0.5,
                idle_poll_ms: 100,
            },
            streaming: StreamingConfig {
                enabled: true,
                char_delay_ms: 10,
                word_delay_ms: 50,
            },
            history: HistoryConfig { max_displayed: 50 },
            display: DisplayConfig {
                edit_excerpt_lines: 5,
                output_max_lines: 20,
            },
            logging: LoggingConfig::default(),
            filter: None,
        }
    }
}

impl PlaybackConfig {
    pub fn base_interval(&self) -> Duration {
        Duration::from_millis(self.base_interval_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialAppConfig {
    playback: Option<PartialPlaybackConfig>,
    streaming: Option<PartialStreamingConfig>,
    history: Option<PartialHistoryConfig>,
    display: Option<PartialDisplayConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialPlaybackConfig {
    base_interval_ms: Option<u64>,
    initial_speed: Option<f64>,
    min_speed: Option<f64>,
    max_speed: Option<f64>,
    speed_step: Option<f64>,
    idle_poll_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialStreamingConfig {
    enabled: Option<bool>,
    char_delay_ms: Option<u64>,
    word_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialHistoryConfig {
    max_displayed: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialDisplayConfig {
    edit_excerpt_lines: Option<usize>,
    output_max_lines: Option<usize>,
}

pub fn load_config(
    overrides: &CliOverrides,
    fs: &dyn FileSystem,
) -> Result<AppConfig, ReplayError> {
    let mut cfg = AppConfig::default();

    if let Some(path) = &overrides.config_path {
        let file_contents = fs.read_to_string(path)?;
        let partial: PartialAppConfig = toml::from_str(&file_contents)
            .map_err(|e| ReplayError::ConfigParse(e.to_string()))?;
        merge_partial_config(&mut cfg, partial);
    }

    apply_cli_overrides(&mut cfg, overrides);
    validate_config(&cfg)?;
    Ok(cfg)
}

fn merge_partial_config(cfg: &mut AppConfig, partial: PartialAppConfig) {
    if let Some(playback) = partial.playback {
        if let Some(value) = playback.base_interval_ms {
            cfg.playback.base_interval_ms = value;
        }
        if let Some(value) = playback.initial_speed {
            cfg.playback.initial_speed = value;
        }
        if let Some(value) = playback.min_speed {
            cfg.playback.min_speed = value;
        }
        if let Some(value) = playback.max_speed {
            cfg.playback.max_speed = value;
        }
        if let Some(value) = playback.speed_step {
            cfg.playback.speed_step = value;
        }
        if let Some(value) = playback.idle_poll_ms {
            cfg.playback.idle_poll_ms = value;
        }
    }

    if let Some(streaming) = partial.streaming {
        if let Some(value) = streaming.enabled {
            cfg.streaming.enabled = value;
        }
        if let Some(value) = streaming.char_delay_ms {
            cfg.streaming.char_delay_ms = value;
        }
        if let Some(value) = streaming.word_delay_ms {
            cfg.streaming.word_delay_ms = value;
        }
    }

    if let Some(history) = partial.history {
        if let Some(value) = history.max_displayed {
            cfg.history.max_displayed = value;
        }
    }

    if let Some(display) = partial.display {
        if let Some(value) = display.edit_excerpt_lines {
            cfg.display.edit_excerpt_lines = value;
        }
        if let Some(value) = display.output_max_lines {
            cfg.display.output_max_lines = value;
        }
    }

    if let Some(logging) = partial.logging {
        cfg.logging = logging;
    }
}

fn apply_cli_overrides(cfg: &mut AppConfig, overrides: &CliOverrides) {
    if let Some(delay) = overrides.delay_ms {
        cfg.streaming.word_delay_ms = delay;
    }
    if overrides.no_streaming {
        cfg.streaming.enabled = false;
    }
    if let Some(path) = &overrides.log_file {
        cfg.logging.path = Some(path.clone());
    }
    cfg.filter = overrides.filter;
}

fn validate_config(cfg: &AppConfig) -> Result<(), ReplayError> {
    let playback = &cfg.playback;
    if !playback.min_speed.is_finite() || playback.min_speed <= 0.0 {
        return Err(ReplayError::InvalidConfig(
            "playback.min_speed must be greater than zero".to_string(),
        ));
    }
    if !playback.max_speed.is_finite() || playback.max_speed < playback.min_speed {
        return Err(ReplayError::InvalidConfig(
            "playback.max_speed must not be below playback.min_speed".to_string(),
        ));
    }
    if !playback.speed_step.is_finite() || playback.speed_step <= 0.0 {
        return Err(ReplayError::InvalidConfig(
            "playback.speed_step must be greater than zero".to_string(),
        ));
    }
    if !(playback.min_speed..=playback.max_speed).contains(&playback.initial_speed) {
        return Err(ReplayError::InvalidConfig(format!(
            "playback.initial_speed must be within [{}, {}]",
            playback.min_speed, playback.max_speed
        )));
    }
    let steps = (playback.initial_speed - playback.min_speed) / playback.speed_step;
    if playback.initial_speed < playback.max_speed && (steps - steps.round()).abs() > 1e-9 {
        return Err(ReplayError::InvalidConfig(format!(
            "playback.initial_speed must be playback.min_speed plus a whole number of {} steps",
            playback.speed_step
        )));
    }
    if playback.base_interval_ms == 0 {
        return Err(ReplayError::InvalidConfig(
            "playback.base_interval_ms must be greater than zero".to_string(),
        ));
    }
    if cfg.history.max_displayed == 0 {
        return Err(ReplayError::InvalidConfig(
            "history.max_displayed must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
