use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.toml";

/// Environment variable that overrides `feed.api_key`
pub const API_KEY_ENV: &str = "AVIATIONSTACK_API_KEY";

#[derive(Resource, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub globe: GlobeConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FeedConfig {
    /// Flight-lookup API endpoint
    pub flight_endpoint: String,
    /// Service returning departure/arrival coordinates for an airport pair
    #[serde(default)]
    pub route_endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    pub refresh_interval_ms: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GlobeConfig {
    pub radius: f64,
    /// Height of markers above the globe surface
    pub marker_altitude: f64,
    pub route_samples: usize,
    /// Route progress per second
    pub animation_speed: f64,
    pub animate: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            feed: FeedConfig {
                flight_endpoint: "https://api.aviationstack.com/v1/flights".to_string(),
                route_endpoint: None,
                api_key: None,
                refresh_interval_ms: 30_000,
            },
            globe: GlobeConfig {
                radius: 2.0,
                marker_altitude: 0.05,
                route_samples: crate::route::DEFAULT_ROUTE_SAMPLES,
                animation_speed: crate::animation::DEFAULT_ANIMATION_SPEED,
                animate: true,
            },
        }
    }
}

impl FeedConfig {
    /// API key from the environment, falling back to the config file.
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone().filter(|k| !k.trim().is_empty()))
    }
}

fn config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_default()
        .join(CONFIG_FILE)
}

pub fn load_config() -> AppConfig {
    let path = config_path();
    if path.exists() {
        match read_config(&path) {
            Ok(config) => {
                info!("Loaded config from {:?}", path);
                return config;
            }
            Err(e) => {
                warn!("{}, using defaults", e);
                return AppConfig::default();
            }
        }
    }

    let config = AppConfig::default();
    save_config(&config);
    config
}

fn read_config(path: &Path) -> Result<AppConfig, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config: {}", e))?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> Result<AppConfig, String> {
    toml::from_str(contents).map_err(|e| format!("Failed to parse config: {}", e))
}

pub fn save_config(config: &AppConfig) {
    let path = config_path();
    match toml::to_string_pretty(config) {
        Ok(contents) => {
            if let Err(e) = fs::write(&path, contents) {
                error!("Failed to write config: {}", e);
            } else {
                info!("Saved config to {:?}", path);
            }
        }
        Err(e) => {
            error!("Failed to serialize config: {}", e);
        }
    }
}

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(load_config());
    }
}
