use egui::Pos2;
use serde::{Deserialize, Serialize};

use crate::errors::VisualizerError;

const CONFIG_FILE_NAME: &str = "config.json";
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WindowPosition {
    pub x: f32,
    pub y: f32,
}

impl Default for WindowPosition {
    fn default() -> Self {
        Self { x: 0., y: 0. }
    }
}

impl From<WindowPosition> for Pos2 {
    fn from(value: WindowPosition) -> Self {
        Pos2::new(value.x, value.y)
    }
}

impl From<Pos2> for WindowPosition {
    fn from(value: Pos2) -> Self {
        Self {
            x: value.x,
            y: value.y,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub window_position: WindowPosition,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            window_position: WindowPosition::default(),
        }
    }
}

impl AppConfig {
    pub fn from_local_file() -> Option<Self> {
        let config_path = dirs::config_dir()?.join("equipviz").join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let file = std::fs::File::open(config_path).ok()?;
            serde_json::from_reader(file).ok()
        } else {
            None
        }
    }

    pub fn save(&self) -> Result<(), VisualizerError> {
        let config_path = dirs::config_dir()
            .ok_or(VisualizerError::NoConfigDir)?
            .join("equipviz")
            .join(CONFIG_FILE_NAME);

        if !config_path.exists()
            && let Some(parent) = config_path.parent()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| VisualizerError::ConfigIo { source: e })?;
        }

        let file = std::fs::File::create(config_path)
            .map_err(|e| VisualizerError::ConfigIo { source: e })?;
        serde_json::to_writer(file, self)
            .map_err(|e| VisualizerError::ConfigSerialize { source: e })
    }
}
