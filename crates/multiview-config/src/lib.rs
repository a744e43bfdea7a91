use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Error types for configuration operations
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration: {reason}")]
    Invalid { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Font paths tried in order when `[font] path` is not set.
pub const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
];

/// Requested GL context version. Always a core profile.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContextSettings {
    pub major: i32,
    pub minor: i32,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self { major: 4, minor: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderSettings {
    /// RGBA clear color applied before every frame
    pub clear_color: [f32; 4],
    pub text_color: [f32; 4],
    /// Spin on the event queue instead of blocking when it is empty
    pub busy_poll: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            text_color: [0.94, 0.94, 0.96, 1.0],
            busy_poll: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FontSettings {
    pub path: Option<PathBuf>,
    pub size: f32,
}

impl Default for FontSettings {
    fn default() -> Self {
        Self { path: None, size: 18.0 }
    }
}

impl FontSettings {
    /// Resolve the font file: the configured path, or the first system candidate that exists.
    pub fn resolve_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.path {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(ConfigError::FileNotFound { path: path.display().to_string() });
        }

        FONT_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .ok_or_else(|| ConfigError::Invalid {
                reason: "no usable font found; set [font] path".to_string(),
            })
    }
}

/// One top-level window and the text it shows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowSettings {
    pub width: u16,
    pub height: u16,
    pub title: String,
    pub lines: Vec<String>,
    /// Activate this window with the shared context instead of the primary one
    pub shared_context: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: String::from("multiview"),
            lines: Vec::new(),
            shared_context: false,
        }
    }
}

impl WindowSettings {
    fn with_lines(title: &str, lines: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            lines: lines.iter().map(|l| l.to_string()).collect(),
            ..Default::default()
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MultiviewConfig {
    pub context: ContextSettings,
    pub render: RenderSettings,
    pub font: FontSettings,
    pub windows: Vec<WindowSettings>,
}

impl Default for MultiviewConfig {
    fn default() -> Self {
        Self {
            context: ContextSettings::default(),
            render: RenderSettings::default(),
            font: FontSettings::default(),
            windows: vec![
                WindowSettings::with_lines("multiview 1", &["Hello", "Hello"]),
                WindowSettings::with_lines("multiview 2", &["Lets go", "Hello"]),
                WindowSettings::with_lines("multiview 3", &["Lets go 2", "Hello"]),
            ],
        }
    }
}

impl MultiviewConfig {
    /// Load and validate a configuration file. The file must exist.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound { path: path.display().to_string() });
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Explicit path if given, else the default path if it exists, else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let default_path = Self::default_path();
        if default_path.exists() {
            return Self::from_file(default_path);
        }

        debug!("No configuration at {}, using defaults", default_path.display());
        Ok(Self::default())
    }

    /// `$XDG_CONFIG_HOME/multiview/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("multiview")
            .join("config.toml")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.windows.is_empty() {
            return Err(ConfigError::Invalid { reason: "at least one window is required".to_string() });
        }
        if let Some((i, _)) = self.windows.iter().enumerate().find(|(_, w)| w.width == 0 || w.height == 0) {
            return Err(ConfigError::Invalid { reason: format!("window {} has a zero dimension", i) });
        }
        // profile selection only exists from 3.2 on
        if (self.context.major, self.context.minor) < (3, 2) || self.context.minor < 0 {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "context version {}.{} is not a core profile version",
                    self.context.major, self.context.minor
                ),
            });
        }
        if self.font.size <= 0.0 {
            return Err(ConfigError::Invalid { reason: "font size must be positive".to_string() });
        }
        Ok(())
    }
}
