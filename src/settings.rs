use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compose::{Anchor, Dimension, OverlayConfig, Rgb};
use crate::paths;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
pub const DEFAULT_APOD_ENDPOINT: &str = "https://api.nasa.gov/planetary/apod";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Caption {
    #[default]
    Title,
    Explanation,
    #[serde(rename = "none")]
    Off,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub apod_endpoint: String,
    pub apod_api_key: Option<String>,
    pub caption: Caption,
    pub overlay: OverlayConfig,
    pub font_size: f32,
    pub font_family: Option<String>,
    pub font_path: Option<String>,
    pub screen: Option<Dimension>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            apod_endpoint: DEFAULT_APOD_ENDPOINT.to_string(),
            apod_api_key: None,
            caption: Caption::default(),
            overlay: OverlayConfig::default(),
            font_size: 14.0,
            font_family: None,
            font_path: None,
            screen: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    apod: Option<ApodSettings>,
    overlay: Option<OverlaySettings>,
    screen: Option<ScreenSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct ApodSettings {
    endpoint: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySettings {
    caption: Option<Caption>,
    wrap_width: Option<usize>,
    font_size: Option<f32>,
    font_family: Option<String>,
    font_path: Option<String>,
    corner_radius: Option<u32>,
    box_color: Option<String>,
    box_alpha: Option<u8>,
    text_color: Option<String>,
    text_alpha: Option<u8>,
    internal_padding: Option<u32>,
    external_padding: Option<u32>,
    anchor: Option<Anchor>,
    background: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ScreenSettings {
    width: Option<u32>,
    height: Option<u32>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = paths::settings_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings
                .merge(parsed)
                .with_context(|| format!("invalid settings: {}", path.display()))?;
        }
    }

    Ok(settings)
}

impl Settings {
    /// Key from settings, then `NASA_API_KEY`, then the public demo key.
    pub fn api_key(&self) -> String {
        self.apod_api_key
            .clone()
            .or_else(|| {
                std::env::var("NASA_API_KEY")
                    .ok()
                    .filter(|key| !key.trim().is_empty())
            })
            .unwrap_or_else(|| "DEMO_KEY".to_string())
    }

    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(apod) = incoming.apod {
            if let Some(endpoint) = apod.endpoint.filter(|value| !value.trim().is_empty()) {
                self.apod_endpoint = endpoint;
            }
            if let Some(key) = apod.api_key.filter(|value| !value.trim().is_empty()) {
                self.apod_api_key = Some(key);
            }
        }
        if let Some(overlay) = incoming.overlay {
            self.merge_overlay(overlay)?;
        }
        if let Some(screen) = incoming.screen {
            match (screen.width, screen.height) {
                (Some(width), Some(height)) if width > 0 && height > 0 => {
                    self.screen = Some(Dimension::new(width, height));
                }
                (None, None) => {}
                _ => return Err(anyhow!("[screen] needs both width and height above zero")),
            }
        }
        Ok(())
    }

    fn merge_overlay(&mut self, overlay: OverlaySettings) -> Result<()> {
        let config = &mut self.overlay;
        if let Some(caption) = overlay.caption {
            self.caption = caption;
        }
        if let Some(width) = overlay.wrap_width {
            if width > 0 {
                config.wrap.wrap_width = width;
            }
        }
        if let Some(size) = overlay.font_size {
            if size > 0.0 {
                self.font_size = size;
            }
        }
        if let Some(family) = overlay.font_family {
            if !family.trim().is_empty() {
                self.font_family = Some(family);
            }
        }
        if let Some(path) = overlay.font_path {
            if !path.trim().is_empty() {
                self.font_path = Some(path);
            }
        }
        if let Some(radius) = overlay.corner_radius {
            config.style.corner_radius = radius;
        }
        if let Some(color) = overlay.box_color {
            config.style.fill_color = parse_color("box_color", &color)?;
        }
        if let Some(alpha) = overlay.box_alpha {
            config.style.fill_alpha = alpha;
        }
        if let Some(color) = overlay.text_color {
            config.style.text_color = parse_color("text_color", &color)?;
        }
        if let Some(alpha) = overlay.text_alpha {
            config.style.text_alpha = alpha;
        }
        if let Some(padding) = overlay.internal_padding {
            config.style.internal_padding = padding;
        }
        if let Some(padding) = overlay.external_padding {
            config.placement.external_padding = padding;
        }
        if let Some(anchor) = overlay.anchor {
            config.placement.anchor = anchor;
        }
        if let Some(color) = overlay.background {
            config.background = parse_color("background", &color)?;
        }
        Ok(())
    }
}

fn parse_color(key: &str, value: &str) -> Result<Rgb> {
    Rgb::parse_hex(value).ok_or_else(|| anyhow!("{} must be #rrggbb, got '{}'", key, value))
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = paths::settings_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::with_temp_home;

    #[test]
    fn embedded_defaults_match_builtin_defaults() {
        let parsed: SettingsFile = toml::from_str(DEFAULT_SETTINGS_TOML).expect("parse");
        let mut settings = Settings::default();
        settings.merge(parsed).expect("merge");
        assert_eq!(settings.overlay, OverlayConfig::default());
        assert_eq!(settings.font_size, 14.0);
        assert_eq!(settings.caption, Caption::Title);
        assert_eq!(settings.apod_endpoint, DEFAULT_APOD_ENDPOINT);
        assert_eq!(settings.screen, None);
    }

    #[test]
    fn first_load_writes_home_settings() {
        with_temp_home(|home| {
            load_settings(None).expect("load");
            let written = home.join(".spaceoddity").join("settings.toml");
            assert!(written.exists());
        });
    }

    #[test]
    fn extra_file_overrides_overlay() {
        with_temp_home(|home| {
            let extra = home.join("extra.toml");
            fs::write(
                &extra,
                r##"
[overlay]
caption = "explanation"
anchor = "bottom-right"
box_color = "#102030"
box_alpha = 200
wrap_width = 48
font_size = 30

[screen]
width = 2560
height = 1440
"##,
            )
            .expect("write");
            let settings = load_settings(Some(&extra)).expect("load");
            assert_eq!(settings.caption, Caption::Explanation);
            assert_eq!(settings.overlay.placement.anchor, Anchor::BottomRight);
            assert_eq!(settings.overlay.style.fill_color, Rgb([0x10, 0x20, 0x30]));
            assert_eq!(settings.overlay.style.fill_alpha, 200);
            assert_eq!(settings.overlay.wrap.wrap_width, 48);
            assert_eq!(settings.font_size, 30.0);
            assert_eq!(settings.screen, Some(Dimension::new(2560, 1440)));
        });
    }

    #[test]
    fn unknown_anchor_is_rejected() {
        with_temp_home(|home| {
            let extra = home.join("bad.toml");
            fs::write(&extra, "[overlay]\nanchor = \"middle\"\n").expect("write");
            assert!(load_settings(Some(&extra)).is_err());
        });
    }

    #[test]
    fn half_screen_setting_is_rejected() {
        let parsed: SettingsFile = toml::from_str("[screen]\nwidth = 1920\n").expect("parse");
        assert!(Settings::default().merge(parsed).is_err());
    }

    #[test]
    fn bad_color_names_the_key() {
        let parsed: SettingsFile = toml::from_str("[overlay]\ntext_color = \"red\"\n").expect("parse");
        let err = Settings::default().merge(parsed).unwrap_err();
        assert!(err.to_string().contains("text_color"));
    }

    #[test]
    fn missing_extra_file_is_an_error() {
        with_temp_home(|home| {
            let err = load_settings(Some(&home.join("nope.toml"))).unwrap_err();
            assert!(err.to_string().contains("settings file not found"));
        });
    }
}
