use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

use crate::compose::Dimension;

const BACKGROUND_SCHEMA: &str = "org.gnome.desktop.background";
const WALLPAPER_KEYS: [&str; 2] = ["picture-uri", "picture-uri-dark"];

/// Source of the target canvas size.
pub trait DisplayQuery {
    fn resolution(&self) -> Result<Dimension>;
}

/// Reads the current X screen size from `xrandr --current`.
pub struct XrandrDisplay;

impl DisplayQuery for XrandrDisplay {
    fn resolution(&self) -> Result<Dimension> {
        let output = run_command("xrandr", &["--current"])?;
        parse_xrandr_current(&output)
            .ok_or_else(|| anyhow!("could not find current screen size in xrandr output"))
    }
}

pub struct FixedDisplay(pub Dimension);

impl DisplayQuery for FixedDisplay {
    fn resolution(&self) -> Result<Dimension> {
        Ok(self.0)
    }
}

/// `Screen 0: minimum 320 x 200, current 1920 x 1080, maximum 16384 x 16384`
pub(crate) fn parse_xrandr_current(output: &str) -> Option<Dimension> {
    output
        .lines()
        .filter(|line| line.trim_start().starts_with("Screen"))
        .find_map(|line| {
            let rest = &line[line.find("current")? + "current".len()..];
            let rest = rest.split(',').next()?;
            let (width, height) = rest.split_once('x')?;
            let width = width.trim().parse().ok()?;
            let height = height.trim().parse().ok()?;
            (width > 0 && height > 0).then(|| Dimension::new(width, height))
        })
}

pub(crate) fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Points both the light and dark GNOME background keys at `path`.
pub fn set_wallpaper(path: &Path) -> Result<()> {
    let uri = file_uri(path);
    for key in WALLPAPER_KEYS {
        run_command("gsettings", &["set", BACKGROUND_SCHEMA, key, &uri])
            .with_context(|| format!("could not set new image: {}", path.display()))?;
    }
    debug!("wallpaper set to {}", uri);
    Ok(())
}

/// Deletes the previous wallpaper. Returns whether a file was removed;
/// failures only warn.
pub fn remove_old_wallpaper(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(err) => {
            warn!("could not delete old image {}: {}", path.display(), err);
            false
        }
    }
}

pub(crate) fn run_command(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to run {}", program))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr.trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
