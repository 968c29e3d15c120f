use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, ImageReader, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, info};

pub mod apod;
pub mod compose;
pub mod cron;
pub mod desktop;
pub mod logging;
mod paths;
pub mod settings;
pub mod state;
#[cfg(test)]
mod test_util;

use apod::ApodRecord;
use desktop::{DisplayQuery, FixedDisplay, XrandrDisplay};
use settings::{Caption, Settings};
use state::State;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub enable: bool,
    pub disable: bool,
    pub dry_run: bool,
    pub settings_path: Option<String>,
    pub image: Option<String>,
    pub output: Option<String>,
    pub text: Option<String>,
}

/// One pass: fetch, compose, set, clean up. Returns the user-facing report.
pub fn run(config: Config) -> Result<String> {
    let mut report = Report::default();

    if config.disable {
        if config.dry_run {
            report.push("dry-run: skipped removing cron job");
        } else {
            cron::disable()?;
            report.push("Removed cron job");
        }
        return Ok(report.finish());
    }

    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    if config.enable {
        if config.dry_run {
            report.push("dry-run: skipped adding cron job");
        } else {
            cron::enable()?;
            report.push("Added cron job");
        }
    }

    let state_path = paths::state_path();
    let mut state = State::load(&state_path)?;

    let (source, caption, record) = match config.image.as_deref() {
        Some(path) => {
            let source = decode_image(Path::new(path))?;
            (source, String::new(), None)
        }
        None if config.dry_run => {
            report.push("dry-run: skipped fetching APOD");
            return Ok(report.finish());
        }
        None => match fetch_new_picture(&settings, &state, &mut report)? {
            Some((source, record)) => {
                let caption = caption_text(&record, settings.caption);
                (source, caption, Some(record))
            }
            None => {
                reapply_previous(&state, config.dry_run, &mut report)?;
                return Ok(report.finish());
            }
        },
    };
    let text = config.text.clone().unwrap_or(caption);

    let display = display_for(&settings);
    let target = display.resolution()?;
    debug!("target resolution {}x{}", target.width, target.height);
    let composed = compose_image(&source, target, &text, &settings)?;

    if let Some(output) = config.output.as_deref() {
        let output = PathBuf::from(output);
        save_png(&composed, &output)?;
        report.push(format!("Wrote {}", output.display()));
        return Ok(report.finish());
    }
    if config.dry_run {
        report.push("dry-run: skipped setting wallpaper");
        return Ok(report.finish());
    }

    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let new_file = paths::wallpaper_dir().join(wallpaper_file_name(now)?);
    save_png(&composed, &new_file)?;
    desktop::set_wallpaper(&new_file)?;
    report.push("Set image as background");

    if let Some(old) = state.file_old.take()
        && old != new_file
        && desktop::remove_old_wallpaper(&old)
    {
        report.push("Deleted old image");
    }
    state.file_old = Some(new_file);
    if record.is_some() {
        state.apod = record;
    }
    state.save(&state_path)?;
    Ok(report.finish())
}

fn fetch_new_picture(
    settings: &Settings,
    state: &State,
    report: &mut Report,
) -> Result<Option<(DynamicImage, ApodRecord)>> {
    let record = apod::fetch_record(&settings.apod_endpoint, &settings.api_key())?;
    report.push("Got data from server");

    if let Some(previous) = state.apod.as_ref()
        && apod::same_source(previous, &record)
    {
        report.push("The APOD picture has not changed");
        return Ok(None);
    }
    if !record.is_image() {
        report.push("The new APOD is not an image");
        return Ok(None);
    }

    let url = record.source_url()?;
    let download = apod::download(url, &paths::download_dir())?;
    report.push("Downloaded image");
    let source = decode_image(download.path())?;
    info!("downloaded {} ({}x{})", url, source.width(), source.height());
    Ok(Some((source, record)))
}

fn reapply_previous(state: &State, dry_run: bool, report: &mut Report) -> Result<()> {
    let Some(previous) = state.file_old.as_deref().filter(|path| path.exists()) else {
        debug!("no previous wallpaper to re-apply");
        return Ok(());
    };
    if dry_run {
        report.push("dry-run: skipped re-applying wallpaper");
        return Ok(());
    }
    desktop::set_wallpaper(previous)?;
    report.push("Set image as background");
    Ok(())
}

fn display_for(settings: &Settings) -> Box<dyn DisplayQuery> {
    match settings.screen {
        Some(size) => Box::new(FixedDisplay(size)),
        None => Box::new(XrandrDisplay),
    }
}

pub(crate) fn caption_text(record: &ApodRecord, caption: Caption) -> String {
    match caption {
        Caption::Title => record.title.trim().to_string(),
        Caption::Explanation => record.explanation.trim().to_string(),
        Caption::Off => String::new(),
    }
}

fn compose_image(
    source: &DynamicImage,
    target: compose::Dimension,
    text: &str,
    settings: &Settings,
) -> Result<RgbaImage> {
    let overlay = &settings.overlay;
    if text.trim().is_empty() {
        return compose::composite(source, target, None, overlay.background)
            .map_err(anyhow::Error::from);
    }

    let font_path = settings.font_path.as_deref().map(Path::new);
    let resolved = compose::resolve_overlay_font(
        font_path,
        settings.font_family.as_deref(),
        overlay_fallback_fonts(),
        settings.font_size,
    )?;
    debug!("overlay font {}", resolved.family);
    let typeface = resolved.font.typeface();
    compose::compose_wallpaper(source, target, text, &resolved.font, &typeface, overlay)
        .with_context(|| "failed to compose wallpaper")
}

fn overlay_fallback_fonts() -> &'static [&'static str] {
    &["DejaVu Sans", "Noto Sans", "Liberation Sans", "sans-serif"]
}

fn decode_image(path: &Path) -> Result<DynamicImage> {
    ImageReader::open(path)
        .with_context(|| format!("failed to open image: {}", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("failed to read image: {}", path.display()))?
        .decode()
        .with_context(|| format!("failed to decode image: {}", path.display()))
}

fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write image: {}", path.display()))
}

pub(crate) fn wallpaper_file_name(now: OffsetDateTime) -> Result<String> {
    let stamp = now
        .format(format_description!(
            "[year][month][day][hour][minute][second]"
        ))
        .map_err(|err| anyhow!("failed to format timestamp: {}", err))?;
    Ok(format!("wallpaper_{}.png", stamp))
}

#[derive(Default)]
struct Report {
    lines: Vec<String>,
}

impl Report {
    fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        info!("{}", line);
        self.lines.push(line);
    }

    fn finish(self) -> String {
        self.lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::with_temp_home;
    use image::Rgba;
    use time::macros::datetime;

    #[test]
    fn wallpaper_names_sort_by_time() {
        let name = wallpaper_file_name(datetime!(2025-12-29 08:05:09 UTC)).unwrap();
        assert_eq!(name, "wallpaper_20251229080509.png");
    }

    #[test]
    fn caption_follows_setting() {
        let record = apod::parse_record(
            r#"{"date":"2025-12-29","media_type":"image","title":" M31 ","explanation":"Big galaxy.","url":"u.jpg"}"#,
        )
        .unwrap();
        assert_eq!(caption_text(&record, Caption::Title), "M31");
        assert_eq!(caption_text(&record, Caption::Explanation), "Big galaxy.");
        assert_eq!(caption_text(&record, Caption::Off), "");
    }

    #[test]
    fn local_image_without_text_writes_output() {
        with_temp_home(|home| {
            let input = home.join("input.png");
            RgbaImage::from_pixel(8, 6, Rgba([10, 200, 30, 255]))
                .save(&input)
                .expect("write input");
            let extra = home.join("screen.toml");
            fs::write(&extra, "[screen]\nwidth = 32\nheight = 18\n").expect("write settings");
            let output = home.join("out").join("composed.png");

            let report = run(Config {
                settings_path: Some(extra.display().to_string()),
                image: Some(input.display().to_string()),
                output: Some(output.display().to_string()),
                ..Config::default()
            })
            .expect("run");

            assert!(report.contains("Wrote"));
            let composed = image::open(&output).expect("open output").to_rgba8();
            assert_eq!(composed.dimensions(), (32, 18));
            assert!(composed.pixels().all(|pixel| pixel[3] == 255));
        });
    }

    #[test]
    fn dry_run_skips_network_and_downloads() {
        with_temp_home(|home| {
            let report = run(Config {
                dry_run: true,
                ..Config::default()
            })
            .expect("run");
            assert_eq!(report, "dry-run: skipped fetching APOD");
            assert!(!home.join(".spaceoddity").join(".cache").exists());
            assert!(!home.join(".spaceoddity").join("state.json").exists());
        });
    }

    #[test]
    fn dry_run_disable_touches_nothing() {
        let report = run(Config {
            disable: true,
            dry_run: true,
            ..Config::default()
        })
        .expect("run");
        assert_eq!(report, "dry-run: skipped removing cron job");
    }
}
