use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "spaceoddity",
    version,
    about = "Set the NASA Astronomy Picture of the Day as the desktop wallpaper"
)]
struct Cli {
    /// Install the cron job that runs spaceoddity every 10 minutes
    #[arg(long = "enable", conflicts_with = "disable")]
    enable: bool,

    /// Remove the cron job and exit
    #[arg(long = "disable")]
    disable: bool,

    /// Print the steps instead of fetching or changing anything
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Compose from a local image instead of today's APOD
    #[arg(long = "image")]
    image: Option<String>,

    /// Write the composed PNG here instead of setting the wallpaper
    #[arg(long = "output")]
    output: Option<String>,

    /// Overlay text (overrides the APOD caption)
    #[arg(long = "text")]
    text: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    spaceoddity::logging::init(cli.verbose)?;

    let output = spaceoddity::run(spaceoddity::Config {
        enable: cli.enable,
        disable: cli.disable,
        dry_run: cli.dry_run,
        settings_path: cli.read_settings,
        image: cli.image,
        output: cli.output,
        text: cli.text,
    })?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
