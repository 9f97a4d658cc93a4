use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ytsrt::captions::YouTubeCaptions;
use ytsrt::config::{Config, ConfigFile, Overrides};
use ytsrt::discovery::YtDlp;
use ytsrt::package::Package;
use ytsrt::{pipeline, report};

#[derive(Parser)]
#[command(name = "ytsrt", about = "Download YouTube captions as SubRip (.srt) files")]
struct Cli {
    /// debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Video, playlist or channel link, bare video ID or @handle
    link: String,

    /// Preferred language codes, comma separated [default: pt,pt-BR,en]
    #[arg(short, long)]
    languages: Option<String>,

    /// Output directory [default: .]
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Zip file name used when several videos have captions [default: subtitles.zip]
    #[arg(long)]
    archive_name: Option<String>,

    /// Path to the yt-dlp executable
    #[arg(long, value_name = "PATH")]
    yt_dlp: Option<String>,

    /// Read settings from a TOML file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print a single document to stdout instead of writing it
    #[arg(long)]
    stdout: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        for cause in err.chain().skip(1) {
            eprintln!("    {cause}");
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let file = match &cli.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };
    let config = Config::resolve(
        file,
        Overrides {
            languages: cli.languages,
            output_dir: cli.output,
            archive_name: cli.archive_name,
            yt_dlp: cli.yt_dlp,
        },
    );
    debug!(?config, "configuration resolved");

    let videos = YtDlp::new(&config.yt_dlp);
    let captions = YouTubeCaptions::new(
        &config.user_agent,
        Duration::from_millis(config.request_delay_ms),
    )
    .context("failed to set up the HTTP client")?;

    let extraction = pipeline::extract(&cli.link, &config.languages, &videos, &captions)?;

    let table = report::format_table(&extraction.outcomes);
    let summary = report::summary(&extraction);
    if cli.stdout {
        eprintln!("{table}\n{summary}");
    } else {
        println!("{table}\n{summary}");
    }

    eprintln!("[3/3] packaging...");
    let package = Package::from_documents(&extraction.documents, &config.archive_name)?;
    match &package {
        Package::Single { content, .. } if cli.stdout => print!("{content}"),
        _ => {
            if cli.stdout {
                tracing::warn!("several documents produced, writing an archive instead of stdout");
            }
            let path = package.write_to(&config.output_dir).with_context(|| {
                format!("failed to write to {}", config.output_dir.display())
            })?;
            println!("written to {}", path.display());
        }
    }

    Ok(())
}

/// Initialize logging with tracing
fn init_logging(verbose: bool) {
    let default = if verbose { "ytsrt=debug" } else { "ytsrt=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "ytsrt",
            "-v",
            "https://youtu.be/dQw4w9WgXcQ",
            "-l",
            "en,de",
            "-o",
            "out",
            "--stdout",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(cli.stdout);
        assert_eq!(cli.languages.as_deref(), Some("en,de"));
        assert_eq!(cli.output, Some(PathBuf::from("out")));
        assert_eq!(cli.config, None);
    }

    #[test]
    fn link_is_required() {
        assert!(Cli::try_parse_from(["ytsrt"]).is_err());
    }
}
