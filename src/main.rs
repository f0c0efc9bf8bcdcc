use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use topic_zim::config::{self, ExportConfig};
use topic_zim::{export, output};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "topic-zim")]
#[command(about = "Export an educational topic tree into an offline ZIM archive")]
#[command(long_about = "\
Export an educational topic tree into an offline ZIM archive

Topics, videos and exercises are read from the content platform's data
directory (or the bundled fixtures with --test). Videos whose media is on
disk, or can be downloaded with --download, are linked into a temporary
directory with thumbnails and subtitles. Topics left without content are
pruned. Every surviving node gets a page, and the directory is packaged
with zimwriterfs.

Data layout:

  data/
  ├── topics.json               # Topic tree
  └── <language>/
      ├── content.json          # Video metadata, keyed by node id
      └── exercises.json        # Exercise metadata, keyed by node id
  content/<youtube_id>.mp4      # Video sources
  subtitles/<language>/<youtube_id>.srt

Run 'topic-zim gen-config' to generate a documented topic-zim.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./topic-zim.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Content language code
    #[arg(long, global = true)]
    language: Option<String>,

    /// Directory the archive tree is assembled in
    #[arg(long, global = true)]
    tmp_dir: Option<PathBuf>,

    /// Use the bundled fixture data instead of the live data directory
    #[arg(long, global = true)]
    test: bool,

    /// Remove the contents of the temporary directory first
    #[arg(short, long, global = true)]
    clear: bool,

    /// Download videos missing from the content directory
    #[arg(short, long, global = true)]
    download: bool,

    /// Re-encode videos to WebM
    #[arg(long, global = true)]
    transcode_webm: bool,

    /// Path to the zimwriterfs binary (default: search PATH)
    #[arg(long, global = true)]
    zimwriterfs: Option<PathBuf>,

    /// Publisher recorded in the archive metadata
    #[arg(long, global = true)]
    publisher: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full export and write the archive
    Export {
        /// Destination archive path
        zim: PathBuf,
    },
    /// Load and annotate the topic tree without writing anything
    Check,
    /// Print a stock topic-zim.toml with all options documented
    GenConfig,
}

impl Cli {
    /// Apply command-line overrides on top of the file config.
    fn apply(&self, config: &mut ExportConfig) {
        if let Some(language) = &self.language {
            config.language = language.clone();
        }
        if let Some(dir) = &self.tmp_dir {
            config.tmp_dir = Some(dir.clone());
        }
        if let Some(path) = &self.zimwriterfs {
            config.zimwriterfs = Some(path.clone());
        }
        if let Some(publisher) = &self.publisher {
            config.publisher = publisher.clone();
        }
        config.clear |= self.clear;
        config.download |= self.download;
        config.transcode_webm |= self.transcode_webm;
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// File config with command-line overrides, validated.
fn load_config(cli: &Cli) -> Result<ExportConfig, config::ConfigError> {
    let mut config = config::load_config(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn main() {
    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Export { zim } => {
            init_logging(cli.verbose);
            let config = load_config(&cli)?;

            let cancel = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&cancel);
            ctrlc::set_handler(move || {
                if flag.swap(true, Ordering::SeqCst) {
                    std::process::exit(130);
                }
                tracing::warn!("Interrupted, stopping at the next node or page (press Ctrl-C again to quit now)");
            })?;

            tracing::info!("Export started");
            let summary = export::export(&config, zim, cli.test, cancel)?;
            output::print_export_output(&summary);
        }
        Command::Check => {
            init_logging(cli.verbose);
            let config = load_config(&cli)?;
            let (tree, report) = export::check(&config, cli.test)?;
            output::print_check_output(&tree, &report);
            println!("==> Topic tree is valid");
        }
    }

    Ok(())
}
