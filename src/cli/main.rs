use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use seo_meta::config::{Config, Keywords};
use seo_meta::metadata::RustBackend;
use seo_meta::pipeline;
use seo_meta::report::LogReporter;

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG: &str = "seo-meta.json";

#[derive(Parser, Debug)]
#[command(
    name = "seo-meta",
    version,
    about = "Batch SEO metadata writer — stamp author, copyright, title, description and keywords into images"
)]
struct Cli {
    /// Image files or directories to process
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Path to config file (default: seo-meta.json in the working directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Author / artist name
    #[arg(long)]
    author: Option<String>,

    /// Copyright notice
    #[arg(long)]
    copyright: Option<String>,

    /// Image title
    #[arg(long)]
    title: Option<String>,

    /// Image description
    #[arg(long)]
    description: Option<String>,

    /// Comma-separated keywords
    #[arg(long, value_name = "K1,K2")]
    keywords: Option<String>,

    /// Descend into sub-directories
    #[arg(short, long)]
    recursive: bool,

    /// Output directory (default: output/ next to each image)
    #[arg(long, value_name = "DIR")]
    outdir: Option<PathBuf>,

    /// Replace the source images in place
    #[arg(long)]
    overwrite: bool,

    /// Number of files processed concurrently (default: CPU cores)
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Write a template config file and exit
    #[arg(long)]
    init: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// The command-line half of the merged config.
    fn overrides(&self) -> Config {
        Config {
            inputs: self.paths.clone(),
            author: self.author.clone(),
            copyright: self.copyright.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            keywords: self.keywords.clone().map(Keywords::Joined),
            recursive: self.recursive,
            outdir: self.outdir.clone(),
            overwrite: self.overwrite,
            workers: self.workers,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    if cli.init {
        let path = cli.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
        Config::template().save(&path)?;
        println!("Template config written to {}", path.display());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?.merge(cli.overrides());
    let record = config.metadata_record()?;
    if config.inputs.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    let options = config.run_options();
    if options.overwrite {
        log::info!("Overwrite mode: source files will be replaced");
    }

    let files = pipeline::discover(&config.inputs, config.recursive);
    let summary = pipeline::run(
        files,
        record,
        options,
        Arc::new(RustBackend::new()),
        &LogReporter,
    )
    .await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}

/// Load the explicit config file, or the default one if it exists.
fn load_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => Config::load(path),
        None => {
            let path = Path::new(DEFAULT_CONFIG);
            if path.is_file() {
                log::debug!("Using {}", path.display());
                Config::load(path)
            } else {
                Ok(Config::default())
            }
        }
    }
}
