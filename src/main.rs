mod catalog;
mod helpers;
mod http;
mod listing;
mod recipes;
mod scheduler;
mod selector;

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use catalog::{Catalog, Settings};
use helpers::{choose_one, downloader::download_resolution};
use http::RetrievalClient;
use recipes::{Recipe, Resolution};
use scheduler::Scheduler;

const CATALOG_JSON_ENV: &str = "DISTRO_CATALOG_JSON";

#[derive(Parser, Debug)]
#[command(name = "distro-images")]
#[command(author, version, about = "Find the latest installer image for every catalogued distribution")]
struct Cli {
    /// Catalog file (defaults to the bundled resources/catalog.json)
    #[arg(long, env = "DISTRO_CATALOG", global = true)]
    catalog: Option<PathBuf>,

    /// Maximum resolutions in flight
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Delay between task submissions, in milliseconds
    #[arg(long, global = true)]
    stagger_ms: Option<u64>,

    /// Timeout for page and feed fetches, in seconds
    #[arg(long, global = true)]
    get_timeout: Option<u64>,

    /// Timeout for HEAD probes, in seconds
    #[arg(long, global = true)]
    head_timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List catalogued distributions
    List,
    /// Resolve one distribution, or every one when no name is given
    Resolve { name: Option<String> },
    /// Resolve and download one distribution; prompts when no name is given
    Download {
        name: Option<String>,
        /// Directory the image is written to
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
}

fn bundled_catalog_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("resources").join("catalog.json")
}

fn load_catalog(path: Option<&PathBuf>) -> Result<Catalog> {
    let catalog = match path {
        Some(path) => catalog::init_from_file(path).with_context(|| format!("load catalog {}", path.display()))?,
        None if std::env::var_os(CATALOG_JSON_ENV).is_some() => {
            catalog::init_from_env(CATALOG_JSON_ENV).with_context(|| format!("load catalog from ${CATALOG_JSON_ENV}"))?
        }
        None => {
            let path = bundled_catalog_path();
            catalog::init_from_file(&path).with_context(|| format!("load catalog {}", path.display()))?
        }
    };
    ensure!(!catalog.is_empty(), "catalog lists no distributions");
    debug!("{} distributions catalogued", catalog.len());
    Ok(catalog)
}

/// Command-line flags win over the catalog file.
fn apply_overrides(mut settings: Settings, cli: &Cli) -> Settings {
    if let Some(workers) = cli.workers {
        settings.scheduler.max_workers = workers;
    }
    if let Some(stagger) = cli.stagger_ms {
        settings.scheduler.stagger_ms = Some(stagger);
    }
    if let Some(secs) = cli.get_timeout {
        settings.http.get_timeout_secs = secs;
    }
    if let Some(secs) = cli.head_timeout {
        settings.http.head_timeout_secs = secs;
    }
    settings
}

fn print_listing(catalog: &Catalog) {
    for recipe in catalog.recipes() {
        let d = recipe.descriptor();
        let fallback = if recipe.fallback().is_some() { "yes" } else { "no" };
        println!(
            "{:<28} {:<14} {:<14} {:<8} {:<20} fallback: {fallback}",
            d.name(),
            d.family(),
            d.flavor(),
            d.arch(),
            d.mechanism()
        );
    }
}

fn print_results(catalog: &Catalog, results: &BTreeMap<String, Resolution>) {
    println!("\n{:<28} {:<20} {:<28} URL", "Distro", "Status", "Version");
    for name in catalog.names() {
        let Some(resolution) = results.get(name) else { continue };
        println!(
            "{:<28} {:<20} {:<28} {}",
            name,
            resolution.status(),
            resolution.display_version(),
            resolution.url().unwrap_or("-")
        );
    }
}

fn print_selection(recipe: &Recipe, resolution: &Resolution) {
    let d = recipe.descriptor();
    println!("\n=== Selection ===");
    println!("Distro:    {}", d.name());
    println!("Family:    {}", d.family());
    println!("Flavor:    {}", d.flavor());
    println!("Arch:      {}", d.arch());
    println!("Mechanism: {}", d.mechanism());
    println!("Status:    {}", resolution.status());
    println!("Version:   {}", resolution.display_version());
    println!("URL:       {}", resolution.url().unwrap_or("<none>"));
    match resolution.checksum() {
        Some(checksum) => println!("Checksum:  {checksum}"),
        None => println!("Checksum:  <none>"),
    }
}

async fn resolve_named(catalog: &Catalog, name: &str, client: &RetrievalClient) -> Result<Resolution> {
    let recipe = catalog
        .by_name(name)
        .with_context(|| format!("unknown distribution '{name}'"))?;
    let resolution = catalog.resolve_one(name, client).await?;
    print_selection(recipe, &resolution);
    Ok(resolution)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let catalog = load_catalog(cli.catalog.as_ref())?;
    let settings = apply_overrides(*catalog.settings(), &cli);
    let client = RetrievalClient::new(settings.http)?;

    match cli.command.unwrap_or(Commands::Resolve { name: None }) {
        Commands::List => print_listing(&catalog),
        Commands::Resolve { name: Some(name) } => {
            resolve_named(&catalog, &name, &client).await?;
        }
        Commands::Resolve { name: None } => {
            let scheduler = Scheduler::new(settings.scheduler);
            let results = catalog.resolve_all(&scheduler, &client).await;
            print_results(&catalog, &results);
        }
        Commands::Download { name, output_dir } => {
            let name = match name {
                Some(name) => name,
                None => choose_one("Select Distro", catalog.names())?,
            };
            let resolution = resolve_named(&catalog, &name, &client).await?;
            let path = download_resolution(&client, &name, &resolution, &output_dir).await?;
            println!("Downloaded to {}", path.display());
        }
    }

    Ok(())
}
