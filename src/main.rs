mod config;
mod crawler;
mod error;
mod storage;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use config::Config;
use crawler::fetcher::HttpFetcher;
use crawler::service::{CrawlTarget, ScrapingService};

#[derive(Parser)]
#[command(name = "chintai-crawler", about = "Crawl SUUMO rental listings into JSON and CSV")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Abort the whole run on the first failed page
    #[arg(long, global = true)]
    strict: bool,

    /// Max fetches in flight
    #[arg(short = 'c', long, global = true)]
    concurrency: Option<usize>,

    /// Output directory for buildings.json / properties.csv
    #[arg(short, long, global = true)]
    out: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl every page of one listing URL (e.g. https://suumo.jp/chintai/tokyo/ek_27580/)
    Station { url: String },
    /// Crawl every station of one line page
    Line {
        url: String,
        /// Line name stamped onto records
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Crawl prefectures by slug (defaults to PREFECTURES)
    Prefectures { slugs: Vec<String> },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut cfg = Config::from_env()?;

    if cli.strict {
        cfg.strict = true;
    }
    if let Some(n) = cli.concurrency {
        cfg.concurrency = n;
    }
    if let Some(out) = cli.out {
        cfg.output_dir = out;
    }

    let target = match cli.command {
        Commands::Station { url } => CrawlTarget::Station { url },
        Commands::Line { url, name } => CrawlTarget::Line { url, name },
        Commands::Prefectures { slugs } if slugs.is_empty() => {
            CrawlTarget::Prefectures(cfg.prefectures.clone())
        }
        Commands::Prefectures { slugs } => CrawlTarget::Prefectures(slugs),
    };

    let t0 = Instant::now();
    let fetcher = HttpFetcher::new(&cfg.user_agent, cfg.fetch_timeout)?;
    let service = ScrapingService::new(&cfg, fetcher);
    let summary = service.run(&target).await?;

    println!("\n==============================");
    println!("BUILDINGS:  {}", summary.buildings);
    println!("PROPERTIES: {}", summary.properties);
    println!("PAGES:      {}", summary.pages);
    println!("FAILURES:   {}", summary.failures);
    println!("TIME:       {:.1}s", t0.elapsed().as_secs_f64());
    println!("==============================\n");

    for path in &summary.files_written {
        println!("{}", path.display());
    }

    Ok(())
}
