#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the datamill toolchain.

use std::path::PathBuf;

use chrono::{Datelike as _, Utc};
use clap::{Parser, Subcommand};
use datamill_cli_utils::IndicatifProgress;
use datamill_ingest::{
    EarthquakeRun, HolidayRun, PageviewRun, parse_time_arg, sync_earthquakes, sync_holidays,
    sync_pageviews,
};
use datamill_publish::PackageSpec;
use datamill_source::earthquakes::BoundingBox;
use datamill_source::holidays::parse_year_span;
use datamill_source::progress::ProgressCallback as _;

#[derive(Parser)]
#[command(name = "datamill", about = "Build and package public datasets from key-free APIs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch earthquakes from the USGS event catalog
    Earthquakes {
        /// Window start (YYYY-MM-DD or RFC 3339). Defaults to the
        /// dataset's latest `updated` timestamp, or 7 days before the end.
        #[arg(long)]
        start: Option<String>,
        /// Window end (YYYY-MM-DD or RFC 3339). Defaults to now.
        #[arg(long)]
        end: Option<String>,
        /// Minimum magnitude filter
        #[arg(long)]
        min_mag: Option<f64>,
        /// Bounding box filter: `minlon,minlat,maxlon,maxlat`
        #[arg(long)]
        bbox: Option<String>,
        /// Maximum number of records to fetch
        #[arg(long)]
        limit: Option<u64>,
        /// Output folder for the dataset and data card
        #[arg(long, default_value = "./data")]
        out: PathBuf,
        /// Replace the existing dataset instead of merging into it
        #[arg(long)]
        overwrite: bool,
    },
    /// Fetch public holidays by country (Nager.Date)
    Holidays {
        /// ISO 3166-1 alpha-2 country code (e.g., FR, US, DE)
        #[arg(long)]
        country: String,
        /// Year or inclusive span like `2015:2025`. Defaults to the
        /// current year.
        #[arg(long)]
        years: Option<String>,
        /// Output folder for the dataset and data card
        #[arg(long, default_value = "./data")]
        out: PathBuf,
        /// Replace the existing dataset instead of merging into it
        #[arg(long)]
        overwrite: bool,
    },
    /// Fetch per-article page views (Wikimedia REST)
    Pageviews {
        /// Wiki project domain (e.g., `en.wikipedia`)
        #[arg(long, default_value = "en.wikipedia")]
        project: String,
        /// Comma-separated article titles
        #[arg(long)]
        articles: String,
        /// Access method: all-access, desktop, mobile-app, mobile-web
        #[arg(long, default_value = "all-access")]
        access: String,
        /// Agent: all-agents, user, spider, automated
        #[arg(long, default_value = "user")]
        agent: String,
        /// Bucket granularity: daily or monthly
        #[arg(long, default_value = "daily")]
        granularity: String,
        /// Window start, YYYYMMDD
        #[arg(long)]
        start: String,
        /// Window end, YYYYMMDD
        #[arg(long)]
        end: String,
        /// Output folder for the dataset and data card
        #[arg(long, default_value = "./data")]
        out: PathBuf,
        /// Replace the existing dataset instead of merging into it
        #[arg(long)]
        overwrite: bool,
    },
    /// Assemble a publish-ready dataset folder
    Package {
        /// Dataset title
        #[arg(long)]
        title: String,
        /// Owner account slug on the hosting platform
        #[arg(long)]
        owner: String,
        /// Dataset slug (lowercase-dash)
        #[arg(long)]
        slug: String,
        /// Files to include (CSV/Parquet/README)
        #[arg(long, num_args = 1.., required = true)]
        files: Vec<PathBuf>,
        /// Markdown description, shipped as README.md
        #[arg(long)]
        description: Option<PathBuf>,
        /// License short name (e.g., CC0-1.0, CC-BY-4.0)
        #[arg(long, default_value = "CC0-1.0")]
        license: String,
        /// Output folder for the package
        #[arg(long, default_value = "./kaggle_pkg")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = datamill_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Earthquakes {
            start,
            end,
            min_mag,
            bbox,
            limit,
            out,
            overwrite,
        } => {
            let run = EarthquakeRun {
                start: start.as_deref().map(parse_time_arg).transpose()?,
                end: end.as_deref().map(parse_time_arg).transpose()?,
                min_magnitude: min_mag,
                bounding_box: bbox
                    .as_deref()
                    .map(str::parse::<BoundingBox>)
                    .transpose()?,
                limit,
                out_dir: out,
                overwrite,
            };

            let bar = IndicatifProgress::records_bar(&multi, "Fetching earthquakes");
            let result = sync_earthquakes(&run, Some(bar.clone())).await;
            bar.finish_and_clear();
            let summary = result?;

            println!(
                "earthquakes: {} fetched, {} added, {} total",
                summary.fetched, summary.added, summary.total
            );
        }
        Commands::Holidays {
            country,
            years,
            out,
            overwrite,
        } => {
            let years = match years {
                Some(span) => parse_year_span(&span)?,
                None => vec![Utc::now().year()],
            };
            let run = HolidayRun {
                country,
                years,
                out_dir: out,
                overwrite,
            };

            let bar = IndicatifProgress::records_bar(&multi, "Fetching holidays");
            let result = sync_holidays(&run, Some(bar.clone())).await;
            bar.finish_and_clear();
            let summary = result?;

            println!(
                "holidays: {} fetched, {} added, {} total",
                summary.fetched, summary.added, summary.total
            );
        }
        Commands::Pageviews {
            project,
            articles,
            access,
            agent,
            granularity,
            start,
            end,
            out,
            overwrite,
        } => {
            let articles: Vec<String> = articles
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(String::from)
                .collect();

            let run = PageviewRun {
                project,
                articles,
                access: access
                    .parse()
                    .map_err(|e| format!("invalid --access {access:?}: {e}"))?,
                agent: agent
                    .parse()
                    .map_err(|e| format!("invalid --agent {agent:?}: {e}"))?,
                granularity: granularity
                    .parse()
                    .map_err(|e| format!("invalid --granularity {granularity:?}: {e}"))?,
                start,
                end,
                out_dir: out,
                overwrite,
            };

            let bar = IndicatifProgress::records_bar(&multi, "Fetching pageviews");
            let result = sync_pageviews(&run, Some(bar.clone())).await;
            bar.finish_and_clear();
            let summary = result?;

            println!(
                "pageviews: {} fetched, {} added, {} total",
                summary.fetched, summary.added, summary.total
            );
        }
        Commands::Package {
            title,
            owner,
            slug,
            files,
            description,
            license,
            out,
        } => {
            let spec = PackageSpec {
                title,
                owner,
                slug,
                files,
                description,
                license_name: license,
            };
            let path = datamill_publish::build_package(&spec, &out)?;

            println!("Package prepared at: {}", path.display());
            println!("Next steps:");
            println!("  1) Install the Kaggle CLI (pip install kaggle)");
            println!("  2) Place your API token at ~/.kaggle/kaggle.json (chmod 600)");
            println!("  3) Run: kaggle datasets create -p {}", path.display());
        }
    }

    Ok(())
}
