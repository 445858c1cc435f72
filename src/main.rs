use anyhow::Context;
use clap::{Parser, Subcommand};
use litharvest::client::query::DateInput;
use litharvest::{
    get_provider, Config, PaperFilter, Pipeline, ResultEnvelope, SearchQueryBuilder, SqliteCatalog,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "litharvest", version, about = "Harvest and deduplicate scholarly papers")]
struct Cli {
    /// Path to a configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch papers from the provider and upsert them into the catalog
    Fetch {
        /// Free search terms (flexible match)
        terms: Vec<String>,

        /// Terms every result must contain (exact match)
        #[arg(long = "include")]
        inclusions: Vec<String>,

        /// Terms no result may contain
        #[arg(long = "exclude")]
        exclusions: Vec<String>,

        /// Lower date bound: a year or YYYY-MM-DD
        #[arg(long)]
        after: Option<String>,

        /// Upper date bound: a year or YYYY-MM-DD
        #[arg(long)]
        before: Option<String>,

        /// Upper bound on fetched entries
        #[arg(long, default_value_t = 200)]
        max_results: u32,

        /// Write the run's papers as a JSON envelope
        #[arg(long)]
        export: bool,
    },
    /// Search the local catalog
    Query {
        /// Substring to match against titles and abstracts
        text: Option<String>,

        /// Restrict to one source
        #[arg(long)]
        source: Option<String>,

        /// Earliest publication year
        #[arg(long)]
        start_year: Option<i32>,

        /// Latest publication year
        #[arg(long)]
        end_year: Option<i32>,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show catalog statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    init_tracing(&config);

    match cli.command {
        Command::Fetch {
            terms,
            inclusions,
            exclusions,
            after,
            before,
            max_results,
            export,
        } => {
            config.validate()?;

            let mut query = SearchQueryBuilder::new();
            query.add_terms(terms.iter().map(String::as_str), false);
            for term in &inclusions {
                query.add_inclusion(term, false);
            }
            for term in &exclusions {
                query.add_exclusion(term, false);
            }
            if let Some(after) = after {
                query.after(DateInput::Text(after))?;
            }
            if let Some(before) = before {
                query.before(DateInput::Text(before))?;
            }
            if query.is_empty() {
                anyhow::bail!("nothing to search for: give at least one term");
            }

            let provider = get_provider(&config.provider.name, &config.provider)?;
            let catalog = SqliteCatalog::open(&config.database.path)?;
            let mut pipeline = Pipeline::new(provider, catalog);

            let report = pipeline.run(&query, max_results).await?;
            println!("{report}");

            if export {
                let envelope = ResultEnvelope::new(
                    report.papers,
                    query.render(),
                    config.provider.name.clone(),
                    query.start_year(),
                    query.end_year(),
                );
                let path = envelope.write_json(&config.export.directory)?;
                println!("wrote {}", path.display());
            }
        }
        Command::Query {
            text,
            source,
            start_year,
            end_year,
            limit,
        } => {
            let catalog = SqliteCatalog::open(&config.database.path)?;
            let mut filter = PaperFilter::new();
            filter.text = text;
            filter.source = source;
            filter.start_year = start_year;
            filter.end_year = end_year;
            filter.limit = limit;

            let papers = catalog.search_papers(&filter)?;
            if papers.is_empty() {
                println!("no matching papers");
            }
            for paper in papers {
                let doi = paper.doi.as_deref().unwrap_or("-");
                println!("{doi}  {paper}");
            }
        }
        Command::Stats => {
            let catalog = SqliteCatalog::open(&config.database.path)?;
            let stats = catalog.stats()?;
            println!("papers:  {}", stats.total_papers);
            println!("authors: {}", stats.total_authors);
            for (source, count) in &stats.papers_by_source {
                println!("  {source}: {count}");
            }
            if !stats.top_keywords.is_empty() {
                println!("top keywords:");
                for (keyword, count) in &stats.top_keywords {
                    println!("  {keyword} ({count})");
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
