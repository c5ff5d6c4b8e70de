//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use pocsync_calls::CallsClient;
use pocsync_core::{ProgressReporter, sync_calls, sync_selected_transcripts, sync_transcript};
use pocsync_docs::{DocsResolver, Priority, SuccessCriterion, TechStackEntry};
use pocsync_shared::{
    AppConfig, SearchFilter, database_path, init_config, load_config, parse_search_bound,
    resolve_calls_config,
};
use pocsync_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// pocsync: call search and POC documentation helper.
#[derive(Parser)]
#[command(
    name = "pocsync",
    version,
    about = "Search recorded calls by customer domain, collect transcripts, and map tech stacks to docs.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Database path (overrides the configured one).
    #[arg(long, global = true, env = "POCSYNC_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Search and store recorded calls.
    Calls {
        #[command(subcommand)]
        action: CallsAction,
    },

    /// Documentation links for a tech stack.
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum CallsAction {
    /// Search calls whose participants belong to a domain and store them.
    Search {
        /// Customer email domain, e.g. acme.com.
        domain: String,

        /// Range start: YYYY-MM-DD or RFC 3339 (default 2020-01-01).
        #[arg(long)]
        from: Option<String>,

        /// Range end: YYYY-MM-DD or RFC 3339 (default now).
        #[arg(long)]
        to: Option<String>,
    },

    /// List stored calls for a domain, newest first.
    List {
        domain: String,
    },

    /// Mark a call for transcript analysis.
    Select {
        /// Upstream call id.
        external_id: String,

        /// Clear the selection instead.
        #[arg(long)]
        off: bool,
    },

    /// Fetch and store one call's transcript.
    Transcript {
        /// Upstream call id.
        external_id: String,

        /// Print the transcript after storing it.
        #[arg(long)]
        print: bool,
    },

    /// Fetch transcripts for every selected call of a domain that has none.
    Transcripts {
        domain: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum DocsAction {
    /// Resolve a technology name to a platform or framework guide.
    Resolve {
        name: String,
    },

    /// Generate documentation links for a tech stack.
    Links {
        /// Technology names (repeatable).
        #[arg(long = "tech", required = true)]
        tech: Vec<String>,

        /// High-priority success-criterion features (repeatable).
        #[arg(long = "feature")]
        feature: Vec<String>,
    },

    /// List known platforms and framework guides.
    Platforms,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "pocsync=info",
        1 => "pocsync=debug",
        _ => "pocsync=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let db = cli.db;
    match cli.command {
        Command::Calls { action } => {
            let config = load_config()?;
            let db_path = match db {
                Some(path) => path,
                None => database_path(&config)?,
            };
            match action {
                CallsAction::Search { domain, from, to } => {
                    cmd_calls_search(&config, &db_path, &domain, from.as_deref(), to.as_deref())
                        .await
                }
                CallsAction::List { domain } => cmd_calls_list(&db_path, &domain).await,
                CallsAction::Select { external_id, off } => {
                    cmd_calls_select(&db_path, &external_id, !off).await
                }
                CallsAction::Transcript { external_id, print } => {
                    cmd_calls_transcript(&config, &db_path, &external_id, print).await
                }
                CallsAction::Transcripts { domain } => {
                    cmd_calls_transcripts(&config, &db_path, &domain).await
                }
            }
        }
        Command::Docs { action } => {
            let resolver = docs_resolver(&load_config()?)?;
            match action {
                DocsAction::Resolve { name } => cmd_docs_resolve(&resolver, &name),
                DocsAction::Links { tech, feature } => cmd_docs_links(&resolver, &tech, &feature),
                DocsAction::Platforms => cmd_docs_platforms(&resolver),
            }
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

fn calls_client(config: &AppConfig) -> Result<CallsClient> {
    let client_config = resolve_calls_config(config)?;
    if client_config.credentials.is_none() {
        return Err(eyre!(
            "calls API credentials missing: set {} and {}",
            config.calls_api.access_key_env,
            config.calls_api.access_key_secret_env
        ));
    }
    Ok(CallsClient::new(&client_config)?)
}

fn docs_resolver(config: &AppConfig) -> Result<DocsResolver> {
    let resolver = if config.docs.taxonomy_path.is_empty() {
        DocsResolver::builtin()?
    } else {
        DocsResolver::from_path(Path::new(&config.docs.taxonomy_path))?
    };
    Ok(resolver)
}

// ---------------------------------------------------------------------------
// calls
// ---------------------------------------------------------------------------

async fn cmd_calls_search(
    config: &AppConfig,
    db_path: &Path,
    domain: &str,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<()> {
    let from = from.map(parse_search_bound).transpose()?;
    let to = to.map(parse_search_bound).transpose()?;
    let filter = SearchFilter::new(domain, from, to)?;
    let client = calls_client(config)?;
    let storage = Storage::open(db_path).await?;

    info!(
        domain = %filter.domain,
        from = %filter.from_param(),
        to = %filter.to_param(),
        "searching calls"
    );

    let reporter = CliProgress::new()?;
    let result = sync_calls(&client, &storage, &filter, &reporter).await;
    reporter.finish();
    let result = result?;

    println!();
    println!("  Calls synced for {}", result.domain);
    println!("  Found:    {}", result.found);
    println!("  Inserted: {}", result.inserted);
    println!("  Updated:  {}", result.updated);
    println!("  Time:     {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_calls_list(db_path: &Path, domain: &str) -> Result<()> {
    let storage = Storage::open_readonly(db_path).await?;
    let domain = domain.trim().to_lowercase();
    let calls = storage.list_calls(&domain).await?;

    if calls.is_empty() {
        println!("No calls stored for {domain}.");
        return Ok(());
    }

    for stored in &calls {
        let started = stored
            .call
            .started_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".into());
        let selected = if stored.selected_for_analysis { "*" } else { " " };
        let transcript = if stored.transcript_fetched_at.is_some() { "T" } else { " " };
        println!(
            "{selected}{transcript} {started:<16}  {:>5}m  {:<24}  {}",
            stored.call.duration_seconds / 60,
            stored.call.external_call_id,
            stored.call.title
        );
    }
    println!();
    println!("  {} calls (* selected, T transcript stored)", calls.len());

    Ok(())
}

async fn cmd_calls_select(db_path: &Path, external_id: &str, selected: bool) -> Result<()> {
    let storage = Storage::open(db_path).await?;
    storage.set_selected(external_id, selected).await?;
    if selected {
        println!("Selected {external_id} for analysis.");
    } else {
        println!("Cleared selection for {external_id}.");
    }
    Ok(())
}

async fn cmd_calls_transcript(
    config: &AppConfig,
    db_path: &Path,
    external_id: &str,
    print: bool,
) -> Result<()> {
    let client = calls_client(config)?;
    let storage = Storage::open(db_path).await?;
    let result = sync_transcript(&client, &storage, external_id).await?;

    if print {
        println!("{}", result.text);
    } else if result.text.is_empty() {
        println!("No transcript available for {external_id}.");
    } else {
        println!(
            "Stored transcript for {external_id}: {} lines, {} chars.",
            result.lines,
            result.text.len()
        );
    }
    Ok(())
}

async fn cmd_calls_transcripts(config: &AppConfig, db_path: &Path, domain: &str) -> Result<()> {
    let client = calls_client(config)?;
    let storage = Storage::open(db_path).await?;
    let domain = domain.trim().to_lowercase();

    let reporter = CliProgress::new()?;
    let batch = sync_selected_transcripts(&client, &storage, &domain, &reporter).await;
    reporter.finish();
    let batch = batch?;

    println!();
    println!("  Transcripts fetched: {}", batch.fetched.len());
    println!("  Failed:              {}", batch.failed.len());
    for failure in &batch.failed {
        println!("    {}: {}", failure.external_call_id, failure.error);
    }
    println!();

    if batch.failed.is_empty() {
        Ok(())
    } else {
        Err(eyre!("{} transcript(s) could not be fetched", batch.failed.len()))
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Result<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Ok(Self { spinner })
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn call_stored(&self, external_call_id: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Storing [{current}/{total}] {external_call_id}"));
    }

    fn transcript_finished(&self, external_call_id: &str, ok: bool, current: usize, total: usize) {
        let status = if ok { "ok" } else { "failed" };
        self.spinner.set_message(format!(
            "Transcripts [{current}/{total}] {external_call_id} {status}"
        ));
    }
}

// ---------------------------------------------------------------------------
// docs
// ---------------------------------------------------------------------------

fn cmd_docs_resolve(resolver: &DocsResolver, name: &str) -> Result<()> {
    let Some(found) = resolver.resolve_platform(name) else {
        return Err(eyre!("no platform matches '{name}'"));
    };
    println!("{}", serde_json::to_string_pretty(&found)?);
    Ok(())
}

fn cmd_docs_links(resolver: &DocsResolver, tech: &[String], features: &[String]) -> Result<()> {
    let stack: Vec<TechStackEntry> = tech.iter().map(TechStackEntry::named).collect();
    let criteria: Vec<SuccessCriterion> = features
        .iter()
        .map(|feature| SuccessCriterion {
            feature: feature.clone(),
            priority: Priority::High,
        })
        .collect();

    let links = resolver.generate_links(&stack, &criteria);
    if links.is_empty() {
        println!("No documentation links: none of the technologies were recognized.");
        return Ok(());
    }

    for link in &links {
        println!("{:>3}. [{}] {}", link.sort_order, link.category, link.title);
        println!("     {}", link.url);
    }
    Ok(())
}

fn cmd_docs_platforms(resolver: &DocsResolver) -> Result<()> {
    for option in resolver.available_platforms() {
        match &option.guide_key {
            Some(guide) => println!("    {:<24} {}/{guide}", option.name, option.platform_key),
            None => println!("{:<28} {} ({})", option.name, option.platform_key, option.category),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_search_with_range_and_global_flags() {
        let cli = Cli::try_parse_from([
            "pocsync", "-vv", "--db", "/tmp/p.db", "calls", "search", "acme.com", "--from",
            "2024-01-01",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.db.as_deref(), Some(Path::new("/tmp/p.db")));
        match cli.command {
            Command::Calls {
                action: CallsAction::Search { domain, from, to },
            } => {
                assert_eq!(domain, "acme.com");
                assert_eq!(from.as_deref(), Some("2024-01-01"));
                assert_eq!(to, None);
            }
            _ => panic!("expected calls search"),
        }
    }

    #[test]
    fn docs_links_requires_a_tech() {
        assert!(Cli::try_parse_from(["pocsync", "docs", "links", "--feature", "Profiling"]).is_err());
        let cli = Cli::try_parse_from([
            "pocsync", "docs", "links", "--tech", "React", "--tech", "Django", "--feature",
            "Session Replay",
        ])
        .unwrap();
        match cli.command {
            Command::Docs {
                action: DocsAction::Links { tech, feature },
            } => {
                assert_eq!(tech, ["React", "Django"]);
                assert_eq!(feature, ["Session Replay"]);
            }
            _ => panic!("expected docs links"),
        }
    }
}
