//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use cfpscout_core::{
    ExtractionConfig, ExtractionSummary, JsonLinesSink, ProgressReporter, UrlOutcome,
    run_extraction,
};
use cfpscout_fetch::{DisabledRenderer, FetchOptions, FetchOutcome, Fetcher, Renderer};
use cfpscout_shared::{
    AppConfig, ExtractionSettings, FetchConfig, RetryPolicy, expand_home, init_config,
    load_config,
};
use cfpscout_storage::{UrlStats, UrlStore};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// cfpscout: find and extract call-for-papers records.
#[derive(Parser)]
#[command(
    name = "cfpscout",
    version,
    about = "Queue CFP pages, fetch them, and extract structured call-for-papers records.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Data directory holding urls.db and the HTML cache.
    #[arg(long, global = true, env = "CFPSCOUT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

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
    /// Queue a URL for extraction.
    Add {
        /// Landing page of the CFP.
        url: String,

        /// Provenance tag (e.g. "manual", "confs.tech").
        #[arg(short, long, default_value = "manual")]
        source: String,

        /// Event name to fall back on when the page has none.
        #[arg(short, long)]
        name: Option<String>,

        /// Direct submission link, if different from the landing page.
        #[arg(long)]
        submission_url: Option<String>,
    },

    /// Queue every URL listed in a file (one per line, `#` comments).
    Import {
        /// File with one URL per line.
        file: PathBuf,

        /// Provenance tag for every imported URL.
        #[arg(short, long, default_value = "import")]
        source: String,
    },

    /// Fetch queued URLs and extract CFP records.
    Extract {
        /// Process at most this many URLs.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Also retry failed URLs whose backoff has elapsed.
        #[arg(long)]
        retry: bool,

        /// Only retry failed URLs; leave pending ones alone.
        #[arg(long, conflicts_with = "retry")]
        retry_only: bool,

        /// Retry failed URLs regardless of their backoff window.
        #[arg(long)]
        ignore_backoff: bool,

        /// Maximum URLs in flight (defaults to config).
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Skip the HTML cache.
        #[arg(long)]
        no_cache: bool,

        /// JSON-lines file receiving extracted records
        /// (defaults to <data-dir>/records.jsonl).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Fetch a single URL and report how it was served.
    Fetch {
        url: String,

        /// Skip the HTML cache.
        #[arg(long)]
        no_cache: bool,
    },

    /// Show URL store statistics.
    Stats {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Move failed URLs back to pending.
    ResetFailed {
        /// Only reset entries with this error reason (e.g. low_confidence, 404).
        #[arg(long)]
        reason: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
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
        0 => "cfpscout=info",
        1 => "cfpscout=debug",
        _ => "cfpscout=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

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
    let data_dir = cli.data_dir;
    match cli.command {
        Command::Add {
            url,
            source,
            name,
            submission_url,
        } => {
            cmd_add(
                data_dir,
                &url,
                &source,
                name.as_deref(),
                submission_url.as_deref(),
            )
            .await
        }
        Command::Import { file, source } => cmd_import(data_dir, &file, &source).await,
        Command::Extract {
            limit,
            retry,
            retry_only,
            ignore_backoff,
            concurrency,
            no_cache,
            out,
        } => {
            let opts = ExtractArgs {
                limit,
                retry,
                retry_only,
                ignore_backoff,
                concurrency,
                no_cache,
                out,
            };
            cmd_extract(data_dir, opts).await
        }
        Command::Fetch { url, no_cache } => cmd_fetch(data_dir, &url, no_cache).await,
        Command::Stats { json } => cmd_stats(data_dir, json).await,
        Command::ResetFailed { reason } => cmd_reset_failed(data_dir, reason.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Shared setup
// ---------------------------------------------------------------------------

/// Loaded config plus the resolved data directory.
struct Context {
    config: AppConfig,
    data_dir: PathBuf,
}

impl Context {
    fn load(data_dir: Option<PathBuf>) -> Result<Self> {
        let config = load_config()?;
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => expand_home(&config.defaults.data_dir)?,
        };
        debug!(data_dir = %data_dir.display(), "resolved data directory");
        Ok(Self { config, data_dir })
    }

    async fn store(&self) -> Result<UrlStore> {
        let policy = RetryPolicy::from(&self.config);
        Ok(UrlStore::open_with_policy(&self.data_dir.join("urls.db"), policy).await?)
    }

    fn fetcher(&self) -> Result<Fetcher> {
        let fetch_config = FetchConfig::from(&self.config);
        let renderer = build_renderer(&fetch_config);
        Ok(Fetcher::new(
            fetch_config,
            &self.data_dir.join("cache"),
            renderer,
        )?)
    }
}

#[cfg(feature = "chromium")]
fn build_renderer(config: &FetchConfig) -> Arc<dyn Renderer> {
    use cfpscout_fetch::{ChromiumLauncher, HeadlessRenderer};

    if config.render {
        Arc::new(HeadlessRenderer::new(ChromiumLauncher::new(), config.settle))
    } else {
        Arc::new(DisabledRenderer)
    }
}

#[cfg(not(feature = "chromium"))]
fn build_renderer(config: &FetchConfig) -> Arc<dyn Renderer> {
    if config.render {
        debug!("built without the chromium feature; client-rendered pages will fail");
    }
    Arc::new(DisabledRenderer)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_add(
    data_dir: Option<PathBuf>,
    url: &str,
    source: &str,
    name: Option<&str>,
    submission_url: Option<&str>,
) -> Result<()> {
    let ctx = Context::load(data_dir)?;
    let store = ctx.store().await?;

    let is_new = store.add(url, source, name, submission_url).await?;
    info!(url, source, is_new, "url added");
    if is_new {
        println!("Added {url}");
    } else {
        println!("Already queued: {url}");
    }
    Ok(())
}

async fn cmd_import(data_dir: Option<PathBuf>, file: &Path, source: &str) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| eyre!("cannot read '{}': {e}", file.display()))?;

    let ctx = Context::load(data_dir)?;
    let store = ctx.store().await?;

    let mut added = 0usize;
    let mut existing = 0usize;
    for url in parse_url_list(&content) {
        if store.add(url, source, None, None).await? {
            added += 1;
        } else {
            existing += 1;
        }
    }

    info!(file = %file.display(), added, existing, "import complete");
    println!("Imported {added} new URL(s), {existing} already queued.");
    Ok(())
}

/// URLs from a newline-separated list, skipping blanks and `#` comments.
fn parse_url_list(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

struct ExtractArgs {
    limit: Option<usize>,
    retry: bool,
    retry_only: bool,
    ignore_backoff: bool,
    concurrency: Option<usize>,
    no_cache: bool,
    out: Option<PathBuf>,
}

async fn cmd_extract(data_dir: Option<PathBuf>, args: ExtractArgs) -> Result<()> {
    let ctx = Context::load(data_dir)?;
    let store = Arc::new(ctx.store().await?);
    let fetcher = ctx.fetcher()?;

    let settings = ExtractionSettings::from(&ctx.config);
    let config = ExtractionConfig {
        limit: args.limit,
        include_retries: args.retry,
        retry_only: args.retry_only,
        ignore_backoff: args.ignore_backoff,
        concurrency: args.concurrency.unwrap_or(settings.concurrency).max(1),
        use_cache: !args.no_cache,
        ..ExtractionConfig::from(&settings)
    };

    let out = args
        .out
        .unwrap_or_else(|| ctx.data_dir.join("records.jsonl"));
    let sink = JsonLinesSink::new(&out);

    let reporter = CliProgress::new();
    let summary = run_extraction(store, &fetcher, Some(&sink), &config, &reporter).await?;

    print_summary(&summary, &out);
    Ok(())
}

fn print_summary(summary: &ExtractionSummary, out: &Path) {
    println!();
    println!("  Attempted:  {}", summary.attempted);
    println!("  Extracted:  {}", summary.extracted);
    println!("  Failed:     {}", summary.failed);
    if summary.indexed > 0 {
        println!("  Written:    {} -> {}", summary.indexed, out.display());
    }
    for (url, error) in &summary.sink_errors {
        println!("  Not written: {url} ({error})");
    }
    if !summary.error_reasons.is_empty() {
        println!("  Errors:");
        for (reason, count) in &summary.error_reasons {
            println!("    {reason:<20} {count}");
        }
    }
    println!(
        "  Queue:      {} pending, {} ready to retry, {} waiting, {} permanently failed",
        summary.stats.pending,
        summary.stats.ready_to_retry,
        summary.stats.waiting_backoff,
        summary.stats.permanently_failed
    );
    println!("  Time:       {:.1}s", summary.elapsed.as_secs_f64());
    println!();
}

async fn cmd_fetch(data_dir: Option<PathBuf>, url: &str, no_cache: bool) -> Result<()> {
    let ctx = Context::load(data_dir)?;
    let fetcher = ctx.fetcher()?;
    let opts = FetchOptions {
        use_cache: !no_cache,
        ..fetcher.default_options()
    };

    let outcome = fetcher.fetch(url, &opts).await;

    println!();
    println!("  Result:  {}", outcome.label());
    println!("  Method:  {}", outcome.method());
    println!("  SPA:     {}", outcome.is_spa());
    if let Some(status) = outcome.http_status() {
        println!("  Status:  {status}");
    }
    match &outcome {
        FetchOutcome::Failed { reason, .. } => println!("  Reason:  {reason}"),
        other => {
            let len = other.html().map_or(0, str::len);
            println!("  HTML:    {len} bytes");
        }
    }
    println!();
    Ok(())
}

async fn cmd_stats(data_dir: Option<PathBuf>, json: bool) -> Result<()> {
    let ctx = Context::load(data_dir)?;
    let stats = ctx.store().await?.stats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_stats(&stats);
    }
    Ok(())
}

fn print_stats(stats: &UrlStats) {
    println!();
    println!("  Total:      {}", stats.total);
    println!("  Pending:    {}", stats.pending);
    println!(
        "  Extracted:  {} ({} static, {} rendered, {:.0}% SPA)",
        stats.extracted,
        stats.static_extracted,
        stats.spa_extracted,
        stats.spa_ratio() * 100.0
    );
    println!(
        "  Failed:     {} ({} ready to retry, {} waiting, {} permanent)",
        stats.failed, stats.ready_to_retry, stats.waiting_backoff, stats.permanently_failed
    );

    if !stats.by_source.is_empty() {
        println!("  Sources:");
        for (source, count) in &stats.by_source {
            println!("    {source:<20} {count}");
        }
    }
    if !stats.error_reasons.is_empty() {
        println!("  Errors:");
        for (reason, count) in &stats.error_reasons {
            println!("    {reason:<20} {count}");
        }
    }
    if !stats.retry_attempts.is_empty() {
        println!("  Retries:");
        for (attempts, count) in &stats.retry_attempts {
            println!("    {attempts:<20} {count}");
        }
    }
    println!();
}

async fn cmd_reset_failed(data_dir: Option<PathBuf>, reason: Option<&str>) -> Result<()> {
    let ctx = Context::load(data_dir)?;
    let store = ctx.store().await?;
    let count = store.reset_failed(reason).await?;
    info!(count, reason = reason.unwrap_or("any"), "failed entries reset");
    println!("Reset {count} failed URL(s) to pending.");
    Ok(())
}

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

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner, then a bar once the
/// batch size is known.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            bar.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn started(&self, total: usize) {
        self.bar.set_length(total as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        {
            self.bar.set_style(style.progress_chars("=> "));
        }
    }

    fn url_finished(&self, url: &str, outcome: &UrlOutcome, _current: usize, _total: usize) {
        let status = match outcome {
            UrlOutcome::Extracted { method, cached: true, .. } => format!("{method}, cached"),
            UrlOutcome::Extracted { method, .. } => method.to_string(),
            UrlOutcome::Failed { reason, .. } => format!("failed: {reason}"),
        };
        self.bar.inc(1);
        self.bar.set_message(format!("{url} ({status})"));
    }

    fn done(&self, _summary: &ExtractionSummary) {
        self.bar.finish_and_clear();
    }
}
