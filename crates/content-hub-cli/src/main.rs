use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use content_hub_core::{
    BundleReport, Category, Config, ContentCache, ContentService, Download, DownloadLedger,
    DownloadOutcome, FolderTarget, GhCliCredentials, HubError, LocalLayout, RemoteContentClient,
    RepoSource, ReqwestTransport, Result, UpdateDetector,
};

mod args;
mod prompt;

use args::{Cli, Commands, ConfigAction, RepoAction, Shell};
use prompt::TerminalInteraction;

const LOG_ENV: &str = "CONTENT_HUB_LOG";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let base_dir = resolve_base_dir(cli.base_dir)?;
    debug!("Base directory: {}", base_dir.display());

    match cli.command {
        Some(Commands::List { category }) => handle_list(&base_dir, category.as_deref()).await,
        Some(Commands::Download {
            category,
            name,
            repo,
            target,
            yes,
        }) => {
            handle_download(
                &base_dir,
                &category,
                &name,
                repo.as_deref(),
                target.as_deref(),
                yes,
            )
            .await
        }
        Some(Commands::Updates { category }) => {
            handle_updates(&base_dir, category.as_deref()).await
        }
        Some(Commands::Repo { action }) => handle_repo(action, &base_dir),
        Some(Commands::Config { action }) => handle_config(action, &base_dir),
        Some(Commands::Completions { shell }) => {
            handle_completions(shell);
            Ok(())
        }
        None => {
            Cli::command().print_help().ok();
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let shell = match shell {
        Shell::Bash => clap_complete::Shell::Bash,
        Shell::Zsh => clap_complete::Shell::Zsh,
        Shell::Fish => clap_complete::Shell::Fish,
        Shell::PowerShell => clap_complete::Shell::PowerShell,
        Shell::Elvish => clap_complete::Shell::Elvish,
    };
    generate(shell, &mut cmd, "content-hub", &mut io::stdout());
}

fn resolve_base_dir(cli_base: Option<PathBuf>) -> Result<PathBuf> {
    match cli_base {
        Some(base) => Ok(base),
        None => Config::default_base_dir(),
    }
}

fn build_service(config: &Config, interaction: Arc<TerminalInteraction>) -> Result<ContentService> {
    let client = RemoteContentClient::new(
        Arc::new(ReqwestTransport::new()?),
        Arc::new(GhCliCredentials),
        interaction,
        config.client_settings(),
    );
    Ok(
        ContentService::new(client, config.repos.clone(), ContentCache::new(config.ttl()))
            .with_max_concurrency(config.network.max_concurrency),
    )
}

fn parse_categories(category: Option<&str>) -> Result<Vec<Category>> {
    match category {
        Some(name) => Ok(vec![name.parse()?]),
        None => Ok(Category::ALL.to_vec()),
    }
}

fn print_warning(err: &HubError) {
    eprintln!("{} {}", "[WARN]".yellow().bold(), err);
}

// ========== list ==========

async fn handle_list(base_dir: &Path, category: Option<&str>) -> Result<()> {
    let categories = parse_categories(category)?;
    let config = Config::load(base_dir)?;
    if config.repos.is_empty() {
        println!("No repositories configured. Add one with: content-hub repo add owner/repo");
        return Ok(());
    }
    let service = build_service(&config, Arc::new(TerminalInteraction::new(false)))?;

    for category in categories {
        let mut listing = service.fetch_merged(category).await;
        listing
            .entries
            .sort_by(|a, b| a.display_name.cmp(&b.display_name));

        println!();
        println!(
            "{} ({})",
            category.to_string().cyan().bold(),
            listing.entries.len()
        );
        if listing.entries.is_empty() {
            println!("  {}", "(none)".dimmed());
        }
        for entry in &listing.entries {
            let suffix = if entry.is_dir() { "/" } else { "" };
            println!(
                "  {}{}  {}",
                entry.display_name,
                suffix,
                entry.repo.display_name().dimmed()
            );
        }
        for err in &listing.errors {
            print_warning(err);
        }
    }
    println!();

    Ok(())
}

// ========== download ==========

async fn handle_download(
    base_dir: &Path,
    category: &str,
    name: &str,
    repo: Option<&str>,
    target: Option<&Path>,
    yes: bool,
) -> Result<()> {
    let category: Category = category.parse()?;
    let config = Config::load(base_dir)?;
    let service = build_service(&config, Arc::new(TerminalInteraction::new(yes)))?;

    let entry = service.find_entry(category, name, repo).await?;
    let workdir = std::env::current_dir()?;
    let layout = match target {
        Some(root) => LocalLayout::under(&workdir, root),
        None => config.layout(&workdir),
    };

    println!(
        "Downloading {} from {}...",
        entry.display_name.cyan(),
        entry.repo.display_name()
    );
    let download = service.downloader(layout).download(&entry, category).await?;

    match &download {
        Download::File(DownloadOutcome::Written { path, .. }) => {
            println!("{} {}", "Downloaded:".green(), path.display());
        }
        Download::File(DownloadOutcome::Skipped { path }) => {
            println!("{} {} (kept existing file)", "Skipped:".yellow(), path.display());
        }
        Download::File(DownloadOutcome::Cancelled) => {
            println!("Cancelled.");
        }
        Download::Bundle(report) => print_bundle_report(report),
    }

    let records = download.records();
    if !records.is_empty() {
        let mut ledger = DownloadLedger::load(base_dir)?;
        for record in records {
            ledger.record(record);
        }
        ledger.save(base_dir)?;
    }

    Ok(())
}

fn print_bundle_report(report: &BundleReport) {
    if report.skipped {
        println!(
            "{} {} (kept existing folder)",
            "Skipped:".yellow(),
            report.target.display()
        );
        return;
    }

    println!();
    println!(
        "{} {}",
        "Bundle:".cyan().bold(),
        report.bundle_id.bold()
    );
    println!("  downloaded: {}", report.downloaded_count.to_string().green());
    if report.error_count > 0 {
        println!("  failed:     {}", report.error_count.to_string().red());
        for path in &report.failed_paths {
            println!("    {} {}", "[FAIL]".red(), path);
        }
    }
    println!("  location:   {}", report.target.display());

    if report.is_complete() {
        println!("{}", "Download complete.".green());
    } else {
        println!(
            "{}",
            "Download finished with errors; run with -v for details.".yellow()
        );
    }
}

// ========== updates ==========

async fn handle_updates(base_dir: &Path, category: Option<&str>) -> Result<()> {
    let ledger = DownloadLedger::load(base_dir)?;
    if ledger.is_empty() {
        println!("No downloads recorded yet.");
        return Ok(());
    }

    let wanted = parse_categories(category)?;
    let categories: Vec<Category> = recorded_categories(&ledger)
        .into_iter()
        .filter(|c| wanted.contains(c))
        .collect();

    let config = Config::load(base_dir)?;
    let service = build_service(&config, Arc::new(TerminalInteraction::new(false)))?;

    let mut found = 0usize;
    for category in categories {
        let listing = service.fetch_merged(category).await;
        for err in &listing.errors {
            print_warning(err);
        }
        for candidate in ledger.check(&listing.entries, category) {
            found += 1;
            println!(
                "{} {}/{}  {}  (downloaded {})",
                "[UPDATE]".yellow().bold(),
                category,
                candidate.entry.display_name.cyan(),
                candidate.entry.repo.display_name().dimmed(),
                candidate
                    .recorded
                    .downloaded_at
                    .with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M")
            );
        }
    }

    if found == 0 {
        println!("{}", "All downloads are up to date.".green());
    } else {
        println!();
        println!("{} update(s) available.", found);
    }
    Ok(())
}

/// Categories that appear in recorded item ids (`identity|category|path`)
fn recorded_categories(ledger: &DownloadLedger) -> Vec<Category> {
    let mut categories: Vec<Category> = ledger
        .records()
        .filter_map(|r| r.item_id.split('|').nth(1))
        .filter_map(|c| c.parse().ok())
        .collect();
    categories.sort();
    categories.dedup();
    categories
}

// ========== repo ==========

fn handle_repo(action: RepoAction, base_dir: &Path) -> Result<()> {
    let mut config = Config::load(base_dir)?;

    match action {
        RepoAction::List => {
            if config.repos.is_empty() {
                println!("No repositories configured.");
                return Ok(());
            }
            println!();
            for repo in &config.repos {
                println!("  {}", repo.display_name().cyan().bold());
                if let Some(base) = repo.enterprise_base() {
                    println!("    host:   {}", base);
                }
                if let Some(branch) = &repo.branch {
                    println!("    branch: {}", branch);
                }
                for (category, target) in &repo.folder_mappings {
                    println!("    {} -> {}", category, target.as_config_str());
                }
            }
            println!();
        }
        RepoAction::Add {
            repo,
            base_url,
            branch,
            label,
        } => {
            let mut source = RepoSource::parse(&repo)?;
            if let Some(base) = base_url {
                source = source.with_base_url(base);
            }
            if let Some(branch) = branch {
                source = source.with_branch(branch);
            }
            if let Some(label) = label {
                source = source.with_label(label);
            }
            let name = source.display_name();
            config.add_repo(source)?;
            config.save(base_dir)?;
            println!("{} {}", "Added:".green(), name);
        }
        RepoAction::Remove { repo } => {
            let removed = config.remove_repo(&repo)?;
            config.save(base_dir)?;
            println!("{} {}", "Removed:".red(), removed.display_name());
        }
        RepoAction::Map {
            repo,
            category,
            target,
        } => {
            let category: Category = category.parse()?;
            let mapping = match target.trim() {
                "default" => None,
                other => Some(FolderTarget::from(Some(other))),
            };
            let shown = mapping
                .as_ref()
                .map(|t| t.as_config_str().to_string())
                .unwrap_or_else(|| category.dir_name().to_string());
            let name = config.map_folder(&repo, category, mapping)?.display_name();
            config.save(base_dir)?;
            println!("{} {}: {} -> {}", "Mapped:".green(), name, category, shown);
        }
    }

    Ok(())
}

// ========== config ==========

fn handle_config(action: ConfigAction, base_dir: &Path) -> Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load(base_dir)?;
            match config.get(&key) {
                Some(value) => {
                    println!("{}", value);
                }
                None => {
                    return Err(HubError::ConfigKeyNotFound { key });
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load(base_dir)?;
            config.set(&key, &value)?;
            config.save(base_dir)?;
            let shown = config.get(&key).unwrap_or(value);
            println!("{} {} = {}", "Set:".green(), key, shown);
        }
        ConfigAction::List => {
            let config = Config::load(base_dir)?;
            println!();
            for (key, value) in config.list() {
                println!("{} = {}", key.cyan(), value);
            }
            println!();
        }
        ConfigAction::Path => {
            let path = Config::path(base_dir);
            println!("{}", path.display());
        }
        ConfigAction::Init => {
            let path = Config::init(base_dir)?;
            println!("{} {}", "Initialized:".green(), path.display());
        }
    }

    Ok(())
}
