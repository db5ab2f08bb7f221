use std::{
    env,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use prmonitor_rs::{
    config::{self, MonitorConfig, Repository},
    github::GithubClient,
    monitor::Monitor,
    notify::WebhookNotifier,
    ChangesetOwners, RuleSet,
};

#[derive(Parser)]
#[command(version, about = "Audit open pull requests and resolve CODEOWNERS")]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a monitoring pass over a repository's open pull requests
    Check {
        /// Repository as owner/name (overrides the config file)
        #[arg(long)]
        repo: Option<Repository>,

        /// Path to the config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Report only; don't assign, comment, open issues or notify
        #[arg(long)]
        dry_run: bool,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,

        /// Exit with status 1 if any pull request needs attention
        #[arg(long)]
        fail_on_findings: bool,
    },

    /// Print the owners of local files
    Owners {
        paths: Vec<PathBuf>,

        #[arg(short = 'f', long = "file")]
        codeowners_file: Option<PathBuf>,

        /// List every matching rule, not just the one that applies
        #[arg(long)]
        all_matching_rules: bool,
    },

    /// Print the combined owners of a set of changed paths
    Changeset {
        #[arg(required = true)]
        paths: Vec<String>,

        #[arg(short = 'f', long = "file")]
        codeowners_file: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Markdown,
    Json,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Check {
            repo,
            config,
            dry_run,
            format,
            fail_on_findings,
        } => check(repo, config, dry_run, format, fail_on_findings),
        Command::Owners {
            paths,
            codeowners_file,
            all_matching_rules,
        } => {
            let ruleset = load_ruleset(codeowners_file)?;
            print_owners(&ruleset, &root_paths(paths), all_matching_rules);
            Ok(ExitCode::SUCCESS)
        }
        Command::Changeset {
            paths,
            codeowners_file,
        } => {
            let ruleset = load_ruleset(codeowners_file)?;
            let resolved = ChangesetOwners::resolve(&ruleset, &paths);
            if resolved.is_empty() {
                println!("(unowned)");
            } else {
                println!("{}", resolved.owners.into_iter().collect::<Vec<_>>().join(" "));
            }
            for path in &resolved.unowned {
                eprintln!("unowned: {}", path);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("prmonitor={level},prmonitor_rs={level}").into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn check(
    repo: Option<Repository>,
    config_path: Option<PathBuf>,
    dry_run: bool,
    format: Format,
    fail_on_findings: bool,
) -> Result<ExitCode> {
    let config_path = config_path.unwrap_or_else(|| config::default_config_path("."));
    let mut config = config::load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(repo) = repo {
        config.repository = Some(repo);
    }
    if dry_run {
        info!("dry run, write actions disabled");
        config.actions.disable_writes();
    }
    config.validate()?;

    let token = env::var(&config.token_env).ok();
    if token.is_none() {
        warn!(env = %config.token_env, "no API token set, requests are unauthenticated");
    }
    let repository = config.repository.clone().context("no repository configured")?;
    let client = GithubClient::new(&config.api_url, repository, token)?;

    let notifier = webhook_notifier(&config)?;
    let mut monitor = Monitor::new(client, config);
    if let Some(notifier) = notifier {
        monitor = monitor.with_notifier(notifier);
    }

    let report = monitor.run(chrono::Utc::now())?;
    match format {
        Format::Text => print!("{}", report.to_text()),
        Format::Markdown => print!("{}", report.to_markdown()),
        Format::Json => println!("{}", report.to_json()?),
    }

    if fail_on_findings && report.has_findings() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn webhook_notifier(config: &MonitorConfig) -> Result<Option<WebhookNotifier>> {
    if !config.actions.notify {
        return Ok(None);
    }
    match env::var(&config.actions.webhook_url_env) {
        Ok(url) if !url.is_empty() => Ok(Some(WebhookNotifier::new(url)?)),
        _ => Ok(None),
    }
}

fn load_ruleset(codeowners_file: Option<PathBuf>) -> Result<RuleSet> {
    let path = codeowners_file.unwrap_or_else(find_codeowners);
    prmonitor_rs::from_path(&path).with_context(|| format!("reading {}", path.display()))
}

fn find_codeowners() -> PathBuf {
    MonitorConfig::default()
        .codeowners_paths
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
        .unwrap_or_else(|| PathBuf::from("./CODEOWNERS"))
}

fn root_paths(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    if paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        paths
    }
}

fn print_owners(ruleset: &RuleSet, roots: &[PathBuf], all_matching_rules: bool) {
    for root_path in roots {
        if !root_path.exists() {
            eprintln!("error: path does not exist: {}", root_path.display());
            continue;
        }

        let paths: Vec<String> = if root_path.is_dir() {
            walk_files(root_path).map(|e| relative(e.path())).collect()
        } else {
            vec![relative(root_path)]
        };

        for (path, line) in paths.iter().zip(owner_lines(ruleset, &paths, all_matching_rules)) {
            println!("{:<70}  {}", path, line);
        }
    }
}

#[cfg(feature = "rayon")]
fn owner_lines(ruleset: &RuleSet, paths: &[String], all_matching_rules: bool) -> Vec<String> {
    use rayon::prelude::*;
    paths
        .par_iter()
        .map(|path| owner_line(ruleset, path, all_matching_rules))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn owner_lines(ruleset: &RuleSet, paths: &[String], all_matching_rules: bool) -> Vec<String> {
    paths
        .iter()
        .map(|path| owner_line(ruleset, path, all_matching_rules))
        .collect()
}

fn owner_line(ruleset: &RuleSet, path: &str, all_matching_rules: bool) -> String {
    if all_matching_rules {
        let rules: Vec<String> = ruleset
            .matching_rules(path)
            .into_iter()
            .map(|(idx, rule)| format!("{}:{} ({})", idx + 1, rule.pattern, rule.owners.join(" ")))
            .collect();
        if rules.is_empty() {
            return "(unowned)".to_owned();
        }
        return rules.join(", ");
    }

    let owners = ruleset.owners(path);
    if owners.is_empty() {
        "(unowned)".to_owned()
    } else {
        owners.into_iter().collect::<Vec<_>>().join(" ")
    }
}

fn relative(path: &Path) -> String {
    path.strip_prefix(".")
        .unwrap_or(path)
        .to_string_lossy()
        .to_string()
}

fn walk_files(root: impl AsRef<Path>) -> impl Iterator<Item = walkdir::DirEntry> {
    walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| !entry.file_type().is_dir())
        .filter(|entry| !entry.path().starts_with("./.git"))
}
