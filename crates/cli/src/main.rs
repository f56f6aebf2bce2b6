//! nxtransfer command-line tool.
//!
//! Exports every asset of a remote repository to the local disk, or imports
//! a local directory tree into a remote repository, using the per-format
//! conventions of the repository manager.

mod progress;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use nxtransfer_core::config::{Credentials, Profile, RunConfig, DEFAULT_WORKERS};
use nxtransfer_core::formats::FormatRegistry;
use nxtransfer_core::pipeline::TransferReport;
use nxtransfer_core::{export_repository, import_repository};

use crate::progress::BarProgress;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Move artifacts between a repository manager and the local filesystem.
#[derive(Parser, Debug)]
#[command(
    name = "nxtransfer",
    version,
    about = "Export or import the assets of a repository manager repository"
)]
struct Cli {
    /// Repository manager base URL, e.g. https://nexus.example.com.
    #[arg(long, global = true)]
    repo_url: Option<String>,

    /// Name of the remote repository.
    #[arg(long, global = true)]
    repo_name: Option<String>,

    /// Repository type: maven, npm, raw, pypi, nuget, helm, yum or apt.
    #[arg(long, global = true)]
    repo_type: Option<String>,

    /// Username for Basic authentication.
    #[arg(long, global = true, env = "NEXUS_USERNAME")]
    username: Option<String>,

    /// Password for Basic authentication.
    #[arg(long, global = true, env = "NEXUS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Enumerate and count, but transfer nothing.
    #[arg(long, global = true)]
    dry_run: bool,

    /// Number of concurrent transfers.
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Path to a TOML profile supplying defaults for the flags above.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download every asset of the repository.
    Export {
        /// Directory that receives the assets (defaults to the repository name).
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Upload every eligible file below a local directory.
    Import {
        /// Root of the tree to upload.
        #[arg(long)]
        import_dir: PathBuf,
    },

    /// Write a commented profile template.
    Init {
        /// Output path for the generated profile.
        #[arg(short, long, default_value = "./nxtransfer.toml")]
        output: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("Error: {:#}", e)));
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins; otherwise `-v` picks the level. Per-item failures are
/// printed by the progress observer, so the pipeline's own warnings stay quiet
/// unless asked for.
fn init_logging(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbosity {
            0 => "warn,nxtransfer_core::pipeline=error",
            1 => "info",
            _ => "debug",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Init { output } => cmd_init(output),
        Commands::Export { output_dir } => {
            let mut config = build_run_config(&cli)?;
            if let Some(dir) = output_dir {
                config.export_dir = Some(dir.clone());
            }
            cmd_export(&config).await
        }
        Commands::Import { import_dir } => {
            let config = build_run_config(&cli)?.with_import_dir(import_dir);
            cmd_import(&config).await
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn default_profile_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("nxtransfer").join("profile.toml"))
}

/// Load the profile named by `--config`, or the per-user default if one
/// exists. No profile at all is fine.
fn load_profile(explicit: Option<&Path>, resolve_password: bool) -> Result<Profile> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => default_profile_path().filter(|p| p.exists()),
    };
    let Some(path) = path else {
        return Ok(Profile::default());
    };

    let mut profile = Profile::load_from_file(&path)
        .with_context(|| format!("failed to load profile {}", path.display()))?;
    if resolve_password {
        profile
            .resolve_env_vars()
            .context("failed to resolve environment variables")?;
    }
    Ok(profile)
}

/// Merge flags (and their environment fallbacks) over the profile.
fn build_run_config(cli: &Cli) -> Result<RunConfig> {
    let profile = load_profile(cli.config.as_deref(), cli.password.is_none())?;
    let repo = profile.repository;

    let username = cli.username.clone().or(repo.username);
    let password = cli.password.clone().or(repo.password);
    let workers = cli
        .workers
        .or(profile.transfer.workers)
        .unwrap_or(DEFAULT_WORKERS);

    let mut config = RunConfig::new(
        cli.repo_url.clone().or(repo.url).unwrap_or_default(),
        cli.repo_name.clone().or(repo.name).unwrap_or_default(),
        cli.repo_type.clone().or(repo.repo_type).unwrap_or_default(),
    )
    .with_credentials(Credentials::from_parts(
        username.as_deref(),
        password.as_deref(),
    ))
    .with_dry_run(cli.dry_run)
    .with_workers(workers);
    config.export_dir = profile.transfer.export_dir;

    config.validate().context("invalid run configuration")?;
    debug!(?config, "resolved run configuration");
    Ok(config)
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

async fn cmd_export(config: &RunConfig) -> Result<()> {
    let progress = Arc::new(BarProgress::new("Exporting"));
    let report = export_repository(config, &FormatRegistry::standard(), progress)
        .await
        .with_context(|| format!("export of '{}' failed", config.repo_name))?;

    print_summary(&report);
    if !report.dry_run && report.total > 0 {
        println!(
            "{}",
            style::dim(&format!("Assets written to {}", config.export_root().display()))
        );
    }
    report.into_result("download")?;
    Ok(())
}

async fn cmd_import(config: &RunConfig) -> Result<()> {
    let progress = Arc::new(BarProgress::new("Importing"));
    let report = import_repository(config, &FormatRegistry::standard(), progress)
        .await
        .with_context(|| format!("import into '{}' failed", config.repo_name))?;

    print_summary(&report);
    report.into_result("upload")?;
    Ok(())
}

fn print_summary(report: &TransferReport) {
    if report.dry_run {
        println!(
            "{}",
            style::warn(&format!("[dry run] would transfer {} files", report.total))
        );
        return;
    }

    let line = format!(
        "{} processed, {} succeeded, {} failed",
        report.total, report.succeeded, report.failed
    );
    if report.is_success() {
        println!("{}", style::success(&line));
        return;
    }
    println!("{}", style::error(&line));

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Item", "Error"]);
    for failure in &report.failures {
        table.add_row(vec![
            Cell::new(&failure.label),
            Cell::new(failure.error.to_string()).fg(Color::Red),
        ]);
    }
    println!("{table}");
}

fn cmd_init(output: &Path) -> Result<()> {
    let template = r#"# nxtransfer profile
# Flags and NEXUS_USERNAME / NEXUS_PASSWORD take precedence over these values.

[repository]
url = "https://nexus.example.com"
name = "maven-releases"
type = "maven"
username = "deployer"
password_env = "NEXUS_PASSWORD"

[transfer]
workers = 10
# export_dir = "./maven-releases"
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }
    std::fs::write(output, template).context("failed to write profile")?;

    println!("{}", style::success(&format!("Profile written to {}", output.display())));
    if let Some(default) = default_profile_path() {
        println!(
            "{}",
            style::dim(&format!(
                "Pass it with --config, or move it to {} to load it automatically.",
                default.display()
            ))
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("nxtransfer").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_export_flags() {
        let cli = parse(&[
            "export",
            "--repo-url",
            "https://nexus.example.com",
            "--repo-name",
            "npm-hosted",
            "--repo-type",
            "npm",
            "--workers",
            "4",
            "--output-dir",
            "/tmp/out",
            "-vv",
        ]);
        assert_eq!(cli.repo_name.as_deref(), Some("npm-hosted"));
        assert_eq!(cli.workers, Some(4));
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Export { output_dir } => {
                assert_eq!(output_dir, Some(PathBuf::from("/tmp/out")))
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_import_requires_import_dir() {
        let res = Cli::try_parse_from(["nxtransfer", "import", "--repo-type", "raw"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_profile_fills_missing_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.toml");
        std::fs::write(
            &path,
            r#"
[repository]
url = "https://nexus.example.com/"
name = "raw-hosted"
type = "raw"

[transfer]
workers = 3
export_dir = "/srv/mirror"
"#,
        )
        .unwrap();

        let cli = parse(&[
            "export",
            "--config",
            path.to_str().unwrap(),
            "--repo-name",
            "override",
            "--dry-run",
        ]);
        let config = build_run_config(&cli).unwrap();
        assert_eq!(config.base_url, "https://nexus.example.com");
        assert_eq!(config.repo_name, "override");
        assert_eq!(config.repo_type, "raw");
        assert_eq!(config.workers, 3);
        assert!(config.dry_run);
        assert_eq!(config.export_root(), PathBuf::from("/srv/mirror"));
    }

    #[test]
    fn test_missing_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.toml");
        std::fs::write(&path, "").unwrap();
        let cli = parse(&[
            "export",
            "--config",
            path.to_str().unwrap(),
            "--repo-name",
            "r",
            "--repo-type",
            "raw",
        ]);
        assert!(build_run_config(&cli).is_err());
    }

    #[test]
    fn test_init_writes_parseable_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nxtransfer.toml");
        cmd_init(&path).unwrap();
        let profile = Profile::load_from_file(&path).unwrap();
        assert_eq!(profile.repository.repo_type.as_deref(), Some("maven"));
        assert_eq!(profile.transfer.workers, Some(10));
        assert!(cmd_init(&path).is_err());
    }
}
