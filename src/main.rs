//! strigo-sync CLI entrypoint.
//!
//! This is the main entrypoint for the strigo-sync command-line tool.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use strigo_sync::cli::{Cli, Commands, OutputFormatter};
use strigo_sync::config::{ClassConfig, ConfigImporter, ConfigParser, ConfigValidator};
use strigo_sync::error::{ConfigError, Result};
use strigo_sync::platform::{RemoteApi, StrigoClient};
use strigo_sync::reconciler::Reconciler;
use strigo_sync::resolve::{HttpFragmentSource, ScriptResolver};

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    // Remote calls are strictly sequential
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let parser = ConfigParser::new().with_base_path(base_dir(&cli.config));
    parser.load_dotenv()?;

    match cli.command {
        Commands::Validate { warnings } => cmd_validate(&parser, &cli.config, warnings, &formatter),
        Commands::Plan { detailed } => cmd_plan(&parser, &cli.config, detailed, &formatter).await,
        Commands::Apply { yes } => cmd_apply(&parser, &cli.config, yes, &formatter).await,
        Commands::Retrieve { class_id, force } => {
            cmd_retrieve(&parser, &cli.config, &class_id, force, &formatter).await
        }
        Commands::List => cmd_list(&formatter).await,
        Commands::Drift => cmd_drift(&parser, &cli.config, &formatter).await,
        Commands::Destroy { yes } => cmd_destroy(&parser, &cli.config, yes, &formatter).await,
    }
}

/// Validate configuration.
fn cmd_validate(
    parser: &ConfigParser,
    config_path: &Path,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    info!("Validating configuration: {}", config_path.display());
    let config = parser.load_with_env(config_path)?;

    let result = ConfigValidator::new()
        .with_base_dir(base_dir(config_path))
        .check(&config);
    println!("{}", formatter.format_validation(&config, &result, show_warnings));

    match result.errors.into_iter().next() {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

/// Show the synchronization plan.
async fn cmd_plan(
    parser: &ConfigParser,
    config_path: &Path,
    detailed: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = parser.load_with_env(config_path)?;
    let reconciler = create_reconciler(config_path)?;

    let plan = reconciler.plan(&config).await?;
    println!("{}", formatter.format_plan(&plan, detailed));
    Ok(())
}

/// Apply the synchronization plan.
async fn cmd_apply(
    parser: &ConfigParser,
    config_path: &Path,
    yes: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let mut config = parser.load_with_env(config_path)?;
    let reconciler = create_reconciler(config_path)?;

    let plan = reconciler.plan(&config).await?;
    println!("{}", formatter.format_plan(&plan, false));

    if plan.is_empty() {
        return Ok(());
    }

    if !yes && !confirm("Do you want to apply this plan? [y/N]: ", "y")? {
        eprintln!("Apply cancelled.");
        return Ok(());
    }

    let result = match reconciler.apply_plan(&plan).await {
        Ok(result) => result,
        Err(failure) => {
            if failure.class_created() {
                record_class_id(parser, &mut config, config_path, failure.class_id.clone())?;
            }
            return Err(failure.into());
        }
    };

    if result.class_created {
        record_class_id(parser, &mut config, config_path, result.class_id.clone())?;
    }

    println!("{}", formatter.format_reconciliation(&result));
    Ok(())
}

/// Write a configuration describing an existing class.
async fn cmd_retrieve(
    parser: &ConfigParser,
    config_path: &Path,
    class_id: &str,
    force: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    if config_path.exists() && !force {
        return Err(ConfigError::AlreadyExists {
            path: config_path.to_path_buf(),
        }
        .into());
    }

    let client = create_client()?;
    let class = client.get_class(class_id).await?;
    let presentations = client.list_presentations(class_id).await?;

    let importer = ConfigImporter::new(base_dir(config_path));
    let config = importer.from_remote(&class, &presentations)?;
    parser.create_file(&config, config_path, force)?;

    println!(
        "{}",
        formatter.success(&format!(
            "Class '{}' written to {}",
            config.name,
            config_path.display()
        ))
    );
    Ok(())
}

/// List the classes of the organization.
async fn cmd_list(formatter: &OutputFormatter) -> Result<()> {
    let client = create_client()?;
    let classes = client.list_classes().await?;
    println!("{}", formatter.format_classes(&classes));
    Ok(())
}

/// Check for drift between config and remote state.
async fn cmd_drift(parser: &ConfigParser, config_path: &Path, formatter: &OutputFormatter) -> Result<()> {
    let config = parser.load_with_env(config_path)?;
    let reconciler = create_reconciler(config_path)?;

    let report = reconciler.check_drift(&config).await?;
    println!("{}", formatter.format_drift(&report));
    Ok(())
}

/// Delete the configured class.
async fn cmd_destroy(
    parser: &ConfigParser,
    config_path: &Path,
    yes: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let mut config = parser.load_with_env(config_path)?;
    let class_id = class_id(&config)?;

    if !yes {
        eprintln!(
            "Class '{}' ({class_id}) and all its resources will be deleted.",
            config.name
        );
        if !confirm("This action is IRREVERSIBLE. Type 'destroy' to confirm: ", "destroy")? {
            eprintln!("Destruction cancelled.");
            return Ok(());
        }
    }

    let reconciler = create_reconciler(config_path)?;
    reconciler.destroy(&class_id).await?;

    config.id = None;
    parser.write_file(&config, config_path)?;

    println!("{}", formatter.success(&format!("Class '{}' deleted", config.name)));
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Directory relative configuration paths are resolved against.
fn base_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Returns the class id of a configuration.
fn class_id(config: &ClassConfig) -> Result<String> {
    config.id.clone().ok_or_else(|| {
        ConfigError::MissingClassId {
            name: config.name.clone(),
        }
        .into()
    })
}

/// Writes the id of a newly created class back to the configuration file.
fn record_class_id(
    parser: &ConfigParser,
    config: &mut ClassConfig,
    config_path: &Path,
    class_id: Option<String>,
) -> Result<()> {
    config.id = class_id;
    parser.write_file(config, config_path)?;
    info!("Class id written to {}", config_path.display());
    Ok(())
}

/// Asks for confirmation on stderr.
fn confirm(prompt: &str, expected: &str) -> Result<bool> {
    eprint!("{prompt}");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case(expected))
}

/// Creates a Strigo API client from the environment.
fn create_client() -> Result<StrigoClient> {
    let credentials = ConfigParser::credentials()?;
    match ConfigParser::endpoint() {
        Some(endpoint) => {
            debug!("Using API endpoint: {endpoint}");
            StrigoClient::with_endpoint(&credentials.organization_id, &credentials.api_key, &endpoint)
        }
        None => StrigoClient::new(&credentials.organization_id, &credentials.api_key),
    }
}

/// Creates a reconciler backed by the Strigo API and the script library.
///
/// Relative paths of the configuration resolve against its directory.
fn create_reconciler(config_path: &Path) -> Result<Reconciler> {
    let client = create_client()?;
    let source = match ConfigParser::scripts_url() {
        Some(url) => {
            debug!("Using script library: {url}");
            HttpFragmentSource::with_base_url(&url)?
        }
        None => HttpFragmentSource::new()?,
    };

    Ok(Reconciler::new(
        Arc::new(client),
        ScriptResolver::new(Arc::new(source)),
    )
    .with_base_dir(base_dir(config_path)))
}
