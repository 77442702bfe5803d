//! Vigil - probe-and-verdict harness CLI

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use vigil::browser;
use vigil::capture::Capturer;
use vigil::config::{self, Overrides};
use vigil::http::HttpClient;
use vigil::models::HarnessConfig;
use vigil::report::{self, console};
use vigil::runner::{Silent, SuiteRunner};
use vigil::suites::Catalog;

/// Vigil - verifies security and UI behavior of a deployed web application
#[derive(Parser)]
#[command(name = "vigil", version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Run probe suites against the target (default)
    Run(RunArgs),

    /// List available suites
    Suites,
}

#[derive(Args, Default)]
struct RunArgs {
    /// Base URL of the target API
    #[arg(long, env = "VIGIL_API_URL")]
    api_url: Option<String>,

    /// Base URL of the target dashboard
    #[arg(long, env = "VIGIL_DASHBOARD_URL")]
    dashboard_url: Option<String>,

    /// Suites to run (comma-separated); default is every runnable suite
    #[arg(short, long, value_delimiter = ',')]
    suites: Option<Vec<String>>,

    /// HTTP request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Browser page-load timeout in seconds
    #[arg(long)]
    page_timeout: Option<u64>,

    /// Sign-in attempts sent by the rate-limit probe
    #[arg(long)]
    attempts: Option<usize>,

    /// Require the first 429 exactly one attempt past the threshold
    #[arg(long)]
    strict_rate_limit: bool,

    /// Origin the API is expected to trust (default: dashboard origin)
    #[arg(long)]
    allowed_origin: Option<String>,

    /// Directory for screenshots
    #[arg(long)]
    screenshot_dir: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Write the JSON report to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Account used by the authenticated UI suites
    #[arg(long, env = "VIGIL_EMAIL")]
    email: Option<String>,

    /// Password for --email
    #[arg(long, env = "VIGIL_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "vigil=debug" } else { "vigil=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(args: &mut RunArgs) -> vigil::error::Result<HarnessConfig> {
    let mut config = match args.config {
        Some(ref path) => config::load_config(path)?,
        None => HarnessConfig::default(),
    };

    config::merge_cli_args(
        &mut config,
        Overrides {
            api_url: args.api_url.take(),
            dashboard_url: args.dashboard_url.take(),
            suites: args.suites.take(),
            http_timeout_secs: args.timeout,
            page_timeout_secs: args.page_timeout,
            attempts: args.attempts,
            strict_rate_limit: args.strict_rate_limit,
            allowed_origin: args.allowed_origin.take(),
            screenshot_dir: args.screenshot_dir.take(),
            email: args.email.take(),
            password: args.password.take(),
            headed: args.headed,
        },
    );
    config::validate(&config)?;
    Ok(config)
}

async fn run(mut args: RunArgs) -> Result<i32, Box<dyn std::error::Error>> {
    init_tracing(args.verbose);

    let json_output = match args.format.as_str() {
        "text" => false,
        "json" => true,
        other => {
            return Err(format!("invalid --format '{other}': use text or json").into());
        }
    };

    let config = build_config(&mut args)?;
    // JSON on stdout must stay parseable, so the console display is off
    let quiet = json_output && args.output.is_none();
    if !quiet {
        console::print_banner(&config);
    }

    let suites = Catalog::with_defaults().build_enabled(&config, browser::AVAILABLE)?;
    if suites.is_empty() {
        return Err("no suites selected".into());
    }
    if !quiet {
        let names: Vec<&str> = suites.iter().map(|s| s.name()).collect();
        println!("  {} {}", "Suites:".bold(), names.join(", ").cyan());
    }

    let transport = Arc::new(HttpClient::from_config(&config)?);
    let driver = browser::launch_driver(&config);
    let runner = SuiteRunner::new(Capturer::new(&config, transport, driver));

    let report = if quiet {
        runner.run_all(&suites, &Silent).await
    } else {
        runner.run_all(&suites, &console::ConsoleProgress::new()).await
    };
    runner.shutdown().await;

    let (rendered, exit_code) = report::render(&report);

    match (json_output, args.output) {
        (true, Some(ref path)) => {
            console::print_summary(&report, &rendered);
            report::json::export(&report, path)?;
            println!(
                "\n  {} {}",
                "Report saved to:".bold(),
                path.display().to_string().green()
            );
        }
        (true, None) => println!("{}", report::json::to_string(&report)?),
        (false, _) => console::print_summary(&report, &rendered),
    }

    Ok(exit_code)
}

fn list_suites() {
    let catalog = Catalog::with_defaults();
    println!("  {}\n", "Available Suites:".bold());
    for (name, description) in catalog.list() {
        println!("    {} {}", format!("{name:16}").cyan().bold(), description);
    }
    if !browser::AVAILABLE {
        println!(
            "\n  {}",
            "Browser suites need a build with --features browser".yellow()
        );
    }
    println!();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let code = match cli.command {
        Some(Commands::Suites) => {
            list_suites();
            0
        }
        Some(Commands::Run(args)) => finish(run(args).await),
        None => finish(run(cli.run).await),
    };

    std::process::exit(code);
}

fn finish(result: Result<i32, Box<dyn std::error::Error>>) -> i32 {
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("  {} {e}", "Error:".red().bold());
            1
        }
    }
}
