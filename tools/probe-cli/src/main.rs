use auth_bridge::AuthBridge;
use clap::{Args, Parser, Subcommand};
use probe_core::{ProbeConfig, BUILD_INFO};
use scenario_runner::{load_features, LifecycleManager, Runner, TagFilter};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "flowprobe")]
#[command(about = "flowprobe - behaviour tests for the workflow forms and process API")]
#[command(version = probe_core::VERSION)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Flags that override the environment-derived configuration.
#[derive(Args, Debug, Default)]
struct Settings {
    /// Target host, e.g. http://localhost:8080
    #[arg(long, global = true, env = "API_BASE_URL")]
    base_url: Option<String>,

    /// Path prefix of the API under the base URL
    #[arg(long, global = true, env = "API_PREFIX")]
    api_prefix: Option<String>,

    /// Identity provider registration used for browser login
    #[arg(long, global = true, env = "OAUTH_PROVIDER")]
    provider: Option<String>,

    /// Existing WebDriver endpoint; a local chromedriver is started when unset
    #[arg(long, global = true, env = "WEBDRIVER_URL")]
    webdriver_url: Option<String>,

    /// chromedriver binary to start
    #[arg(long, global = true, env = "CHROMEDRIVER")]
    chromedriver: Option<PathBuf>,

    /// Seconds to wait for the login form
    #[arg(long, global = true, env = "LOGIN_TIMEOUT_SECS")]
    login_timeout: Option<u64>,

    /// Show the browser window during login
    #[arg(long, global = true)]
    headed: bool,
}

impl Settings {
    fn overrides(&self) -> HashMap<&'static str, String> {
        let mut overrides = HashMap::new();
        let mut set = |key: &'static str, value: Option<String>| {
            if let Some(value) = value {
                overrides.insert(key, value);
            }
        };
        set("API_BASE_URL", self.base_url.clone());
        set("API_PREFIX", self.api_prefix.clone());
        set("OAUTH_PROVIDER", self.provider.clone());
        set("WEBDRIVER_URL", self.webdriver_url.clone());
        set(
            "CHROMEDRIVER",
            self.chromedriver.as_ref().map(|p| p.display().to_string()),
        );
        set("LOGIN_TIMEOUT_SECS", self.login_timeout.map(|s| s.to_string()));
        if self.headed {
            set("BROWSER_HEADLESS", Some("false".to_string()));
        }
        overrides
    }

    /// Flags first, then the environment, then defaults.
    fn resolve<F>(&self, env: F) -> probe_core::Result<ProbeConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides = self.overrides();
        ProbeConfig::from_lookup(|key| overrides.get(key).cloned().or_else(|| env(key)))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run feature files against the target API
    Run {
        /// Feature files or directories
        #[arg(default_value = "features")]
        paths: Vec<PathBuf>,

        /// Gherkin tag expression, e.g. `not @authentication`; repeated flags AND
        #[arg(long = "tags", value_name = "EXPR")]
        tags: Vec<String>,
    },
    /// Resolve every step of every scenario without running anything
    Check {
        #[arg(default_value = "features")]
        paths: Vec<PathBuf>,
    },
    /// List the registered step patterns
    Steps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Passed,
    Failed,
    Invalid,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Passed => ExitCode::SUCCESS,
            Outcome::Failed => ExitCode::from(1),
            Outcome::Invalid => ExitCode::from(2),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(cli).await {
        Ok(outcome) => outcome.into(),
        Err(e) => {
            eprintln!("error: {e:#}");
            Outcome::Invalid.into()
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn execute(cli: Cli) -> anyhow::Result<Outcome> {
    match cli.command {
        Commands::Steps => {
            for pattern in workflow_steps::registry()?.patterns() {
                println!("{pattern}");
            }
            Ok(Outcome::Passed)
        }
        Commands::Check { paths } => check(&paths),
        Commands::Run { paths, tags } => {
            let config = cli.settings.resolve(|key| std::env::var(key).ok())?;
            run(config, &paths, &tags).await
        }
    }
}

fn check(paths: &[PathBuf]) -> anyhow::Result<Outcome> {
    let features = load_features(paths)?;
    let registry = workflow_steps::registry()?;
    let steps = features.iter().flat_map(|f| f.steps()).count();

    match registry.check(features.iter().flat_map(|f| f.steps())) {
        Ok(()) => {
            println!("{} features, {steps} steps: every step resolves", features.len());
            Ok(Outcome::Passed)
        }
        Err(problems) => {
            report_problems(&problems);
            Ok(Outcome::Invalid)
        }
    }
}

async fn run(config: ProbeConfig, paths: &[PathBuf], tags: &[String]) -> anyhow::Result<Outcome> {
    info!("Starting {}", BUILD_INFO);
    let features = load_features(paths)?;
    let filter = TagFilter::parse(tags)?;
    debug!(api_root = %config.api_root(), filter = %filter, "Configuration resolved");

    let authenticator = Arc::new(AuthBridge::from_config(&config));
    let lifecycle = LifecycleManager::with_authenticator(authenticator);
    let runner = Runner::new(config, workflow_steps::registry()?, lifecycle).with_filter(filter);

    match runner.run(&features).await {
        Err(problems) => {
            report_problems(&problems);
            Ok(Outcome::Invalid)
        }
        Ok(summary) => {
            println!("{summary}");
            Ok(if summary.aborted.is_some() {
                Outcome::Invalid
            } else if summary.is_success() {
                Outcome::Passed
            } else {
                Outcome::Failed
            })
        }
    }
}

fn report_problems(problems: &[probe_core::HarnessError]) {
    for problem in problems {
        eprintln!("{problem}");
    }
    eprintln!("{} step problem(s); no scenario was run", problems.len());
}
