use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{debug, error};
use tracing_subscriber::EnvFilter;

use autoproxy::adapters::backends::Backend;
use autoproxy::adapters::config::{EnvConfig, OverrideConfig};
use autoproxy::domain::{BackendKind, ProxyError, ProxyResolver, Result, Settings};
use autoproxy::ports::ConfigPort;

#[derive(Parser, Debug)]
#[clap(version = env!("AUTOPROXY_VERSION"), author = env!("CARGO_PKG_AUTHORS"))]
pub struct Opts {
    /// Settings file, instead of the one in the platform config directory
    #[clap(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Resolver backend: wpad, tokio or env
    #[clap(long, short = 'b', global = true)]
    backend: Option<BackendKind>,

    /// PAC script URL; skips WPAD discovery
    #[clap(long, global = true)]
    auto_config_url: Option<String>,

    /// Enable or disable WPAD discovery
    #[clap(long, global = true)]
    auto_discover: Option<bool>,

    /// Manual proxy used for every scheme
    #[clap(long, short = 'p', global = true)]
    proxy: Option<String>,

    /// Comma-separated bypass rules for the manual proxy
    #[clap(long, global = true)]
    bypass: Option<String>,

    /// Give up on a URL after this many seconds
    #[clap(long, short = 't', global = true)]
    timeout: Option<u64>,

    /// More logging on stderr; repeat for more
    #[clap(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the proxy candidates for each URL
    Resolve {
        #[clap(required = true)]
        urls: Vec<String>,
    },
    /// Run a PAC script and print its raw result for each URL
    #[cfg(feature = "execute")]
    Execute {
        script: PathBuf,
        #[clap(required = true)]
        urls: Vec<String>,
    },
    /// Print the effective proxy settings, or a single one
    Config { key: Option<String> },
}

const CONFIG_KEYS: &[&str] = &[
    "auto_discover",
    "auto_config_url",
    "http_proxy",
    "https_proxy",
    "ftp_proxy",
    "bypass_list",
];

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(opts: &Opts) -> Result<Settings> {
    let loaded: std::result::Result<Settings, confy::ConfyError> = match &opts.config {
        Some(path) => confy::load_path(path),
        None => confy::load("autoproxy", None),
    };
    let mut settings = loaded.map_err(|e| ProxyError::Config(e.to_string()))?;

    if let Some(backend) = opts.backend {
        settings.backend = backend;
    }
    if opts.auto_discover.is_some() {
        settings.auto_discover = opts.auto_discover;
    }
    if opts.auto_config_url.is_some() {
        settings.auto_config_url = opts.auto_config_url.clone();
    }
    if opts.proxy.is_some() {
        settings.proxy = opts.proxy.clone();
    }
    if opts.bypass.is_some() {
        settings.bypass_list = opts.bypass.clone();
    }
    debug!("settings: {:?}", settings);
    Ok(settings)
}

fn config_value(config: &dyn ConfigPort, key: &str) -> Result<Option<String>> {
    let value = match key {
        "auto_discover" => Some(config.get_auto_discover().to_string()),
        "auto_config_url" => config.get_auto_config_url(),
        "bypass_list" | "no_proxy" => config.get_bypass_list(),
        "proxy" => config.get_proxy("http"),
        key => match key.strip_suffix("_proxy") {
            Some(scheme) if !scheme.is_empty() => config.get_proxy(scheme),
            _ => return Err(ProxyError::Config(format!("unknown setting {}", key))),
        },
    };
    Ok(value)
}

fn show_config(config: &dyn ConfigPort, key: Option<&str>) -> Result<bool> {
    match key {
        Some(key) => match config_value(config, key)? {
            Some(value) => println!("{}", value),
            None => println!(),
        },
        None => {
            for key in CONFIG_KEYS {
                let value = config_value(config, key)?;
                println!("{} = {}", key, value.as_deref().unwrap_or(""));
            }
        }
    }
    Ok(true)
}

fn resolve_urls(resolver: &ProxyResolver, urls: &[String], timeout: Option<Duration>) -> bool {
    let requests: Vec<_> = urls
        .iter()
        .map(|url| {
            let request = resolver.create_request();
            let started = request.start(url);
            (url, request, started)
        })
        .collect();

    let mut all_resolved = true;
    for (url, request, started) in requests {
        let outcome = started.and_then(|_| {
            if !request.wait(timeout) {
                request.cancel();
                return Err(ProxyError::Timeout);
            }
            match request.last_error() {
                Some(e) => Err(e),
                None => request
                    .list()
                    .ok_or_else(|| ProxyError::ScriptFailed("empty candidate list".into())),
            }
        });

        match outcome {
            Ok(list) => println!("{}", list),
            Err(e) => {
                error!("{}: {} (error {})", url, e, e.code());
                all_resolved = false;
            }
        }
    }
    all_resolved
}

#[cfg(feature = "execute")]
fn execute_script(script: &std::path::Path, urls: &[String]) -> Result<bool> {
    use autoproxy::adapters::sandbox::ScriptExecution;

    let script = std::fs::read_to_string(script)?;
    let mut all_resolved = true;
    for url in urls {
        let mut execution = ScriptExecution::new();
        if execution.get_proxies_for_url(&script, url) {
            println!("{}", execution.list().unwrap_or_default());
        } else {
            if let Some(e) = execution.last_error() {
                error!("{}: {} (error {})", url, e, execution.error());
            }
            all_resolved = false;
        }
    }
    Ok(all_resolved)
}

fn run(opts: Opts) -> Result<bool> {
    let settings = load_settings(&opts)?;
    let config = Arc::new(OverrideConfig::from_settings(EnvConfig::new(), &settings));
    let timeout = opts.timeout.map(Duration::from_secs);

    match &opts.command {
        Command::Config { key } => show_config(&*config, key.as_deref()),
        #[cfg(feature = "execute")]
        Command::Execute { script, urls } => execute_script(script, urls),
        Command::Resolve { urls } => {
            let runtime = tokio::runtime::Runtime::new()?;
            let config: Arc<dyn ConfigPort> = config;
            let backend =
                Backend::from_settings(&settings, config.clone(), Some(runtime.handle().clone()))?;
            let resolver = ProxyResolver::new(
                Arc::new(backend),
                config,
                settings.pool_min_threads,
                settings.pool_max_threads,
            )?;
            Ok(resolve_urls(&resolver, urls, timeout))
        }
    }
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    init_logging(opts.verbose);

    match run(opts) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{} (error {})", e, e.code());
            ExitCode::FAILURE
        }
    }
}
