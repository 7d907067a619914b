mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use cli::{Cli, Commands, ConfigCommands, QueryFormat, SnapshotFormat};
use cluster_pulse::core::{
    normalize, DashboardViewModel, MetricKind, MetricStatus, PrometheusClient, PrometheusResponse,
    QueryDispatcher,
};
use cluster_pulse::core::prometheus::PrometheusSample;
use cluster_pulse::utils::helpers::{
    format_bytes, format_bytes_rate, format_count, format_cpu, format_health, format_ops,
    health_level, HealthLevel,
};
use cluster_pulse::utils::{logging, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = resolve_config(cli.prometheus_url)?;

    match cli.command {
        None => {
            // No command - run interactive TUI
            run_dashboard(&config, None).await?;
        }
        Some(Commands::Dashboard { endpoint }) => {
            run_dashboard(&config, endpoint).await?;
        }
        Some(Commands::Snapshot { format }) => {
            logging::init_stderr();
            handle_snapshot(&config, format).await?;
        }
        Some(Commands::Query { expression, format }) => {
            logging::init_stderr();
            handle_query(&config, &expression, format).await?;
        }
        Some(Commands::Queries) => {
            handle_queries();
        }
        Some(Commands::Config { command }) => {
            handle_config(&config, command)?;
        }
        #[cfg(feature = "server")]
        Some(Commands::Serve { port, host, cors }) => {
            logging::init_stderr();
            let host = host.unwrap_or_else(|| config.listen_host.clone());
            let port = port.unwrap_or(config.listen_port);
            cluster_pulse::server::run(&config, host, port, cors).await?;
        }
    }

    Ok(())
}

/// CLI flag > environment > config file > defaults
fn resolve_config(prometheus_url: Option<String>) -> Result<AppConfig> {
    let mut config = AppConfig::load()?;
    config.apply_env();

    if let Some(url) = prometheus_url {
        config.prometheus_url = url;
    }

    Ok(config)
}

fn prometheus_client(config: &AppConfig) -> Result<PrometheusClient> {
    PrometheusClient::with_timeout(&config.prometheus_url, config.request_timeout())
        .context("Failed to create HTTP client")
}

#[cfg(feature = "tui")]
async fn run_dashboard(config: &AppConfig, endpoint: Option<String>) -> Result<()> {
    use cluster_pulse::app::App;
    use cluster_pulse::core::{AggregatorClient, MetricsSource};

    let (_guard, log_path) = logging::init_file()?;
    debug!(log = %log_path.display(), "dashboard logging initialised");

    let source: Arc<dyn MetricsSource> = match endpoint {
        Some(endpoint) => Arc::new(
            AggregatorClient::new(&endpoint, config.request_timeout())
                .context("Failed to create HTTP client")?,
        ),
        None => Arc::new(QueryDispatcher::new(
            prometheus_client(config)?,
            config.failure_policy(),
        )),
    };

    let mut app = App::new(source);
    app.run().await
}

#[cfg(not(feature = "tui"))]
async fn run_dashboard(_config: &AppConfig, _endpoint: Option<String>) -> Result<()> {
    bail!("this build has no terminal dashboard; rebuild with the `tui` feature")
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

async fn handle_snapshot(config: &AppConfig, format: SnapshotFormat) -> Result<()> {
    let dispatcher = QueryDispatcher::new(prometheus_client(config)?, config.failure_policy());

    let progress = spinner(&format!("Querying {}...", config.prometheus_url));
    let raw = dispatcher.dispatch().await;
    progress.finish_and_clear();

    let raw = raw.context("Failed to query Prometheus")?;
    let view = normalize(&raw);

    match format {
        SnapshotFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        SnapshotFormat::Yaml => print!("{}", serde_yaml::to_string(&view)?),
        SnapshotFormat::Text => print_view(&view),
    }

    Ok(())
}

fn print_view(view: &DashboardViewModel) {
    let health = format_health(view.cluster_health);
    let health = match health_level(view.cluster_health) {
        HealthLevel::Healthy => health.green(),
        HealthLevel::Degraded => health.yellow(),
        HealthLevel::Critical => health.red(),
    };

    println!("{}\n", "Cluster Snapshot".bold().cyan());
    println!("{:<18} {}", "Cluster Health:", health.bold());
    println!("{:<18} {}", "Pods:", format_count(view.pod_count));
    println!("{:<18} {}", "Services:", format_count(view.service_count));

    let series: [(MetricKind, fn(f64) -> String); 4] = [
        (MetricKind::CpuUsage, format_cpu),
        (MetricKind::MemoryUsage, format_bytes),
        (MetricKind::DiskIo, format_ops),
        (MetricKind::NetworkTraffic, format_bytes_rate),
    ];
    for (kind, format) in series {
        let points = view.series(kind).unwrap_or_default();
        let values: Vec<String> = points.iter().map(|p| format(p.value)).collect();
        let shown = if values.is_empty() {
            "no data".dimmed().to_string()
        } else {
            values.join(", ")
        };
        println!("{:<18} {}", format!("{}:", kind.title()), shown);
    }

    let ranked: [(MetricKind, fn(f64) -> String); 2] = [
        (MetricKind::TopPodsCpu, format_cpu),
        (MetricKind::TopPodsMemory, format_bytes),
    ];
    for (kind, format) in ranked {
        println!("\n{}", kind.title().bold());
        let pods = view.ranked(kind).unwrap_or_default();
        if pods.is_empty() {
            println!("  {}", "no data".dimmed());
        }
        for (i, pod) in pods.iter().enumerate() {
            println!("  {}. {:<40} {}", i + 1, pod.pod, format(pod.value));
        }
    }

    let problems: Vec<_> = view.problems().collect();
    if !problems.is_empty() {
        println!();
        for (kind, status) in problems {
            match status {
                MetricStatus::Malformed { raw } => {
                    println!("{} {}: malformed value '{}'", "⚠".yellow(), kind, raw)
                }
                _ => println!("{} {}: no data", "⚠".yellow(), kind),
            }
        }
    }
}

async fn handle_query(config: &AppConfig, expression: &str, format: QueryFormat) -> Result<()> {
    let client = prometheus_client(config)?;

    let progress = spinner(&format!("Running {}...", expression));
    let response = client.query(expression).await;
    progress.finish_and_clear();

    let response = response.with_context(|| format!("Query failed: {}", expression))?;

    match format {
        QueryFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        QueryFormat::Text => print_query_response(&response)?,
    }

    Ok(())
}

fn print_query_response(response: &PrometheusResponse) -> Result<()> {
    if let Some(error) = &response.error {
        bail!("Prometheus returned an error: {}", error);
    }

    let samples = response.samples().unwrap_or_default();
    if samples.is_empty() {
        println!("{}", "No results".dimmed());
        return Ok(());
    }

    for sample in samples.iter() {
        let labels = sample
            .metric
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        println!("{{{}}} {}", labels.cyan(), sample_summary(sample).as_str().bold());
    }

    Ok(())
}

/// Instant value, or the last point and point count of a range sample
fn sample_summary(sample: &PrometheusSample) -> String {
    if let Some(value) = &sample.value {
        return value.raw().to_string();
    }

    match sample.values.as_deref() {
        Some([.., last]) => {
            let count = sample.values.as_ref().map_or(0, Vec::len);
            format!("{} ({} points)", last.raw(), count)
        }
        _ => "-".to_string(),
    }
}

fn handle_queries() {
    println!("{}\n", "Named Queries".bold().cyan());
    for kind in MetricKind::ALL {
        println!("{:<16} {:<8} {}", kind.name().bold(), format!("{:?}", kind.shape()).to_lowercase(), kind.expression());
    }
}

fn handle_config(config: &AppConfig, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::View => {
            println!("{} {}", "Config file:".bold(), AppConfig::config_path()?.display());
            println!("{} {}\n", "Build:".bold(), cli::BUILD_TIMESTAMP);
            print!("{}", toml::to_string_pretty(config)?);

            let problems = config.validate();
            if problems.is_empty() {
                println!("\n{}", "✓ Configuration is valid".green());
            } else {
                println!();
                for problem in problems {
                    println!("{} {}", "✗".red(), problem);
                }
            }
        }
        ConfigCommands::Path => {
            println!("{}", AppConfig::config_path()?.display());
        }
        ConfigCommands::Init { force } => {
            let path = AppConfig::config_path()?;
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            AppConfig::default().save_to(&path)?;
            println!("{} Wrote {}", "✓".green(), path.display());
        }
    }

    Ok(())
}
