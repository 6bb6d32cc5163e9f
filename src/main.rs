use proxywatch::cli::{Cli, Command};
use proxywatch::config::Config;
use proxywatch::core::proxy::reachability::{default_tunnel_client, render_report};
use proxywatch::core::proxy::sanitize::mask_proxy_url;
use proxywatch::core::proxy::{
    ChangeAudit, ConsoleNotifier, DetectionMonitor, EnvironmentDetector, FallbackSelector,
    MonitorEvent, ReachabilityProbe, StaticStateAccessor,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse_args();

    // Configuration commands don't need a loaded config
    match &cli.command {
        Command::Init => {
            let path = Config::init()?;
            println!("✓ Config at {}", path.display());
            return Ok(());
        }
        Command::Check => {
            let config = Config::load()?;
            config.check()?;
            println!("✓ Configuration valid");
            return Ok(());
        }
        _ => {}
    }

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: {}, using defaults", e);
        Config::default()
    });

    match cli.command {
        Command::Init | Command::Check => Ok(()),
        Command::Print => {
            config.print()?;
            Ok(())
        }
        Command::Detect => detect(&config).await,
        Command::Probe { url, background } => probe(&config, &url, background).await,
        Command::Select { system } => select(&config, system).await,
        Command::Watch => watch(&config).await,
    }
}

fn build_probe() -> Result<Arc<ReachabilityProbe>, Box<dyn std::error::Error>> {
    Ok(Arc::new(ReachabilityProbe::new(default_tunnel_client()?)))
}

fn build_monitor(
    config: &Config,
    probe: Arc<ReachabilityProbe>,
    audit: Arc<ChangeAudit>,
) -> DetectionMonitor {
    DetectionMonitor::builder(Arc::new(EnvironmentDetector::new()), probe)
        .with_config(config.monitor.clone())
        .with_probe_options(config.reachability.background_options())
        .with_audit(audit)
        .with_notifier(Arc::new(ConsoleNotifier))
        .build()
}

async fn detect(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let monitor = build_monitor(config, build_probe()?, Arc::new(ChangeAudit::new()));

    if let Some(result) = monitor.check_now("cli").await {
        if !result.success {
            println!("✗ Detection failed: {}", result.error.unwrap_or_default());
            return Ok(());
        }
        match (&result.proxy_url, result.source) {
            (Some(url), Some(source)) => println!("{} (from {})", mask_proxy_url(url), source),
            (Some(url), None) => println!("{}", mask_proxy_url(url)),
            (None, _) => println!("No proxy configured"),
        }
        if let Some(reachability) = &result.reachability_result {
            print!("{}", render_report(reachability, false));
        }
    }
    Ok(())
}

async fn probe(
    config: &Config,
    url: &str,
    background: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = if background {
        config.reachability.background_options()
    } else {
        config.reachability.interactive_options()
    };

    let result = build_probe()?.probe_with(url, &options).await;
    print!("{}", render_report(&result, options.verbose));
    if !result.success {
        return Err(format!("{} is not reachable", mask_proxy_url(url)).into());
    }
    Ok(())
}

async fn select(config: &Config, system: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let probe = build_probe()?;

    let system = match system {
        Some(system) => Some(system),
        None => {
            let monitor = build_monitor(config, Arc::clone(&probe), Arc::new(ChangeAudit::new()));
            monitor.check_now("cli").await.and_then(|r| r.proxy_url)
        }
    };

    let selector = FallbackSelector::new(
        probe,
        Arc::new(StaticStateAccessor::new(config.fallback.proxy_url.clone())),
    )
    .with_notifier(Arc::new(ConsoleNotifier))
    .with_probe_options(config.reachability.interactive_options())
    .with_fallback_enabled(config.fallback.enabled);

    let selection = selector.select(system.as_deref()).await;
    match &selection.proxy_url {
        Some(url) => println!("{} ({})", mask_proxy_url(url), selection.source),
        None => println!("No usable proxy"),
    }
    Ok(())
}

async fn watch(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let monitor = build_monitor(config, build_probe()?, Arc::new(ChangeAudit::new()));
    let mut events = monitor.subscribe();

    monitor.start();
    monitor.trigger_check("startup");
    println!(
        "Watching (poll every {}s), Ctrl-C to stop",
        monitor.config().poll_interval().as_secs()
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => println!("{}", describe_event(&event)),
                Err(RecvError::Lagged(skipped)) => eprintln!("Warning: {} events dropped", skipped),
                Err(RecvError::Closed) => break,
            },
        }
    }

    monitor.stop();
    Ok(())
}

fn describe_event(event: &MonitorEvent) -> String {
    let masked = |url: &Option<String>| {
        url.as_deref()
            .map(mask_proxy_url)
            .unwrap_or_else(|| "none".to_string())
    };

    match event {
        MonitorEvent::CheckComplete(result) => format!(
            "check ({}): {} after {} attempt(s)",
            result.trigger,
            if result.success { "ok" } else { "failed" },
            result.attempts
        ),
        MonitorEvent::ProxyChanged { previous, current, .. } => {
            format!("proxy changed: {} → {}", masked(previous), masked(current))
        }
        MonitorEvent::ReachabilityTestComplete(result) => render_report(result, false)
            .trim_end()
            .to_string(),
        MonitorEvent::ReachabilityChanged { current, proxy_url, .. } => format!(
            "{} is now {}",
            masked(proxy_url),
            if *current { "reachable" } else { "unreachable" }
        ),
        MonitorEvent::AllRetriesFailed { attempts, last_error } => {
            format!("all {} attempts failed: {}", attempts, last_error)
        }
    }
}
