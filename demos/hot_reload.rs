//! Demo of live configuration with hot-reload and reconfigurable jobs.
//!
//! This demo shows how to:
//! - Register configuration types against prefixes of one file
//! - Read the latest value through a `Live` handle
//! - Subscribe to changes of one prefix
//! - Let scheduled jobs follow the `scheduled` section
//!
//! Run with: cargo run --example hot_reload
//!
//! While running, edit demos/config/config.yml to see automatic reloads.
//! Try changing `security.login-attempts`, or switch `heartbeat` from
//! `fixed-rate` to a cron expression.

use reloadable_config::prelude::*;
use reloadable_config::scheduled::Trigger;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SecurityConfig {
    login_attempts: u32,
    domain_name: String,
    #[serde(skip)]
    origin: String,
}

impl Reloadable for SecurityConfig {
    fn initialize(&mut self) {
        self.origin = format!("https://{}", self.domain_name);
    }
}

const INITIAL: &str = r#"security:
  login-attempts: 3
  domain-name: example.org

scheduled:
  heartbeat:
    enabled: true
    fixed-rate: 2
    time-unit: SECONDS
  cleanup:
    enabled: false
    cron: "*/5 * * * *"
"#;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Hot Reload Demo ===\n");

    let config_dir = Path::new("demos/config");
    std::fs::create_dir_all(config_dir)?;
    let config_file = config_dir.join("config.yml");
    if !config_file.exists() {
        std::fs::write(&config_file, INITIAL)?;
        println!("Created initial config at {}", config_file.display());
    }

    let engine = ReloadEngine::builder()
        .with_root_dir(config_dir)
        .register::<SecurityConfig>(ConfigDescriptor::new("security"))
        .register::<ScheduledTaskConfig>(ScheduledTaskConfig::descriptor())
        .build()?;

    let reloads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reloads);
    let _subscription = engine.notifier().subscribe("security", move |event| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(security) = event.value::<SecurityConfig>() {
            println!(
                "[reload #{}] login attempts = {}, origin = {}",
                n, security.login_attempts, security.origin
            );
        }
        Ok(())
    });

    let heartbeats = Arc::new(AtomicUsize::new(0));
    let beats = Arc::clone(&heartbeats);
    let reconfigurer = ScheduledTaskReconfigurer::new(Arc::clone(engine.registry()), Handle::current());
    reconfigurer.bind(ScheduledJob::new("heartbeat", move || {
        let beats = Arc::clone(&beats);
        async move {
            let n = beats.fetch_add(1, Ordering::SeqCst) + 1;
            println!("  heartbeat #{}", n);
            Ok(())
        }
    }));
    reconfigurer.bind(
        ScheduledJob::new("cleanup", || async {
            println!("  cleanup ran");
            Ok(())
        })
        .with_default_trigger(Trigger::fixed_delay("cleanup", Duration::from_secs(30))?),
    );
    reconfigurer.attach(engine.notifier());

    engine.start()?;

    let security = engine.live::<SecurityConfig>();
    println!(
        "\nWatching {} for 60 seconds. Edit {} to trigger reloads.\n",
        config_dir.display(),
        config_file.display()
    );

    for _ in 0..12 {
        tokio::time::sleep(Duration::from_secs(5)).await;
        println!(
            "status: attempts = {:?}, jobs = {:?}, heartbeats = {}",
            security.with(|s| s.login_attempts),
            reconfigurer.running_jobs(),
            heartbeats.load(Ordering::SeqCst)
        );
    }

    reconfigurer.shutdown();
    engine.stop();

    println!("\nTotal security reloads: {}", reloads.load(Ordering::SeqCst));
    Ok(())
}
