use activity_worker::telemetry::init_tracing;
use activity_worker::{ActivityWorker, EchoActivity, SleepActivity, WorkerConfig};
use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "aw-worker")]
#[command(about = "Activity worker: claims tasks from a queue and reports their outcome", long_about = None)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(long)]
    config: Option<String>,

    /// Queue (activity) identifier to claim tasks from
    #[arg(short, long)]
    queue: String,

    /// Broker address, overrides BROKER_ADDRESS
    #[arg(short, long)]
    broker: Option<String>,

    /// Worker name reported on claims (auto-generated if not provided)
    #[arg(long)]
    worker_name: Option<String>,

    /// Built-in activity to run
    #[arg(short, long, value_enum, default_value = "echo")]
    activity: ActivityKind,

    /// Duration of the sleep activity
    #[arg(long, default_value = "1000")]
    sleep_ms: u64,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ActivityKind {
    Echo,
    Sleep,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = WorkerConfig::load(args.config.as_deref())
        .context("failed to load worker configuration")?;

    if let Some(broker) = args.broker {
        config.broker_address = broker;
    }
    if let Some(name) = args.worker_name {
        config.worker_name = Some(name);
    }

    if args.print_config {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    init_tracing(&config.log_level, config.log_json)?;
    tracing::info!(broker = %config.broker_address, "Loaded worker configuration");

    let outcome = match args.activity {
        ActivityKind::Echo => ActivityWorker::<EchoActivity>::from_config(&args.queue, &config)
            .run()
            .await,
        ActivityKind::Sleep => {
            let activity = SleepActivity::new(Duration::from_millis(args.sleep_ms));
            ActivityWorker::with_activity(activity, &args.queue, &config)
                .run()
                .await
        }
    };

    if let Err(err) = outcome {
        tracing::error!("Worker stopped: {}", err);
        std::process::exit(err.exit_code());
    }

    Ok(())
}
