use activity_client::{
    BrokerClient, ClientConfig, RetryPolicy, TcpBrokerClient, Throttled, DEFAULT_BROKER_ADDRESS,
};
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "aw-admin")]
#[command(about = "Workflow execution admin CLI", long_about = None)]
struct Args {
    /// Broker address
    #[arg(short, long, env = "BROKER_ADDRESS", default_value = DEFAULT_BROKER_ADDRESS)]
    broker: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Table,
    Json,
    Yaml,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a workflow execution
    StartExecution {
        /// Workflow identifier
        #[arg(short, long)]
        workflow: String,

        /// Execution input: inline JSON or @path to a JSON file
        #[arg(short, long, default_value = "{}")]
        input: String,

        /// Execution name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Stop a running workflow execution
    StopExecution {
        /// Execution identifier
        execution_id: String,

        /// Error code recorded on the execution
        #[arg(short, long)]
        error: Option<String>,

        /// Human readable cause
        #[arg(short, long)]
        cause: Option<String>,
    },
}

#[derive(Serialize, Debug)]
struct ExecutionReport {
    execution_id: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    workflow_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    tracing::debug!("Using broker at {}", args.broker);
    let client = Throttled::new(
        TcpBrokerClient::new(ClientConfig {
            address: args.broker.clone(),
            ..ClientConfig::default()
        }),
        RetryPolicy::default(),
    );

    let report = match args.command {
        Commands::StartExecution {
            workflow,
            input,
            name,
        } => {
            let input = parse_input(&input)?;
            let execution_id = client
                .start_execution(&workflow, &input, name.as_deref())
                .await
                .with_context(|| format!("failed to start execution of {}", workflow))?;

            ExecutionReport {
                execution_id,
                status: "STARTED",
                workflow_id: Some(workflow),
            }
        }

        Commands::StopExecution {
            execution_id,
            error,
            cause,
        } => {
            client
                .stop_execution(&execution_id, error.as_deref(), cause.as_deref())
                .await
                .with_context(|| format!("failed to stop execution {}", execution_id))?;

            ExecutionReport {
                execution_id,
                status: "STOPPED",
                workflow_id: None,
            }
        }
    };

    println!("{}", render(&report, args.format)?);
    Ok(())
}

/// Inline JSON, or `@path` naming a JSON file
fn parse_input(input: &str) -> anyhow::Result<Value> {
    let text = match input.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read input file {}", path))?,
        None => input.to_string(),
    };

    serde_json::from_str(&text).context("execution input is not valid JSON")
}

fn render(report: &ExecutionReport, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Yaml => serde_yaml::to_string(report)?,
        OutputFormat::Table => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Field", "Value"]);
            table.add_row(vec!["Execution", report.execution_id.as_str()]);
            if let Some(workflow) = &report.workflow_id {
                table.add_row(vec!["Workflow", workflow.as_str()]);
            }
            table.add_row(vec!["Status", report.status]);
            table.to_string()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_parse_inline_input() {
        assert_eq!(parse_input(r#"{"id": 7}"#).unwrap(), json!({"id": 7}));
        assert!(parse_input("{not json").is_err());
    }

    #[test]
    fn test_parse_input_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["a", "b"]"#).unwrap();

        let arg = format!("@{}", file.path().display());
        assert_eq!(parse_input(&arg).unwrap(), json!(["a", "b"]));
        assert!(parse_input("@/nonexistent/input.json").is_err());
    }

    #[test]
    fn test_render_formats() {
        let report = ExecutionReport {
            execution_id: "exec-1".to_string(),
            status: "STARTED",
            workflow_id: Some("wf-1".to_string()),
        };

        let json: Value = serde_json::from_str(&render(&report, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["execution_id"], "exec-1");

        let yaml = render(&report, OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("status: STARTED"));

        let table = render(&report, OutputFormat::Table).unwrap();
        assert!(table.contains("exec-1"));
        assert!(table.contains("wf-1"));
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let args = Args::try_parse_from([
            "aw-admin",
            "--format",
            "json",
            "stop-execution",
            "exec-1",
            "--cause",
            "operator request",
        ])
        .unwrap();

        assert!(matches!(args.format, OutputFormat::Json));
        match args.command {
            Commands::StopExecution {
                execution_id,
                error,
                cause,
            } => {
                assert_eq!(execution_id, "exec-1");
                assert_eq!(error, None);
                assert_eq!(cause.as_deref(), Some("operator request"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
