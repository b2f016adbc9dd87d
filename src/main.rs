use clap::{Parser, Subcommand};
use serde_json::Value;
use zevbit_flywheel::utils::error::{ErrorSeverity, FlywheelError, Result};
use zevbit_flywheel::utils::{logger, validation::Validate};
use zevbit_flywheel::{Flywheel, FlywheelConfig, LocalStorage, ProvenanceQuery, SignalType};

#[derive(Debug, Parser)]
#[command(name = "flywheel")]
#[command(about = "Data flywheel tooling: PII redaction, feedback capture and provenance")]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Override the local data lake directory
    #[arg(long, global = true)]
    data_lake: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Redact PII from a JSON document
    Redact {
        /// JSON file to read (stdin when omitted)
        #[arg(short, long)]
        input: Option<String>,
    },
    /// Report PII found in a JSON document
    Scan {
        #[arg(short, long)]
        input: Option<String>,
    },
    /// Check whether a JSON document may be stored in the data lake
    Validate {
        #[arg(short, long)]
        input: Option<String>,
    },
    /// Print the deterministic pseudonym for an identifier
    Anonymize {
        identifier: String,
        #[arg(long, default_value = "customer")]
        category: String,
    },
    /// Capture a feedback signal into the local data lake
    Capture {
        /// Signal type, e.g. estimate_accepted or cost_overrun
        signal_type: String,
        #[arg(short, long)]
        input: Option<String>,
    },
    /// List provenance records stored in the local data lake
    Provenance {
        /// Filter by decision function name
        #[arg(long)]
        function: Option<String>,
        #[arg(long)]
        workflow: Option<String>,
    },
}

fn read_json(input: Option<&str>) -> Result<Value> {
    let content = match input {
        Some(path) => std::fs::read_to_string(path)?,
        None => std::io::read_to_string(std::io::stdin())?,
    };
    Ok(serde_json::from_str(&content)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(cli: &Cli) -> Result<FlywheelConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            FlywheelConfig::from_file(path)?
        }
        None => {
            let mut config = FlywheelConfig::default();
            config.apply_env_overrides();
            config
        }
    };
    if let Some(path) = &cli.data_lake {
        config.data_lake.local_path = path.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let storage = LocalStorage::new(config.data_lake.local_path.clone());
    let flywheel = Flywheel::new(storage, config)?;

    match cli.command {
        Command::Redact { input } => {
            let data = read_json(input.as_deref())?;
            print_json(&flywheel.redactor().redact(&data))
        }
        Command::Scan { input } => {
            let data = read_json(input.as_deref())?;
            print_json(&flywheel.redactor().pii_report(&data))
        }
        Command::Validate { input } => {
            let data = read_json(input.as_deref())?;
            let report = flywheel.compliance().validate_data_for_storage(&data);
            print_json(&report)?;
            if !report.compliant {
                return Err(FlywheelError::ComplianceError {
                    issues: report.issues,
                });
            }
            Ok(())
        }
        Command::Anonymize {
            identifier,
            category,
        } => {
            println!("{}", flywheel.redactor().anonymize(&identifier, &category));
            Ok(())
        }
        Command::Capture { signal_type, input } => {
            let signal_type: SignalType = signal_type.parse()?;
            let data = read_json(input.as_deref())?;
            let receipt = flywheel
                .capture()
                .capture_manual_signal(signal_type, data)
                .await?;
            let mut written = flywheel.shutdown().await?;
            written.extend(receipt.object_key.clone());

            for key in &written {
                println!("📁 {}", key);
            }
            for trigger in &receipt.triggers {
                println!("🔁 Retraining triggered: {:?}", trigger.reason);
            }
            if written.is_empty() && !flywheel.capture().dead_letters().is_empty() {
                return Err(FlywheelError::StorageError {
                    message: "signal could not be written to the data lake".to_string(),
                });
            }
            Ok(())
        }
        Command::Provenance { function, workflow } => {
            let restored = flywheel.tracker().restore().await?;
            tracing::debug!("Restored {} provenance records", restored);

            let mut query = ProvenanceQuery::new();
            query.decision_type = function;
            query.workflow_id = workflow;
            print_json(&flywheel.tracker().query(&query))
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose);
    tracing::debug!("CLI args: {:?}", cli);

    if let Err(e) = run(cli).await {
        tracing::error!(
            "❌ flywheel failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        std::process::exit(exit_code);
    }
}
