use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use heart_disease_mlops::config::{load_config, LauncherConfig};
use heart_disease_mlops::launcher::{check_prerequisites, run_training, Check};
use heart_disease_mlops::observability::configure_logging;

const RULE: &str = "============================================================";

#[derive(Parser)]
#[command(name = "train-launcher")]
#[command(about = "Check prerequisites and run the MLflow training experiment", long_about = None)]
struct Cli {
    /// TOML configuration file; only the [launcher] section is used.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Python interpreter.
    #[arg(long)]
    python: Option<String>,

    /// Processed dataset that must exist.
    #[arg(long)]
    data: Option<String>,

    /// Training script.
    #[arg(long)]
    script: Option<String>,

    /// Log level for launcher diagnostics.
    #[arg(long, default_value = "WARNING")]
    log_level: String,
}

fn banner(title: &str) {
    println!("{RULE}");
    println!("{title}");
    println!("{RULE}");
}

fn launcher_config(cli: &Cli) -> Result<LauncherConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?.launcher,
        None => LauncherConfig::default(),
    };
    if let Some(python) = &cli.python {
        config.python = python.clone();
    }
    if let Some(data) = &cli.data {
        config.data_path = data.clone();
    }
    if let Some(script) = &cli.script {
        config.train_script = script.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = configure_logging(&cli.log_level, false) {
        eprintln!("Failed to configure logging: {e}");
        return ExitCode::FAILURE;
    }

    let config = match launcher_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    banner("MLflow Training Experiment - Prerequisites Check");
    let report = check_prerequisites(&config).await;
    for check in report.iter() {
        match check {
            Check::Passed(detail) => println!("✅ {detail}"),
            Check::Failed { reason, remedy } => println!("❌ {reason}\n\n{remedy}"),
        }
    }

    if !report.all_passed() {
        println!();
        banner("Please fix the issues above and try again.");
        return ExitCode::FAILURE;
    }

    println!();
    banner("Starting MLflow Training...");

    if let Err(e) = run_training(&config).await {
        println!("\n❌ {e}");
        return ExitCode::FAILURE;
    }

    let cwd = std::env::current_dir()
        .map(|dir| dir.display().to_string())
        .unwrap_or_else(|_| ".".to_string());

    println!();
    banner("✅ Training completed successfully!");
    println!("\nNext steps:");
    println!("1. Open a NEW terminal window");
    println!("2. Run: cd {cwd}");
    println!(
        "3. Run: mlflow ui --backend-store-uri file://{cwd}/mlruns --port {}",
        config.mlflow_ui_port
    );
    println!("4. Open browser: http://localhost:{}", config.mlflow_ui_port);
    println!("{RULE}");
    ExitCode::SUCCESS
}
