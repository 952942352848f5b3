//! Prerequisite checks run before training.

use std::path::Path;

use tokio::process::Command;

use crate::config::LauncherConfig;

const MLFLOW_VERSION_PROBE: &str = "import mlflow; print(mlflow.__version__)";

/// Result of a single prerequisite check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Passed(String),
    Failed { reason: String, remedy: String },
}

impl Check {
    pub fn passed(&self) -> bool {
        matches!(self, Check::Passed(_))
    }
}

/// Outcome of all prerequisite checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prerequisites {
    pub mlflow: Check,
    pub data: Check,
}

impl Prerequisites {
    pub fn all_passed(&self) -> bool {
        self.mlflow.passed() && self.data.passed()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Check> {
        [&self.mlflow, &self.data].into_iter()
    }
}

/// Check that the MLflow package is importable by `python`.
pub async fn check_mlflow(python: &str) -> Check {
    let output = Command::new(python)
        .args(["-c", MLFLOW_VERSION_PROBE])
        .kill_on_drop(true)
        .output()
        .await;

    let remedy = format!(
        "Please install MLflow first:\n  {python} -m pip install mlflow matplotlib seaborn\n\
         Or:\n  conda install -c conda-forge mlflow matplotlib seaborn"
    );

    match output {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
            tracing::debug!(%version, "MLflow import succeeded");
            Check::Passed(format!("MLflow is installed (version: {version})"))
        }
        Ok(output) => {
            tracing::debug!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "MLflow import failed"
            );
            Check::Failed {
                reason: "MLflow is not installed".to_string(),
                remedy,
            }
        }
        Err(e) => Check::Failed {
            reason: format!("Could not run {python}: {e}"),
            remedy,
        },
    }
}

/// Check that the processed dataset exists.
pub fn check_data(path: &Path) -> Check {
    if path.is_file() {
        Check::Passed("Processed data found".to_string())
    } else {
        Check::Failed {
            reason: format!("Processed data not found at {}", path.display()),
            remedy: "Please run preprocessing first:\n  python scripts/preprocess_data.py".to_string(),
        }
    }
}

/// Run every prerequisite check.
pub async fn check_prerequisites(config: &LauncherConfig) -> Prerequisites {
    Prerequisites {
        mlflow: check_mlflow(&config.python).await,
        data: check_data(Path::new(&config.data_path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("heart-disease-{}.csv", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_check_data() {
        let path = scratch_file();
        assert!(!check_data(&path).passed());

        std::fs::write(&path, "age,sex\n63,1\n").unwrap();
        assert_eq!(check_data(&path), Check::Passed("Processed data found".into()));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_directory_is_not_data() {
        assert!(!check_data(&std::env::temp_dir()).passed());
    }

    #[tokio::test]
    async fn test_missing_interpreter_fails_mlflow_check() {
        let check = check_mlflow("/nonexistent/python3").await;
        match check {
            Check::Failed { reason, remedy } => {
                assert!(reason.starts_with("Could not run /nonexistent/python3"));
                assert!(remedy.contains("pip install mlflow"));
            }
            Check::Passed(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_prerequisites_report_every_failure() {
        let config = LauncherConfig {
            python: "/nonexistent/python3".into(),
            data_path: scratch_file().display().to_string(),
            ..LauncherConfig::default()
        };

        let report = check_prerequisites(&config).await;
        assert!(!report.all_passed());
        assert_eq!(report.iter().filter(|c| !c.passed()).count(), 2);
    }
}
