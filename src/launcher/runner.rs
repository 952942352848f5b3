//! Training subprocess.

use std::process::ExitStatus;

use tokio::process::Command;

use crate::config::LauncherConfig;

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed waiting for training: {0}")]
    Wait(#[source] std::io::Error),
    #[error("training failed: {0}")]
    TrainingFailed(ExitStatus),
    #[error("training interrupted by user")]
    Interrupted,
}

/// Run the training script to completion.
///
/// Ctrl-C stops waiting and kills the child.
pub async fn run_training(config: &LauncherConfig) -> Result<(), LaunchError> {
    tracing::info!(
        python = %config.python,
        script = %config.train_script,
        "Starting training"
    );

    let mut child = Command::new(&config.python)
        .arg(&config.train_script)
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| LaunchError::Spawn {
            program: config.python.clone(),
            source,
        })?;

    tokio::select! {
        status = child.wait() => {
            let status = status.map_err(LaunchError::Wait)?;
            if status.success() {
                tracing::info!("Training completed");
                Ok(())
            } else {
                tracing::error!(%status, "Training failed");
                Err(LaunchError::TrainingFailed(status))
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Training interrupted");
            Err(LaunchError::Interrupted)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn script(body: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("train-{}.sh", uuid::Uuid::new_v4()));
        std::fs::write(&path, body).unwrap();
        path
    }

    fn config(script: &std::path::Path) -> LauncherConfig {
        LauncherConfig {
            python: "sh".into(),
            train_script: script.display().to_string(),
            ..LauncherConfig::default()
        }
    }

    #[tokio::test]
    async fn test_successful_training() {
        let path = script("exit 0\n");
        run_training(&config(&path)).await.unwrap();
        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let path = script("exit 3\n");
        let err = run_training(&config(&path)).await.unwrap_err();
        match err {
            LaunchError::TrainingFailed(status) => assert_eq!(status.code(), Some(3)),
            other => panic!("unexpected error: {other}"),
        }
        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let mut config = LauncherConfig::default();
        config.python = "/nonexistent/python3".into();

        let err = run_training(&config).await.unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
    }
}
