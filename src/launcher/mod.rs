//! Training launcher.
//!
//! # Data Flow
//! ```text
//! LauncherConfig
//!     → checks.rs (MLflow importable? processed data present?)
//!     → all passed → runner.rs (python <train_script>, wait, Ctrl-C aware)
//! ```
//!
//! # Design Decisions
//! - Every prerequisite is checked before reporting, so one run lists all problems
//! - The training script runs as a child process and is killed if the launcher is interrupted

pub mod checks;
pub mod runner;

pub use checks::{check_data, check_mlflow, check_prerequisites, Check, Prerequisites};
pub use runner::{run_training, LaunchError};
