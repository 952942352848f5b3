//! Shared utilities for integration tests.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use heart_disease_mlops::config::ServiceConfig;
use heart_disease_mlops::model::{ModelError, PatientFeatures, Prediction, PredictionLabel, Predictor};
use heart_disease_mlops::{HttpServer, MetricsRegistry, ModelSlot, Shutdown};
use tokio::net::TcpListener;

/// A running server bound to an ephemeral port.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub metrics: MetricsRegistry,
    pub models: Arc<ModelSlot>,
    pub shutdown: Shutdown,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start the full server stack on 127.0.0.1:0.
#[allow(dead_code)]
pub async fn start_server(config: ServiceConfig) -> TestServer {
    let metrics = MetricsRegistry::new().unwrap();
    let models = Arc::new(ModelSlot::new(metrics.clone()));
    let shutdown = Shutdown::new();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config, metrics.clone(), models.clone()).unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        addr,
        metrics,
        models,
        shutdown,
    }
}

/// Predictor that scores by age alone.
#[allow(dead_code)]
pub struct AgeCutoff(pub f64);

impl Predictor for AgeCutoff {
    fn predict(&self, features: &PatientFeatures) -> Result<Prediction, ModelError> {
        let label = if features.age >= self.0 {
            PredictionLabel::DiseasePresent
        } else {
            PredictionLabel::NoDisease
        };
        Ok(Prediction {
            label,
            probability: 0.83,
        })
    }
}

#[allow(dead_code)]
pub fn patient(age: f64) -> serde_json::Value {
    serde_json::json!({
        "age": age, "sex": 1, "cp": 3, "trestbps": 145.0, "chol": 233.0, "fbs": 1,
        "restecg": 0, "thalach": 150.0, "exang": 0, "oldpeak": 2.3, "slope": 0,
        "ca": 0, "thal": 1
    })
}

/// In-memory log destination.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

#[allow(dead_code)]
impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
