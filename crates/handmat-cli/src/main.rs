use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use handmat_core::{classifier_spec, inspect_classifier, CapabilityClass};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "handmat", about = "HandMat gesture and emotion CLI", version)]
struct Cli {
    /// Base URL of the handmatd daemon
    #[arg(long, env = "HANDMAT_URL", default_value = "http://127.0.0.1:5000", global = true)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize a hand gesture (image sent as base64 JSON)
    Recognize { image: PathBuf },
    /// Recognize a hand gesture via multipart upload
    Upload { image: PathBuf },
    /// Analyze the facial emotion in an image
    Analyze { image: PathBuf },
    /// Compose a sentence from a gesture and an emotion
    Compose {
        #[arg(long)]
        gesture: Option<String>,
        #[arg(long)]
        gesture_confidence: Option<f32>,
        #[arg(long)]
        emotion: Option<String>,
        #[arg(long)]
        emotion_confidence: Option<f32>,
    },
    /// Show the backend serving each capability
    Models,
    /// Show daemon health
    Status,
    /// Load the model directory locally and report what would be served
    Probe {
        #[arg(long, env = "HANDMAT_MODEL_DIR", default_value = "./models")]
        model_dir: PathBuf,
        #[arg(long, default_value_t = 0.7)]
        hand_threshold: f32,
        #[arg(long, default_value_t = 0.3)]
        face_threshold: f32,
    },
}

struct Client {
    base: String,
    http: reqwest::Client,
}

impl Client {
    fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let response = self
            .http
            .get(format!("{}{path}", self.base))
            .send()
            .await
            .with_context(|| format!("handmatd not reachable at {}", self.base))?;
        Self::read(response).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self
            .http
            .post(format!("{}{path}", self.base))
            .json(body)
            .send()
            .await
            .with_context(|| format!("handmatd not reachable at {}", self.base))?;
        Self::read(response).await
    }

    async fn upload(&self, path: &str, image: &Path) -> Result<Value> {
        let bytes = std::fs::read(image).with_context(|| format!("failed to read {}", image.display()))?;
        let filename = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let form = reqwest::multipart::Form::new()
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name(filename));
        let response = self
            .http
            .post(format!("{}{path}", self.base))
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("handmatd not reachable at {}", self.base))?;
        Self::read(response).await
    }

    async fn read(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        tracing::debug!(%status, url = %response.url(), "handmatd responded");
        let body: Value = response.json().await.context("invalid JSON from handmatd")?;
        if !status.is_success() {
            let message = body["error"]["message"].as_str().unwrap_or("request failed");
            bail!("{status}: {message}");
        }
        Ok(body)
    }
}

fn image_body(image: &Path) -> Result<Value> {
    let bytes = std::fs::read(image).with_context(|| format!("failed to read {}", image.display()))?;
    Ok(json!({ "image": STANDARD.encode(bytes) }))
}

fn compose_body(
    gesture: Option<String>,
    gesture_confidence: Option<f32>,
    emotion: Option<String>,
    emotion_confidence: Option<f32>,
) -> Value {
    json!({
        "hand_result": { "prediction": gesture, "confidence": gesture_confidence },
        "face_result": { "emotion": emotion, "confidence": emotion_confidence },
    })
}

fn print_recognition(body: &Value) {
    println!(
        "{} ({:.1}%)  status={} backend={}",
        body["label"].as_str().unwrap_or("?"),
        body["confidence"].as_f64().unwrap_or(0.0) * 100.0,
        body["status"].as_str().unwrap_or("?"),
        body["model"]["name"].as_str().unwrap_or("?"),
    );
    if let Some(predictions) = body["predictions"].as_array() {
        for p in predictions {
            println!(
                "  {:<16} {:.3}",
                p["label"].as_str().unwrap_or("?"),
                p["confidence"].as_f64().unwrap_or(0.0)
            );
        }
    }
}

fn probe(model_dir: &Path, hand_threshold: f32, face_threshold: f32) {
    println!("Probing models in {}", model_dir.display());
    for (capability, threshold) in [
        (CapabilityClass::Hand, hand_threshold),
        (CapabilityClass::Face, face_threshold),
    ] {
        let spec = classifier_spec(model_dir, capability, threshold);
        let selection = inspect_classifier(&spec);
        let descriptor = selection.descriptor();
        println!(
            "  {capability:<5} {:?}  {} {}  ({} labels)",
            selection.availability(),
            descriptor.name,
            descriptor.version,
            descriptor.labels.len()
        );
        if let Some(fault) = selection.fault() {
            println!("        {fault}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = Client::new(&cli.server);

    match cli.command {
        Commands::Recognize { image } => {
            let body = client.post_json("/api/recognize", &image_body(&image)?).await?;
            print_recognition(&body);
        }
        Commands::Upload { image } => {
            let body = client.upload("/api/recognize/upload", &image).await?;
            print_recognition(&body);
        }
        Commands::Analyze { image } => {
            let body = client.post_json("/api/face/analyze", &image_body(&image)?).await?;
            print_recognition(&body);
        }
        Commands::Compose {
            gesture,
            gesture_confidence,
            emotion,
            emotion_confidence,
        } => {
            let request = compose_body(gesture, gesture_confidence, emotion, emotion_confidence);
            let body = client.post_json("/api/compose", &request).await?;
            println!("{}", body["sentence"].as_str().unwrap_or_default());
            println!(
                "  confidence={:.3} source={}",
                body["confidence"].as_f64().unwrap_or(0.0),
                body["source"].as_str().unwrap_or("?")
            );
        }
        Commands::Models => {
            let body = client.get("/api/models/info").await?;
            for capability in ["hand", "face", "language"] {
                let info = &body[capability];
                println!(
                    "{capability:<8} {:<12} {} {}",
                    info["availability"].as_str().unwrap_or("?"),
                    info["name"].as_str().unwrap_or("?"),
                    info["version"].as_str().unwrap_or("?"),
                );
            }
        }
        Commands::Status => {
            let body = client.get("/health/detailed").await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Commands::Probe {
            model_dir,
            hand_threshold,
            face_threshold,
        } => probe(&model_dir, hand_threshold, face_threshold),
    }

    Ok(())
}
