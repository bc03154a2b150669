use faceverify::{
    cli::{compare_files, offline_model_config, upload_from_path},
    common::DevMode,
    service::ServiceClient,
    FaceAuthError,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "faceverify")]
#[command(about = "Face enrollment and verification against a stored reference embedding")]
struct Cli {
    /// Enable development mode (local socket and data directory)
    #[arg(long, global = true)]
    dev: bool,

    /// Service socket, overriding the mode default
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the service is up and show its decision settings
    Health,
    /// Enroll (or replace) the face for the session's identity
    Enroll {
        #[arg(short, long, env = "FACEVERIFY_SESSION")]
        session: String,
        #[arg(short, long)]
        image: PathBuf,
    },
    /// Verify a face against the session's enrolled face
    Verify {
        #[arg(short, long, env = "FACEVERIFY_SESSION")]
        session: String,
        #[arg(short, long)]
        image: PathBuf,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the stored embedding for the session's identity as JSON
    ShowEmbedding {
        #[arg(short, long, env = "FACEVERIFY_SESSION")]
        session: String,
    },
    /// Compare two JSON embedding files offline
    Compare {
        probe: PathBuf,
        reference: PathBuf,
        /// Recognition model the embeddings came from (defaults to the config file)
        #[arg(long)]
        model: Option<String>,
        /// Distance metric (defaults to the config file)
        #[arg(long)]
        metric: Option<String>,
        /// Override the calibrated threshold
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on mode
    setup_logging(cli.dev);

    let dev_mode = DevMode::new(cli.dev)?;
    let client = match &cli.socket {
        Some(path) => ServiceClient::new(path),
        None => ServiceClient::from_dev_mode(&dev_mode),
    };

    match cli.command {
        Commands::Health => {
            let status = client.health()?;
            println!("Service is up (version {})", status.version);
            println!("  model:     {}", status.model);
            println!("  metric:    {}", status.metric);
            println!("  threshold: {}", status.threshold);
        }
        Commands::Enroll { session, image } => {
            let upload = upload_from_path(&image)
                .with_context(|| format!("Failed to read {}", image.display()))?;
            client.enroll(&session, upload).map_err(explain)?;
            println!("✅ Face enrolled");
        }
        Commands::Verify { session, image, json } => {
            let upload = upload_from_path(&image)
                .with_context(|| format!("Failed to read {}", image.display()))?;
            let outcome = client.verify(&session, upload).map_err(explain)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!(
                    "{} distance={:.4} threshold={:.4} confidence={:.1}%",
                    if outcome.verified { "✅ VERIFIED" } else { "❌ NOT VERIFIED" },
                    outcome.distance,
                    outcome.threshold,
                    outcome.confidence
                );
            }
        }
        Commands::ShowEmbedding { session } => {
            let embedding = client.fetch_embedding(&session).map_err(explain)?;
            println!("{}", serde_json::to_string(&embedding)?);
        }
        Commands::Compare { probe, reference, model, metric, threshold, json } => {
            let model_config = offline_model_config(&dev_mode.config_path(), model, metric, threshold)?;
            let outcome = compare_files(&probe, &reference, &model_config)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("Model:      {} / {}", model_config.model, model_config.metric);
                println!("Verified:   {}", outcome.verified);
                println!("Distance:   {:.4}", outcome.distance);
                println!("Threshold:  {:.4}", outcome.threshold);
                println!("Confidence: {:.1}%", outcome.confidence);
            }
        }
    }

    Ok(())
}

/// Flags win over the config file; without either, ArcFace/cosine calibration.

fn explain(err: FaceAuthError) -> anyhow::Error {
    match err {
        FaceAuthError::Service { message, .. } => anyhow::anyhow!(message),
        other => other.into(),
    }
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_max_level(tracing::Level::WARN)
            .init();
    }
}
