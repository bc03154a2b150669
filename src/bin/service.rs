use faceverify::{
    common::{Config, DevMode, Result},
    core::{ExtractionGateway, FaceVerifier, OnnxFaceAnalyzer},
    identity::{IdentityResolver, SignedSessionProvider},
    service,
    storage::FileEmbeddingStore,
};
use anyhow::Context as _;
use clap::Parser;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::UnixListener;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "faceverify-service")]
#[command(about = "Face enrollment and verification service")]
struct Args {
    /// Run in development mode
    #[arg(long)]
    dev: bool,

    /// Config file, overriding the mode default
    #[arg(long)]
    config: Option<PathBuf>,

    /// Socket path, overriding config and mode default
    #[arg(long)]
    socket: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if args.dev { tracing::Level::DEBUG } else { tracing::Level::INFO })
        .init();

    tracing::info!("Starting faceverify service (dev_mode: {})", args.dev);

    let dev_mode = DevMode::new(args.dev)?;
    let config_path = args.config.clone().unwrap_or_else(|| dev_mode.config_path());
    let config = Config::load_from_path(&config_path)?;

    // Everything below is fixed for the lifetime of the process.
    let model = config.model_config()?;
    tracing::info!(
        "Decision settings: model={} metric={} threshold={}",
        model.model,
        model.metric,
        model.threshold
    );

    let provider = SignedSessionProvider::from_secret_file(
        &config.identity.secret_path,
        config.identity.leeway_seconds,
    )?;

    let store = match &config.storage.data_dir {
        Some(dir) => FileEmbeddingStore::new_with_paths(dir.clone())?,
        None => FileEmbeddingStore::new_with_dev_mode(&dev_mode)?,
    };
    tracing::info!("Embedding store at {}", store.data_dir().display());

    // Only initialize models once - they are reused across requests
    let analyzer = OnnxFaceAnalyzer::new(&config, &dev_mode.models_dir())?;
    let gateway = ExtractionGateway::new(analyzer, config.extraction_settings());

    let verifier = FaceVerifier::new(IdentityResolver::new(provider), store, gateway, model);

    let socket_path = args
        .socket
        .or_else(|| config.service.socket_path.clone())
        .unwrap_or_else(|| dev_mode.socket_path());

    // Clean up old socket if exists
    if socket_path.exists() {
        fs::remove_file(&socket_path)?;
    }
    if let Some(parent) = socket_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let listener = UnixListener::bind(&socket_path).context("Failed to bind Unix socket")?;

    // Any local user may connect; every request is authorised by its session token
    fs::set_permissions(&socket_path, fs::Permissions::from_mode(0o666))?;

    tracing::info!("Listening on {}", socket_path.display());
    service::serve(&listener, &verifier, &config.service)
}
