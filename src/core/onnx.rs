use crate::common::{FaceAuthError, Result};
use ort::{Environment, GraphOptimizationLevel, Session, SessionBuilder};
use std::path::Path;
use std::sync::Arc;

/// Builds an ONNX Runtime session for one of the face models.
pub(crate) fn load_session(
    name: &str,
    model_path: &Path,
    optimization_level: u32,
) -> Result<(Session, Arc<Environment>)> {
    let environment = Arc::new(
        Environment::builder()
            .with_name(name)
            .build()
            .map_err(|e| FaceAuthError::Model(format!("Failed to create environment: {}", e)))?
    );

    if !model_path.exists() {
        return Err(FaceAuthError::Model(
            format!("{} model not found at: {:?}", name, model_path)
        ));
    }

    let opt_level = match optimization_level {
        0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    };

    let session = SessionBuilder::new(&environment)?
        .with_optimization_level(opt_level)?
        .with_model_from_file(model_path)?;

    tracing::debug!("Loaded {} model from {}", name, model_path.display());
    Ok((session, environment))
}
