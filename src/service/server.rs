use crate::common::config::ServiceConfig;
use crate::common::{ErrorClass, FaceAuthError, Result};
use crate::core::auth::FaceVerifier;
use crate::core::gateway::FaceAnalyzer;
use crate::identity::{session_fingerprint, IdentityProvider};
use crate::service::protocol::{read_frame, write_frame, ErrorResponse, HealthStatus, Request, Response};
use crate::storage::EmbeddingStore;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::time::Duration;

const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Accepts connections one at a time and answers a single request on each.
pub fn serve<R, S, A>(
    listener: &UnixListener,
    verifier: &FaceVerifier<R, S, A>,
    config: &ServiceConfig,
) -> Result<()>
where
    R: IdentityProvider,
    S: EmbeddingStore,
    A: FaceAnalyzer,
{
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                if let Err(e) = handle_client(stream, verifier, config) {
                    tracing::error!("Client error: {}", e);
                }
            }
            Err(e) => {
                tracing::error!("Connection error: {}", e);
            }
        }
    }

    Ok(())
}

fn handle_client<R, S, A>(
    mut stream: UnixStream,
    verifier: &FaceVerifier<R, S, A>,
    config: &ServiceConfig,
) -> Result<()>
where
    R: IdentityProvider,
    S: EmbeddingStore,
    A: FaceAnalyzer,
{
    stream.set_read_timeout(Some(Duration::from_secs(config.read_timeout_secs)))?;
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
    handle_stream(&mut stream, verifier, config.max_request_bytes)
}

/// Reads one request frame from `stream` and writes the response frame back.
pub fn handle_stream<T, R, S, A>(
    stream: &mut T,
    verifier: &FaceVerifier<R, S, A>,
    max_request_bytes: usize,
) -> Result<()>
where
    T: Read + Write,
    R: IdentityProvider,
    S: EmbeddingStore,
    A: FaceAnalyzer,
{
    let request: Request = read_frame(stream, max_request_bytes)?;
    tracing::debug!("Processing {} request", request.name());

    let response = handle_request(verifier, &request);
    write_frame(stream, &response)
}

pub fn handle_request<R, S, A>(verifier: &FaceVerifier<R, S, A>, request: &Request) -> Response
where
    R: IdentityProvider,
    S: EmbeddingStore,
    A: FaceAnalyzer,
{
    let result = match request {
        Request::Health => Ok(Response::Healthy(health(verifier))),
        Request::Enroll(req) => verifier
            .enroll(req.session.as_deref(), req.image.as_ref())
            .map(|_| Response::Enrolled),
        Request::Verify(req) => verifier
            .verify(req.session.as_deref(), req.image.as_ref())
            .map(Response::Verified),
        Request::FetchEmbedding(req) => verifier
            .fetch_embedding(req.session.as_deref())
            .map(Response::Embedding),
    };

    result.unwrap_or_else(|err| Response::Error(report_failure(request, &err)))
}

fn health<R, S, A>(verifier: &FaceVerifier<R, S, A>) -> HealthStatus
where
    R: IdentityProvider,
    S: EmbeddingStore,
    A: FaceAnalyzer,
{
    let model = verifier.model();
    HealthStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: model.model.to_string(),
        metric: model.metric.to_string(),
        threshold: model.threshold,
    }
}

/// Logs `err` according to its class and turns it into what the caller may see.
pub fn report_failure(request: &Request, err: &FaceAuthError) -> ErrorResponse {
    let kind = err.kind();
    match kind.class() {
        ErrorClass::ClientInput => {
            tracing::warn!("{} rejected: {:?}", request.name(), kind);
        }
        ErrorClass::Diagnostic => match err {
            FaceAuthError::NotFound(identity) => {
                tracing::warn!("{} failed: no embedding stored for {}", request.name(), identity);
            }
            _ => {
                let fingerprint = request
                    .session()
                    .map(session_fingerprint)
                    .unwrap_or_else(|| "-".to_string());
                tracing::warn!("{} failed: {:?} (session {})", request.name(), kind, fingerprint);
            }
        },
        ErrorClass::Internal => {
            tracing::error!("{} failed: {}", request.name(), err);
        }
    }

    ErrorResponse::from_kind(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorKind;
    use crate::service::protocol::FetchEmbeddingRequest;

    fn fetch(session: &str) -> Request {
        Request::FetchEmbedding(FetchEmbeddingRequest {
            session: Some(session.to_string()),
        })
    }

    #[test]
    fn internal_failures_are_reported_generically() {
        let err = FaceAuthError::StoreUnavailable("permission denied: /var/lib/faceverify".into());
        let response = report_failure(&fetch("tok"), &err);
        assert_eq!(response.kind, ErrorKind::Internal);
        assert!(!response.message.contains("/var/lib"));

        let err = FaceAuthError::DimensionMismatch { probe: 128, reference: 512 };
        assert_eq!(report_failure(&fetch("tok"), &err).kind, ErrorKind::Internal);
    }

    #[test]
    fn diagnostic_failures_keep_their_kind() {
        let response = report_failure(&fetch("tok"), &FaceAuthError::NotFound("u1".into()));
        assert_eq!(response.kind, ErrorKind::NotFound);
        assert_eq!(response.message, "No face embedding found for the user.");
        assert!(!response.message.contains("u1"));

        let response = report_failure(&fetch("tok"), &FaceAuthError::InvalidSession);
        assert_eq!(response.kind, ErrorKind::InvalidSession);
    }
}
