use crate::common::{DevMode, FaceAuthError, Result};
use crate::core::auth::FaceUpload;
use crate::core::engine::VerificationOutcome;
use crate::core::recognizer::Embedding;
use crate::service::protocol::{
    read_frame, write_frame, EnrollRequest, FetchEmbeddingRequest, HealthStatus, Request,
    Response, VerifyRequest, MAX_RESPONSE_BYTES,
};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONNECT_RETRIES: u32 = 3;

pub struct ServiceClient {
    socket_path: PathBuf,
    read_timeout: Duration,
}

impl ServiceClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            read_timeout: Duration::from_secs(120),
        }
    }

    pub fn from_dev_mode(dev_mode: &DevMode) -> Self {
        Self::new(dev_mode.socket_path())
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn health(&self) -> Result<HealthStatus> {
        match self.send(&Request::Health)? {
            Response::Healthy(status) => Ok(status),
            other => Err(unexpected(&other)),
        }
    }

    pub fn enroll(&self, session: &str, image: FaceUpload) -> Result<()> {
        let request = Request::Enroll(EnrollRequest {
            session: Some(session.to_string()),
            image: Some(image),
        });

        match self.send(&request)? {
            Response::Enrolled => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    pub fn verify(&self, session: &str, image: FaceUpload) -> Result<VerificationOutcome> {
        let request = Request::Verify(VerifyRequest {
            session: Some(session.to_string()),
            image: Some(image),
        });

        match self.send(&request)? {
            Response::Verified(outcome) => Ok(outcome),
            other => Err(unexpected(&other)),
        }
    }

    pub fn fetch_embedding(&self, session: &str) -> Result<Embedding> {
        let request = Request::FetchEmbedding(FetchEmbeddingRequest {
            session: Some(session.to_string()),
        });

        match self.send(&request)? {
            Response::Embedding(embedding) => Ok(embedding),
            other => Err(unexpected(&other)),
        }
    }

    /// One request per connection; service errors come back as `FaceAuthError::Service`.
    pub fn send(&self, request: &Request) -> Result<Response> {
        let mut stream = self.connect_with_retry(CONNECT_RETRIES)?;
        write_frame(&mut stream, request)?;

        match read_frame(&mut stream, MAX_RESPONSE_BYTES)? {
            Response::Error(err) => Err(err.into()),
            response => Ok(response),
        }
    }

    fn connect_with_retry(&self, max_retries: u32) -> Result<UnixStream> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match UnixStream::connect(&self.socket_path) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.read_timeout))?;
                    stream.set_write_timeout(Some(Duration::from_secs(10)))?;
                    return Ok(stream);
                }
                Err(e) if attempt < max_retries => {
                    tracing::debug!("Failed to connect (attempt {}): {}", attempt, e);
                    std::thread::sleep(Duration::from_millis(500));
                }
                Err(e) => {
                    return Err(FaceAuthError::Other(anyhow::anyhow!(
                        "Failed to connect to service at {}: {}. Is faceverify-service running?",
                        self.socket_path.display(),
                        e
                    )));
                }
            }
        }
    }
}

fn unexpected(response: &Response) -> FaceAuthError {
    FaceAuthError::Other(anyhow::anyhow!("Unexpected response type: {:?}", response))
}
