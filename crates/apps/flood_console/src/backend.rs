//! HTTP access to the analysis backend and the agent service.

use agent::interrupt::ResumeValue;
use layers::payload::{AgentImagery, ImpactAssessment};
use serde::de::DeserializeOwned;
use serde::Serialize;
use streaming::protocol::{
    AnalysisRequest, ApiEnvelope, ClassicResponse, ClassicResult, EnvelopeError, GeeStatus,
    ImageryRequest, ImageryResponse, ImpactRequest, ImpactResponse, ANALYSIS_PATH, IMAGERY_PATH,
    IMPACT_PATH, STATUS_PATH,
};
use tracing::debug;

pub const RESUME_PATH: &str = "/resume";

#[derive(Debug)]
pub enum BackendError {
    Http(reqwest::Error),
    Status { url: String, status: reqwest::StatusCode },
    Envelope(EnvelopeError),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Http(err) => write!(f, "HTTP request failed: {err}"),
            BackendError::Status { url, status } => write!(f, "{url} answered {status}"),
            BackendError::Envelope(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Http(err) => Some(err),
            BackendError::Envelope(err) => Some(err),
            BackendError::Status { .. } => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Http(err)
    }
}

impl From<EnvelopeError> for BackendError {
    fn from(err: EnvelopeError) -> Self {
        BackendError::Envelope(err)
    }
}

#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    gee_url: String,
    agent_url: String,
}

impl HttpBackend {
    pub fn new(gee_url: impl Into<String>, agent_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            gee_url: gee_url.into(),
            agent_url: agent_url.into(),
        }
    }

    fn gee(&self, path: &str) -> String {
        join_url(&self.gee_url, path)
    }

    fn agent(&self, path: &str) -> String {
        join_url(&self.agent_url, path)
    }

    pub async fn status(&self) -> Result<GeeStatus, BackendError> {
        let url = self.agent(STATUS_PATH);
        let resp = self.client.get(&url).send().await?;
        decode(url, resp).await
    }

    pub async fn analysis(&self, request: &AnalysisRequest) -> Result<ClassicResult, BackendError> {
        let body: ClassicResponse = self.post(self.gee(ANALYSIS_PATH), request).await?;
        Ok(body.into())
    }

    pub async fn imagery(&self, request: &ImageryRequest) -> Result<AgentImagery, BackendError> {
        let envelope: ApiEnvelope<ImageryResponse> =
            self.post(self.agent(IMAGERY_PATH), request).await?;
        Ok(envelope.into_data()?.into())
    }

    pub async fn impact(&self, request: &ImpactRequest) -> Result<ImpactAssessment, BackendError> {
        let envelope: ApiEnvelope<ImpactResponse> =
            self.post(self.agent(IMPACT_PATH), request).await?;
        Ok(envelope.into_data()?.into())
    }

    /// Hands a confirmation result back to the suspended agent turn.
    pub async fn resume(&self, value: &ResumeValue) -> Result<(), BackendError> {
        let url = self.agent(RESUME_PATH);
        let resp = self.client.post(&url).json(value).send().await?;
        if !resp.status().is_success() {
            return Err(BackendError::Status {
                url,
                status: resp.status(),
            });
        }
        Ok(())
    }

    async fn post<B, T>(&self, url: String, body: &B) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(%url, "POST");
        let resp = self.client.post(&url).json(body).send().await?;
        decode(url, resp).await
    }
}

async fn decode<T: DeserializeOwned>(
    url: String,
    resp: reqwest::Response,
) -> Result<T, BackendError> {
    if !resp.status().is_success() {
        return Err(BackendError::Status {
            url,
            status: resp.status(),
        });
    }
    Ok(resp.json().await?)
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
