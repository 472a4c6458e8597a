//! Remote generation provider abstraction
//!
//! The engine only talks to the provider through [`ProviderClient`]: submit a job, poll
//! its status, fetch the finished asset. [`dashscope`] implements it over HTTP; tests
//! plug in scripted implementations.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::ProviderError;
use crate::types::GenerationParams;

pub mod dashscope;

pub use dashscope::DashScopeClient;

/// A generation job ready to send to the provider
#[derive(Clone, Debug)]
pub struct SubmitJob {
    /// Generation parameters
    pub params: GenerationParams,
    /// Source image inlined as a `data:` URL
    pub image_data_url: String,
}

/// Provider-side status of a job, reduced to what the engine acts on
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteStatus {
    /// Queued, running or suspended on the provider side
    Running {
        /// Status message, when the provider sends one
        message: Option<String>,
    },
    /// Finished successfully
    Succeeded {
        /// Where the generated video can be fetched from
        result_url: Option<String>,
    },
    /// Finished with an error (includes provider-side cancellation)
    Failed {
        /// Provider error code
        code: Option<String>,
        /// Provider error message
        message: Option<String>,
    },
    /// The provider does not know the job
    NotFound,
}

/// Streamed body of a result asset
pub type AssetStream = BoxStream<'static, Result<Bytes, ProviderError>>;

/// Operations the engine needs from a remote generation provider
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Submit a job; returns the provider's job id
    async fn submit(&self, job: &SubmitJob) -> Result<String, ProviderError>;

    /// Query the current status of a job
    async fn poll(&self, remote_job_id: &str) -> Result<RemoteStatus, ProviderError>;

    /// Open a byte stream for a finished asset
    async fn fetch(&self, result_url: &str) -> Result<AssetStream, ProviderError>;
}
