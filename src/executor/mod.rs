//! HTTP request executor.
//!
//! The [`Transport`] trait is the contract between the coordinator and the
//! network: one request in, exactly one [`ExecutionOutcome`] out. Retries are
//! not performed here.
//!
//! [`HttpExecutor`] is the shipped implementation, built on reqwest. The timeout
//! covers the whole exchange (connect, send, headers and body), and a cancelled
//! or timed-out attempt drops the in-flight reqwest future, which releases its
//! connection.

pub mod config;
pub mod error;

pub use config::ExecutionConfig;
pub use error::{classify, describe, ExecutorError};

use crate::models::{ExecutionOutcome, HttpMethod, RequestSpec};
use log::{debug, info};
use std::future::Future;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Something that can carry out a single HTTP exchange.
pub trait Transport: Send + Sync {
    /// Executes `spec` once.
    ///
    /// Never fails: every failure mode is reported through the returned outcome.
    /// Cancelling `cancel` before the response body has been read yields
    /// [`ExecutionOutcome::Cancelled`]; cancelling afterwards has no effect.
    fn execute(
        &self,
        spec: RequestSpec,
        cancel: CancellationToken,
    ) -> impl Future<Output = ExecutionOutcome> + Send;
}

/// reqwest-backed [`Transport`].
///
/// Holds two clients because reqwest fixes the redirect policy per client: one
/// follows redirects up to the configured cap, the other returns 3xx responses
/// as they are.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    following: reqwest::Client,
    direct: reqwest::Client,
}

impl HttpExecutor {
    /// Builds both HTTP clients from `config`.
    ///
    /// # Arguments
    /// * `config` - Timeout, redirect cap, certificate validation and user agent
    ///
    /// # Returns
    /// The executor, or [`ExecutorError::ClientBuild`] if reqwest rejects the
    /// settings (e.g. the TLS backend fails to initialize).
    pub fn new(config: &ExecutionConfig) -> Result<Self, ExecutorError> {
        // reqwest counts the original URL among the previous hops
        let following = build_client(
            config,
            reqwest::redirect::Policy::limited(config.max_redirects.saturating_add(1)),
        )?;
        let direct = build_client(config, reqwest::redirect::Policy::none())?;

        if !config.validate_ssl {
            debug!("TLS certificate validation is disabled");
        }

        Ok(Self { following, direct })
    }

    /// Creates an executor from the global configuration.
    pub fn from_global_config() -> Result<Self, ExecutorError> {
        Self::new(&ExecutionConfig::from_global_config())
    }

    fn client_for(&self, spec: &RequestSpec) -> &reqwest::Client {
        if spec.follow_redirects() {
            &self.following
        } else {
            &self.direct
        }
    }
}

impl Transport for HttpExecutor {
    async fn execute(&self, spec: RequestSpec, cancel: CancellationToken) -> ExecutionOutcome {
        let start = Instant::now();

        if cancel.is_cancelled() {
            debug!("{} cancelled before sending", spec);
            return ExecutionOutcome::Cancelled {
                elapsed: start.elapsed(),
            };
        }

        let mut builder = self
            .client_for(&spec)
            .request(to_reqwest_method(spec.method()), spec.resolved_url());

        for (name, value) in spec.effective_headers() {
            builder = builder.header(name, value);
        }

        if let Some(body) = spec.body() {
            builder = builder.body(body.bytes.clone());
        }

        let attempt = async move {
            let response = builder.send().await?;
            read_response(response, start).await
        };

        let outcome = tokio::select! {
            biased;

            result = attempt => match result {
                Ok(outcome) => outcome,
                Err(err) => ExecutionOutcome::NetworkFailure {
                    kind: classify(&err),
                    message: describe(&err),
                    elapsed: start.elapsed(),
                },
            },
            _ = cancel.cancelled() => ExecutionOutcome::Cancelled {
                elapsed: start.elapsed(),
            },
            _ = tokio::time::sleep(spec.timeout()) => ExecutionOutcome::Timeout {
                elapsed: start.elapsed(),
            },
        };

        info!("{} -> {}", spec, outcome.summary());
        outcome
    }
}

fn build_client(
    config: &ExecutionConfig,
    policy: reqwest::redirect::Policy,
) -> Result<reqwest::Client, ExecutorError> {
    reqwest::Client::builder()
        .redirect(policy)
        .danger_accept_invalid_certs(!config.validate_ssl)
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(ExecutorError::ClientBuild)
}

/// Reads the full response into a `Success` outcome.
async fn read_response(
    response: reqwest::Response,
    start: Instant,
) -> Result<ExecutionOutcome, reqwest::Error> {
    let status = response.status();
    let final_url = response.url().to_string();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    let body = response.bytes().await?.to_vec();

    Ok(ExecutionOutcome::Success {
        status_code: status.as_u16(),
        reason: status.canonical_reason().unwrap_or_default().to_string(),
        final_url,
        headers,
        body,
        elapsed: start.elapsed(),
    })
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::GET => reqwest::Method::GET,
        HttpMethod::POST => reqwest::Method::POST,
        HttpMethod::PUT => reqwest::Method::PUT,
        HttpMethod::PATCH => reqwest::Method::PATCH,
        HttpMethod::DELETE => reqwest::Method::DELETE,
        HttpMethod::HEAD => reqwest::Method::HEAD,
        HttpMethod::OPTIONS => reqwest::Method::OPTIONS,
    }
}
