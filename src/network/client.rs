//! Network client with built-in timeout, retry and error handling

use super::error_handler::ErrorHandler;
use super::retry::RetryPolicy;
use crate::backend::error::BackendError;
use crate::consts::cli_consts::{self, network};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use std::time::Duration;

/// How many times a request may be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Up to the policy's attempt count.
    Retried,
    /// Exactly once. The caller owns any retry.
    Once,
}

/// A complete HTTP reply: status line and fully read body.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Reply {
    async fn read(response: Response) -> Result<Self, BackendError> {
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(Self { status, body })
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests through a [`RetryPolicy`]. Callers describe the request
/// with a closure so it can be rebuilt for every attempt.
#[derive(Debug, Clone)]
pub struct NetworkClient {
    client: Client,
    policy: RetryPolicy,
    error_handler: ErrorHandler,
}

impl NetworkClient {
    pub fn new(policy: RetryPolicy) -> Result<Self, BackendError> {
        // The policy times each attempt, body included.
        let client = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(network::CONNECT_TIMEOUT_SECS))
            .user_agent(cli_consts::USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            policy,
            error_handler: ErrorHandler::new(),
        })
    }

    /// Send with automatic retry. Any HTTP reply, success or not, is
    /// returned as-is; only transport failures and timeouts are retried.
    pub async fn send<F>(&self, operation: &str, build: F) -> Result<Reply, BackendError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        self.deliver(Delivery::Retried, operation, build).await
    }

    /// Send exactly once, still bounded by the policy's timeout.
    pub async fn send_once<F>(&self, operation: &str, build: F) -> Result<Reply, BackendError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        self.deliver(Delivery::Once, operation, build).await
    }

    pub async fn deliver<F>(
        &self,
        delivery: Delivery,
        operation: &str,
        build: F,
    ) -> Result<Reply, BackendError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let policy = match delivery {
            Delivery::Retried => self.policy,
            Delivery::Once => self.policy.single_attempt(),
        };
        let result = policy
            .run(
                operation,
                || {
                    let request = build(&self.client);
                    async move {
                        let response = request.send().await?;
                        Reply::read(response).await
                    }
                },
                |e| self.error_handler.should_retry(e),
            )
            .await;

        if let Err(e) = &result {
            self.error_handler.log(operation, e);
        }
        result
    }
}
