//! Internet connectivity probe.
//!
//! Uploads go over the network, so the CLI checks reachability before doing
//! anything else. The probe is a single blocking GET bounded by a timeout;
//! it never retries.

use crate::constants::DEFAULT_CONNECTIVITY_URL;
use crate::{UploadError, UploadResult};
use reqwest::blocking::Client;
use std::time::Duration;

/// Probes a fixed HTTP(S) endpoint to confirm internet access.
#[derive(Debug, Clone)]
pub struct ConnectivityChecker {
    url: String,
    system_proxy: bool,
}

impl ConnectivityChecker {
    /// Create a checker for the default endpoint.
    pub fn new() -> Self {
        Self::with_url(DEFAULT_CONNECTIVITY_URL)
    }

    /// Create a checker for a custom endpoint.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            system_proxy: true,
        }
    }

    /// Ignore proxy settings from the environment.
    pub fn no_proxy(mut self) -> Self {
        self.system_proxy = false;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Verifies connection to the endpoint.
    ///
    /// The whole exchange (connect, request, reading the body) must finish
    /// within `timeout`, and the response status must be a success.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::InvalidInput` for a zero timeout and
    /// `UploadError::Connectivity` on timeout, connection failure or an
    /// unsuccessful status.
    pub fn check(&self, timeout: Duration) -> UploadResult<()> {
        if timeout.is_zero() {
            return Err(UploadError::InvalidInput(
                "connectivity timeout must be greater than zero".into(),
            ));
        }

        tracing::info!("checking for internet connectivity via {}", self.url);

        let mut builder = Client::builder().timeout(timeout).connect_timeout(timeout);
        if !self.system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| UploadError::Connectivity(format!("failed to build client: {e}")))?;

        let response = client
            .get(&self.url)
            .send()
            .map_err(|e| describe(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("connectivity check failed: HTTP {}", status);
            return Err(UploadError::Connectivity(format!(
                "{} returned HTTP {}",
                self.url, status
            )));
        }

        response.bytes().map_err(|e| describe(e, timeout))?;
        tracing::info!("internet connectivity confirmed");
        Ok(())
    }
}

impl Default for ConnectivityChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(error: reqwest::Error, timeout: Duration) -> UploadError {
    let reason = if error.is_timeout() {
        format!("no response within {timeout:?}")
    } else if error.is_connect() {
        format!("could not connect: {error}")
    } else {
        error.to_string()
    };
    tracing::warn!("connectivity check failed: {}", reason);
    UploadError::Connectivity(reason)
}

/// Verifies connection to the Internet using the default endpoint.
pub fn check_internet_connection(timeout: Duration) -> UploadResult<()> {
    ConnectivityChecker::new().check(timeout)
}
