//! HTTP client with rate limiting and basic authentication for the media
//! center's HTTP API.
//!
//! This module provides a wrapper around `reqwest::Client` that adds:
//! * Request rate limiting so that a burst of UI actions (for example
//!   scrolling through hundreds of album covers) cannot flood the media
//!   center, which typically runs on modest hardware
//! * Optional HTTP basic authentication
//! * Consistent timeouts and headers
//!
//! # Example
//!
//! ```rust
//! use mcremote::{config::Config, http::Client};
//!
//! let client = Client::new(&Config::default())?;
//! let body = client.get_text(url).await?;
//! ```

use std::{num::NonZeroU32, time::Duration};

use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::Url;

use crate::{
    config::{Config, Password},
    error::{Error, Result},
};

/// HTTP client with built-in rate limiting and optional basic auth.
pub struct Client {
    inner: reqwest::Client,
    rate_limiter: DefaultDirectRateLimiter,
    credentials: Option<(String, Option<Password>)>,
}

impl Client {
    /// Rolling window for the rate limit.
    const RATE_LIMIT_INTERVAL: Duration = Duration::from_secs(1);

    /// Maximum calls within each window before requests are delayed.
    const RATE_LIMIT_CALLS_PER_INTERVAL: u8 = 20;

    /// Duration to keep idle connections alive.
    ///
    /// Remote controls issue many small requests in quick succession.
    const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Duration to wait for individual network reads.
    const READ_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a new client from the connection settings in `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .tcp_keepalive(Self::KEEPALIVE_TIMEOUT)
            .read_timeout(Self::READ_TIMEOUT)
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
            .build()?;

        // Rate limit own requests as to not overload the media center.
        let replenish_interval =
            Self::RATE_LIMIT_INTERVAL / u32::from(Self::RATE_LIMIT_CALLS_PER_INTERVAL);
        let burst = NonZeroU32::new(Self::RATE_LIMIT_CALLS_PER_INTERVAL.into())
            .ok_or_else(|| Error::internal("calls per interval is zero"))?;
        let quota = Quota::with_period(replenish_interval)
            .ok_or_else(|| Error::internal("quota time interval is zero"))?
            .allow_burst(burst);

        let credentials = config
            .username
            .clone()
            .map(|username| (username, config.password.clone()));

        Ok(Self {
            inner,
            rate_limiter: governor::RateLimiter::direct(quota),
            credentials,
        })
    }

    /// Performs a rate-limited `GET` and returns the response body as text.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails, the server answers with an error
    /// status, or the body cannot be read.
    pub async fn get_text(&self, url: Url) -> Result<String> {
        self.rate_limiter.until_ready().await;

        let mut request = self.inner.get(url);
        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, password.as_ref().map(Password::as_str));
        }

        let response = request.send().await?.error_for_status()?;
        response.text().await.map_err(Into::into)
    }
}
