use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use engine_logging::engine_debug;
use serde::{Deserialize, Serialize};

use crate::{FailureKind, ResolveError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
}

impl Default for ResolveSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(5),
            redirect_limit: 5,
        }
    }
}

/// Follows a URL's redirect chain and reports where it ends up.
pub trait RedirectResolver: Send + Sync {
    fn resolve(&self, url: &str) -> Result<String, ResolveError>;
}

/// Blocking `HEAD` resolver. Must not be called from inside an async task;
/// run it on a thread where blocking is allowed.
#[derive(Debug, Clone)]
pub struct ReqwestRedirectResolver {
    settings: ResolveSettings,
}

impl ReqwestRedirectResolver {
    pub fn new(settings: ResolveSettings) -> Self {
        Self { settings }
    }

    fn build_client(
        &self,
        redirect_counter: Arc<AtomicUsize>,
    ) -> Result<reqwest::blocking::Client, ResolveError> {
        let redirect_limit = self.settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            let count = attempt.previous().len();
            redirect_counter.store(count, Ordering::Relaxed);
            if count >= redirect_limit {
                attempt.error("redirect limit exceeded")
            } else {
                attempt.follow()
            }
        });

        reqwest::blocking::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .redirect(policy)
            .build()
            .map_err(|err| ResolveError::new(FailureKind::Network, err.to_string()))
    }
}

impl Default for ReqwestRedirectResolver {
    fn default() -> Self {
        Self::new(ResolveSettings::default())
    }
}

impl RedirectResolver for ReqwestRedirectResolver {
    fn resolve(&self, url: &str) -> Result<String, ResolveError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| ResolveError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let redirect_counter = Arc::new(AtomicUsize::new(0));
        let client = self.build_client(redirect_counter.clone())?;

        let response = client.head(parsed).send().map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let final_url = response.url().to_string();
        engine_debug!(
            "resolved {url} -> {final_url} after {} redirects",
            redirect_counter.load(Ordering::Relaxed)
        );
        Ok(final_url)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ResolveError {
    if err.is_timeout() {
        return ResolveError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return ResolveError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    ResolveError::new(FailureKind::Network, err.to_string())
}
