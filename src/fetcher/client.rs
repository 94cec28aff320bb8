use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use reqwest::{redirect, Client, ClientBuilder, Response};
use url::Url;

use crate::fetcher::cookies::SharedJar;
use crate::fetcher::errors::FetchError;

const USER_AGENT: &str = "linksbot/0.1 (+https://example.com/links)";

/// The one HTTP client every fetch goes through.
///
/// Redirects are not followed: a 3xx comes back to the orchestrator,
/// which maintains its own hop counter. Automatic decompression is off
/// (the crate is built without reqwest's gzip feature), so
/// `Content-Encoding` reaches the body reader. Connections are not kept
/// alive between fetches, and one timeout covers connect, TLS and the
/// response.
pub struct HttpFetcher {
    client: Client,
    jar: Arc<SharedJar>,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_resolve_overrides(timeout, &[])
    }

    /// Like [`HttpFetcher::new`], with DNS pinned for the given hosts.
    /// This is the seam integration tests use to serve real hostnames
    /// from a local mock server (the port is taken from the URL).
    pub fn with_resolve_overrides(
        timeout: Duration,
        overrides: &[(&str, IpAddr)],
    ) -> Result<Self, reqwest::Error> {
        let jar = Arc::new(SharedJar::new());
        let mut builder = ClientBuilder::new()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(redirect::Policy::none())
            .pool_max_idle_per_host(0)
            .cookie_provider(jar.clone());
        for (host, addr) in overrides {
            builder = builder.resolve(host, SocketAddr::new(*addr, 0));
        }
        Ok(Self {
            client: builder.build()?,
            jar,
        })
    }

    /// One GET, no redirect following. 3xx responses come back as
    /// ordinary responses for the caller to inspect.
    pub async fn get(&self, url: &Url) -> Result<Response, FetchError> {
        self.client
            .get(url.clone())
            .send()
            .await
            .map_err(FetchError::from_reqwest)
    }

    /// Swap the shared cookie jar for an empty one.
    pub fn reset_cookies(&self) {
        self.jar.reset();
    }
}
