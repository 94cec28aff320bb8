//! A cookie store that can be swapped for a fresh one while requests
//! are in flight. The store is shared across every fetch the process
//! performs; the batch path resets it periodically so it never grows
//! without bound.

use std::sync::{Arc, RwLock};

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use url::Url;

#[derive(Default)]
pub struct SharedJar {
    inner: RwLock<Arc<Jar>>,
}

impl SharedJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a fresh, empty jar. Requests that already hold the old
    /// jar finish against it; the swap itself is a plain pointer store.
    pub fn reset(&self) {
        *self.inner.write().unwrap() = Arc::new(Jar::default());
    }

    fn current(&self) -> Arc<Jar> {
        self.inner.read().unwrap().clone()
    }
}

impl CookieStore for SharedJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.current().set_cookies(cookie_headers, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.current().cookies(url)
    }
}
