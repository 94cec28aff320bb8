use thiserror::Error;

/// Pipeline failures for a single URL. The `Display` strings are the
/// exact per-item messages returned to clients, so changing one changes
/// the wire contract.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("URL parse error")]
    UrlParse,

    #[error("Invalid URL (blacklisted)")]
    Blacklisted,

    #[error("HTTP GET result status code: {status} url: {url}")]
    Status { status: u16, url: String },

    #[error("File at URL is too large")]
    TooLarge,

    #[error("Invalid content-type detected: {0}")]
    ContentType(String),

    #[error("Max redirects limit reached! Request URL: {0}")]
    MaxRedirects(String),

    #[error("gzip error: {0}")]
    Gzip(String),

    #[error("redirect response from {0} without a Location header")]
    MissingLocation(String),

    #[error("{0}")]
    Transport(String),
}

impl FetchError {
    /// Flatten a reqwest error and its cause chain into one message;
    /// reqwest's top-level `Display` alone hides the interesting part
    /// (DNS failure, connection refused, timeout).
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = std::error::Error::source(cause);
        }
        Self::Transport(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_wire_contract() {
        assert_eq!(FetchError::UrlParse.to_string(), "URL parse error");
        assert_eq!(FetchError::Blacklisted.to_string(), "Invalid URL (blacklisted)");
        assert_eq!(
            FetchError::Status { status: 404, url: "http://example.com/".to_string() }.to_string(),
            "HTTP GET result status code: 404 url: http://example.com/"
        );
        assert_eq!(FetchError::TooLarge.to_string(), "File at URL is too large");
        assert_eq!(
            FetchError::ContentType("image/jpeg".to_string()).to_string(),
            "Invalid content-type detected: image/jpeg"
        );
        assert_eq!(
            FetchError::MaxRedirects("http://example.com/loop".to_string()).to_string(),
            "Max redirects limit reached! Request URL: http://example.com/loop"
        );
        assert_eq!(
            FetchError::Gzip("unexpected EOF".to_string()).to_string(),
            "gzip error: unexpected EOF"
        );
    }
}
