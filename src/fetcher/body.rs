//! Body post-processing: gzip decompression when the response says so,
//! then charset-sniffed decoding to UTF-8.

use std::io::Read;
use std::sync::LazyLock;

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use flate2::read::GzDecoder;
use regex::Regex;

use crate::fetcher::errors::FetchError;

static CHARSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)charset\s*=\s*["']?([^"'\s;]+)"#).unwrap());

static META_CHARSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<meta\s+[^>]*?charset\s*=\s*["']?([^"'\s/>]+)"#).unwrap());

static META_HTTP_EQUIV_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+[^>]*?http-equiv\s*=\s*["']?content-type["']?[^>]*?content\s*=\s*["']?[^"'>]*?charset\s*=\s*([^"'\s;/>]+)"#).unwrap()
});

/// Decompress (for `Content-Encoding: gzip`) and decode the body to
/// UTF-8. Decoding is lossy: a page with broken bytes yields
/// replacement characters, never a failure. Only the gzip stream itself
/// can error.
pub fn read_body(
    raw: &[u8],
    content_encoding: Option<&str>,
    content_type: &str,
) -> Result<String, FetchError> {
    let decompressed: Vec<u8> = match content_encoding {
        Some("gzip") => {
            let mut decoder = GzDecoder::new(raw);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| FetchError::Gzip(e.to_string()))?;
            out
        }
        _ => raw.to_vec(),
    };

    let encoding = detect_charset(content_type, &decompressed);
    let (decoded, _, _) = encoding.decode(&decompressed);
    Ok(decoded.into_owned())
}

/// Charset resolution order: Content-Type header, `<meta charset>` or
/// `http-equiv` declaration in the first 4KB, then byte statistics.
fn detect_charset(content_type: &str, body: &[u8]) -> &'static Encoding {
    if let Some(captures) = CHARSET_REGEX.captures(content_type) {
        if let Some(label) = captures.get(1) {
            if let Some(encoding) = Encoding::for_label(label.as_str().as_bytes()) {
                return encoding;
            }
        }
    }

    let head = &body[..body.len().min(4096)];
    let head_str = String::from_utf8_lossy(head);

    if let Some(captures) = META_CHARSET_REGEX.captures(&head_str) {
        if let Some(label) = captures.get(1) {
            if let Some(encoding) = Encoding::for_label(label.as_str().as_bytes()) {
                return encoding;
            }
        }
    }

    if let Some(captures) = META_HTTP_EQUIV_REGEX.captures(&head_str) {
        if let Some(label) = captures.get(1) {
            if let Some(encoding) = Encoding::for_label(label.as_str().as_bytes()) {
                return encoding;
            }
        }
    }

    let mut detector = EncodingDetector::new();
    detector.feed(head, false);
    detector.guess(None, true)
}
