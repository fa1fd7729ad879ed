//! URL and query-string helpers for format URL rewriting

use crate::error::SigError;
use url::Url;

/// Percent-decode a URI component (`+` is kept literally)
pub fn decode_component(value: &str) -> Result<String, SigError> {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| SigError::InvalidUrl(format!("invalid percent-encoding: {}", e)))
}

/// Decode a URL that is still percent-encoded as a whole
/// (`https%3A%2F%2F...`); URLs with a literal scheme separator pass unchanged.
pub fn decode_encoded_url(url: &str) -> Result<String, SigError> {
    if url.contains("://") {
        Ok(url.to_string())
    } else {
        decode_component(url)
    }
}

/// Parse an absolute URL
pub fn parse_url(url: &str) -> Result<Url, SigError> {
    Url::parse(url).map_err(|e| SigError::InvalidUrl(format!("{}: {}", e, url)))
}

/// First value of a query parameter
pub fn get_query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Set a query parameter, replacing every existing value for `key`.
///
/// The parameter keeps the position of its first occurrence; a new key is
/// appended.
pub fn set_query_param(url: &mut Url, key: &str, value: &str) {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut replaced = false;

    for (k, v) in url.query_pairs() {
        if k == key {
            if !replaced {
                pairs.push((k.into_owned(), value.to_string()));
                replaced = true;
            }
        } else {
            pairs.push((k.into_owned(), v.into_owned()));
        }
    }

    if !replaced {
        pairs.push((key.to_string(), value.to_string()));
    }

    url.query_pairs_mut().clear().extend_pairs(pairs);
}
