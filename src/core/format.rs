//! Format descriptors and extracted player fragments

use crate::error::SigError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Player script as fetched from the platform
#[derive(Debug, Clone)]
pub struct PlayerScript {
    /// Script URL, also used as the cache key
    pub id: String,
    /// Raw script text
    pub text: String,
}

impl PlayerScript {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Fragments extracted from one player script.
///
/// Each fragment is self-contained source ending in an invocation of the
/// extracted routine on a bound variable: `sig` for the decipher routine and
/// `ncode` for the n-transform routine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFunctions {
    /// Signature decipher fragment
    pub decipher: Option<String>,
    /// N-parameter transform fragment
    pub n_transform: Option<String>,
}

impl ExtractedFunctions {
    /// Fragments that were found, decipher first
    pub fn fragments(&self) -> Vec<&str> {
        self.decipher
            .iter()
            .chain(self.n_transform.iter())
            .map(String::as_str)
            .collect()
    }

    /// Number of fragments found (0, 1 or 2)
    pub fn len(&self) -> usize {
        self.decipher.is_some() as usize + self.n_transform.is_some() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Media format descriptor as returned by the player API.
///
/// Only the URL-bearing fields are modelled; everything else is carried in
/// `extra` so a format survives a JSON round trip unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFormat {
    /// Direct download URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Signature cipher (if encrypted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_cipher: Option<String>,
    /// Legacy name of the signature cipher field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cipher: Option<String>,
    /// Passthrough fields (itag, mimeType, bitrate, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MediaFormat {
    /// Create a format with a direct URL
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Create a format carrying a signature cipher
    pub fn with_signature_cipher(cipher: impl Into<String>) -> Self {
        Self {
            signature_cipher: Some(cipher.into()),
            ..Default::default()
        }
    }

    /// Format ID, if present in the passthrough fields
    pub fn itag(&self) -> Option<u64> {
        self.extra.get("itag").and_then(Value::as_u64)
    }

    /// Cipher string, preferring `signatureCipher` over `cipher`
    pub fn cipher_string(&self) -> Option<&str> {
        self.signature_cipher
            .as_deref()
            .or(self.cipher.as_deref())
    }

    /// Check if format needs signature deciphering
    pub fn needs_deciphering(&self) -> bool {
        self.url.is_none() && self.cipher_string().is_some()
    }
}

/// Arguments carried by a cipher string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherArgs {
    /// Encrypted media URL
    pub url: String,
    /// Scrambled signature
    pub s: Option<String>,
    /// Query parameter that receives the deciphered signature
    pub sp: Option<String>,
}

impl CipherArgs {
    /// Parse a query-string encoded cipher bundle
    pub fn parse(cipher: &str) -> Result<Self, SigError> {
        let mut url = None;
        let mut s = None;
        let mut sp = None;

        for (key, value) in url::form_urlencoded::parse(cipher.as_bytes()) {
            let slot = match &*key {
                "url" => &mut url,
                "s" => &mut s,
                "sp" => &mut sp,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        let url = url.ok_or_else(|| {
            SigError::InvalidUrl(format!("cipher string has no url: {}", cipher))
        })?;

        Ok(Self {
            url,
            s: s.filter(|s| !s.is_empty()),
            sp: sp.filter(|sp| !sp.is_empty()),
        })
    }

    /// Name of the signature query parameter
    pub fn signature_param(&self) -> &str {
        self.sp.as_deref().unwrap_or("signature")
    }
}
