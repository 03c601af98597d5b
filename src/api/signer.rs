//! Signature version 2 request signer
//!
//! Canonicalizes a parameter set and signs it with HMAC-SHA256:
//! - absent and empty values are dropped, defaults injected, `Timestamp` set
//! - keys sorted byte-wise (BTreeMap order), values percent-encoded (RFC 3986)
//! - signature = percent-encoded base64 of HMAC over `GET\nhost\npath\nquery`

use crate::api::locale;
use crate::api::params::RequestParameters;
use crate::errors::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Hex lookup table for percent encoding
static HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

pub const SERVICE_NAME: &str = "AWSECommerceService";
pub const DEFAULT_VERSION: &str = "2011-08-01";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A fully signed request URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub scheme: String,
    pub host: String,
    pub path: String,
    pub canonical_query: String,
    /// Already percent-encoded
    pub signature: String,
}

impl SignedUrl {
    /// Replace the scheme (the scheme is not covered by the signature)
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }
}

impl fmt::Display for SignedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}{}?{}&Signature={}",
            self.scheme, self.host, self.path, self.canonical_query, self.signature
        )
    }
}

/// Signs request parameters for one set of credentials
#[derive(Clone)]
pub struct RequestSigner {
    access_key: String,
    secret_key: String,
    associate_tag: Option<String>,
    version: String,
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("access_key", &self.access_key)
            .field("associate_tag", &self.associate_tag)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl RequestSigner {
    pub fn new(access_key: String, secret_key: String) -> Self {
        Self {
            access_key,
            secret_key,
            associate_tag: None,
            version: DEFAULT_VERSION.to_string(),
        }
    }

    /// Inject `AssociateTag` into every request that lacks one
    pub fn with_associate_tag(mut self, associate_tag: Option<String>) -> Self {
        self.associate_tag = associate_tag.filter(|t| !t.is_empty());
        self
    }

    /// Default `Version` parameter
    pub fn with_version(mut self, version: String) -> Self {
        self.version = version;
        self
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// Sign for the registered host of `locale`, using the current time
    pub fn sign_for_locale(&self, locale: &str, params: &RequestParameters) -> Result<SignedUrl> {
        let host = locale::host(locale)?;
        Ok(self.sign(host, locale::SERVICE_PATH, params))
    }

    /// Sign for an explicit host and path, using the current time
    pub fn sign(&self, host: &str, path: &str, params: &RequestParameters) -> SignedUrl {
        self.sign_at(host, path, params, Utc::now())
    }

    /// Sign with a fixed timestamp
    pub fn sign_at(
        &self,
        host: &str,
        path: &str,
        params: &RequestParameters,
        timestamp: DateTime<Utc>,
    ) -> SignedUrl {
        let canonical_query = self.canonical_query(params, timestamp);
        let signature = self.signature_for(host, path, &canonical_query);

        SignedUrl {
            scheme: "https".to_string(),
            host: host.to_string(),
            path: path.to_string(),
            canonical_query,
            signature,
        }
    }

    /// Canonical query string: defaults injected, keys sorted, values encoded
    pub fn canonical_query(&self, params: &RequestParameters, timestamp: DateTime<Utc>) -> String {
        let mut pairs: BTreeMap<String, String> = params.wire_pairs();
        pairs.remove("Signature");

        pairs
            .entry("Service".to_string())
            .or_insert_with(|| SERVICE_NAME.to_string());
        pairs
            .entry("Version".to_string())
            .or_insert_with(|| self.version.clone());
        pairs
            .entry("AWSAccessKeyId".to_string())
            .or_insert_with(|| self.access_key.clone());
        if let Some(tag) = &self.associate_tag {
            pairs
                .entry("AssociateTag".to_string())
                .or_insert_with(|| tag.clone());
        }
        pairs.insert(
            "Timestamp".to_string(),
            timestamp.format(TIMESTAMP_FORMAT).to_string(),
        );

        let mut query = String::with_capacity(pairs.len() * 32);
        for (key, value) in &pairs {
            if !query.is_empty() {
                query.push('&');
            }
            query.push_str(key);
            query.push('=');
            uri_encode_into(&mut query, value);
        }
        query
    }

    /// Percent-encoded base64 HMAC-SHA256 over the signing message
    fn signature_for(&self, host: &str, path: &str, canonical_query: &str) -> String {
        let message = format!("GET\n{}\n{}\n{}", host, path, canonical_query);
        let digest = Self::hmac_sha256(self.secret_key.as_bytes(), message.as_bytes());
        uri_encode(&BASE64.encode(digest))
    }

    /// HMAC-SHA256 returning fixed-size array
    fn hmac_sha256(key: &[u8], msg: &[u8]) -> [u8; 32] {
        let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
        mac.update(msg);
        let result = mac.finalize().into_bytes();
        let mut output = [0u8; 32];
        output.copy_from_slice(&result);
        output
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set
pub fn uri_encode(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 16);
    uri_encode_into(&mut result, s);
    result
}

fn uri_encode_into(buf: &mut String, s: &str) {
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                buf.push(byte as char);
            }
            _ => {
                buf.push('%');
                buf.push(HEX_UPPER[(byte >> 4) as usize] as char);
                buf.push(HEX_UPPER[(byte & 0xf) as usize] as char);
            }
        }
    }
}
