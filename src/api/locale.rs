//! Marketplace locales and their service hosts

use crate::errors::{ApiError, Result};

/// Request path shared by every marketplace
pub const SERVICE_PATH: &str = "/onca/xml";

/// Default locale when none is configured
pub const DEFAULT_LOCALE: &str = "us";

const HOSTS: &[(&str, &str)] = &[
    ("au", "webservices.amazon.com.au"),
    ("br", "webservices.amazon.com.br"),
    ("ca", "webservices.amazon.ca"),
    ("cn", "webservices.amazon.cn"),
    ("de", "webservices.amazon.de"),
    ("es", "webservices.amazon.es"),
    ("fr", "webservices.amazon.fr"),
    ("in", "webservices.amazon.in"),
    ("it", "webservices.amazon.it"),
    ("jp", "webservices.amazon.jp"),
    ("mx", "webservices.amazon.com.mx"),
    ("uk", "webservices.amazon.co.uk"),
    ("us", "webservices.amazon.com"),
];

/// Service host registered for `locale`
pub fn host(locale: &str) -> Result<&'static str> {
    HOSTS
        .iter()
        .find(|(code, _)| *code == locale)
        .map(|(_, host)| *host)
        .ok_or_else(|| ApiError::UnknownLocale(locale.to_string()))
}

/// All registered locale codes
pub fn locales() -> impl Iterator<Item = &'static str> {
    HOSTS.iter().map(|(code, _)| *code)
}
