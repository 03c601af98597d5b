//! Classification of service error responses
//!
//! The service reports failures as a `(Code, Message)` pair. For several codes
//! the only machine-relevant detail (parameter name, offending value, ASIN)
//! lives inside the localized prose of the message, so extraction patterns are
//! kept per locale as plain data: adding a locale means adding a table, not code.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;

/// Closed set of service failures a caller can observe
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Internal service error, please try again")]
    InternalError,

    #[error("The access key id does not exist")]
    InvalidClientTokenId,

    #[error("Request must contain AWSAccessKeyId")]
    MissingClientTokenId,

    #[error("Request signature does not match")]
    InvalidSignature,

    #[error("Account has no access to the Product Advertising API")]
    InvalidAccount,

    #[error("Account request limit exceeded")]
    AccountLimitExceeded,

    #[error("Requests are being throttled")]
    TooManyRequests,

    #[error("Missing required parameters: {message}")]
    MissingParameters { message: String },

    #[error("Parameter out of range: {message}")]
    ParameterOutOfRange { message: String },

    #[error("Invalid search index: {}", index.as_deref().unwrap_or("?"))]
    InvalidSearchIndex { index: Option<String> },

    #[error("Invalid response group: {}", group.as_deref().unwrap_or("?"))]
    InvalidResponseGroup { group: Option<String> },

    #[error("{value} is not a valid value for {parameter}")]
    InvalidParameterValue { parameter: String, value: String },

    #[error("Invalid value for enumerated parameter {parameter}")]
    InvalidEnumeratedParameter { parameter: String },

    #[error("Invalid list type")]
    InvalidListType,

    #[error("No similar items for ASIN {asin}")]
    NoSimilarityForAsin { asin: String },

    #[error("No exact matches found")]
    NoExactMatchesFound,

    #[error("Request needs at least {} of: {}", number.map(|n| n.to_string()).unwrap_or_else(|| "one".to_string()), parameters.join(", "))]
    NotEnoughParameters {
        number: Option<u32>,
        parameters: Vec<String>,
    },

    #[error("Restricted parameter combination: {message}")]
    InvalidParameterCombination { message: String },

    #[error("Operation is deprecated: {message}")]
    DeprecatedOperation { message: String },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Item is not eligible for the cart: {message}")]
    InvalidCartItem { message: String },

    #[error("Item {item} is already in the cart")]
    ItemAlreadyInCart { item: String },

    #[error("AssociateTag, CartId and HMAC do not match")]
    CartInfoMismatch,

    #[error("Invalid CartId")]
    InvalidCartId,

    #[error("{code}: {message}")]
    Other { code: String, message: String },
}

impl ServiceError {
    /// Whether the same request may succeed later
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::TooManyRequests | ServiceError::InternalError)
    }

    /// Fill in request values the service does not repeat in its message.
    pub(crate) fn with_request_values(
        self,
        search_index: Option<&str>,
        response_group: Option<&str>,
    ) -> Self {
        match self {
            ServiceError::InvalidSearchIndex { index: None } => ServiceError::InvalidSearchIndex {
                index: search_index.map(str::to_string),
            },
            ServiceError::InvalidResponseGroup { group: None } => {
                ServiceError::InvalidResponseGroup {
                    group: response_group.map(str::to_string),
                }
            }
            other => other,
        }
    }
}

/// Extraction patterns for English error prose, keyed by wire code
const ENGLISH: &[(&str, &str)] = &[
    (
        "AWS.InvalidEnumeratedParameter",
        r"The value you specified for (?P<parameter>\w+) is invalid\.",
    ),
    (
        "AWS.InvalidParameterValue",
        r"(?P<value>.+?) is not a valid value for (?P<parameter>\w+)\. Please change this value and retry your request\.",
    ),
    (
        "AWS.ECommerceService.NoSimilarities",
        r"There are no similar items for this ASIN: (?P<asin>\w+)\.",
    ),
    (
        "AWS.MinimumParameterRequirement",
        r"Your request should have atleast (?P<number>\d+) of the following parameters: (?P<parameters>[\w ,]+)\.",
    ),
    (
        "AWS.RestrictedParameterValueCombination",
        r"Your request contained a restricted parameter combination\.\s*(?P<message>\w.*)$",
    ),
    (
        "AWS.ECommerceService.ItemAlreadyInCart",
        r"The item you specified, (?P<item>.*?), is already in your cart\.",
    ),
];

/// Extraction patterns for the Japanese marketplace
const JAPANESE: &[(&str, &str)] = &[
    (
        "AWS.InvalidEnumeratedParameter",
        r"(?P<parameter>\w+)に指定した値は無効です。",
    ),
    (
        "AWS.InvalidParameterValue",
        r"(?P<value>.+?)は、(?P<parameter>\w+)の値として無効です。値を変更してから、再度リクエストを実行してください。",
    ),
    (
        "AWS.ECommerceService.NoSimilarities",
        r"There are no similar items for this ASIN: (?P<asin>\w+)\.",
    ),
    (
        "AWS.MinimumParameterRequirement",
        r"次のパラメータのうち、最低1個がリクエストに含まれている必要があります：(?P<parameters>.+)$",
    ),
    ("AWS.RestrictedParameterValueCombination", r"^(?P<message>.*)$"),
    (
        "AWS.ECommerceService.ItemAlreadyInCart",
        r"リクエストで商品として指定された(?P<item>.*?)は、すでにショッピングカートの中に入っています。",
    ),
];

/// Pattern table per supported locale
const LOCALE_PATTERNS: &[(&str, &[(&str, &str)])] = &[
    ("au", ENGLISH),
    ("br", ENGLISH),
    ("ca", ENGLISH),
    ("cn", ENGLISH),
    ("de", ENGLISH),
    ("es", ENGLISH),
    ("fr", ENGLISH),
    ("in", ENGLISH),
    ("it", ENGLISH),
    ("jp", JAPANESE),
    ("mx", ENGLISH),
    ("uk", ENGLISH),
    ("us", ENGLISH),
];

const FALLBACK_LOCALE: &str = "us";

type PatternTable = HashMap<&'static str, Regex>;

static COMPILED: LazyLock<HashMap<&'static str, PatternTable>> = LazyLock::new(|| {
    LOCALE_PATTERNS
        .iter()
        .map(|(locale, table)| {
            let compiled = table
                .iter()
                .map(|(code, pattern)| {
                    (*code, Regex::new(pattern).expect("static error pattern is valid"))
                })
                .collect();
            (*locale, compiled)
        })
        .collect()
});

fn patterns_for(locale: &str) -> &'static PatternTable {
    COMPILED
        .get(locale)
        .or_else(|| COMPILED.get(FALLBACK_LOCALE))
        .expect("fallback locale has a pattern table")
}

/// Map a wire error onto a [`ServiceError`].
///
/// Codes without a mapping, and codes whose message does not match the
/// locale's pattern, become [`ServiceError::Other`] carrying the raw code and
/// message.
pub fn classify(code: &str, message: &str, locale: &str) -> ServiceError {
    let captures = patterns_for(locale)
        .get(code)
        .and_then(|pattern| pattern.captures(message));
    let field = |name: &str| {
        captures
            .as_ref()
            .and_then(|c| c.name(name))
            .map(|m| m.as_str().trim().to_string())
    };
    let other = || {
        tracing::debug!(code = %code, locale = %locale, "unclassified service error");
        ServiceError::Other {
            code: code.to_string(),
            message: message.to_string(),
        }
    };

    match code {
        "InternalError" => ServiceError::InternalError,
        "InvalidClientTokenId" => ServiceError::InvalidClientTokenId,
        "MissingClientTokenId" => ServiceError::MissingClientTokenId,
        "SignatureDoesNotMatch" => ServiceError::InvalidSignature,
        "AWS.InvalidAccount" => ServiceError::InvalidAccount,
        "AccountLimitExceeded" => ServiceError::AccountLimitExceeded,
        "RequestThrottled" => ServiceError::TooManyRequests,
        "Deprecated" => ServiceError::DeprecatedOperation {
            message: message.to_string(),
        },
        "AWS.InvalidOperation" | "AWS.InvalidOperationParameter" => {
            ServiceError::InvalidOperation {
                message: message.to_string(),
            }
        }
        "AWS.MissingParameters" => ServiceError::MissingParameters {
            message: message.to_string(),
        },
        "AWS.ParameterOutOfRange" => ServiceError::ParameterOutOfRange {
            message: message.to_string(),
        },
        "AWS.InvalidResponseGroup" => ServiceError::InvalidResponseGroup { group: None },
        "AWS.InvalidListType" => ServiceError::InvalidListType,
        "AWS.ECommerceService.NoExactMatches" => ServiceError::NoExactMatchesFound,
        "AWS.ECommerceService.CartInfoMismatch" => ServiceError::CartInfoMismatch,
        "AWS.ECommerceService.InvalidCartId" => ServiceError::InvalidCartId,
        "AWS.ECommerceService.ItemNotEligibleForCart" => ServiceError::InvalidCartItem {
            message: message.to_string(),
        },
        "AWS.ECommerceService.ItemAlreadyInCart" => match field("item") {
            Some(item) => ServiceError::ItemAlreadyInCart { item },
            None => other(),
        },
        "AWS.ECommerceService.NoSimilarities" => match field("asin") {
            Some(asin) => ServiceError::NoSimilarityForAsin { asin },
            None => other(),
        },
        "AWS.InvalidEnumeratedParameter" => match field("parameter") {
            Some(parameter) if parameter == "SearchIndex" => {
                ServiceError::InvalidSearchIndex { index: None }
            }
            Some(parameter) => ServiceError::InvalidEnumeratedParameter { parameter },
            None => other(),
        },
        "AWS.InvalidParameterValue" => match (field("parameter"), field("value")) {
            (Some(parameter), Some(value)) => {
                ServiceError::InvalidParameterValue { parameter, value }
            }
            _ => other(),
        },
        "AWS.MinimumParameterRequirement" => match field("parameters") {
            Some(list) => ServiceError::NotEnoughParameters {
                number: field("number").and_then(|n| n.parse().ok()),
                parameters: list
                    .split([',', '、'])
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect(),
            },
            None => other(),
        },
        "AWS.RestrictedParameterValueCombination" => match field("message") {
            Some(message) => ServiceError::InvalidParameterCombination { message },
            None => other(),
        },
        _ => other(),
    }
}
