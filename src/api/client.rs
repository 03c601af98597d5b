//! Dispatcher for the Product Advertising API
//!
//! Signs each parameter set, waits on the per-client throttle, issues the
//! GET and hands the (gunzipped) body to the response processor:
//! - 503 becomes `TooManyRequests` without looking at the body
//! - 2xx, 400 and 410 bodies go to the processor (400/410 carry wire errors)
//! - any other status is a transport-level `Http` error

use crate::api::locale::{self, SERVICE_PATH};
use crate::api::operation::{Operation, ITEM_LOOKUP};
use crate::api::params::RequestParameters;
use crate::api::retry::Dispatch;
use crate::api::signer::{RequestSigner, SignedUrl};
use crate::api::throttle::Throttle;
use crate::api::types::{Cart, CartEntry};
use crate::config::{ClientConfig, Credentials};
use crate::errors::{ApiError, Result, ServiceError};
use crate::paginate::{Paginator, PaginatorSpec};
use crate::xml::{Document, ResponseProcessor, XmlProcessor};
use bytes::Bytes;
use flate2::read::GzDecoder;
use http_body_util::{BodyExt, Full};
use hyper::header::{ACCEPT_ENCODING, CONTENT_ENCODING, USER_AGENT};
use hyper::{Method, Request, StatusCode};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use native_tls::TlsConnector;
use std::io::Read;
use std::time::Duration;

/// Body and metadata of one HTTP response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub content_encoding: Option<String>,
    pub body: Bytes,
}

impl RawResponse {
    pub fn is_gzip(&self) -> bool {
        self.content_encoding
            .as_deref()
            .is_some_and(|enc| enc.trim().eq_ignore_ascii_case("gzip"))
    }

    /// Body with any gzip content encoding removed
    pub fn decode(&self) -> Result<Bytes> {
        if !self.is_gzip() {
            return Ok(self.body.clone());
        }
        let mut decoder = GzDecoder::new(&self.body[..]);
        let mut decoded = Vec::with_capacity(self.body.len() * 4);
        decoder.read_to_end(&mut decoded)?;
        Ok(Bytes::from(decoded))
    }
}

/// Scheme and authority used instead of the locale host
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    scheme: String,
    authority: String,
}

impl Endpoint {
    fn parse(endpoint: &str) -> Result<Self> {
        let (scheme, rest) = endpoint
            .split_once("://")
            .unwrap_or(("https", endpoint));
        let authority = rest.trim_end_matches('/');
        if authority.is_empty() || authority.contains('/') || !matches!(scheme, "http" | "https") {
            return Err(ApiError::InvalidResponse(format!(
                "Invalid endpoint: {}",
                endpoint
            )));
        }
        Ok(Self {
            scheme: scheme.to_string(),
            authority: authority.to_string(),
        })
    }
}

/// Signed, throttled client for one set of credentials
///
/// Every request method takes `&mut self`: one client issues one request at a
/// time. Use separate clients for concurrent work.
pub struct ApiClient {
    http: HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>,
    signer: RequestSigner,
    locale: String,
    endpoint: Endpoint,
    throttle: Throttle,
    min_interval: Duration,
    timeout: Duration,
    user_agent: String,
    processor: Box<dyn ResponseProcessor>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("locale", &self.locale)
            .field("endpoint", &self.endpoint)
            .field("min_interval", &self.min_interval)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client; fails for an unknown locale before any request is made
    pub fn new(credentials: Credentials, config: ClientConfig) -> Result<Self> {
        let endpoint = match &config.endpoint {
            Some(endpoint) => Endpoint::parse(endpoint)?,
            None => Endpoint {
                scheme: "https".to_string(),
                authority: locale::host(&credentials.locale)?.to_string(),
            },
        };
        // Locale still selects the error message tables
        locale::host(&credentials.locale)?;

        let mut http = HttpConnector::new();
        http.set_nodelay(true);
        http.enforce_http(false);
        http.set_connect_timeout(Some(config.connect_timeout()));

        let tls = TlsConnector::new()
            .map_err(|e| ApiError::Transport(format!("Failed to build TLS connector: {}", e)))?;
        let https = HttpsConnector::from((http, tls.into()));

        let client = HyperClient::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .set_host(true)
            .build(https);

        let signer = RequestSigner::new(credentials.access_key, credentials.secret_key)
            .with_associate_tag(credentials.associate_tag)
            .with_version(config.version.clone());

        Ok(Self {
            http: client,
            signer,
            locale: credentials.locale,
            endpoint,
            throttle: Throttle::new(),
            min_interval: Throttle::interval_for_rate(config.requests_per_second),
            timeout: config.timeout(),
            user_agent: config.user_agent,
            processor: Box::new(XmlProcessor::new()),
        })
    }

    /// Replace the response processor
    pub fn with_processor(mut self, processor: Box<dyn ResponseProcessor>) -> Self {
        self.processor = processor;
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the minimum interval between two requests
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn processor(&self) -> &dyn ResponseProcessor {
        self.processor.as_ref()
    }

    /// Signed URL for `params` as it would be sent now
    pub fn signed_url(&self, params: &RequestParameters) -> SignedUrl {
        self.signer
            .sign(&self.endpoint.authority, SERVICE_PATH, params)
            .with_scheme(self.endpoint.scheme.as_str())
    }

    /// Sign, throttle and send one request; returns the raw response
    pub async fn fetch(&mut self, params: &RequestParameters) -> Result<RawResponse> {
        let url = self.signed_url(params);
        self.throttle.wait(self.min_interval).await;

        let request = Request::builder()
            .method(Method::GET)
            .uri(url.to_string())
            .header(USER_AGENT, self.user_agent.as_str())
            .header(ACCEPT_ENCODING, "gzip")
            .body(Full::new(Bytes::new()))?;

        let timeout = self.timeout;
        let send = async {
            let response = self.http.request(request).await?;
            let status = response.status();
            let content_encoding = response
                .headers()
                .get(CONTENT_ENCODING)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response
                .collect()
                .await
                .map_err(|e| ApiError::Transport(format!("Body error: {}", e)))?
                .to_bytes();
            Ok::<_, ApiError>(RawResponse {
                status,
                content_encoding,
                body,
            })
        };

        tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| ApiError::Timeout(timeout))?
    }

    /// Send one parameter set and return the parsed document
    pub async fn call(&mut self, params: &RequestParameters) -> Result<Document> {
        let operation = params.text("Operation").unwrap_or("?").to_string();
        let raw = self.fetch(params).await?;
        tracing::debug!(
            operation = %operation,
            status = %raw.status,
            bytes = raw.body.len(),
            gzip = raw.is_gzip(),
            "dispatch"
        );

        match raw.status {
            StatusCode::SERVICE_UNAVAILABLE => {
                tracing::warn!(operation = %operation, "request_throttled");
                Err(ApiError::Service(ServiceError::TooManyRequests))
            }
            status
                if status.is_success()
                    || status == StatusCode::BAD_REQUEST
                    || status == StatusCode::GONE =>
            {
                let body = raw.decode()?;
                self.processor
                    .parse(&body)
                    .map_err(|e| self.classified(e.into_api_error(&self.locale), params))
            }
            status => {
                let body = raw.decode().unwrap_or_else(|_| raw.body.clone());
                Err(ApiError::Http {
                    status,
                    message: String::from_utf8_lossy(&body).into_owned(),
                })
            }
        }
    }

    fn classified(&self, err: ApiError, params: &RequestParameters) -> ApiError {
        match err {
            ApiError::Service(service) => {
                let response_group = params.get("ResponseGroup").and_then(|v| v.to_wire());
                let service = service
                    .with_request_values(params.text("SearchIndex"), response_group.as_deref());
                tracing::debug!(error = %service, "service_error");
                ApiError::Service(service)
            }
            other => other,
        }
    }

    /// Send an operation (single or batched)
    pub async fn execute(&mut self, operation: &Operation) -> Result<Document> {
        let mut params = operation.parameters().into_owned();
        params.insert("Operation", operation.name());
        self.call(&params).await
    }

    /// Look up items by identifier
    pub async fn item_lookup(&mut self, ids: &[&str], params: RequestParameters) -> Result<Document> {
        let params = params.with("ItemId", ids.join(","));
        self.execute(&Operation::new(ITEM_LOOKUP, params)).await
    }

    /// Search items; returns a paginator positioned on the first page
    pub async fn item_search(
        &mut self,
        search_index: &str,
        params: RequestParameters,
        limit: Option<u32>,
    ) -> Result<Paginator<&mut Self>> {
        let params = params
            .with("Operation", "ItemSearch")
            .with("SearchIndex", search_index);
        Paginator::new(self, PaginatorSpec::item_search(), params, limit).await
    }

    /// Items similar to all of `ids`
    pub async fn similarity_lookup(
        &mut self,
        ids: &[&str],
        params: RequestParameters,
    ) -> Result<Document> {
        let params = params.with("ItemId", ids.join(","));
        self.execute(&Operation::new("SimilarityLookup", params)).await
    }

    /// Browse node ancestry and children
    pub async fn browse_node_lookup(
        &mut self,
        node_id: u64,
        params: RequestParameters,
    ) -> Result<Document> {
        let params = params.with("BrowseNodeId", node_id.to_string());
        self.execute(&Operation::new("BrowseNodeLookup", params)).await
    }

    /// Create a remote cart holding `items` (entry, quantity)
    pub async fn cart_create(&mut self, items: &[(CartEntry, u32)]) -> Result<Cart> {
        let params = Self::cart_items(RequestParameters::new(), items);
        self.cart_operation("CartCreate", params).await
    }

    /// Add items to an existing cart
    pub async fn cart_add(
        &mut self,
        cart_id: &str,
        hmac: &str,
        items: &[(CartEntry, u32)],
    ) -> Result<Cart> {
        let params = Self::cart_items(Self::cart_ref(cart_id, hmac), items);
        self.cart_operation("CartAdd", params).await
    }

    /// Change quantities of cart lines (quantity 0 removes a line)
    pub async fn cart_modify(
        &mut self,
        cart_id: &str,
        hmac: &str,
        items: &[(CartEntry, u32)],
    ) -> Result<Cart> {
        let params = Self::cart_items(Self::cart_ref(cart_id, hmac), items);
        self.cart_operation("CartModify", params).await
    }

    pub async fn cart_get(&mut self, cart_id: &str, hmac: &str) -> Result<Cart> {
        self.cart_operation("CartGet", Self::cart_ref(cart_id, hmac))
            .await
    }

    /// Remove all items from a cart
    pub async fn cart_clear(&mut self, cart_id: &str, hmac: &str) -> Result<Cart> {
        self.cart_operation("CartClear", Self::cart_ref(cart_id, hmac))
            .await
    }

    async fn cart_operation(&mut self, name: &str, params: RequestParameters) -> Result<Cart> {
        let document = self.execute(&Operation::new(name, params)).await?;
        self.processor
            .parse_cart(&document)
            .map_err(|e| e.into_api_error(&self.locale))
    }

    fn cart_ref(cart_id: &str, hmac: &str) -> RequestParameters {
        RequestParameters::new()
            .with("CartId", cart_id)
            .with("HMAC", hmac)
    }

    fn cart_items(mut params: RequestParameters, items: &[(CartEntry, u32)]) -> RequestParameters {
        for (n, (entry, quantity)) in items.iter().enumerate() {
            let n = n + 1;
            params.insert(format!("Item.{}.{}", n, entry.key()), entry.id());
            params.insert(format!("Item.{}.Quantity", n), *quantity);
        }
        params
    }
}

impl Dispatch for ApiClient {
    fn dispatch(
        &mut self,
        params: &RequestParameters,
    ) -> impl std::future::Future<Output = Result<Document>> + Send {
        self.call(params)
    }
}
