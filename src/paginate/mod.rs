//! Paginated result iteration
//!
//! A [`Paginator`] re-issues one parameter set with an incrementing counter
//! until the server reports no further pages or the caller's limit is reached.
//! The first page is fetched during construction so `pages()` and `results()`
//! are known before iteration starts.

use crate::api::params::RequestParameters;
use crate::api::retry::Dispatch;
use crate::errors::Result;
use crate::xml::{Document, Element};

/// Search scope the service caps at five retrievable pages
const ALL_SEARCH_INDEX: &str = "All";
const ALL_SEARCH_INDEX_MAX_PAGES: u32 = 5;
/// Page cap applied when the caller sets no limit
pub const DEFAULT_PAGE_LIMIT: u32 = 400;
const ITEM_PAGE: &str = "ItemPage";

/// Where pagination data lives in a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginatorSpec {
    /// Query parameter carrying the page number
    pub counter: String,
    pub current_page: String,
    pub total_pages: String,
    pub total_results: String,
    /// Item nodes on each page
    pub items: Option<String>,
}

impl PaginatorSpec {
    pub fn new(
        counter: impl Into<String>,
        current_page: impl Into<String>,
        total_pages: impl Into<String>,
        total_results: impl Into<String>,
    ) -> Self {
        Self {
            counter: counter.into(),
            current_page: current_page.into(),
            total_pages: total_pages.into(),
            total_results: total_results.into(),
            items: None,
        }
    }

    pub fn with_items(mut self, items: impl Into<String>) -> Self {
        self.items = Some(items.into());
        self
    }

    /// ItemSearch result pages
    pub fn item_search() -> Self {
        Self::new(
            ITEM_PAGE,
            "//Items/Request/ItemSearchRequest/ItemPage",
            "//Items/TotalPages",
            "//Items/TotalResults",
        )
        .with_items("//Items/Item")
    }

    /// Related items of an ItemLookup with the RelatedItems response group
    pub fn related_items() -> Self {
        Self::new(
            "RelatedItemPage",
            "//RelatedItemPage",
            "//RelatedItems/RelatedItemPageCount",
            "//RelatedItems/RelatedItemCount",
        )
        .with_items("//RelatedItems/RelatedItem/Item")
    }

    /// Customer reviews of an ItemLookup
    pub fn reviews() -> Self {
        Self::new(
            "ReviewPage",
            "//Items/Request/ItemLookupRequest/ReviewPage",
            "//Items/Item/CustomerReviews/TotalReviewPages",
            "//Items/Item/CustomerReviews/TotalReviews",
        )
        .with_items("//Items/Item/CustomerReviews/Review")
    }

    /// ListSearch result pages
    pub fn list_search() -> Self {
        Self::new(
            "ListPage",
            "//Lists/Request/ListSearchRequest/ListPage",
            "//Lists/TotalPages",
            "//Lists/TotalResults",
        )
        .with_items("//Lists/List")
    }
}

/// Paginator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Start,
    Fetching,
    HasMore,
    Exhausted,
    Error,
}

impl PageState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PageState::Exhausted | PageState::Error)
    }
}

/// Iterator-like driver over result pages
#[derive(Debug)]
pub struct Paginator<D> {
    dispatcher: D,
    spec: PaginatorSpec,
    params: RequestParameters,
    limit: Option<u32>,
    state: PageState,
    /// Page number sent with the next request
    counter: u32,
    current: u32,
    total_pages: u32,
    total_results: u64,
    first_page: Option<Document>,
}

impl<D: Dispatch> Paginator<D> {
    /// Fetch the first page and position the paginator on it.
    ///
    /// The counter starts at the value already in `params`, or 1. Without a
    /// `limit` iteration stops after [`DEFAULT_PAGE_LIMIT`] pages.
    pub async fn new(
        dispatcher: D,
        spec: PaginatorSpec,
        params: RequestParameters,
        limit: Option<u32>,
    ) -> Result<Self> {
        let limit = Self::effective_limit(&spec, &params, limit);
        let start = params
            .text(&spec.counter)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(1);

        let mut paginator = Self {
            dispatcher,
            spec,
            params,
            limit,
            state: PageState::Start,
            counter: start,
            current: start,
            total_pages: 0,
            total_results: 0,
            first_page: None,
        };

        let document = paginator.fetch().await?;
        tracing::info!(
            counter = %paginator.spec.counter,
            pages = paginator.total_pages,
            results = paginator.total_results,
            limit = ?paginator.limit,
            "pagination_started"
        );
        paginator.first_page = Some(document);
        Ok(paginator)
    }

    fn effective_limit(
        spec: &PaginatorSpec,
        params: &RequestParameters,
        limit: Option<u32>,
    ) -> Option<u32> {
        if spec.counter == ITEM_PAGE && params.text("SearchIndex") == Some(ALL_SEARCH_INDEX) {
            let clamped = limit
                .unwrap_or(ALL_SEARCH_INDEX_MAX_PAGES)
                .min(ALL_SEARCH_INDEX_MAX_PAGES);
            if limit != Some(clamped) {
                tracing::debug!(requested = ?limit, clamped, "search_index_all_limit");
            }
            return Some(clamped);
        }
        Some(limit.unwrap_or(DEFAULT_PAGE_LIMIT))
    }

    async fn fetch(&mut self) -> Result<Document> {
        self.state = PageState::Fetching;
        self.params.insert(self.spec.counter.clone(), self.counter);

        match self.dispatcher.dispatch(&self.params).await {
            Ok(document) => {
                self.update(&document);
                Ok(document)
            }
            Err(err) => {
                self.state = PageState::Error;
                Err(err)
            }
        }
    }

    fn update(&mut self, document: &Document) {
        let read = |path: &str| {
            document
                .int(path)
                .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
        };

        // Without an echoed page number the requested one is current
        self.current = read(&self.spec.current_page).unwrap_or(self.counter);
        self.total_pages = read(&self.spec.total_pages).unwrap_or(0);
        self.total_results = document.int(&self.spec.total_results).unwrap_or(0);
        if self.total_pages > 0 && self.current > self.total_pages {
            self.current = self.total_pages;
        }

        self.state = if self.has_more() {
            PageState::HasMore
        } else {
            PageState::Exhausted
        };
    }

    fn has_more(&self) -> bool {
        self.current < self.total_pages && self.limit.map_or(true, |limit| self.current < limit)
    }

    /// Next page: the prefetched first page, then one request per call.
    ///
    /// Returns `None` once exhausted or after an error has been returned.
    pub async fn next(&mut self) -> Option<Result<Document>> {
        if let Some(document) = self.first_page.take() {
            return Some(Ok(document));
        }
        match self.state {
            PageState::HasMore => {
                self.counter = self.counter.saturating_add(1);
                Some(self.fetch().await)
            }
            _ => None,
        }
    }

    /// Collect all remaining pages, stopping at the first error
    pub async fn collect(mut self) -> Result<Vec<Document>> {
        let mut pages = Vec::new();
        while let Some(page) = self.next().await {
            pages.push(page?);
        }
        Ok(pages)
    }

    /// Page number of the page fetched last
    pub fn current(&self) -> u32 {
        self.current
    }

    /// Total pages reported by the server
    pub fn pages(&self) -> u32 {
        self.total_pages
    }

    /// Total results reported by the server
    pub fn results(&self) -> u64 {
        self.total_results
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    /// Pages that can actually be iterated
    pub fn len(&self) -> u32 {
        match self.limit {
            Some(limit) => self.total_pages.min(limit),
            None => self.total_pages,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Item nodes of `document` at the configured item path
    pub fn items<'a>(&self, document: &'a Document) -> Vec<&'a Element> {
        match &self.spec.items {
            Some(path) => document.select(path),
            None => Vec::new(),
        }
    }

    pub fn spec(&self) -> &PaginatorSpec {
        &self.spec
    }

    pub fn into_inner(self) -> D {
        self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ApiError, ServiceError};

    const NS: &str = "http://webservices.amazon.com/AWSECommerceService/2011-08-01";

    /// Serves ItemSearch pages and records requested page numbers
    struct SearchPages {
        total_pages: u32,
        fail_on: Option<u32>,
        requested: Vec<u32>,
    }

    impl SearchPages {
        fn new(total_pages: u32) -> Self {
            Self {
                total_pages,
                fail_on: None,
                requested: Vec::new(),
            }
        }
    }

    impl Dispatch for SearchPages {
        async fn dispatch(&mut self, params: &RequestParameters) -> Result<Document> {
            let page: u32 = params.text("ItemPage").unwrap().parse().unwrap();
            self.requested.push(page);
            if self.fail_on == Some(page) {
                return Err(ApiError::Service(ServiceError::InternalError));
            }
            let xml = format!(
                r#"<ItemSearchResponse xmlns="{NS}"><Items>
                   <Request><ItemSearchRequest><ItemPage>{page}</ItemPage></ItemSearchRequest></Request>
                   <TotalResults>{}</TotalResults><TotalPages>{}</TotalPages>
                   <Item><ASIN>000000000{page}</ASIN></Item><Item><ASIN>B00{page}</ASIN></Item>
                   </Items></ItemSearchResponse>"#,
                self.total_pages * 10,
                self.total_pages
            );
            Document::parse(xml.as_bytes())
        }
    }

    /// Always answers with the same body
    struct Fixed(&'static str);

    impl Dispatch for Fixed {
        async fn dispatch(&mut self, _params: &RequestParameters) -> Result<Document> {
            Document::parse(self.0.as_bytes())
        }
    }

    /// Reports a page total but never echoes the page number
    struct Unechoed {
        requested: Vec<u32>,
    }

    impl Dispatch for Unechoed {
        async fn dispatch(&mut self, params: &RequestParameters) -> Result<Document> {
            let page: u32 = params.text("ItemPage").unwrap().parse().unwrap();
            self.requested.push(page);
            if self.requested.len() > 6 {
                return Err(ApiError::Transport("too many requests".to_string()));
            }
            let xml = format!(
                r#"<ItemSearchResponse xmlns="{NS}"><Items>
                   <TotalResults>30</TotalResults><TotalPages>3</TotalPages>
                   <Item><ASIN>B00{page}</ASIN></Item>
                   </Items></ItemSearchResponse>"#
            );
            Document::parse(xml.as_bytes())
        }
    }

    fn search(index: &str) -> RequestParameters {
        RequestParameters::new()
            .with("Operation", "ItemSearch")
            .with("SearchIndex", index)
    }

    #[tokio::test]
    async fn test_iterates_all_pages() {
        let mut pages = Paginator::new(
            SearchPages::new(3),
            PaginatorSpec::item_search(),
            search("Books"),
            None,
        )
        .await
        .unwrap();

        assert_eq!(pages.pages(), 3);
        assert_eq!(pages.results(), 30);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages.state(), PageState::HasMore);

        let mut seen = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.unwrap();
            seen.push(pages.items(&page).len());
        }
        assert_eq!(seen, vec![2, 2, 2]);
        assert_eq!(pages.state(), PageState::Exhausted);
        assert_eq!(pages.current(), 3);
        assert_eq!(pages.into_inner().requested, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_limit_stops_early() {
        let pages = Paginator::new(
            SearchPages::new(10),
            PaginatorSpec::item_search(),
            search("Books"),
            Some(2),
        )
        .await
        .unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages.collect().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_search_index_all_capped_at_five() {
        let mut source = SearchPages::new(40);
        let pages = Paginator::new(
            &mut source,
            PaginatorSpec::item_search(),
            search("All"),
            Some(20),
        )
        .await
        .unwrap();
        assert_eq!(pages.limit(), Some(5));

        let docs = pages.collect().await.unwrap();
        assert_eq!(docs.len(), 5);
        assert_eq!(source.requested, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_search_index_all_without_limit() {
        let pages = Paginator::new(
            SearchPages::new(40),
            PaginatorSpec::item_search(),
            search("All"),
            None,
        )
        .await
        .unwrap();
        assert_eq!(pages.limit(), Some(5));
        assert_eq!(pages.len(), 5);
    }

    #[tokio::test]
    async fn test_counter_starts_at_given_page() {
        let params = search("Books").with("ItemPage", 3u32);
        let pages = Paginator::new(SearchPages::new(4), PaginatorSpec::item_search(), params, None)
            .await
            .unwrap();
        assert_eq!(pages.current(), 3);
        let docs = pages.collect().await.unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_nodes_default() {
        let body = "<ItemLookupResponse><Items><Item><ASIN>0000000000</ASIN></Item></Items></ItemLookupResponse>";
        let mut pages = Paginator::new(
            Fixed(body),
            PaginatorSpec::reviews(),
            RequestParameters::new().with("Operation", "ItemLookup"),
            None,
        )
        .await
        .unwrap();

        assert_eq!(pages.current(), 1);
        assert_eq!(pages.pages(), 0);
        assert_eq!(pages.results(), 0);
        assert_eq!(pages.state(), PageState::Exhausted);
        assert!(pages.is_empty());

        assert!(pages.next().await.unwrap().is_ok());
        assert!(pages.next().await.is_none());
    }

    #[tokio::test]
    async fn test_attribute_accessor() {
        let body = r#"<SellerListingSearchResponse>
            <OperationRequest><Arguments>
              <Argument Name="ListingPage" Value="2"/>
            </Arguments></OperationRequest>
            <SellerListings><TotalResults>30</TotalResults><TotalPages>3</TotalPages></SellerListings>
          </SellerListingSearchResponse>"#;
        let spec = PaginatorSpec::new(
            "ListingPage",
            r#"//OperationRequest/Arguments/Argument[@Name="ListingPage"]/@Value"#,
            "//SellerListings/TotalPages",
            "//SellerListings/TotalResults",
        );
        let pages = Paginator::new(Fixed(body), spec, RequestParameters::new(), None)
            .await
            .unwrap();
        assert_eq!(pages.current(), 2);
        assert_eq!(pages.pages(), 3);
        assert_eq!(pages.results(), 30);
        assert_eq!(pages.state(), PageState::HasMore);
    }

    #[tokio::test]
    async fn test_counter_advances_without_echoed_page() {
        let mut source = Unechoed {
            requested: Vec::new(),
        };
        let pages = Paginator::new(
            &mut source,
            PaginatorSpec::item_search(),
            search("Books"),
            None,
        )
        .await
        .unwrap();

        let docs = pages.collect().await.unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(source.requested, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_default_page_limit() {
        let pages = Paginator::new(
            SearchPages::new(1000),
            PaginatorSpec::item_search(),
            search("Books"),
            None,
        )
        .await
        .unwrap();
        assert_eq!(pages.limit(), Some(DEFAULT_PAGE_LIMIT));
        assert_eq!(pages.pages(), 1000);
        assert_eq!(pages.len(), 400);
    }

    #[tokio::test]
    async fn test_oversized_counts_saturate() {
        let body = "<ItemSearchResponse><Items><TotalResults>99999999999</TotalResults>\
                    <TotalPages>99999999999</TotalPages></Items></ItemSearchResponse>";
        let pages = Paginator::new(
            Fixed(body),
            PaginatorSpec::item_search(),
            search("Books"),
            Some(2),
        )
        .await
        .unwrap();
        assert_eq!(pages.pages(), u32::MAX);
        assert_eq!(pages.results(), 99_999_999_999);
        assert_eq!(pages.current(), 1);
        assert_eq!(pages.state(), PageState::HasMore);
    }

    #[tokio::test]
    async fn test_error_is_terminal() {
        let mut source = SearchPages::new(5);
        source.fail_on = Some(2);
        let mut pages = Paginator::new(source, PaginatorSpec::item_search(), search("Books"), None)
            .await
            .unwrap();

        assert!(pages.next().await.unwrap().is_ok());
        let err = pages.next().await.unwrap().unwrap_err();
        assert_eq!(err.service(), Some(&ServiceError::InternalError));
        assert_eq!(pages.state(), PageState::Error);
        assert!(pages.state().is_terminal());
        assert!(pages.next().await.is_none());
    }

    #[tokio::test]
    async fn test_first_page_failure_fails_construction() {
        let mut source = SearchPages::new(5);
        source.fail_on = Some(1);
        let result =
            Paginator::new(source, PaginatorSpec::item_search(), search("Books"), None).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_all_clamp_only_for_item_page() {
        let params = search("All");
        assert_eq!(
            Paginator::<SearchPages>::effective_limit(&PaginatorSpec::reviews(), &params, Some(20)),
            Some(20)
        );
        assert_eq!(
            Paginator::<SearchPages>::effective_limit(&PaginatorSpec::reviews(), &params, None),
            Some(DEFAULT_PAGE_LIMIT)
        );
        assert_eq!(
            Paginator::<SearchPages>::effective_limit(&PaginatorSpec::item_search(), &params, Some(3)),
            Some(3)
        );
    }
}
