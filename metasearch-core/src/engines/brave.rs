//! Brave Search backend: independent index, good quality results.
//!
//! Scrapes the HTML result pages at `https://search.brave.com/`. One
//! instance serves one Brave vertical (web, news, images, videos or
//! goggles), chosen by the `category` entry of its configured parameters,
//! so the same scraper can be registered several times under different
//! names and categories.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Map, Value};
use url::Url;

use crate::backend::Backend;
use crate::error::{BackendError, RegistryError};
use crate::http;
use crate::registry::BackendParams;
use crate::types::{BackendResponse, ResultItem, SafeSearch, SearchParameters, TimeRange};

/// Default Brave Search endpoint.
pub const BRAVE_BASE_URL: &str = "https://search.brave.com/";

/// Which Brave vertical to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BraveCategory {
    /// Regular web results.
    Search,
    /// News articles.
    News,
    /// Image results.
    Images,
    /// Video results.
    Videos,
    /// Web results re-ranked by a goggle.
    Goggles,
}

impl BraveCategory {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "search" | "general" | "web" => Some(Self::Search),
            "news" => Some(Self::News),
            "images" => Some(Self::Images),
            "videos" => Some(Self::Videos),
            "goggles" => Some(Self::Goggles),
            _ => None,
        }
    }

    /// URL path segment for this vertical.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::News => "news",
            Self::Images => "images",
            Self::Videos => "videos",
            Self::Goggles => "goggles",
        }
    }

    /// Only the web verticals paginate and filter by time.
    fn supports_paging(&self) -> bool {
        matches!(self, Self::Search | Self::Goggles)
    }
}

/// Brave Search HTML scraper.
#[derive(Debug, Clone)]
pub struct BraveBackend {
    base_url: Url,
    category: BraveCategory,
    user_agent: Option<String>,
}

impl BraveBackend {
    /// Build from configured parameters.
    ///
    /// Recognised keys: `category` (search, news, images, videos, goggles;
    /// default search), `base_url` and `user_agent`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Init`] for an unknown category, a
    /// non-string value, or an unparsable `base_url`.
    pub fn from_params(params: &BackendParams) -> Result<Self, RegistryError> {
        let category = match string_param(params, "category")? {
            Some(value) => BraveCategory::parse(value).ok_or_else(|| {
                RegistryError::Init(format!("unsupported Brave category '{value}'"))
            })?,
            None => BraveCategory::Search,
        };

        let base = string_param(params, "base_url")?.unwrap_or(BRAVE_BASE_URL);
        let base_url = Url::parse(base)
            .map_err(|e| RegistryError::Init(format!("invalid base_url '{base}': {e}")))?;

        Ok(Self {
            base_url,
            category,
            user_agent: string_param(params, "user_agent")?.map(str::to_owned),
        })
    }

    /// Catalog constructor.
    ///
    /// # Errors
    ///
    /// Same as [`BraveBackend::from_params`].
    pub fn constructor(params: &BackendParams) -> Result<Arc<dyn Backend>, RegistryError> {
        Ok(Arc::new(Self::from_params(params)?))
    }

    /// The vertical this instance queries.
    pub fn category(&self) -> BraveCategory {
        self.category
    }

    /// Build the request URL for `params`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Http`] if the path cannot be joined onto the
    /// base URL.
    pub fn request_url(&self, params: &SearchParameters) -> Result<Url, BackendError> {
        let mut url = self
            .base_url
            .join(self.category.path())
            .map_err(|e| BackendError::Http(format!("invalid Brave URL: {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("q", &params.query)
                .append_pair("source", "web")
                .append_pair("spellcheck", "0");
            if self.category.supports_paging() {
                if params.page > 1 {
                    query.append_pair("offset", &(params.page - 1).to_string());
                }
                if let Some(range) = params.time_range {
                    query.append_pair("tf", time_range_code(range));
                }
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl Backend for BraveBackend {
    async fn search(&self, params: &SearchParameters) -> Result<BackendResponse, BackendError> {
        tracing::trace!(query = %params.query, category = self.category.path(), "Brave search");

        let client = http::build_client(params, self.user_agent.as_deref())?;
        let url = self.request_url(params)?;

        let response = client
            .get(url)
            .header("Cookie", cookie_header(params))
            .header("Accept", "text/html,application/xhtml+xml")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "same-origin")
            .header("Sec-Fetch-User", "?1")
            .send()
            .await
            .map_err(|e| http::request_error("Brave", &e))?
            .error_for_status()
            .map_err(|e| BackendError::Http(format!("Brave HTTP error: {e}")))?;

        let html = response
            .text()
            .await
            .map_err(|e| http::request_error("Brave", &e))?;

        tracing::trace!(bytes = html.len(), "Brave response received");

        let results = match self.category {
            BraveCategory::News => parse_brave_news_html(&html)?,
            _ => parse_brave_web_html(&html)?,
        };

        let mut metadata = Map::new();
        metadata.insert("page".into(), json!(params.page));
        metadata.insert("category".into(), json!(self.category.path()));
        metadata.insert("status".into(), json!("success"));

        Ok(BackendResponse { results, metadata })
    }
}

fn string_param<'a>(
    params: &'a BackendParams,
    key: &str,
) -> Result<Option<&'a str>, RegistryError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(RegistryError::Init(format!(
            "parameter '{key}' must be a string, got {other}"
        ))),
    }
}

fn time_range_code(range: TimeRange) -> &'static str {
    match range {
        TimeRange::Day => "pd",
        TimeRange::Week => "pw",
        TimeRange::Month => "pm",
        TimeRange::Year => "py",
    }
}

fn safesearch_value(level: SafeSearch) -> &'static str {
    match level {
        SafeSearch::Off => "off",
        SafeSearch::Moderate => "moderate",
        SafeSearch::Strict => "strict",
    }
}

/// Preferences Brave reads from cookies rather than query parameters.
fn cookie_header(params: &SearchParameters) -> String {
    format!(
        "safesearch={}; useLocation=0; summarizer=0; country={}; ui_lang={}",
        safesearch_value(params.safesearch),
        params.country.to_lowercase(),
        params.locale.to_lowercase(),
    )
}

fn selector(css: &str) -> Result<Selector, BackendError> {
    Selector::parse(css)
        .map_err(|e| BackendError::Parse(format!("invalid selector '{css}': {e:?}")))
}

fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a Brave web results page.
///
/// Snippets without a link are skipped.
pub(crate) fn parse_brave_web_html(html: &str) -> Result<Vec<ResultItem>, BackendError> {
    let document = Html::parse_document(html);

    let result_sel = selector("div.snippet")?;
    let link_sel = selector("a.h")?;
    let title_sel = selector(".title")?;
    let desc_sel = selector(".snippet-description")?;

    let mut results = Vec::new();

    for element in document.select(&result_sel) {
        let Some(link) = element.select(&link_sel).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };

        let title = link
            .select(&title_sel)
            .next()
            .map(text_of)
            .unwrap_or_else(|| text_of(link));

        let content = element
            .select(&desc_sel)
            .next()
            .map(text_of)
            .unwrap_or_default();

        results.push(ResultItem::new(title, href, content));
    }

    tracing::debug!(count = results.len(), "Brave web results parsed");
    Ok(results)
}

/// Parse a Brave news results page. News cards may carry a thumbnail.
pub(crate) fn parse_brave_news_html(html: &str) -> Result<Vec<ResultItem>, BackendError> {
    let document = Html::parse_document(html);

    let result_sel = selector(r#"div[data-type="news"]"#)?;
    let header_sel = selector("a.result-header")?;
    let desc_sel = selector("p.desc")?;
    let thumb_sel = selector("div.image-wrapper img")?;

    let mut results = Vec::new();

    for element in document.select(&result_sel) {
        let Some(header) = element.select(&header_sel).next() else {
            continue;
        };
        let Some(href) = header.value().attr("href") else {
            continue;
        };

        let content = element
            .select(&desc_sel)
            .next()
            .map(text_of)
            .unwrap_or_default();

        let mut item = ResultItem::new(text_of(header), href, content);
        item.thumbnail = element
            .select(&thumb_sel)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(str::to_owned);
        results.push(item);
    }

    tracing::debug!(count = results.len(), "Brave news results parsed");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOCK_WEB_HTML: &str = r#"<!DOCTYPE html>
<html>
<body>
<div id="results">
  <div class="snippet fdb" data-type="web">
    <a class="h" href="https://www.rust-lang.org/">
      <div class="title">Rust Programming Language</div>
    </a>
    <div class="snippet-description">A language empowering everyone to build
      reliable and efficient software.</div>
  </div>
  <div class="snippet fdb" data-type="web">
    <a class="h" href="https://doc.rust-lang.org/book/">
      <div class="title">The Rust Programming Language Book</div>
    </a>
    <div class="snippet-description">An introductory book about Rust.</div>
  </div>
  <div class="snippet fdb" data-type="web">
    <span>Related searches</span>
  </div>
</div>
</body>
</html>"#;

    const MOCK_NEWS_HTML: &str = r#"<!DOCTYPE html>
<html>
<body>
<div class="results">
  <div class="snippet" data-type="news">
    <a class="result-header" href="https://blog.rust-lang.org/2024/07/25/Rust-1.80.0.html">
      <span>Announcing Rust 1.80.0</span>
    </a>
    <p class="desc">The Rust team is happy to announce a new version.</p>
    <div class="image-wrapper"><img src="https://imgs.search.brave.com/thumb.jpg"></div>
  </div>
  <div class="snippet" data-type="news">
    <a class="result-header" href="https://example.com/news">Plain headline</a>
  </div>
</div>
</body>
</html>"#;

    fn params_with(entries: &[(&str, Value)]) -> BackendParams {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn default_params_query_web_vertical() {
        let backend = BraveBackend::from_params(&BackendParams::new()).expect("valid");
        assert_eq!(backend.category(), BraveCategory::Search);
    }

    #[test]
    fn news_category_selected_from_params() {
        let backend =
            BraveBackend::from_params(&params_with(&[("category", json!("news"))])).expect("valid");
        assert_eq!(backend.category(), BraveCategory::News);
    }

    #[test]
    fn unknown_category_fails_construction() {
        let err = BraveBackend::from_params(&params_with(&[("category", json!("maps"))]))
            .unwrap_err();
        assert!(err.to_string().contains("unsupported Brave category 'maps'"));
    }

    #[test]
    fn non_string_param_fails_construction() {
        let err = BraveBackend::from_params(&params_with(&[("base_url", json!(42))])).unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn request_url_includes_paging_and_time_range() {
        let backend = BraveBackend::from_params(&BackendParams::new()).expect("valid");
        let params = SearchParameters {
            page: 3,
            time_range: Some(TimeRange::Week),
            ..SearchParameters::new("rust async")
        };
        let url = backend.request_url(&params).expect("url");
        assert_eq!(url.path(), "/search");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("q".into(), "rust async".into())));
        assert!(pairs.contains(&("offset".into(), "2".into())));
        assert!(pairs.contains(&("tf".into(), "pw".into())));
        assert!(pairs.contains(&("spellcheck".into(), "0".into())));
    }

    #[test]
    fn news_url_skips_paging() {
        let backend =
            BraveBackend::from_params(&params_with(&[("category", json!("news"))])).expect("valid");
        let params = SearchParameters {
            page: 2,
            time_range: Some(TimeRange::Day),
            ..SearchParameters::new("rust")
        };
        let url = backend.request_url(&params).expect("url");
        assert_eq!(url.path(), "/news");
        assert!(!url.query_pairs().any(|(k, _)| k == "offset" || k == "tf"));
    }

    #[test]
    fn first_page_has_no_offset() {
        let backend = BraveBackend::from_params(&BackendParams::new()).expect("valid");
        let url = backend
            .request_url(&SearchParameters::new("rust"))
            .expect("url");
        assert!(!url.query_pairs().any(|(k, _)| k == "offset"));
    }

    #[test]
    fn cookie_header_carries_preferences() {
        let params = SearchParameters {
            safesearch: SafeSearch::Strict,
            locale: "de-DE".into(),
            country: "DE".into(),
            ..SearchParameters::new("rust")
        };
        let cookie = cookie_header(&params);
        assert!(cookie.contains("safesearch=strict"));
        assert!(cookie.contains("country=de"));
        assert!(cookie.contains("ui_lang=de-de"));
    }

    #[test]
    fn parse_web_html_returns_results() {
        let results = parse_brave_web_html(MOCK_WEB_HTML).expect("should parse");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Rust Programming Language");
        assert_eq!(results[0].url, "https://www.rust-lang.org/");
        assert!(results[0].content.contains("reliable and efficient"));
        assert_eq!(results[1].url, "https://doc.rust-lang.org/book/");
        assert!(results[0].engine.is_none());
    }

    #[test]
    fn parse_news_html_reads_thumbnails() {
        let results = parse_brave_news_html(MOCK_NEWS_HTML).expect("should parse");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Announcing Rust 1.80.0");
        assert_eq!(
            results[0].thumbnail.as_deref(),
            Some("https://imgs.search.brave.com/thumb.jpg")
        );
        assert!(results[0].content.starts_with("The Rust team"));
        assert_eq!(results[1].title, "Plain headline");
        assert!(results[1].thumbnail.is_none());
        assert!(results[1].content.is_empty());
    }

    #[test]
    fn parse_empty_html_returns_empty() {
        assert!(parse_brave_web_html("<html><body></body></html>")
            .expect("should parse")
            .is_empty());
        assert!(parse_brave_news_html("<html><body></body></html>")
            .expect("should parse")
            .is_empty());
    }

    #[test]
    fn is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BraveBackend>();
    }

    #[tokio::test]
    #[ignore] // Live test, run with `cargo test -- --ignored`
    async fn live_brave_search() {
        let backend = BraveBackend::from_params(&BackendParams::new()).expect("valid");
        let response = backend
            .search(&SearchParameters::new("rust programming"))
            .await
            .expect("live search should work");
        for r in &response.results {
            assert!(!r.url.is_empty());
        }
    }
}
