//! Page fetching and HTML-to-text cleaning.

use std::time::Duration;

use reqwest::{header, Client, Url};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::core::errors::ApiError;
use crate::rag::PageInput;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const DEFAULT_TITLE: &str = "Untitled Page";

/// Elements whose content never reaches the index: page chrome, ads and overlays.
const SKIPPED_SELECTORS: [&str; 27] = [
    "script", "style", "noscript", "template", "svg", "iframe", "head", "nav", "header",
    "footer", "aside", ".header", ".footer", ".navigation", ".nav", ".sidebar",
    ".advertisement", ".ads", ".ad", ".menu", ".navbar", ".footer-links", ".social-share",
    ".share-buttons", ".cookie-banner", ".popup", ".modal",
];

/// Content roots in order of preference; `body` is the last resort.
const ROOT_SELECTORS: [&str; 11] = [
    "main", "article", ".main-content", ".content", ".post-content", ".entry-content", "#main",
    "#content", ".article-body", ".post-body", "body",
];

/// Elements that start a new paragraph in the cleaned text.
const BLOCK_TAGS: [&str; 28] = [
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "figure",
    "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "main", "ol", "p", "pre", "section", "table",
    "td", "th", "tr", "ul",
];

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("timed out fetching {0}")]
    Timeout(String),
    #[error("could not parse page: {0}")]
    Parse(String),
    #[error("no readable text on {0}")]
    NoContent(String),
}

impl From<CrawlError> for ApiError {
    fn from(err: CrawlError) -> Self {
        match err {
            CrawlError::InvalidUrl(_) => ApiError::BadRequest(err.to_string()),
            CrawlError::NoContent(_) => ApiError::Unprocessable(err.to_string()),
            CrawlError::Request(_) | CrawlError::Timeout(_) | CrawlError::Parse(_) => {
                ApiError::BadGateway(err.to_string())
            }
        }
    }
}

/// Title and paragraph-separated text of one HTML document.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    pub title: String,
    pub text: String,
}

#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
    timeout: Duration,
}

impl PageFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, CrawlError> {
        let timeout = Duration::from_secs(timeout_secs.max(1));
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CrawlError::Request(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    /// Download `url` and return its cleaned text ready for indexing.
    /// The page keeps `url` exactly as given as its source URL.
    pub async fn fetch(&self, url: &str) -> Result<PageInput, CrawlError> {
        let source_url = url.trim();
        let parsed = validate_url(source_url)?;

        let request = self
            .client
            .get(parsed)
            .header(header::ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| CrawlError::Timeout(source_url.to_string()))?
            .map_err(|e| CrawlError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| CrawlError::Request(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| CrawlError::Request(e.to_string()))?;

        let page = extract_page(&body)?;
        if page.text.trim().is_empty() {
            return Err(CrawlError::NoContent(source_url.to_string()));
        }

        tracing::info!(
            "Fetched {} ({} chars of text, title {:?})",
            source_url,
            page.text.chars().count(),
            page.title
        );

        Ok(PageInput {
            cleaned_text: page.text,
            source_url: source_url.to_string(),
            title: page.title,
        })
    }
}

/// Accepts absolute `http`/`https` URLs with a host.
pub fn validate_url(raw: &str) -> Result<Url, CrawlError> {
    let url = Url::parse(raw.trim()).map_err(|e| CrawlError::InvalidUrl(format!("{raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(CrawlError::InvalidUrl(format!(
            "{raw}: unsupported scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(CrawlError::InvalidUrl(format!("{raw}: missing host")));
    }
    Ok(url)
}

pub fn extract_page(html: &str) -> Result<ExtractedPage, CrawlError> {
    let document = Html::parse_document(html);

    let title_selector = parse_selector("title")?;
    let title = document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let skipped = parse_selector(&SKIPPED_SELECTORS.join(", "))?;
    let root = pick_root(&document)?;
    let mut blocks = Vec::new();
    let mut inline = String::new();
    walk(root, &skipped, &mut blocks, &mut inline);
    flush(&mut blocks, &mut inline);

    Ok(ExtractedPage {
        title,
        text: blocks.join("\n\n"),
    })
}

fn parse_selector(selector: &str) -> Result<Selector, CrawlError> {
    Selector::parse(selector).map_err(|e| CrawlError::Parse(format!("{selector}: {e}")))
}

fn pick_root(document: &Html) -> Result<ElementRef<'_>, CrawlError> {
    for candidate in ROOT_SELECTORS {
        let selector = parse_selector(candidate)?;
        if let Some(element) = document.select(&selector).next() {
            return Ok(element);
        }
    }
    Ok(document.root_element())
}

fn walk(element: ElementRef<'_>, skipped: &Selector, blocks: &mut Vec<String>, inline: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            inline.push_str(text);
            continue;
        }
        let Some(child_element) = ElementRef::wrap(child) else {
            continue;
        };

        if skipped.matches(&child_element) {
            continue;
        }

        if BLOCK_TAGS.contains(&child_element.value().name()) {
            flush(blocks, inline);
            walk(child_element, skipped, blocks, inline);
            flush(blocks, inline);
        } else {
            walk(child_element, skipped, blocks, inline);
        }
    }
}

fn flush(blocks: &mut Vec<String>, inline: &mut String) {
    let text = collapse_whitespace(inline);
    if !text.is_empty() {
        blocks.push(text);
    }
    inline.clear();
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
