// src/sources/html.rs

//! Listing pages scraped with CSS selectors.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::AdapterError;
use crate::fetch::{Fetch, FetchRequest};
use crate::models::{HtmlSource, RawJob};
use crate::utils::{collapse_whitespace, resolve_url};

use super::{SourceAdapter, SourceResult};

/// Adapter for sites that render their vacancies as HTML rows.
pub struct HtmlSourceAdapter {
    source: HtmlSource,
}

/// Compiled selectors for one page.
struct Selectors {
    row: Selector,
    title: Selector,
    link: Option<Selector>,
    company: Option<Selector>,
    extras: Vec<(String, Selector)>,
}

impl Selectors {
    fn compile(source: &HtmlSource) -> Result<Self, AdapterError> {
        Ok(Self {
            row: parse_selector(&source.row_selector)?,
            title: parse_selector(&source.title_selector)?,
            link: source
                .link_selector
                .as_deref()
                .map(parse_selector)
                .transpose()?,
            company: source
                .company_selector
                .as_deref()
                .map(parse_selector)
                .transpose()?,
            extras: source
                .extra_selectors
                .iter()
                .map(|(name, sel)| parse_selector(sel).map(|s| (name.clone(), s)))
                .collect::<Result<_, AdapterError>>()?,
        })
    }
}

impl HtmlSourceAdapter {
    pub fn new(source: HtmlSource) -> Self {
        Self { source }
    }

    /// URLs to request, in order.
    fn page_urls(&self) -> Vec<String> {
        match self.source.pages {
            Some(range) => (range.start..=range.end)
                .map(|page| self.source.url.replace("{page}", &page.to_string()))
                .collect(),
            None => vec![self.source.url.clone()],
        }
    }

    /// Extract the listings of one page. Returns the number of rows matched
    /// alongside the jobs, since rows without a title are skipped.
    fn extract(&self, body: &str, page_url: &str) -> Result<(usize, Vec<RawJob>), AdapterError> {
        let selectors = Selectors::compile(&self.source)?;
        let base_url = Url::parse(page_url)
            .map_err(|e| AdapterError::parse(format!("invalid page url {page_url}: {e}")))?;
        let document = Html::parse_document(body);

        let mut rows = 0;
        let mut jobs = Vec::new();
        for row in document.select(&selectors.row) {
            rows += 1;
            if let Some(job) = self.parse_row(&row, &selectors, &base_url) {
                jobs.push(job);
            }
        }
        Ok((rows, jobs))
    }

    fn parse_row(&self, row: &ElementRef, selectors: &Selectors, base_url: &Url) -> Option<RawJob> {
        let title_elem = row.select(&selectors.title).next()?;
        let title = element_text(&title_elem);
        if title.is_empty() {
            return None;
        }

        let attr = self.source.link_attr.as_str();
        let raw_link = selectors
            .link
            .as_ref()
            .and_then(|sel| row.select(sel).next())
            .and_then(|e| e.value().attr(attr))
            .or_else(|| title_elem.value().attr(attr))
            .or_else(|| row.value().attr(attr))
            .map(str::trim)
            .unwrap_or("");
        let link = if raw_link.is_empty() {
            String::new()
        } else {
            resolve_url(base_url, raw_link)
        };

        let company = match (&self.source.company, &selectors.company) {
            (Some(fixed), _) => fixed.clone(),
            (None, Some(sel)) => row
                .select(sel)
                .next()
                .map(|e| element_text(&e))
                .unwrap_or_default(),
            (None, None) => String::new(),
        };

        let mut job = RawJob::new(company, title, link);
        for (name, sel) in &selectors.extras {
            let value = row.select(sel).next().map(|e| element_text(&e));
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                job = job.with_extra(name.clone(), value);
            }
        }
        Some(job)
    }
}

#[async_trait]
impl SourceAdapter for HtmlSourceAdapter {
    async fn run(&self, fetch: &dyn Fetch) -> SourceResult {
        let mut jobs = Vec::new();
        for page_url in self.page_urls() {
            let request = FetchRequest::get(page_url.clone())
                .headers(&self.source.headers)
                .verify_tls(self.source.verify_tls);
            let body = fetch.fetch(request).await?;

            let (rows, page_jobs) = self.extract(&body, &page_url)?;
            log::debug!("{page_url}: {rows} rows, {} listings", page_jobs.len());
            if rows == 0 && self.source.stop_on_empty {
                break;
            }
            jobs.extend(page_jobs);
        }
        Ok(jobs)
    }
}

fn element_text(element: &ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn parse_selector(s: &str) -> Result<Selector, AdapterError> {
    Selector::parse(s).map_err(|e| AdapterError::selector(s, e))
}
