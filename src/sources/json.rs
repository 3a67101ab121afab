// src/sources/json.rs

//! Paginated JSON APIs.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AdapterError;
use crate::fetch::{Fetch, FetchRequest};
use crate::models::{JsonSource, RawJob};

use super::{SourceAdapter, SourceResult};

/// Adapter for sources exposing their vacancies as JSON.
pub struct JsonSourceAdapter {
    source: JsonSource,
}

impl JsonSourceAdapter {
    pub fn new(source: JsonSource) -> Self {
        Self { source }
    }

    fn request(&self, page: Option<u32>) -> FetchRequest {
        let mut request = FetchRequest::get(self.source.url.clone())
            .header("Accept", "application/json")
            .headers(&self.source.headers)
            .verify_tls(self.source.verify_tls);
        for (name, value) in &self.source.query {
            request = request.query(name.clone(), value);
        }
        if let (Some(param), Some(page)) = (&self.source.page_param, page) {
            request = request.query(param.clone(), page);
        }
        request
    }

    /// Parse one response body into jobs.
    fn extract(&self, body: &str) -> Result<Vec<RawJob>, AdapterError> {
        let payload = parse_payload(body)?;
        let items: &[Value] = match lookup(&payload, &self.source.items_path) {
            Some(Value::Array(items)) => items.as_slice(),
            Some(Value::Null) => &[],
            Some(other) => {
                return Err(AdapterError::parse(format!(
                    "'{}' is not an array but {}",
                    self.source.items_path,
                    type_name(other)
                )));
            }
            None => {
                return Err(AdapterError::parse(format!(
                    "path '{}' not found in response",
                    self.source.items_path
                )));
            }
        };

        Ok(items.iter().filter_map(|item| self.parse_item(item)).collect())
    }

    fn parse_item(&self, item: &Value) -> Option<RawJob> {
        let title = field_text(item, &self.source.title_field)?;
        if title.is_empty() {
            return None;
        }

        let link = match (&self.source.link_field, &self.source.link_template) {
            (Some(field), _) => field_text(item, field).unwrap_or_default(),
            (None, Some(template)) => render_template(template, item),
            (None, None) => String::new(),
        };
        let company = match (&self.source.company, &self.source.company_field) {
            (Some(fixed), _) => fixed.clone(),
            (None, Some(field)) => field_text(item, field).unwrap_or_default(),
            (None, None) => String::new(),
        };

        Some(RawJob::new(company, title, link))
    }
}

#[async_trait]
impl SourceAdapter for JsonSourceAdapter {
    async fn run(&self, fetch: &dyn Fetch) -> SourceResult {
        if self.source.page_param.is_none() {
            let body = fetch.fetch(self.request(None)).await?;
            return self.extract(&body);
        }

        let mut jobs = Vec::new();
        let first = self.source.start_page;
        for page in first..first.saturating_add(self.source.max_pages) {
            let body = fetch.fetch(self.request(Some(page))).await?;
            let page_jobs = self.extract(&body)?;
            log::debug!("{} page {page}: {} listings", self.source.url, page_jobs.len());
            if page_jobs.is_empty() {
                break;
            }
            jobs.extend(page_jobs);
        }
        Ok(jobs)
    }
}

/// Parse a JSON body, tolerating a payload wrapped in single quotes.
fn parse_payload(body: &str) -> Result<Value, AdapterError> {
    let trimmed = body.trim();
    let unquoted = trimmed
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(trimmed);
    serde_json::from_str(unquoted).map_err(|e| AdapterError::parse(format!("invalid JSON: {e}")))
}

/// Follow a dot path (`data.items`). An empty path is the root.
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => current.get(segment),
        })
}

/// Scalar field as text; nested objects and arrays are not text.
fn field_text(item: &Value, field: &str) -> Option<String> {
    match lookup(item, field)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Replace `{field}` placeholders with item values. Unknown fields render empty.
fn render_template(template: &str, item: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                out.push_str(&field_text(item, &after[..close]).unwrap_or_default());
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
