//! RestBackend - [`Backend`] over a PostgREST-compatible HTTP API.
//!
//! Collections live under `{backend_url}/rest/v1/{collection}`. Filters are
//! encoded as `column=op.value` parameters; writes ask for the stored rows
//! back with `Prefer: return=representation`.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::Backend;
use crate::config::ClientConfig;
use crate::error::{BackendError, BackendResult, ErrorKind};
use crate::query::{Filter, Query};
use crate::session::Session;

const PREFER: &str = "prefer";
const RETURN_REPRESENTATION: &str = "return=representation";

pub struct RestBackend {
    client: Client,
    base_url: String,
    anon_key: String,
    session: Session,
}

impl RestBackend {
    pub fn new(config: &ClientConfig, session: Session) -> Self {
        Self::with_client(Client::new(), config, session)
    }

    pub fn with_client(client: Client, config: &ClientConfig, session: Session) -> Self {
        Self {
            client,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            session,
        }
    }

    fn url(&self, collection: &str) -> BackendResult<Url> {
        let raw = format!("{}/rest/v1/{}", self.base_url, collection);
        Url::parse(&raw).map_err(|e| {
            BackendError::new(ErrorKind::Network, format!("invalid backend url {}: {}", raw, e))
        })
    }

    fn headers(&self) -> BackendResult<HeaderMap> {
        let token = self
            .session
            .access_token()
            .unwrap_or_else(|| self.anon_key.clone());

        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&self.anon_key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", token))?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn request(&self, method: Method, url: Url) -> BackendResult<RequestBuilder> {
        Ok(self.client.request(method, url).headers(self.headers()?))
    }

    /// Send a request and parse the JSON body; an empty body reads as `[]`.
    async fn send(&self, collection: &str, request: RequestBuilder) -> BackendResult<Value> {
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        debug!(collection, status = status.as_u16(), bytes = body.len(), "backend response");

        if !status.is_success() {
            return Err(error_from_body(status.as_u16(), &body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Array(Vec::new()));
        }
        serde_json::from_str(&body).map_err(|e| {
            BackendError::new(
                ErrorKind::SchemaMismatch,
                format!("{}: response is not JSON: {}", collection, e),
            )
        })
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn select(&self, collection: &str, query: &Query) -> BackendResult<Vec<Value>> {
        let mut url = self.url(collection)?;
        encode_query(&mut url, query);
        let body = self.send(collection, self.request(Method::GET, url)?).await?;
        rows(collection, body)
    }

    async fn insert(&self, collection: &str, row: Value) -> BackendResult<Value> {
        let url = self.url(collection)?;
        let request = self
            .request(Method::POST, url)?
            .header(PREFER, RETURN_REPRESENTATION)
            .json(&row);
        let body = self.send(collection, request).await?;
        single(collection, body, None)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> BackendResult<Value> {
        let mut url = self.url(collection)?;
        encode_query(&mut url, &Query::new().eq("id", id));
        let request = self
            .request(Method::PATCH, url)?
            .header(PREFER, RETURN_REPRESENTATION)
            .json(&patch);
        let body = self.send(collection, request).await?;
        single(collection, body, Some(id))
    }

    async fn delete(&self, collection: &str, id: &str) -> BackendResult<()> {
        self.delete_where(collection, &Query::new().eq("id", id))
            .await
            .map(|_| ())
    }

    async fn delete_where(&self, collection: &str, query: &Query) -> BackendResult<u64> {
        if query.filters.is_empty() {
            return Err(BackendError::new(
                ErrorKind::Forbidden,
                format!("refusing unfiltered delete on {}", collection),
            ));
        }
        let mut url = self.url(collection)?;
        encode_query(&mut url, &Query { columns: None, order: None, limit: None, ..query.clone() });
        let request = self
            .request(Method::DELETE, url)?
            .header(PREFER, RETURN_REPRESENTATION);
        let body = self.send(collection, request).await?;
        Ok(rows(collection, body)?.len() as u64)
    }
}

/// Append PostgREST parameters for `query` to `url`.
pub(crate) fn encode_query(url: &mut Url, query: &Query) {
    let mut pairs = url.query_pairs_mut();
    if let Some(columns) = &query.columns {
        pairs.append_pair("select", &columns.join(","));
    }
    for filter in &query.filters {
        pairs.append_pair(filter.column(), &encode_filter(filter));
    }
    if let Some(order) = &query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        pairs.append_pair("order", &format!("{}.{}", order.column, direction));
    }
    if let Some(limit) = query.limit {
        pairs.append_pair("limit", &limit.to_string());
    }
}

fn encode_filter(filter: &Filter) -> String {
    match filter {
        Filter::Eq { value: Value::Null, .. } => "is.null".to_string(),
        Filter::Neq { value: Value::Null, .. } => "not.is.null".to_string(),
        Filter::Eq { value, .. } => format!("eq.{}", scalar(value)),
        Filter::Neq { value, .. } => format!("neq.{}", scalar(value)),
        Filter::In { values, .. } => {
            let list: Vec<String> = values.iter().map(list_item).collect();
            format!("in.({})", list.join(","))
        }
        Filter::ILike { pattern, .. } => format!("ilike.{}", pattern.replace('%', "*")),
        Filter::Gte { value, .. } => format!("gte.{}", scalar(value)),
        Filter::Lte { value, .. } => format!("lte.{}", scalar(value)),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// Strings inside `in.(...)` are double-quoted so commas and parens survive.
fn list_item(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        other => other.to_string(),
    }
}

fn rows(collection: &str, body: Value) -> BackendResult<Vec<Value>> {
    match body {
        Value::Array(rows) => Ok(rows),
        other => Err(BackendError::new(
            ErrorKind::SchemaMismatch,
            format!("{}: expected an array of rows, got {}", collection, other),
        )),
    }
}

/// First row of a write response; zero rows means the target did not exist.
fn single(collection: &str, body: Value, id: Option<&str>) -> BackendResult<Value> {
    match body {
        Value::Object(_) => Ok(body),
        body => rows(collection, body)?.into_iter().next().ok_or_else(|| {
            BackendError::not_found(collection, id.unwrap_or("<new>")).with_code("PGRST116")
        }),
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

fn error_from_body(status: u16, body: &str) -> BackendError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => BackendError::classify(
            status,
            parsed.code.as_deref(),
            parsed.message.unwrap_or_else(|| format!("HTTP {}", status)),
        ),
        Err(_) => BackendError::classify(status, None, format!("HTTP {}: {}", status, body.trim())),
    }
}

fn transport(err: reqwest::Error) -> BackendError {
    BackendError::new(ErrorKind::Network, err.to_string())
}

fn header_value(value: &str) -> BackendResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| {
        BackendError::new(ErrorKind::Unauthorized, "credentials contain invalid header characters")
    })
}
