//! Per-request state shared by guards, pipes, handlers and filters.

use {
    crate::{Error, Result, metadata::ParamSource},
    axum::{
        Json,
        body::Body,
        extract::{FromRequestParts, Path, Request},
        response::{IntoResponse, Response},
    },
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header},
    http_body_util::LengthLimitError,
    parking_lot::Mutex,
    serde::de::DeserializeOwned,
    serde_json::{Map, Value},
    std::{collections::HashMap, sync::Arc},
};

/// A parsed inbound request.
///
/// The body is decoded as JSON once, before any guard runs. Query and path
/// parameters are exposed as JSON objects so that parameter extraction works
/// the same way for every source.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Value,
    query: Value,
    params: Value,
}

impl InboundRequest {
    /// Creates a request with an empty body, query and path map.
    pub fn new(method: Method, uri: Uri) -> Self {
        let query = uri.query().map(parse_query).unwrap_or_default();
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Value::Object(Map::new()),
            query: Value::Object(query),
            params: Value::Object(Map::new()),
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Value::Object(params) = &mut self.params {
            params.insert(name.into(), Value::String(value.into()));
        }
        self
    }

    /// Renames path captures, `(from, to)` pairs applied all at once.
    pub(crate) fn rename_params(&mut self, renames: &[(String, String)]) {
        if renames.is_empty() {
            return;
        }
        if let Value::Object(params) = &mut self.params {
            let moved: Vec<(String, Value)> = renames
                .iter()
                .filter_map(|(from, to)| params.remove(from).map(|value| (to.clone(), value)))
                .collect();
            params.extend(moved);
        }
    }

    /// Parses an axum request into its method, headers, path captures, query
    /// map and JSON body.
    ///
    /// Only bodies declared as JSON are decoded; anything else leaves the body
    /// as an empty object. An empty JSON body is also treated as `{}`.
    pub(crate) async fn from_request(req: Request, body_limit: usize) -> Result<Self> {
        let (mut parts, body) = req.into_parts();

        let params = match Path::<HashMap<String, String>>::from_request_parts(&mut parts, &())
            .await
        {
            Ok(Path(captures)) => captures
                .into_iter()
                .map(|(name, value)| (name, Value::String(value)))
                .collect(),
            Err(_) => Map::new(),
        };
        let query = parts.uri.query().map(parse_query).unwrap_or_default();

        let bytes = axum::body::to_bytes(body, body_limit).await.map_err(|e| {
            if exceeds_length_limit(&e) {
                Error::payload_too_large(format!("Request body exceeds {body_limit} bytes"))
            } else {
                Error::invalid_input(format!("Failed to read request body: {e}"))
            }
        })?;

        let is_json = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("json"))
            .unwrap_or(false);

        let body = if bytes.is_empty() || !is_json {
            Value::Object(Map::new())
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|e| Error::invalid_input(format!("Malformed JSON body: {e}")))?
        };

        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            query: Value::Object(query),
            params: Value::Object(params),
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value if it is present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn query(&self) -> &Value {
        &self.query
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    /// Returns the whole value of a parameter source.
    pub fn source(&self, source: ParamSource) -> &Value {
        match source {
            ParamSource::Body => &self.body,
            ParamSource::Query => &self.query,
            ParamSource::Path => &self.params,
        }
    }

    /// Extracts a raw parameter value. Without a key the whole source is
    /// returned; a key that is missing (or a source that is not an object)
    /// yields `null`.
    pub(crate) fn extract(&self, source: ParamSource, key: Option<&str>) -> Value {
        let raw = self.source(source);
        match key {
            None => raw.clone(),
            Some(key) => raw.get(key).cloned().unwrap_or(Value::Null),
        }
    }
}

/// True when a body read failed because a length limit was hit, either ours
/// or one applied by an outer body limit layer.
fn exceeds_length_limit(error: &axum::Error) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

/// Parses a query string into a JSON object. Repeated keys become arrays.
fn parse_query(query: &str) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let value = Value::String(value.into_owned());
        match map.get_mut(&*key) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key.into_owned(), value);
            }
        }
    }
    map
}

#[derive(Debug)]
struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Value>,
    forwarded: Option<Arc<Error>>,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
            forwarded: None,
        }
    }
}

/// The outgoing response of a single request.
///
/// Cloning the handle shares the same underlying response. Once a body has
/// been sent, further sends are ignored and logged.
#[derive(Debug, Clone, Default)]
pub struct ResponseHandle {
    state: Arc<Mutex<ResponseState>>,
}

impl ResponseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends `value` as JSON with the current status (200 unless changed).
    ///
    /// Returns `false` when a response was already sent.
    pub fn send_json(&self, value: Value) -> bool {
        let mut state = self.state.lock();
        if state.body.is_some() {
            tracing::warn!("Response already sent, ignoring additional JSON body");
            return false;
        }
        state.body = Some(value);
        true
    }

    /// Sets the status and sends `value` as JSON in one step.
    pub fn send_json_with_status(&self, status: StatusCode, value: Value) -> bool {
        let mut state = self.state.lock();
        if state.body.is_some() {
            tracing::warn!(%status, "Response already sent, ignoring additional JSON body");
            return false;
        }
        state.status = status;
        state.body = Some(value);
        true
    }

    pub fn set_status(&self, status: StatusCode) {
        let mut state = self.state.lock();
        if state.body.is_some() {
            tracing::warn!(%status, "Response already sent, ignoring status change");
            return;
        }
        state.status = status;
    }

    pub fn status(&self) -> StatusCode {
        self.state.lock().status
    }

    pub fn set_header(&self, name: HeaderName, value: HeaderValue) {
        self.state.lock().headers.insert(name, value);
    }

    pub fn is_sent(&self) -> bool {
        self.state.lock().body.is_some()
    }

    #[cfg(test)]
    pub(crate) fn sent_body(&self) -> Option<Value> {
        self.state.lock().body.clone()
    }

    pub(crate) fn forward(&self, error: Arc<Error>) {
        let mut state = self.state.lock();
        if state.forwarded.is_some() {
            tracing::warn!(error = %error, "An error was already forwarded, ignoring");
            return;
        }
        state.forwarded = Some(error);
    }

    /// Renders the final response.
    ///
    /// A sent body wins. Otherwise a forwarded error is rendered through the
    /// generic error path. With neither, the current status and headers are
    /// flushed with an empty body.
    pub(crate) fn take_response(&self) -> Response {
        let state = std::mem::take(&mut *self.state.lock());

        let mut response = match (state.body, state.forwarded) {
            (Some(body), _) => (state.status, Json(body)).into_response(),
            (None, Some(error)) => error.to_response(),
            (None, None) => {
                tracing::debug!(status = %state.status, "No response body was sent");
                let mut response = Response::new(Body::empty());
                *response.status_mut() = state.status;
                response
            }
        };
        response.headers_mut().extend(state.headers);
        response
    }
}

/// Hands an error to the generic error path without returning it.
#[derive(Debug, Clone)]
pub struct Next {
    response: ResponseHandle,
}

impl Next {
    /// Forwards `error`. It is rendered only if no response body gets sent.
    pub fn forward(&self, error: Error) {
        self.response.forward(Arc::new(error));
    }
}

/// What guards and filters see of a request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request: Arc<InboundRequest>,
    response: ResponseHandle,
}

impl RequestContext {
    pub fn new(request: InboundRequest) -> Self {
        Self {
            request: Arc::new(request),
            response: ResponseHandle::new(),
        }
    }

    pub fn request(&self) -> &InboundRequest {
        &self.request
    }

    pub fn response(&self) -> &ResponseHandle {
        &self.response
    }

    pub fn next(&self) -> Next {
        Next {
            response: self.response.clone(),
        }
    }
}

/// The arguments and request handles passed to a route handler.
///
/// `args` holds one slot per declared parameter index; slots without a
/// declaration hold `null`.
#[derive(Debug, Clone)]
pub struct Invocation {
    args: Vec<Value>,
    context: RequestContext,
}

impl Invocation {
    pub(crate) fn new(args: Vec<Value>, context: RequestContext) -> Self {
        Self { args, context }
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Returns the raw argument at `index`, or `null` past the last slot.
    pub fn raw_arg(&self, index: usize) -> &Value {
        static NULL: Value = Value::Null;
        self.args.get(index).unwrap_or(&NULL)
    }

    /// Deserializes the argument at `index`.
    ///
    /// A type mismatch is reported as an `InvalidInput` error, so it goes
    /// through the route's filters like any other handler error.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        serde_json::from_value(self.raw_arg(index).clone())
            .map_err(|e| Error::invalid_input(format!("Invalid argument {index}: {e}")))
    }

    pub fn request(&self) -> &InboundRequest {
        self.context.request()
    }

    pub fn response(&self) -> &ResponseHandle {
        self.context.response()
    }

    pub fn next(&self) -> Next {
        self.context.next()
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }
}
