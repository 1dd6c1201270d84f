// In-process test client

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use trellis_core::{Dispatcher, Error, HttpMethod, HttpRequest, HttpResponse, Pipeline, ResponseBody};

/// Sends requests straight into a [`Pipeline`] without opening a socket.
///
/// Bodies go through the same body parser as the server, so a JSON body
/// sent with `Content-Type: application/json` reaches handlers parsed.
#[derive(Clone)]
pub struct TestClient {
    pipeline: Arc<Pipeline>,
}

impl TestClient {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    /// Body parsing and dispatch, no static files.
    pub fn from_dispatcher(dispatcher: Dispatcher) -> Self {
        Self::new(Pipeline::new(dispatcher))
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(HttpMethod::GET, path).send(self).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request(HttpMethod::DELETE, path).send(self).await
    }

    /// POST a raw body with no content type.
    pub async fn post(&self, path: &str, body: impl Into<Bytes>) -> TestResponse {
        self.request(HttpMethod::POST, path).body(body).send(self).await
    }

    pub async fn put(&self, path: &str, body: impl Into<Bytes>) -> TestResponse {
        self.request(HttpMethod::PUT, path).body(body).send(self).await
    }

    pub async fn post_json<T: serde::Serialize>(&self, path: &str, data: &T) -> TestResponse {
        match self.request(HttpMethod::POST, path).json(data) {
            Ok(builder) => builder.send(self).await,
            Err(err) => TestResponse::from_error(&err),
        }
    }

    pub async fn put_json<T: serde::Serialize>(&self, path: &str, data: &T) -> TestResponse {
        match self.request(HttpMethod::PUT, path).json(data) {
            Ok(builder) => builder.send(self).await,
            Err(err) => TestResponse::from_error(&err),
        }
    }

    /// Start building a request with headers or query parameters.
    pub fn request(&self, method: HttpMethod, path: &str) -> TestRequestBuilder {
        TestRequestBuilder::new(method, path)
    }

    pub async fn send(&self, request: HttpRequest) -> TestResponse {
        TestResponse::collect(self.pipeline.handle(request).await).await
    }
}

/// Builder for test requests
pub struct TestRequestBuilder {
    method: HttpMethod,
    path: String,
    headers: Vec<(String, String)>,
    body: Bytes,
    query_params: Vec<(String, String)>,
}

impl TestRequestBuilder {
    pub fn new(method: HttpMethod, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            headers: Vec::new(),
            body: Bytes::new(),
            query_params: Vec::new(),
        }
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize `data` as the body and set `Content-Type: application/json`.
    pub fn json<T: serde::Serialize>(mut self, data: &T) -> Result<Self, Error> {
        self.body = serde_json::to_vec(data)
            .map_err(|e| Error::Serialization(e.to_string()))?
            .into();
        self.headers
            .push(("Content-Type".to_string(), "application/json".to_string()));
        Ok(self)
    }

    /// Appended to the path as-is; values are not percent-encoded.
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query_params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn build(self) -> HttpRequest {
        let mut uri = self.path;
        if !self.query_params.is_empty() {
            let params: Vec<String> = self
                .query_params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            uri.push(if uri.contains('?') { '&' } else { '?' });
            uri.push_str(&params.join("&"));
        }

        let mut request = HttpRequest::new(self.method.as_str(), uri).with_body(self.body);
        for (key, value) in &self.headers {
            request = request.with_header(key.as_str(), value.as_str());
        }
        request
    }

    pub async fn send(self, client: &TestClient) -> TestResponse {
        client.send(self.build()).await
    }
}

/// A fully collected response; streamed bodies are read to the end.
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: u16,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl TestResponse {
    pub async fn collect(response: HttpResponse) -> Self {
        let body = match response.body {
            ResponseBody::Empty => Bytes::new(),
            ResponseBody::Full(bytes) => bytes,
            ResponseBody::Stream(mut reader) => {
                let mut buf = Vec::new();
                // A failed read leaves whatever arrived before it.
                let _ = reader.read_to_end(&mut buf).await;
                Bytes::from(buf)
            }
        };
        Self {
            status: response.status,
            headers: response
                .headers
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
            body,
        }
    }

    fn from_error(err: &Error) -> Self {
        Self {
            status: err.status_code(),
            headers: HashMap::new(),
            body: Bytes::from(err.to_json().to_string()),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.body.to_vec()).ok()
    }

    pub fn body_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}
