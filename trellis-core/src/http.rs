// HTTP request and response types

use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use tokio::io::AsyncRead;

/// The verbs a route can be declared for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    #[default]
    GET,
    POST,
    PUT,
    DELETE,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::GET),
            "POST" => Ok(HttpMethod::POST),
            "PUT" => Ok(HttpMethod::PUT),
            "DELETE" => Ok(HttpMethod::DELETE),
            _ => Err(()),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP request wrapper
///
/// Header names are stored lower-cased. `path` never contains the query
/// string; the raw query is kept in `query_string` and decoded into `query`.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub query_string: Option<String>,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    /// Body decoded by the [`BodyParser`](crate::BodyParser), if any.
    pub parsed_body: Option<serde_json::Value>,
}

impl HttpRequest {
    /// Build a request from a method and a request target such as
    /// `/items/3?sort=asc`.
    pub fn new(method: impl Into<String>, uri: impl AsRef<str>) -> Self {
        let uri = uri.as_ref();
        let (path, query_string) = match uri.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (uri, None),
        };
        let query = query_string
            .as_deref()
            .map(parse_query_string)
            .unwrap_or_default();

        Self {
            method: method.into().to_ascii_uppercase(),
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            query_string,
            query,
            headers: HashMap::new(),
            body: Bytes::new(),
            parsed_body: None,
        }
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Attach a JSON body and the matching content type.
    pub fn with_json<T: Serialize>(self, value: &T) -> Result<Self, crate::Error> {
        let body =
            serde_json::to_vec(value).map_err(|e| crate::Error::Serialization(e.to_string()))?;
        Ok(self
            .with_header("content-type", "application/json")
            .with_body(body))
    }

    /// Get a header by (case-insensitive) name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Get a query parameter by name
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Replace the path, keeping the query string.
    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }
}

/// Parse a query string into a map of parameters. Later duplicates win.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .unwrap_or_default()
        .into_iter()
        .collect()
}

/// A boxed byte source streamed to the client.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Response payload.
#[derive(Default)]
pub enum ResponseBody {
    #[default]
    Empty,
    Full(Bytes),
    Stream(ByteStream),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Empty => f.write_str("Empty"),
            ResponseBody::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            ResponseBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// HTTP response wrapper
///
/// Header names are stored lower-cased, so writing a header again replaces
/// it whatever case either write used.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: ResponseBody,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: ResponseBody::Empty,
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn no_content() -> Self {
        Self::new(204)
    }

    pub fn bad_request() -> Self {
        Self::new(400)
    }

    pub fn not_found() -> Self {
        Self::new(404)
    }

    pub fn payload_too_large() -> Self {
        Self::new(413)
    }

    pub fn internal_server_error() -> Self {
        Self::new(500)
    }

    /// `200 text/plain`
    pub fn text(body: impl Into<String>) -> Self {
        Self::ok()
            .with_header("Content-Type", "text/plain")
            .with_body(body.into())
    }

    /// `200 application/json`
    pub fn json<T: Serialize>(value: &T) -> Result<Self, crate::Error> {
        let body =
            serde_json::to_vec(value).map_err(|e| crate::Error::Serialization(e.to_string()))?;
        Ok(Self::ok()
            .with_header("Content-Type", "application/json")
            .with_body(body))
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = ResponseBody::Full(body.into());
        self
    }

    pub fn with_stream(mut self, stream: ByteStream) -> Self {
        self.body = ResponseBody::Stream(stream);
        self
    }

    pub fn with_header(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set a header, replacing any existing entry with the same name.
    pub fn set_header(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        let key = key.as_ref().to_ascii_lowercase();
        self.headers
            .retain(|existing, _| !existing.eq_ignore_ascii_case(&key));
        self.headers.insert(key, value.into());
    }

    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        let key = self
            .headers
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()?;
        self.headers.remove(&key)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .or_else(|| {
                self.headers
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, value)| value)
            })
            .map(String::as_str)
    }

    /// Buffered body bytes; empty for streamed bodies.
    pub fn body_bytes(&self) -> Bytes {
        match &self.body {
            ResponseBody::Full(bytes) => bytes.clone(),
            _ => Bytes::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_splits_query() {
        let req = HttpRequest::new("get", "/search?q=rust%20lang&page=2");
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/search");
        assert_eq!(req.query("q"), Some("rust lang"));
        assert_eq!(req.query("page"), Some("2"));
        assert_eq!(req.query_string.as_deref(), Some("q=rust%20lang&page=2"));
    }

    #[test]
    fn test_request_without_query() {
        let req = HttpRequest::new("POST", "/items");
        assert!(req.query.is_empty());
        assert!(req.query_string.is_none());
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let req = HttpRequest::new("GET", "/").with_header("X-Token", "abc");
        assert_eq!(req.header("x-token"), Some("abc"));
        assert_eq!(req.header("X-TOKEN"), Some("abc"));

        let res = HttpResponse::ok().with_header("Content-Type", "text/html");
        assert_eq!(res.header("content-type"), Some("text/html"));
    }

    #[test]
    fn test_header_rewrite_replaces_any_case() {
        let mut res = HttpResponse::text("42");
        assert_eq!(res.header("content-type"), Some("text/plain"));

        res.set_header("content-type", "text/html");
        assert_eq!(res.headers.len(), 1);
        assert_eq!(res.header("Content-Type"), Some("text/html"));

        let res = res.with_header("CONTENT-TYPE", "application/xml");
        assert_eq!(res.headers.len(), 1);
        assert_eq!(res.headers.get("content-type").map(String::as_str), Some("application/xml"));
    }

    #[test]
    fn test_remove_header() {
        let mut res = HttpResponse::ok().with_header("X-Cache", "hit");
        assert_eq!(res.remove_header("x-cache").as_deref(), Some("hit"));
        assert!(res.headers.is_empty());
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("delete".parse::<HttpMethod>(), Ok(HttpMethod::DELETE));
        assert!("PATCH".parse::<HttpMethod>().is_err());
        assert_eq!(HttpMethod::default(), HttpMethod::GET);
    }

    #[test]
    fn test_json_response() {
        let res = HttpResponse::json(&serde_json::json!({"aaa": 123})).unwrap();
        assert_eq!(res.status, 200);
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(&res.body_bytes()[..], br#"{"aaa":123}"#);
    }
}
