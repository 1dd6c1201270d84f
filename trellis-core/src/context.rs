// Per-request context shared by plugins and handlers

use crate::{HttpRequest, HttpResponse, PathParams};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Mutable state for one in-flight request.
///
/// Plugins read the request, stash values under string keys with
/// [`set`](Self::set) and may write the response themselves. Handlers see a
/// read-only [`ContextSnapshot`] or individual fields through bindings.
#[derive(Debug)]
pub struct RequestContext {
    request: Arc<HttpRequest>,
    params: PathParams,
    data: HashMap<String, Value>,
    response: Option<HttpResponse>,
}

impl RequestContext {
    pub fn new(request: HttpRequest, params: PathParams) -> Self {
        Self {
            request: Arc::new(request),
            params,
            data: HashMap::new(),
            response: None,
        }
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Store a value for later plugins and handlers.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn data(&self) -> &HashMap<String, Value> {
        &self.data
    }

    /// Write the response. A later write replaces an earlier one.
    pub fn respond(&mut self, response: HttpResponse) {
        self.response = Some(response);
    }

    pub fn response(&self) -> Option<&HttpResponse> {
        self.response.as_ref()
    }

    pub fn response_mut(&mut self) -> Option<&mut HttpResponse> {
        self.response.as_mut()
    }

    pub fn take_response(&mut self) -> Option<HttpResponse> {
        self.response.take()
    }

    pub fn is_responded(&self) -> bool {
        self.response.is_some()
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            request: self.request.clone(),
            params: self.params.clone(),
            data: self.data.clone(),
        }
    }
}

/// Read-only copy of a [`RequestContext`] handed to handlers.
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    pub request: Arc<HttpRequest>,
    pub params: PathParams,
    pub data: HashMap<String, Value>,
}

impl ContextSnapshot {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}
