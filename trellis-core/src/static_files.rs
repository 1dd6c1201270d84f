//! Static file serving and history-API fallback
//!
//! Both run ahead of the dispatcher. [`HistoryFallback`] rewrites browser
//! navigation requests of a single-page app to its index page;
//! [`StaticFiles`] then answers any request naming an existing file under
//! its root. Requests neither of them handles go on to the routes.

use crate::logging::{debug, info, trace};
use crate::{Error, HttpRequest, HttpResponse};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Content type for a file, by extension.
pub fn mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
}

/// Serves files below a root directory for GET and HEAD requests.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    index_files: Vec<String>,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index_files: vec!["index.html".to_string()],
        }
    }

    pub fn with_index_files(mut self, files: Vec<String>) -> Self {
        self.index_files = files;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `Ok(None)` when the request does not name a servable file.
    pub async fn serve(&self, req: &HttpRequest) -> Result<Option<HttpResponse>, Error> {
        if req.method != "GET" && req.method != "HEAD" {
            return Ok(None);
        }
        let Some(mut path) = self.resolve_path(&req.path)? else {
            return Ok(None);
        };

        if path.is_dir() {
            match self
                .index_files
                .iter()
                .map(|index| path.join(index))
                .find(|candidate| candidate.is_file())
            {
                Some(index) => path = index,
                None => return Ok(None),
            }
        }
        if !path.is_file() {
            return Ok(None);
        }

        let metadata = tokio::fs::metadata(&path).await?;
        trace!(file = %path.display(), bytes = metadata.len(), "Serving static file");

        let response = HttpResponse::ok()
            .with_header("Content-Type", mime_type(&path))
            .with_header("Content-Length", metadata.len().to_string());

        if req.method == "HEAD" {
            return Ok(Some(response));
        }
        let file = tokio::fs::File::open(&path).await?;
        Ok(Some(response.with_stream(Box::pin(file))))
    }

    /// Map a request path into the root. `None` when nothing exists there;
    /// `Forbidden` when the path escapes the root.
    fn resolve_path(&self, request_path: &str) -> Result<Option<PathBuf>, Error> {
        let decoded = urlencoding::decode(request_path)
            .map(|d| d.into_owned())
            .unwrap_or_else(|_| request_path.to_string());
        let full_path = self.root.join(decoded.trim_start_matches('/'));

        let Ok(canonical_root) = self.root.canonicalize() else {
            return Ok(None);
        };
        let Ok(canonical_path) = full_path.canonicalize() else {
            return Ok(None);
        };

        if !canonical_path.starts_with(&canonical_root) {
            return Err(Error::Forbidden(
                "Access denied: path traversal attempt".to_string(),
            ));
        }
        Ok(Some(canonical_path))
    }
}

/// One regex rewrite: paths matching `from` are rewritten to `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rewrite {
    pub from: String,
    pub to: String,
}

/// Options for [`HistoryFallback`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryFallbackConfig {
    /// Target of the fallback rewrite
    pub index: String,
    /// Path patterns never rewritten
    pub whitelist: Vec<String>,
    pub rewrites: Vec<Rewrite>,
    /// Log every decision at info level
    pub verbose: bool,
    /// Accept values that mark a request as an HTML navigation
    pub html_accept_headers: Vec<String>,
    /// Rewrite paths whose last segment contains a dot as well
    pub disable_dot_rule: bool,
}

impl Default for HistoryFallbackConfig {
    fn default() -> Self {
        Self {
            index: "/index.html".to_string(),
            whitelist: Vec::new(),
            rewrites: Vec::new(),
            verbose: false,
            html_accept_headers: vec!["text/html".to_string(), "*/*".to_string()],
            disable_dot_rule: false,
        }
    }
}

/// Rewrites single-page-app navigation requests to the index page.
#[derive(Debug, Clone)]
pub struct HistoryFallback {
    index: String,
    whitelist: Vec<Regex>,
    rewrites: Vec<(Regex, String)>,
    verbose: bool,
    html_accept_headers: Vec<String>,
    disable_dot_rule: bool,
}

impl HistoryFallback {
    pub fn new(config: &HistoryFallbackConfig) -> Result<Self, Error> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                Error::Config(crate::config::ConfigError::Invalid(format!(
                    "invalid history fallback pattern '{}': {}",
                    pattern, e
                )))
            })
        };

        Ok(Self {
            index: config.index.clone(),
            whitelist: config
                .whitelist
                .iter()
                .map(|p| compile(p))
                .collect::<Result<_, _>>()?,
            rewrites: config
                .rewrites
                .iter()
                .map(|r| compile(&r.from).map(|from| (from, r.to.clone())))
                .collect::<Result<_, _>>()?,
            verbose: config.verbose,
            html_accept_headers: config.html_accept_headers.clone(),
            disable_dot_rule: config.disable_dot_rule,
        })
    }

    fn log(&self, message: &str, path: &str) {
        if self.verbose {
            info!(path = %path, "{}", message);
        } else {
            debug!(path = %path, "{}", message);
        }
    }

    /// Rewrite `req.path` if it is an HTML navigation request. Returns
    /// whether the path changed.
    pub fn rewrite(&self, req: &mut HttpRequest) -> bool {
        if req.method != "GET" && req.method != "HEAD" {
            self.log("Not rewriting: method is not GET or HEAD", &req.path);
            return false;
        }
        let Some(accept) = req.header("accept") else {
            self.log("Not rewriting: no Accept header", &req.path);
            return false;
        };
        if accept.starts_with("application/json") {
            self.log("Not rewriting: client prefers JSON", &req.path);
            return false;
        }
        if !self
            .html_accept_headers
            .iter()
            .any(|html| accept.contains(html.as_str()))
        {
            self.log("Not rewriting: client does not accept HTML", &req.path);
            return false;
        }
        if self.whitelist.iter().any(|w| w.is_match(&req.path)) {
            self.log("Not rewriting: path is whitelisted", &req.path);
            return false;
        }

        if let Some(target) = self
            .rewrites
            .iter()
            .find(|(from, _)| from.is_match(&req.path))
            .map(|(_, to)| to.clone())
        {
            self.log(&format!("Rewriting to {}", target), &req.path);
            req.set_path(target);
            return true;
        }

        let last_dot = req.path.rfind('.');
        let last_slash = req.path.rfind('/');
        if !self.disable_dot_rule && last_dot > last_slash {
            self.log("Not rewriting: path includes a dot", &req.path);
            return false;
        }

        self.log(&format!("Rewriting to {}", self.index), &req.path);
        req.set_path(self.index.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ResponseBody;
    use tokio::io::AsyncReadExt;

    fn navigation(path: &str) -> HttpRequest {
        HttpRequest::new("GET", path).with_header("Accept", "text/html,application/xhtml+xml")
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(mime_type(Path::new("a/site.CSS")), "text/css");
        assert_eq!(mime_type(Path::new("logo.svg")), "image/svg+xml");
        assert_eq!(mime_type(Path::new("photo.png")), "image/png");
        assert_eq!(mime_type(Path::new("blob")), "application/octet-stream");
    }

    #[test]
    fn test_history_rewrites_navigation() {
        let fallback = HistoryFallback::new(&HistoryFallbackConfig::default()).unwrap();
        let mut req = navigation("/users/7");
        assert!(fallback.rewrite(&mut req));
        assert_eq!(req.path, "/index.html");
    }

    #[test]
    fn test_history_skips_non_navigation() {
        let fallback = HistoryFallback::new(&HistoryFallbackConfig::default()).unwrap();

        let mut req = HttpRequest::new("GET", "/users/7");
        assert!(!fallback.rewrite(&mut req));

        let mut req = HttpRequest::new("GET", "/api").with_header("Accept", "application/json");
        assert!(!fallback.rewrite(&mut req));

        let mut req = navigation("/users/7");
        req.method = "POST".into();
        assert!(!fallback.rewrite(&mut req));

        let mut req = navigation("/app.js");
        assert!(!fallback.rewrite(&mut req));
        assert_eq!(req.path, "/app.js");
    }

    #[test]
    fn test_history_whitelist_rewrites_and_dot_rule() {
        let config = HistoryFallbackConfig {
            index: "/default.html".into(),
            whitelist: vec!["^/api".into()],
            rewrites: vec![Rewrite {
                from: "^/admin".into(),
                to: "/admin.html".into(),
            }],
            disable_dot_rule: true,
            ..Default::default()
        };
        let fallback = HistoryFallback::new(&config).unwrap();

        let mut req = navigation("/api/test");
        assert!(!fallback.rewrite(&mut req));

        let mut req = navigation("/admin/users");
        assert!(fallback.rewrite(&mut req));
        assert_eq!(req.path, "/admin.html");

        let mut req = navigation("/v1.2/page");
        assert!(fallback.rewrite(&mut req));
        assert_eq!(req.path, "/default.html");

        let mut req = navigation("/file.txt");
        assert!(fallback.rewrite(&mut req));
    }

    #[test]
    fn test_history_bad_pattern() {
        let config = HistoryFallbackConfig {
            whitelist: vec!["(".into()],
            ..Default::default()
        };
        assert!(HistoryFallback::new(&config).is_err());
    }

    fn temp_root(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("trellis-static-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(root.join("docs")).unwrap();
        std::fs::write(root.join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::write(root.join("docs/readme.txt"), "read me").unwrap();
        root
    }

    #[tokio::test]
    async fn test_serve_file_and_index() {
        let root = temp_root("serve");
        let files = StaticFiles::new(&root);

        let mut res = files
            .serve(&HttpRequest::new("GET", "/docs/readme.txt"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(res.header("content-type"), Some("text/plain"));
        let ResponseBody::Stream(ref mut reader) = res.body else {
            panic!("expected a streamed body");
        };
        let mut body = String::new();
        reader.read_to_string(&mut body).await.unwrap();
        assert_eq!(body, "read me");

        let res = files.serve(&HttpRequest::new("GET", "/")).await.unwrap().unwrap();
        assert_eq!(res.header("content-type"), Some("text/html"));

        let res = files.serve(&HttpRequest::new("HEAD", "/index.html")).await.unwrap().unwrap();
        assert_eq!(res.header("content-length"), Some("13"));
        assert!(matches!(res.body, ResponseBody::Empty));

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn test_serve_falls_through() {
        let root = temp_root("through");
        let files = StaticFiles::new(&root);

        assert!(files.serve(&HttpRequest::new("GET", "/missing.css")).await.unwrap().is_none());
        assert!(files.serve(&HttpRequest::new("POST", "/index.html")).await.unwrap().is_none());
        assert!(files.serve(&HttpRequest::new("GET", "/docs")).await.unwrap().is_none());

        let escape = files.serve(&HttpRequest::new("GET", "/../")).await;
        assert!(matches!(escape, Err(Error::Forbidden(_))));

        std::fs::remove_dir_all(&root).ok();
    }
}
