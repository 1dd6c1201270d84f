// Route templates and path matching

use crate::ConfigurationError;
use std::collections::HashMap;

/// Values captured from `:name` segments, percent-decoded.
pub type PathParams = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled route template such as `/users/:id/posts`.
///
/// Matching is exact: same number of segments, literal segments equal,
/// parameter segments non-empty. A trailing slash is a different path.
///
/// ```
/// use trellis_core::PathPattern;
///
/// let pattern = PathPattern::compile("/item/:id").unwrap();
/// assert_eq!(pattern.matches("/item/42").unwrap()["id"], "42");
/// assert!(pattern.matches("/item").is_none());
/// assert!(pattern.matches("/item/42/x").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    template: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn compile(template: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidRoute {
            route: template.to_string(),
            reason: reason.to_string(),
        };

        let rest = template
            .strip_prefix('/')
            .ok_or_else(|| invalid("path must start with '/'"))?;

        let mut segments = Vec::new();
        if !rest.is_empty() {
            for part in rest.split('/') {
                match part.strip_prefix(':') {
                    Some("") => return Err(invalid("empty parameter name")),
                    Some(name) => {
                        if segments.contains(&Segment::Param(name.to_string())) {
                            return Err(invalid(&format!("duplicate parameter ':{}'", name)));
                        }
                        segments.push(Segment::Param(name.to_string()));
                    }
                    None => segments.push(Segment::Literal(part.to_string())),
                }
            }
        }

        Ok(Self {
            template: template.to_string(),
            segments,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Names of the parameters in template order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Match a request path (without query string).
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let rest = path.strip_prefix('/')?;
        let parts: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('/').collect()
        };

        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    let value = urlencoding::decode(part)
                        .map(|decoded| decoded.into_owned())
                        .unwrap_or_else(|_| part.to_string());
                    params.insert(name.clone(), value);
                }
            }
        }

        Some(params)
    }
}

/// Join path fragments, collapsing duplicate slashes. The empty join is `/`.
pub fn join_paths(parts: &[&str]) -> String {
    let mut joined = String::new();
    for segment in parts
        .iter()
        .flat_map(|part| part.split('/'))
        .filter(|s| !s.is_empty())
    {
        joined.push('/');
        joined.push_str(segment);
    }
    if joined.is_empty() {
        joined.push('/');
    }
    joined
}
