// Handler return values and their mapping to HTTP responses

use crate::http::ByteStream;
use crate::{Error, HttpResponse};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// What a handler hands back to the dispatcher.
///
/// | variant | response |
/// |---------|----------|
/// | `Empty` | nothing written |
/// | `Text`  | `200 text/plain` |
/// | `Json`  | `200 application/json` |
/// | `Typed` | own status and content type |
/// | `File`  | own status, `application/octet-stream`, attachment |
#[derive(Debug, Default)]
pub enum Reply {
    #[default]
    Empty,
    Text(String),
    Json(Value),
    Typed(TypedReply),
    File(FileReply),
}

impl Reply {
    pub fn json<T: Serialize>(value: &T) -> Result<Self, Error> {
        serde_json::to_value(value)
            .map(Reply::Json)
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// A `200` reply with an explicit content type.
    pub fn custom(content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Reply::Typed(TypedReply::new(content_type, body))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Reply::Empty)
    }

    /// Map to a response; `None` for [`Reply::Empty`].
    pub fn into_response(self) -> Result<Option<HttpResponse>, Error> {
        let response = match self {
            Reply::Empty => return Ok(None),
            Reply::Text(text) => HttpResponse::text(text),
            Reply::Json(value) => HttpResponse::json(&value)?,
            Reply::Typed(typed) => {
                let content_type = if typed.content_type.is_empty() {
                    "application/json".to_string()
                } else {
                    typed.content_type
                };
                HttpResponse::new(typed.status)
                    .with_header("Content-Type", content_type)
                    .with_body(typed.body)
            }
            Reply::File(file) => {
                let name = if file.name.is_empty() {
                    "unnamed".to_string()
                } else {
                    file.name
                };
                HttpResponse::new(file.status)
                    .with_header("Content-Type", "application/octet-stream")
                    .with_header(
                        "Content-Disposition",
                        format!("attachment; filename={}", name),
                    )
                    .with_stream(file.reader)
            }
        };
        Ok(Some(response))
    }
}

/// A reply with its own status code and content type. An empty content
/// type is sent as `application/json`.
#[derive(Debug, Clone)]
pub struct TypedReply {
    pub status: u16,
    pub content_type: String,
    pub body: Bytes,
}

impl TypedReply {
    pub fn new(content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

/// A streamed download.
pub struct FileReply {
    pub name: String,
    pub status: u16,
    pub reader: ByteStream,
}

impl FileReply {
    pub fn new(name: impl Into<String>, reader: impl tokio::io::AsyncRead + Send + 'static) -> Self {
        Self {
            name: name.into(),
            status: 200,
            reader: Box::pin(reader),
        }
    }

    /// Open a file for download, named after its last path component.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, file))
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

impl fmt::Debug for FileReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileReply")
            .field("name", &self.name)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Empty
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::Text(text)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Reply::Text(text.to_string())
    }
}

macro_rules! reply_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Reply {
                fn from(n: $t) -> Self {
                    Reply::Text(n.to_string())
                }
            }
        )*
    };
}

reply_from_integer!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl From<f64> for Reply {
    fn from(n: f64) -> Self {
        if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
            Reply::Text(format!("{}", n as i64))
        } else {
            Reply::Text(n.to_string())
        }
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Json(value)
    }
}

impl From<TypedReply> for Reply {
    fn from(typed: TypedReply) -> Self {
        Reply::Typed(typed)
    }
}

impl From<FileReply> for Reply {
    fn from(file: FileReply) -> Self {
        Reply::File(file)
    }
}

impl<T: Into<Reply>> From<Option<T>> for Reply {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}
