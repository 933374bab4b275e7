//! Turning a collection's source locator into a readable byte stream.
//!
//! Locators are absolute or relative paths, `file:` URLs, or `http(s)` URLs.
//! Network bodies are streamed through the owning runtime and exposed as a
//! blocking [`Read`], so importers never see the difference.

use std::{
    fmt,
    io::{self, Read},
    path::{Path, PathBuf},
};

use camino::Utf8Path;
use futures_util::TryStreamExt;
use reqwest::{Client, Response, header::CONTENT_TYPE};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio_util::io::{StreamReader, SyncIoBridge};
use url::Url;

use crate::ImportConfig;

/// Errors raised while opening a source locator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResolveError {
    /// A local file could not be opened.
    #[error("failed to open {locator}: {source}")]
    Io {
        /// Locator that was opened.
        locator: String,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The locator looked like a URL but did not parse.
    #[error("invalid URL {locator}: {source}")]
    InvalidUrl {
        /// Locator that failed to parse.
        locator: String,
        /// Parser error.
        source: url::ParseError,
    },
    /// The URL scheme is not supported.
    #[error("unsupported scheme {scheme:?} in {locator}")]
    UnsupportedScheme {
        /// Locator carrying the scheme.
        locator: String,
        /// Offending scheme.
        scheme: String,
    },
    /// The server answered with an error status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Short error description.
        message: String,
    },
    /// The request failed before a response arrived.
    #[error("network error contacting {url}: {source}")]
    Network {
        /// Requested URL.
        url: String,
        /// Transport error.
        source: io::Error,
    },
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// An opened source.
pub struct Resource {
    /// Body of the source.
    pub reader: Box<dyn Read + Send>,
    /// Declared MIME type without parameters, lower-cased.
    pub mime_type: Option<String>,
    /// Locator the body was read from, used for extension inference and for
    /// resolving relative links.
    pub name: String,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("mime_type", &self.mime_type)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Resource {
    /// Wrap an in-memory or otherwise pre-opened reader.
    pub fn new(reader: impl Read + Send + 'static, name: impl Into<String>) -> Self {
        Self {
            reader: Box::new(reader),
            mime_type: None,
            name: name.into(),
        }
    }

    /// Attach a declared MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = normalise_mime(mime_type);
        self
    }
}

/// Opens source locators.
///
/// Implementations are shared between the caller and the parser thread.
pub trait ResourceResolver: Send + Sync {
    /// Open `locator` for reading.
    fn open(&self, locator: &str) -> Result<Resource, ResolveError>;
}

/// Resolver for local files and HTTP(S) URLs.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    client: Client,
    handle: Handle,
}

impl SourceResolver {
    /// Build a resolver whose network I/O runs on `handle`.
    ///
    /// Reads from network resources block the calling thread, so they must
    /// not happen on one of the runtime's async workers.
    pub fn new(config: &ImportConfig, handle: Handle) -> Result<Self, ResolveError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.http_timeout)
            .read_timeout(config.http_timeout)
            .build()
            .map_err(ResolveError::Client)?;
        Ok(Self { client, handle })
    }

    fn open_file(locator: &str, path: &Path) -> Result<Resource, ResolveError> {
        let io_error = |source| ResolveError::Io {
            locator: locator.to_owned(),
            source,
        };
        let utf8 = Utf8Path::from_path(path).ok_or_else(|| {
            io_error(io::Error::new(
                io::ErrorKind::InvalidInput,
                "path is not valid UTF-8",
            ))
        })?;
        let file = placemark_fs::open_file(utf8).map_err(io_error)?;
        Ok(Resource::new(file, utf8.as_str()))
    }

    fn open_url(&self, url: &Url) -> Result<Resource, ResolveError> {
        let response = self
            .handle
            .block_on(self.client.get(url.as_str()).send())
            .and_then(Response::error_for_status)
            .map_err(|err| convert_reqwest_error(&err, url.as_str()))?;
        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(normalise_mime);
        let name = response.url().to_string();
        let stream = response.bytes_stream().map_err(io::Error::other);
        let reader = SyncIoBridge::new_with_handle(StreamReader::new(stream), self.handle.clone());
        log::debug!("opened {name} ({})", mime_type.as_deref().unwrap_or("no MIME type"));
        Ok(Resource {
            reader: Box::new(reader),
            mime_type,
            name,
        })
    }
}

impl ResourceResolver for SourceResolver {
    fn open(&self, locator: &str) -> Result<Resource, ResolveError> {
        let locator = locator.trim();
        match Locator::parse(locator)? {
            Locator::Path(path) => Self::open_file(locator, &path),
            Locator::Url(url) => self.open_url(&url),
        }
    }
}

enum Locator {
    Path(PathBuf),
    Url(Url),
}

impl Locator {
    fn parse(locator: &str) -> Result<Self, ResolveError> {
        if !has_scheme(locator) {
            return Ok(Self::Path(PathBuf::from(locator)));
        }
        let url = Url::parse(locator).map_err(|source| ResolveError::InvalidUrl {
            locator: locator.to_owned(),
            source,
        })?;
        match url.scheme() {
            "http" | "https" => Ok(Self::Url(url)),
            "file" => url
                .to_file_path()
                .map(Self::Path)
                .map_err(|()| ResolveError::UnsupportedScheme {
                    locator: locator.to_owned(),
                    scheme: "file".to_owned(),
                }),
            other => Err(ResolveError::UnsupportedScheme {
                locator: locator.to_owned(),
                scheme: other.to_owned(),
            }),
        }
    }
}

/// Report whether `locator` starts with a URL scheme rather than a path.
///
/// Single-letter schemes are treated as Windows drive letters.
fn has_scheme(locator: &str) -> bool {
    locator.split_once(':').is_some_and(|(scheme, _)| {
        scheme.len() > 1
            && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// Resolve `href` against the locator of the document that contains it.
///
/// Absolute URLs and absolute paths are returned unchanged.
#[must_use]
pub fn join_locator(base: &str, href: &str) -> String {
    let href = href.trim();
    if has_scheme(href) {
        return href.to_owned();
    }
    if has_scheme(base)
        && let Ok(joined) = Url::parse(base).and_then(|url| url.join(href))
    {
        return joined.to_string();
    }
    let path = Path::new(href);
    if path.is_absolute() {
        return href.to_owned();
    }
    Path::new(base)
        .parent()
        .map_or_else(|| path.to_path_buf(), |parent| parent.join(path))
        .to_string_lossy()
        .into_owned()
}

fn normalise_mime(raw: &str) -> Option<String> {
    let essence = raw.split(';').next().unwrap_or_default().trim();
    (!essence.is_empty()).then(|| essence.to_ascii_lowercase())
}

fn convert_reqwest_error(error: &reqwest::Error, url: &str) -> ResolveError {
    if let Some(status) = error.status() {
        return ResolveError::Http {
            url: url.to_owned(),
            status: status.as_u16(),
            message: error.to_string(),
        };
    }
    let kind = if error.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::Other
    };
    ResolveError::Network {
        url: url.to_owned(),
        source: io::Error::new(kind, error.to_string()),
    }
}
