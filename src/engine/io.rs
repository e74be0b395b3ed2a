// src/engine/io.rs
//
// I/O operations: Source enum, file loading and data: URI decoding

use crate::error::BitmapError;
use base64::Engine as _;
use std::path::PathBuf;
use std::sync::Arc;

/// Image source - supports in-memory data, file paths (lazy loading) and
/// `data:` URIs.
#[derive(Clone, Debug)]
pub enum Source {
    /// In-memory image data
    Memory(Arc<Vec<u8>>),
    /// File path for lazy loading (data is read only when needed)
    Path(PathBuf),
    /// `data:<mime>;base64,<payload>` string
    DataUri(Arc<str>),
}

impl Source {
    /// Load the actual bytes from the source
    pub fn load(&self) -> std::result::Result<Arc<Vec<u8>>, BitmapError> {
        if self.is_empty() {
            return Err(BitmapError::no_source());
        }
        match self {
            Source::Memory(data) => Ok(data.clone()),
            Source::Path(path) => {
                let data = std::fs::read(path).map_err(|e| {
                    BitmapError::file_read_failed(path.to_string_lossy().to_string(), e)
                })?;
                Ok(Arc::new(data))
            }
            Source::DataUri(uri) => decode_data_uri(uri).map(Arc::new),
        }
    }

    /// True when there is nothing to load.
    pub fn is_empty(&self) -> bool {
        match self {
            Source::Memory(data) => data.is_empty(),
            Source::Path(path) => path.as_os_str().is_empty(),
            Source::DataUri(uri) => uri.trim().is_empty(),
        }
    }

    /// Get path if this is a Path source
    pub fn as_path(&self) -> Option<&PathBuf> {
        match self {
            Source::Path(p) => Some(p),
            Source::Memory(_) | Source::DataUri(_) => None,
        }
    }

    /// Get the bytes directly - only Memory sources have them without loading
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Source::Memory(data) => Some(data.as_slice()),
            Source::Path(_) | Source::DataUri(_) => None,
        }
    }

    /// MIME type the source declares about itself, used as the sniffing fallback.
    pub fn declared_mime(&self) -> Option<&str> {
        match self {
            Source::DataUri(uri) => data_uri_mime(uri),
            Source::Memory(_) | Source::Path(_) => None,
        }
    }

    /// Short human-readable identity for diagnostics and error messages.
    pub fn describe(&self) -> String {
        match self {
            Source::Memory(data) => format!("memory({} bytes)", data.len()),
            Source::Path(path) => format!("file:{}", path.display()),
            Source::DataUri(uri) => match data_uri_mime(uri) {
                Some(mime) => format!("data-uri({mime}, {} chars)", uri.len()),
                None => format!("data-uri({} chars)", uri.len()),
            },
        }
    }
}

impl From<Vec<u8>> for Source {
    fn from(data: Vec<u8>) -> Self {
        Source::Memory(Arc::new(data))
    }
}

impl From<&[u8]> for Source {
    fn from(data: &[u8]) -> Self {
        Source::Memory(Arc::new(data.to_vec()))
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

/// Split `data:<mime>[;params],<payload>` into its header and payload.
fn split_data_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.trim().strip_prefix("data:")?;
    rest.split_once(',')
}

fn data_uri_mime(uri: &str) -> Option<&str> {
    let (header, _) = split_data_uri(uri)?;
    let mime = header.split(';').next()?.trim();
    (!mime.is_empty()).then_some(mime)
}

/// Decode a base64 `data:` URI payload. Percent-encoded URIs are rejected.
pub(crate) fn decode_data_uri(uri: &str) -> std::result::Result<Vec<u8>, BitmapError> {
    let (header, payload) = split_data_uri(uri)
        .ok_or_else(|| BitmapError::decode_failed("malformed data URI: missing 'data:' header"))?;

    if !header.split(';').any(|param| param.trim() == "base64") {
        return Err(BitmapError::decode_failed(
            "only base64-encoded data URIs are supported",
        ));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| BitmapError::decode_failed(format!("invalid base64 payload: {e}")))?;

    if bytes.is_empty() {
        return Err(BitmapError::no_source());
    }
    Ok(bytes)
}
