use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Format declared for payloads that arrive without a data URI prefix.
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("image payload is empty")]
    Empty,
    #[error("malformed data URI: {0}")]
    MalformedDataUri(String),
    #[error("image payload is not valid base64")]
    InvalidBase64,
}

/// Self-describing image payload: a declared format plus base64 data.
///
/// `data` never carries a `data:` prefix; use [`EncodedImage::to_data_uri`]
/// to get the wrapped form back.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EncodedImageFields")]
pub struct EncodedImage {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct EncodedImageFields {
    #[serde(default)]
    mime_type: String,
    data: String,
}

impl TryFrom<EncodedImageFields> for EncodedImage {
    type Error = ImageError;

    fn try_from(fields: EncodedImageFields) -> Result<Self, Self::Error> {
        Self::new(fields.mime_type, fields.data)
    }
}

impl EncodedImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Result<Self, ImageError> {
        let data = data.into().trim().to_string();
        if data.is_empty() {
            return Err(ImageError::Empty);
        }
        let mime_type = mime_type.into().trim().to_ascii_lowercase();
        Ok(Self {
            mime_type: if mime_type.is_empty() {
                DEFAULT_MIME_TYPE.to_string()
            } else {
                mime_type
            },
            data,
        })
    }

    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Result<Self, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        Self::new(mime_type, BASE64.encode(bytes))
    }

    /// Accepts `data:<mime>;base64,<data>` or bare base64.
    pub fn parse(text: &str) -> Result<Self, ImageError> {
        let trimmed = text.trim();
        let Some(rest) = trimmed.strip_prefix("data:") else {
            return Self::new(DEFAULT_MIME_TYPE, trimmed);
        };
        let Some((header, data)) = rest.split_once(',') else {
            return Err(ImageError::MalformedDataUri(
                "missing ',' separator".to_string(),
            ));
        };
        let Some(mime_type) = header.strip_suffix(";base64") else {
            return Err(ImageError::MalformedDataUri(format!(
                "unsupported encoding in '{header}'"
            )));
        };
        if !mime_type.starts_with("image/") {
            return Err(ImageError::MalformedDataUri(format!(
                "'{mime_type}' is not an image type"
            )));
        }
        Self::new(mime_type, data)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64 data with any self-describing prefix stripped.
    pub fn raw_base64(&self) -> &str {
        &self.data
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn decode(&self) -> Result<Vec<u8>, ImageError> {
        BASE64
            .decode(self.data.as_bytes())
            .map_err(|_| ImageError::InvalidBase64)
    }

    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}

// Payloads can be megabytes of base64; keep debug output readable.
impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime_type", &self.mime_type)
            .field("data_len", &self.data.len())
            .finish()
    }
}
