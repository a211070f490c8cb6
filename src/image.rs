use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::path::Path;

use crate::error::ChatError;

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Every upload is labelled as JPEG, whatever its declared extension.
const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

pub fn encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub fn data_uri(bytes: &[u8]) -> String {
    format!("{}{}", DATA_URI_PREFIX, encode(bytes))
}

/// An uploaded image whose extension has been checked against [`ALLOWED_EXTENSIONS`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageUpload {
    filename: String,
    bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ChatError> {
        let filename = filename.into();
        let extension = Path::new(&filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .ok_or_else(|| ChatError::UnsupportedImage(format!("'{}' has no extension", filename)))?;

        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(
                ChatError::UnsupportedImage(
                    format!("'{}' is not one of {}", filename, ALLOWED_EXTENSIONS.join(", "))
                )
            );
        }
        if bytes.is_empty() {
            return Err(ChatError::UnsupportedImage(format!("'{}' is empty", filename)));
        }

        Ok(Self { filename, bytes })
    }

    /// Builds an upload from the base64 text a browser client sends.
    pub fn from_base64(filename: impl Into<String>, data: &str) -> Result<Self, ChatError> {
        let filename = filename.into();
        let bytes = BASE64
            .decode(data.trim())
            .map_err(|e| ChatError::UnsupportedImage(format!("'{}' is not valid base64: {}", filename, e)))?;
        Self::new(filename, bytes)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Decoded size in bytes. Never zero.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn data_uri(&self) -> String {
        data_uri(&self.bytes)
    }
}
