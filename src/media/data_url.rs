use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::TaskError;

const PNG_PREFIX: &str = "data:image/png;base64,";

/// A base64 `data:` URL split into its media type and payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DataUrl<'a> {
    pub mime_type: &'a str,
    pub data: &'a str,
}

/// Splits `data:<mime>;base64,<payload>`. Anything else, including
/// percent-encoded data URLs, returns `None`.
pub fn parse_data_url(url: &str) -> Option<DataUrl<'_>> {
    let rest = url.strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    let mime_type = header.strip_suffix(";base64")?;
    if mime_type.is_empty() {
        return None;
    }
    Some(DataUrl { mime_type, data })
}

pub fn encode_png_data_url(bytes: &[u8]) -> String {
    format!("{}{}", PNG_PREFIX, BASE64.encode(bytes))
}

pub fn decode_data_url(url: &str) -> Result<Vec<u8>, TaskError> {
    let parsed = parse_data_url(url)
        .ok_or_else(|| TaskError::Validation("not a base64 data URL".to_string()))?;
    BASE64
        .decode(parsed.data)
        .map_err(|e| TaskError::Validation(format!("invalid base64 payload: {}", e)))
}
