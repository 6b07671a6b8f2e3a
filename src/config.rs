//! Formatter configuration.
//!
//! Options can be set through [`FormatterBuilder`](crate::FormatterBuilder)
//! setters or loaded from JSON:
//!
//! ```
//! use opwire::FormatterConfig;
//!
//! let config = FormatterConfig::from_json(r#"{ "is_rpc": true }"#).unwrap();
//! assert!(config.is_rpc);
//! assert!(!config.is_encoded);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default upper bound for a buffered message body (64 KB).
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 64 * 1024;

/// Default stream chunk size in bytes. Always a multiple of 3 so chunked
/// base64 output equals the one-shot encoding.
pub const DEFAULT_STREAM_CHUNK_SIZE: usize = 12 * 1024;

/// Configuration for one operation formatter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    /// Wrap body parts in an RPC wrapper element.
    pub is_rpc: bool,
    /// Use SOAP encoding (`xsi:type` annotations). Requires `is_rpc`.
    pub is_encoded: bool,
    /// Maximum body size when a raw-stream message is buffered.
    pub max_buffer_size: usize,
    /// Bytes base64-encoded per chunk by the stream codec.
    pub stream_chunk_size: usize,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            is_rpc: false,
            is_encoded: false,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            stream_chunk_size: DEFAULT_STREAM_CHUNK_SIZE,
        }
    }
}

impl FormatterConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Stream chunk size rounded down to a multiple of 3 (minimum 3).
    pub fn effective_chunk_size(&self) -> usize {
        let rounded = self.stream_chunk_size - self.stream_chunk_size % 3;
        rounded.max(3)
    }
}
