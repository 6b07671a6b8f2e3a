//! Raw-stream bodies.
//!
//! A stream body carries one binary payload and nothing else. The codec
//! writes it as base64 text inside a single [`STREAM_ELEMENT`], chunk by
//! chunk so large payloads never need one big encode buffer.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;

use crate::config::DEFAULT_STREAM_CHUNK_SIZE;
use crate::error::Result;
use crate::message::BoxFuture;
use crate::xml::{BodyReader, XmlWriter};

/// Element holding a stream body.
pub const STREAM_ELEMENT: &str = "Binary";

/// Serializes raw-stream bodies.
pub trait StreamCodec: Send + Sync + fmt::Debug {
    fn serialize(&self, writer: &mut XmlWriter, data: &Bytes) -> Result<()>;

    /// Must write the same bytes as [`serialize`](Self::serialize).
    fn serialize_async<'a>(
        &'a self,
        writer: &'a mut XmlWriter,
        data: &'a Bytes,
    ) -> BoxFuture<'a, Result<()>>;

    fn deserialize(&self, reader: &mut BodyReader) -> Result<Bytes>;
}

/// Base64 stream codec.
#[derive(Debug, Clone, Copy)]
pub struct Base64StreamCodec {
    chunk_size: usize,
}

impl Base64StreamCodec {
    /// `chunk_size` is rounded down to a multiple of 3 (minimum 3) so the
    /// chunked output equals a one-shot encoding.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: (chunk_size - chunk_size % 3).max(3),
        }
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Default for Base64StreamCodec {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM_CHUNK_SIZE)
    }
}

impl StreamCodec for Base64StreamCodec {
    fn serialize(&self, writer: &mut XmlWriter, data: &Bytes) -> Result<()> {
        writer.start_element(STREAM_ELEMENT, "")?;
        for chunk in data.chunks(self.chunk_size) {
            writer.text(&STANDARD.encode(chunk))?;
        }
        writer.end_element()
    }

    fn serialize_async<'a>(
        &'a self,
        writer: &'a mut XmlWriter,
        data: &'a Bytes,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            writer.start_element(STREAM_ELEMENT, "")?;
            for chunk in data.chunks(self.chunk_size) {
                writer.text(&STANDARD.encode(chunk))?;
                tokio::task::yield_now().await;
            }
            writer.end_element()
        })
    }

    fn deserialize(&self, reader: &mut BodyReader) -> Result<Bytes> {
        if reader.is_empty() {
            return Ok(Bytes::new());
        }
        let element = reader.read_expected(STREAM_ELEMENT, "")?;
        let decoded = STANDARD.decode(element.text().trim())?;
        Ok(Bytes::from(decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> Bytes {
        Bytes::from((0..=255u8).cycle().take(1000).collect::<Vec<u8>>())
    }

    #[test]
    fn test_chunk_size_rounding() {
        assert_eq!(Base64StreamCodec::new(10).chunk_size(), 9);
        assert_eq!(Base64StreamCodec::new(0).chunk_size(), 3);
        assert_eq!(Base64StreamCodec::default().chunk_size(), DEFAULT_STREAM_CHUNK_SIZE);
    }

    #[test]
    fn test_chunked_equals_one_shot() {
        let data = payload();
        let mut w = XmlWriter::new();
        Base64StreamCodec::new(7).serialize(&mut w, &data).unwrap();

        let expected = format!("<Binary>{}</Binary>", STANDARD.encode(&data));
        assert_eq!(w.as_bytes(), expected.as_bytes());
    }

    #[test]
    fn test_serialize_then_deserialize() {
        let codec = Base64StreamCodec::new(30);
        let data = payload();
        let mut w = XmlWriter::new();
        codec.serialize(&mut w, &data).unwrap();

        let mut reader = BodyReader::from_bytes(w.as_bytes()).unwrap();
        assert_eq!(codec.deserialize(&mut reader).unwrap(), data);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_deserialize_wrong_element() {
        let mut reader = BodyReader::from_bytes(b"<Other/>").unwrap();
        let err = Base64StreamCodec::default().deserialize(&mut reader).unwrap_err();
        assert!(err.is_decode_failure());
    }

    #[test]
    fn test_deserialize_empty_body() {
        let mut reader = BodyReader::from_elements(Vec::new());
        let data = Base64StreamCodec::default().deserialize(&mut reader).unwrap();
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn test_async_output_is_identical() {
        let codec = Base64StreamCodec::new(12);
        let data = payload();

        let mut sync = XmlWriter::new();
        codec.serialize(&mut sync, &data).unwrap();
        let mut async_w = XmlWriter::new();
        codec.serialize_async(&mut async_w, &data).await.unwrap();

        assert_eq!(sync.as_bytes(), async_w.as_bytes());
    }
}
