use std::fmt;

use bytes::Bytes;
use futures::stream::{self, Stream, TryStreamExt};

use crate::api::ByteStream;
use crate::error::{Error, Result};

/// A sized, optionally named, in-memory byte payload.
///
/// The name matters for uploads: backends that support it use the name to
/// address the uploaded entry (see the daemon adapter's directory wrapping).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub name: Option<String>,
    pub bytes: Bytes,
}

impl Blob {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            name: None,
            bytes: bytes.into(),
        }
    }

    pub fn named(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: Some(name.into()),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Any shape of bytes an upload accepts.
///
/// A `ByteSource` is consumed exactly once; it is never rewound or reused.
/// Chunk contents are never inspected or modified beyond text-to-bytes
/// encoding, and chunk order is preserved exactly.
pub enum ByteSource {
    Bytes(Bytes),
    Text(String),
    Blob(Blob),
    Stream(ByteStream),
}

impl ByteSource {
    /// Wraps a lazy chunk stream. This is the canonical representation all
    /// other shapes convert into.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + Unpin + 'static,
    {
        ByteSource::Stream(Box::new(stream))
    }

    /// Convenience for already-materialized chunk sequences.
    pub fn from_chunks(chunks: impl IntoIterator<Item = Bytes>) -> Self {
        let items: Vec<std::io::Result<Bytes>> = chunks.into_iter().map(Ok).collect();
        ByteSource::Stream(Box::new(stream::iter(items)))
    }

    /// The name this source carries, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            ByteSource::Blob(blob) => blob.name.as_deref(),
            _ => None,
        }
    }

    /// Converts to the canonical stream form for transports that accept a
    /// chunked body. Streams pass through untouched; text is encoded to
    /// bytes; buffers become single-chunk streams.
    pub fn into_stream(self) -> ByteStream {
        match self {
            ByteSource::Bytes(bytes) => single_chunk(bytes),
            ByteSource::Text(text) => single_chunk(Bytes::from(text)),
            ByteSource::Blob(blob) => single_chunk(blob.bytes),
            ByteSource::Stream(stream) => stream,
        }
    }

    /// Drains to a sized blob for transports that need a
    /// `Content-Length`-bearing body (multipart form fields).
    pub async fn into_blob(self) -> Result<Blob> {
        match self {
            ByteSource::Bytes(bytes) => Ok(Blob { name: None, bytes }),
            ByteSource::Text(text) => Ok(Blob {
                name: None,
                bytes: Bytes::from(text),
            }),
            ByteSource::Blob(blob) => Ok(blob),
            ByteSource::Stream(stream) => Ok(Blob {
                name: None,
                bytes: collect_bytes(stream).await?,
            }),
        }
    }
}

fn single_chunk(bytes: Bytes) -> ByteStream {
    Box::new(stream::iter([Ok::<_, std::io::Error>(bytes)]))
}

/// Drains a stream into one contiguous buffer, preserving chunk order.
///
/// Typed errors raised inside the stream (cancellation in particular) are
/// recovered from their `io::Error` wrapping.
pub async fn collect_bytes<S>(stream: S) -> Result<Bytes>
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin,
{
    let chunks: Vec<Bytes> = stream.try_collect().await.map_err(Error::from_io)?;
    Ok(Bytes::from(chunks.concat()))
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteSource::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            ByteSource::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            ByteSource::Blob(blob) => f.debug_tuple("Blob").field(blob).finish(),
            ByteSource::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Bytes> for ByteSource {
    fn from(bytes: Bytes) -> Self {
        ByteSource::Bytes(bytes)
    }
}

impl From<Vec<u8>> for ByteSource {
    fn from(bytes: Vec<u8>) -> Self {
        ByteSource::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for ByteSource {
    fn from(bytes: &'static [u8]) -> Self {
        ByteSource::Bytes(Bytes::from_static(bytes))
    }
}

impl From<String> for ByteSource {
    fn from(text: String) -> Self {
        ByteSource::Text(text)
    }
}

impl From<&str> for ByteSource {
    fn from(text: &str) -> Self {
        ByteSource::Text(text.to_owned())
    }
}

impl From<Blob> for ByteSource {
    fn from(blob: Blob) -> Self {
        ByteSource::Blob(blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &str = "Hello World";

    #[tokio::test]
    async fn test_into_blob_from_every_shape() {
        let shapes = [
            ByteSource::from(Bytes::from_static(DATA.as_bytes())),
            ByteSource::from(DATA),
            ByteSource::from(Blob::named("example.txt", DATA.as_bytes().to_vec())),
            ByteSource::from_chunks([Bytes::from_static(b"Hello "), Bytes::from_static(b"World")]),
        ];
        for source in shapes {
            let blob = source.into_blob().await.unwrap();
            assert_eq!(blob.bytes.as_ref(), DATA.as_bytes());
        }
    }

    #[tokio::test]
    async fn test_into_stream_preserves_chunk_order() {
        let source = ByteSource::from_chunks([
            Bytes::from_static(b"a"),
            Bytes::from_static(b"b"),
            Bytes::from_static(b"c"),
        ]);
        let bytes = collect_bytes(source.into_stream()).await.unwrap();
        assert_eq!(bytes.as_ref(), b"abc");
    }

    #[tokio::test]
    async fn test_text_is_encoded() {
        let bytes = collect_bytes(ByteSource::from("héllo").into_stream())
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), "héllo".as_bytes());
    }

    #[test]
    fn test_only_blobs_carry_a_name() {
        assert_eq!(
            ByteSource::from(Blob::named("a.txt", vec![1u8])).name(),
            Some("a.txt")
        );
        assert_eq!(ByteSource::from("text").name(), None);
        assert_eq!(ByteSource::from(vec![1u8, 2]).name(), None);
    }

    #[tokio::test]
    async fn test_blob_name_survives_into_blob() {
        let blob = ByteSource::from(Blob::named("a.txt", vec![1u8]))
            .into_blob()
            .await
            .unwrap();
        assert_eq!(blob.name.as_deref(), Some("a.txt"));
    }
}
