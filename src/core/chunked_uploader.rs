//! Chunked transfer of raw video bytes
//!
//! Destinations that take raw bytes track progress by contiguous byte
//! ranges, so chunks are always sent one at a time in ascending offset order.
//! The first chunk that is not acknowledged aborts the whole sequence.

use crate::core::error::PublishError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE};
use std::sync::Arc;

/// Default chunk size (5 MiB)
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// One offset-addressed slice of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position in the sequence
    pub index: usize,
    /// Offset of the first byte
    pub start: u64,
    /// Number of bytes in this chunk
    pub len: u64,
    /// Size of the whole payload
    pub total: u64,
}

impl Chunk {
    /// Offset of the last byte (inclusive)
    ///
    /// An empty chunk reports its start offset.
    pub fn end(&self) -> u64 {
        if self.len == 0 {
            self.start
        } else {
            self.start + self.len - 1
        }
    }

    /// `Content-Range` header value for this chunk
    pub fn content_range(&self) -> String {
        if self.len == 0 {
            format!("bytes */{}", self.total)
        } else {
            format!("bytes {}-{}/{}", self.start, self.end(), self.total)
        }
    }
}

/// Split of a payload into fixed-size chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total: u64,
    chunk_size: u64,
}

impl ChunkPlan {
    /// Plan the chunks for a payload
    ///
    /// Returns `None` when `chunk_size` is zero.
    pub fn new(total: u64, chunk_size: u64) -> Option<Self> {
        if chunk_size == 0 {
            return None;
        }
        Some(Self { total, chunk_size })
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Chunk size as announced to the destination
    ///
    /// A payload smaller than one chunk is announced as a single chunk of
    /// its own size.
    pub fn declared_chunk_size(&self) -> u64 {
        self.chunk_size.min(self.total)
    }

    /// `ceil(total / chunk_size)`, with an empty payload counting as one chunk
    pub fn chunk_count(&self) -> usize {
        if self.total == 0 {
            1
        } else {
            self.total.div_ceil(self.chunk_size) as usize
        }
    }

    /// Chunks in ascending offset order
    pub fn chunks(&self) -> impl Iterator<Item = Chunk> + '_ {
        (0..self.chunk_count()).map(move |index| {
            let start = index as u64 * self.chunk_size;
            let len = self.chunk_size.min(self.total - start);
            Chunk {
                index,
                start,
                len,
                total: self.total,
            }
        })
    }
}

/// Transport for a single chunk
///
/// Returns the HTTP status of the response, or a message when no response
/// was received.
#[async_trait]
pub trait ChunkSink: Send + Sync {
    async fn send_chunk(&self, url: &str, chunk: &Chunk, body: Bytes) -> Result<u16, String>;
}

#[async_trait]
impl<T: ChunkSink + ?Sized> ChunkSink for Arc<T> {
    async fn send_chunk(&self, url: &str, chunk: &Chunk, body: Bytes) -> Result<u16, String> {
        (**self).send_chunk(url, chunk, body).await
    }
}

/// Sends chunks as `PUT` requests with a `Content-Range` header
#[derive(Debug, Clone)]
pub struct HttpChunkSink {
    client: reqwest::Client,
    content_type: String,
}

impl HttpChunkSink {
    pub fn new(client: reqwest::Client, content_type: impl Into<String>) -> Self {
        Self {
            client,
            content_type: content_type.into(),
        }
    }
}

#[async_trait]
impl ChunkSink for HttpChunkSink {
    async fn send_chunk(&self, url: &str, chunk: &Chunk, body: Bytes) -> Result<u16, String> {
        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, &self.content_type)
            .header(CONTENT_RANGE, chunk.content_range())
            .body(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        Ok(response.status().as_u16())
    }
}

/// Delivers a payload as an ordered sequence of chunks
///
/// Every chunk must be answered with 201 unless the uploader is told to
/// accept 206 for intermediate chunks.
pub struct ChunkedUploader<S> {
    platform: String,
    sink: S,
    chunk_size: u64,
    accept_partial_content: bool,
}

impl<S: ChunkSink> ChunkedUploader<S> {
    /// Create an uploader for one platform
    ///
    /// Fails with a configuration error when `chunk_size` is zero.
    pub fn new(platform: impl Into<String>, sink: S, chunk_size: u64) -> Result<Self, PublishError> {
        let platform = platform.into();
        if chunk_size == 0 {
            return Err(PublishError::ConfigError(format!(
                "{}: chunk size must be greater than zero",
                platform
            )));
        }

        Ok(Self {
            platform,
            sink,
            chunk_size,
            accept_partial_content: false,
        })
    }

    /// Also acknowledge intermediate chunks answered with 206 Partial Content
    pub fn with_partial_content(mut self, accept: bool) -> Self {
        self.accept_partial_content = accept;
        self
    }

    /// Plan the chunks for a payload of the given size
    pub fn plan(&self, total: u64) -> ChunkPlan {
        ChunkPlan {
            total,
            chunk_size: self.chunk_size,
        }
    }

    /// Upload the payload to `url`, returning the number of chunks sent
    pub async fn upload(&self, url: &str, payload: &Bytes) -> Result<usize, PublishError> {
        let plan = self.plan(payload.len() as u64);
        let count = plan.chunk_count();

        for chunk in plan.chunks() {
            let body = payload.slice(chunk.start as usize..(chunk.start + chunk.len) as usize);
            let is_last = chunk.index + 1 == count;

            tracing::debug!(
                platform = %self.platform,
                chunk_index = chunk.index,
                chunk_count = count,
                range = %chunk.content_range(),
                "Sending chunk"
            );

            match self.sink.send_chunk(url, &chunk, body).await {
                Ok(status) if self.acknowledges(status, is_last) => {}
                Ok(status) => {
                    tracing::error!(
                        platform = %self.platform,
                        chunk_index = chunk.index,
                        status,
                        "Chunk rejected, aborting transfer"
                    );
                    return Err(PublishError::TransferError {
                        platform: self.platform.clone(),
                        chunk_index: chunk.index,
                        status: Some(status),
                        message: format!("HTTP {}", status),
                    });
                }
                Err(message) => {
                    tracing::error!(
                        platform = %self.platform,
                        chunk_index = chunk.index,
                        error = %message,
                        "Chunk transport failed, aborting transfer"
                    );
                    return Err(PublishError::TransferError {
                        platform: self.platform.clone(),
                        chunk_index: chunk.index,
                        status: None,
                        message,
                    });
                }
            }
        }

        Ok(count)
    }

    fn acknowledges(&self, status: u16, is_last: bool) -> bool {
        status == 201 || (self.accept_partial_content && !is_last && status == 206)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every chunk and answers with scripted statuses
    struct RecordingSink {
        sent: Mutex<Vec<(Chunk, usize)>>,
        fail_at: Option<(usize, Result<u16, String>)>,
        ok_status: u16,
    }

    impl RecordingSink {
        fn accepting() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_at: None,
                ok_status: 201,
            }
        }

        fn failing_at(index: usize, response: Result<u16, String>) -> Self {
            Self {
                fail_at: Some((index, response)),
                ..Self::accepting()
            }
        }

        fn sent(&self) -> Vec<(Chunk, usize)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChunkSink for RecordingSink {
        async fn send_chunk(&self, _url: &str, chunk: &Chunk, body: Bytes) -> Result<u16, String> {
            self.sent.lock().unwrap().push((*chunk, body.len()));
            match &self.fail_at {
                Some((index, response)) if *index == chunk.index => response.clone(),
                _ => Ok(self.ok_status),
            }
        }
    }

    #[test]
    fn test_chunk_count() {
        assert_eq!(ChunkPlan::new(10, 5).unwrap().chunk_count(), 2);
        assert_eq!(ChunkPlan::new(11, 5).unwrap().chunk_count(), 3);
        assert_eq!(ChunkPlan::new(4, 5).unwrap().chunk_count(), 1);
        assert_eq!(ChunkPlan::new(0, 5).unwrap().chunk_count(), 1);
        assert!(ChunkPlan::new(10, 0).is_none());
    }

    #[test]
    fn test_empty_payload_is_one_empty_chunk() {
        let plan = ChunkPlan::new(0, DEFAULT_CHUNK_SIZE).unwrap();
        let chunks: Vec<Chunk> = plan.chunks().collect();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len, 0);
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[0].content_range(), "bytes */0");
        assert_eq!(plan.declared_chunk_size(), 0);
    }

    #[test]
    fn test_last_chunk_holds_remainder() {
        let chunks: Vec<Chunk> = ChunkPlan::new(11, 5).unwrap().chunks().collect();

        assert_eq!(chunks[2].start, 10);
        assert_eq!(chunks[2].len, 1);
        assert_eq!(chunks[2].content_range(), "bytes 10-10/11");
    }

    #[test]
    fn test_declared_chunk_size_for_small_payload() {
        let plan = ChunkPlan::new(1000, DEFAULT_CHUNK_SIZE).unwrap();
        assert_eq!(plan.declared_chunk_size(), 1000);
    }

    #[tokio::test]
    async fn test_ten_mib_payload_sends_two_ranges() {
        let sink = Arc::new(RecordingSink::accepting());
        let uploader = ChunkedUploader::new("tiktok", sink.clone(), DEFAULT_CHUNK_SIZE).unwrap();
        let payload = Bytes::from(vec![7u8; 10 * 1024 * 1024]);

        let sent_count = uploader.upload("http://upload", &payload).await.unwrap();

        assert_eq!(sent_count, 2);
        let sent = sink.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(
            (sent[0].0.start, sent[0].0.end(), sent[0].0.total),
            (0, 5_242_879, 10_485_760)
        );
        assert_eq!(
            (sent[1].0.start, sent[1].0.end(), sent[1].0.total),
            (5_242_880, 10_485_759, 10_485_760)
        );
        assert_eq!(sent[0].1, 5_242_880);
        assert_eq!(sent[1].1, 5_242_880);
        assert_eq!(sent[0].0.content_range(), "bytes 0-5242879/10485760");
    }

    #[tokio::test]
    async fn test_failed_first_chunk_aborts_sequence() {
        let sink = Arc::new(RecordingSink::failing_at(0, Ok(500)));
        let uploader = ChunkedUploader::new("tiktok", sink.clone(), DEFAULT_CHUNK_SIZE).unwrap();
        let payload = Bytes::from(vec![0u8; 10 * 1024 * 1024]);

        let error = uploader.upload("http://upload", &payload).await.unwrap_err();

        assert_eq!(sink.sent().len(), 1);
        assert_eq!(
            error,
            PublishError::TransferError {
                platform: "tiktok".to_string(),
                chunk_index: 0,
                status: Some(500),
                message: "HTTP 500".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_transport_error_has_no_status() {
        let sink = Arc::new(RecordingSink::failing_at(1, Err("connection reset".to_string())));
        let uploader = ChunkedUploader::new("tiktok", sink.clone(), 4).unwrap();
        let payload = Bytes::from_static(b"0123456789");

        let error = uploader.upload("http://upload", &payload).await.unwrap_err();

        assert_eq!(sink.sent().len(), 2);
        match error {
            PublishError::TransferError {
                chunk_index,
                status,
                message,
                ..
            } => {
                assert_eq!(chunk_index, 1);
                assert_eq!(status, None);
                assert_eq!(message, "connection reset");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_chunks_are_sent_in_ascending_order() {
        let sink = Arc::new(RecordingSink::accepting());
        let uploader = ChunkedUploader::new("tiktok", sink.clone(), 3).unwrap();
        let payload = Bytes::from_static(b"abcdefghij");

        uploader.upload("http://upload", &payload).await.unwrap();

        let starts: Vec<u64> = sink.sent().iter().map(|(c, _)| c.start).collect();
        assert_eq!(starts, vec![0, 3, 6, 9]);
    }

    #[tokio::test]
    async fn test_empty_payload_upload() {
        let sink = Arc::new(RecordingSink::accepting());
        let uploader = ChunkedUploader::new("tiktok", sink.clone(), DEFAULT_CHUNK_SIZE).unwrap();

        let sent_count = uploader.upload("http://upload", &Bytes::new()).await.unwrap();

        assert_eq!(sent_count, 1);
        assert_eq!(sink.sent()[0].1, 0);
    }

    #[tokio::test]
    async fn test_partial_content_aborts_by_default() {
        let sink = Arc::new(RecordingSink {
            ok_status: 206,
            ..RecordingSink::accepting()
        });
        let uploader = ChunkedUploader::new("tiktok", sink.clone(), 5).unwrap();
        let payload = Bytes::from_static(b"0123456789");

        let error = uploader.upload("http://upload", &payload).await.unwrap_err();

        assert_eq!(sink.sent().len(), 1);
        assert!(matches!(
            error,
            PublishError::TransferError {
                chunk_index: 0,
                status: Some(206),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_partial_content_only_acknowledges_intermediate_chunks() {
        let sink = Arc::new(RecordingSink {
            ok_status: 206,
            ..RecordingSink::accepting()
        });
        let uploader = ChunkedUploader::new("tiktok", sink.clone(), 5)
            .unwrap()
            .with_partial_content(true);
        let payload = Bytes::from_static(b"0123456789");

        let error = uploader.upload("http://upload", &payload).await.unwrap_err();

        assert_eq!(sink.sent().len(), 2);
        assert!(matches!(
            error,
            PublishError::TransferError {
                chunk_index: 1,
                status: Some(206),
                ..
            }
        ));
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let result = ChunkedUploader::new("tiktok", RecordingSink::accepting(), 0);
        assert!(matches!(result, Err(PublishError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_http_chunk_sink_sets_content_range() {
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/upload"))
            .and(header("Content-Range", "bytes 0-3/10"))
            .and(header("Content-Type", "video/mp4"))
            .respond_with(ResponseTemplate::new(206))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/upload"))
            .and(header("Content-Range", "bytes 4-7/10"))
            .respond_with(ResponseTemplate::new(206))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/upload"))
            .and(header("Content-Range", "bytes 8-9/10"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&mock_server)
            .await;

        let sink = HttpChunkSink::new(reqwest::Client::new(), "video/mp4");
        let uploader = ChunkedUploader::new("tiktok", sink, 4)
            .unwrap()
            .with_partial_content(true);
        let url = format!("{}/upload", mock_server.uri());

        let sent_count = uploader
            .upload(&url, &Bytes::from_static(b"0123456789"))
            .await
            .unwrap();

        assert_eq!(sent_count, 3);
    }
}
