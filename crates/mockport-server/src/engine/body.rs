//! Response body for the mock listener.
//!
//! Bytes are handed to hyper in fixed-size chunks so the connection's write
//! buffer applies backpressure. A body built with
//! [`ResponseBody::with_delivery`] resolves its [`Delivered`] receiver once
//! the last chunk has been handed over. If it is dropped before that (client
//! gone, connection reset), the receiver sees the sender dropped instead.

use bytes::Bytes;
use hyper::body::{Body, Frame, SizeHint};
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Largest frame handed to hyper in one poll.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Resolves `Ok(())` once the whole body has been written out.
pub type Delivered = oneshot::Receiver<()>;

#[derive(Debug)]
pub struct ResponseBody {
    remaining: Bytes,
    delivered: Option<oneshot::Sender<()>>,
}

impl ResponseBody {
    pub fn new(bytes: Bytes) -> Self {
        Self {
            remaining: bytes,
            delivered: None,
        }
    }

    pub fn empty() -> Self {
        Self::new(Bytes::new())
    }

    pub fn with_delivery(bytes: Bytes) -> (Self, Delivered) {
        let (tx, rx) = oneshot::channel();
        let body = Self {
            remaining: bytes,
            delivered: Some(tx),
        };
        (body, rx)
    }

    /// For responses written without a payload (HEAD, 204, 304): hyper
    /// drops the body unread, so delivery is signalled up front.
    pub fn without_payload(bytes: Bytes) -> (Self, Delivered) {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(());
        (Self::new(bytes), rx)
    }

    fn mark_delivered(&mut self) {
        if let Some(tx) = self.delivered.take() {
            let _ = tx.send(());
        }
    }
}

impl Body for ResponseBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        if self.remaining.is_empty() {
            self.mark_delivered();
            return Poll::Ready(None);
        }
        let chunk = if self.remaining.len() > CHUNK_SIZE {
            self.remaining.split_to(CHUNK_SIZE)
        } else {
            std::mem::take(&mut self.remaining)
        };
        if self.remaining.is_empty() {
            self.mark_delivered();
        }
        Poll::Ready(Some(Ok(Frame::data(chunk))))
    }

    fn is_end_stream(&self) -> bool {
        self.remaining.is_empty()
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.remaining.len() as u64)
    }
}

impl Drop for ResponseBody {
    fn drop(&mut self) {
        // hyper drops empty bodies without polling them.
        if self.remaining.is_empty() {
            self.mark_delivered();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_large_body_is_chunked() {
        let mut body = ResponseBody::new(Bytes::from(vec![7u8; CHUNK_SIZE * 2 + 10]));
        assert_eq!(body.size_hint().exact(), Some((CHUNK_SIZE * 2 + 10) as u64));

        let mut sizes = Vec::new();
        while let Some(frame) = body.frame().await {
            sizes.push(frame.unwrap().into_data().unwrap().len());
        }
        assert_eq!(sizes, vec![CHUNK_SIZE, CHUNK_SIZE, 10]);
    }

    #[tokio::test]
    async fn test_delivery_fires_after_last_chunk() {
        let (mut body, mut delivered) =
            ResponseBody::with_delivery(Bytes::from(vec![1u8; CHUNK_SIZE + 1]));

        body.frame().await.unwrap().unwrap();
        assert!(delivered.try_recv().is_err());

        body.frame().await.unwrap().unwrap();
        assert_eq!(delivered.try_recv(), Ok(()));
        assert!(body.is_end_stream());
    }

    #[tokio::test]
    async fn test_dropped_before_end_is_not_delivered() {
        let (mut body, delivered) =
            ResponseBody::with_delivery(Bytes::from(vec![1u8; CHUNK_SIZE * 3]));
        body.frame().await.unwrap().unwrap();
        drop(body);
        assert!(delivered.await.is_err());
    }

    #[tokio::test]
    async fn test_without_payload_is_delivered_immediately() {
        let (body, delivered) = ResponseBody::without_payload(Bytes::from_static(b"unsent"));
        assert_eq!(body.size_hint().exact(), Some(6));
        drop(body);
        assert_eq!(delivered.await, Ok(()));
    }

    #[tokio::test]
    async fn test_empty_body_is_delivered_on_drop() {
        let (body, delivered) = ResponseBody::with_delivery(Bytes::new());
        drop(body);
        assert_eq!(delivered.await, Ok(()));
    }
}
