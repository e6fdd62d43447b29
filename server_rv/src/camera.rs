//! JPEG frames for the `/video_feed` MJPEG stream

use axum::body::Bytes;
use futures::Stream;
use std::convert::Infallible;
use tokio::sync::watch;

/// Boundary between frames of the multipart response
pub const BOUNDARY: &str = "frame";

/// Latest frame from a camera, shared with every viewer
///
/// The capture side holds the matching [`watch::Sender`]. When it is dropped, the streams of
/// all viewers end.
#[derive(Clone)]
pub struct CameraFeed(watch::Receiver<Option<Bytes>>);

impl CameraFeed {
    pub fn channel() -> (watch::Sender<Option<Bytes>>, Self) {
        let (sender, receiver) = watch::channel(None);
        (sender, Self(receiver))
    }

    /// One multipart part per new frame, for as long as the camera produces them
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send {
        futures::stream::unfold(self.0, |mut frames| async move {
            loop {
                frames.changed().await.ok()?;
                let frame = frames.borrow_and_update().clone();
                if let Some(jpeg) = frame {
                    return Some((Ok(multipart_part(&jpeg)), frames));
                }
            }
        })
    }
}

fn multipart_part(jpeg: &[u8]) -> Bytes {
    let header = format!("--{BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n");
    let mut part = Vec::with_capacity(header.len() + jpeg.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    part.into()
}
