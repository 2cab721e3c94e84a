//! Range adapter for live streams
//!
//! Chunked cache entries slice ranges directly in the cache layer; a
//! direct upstream stream has no random access, so the adapter reads and
//! discards until the window starts and stops pulling once it ends.

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};

use crate::domain::value_objects::ByteRange;

/// Slices an arbitrary byte stream to the requested window
pub fn slice_stream(
    stream: BoxStream<'static, Result<Bytes, std::io::Error>>,
    range: ByteRange,
) -> BoxStream<'static, Result<Bytes, std::io::Error>> {
    let (start, end) = (range.start, range.end);

    stream::unfold((stream, 0u64), move |(mut inner, mut position)| async move {
        loop {
            if position > end {
                // Window fully emitted; stop pulling the upstream
                return None;
            }
            match inner.next().await? {
                Err(e) => return Some((Err(e), (inner, position))),
                Ok(chunk) => {
                    let len = chunk.len() as u64;
                    let current = position;
                    position += len;
                    if len == 0 || current + len <= start {
                        // Before the window: discard
                        continue;
                    }
                    let lo = start.saturating_sub(current) as usize;
                    let hi = ((end + 1 - current).min(len)) as usize;
                    return Some((Ok(chunk.slice(lo..hi)), (inner, position)));
                }
            }
        }
    })
    .boxed()
}
