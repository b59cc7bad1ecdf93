use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};

use super::{FrameParser, Utf8Decoder};
use crate::errors::ProviderError;
use crate::models::delta::DeltaEvent;

pub type DeltaStream = BoxStream<'static, Result<DeltaEvent, ProviderError>>;

/// Lazily turn a chunk stream into ordered delta events.
///
/// The chunk stream is not polled again once `Done` has been seen. A
/// transport error is yielded once and ends the sequence.
pub fn delta_events<S>(chunks: S) -> DeltaStream
where
    S: Stream<Item = Result<Bytes, ProviderError>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut decoder = Utf8Decoder::new();
        let mut parser = FrameParser::new();
        let mut chunks = Box::pin(chunks);

        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(bytes) => {
                    let text = decoder.decode(&bytes);
                    for event in parser.feed(&text) {
                        yield Ok(event);
                    }
                    if parser.is_done() {
                        return;
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        let mut events = parser.feed(&decoder.finish());
        events.extend(parser.finish());
        for event in events {
            yield Ok(event);
        }
    })
}
