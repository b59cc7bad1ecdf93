use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::models::completion::CompletionChunk;
use crate::models::delta::DeltaEvent;

const FRAME_DELIMITER: &str = "\n\n";
const DATA_FIELD: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";
const SKIPPED_FIELDS: [&str; 3] = ["event:", "id:", "retry:"];

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("frame has no data field")]
    MissingData,

    #[error("frame payload is not a completion chunk: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Parse one fully assembled frame (without its trailing delimiter).
pub fn parse_frame(frame: &str) -> Result<DeltaEvent, FrameError> {
    let payload = match data_payload(frame)? {
        Some(payload) => payload,
        None => return Ok(DeltaEvent::Ignorable),
    };

    if payload == DONE_SENTINEL {
        return Ok(DeltaEvent::Done);
    }

    let chunk: CompletionChunk = serde_json::from_str(&payload)?;
    if let Some(error) = &chunk.error {
        warn!(%error, "upstream reported an error inside the stream");
    }

    Ok(match chunk.content() {
        Some(text) if !text.is_empty() => DeltaEvent::ContentFragment(text.to_string()),
        _ => DeltaEvent::Ignorable,
    })
}

/// Collect the frame's `data:` lines, joined with `\n`. Comment and
/// metadata lines are skipped wherever they appear; a frame made only of
/// those carries no payload. A line with no field name after a `data:`
/// line continues the payload (a held frame rejoined across a delimiter).
fn data_payload(frame: &str) -> Result<Option<String>, FrameError> {
    let mut payload: Option<String> = None;
    for line in frame.split('\n') {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || is_skipped(line) {
            continue;
        }

        let value = match line.strip_prefix(DATA_FIELD) {
            Some(value) => value.trim(),
            None if payload.is_some() => line.trim(),
            None => return Err(FrameError::MissingData),
        };
        match payload.as_mut() {
            Some(joined) => {
                joined.push('\n');
                joined.push_str(value);
            }
            None => payload = Some(value.to_string()),
        }
    }
    Ok(payload)
}

fn is_skipped(line: &str) -> bool {
    line.starts_with(':') || SKIPPED_FIELDS.iter().any(|field| line.starts_with(field))
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
enum ParserState {
    #[default]
    AwaitingFrame,
    /// A delimited frame that did not parse, kept to be joined with the next one
    HoldingPartial(String),
}

/// Turns decoded text chunks into [`DeltaEvent`]s.
///
/// Text after the last delimiter waits in `tail` for the rest of its frame.
/// A delimited frame that still fails to parse moves the parser into
/// `HoldingPartial`, and the next frame is first tried joined onto it. One
/// parser serves one stream; after `Done` it ignores all further input.
#[derive(Debug, Default)]
pub struct FrameParser {
    tail: String,
    state: ParserState,
    done: bool,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Whether any text is buffered waiting for more input
    pub fn is_holding(&self) -> bool {
        !self.tail.is_empty() || self.state != ParserState::AwaitingFrame
    }

    pub fn feed(&mut self, text: &str) -> Vec<DeltaEvent> {
        let mut events = Vec::new();
        if self.done {
            return events;
        }

        self.tail.push_str(text);
        while let Some(end) = self.tail.find(FRAME_DELIMITER) {
            let frame: String = self.tail.drain(..end + FRAME_DELIMITER.len()).collect();
            let frame = &frame[..end];
            if let Some(event) = self.accept(frame) {
                let done = event.is_done();
                events.push(event);
                if done {
                    self.close();
                    break;
                }
            }
        }
        events
    }

    /// End of input. Returns the final event if the undelimited tail turns
    /// out to be a complete frame.
    pub fn finish(&mut self) -> Vec<DeltaEvent> {
        if self.done {
            return Vec::new();
        }

        let tail = std::mem::take(&mut self.tail);
        let event = self.accept(&tail);
        if let ParserState::HoldingPartial(held) = &self.state {
            debug!(bytes = held.len(), "stream ended inside an incomplete frame");
        }
        self.close();
        event.into_iter().collect()
    }

    fn close(&mut self) {
        self.done = true;
        self.tail.clear();
        self.state = ParserState::AwaitingFrame;
    }

    fn accept(&mut self, frame: &str) -> Option<DeltaEvent> {
        match std::mem::take(&mut self.state) {
            ParserState::AwaitingFrame => {
                if frame.trim().is_empty() {
                    return None;
                }
                match parse_frame(frame) {
                    Ok(event) => Some(event),
                    Err(e) => {
                        trace!(error = %e, "holding incomplete frame");
                        self.state = ParserState::HoldingPartial(frame.to_string());
                        None
                    }
                }
            }
            ParserState::HoldingPartial(mut held) => {
                let held_len = held.len();
                held.push_str(FRAME_DELIMITER);
                held.push_str(frame);
                if let Ok(event) = parse_frame(&held) {
                    return Some(event);
                }

                // A frame that parses on its own means the held text was never
                // going to complete.
                if !frame.trim().is_empty() {
                    if let Ok(event) = parse_frame(frame) {
                        warn!(bytes = held_len, "discarding unparseable frame");
                        return Some(event);
                    }
                }

                self.state = ParserState::HoldingPartial(held);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(content: &str) -> String {
        format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":{}}}}}]}}\n\n",
            serde_json::to_string(content).unwrap()
        )
    }

    fn fragments(events: &[DeltaEvent]) -> String {
        events.iter().filter_map(DeltaEvent::as_fragment).collect()
    }

    fn feed_all(chunks: &[&str]) -> Vec<DeltaEvent> {
        let mut parser = FrameParser::new();
        let mut events: Vec<DeltaEvent> = chunks.iter().flat_map(|c| parser.feed(c)).collect();
        events.extend(parser.finish());
        events
    }

    #[test]
    fn test_parse_frame_variants() {
        assert_eq!(
            parse_frame(r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#).unwrap(),
            DeltaEvent::ContentFragment("Hi".to_string())
        );
        assert_eq!(parse_frame("data: [DONE]").unwrap(), DeltaEvent::Done);
        assert_eq!(
            parse_frame(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap(),
            DeltaEvent::Ignorable
        );
        assert_eq!(
            parse_frame(r#"data: {"choices":[{"delta":{"content":""}}]}"#).unwrap(),
            DeltaEvent::Ignorable
        );
        assert_eq!(parse_frame(": keep-alive").unwrap(), DeltaEvent::Ignorable);
        assert_eq!(
            parse_frame("event: completion\ndata: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}")
                .unwrap(),
            DeltaEvent::ContentFragment("x".to_string())
        );
        assert!(parse_frame(r#"data: {"choices":[{"delta":{"cont"#).is_err());
        assert!(parse_frame(r#"ent":"X"}}]}"#).is_err());
    }

    #[test]
    fn test_round_trip_chunks() {
        let events = feed_all(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\ndata: [DONE]\n\n",
        ]);
        assert_eq!(
            events,
            vec![
                DeltaEvent::ContentFragment("Hel".to_string()),
                DeltaEvent::ContentFragment("lo".to_string()),
                DeltaEvent::Done,
            ]
        );
    }

    #[test]
    fn test_mid_json_split() {
        let events = feed_all(&[
            "data: {\"choices\":[{\"delta\":{\"cont",
            "ent\":\"X\"}}]}\n\n",
        ]);
        assert_eq!(events, vec![DeltaEvent::ContentFragment("X".to_string())]);
    }

    #[test]
    fn test_split_at_every_offset_matches_whole_delivery() {
        let stream = format!("{}{}{}data: [DONE]\n\n", frame("Hel"), frame("lo, "), frame("wörld"));
        let whole = feed_all(&[&stream]);
        assert_eq!(fragments(&whole), "Hello, wörld");

        for (split, _) in stream.char_indices() {
            let (a, b) = stream.split_at(split);
            assert_eq!(feed_all(&[a, b]), whole, "split at {}", split);
        }
    }

    #[test]
    fn test_single_frame_split_yields_one_event() {
        let whole = frame("X");
        for (split, _) in whole.char_indices().skip(1) {
            let (a, b) = whole.split_at(split);
            assert_eq!(
                feed_all(&[a, b]),
                vec![DeltaEvent::ContentFragment("X".to_string())],
                "split at {}",
                split
            );
        }
    }

    #[test]
    fn test_nothing_after_done() {
        let mut parser = FrameParser::new();
        let events = parser.feed(&format!("{}data: [DONE]\n\n{}", frame("a"), frame("b")));
        assert_eq!(
            events,
            vec![DeltaEvent::ContentFragment("a".to_string()), DeltaEvent::Done]
        );
        assert!(parser.is_done());
        assert!(parser.feed(&frame("c")).is_empty());
        assert!(parser.finish().is_empty());
    }

    #[test]
    fn test_delimiter_inside_held_frame_is_rejoined() {
        let events = feed_all(&[
            "data: {\"choices\":[{\"delta\":\n\n{\"content\":\"joined\"}}]}\n\n",
        ]);
        assert_eq!(events, vec![DeltaEvent::ContentFragment("joined".to_string())]);
    }

    #[test]
    fn test_garbage_frame_does_not_block_stream() {
        let events = feed_all(&[&format!("data: {{not json\n\n{}data: [DONE]\n\n", frame("ok"))]);
        assert_eq!(
            events,
            vec![DeltaEvent::ContentFragment("ok".to_string()), DeltaEvent::Done]
        );
    }

    #[test]
    fn test_heartbeats_and_blank_frames() {
        let events = feed_all(&[": ping\n\n\n\n", &frame("")]);
        assert_eq!(events, vec![DeltaEvent::Ignorable, DeltaEvent::Ignorable]);

        // Blank segments produce no event at all
        assert!(feed_all(&["\n\n", " \n\n\n\n"]).is_empty());
    }

    #[test]
    fn test_end_without_done() {
        let mut parser = FrameParser::new();
        assert_eq!(parser.feed(&frame("partial")).len(), 1);
        assert!(parser.feed("data: {\"choices\":[{\"de").is_empty());
        assert!(parser.is_holding());
        assert!(parser.finish().is_empty());
        assert!(parser.is_done());
    }

    #[test]
    fn test_final_frame_without_trailing_delimiter() {
        let events = feed_all(&["data: {\"choices\":[{\"delta\":{\"content\":\"end\"}}]}"]);
        assert_eq!(events, vec![DeltaEvent::ContentFragment("end".to_string())]);
    }

    #[test]
    fn test_crlf_lines() {
        let events = feed_all(&[": ping\r\ndata: [DONE]\r\n\n"]);
        assert_eq!(events, vec![DeltaEvent::Done]);
    }

    #[test]
    fn test_field_line_after_data_is_skipped() {
        let events = feed_all(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\nid: 1\n\n",
            &frame("B"),
            "data: [DONE]\n\n",
        ]);
        assert_eq!(
            events,
            vec![
                DeltaEvent::ContentFragment("A".to_string()),
                DeltaEvent::ContentFragment("B".to_string()),
                DeltaEvent::Done,
            ]
        );

        assert_eq!(
            parse_frame("id: 7\ndata: [DONE]\nretry: 100\n: trailing comment").unwrap(),
            DeltaEvent::Done
        );
    }

    #[test]
    fn test_multiline_data_is_joined() {
        let events = feed_all(&[
            "data: {\"choices\":[{\"delta\":\ndata: {\"content\":\"two lines\"}}]}\n\n",
        ]);
        assert_eq!(
            events,
            vec![DeltaEvent::ContentFragment("two lines".to_string())]
        );
    }

    #[test]
    fn test_one_char_at_a_time_matches_whole_delivery() {
        let stream = format!(
            ": open\n\n{}{}id: 3\n{}data: [DONE]\n\n",
            frame("Hel"),
            frame("lo, "),
            frame("wörld ✓")
        );
        let whole = feed_all(&[&stream]);
        assert_eq!(fragments(&whole), "Hello, wörld ✓");

        let chars: Vec<String> = stream.chars().map(String::from).collect();
        let pieces: Vec<&str> = chars.iter().map(String::as_str).collect();
        assert_eq!(feed_all(&pieces), whole);
    }

    #[test]
    fn test_many_uneven_splits_match_whole_delivery() {
        let stream = format!("{}{}{}data: [DONE]\n\n", frame("a"), frame("bc"), frame("déf"));
        let whole = feed_all(&[&stream]);
        let boundaries: Vec<usize> = stream.char_indices().map(|(i, _)| i).collect();

        for step in [2, 3, 5, 7, 11] {
            let mut pieces = Vec::new();
            let mut start = 0;
            for &end in boundaries.iter().skip(step).step_by(step) {
                pieces.push(&stream[start..end]);
                start = end;
            }
            pieces.push(&stream[start..]);
            assert!(pieces.len() >= 3);
            assert_eq!(feed_all(&pieces), whole, "every {} chars", step);
        }
    }
}
