//! Server-sent-events text stream for streaming generation.
//!
//! Each `data:` event carries a partial generate response; the stream yields
//! its text and filters out empty chunks. Chunk order matches wire order.

use std::{
    collections::VecDeque,
    pin::Pin,
    task::{Context, Poll},
};

use futures_core::Stream;
use futures_util::{stream, StreamExt};
use reqwest::Response;

use crate::{
    errors::{to_transport_error, Error, Result},
    wire::GenerateContentResponse,
};

/// Lazy, ordered, finite stream of non-empty text chunks.
///
/// Not restartable: it consumes one remote stream. A mid-flight failure is
/// yielded as an error and terminates the sequence; chunks already yielded
/// are not replayed.
pub struct TextStream {
    stream: Pin<Box<dyn Stream<Item = Result<String>> + Send>>,
}

impl TextStream {
    pub(crate) fn new(response: Response) -> Self {
        Self {
            stream: Box::pin(build_stream(response)),
        }
    }

    /// Drain the stream, concatenating every chunk.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut out = String::new();
        while let Some(chunk) = self.next().await {
            out.push_str(&chunk?);
        }
        Ok(out)
    }
}

impl std::fmt::Debug for TextStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextStream").finish_non_exhaustive()
    }
}

impl Stream for TextStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().stream.as_mut().poll_next(cx)
    }
}

struct StreamParser {
    buffer: String,
    pending: VecDeque<Result<String>>,
    done: bool,
}

impl StreamParser {
    fn new() -> Self {
        Self {
            buffer: String::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            self.handle_line(line.trim_end_matches(['\n', '\r']));
            if self.done {
                return;
            }
        }
    }

    /// Flush a trailing event that arrived without a final newline.
    fn finish(&mut self) {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.handle_line(line.trim_end_matches(['\n', '\r']));
        }
        self.done = true;
    }

    fn handle_line(&mut self, line: &str) {
        let Some(payload) = line.strip_prefix("data:") else {
            return;
        };
        let payload = payload.trim();
        if payload.is_empty() || payload == "[DONE]" {
            return;
        }
        match serde_json::from_str::<GenerateContentResponse>(payload) {
            Ok(chunk) => {
                let text = chunk.primary_text();
                if !text.is_empty() {
                    self.pending.push_back(Ok(text));
                }
            }
            Err(err) => {
                self.pending.push_back(Err(Error::MalformedResponse(format!(
                    "invalid stream chunk: {err}"
                ))));
                self.done = true;
            }
        }
    }
}

fn build_stream(response: Response) -> impl Stream<Item = Result<String>> + Send {
    let body = response.bytes_stream().boxed();
    let state = (body, StreamParser::new());

    stream::unfold(state, |(mut body, mut parser)| async move {
        loop {
            if let Some(item) = parser.pending.pop_front() {
                return Some((item, (body, parser)));
            }
            if parser.done {
                return None;
            }
            match body.next().await {
                Some(Ok(bytes)) => parser.push_bytes(&bytes),
                Some(Err(err)) => {
                    parser.done = true;
                    return Some((Err(to_transport_error(err)), (body, parser)));
                }
                None => parser.finish(),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_json(text: &str) -> String {
        format!(
            r#"{{"candidates": [{{"content": {{"role": "model", "parts": [{{"text": {}}}]}}}}]}}"#,
            serde_json::to_string(text).unwrap()
        )
    }

    #[test]
    fn parser_filters_empty_chunks_and_preserves_order() {
        let mut parser = StreamParser::new();
        for text in ["a", "", "b"] {
            parser.push_bytes(format!("data: {}\n\n", chunk_json(text)).as_bytes());
        }
        let texts: Vec<String> = parser
            .pending
            .drain(..)
            .map(|item| item.unwrap())
            .collect();
        assert_eq!(texts, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn parser_handles_events_split_across_reads() {
        let event = format!("data: {}\n\n", chunk_json("hello"));
        let (head, tail) = event.split_at(event.len() / 2);

        let mut parser = StreamParser::new();
        parser.push_bytes(head.as_bytes());
        assert!(parser.pending.is_empty());
        parser.push_bytes(tail.as_bytes());
        assert_eq!(parser.pending.pop_front().unwrap().unwrap(), "hello");
    }

    #[test]
    fn parser_reports_malformed_chunk_and_stops() {
        let mut parser = StreamParser::new();
        parser.push_bytes(b"data: {not json}\n\n");
        assert!(matches!(
            parser.pending.pop_front(),
            Some(Err(Error::MalformedResponse(_)))
        ));
        assert!(parser.done);
    }

    #[test]
    fn parser_flushes_trailing_event_without_newline() {
        let mut parser = StreamParser::new();
        parser.push_bytes(format!("data: {}", chunk_json("tail")).as_bytes());
        assert!(parser.pending.is_empty());
        parser.finish();
        assert_eq!(parser.pending.pop_front().unwrap().unwrap(), "tail");
    }

    #[test]
    fn parser_ignores_comments_and_done_marker() {
        let mut parser = StreamParser::new();
        parser.push_bytes(b": keepalive\n\ndata: [DONE]\n\n");
        assert!(parser.pending.is_empty());
        assert!(!parser.done);
    }
}
