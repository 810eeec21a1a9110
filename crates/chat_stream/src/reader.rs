//! Stream reader - bytes in, frame events out

use std::marker::PhantomData;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::decoder::Utf8Decoder;
use crate::error::{Result, StreamError};
use crate::frame::{parse_line, Line, StreamEvent};
use crate::handler::StreamHandler;
use crate::lines::LineBuffer;
use crate::response::StreamResponse;

/// Line counters of one read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadStats {
    pub lines: usize,
    pub frames: usize,
    /// Blank, comment and non-data lines.
    pub skipped: usize,
    pub malformed: usize,
}

/// Synchronous transducer from byte chunks to [`StreamEvent`]s.
///
/// The output for a given byte sequence does not depend on how it was
/// split into chunks.
pub struct StreamReader<T> {
    decoder: Utf8Decoder,
    lines: LineBuffer,
    stats: ReadStats,
    _frame: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> StreamReader<T> {
    pub fn new() -> Self {
        Self {
            decoder: Utf8Decoder::new(),
            lines: LineBuffer::new(),
            stats: ReadStats::default(),
            _frame: PhantomData,
        }
    }

    /// Feed one chunk and collect the events of every line it completed.
    ///
    /// Fails with [`StreamError::LineTooLong`] when a line never ends.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<StreamEvent<T>>> {
        let text = self.decoder.decode(chunk);
        let mut events = Vec::new();
        for line in self.lines.push(&text)? {
            self.process_line(&line, &mut events);
        }
        Ok(events)
    }

    /// Flush the decoder and treat the leftover buffer as a final line.
    pub fn finish(&mut self) -> Result<Vec<StreamEvent<T>>> {
        let text = self.decoder.finish();
        let mut events = Vec::new();
        for line in self.lines.push(&text)? {
            self.process_line(&line, &mut events);
        }
        if let Some(rest) = self.lines.take_rest() {
            if !rest.trim().is_empty() {
                self.process_line(&rest, &mut events);
            }
        }
        Ok(events)
    }

    pub fn stats(&self) -> ReadStats {
        self.stats
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<StreamEvent<T>>) {
        self.stats.lines += 1;
        match parse_line(line) {
            Line::Blank | Line::Comment | Line::Other => self.stats.skipped += 1,
            Line::Malformed(err) => {
                self.stats.malformed += 1;
                log::warn!("Skipping malformed stream frame: {} ({})", err, line.trim());
            }
            Line::Frame(frame) => {
                self.stats.frames += 1;
                events.extend(frame.into_events());
            }
        }
    }
}

impl<T: DeserializeOwned> Default for StreamReader<T> {
    fn default() -> Self {
        Self::new()
    }
}

async fn dispatch<T, H>(handler: &mut H, event: StreamEvent<T>) -> Result<()>
where
    T: Send + 'static,
    H: StreamHandler<T> + ?Sized,
{
    match event {
        StreamEvent::Content(content) => handler.on_content(content).await,
        StreamEvent::SideData(items) => handler.on_side_data(items).await,
        StreamEvent::Complete => handler.on_complete().await,
        StreamEvent::Error(message) => handler.on_error(message).await,
    }
}

/// Read `response` to the end, dispatching its events to `handler`.
///
/// Fails fast on a non-2xx status or a missing body. Stops with
/// [`StreamError::Cancelled`] once `cancel` fires and with the handler's
/// error if a callback fails. The body is dropped on every return path.
pub async fn read_stream<T, H>(
    response: StreamResponse,
    handler: &mut H,
    cancel: &CancellationToken,
) -> Result<ReadStats>
where
    T: DeserializeOwned + Send + 'static,
    H: StreamHandler<T> + ?Sized,
{
    let mut body = response.into_body()?;
    let mut reader = StreamReader::<T>::new();

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::debug!("Stream read cancelled");
                return Err(StreamError::Cancelled);
            }
            chunk = body.next() => chunk,
        };

        let Some(chunk) = chunk else {
            break;
        };
        for event in reader.push(&chunk?)? {
            if cancel.is_cancelled() {
                return Err(StreamError::Cancelled);
            }
            dispatch(handler, event).await?;
        }
    }

    for event in reader.finish()? {
        if cancel.is_cancelled() {
            return Err(StreamError::Cancelled);
        }
        dispatch(handler, event).await?;
    }

    let stats = reader.stats();
    log::debug!(
        "Stream finished: {} lines, {} frames, {} skipped, {} malformed",
        stats.lines,
        stats.frames,
        stats.skipped,
        stats.malformed
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn read_all<C: AsRef<[u8]>>(chunks: &[C]) -> Vec<StreamEvent<Value>> {
        let mut reader = StreamReader::new();
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(reader.push(chunk.as_ref()).unwrap());
        }
        events.extend(reader.finish().unwrap());
        events
    }

    #[test]
    fn output_is_independent_of_split_point() {
        let wire = "data: {\"content\":\"héllo €\"}\n: ping\n\ndata: {\"sideData\":[{\"title\":\"😀\"}]}\ndata: {\"completed\":true}\n";
        let bytes = wire.as_bytes();
        let expected = read_all(&[bytes]);
        assert_eq!(expected.len(), 3);

        for split in 0..=bytes.len() {
            let (head, tail) = bytes.split_at(split);
            assert_eq!(read_all(&[head, tail]), expected, "split at {split}");
        }
    }

    #[test]
    fn byte_by_byte_feed_matches_single_chunk() {
        let wire = "data: {\"content\":\"日本語\"}\ndata: {\"completed\":true}";
        let chunks: Vec<&[u8]> = wire.as_bytes().chunks(1).collect();

        assert_eq!(read_all(&chunks[..]), read_all(&[wire.as_bytes()]));
    }

    #[test]
    fn malformed_line_does_not_stop_later_frames() {
        let events = read_all(&[b"data: {\"content\":\"A\"}\ndata: {not json\ndata: {\"content\":\"B\"}\n"]);

        assert_eq!(
            events,
            vec![
                StreamEvent::Content("A".to_string()),
                StreamEvent::Content("B".to_string()),
            ]
        );
    }

    #[test]
    fn final_line_without_newline_is_flushed() {
        let mut reader: StreamReader<Value> = StreamReader::new();
        assert!(reader.push(b"data: {\"completed\":").unwrap().is_empty());
        assert!(reader.push(b"true}").unwrap().is_empty());

        assert_eq!(reader.finish().unwrap(), vec![StreamEvent::Complete]);
        assert_eq!(reader.stats().frames, 1);
    }

    #[test]
    fn comment_and_blank_lines_are_skipped() {
        let lines = [
            "data: {\"content\":\"A\"}",
            "",
            ": comment",
            "data: {\"content\":\"B\"}",
            "data: {\"completed\":true}",
        ];
        let mut reader: StreamReader<Value> = StreamReader::new();
        let mut events = Vec::new();
        for line in lines {
            events.extend(reader.push(format!("{line}\n").as_bytes()).unwrap());
        }
        events.extend(reader.finish().unwrap());

        assert_eq!(
            events,
            vec![
                StreamEvent::Content("A".to_string()),
                StreamEvent::Content("B".to_string()),
                StreamEvent::Complete,
            ]
        );
        assert_eq!(
            reader.stats(),
            ReadStats {
                lines: 5,
                frames: 3,
                skipped: 2,
                malformed: 0,
            }
        );
    }

    #[test]
    fn side_data_keeps_its_payload() {
        let events = read_all(&[b"data: {\"citations\":[{\"id\":\"c1\",\"url\":\"https://x\"}]}\n"]);
        assert_eq!(
            events,
            vec![StreamEvent::SideData(vec![json!({"id": "c1", "url": "https://x"})])]
        );
    }
}
