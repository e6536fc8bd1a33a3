use std::io::{BufRead, BufReader, Lines};

use reqwest::blocking::Response;
use tower_protocol::LiveEvent;

use crate::ProtocolClientError;

/// Blocking iterator over the `live/` event stream.
///
/// Each item is one SSE message decoded into the events it carries. An
/// empty list means the server sent a keep-alive message.
pub struct LiveStream {
    lines: Lines<Box<dyn BufRead + Send>>,
    buffer: Vec<String>,
}

impl LiveStream {
    pub(crate) fn new(response: Response) -> Self {
        Self::from_reader(Box::new(BufReader::new(response)))
    }

    fn from_reader(reader: Box<dyn BufRead + Send>) -> Self {
        Self {
            lines: reader.lines(),
            buffer: Vec::new(),
        }
    }
}

impl Iterator for LiveStream {
    type Item = Result<Vec<LiveEvent>, ProtocolClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        read_next_event(&mut self.lines, &mut self.buffer).map(|res| {
            res.and_then(|payload| LiveEvent::decode_message(&payload).map_err(Into::into))
        })
    }
}

/// Pull lines until one SSE frame is complete and return its joined `data:`
/// payload. Comments, `event:` and `id:` lines carry nothing we use and are
/// skipped. A frame still buffered when the server hangs up is returned as
/// the last item.
fn read_next_event(
    lines: &mut Lines<Box<dyn BufRead + Send>>,
    buffer: &mut Vec<String>,
) -> Option<Result<String, ProtocolClientError>> {
    for line in lines.by_ref() {
        let line = match line {
            Ok(line) => line,
            Err(err) => return Some(Err(err.into())),
        };
        let line = line.trim_end();
        if line.is_empty() {
            if let Some(payload) = take_frame(buffer) {
                return Some(Ok(payload));
            }
        } else if let Some(data) = line.strip_prefix("data:") {
            buffer.push(data.strip_prefix(' ').unwrap_or(data).to_owned());
        }
    }
    take_frame(buffer).map(Ok)
}

fn take_frame(buffer: &mut Vec<String>) -> Option<String> {
    if buffer.is_empty() {
        return None;
    }
    let payload = buffer.join("\n");
    buffer.clear();
    Some(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn lines_of(data: &'static [u8]) -> Lines<Box<dyn BufRead + Send>> {
        let reader: Box<dyn BufRead + Send> = Box::new(Cursor::new(data));
        reader.lines()
    }

    #[test]
    fn parse_single_sse_event() {
        let mut lines = lines_of(b"event: message\ndata: [{\"heartbeat\":{}}]\n\n");
        let mut buffer = Vec::new();

        let payload = read_next_event(&mut lines, &mut buffer)
            .expect("expected event")
            .expect("payload parse");

        assert_eq!(payload, "[{\"heartbeat\":{}}]");
    }

    #[test]
    fn multi_line_data_is_joined_and_comments_skipped() {
        let mut lines = lines_of(b": keep-alive\ndata: [\ndata: {\"heartbeat\":1}]\n\n");
        let mut buffer = Vec::new();

        let payload = read_next_event(&mut lines, &mut buffer).unwrap().unwrap();
        assert_eq!(payload, "[\n{\"heartbeat\":1}]");
        assert!(read_next_event(&mut lines, &mut buffer).is_none());
    }

    #[test]
    fn trailing_frame_without_blank_line_is_flushed() {
        let mut lines = lines_of(b"data: []");
        let mut buffer = Vec::new();

        assert_eq!(read_next_event(&mut lines, &mut buffer).unwrap().unwrap(), "[]");
        assert!(read_next_event(&mut lines, &mut buffer).is_none());
    }

    #[test]
    fn live_stream_yields_decoded_events_per_message() {
        let frames = b"data: [{\"userId\":1,\"workflowId\":\"w1\",\"action\":\"WORKFLOW_UPDATE\"}]\n\n\
data: []\n\n\
data: [{\"workflowId\":\"w1\",\"progress\":{\"workflowProgress\":{\"running\":4}}}]\n\n";
        let mut stream = LiveStream::from_reader(Box::new(Cursor::new(&frames[..])));

        let first = stream.next().expect("first frame").expect("first parsed");
        assert!(matches!(
            first[0],
            LiveEvent::WorkflowUpdate { workflow: None, .. }
        ));

        let keep_alive = stream.next().expect("second frame").expect("second parsed");
        assert!(keep_alive.is_empty());

        let third = stream.next().expect("third frame").expect("third parsed");
        assert!(matches!(
            &third[0],
            LiveEvent::ProgressUpdate { progress: Some(_), .. }
        ));

        assert!(stream.next().is_none());
    }

    #[test]
    fn malformed_frame_surfaces_decode_error() {
        let mut stream = LiveStream::from_reader(Box::new(Cursor::new(&b"data: {oops\n\n"[..])));
        let err = stream.next().expect("frame").unwrap_err();
        assert!(matches!(err, ProtocolClientError::Live(_)));
    }
}
