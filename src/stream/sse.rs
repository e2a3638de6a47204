//! Incremental server-sent events decoder.
//!
//! Bytes arrive in arbitrary chunks; complete events are dispatched on a
//! blank line. Only `data` fields matter here: multiple `data` lines of one
//! event are joined with `\n`, comments (`:`) and other fields are dropped.

#[derive(Debug, Default)]
pub struct SseDecoder {
    line_buffer: Vec<u8>,
    data: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning the data payload of every event it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut events = Vec::new();
        self.line_buffer.extend_from_slice(chunk);

        while let Some(newline_index) = self.line_buffer.iter().position(|byte| *byte == b'\n') {
            let mut line = self.line_buffer.drain(..=newline_index).collect::<Vec<_>>();
            line.pop();
            if matches!(line.last(), Some(b'\r')) {
                line.pop();
            }

            if let Some(event) = self.process_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }

        events
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.data.take();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        if field == "data" {
            match self.data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"percentage\": 20}\n\n");
        assert_eq!(events, vec!["{\"percentage\": 20}".to_string()]);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"mess").is_empty());
        assert!(decoder.push(b"age\": \"hi\"}\r\n").is_empty());
        let events = decoder.push(b"\r\ndata: x\n\n");
        assert_eq!(
            events,
            vec!["{\"message\": \"hi\"}".to_string(), "x".to_string()]
        );
    }

    #[test]
    fn test_multiline_data_and_comments() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": ping\nevent: update\nid: 7\ndata: a\ndata:b\n\n");
        assert_eq!(events, vec!["a\nb".to_string()]);
    }

    #[test]
    fn test_blank_lines_without_data_dispatch_nothing() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"\n\n: comment\n\n").is_empty());
    }

    #[test]
    fn test_incomplete_event_is_held() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: pending\n").is_empty());
        assert_eq!(decoder.push(b"\n"), vec!["pending".to_string()]);
    }
}
