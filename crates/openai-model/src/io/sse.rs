use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    Chunks(ChunksError),
    InvalidPayload,
}

/// Reads server-sent events from a chunk stream, yielding the `data` of
/// each event.
///
/// Lines may end with `\n` or `\r\n`. Multiple `data` lines in one event
/// are joined with `\n`, comments and the `event`/`id`/`retry` fields are
/// skipped. Any other field is treated as a malformed stream.
pub struct Sse {
    buf: Vec<u8>,
    data_lines: Vec<String>,
    chunks: Chunks,
    exhausted: bool,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            data_lines: Vec::new(),
            chunks,
            exhausted: false,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }
            if self.exhausted {
                // An unterminated trailing event is dropped.
                return Ok(None);
            }
            match self.chunks.next_chunk().await.map_err(Error::Chunks)? {
                Some(bytes) => self.buf.extend_from_slice(&bytes),
                None => self.exhausted = true,
            }
        }
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        while let Some(eol) = self.buf.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=eol).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            if line.is_empty() {
                if self.data_lines.is_empty() {
                    continue;
                }
                let data = self.data_lines.join("\n");
                self.data_lines.clear();
                return Ok(Some(data));
            }

            let line =
                std::str::from_utf8(&line).map_err(|_| Error::InvalidPayload)?;
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => {
                    (field, value.strip_prefix(' ').unwrap_or(value))
                }
                None => (line, ""),
            };
            match field {
                "data" => self.data_lines.push(value.to_owned()),
                "event" | "id" | "retry" => {}
                _ => return Err(Error::InvalidPayload),
            }
        }
        Ok(None)
    }
}
