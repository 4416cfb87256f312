use bytes::BytesMut;

use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading the `data` of server-sent events from a chunk stream.
///
/// Only the subset that chat-completion endpoints emit is understood:
/// `data` fields (joined with `\n` when repeated), comment lines and the
/// `event`/`id`/`retry` fields, which are skipped. Lines may end with LF or
/// CRLF. Events without any `data` field are dropped.
pub struct Sse {
    buf: BytesMut,
    chunks: Chunks,
    exhausted: bool,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: BytesMut::new(),
            chunks,
            exhausted: false,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Drain complete events from the buffer before reading more.
            while let Some(block) = self.take_block() {
                if let Some(data) = parse_block(&block)? {
                    return Ok(Some(data));
                }
            }
            if self.exhausted {
                // A trailing partial event is not dispatched.
                return Ok(None);
            }
            match self.chunks.next_chunk().await.map_err(Error::ChunksError)? {
                Some(bytes) => self.buf.extend_from_slice(&bytes),
                None => self.exhausted = true,
            }
        }
    }

    /// Splits off the bytes of one event, without the blank line that
    /// terminates it.
    fn take_block(&mut self) -> Option<BytesMut> {
        let (end, sep_len) = find_blank_line(&self.buf)?;
        let block = self.buf.split_to(end);
        let _ = self.buf.split_to(sep_len);
        Some(block)
    }
}

fn find_blank_line(buf: &[u8]) -> Option<(usize, usize)> {
    let mut idx = 0;
    while idx < buf.len() {
        if buf[idx..].starts_with(b"\r\n\r\n") {
            return Some((idx, 4));
        }
        if buf[idx..].starts_with(b"\n\n") {
            return Some((idx, 2));
        }
        idx += 1;
    }
    None
}

fn parse_block(block: &[u8]) -> Result<Option<String>, Error> {
    let Ok(text) = str::from_utf8(block) else {
        return Err(Error::InvalidPayload);
    };

    let mut data: Option<String> = None;
    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => {
                (field, value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };
        match field {
            "data" => {
                let data = data.get_or_insert_default();
                if !data.is_empty() {
                    data.push('\n');
                }
                data.push_str(value);
            }
            "event" | "id" | "retry" => {}
            _ => return Err(Error::InvalidPayload),
        }
    }
    Ok(data)
}
