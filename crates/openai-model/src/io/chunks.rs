#[cfg(test)]
use std::collections::VecDeque;

use bytes::Bytes;
use reqwest::Response;

/// The body stream broke before it was complete.
#[derive(Debug, PartialEq, Eq)]
pub struct Error;

enum Source {
    Http(Response),
    #[cfg(test)]
    Canned(VecDeque<Bytes>),
}

/// Pulls a response body chunk by chunk, keeping count of what arrived.
pub struct Chunks {
    source: Source,
    received: usize,
}

impl Chunks {
    pub fn from_response(response: Response) -> Self {
        Self::new(Source::Http(response))
    }

    #[cfg(test)]
    pub fn from_vec_deque(chunks: VecDeque<Bytes>) -> Self {
        Self::new(Source::Canned(chunks))
    }

    fn new(source: Source) -> Self {
        Self {
            source,
            received: 0,
        }
    }

    /// Returns `Ok(None)` once the body is exhausted.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        let chunk = match &mut self.source {
            Source::Http(response) => response.chunk().await.map_err(|err| {
                debug!("body broke after {} bytes: {err}", self.received);
                Error
            })?,
            #[cfg(test)]
            Source::Canned(chunks) => chunks.pop_front(),
        };
        match &chunk {
            Some(bytes) => self.received += bytes.len(),
            None => trace!("body finished, {} bytes", self.received),
        }
        Ok(chunk)
    }
}
