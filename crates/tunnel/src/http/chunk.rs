//! Decoder for HTTP/1.1 chunked transfer encoding (spec §4.1).
//!
//! Restartable only by constructing a new `ChunkParser`; `parse` may be
//! called any number of times with arbitrary byte slices, including ones
//! that split a size line or a chunk's trailing CRLF across calls.

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    WaitSize,
    WaitData,
    Complete,
}

#[derive(Debug, Default)]
pub struct ChunkParser {
    pub state_: Option<ChunkState>,
    pub size: Option<usize>,
    pub chunk: Vec<u8>,
    pub body: Vec<u8>,
    carry: Vec<u8>,
}

impl ChunkParser {
    pub fn new() -> Self {
        Self {
            state_: Some(ChunkState::WaitSize),
            ..Default::default()
        }
    }

    pub fn state(&self) -> ChunkState {
        self.state_.unwrap_or(ChunkState::WaitSize)
    }

    pub fn parse(&mut self, data: &[u8]) -> Result<(), ParseError> {
        self.carry.extend_from_slice(data);
        loop {
            match self.state() {
                ChunkState::Complete => break,
                ChunkState::WaitSize => {
                    let Some(pos) = find_crlf(&self.carry) else {
                        break;
                    };
                    let line: Vec<u8> = self.carry.drain(..pos).collect();
                    self.carry.drain(..2);
                    let line = std::str::from_utf8(&line).map_err(|_| {
                        ParseError::new("chunk_size", "non-utf8 chunk size line")
                    })?;
                    let size_str = line.split(';').next().unwrap_or("").trim();
                    let size = usize::from_str_radix(size_str, 16).map_err(|_| {
                        ParseError::new("chunk_size", format!("malformed chunk size {size_str:?}"))
                    })?;
                    self.size = Some(size);
                    self.state_ = Some(ChunkState::WaitData);
                }
                ChunkState::WaitData => {
                    let size = self.size.expect("size set on entering WaitData");
                    let remaining = size - self.chunk.len();
                    let take = remaining.min(self.carry.len());
                    if take > 0 {
                        self.chunk.extend(self.carry.drain(..take));
                    }
                    if self.chunk.len() < size {
                        break;
                    }
                    if self.carry.len() < 2 {
                        break; // trailing CRLF not fully arrived yet
                    }
                    self.carry.drain(..2);
                    self.body.extend_from_slice(&self.chunk);
                    self.chunk.clear();
                    self.size = None;
                    self.state_ = Some(if size == 0 {
                        ChunkState::Complete
                    } else {
                        ChunkState::WaitSize
                    });
                }
            }
        }
        Ok(())
    }
}

fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_wikipedia_example() {
        let mut p = ChunkParser::new();
        p.parse(b"4\r\nWiki\r\n5\r\npedia\r\nE\r\n in\r\n\r\nchunks.\r\n0\r\n\r\n")
            .unwrap();
        assert_eq!(p.state(), ChunkState::Complete);
        assert_eq!(p.body, b"Wikipedia in\r\n\r\nchunks.");
        assert!(p.chunk.is_empty());
        assert_eq!(p.size, None);
    }

    #[test]
    fn handles_split_feeds() {
        let mut p = ChunkParser::new();
        p.parse(b"4\r\nWi").unwrap();
        assert_eq!(p.state(), ChunkState::WaitData);
        p.parse(b"ki\r").unwrap();
        p.parse(b"\n0\r\n\r\n").unwrap();
        assert_eq!(p.state(), ChunkState::Complete);
        assert_eq!(p.body, b"Wiki");
    }

    #[test]
    fn rejects_malformed_size() {
        let mut p = ChunkParser::new();
        let err = p.parse(b"zz\r\n").unwrap_err();
        assert_eq!(err.which, "chunk_size");
    }

    #[test]
    fn extension_after_semicolon_is_discarded() {
        let mut p = ChunkParser::new();
        p.parse(b"4;foo=bar\r\nWiki\r\n0\r\n\r\n").unwrap();
        assert_eq!(p.state(), ChunkState::Complete);
        assert_eq!(p.body, b"Wiki");
    }
}
