//! Incremental HTTP/1.1 request/response parser (spec §4.2).
//!
//! Hand-rolled rather than delegated to a one-shot header-block parser:
//! the `carry` (partial trailing line) and per-call restartability are
//! load-bearing for the invariants this module is tested against — a
//! CRLF split across two `parse` calls must produce the same end state
//! as feeding the bytes in one call.

use crate::error::ParseError;
use crate::http::chunk::{ChunkParser, ChunkState};
use crate::http::headers::HeaderMap;
use crate::http::url::RequestTarget;

const CRLF: &[u8] = b"\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    Initialized,
    LineRcvd,
    RcvingHeaders,
    HeadersComplete,
    RcvingBody,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Request,
    Response,
}

#[derive(Debug)]
pub struct HttpMessage {
    pub kind: Kind,
    pub state: State,
    pub raw: Vec<u8>,
    carry: Vec<u8>,

    pub method: Option<String>,
    pub request_target: Option<RequestTarget>,
    pub version: Option<String>,
    pub status_code: Option<String>,
    pub reason_phrase: Option<String>,

    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    chunker: Option<ChunkParser>,
}

impl HttpMessage {
    pub fn request() -> Self {
        Self::new(Kind::Request)
    }

    pub fn response() -> Self {
        Self::new(Kind::Response)
    }

    fn new(kind: Kind) -> Self {
        Self {
            kind,
            state: State::Initialized,
            raw: Vec::new(),
            carry: Vec::new(),
            method: None,
            request_target: None,
            version: None,
            status_code: None,
            reason_phrase: None,
            headers: HeaderMap::new(),
            body: None,
            chunker: None,
        }
    }

    /// Whether the body-reading phase is (or will be) expected for this
    /// message: responses always read a body, requests only for POST
    /// (case-insensitively — spec §9 widens the original's exact match).
    fn expects_body(&self) -> bool {
        match self.kind {
            Kind::Response => true,
            Kind::Request => self
                .method
                .as_deref()
                .is_some_and(|m| m.eq_ignore_ascii_case("post")),
        }
    }

    pub fn parse(&mut self, data: &[u8]) -> Result<(), ParseError> {
        self.raw.extend_from_slice(data);
        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(data);

        loop {
            if self.state == State::Complete {
                break;
            }

            if self.state >= State::HeadersComplete && self.expects_body() {
                if buf.is_empty() {
                    break;
                }
                self.process_body(&buf)?;
                buf.clear();
                continue;
            }

            let Some(pos) = find_crlf(&buf) else {
                break;
            };
            let line = buf[..pos].to_vec();
            buf.drain(..pos + CRLF.len());
            self.process_line(&line)?;

            if self.state == State::HeadersComplete
                && self.kind == Kind::Request
                && !self
                    .method
                    .as_deref()
                    .is_some_and(|m| m.eq_ignore_ascii_case("post"))
                && self.raw.ends_with(b"\r\n\r\n")
            {
                self.state = State::Complete;
            }
        }

        self.carry = buf;
        Ok(())
    }

    fn process_body(&mut self, data: &[u8]) -> Result<(), ParseError> {
        if self.body.is_none() {
            self.body = Some(Vec::new());
        }

        if let Some(len) = self.content_length()? {
            self.state = State::RcvingBody;
            self.body.as_mut().unwrap().extend_from_slice(data);
            if self.body.as_ref().unwrap().len() >= len {
                self.state = State::Complete;
            }
        } else if self.is_chunked() {
            let chunker = self.chunker.get_or_insert_with(ChunkParser::new);
            chunker.parse(data)?;
            if chunker.state() == ChunkState::Complete {
                self.body = Some(chunker.body.clone());
                self.state = State::Complete;
            } else {
                self.state = State::RcvingBody;
            }
        } else {
            // No framing we understand (e.g. close-delimited body) — keep
            // absorbing bytes without ever reaching Complete.
            self.state = State::RcvingBody;
            self.body.as_mut().unwrap().extend_from_slice(data);
        }
        Ok(())
    }

    fn content_length(&self) -> Result<Option<usize>, ParseError> {
        match self.headers.get("content-length") {
            None => Ok(None),
            Some(v) => v
                .trim()
                .parse::<usize>()
                .map(Some)
                .map_err(|_| ParseError::new("content-length", format!("not a number: {v:?}"))),
        }
    }

    fn is_chunked(&self) -> bool {
        self.headers
            .get("transfer-encoding")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("chunked"))
    }

    fn process_line(&mut self, line: &[u8]) -> Result<(), ParseError> {
        if self.state < State::LineRcvd {
            self.process_start_line(line)
        } else if self.state < State::HeadersComplete {
            self.process_header_line(line)
        } else {
            Ok(())
        }
    }

    fn process_start_line(&mut self, line: &[u8]) -> Result<(), ParseError> {
        let line = std::str::from_utf8(line)
            .map_err(|_| ParseError::new("start_line", "non-utf8 start line"))?;

        match self.kind {
            Kind::Request => {
                let mut parts = line.splitn(3, ' ');
                let method = parts
                    .next()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| ParseError::new("request_line", format!("{line:?}")))?;
                let target = parts
                    .next()
                    .ok_or_else(|| ParseError::new("request_line", format!("{line:?}")))?;
                let version = parts
                    .next()
                    .ok_or_else(|| ParseError::new("request_line", format!("{line:?}")))?;

                self.method = Some(method.to_ascii_uppercase());
                self.request_target = Some(RequestTarget::parse(target));
                self.version = Some(version.to_string());
            }
            Kind::Response => {
                let mut parts = line.splitn(3, ' ');
                let version = parts
                    .next()
                    .ok_or_else(|| ParseError::new("status_line", format!("{line:?}")))?;
                let code = parts
                    .next()
                    .ok_or_else(|| ParseError::new("status_line", format!("{line:?}")))?;
                let reason = parts.next().unwrap_or("").to_string();

                self.version = Some(version.to_string());
                self.status_code = Some(code.to_string());
                self.reason_phrase = Some(reason);
            }
        }
        self.state = State::LineRcvd;
        Ok(())
    }

    fn process_header_line(&mut self, line: &[u8]) -> Result<(), ParseError> {
        if line.is_empty() {
            match self.state {
                State::RcvingHeaders => self.state = State::HeadersComplete,
                State::LineRcvd => self.state = State::RcvingHeaders,
                _ => {}
            }
            return Ok(());
        }

        self.state = State::RcvingHeaders;
        let line = std::str::from_utf8(line)
            .map_err(|_| ParseError::new("header_line", "non-utf8 header line"))?;
        let Some((key, value)) = line.split_once(':') else {
            return Err(ParseError::new("header_line", format!("{line:?}")));
        };
        self.headers.insert(key.trim(), value.trim().to_string());
        Ok(())
    }

    /// Reconstructs the origin-form request target, defaulting to `/`.
    /// Returns the literal `/None` when no request-line has been parsed
    /// yet — an intentional, spec-preserved quirk (see §9).
    pub fn build_request_target(&self) -> String {
        match &self.request_target {
            Some(t) => t.origin_form(),
            None => "/None".to_string(),
        }
    }

    /// Rebuild the request line + surviving headers (original casing) +
    /// extra headers + CRLF + body.
    pub fn build(&self, del_headers: &[&str], add_headers: &[(&str, &str)]) -> Vec<u8> {
        let del_lower: Vec<String> = del_headers.iter().map(|h| h.to_ascii_lowercase()).collect();

        let mut out = Vec::new();
        out.extend_from_slice(
            format!(
                "{} {} {}\r\n",
                self.method.as_deref().unwrap_or(""),
                self.build_request_target(),
                self.version.as_deref().unwrap_or(""),
            )
            .as_bytes(),
        );

        for (name, value) in self.headers.iter() {
            if del_lower.iter().any(|d| d == &name.to_ascii_lowercase()) {
                continue;
            }
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }

        for (name, value) in add_headers {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }

        out.extend_from_slice(CRLF);
        if let Some(body) = &self.body {
            out.extend_from_slice(body);
        }
        out
    }
}

fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == CRLF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_get_round_trip() {
        let mut p = HttpMessage::request();
        p.parse(b"GET https://example.com/path/dir/?a=b&c=d#p=q HTTP/1.1\r\nHost: example.com\r\n\r\n")
            .unwrap();
        assert_eq!(p.method.as_deref(), Some("GET"));
        assert_eq!(
            p.request_target.as_ref().unwrap().host.as_deref(),
            Some("example.com")
        );
        assert_eq!(p.request_target.as_ref().unwrap().port, None);
        assert_eq!(p.version.as_deref(), Some("HTTP/1.1"));
        assert_eq!(p.state, State::Complete);
        assert_eq!(p.build_request_target(), "/path/dir/?a=b&c=d#p=q");

        let rebuilt = p.build(&["host"], &[("Host", "example.com")]);
        assert_eq!(
            rebuilt,
            b"GET /path/dir/?a=b&c=d#p=q HTTP/1.1\r\nHost: example.com\r\n\r\n".to_vec()
        );
    }

    #[test]
    fn build_request_target_is_none_sentinel_before_any_line() {
        let p = HttpMessage::request();
        assert_eq!(p.build_request_target(), "/None");
    }

    #[test]
    fn byte_by_byte_split_across_calls() {
        let mut p = HttpMessage::request();
        p.parse(b"GET http://localhost:8080 HTTP/1.1").unwrap();
        assert_eq!(p.state, State::Initialized);

        p.parse(b"\r\n").unwrap();
        assert_eq!(p.state, State::LineRcvd);
        assert_eq!(
            p.request_target.as_ref().unwrap().port,
            Some(8080)
        );

        p.parse(b"Host: localhost:8080").unwrap();
        assert!(p.headers.is_empty());
        assert_eq!(p.state, State::LineRcvd);

        p.parse(b"\r\n\r\n").unwrap();
        assert_eq!(p.headers.get("host"), Some("localhost:8080"));
        assert_eq!(p.state, State::Complete);
    }

    #[test]
    fn post_with_content_length() {
        let mut p = HttpMessage::request();
        p.parse(b"POST http://localhost HTTP/1.1\r\nHost: localhost\r\nContent-Length: 7\r\n\r\n")
            .unwrap();
        assert_eq!(p.state, State::HeadersComplete);
        p.parse(b"a=b").unwrap();
        assert_eq!(p.state, State::RcvingBody);
        assert_eq!(p.body.as_deref(), Some(b"a=b".as_slice()));
        p.parse(b"&c=d").unwrap();
        assert_eq!(p.state, State::Complete);
        assert_eq!(p.body.as_deref(), Some(b"a=b&c=d".as_slice()));
    }

    #[test]
    fn chunked_response() {
        let mut p = HttpMessage::response();
        p.parse(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5\r\npedia\r\nE\r\n in\r\n\r\nchunks.\r\n0\r\n\r\n")
            .unwrap();
        assert_eq!(p.state, State::Complete);
        assert_eq!(p.body.as_deref(), Some(b"Wikipedia in\r\n\r\nchunks.".as_slice()));
    }

    #[test]
    fn response_status_line() {
        let mut p = HttpMessage::response();
        p.parse(b"HTTP/1.1 301 Moved Permanently\r\nContent-Length: 0\r\n\r\n")
            .unwrap();
        assert_eq!(p.status_code.as_deref(), Some("301"));
        assert_eq!(p.reason_phrase.as_deref(), Some("Moved Permanently"));
        assert_eq!(p.state, State::Complete);
    }

    #[test]
    fn non_post_request_completes_right_after_headers() {
        let mut p = HttpMessage::request();
        p.parse(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(p.state, State::Complete);
        assert_eq!(p.body, None);
    }

    #[test]
    fn lowercase_method_still_reads_body_case_insensitively() {
        let mut p = HttpMessage::request();
        p.parse(b"post http://localhost HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc")
            .unwrap();
        assert_eq!(p.method.as_deref(), Some("POST"));
        assert_eq!(p.state, State::Complete);
        assert_eq!(p.body.as_deref(), Some(b"abc".as_slice()));
    }

    #[test]
    fn malformed_request_line_errors() {
        let mut p = HttpMessage::request();
        let err = p.parse(b"GARBAGE\r\n\r\n").unwrap_err();
        assert_eq!(err.which, "request_line");
    }
}
