use std::collections::HashMap;
use std::io::{self, BufRead};

use thiserror::Error;

use crate::stream::{read_line, LineError};


pub const METHOD_GET: &str = "GET";
pub const PROTO_HTTP11: &str = "HTTP/1.1";

const HEADER_HOST: &str = "Host";
const HEADER_CONNECTION: &str = "Connection";
const CONNECTION_CLOSE: &str = "close";

/// One parsed request message. `host` and `close` are pulled out of the
/// header section; the generic map never contains `Host` or `Connection`.
#[derive(Debug)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub proto: String,
    pub host: String,
    pub close: bool,
    pub header: HashMap<String, String>,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("empty start line")]
    EmptyStartLine,

    #[error("empty request")]
    EmptyRequest,

    #[error("missing URL")]
    MissingUrl,

    #[error("missing proto")]
    MissingProto,

    #[error("invalid method `{0}`")]
    InvalidMethod(String),

    #[error("malformed URL `{0}`")]
    MalformedUrl(String),

    #[error("invalid proto `{0}`")]
    InvalidProto(String),

    #[error("malformed header line `{0}`")]
    MalformedHeader(String),

    #[error("missing Host header")]
    MissingHost,

    #[error("malformed line: {0}")]
    MalformedLine(LineError),

    #[error("line too long")]
    LineTooLong,
}

/// Outcome classification for a failed read. `bytes_received` tells the
/// connection handler whether the peer had started sending this request,
/// which decides between a silent close and a 400.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("stream closed by peer")]
    StreamEnded { bytes_received: bool },

    #[error("read deadline exceeded")]
    Timeout { bytes_received: bool },

    #[error("{source}")]
    Parse {
        source: ParseError,
        bytes_received: bool,
    },

    #[error("io error: {source}")]
    Io {
        source: io::Error,
        bytes_received: bool,
    },
}

impl RequestError {
    pub fn bytes_received(&self) -> bool {
        match self {
            RequestError::StreamEnded { bytes_received }
            | RequestError::Timeout { bytes_received }
            | RequestError::Parse { bytes_received, .. }
            | RequestError::Io { bytes_received, .. } => *bytes_received,
        }
    }
}

/// Convert a header field name to its canonical display form: the first
/// letter of every hyphen-separated segment uppercased, the rest lowercased.
/// `content-LENGTH` becomes `Content-Length`.
pub fn canonical_header_key(name: &str) -> String {
    name.split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("-")
}

fn classify_line_error(e: LineError, bytes_received: bool) -> RequestError {
    match e {
        LineError::Closed => RequestError::StreamEnded { bytes_received },
        LineError::UnexpectedEof => RequestError::StreamEnded {
            bytes_received: true,
        },
        LineError::TimedOut { partial } => RequestError::Timeout {
            bytes_received: bytes_received || partial,
        },
        LineError::TooLong => RequestError::Parse {
            source: ParseError::LineTooLong,
            bytes_received: true,
        },
        e @ (LineError::BareLineFeed | LineError::InvalidUtf8) => RequestError::Parse {
            source: ParseError::MalformedLine(e),
            bytes_received: true,
        },
        LineError::Io(source) => RequestError::Io {
            source,
            bytes_received,
        },
    }
}

fn parse_start_line(line: &str) -> Result<(String, String, String), ParseError> {
    if line.is_empty() {
        return Err(ParseError::EmptyStartLine);
    }

    let fields: Vec<&str> = line.splitn(3, ' ').collect();
    match fields.len() {
        3 => {}
        2 => return Err(ParseError::MissingProto),
        1 => return Err(ParseError::MissingUrl),
        _ => return Err(ParseError::EmptyRequest),
    }

    let (method, url, proto) = (fields[0], fields[1], fields[2]);
    if method != METHOD_GET {
        return Err(ParseError::InvalidMethod(method.to_string()));
    }
    if !url.starts_with('/') {
        return Err(ParseError::MalformedUrl(url.to_string()));
    }
    if proto != PROTO_HTTP11 {
        return Err(ParseError::InvalidProto(proto.to_string()));
    }

    Ok((method.to_string(), url.to_string(), proto.to_string()))
}

/// Read the next request off `r`.
///
/// Phase 1 reads and validates the start line, phase 2 collects headers
/// until the empty line. `Host` is mandatory: if the header section ends
/// (including by end of stream) without one, the failure is `MissingHost`
/// rather than a bare stream error. A returned `Request` always has
/// non-empty method, URL, proto, and host.
pub fn read_request(r: &mut impl BufRead) -> Result<Request, RequestError> {
    let line = read_line(r).map_err(|e| classify_line_error(e, false))?;

    let (method, url, proto) =
        parse_start_line(&line).map_err(|source| RequestError::Parse {
            source,
            bytes_received: true,
        })?;

    let mut header = HashMap::new();
    let mut host = String::new();
    let mut close = false;

    loop {
        let line = match read_line(r) {
            Ok(line) => line,
            Err(e @ (LineError::Closed | LineError::UnexpectedEof)) => {
                // A peer that quits before the blank line without ever
                // naming a host is a missing-host failure, not a stream one.
                if host.is_empty() {
                    return Err(RequestError::Parse {
                        source: ParseError::MissingHost,
                        bytes_received: true,
                    });
                }
                return Err(classify_line_error(e, true));
            }
            Err(e) => return Err(classify_line_error(e, true)),
        };

        if line.is_empty() {
            break;
        }

        // Strict split: exactly one name and one value around ": ".
        let (name, value) = match line.split_once(": ") {
            Some((name, value)) => (name, value),
            None => {
                return Err(RequestError::Parse {
                    source: ParseError::MalformedHeader(line),
                    bytes_received: true,
                });
            }
        };

        match name {
            HEADER_HOST => host = value.trim().to_string(),
            HEADER_CONNECTION => close = value.trim() == CONNECTION_CLOSE,
            _ => {
                header.insert(canonical_header_key(name), value.trim().to_string());
            }
        }
    }

    if host.is_empty() {
        return Err(RequestError::Parse {
            source: ParseError::MissingHost,
            bytes_received: true,
        });
    }

    Ok(Request {
        method,
        url,
        proto,
        host,
        close,
        header,
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(bytes: &[u8]) -> Result<Request, RequestError> {
        read_request(&mut Cursor::new(bytes.to_vec()))
    }

    #[test]
    fn canonicalizes_header_keys() {
        assert_eq!(canonical_header_key("host"), "Host");
        assert_eq!(canonical_header_key("content-LENGTH"), "Content-Length");
        assert_eq!(canonical_header_key("X-forwarded-for"), "X-Forwarded-For");
        assert_eq!(canonical_header_key("ACCEPT"), "Accept");
    }

    #[test]
    fn parses_minimal_valid_request() {
        let req = parse(b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.url, "/index.html");
        assert_eq!(req.proto, "HTTP/1.1");
        assert_eq!(req.host, "localhost");
        assert!(!req.close);
        assert!(req.header.is_empty());
    }

    #[test]
    fn host_and_connection_stay_out_of_the_generic_map() {
        let req = parse(
            b"GET / HTTP/1.1\r\nHost: a\r\nConnection: close\r\nuser-agent: curl\r\n\r\n",
        )
        .unwrap();
        assert!(req.close);
        assert!(!req.header.contains_key("Host"));
        assert!(!req.header.contains_key("Connection"));
        assert_eq!(req.header.get("User-Agent").map(String::as_str), Some("curl"));
    }

    #[test]
    fn connection_value_other_than_close_is_not_close() {
        let req = parse(b"GET / HTTP/1.1\r\nHost: a\r\nConnection: keep-alive\r\n\r\n").unwrap();
        assert!(!req.close);
    }

    #[test]
    fn header_values_are_trimmed() {
        let req = parse(b"GET / HTTP/1.1\r\nHost:   a  \r\nAccept:  text/html \r\n\r\n").unwrap();
        assert_eq!(req.host, "a");
        assert_eq!(req.header.get("Accept").map(String::as_str), Some("text/html"));
    }

    #[test]
    fn empty_start_line_is_classified() {
        let err = parse(b"\r\nHost: a\r\n\r\n").unwrap_err();
        assert!(matches!(
            err,
            RequestError::Parse {
                source: ParseError::EmptyStartLine,
                ..
            }
        ));
    }

    #[test]
    fn short_start_lines_are_classified_by_field_count() {
        let err = parse(b"GET\r\n\r\n").unwrap_err();
        assert!(matches!(
            err,
            RequestError::Parse {
                source: ParseError::MissingUrl,
                ..
            }
        ));

        let err = parse(b"GET /\r\n\r\n").unwrap_err();
        assert!(matches!(
            err,
            RequestError::Parse {
                source: ParseError::MissingProto,
                ..
            }
        ));
    }

    #[test]
    fn non_get_method_is_rejected() {
        let err = parse(b"POST / HTTP/1.1\r\nHost: a\r\n\r\n").unwrap_err();
        assert!(matches!(
            err,
            RequestError::Parse {
                source: ParseError::InvalidMethod(_),
                ..
            }
        ));
    }

    #[test]
    fn url_must_start_with_slash() {
        let err = parse(b"GET index.html HTTP/1.1\r\nHost: a\r\n\r\n").unwrap_err();
        assert!(matches!(
            err,
            RequestError::Parse {
                source: ParseError::MalformedUrl(_),
                ..
            }
        ));
    }

    #[test]
    fn proto_must_be_http11() {
        let err = parse(b"GET / HTTP/1.0\r\nHost: a\r\n\r\n").unwrap_err();
        assert!(matches!(
            err,
            RequestError::Parse {
                source: ParseError::InvalidProto(_),
                ..
            }
        ));
    }

    #[test]
    fn header_without_colon_space_is_malformed() {
        let err = parse(b"GET / HTTP/1.1\r\nHost: a\r\nBadHeader\r\n\r\n").unwrap_err();
        assert!(matches!(
            err,
            RequestError::Parse {
                source: ParseError::MalformedHeader(_),
                ..
            }
        ));

        let err = parse(b"GET / HTTP/1.1\r\nHost: a\r\nName:no-space\r\n\r\n").unwrap_err();
        assert!(matches!(
            err,
            RequestError::Parse {
                source: ParseError::MalformedHeader(_),
                ..
            }
        ));
    }

    #[test]
    fn missing_host_is_classified() {
        let err = parse(b"GET / HTTP/1.1\r\n\r\n").unwrap_err();
        assert!(matches!(
            err,
            RequestError::Parse {
                source: ParseError::MissingHost,
                bytes_received: true,
            }
        ));
    }

    #[test]
    fn eof_before_blank_line_without_host_is_missing_host() {
        let err = parse(b"GET / HTTP/1.1\r\nAccept: text/html\r\n").unwrap_err();
        assert!(matches!(
            err,
            RequestError::Parse {
                source: ParseError::MissingHost,
                bytes_received: true,
            }
        ));
    }

    #[test]
    fn eof_before_blank_line_with_host_is_a_stream_error() {
        let err = parse(b"GET / HTTP/1.1\r\nHost: a\r\n").unwrap_err();
        assert!(matches!(
            err,
            RequestError::StreamEnded {
                bytes_received: true,
            }
        ));
    }

    #[test]
    fn clean_close_before_any_bytes_reports_no_bytes() {
        let err = parse(b"").unwrap_err();
        assert!(matches!(
            err,
            RequestError::StreamEnded {
                bytes_received: false,
            }
        ));
        assert!(!err.bytes_received());
    }

    #[test]
    fn eof_mid_start_line_reports_bytes_received() {
        let err = parse(b"GET / HT").unwrap_err();
        assert!(matches!(
            err,
            RequestError::StreamEnded {
                bytes_received: true,
            }
        ));
    }
}
