use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::time::SystemTime;

use crate::request::Request;


pub const PROTO_HTTP11: &str = "HTTP/1.1";

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_NOT_FOUND: u16 = 404;

/// Chunk size for streaming file bodies. Memory use per connection stays
/// bounded no matter how large the served file is.
const BODY_CHUNK_SIZE: usize = 8192;

/// Fixed status-reason table for the codes this server emits.
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        STATUS_OK => "OK",
        STATUS_BAD_REQUEST => "Bad Request",
        STATUS_NOT_FOUND => "Not Found",
        _ => "",
    }
}

/// One outgoing message. Headers live in a `BTreeMap` so serialization is
/// byte-reproducible regardless of insertion order. `file_path` set means
/// the body is that file's content, streamed at write time; `None` means no
/// body. `request` is the request that led to this response, absent for
/// responses produced before a request could be parsed.
#[derive(Debug, Default)]
pub struct Response {
    pub status_code: u16,
    pub proto: &'static str,
    pub header: BTreeMap<String, String>,
    pub request: Option<Request>,
    pub file_path: Option<PathBuf>,
}

impl Response {
    fn init(status_code: u16) -> Response {
        let mut res = Response {
            status_code,
            proto: PROTO_HTTP11,
            ..Default::default()
        };
        res.header
            .insert("Date".to_string(), httpdate::fmt_http_date(SystemTime::now()));
        res
    }

    /// A 200 response for `req`. The caller fills in the file path and the
    /// file-derived headers before writing.
    pub fn ok(req: Request) -> Response {
        let mut res = Response::init(STATUS_OK);
        res.request = Some(req);
        res
    }

    /// A 400 response. Always closes the connection.
    pub fn bad_request() -> Response {
        let mut res = Response::init(STATUS_BAD_REQUEST);
        res.header
            .insert("Connection".to_string(), "close".to_string());
        res
    }

    /// A 404 response for `req`. No body.
    pub fn not_found(req: Request) -> Response {
        let mut res = Response::init(STATUS_NOT_FOUND);
        res.request = Some(req);
        res
    }

    /// Serialize the response to `w`: status line, headers in sorted order,
    /// blank line, then the body if any.
    pub fn write(&self, w: &mut impl Write) -> io::Result<()> {
        self.write_status_line(w)?;
        self.write_sorted_headers(w)?;
        self.write_body(w)?;
        w.flush()
    }

    fn write_status_line(&self, w: &mut impl Write) -> io::Result<()> {
        write!(
            w,
            "{} {} {}\r\n",
            self.proto,
            self.status_code,
            reason_phrase(self.status_code)
        )
    }

    fn write_sorted_headers(&self, w: &mut impl Write) -> io::Result<()> {
        for (name, value) in &self.header {
            write!(w, "{}: {}\r\n", name, value)?;
        }
        w.write_all(b"\r\n")
    }

    /// Stream the file body in bounded chunks, flushing each chunk before
    /// reading the next. An open or read failure here is fatal for the
    /// connection: the headers, Content-Length included, are already on the
    /// wire and cannot be retracted.
    fn write_body(&self, w: &mut impl Write) -> io::Result<()> {
        let path = match &self.file_path {
            Some(path) => path,
            None => return Ok(()),
        };

        let mut file = File::open(path)?;
        let mut buf = [0u8; BODY_CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            w.write_all(&buf[..n])?;
            w.flush()?;
        }
        Ok(())
    }
}
