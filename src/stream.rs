use std::io::{self, BufRead, Read};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use thiserror::Error;


/// Upper bound on a single request line or header line. Anything longer is
/// reported as `TooLong` and ends up as a 400.
pub const MAX_LINE_LEN: usize = 8192;

#[derive(Debug, Error)]
pub enum LineError {
    /// The stream ended with no partial line pending.
    #[error("stream closed")]
    Closed,

    /// The stream ended in the middle of a line.
    #[error("stream closed mid line")]
    UnexpectedEof,

    /// A line feed arrived without a preceding carriage return.
    #[error("line feed without carriage return")]
    BareLineFeed,

    /// The line contains bytes that are not valid UTF-8.
    #[error("line is not valid UTF-8")]
    InvalidUtf8,

    #[error("line exceeds {MAX_LINE_LEN} bytes")]
    TooLong,

    /// The read deadline elapsed. `partial` is true if some bytes of the
    /// line had already been consumed.
    #[error("read timed out")]
    TimedOut { partial: bool },

    #[error("io error: {0}")]
    Io(io::Error),
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Read one line terminated by `\r\n` and return it with the terminator
/// stripped. The terminator is strict: a bare `\n` is an error, and end of
/// stream in the middle of a line is an error.
pub fn read_line(r: &mut impl BufRead) -> Result<String, LineError> {
    let mut line: Vec<u8> = Vec::new();

    loop {
        let (found, used) = {
            let available = match r.fill_buf() {
                Ok(chunk) => chunk,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(ref e) if is_timeout(e) => {
                    return Err(LineError::TimedOut { partial: !line.is_empty() });
                }
                Err(e) => return Err(LineError::Io(e)),
            };
            if available.is_empty() {
                if line.is_empty() {
                    return Err(LineError::Closed);
                }
                return Err(LineError::UnexpectedEof);
            }
            match available.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    line.extend_from_slice(&available[..pos]);
                    (true, pos + 1)
                }
                None => {
                    line.extend_from_slice(available);
                    (false, available.len())
                }
            }
        };
        r.consume(used);

        if line.len() > MAX_LINE_LEN {
            return Err(LineError::TooLong);
        }
        if found {
            if line.last() != Some(&b'\r') {
                return Err(LineError::BareLineFeed);
            }
            line.pop();
            return String::from_utf8(line).map_err(|_| LineError::InvalidUtf8);
        }
    }
}


/// A `TcpStream` whose reads observe an absolute deadline. The deadline is
/// re-armed by the connection handler at the top of every request, so all
/// line reads belonging to one request share a single budget.
pub struct DeadlineStream {
    inner: TcpStream,
    deadline: Instant,
}

impl DeadlineStream {
    pub fn new(inner: TcpStream, timeout: Duration) -> DeadlineStream {
        DeadlineStream {
            inner,
            deadline: Instant::now() + timeout,
        }
    }

    pub fn arm(&mut self, timeout: Duration) {
        self.deadline = Instant::now() + timeout;
    }
}

impl Read for DeadlineStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "read deadline elapsed"));
        }
        self.inner.set_read_timeout(Some(remaining))?;
        self.inner.read(buf)
    }
}
