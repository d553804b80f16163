use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::context::Context;
use crate::mime;
use crate::request::{read_request, Request, RequestError};
use crate::response::{Response, STATUS_NOT_FOUND};
use crate::stream::DeadlineStream;


const MODULE: &str = "SERVER";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause after a 400 produced by a mid-request timeout, so the response can
/// flush before the socket is torn down.
const WRITE_GRACE: Duration = Duration::from_millis(100);

const INDEX_FILE: &str = "index.html";

pub struct Server {
    addr: String,
    doc_root: PathBuf,
    timeout: Duration,
}

impl Server {
    pub fn new(addr: &str, doc_root: &str) -> Server {
        Server {
            addr: addr.to_string(),
            doc_root: PathBuf::from(doc_root),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Server {
        self.timeout = timeout;
        self
    }

    /// Bind the listen address and serve until the listener fails.
    pub fn listen_and_serve(&self) -> io::Result<()> {
        let listener = TcpListener::bind(&self.addr)?;
        info!("[{}] Listening on {}", MODULE, self.addr);
        self.serve(listener)
    }

    /// Serve connections accepted from `listener`. Split out from
    /// `listen_and_serve` so tests can bind port 0 themselves.
    pub fn serve(&self, listener: TcpListener) -> io::Result<()> {
        // Resolve the document root once; every per-request containment
        // check compares against this absolute path.
        let doc_root = fs::canonicalize(&self.doc_root)?;
        info!("[{}] Serving files from `{}`", MODULE, doc_root.display());

        let timeout = self.timeout;

        // One thread per connection; a stalled worker never holds up the
        // accept loop or any other connection.
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let doc_root = doc_root.clone();
                    let spawned = thread::Builder::new()
                        .spawn(move || handle_connection(stream, doc_root, timeout));
                    if let Err(e) = spawned {
                        error!("[{}] Could not spawn connection worker: {}", MODULE, e);
                    }
                }
                Err(e) => {
                    error!("[{}] Accept error: {}", MODULE, e);
                }
            }
        }
        Ok(())
    }
}

/// Per-connection lifecycle loop. Each iteration re-arms the read deadline,
/// reads one request, and either answers it or classifies the failure:
/// clean close or idle timeout with nothing received ends the connection
/// silently, everything else gets a 400. A 404 and a `Connection: close`
/// request both end the connection after their response.
fn handle_connection(stream: TcpStream, doc_root: PathBuf, timeout: Duration) {
    let mut ctx = Context::new();
    let peer = match stream.peer_addr() {
        Ok(addr) => addr.to_string(),
        Err(_) => "unknown".to_string(),
    };
    info!("[{}] New connection from {} [cid={}]", MODULE, peer, ctx.cid);

    let write_half = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            error!("[{}] Could not clone stream for {} [cid={}]: {}", MODULE, peer, ctx.cid, e);
            return;
        }
    };
    let mut reader = BufReader::new(DeadlineStream::new(stream, timeout));
    let mut writer = BufWriter::new(write_half);

    loop {
        reader.get_mut().arm(timeout);
        ctx.reset();

        let req = match read_request(&mut reader) {
            Ok(req) => req,
            Err(RequestError::StreamEnded { bytes_received: false }) => {
                info!("[{}] Connection closed by {} [cid={}]", MODULE, peer, ctx.cid);
                return;
            }
            Err(RequestError::Timeout { bytes_received: false }) => {
                info!("[{}] Idle timeout for {} [cid={}]", MODULE, peer, ctx.cid);
                return;
            }
            Err(RequestError::Timeout { bytes_received: true }) => {
                warn!("[{}] Timed out mid request [cid={}]", MODULE, ctx.cid);
                respond_bad_request(&mut writer, &mut ctx);
                thread::sleep(WRITE_GRACE);
                return;
            }
            Err(e) => {
                warn!("[{}] Bad request from {} [cid={}]: {}", MODULE, peer, ctx.cid, e);
                respond_bad_request(&mut writer, &mut ctx);
                return;
            }
        };

        debug!(
            "[{}] Request [cid={}]: {} {} host={} close={}",
            MODULE, ctx.cid, req.method, req.url, req.host, req.close
        );

        let close_requested = req.close;
        let res = handle_good_request(req, &doc_root);
        let status = res.status_code;

        if let Err(e) = res.write(&mut writer) {
            // Headers may already be on the wire; nothing to do but drop
            // the connection.
            error!("[{}] Failed to write response [cid={}]: {}", MODULE, ctx.cid, e);
            return;
        }

        ctx.fix();
        info!(
            "[{}] Respond [cid={}]: status: {}; time: {:.3}ms",
            MODULE, ctx.cid, status, ctx.time_ms()
        );

        if status == STATUS_NOT_FOUND || close_requested {
            return;
        }
    }
}

fn respond_bad_request(w: &mut impl Write, ctx: &mut Context) {
    let res = Response::bad_request();
    if let Err(e) = res.write(w) {
        error!("[{}] Failed to write 400 [cid={}]: {}", MODULE, ctx.cid, e);
        return;
    }
    ctx.fix();
    info!(
        "[{}] Respond [cid={}]: status: {}; time: {:.3}ms",
        MODULE, ctx.cid, res.status_code, ctx.time_ms()
    );
}

/// Resolve the requested file and build the response for a valid request.
/// Anything that does not resolve to a regular file inside the document
/// root is a 404.
pub fn handle_good_request(req: Request, doc_root: &Path) -> Response {
    let file_path = match resolve_path(doc_root, &req.url) {
        Some(path) => path,
        None => return Response::not_found(req),
    };

    let meta = match fs::metadata(&file_path) {
        Ok(meta) if meta.is_file() => meta,
        _ => return Response::not_found(req),
    };

    let modified = meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
    let ext = file_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    let content_type = mime::by_extension(ext);

    let close = req.close;
    let mut res = Response::ok(req);
    res.header
        .insert("Last-Modified".to_string(), httpdate::fmt_http_date(modified));
    res.header
        .insert("Content-Type".to_string(), content_type.to_string());
    res.header
        .insert("Content-Length".to_string(), meta.len().to_string());
    if close {
        res.header
            .insert("Connection".to_string(), "close".to_string());
    }
    res.file_path = Some(file_path);
    res
}

/// Join the document root with the request URL, treating a URL ending in
/// `/` as `index.html` in that directory, then canonicalize. The resolved
/// path must still be inside the document root: `..` segments or symlinks
/// that escape it resolve to `None` and are served as 404. `doc_root` must
/// itself be canonical.
fn resolve_path(doc_root: &Path, url: &str) -> Option<PathBuf> {
    let mut target = url.to_string();
    if target.ends_with('/') {
        target.push_str(INDEX_FILE);
    }

    // URL is path-absolute; strip the leading slashes so join stays
    // relative to the root.
    let relative = target.trim_start_matches('/');
    let resolved = fs::canonicalize(doc_root.join(relative)).ok()?;

    if !resolved.starts_with(doc_root) {
        return None;
    }
    Some(resolved)
}
