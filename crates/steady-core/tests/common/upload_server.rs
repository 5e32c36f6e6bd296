//! Minimal HTTP/1.1 server implementing the file-upload API for integration tests.
//!
//! Routes (all relative to the returned base URL):
//! - `POST file_uploads` answers `{"id": "up_<n>"}`
//! - `POST file_uploads/{id}/send` stores the multipart `file` field under its `part_number`
//! - `POST file_uploads/{id}/complete` assembles the stored parts
//! - `GET throttled` answers 429 with `Retry-After: 1` once, then 200
//!
//! [`start_stalling`] is a separate server whose first connection never gets an
//! answer; it records how many connections are open at once.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct UploadServerOptions {
    /// Parts that answer 503 on their first attempt.
    pub fail_first_attempt: HashSet<u32>,
}

#[derive(Default)]
struct State {
    next_id: u32,
    parts: HashMap<String, BTreeMap<u32, Vec<u8>>>,
    attempts: HashMap<u32, u32>,
    completed: HashMap<String, Vec<u8>>,
    throttled_hits: u32,
}

#[derive(Clone)]
pub struct UploadServer {
    pub base_url: String,
    state: Arc<Mutex<State>>,
}

impl UploadServer {
    /// Send attempts seen for `part_number` across all sessions.
    pub fn attempts(&self, part_number: u32) -> u32 {
        self.state.lock().unwrap().attempts.get(&part_number).copied().unwrap_or(0)
    }

    /// Payload assembled by the complete call (or the single-shot send).
    pub fn completed(&self, id: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().completed.get(id).cloned()
    }

    pub fn throttled_hits(&self) -> u32 {
        self.state.lock().unwrap().throttled_hits
    }
}

/// Starts the server in a background thread. The server runs until the process exits.
pub fn start(opts: UploadServerOptions) -> UploadServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let state = Arc::new(Mutex::new(State::default()));
    let server_state = Arc::clone(&state);
    let opts = Arc::new(opts);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let state = Arc::clone(&server_state);
            let opts = Arc::clone(&opts);
            thread::spawn(move || handle(stream, &state, &opts));
        }
    });
    UploadServer {
        base_url: format!("http://127.0.0.1:{}/v1", port),
        state,
    }
}

struct Request {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn handle(mut stream: TcpStream, state: &Mutex<State>, opts: &UploadServerOptions) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(request) = read_request(&mut stream) else {
        return;
    };
    let (status, extra_headers, body) = route(&request, state, opts);
    let mut response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n",
        status,
        body.len()
    );
    for (name, value) in extra_headers {
        response.push_str(&format!("{}: {}\r\n", name, value));
    }
    response.push_str("\r\n");
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(body.as_bytes());
}

fn route(
    req: &Request,
    state: &Mutex<State>,
    opts: &UploadServerOptions,
) -> (&'static str, Vec<(&'static str, &'static str)>, String) {
    let segments: Vec<&str> = req.path.trim_start_matches("/v1/").split('/').collect();
    let mut st = state.lock().unwrap();
    match (req.method.as_str(), segments.as_slice()) {
        ("GET", ["throttled"]) => {
            st.throttled_hits += 1;
            if st.throttled_hits == 1 {
                ("429 Too Many Requests", vec![("Retry-After", "1")], "{}".into())
            } else {
                ("200 OK", vec![], r#"{"ok":true}"#.into())
            }
        }
        ("POST", ["file_uploads"]) => {
            st.next_id += 1;
            let id = format!("up_{}", st.next_id);
            st.parts.insert(id.clone(), BTreeMap::new());
            ("200 OK", vec![], format!(r#"{{"id":"{}","status":"pending"}}"#, id))
        }
        ("POST", ["file_uploads", id, "send"]) => {
            let Some(fields) = req.header("content-type").and_then(|ct| parse_multipart(ct, &req.body)) else {
                return ("400 Bad Request", vec![], r#"{"message":"expected multipart body"}"#.into());
            };
            let Some(file) = fields.get("file") else {
                return ("400 Bad Request", vec![], r#"{"message":"missing file"}"#.into());
            };
            let part_number = fields
                .get("part_number")
                .and_then(|v| std::str::from_utf8(v).ok())
                .and_then(|v| v.parse::<u32>().ok());
            let Some(n) = part_number else {
                st.completed.insert(id.to_string(), file.clone());
                return ("200 OK", vec![], r#"{"status":"uploaded"}"#.into());
            };
            let attempt = {
                let a = st.attempts.entry(n).or_insert(0);
                *a += 1;
                *a
            };
            if attempt == 1 && opts.fail_first_attempt.contains(&n) {
                return ("503 Service Unavailable", vec![], "{}".into());
            }
            match st.parts.get_mut(*id) {
                Some(parts) => {
                    parts.insert(n, file.clone());
                    ("200 OK", vec![], "{}".into())
                }
                None => ("404 Not Found", vec![], r#"{"message":"unknown upload"}"#.into()),
            }
        }
        ("POST", ["file_uploads", id, "complete"]) => {
            let Some(parts) = st.parts.get(*id) else {
                return ("404 Not Found", vec![], r#"{"message":"unknown upload"}"#.into());
            };
            let assembled: Vec<u8> = parts.values().flatten().copied().collect();
            st.completed.insert(id.to_string(), assembled);
            ("200 OK", vec![], r#"{"status":"uploaded"}"#.into())
        }
        _ => ("404 Not Found", vec![], "{}".into()),
    }
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut data = Vec::new();
    let mut buf = [0u8; 16 * 1024];
    let header_end = loop {
        if let Some(pos) = find(&data, b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
    };
    let head = std::str::from_utf8(&data[..header_end]).ok()?;
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();
    let content_length = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = data[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);
    Some(Request {
        method,
        path,
        headers,
        body,
    })
}

/// Field name -> raw value for a `multipart/form-data` body.
fn parse_multipart(content_type: &str, body: &[u8]) -> Option<HashMap<String, Vec<u8>>> {
    let boundary = content_type.split("boundary=").nth(1)?.trim();
    let delimiter = format!("--{}", boundary).into_bytes();
    let mut fields = HashMap::new();
    let mut rest = body;
    loop {
        let start = find(rest, &delimiter)? + delimiter.len();
        rest = &rest[start..];
        if rest.starts_with(b"--") {
            return Some(fields);
        }
        rest = rest.strip_prefix(b"\r\n")?;
        let headers_end = find(rest, b"\r\n\r\n")?;
        let headers = std::str::from_utf8(&rest[..headers_end]).ok()?;
        let name = headers
            .split("name=\"")
            .nth(1)
            .and_then(|s| s.split('"').next())?
            .to_string();
        let content = &rest[headers_end + 4..];
        let end = find(content, &delimiter)?;
        let value = content[..end].strip_suffix(b"\r\n")?;
        fields.insert(name, value.to_vec());
        rest = &content[end..];
    }
}

#[derive(Default)]
struct StallCounters {
    connections: AtomicU32,
    open: AtomicU32,
    max_open: AtomicU32,
}

pub struct StallingServer {
    pub url: String,
    counters: Arc<StallCounters>,
}

impl StallingServer {
    pub fn connections(&self) -> u32 {
        self.counters.connections.load(Ordering::SeqCst)
    }

    /// Most connections seen open at the same time.
    pub fn max_open(&self) -> u32 {
        self.counters.max_open.load(Ordering::SeqCst)
    }
}

/// Holds the first connection for `stall` without answering; later ones get 200.
/// A held connection counts as open until the client hangs up.
pub fn start_stalling(stall: Duration) -> StallingServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let counters = Arc::new(StallCounters::default());
    let server_counters = Arc::clone(&counters);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let counters = Arc::clone(&server_counters);
            thread::spawn(move || {
                let n = counters.connections.fetch_add(1, Ordering::SeqCst) + 1;
                let open = counters.open.fetch_add(1, Ordering::SeqCst) + 1;
                counters.max_open.fetch_max(open, Ordering::SeqCst);
                serve_stalling(stream, n == 1, stall);
                counters.open.fetch_sub(1, Ordering::SeqCst);
            });
        }
    });
    StallingServer {
        url: format!("http://127.0.0.1:{}/slow", port),
        counters,
    }
}

fn serve_stalling(mut stream: TcpStream, hold: bool, stall: Duration) {
    if read_request(&mut stream).is_none() {
        return;
    }
    if hold {
        let _ = stream.set_read_timeout(Some(Duration::from_millis(20)));
        let deadline = Instant::now() + stall;
        let mut buf = [0u8; 256];
        while Instant::now() < deadline {
            match stream.read(&mut buf) {
                // Client hung up.
                Ok(0) => return,
                Ok(_) => {}
                Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {}
                Err(_) => return,
            }
        }
    }
    let _ = stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok");
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
