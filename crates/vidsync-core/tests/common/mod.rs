#![allow(dead_code)]

use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Default)]
struct RegistryState {
    assets: Vec<Value>,
    next_id: u64,
    fail_next: VecDeque<u16>,
    requests: Vec<RecordedRequest>,
}

/// In-process asset registry speaking just enough HTTP/1.1 for `ureq`.
///
/// Every connection carries one request and is closed after the response.
pub struct FakeRegistry {
    addr: String,
    state: Arc<Mutex<RegistryState>>,
}

impl FakeRegistry {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let state = Arc::new(Mutex::new(RegistryState {
            next_id: 1,
            ..RegistryState::default()
        }));

        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let _ = handle(stream, &shared);
            }
        });

        Self { addr, state }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/api/", self.addr)
    }

    /// Store an asset as if another worker had created it. Returns its id.
    pub fn seed(&self, mut asset: Value) -> u64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        asset["id"] = json!(id);
        state.assets.push(asset);
        id
    }

    /// Answer the next request with `status` instead of handling it.
    pub fn fail_next(&self, status: u16) {
        self.state.lock().unwrap().fail_next.push_back(status);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.method).collect()
    }

    pub fn assets(&self) -> Vec<Value> {
        self.state.lock().unwrap().assets.clone()
    }
}

/// Endpoint of a port nothing listens on.
pub fn closed_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/api/", addr)
}

fn handle(stream: TcpStream, state: &Mutex<RegistryState>) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut content_length = 0usize;
    let mut authorization = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim().to_string();
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.parse().unwrap_or(0),
                "authorization" => authorization = Some(value),
                _ => {}
            }
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;
    let body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<Value>(&body).ok()
    };

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path.to_string(), parse_query(query)),
        None => (target.clone(), Vec::new()),
    };

    let request = RecordedRequest {
        method,
        path,
        query,
        authorization,
        body,
    };
    let (status, response) = respond(&request, state);
    write_response(stream, status, &response)
}

fn respond(request: &RecordedRequest, state: &Mutex<RegistryState>) -> (u16, Value) {
    let mut state = state.lock().unwrap();
    state.requests.push(request.clone());

    if let Some(status) = state.fail_next.pop_front() {
        return (status, json!({"detail": "injected failure"}));
    }

    let segments: Vec<&str> = request
        .path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    match (request.method.as_str(), segments.as_slice()) {
        ("GET", ["api", "assets"]) => {
            let title_contains = query_value(&request.query, "title_contains").unwrap_or("");
            let checksum = query_value(&request.query, "checksum");
            let results: Vec<Value> = state
                .assets
                .iter()
                .filter(|asset| {
                    asset["title"]
                        .as_str()
                        .is_some_and(|title| title.contains(title_contains))
                })
                .filter(|asset| {
                    checksum.map_or(true, |c| asset["master_metadata"]["checksum"] == json!(c))
                })
                .cloned()
                .collect();
            (200, json!({"count": results.len(), "results": results}))
        }
        ("POST", ["api", "assets"]) => {
            let mut asset = request.body.clone().unwrap_or_else(|| json!({}));
            let id = state.next_id;
            state.next_id += 1;
            asset["id"] = json!(id);
            state.assets.push(asset.clone());
            (201, asset)
        }
        ("PATCH", ["api", "assets", id]) => {
            let Some(asset) = state
                .assets
                .iter_mut()
                .find(|asset| asset["id"].to_string() == *id)
            else {
                return (404, json!({"detail": "Not found."}));
            };
            if let (Some(target), Some(Value::Object(fields))) =
                (asset.as_object_mut(), request.body.as_ref())
            {
                merge(target, fields);
            }
            (200, asset.clone())
        }
        _ => (404, json!({"detail": "Not found."})),
    }
}

fn merge(target: &mut Map<String, Value>, fields: &Map<String, Value>) {
    for (key, value) in fields {
        target.insert(key.clone(), value.clone());
    }
}

fn write_response(mut stream: TcpStream, status: u16, body: &Value) -> std::io::Result<()> {
    let body = body.to_string();
    let reason = match status {
        200 => "OK",
        201 => "Created",
        404 => "Not Found",
        503 => "Service Unavailable",
        _ => "Status",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes())?;
    stream.flush()
}

fn query_value<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (percent_decode(key), percent_decode(value))
        })
        .collect()
}

fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
                match u8::from_str_radix(hex, 16) {
                    Ok(byte) => {
                        out.push(byte);
                        i += 2;
                    }
                    Err(_) => out.push(b'%'),
                }
            }
            byte => out.push(byte),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
