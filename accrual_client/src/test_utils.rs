//! A scripted stand-in for the accrual system, for use in tests.
//!
//! The server answers every request for a known path with a canned response and records how often each path was hit.
//! Unknown paths get a `204 No Content`, which is exactly how the real accrual system treats unknown orders.
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use log::*;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ScriptedResponse {
    pub fn ok(body: &str) -> Self {
        Self { status: 200, headers: vec![], body: body.to_string() }
    }

    pub fn processed(order: &str, accrual: &str) -> Self {
        Self::ok(&format!(r#"{{"order":"{order}","status":"PROCESSED","accrual":{accrual}}}"#))
    }

    pub fn with_status(order: &str, status: &str) -> Self {
        Self::ok(&format!(r#"{{"order":"{order}","status":"{status}"}}"#))
    }

    pub fn no_content() -> Self {
        Self { status: 204, headers: vec![], body: String::new() }
    }

    pub fn too_many_requests(retry_after: Option<u64>) -> Self {
        let headers = retry_after.map(|s| vec![("Retry-After".to_string(), s.to_string())]).unwrap_or_default();
        Self { status: 429, headers, body: "No more than N requests per minute allowed".to_string() }
    }

    pub fn server_error() -> Self {
        Self { status: 500, headers: vec![], body: "internal error".to_string() }
    }

    fn to_http(&self) -> String {
        let reason = match self.status {
            200 => "OK",
            204 => "No Content",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            _ => "Unknown",
        };
        let mut result = format!("HTTP/1.1 {} {reason}\r\nConnection: close\r\n", self.status);
        for (name, value) in &self.headers {
            result.push_str(&format!("{name}: {value}\r\n"));
        }
        if self.status != 204 {
            result.push_str("Content-Type: application/json\r\n");
            result.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        }
        result.push_str("\r\n");
        result.push_str(&self.body);
        result
    }
}

pub struct ScriptedOracle {
    addr: SocketAddr,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    handle: JoinHandle<()>,
}

impl ScriptedOracle {
    /// Starts the server on a random local port. `orders` maps order numbers to the response the server gives for
    /// `GET /api/orders/{number}`.
    pub async fn start(orders: HashMap<String, ScriptedResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Could not bind scripted oracle");
        let addr = listener.local_addr().expect("Scripted oracle has no local address");
        let routes = Arc::new(
            orders.into_iter().map(|(number, r)| (format!("/api/orders/{number}"), r)).collect::<HashMap<_, _>>(),
        );
        let hits = Arc::new(Mutex::new(HashMap::new()));
        let hits_copy = Arc::clone(&hits);
        let handle = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let routes = Arc::clone(&routes);
                let hits = Arc::clone(&hits_copy);
                tokio::spawn(async move {
                    if let Err(e) = respond(socket, &routes, &hits).await {
                        warn!("🔮️ Scripted oracle connection failed: {e}");
                    }
                });
            }
        });
        debug!("🔮️ Scripted oracle listening on {addr}");
        Self { addr, hits, handle }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// The number of times the oracle was asked about the given order number.
    pub fn hits(&self, order_number: &str) -> usize {
        let path = format!("/api/orders/{order_number}");
        self.hits.lock().map(|h| h.get(&path).copied().unwrap_or(0)).unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().map(|h| h.values().sum()).unwrap_or(0)
    }
}

impl Drop for ScriptedOracle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn respond(
    mut socket: TcpStream,
    routes: &HashMap<String, ScriptedResponse>,
    hits: &Mutex<HashMap<String, usize>>,
) -> std::io::Result<()> {
    let mut request = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&chunk[..n]);
        if request.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    let request = String::from_utf8_lossy(&request);
    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
    if let Ok(mut hits) = hits.lock() {
        *hits.entry(path.clone()).or_insert(0) += 1;
    }
    let response = routes.get(&path).cloned().unwrap_or_else(ScriptedResponse::no_content);
    socket.write_all(response.to_http().as_bytes()).await?;
    socket.shutdown().await
}
