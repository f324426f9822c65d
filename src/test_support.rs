//! Local HTTP server for exercising the outbound clients in tests

use std::io::Read;
use std::sync::{Arc, Mutex};
use tiny_http::{Header, Response, Server};

pub struct MockResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: &'static str,
}

impl MockResponse {
    pub fn ok(body: Vec<u8>) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: Vec<u8>) -> Self {
        Self { status, body, content_type: "application/octet-stream" }
    }

    pub fn json(body: &str) -> Self {
        Self { status: 200, body: body.as_bytes().to_vec(), content_type: "application/json" }
    }

    pub fn html(body: &str) -> Self {
        Self { status: 200, body: body.as_bytes().to_vec(), content_type: "text/html" }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct MockServer {
    pub url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServer {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Request paths (with query string) in arrival order
    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }
}

/// Serve the given responses in order, one per incoming request
pub fn serve(responses: Vec<MockResponse>) -> MockServer {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = requests.clone();

    std::thread::spawn(move || {
        for mock in responses {
            let mut request = match server.recv() {
                Ok(r) => r,
                Err(_) => return,
            };

            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            recorded.lock().unwrap().push(RecordedRequest {
                url: request.url().to_string(),
                headers: request
                    .headers()
                    .iter()
                    .map(|h| (h.field.to_string(), h.value.to_string()))
                    .collect(),
                body,
            });

            let header = Header::from_bytes(&b"Content-Type"[..], mock.content_type.as_bytes()).unwrap();
            let response = Response::from_data(mock.body)
                .with_status_code(mock.status)
                .with_header(header);
            let _ = request.respond(response);
        }
    });

    MockServer { url: format!("http://{}", addr), requests }
}
