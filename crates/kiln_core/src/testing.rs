//! A tiny loopback HTTP server for tests.
//!
//! Serves fixed responses per path and counts requests, so tests can
//! assert things like "this run made zero network calls" without
//! touching the internet. Only understands `GET` and always closes
//! the connection after one response.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

#[derive(Debug, Clone)]
pub enum Route {
    Ok(Vec<u8>),
    Status(u16),
    /// Answers `status` for the first `fails` requests, then `body`.
    FailThenOk {
        fails: usize,
        status: u16,
        body: Vec<u8>,
    },
}

impl Route {
    #[must_use]
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::Ok(body.into())
    }

    #[must_use]
    pub fn json(value: &serde_json::Value) -> Self {
        Self::Ok(value.to_string().into_bytes())
    }

    #[must_use]
    pub fn status(code: u16) -> Self {
        Self::Status(code)
    }

    #[must_use]
    pub fn fail_then_ok(fails: usize, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self::FailThenOk {
            fails,
            status,
            body: body.into(),
        }
    }
}

#[derive(Default)]
struct State {
    routes: HashMap<String, Route>,
    hits: HashMap<String, usize>,
}

pub struct TestServer {
    addr: SocketAddr,
    state: Arc<Mutex<State>>,
    task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Binds to a random loopback port and starts serving `routes`.
    /// Unknown paths answer 404.
    ///
    /// # Panics
    /// If no loopback port can be bound.
    pub async fn start<'a>(routes: impl IntoIterator<Item = (&'a str, Route)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind loopback test server");
        let addr = listener.local_addr().expect("test server address");
        let state = Arc::new(Mutex::new(State {
            routes: routes
                .into_iter()
                .map(|(path, route)| (path.to_owned(), route))
                .collect(),
            hits: HashMap::new(),
        }));

        let task_state = state.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = task_state.clone();
                tokio::spawn(async move {
                    _ = serve(stream, state).await;
                });
            }
        });

        Self { addr, state, task }
    }

    #[must_use]
    pub fn base(&self) -> String {
        format!("http://{}", self.addr)
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base())
    }

    /// Adds or replaces a route while the server runs.
    pub fn set(&self, path: &str, route: Route) {
        if let Ok(mut state) = self.state.lock() {
            state.routes.insert(path.to_owned(), route);
        }
    }

    /// Total requests served, on any path.
    #[must_use]
    pub fn hits(&self) -> usize {
        self.state
            .lock()
            .map(|s| s.hits.values().sum())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn hits_for(&self, path: &str) -> usize {
        self.state
            .lock()
            .map(|s| s.hits.get(path).copied().unwrap_or_default())
            .unwrap_or_default()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(mut stream: TcpStream, state: Arc<Mutex<State>>) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&buf[..n]);
    }

    let request = String::from_utf8_lossy(&request);
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_owned();

    let (status, body) = {
        let Ok(mut state) = state.lock() else {
            return Ok(());
        };
        let hit = {
            let hits = state.hits.entry(path.clone()).or_default();
            *hits += 1;
            *hits
        };
        match state.routes.get(&path) {
            Some(Route::Ok(body)) => (200, body.clone()),
            Some(Route::Status(code)) => (*code, Vec::new()),
            Some(Route::FailThenOk {
                fails,
                status,
                body,
            }) => {
                if hit <= *fails {
                    (*status, Vec::new())
                } else {
                    (200, body.clone())
                }
            }
            None => (404, Vec::new()),
        }
    };

    let head = format!(
        "HTTP/1.1 {status} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        if status == 200 { "OK" } else { "ERR" },
        body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(&body).await?;
    stream.shutdown().await
}
