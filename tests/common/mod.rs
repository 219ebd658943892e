use captchaforge::test_utils::{FIXTURE_FONT, FIXTURE_FONT_MONO};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;

/// Canned response for one path.
#[derive(Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl MockResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }
}

/// Minimal HTTP server standing in for the remote font repository.
pub struct MockFontServer {
    pub port: u16,
    pub requests: Arc<AtomicUsize>,
    _runtime: Runtime,
}

impl MockFontServer {
    pub fn listing_url(&self) -> String {
        format!("http://127.0.0.1:{}/listing", self.port)
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Serves `/listing` with a directory listing of the default fixture set:
    /// two good fonts, one corrupt font, one 404, and non-font entries.
    pub fn spawn_default() -> Self {
        Self::spawn(|port| {
            let file = |name: &str| format!("http://127.0.0.1:{port}/files/{name}");
            let listing = serde_json::json!([
                {"name": "Good-One.ttf", "download_url": file("Good-One.ttf"), "type": "file"},
                {"name": "Good-Two.ttf", "download_url": file("Good-Two.ttf"), "type": "file"},
                {"name": "Corrupt.ttf", "download_url": file("Corrupt.ttf"), "type": "file"},
                {"name": "Missing.ttf", "download_url": file("Missing.ttf"), "type": "file"},
                {"name": "../Escape.ttf", "download_url": file("Good-One.ttf"), "type": "file"},
                {"name": "README.md", "download_url": file("README.md"), "type": "file"},
                {"name": "family", "download_url": null, "type": "dir"}
            ]);

            HashMap::from([
                ("/listing".to_string(), MockResponse::ok(listing.to_string())),
                ("/files/Good-One.ttf".to_string(), MockResponse::ok(FIXTURE_FONT)),
                ("/files/Good-Two.ttf".to_string(), MockResponse::ok(FIXTURE_FONT_MONO)),
                (
                    "/files/Corrupt.ttf".to_string(),
                    MockResponse::ok(&b"<html>not a font</html>"[..]),
                ),
                ("/files/README.md".to_string(), MockResponse::ok(&b"# fonts"[..])),
            ])
        })
    }

    /// Serves routes built from the bound port; unknown paths get 404.
    pub fn spawn(routes: impl FnOnce(u16) -> HashMap<String, MockResponse>) -> Self {
        let runtime = Runtime::new().unwrap();
        let listener = runtime.block_on(TcpListener::bind("127.0.0.1:0")).unwrap();
        let port = listener.local_addr().unwrap().port();
        let routes = Arc::new(routes(port));
        let requests = Arc::new(AtomicUsize::new(0));

        let counter = requests.clone();
        runtime.spawn(async move {
            loop {
                if let Ok((mut socket, _)) = listener.accept().await {
                    let routes = routes.clone();
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 4096];
                        let mut read = 0;
                        while read < buf.len() {
                            match socket.read(&mut buf[read..]).await {
                                Ok(0) | Err(_) => break,
                                Ok(n) => read += n,
                            }
                            if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                        counter.fetch_add(1, Ordering::SeqCst);

                        let request = String::from_utf8_lossy(&buf[..read]);
                        let path = request
                            .lines()
                            .next()
                            .and_then(|line| line.split_whitespace().nth(1))
                            .unwrap_or("/")
                            .to_string();
                        let response = routes
                            .get(&path)
                            .cloned()
                            .unwrap_or_else(|| MockResponse::status(404));

                        let head = format!(
                            "HTTP/1.1 {} Mock\r\nContent-Length: {}\r\n\
                             Content-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
                            response.status,
                            response.body.len()
                        );
                        let _ = socket.write_all(head.as_bytes()).await;
                        let _ = socket.write_all(&response.body).await;
                        let _ = socket.shutdown().await;
                    });
                }
            }
        });

        Self {
            port,
            requests,
            _runtime: runtime,
        }
    }
}

/// Lists the `.png` file names in `dir`, sorted.
pub fn png_names(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .flatten()
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| n.ends_with(".png"))
        .collect();
    names.sort();
    names
}
