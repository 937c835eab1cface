//! Loopback origins for in-crate tests.
//!
//! Sandboxed runners sometimes refuse to bind `127.0.0.1`. Tests that need an
//! origin then return early with a note on stderr, unless
//! `TREEGET_REQUIRE_LOOPBACK` is set, in which case they fail.

use std::net::TcpListener as StdListener;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wiremock::MockServer;

fn bind_loopback() -> Option<StdListener> {
    match StdListener::bind("127.0.0.1:0") {
        Ok(listener) => Some(listener),
        Err(e) if std::env::var_os("TREEGET_REQUIRE_LOOPBACK").is_some() => {
            panic!("cannot bind 127.0.0.1 for a test origin: {e}")
        }
        Err(e) => {
            eprintln!("cannot bind 127.0.0.1 ({e}), skipping origin-backed test");
            None
        }
    }
}

/// Wiremock origin on an already bound loopback listener.
pub(crate) async fn mock_origin() -> Option<MockServer> {
    let listener = bind_loopback()?;
    Some(MockServer::builder().listener(listener).start().await)
}

/// One piece of a hand-written response body.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Step {
    Send(&'static [u8]),
    Pause(Duration),
}

/// Raw HTTP origin for bodies wiremock cannot shape: slow drips and early
/// hang-ups. Every request gets `head`; non-HEAD requests then get `body`
/// before the connection closes. Returns the base URL.
pub(crate) async fn scripted_origin(head: &'static str, body: Vec<Step>) -> Option<String> {
    let std_listener = bind_loopback()?;
    std_listener.set_nonblocking(true).ok()?;
    let listener = TcpListener::from_std(std_listener).ok()?;
    let addr = listener.local_addr().ok()?;

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let body = body.clone();
            tokio::spawn(answer(stream, head, body));
        }
    });
    Some(format!("http://{addr}"))
}

async fn answer(mut stream: TcpStream, head: &'static str, body: Vec<Step>) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }

    if stream.write_all(head.as_bytes()).await.is_err() {
        return;
    }
    if !request.starts_with(b"HEAD ") {
        for step in body {
            match step {
                Step::Send(bytes) => {
                    if stream.write_all(bytes).await.is_err() {
                        return;
                    }
                    let _ = stream.flush().await;
                }
                Step::Pause(gap) => tokio::time::sleep(gap).await,
            }
        }
    }
    let _ = stream.shutdown().await;
}
