//! A mock listing/file origin that serves a whole tree.
//!
//! [`Origin::start`] returns `None` when `127.0.0.1` cannot be bound, so
//! socket-less sandboxes skip these tests. Set `TREEGET_REQUIRE_LOOPBACK` to
//! turn that skip into a failure.

#![allow(dead_code)]

use std::net::TcpListener;
use std::ops::Deref;

use futures_util::future::LocalBoxFuture;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Node of a served tree; files carry their content.
pub enum Node {
    Dir {
        id: &'static str,
        name: &'static str,
        children: Vec<Node>,
    },
    File {
        id: &'static str,
        name: &'static str,
        body: &'static [u8],
    },
}

pub fn dir(id: &'static str, name: &'static str, children: Vec<Node>) -> Node {
    Node::Dir { id, name, children }
}

pub fn file(id: &'static str, name: &'static str, body: &'static [u8]) -> Node {
    Node::File { id, name, body }
}

fn child_json(node: &Node, parent: &str) -> Value {
    match node {
        Node::Dir { id, name, .. } => json!({"id": id, "name": name, "dir": true, "parent": parent}),
        Node::File { id, name, .. } => {
            json!({"id": id, "name": name, "dir": false, "parent": parent})
        }
    }
}

/// Wiremock server speaking the listing (`/api/d/`) and file (`/f/`) endpoints.
pub struct Origin {
    server: MockServer,
}

impl Deref for Origin {
    type Target = MockServer;

    fn deref(&self) -> &MockServer {
        &self.server
    }
}

impl Origin {
    pub async fn start() -> Option<Self> {
        let listener = match TcpListener::bind("127.0.0.1:0") {
            Ok(listener) => listener,
            Err(e) if std::env::var_os("TREEGET_REQUIRE_LOOPBACK").is_some() => {
                panic!("cannot bind 127.0.0.1 for the mock origin: {e}")
            }
            Err(e) => {
                eprintln!("cannot bind 127.0.0.1 ({e}), skipping origin-backed test");
                return None;
            }
        };
        let server = MockServer::builder().listener(listener).start().await;
        Some(Self { server })
    }

    /// Serves `node` and everything below it; `parent` is the listing's parent id.
    pub fn serve_tree<'a>(&'a self, node: &'a Node, parent: &'a str) -> LocalBoxFuture<'a, ()> {
        Box::pin(async move {
            match node {
                Node::Dir { id, name, children } => {
                    let files: Vec<Value> = children.iter().map(|c| child_json(c, id)).collect();
                    self.serve_listing(id, name, parent, files).await;
                    for child in children {
                        self.serve_tree(child, id).await;
                    }
                }
                Node::File { id, body, .. } => self.serve_file(id, *body).await,
            }
        })
    }

    /// Serves one directory listing, fetched at least once.
    pub async fn serve_listing(&self, id: &str, name: &str, parent: &str, files: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path(format!("/api/d/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"id": id, "name": name, "dir": true, "parent": parent, "files": files}
            })))
            .expect(1..)
            .mount(&self.server)
            .await;
    }

    /// Serves HEAD and full-body GET for one file.
    pub async fn serve_file(&self, id: &str, body: &'static [u8]) {
        Mock::given(method("HEAD"))
            .and(path(format!("/f/{id}")))
            .respond_with(
                ResponseTemplate::new(200).insert_header("Content-Length", body.len().to_string()),
            )
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/f/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&self.server)
            .await;
    }

    /// GET requests that reached a file endpoint so far.
    pub async fn file_gets(&self) -> usize {
        self.requests_where(|r| r.method.as_str() == "GET" && r.url.path().starts_with("/f/"))
            .await
    }

    /// HEAD requests received so far.
    pub async fn heads(&self) -> usize {
        self.requests_where(|r| r.method.as_str() == "HEAD").await
    }

    async fn requests_where(&self, keep: impl Fn(&wiremock::Request) -> bool) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| keep(r))
            .count()
    }
}
