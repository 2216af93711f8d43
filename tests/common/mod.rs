#![allow(dead_code)]

use binance_wsapi::{SessionConfig, TransportConfig};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// How the mock WebSocket API answers
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Answer every request with its own id, echoing method and params.
    /// Method `fail` gets an error object instead.
    Echo,
    /// Hold `n` requests, then answer them in reverse order
    ReverseBatch(usize),
    /// Record requests, never answer
    Record,
    /// Close the connection on the first request
    CloseAfterFirst,
    /// Push these frames right after the handshake, then keep reading
    Push(Vec<String>),
    /// Complete the handshake, then never read again (no pongs)
    Silent,
}

pub struct MockServer {
    pub url: String,
    pub requests: mpsc::UnboundedReceiver<Value>,
    connections: Arc<AtomicUsize>,
}

impl MockServer {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, requests) = mpsc::unbounded_channel();
        let connections = Arc::new(AtomicUsize::new(0));

        let counter = connections.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(handle(stream, behavior.clone(), tx.clone()));
            }
        });

        Self {
            url: format!("ws://{}", addr),
            requests,
            connections,
        }
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub async fn next_request(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(5), self.requests.recv())
            .await
            .expect("no request reached the server")
            .expect("server stopped")
    }

    pub fn config(&self) -> SessionConfig {
        SessionConfig::new("k", "s3cr3t")
            .endpoint(self.url.clone())
            .name("mock")
    }
}

/// Transport constants small enough for keepalive tests
pub fn fast_transport() -> TransportConfig {
    TransportConfig {
        connect_timeout: Duration::from_secs(2),
        ping_interval: Duration::from_millis(100),
        ping_timeout: Duration::from_millis(100),
        liveness_window: Duration::from_millis(300),
        request_timeout: Duration::from_secs(2),
        ..TransportConfig::default()
    }
}

fn respond(request: &Value) -> Value {
    if request["method"] == "fail" {
        return json!({
            "id": request["id"],
            "status": 400,
            "error": {"code": -1102, "msg": "Mandatory parameter 'symbol' was not sent"},
        });
    }
    json!({
        "id": request["id"],
        "status": 200,
        "result": {"method": request["method"], "params": request["params"]},
        "rateLimits": [{
            "rateLimitType": "REQUEST_WEIGHT",
            "interval": "MINUTE",
            "intervalNum": 1,
            "limit": 6000,
            "count": 1
        }],
    })
}

async fn handle(stream: TcpStream, behavior: Behavior, requests: mpsc::UnboundedSender<Value>) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };

    if matches!(behavior, Behavior::Silent) {
        let _ws = ws;
        std::future::pending::<()>().await;
        return;
    }

    let (mut write, mut read) = ws.split();

    if let Behavior::Push(frames) = &behavior {
        for frame in frames {
            if write.send(Message::Text(frame.clone())).await.is_err() {
                return;
            }
        }
    }

    let mut held = Vec::new();
    while let Some(Ok(msg)) = read.next().await {
        let Message::Text(text) = msg else {
            continue;
        };
        let Ok(request) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        let _ = requests.send(request.clone());

        match &behavior {
            Behavior::Echo => {
                if write.send(Message::Text(respond(&request).to_string())).await.is_err() {
                    return;
                }
            }
            Behavior::ReverseBatch(n) => {
                held.push(request);
                if held.len() == *n {
                    for request in held.drain(..).rev() {
                        if write.send(Message::Text(respond(&request).to_string())).await.is_err() {
                            return;
                        }
                    }
                }
            }
            Behavior::CloseAfterFirst => {
                let _ = write.send(Message::Close(None)).await;
                return;
            }
            Behavior::Record | Behavior::Push(_) | Behavior::Silent => {}
        }
    }
}
