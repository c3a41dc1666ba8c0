//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use refetch::error::TransportError;
use refetch::http::{HttpResponse, RequestInit, Transport};
use refetch::lifecycle::AbortSignal;
use reqwest::StatusCode;

/// Start a programmable mock backend with async support.
pub async fn start_programmable_backend<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        // Drain the request head before answering
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Start a backend that accepts connections and never answers.
pub async fn start_stalled_backend(addr: SocketAddr) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
}

/// One scripted transport behaviour.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// Respond with this status.
    Status(u16),
    /// Fail with a transport error.
    Fail,
    /// Never settle; count the cancellation when the signal fires.
    Hang,
}

/// In-memory transport that replays a script, then repeats a fallback step.
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicU32,
    cancelled: Arc<AtomicU32>,
    seen: Mutex<Vec<RequestInit>>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>, fallback: Step) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            fallback,
            calls: AtomicU32::new(0),
            cancelled: Arc::new(AtomicU32::new(0)),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn always(step: Step) -> Self {
        Self::new([], step)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> u32 {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<RequestInit> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    type Response = HttpResponse;

    async fn perform(
        &self,
        _resource: &str,
        init: &RequestInit,
        signal: AbortSignal,
    ) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(init.clone());
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(self.fallback);

        match step {
            Step::Status(code) => {
                let status = StatusCode::from_u16(code).unwrap();
                Ok(HttpResponse::new(status, format!("status {}", code)))
            }
            Step::Fail => Err(TransportError::other("connection reset")),
            Step::Hang => {
                let cancelled = self.cancelled.clone();
                tokio::spawn(async move {
                    signal.aborted().await;
                    cancelled.fetch_add(1, Ordering::SeqCst);
                });
                std::future::pending().await
            }
        }
    }
}
