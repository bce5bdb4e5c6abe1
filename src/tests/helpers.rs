// Shared test doubles: an in-process HTTP backend and a scripted transport

use crate::auth::{AuthClient, Identity};
use crate::config::ChatConfig;
use crate::store::Message;
use crate::transport::{AssistantReply, ChatTransport, SendRequest};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// A request seen by the mock backend
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body is not JSON")
    }
}

type Responder = Arc<dyn Fn(&Method, &str) -> (StatusCode, String) + Send + Sync>;

/// In-process HTTP backend bound to a random local port
pub struct MockBackend {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockBackend {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&Method, &str) -> (StatusCode, String) + Send + Sync + 'static,
    {
        Self::start_with_delay(Duration::ZERO, responder).await
    }

    pub async fn start_with_delay<F>(delay: Duration, responder: F) -> Self
    where
        F: Fn(&Method, &str) -> (StatusCode, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let addr = listener.local_addr().expect("No local address");

        let requests = Arc::new(Mutex::new(Vec::new()));
        let responder: Responder = Arc::new(responder);
        let recorded = requests.clone();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let io = TokioIo::new(stream);
                let responder = responder.clone();
                let recorded = recorded.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let responder = responder.clone();
                        let recorded = recorded.clone();
                        async move {
                            let method = req.method().clone();
                            let path = req.uri().path().to_string();
                            let body = req.collect().await?.to_bytes();

                            recorded.lock().unwrap().push(RecordedRequest {
                                method: method.clone(),
                                path: path.clone(),
                                body: body.to_vec(),
                            });

                            if !delay.is_zero() {
                                tokio::time::sleep(delay).await;
                            }

                            let (status, body) = responder(&method, &path);
                            Ok::<_, hyper::Error>(
                                Response::builder()
                                    .status(status)
                                    .header("Content-Type", "application/json")
                                    .body(Full::new(Bytes::from(body)))
                                    .unwrap(),
                            )
                        }
                    });

                    let _ = http1::Builder::new().serve_connection(io, service).await;
                });
            }
        });

        Self { addr, requests }
    }

    pub fn config(&self) -> ChatConfig {
        ChatConfig::with_base_url(format!("http://{}", self.addr))
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Base URL of a local port with nothing listening on it
pub async fn closed_port_config() -> ChatConfig {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind temporary listener");
    let addr = listener.local_addr().expect("No local address");
    drop(listener);
    ChatConfig::with_base_url(format!("http://{}", addr))
}

/// Auth client with a fixed identity
pub struct StaticAuth(pub Option<Identity>);

impl StaticAuth {
    pub fn signed_in() -> Arc<Self> {
        Arc::new(Self(Some(Identity {
            username: "ana".to_string(),
        })))
    }

    pub fn anonymous() -> Arc<Self> {
        Arc::new(Self(None))
    }
}

impl AuthClient for StaticAuth {
    fn current_user(&self) -> Option<Identity> {
        self.0.clone()
    }
}

/// Transport whose replies are released by the test
#[derive(Default)]
pub struct ScriptedTransport {
    history: Mutex<Option<oneshot::Receiver<Result<Vec<Message>>>>>,
    replies: Mutex<VecDeque<oneshot::Receiver<Result<AssistantReply>>>>,
    sent: Mutex<Vec<SendRequest>>,
    history_calls: Mutex<usize>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// History result returned immediately
    pub fn script_history(&self, result: Result<Vec<Message>>) {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        *self.history.lock().unwrap() = Some(rx);
    }

    /// History result released later through the returned sender
    pub fn hold_history(&self) -> oneshot::Sender<Result<Vec<Message>>> {
        let (tx, rx) = oneshot::channel();
        *self.history.lock().unwrap() = Some(rx);
        tx
    }

    /// Next send settles immediately with `result`
    pub fn script_reply(&self, result: Result<AssistantReply>) {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        self.replies.lock().unwrap().push_back(rx);
    }

    /// Next send settles when the returned sender fires
    pub fn hold_reply(&self) -> oneshot::Sender<Result<AssistantReply>> {
        let (tx, rx) = oneshot::channel();
        self.replies.lock().unwrap().push_back(rx);
        tx
    }

    pub fn sent(&self) -> Vec<SendRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn history_calls(&self) -> usize {
        *self.history_calls.lock().unwrap()
    }

    /// Yield until `count` sends have reached the transport
    pub async fn wait_for_sends(&self, count: usize) {
        while self.sent.lock().unwrap().len() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn fetch_history(&self) -> Result<Vec<Message>> {
        *self.history_calls.lock().unwrap() += 1;
        let rx = self.history.lock().unwrap().take();
        match rx {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(Error::Network("history channel closed".to_string()))),
            None => Ok(Vec::new()),
        }
    }

    async fn send(
        &self,
        text: &str,
        course_id: Option<u64>,
        document_id: Option<u64>,
    ) -> Result<AssistantReply> {
        self.sent.lock().unwrap().push(SendRequest {
            chat: text.to_string(),
            course_id,
            pdf_id: document_id,
        });
        let rx = self.replies.lock().unwrap().pop_front();
        match rx {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(Error::Network("reply channel closed".to_string()))),
            None => Err(Error::Protocol("no scripted reply".to_string())),
        }
    }
}

pub fn reply(text: &str) -> Result<AssistantReply> {
    Ok(AssistantReply {
        text: text.to_string(),
    })
}
