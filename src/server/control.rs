// src/server/control.rs

//! Control server: streams every bus message to connected clients as one
//! JSON object per line.

use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{EventBus, Subscription};
use crate::errors::{DevloopError, Result};

#[derive(Debug)]
pub struct ControlServer {
    listener: TcpListener,
    bus: EventBus,
}

impl ControlServer {
    pub fn new(listener: TcpListener, bus: EventBus) -> Self {
        Self { listener, bus }
    }

    pub async fn bind(addr: &str, bus: EventBus) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| DevloopError::Handoff(format!("binding control server on {addr}: {e}")))?;
        Ok(Self::new(listener, bus))
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept clients until `token` is cancelled.
    pub async fn run(self, token: CancellationToken) -> Result<()> {
        if let Ok(addr) = self.listener.local_addr() {
            info!(%addr, "control server listening");
        }

        let mut clients = JoinSet::new();
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "control client connected");
                        let subscription = self.bus.subscribe_all();
                        clients.spawn(stream_events(stream, subscription, token.clone()));
                    }
                    Err(e) => warn!(error = %e, "control server accept failed"),
                },
                Some(_) = clients.join_next(), if !clients.is_empty() => {}
            }
        }

        clients.shutdown().await;
        debug!("control server stopped");
        Ok(())
    }
}

async fn stream_events(mut stream: TcpStream, mut subscription: Subscription, token: CancellationToken) {
    loop {
        let message = tokio::select! {
            _ = token.cancelled() => break,
            message = subscription.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let line = message.to_json_line();
        if stream.write_all(line.as_bytes()).await.is_err() {
            break;
        }
    }
    let _ = stream.shutdown().await;
}
