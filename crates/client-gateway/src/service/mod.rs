//! Client gateway service.
//!
//! Owns the client listener, the per-connection outbound queues and the
//! pending decision store. Socket I/O happens in spawned tasks that only
//! move frames; every handler runs inside [`ClientGateway::turn`], which the
//! orchestrator drives from its single event loop.

use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::domain::pending::{PendingDecisionStore, ResolvedDecision};
use crate::metrics::{GatewayMetrics, GatewaySnapshot};
use crate::wire::{read_frame, write_frame, ClientMessage, CommandResponse};
use replica_core::ReplicaCore;
use shared_types::{short_hex, Command, CommandCodec, CommandHash, Finality, VerificationError};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};


/// Whether submitted commands are verified before reaching the core.
pub const fn verification_enabled() -> bool {
    cfg!(feature = "tx-verify")
}

#[cfg(feature = "tx-verify")]
fn verify(command: &Command) -> Result<(), VerificationError> {
    shared_types::verify_command(command)
}

#[cfg(not(feature = "tx-verify"))]
fn verify(_command: &Command) -> Result<(), VerificationError> {
    Ok(())
}

/// Events forwarded from connection tasks to the gateway loop.
#[derive(Debug)]
pub enum InboundEvent {
    /// A client connected; frames queued on `outbound` are written to it.
    Connected {
        addr: SocketAddr,
        outbound: mpsc::Sender<Vec<u8>>,
    },
    /// A decoded frame from a client.
    Message {
        addr: SocketAddr,
        message: ClientMessage,
    },
    /// The client's read side ended.
    Disconnected { addr: SocketAddr },
}

/// Client gateway
pub struct ClientGateway {
    config: GatewayConfig,
    core: Arc<dyn ReplicaCore>,
    codec: Arc<dyn CommandCodec>,
    local_addr: Option<SocketAddr>,
    connections: HashMap<SocketAddr, mpsc::Sender<Vec<u8>>>,
    inbound_tx: mpsc::Sender<InboundEvent>,
    inbound_rx: mpsc::Receiver<InboundEvent>,
    pending: PendingDecisionStore,
    metrics: Arc<GatewayMetrics>,
    acceptor: Option<JoinHandle<()>>,
}

impl ClientGateway {
    /// Create a gateway without a listener.
    ///
    /// Connections can still be attached with [`ClientGateway::attach`].
    pub fn new(config: GatewayConfig, core: Arc<dyn ReplicaCore>) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_buffer);
        let codec = core.codec();

        Ok(Self {
            config,
            core,
            codec,
            local_addr: None,
            connections: HashMap::new(),
            inbound_tx,
            inbound_rx,
            pending: PendingDecisionStore::new(),
            metrics: Arc::new(GatewayMetrics::new()),
            acceptor: None,
        })
    }

    /// Create a gateway and start accepting clients on `config.listen_addr`.
    pub async fn bind(
        config: GatewayConfig,
        core: Arc<dyn ReplicaCore>,
    ) -> Result<Self, GatewayError> {
        let mut gateway = Self::new(config, core)?;
        let addr = gateway.config.listen_addr;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| GatewayError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| GatewayError::Bind { addr, source })?;

        info!(addr = %local_addr, "Client gateway listening");

        gateway.local_addr = Some(local_addr);
        gateway.acceptor = Some(tokio::spawn(accept_loop(
            listener,
            gateway.inbound_tx.clone(),
            gateway.config.clone(),
            Arc::clone(&gateway.metrics),
        )));

        Ok(gateway)
    }

    /// Address the listener is bound to, if any.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Gateway and decision pipeline counters at this instant.
    pub fn snapshot(&self) -> GatewaySnapshot {
        self.metrics.snapshot(&self.pending.stats())
    }

    /// Submissions still waiting for a decision.
    pub fn pending_count(&self) -> usize {
        self.pending.pending_count()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Sender for feeding events into the gateway loop.
    pub fn inbound_sender(&self) -> mpsc::Sender<InboundEvent> {
        self.inbound_tx.clone()
    }

    /// Route responses for `addr` into `outbound`.
    pub fn attach(&mut self, addr: SocketAddr, outbound: mpsc::Sender<Vec<u8>>) {
        self.metrics.record_connect();
        if self.connections.insert(addr, outbound).is_some() {
            debug!(addr = %addr, "Replaced existing client connection");
        }
    }

    /// Forget the connection for `addr`. Responses for it are dropped.
    pub fn detach(&mut self, addr: &SocketAddr) {
        if self.connections.remove(addr).is_some() {
            self.metrics.record_disconnect();
        }
    }

    /// Process one event: an inbound client event or a resolved decision.
    ///
    /// Returns `false` once no further event can arrive. Cancel safe.
    pub async fn turn(&mut self) -> bool {
        tokio::select! {
            event = self.inbound_rx.recv() => match event {
                Some(event) => {
                    self.handle_event(event);
                    true
                }
                None => false,
            },
            Some(resolved) = self.pending.next_resolved() => {
                self.deliver(resolved);
                true
            }
        }
    }

    fn handle_event(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::Connected { addr, outbound } => {
                debug!(addr = %addr, "Client connected");
                self.attach(addr, outbound);
            }
            InboundEvent::Message { addr, message } => match message {
                ClientMessage::RequestCommand(raw) => self.handle_submit(&raw, addr),
                ClientMessage::CheckCommand(hash) => self.handle_check(hash, addr),
                ClientMessage::Response(_) => {
                    warn!(addr = %addr, "Ignoring response frame sent by client");
                    self.metrics.record_malformed();
                }
            },
            InboundEvent::Disconnected { addr } => {
                debug!(addr = %addr, "Client disconnected");
                self.detach(&addr);
            }
        }
    }

    // =========================================================================
    // CLIENT OPERATIONS
    // =========================================================================

    /// Handle a REQ_CMD from `from`.
    ///
    /// Undecodable commands are dropped without a response. Commands that
    /// fail verification are answered at once with a rejection and never
    /// reach the core. Everything else is handed to the core and answered
    /// when its decision resolves.
    pub fn handle_submit(&mut self, raw: &[u8], from: SocketAddr) {
        let command = match self.codec.decode(raw) {
            Ok(command) => command,
            Err(e) => {
                warn!(addr = %from, error = %e, "Dropping undecodable command");
                self.metrics.record_malformed();
                return;
            }
        };

        let hash = match self.codec.hash(&command) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(addr = %from, error = %e, "Dropping unhashable command");
                self.metrics.record_malformed();
                return;
            }
        };

        if let Err(e) = verify(&command) {
            warn!(
                hash = %short_hex(&hash),
                addr = %from,
                reason = %e,
                "invalid client command"
            );
            self.metrics.record_rejected();
            self.respond(from, hash, Finality::rejected());
            return;
        }

        debug!(hash = %short_hex(&hash), addr = %from, "Processing command");

        self.core.add_command(hash, command);
        let decision = self.core.async_decide(hash);
        self.pending.register(from, decision);
        self.metrics.record_submitted();
    }

    /// Handle a CHK_CMD from `from`.
    ///
    /// Answers with the decided finality, or the default finality when the
    /// command is unknown, still pending or already pruned.
    pub fn handle_check(&mut self, hash: CommandHash, from: SocketAddr) {
        let finality = self
            .core
            .find_cmd(&hash)
            .map(|committed| committed.finality)
            .unwrap_or_default();

        debug!(hash = %short_hex(&hash), addr = %from, finality = %finality, "Answering check");

        self.metrics.record_check();
        self.respond(from, hash, finality);
    }

    fn deliver(&mut self, resolved: ResolvedDecision) {
        self.metrics.record_decision_latency(resolved.waited);
        match resolved.outcome {
            Ok(committed) => {
                self.respond(resolved.addr, committed.hash, committed.finality);
            }
            Err(e) => {
                warn!(addr = %resolved.addr, error = %e, "Decision abandoned, no response sent");
            }
        }
    }

    /// Queue a RESP_CMD for `to`. Never blocks; drops the response when the
    /// connection is gone or its queue is full.
    fn respond(&mut self, to: SocketAddr, hash: CommandHash, finality: Finality) {
        let frame = match ClientMessage::Response(CommandResponse { hash, finality }).encode() {
            Ok(frame) => frame,
            Err(e) => {
                error!(hash = %short_hex(&hash), error = %e, "Failed to encode response");
                return;
            }
        };

        let delivered = match self.connections.get(&to) {
            Some(outbound) => match outbound.try_send(frame) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(addr = %to, hash = %short_hex(&hash), "Client queue full, response dropped");
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(addr = %to, hash = %short_hex(&hash), "Client writer gone, response dropped");
                    self.detach(&to);
                    false
                }
            },
            None => {
                debug!(addr = %to, hash = %short_hex(&hash), "Client not connected, response dropped");
                false
            }
        };

        self.metrics.record_response(delivered);
    }
}

impl Drop for ClientGateway {
    fn drop(&mut self) {
        if let Some(acceptor) = self.acceptor.take() {
            acceptor.abort();
        }
    }
}

// =============================================================================
// CONNECTION TASKS
// =============================================================================

async fn accept_loop(
    listener: TcpListener,
    inbound: mpsc::Sender<InboundEvent>,
    config: GatewayConfig,
    metrics: Arc<GatewayMetrics>,
) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "Failed to accept client connection");
                tokio::time::sleep(config.accept_backoff).await;
                continue;
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(addr = %addr, error = %e, "Failed to set TCP_NODELAY");
        }

        let (read_half, write_half) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_buffer);

        let connected = InboundEvent::Connected {
            addr,
            outbound: outbound_tx,
        };
        if inbound.send(connected).await.is_err() {
            // Gateway is gone
            break;
        }

        tokio::spawn(write_loop(write_half, outbound_rx, addr));
        tokio::spawn(read_loop(
            read_half,
            inbound.clone(),
            addr,
            config.max_frame_size,
            Arc::clone(&metrics),
        ));
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    inbound: mpsc::Sender<InboundEvent>,
    addr: SocketAddr,
    max_frame_size: usize,
    metrics: Arc<GatewayMetrics>,
) {
    loop {
        let frame = tokio::select! {
            frame = read_frame(&mut reader, max_frame_size) => frame,
            _ = inbound.closed() => return,
        };

        let message = match frame {
            Ok(Some(frame)) => match ClientMessage::decode(&frame) {
                Ok(message) => message,
                Err(e) => {
                    warn!(addr = %addr, error = %e, "Malformed frame, closing connection");
                    metrics.record_malformed();
                    break;
                }
            },
            Ok(None) => break,
            Err(e) => {
                warn!(addr = %addr, error = %e, "Client read failed, closing connection");
                break;
            }
        };

        if inbound
            .send(InboundEvent::Message { addr, message })
            .await
            .is_err()
        {
            return;
        }
    }

    let _ = inbound.send(InboundEvent::Disconnected { addr }).await;
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Vec<u8>>,
    addr: SocketAddr,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = write_frame(&mut writer, &frame).await {
            debug!(addr = %addr, error = %e, "Client write failed");
            break;
        }
    }
}
