//! Client side of the gateway protocol.
//!
//! Used by tools and tests to submit commands and query their finality over
//! one TCP connection. Responses may arrive in any order; the client keeps
//! the ones nobody asked for yet.

use crate::domain::config::GatewayConfig;
use crate::domain::error::ClientError;
use crate::wire::{read_frame, write_frame, ClientMessage, CommandResponse};
use shared_types::{BincodeCommandCodec, Command, CommandCodec, CommandHash, Finality};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;

/// Connection to a replica's client gateway.
pub struct GatewayClient {
    stream: TcpStream,
    codec: Arc<dyn CommandCodec>,
    max_frame_size: usize,
    unclaimed: VecDeque<CommandResponse>,
}

impl GatewayClient {
    /// Connect using the default command codec.
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        Self::connect_with_codec(addr, Arc::new(BincodeCommandCodec)).await
    }

    pub async fn connect_with_codec(
        addr: SocketAddr,
        codec: Arc<dyn CommandCodec>,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            codec,
            max_frame_size: GatewayConfig::default().max_frame_size,
            unclaimed: VecDeque::new(),
        })
    }

    /// Send a command. Returns the hash its response will carry.
    pub async fn submit(&mut self, command: &Command) -> Result<CommandHash, ClientError> {
        let raw = self.codec.encode(command)?;
        let hash = self.codec.hash(command)?;
        self.submit_raw(raw).await?;
        Ok(hash)
    }

    /// Send already-encoded command bytes.
    pub async fn submit_raw(&mut self, raw: Vec<u8>) -> Result<(), ClientError> {
        self.send(ClientMessage::RequestCommand(raw)).await
    }

    /// Ask for the finality of `hash`. The answer arrives as a response.
    pub async fn check(&mut self, hash: CommandHash) -> Result<(), ClientError> {
        self.send(ClientMessage::CheckCommand(hash)).await
    }

    /// Check `hash` and wait for the answer.
    pub async fn query(&mut self, hash: CommandHash) -> Result<Finality, ClientError> {
        self.check(hash).await?;
        self.wait_for(hash).await
    }

    /// Next response, in arrival order.
    pub async fn next_response(&mut self) -> Result<CommandResponse, ClientError> {
        match self.unclaimed.pop_front() {
            Some(response) => Ok(response),
            None => self.read_response().await,
        }
    }

    /// Wait for the next response carrying `hash`.
    ///
    /// Responses for other hashes received meanwhile are kept for later
    /// calls.
    pub async fn wait_for(&mut self, hash: CommandHash) -> Result<Finality, ClientError> {
        if let Some(pos) = self.unclaimed.iter().position(|r| r.hash == hash) {
            if let Some(response) = self.unclaimed.remove(pos) {
                return Ok(response.finality);
            }
        }

        loop {
            let response = self.read_response().await?;
            if response.hash == hash {
                return Ok(response.finality);
            }
            self.unclaimed.push_back(response);
        }
    }

    async fn send(&mut self, message: ClientMessage) -> Result<(), ClientError> {
        let frame = message.encode()?;
        write_frame(&mut self.stream, &frame).await?;
        Ok(())
    }

    async fn read_response(&mut self) -> Result<CommandResponse, ClientError> {
        let frame = read_frame(&mut self.stream, self.max_frame_size)
            .await?
            .ok_or(ClientError::ConnectionClosed)?;

        match ClientMessage::decode(&frame)? {
            ClientMessage::Response(response) => Ok(response),
            other => Err(ClientError::UnexpectedMessage(other.opcode())),
        }
    }
}
