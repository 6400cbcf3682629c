//! Several tasks sending on one connection, then a parent shutdown.
//!
//! Run with: cargo run --example broadcast_sends
//!
//! Each publisher task sends its own messages through a cloned
//! [`Connection`]. The send lock keeps every message's frames contiguous, so
//! the peer reassembles them intact even though the tasks race.

use std::error::Error;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use wsession::transport::memory::{self, Outbound};
use wsession::{accept, CloseReason, Config, Connection, Handler, HandlerError};

const PUBLISHERS: usize = 4;
const MESSAGES_PER_PUBLISHER: usize = 3;

struct Quiet;

#[async_trait]
impl Handler for Quiet {
    async fn on_message(
        &self,
        _conn: &Connection,
        text: String,
        _cancel: CancellationToken,
    ) -> Result<(), HandlerError> {
        println!("  [server] peer says: {text}");
        Ok(())
    }

    async fn on_closed(&self, _conn: &Connection, reason: &CloseReason) {
        println!("  [server] closed: {reason}");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let shutdown = CancellationToken::new();
    let (transport, mut peer) = memory::pair();
    let config = Config::new().with_send_chunk_size(4);
    let session = accept(transport, Quiet, config, &shutdown).await?;
    let conn = session.connection().clone();
    let server = session.spawn();

    peer.send_text("subscribe");

    let mut publishers = JoinSet::new();
    for publisher in 0..PUBLISHERS {
        let conn = conn.clone();
        publishers.spawn(async move {
            for seq in 0..MESSAGES_PER_PUBLISHER {
                conn.send(format!("publisher {publisher} update {seq}")).await?;
            }
            Ok::<_, wsession::Error>(())
        });
    }
    while let Some(result) = publishers.join_next().await {
        result??;
    }

    for _ in 0..PUBLISHERS * MESSAGES_PER_PUBLISHER {
        match peer.recv_message().await {
            Some(message) => println!("  [peer] {message}"),
            None => break,
        }
    }
    println!("  [peer] {} frames in total", peer.sent_frames().len());

    shutdown.cancel();
    let reason = server.await?;
    if let Some(Outbound::Close(sent)) = peer.recv().await {
        println!("  [peer] close handshake: {sent}");
    }
    println!("Session finished: {reason}");
    Ok(())
}
