//! Echo session over RFC 6455 frames on an in-process stream.
//!
//! Run with: cargo run --example echo_session
//!
//! The server side is a `wsession` session; the client side drives the other
//! end of the stream with the raw frame reader and writer.

use std::error::Error;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use wsession::{
    accept, CloseReason, Config, Connection, FrameReader, FrameWriter, Handler, HandlerError,
    Received, Role, Transport, WebSocketStream,
};

struct Echo;

#[async_trait]
impl Handler for Echo {
    async fn on_accepted(&self, conn: &Connection) -> Result<(), HandlerError> {
        println!("  [server] accepted {}", conn.id());
        Ok(())
    }

    async fn on_message(
        &self,
        conn: &Connection,
        text: String,
        _cancel: CancellationToken,
    ) -> Result<(), HandlerError> {
        println!("  [server] received: {text}");
        conn.send(text).await?;
        Ok(())
    }

    async fn on_closed(&self, conn: &Connection, reason: &CloseReason) {
        println!("  [server] {} closed: {reason}", conn.id());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let shutdown = CancellationToken::new();

    let config = Config::new().with_send_chunk_size(8);
    let session = accept(
        WebSocketStream::new(server_io, Role::Server),
        Echo,
        config,
        &shutdown,
    )
    .await?;
    let server = session.spawn();

    let (mut reader, mut writer) = WebSocketStream::new(client_io, Role::Client).split();
    for text in ["hello", "a message long enough to be fragmented"] {
        writer.send(Bytes::copy_from_slice(text.as_bytes()), true).await?;

        let mut reply = Vec::new();
        let mut frames = 0;
        loop {
            match reader.receive(4096).await? {
                Received::Chunk {
                    data,
                    end_of_message,
                } => {
                    frames += 1;
                    reply.extend_from_slice(&data);
                    if end_of_message {
                        break;
                    }
                }
                Received::Close(reason) => {
                    println!("  [client] server closed early: {reason:?}");
                    return Ok(());
                }
            }
        }
        println!(
            "  [client] echo in {frames} frame(s): {}",
            String::from_utf8_lossy(&reply)
        );
    }

    writer.close(&CloseReason::normal()).await?;
    let reason = server.await?;
    println!("Session finished: {reason}");
    Ok(())
}
