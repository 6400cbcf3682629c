//! RFC 6455 data framing over a tokio byte stream.
//!
//! [`WebSocketStream`] adapts any `AsyncRead + AsyncWrite` stream whose
//! opening handshake has already completed. Text, binary and continuation
//! frames become [`Received::Chunk`]s, a close frame becomes the terminal
//! [`Received::Close`], and ping/pong frames are consumed silently.
//!
//! Frame payloads are streamed: a frame larger than the requested receive
//! size is returned over several receives, and only the final piece of a
//! FIN frame is flagged as the end of the message.
//!
//! Outbound frames are encoded into a pending buffer and drained from there.
//! A send dropped partway through a frame leaves the rest of that frame
//! pending, and the next send or close writes it out before anything else,
//! so the byte stream always stays aligned on frame boundaries.

use async_trait::async_trait;
use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use super::{FrameReader, FrameWriter, Received, Transport};
use crate::error::{Error, Result};
use crate::message::CloseReason;
use crate::protocol::frame::{close_payload, parse_close_payload};
use crate::protocol::{FrameHeader, OpCode, apply_mask, encode_frame};

/// Default largest accepted data frame payload: 16 MB.
pub const DEFAULT_MAX_FRAME_SIZE: u64 = 16 * 1024 * 1024;

const READ_RESERVE: usize = 4096;

/// Generate a random seed for mask generation.
/// Falls back to system time if getrandom fails.
fn random_mask_seed() -> u32 {
    let mut buf = [0u8; 4];
    if getrandom::getrandom(&mut buf).is_ok() {
        u32::from_le_bytes(buf)
    } else {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u32)
            .unwrap_or(0x1234_5678)
    }
}

/// Which end of the stream this endpoint is.
///
/// Clients mask every frame they send; servers never do, and each side
/// rejects frames whose masking does not match the other's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Initiated the connection.
    Client,
    /// Accepted the connection.
    Server,
}

impl Role {
    /// Whether frames written by this endpoint carry a mask.
    #[inline]
    #[must_use]
    pub const fn masks_outgoing(self) -> bool {
        matches!(self, Role::Client)
    }

    /// Check the mask bit of a frame received by this endpoint.
    fn check_inbound(self, masked: bool) -> Result<()> {
        match (self, masked) {
            (Role::Server, false) => Err(Error::ProtocolViolation(
                "client frame must be masked".into(),
            )),
            (Role::Client, true) => Err(Error::ProtocolViolation(
                "server frame must not be masked".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// A byte stream carrying RFC 6455 frames.
pub struct WebSocketStream<T> {
    io: T,
    role: Role,
    max_frame_size: u64,
}

impl<T> WebSocketStream<T> {
    /// Wrap a stream whose opening handshake is complete.
    #[must_use]
    pub fn new(io: T, role: Role) -> Self {
        Self {
            io,
            role,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Reject data frames whose declared payload exceeds `size`.
    #[must_use]
    pub fn with_max_frame_size(mut self, size: u64) -> Self {
        self.max_frame_size = size;
        self
    }

    /// The role frames are masked and checked for.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }
}

impl<T> Transport for WebSocketStream<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    type Reader = StreamReader<ReadHalf<T>>;
    type Writer = StreamWriter<WriteHalf<T>>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        let (read, write) = tokio::io::split(self.io);
        (
            StreamReader::new(read, self.role).with_max_frame_size(self.max_frame_size),
            StreamWriter::new(write, self.role),
        )
    }
}

/// Payload of a data frame still being handed out.
#[derive(Debug)]
struct InFrame {
    fin: bool,
    mask: Option<[u8; 4]>,
    remaining: u64,
    offset: usize,
}

/// Read half: parses frames and streams their payloads.
pub struct StreamReader<R> {
    io: R,
    buf: BytesMut,
    role: Role,
    max_frame_size: u64,
    current: Option<InFrame>,
    in_message: bool,
    open: bool,
}

impl<R> StreamReader<R> {
    /// Build a reader over an already-split read half.
    #[must_use]
    pub fn new(io: R, role: Role) -> Self {
        Self {
            io,
            buf: BytesMut::with_capacity(READ_RESERVE),
            role,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            current: None,
            in_message: false,
            open: true,
        }
    }

    /// Reject data frames whose declared payload exceeds `size`.
    #[must_use]
    pub fn with_max_frame_size(mut self, size: u64) -> Self {
        self.max_frame_size = size;
        self
    }

    fn check_header(&mut self, header: &FrameHeader) -> Result<()> {
        header.validate()?;
        self.role.check_inbound(header.mask.is_some())?;
        match header.opcode {
            OpCode::Continuation if !self.in_message => Err(Error::ProtocolViolation(
                "unexpected continuation frame".into(),
            )),
            OpCode::Text | OpCode::Binary if self.in_message => Err(Error::ProtocolViolation(
                "expected continuation frame".into(),
            )),
            op if !op.is_control() && header.payload_len > self.max_frame_size => {
                Err(Error::FrameTooLarge {
                    size: header.payload_len,
                    max: self.max_frame_size,
                })
            }
            _ => Ok(()),
        }
    }
}

impl<R: AsyncRead + Unpin + Send> StreamReader<R> {
    async fn fill(&mut self) -> Result<()> {
        self.buf.reserve(READ_RESERVE);
        let n = self.io.read_buf(&mut self.buf).await?;
        if n == 0 {
            self.open = false;
            return Err(Error::Transport(
                "connection reset without close frame".into(),
            ));
        }
        Ok(())
    }

    fn take_data(&mut self, max_len: usize) -> Received {
        let Some(frame) = self.current.as_mut() else {
            return Received::chunk(Bytes::new(), false);
        };
        let available = usize::try_from(frame.remaining).unwrap_or(usize::MAX);
        let n = self.buf.len().min(available).min(max_len);
        let mut data = self.buf.split_to(n);
        if let Some(mask) = frame.mask {
            apply_mask(&mut data, mask, frame.offset);
        }
        frame.remaining -= n as u64;
        frame.offset += n;

        let end_of_message = frame.remaining == 0 && frame.fin;
        if frame.remaining == 0 {
            self.current = None;
        }
        if end_of_message {
            self.in_message = false;
        }
        Received::chunk(data.freeze(), end_of_message)
    }

    /// Consume a fully buffered control payload. Only close is surfaced.
    fn take_control(&mut self, header: FrameHeader) -> Result<Option<Received>> {
        let mut payload = self.buf.split_to(header.payload_len as usize);
        if let Some(mask) = header.mask {
            apply_mask(&mut payload, mask, 0);
        }
        match header.opcode {
            OpCode::Close => {
                self.open = false;
                Ok(Some(Received::Close(parse_close_payload(&payload)?)))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> FrameReader for StreamReader<R> {
    async fn receive(&mut self, max_len: usize) -> Result<Received> {
        let max_len = max_len.max(1);
        loop {
            if let Some(remaining) = self.current.as_ref().map(|f| f.remaining) {
                if remaining > 0 && self.buf.is_empty() {
                    self.fill().await?;
                }
                return Ok(self.take_data(max_len));
            }

            let Some((header, header_len)) = FrameHeader::parse(&self.buf)? else {
                self.fill().await?;
                continue;
            };
            self.check_header(&header)?;

            if header.opcode.is_control() {
                // The header stays buffered until the whole control payload
                // has arrived so a cancelled receive loses nothing.
                let total = header_len + header.payload_len as usize;
                while self.buf.len() < total {
                    self.fill().await?;
                }
                self.buf.advance(header_len);
                if let Some(received) = self.take_control(header)? {
                    return Ok(received);
                }
                continue;
            }

            self.buf.advance(header_len);
            self.in_message = true;
            self.current = Some(InFrame {
                fin: header.fin,
                mask: header.mask,
                remaining: header.payload_len,
                offset: 0,
            });
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Write half: serializes frames, masking them in the client role.
pub struct StreamWriter<W> {
    io: W,
    role: Role,
    write_buf: BytesMut,
    mask_counter: u32,
    in_message: bool,
    open: bool,
}

impl<W> StreamWriter<W> {
    /// Build a writer over an already-split write half.
    #[must_use]
    pub fn new(io: W, role: Role) -> Self {
        Self {
            io,
            role,
            write_buf: BytesMut::with_capacity(READ_RESERVE),
            mask_counter: random_mask_seed(),
            in_message: false,
            open: true,
        }
    }

    fn generate_mask(&mut self) -> Option<[u8; 4]> {
        if !self.role.masks_outgoing() {
            return None;
        }
        self.mask_counter = self.mask_counter.wrapping_add(0x9E37_79B9);
        let a = self.mask_counter;
        let b = a.wrapping_mul(0x85EB_CA6B);
        let c = b ^ (b >> 13);
        Some(c.wrapping_mul(0xC2B2_AE35).to_le_bytes())
    }
}

impl<W: AsyncWrite + Unpin + Send> StreamWriter<W> {
    /// Queue one frame behind any bytes still pending, then drain.
    async fn write_frame(&mut self, fin: bool, opcode: OpCode, payload: &[u8]) -> Result<()> {
        let mask = self.generate_mask();
        encode_frame(&mut self.write_buf, fin, opcode, payload, mask);
        self.drain().await
    }

    /// `write_buf` only advances past bytes the stream accepted, so a
    /// dropped drain resumes exactly where it stopped.
    async fn drain(&mut self) -> Result<()> {
        while self.write_buf.has_remaining() {
            if self.io.write_buf(&mut self.write_buf).await? == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
            }
        }
        self.io.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> FrameWriter for StreamWriter<W> {
    async fn send(&mut self, data: Bytes, end_of_message: bool) -> Result<()> {
        if !self.open {
            return Err(Error::Transport("write half already closed".into()));
        }
        let opcode = if self.in_message {
            OpCode::Continuation
        } else {
            OpCode::Text
        };
        // Mark the message as started before awaiting: if this send is
        // dropped mid-write, later frames must still continue it.
        self.in_message = !end_of_message;
        self.write_frame(end_of_message, opcode, &data).await
    }

    async fn close(&mut self, reason: &CloseReason) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        let payload = close_payload(reason);
        self.write_frame(true, OpCode::Close, &payload).await?;
        self.io.shutdown().await?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
