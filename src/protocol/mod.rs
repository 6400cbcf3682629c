//! RFC 6455 frame codec used by [`WebSocketStream`](crate::transport::WebSocketStream).

pub mod frame;
pub mod mask;
pub mod opcode;

pub use frame::{FrameHeader, MAX_CONTROL_FRAME_PAYLOAD, encode_frame};
pub use mask::apply_mask;
pub use opcode::OpCode;
