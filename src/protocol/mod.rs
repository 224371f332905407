//! WebSocket framing (RFC 6455): opcodes, headers, masking, close payloads
//! and inbound validation, including streaming UTF-8 checks for text.

pub mod close;
pub mod header;
pub mod mask;
pub mod opcode;
pub mod utf8;
pub mod validation;

pub use close::{CloseCode, CloseFrame};
pub use header::{FrameHeader, MAX_HEADER_LEN};
pub use mask::{apply_mask, apply_mask_offset, generate_mask};
pub use opcode::OpCode;
pub use utf8::Utf8Validator;
pub use validation::{FrameValidator, MAX_CONTROL_FRAME_PAYLOAD};
