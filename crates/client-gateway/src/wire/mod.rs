//! Client wire protocol.
//!
//! ```text
//! ┌──────────────┬──────────┬──────────────────────┐
//! │ len: u32 BE  │ opcode   │ body                 │
//! │ (opcode+body)│ u8       │ len - 1 bytes        │
//! └──────────────┴──────────┴──────────────────────┘
//! ```
//!
//! | Opcode | Message  | Body                                 |
//! |--------|----------|--------------------------------------|
//! | `0x04` | REQ_CMD  | codec-encoded command                |
//! | `0x05` | RESP_CMD | bincode `CommandResponse`            |
//! | `0x06` | CHK_CMD  | 32-byte command hash                 |

pub mod framing;
pub mod messages;

pub use framing::{read_frame, write_frame};
pub use messages::{opcodes, ClientMessage, CommandResponse};
