//! Client side of the Ollama chat relay.
//!
//! The pieces compose bottom-up:
//!
//! - [`decoder::Utf8StreamDecoder`] turns arbitrary byte chunks into text,
//!   carrying split multi-byte characters between reads.
//! - [`assembler::StreamAssembler`] splits that text into NDJSON lines and
//!   accumulates the assistant's message fragments.
//! - [`session::SessionState`] is the immutable conversation snapshot and
//!   its `Idle → Sending → StreamingResponse → Idle` state machine.
//! - [`client::RelayClient`] talks HTTP to `relay-server`.
//! - [`exchange`] drives one full chat exchange through all of the above.

pub mod assembler;
pub mod client;
pub mod decoder;
pub mod error;
pub mod exchange;
pub mod session;

pub use assembler::StreamAssembler;
pub use client::RelayClient;
pub use decoder::Utf8StreamDecoder;
pub use error::ClientError;
pub use exchange::{refresh_models, run_exchange};
pub use session::{ChatRequest, DisplayMessage, MessageId, Phase, SessionState};
