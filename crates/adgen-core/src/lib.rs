pub mod client;
pub mod config;
pub mod error;
pub mod state;
pub mod stream;
pub mod turn;

// Re-export main types for convenience
pub use client::{ChatRequest, GenerationClient, HistoryEntry};
pub use config::Config;
pub use error::{ClientError, TurnError};
pub use state::{AssetRef, ChatMessage, ChatRole, Transcript};
pub use stream::{RecordStream, StreamEvent, StreamRecord, ValidationPolicy};
pub use turn::{
    Conversation, EndReason, SideChannelState, SideChannelUpdate, TurnController, TurnHandle,
    TurnId, TurnOutcome, TurnReport, TurnSeed, TurnState,
};
