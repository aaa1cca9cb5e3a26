//! Token pair, handshake progress messages and the store that holds them.

pub mod pair;
pub mod store;

pub use pair::{redact, HandshakeProgress, TokenPair};
pub use store::TokenStore;
