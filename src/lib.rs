//! OAuth Lifecycle Client - drives one OAuth token lifecycle over gRPC.
//!
//! A streaming device-style handshake issues an access and refresh token.
//! Once the stream closes, the access token is introspected, exchanged for
//! user info and revoked, and the revocation is confirmed with a second
//! introspection.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod handshake;
pub mod lifecycle;
pub mod observability;
pub mod proto;
pub mod shutdown;
pub mod token;

pub use client::{GrpcOAuthService, OAuthService, ProgressStream};
pub use config::{Config, ConfigError};
pub use error::{HandshakeError, LifecycleError, Operation, OperationError};
pub use handshake::{HandshakeDriver, HandshakeGate, HandshakePhase};
pub use lifecycle::{IntrospectionOutcome, LifecycleOrchestrator, LifecycleReport, UserInfo};
pub use token::{HandshakeProgress, TokenPair, TokenStore};
