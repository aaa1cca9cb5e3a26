//! Remote OAuth service interface and its gRPC implementation.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::{Request, Status};
use tracing::{debug, instrument};

use crate::config::Config;
use crate::error::LifecycleError;
use crate::proto::o_auth_service_client::OAuthServiceClient;
use crate::proto::{Empty, IntrospectRequest, RevokeRequest, UserInfoRequest};
use crate::token::HandshakeProgress;

/// Metadata key carrying the run's correlation id.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Progress messages of an Authenticate call, in wire order.
pub type ProgressStream = BoxStream<'static, Result<HandshakeProgress, Status>>;

/// The four operations exposed by the remote authorization service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OAuthService: Send + Sync {
    /// Opens the server-streaming handshake.
    async fn authenticate(&self) -> Result<ProgressStream, Status>;

    /// Reports whether `token` is currently active.
    async fn introspect(&self, token: &str) -> Result<bool, Status>;

    /// Fetches the identity information bound to `token`.
    async fn user_info(&self, token: &str) -> Result<String, Status>;

    /// Invalidates `token` server-side.
    async fn revoke(&self, token: &str) -> Result<(), Status>;
}

/// tonic-backed [`OAuthService`].
#[derive(Debug, Clone)]
pub struct GrpcOAuthService {
    client: OAuthServiceClient<Channel>,
    request_timeout: Duration,
    correlation_id: Option<String>,
}

impl GrpcOAuthService {
    /// Creates a client with a lazily connected channel.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Configuration is invalid
    /// - The endpoint URL is rejected by the transport
    pub fn new(config: &Config) -> Result<Self, LifecycleError> {
        config.validate()?;

        let mut endpoint = Endpoint::from_shared(config.service_url.to_string())
            .map_err(|e| LifecycleError::Transport {
                reason: format!("Invalid URL {}: {e}", config.service_url),
            })?
            .connect_timeout(config.connect_timeout);

        if config.service_url.scheme() == "https" {
            endpoint = endpoint.tls_config(ClientTlsConfig::new().with_native_roots())?;
        }

        Ok(Self::from_channel(endpoint.connect_lazy(), config.request_timeout))
    }

    /// Wraps an existing channel.
    #[must_use]
    pub fn from_channel(channel: Channel, request_timeout: Duration) -> Self {
        Self {
            client: OAuthServiceClient::new(channel),
            request_timeout,
            correlation_id: None,
        }
    }

    /// Tags every outgoing request with `correlation_id`.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        if let Some(id) = &self.correlation_id {
            match id.parse::<MetadataValue<Ascii>>() {
                Ok(value) => {
                    request.metadata_mut().insert(CORRELATION_ID_HEADER, value);
                }
                Err(_) => debug!("correlation id is not valid ASCII metadata, skipped"),
            }
        }
        request
    }

    fn unary_request<T>(&self, message: T) -> Request<T> {
        let mut request = self.request(message);
        request.set_timeout(self.request_timeout);
        request
    }
}

#[async_trait]
impl OAuthService for GrpcOAuthService {
    #[instrument(skip(self))]
    async fn authenticate(&self) -> Result<ProgressStream, Status> {
        let mut client = self.client.clone();
        let stream = client.authenticate(self.request(Empty {})).await?.into_inner();
        Ok(stream
            .map(|item| item.map(HandshakeProgress::from))
            .boxed())
    }

    #[instrument(skip_all)]
    async fn introspect(&self, token: &str) -> Result<bool, Status> {
        let mut client = self.client.clone();
        let request = self.unary_request(IntrospectRequest {
            token: token.to_string(),
        });
        Ok(client.introspect(request).await?.into_inner().active)
    }

    #[instrument(skip_all)]
    async fn user_info(&self, token: &str) -> Result<String, Status> {
        let mut client = self.client.clone();
        let request = self.unary_request(UserInfoRequest {
            token: token.to_string(),
        });
        Ok(client.user_info(request).await?.into_inner().info)
    }

    #[instrument(skip_all)]
    async fn revoke(&self, token: &str) -> Result<(), Status> {
        let mut client = self.client.clone();
        let request = self.unary_request(RevokeRequest {
            token: token.to_string(),
        });
        client.revoke(request).await?;
        Ok(())
    }
}
