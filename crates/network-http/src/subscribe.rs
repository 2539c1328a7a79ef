use crate::body::operation_body;
use crate::error::{Error, Result};
use crate::protocol::{ClientMessage, PROTOCOL, ServerMessage};

use std::sync::Arc;
use std::time::Duration;

use ferry_network::{
    CacheConfig, GraphQlResponse, ObservableFromValue, RequestParameters, SubscribeFunction,
    TransportError, Variables,
};
use ferry_observable::{Cleanup, Observable, Sink};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, warn};
use url::Url;
use uuid::Uuid;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default time allowed for the server to acknowledge a connection.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration of a [`WsSubscribe`].
#[derive(Clone, Debug)]
pub struct WsSubscribeConfig {
    /// `ws` or `wss` URL of the server.
    pub endpoint: Url,
    /// Payload of the `connection_init` message.
    pub connection_params: Option<Value>,
    /// How long to wait for `connection_ack`.
    pub ack_timeout: Duration,
}

/// Builder for [`WsSubscribe`].
#[derive(Debug, Default)]
pub struct WsSubscribeBuilder {
    endpoint: Option<String>,
    connection_params: Option<Value>,
    ack_timeout: Option<Duration>,
}

impl WsSubscribeBuilder {
    /// Sets the endpoint URL.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the `connection_init` payload, typically credentials.
    #[must_use]
    pub fn connection_params(mut self, params: Value) -> Self {
        self.connection_params = Some(params);
        self
    }

    /// Sets how long to wait for the server to acknowledge the connection.
    #[must_use]
    pub const fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = Some(timeout);
        self
    }

    /// Builds the subscribe function.
    ///
    /// # Errors
    ///
    /// Fails when the endpoint is missing or is not a `ws(s)` URL.
    pub fn build(self) -> Result<WsSubscribe> {
        let endpoint = Url::parse(&self.endpoint.ok_or(Error::MissingEndpoint)?)?;

        WsSubscribe::new(WsSubscribeConfig {
            endpoint,
            connection_params: self.connection_params,
            ack_timeout: self.ack_timeout.unwrap_or(DEFAULT_ACK_TIMEOUT),
        })
    }
}

/// Subscribe function speaking `graphql-transport-ws`.
///
/// Every subscription opens its own socket. Unsubscribing sends `complete`
/// to the server and closes the socket.
#[derive(Clone, Debug)]
pub struct WsSubscribe {
    config: Arc<WsSubscribeConfig>,
}

impl WsSubscribe {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> WsSubscribeBuilder {
        WsSubscribeBuilder::default()
    }

    /// Creates a subscribe function from `config`.
    ///
    /// # Errors
    ///
    /// Fails when the endpoint is not a `ws(s)` URL.
    pub fn new(config: WsSubscribeConfig) -> Result<Self> {
        match config.endpoint.scheme() {
            "ws" | "wss" => Ok(Self {
                config: Arc::new(config),
            }),
            scheme => Err(Error::UnsupportedScheme(scheme.to_string())),
        }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &WsSubscribeConfig {
        &self.config
    }
}

impl SubscribeFunction for WsSubscribe {
    fn subscribe(
        &self,
        params: &RequestParameters,
        variables: &Variables,
        _config: &CacheConfig,
    ) -> ObservableFromValue<GraphQlResponse> {
        let config = Arc::clone(&self.config);
        let payload = operation_body(params, variables);
        let operation = params.name.clone();

        ObservableFromValue::Observable(Observable::create(move |sink| {
            let shutdown = CancellationToken::new();
            let span = debug_span!("ws_subscription", operation = %operation);
            tokio::spawn(
                run(Arc::clone(&config), payload.clone(), sink, shutdown.clone()).instrument(span),
            );
            Ok(Cleanup::from(shutdown))
        }))
    }
}

async fn run(
    config: Arc<WsSubscribeConfig>,
    payload: Value,
    sink: Sink<GraphQlResponse, TransportError>,
    shutdown: CancellationToken,
) {
    match drive(&config, &payload, &sink, &shutdown).await {
        Ok(()) => sink.complete(),
        Err(err) => {
            warn!(error = %err, "subscription failed");
            sink.error(err);
        }
    }
}

async fn drive(
    config: &WsSubscribeConfig,
    payload: &Value,
    sink: &Sink<GraphQlResponse, TransportError>,
    shutdown: &CancellationToken,
) -> std::result::Result<(), TransportError> {
    let mut request = config
        .endpoint
        .as_str()
        .into_client_request()
        .map_err(|err| TransportError::Request(err.to_string()))?;
    request
        .headers_mut()
        .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(PROTOCOL));

    let (mut socket, _) = tokio::select! {
        () = shutdown.cancelled() => return Ok(()),
        connected = connect_async(request) => {
            connected.map_err(|err| TransportError::Request(err.to_string()))?
        }
    };
    debug!(endpoint = %config.endpoint, "connected");

    send(
        &mut socket,
        &ClientMessage::ConnectionInit {
            payload: config.connection_params.as_ref(),
        },
    )
    .await?;

    let acked = tokio::select! {
        () = shutdown.cancelled() => None,
        acked = tokio::time::timeout(config.ack_timeout, wait_for_ack(&mut socket)) => Some(acked),
    };
    let Some(acked) = acked else {
        let _ = socket.close(None).await;
        return Ok(());
    };
    acked.map_err(|_| TransportError::Request("timed out waiting for connection_ack".to_string()))??;

    let id = Uuid::new_v4().to_string();
    send(&mut socket, &ClientMessage::Subscribe { id: &id, payload }).await?;
    debug!(id = %id, "subscribed");

    loop {
        let message = tokio::select! {
            () = shutdown.cancelled() => None,
            message = socket.next() => Some(message),
        };
        let Some(message) = message else {
            debug!(id = %id, "unsubscribed, completing on the server");
            let _ = send(&mut socket, &ClientMessage::Complete { id: &id }).await;
            let _ = socket.close(None).await;
            return Ok(());
        };

        let text = match message {
            None | Some(Ok(Message::Close(_))) => return Err(TransportError::Closed),
            Some(Err(err)) => return Err(TransportError::Request(err.to_string())),
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(_)) => continue,
        };

        match serde_json::from_str::<ServerMessage>(text.as_str())? {
            ServerMessage::Next { id: target, payload } if target == id => sink.next(payload),
            ServerMessage::Error { id: target, payload } if target == id => {
                return Err(TransportError::Graphql(payload));
            }
            ServerMessage::Complete { id: target } if target == id => {
                debug!(id = %id, "server completed subscription");
                let _ = socket.close(None).await;
                return Ok(());
            }
            ServerMessage::Ping { payload } => {
                send(&mut socket, &ClientMessage::Pong { payload }).await?;
            }
            _ => {}
        }
    }
}

async fn wait_for_ack(socket: &mut Socket) -> std::result::Result<(), TransportError> {
    loop {
        match socket.next().await {
            None | Some(Ok(Message::Close(_))) => return Err(TransportError::Closed),
            Some(Err(err)) => return Err(TransportError::Request(err.to_string())),
            Some(Ok(Message::Text(text))) => {
                match serde_json::from_str::<ServerMessage>(text.as_str())? {
                    ServerMessage::ConnectionAck { .. } => return Ok(()),
                    ServerMessage::Ping { payload } => {
                        send(socket, &ClientMessage::Pong { payload }).await?;
                    }
                    _ => {}
                }
            }
            Some(Ok(_)) => {}
        }
    }
}

async fn send(
    socket: &mut Socket,
    message: &ClientMessage<'_>,
) -> std::result::Result<(), TransportError> {
    let text = serde_json::to_string(message)?;
    socket
        .send(Message::text(text))
        .await
        .map_err(|err| TransportError::Request(err.to_string()))
}
