// Live parameter streaming
//
// A `StreamClient` keeps one bidirectional channel open to a remote simulation
// process, publishes the most recent decoded payload, and reconnects on its own
// after the channel drops. Transport is pluggable through `Connector`; the
// default is a WebSocket connector built on tokio-tungstenite.

pub mod client;
pub mod endpoint;
pub mod message;
pub mod transport;
pub mod types;

pub use client::StreamClient;
pub use endpoint::{endpoint_url, StreamEndpoint};
pub use message::{InboundMessage, OutboundMessage, SimParams};
pub use transport::{Channel, ChannelEvent, Connector, WsConnector};
pub use types::{
    ClientEvent, ClientStats, ConnectionState, LatestData, ReconnectPolicy, SendOutcome,
    StreamError, StreamResult, DEFAULT_RECONNECT_DELAY,
};
