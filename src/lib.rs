//! Protocol adapters and status reconciliation for CC, CC2 and Moonraker printers.
//!
//! A [`PrinterSession`] turns abstract operations into vendor wire messages,
//! matches replies back to the waiting caller and fans status pushes out to
//! subscribers. The transport itself (WebSocket, MQTT) stays outside: it hands
//! inbound bytes to [`PrinterSession::on_wire_message`] and drains outbound
//! bytes from a [`WireSink`].

pub mod adapter;
pub mod adapters;
pub mod config;
pub mod logging;
pub mod params;
pub mod registry;
pub mod session;
pub mod transport;

pub use adapter::{
    BuildError, Classification, ParseError, PrinterType, ProtocolAdapter, WireRequest, create_adapter,
};
pub use config::{AdapterConfig, ConfigError, load_config};
pub use printlink_shared::{
    BizEvent, BizRequest, BizResponse, ErrorCode, OperationKind, UnifiedAttributesData,
    UnifiedStatusData,
};
pub use registry::PrinterRegistry;
pub use session::{EventStream, PrinterSession, SessionError};
pub use transport::{ChannelSink, OutboundMessage, TransportError, WireSink};
