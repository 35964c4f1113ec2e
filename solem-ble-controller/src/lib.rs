//! Solem BLE Controller
//!
//! Session layer for driving Solem irrigation controllers over BLE: connect
//! with retries, resolve the controller's attributes, arm notifications and
//! send staged-then-committed commands.
//!
//! # Example
//!
//! ```ignore
//! use solem_ble_controller::{with_session, BtleTransport, LogSink, SessionConfig};
//! use solem_proto::Command;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let command = Command::start_zone(3, 5 * 60)?;
//!
//!     with_session(
//!         BtleTransport::new(),
//!         LogSink,
//!         SessionConfig::default(),
//!         "C8:B9:61:0A:47:FD",
//!         async |session| session.issue(&command).await,
//!     )
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod attributes;
pub mod btle;
pub mod config;
pub mod error;
pub mod session;
pub mod sink;
pub mod transport;

pub use attributes::{AttributeMap, AttributeRole, AttributeSlot};
pub use btle::{BtleLink, BtleTransport};
pub use config::{should_retry, DrainPolicy, RetryPolicy, SessionConfig};
pub use error::{SessionError, Stage, TransportError};
pub use session::{with_session, ConnectionParams, DeviceInfo, Session, SessionState};
pub use sink::{FnSink, LogSink, NotificationSink, RecordingSink};
pub use transport::{AddressType, Notification, Transport};
