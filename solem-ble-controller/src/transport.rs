//! The boundary to the BLE stack.
//!
//! The session only ever talks to a [`Transport`]. [`crate::btle::BtleTransport`]
//! binds it to btleplug; tests bind it to scripted fakes.

use std::time::Duration;

use uuid::Uuid;

use crate::error::TransportError;

/// How the peer address is interpreted by the link layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AddressType {
    Public,
    #[default]
    Random,
}

/// One asynchronous frame emitted by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub handle: u16,
    pub value: Vec<u8>,
}

/// Attribute-level operations on one physical connection.
///
/// Every method that can block must be bounded. `poll_notification` waits at
/// most `timeout`; implementations put their own ceiling on the rest and
/// report it as [`TransportError::Timeout`].
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// An open physical connection.
    type Link;

    async fn connect(
        &mut self,
        address: &str,
        address_type: AddressType,
    ) -> Result<Self::Link, TransportError>;

    /// List `(handle, descriptor)` pairs the device exposes.
    async fn enumerate_attributes(
        &mut self,
        link: &Self::Link,
    ) -> Result<Vec<(u16, Uuid)>, TransportError>;

    async fn read_attribute(
        &mut self,
        link: &Self::Link,
        handle: u16,
    ) -> Result<Vec<u8>, TransportError>;

    async fn write_attribute(
        &mut self,
        link: &Self::Link,
        handle: u16,
        data: &[u8],
    ) -> Result<(), TransportError>;

    /// Wait up to `timeout` for the next notification.
    ///
    /// `Ok(None)` means the wait expired with nothing delivered.
    async fn poll_notification(
        &mut self,
        link: &mut Self::Link,
        timeout: Duration,
    ) -> Result<Option<Notification>, TransportError>;

    async fn disconnect(&mut self, link: Self::Link) -> Result<(), TransportError>;
}
