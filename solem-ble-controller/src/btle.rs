//! btleplug binding of the [`Transport`] trait
//!
//! btleplug addresses characteristics by UUID and hides ATT handles, so the
//! binding maps the controller's known UUIDs onto their fixed handles. Writes
//! to the notify configuration handle become subscribe/unsubscribe calls.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use btleplug::api::{
    BDAddr, Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, ValueNotification,
    WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::{Stream, StreamExt};
use uuid::Uuid;

use solem_proto::ble::{
    handle_for_uuid, NOTIFY_CONFIG_HANDLE, NOTIFY_DISABLE, NOTIFY_ENABLE, NOTIFY_HANDLE,
};

use crate::error::TransportError;
use crate::transport::{AddressType, Notification, Transport};

/// How often the adapter's peripheral list is checked while scanning
const SCAN_POLL: Duration = Duration::from_millis(250);

type NotificationStream = Pin<Box<dyn Stream<Item = ValueNotification> + Send>>;

/// Await a btleplug call for at most `limit`.
async fn bounded<T>(
    operation: &'static str,
    limit: Duration,
    call: impl Future<Output = Result<T, btleplug::Error>>,
) -> Result<T, TransportError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(TransportError::Timeout {
            operation,
            after: limit,
        }),
    }
}

/// Get the default Bluetooth adapter
pub async fn get_adapter() -> Result<Adapter, TransportError> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters.into_iter().next().ok_or(TransportError::NoAdapter)
}

/// Wait until the adapter has seen the peripheral with `address`.
///
/// Only the requested address is looked for; nothing else the scan turns up
/// is reported.
pub async fn find_peripheral(
    adapter: &Adapter,
    address: BDAddr,
    scan_timeout: Duration,
) -> Result<Peripheral, TransportError> {
    adapter.start_scan(ScanFilter::default()).await?;
    let found = wait_for_peripheral(adapter, address, scan_timeout).await;
    if let Err(e) = adapter.stop_scan().await {
        tracing::warn!(error = %e, "failed to stop scan");
    }
    found?.ok_or_else(|| TransportError::DeviceNotFound(address.to_string()))
}

async fn wait_for_peripheral(
    adapter: &Adapter,
    address: BDAddr,
    scan_timeout: Duration,
) -> Result<Option<Peripheral>, TransportError> {
    let deadline = tokio::time::Instant::now() + scan_timeout;
    loop {
        let peripherals = adapter.peripherals().await?;
        if let Some(peripheral) = peripherals.into_iter().find(|p| p.address() == address) {
            return Ok(Some(peripheral));
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(SCAN_POLL).await;
    }
}

/// A connected controller
pub struct BtleLink {
    peripheral: Peripheral,
    characteristics: BTreeMap<u16, Characteristic>,
    notifications: NotificationStream,
}

impl BtleLink {
    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }

    fn characteristic(&self, handle: u16) -> Result<&Characteristic, TransportError> {
        self.characteristics
            .get(&handle)
            .ok_or(TransportError::UnknownHandle(handle))
    }
}

pub struct BtleTransport {
    scan_timeout: Duration,
    /// Ceiling for every connect, discovery, read, write and subscription call
    io_timeout: Duration,
    adapter: Option<Adapter>,
}

impl BtleTransport {
    pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Self {
        Self::with_timeouts(Self::DEFAULT_SCAN_TIMEOUT, Self::DEFAULT_IO_TIMEOUT)
    }

    pub fn with_timeouts(scan_timeout: Duration, io_timeout: Duration) -> Self {
        Self {
            scan_timeout,
            io_timeout,
            adapter: None,
        }
    }

    pub fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    async fn adapter(&mut self) -> Result<Adapter, TransportError> {
        if let Some(adapter) = &self.adapter {
            return Ok(adapter.clone());
        }
        let adapter = get_adapter().await?;
        self.adapter = Some(adapter.clone());
        Ok(adapter)
    }
}

impl Default for BtleTransport {
    fn default() -> Self {
        Self::new()
    }
}

async fn open_link(peripheral: Peripheral, io_timeout: Duration) -> Result<BtleLink, TransportError> {
    bounded("service discovery", io_timeout, peripheral.discover_services()).await?;

    let mut characteristics = BTreeMap::new();
    for characteristic in peripheral.characteristics() {
        if let Some(handle) = handle_for_uuid(&characteristic.uuid.to_string()) {
            characteristics.insert(handle, characteristic);
        }
    }
    let notifications = bounded("notification stream", io_timeout, peripheral.notifications()).await?;

    Ok(BtleLink {
        peripheral,
        characteristics,
        notifications,
    })
}

impl Transport for BtleTransport {
    type Link = BtleLink;

    async fn connect(
        &mut self,
        address: &str,
        address_type: AddressType,
    ) -> Result<BtleLink, TransportError> {
        let target: BDAddr = address
            .parse()
            .map_err(|_| TransportError::InvalidAddress(address.to_string()))?;
        // bluez and CoreBluetooth pick the address type from the advertisement
        tracing::debug!(%target, ?address_type, "looking for peripheral");

        let adapter = self.adapter().await?;
        let peripheral = find_peripheral(&adapter, target, self.scan_timeout).await?;
        let limit = self.io_timeout;
        if !bounded("connection check", limit, peripheral.is_connected()).await? {
            bounded("connect", limit, peripheral.connect()).await?;
        }

        match open_link(peripheral.clone(), limit).await {
            Ok(link) => Ok(link),
            Err(e) => {
                if let Err(close) = bounded("disconnect", limit, peripheral.disconnect()).await {
                    tracing::warn!(error = %close, "failed to disconnect after setup error");
                }
                Err(e)
            }
        }
    }

    async fn enumerate_attributes(
        &mut self,
        link: &BtleLink,
    ) -> Result<Vec<(u16, Uuid)>, TransportError> {
        Ok(link
            .characteristics
            .iter()
            .map(|(handle, characteristic)| (*handle, characteristic.uuid))
            .collect())
    }

    async fn read_attribute(
        &mut self,
        link: &BtleLink,
        handle: u16,
    ) -> Result<Vec<u8>, TransportError> {
        let characteristic = link.characteristic(handle)?;
        bounded("read", self.io_timeout, link.peripheral.read(characteristic)).await
    }

    async fn write_attribute(
        &mut self,
        link: &BtleLink,
        handle: u16,
        data: &[u8],
    ) -> Result<(), TransportError> {
        if handle == NOTIFY_CONFIG_HANDLE {
            let notify = link.characteristic(NOTIFY_HANDLE)?;
            if data == NOTIFY_ENABLE.as_slice() {
                bounded("subscribe", self.io_timeout, link.peripheral.subscribe(notify)).await?;
            } else if data == NOTIFY_DISABLE.as_slice() {
                bounded("unsubscribe", self.io_timeout, link.peripheral.unsubscribe(notify)).await?;
            } else {
                return Err(TransportError::Other(format!(
                    "unsupported notification configuration {data:02x?}"
                )));
            }
            return Ok(());
        }

        let characteristic = link.characteristic(handle)?;
        bounded(
            "write",
            self.io_timeout,
            link.peripheral.write(characteristic, data, WriteType::WithResponse),
        )
        .await
    }

    async fn poll_notification(
        &mut self,
        link: &mut BtleLink,
        timeout: Duration,
    ) -> Result<Option<Notification>, TransportError> {
        match tokio::time::timeout(timeout, link.notifications.next()).await {
            Err(_) => Ok(None),
            Ok(None) => Err(TransportError::Closed),
            Ok(Some(notification)) => {
                let handle = handle_for_uuid(&notification.uuid.to_string()).unwrap_or(NOTIFY_HANDLE);
                Ok(Some(Notification {
                    handle,
                    value: notification.value,
                }))
            }
        }
    }

    async fn disconnect(&mut self, link: BtleLink) -> Result<(), TransportError> {
        bounded("disconnect", self.io_timeout, link.peripheral.disconnect()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn stalled_call_times_out() {
        let limit = Duration::from_secs(10);
        let start = tokio::time::Instant::now();

        let err = bounded("connect", limit, std::future::pending::<Result<(), btleplug::Error>>())
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Timeout { operation: "connect", after } if after == limit));
        assert_eq!(start.elapsed(), limit);
        assert_eq!(err.to_string(), "connect timed out after 10s");
    }

    #[tokio::test(start_paused = true)]
    async fn bluetooth_errors_pass_through() {
        let err = bounded("write", Duration::from_secs(1), async {
            Err::<(), _>(btleplug::Error::NotConnected)
        })
        .await
        .unwrap_err();
        assert!(err.is_link_lost());

        let value = bounded("read", Duration::from_secs(1), async { Ok(vec![1, 2]) })
            .await
            .unwrap();
        assert_eq!(value, vec![1, 2]);
    }

    #[test]
    fn transport_defaults() {
        let transport = BtleTransport::default();
        assert_eq!(transport.io_timeout(), BtleTransport::DEFAULT_IO_TIMEOUT);
        let transport = BtleTransport::with_timeouts(Duration::from_secs(2), Duration::from_secs(3));
        assert_eq!(transport.scan_timeout, Duration::from_secs(2));
        assert_eq!(transport.io_timeout(), Duration::from_secs(3));
    }
}
