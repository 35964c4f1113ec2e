//! Connection lifecycle and command sequencing for one controller

use std::ops::AsyncFnOnce;

use solem_proto::{commit, Command};
use solem_proto::ble::{NOTIFY_DISABLE, NOTIFY_ENABLE};

use crate::attributes::{AttributeMap, AttributeRole};
use crate::config::{should_retry, SessionConfig};
use crate::error::{SessionError, Stage};
use crate::sink::NotificationSink;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    NotificationsArmed,
}

/// Peripheral preferred connection parameters, in 1.25 ms / 10 ms units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionParams {
    pub min_interval: u16,
    pub max_interval: u16,
    pub latency: u16,
    pub timeout: u16,
}

impl ConnectionParams {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let data: &[u8; 8] = data.try_into().ok()?;
        Some(Self {
            min_interval: u16::from_le_bytes([data[0], data[1]]),
            max_interval: u16::from_le_bytes([data[2], data[3]]),
            latency: u16::from_le_bytes([data[4], data[5]]),
            timeout: u16::from_le_bytes([data[6], data[7]]),
        })
    }
}

/// Best-effort telemetry read from the optional slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: Option<String>,
    pub capabilities: Option<Vec<u8>>,
    pub preferred_params: Option<ConnectionParams>,
}

/// One connection to one controller.
///
/// All operations take `&mut self` and are meant to be driven from a single
/// task. Notifications reach the sink only inside a drain, after a write.
pub struct Session<T: Transport, S: NotificationSink> {
    transport: T,
    sink: S,
    config: SessionConfig,
    state: SessionState,
    link: Option<T::Link>,
    address: Option<String>,
    attributes: Option<AttributeMap>,
}

impl<T: Transport, S: NotificationSink> Session<T, S> {
    pub fn new(transport: T, sink: S, config: SessionConfig) -> Self {
        Self {
            transport,
            sink,
            config,
            state: SessionState::Disconnected,
            link: None,
            address: None,
            attributes: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn attributes(&self) -> Option<&AttributeMap> {
        self.attributes.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Open the physical link, retrying per the configured policy.
    pub async fn connect(&mut self, address: &str) -> Result<(), SessionError> {
        if self.link.is_some() {
            let current = self.address.clone().unwrap_or_default();
            return Err(SessionError::AlreadyConnected(current));
        }

        let policy = self.config.retry;
        let mut attempts_left = policy.budget();
        let mut attempt = 0;
        self.state = SessionState::Connecting;

        loop {
            attempt += 1;
            tracing::debug!(%address, attempt, "connecting");
            match self.transport.connect(address, self.config.address_type).await {
                Ok(link) => {
                    self.link = Some(link);
                    self.address = Some(address.to_string());
                    self.state = SessionState::Connected;
                    tracing::info!(%address, attempt, "connected");
                    return Ok(());
                }
                Err(e) => {
                    attempts_left -= 1;
                    tracing::warn!(%address, attempt, attempts_left, error = %e, "connect failed");
                    if !should_retry(attempts_left) {
                        self.state = SessionState::Disconnected;
                        return Err(SessionError::ConnectionFailed {
                            address: address.to_string(),
                            attempts: attempt,
                            source: e,
                        });
                    }
                    tokio::time::sleep(policy.backoff).await;
                }
            }
        }
    }

    /// Bind the attribute roles against what the device exposes.
    ///
    /// On [`SessionError::ProtocolMismatch`] the link stays open but commands
    /// are refused; the caller should disconnect.
    pub async fn resolve_attributes(&mut self) -> Result<&AttributeMap, SessionError> {
        let link = self.link.as_ref().ok_or(SessionError::NotConnected)?;
        self.attributes = None;

        let discovered = self
            .transport
            .enumerate_attributes(link)
            .await
            .map_err(SessionError::Discovery)?;
        for (handle, descriptor) in &discovered {
            tracing::debug!(handle = format_args!("0x{handle:04x}"), %descriptor, "attribute");
        }

        let map = AttributeMap::resolve(&discovered)?;
        for role in AttributeRole::ALL {
            if map.get(role).is_none() {
                tracing::debug!(%role, "optional attribute not present");
            }
        }
        Ok(&*self.attributes.insert(map))
    }

    /// Connect and resolve attributes in one step.
    pub async fn open(&mut self, address: &str) -> Result<(), SessionError> {
        self.connect(address).await?;
        self.resolve_attributes().await?;
        Ok(())
    }

    pub async fn enable_notifications(&mut self) -> Result<(), SessionError> {
        let (link, attributes) = ready(&self.link, self.state, &self.attributes)?;
        if self.state == SessionState::NotificationsArmed {
            return Ok(());
        }
        let handle = attributes.notify_config_handle();
        self.transport
            .write_attribute(link, handle, &NOTIFY_ENABLE)
            .await
            .map_err(|source| SessionError::CommandFailed {
                stage: Stage::EnableNotifications,
                source,
            })?;
        self.state = SessionState::NotificationsArmed;
        tracing::debug!(handle = format_args!("0x{handle:04x}"), "notifications enabled");
        Ok(())
    }

    pub async fn disable_notifications(&mut self) -> Result<(), SessionError> {
        let (link, attributes) = ready(&self.link, self.state, &self.attributes)?;
        if self.state != SessionState::NotificationsArmed {
            return Ok(());
        }
        let handle = attributes.notify_config_handle();
        self.transport
            .write_attribute(link, handle, &NOTIFY_DISABLE)
            .await
            .map_err(|source| SessionError::CommandFailed {
                stage: Stage::DisableNotifications,
                source,
            })?;
        self.state = SessionState::Connected;
        tracing::debug!(handle = format_args!("0x{handle:04x}"), "notifications disabled");
        Ok(())
    }

    /// Stage `command`, then commit it.
    ///
    /// A failed write leaves the connection as it was unless the link itself
    /// was lost, in which case the session is disconnected and any remaining
    /// write fails with [`SessionError::NotConnected`]. Nothing is retried:
    /// resending a staged command could apply it twice.
    pub async fn issue(&mut self, command: &Command) -> Result<(), SessionError> {
        let (_, attributes) = ready(&self.link, self.state, &self.attributes)?;
        let handle = attributes.command.handle;

        tracing::info!(%command, "sending command");
        self.write_command_slot(handle, &command.encode(), Stage::Command).await?;
        self.drain().await;

        self.write_command_slot(handle, &commit(), Stage::Commit).await?;
        self.drain().await;

        tracing::debug!(%command, "committed");
        Ok(())
    }

    pub async fn power_on(&mut self) -> Result<(), SessionError> {
        self.issue(&Command::PowerOn).await
    }

    pub async fn power_off(&mut self) -> Result<(), SessionError> {
        self.issue(&Command::PowerOff).await
    }

    pub async fn disable_for_days(&mut self, days: u8) -> Result<(), SessionError> {
        self.issue(&Command::DisableForDays(days)).await
    }

    pub async fn stop_watering(&mut self) -> Result<(), SessionError> {
        self.issue(&Command::StopWatering).await
    }

    pub async fn start_all_zones(&mut self, secs: u32) -> Result<(), SessionError> {
        let command = Command::start_all_zones(secs)?;
        self.issue(&command).await
    }

    pub async fn start_zone(&mut self, zone: u8, secs: u32) -> Result<(), SessionError> {
        let command = Command::start_zone(zone, secs)?;
        self.issue(&command).await
    }

    pub async fn run_program(&mut self, program: u16) -> Result<(), SessionError> {
        self.issue(&Command::RunProgram(program)).await
    }

    /// Read whichever optional slots the device exposes.
    pub async fn device_info(&mut self) -> Result<DeviceInfo, SessionError> {
        let (link, attributes) = ready(&self.link, self.state, &self.attributes)?;
        let mut info = DeviceInfo::default();

        for role in [
            AttributeRole::Name,
            AttributeRole::Capabilities,
            AttributeRole::PreferredParams,
        ] {
            let Some(slot) = attributes.get(role) else {
                continue;
            };
            let value = match self.transport.read_attribute(link, slot.handle).await {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(%role, error = %e, "attribute read failed");
                    continue;
                }
            };
            match role {
                AttributeRole::Name => {
                    let name = String::from_utf8_lossy(&value);
                    info.name = Some(name.trim_end_matches('\0').to_string());
                }
                AttributeRole::Capabilities => info.capabilities = Some(value),
                AttributeRole::PreferredParams => {
                    info.preferred_params = ConnectionParams::from_bytes(&value);
                    if info.preferred_params.is_none() {
                        tracing::debug!(len = value.len(), "unexpected preferred parameters length");
                    }
                }
                AttributeRole::Notify | AttributeRole::Command => {}
            }
        }
        Ok(info)
    }

    /// Poll for notifications for the configured budget.
    ///
    /// Returns how many arrived. Faults end the drain early and are only
    /// logged, except a lost link, which also tears the session down.
    pub async fn drain(&mut self) -> usize {
        let Some(link) = self.link.as_mut() else {
            return 0;
        };
        let armed = self.state == SessionState::NotificationsArmed;
        let policy = self.config.drain;
        let mut delivered = 0;
        let mut lost = false;

        for _ in 0..policy.polls {
            match self.transport.poll_notification(link, policy.timeout).await {
                Ok(Some(notification)) => {
                    delivered += 1;
                    if armed {
                        self.sink.on_notification(notification.handle, &notification.value);
                    } else {
                        tracing::debug!(handle = notification.handle, "notification while disarmed, dropped");
                    }
                }
                Ok(None) => tracing::trace!("waiting for notifications"),
                Err(e) => {
                    tracing::warn!(error = %e, "notification poll failed");
                    lost = e.is_link_lost();
                    break;
                }
            }
        }

        if lost {
            self.link_lost().await;
        }
        delivered
    }

    /// Close the link. Safe to call in any state and more than once.
    pub async fn disconnect(&mut self) {
        self.attributes = None;
        self.state = SessionState::Disconnected;
        let address = self.address.take().unwrap_or_default();

        let Some(link) = self.link.take() else {
            return;
        };
        match self.transport.disconnect(link).await {
            Ok(()) => tracing::info!(%address, "disconnected"),
            Err(e) => tracing::warn!(%address, error = %e, "disconnect failed, link dropped"),
        }
    }

    async fn link_lost(&mut self) {
        tracing::warn!(address = self.address.as_deref().unwrap_or_default(), "link lost");
        self.disconnect().await;
    }

    async fn write_command_slot(
        &mut self,
        handle: u16,
        data: &[u8],
        stage: Stage,
    ) -> Result<(), SessionError> {
        let link = self.link.as_ref().ok_or(SessionError::NotConnected)?;
        let result = self.transport.write_attribute(link, handle, data).await;
        if let Err(source) = result {
            if source.is_link_lost() {
                self.link_lost().await;
            }
            return Err(SessionError::CommandFailed { stage, source });
        }
        Ok(())
    }
}

/// The open link and resolved attributes, as required by every command.
fn ready<'a, L>(
    link: &'a Option<L>,
    state: SessionState,
    attributes: &'a Option<AttributeMap>,
) -> Result<(&'a L, &'a AttributeMap), SessionError> {
    let link = match (link, state) {
        (Some(link), SessionState::Connected | SessionState::NotificationsArmed) => link,
        _ => return Err(SessionError::NotConnected),
    };
    let attributes = attributes
        .as_ref()
        .ok_or(SessionError::AttributesUnresolved)?;
    Ok((link, attributes))
}

impl<T: Transport, S: NotificationSink> Drop for Session<T, S> {
    fn drop(&mut self) {
        if self.link.is_some() {
            tracing::warn!(
                address = self.address.as_deref().unwrap_or_default(),
                "session dropped while connected"
            );
        }
    }
}

/// Run `f` against a connected, resolved and armed session.
///
/// The session is disconnected exactly once afterwards, whether connecting,
/// resolving, arming or `f` failed.
pub async fn with_session<T, S, F, R>(
    transport: T,
    sink: S,
    config: SessionConfig,
    address: &str,
    f: F,
) -> Result<R, SessionError>
where
    T: Transport,
    S: NotificationSink,
    F: AsyncFnOnce(&mut Session<T, S>) -> Result<R, SessionError>,
{
    let mut session = Session::new(transport, sink, config);
    let result = async {
        session.open(address).await?;
        session.enable_notifications().await?;
        f(&mut session).await
    }
    .await;
    session.disconnect().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferred_params_need_eight_bytes() {
        let params = ConnectionParams::from_bytes(&[0x18, 0, 0x28, 0, 0, 0, 0x90, 0x01]).unwrap();
        assert_eq!(params.min_interval, 24);
        assert_eq!(params.max_interval, 40);
        assert_eq!(params.latency, 0);
        assert_eq!(params.timeout, 400);
        assert_eq!(ConnectionParams::from_bytes(&[0; 7]), None);
    }
}
