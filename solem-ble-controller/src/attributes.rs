//! Binding of semantic attribute roles to the handles found on a device

use std::fmt;

use solem_proto::ble::{
    CAPABILITIES_HANDLE, COMMAND_HANDLE, NAME_HANDLE, NOTIFY_HANDLE, PREFERRED_PARAMS_HANDLE,
};
use uuid::Uuid;

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeRole {
    Name,
    Capabilities,
    PreferredParams,
    Notify,
    Command,
}

impl AttributeRole {
    pub const ALL: [AttributeRole; 5] = [
        AttributeRole::Name,
        AttributeRole::Capabilities,
        AttributeRole::PreferredParams,
        AttributeRole::Notify,
        AttributeRole::Command,
    ];

    /// The fixed handle this role lives at on the controller.
    pub fn handle(&self) -> u16 {
        match self {
            AttributeRole::Name => NAME_HANDLE,
            AttributeRole::Capabilities => CAPABILITIES_HANDLE,
            AttributeRole::PreferredParams => PREFERRED_PARAMS_HANDLE,
            AttributeRole::Notify => NOTIFY_HANDLE,
            AttributeRole::Command => COMMAND_HANDLE,
        }
    }
}

impl fmt::Display for AttributeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeRole::Name => write!(f, "name"),
            AttributeRole::Capabilities => write!(f, "capabilities"),
            AttributeRole::PreferredParams => write!(f, "preferred parameters"),
            AttributeRole::Notify => write!(f, "notify"),
            AttributeRole::Command => write!(f, "command"),
        }
    }
}

/// A role bound to a discovered attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSlot {
    pub handle: u16,
    pub descriptor: Uuid,
}

/// Attributes of one connection. Command and notify slots are always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMap {
    pub name: Option<AttributeSlot>,
    pub capabilities: Option<AttributeSlot>,
    pub preferred_params: Option<AttributeSlot>,
    pub notify: AttributeSlot,
    pub command: AttributeSlot,
}

impl AttributeMap {
    /// Bind roles by their fixed handles.
    ///
    /// Fails with [`SessionError::ProtocolMismatch`] when the command or
    /// notify slot is missing. The other roles are optional.
    pub fn resolve(discovered: &[(u16, Uuid)]) -> Result<Self, SessionError> {
        let find = |role: AttributeRole| {
            discovered
                .iter()
                .find(|(handle, _)| *handle == role.handle())
                .map(|(handle, descriptor)| AttributeSlot {
                    handle: *handle,
                    descriptor: *descriptor,
                })
        };

        let command = find(AttributeRole::Command)
            .ok_or(SessionError::ProtocolMismatch(AttributeRole::Command))?;
        let notify = find(AttributeRole::Notify)
            .ok_or(SessionError::ProtocolMismatch(AttributeRole::Notify))?;

        Ok(Self {
            name: find(AttributeRole::Name),
            capabilities: find(AttributeRole::Capabilities),
            preferred_params: find(AttributeRole::PreferredParams),
            notify,
            command,
        })
    }

    pub fn get(&self, role: AttributeRole) -> Option<AttributeSlot> {
        match role {
            AttributeRole::Name => self.name,
            AttributeRole::Capabilities => self.capabilities,
            AttributeRole::PreferredParams => self.preferred_params,
            AttributeRole::Notify => Some(self.notify),
            AttributeRole::Command => Some(self.command),
        }
    }

    /// Handle of the notify slot's configuration descriptor.
    pub fn notify_config_handle(&self) -> u16 {
        self.notify.handle + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_slots() -> Vec<(u16, Uuid)> {
        AttributeRole::ALL
            .iter()
            .map(|role| (role.handle(), Uuid::from_u128(role.handle() as u128)))
            .collect()
    }

    #[test]
    fn resolves_every_role() {
        let map = AttributeMap::resolve(&all_slots()).unwrap();
        assert_eq!(map.command.handle, 0x10);
        assert_eq!(map.notify.handle, 0x0D);
        assert_eq!(map.notify_config_handle(), 0x0E);
        assert_eq!(map.name.map(|s| s.handle), Some(0x02));
        assert_eq!(map.capabilities.map(|s| s.handle), Some(0x04));
        assert_eq!(map.preferred_params.map(|s| s.handle), Some(0x06));
    }

    #[test]
    fn missing_command_slot_is_a_mismatch() {
        let slots: Vec<_> = all_slots()
            .into_iter()
            .filter(|(h, _)| *h != COMMAND_HANDLE)
            .collect();
        let err = AttributeMap::resolve(&slots).unwrap_err();
        assert!(matches!(err, SessionError::ProtocolMismatch(AttributeRole::Command)));
    }

    #[test]
    fn missing_notify_slot_is_a_mismatch() {
        let slots: Vec<_> = all_slots()
            .into_iter()
            .filter(|(h, _)| *h != NOTIFY_HANDLE)
            .collect();
        let err = AttributeMap::resolve(&slots).unwrap_err();
        assert!(matches!(err, SessionError::ProtocolMismatch(AttributeRole::Notify)));
    }

    #[test]
    fn missing_name_is_tolerated() {
        let slots: Vec<_> = all_slots()
            .into_iter()
            .filter(|(h, _)| *h != NAME_HANDLE)
            .collect();
        let map = AttributeMap::resolve(&slots).unwrap();
        assert_eq!(map.name, None);
        assert!(map.get(AttributeRole::Capabilities).is_some());
    }

    #[test]
    fn resolution_ignores_unknown_handles() {
        let slots = vec![
            (0x03, Uuid::nil()),
            (COMMAND_HANDLE, Uuid::nil()),
            (NOTIFY_HANDLE, Uuid::nil()),
            (0x20, Uuid::nil()),
        ];
        let map = AttributeMap::resolve(&slots).unwrap();
        assert_eq!(map.name, None);
        assert_eq!(map.capabilities, None);
        assert_eq!(map.preferred_params, None);
    }
}
