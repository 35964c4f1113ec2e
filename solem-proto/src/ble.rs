//! BLE GATT constants for the Solem irrigation controller
//!
//! The controller exposes a vendor service with one write characteristic
//! (commands) and one notify characteristic (status). Attributes are
//! addressed by fixed ATT handles; the UUIDs are only needed by stacks that
//! do not expose handles.

/// Device Name characteristic handle (read)
pub const NAME_HANDLE: u16 = 0x02;

/// Appearance characteristic handle (read), reported as device capabilities
pub const CAPABILITIES_HANDLE: u16 = 0x04;

/// Peripheral Preferred Connection Parameters handle (read)
pub const PREFERRED_PARAMS_HANDLE: u16 = 0x06;

/// Status characteristic handle (notify)
pub const NOTIFY_HANDLE: u16 = 0x0D;

/// Command characteristic handle (write)
pub const COMMAND_HANDLE: u16 = 0x10;

/// Client Characteristic Configuration descriptor of the status characteristic
pub const NOTIFY_CONFIG_HANDLE: u16 = NOTIFY_HANDLE + 1;

/// Written to [`NOTIFY_CONFIG_HANDLE`] to turn notifications on
pub const NOTIFY_ENABLE: [u8; 2] = [0x01, 0x00];

/// Written to [`NOTIFY_CONFIG_HANDLE`] to turn notifications off
pub const NOTIFY_DISABLE: [u8; 2] = [0x00, 0x00];

/// Device Name (0x2A00)
pub const NAME_UUID: &str = "00002a00-0000-1000-8000-00805f9b34fb";

/// Appearance (0x2A01)
pub const CAPABILITIES_UUID: &str = "00002a01-0000-1000-8000-00805f9b34fb";

/// Peripheral Preferred Connection Parameters (0x2A04)
pub const PREFERRED_PARAMS_UUID: &str = "00002a04-0000-1000-8000-00805f9b34fb";

/// Vendor status characteristic (notify)
pub const NOTIFY_UUID: &str = "108b0003-eab5-bc09-d0ea-0b8f467ce8ee";

/// Vendor command characteristic (write)
pub const COMMAND_UUID: &str = "108b0002-eab5-bc09-d0ea-0b8f467ce8ee";

/// Handle/UUID pairs for every attribute the controller addresses.
pub const KNOWN_ATTRIBUTES: [(u16, &str); 5] = [
    (NAME_HANDLE, NAME_UUID),
    (CAPABILITIES_HANDLE, CAPABILITIES_UUID),
    (PREFERRED_PARAMS_HANDLE, PREFERRED_PARAMS_UUID),
    (NOTIFY_HANDLE, NOTIFY_UUID),
    (COMMAND_HANDLE, COMMAND_UUID),
];

/// Look up the fixed handle of a known characteristic UUID (case-insensitive).
pub fn handle_for_uuid(uuid: &str) -> Option<u16> {
    KNOWN_ATTRIBUTES
        .iter()
        .find(|(_, known)| known.eq_ignore_ascii_case(uuid))
        .map(|(handle, _)| *handle)
}

/// Look up the UUID of a fixed handle.
pub fn uuid_for_handle(handle: u16) -> Option<&'static str> {
    KNOWN_ATTRIBUTES
        .iter()
        .find(|(known, _)| *known == handle)
        .map(|(_, uuid)| *uuid)
}
