//! Device profiles: the compact overlay size for each supported machine.

use serde::Serialize;

/// Base (compact) overlay dimensions for one kind of display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeviceProfile {
    pub id: &'static str,
    pub display_name: &'static str,
    pub base_width: f64,
    pub base_height: f64,
}

pub const MACBOOK_14: DeviceProfile = DeviceProfile {
    id: "macbook-14",
    display_name: "14-inch MacBook Pro",
    base_width: 170.0,
    base_height: 32.0,
};

pub const MACBOOK_16: DeviceProfile = DeviceProfile {
    id: "macbook-16",
    display_name: "16-inch MacBook Pro",
    base_width: 200.0,
    base_height: 37.0,
};

pub const NO_NOTCH: DeviceProfile = DeviceProfile {
    id: "no-notch",
    display_name: "No Notch / Other Mac",
    base_width: 200.0,
    base_height: 32.0,
};

/// Profile used when the configured id is missing or unknown.
pub const DEFAULT_PROFILE: DeviceProfile = MACBOOK_14;

pub const PROFILES: [DeviceProfile; 3] = [MACBOOK_14, MACBOOK_16, NO_NOTCH];

impl DeviceProfile {
    /// Finds a profile by id, also accepting its display name.
    pub fn lookup(id: &str) -> Option<DeviceProfile> {
        let id = id.trim();
        PROFILES
            .iter()
            .find(|p| p.id.eq_ignore_ascii_case(id) || p.display_name == id)
            .copied()
    }

    /// Resolves the configured id, falling back to [`DEFAULT_PROFILE`].
    pub fn resolve(id: Option<&str>) -> DeviceProfile {
        match id {
            Some(id) => Self::lookup(id).unwrap_or_else(|| {
                log::warn!(
                    "Unknown device profile '{}', using '{}'",
                    id,
                    DEFAULT_PROFILE.id
                );
                DEFAULT_PROFILE
            }),
            None => DEFAULT_PROFILE,
        }
    }
}
