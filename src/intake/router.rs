//! Menu router: maps a normalized payload to one of the intake flows.
//!
//! Stateless and free of I/O. Text and selection payloads route identically,
//! so a typed "2" and a clicked row with id "2" reach the same flow.

use serde::{Deserialize, Serialize};

use crate::intake::payload::InboundPayload;

/// The intake flows offered by the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuOption {
    AirTravel,
    RealEstate,
    Other,
}

impl MenuOption {
    /// All options, in menu order.
    pub const ALL: [MenuOption; 3] = [Self::AirTravel, Self::RealEstate, Self::Other];

    /// Canonical token: what the customer types and what selection ids carry.
    pub fn token(&self) -> &'static str {
        match self {
            Self::AirTravel => "1",
            Self::RealEstate => "2",
            Self::Other => "3",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.token() == token)
    }
}

impl std::fmt::Display for MenuOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AirTravel => "air_travel",
            Self::RealEstate => "real_estate",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// Route a payload to a menu option. `None` means unmatched.
pub fn route(payload: &InboundPayload) -> Option<MenuOption> {
    MenuOption::from_token(payload.as_str().trim())
}
