// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event kind tags.

use core::fmt;
use serde::{Serialize, Deserialize};

/// Payload-free discriminant of `EventKind`, used by policies and hashing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKindTag {
    LayerCreated = 0,
    LayerRemoved = 1,
    LayerDrawn = 2,
    LayerOrderChanged = 3,
    EventRevoked = 4,
    EventRestored = 5,
}

impl EventKindTag {
    pub const ALL: [EventKindTag; 6] = [
        EventKindTag::LayerCreated,
        EventKindTag::LayerRemoved,
        EventKindTag::LayerDrawn,
        EventKindTag::LayerOrderChanged,
        EventKindTag::EventRevoked,
        EventKindTag::EventRestored,
    ];

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(EventKindTag::LayerCreated),
            1 => Some(EventKindTag::LayerRemoved),
            2 => Some(EventKindTag::LayerDrawn),
            3 => Some(EventKindTag::LayerOrderChanged),
            4 => Some(EventKindTag::EventRevoked),
            5 => Some(EventKindTag::EventRestored),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventKindTag::LayerCreated => "layerCreated",
            EventKindTag::LayerRemoved => "layerRemoved",
            EventKindTag::LayerDrawn => "layerDrawn",
            EventKindTag::LayerOrderChanged => "layerOrderChanged",
            EventKindTag::EventRevoked => "eventRevoked",
            EventKindTag::EventRestored => "eventRestored",
        }
    }
}

impl fmt::Display for EventKindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_u8_roundtrip_covers_all() {
        for tag in EventKindTag::ALL {
            assert_eq!(EventKindTag::from_u8(tag as u8), Some(tag));
        }
        assert_eq!(EventKindTag::from_u8(6), None);
    }
}
