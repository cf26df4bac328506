// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod id;
pub mod enums;
pub mod geometry;

pub use enums::EventKindTag;
pub use geometry::{Color, Position, Size};
pub use id::{EventId, LayerId, UserId};
