//! Domain types - core business entities
//!
//! These types are shared by the bus, the capability protocol and the search
//! index. They carry no persistence or transport concerns of their own.

mod entity;
mod event;

pub use entity::{EntityType, ParseEntityTypeError, Watermark, WordId};
pub use event::{EventData, IndexEventData, IndexPayload, Outcome, TaskEvent};
