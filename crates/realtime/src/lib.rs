//! Room-based realtime fan-out.
//!
//! Connected clients subscribe to named rooms; after a message is durably
//! written, the HTTP layer publishes it to the matching room. Delivery is
//! best-effort with no acknowledgment or replay. Clients that were offline
//! page through history over HTTP instead.
//!
//! The [`RoomBus`] trait is the seam for multi-process deployments: the
//! default [`InMemoryRoomBus`] keeps the registry process-local, and a
//! message-bus backed implementation can be swapped in behind the same
//! interface.

pub mod bus;
pub mod events;
pub mod room;

pub use bus::{InMemoryRoomBus, RoomBus};
pub use events::RoomEvent;
pub use room::Room;
