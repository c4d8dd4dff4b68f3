//! # Shared Bus - Event Bus for Inter-Subsystem Communication
//!
//! All inter-subsystem notifications flow through this bus; subsystems never
//! call each other directly. Request/response interactions go through each
//! subsystem's ports instead, so the bus stays fire-and-forget.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Topology (1) │                    │  Queen (4)   │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! Delivery failures on the bus surface as node-health degradation in the
//! subscribing subsystem, never as publish errors; a slow subscriber may lag
//! and lose events, which every protocol above tolerates.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, EventTopic, SwarmEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, EventSubscriber, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before backpressure.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_CHANNEL_CAPACITY, 1000);
    }
}
