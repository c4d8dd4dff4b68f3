//! Adapters layer: concrete implementations of the outbound ports.

pub mod event_bus;

pub use event_bus::SharedBusPublisher;
