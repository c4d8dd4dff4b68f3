//! Adapters binding the outbound ports to concrete infrastructure.

pub mod event_bus;

pub use event_bus::SharedBusPublisher;
