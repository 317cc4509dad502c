//! Temperature telemetry: sensor read, persisted history, periodic sampling

pub mod sampler;
pub mod sensor;
pub mod store;

pub use sensor::W1TempSensor;
pub use store::{TempStore, ACCEPTED_INTERVALS};
