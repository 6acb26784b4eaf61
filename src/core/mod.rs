pub mod broker;
pub(crate) mod delivery;
pub mod error;
pub mod message;
pub mod queue_store;
pub mod registry;
pub mod router;
pub mod session;
