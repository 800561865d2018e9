pub mod bus;
pub mod cache;
pub mod error;
pub mod fifo;

pub use bus::{MessageBus, ModelUpdate, MODEL_UPDATE_KEY, REFERENCE_DATA_KEY};
pub use cache::ValueCache;
pub use error::BusError;
pub use fifo::Fifo;
