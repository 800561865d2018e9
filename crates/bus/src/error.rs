//! Bus error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("queue '{0}' is full")]
    Full(&'static str),
}
