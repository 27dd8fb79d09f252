// Application layer: use cases built on top of the store.

mod error;
mod service;
mod transfer;

pub use error::*;
pub use service::*;
pub use transfer::*;
