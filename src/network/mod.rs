pub mod client;
pub mod error_handler;
pub mod retry;

pub use client::{Delivery, NetworkClient, Reply};
pub use error_handler::ErrorHandler;
pub use retry::RetryPolicy;
