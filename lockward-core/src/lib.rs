pub mod cache_signing;
pub mod lockout;
mod services;
pub use services::*;
