mod lockout;

pub use lockout::{LockoutMiddleware, LockoutMiddlewareEndpoint};
