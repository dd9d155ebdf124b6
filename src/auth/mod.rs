pub use authenticator::{Authenticator, TokenError};

pub mod authenticator;
pub mod endpoint;
pub mod storage;
pub mod token;
