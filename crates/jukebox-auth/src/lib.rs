pub mod client;
pub mod cookies;
pub mod error;
pub mod session;

pub use client::AuthClient;
pub use error::AuthError;
pub use session::Session;
