pub mod identity;
pub mod jwt;
pub mod retry;

pub use identity::*;
pub use jwt::*;
pub use retry::*;
