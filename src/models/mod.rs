pub mod credits;
pub mod order;
pub mod response;
pub mod user;
pub mod wallpaper;

pub use credits::*;
pub use order::*;
pub use response::*;
pub use user::*;
pub use wallpaper::*;
