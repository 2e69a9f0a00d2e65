pub mod config;
pub mod note;
pub mod tag;
pub mod user;

pub use config::*;
pub use note::*;
pub use tag::*;
pub use user::*;
