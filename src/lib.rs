pub mod collection;
pub mod config;
pub mod error;
pub mod events;
pub mod item;
pub mod monitor;
pub mod scan;
pub mod session;
pub mod processing {
    pub mod compose;
    pub mod decode;
    pub mod layout;
    pub mod resize;
}
pub mod tasks {
    pub mod loader;
    pub mod presenter;
}

pub use error::{DecodeError, Error};
