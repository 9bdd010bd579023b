//! 핸들러 모듈

pub mod connection;
pub mod location;

pub use connection::*;
pub use location::*;
