pub mod analysis;
pub mod backend;
pub mod error;
pub mod frame;
