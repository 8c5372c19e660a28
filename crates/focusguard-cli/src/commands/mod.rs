pub mod blocking;
pub mod config;
pub mod idle;
pub mod site;
pub mod stats;
pub mod tick;
pub mod transfer;
