pub mod common;
pub mod completions;
pub mod config;
pub mod decode;
pub mod health;
pub mod kiosk;
pub mod probe;
pub mod shift;
