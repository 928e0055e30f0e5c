pub mod config;
pub mod entity;
pub mod error;
pub mod money;
pub mod plugins;
pub mod prelude;
pub mod state;
pub mod sv;
