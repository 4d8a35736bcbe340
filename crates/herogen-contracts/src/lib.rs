pub mod commands;
pub mod events;
pub mod image;
pub mod session;
pub mod wizard;
