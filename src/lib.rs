pub mod cli;
pub mod config;
pub mod delivery;
pub mod fallback;
pub mod record;
pub mod registry;
#[doc(hidden)]
pub mod testing;
pub mod transport;
pub mod web;
