pub mod api;
pub mod server;

pub use api::MonitorState;
pub use server::{router, run_server, serve};
