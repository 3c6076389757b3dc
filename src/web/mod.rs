mod error;
mod routes;
mod server;
mod state;
mod ws;

pub use error::{StatusBody, WebError};
pub use routes::router;
pub use server::run_web_server;
pub use state::AppState;
