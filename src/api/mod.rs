//! HTTP API surface.
//!
//! Routes: the streaming `/api/chat` relay, the `/api/messages` history
//! endpoints, and `/health`.

mod handlers;
mod server;

pub use handlers::{ApiMessage, ChatRequest, SaveMessageRequest, RELAY_REQUEST_ID_HEADER};
pub use server::{create_router, run_server, AppState};
