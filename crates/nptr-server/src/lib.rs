//! HTTP server for the nptr file drop.
//!
//! `POST /` stores the `f` part of a multipart form and answers with the
//! object's public URL. `GET /{key}` streams it back with single-range
//! support. `/health` and `/status` answer `ok`.

pub mod config;
pub mod error;
pub mod handler;
pub mod range;
pub mod router;
pub mod server;
pub mod state;

pub use config::{Listen, ServerConfig, DEFAULT_MAX_UPLOAD_SIZE};
pub use error::{ServerError, ServerResult};
pub use range::{parse_range, ByteRange, RangeSpec};
pub use router::build_router;
pub use server::NptrServer;
pub use state::AppState;
