//! decor daemon runtime: manifest watcher + coordinator task + socket server.

mod error;
pub mod paths;
pub mod protocol;
mod runtime;
mod state;

pub use error::DaemonError;
pub use protocol::{
    request_decorations, request_status, request_stop, send_request, DaemonRequest,
    DaemonResponse,
};
pub use runtime::{run, start_blocking};
pub use state::{ApplyOutcome, SourceDecorations, SourceStatus, StatusReport};
