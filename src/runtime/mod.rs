//! Single-writer scheduler runtime and event stream APIs.

/// Event stream types emitted by the runtime.
pub mod events;
/// Handle, command loop, and source poller.
pub mod handle;
