//! Client-side protocol editor: optimistic in-memory state plus the
//! debounced persistence coordinator that batches edits into infrequent
//! store writes.

pub mod autosave;
pub mod state;

pub use autosave::{AutosaveCoordinator, ProtocolSink, SaveState, StoreSink};
pub use state::ProtocolEditor;
