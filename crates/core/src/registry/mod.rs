//! The entry tree, the registry around it, and its event worker

mod entry;
mod events;
mod registry;

pub use entry::{EntryId, EntryKind, EntryTree, TreeError};
pub use events::{AskSignal, EventDispatcher, EventSource, RegistryWorker, WatchEvent};
pub use registry::{Registry, RegistryError, RegistryState};
