//! Per-registry event worker
//!
//! Filesystem watchers (outside this crate) observe both paired folders and
//! feed their notifications into one channel per registry. The worker drains
//! that channel sequentially, which is what gives the registry its per-pairing
//! ordering guarantee: two events on the same registry are never applied
//! concurrently, whatever folder they came from.
//!
//! Reserved handshake names never reach the tree. Ask appearances are split
//! off onto a signal channel for the pairing protocol; grant and denial files
//! are ignored here because the requester polls for those itself.

use std::path::PathBuf;

use tokio::task::JoinHandle;

use crate::handshake::{message_kind, MessageKind};

use super::registry::{Registry, RegistryError};

/// One watcher notification, already debounced by the watcher
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

impl WatchEvent {
    /// The path the event primarily concerns
    pub fn path(&self) -> &PathBuf {
        match self {
            WatchEvent::Created(path) | WatchEvent::Modified(path) | WatchEvent::Deleted(path) => {
                path
            }
            WatchEvent::Renamed { to, .. } => to,
        }
    }
}

/// Which paired folder an event was observed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    Shared,
    Local,
}

/// An ask file appeared in the shared folder
#[derive(Debug, Clone)]
pub struct AskSignal {
    pub ask_path: PathBuf,
}

enum WorkerMessage {
    Event(EventSource, WatchEvent),
    Shutdown,
}

/// Sending half of a registry's event channel
///
/// Handed to whatever drives the filesystem watchers. Cheap to clone.
#[derive(Clone)]
pub struct EventDispatcher {
    tx: flume::Sender<WorkerMessage>,
}

impl EventDispatcher {
    /// Queue one event for sequential application
    pub fn dispatch(&self, source: EventSource, event: WatchEvent) -> anyhow::Result<()> {
        self.tx
            .send(WorkerMessage::Event(source, event))
            .map_err(|_| anyhow::anyhow!("registry worker is gone"))
    }

    /// Ask the worker to drain and exit
    pub fn shutdown(&self) {
        // a dead worker already shut down
        let _ = self.tx.send(WorkerMessage::Shutdown);
    }
}

/// The task applying one registry's events in order
pub struct RegistryWorker {
    handle: JoinHandle<()>,
}

impl RegistryWorker {
    /// Spawn a worker for `registry`
    ///
    /// Returns the dispatcher to feed, the channel ask signals arrive on, and
    /// the worker handle. The worker exits on shutdown, when every dispatcher
    /// is dropped, or when a paired folder goes missing.
    pub fn spawn(
        registry: Registry,
    ) -> (EventDispatcher, flume::Receiver<AskSignal>, RegistryWorker) {
        let (tx, rx) = flume::unbounded();
        let (signal_tx, signal_rx) = flume::unbounded();

        let handle = tokio::spawn(async move {
            while let Ok(message) = rx.recv_async().await {
                let (source, event) = match message {
                    WorkerMessage::Shutdown => break,
                    WorkerMessage::Event(source, event) => (source, event),
                };

                if source == EventSource::Shared {
                    if let Some(kind) = reserved_kind(&event) {
                        if kind == MessageKind::Ask
                            && matches!(event, WatchEvent::Created(_) | WatchEvent::Modified(_))
                        {
                            let signal = AskSignal {
                                ask_path: event.path().clone(),
                            };
                            // nobody listening means nobody pairing right now
                            let _ = signal_tx.send(signal);
                        }
                        continue;
                    }
                }

                match registry.apply_event(source, event) {
                    Ok(()) => {}
                    Err(RegistryError::ExternalFolderMissing(path)) => {
                        tracing::error!(
                            registry = %registry.id(),
                            path = %path.display(),
                            "paired folder missing, worker exiting"
                        );
                        break;
                    }
                    Err(e) => {
                        tracing::error!(registry = %registry.id(), error = %e, "event failed");
                    }
                }
            }
            tracing::debug!(registry = %registry.id(), "registry worker exited");
        });

        (EventDispatcher { tx }, signal_rx, RegistryWorker { handle })
    }

    /// Wait for the worker to exit
    pub async fn stopped(self) {
        // the worker never panics on event errors, it logs them
        let _ = self.handle.await;
    }
}

fn reserved_kind(event: &WatchEvent) -> Option<MessageKind> {
    let name = event.path().file_name()?.to_str()?;
    message_kind(name).map(|(kind, _)| kind)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::Secret;
    use crate::handshake::ask_filename;
    use crate::testkit::{folder_pair, test_identity};

    fn running_registry() -> (Registry, tempfile::TempDir, PathBuf, PathBuf) {
        let (dir, shared, local) = folder_pair();
        let (identity, _) = test_identity("owner");
        let registry = Registry::new(
            identity,
            "chacha20-poly1305",
            Secret::generate(),
            &shared,
            &local,
        );
        registry.initialize().unwrap();
        (registry, dir, shared, local)
    }

    #[tokio::test]
    async fn test_worker_applies_events_in_order() {
        let (registry, _dir, shared, local) = running_registry();
        let (dispatcher, _signals, worker) = RegistryWorker::spawn(registry.clone());

        let file = local.join("a.txt");
        std::fs::write(&file, b"one").unwrap();
        dispatcher
            .dispatch(EventSource::Local, WatchEvent::Created(file.clone()))
            .unwrap();
        std::fs::remove_file(&file).unwrap();
        dispatcher
            .dispatch(EventSource::Local, WatchEvent::Deleted(file))
            .unwrap();

        dispatcher.shutdown();
        worker.stopped().await;

        // create then delete nets out to an empty shared folder
        assert_eq!(std::fs::read_dir(&shared).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_ask_files_are_signalled_not_applied() {
        let (registry, _dir, shared, _local) = running_registry();
        let (dispatcher, signals, worker) = RegistryWorker::spawn(registry.clone());

        let ask_path = shared.join(ask_filename("abc123"));
        std::fs::write(&ask_path, b"opaque ask bytes").unwrap();
        dispatcher
            .dispatch(EventSource::Shared, WatchEvent::Created(ask_path.clone()))
            .unwrap();

        dispatcher.shutdown();
        worker.stopped().await;

        let signal = signals.recv().unwrap();
        assert_eq!(signal.ask_path, ask_path);
        // the reserved name never entered the tree
        assert!(registry.translate_to_local(&ask_path).is_err());
    }
}
