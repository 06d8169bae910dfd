//! Watch session registry.
//!
//! A session is keyed by a client-chosen token and owns at most one live
//! watcher. Clients attach [`ChangeStream`]s to a session to receive its
//! events. A session ends when it is stopped, replaced by a new start for the
//! same token, when its last stream is dropped, or when no stream attaches
//! within a grace period after it starts.

use super::event::WatchMessage;
use super::watcher::{EventNormalizer, NoteWatcher, RelaySink};
use crate::error::{Error, Result};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

struct Session {
    generation: u64,
    root: PathBuf,
    sink: Arc<Mutex<RelaySink>>,
    sender: broadcast::Sender<WatchMessage>,
    cancel: CancellationToken,
    watcher: Option<NoteWatcher>,
    streams: usize,
    /// Whether any stream has ever attached
    attached: bool,
}

impl Session {
    /// Close the sink, end every attached stream, and stop the watcher.
    fn retire(mut self) {
        self.sink.lock().unwrap_or_else(|e| e.into_inner()).close();
        self.cancel.cancel();
        self.watcher.take();
        debug!(
            "Retired watch session generation {} on {}",
            self.generation,
            self.root.display()
        );
    }
}

#[derive(Default)]
struct Registry {
    sessions: HashMap<String, Session>,
    next_generation: u64,
}

/// How long a started session waits for its first stream.
const ATTACH_GRACE: Duration = Duration::from_secs(30);

/// Owns every active watch session.
pub struct SessionManager {
    registry: Mutex<Registry>,
    depth: usize,
    buffer: usize,
    attach_grace: Duration,
}

impl SessionManager {
    pub fn new(depth: usize, buffer: usize) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            depth,
            buffer: buffer.max(1),
            attach_grace: ATTACH_GRACE,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_attach_grace(mut self, grace: Duration) -> Self {
        self.attach_grace = grace;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start watching `root` for `client_id`, replacing any existing session
    /// for that token.
    pub async fn start(self: &Arc<Self>, client_id: &str, root: &Path) -> Result<()> {
        let root = match tokio::fs::canonicalize(root).await {
            Ok(root) => root,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::WatchRootMissing(root.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        if !tokio::fs::metadata(&root).await?.is_dir() {
            return Err(Error::NotADirectory(root));
        }

        let (sender, _) = broadcast::channel(self.buffer);
        let depth = self.depth;
        let sink_sender = sender.clone();
        let watch_root = root.clone();

        // Indexing and recursive watch registration walk the tree
        let (sink, watcher) = tokio::task::spawn_blocking(move || {
            let mut normalizer = EventNormalizer::new(watch_root.clone(), depth);
            normalizer.seed();
            let sink = Arc::new(Mutex::new(RelaySink::new(normalizer, sink_sender)));
            let watcher = NoteWatcher::start(&watch_root, Arc::clone(&sink))?;
            Ok::<_, Error>((sink, watcher))
        })
        .await
        .map_err(|e| Error::Application(format!("Watch setup task failed: {}", e)))??;

        let mut registry = self.lock();
        if let Some(previous) = registry.sessions.remove(client_id) {
            info!("Replacing watch session for client {}", client_id);
            previous.retire();
        }

        registry.next_generation += 1;
        let generation = registry.next_generation;
        let cancel = CancellationToken::new();
        self.expire_unattached(client_id, generation, cancel.clone());
        registry.sessions.insert(
            client_id.to_string(),
            Session {
                generation,
                root: root.clone(),
                sink,
                sender,
                cancel,
                watcher: Some(watcher),
                streams: 0,
                attached: false,
            },
        );

        info!("Watching {} for client {}", root.display(), client_id);
        Ok(())
    }

    /// Stop the session for `client_id`. Returns whether one existed.
    pub fn stop(&self, client_id: &str) -> bool {
        let removed = self.lock().sessions.remove(client_id);
        match removed {
            Some(session) => {
                session.retire();
                info!("Stopped watch session for client {}", client_id);
                true
            }
            None => {
                debug!("No watch session to stop for client {}", client_id);
                false
            }
        }
    }

    /// Attach a new change stream to the session for `client_id`.
    pub fn attach(self: &Arc<Self>, client_id: &str) -> Result<ChangeStream> {
        let mut registry = self.lock();
        let session = registry
            .sessions
            .get_mut(client_id)
            .ok_or_else(|| Error::WatchNotFound(client_id.to_string()))?;

        session.streams += 1;
        session.attached = true;
        debug!(
            "Stream attached to client {} ({} open)",
            client_id, session.streams
        );

        Ok(ChangeStream {
            receiver: session.sender.subscribe(),
            cancel: session.cancel.clone(),
            manager: Arc::clone(self),
            client_id: client_id.to_string(),
            generation: session.generation,
        })
    }

    /// Retire the session of `generation` if no stream has attached to it
    /// once the grace period has passed.
    fn expire_unattached(
        self: &Arc<Self>,
        client_id: &str,
        generation: u64,
        cancel: CancellationToken,
    ) {
        let manager = Arc::downgrade(self);
        let client_id = client_id.to_string();
        let grace = self.attach_grace;

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(grace) => {
                    if let Some(manager) = manager.upgrade() {
                        manager.retire_unattached(&client_id, generation);
                    }
                }
            }
        });
    }

    fn retire_unattached(&self, client_id: &str, generation: u64) {
        let mut registry = self.lock();
        let unattached = registry
            .sessions
            .get(client_id)
            .is_some_and(|session| session.generation == generation && !session.attached);
        if !unattached {
            return;
        }
        if let Some(session) = registry.sessions.remove(client_id) {
            session.retire();
            info!(
                "No stream attached for client {} within {}s, watch session closed",
                client_id,
                self.attach_grace.as_secs()
            );
        }
    }

    /// Detach one stream. The session is retired when its last stream goes,
    /// unless it has already been replaced.
    fn release(&self, client_id: &str, generation: u64) {
        let mut registry = self.lock();
        let Some(session) = registry.sessions.get_mut(client_id) else {
            return;
        };
        if session.generation != generation {
            return;
        }

        session.streams = session.streams.saturating_sub(1);
        if session.streams == 0 {
            if let Some(session) = registry.sessions.remove(client_id) {
                session.retire();
                info!("Client {} disconnected, watch session closed", client_id);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn is_active(&self, client_id: &str) -> bool {
        self.lock().sessions.contains_key(client_id)
    }

    #[cfg(test)]
    pub(crate) fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Stop every session.
    pub fn shutdown(&self) {
        let sessions: Vec<Session> = self.lock().sessions.drain().map(|(_, s)| s).collect();
        if !sessions.is_empty() {
            info!("Closing {} watch sessions", sessions.len());
        }
        for session in sessions {
            session.retire();
        }
    }

    /// Feed a raw event to a session as if the watcher had emitted it.
    #[cfg(test)]
    pub(crate) fn inject(&self, client_id: &str, event: notify::Result<notify::Event>) {
        let sink = self
            .lock()
            .sessions
            .get(client_id)
            .map(|session| Arc::clone(&session.sink));
        if let Some(sink) = sink {
            sink.lock().unwrap_or_else(|e| e.into_inner()).handle(event);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Change Stream
// ─────────────────────────────────────────────────────────────────────────────

/// Messages from one session, in watcher order.
///
/// Ends when the session is retired. Dropping the last stream of a session
/// retires it.
pub struct ChangeStream {
    receiver: broadcast::Receiver<WatchMessage>,
    cancel: CancellationToken,
    manager: Arc<SessionManager>,
    client_id: String,
    generation: u64,
}

impl ChangeStream {
    /// Wait for the next message. `None` once the session has ended.
    pub async fn next(&mut self) -> Option<WatchMessage> {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                received = self.receiver.recv() => match received {
                    Ok(message) => return Some(message),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            "Change stream for client {} lagged, skipped {} events",
                            self.client_id, skipped
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
            }
        }
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        self.manager.release(&self.client_id, self.generation);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::event::{ChangeEvent, ChangeKind};
    use notify::event::{DataChange, ModifyKind};
    use notify::{Event, EventKind};
    use tempfile::TempDir;

    fn manager() -> Arc<SessionManager> {
        Arc::new(SessionManager::new(10, 64))
    }

    fn modified(path: PathBuf) -> notify::Result<Event> {
        Ok(Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content))).add_path(path))
    }

    async fn next_within(stream: &mut ChangeStream) -> Option<WatchMessage> {
        tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn test_start_missing_root() {
        let temp = TempDir::new().unwrap();
        let manager = manager();
        let result = manager.start("c1", &temp.path().join("missing")).await;
        assert!(matches!(result, Err(Error::WatchRootMissing(_))));
        assert!(!manager.is_active("c1"));
    }

    #[tokio::test]
    async fn test_attach_without_session() {
        let manager = manager();
        assert!(matches!(
            manager.attach("nobody"),
            Err(Error::WatchNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_document_change_is_delivered() {
        let temp = TempDir::new().unwrap();
        let manager = manager();
        manager.start("c1", temp.path()).await.unwrap();
        let root = temp.path().canonicalize().unwrap();

        let mut stream = manager.attach("c1").unwrap();
        manager.inject("c1", modified(root.join("notes").join("x.md")));
        manager.inject("c1", modified(root.join("notes").join("x.txt")));
        manager.inject("c1", modified(root.join("notes").join("y.md")));

        let first = next_within(&mut stream).await.unwrap();
        assert_eq!(
            first,
            WatchMessage::Change(ChangeEvent::new(ChangeKind::Modified, "notes/x.md", false))
        );
        // The .txt change produced nothing, so the next message is y.md
        let second = next_within(&mut stream).await.unwrap();
        assert_eq!(second.as_change().unwrap().path, "notes/y.md");
    }

    #[tokio::test]
    async fn test_restart_retires_previous_session() {
        let temp = TempDir::new().unwrap();
        let manager = manager();
        let root = temp.path().canonicalize().unwrap();

        manager.start("c1", temp.path()).await.unwrap();
        let mut old_stream = manager.attach("c1").unwrap();
        let old_sink = {
            let registry = manager.lock();
            Arc::clone(&registry.sessions["c1"].sink)
        };

        manager.start("c1", temp.path()).await.unwrap();
        assert!(old_sink.lock().unwrap().is_closed());

        // Late events on the old sink go nowhere and the old stream has ended
        old_sink.lock().unwrap().handle(modified(root.join("late.md")));
        assert_eq!(old_stream.next().await, None);

        let mut new_stream = manager.attach("c1").unwrap();
        manager.inject("c1", modified(root.join("fresh.md")));
        let message = next_within(&mut new_stream).await.unwrap();
        assert_eq!(message.as_change().unwrap().path, "fresh.md");

        // Dropping the stale stream must not tear down the new session
        drop(old_stream);
        assert!(manager.is_active("c1"));
    }

    #[tokio::test]
    async fn test_stop_ends_streams() {
        let temp = TempDir::new().unwrap();
        let manager = manager();
        manager.start("c1", temp.path()).await.unwrap();
        let mut stream = manager.attach("c1").unwrap();

        assert!(manager.stop("c1"));
        assert_eq!(stream.next().await, None);
        assert!(!manager.stop("c1"));
    }

    #[tokio::test]
    async fn test_last_stream_drop_closes_session() {
        let temp = TempDir::new().unwrap();
        let manager = manager();
        manager.start("c1", temp.path()).await.unwrap();

        let first = manager.attach("c1").unwrap();
        let second = manager.attach("c1").unwrap();
        drop(first);
        assert!(manager.is_active("c1"));
        drop(second);
        assert!(!manager.is_active("c1"));
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let temp = TempDir::new().unwrap();
        let manager = manager();
        manager.start("a", temp.path()).await.unwrap();
        manager.start("b", temp.path()).await.unwrap();

        manager.stop("a");
        assert!(manager.is_active("b"));

        manager.shutdown();
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn test_unattached_session_expires() {
        let temp = TempDir::new().unwrap();
        let manager = Arc::new(
            SessionManager::new(10, 64).with_attach_grace(Duration::from_millis(100)),
        );

        manager.start("idle", temp.path()).await.unwrap();
        manager.start("busy", temp.path()).await.unwrap();
        let _stream = manager.attach("busy").unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!manager.is_active("idle"));
        assert!(manager.is_active("busy"));
    }

    #[tokio::test]
    async fn test_restart_resets_attach_grace() {
        let temp = TempDir::new().unwrap();
        let manager = Arc::new(
            SessionManager::new(10, 64).with_attach_grace(Duration::from_millis(300)),
        );

        manager.start("c1", temp.path()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        manager.start("c1", temp.path()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        // The first generation's timer ended with its session
        assert!(manager.is_active("c1"));
        let _stream = manager.attach("c1").unwrap();
    }

    #[tokio::test]
    async fn test_real_filesystem_change_is_observed() {
        let temp = TempDir::new().unwrap();
        let manager = manager();
        manager.start("c1", temp.path()).await.unwrap();
        let mut stream = manager.attach("c1").unwrap();

        std::fs::write(temp.path().join("live.md"), "hello").unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        let mut seen = false;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout_at(deadline, stream.next()).await {
                Ok(Some(message)) => {
                    if message.as_change().is_some_and(|c| c.path == "live.md") {
                        seen = true;
                        break;
                    }
                }
                _ => break,
            }
        }
        assert!(seen, "expected an event for live.md");
    }

    #[tokio::test]
    async fn test_new_directory_contents_are_observed() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(".git")).unwrap();
        let manager = manager();
        manager.start("c1", temp.path()).await.unwrap();
        let mut stream = manager.attach("c1").unwrap();

        let journal = temp.path().join("journal");
        std::fs::create_dir(&journal).unwrap();
        std::fs::write(journal.join("today.md"), "entry").unwrap();
        std::fs::write(temp.path().join(".git").join("HEAD.md"), "x").unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        let mut seen = Vec::new();
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout_at(deadline, stream.next()).await {
                Ok(Some(message)) => {
                    if let Some(change) = message.as_change() {
                        seen.push(change.path.clone());
                        if change.path == "journal/today.md" {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
        assert!(
            seen.iter().any(|p| p == "journal/today.md"),
            "expected an event for journal/today.md, saw {:?}",
            seen
        );
        assert!(seen.iter().all(|p| !p.starts_with(".git")));
    }
}
