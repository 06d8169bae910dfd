//! Filesystem watcher and event normalization.
//!
//! `notify` delivers raw events on its own thread. Each session owns a
//! [`RelaySink`] behind an `Arc<Mutex<_>>`; the watcher callback feeds raw
//! events into it, and the sink normalizes them into [`ChangeEvent`]s and
//! publishes them on the session's broadcast channel.
//!
//! Directories are watched one level at a time. Only the root and the
//! non-hidden directories within the depth limit carry a watch; directories
//! created later are registered by a helper thread as the sink reports them.

use super::event::{ChangeEvent, ChangeKind, WatchMessage};
use crate::error::{Error, Result};
use crate::files::{is_document, relative_path};
use log::{debug, warn};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex, Weak};
use std::thread;
use tokio::sync::broadcast;
use walkdir::WalkDir;

// ─────────────────────────────────────────────────────────────────────────────
// Normalization
// ─────────────────────────────────────────────────────────────────────────────

/// Turns raw notify events into change events relative to a root.
#[derive(Debug)]
pub struct EventNormalizer {
    root: PathBuf,
    /// Deepest directory level below the root that is reported
    depth: usize,
    /// Directories known to exist, so removals can be tagged as directories
    known_dirs: HashSet<PathBuf>,
}

impl EventNormalizer {
    pub fn new(root: PathBuf, depth: usize) -> Self {
        Self {
            root,
            depth,
            known_dirs: HashSet::new(),
        }
    }

    /// Index the directories that already exist below the root.
    ///
    /// Dot-directories are not descended into. Nothing is emitted.
    pub fn seed(&mut self) {
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(self.depth + 1)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !is_hidden_name(entry.file_name().to_str()));

        for entry in walker.flatten() {
            if entry.file_type().is_dir() {
                self.known_dirs.insert(entry.into_path());
            }
        }
        debug!(
            "Indexed {} directories under {}",
            self.known_dirs.len(),
            self.root.display()
        );
    }

    /// Directories that carry a watch: the root plus every indexed directory
    /// whose children are still within the depth limit.
    pub fn watch_targets(&self) -> Vec<PathBuf> {
        let mut targets = vec![self.root.clone()];
        targets.extend(
            self.known_dirs
                .iter()
                .filter(|dir| self.watch_target_depth(dir))
                .cloned(),
        );
        targets
    }

    fn watch_target_depth(&self, dir: &Path) -> bool {
        dir.strip_prefix(&self.root)
            .map(|relative| relative.components().count() <= self.depth)
            .unwrap_or(false)
    }

    #[cfg(test)]
    pub(crate) fn known_directory_count(&self) -> usize {
        self.known_dirs.len()
    }

    /// Normalize one raw event. A single raw event may yield zero, one or
    /// (for a two-path rename) two change events.
    pub fn normalize(&mut self, event: &Event) -> Vec<ChangeEvent> {
        let mut changes = Vec::new();

        match event.kind {
            EventKind::Create(kind) => {
                for path in &event.paths {
                    let is_dir = match kind {
                        CreateKind::Folder => true,
                        CreateKind::File => false,
                        CreateKind::Any | CreateKind::Other => path.is_dir(),
                    };
                    self.push_added(path, is_dir, &mut changes);
                }
            }
            EventKind::Remove(kind) => {
                for path in &event.paths {
                    let is_dir = match kind {
                        RemoveKind::Folder => true,
                        RemoveKind::File => false,
                        RemoveKind::Any | RemoveKind::Other => self.known_dirs.contains(path),
                    };
                    self.push_removed(path, is_dir, &mut changes);
                }
            }
            EventKind::Modify(ModifyKind::Name(mode)) => match mode {
                RenameMode::From => {
                    for path in &event.paths {
                        let is_dir = self.known_dirs.contains(path);
                        self.push_removed(path, is_dir, &mut changes);
                    }
                }
                RenameMode::To => {
                    for path in &event.paths {
                        self.push_added(path, path.is_dir(), &mut changes);
                    }
                }
                RenameMode::Both => {
                    if let [from, to] = event.paths.as_slice() {
                        let was_dir = self.known_dirs.contains(from);
                        self.push_removed(from, was_dir, &mut changes);
                        self.push_added(to, to.is_dir() || was_dir, &mut changes);
                    }
                }
                RenameMode::Any | RenameMode::Other => {
                    for path in &event.paths {
                        if path.exists() {
                            self.push_added(path, path.is_dir(), &mut changes);
                        } else {
                            let is_dir = self.known_dirs.contains(path);
                            self.push_removed(path, is_dir, &mut changes);
                        }
                    }
                }
            },
            EventKind::Modify(_) => {
                for path in &event.paths {
                    // Directory metadata changes are noise
                    if self.known_dirs.contains(path) || path.is_dir() {
                        continue;
                    }
                    if !is_document(path) {
                        continue;
                    }
                    if let Some(relative) = self.relative(path) {
                        changes.push(ChangeEvent::new(ChangeKind::Modified, relative, false));
                    }
                }
            }
            EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
        }

        changes
    }

    fn push_added(&mut self, path: &Path, is_dir: bool, changes: &mut Vec<ChangeEvent>) {
        if !is_dir && !is_document(path) {
            return;
        }
        let Some(relative) = self.relative(path) else {
            return;
        };
        if is_dir {
            self.known_dirs.insert(path.to_path_buf());
        }
        changes.push(ChangeEvent::new(ChangeKind::Added, relative, is_dir));
    }

    fn push_removed(&mut self, path: &Path, is_dir: bool, changes: &mut Vec<ChangeEvent>) {
        if !is_dir && !is_document(path) {
            return;
        }
        let Some(relative) = self.relative(path) else {
            return;
        };
        if is_dir {
            self.known_dirs.retain(|known| !known.starts_with(path));
        }
        changes.push(ChangeEvent::new(ChangeKind::Removed, relative, is_dir));
    }

    /// The reportable relative form of `path`, or `None` if it must be
    /// ignored.
    fn relative(&self, path: &Path) -> Option<String> {
        let Some(relative) = relative_path(&self.root, path) else {
            warn!("Dropping event for unrepresentable path {}", path.display());
            return None;
        };
        if relative.is_empty() {
            return None;
        }

        let components: Vec<&str> = relative.split('/').collect();
        if components.iter().any(|c| is_hidden_name(Some(c))) {
            return None;
        }
        if components.len() > self.depth + 1 {
            debug!("Ignoring {} beyond watch depth {}", relative, self.depth);
            return None;
        }
        Some(relative)
    }
}

fn is_hidden_name(name: Option<&str>) -> bool {
    name.is_some_and(|n| n.starts_with('.'))
}

// ─────────────────────────────────────────────────────────────────────────────
// Relay Sink
// ─────────────────────────────────────────────────────────────────────────────

/// Receives raw events for one session and publishes normalized messages.
#[derive(Debug)]
pub struct RelaySink {
    normalizer: EventNormalizer,
    sender: broadcast::Sender<WatchMessage>,
    /// New directories that need a watch of their own
    directories: Option<mpsc::Sender<PathBuf>>,
    closed: bool,
}

impl RelaySink {
    pub fn new(normalizer: EventNormalizer, sender: broadcast::Sender<WatchMessage>) -> Self {
        Self {
            normalizer,
            sender,
            directories: None,
            closed: false,
        }
    }

    fn set_directory_feed(&mut self, feed: mpsc::Sender<PathBuf>) {
        self.directories = Some(feed);
    }

    /// Handle one raw watcher result. No-op once closed.
    pub fn handle(&mut self, result: notify::Result<Event>) {
        if self.closed {
            return;
        }
        match result {
            Ok(event) => {
                for change in self.normalizer.normalize(&event) {
                    if change.is_directory && change.kind == ChangeKind::Added {
                        self.request_watch(&change.path);
                    }
                    self.publish(change.into());
                }
            }
            Err(e) => {
                warn!("File watcher error: {}", e);
                self.publish(WatchMessage::error(e.to_string()));
            }
        }
    }

    fn request_watch(&self, relative: &str) {
        let Some(feed) = &self.directories else {
            return;
        };
        let dir = self.normalizer.root.join(relative);
        if self.normalizer.watch_target_depth(&dir) && feed.send(dir).is_err() {
            debug!("Directory watcher has stopped, not watching {}", relative);
        }
    }

    fn publish(&self, message: WatchMessage) {
        match self.sender.send(message) {
            Ok(count) => debug!("Relayed event to {} streams", count),
            Err(broadcast::error::SendError(message)) => {
                // No stream attached; the event is lost
                debug!("No stream attached, dropped {:?}", message);
            }
        }
    }

    /// Stop relaying. Dropping the directory feed ends the helper thread.
    pub fn close(&mut self) {
        self.closed = true;
        self.directories = None;
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Watcher
// ─────────────────────────────────────────────────────────────────────────────

/// A live watch over a note tree feeding a relay sink. Dropping it stops
/// the watch.
pub struct NoteWatcher {
    _watcher: Arc<Mutex<RecommendedWatcher>>,
    root: PathBuf,
}

impl std::fmt::Debug for NoteWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteWatcher").field("root", &self.root).finish()
    }
}

impl NoteWatcher {
    /// Start watching `root` and the directories the sink's normalizer has
    /// indexed, delivering raw events to `sink`.
    pub fn start(root: &Path, sink: Arc<Mutex<RelaySink>>) -> Result<Self> {
        let watch_error = |e: notify::Error| Error::Watch {
            path: root.to_path_buf(),
            message: e.to_string(),
        };

        let callback_sink = Arc::clone(&sink);
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| {
                callback_sink
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .handle(result);
            },
            Config::default(),
        )
        .map_err(watch_error)?;

        watcher
            .watch(root, RecursiveMode::NonRecursive)
            .map_err(watch_error)?;

        let targets = sink
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .normalizer
            .watch_targets();
        for dir in targets.iter().filter(|dir| dir.as_path() != root) {
            // The directory may have vanished since it was indexed
            if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
                debug!("Could not watch {}: {}", dir.display(), e);
            }
        }
        debug!("Watching {} directories under {}", targets.len(), root.display());

        let watcher = Arc::new(Mutex::new(watcher));
        let (feed, directories) = mpsc::channel();
        sink.lock()
            .unwrap_or_else(|e| e.into_inner())
            .set_directory_feed(feed);

        let weak_watcher = Arc::downgrade(&watcher);
        let weak_sink = Arc::downgrade(&sink);
        thread::Builder::new()
            .name("marknotes-watch-dirs".to_string())
            .spawn(move || watch_new_directories(weak_watcher, weak_sink, directories))
            .map_err(|e| Error::Watch {
                path: root.to_path_buf(),
                message: e.to_string(),
            })?;

        Ok(Self {
            _watcher: watcher,
            root: root.to_path_buf(),
        })
    }
}

/// Register a watch on each directory the sink reports, then replay the
/// entries it already holds, which appeared before the watch existed.
///
/// Runs until the sink drops its feed or the watcher is gone. Watches cannot
/// be added from the notify callback itself, which runs on the thread that
/// services them.
fn watch_new_directories(
    watcher: Weak<Mutex<RecommendedWatcher>>,
    sink: Weak<Mutex<RelaySink>>,
    directories: mpsc::Receiver<PathBuf>,
) {
    for dir in directories {
        let Some(watcher) = watcher.upgrade() else {
            break;
        };
        let registered = watcher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .watch(&dir, RecursiveMode::NonRecursive);
        drop(watcher);

        if let Err(e) = registered {
            debug!("Could not watch {}: {}", dir.display(), e);
            continue;
        }

        let entries: Vec<(PathBuf, CreateKind)> = match std::fs::read_dir(&dir) {
            Ok(read_dir) => read_dir
                .flatten()
                .filter_map(|entry| {
                    let file_type = entry.file_type().ok()?;
                    let kind = if file_type.is_dir() {
                        CreateKind::Folder
                    } else if file_type.is_file() {
                        CreateKind::File
                    } else {
                        return None;
                    };
                    Some((entry.path(), kind))
                })
                .collect(),
            Err(e) => {
                debug!("Could not list {}: {}", dir.display(), e);
                continue;
            }
        };

        let Some(sink) = sink.upgrade() else {
            break;
        };
        let mut sink = sink.lock().unwrap_or_else(|e| e.into_inner());
        for (path, kind) in entries {
            sink.handle(Ok(Event::new(EventKind::Create(kind)).add_path(path)));
        }
    }
    debug!("Directory watch thread finished");
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, MetadataKind};
    use tempfile::TempDir;

    fn event(kind: EventKind, paths: &[PathBuf]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(path.clone()))
    }

    fn modify_data() -> EventKind {
        EventKind::Modify(ModifyKind::Data(DataChange::Content))
    }

    #[test]
    fn test_modified_document() {
        let root = PathBuf::from("/notes-root");
        let mut normalizer = EventNormalizer::new(root.clone(), 10);

        let changes = normalizer.normalize(&event(modify_data(), &[root.join("notes/x.md")]));
        assert_eq!(
            changes,
            vec![ChangeEvent::new(ChangeKind::Modified, "notes/x.md", false)]
        );
    }

    #[test]
    fn test_non_document_ignored() {
        let root = PathBuf::from("/notes-root");
        let mut normalizer = EventNormalizer::new(root.clone(), 10);

        assert!(normalizer
            .normalize(&event(modify_data(), &[root.join("notes/x.txt")]))
            .is_empty());
        assert!(normalizer
            .normalize(&event(
                EventKind::Create(CreateKind::File),
                &[root.join("image.png")]
            ))
            .is_empty());
    }

    #[test]
    fn test_hidden_components_ignored() {
        let root = PathBuf::from("/notes-root");
        let mut normalizer = EventNormalizer::new(root.clone(), 10);

        for path in [".git/x.md", ".hidden.md", "a/.trash/b.md"] {
            assert!(
                normalizer
                    .normalize(&event(modify_data(), &[root.join(path)]))
                    .is_empty(),
                "{} should be ignored",
                path
            );
        }
    }

    #[test]
    fn test_depth_limit() {
        let root = PathBuf::from("/notes-root");
        let mut normalizer = EventNormalizer::new(root.clone(), 1);

        assert_eq!(
            normalizer
                .normalize(&event(modify_data(), &[root.join("a/x.md")]))
                .len(),
            1
        );
        assert!(normalizer
            .normalize(&event(modify_data(), &[root.join("a/b/x.md")]))
            .is_empty());
    }

    #[test]
    fn test_outside_root_dropped() {
        let mut normalizer = EventNormalizer::new(PathBuf::from("/notes-root"), 10);
        assert!(normalizer
            .normalize(&event(modify_data(), &[PathBuf::from("/elsewhere/x.md")]))
            .is_empty());
    }

    #[test]
    fn test_directory_create_and_remove() {
        let root = PathBuf::from("/notes-root");
        let mut normalizer = EventNormalizer::new(root.clone(), 10);
        let dir = root.join("journal");

        let added = normalizer.normalize(&event(EventKind::Create(CreateKind::Folder), &[dir.clone()]));
        assert_eq!(
            added,
            vec![ChangeEvent::new(ChangeKind::Added, "journal", true)]
        );

        // The platform may not say what was removed; the index remembers
        let removed = normalizer.normalize(&event(EventKind::Remove(RemoveKind::Any), &[dir]));
        assert_eq!(
            removed,
            vec![ChangeEvent::new(ChangeKind::Removed, "journal", true)]
        );
        assert_eq!(normalizer.known_directory_count(), 0);
    }

    #[test]
    fn test_directory_metadata_change_dropped() {
        let root = PathBuf::from("/notes-root");
        let mut normalizer = EventNormalizer::new(root.clone(), 10);
        let dir = root.join("journal");
        normalizer.normalize(&event(EventKind::Create(CreateKind::Folder), &[dir.clone()]));

        let changes = normalizer.normalize(&event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)),
            &[dir],
        ));
        assert!(changes.is_empty());
    }

    #[test]
    fn test_rename_becomes_remove_then_add() {
        let root = PathBuf::from("/notes-root");
        let mut normalizer = EventNormalizer::new(root.clone(), 10);

        let changes = normalizer.normalize(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &[root.join("old.md"), root.join("new.md")],
        ));
        assert_eq!(
            changes,
            vec![
                ChangeEvent::new(ChangeKind::Removed, "old.md", false),
                ChangeEvent::new(ChangeKind::Added, "new.md", false),
            ]
        );

        let from = normalizer.normalize(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &[root.join("a.md")],
        ));
        assert_eq!(from, vec![ChangeEvent::new(ChangeKind::Removed, "a.md", false)]);
    }

    #[test]
    fn test_seed_indexes_existing_directories() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("a").join("b")).unwrap();
        std::fs::create_dir_all(temp.path().join(".git").join("objects")).unwrap();

        let mut normalizer = EventNormalizer::new(temp.path().to_path_buf(), 10);
        normalizer.seed();
        assert_eq!(normalizer.known_directory_count(), 2);

        let removed = normalizer.normalize(&event(
            EventKind::Remove(RemoveKind::Any),
            &[temp.path().join("a").join("b")],
        ));
        assert_eq!(
            removed,
            vec![ChangeEvent::new(ChangeKind::Removed, "a/b", true)]
        );
    }

    #[test]
    fn test_watch_targets_skip_hidden_and_deep_directories() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("a").join("b").join("c")).unwrap();
        std::fs::create_dir_all(temp.path().join(".git").join("objects")).unwrap();

        let mut normalizer = EventNormalizer::new(temp.path().to_path_buf(), 1);
        normalizer.seed();

        let mut targets = normalizer.watch_targets();
        targets.sort();
        assert_eq!(targets, vec![temp.path().to_path_buf(), temp.path().join("a")]);
    }

    #[test]
    fn test_sink_requests_watch_for_new_directories() {
        let (sender, _receiver) = broadcast::channel(16);
        let root = PathBuf::from("/notes-root");
        let mut sink = RelaySink::new(EventNormalizer::new(root.clone(), 1), sender);
        let (feed, directories) = mpsc::channel();
        sink.set_directory_feed(feed);

        let folder = |path: &str| event(EventKind::Create(CreateKind::Folder), &[root.join(path)]);
        sink.handle(Ok(folder("journal")));
        sink.handle(Ok(folder(".trash")));
        sink.handle(Ok(folder("journal/2024")));

        // Only the shallow, visible directory gets a watch of its own
        assert_eq!(directories.try_recv().unwrap(), root.join("journal"));
        assert!(directories.try_recv().is_err());

        sink.close();
        assert!(matches!(
            directories.try_recv(),
            Err(mpsc::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_sink_forwards_errors_and_stops_when_closed() {
        let (sender, mut receiver) = broadcast::channel(16);
        let root = PathBuf::from("/notes-root");
        let mut sink = RelaySink::new(EventNormalizer::new(root.clone(), 10), sender);

        sink.handle(Err(notify::Error::generic("boom")));
        assert_eq!(receiver.try_recv().unwrap(), WatchMessage::error("boom"));

        sink.close();
        sink.handle(Ok(event(modify_data(), &[root.join("x.md")])));
        assert!(receiver.try_recv().is_err());
        assert!(sink.is_closed());
    }
}
