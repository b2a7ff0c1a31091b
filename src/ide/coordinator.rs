//! Background indexing on a dedicated worker thread.
//!
//! The worker owns the [`AnalysisHost`] and is the only writer. Callers
//! send requests over a channel and read the published index, which is
//! swapped whole on every successful build.

use std::any::Any;
use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use super::analysis::{Analysis, AnalysisHost, BuildError, FileEvent};
use crate::hir::DeclarationInfo;
use crate::project::IndexConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexState {
    /// No build running and nothing usable committed by the last one.
    Idle,
    Rebuilding { seq: u64 },
    Ready,
}

/// Completion notices, one per request sequence number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexEvent {
    /// The request ran. On failure the previous index stays published.
    Built { seq: u64, success: bool, symbols: usize },
    /// The request was superseded by a later full build.
    Discarded { seq: u64 },
    /// The change batch was folded into the later batch `into`.
    Merged { seq: u64, into: u64 },
}

enum Request {
    BuildIndex { seq: u64, paths: Vec<PathBuf> },
    FilesChanged { seq: u64, events: Vec<FileEvent> },
    CancelSuperseded { before: u64 },
    Shutdown,
}

impl Request {
    fn seq(&self) -> Option<u64> {
        match self {
            Request::BuildIndex { seq, .. } | Request::FilesChanged { seq, .. } => Some(*seq),
            Request::CancelSuperseded { .. } | Request::Shutdown => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Job {
    Build { seq: u64, paths: Vec<PathBuf> },
    Changes { seq: u64, events: Vec<FileEvent> },
}

impl Job {
    fn seq(&self) -> u64 {
        match self {
            Job::Build { seq, .. } | Job::Changes { seq, .. } => *seq,
        }
    }
}

struct Shared {
    next_seq: AtomicU64,
    /// Sequence number of the most recent full build request.
    latest_build: AtomicU64,
    state: Mutex<IndexState>,
    /// Index and line tables, swapped together.
    published: RwLock<Analysis>,
    in_flight: Mutex<Option<(u64, CancellationToken)>>,
}

impl Shared {
    fn new(published: Analysis) -> Self {
        let state = if published.index_ready() {
            IndexState::Ready
        } else {
            IndexState::Idle
        };
        Self {
            next_seq: AtomicU64::new(0),
            latest_build: AtomicU64::new(0),
            state: Mutex::new(state),
            published: RwLock::new(published),
            in_flight: Mutex::new(None),
        }
    }

    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// A full build commits only while it is the latest; a delta commits
    /// only if no full build was requested after it.
    fn is_current(&self, job: &Job) -> bool {
        let latest = self.latest_build.load(Ordering::SeqCst);
        match job {
            Job::Build { seq, .. } => *seq == latest,
            Job::Changes { seq, .. } => *seq > latest,
        }
    }

    fn set_state(&self, state: IndexState) {
        *self.state.lock() = state;
    }

    fn settled_state(&self) -> IndexState {
        if self.published.read().index_ready() {
            IndexState::Ready
        } else {
            IndexState::Idle
        }
    }

    fn cancel_in_flight(&self, before: u64) {
        if let Some((seq, token)) = &*self.in_flight.lock() {
            if *seq < before {
                tracing::debug!(seq, "cancelling superseded build");
                token.cancel();
            }
        }
    }
}

/// Handle to the background indexer.
pub struct IndexCoordinator {
    requests: Sender<Request>,
    events: Receiver<IndexEvent>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl IndexCoordinator {
    pub fn new(config: IndexConfig) -> io::Result<Self> {
        Self::spawn(AnalysisHost::new(config))
    }

    /// Move `host` onto a new worker thread.
    pub fn spawn(host: AnalysisHost) -> io::Result<Self> {
        let (requests, request_rx) = crossbeam_channel::unbounded();
        let (event_tx, events) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared::new(host.analysis()));

        let worker = Worker::new(host, request_rx, event_tx, Arc::clone(&shared));
        let handle = thread::Builder::new()
            .name("tsresolve-index".into())
            .spawn(move || worker.run())?;

        Ok(Self {
            requests,
            events,
            shared,
            worker: Some(handle),
        })
    }

    /// Index exactly `paths`, superseding every earlier request.
    pub fn build_index(&self, paths: Vec<PathBuf>) -> u64 {
        let seq = self.shared.next_seq();
        self.shared.latest_build.fetch_max(seq, Ordering::SeqCst);
        self.shared.cancel_in_flight(seq);
        self.send(Request::CancelSuperseded { before: seq });
        self.send(Request::BuildIndex { seq, paths });
        seq
    }

    pub fn files_changed(&self, events: Vec<FileEvent>) -> u64 {
        let seq = self.shared.next_seq();
        self.send(Request::FilesChanged { seq, events });
        seq
    }

    pub fn state(&self) -> IndexState {
        *self.shared.state.lock()
    }

    pub fn index_ready(&self) -> bool {
        self.shared.published.read().index_ready()
    }

    pub fn analysis(&self) -> Analysis {
        self.shared.published.read().clone()
    }

    /// Modules that can supply `name`; empty when unknown or not ready.
    pub fn query(&self, name: &str) -> Vec<DeclarationInfo> {
        self.analysis().query(name).to_vec()
    }

    pub fn events(&self) -> &Receiver<IndexEvent> {
        &self.events
    }

    /// Cancel the running request, drop queued ones and stop the worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn send(&self, request: Request) {
        if self.requests.send(request).is_err() {
            tracing::warn!("index worker is not running");
        }
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.shared.cancel_in_flight(u64::MAX);
        self.send(Request::Shutdown);
        if worker.join().is_err() {
            tracing::error!("index worker panicked");
        }
    }
}

impl Drop for IndexCoordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    host: AnalysisHost,
    requests: Receiver<Request>,
    events: Sender<IndexEvent>,
    shared: Arc<Shared>,
    queue: VecDeque<Request>,
}

impl Worker {
    fn new(
        host: AnalysisHost,
        requests: Receiver<Request>,
        events: Sender<IndexEvent>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            host,
            requests,
            events,
            shared,
            queue: VecDeque::new(),
        }
    }

    fn run(mut self) {
        while let Some(job) = self.next_job() {
            self.execute(job);
        }
        tracing::debug!("index worker stopped");
    }

    /// Block until there is work. Returns `None` on shutdown.
    fn next_job(&mut self) -> Option<Job> {
        loop {
            if self.queue.is_empty() {
                let request = self.requests.recv().ok()?;
                self.queue.push_back(request);
            }
            self.queue.extend(self.requests.try_iter());
            if self.queue.iter().any(|request| matches!(request, Request::Shutdown)) {
                return None;
            }
            self.drop_superseded();

            let Some(request) = self.queue.pop_front() else {
                continue;
            };
            match request {
                Request::Shutdown => return None,
                Request::BuildIndex { seq, paths } => return Some(Job::Build { seq, paths }),
                Request::FilesChanged { seq, events } => return Some(self.coalesce(seq, events)),
                Request::CancelSuperseded { .. } => {}
            }
        }
    }

    /// Drop queued requests older than the newest `CancelSuperseded`.
    fn drop_superseded(&mut self) {
        let before = self
            .queue
            .iter()
            .filter_map(|request| match request {
                Request::CancelSuperseded { before } => Some(*before),
                _ => None,
            })
            .max();
        let Some(before) = before else {
            return;
        };

        for request in std::mem::take(&mut self.queue) {
            let marker = matches!(request, Request::CancelSuperseded { .. });
            match request.seq() {
                _ if marker => {}
                Some(seq) if seq < before => {
                    tracing::debug!(seq, before, "dropping superseded request");
                    self.emit(IndexEvent::Discarded { seq });
                }
                _ => self.queue.push_back(request),
            }
        }
    }

    /// Fold consecutive queued change batches into one job.
    fn coalesce(&mut self, mut seq: u64, mut events: Vec<FileEvent>) -> Job {
        while let Some(Request::FilesChanged { .. }) = self.queue.front() {
            let Some(Request::FilesChanged {
                seq: next,
                events: more,
            }) = self.queue.pop_front()
            else {
                break;
            };
            tracing::debug!(seq, into = next, "coalescing change batches");
            self.emit(IndexEvent::Merged { seq, into: next });
            seq = next;
            events.extend(more);
        }
        Job::Changes { seq, events }
    }

    fn execute(&mut self, job: Job) {
        let seq = job.seq();
        let cancel = CancellationToken::new();
        *self.shared.in_flight.lock() = Some((seq, cancel.clone()));
        self.shared.set_state(IndexState::Rebuilding { seq });

        let host = &self.host;
        let result = panic::catch_unwind(AssertUnwindSafe(|| match &job {
            Job::Build { paths, .. } => host.prepare_build(paths, &cancel),
            Job::Changes { events, .. } => host.prepare_changes(events, &cancel),
        }))
        .unwrap_or_else(|payload| Err(BuildError::Panicked(panic_message(payload.as_ref()))));
        *self.shared.in_flight.lock() = None;

        match result {
            Ok(prepared) if self.shared.is_current(&job) => {
                let outcome = self.host.commit(prepared);
                *self.shared.published.write() = self.host.analysis();
                self.shared.set_state(IndexState::Ready);
                self.emit(IndexEvent::Built {
                    seq,
                    success: true,
                    symbols: outcome.symbols,
                });
            }
            Ok(_) | Err(BuildError::Cancelled) => {
                tracing::debug!(seq, "discarding superseded build");
                self.shared.set_state(self.shared.settled_state());
                self.emit(IndexEvent::Discarded { seq });
            }
            Err(err) if !self.shared.is_current(&job) => {
                tracing::debug!(seq, error = %err, "discarding superseded failed build");
                self.shared.set_state(self.shared.settled_state());
                self.emit(IndexEvent::Discarded { seq });
            }
            Err(err) => {
                tracing::error!(seq, error = %err, "index build failed");
                self.shared.set_state(IndexState::Idle);
                self.emit(IndexEvent::Built {
                    seq,
                    success: false,
                    symbols: 0,
                });
            }
        }
    }

    fn emit(&self, event: IndexEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{MemorySource, SourceProvider};
    use std::path::Path;
    use std::time::Duration;

    const ROOT: &str = "/project";

    /// Serves files from memory, but panics when asked for `boom.ts`.
    struct Tripwire(MemorySource);

    impl SourceProvider for Tripwire {
        fn read(&self, path: &Path) -> io::Result<Arc<str>> {
            if path.ends_with("boom.ts") {
                panic!("tripwire");
            }
            self.0.read(path)
        }
    }

    fn coordinator(files: &[(&str, &str)]) -> IndexCoordinator {
        let source = MemorySource::new();
        for (path, text) in files {
            source.insert(*path, *text);
        }
        let host = AnalysisHost::with_provider(IndexConfig::new(ROOT), Arc::new(Tripwire(source)));
        IndexCoordinator::spawn(host).unwrap()
    }

    fn wait_for(coordinator: &IndexCoordinator, seq: u64) -> IndexEvent {
        loop {
            let event = coordinator
                .events()
                .recv_timeout(Duration::from_secs(10))
                .unwrap();
            let event_seq = match event {
                IndexEvent::Built { seq, .. }
                | IndexEvent::Discarded { seq }
                | IndexEvent::Merged { seq, .. } => seq,
            };
            if event_seq == seq {
                return event;
            }
        }
    }

    fn paths(paths: &[&str]) -> Vec<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    fn detached_worker() -> (Worker, Sender<Request>, Receiver<IndexEvent>) {
        let (requests, request_rx) = crossbeam_channel::unbounded();
        let (event_tx, events) = crossbeam_channel::unbounded();
        let host = AnalysisHost::with_provider(IndexConfig::new(ROOT), Arc::new(MemorySource::new()));
        let shared = Arc::new(Shared::new(Analysis::default()));
        let worker = Worker::new(host, request_rx, event_tx, shared);
        (worker, requests, events)
    }

    #[test]
    fn test_build_publishes_index() {
        let coordinator = coordinator(&[
            ("/project/src/a.ts", "export class Foo {}"),
            ("/project/src/b.ts", "export * from './a';"),
        ]);
        assert!(!coordinator.index_ready());
        assert!(coordinator.query("Foo").is_empty());

        let seq = coordinator.build_index(paths(&["/project/src/a.ts", "/project/src/b.ts"]));
        let event = wait_for(&coordinator, seq);

        assert!(matches!(event, IndexEvent::Built { success: true, .. }));
        assert!(coordinator.index_ready());
        assert_eq!(coordinator.state(), IndexState::Ready);
        let froms: Vec<_> = coordinator.query("Foo").into_iter().map(|i| i.from).collect();
        assert_eq!(froms, vec!["/src/b"]);
    }

    #[test]
    fn test_failed_build_keeps_previous_index() {
        let coordinator = coordinator(&[("/project/src/a.ts", "export class Foo {}")]);
        let seq = coordinator.build_index(paths(&["/project/src/a.ts"]));
        wait_for(&coordinator, seq);

        let seq = coordinator.build_index(paths(&["/project/src/missing.ts"]));
        let event = wait_for(&coordinator, seq);

        assert!(matches!(event, IndexEvent::Built { success: false, .. }));
        assert_eq!(coordinator.state(), IndexState::Idle);
        assert!(coordinator.index_ready());
        assert_eq!(coordinator.query("Foo").len(), 1);
    }

    #[test]
    fn test_panic_is_contained() {
        let coordinator = coordinator(&[("/project/src/a.ts", "export class Foo {}")]);
        let seq = coordinator.build_index(paths(&["/project/src/a.ts"]));
        wait_for(&coordinator, seq);

        let seq = coordinator.build_index(paths(&["/project/src/boom.ts"]));
        let event = wait_for(&coordinator, seq);
        assert!(matches!(event, IndexEvent::Built { success: false, .. }));
        assert_eq!(coordinator.query("Foo").len(), 1);

        // The worker survives and keeps serving requests.
        let seq = coordinator.build_index(paths(&["/project/src/a.ts"]));
        assert!(matches!(
            wait_for(&coordinator, seq),
            IndexEvent::Built { success: true, .. }
        ));
    }

    #[test]
    fn test_latest_build_wins() {
        let coordinator = coordinator(&[
            ("/project/src/a.ts", "export class First {}"),
            ("/project/src/b.ts", "export class Second {}"),
        ]);
        let first = coordinator.build_index(paths(&["/project/src/a.ts"]));
        let second = coordinator.build_index(paths(&["/project/src/b.ts"]));
        assert!(second > first);

        let event = wait_for(&coordinator, second);
        assert!(matches!(event, IndexEvent::Built { success: true, .. }));
        assert!(coordinator.query("First").is_empty());
        assert_eq!(coordinator.query("Second").len(), 1);
    }

    #[test]
    fn test_files_changed_applies_delta() {
        let source = Arc::new(MemorySource::new());
        source.insert("/project/src/a.ts", "export class Foo {}");
        source.insert("/project/src/b.ts", "export * from './a';");
        let host = AnalysisHost::with_provider(IndexConfig::new(ROOT), source.clone());
        let coordinator = IndexCoordinator::spawn(host).unwrap();

        let seq = coordinator.build_index(source.paths());
        wait_for(&coordinator, seq);

        source.remove(Path::new("/project/src/a.ts"));
        let seq = coordinator.files_changed(vec![FileEvent::deleted("/project/src/a.ts")]);
        let event = wait_for(&coordinator, seq);

        assert!(matches!(event, IndexEvent::Built { success: true, .. }));
        assert!(coordinator.query("Foo").is_empty());
        coordinator.shutdown();
    }

    #[test]
    fn test_change_batches_coalesce() {
        let (mut worker, requests, events) = detached_worker();
        requests
            .send(Request::FilesChanged {
                seq: 1,
                events: vec![FileEvent::changed("/project/a.ts")],
            })
            .unwrap();
        requests
            .send(Request::FilesChanged {
                seq: 2,
                events: vec![FileEvent::changed("/project/b.ts")],
            })
            .unwrap();

        let job = worker.next_job().unwrap();
        assert_eq!(
            job,
            Job::Changes {
                seq: 2,
                events: vec![
                    FileEvent::changed("/project/a.ts"),
                    FileEvent::changed("/project/b.ts"),
                ],
            }
        );
        assert_eq!(events.try_recv().unwrap(), IndexEvent::Merged { seq: 1, into: 2 });
    }

    #[test]
    fn test_cancel_superseded_drops_older_requests() {
        let (mut worker, requests, events) = detached_worker();
        requests
            .send(Request::FilesChanged {
                seq: 1,
                events: vec![],
            })
            .unwrap();
        requests
            .send(Request::BuildIndex {
                seq: 2,
                paths: vec![],
            })
            .unwrap();
        requests.send(Request::CancelSuperseded { before: 3 }).unwrap();
        requests
            .send(Request::BuildIndex {
                seq: 3,
                paths: vec![],
            })
            .unwrap();

        assert_eq!(
            worker.next_job(),
            Some(Job::Build {
                seq: 3,
                paths: vec![],
            })
        );
        let dropped: Vec<_> = events.try_iter().collect();
        assert_eq!(
            dropped,
            vec![IndexEvent::Discarded { seq: 1 }, IndexEvent::Discarded { seq: 2 }]
        );

        drop(requests);
        assert_eq!(worker.next_job(), None);
    }

    #[test]
    fn test_superseded_failure_is_discarded() {
        let (mut worker, _requests, events) = detached_worker();
        worker.shared.latest_build.store(2, Ordering::SeqCst);

        worker.execute(Job::Build {
            seq: 1,
            paths: paths(&["/project/missing.ts"]),
        });
        assert_eq!(events.try_recv().unwrap(), IndexEvent::Discarded { seq: 1 });
        assert_eq!(*worker.shared.state.lock(), IndexState::Idle);

        worker.execute(Job::Build {
            seq: 2,
            paths: paths(&["/project/missing.ts"]),
        });
        assert_eq!(
            events.try_recv().unwrap(),
            IndexEvent::Built {
                seq: 2,
                success: false,
                symbols: 0
            }
        );
    }

    #[test]
    fn test_commit_rules() {
        let shared = Shared::new(Analysis::default());
        shared.latest_build.store(5, Ordering::SeqCst);

        assert!(shared.is_current(&Job::Build { seq: 5, paths: vec![] }));
        assert!(!shared.is_current(&Job::Build { seq: 4, paths: vec![] }));
        assert!(shared.is_current(&Job::Changes { seq: 6, events: vec![] }));
        assert!(!shared.is_current(&Job::Changes { seq: 3, events: vec![] }));
    }
}
