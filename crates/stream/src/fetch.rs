use orbfield_common::ModulePath;
use orbfield_kernel::{Continuation, TaskError, TaskScheduler};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Where module sources come from.
///
/// The returned continuation delivers the source text, or an error if the
/// module cannot be fetched. It must deliver exactly once.
pub trait ModuleFetcher {
    fn fetch(&self, path: &ModulePath) -> Continuation<String>;
}

/// Reads modules from a directory. Reads happen on the scheduler's next
/// tick, as a network response would.
#[derive(Clone)]
pub struct DirectoryFetcher {
    root: PathBuf,
    scheduler: TaskScheduler,
}

impl DirectoryFetcher {
    pub fn new(root: impl Into<PathBuf>, scheduler: TaskScheduler) -> Self {
        Self {
            root: root.into(),
            scheduler,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ModuleFetcher for DirectoryFetcher {
    fn fetch(&self, path: &ModulePath) -> Continuation<String> {
        let file = self.root.join(path.as_str());
        let target = path.clone();
        let scheduler = self.scheduler.clone();
        Continuation::new(move |done| {
            scheduler.defer(move || match std::fs::read_to_string(&file) {
                Ok(source) => done.succeed(source),
                Err(err) => done.fail(TaskError::fetch(&target, err)),
            })
        })
    }
}

/// In-memory module sources, with a log of every fetch.
///
/// Unknown paths fail the way a missing script does.
#[derive(Clone)]
pub struct MemoryFetcher {
    sources: Rc<RefCell<HashMap<ModulePath, String>>>,
    requests: Rc<RefCell<Vec<ModulePath>>>,
    scheduler: TaskScheduler,
}

impl MemoryFetcher {
    pub fn new(scheduler: TaskScheduler) -> Self {
        Self {
            sources: Rc::default(),
            requests: Rc::default(),
            scheduler,
        }
    }

    pub fn with_module(self, path: &str, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }

    pub fn insert(&self, path: &str, source: impl Into<String>) {
        self.sources
            .borrow_mut()
            .insert(ModulePath::normalize(path), source.into());
    }

    /// Every path fetched so far, in order.
    pub fn requests(&self) -> Vec<ModulePath> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self, path: &str) -> usize {
        let path = ModulePath::normalize(path);
        self.requests.borrow().iter().filter(|p| **p == path).count()
    }
}

impl ModuleFetcher for MemoryFetcher {
    fn fetch(&self, path: &ModulePath) -> Continuation<String> {
        self.requests.borrow_mut().push(path.clone());
        let found = self.sources.borrow().get(path).cloned();
        let target = path.clone();
        let scheduler = self.scheduler.clone();
        Continuation::new(move |done| {
            scheduler.defer(move || match found {
                Some(source) => done.succeed(source),
                None => done.fail(TaskError::fetch(&target, "not found")),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbfield_kernel::{Delivery, Outcome};

    fn collect(c: Continuation<String>, scheduler: &TaskScheduler) -> Option<Outcome<String>> {
        let got = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&got);
        c.resolve(Delivery::new(move |o| *sink.borrow_mut() = Some(o)));
        scheduler.run_until_idle();
        got.take()
    }

    #[test]
    fn memory_fetcher_serves_and_logs() {
        let scheduler = TaskScheduler::new();
        let fetcher = MemoryFetcher::new(scheduler.clone()).with_module("a.js", "1");
        let c = fetcher.fetch(&ModulePath::normalize("a.js"));
        assert_eq!(collect(c, &scheduler), Some(Ok("1".to_string())));
        assert_eq!(fetcher.request_count("a.js"), 1);
    }

    #[test]
    fn memory_fetcher_missing_module_fails() {
        let scheduler = TaskScheduler::new();
        let fetcher = MemoryFetcher::new(scheduler.clone());
        let c = fetcher.fetch(&ModulePath::normalize("gone.js"));
        assert_eq!(
            collect(c, &scheduler),
            Some(Err(TaskError::fetch("gone.js", "not found")))
        );
    }

    #[test]
    fn directory_fetcher_reads_on_tick() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("utils")).unwrap();
        std::fs::write(dir.path().join("utils/math.js"), "module.exports = 1;").unwrap();

        let scheduler = TaskScheduler::new();
        let fetcher = DirectoryFetcher::new(dir.path(), scheduler.clone());
        let c = fetcher.fetch(&ModulePath::normalize("utils/math.js"));
        assert_eq!(
            collect(c, &scheduler),
            Some(Ok("module.exports = 1;".to_string()))
        );
    }

    #[test]
    fn directory_fetcher_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = TaskScheduler::new();
        let fetcher = DirectoryFetcher::new(dir.path(), scheduler.clone());
        let outcome = collect(fetcher.fetch(&ModulePath::normalize("nope.js")), &scheduler);
        assert!(matches!(outcome, Some(Err(TaskError::Fetch { .. }))));
    }
}
