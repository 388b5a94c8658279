use orbfield_common::{ModulePath, scan_imports};
use orbfield_kernel::{
    Body, Continuation, Coroutine, Resume, Step, TaskError, TaskScheduler, run,
};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::fetch::ModuleFetcher;
use crate::module::{Export, Module, ResolvedImport};
use crate::registry::{Claim, LoadTicket, ModuleRegistry};

/// Loads module graphs on demand.
///
/// A load is a coroutine driven by the scheduler: claim the path in the
/// registry, fetch the source (or wait for whoever already is), resolve its
/// static imports, load each dependency in source order, then cache the
/// result. The registry is passed in, so several loaders can share one
/// session cache.
pub struct ModuleLoader<F> {
    registry: ModuleRegistry,
    fetcher: Rc<F>,
    scheduler: TaskScheduler,
}

impl<F> Clone for ModuleLoader<F> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            fetcher: Rc::clone(&self.fetcher),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<F: ModuleFetcher + 'static> ModuleLoader<F> {
    pub fn new(registry: ModuleRegistry, fetcher: F, scheduler: TaskScheduler) -> Self {
        Self {
            registry,
            fetcher: Rc::new(fetcher),
            scheduler,
        }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    /// Load the module at `path` together with everything it imports.
    pub fn load(&self, path: ModulePath) -> Continuation<Export> {
        self.load_within(path, Rc::new(Vec::new()))
    }

    /// Resolve `specifier` as imported from `importer` (or from the root)
    /// and load it.
    pub fn require(&self, importer: Option<&ModulePath>, specifier: &str) -> Continuation<Export> {
        let path = match importer {
            Some(importer) => importer.join(specifier),
            None => ModulePath::resolve("", specifier),
        };
        self.load(path)
    }

    fn load_within(&self, path: ModulePath, ancestors: Rc<Vec<ModulePath>>) -> Continuation<Export> {
        let loader = self.clone();
        run(&self.scheduler, move || {
            Ok(Body::Suspend(LoadModule {
                loader,
                path,
                ancestors,
                state: LoadState::Start,
            }))
        })
    }
}

/// Results a load can be resumed with.
enum Loaded {
    Source(String),
    Module(Export),
}

enum LoadState {
    Start,
    Joining,
    Fetching(LoadTicket),
    Linking(Linking),
    Finished,
}

struct Linking {
    ticket: LoadTicket,
    source: String,
    imports: Vec<ResolvedImport>,
    queue: VecDeque<ModulePath>,
    dependencies: Vec<Export>,
}

struct LoadModule<F> {
    loader: ModuleLoader<F>,
    path: ModulePath,
    /// Modules whose loads are waiting on this one.
    ancestors: Rc<Vec<ModulePath>>,
    state: LoadState,
}

type LoadStep = Result<Step<Loaded, Export>, TaskError>;

impl<F: ModuleFetcher + 'static> LoadModule<F> {
    fn start(&mut self) -> LoadStep {
        match self.loader.registry.claim(&self.path) {
            Claim::Cached(export) => Ok(Step::Complete(export)),
            Claim::Joined(wait) => {
                // Joining a load that is itself waiting on this chain would
                // never settle.
                let blocked_on = self.loader.registry.wait_chain(&self.path);
                if let Some(hit) = blocked_on.iter().position(|p| self.ancestors.contains(p)) {
                    let mut cycle: Vec<&str> = self.ancestors.iter().map(|p| p.as_str()).collect();
                    cycle.push(self.path.as_str());
                    cycle.extend(blocked_on[..=hit].iter().map(|p| p.as_str()));
                    return Err(TaskError::Cycle(cycle.join(" -> ")));
                }
                self.state = LoadState::Joining;
                Ok(Step::Yield(wait.map(Loaded::Module)))
            }
            Claim::Owned(ticket) => {
                tracing::info!(module = %self.path, "loading module");
                self.state = LoadState::Fetching(ticket);
                Ok(Step::Yield(
                    self.loader.fetcher.fetch(&self.path).map(Loaded::Source),
                ))
            }
        }
    }

    fn parse(&mut self, ticket: LoadTicket, source: String) -> LoadStep {
        let mut imports = Vec::new();
        for site in scan_imports(&source) {
            let Some(specifier) = site.specifier else {
                tracing::debug!(module = %self.path, offset = site.offset, "dynamic import left unresolved");
                continue;
            };
            let path = self.path.join(&specifier);
            if path == self.path || self.ancestors.contains(&path) {
                let mut chain: Vec<&str> = self.ancestors.iter().map(|p| p.as_str()).collect();
                chain.extend([self.path.as_str(), path.as_str()]);
                let error = TaskError::Cycle(chain.join(" -> "));
                ticket.complete(Err(error.clone()));
                return Err(error);
            }
            imports.push(ResolvedImport { specifier, path });
        }

        let queue = imports.iter().map(|i| i.path.clone()).collect();
        self.link(Linking {
            ticket,
            source,
            imports,
            queue,
            dependencies: Vec::new(),
        })
    }

    fn link(&mut self, mut linking: Linking) -> LoadStep {
        if let Some(next) = linking.queue.pop_front() {
            let mut ancestors = (*self.ancestors).clone();
            ancestors.push(self.path.clone());
            self.loader.registry.wait_on(&self.path, &next);
            let wait = self.loader.load_within(next, Rc::new(ancestors));
            self.state = LoadState::Linking(linking);
            return Ok(Step::Yield(wait.map(Loaded::Module)));
        }

        let Linking {
            ticket,
            source,
            imports,
            dependencies,
            ..
        } = linking;
        let export = Rc::new(Module::new(self.path.clone(), source, imports, dependencies));
        ticket.complete(Ok(Rc::clone(&export)));
        tracing::info!(module = %self.path, "module loaded");
        Ok(Step::Complete(export))
    }
}

impl<F: ModuleFetcher + 'static> Coroutine for LoadModule<F> {
    type Yield = Loaded;
    type Output = Export;

    fn resume(&mut self, input: Resume<Loaded>) -> LoadStep {
        let state = std::mem::replace(&mut self.state, LoadState::Finished);
        match (state, input) {
            (LoadState::Start, Resume::Start) => self.start(),
            (LoadState::Joining, Resume::Next(Loaded::Module(export))) => {
                Ok(Step::Complete(export))
            }
            (LoadState::Fetching(ticket), Resume::Next(Loaded::Source(source))) => {
                self.parse(ticket, source)
            }
            (LoadState::Linking(mut linking), Resume::Next(Loaded::Module(export))) => {
                linking.dependencies.push(export);
                self.link(linking)
            }
            (LoadState::Fetching(ticket), Resume::Throw(error))
            | (LoadState::Linking(Linking { ticket, .. }), Resume::Throw(error)) => {
                ticket.complete(Err(error.clone()));
                Err(error)
            }
            (_, Resume::Throw(error)) => Err(error),
            _ => Err(TaskError::raised(format!(
                "load of {} resumed out of order",
                self.path
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryFetcher;
    use orbfield_kernel::{Delivery, Outcome};
    use std::cell::RefCell;

    fn setup(fetcher: impl FnOnce(MemoryFetcher) -> MemoryFetcher) -> (ModuleLoader<MemoryFetcher>, MemoryFetcher) {
        let scheduler = TaskScheduler::new();
        let fetcher = fetcher(MemoryFetcher::new(scheduler.clone()));
        let loader = ModuleLoader::new(ModuleRegistry::new(), fetcher.clone(), scheduler);
        (loader, fetcher)
    }

    fn finish(loader: &ModuleLoader<MemoryFetcher>, c: Continuation<Export>) -> Outcome<Export> {
        let got = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&got);
        c.resolve(Delivery::new(move |o| *sink.borrow_mut() = Some(o)));
        loader.scheduler().run_until_idle();
        got.take().expect("load never resolved")
    }

    #[test]
    fn loads_module_with_dependencies() {
        let (loader, fetcher) = setup(|f| {
            f.with_module("utils/math.js", "const h = require('./helper');")
                .with_module("utils/helper.js", "module.exports = 1;")
        });
        let math = finish(&loader, loader.load(ModulePath::normalize("utils/math.js"))).unwrap();

        assert_eq!(math.imports().len(), 1);
        let helper = math.dependency("./helper").unwrap();
        assert_eq!(helper.path().as_str(), "utils/helper.js");
        assert_eq!(helper.source(), "module.exports = 1;");
        assert_eq!(fetcher.requests().len(), 2);
        assert_eq!(loader.registry().len(), 2);
    }

    #[test]
    fn require_resolves_from_importer() {
        let (loader, _) = setup(|f| f.with_module("engine/mesh.js", ""));
        let importer = ModulePath::normalize("src/screens/game.js");
        let mesh = finish(&loader, loader.require(Some(&importer), "../../engine/mesh")).unwrap();
        assert_eq!(mesh.path().as_str(), "engine/mesh.js");
    }

    #[test]
    fn missing_dependency_fails_the_importer() {
        let (loader, _) = setup(|f| f.with_module("main.js", "require('./gone');"));
        let outcome = finish(&loader, loader.load(ModulePath::normalize("main.js")));
        assert_eq!(
            outcome.err(),
            Some(TaskError::fetch("gone.js", "not found"))
        );
        assert!(loader.registry().is_empty());
        assert!(!loader.registry().is_loading(&ModulePath::normalize("main.js")));
    }

    #[test]
    fn cycle_is_reported_not_deadlocked() {
        let (loader, _) = setup(|f| {
            f.with_module("a.js", "require('./b');")
                .with_module("b.js", "require('./a');")
        });
        let outcome = finish(&loader, loader.load(ModulePath::normalize("a.js")));
        assert_eq!(
            outcome.err(),
            Some(TaskError::Cycle("a.js -> b.js -> a.js".into()))
        );
    }

    #[test]
    fn concurrent_halves_of_a_cycle_both_fail() {
        let (loader, _) = setup(|f| {
            f.with_module("a.js", "require('./b');")
                .with_module("b.js", "require('./a');")
        });
        let got = Rc::new(RefCell::new(Vec::new()));
        for path in ["a.js", "b.js"] {
            let sink = Rc::clone(&got);
            loader
                .load(ModulePath::normalize(path))
                .resolve(Delivery::new(move |o: Outcome<Export>| {
                    sink.borrow_mut().push(o.err())
                }));
        }
        loader.scheduler().run_until_idle();

        let got = got.borrow();
        assert_eq!(got.len(), 2);
        assert!(got.iter().all(|e| matches!(e, Some(TaskError::Cycle(_)))));
        for path in ["a.js", "b.js"] {
            assert!(!loader.registry().is_loading(&ModulePath::normalize(path)));
        }
        assert!(loader.registry().is_empty());
    }

    #[test]
    fn joining_an_unrelated_load_is_not_a_cycle() {
        let (loader, _) = setup(|f| {
            f.with_module("a.js", "require('./shared');")
                .with_module("b.js", "require('./shared');")
                .with_module("shared.js", "")
        });
        let got = Rc::new(RefCell::new(Vec::new()));
        for path in ["a.js", "b.js"] {
            let sink = Rc::clone(&got);
            loader
                .load(ModulePath::normalize(path))
                .resolve(Delivery::new(move |o: Outcome<Export>| {
                    sink.borrow_mut().push(o.is_ok())
                }));
        }
        loader.scheduler().run_until_idle();
        assert_eq!(*got.borrow(), vec![true, true]);
    }

    #[test]
    fn self_import_is_a_cycle() {
        let (loader, _) = setup(|f| f.with_module("me.js", "require('./me.js');"));
        let outcome = finish(&loader, loader.load(ModulePath::normalize("me.js")));
        assert!(matches!(outcome, Err(TaskError::Cycle(_))));
    }

    #[test]
    fn shared_dependency_is_fetched_once() {
        let (loader, fetcher) = setup(|f| {
            f.with_module("main.js", "require('./a'); require('./b');")
                .with_module("a.js", "require('./common');")
                .with_module("b.js", "require('./common');")
                .with_module("common.js", "")
        });
        let main = finish(&loader, loader.load(ModulePath::normalize("main.js"))).unwrap();
        assert_eq!(fetcher.request_count("common.js"), 1);

        let via_a = Rc::clone(main.dependency("./a").unwrap().dependency("./common").unwrap());
        let via_b = Rc::clone(main.dependency("./b").unwrap().dependency("./common").unwrap());
        assert!(Rc::ptr_eq(&via_a, &via_b));
        assert_eq!(main.graph().len(), 4);
    }

    #[test]
    fn concurrent_loads_share_one_fetch() {
        let (loader, fetcher) = setup(|f| f.with_module("big.js", ""));
        let got = Rc::new(RefCell::new(Vec::new()));
        for _ in 0..3 {
            let sink = Rc::clone(&got);
            loader
                .load(ModulePath::normalize("big.js"))
                .resolve(Delivery::new(move |o: Outcome<Export>| {
                    sink.borrow_mut().push(o.map(|m| m.path().clone()))
                }));
        }
        loader.scheduler().run_until_idle();

        assert_eq!(got.borrow().len(), 3);
        assert!(got.borrow().iter().all(|o| o.is_ok()));
        assert_eq!(fetcher.request_count("big.js"), 1);
        assert_eq!(loader.registry().stats().joins, 2);
    }

    #[test]
    fn failed_load_can_be_retried() {
        let (loader, fetcher) = setup(|f| f);
        let path = ModulePath::normalize("late.js");
        assert!(finish(&loader, loader.load(path.clone())).is_err());

        fetcher.insert("late.js", "module.exports = 2;");
        let module = finish(&loader, loader.load(path)).unwrap();
        assert_eq!(module.source(), "module.exports = 2;");
        assert_eq!(fetcher.request_count("late.js"), 2);
    }

    #[test]
    fn cached_load_is_not_refetched() {
        let (loader, fetcher) = setup(|f| f.with_module("once.js", ""));
        let first = finish(&loader, loader.load(ModulePath::normalize("once.js"))).unwrap();
        let second = finish(&loader, loader.require(None, "./once")).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(fetcher.request_count("once.js"), 1);
    }

    #[test]
    fn dynamic_imports_are_skipped() {
        let (loader, fetcher) = setup(|f| f.with_module("dyn.js", "require(name);"));
        let module = finish(&loader, loader.load(ModulePath::normalize("dyn.js"))).unwrap();
        assert!(module.imports().is_empty());
        assert_eq!(fetcher.requests().len(), 1);
    }
}
