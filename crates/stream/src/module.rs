use orbfield_common::ModulePath;
use serde::Serialize;
use std::collections::BTreeMap;
use std::rc::Rc;

/// What a completed load leaves in the registry.
pub type Export = Rc<Module>;

/// One import of a module, resolved to the path it loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedImport {
    pub specifier: String,
    pub path: ModulePath,
}

/// A loaded module: its source and its resolved dependencies.
#[derive(Debug, Serialize)]
pub struct Module {
    path: ModulePath,
    #[serde(skip)]
    source: String,
    imports: Vec<ResolvedImport>,
    #[serde(skip)]
    dependencies: Vec<Export>,
}

impl Module {
    /// `dependencies[i]` is the export loaded for `imports[i]`.
    pub fn new(
        path: ModulePath,
        source: String,
        imports: Vec<ResolvedImport>,
        dependencies: Vec<Export>,
    ) -> Self {
        debug_assert_eq!(imports.len(), dependencies.len());
        Self {
            path,
            source,
            imports,
            dependencies,
        }
    }

    pub fn path(&self) -> &ModulePath {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn imports(&self) -> &[ResolvedImport] {
        &self.imports
    }

    pub fn dependencies(&self) -> &[Export] {
        &self.dependencies
    }

    /// The export loaded for `specifier`, as written in the source.
    pub fn dependency(&self, specifier: &str) -> Option<&Export> {
        self.imports
            .iter()
            .position(|import| import.specifier == specifier)
            .map(|idx| &self.dependencies[idx])
    }

    /// Adjacency list of the graph reachable from this module.
    pub fn graph(&self) -> BTreeMap<ModulePath, Vec<ModulePath>> {
        let mut graph = BTreeMap::new();
        let mut stack = vec![self];
        while let Some(module) = stack.pop() {
            if graph.contains_key(&module.path) {
                continue;
            }
            graph.insert(
                module.path.clone(),
                module.imports.iter().map(|i| i.path.clone()).collect(),
            );
            stack.extend(module.dependencies.iter().map(|d| &**d));
        }
        graph
    }
}
