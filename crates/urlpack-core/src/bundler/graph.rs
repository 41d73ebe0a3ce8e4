//! Module dependency graph.
//!
//! Modules are keyed by their resolved location, so the same URL or file is
//! only ever loaded once per build.

use crate::resolve::ResolvedLocation;
use rustc_hash::FxHashMap as HashMap;
use std::collections::VecDeque;

/// Unique identifier for a module in the graph.
pub type ModuleId = usize;

/// A module in the dependency graph.
#[derive(Debug, Clone)]
pub struct Module {
    /// Where the module was resolved to.
    pub location: ResolvedLocation,
    /// Source text.
    pub source: String,
    /// Modules this one imports, in first-appearance order.
    pub dependencies: Vec<ModuleId>,
}

impl Module {
    #[must_use]
    pub fn new(location: ResolvedLocation, source: String) -> Self {
        Self {
            location,
            source,
            dependencies: Vec::new(),
        }
    }
}

/// The module dependency graph.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: Vec<Module>,
    by_location: HashMap<ResolvedLocation, ModuleId>,
}

impl ModuleGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module, returning its ID. A location already present keeps its ID.
    pub fn add(&mut self, module: Module) -> ModuleId {
        if let Some(&id) = self.by_location.get(&module.location) {
            return id;
        }
        let id = self.modules.len();
        self.by_location.insert(module.location.clone(), id);
        self.modules.push(module);
        id
    }

    #[must_use]
    pub fn get(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    #[must_use]
    pub fn id_of(&self, location: &ResolvedLocation) -> Option<ModuleId> {
        self.by_location.get(location).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Record the edges of `id`. Targets not in the graph are ignored.
    pub fn set_dependencies(&mut self, id: ModuleId, targets: &[ResolvedLocation]) {
        let mut deps: Vec<ModuleId> = Vec::with_capacity(targets.len());
        for target in targets {
            if let Some(dep) = self.id_of(target) {
                if !deps.contains(&dep) {
                    deps.push(dep);
                }
            }
        }
        if let Some(module) = self.modules.get_mut(id) {
            module.dependencies = deps;
        }
    }

    /// Modules in dependency-first order.
    ///
    /// Modules caught in a cycle follow the acyclic part in ID order.
    #[must_use]
    pub fn toposort(&self) -> Vec<ModuleId> {
        let n = self.modules.len();
        let mut in_degree = vec![0usize; n];
        let mut dependents: Vec<Vec<ModuleId>> = vec![Vec::new(); n];

        for (id, module) in self.modules.iter().enumerate() {
            for &dep in &module.dependencies {
                dependents[dep].push(id);
                in_degree[id] += 1;
            }
        }

        // Kahn's algorithm
        let mut queue: VecDeque<ModuleId> = (0..n).filter(|&id| in_degree[id] == 0).collect();
        let mut order = Vec::with_capacity(n);
        let mut placed = vec![false; n];

        while let Some(id) = queue.pop_front() {
            order.push(id);
            placed[id] = true;
            for &next in &dependents[id] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if order.len() < n {
            order.extend((0..n).filter(|&id| !placed[id]));
        }

        order
    }
}
