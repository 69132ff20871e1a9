use std::collections::HashSet;

/// The seven named components `trace-cli` wires together (spec.md §9
/// "Module-startup wiring"). No runtime reflection, no dynamic plugin
/// loading — this is a fixed, compiled-in dependency graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentId {
    ObjectStore,
    Wal,
    Ingester,
    BlockWriter,
    Compactor,
    QueryEngine,
    Server,
}

impl ComponentId {
    const ALL: [ComponentId; 7] = [
        ComponentId::ObjectStore,
        ComponentId::Wal,
        ComponentId::Ingester,
        ComponentId::BlockWriter,
        ComponentId::Compactor,
        ComponentId::QueryEngine,
        ComponentId::Server,
    ];

    fn depends_on(self) -> &'static [ComponentId] {
        use ComponentId::*;
        match self {
            ObjectStore => &[],
            Wal => &[],
            Ingester => &[Wal],
            BlockWriter => &[ObjectStore, Ingester],
            Compactor => &[ObjectStore],
            QueryEngine => &[ObjectStore],
            Server => &[Ingester, QueryEngine],
        }
    }

    pub fn name(self) -> &'static str {
        use ComponentId::*;
        match self {
            ObjectStore => "object_store",
            Wal => "wal",
            Ingester => "ingester",
            BlockWriter => "block_writer",
            Compactor => "compactor",
            QueryEngine => "query_engine",
            Server => "server",
        }
    }
}

/// A stable topological order over [`ComponentId::ALL`] (Kahn's algorithm,
/// ties broken by declaration order so the order is deterministic run to
/// run). `stop` runs this order in reverse.
pub fn topological_order() -> Vec<ComponentId> {
    let mut remaining_deps: Vec<(ComponentId, HashSet<ComponentId>)> = ComponentId::ALL
        .iter()
        .map(|&id| (id, id.depends_on().iter().copied().collect()))
        .collect();

    let mut order = Vec::with_capacity(ComponentId::ALL.len());
    while order.len() < ComponentId::ALL.len() {
        let next = remaining_deps
            .iter()
            .find(|(_, deps)| deps.is_empty())
            .map(|(id, _)| *id)
            .expect("component graph is acyclic by construction");

        order.push(next);
        remaining_deps.retain(|(id, _)| *id != next);
        for (_, deps) in &mut remaining_deps {
            deps.remove(&next);
        }
    }
    order
}

/// Tracks which components have been started, so `start`/`stop` are
/// idempotent: starting an already-started component, or stopping one
/// that was never started, is a no-op rather than an error.
#[derive(Default)]
pub struct Registry {
    started: HashSet<ComponentId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time a component transitions to started,
    /// `false` if it was already started.
    pub fn mark_started(&mut self, id: ComponentId) -> bool {
        self.started.insert(id)
    }

    /// Returns `true` the first time a component transitions to stopped.
    pub fn mark_stopped(&mut self, id: ComponentId) -> bool {
        self.started.remove(&id)
    }

    pub fn is_started(&self, id: ComponentId) -> bool {
        self.started.contains(&id)
    }
}
