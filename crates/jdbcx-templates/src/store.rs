use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

/// Ordered string→string property bag, the untyped boundary type interpreters
/// and the query parser pass around (spec's `Properties`-equivalent).
pub type PropertyBag = BTreeMap<String, String>;

/// The three nested scopes a `QueryContext` stacks, narrowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Query,
    Thread,
    Global,
}

/// Scoped variable map: query scope is private to one statement, thread scope
/// is private to the worker currently evaluating a block, global scope is
/// shared and mutex-guarded (writes are rare per the concurrency model).
#[derive(Debug, Clone)]
pub struct VariableStore {
    query: Arc<RwLock<HashMap<String, String>>>,
    thread: Arc<RwLock<HashMap<String, String>>>,
    global: Arc<Mutex<HashMap<String, String>>>,
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableStore {
    pub fn new() -> Self {
        Self {
            query: Arc::new(RwLock::new(HashMap::new())),
            thread: Arc::new(RwLock::new(HashMap::new())),
            global: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn set(&self, scope: Scope, name: &str, value: &str) {
        match scope {
            Scope::Query => {
                self.query.write().unwrap().insert(name.to_string(), value.to_string());
            }
            Scope::Thread => {
                self.thread.write().unwrap().insert(name.to_string(), value.to_string());
            }
            Scope::Global => {
                self.global.lock().unwrap().insert(name.to_string(), value.to_string());
            }
        }
    }

    /// Walks query → thread → global, then falls back to the ambient
    /// property bag if no scope defines `name`.
    pub fn get(&self, name: &str, bag: &PropertyBag) -> Option<String> {
        if let Some(v) = self.query.read().unwrap().get(name) {
            return Some(v.clone());
        }
        if let Some(v) = self.thread.read().unwrap().get(name) {
            return Some(v.clone());
        }
        if let Some(v) = self.global.lock().unwrap().get(name) {
            return Some(v.clone());
        }
        bag.get(name).cloned()
    }

    /// Resolved value for the named scope's "direct get" (used by the `var`
    /// interpreter and tests); does not consult the property bag.
    pub fn get_scope(&self, scope: Scope, name: &str) -> Option<String> {
        match scope {
            Scope::Query => self.query.read().unwrap().get(name).cloned(),
            Scope::Thread => self.thread.read().unwrap().get(name).cloned(),
            Scope::Global => self.global.lock().unwrap().get(name).cloned(),
        }
    }

    /// Flattened view of every variable currently visible (bag then global
    /// then thread then query, narrowest wins), for callers — the `script`
    /// interpreter's engine bootstrap, mainly — that need to bind the whole
    /// scope rather than look up names one at a time.
    pub fn snapshot(&self, bag: &PropertyBag) -> HashMap<String, String> {
        let mut merged = bag.clone().into_iter().collect::<HashMap<_, _>>();
        merged.extend(self.global.lock().unwrap().clone());
        merged.extend(self.thread.read().unwrap().clone());
        merged.extend(self.query.read().unwrap().clone());
        merged
    }

    /// Spawns the private copy of query+thread scope a parallel worker gets
    /// when `exec.parallelism>0`: a snapshot at fork time, no propagation
    /// back to the parent. Global scope remains shared (it is the one scope
    /// spec.md explicitly allows cross-worker visibility for).
    pub fn fork_thread_scope(&self) -> VariableStore {
        let query = self.query.read().unwrap().clone();
        let thread = self.thread.read().unwrap().clone();
        VariableStore {
            query: Arc::new(RwLock::new(query)),
            thread: Arc::new(RwLock::new(thread)),
            global: Arc::clone(&self.global),
        }
    }
}
