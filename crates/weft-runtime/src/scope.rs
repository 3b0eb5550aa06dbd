//! Scope store: one sparse, accessor-keyed record per section activation.
//!
//! Scopes form a tree mirroring section nesting. Ids are arena indices
//! and never reused within an engine, which is what lets the HTML
//! renderer's serialized scope ids name the same scopes after resume.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::dom::NodeIx;
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

/// Reconciliation state for one loop: item key to body scope, in render
/// order.
#[derive(Clone, Debug, Default)]
pub struct LoopState {
    pub entries: Vec<(Value, ScopeId)>,
}

impl LoopState {
    pub fn scope_for(&self, key: &Value) -> Option<ScopeId> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, s)| *s)
    }
}

/// Active conditional branch: arm index and the branch body scope, if the
/// live arm has one.
#[derive(Clone, Debug)]
pub struct BranchState {
    pub index: usize,
    pub scope: Option<ScopeId>,
}

#[derive(Clone, Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub template: String,
    pub section: u32,
    pub parent: Option<ScopeId>,
    /// Root DOM nodes of this scope's instantiated skeleton, in order.
    pub fragment: SmallVec<[NodeIx; 4]>,
    pub alive: bool,
    slots: FxHashMap<String, Value>,
    loops: FxHashMap<String, LoopState>,
    branches: FxHashMap<String, BranchState>,
}

impl Scope {
    pub fn read(&self, accessor: &str) -> Value {
        self.slots.get(accessor).cloned().unwrap_or(Value::Null)
    }

    /// Write a slot; `Unset` is dropped so conditional prop groups without
    /// a live arm keep their previous value. Returns whether the stored
    /// value changed.
    pub fn write(&mut self, accessor: &str, value: Value) -> bool {
        if matches!(value, Value::Unset) {
            return false;
        }
        match self.slots.get(accessor) {
            Some(existing) if *existing == value => false,
            _ => {
                self.slots.insert(accessor.to_string(), value);
                true
            }
        }
    }

    pub fn slot_keys(&self) -> Vec<&str> {
        self.slots.keys().map(String::as_str).collect()
    }

    pub fn loop_state(&self, accessor: &str) -> Option<&LoopState> {
        self.loops.get(accessor)
    }

    pub fn set_loop_state(&mut self, accessor: &str, state: LoopState) {
        self.loops.insert(accessor.to_string(), state);
    }

    pub fn branch_state(&self, accessor: &str) -> Option<&BranchState> {
        self.branches.get(accessor)
    }

    pub fn set_branch_state(&mut self, accessor: &str, state: BranchState) {
        self.branches.insert(accessor.to_string(), state);
    }
}

#[derive(Debug, Default)]
pub struct Scopes {
    arena: Vec<Scope>,
}

impl Scopes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        template: impl Into<String>,
        section: u32,
        parent: Option<ScopeId>,
    ) -> ScopeId {
        let id = ScopeId(self.arena.len() as u32);
        self.arena.push(Scope {
            id,
            template: template.into(),
            section,
            parent,
            fragment: SmallVec::new(),
            alive: true,
            slots: FxHashMap::default(),
            loops: FxHashMap::default(),
            branches: FxHashMap::default(),
        });
        id
    }

    /// Reserve ids up to `id` so a resumed engine can mint scopes with the
    /// exact ids the server serialized. Filler slots are dead until
    /// claimed.
    pub fn create_with_id(
        &mut self,
        id: ScopeId,
        template: impl Into<String>,
        section: u32,
        parent: Option<ScopeId>,
    ) -> ScopeId {
        while self.arena.len() <= id.0 as usize {
            let filler = ScopeId(self.arena.len() as u32);
            self.arena.push(Scope {
                id: filler,
                template: String::new(),
                section: 0,
                parent: None,
                fragment: SmallVec::new(),
                alive: false,
                slots: FxHashMap::default(),
                loops: FxHashMap::default(),
                branches: FxHashMap::default(),
            });
        }
        let slot = &mut self.arena[id.0 as usize];
        slot.template = template.into();
        slot.section = section;
        slot.parent = parent;
        slot.alive = true;
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.arena[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.arena[id.0 as usize]
    }

    /// Walk `hops` parent links up from `scope`.
    pub fn ancestor(&self, scope: ScopeId, hops: u16) -> ScopeId {
        let mut current = scope;
        for _ in 0..hops {
            match self.get(current).parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }

    /// Tear down a scope and everything beneath it.
    pub fn kill(&mut self, scope: ScopeId) {
        let descendants: Vec<ScopeId> = self
            .arena
            .iter()
            .filter(|s| s.alive && self.descends_from(s.id, scope))
            .map(|s| s.id)
            .collect();
        for id in descendants {
            self.arena[id.0 as usize].alive = false;
        }
    }

    pub fn descends_from(&self, scope: ScopeId, ancestor: ScopeId) -> bool {
        let mut cursor = Some(scope);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.get(current).parent;
        }
        false
    }

    /// Live scopes of `section` within `template` that sit at or below
    /// `root`, in creation order.
    pub fn live_in_section(&self, template: &str, section: u32, root: ScopeId) -> Vec<ScopeId> {
        self.arena
            .iter()
            .filter(|s| {
                s.alive
                    && s.template == template
                    && s.section == section
                    && self.descends_from(s.id, root)
            })
            .map(|s| s.id)
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.arena.iter().filter(|s| s.alive).count()
    }

    pub fn total_created(&self) -> usize {
        self.arena.len()
    }

    pub fn iter_live(&self) -> impl Iterator<Item = &Scope> {
        self.arena.iter().filter(|s| s.alive)
    }
}
