//! Per-call traversal state.
use {
    super::staging::Placeholder,
    crate::{
        config::Config,
        error::{preallocation_size_limit, Error, Result},
        schema::SchemaCache,
    },
    core::{
        mem,
        ops::{Deref, DerefMut},
    },
    std::sync::Arc,
};

/// Bound-field state of one record being walked, indexed by field position.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) enum Bound {
    #[default]
    Unset,
    /// Read path: raw bits of a bound integer.
    Value(u64),
    /// Write path: reserved bytes awaiting the measurement.
    Hole(Placeholder),
}

#[derive(Debug, Default)]
struct Scope {
    slots: Vec<Bound>,
}

/// Stack of scopes, one per record on the current path from the root.
#[derive(Debug)]
pub(crate) struct Context {
    config: Config,
    cache: Arc<SchemaCache>,
    current: Scope,
    saved: Vec<Scope>,
}

impl Context {
    pub(crate) fn new(config: Config, cache: Arc<SchemaCache>) -> Self {
        Self {
            config,
            cache,
            current: Scope::default(),
            saved: Vec::new(),
        }
    }

    /// Cache that nested schemas left unresolved by a recursive declaration are looked up in.
    pub(crate) fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Open a scope for a record with `fields` fields. The scope closes when the guard drops.
    pub(crate) fn enter(&mut self, fields: usize) -> Result<ScopeGuard<'_>> {
        if self.saved.len() >= self.config.max_depth() {
            return Err(Error::DepthLimit(self.config.max_depth()));
        }
        let scope = Scope {
            slots: vec![Bound::Unset; fields],
        };
        self.saved.push(mem::replace(&mut self.current, scope));
        Ok(ScopeGuard { ctx: self })
    }

    /// Number of open scopes.
    pub(crate) fn depth(&self) -> usize {
        self.saved.len()
    }

    pub(crate) fn bound(&self, slot: usize) -> Bound {
        self.current.slots.get(slot).copied().unwrap_or_default()
    }

    pub(crate) fn set_bound(&mut self, slot: usize, bound: Bound) {
        if let Some(entry) = self.current.slots.get_mut(slot) {
            *entry = bound;
        }
    }

    /// Remove and return the placeholder reserved for `slot`.
    pub(crate) fn take_hole(&mut self, slot: usize) -> Option<Placeholder> {
        match self.current.slots.get_mut(slot).map(mem::take) {
            Some(Bound::Hole(placeholder)) => Some(placeholder),
            _ => None,
        }
    }

    pub(crate) fn check_preallocation(&self, needed: usize) -> Result<()> {
        let limit = self.config.preallocation_size_limit();
        if needed > limit {
            return Err(preallocation_size_limit(needed, limit));
        }
        Ok(())
    }

    pub(crate) fn preallocation_limit(&self) -> usize {
        self.config.preallocation_size_limit()
    }
}

/// Restores the enclosing scope on drop, including on early return with an error.
pub(crate) struct ScopeGuard<'c> {
    ctx: &'c mut Context,
}

impl Deref for ScopeGuard<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        self.ctx
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.ctx
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.ctx.current = self.ctx.saved.pop().unwrap_or_default();
    }
}
