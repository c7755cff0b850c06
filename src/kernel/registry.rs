//! Typed capability registry.
//!
//! Components are registered under the capability trait they implement and
//! looked up the same way, never by a name string. This replaces the
//! dynamic reflection-based lookup pattern with a compile-time-checked one:
//! `registry.get::<dyn StateManager>()` either resolves or it doesn't, there
//! is no string key to typo.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct Registry {
    slots: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    registration_order: Vec<TypeId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `component` as the advertiser of capability `C`.
    ///
    /// `C` is typically a trait object type, e.g. `registry.register::<dyn
    /// StateManager>(Arc::new(store))`. Registering a second component under
    /// the same capability replaces the first.
    pub fn register<C: ?Sized + 'static>(&mut self, component: Arc<C>)
    where
        Arc<C>: Send + Sync + 'static,
    {
        let type_id = TypeId::of::<C>();
        if !self.slots.contains_key(&type_id) {
            self.registration_order.push(type_id);
        }
        self.slots.insert(type_id, Box::new(component));
    }

    /// Resolves the component advertising capability `C`, if any is registered.
    pub fn get<C: ?Sized + 'static>(&self) -> Option<Arc<C>>
    where
        Arc<C>: Clone + Send + Sync + 'static,
    {
        self.slots
            .get(&TypeId::of::<C>())?
            .downcast_ref::<Arc<C>>()
            .cloned()
    }

    /// True if a component is registered for capability `C`.
    pub fn has<C: ?Sized + 'static>(&self) -> bool {
        self.slots.contains_key(&TypeId::of::<C>())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
