//! Pointwise map lattices from identifiers to domain elements.

use super::Lattice;
use crate::intermediate_representation::{Identifier, ScopeToken};
use crate::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A pointwise lattice mapping identifiers to elements of a non-relational
/// domain `T`.
///
/// The environment carries a sentinel element of `T` that serves two
/// purposes: it is the family member used to create top and bottom
/// elements, and it is the implicit image of every identifier absent from
/// the map. Join, meet, widening and narrowing act pointwise on the union
/// of the keysets, substituting the sentinel for missing keys.
///
/// The map itself is wrapped into an `Arc` to enable cheap cloning, since
/// every semantic transition produces a fresh environment.
///
/// Top is an empty map whose sentinel is top ("every identifier can be
/// anything"); bottom is an explicit flag and represents unreachability.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Environment<T: Lattice> {
    lattice: T,
    map: Arc<BTreeMap<Identifier, T>>,
    is_bottom: bool,
}

impl<T: Lattice> Environment<T> {
    /// Create an empty environment with the given sentinel element.
    pub fn new(lattice: T) -> Environment<T> {
        Environment {
            lattice,
            map: Arc::new(BTreeMap::new()),
            is_bottom: false,
        }
    }

    /// The sentinel element used as the image of absent keys.
    pub fn sentinel(&self) -> &T {
        &self.lattice
    }

    /// The element associated to the given identifier.
    ///
    /// Returns the bottom element on unreachable environments, the stored
    /// element on a hit, and a copy of the sentinel otherwise.
    pub fn get_state(&self, id: &Identifier) -> T {
        if self.is_bottom {
            return self.lattice.bottom();
        }
        match self.map.get(id) {
            Some(element) => element.clone(),
            None => self.lattice.clone(),
        }
    }

    /// Returns whether the environment has an explicit binding for the
    /// given identifier.
    pub fn contains(&self, id: &Identifier) -> bool {
        self.map.contains_key(id)
    }

    /// Iterate over the explicit bindings of the environment.
    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &T)> {
        self.map.iter()
    }

    /// Iterate over the explicitly bound identifiers.
    pub fn keys(&self) -> impl Iterator<Item = &Identifier> {
        self.map.keys()
    }

    /// Assign an element to an identifier.
    ///
    /// The update is strong for strong identifiers and joining for weak
    /// ones. Assigning inside an unreachable environment has no effect.
    pub fn assign(&self, id: &Identifier, element: T) -> Environment<T> {
        if self.is_bottom {
            return self.clone();
        }
        let stored = if id.is_weak() {
            self.get_state(id).lub(&element)
        } else {
            element
        };
        let mut map = (*self.map).clone();
        // bindings equal to the sentinel carry no information; dropping
        // them keeps equality consistent with the pointwise order
        if stored == self.lattice {
            map.remove(id);
        } else {
            map.insert(id.clone(), stored);
        }
        Environment {
            lattice: self.lattice.clone(),
            map: Arc::new(map),
            is_bottom: false,
        }
    }

    /// Remove the binding for the given identifier.
    pub fn forget(&self, id: &Identifier) -> Environment<T> {
        if self.is_bottom || !self.map.contains_key(id) {
            return self.clone();
        }
        let mut map = (*self.map).clone();
        map.remove(id);
        Environment {
            lattice: self.lattice.clone(),
            map: Arc::new(map),
            is_bottom: false,
        }
    }

    /// Remove all bindings whose identifier satisfies the predicate.
    pub fn forget_if(&self, predicate: &dyn Fn(&Identifier) -> bool) -> Environment<T> {
        if self.is_bottom {
            return self.clone();
        }
        let map: BTreeMap<Identifier, T> = self
            .map
            .iter()
            .filter(|(id, _)| !predicate(id))
            .map(|(id, element)| (id.clone(), element.clone()))
            .collect();
        Environment {
            lattice: self.lattice.clone(),
            map: Arc::new(map),
            is_bottom: false,
        }
    }

    /// Hide all bound identifiers behind the given scope.
    pub fn push_scope(&self, token: &ScopeToken) -> Environment<T> {
        self.map_keys(&|id| Some(id.push_scope(token)))
    }

    /// Remove the given scope from all bound identifiers, dropping the
    /// bindings of identifiers local to the closing scope.
    pub fn pop_scope(&self, token: &ScopeToken) -> Environment<T> {
        self.map_keys(&|id| id.pop_scope(token))
    }

    fn map_keys(
        &self,
        map_key: &impl Fn(&Identifier) -> Option<Identifier>,
    ) -> Environment<T> {
        if self.is_bottom {
            return self.clone();
        }
        let mut map = BTreeMap::new();
        for (id, element) in self.map.iter() {
            if let Some(mapped) = map_key(id) {
                // two keys can collapse onto the same scoped name; join them
                match map.remove(&mapped) {
                    Some(existing) => {
                        let joined: T = element.lub(&existing);
                        map.insert(mapped, joined);
                    }
                    None => {
                        map.insert(mapped, element.clone());
                    }
                }
            }
        }
        Environment {
            lattice: self.lattice.clone(),
            map: Arc::new(map),
            is_bottom: false,
        }
    }

    fn pointwise(
        &self,
        other: &Environment<T>,
        combine: impl Fn(&T, &T) -> T,
    ) -> Environment<T> {
        let sentinel = combine(&self.lattice, &other.lattice);
        let mut map = BTreeMap::new();
        for id in self.map.keys().chain(other.map.keys()) {
            if map.contains_key(id) {
                continue;
            }
            let left = self.get_state(id);
            let right = other.get_state(id);
            let combined = combine(&left, &right);
            if combined != sentinel {
                map.insert(id.clone(), combined);
            }
        }
        Environment {
            lattice: sentinel,
            map: Arc::new(map),
            is_bottom: false,
        }
    }
}

impl<T: Lattice> Lattice for Environment<T> {
    fn top(&self) -> Self {
        Environment {
            lattice: self.lattice.top(),
            map: Arc::new(BTreeMap::new()),
            is_bottom: false,
        }
    }

    fn bottom(&self) -> Self {
        Environment {
            lattice: self.lattice.clone(),
            map: Arc::new(BTreeMap::new()),
            is_bottom: true,
        }
    }

    fn is_top(&self) -> bool {
        !self.is_bottom
            && self.lattice.is_top()
            && self.map.values().all(|element| element.is_top())
    }

    fn is_bottom(&self) -> bool {
        self.is_bottom
    }

    fn less_or_equal(&self, other: &Self) -> bool {
        if self.is_bottom {
            return true;
        }
        if other.is_bottom {
            return false;
        }
        self.map
            .keys()
            .chain(other.map.keys())
            .all(|id| self.get_state(id).less_or_equal(&other.get_state(id)))
            && self.lattice.less_or_equal(&other.lattice)
    }

    fn lub(&self, other: &Self) -> Self {
        if self.is_bottom {
            return other.clone();
        }
        if other.is_bottom {
            return self.clone();
        }
        self.pointwise(other, |left, right| left.lub(right))
    }

    fn glb(&self, other: &Self) -> Self {
        if self.is_bottom || other.is_bottom {
            return self.bottom();
        }
        self.pointwise(other, |left, right| left.glb(right))
    }

    fn widening(&self, other: &Self) -> Self {
        if self.is_bottom {
            return other.clone();
        }
        if other.is_bottom {
            return self.clone();
        }
        self.pointwise(other, |left, right| left.widening(right))
    }

    fn narrowing(&self, other: &Self) -> Self {
        if self.is_bottom || other.is_bottom {
            return self.bottom();
        }
        self.pointwise(other, |left, right| left.narrowing(right))
    }
}

impl<T: Lattice + std::fmt::Display> std::fmt::Display for Environment<T> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.is_bottom {
            return write!(formatter, "BOTTOM");
        }
        if self.is_top() {
            return write!(formatter, "TOP");
        }
        write!(formatter, "{{")?;
        for (i, (id, element)) in self.map.iter().enumerate() {
            if i > 0 {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{id} -> {element}")?;
        }
        write!(formatter, "}}")
    }
}
