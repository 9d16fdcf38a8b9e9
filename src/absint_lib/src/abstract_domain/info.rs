//! Auxiliary per-program-point information computed during fixpoints.
//!
//! Checks and analyses can stash arbitrary lattice values under string
//! keys next to the abstract state. The map itself is a pointwise lattice
//! with an implicit bottom for absent keys.

use super::Lattice;
use derive_more::Deref;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The object-safe facade of [`Lattice`] used to store heterogeneous
/// lattice values inside a [`FixpointInfo`].
///
/// A given key is always used with a single concrete element type;
/// combining elements of different types under the same key violates an
/// internal invariant and panics.
pub trait InfoElement: Any + std::fmt::Debug {
    /// Clone into a boxed trait object.
    fn boxed_clone(&self) -> Box<dyn InfoElement>;

    /// Equality through the trait object.
    fn dyn_eq(&self, other: &dyn InfoElement) -> bool;

    /// `less_or_equal` through the trait object.
    fn dyn_less_or_equal(&self, other: &dyn InfoElement) -> bool;

    /// `lub` through the trait object.
    fn dyn_lub(&self, other: &dyn InfoElement) -> Box<dyn InfoElement>;

    /// `glb` through the trait object.
    fn dyn_glb(&self, other: &dyn InfoElement) -> Box<dyn InfoElement>;

    /// `widening` through the trait object.
    fn dyn_widening(&self, other: &dyn InfoElement) -> Box<dyn InfoElement>;

    /// `narrowing` through the trait object.
    fn dyn_narrowing(&self, other: &dyn InfoElement) -> Box<dyn InfoElement>;

    /// Returns whether the element is the bottom of its family.
    fn dyn_is_bottom(&self) -> bool;

    /// Upcast for downcasting to the concrete element type.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Lattice + Any + std::fmt::Debug> InfoElement for T {
    fn boxed_clone(&self) -> Box<dyn InfoElement> {
        Box::new(self.clone())
    }

    fn dyn_eq(&self, other: &dyn InfoElement) -> bool {
        match other.as_any().downcast_ref::<T>() {
            Some(other) => self == other,
            None => false,
        }
    }

    fn dyn_less_or_equal(&self, other: &dyn InfoElement) -> bool {
        self.less_or_equal(expect_same_type::<T>(other))
    }

    fn dyn_lub(&self, other: &dyn InfoElement) -> Box<dyn InfoElement> {
        Box::new(self.lub(expect_same_type::<T>(other)))
    }

    fn dyn_glb(&self, other: &dyn InfoElement) -> Box<dyn InfoElement> {
        Box::new(self.glb(expect_same_type::<T>(other)))
    }

    fn dyn_widening(&self, other: &dyn InfoElement) -> Box<dyn InfoElement> {
        Box::new(self.widening(expect_same_type::<T>(other)))
    }

    fn dyn_narrowing(&self, other: &dyn InfoElement) -> Box<dyn InfoElement> {
        Box::new(self.narrowing(expect_same_type::<T>(other)))
    }

    fn dyn_is_bottom(&self) -> bool {
        self.is_bottom()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn expect_same_type<T: Any>(element: &dyn InfoElement) -> &T {
    element
        .as_any()
        .downcast_ref::<T>()
        .expect("fixpoint information key used with two different element types")
}

/// A stored fixpoint-information value.
#[derive(Debug, Clone, Deref)]
#[deref(forward)]
pub struct InfoValue(Arc<dyn InfoElement>);

impl InfoValue {
    /// Wrap a lattice element.
    pub fn new<T: Lattice + Any + std::fmt::Debug>(element: T) -> InfoValue {
        InfoValue(Arc::new(element))
    }

    /// Access the contained element as a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    fn element(&self) -> &dyn InfoElement {
        self.0.as_ref()
    }
}

impl PartialEq for InfoValue {
    fn eq(&self, other: &InfoValue) -> bool {
        self.0.dyn_eq(other.element())
    }
}

impl Eq for InfoValue {}

/// The additional information computed during fixpoint executions: a map
/// lattice keyed by strings.
///
/// Keys with bottom values are preserved: bottom is a legitimate stored
/// value, and dropping it would make weak stores non-monotone.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FixpointInfo {
    map: BTreeMap<String, InfoValue>,
    is_bottom: bool,
}

impl FixpointInfo {
    /// An empty mapping.
    pub fn new() -> FixpointInfo {
        FixpointInfo::default()
    }

    /// The bottom element of the mapping lattice.
    pub fn bottom() -> FixpointInfo {
        FixpointInfo {
            map: BTreeMap::new(),
            is_bottom: true,
        }
    }

    /// Returns whether this is the bottom element.
    pub fn is_bottom(&self) -> bool {
        self.is_bottom
    }

    /// The value stored under the given key, if any.
    pub fn get(&self, key: &str) -> Option<&InfoValue> {
        self.map.get(key)
    }

    /// The value stored under the given key, downcast to a concrete type.
    pub fn get_as<T: Any>(&self, key: &str) -> Option<&T> {
        self.get(key).and_then(|value| value.downcast_ref::<T>())
    }

    /// Map the given key to the given value, discarding any previous
    /// mapping (strong update).
    pub fn put(&self, key: impl ToString, value: InfoValue) -> FixpointInfo {
        let mut map = self.map.clone();
        map.insert(key.to_string(), value);
        FixpointInfo {
            map,
            is_bottom: false,
        }
    }

    /// Map the given key to the join of the given value and the previous
    /// mapping, if any (weak update).
    pub fn put_weak(&self, key: impl ToString, value: InfoValue) -> FixpointInfo {
        let key = key.to_string();
        let joined = match self.map.get(&key) {
            Some(existing) => InfoValue(Arc::from(existing.element().dyn_lub(value.element()))),
            None => value,
        };
        self.put(key, joined)
    }

    fn pointwise(
        &self,
        other: &FixpointInfo,
        combine: impl Fn(&dyn InfoElement, &dyn InfoElement) -> Box<dyn InfoElement>,
    ) -> FixpointInfo {
        let mut map = self.map.clone();
        for (key, right) in &other.map {
            match map.remove(key) {
                Some(left) => {
                    map.insert(
                        key.clone(),
                        InfoValue(Arc::from(combine(left.element(), right.element()))),
                    );
                }
                None => {
                    map.insert(key.clone(), right.clone());
                }
            }
        }
        FixpointInfo {
            map,
            is_bottom: false,
        }
    }

    /// Pointwise join; keys present on one side only keep their value.
    pub fn lub(&self, other: &FixpointInfo) -> FixpointInfo {
        if self.is_bottom {
            return other.clone();
        }
        if other.is_bottom {
            return self.clone();
        }
        self.pointwise(other, |left, right| left.dyn_lub(right))
    }

    /// Pointwise meet on the common keys.
    pub fn glb(&self, other: &FixpointInfo) -> FixpointInfo {
        if self.is_bottom || other.is_bottom {
            return FixpointInfo::bottom();
        }
        let map = self
            .map
            .iter()
            .filter_map(|(key, left)| {
                other.map.get(key).map(|right| {
                    (
                        key.clone(),
                        InfoValue(Arc::from(left.element().dyn_glb(right.element()))),
                    )
                })
            })
            .collect();
        FixpointInfo {
            map,
            is_bottom: false,
        }
    }

    /// Pointwise widening.
    pub fn widening(&self, other: &FixpointInfo) -> FixpointInfo {
        if self.is_bottom {
            return other.clone();
        }
        if other.is_bottom {
            return self.clone();
        }
        self.pointwise(other, |left, right| left.dyn_widening(right))
    }

    /// Pointwise narrowing on the common keys.
    pub fn narrowing(&self, other: &FixpointInfo) -> FixpointInfo {
        if self.is_bottom || other.is_bottom {
            return FixpointInfo::bottom();
        }
        let map = self
            .map
            .iter()
            .filter_map(|(key, left)| {
                other.map.get(key).map(|right| {
                    (
                        key.clone(),
                        InfoValue(Arc::from(left.element().dyn_narrowing(right.element()))),
                    )
                })
            })
            .collect();
        FixpointInfo {
            map,
            is_bottom: false,
        }
    }

    /// Pointwise order; keys absent from a map are implicitly bottom.
    pub fn less_or_equal(&self, other: &FixpointInfo) -> bool {
        if self.is_bottom {
            return true;
        }
        if other.is_bottom {
            return false;
        }
        self.map.iter().all(|(key, left)| match other.map.get(key) {
            Some(right) => left.element().dyn_less_or_equal(right.element()),
            None => left.element().dyn_is_bottom(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstract_domain::Sign;

    #[test]
    fn strong_store_replaces() {
        let info = FixpointInfo::new()
            .put("sign", InfoValue::new(Sign::Positive))
            .put("sign", InfoValue::new(Sign::Negative));
        assert_eq!(info.get_as::<Sign>("sign"), Some(&Sign::Negative));
    }

    #[test]
    fn weak_store_joins() {
        let info = FixpointInfo::new()
            .put("sign", InfoValue::new(Sign::Positive))
            .put_weak("sign", InfoValue::new(Sign::Negative));
        assert_eq!(info.get_as::<Sign>("sign"), Some(&Sign::Top));
    }

    #[test]
    fn bottom_values_are_kept() {
        let info = FixpointInfo::new().put("sign", InfoValue::new(Sign::Bottom));
        assert_eq!(info.get_as::<Sign>("sign"), Some(&Sign::Bottom));
        assert!(info.less_or_equal(&FixpointInfo::new().put("sign", InfoValue::new(Sign::Zero))));
    }

    #[test]
    fn lub_is_pointwise() {
        let left = FixpointInfo::new().put("a", InfoValue::new(Sign::Positive));
        let right = FixpointInfo::new().put("b", InfoValue::new(Sign::Zero));
        let joined = left.lub(&right);
        assert_eq!(joined.get_as::<Sign>("a"), Some(&Sign::Positive));
        assert_eq!(joined.get_as::<Sign>("b"), Some(&Sign::Zero));
    }
}
