//! Finite powerset lattices with non-redundant element sets.

use super::Lattice;
use crate::intermediate_representation::AllocationSite;
use crate::prelude::*;
use itertools::Itertools;
use std::collections::BTreeSet;
use std::sync::Arc;

/// The subsumption relation between elements of a [`NonRedundantPowerset`].
///
/// An element subsumed by another carries no additional information and is
/// removed from the set when both are present.
pub trait Subsumption: Ord + Clone + std::fmt::Debug {
    /// Returns whether `self` is made redundant by `other`.
    fn subsumed_by(&self, other: &Self) -> bool;
}

/// A powerset lattice whose sets are kept free of redundant elements.
///
/// The order is the Hoare order: a set is below another if each of its
/// elements is subsumed by (or equal to) some element of the other. The
/// join is set union followed by redundancy removal. The empty set is the
/// bottom element; top is tracked with an explicit flag.
///
/// Since the element universe is finite for any given program, widening
/// coincides with the join.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct NonRedundantPowerset<E: Subsumption> {
    elements: Arc<BTreeSet<E>>,
    is_top: bool,
}

impl<E: Subsumption> NonRedundantPowerset<E> {
    /// The empty set.
    pub fn empty() -> NonRedundantPowerset<E> {
        NonRedundantPowerset {
            elements: Arc::new(BTreeSet::new()),
            is_top: false,
        }
    }

    /// The set containing exactly the given element.
    pub fn singleton(element: E) -> NonRedundantPowerset<E> {
        NonRedundantPowerset {
            elements: Arc::new(std::iter::once(element).collect()),
            is_top: false,
        }
    }

    /// The set of all elements.
    pub fn universe() -> NonRedundantPowerset<E> {
        NonRedundantPowerset {
            elements: Arc::new(BTreeSet::new()),
            is_top: true,
        }
    }

    /// Iterate over the contained elements.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.elements.iter()
    }

    /// The number of contained elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns whether the set contains no elements.
    pub fn is_empty(&self) -> bool {
        !self.is_top && self.elements.is_empty()
    }

    /// Returns whether some contained element subsumes or equals the given
    /// one.
    pub fn covers(&self, element: &E) -> bool {
        self.is_top
            || self
                .elements
                .iter()
                .any(|candidate| element == candidate || element.subsumed_by(candidate))
    }

    fn normalize(elements: BTreeSet<E>) -> BTreeSet<E> {
        let mut kept = BTreeSet::new();
        for element in &elements {
            let redundant = elements
                .iter()
                .any(|other| other != element && element.subsumed_by(other));
            if !redundant {
                kept.insert(element.clone());
            }
        }
        kept
    }
}

impl<E: Subsumption> FromIterator<E> for NonRedundantPowerset<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> NonRedundantPowerset<E> {
        NonRedundantPowerset {
            elements: Arc::new(Self::normalize(iter.into_iter().collect())),
            is_top: false,
        }
    }
}

impl<E: Subsumption> Lattice for NonRedundantPowerset<E> {
    fn top(&self) -> Self {
        NonRedundantPowerset::universe()
    }

    fn bottom(&self) -> Self {
        NonRedundantPowerset::empty()
    }

    fn is_top(&self) -> bool {
        self.is_top
    }

    fn is_bottom(&self) -> bool {
        self.is_empty()
    }

    fn less_or_equal(&self, other: &Self) -> bool {
        if other.is_top {
            return true;
        }
        if self.is_top {
            return false;
        }
        self.elements.iter().all(|element| other.covers(element))
    }

    fn lub(&self, other: &Self) -> Self {
        if self.is_top || other.is_top {
            return NonRedundantPowerset::universe();
        }
        self.iter().chain(other.iter()).cloned().collect()
    }

    fn glb(&self, other: &Self) -> Self {
        if self.is_top {
            return other.clone();
        }
        if other.is_top {
            return self.clone();
        }
        // pairwise meets: for each pair the more precise element survives
        let mut kept = BTreeSet::new();
        for left in self.iter() {
            for right in other.iter() {
                if left == right || left.subsumed_by(right) {
                    kept.insert(left.clone());
                } else if right.subsumed_by(left) {
                    kept.insert(right.clone());
                }
            }
        }
        kept.into_iter().collect()
    }
}

impl<E: Subsumption + std::fmt::Display> std::fmt::Display for NonRedundantPowerset<E> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.is_top {
            return write!(formatter, "TOP");
        }
        write!(formatter, "{{{}}}", self.elements.iter().join(", "))
    }
}

impl Subsumption for AllocationSite {
    /// A strong site is subsumed by the weak site of the same location:
    /// both abstract objects allocated there, but the weak one covers more
    /// concrete stores.
    fn subsumed_by(&self, other: &AllocationSite) -> bool {
        self.location == other.location && other.weak
    }
}

/// The set of allocation sites an identifier may point to.
pub type AllocationSites = NonRedundantPowerset<AllocationSite>;
