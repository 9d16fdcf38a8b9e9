//! This module defines traits describing general properties of abstract
//! domains as well as several abstract domain types implementing these
//! traits.

mod constant;
pub use constant::*;

mod environment;
pub use environment::*;

mod info;
pub use info::*;

mod interval;
pub use interval::*;

mod powerset;
pub use powerset::*;

mod reaching_definitions;
pub use reaching_definitions::*;

mod sign;
pub use sign::*;

/// The main trait describing an abstract domain element.
///
/// Each element belongs to a partially ordered family with a greatest and
/// a least element. Since a domain type may represent a whole family of
/// abstract domains, `top` and `bottom` take an instance of the domain as
/// receiver, so they can return the extremal elements of the same family
/// member the receiver belongs to.
///
/// All operations are total on ordinary values and must return fresh
/// elements. `widening` must guarantee termination of ascending chains;
/// the default implementation falls back to `lub`, which is only adequate
/// for domains of finite height.
pub trait Lattice: Sized + Eq + Clone + std::fmt::Debug {
    /// The greatest element of the family of `self`.
    fn top(&self) -> Self;

    /// The least element of the family of `self`.
    fn bottom(&self) -> Self;

    /// Returns whether this is the greatest element.
    fn is_top(&self) -> bool;

    /// Returns whether this is the least element. Bottom represents
    /// unreachability and must never be used to signal an error.
    fn is_bottom(&self) -> bool;

    /// The partial order of the domain. Consistent with equality:
    /// `a.less_or_equal(b) && b.less_or_equal(a)` holds exactly when
    /// `a == b`.
    fn less_or_equal(&self, other: &Self) -> bool;

    /// The least upper bound of `self` and `other`.
    fn lub(&self, other: &Self) -> Self;

    /// The greatest lower bound of `self` and `other`.
    fn glb(&self, other: &Self) -> Self;

    /// An upper bound of `self` and `other` that stabilizes ascending
    /// chains: iterating `a = a.widening(x_i)` over any ascending sequence
    /// `x_i` reaches a fixed element after finitely many steps.
    fn widening(&self, other: &Self) -> Self {
        self.lub(other)
    }

    /// A refinement of `self` towards `other` used in descending
    /// iteration: the result lies between `self.glb(other)` and `self`.
    fn narrowing(&self, other: &Self) -> Self {
        self.glb(other)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// Assert the lattice laws on a finite sample of elements:
    /// reflexivity, antisymmetry, bound properties of lub and glb, and
    /// soundness of widening.
    pub fn assert_lattice_laws<T: Lattice>(samples: &[T]) {
        for x in samples {
            assert!(x.less_or_equal(x), "reflexivity violated by {x:?}");
            assert!(
                x.bottom().less_or_equal(x),
                "bottom is not below {x:?}"
            );
            assert!(x.less_or_equal(&x.top()), "top is not above {x:?}");
        }
        for x in samples {
            for y in samples {
                if x.less_or_equal(y) && y.less_or_equal(x) {
                    assert_eq!(x, y, "antisymmetry violated");
                }
                let join = x.lub(y);
                assert!(x.less_or_equal(&join), "lub not an upper bound of {x:?}");
                assert!(y.less_or_equal(&join), "lub not an upper bound of {y:?}");
                let meet = x.glb(y);
                assert!(meet.less_or_equal(x), "glb not a lower bound of {x:?}");
                assert!(meet.less_or_equal(y), "glb not a lower bound of {y:?}");
                assert!(
                    join.less_or_equal(&x.widening(y)),
                    "widening below lub for {x:?} and {y:?}"
                );
                for z in samples {
                    if x.less_or_equal(z) && y.less_or_equal(z) {
                        assert!(
                            join.less_or_equal(z),
                            "lub of {x:?} and {y:?} is not least"
                        );
                    }
                    if z.less_or_equal(x) && z.less_or_equal(y) {
                        assert!(
                            z.less_or_equal(&meet),
                            "glb of {x:?} and {y:?} is not greatest"
                        );
                    }
                }
            }
        }
    }

    /// Assert that iterated widening stabilizes along the given ascending
    /// chain within the given number of steps.
    pub fn assert_widening_stabilizes<T: Lattice>(chain: &[T], max_steps: usize) {
        let mut accumulator = match chain.first() {
            Some(first) => first.clone(),
            None => return,
        };
        let mut steps = 0;
        for next in chain.iter().skip(1).cycle().take(max_steps * chain.len().max(1)) {
            let widened = accumulator.widening(&accumulator.lub(next));
            if widened == accumulator {
                return;
            }
            accumulator = widened;
            steps += 1;
            assert!(
                steps <= max_steps,
                "widening did not stabilize after {max_steps} steps"
            );
        }
    }
}
