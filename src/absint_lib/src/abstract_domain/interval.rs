//! An abstract domain representing values in an interval range.
//!
//! Bounds are mathematical integers extended with infinities. The classic
//! widening jumps unstable bounds to infinity, and the narrowing pulls
//! infinite bounds back to the refined value.

use super::Lattice;
use crate::analysis::{NonRelationalValue, Satisfiability};
use crate::intermediate_representation::{BinaryOperator, Constant, UnaryOperator};
use crate::prelude::*;

/// An interval endpoint.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Bound {
    /// Negative infinity.
    NegInf,
    /// A finite endpoint.
    Int(i64),
    /// Positive infinity.
    PosInf,
}

impl Bound {
    fn as_int(&self) -> Option<i64> {
        match self {
            Bound::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Addition over extended integers. Saturates on overflow; adding
    /// opposite infinities never occurs for well-formed endpoint pairs.
    fn add(&self, other: &Bound) -> Bound {
        match (self, other) {
            (Bound::NegInf, _) | (_, Bound::NegInf) => Bound::NegInf,
            (Bound::PosInf, _) | (_, Bound::PosInf) => Bound::PosInf,
            (Bound::Int(l), Bound::Int(r)) => match l.checked_add(*r) {
                Some(value) => Bound::Int(value),
                None if *l > 0 => Bound::PosInf,
                None => Bound::NegInf,
            },
        }
    }

    /// Multiplication over extended integers, with `0 * ±∞ = 0`.
    fn mul(&self, other: &Bound) -> Bound {
        match (self, other) {
            (Bound::Int(0), _) | (_, Bound::Int(0)) => Bound::Int(0),
            (Bound::Int(l), Bound::Int(r)) => match l.checked_mul(*r) {
                Some(value) => Bound::Int(value),
                None if (*l > 0) == (*r > 0) => Bound::PosInf,
                None => Bound::NegInf,
            },
            (left, right) => {
                let left_positive = matches!(left, Bound::PosInf) || left.as_int().is_some_and(|v| v > 0);
                let right_positive =
                    matches!(right, Bound::PosInf) || right.as_int().is_some_and(|v| v > 0);
                if left_positive == right_positive {
                    Bound::PosInf
                } else {
                    Bound::NegInf
                }
            }
        }
    }

    fn negate(&self) -> Bound {
        match self {
            Bound::NegInf => Bound::PosInf,
            Bound::PosInf => Bound::NegInf,
            Bound::Int(value) => match value.checked_neg() {
                Some(negated) => Bound::Int(negated),
                None => Bound::PosInf,
            },
        }
    }
}

impl PartialOrd for Bound {
    fn partial_cmp(&self, other: &Bound) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Bound {
    fn cmp(&self, other: &Bound) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (Bound::NegInf, Bound::NegInf) | (Bound::PosInf, Bound::PosInf) => Ordering::Equal,
            (Bound::NegInf, _) | (_, Bound::PosInf) => Ordering::Less,
            (Bound::PosInf, _) | (_, Bound::NegInf) => Ordering::Greater,
            (Bound::Int(l), Bound::Int(r)) => l.cmp(r),
        }
    }
}

impl std::fmt::Display for Bound {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Bound::NegInf => write!(formatter, "-inf"),
            Bound::Int(value) => write!(formatter, "{value}"),
            Bound::PosInf => write!(formatter, "+inf"),
        }
    }
}

/// The interval domain.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum IntervalDomain {
    /// No value.
    Bottom,
    /// All values between the two bounds, inclusive. Invariant:
    /// `low <= high`.
    Range {
        /// The lower endpoint.
        low: Bound,
        /// The upper endpoint.
        high: Bound,
    },
}

impl IntervalDomain {
    /// The interval `[low, high]`. Returns bottom if `low > high`.
    pub fn range(low: Bound, high: Bound) -> IntervalDomain {
        if low > high {
            IntervalDomain::Bottom
        } else {
            IntervalDomain::Range { low, high }
        }
    }

    /// The singleton interval `[value, value]`.
    pub fn singleton(value: i64) -> IntervalDomain {
        IntervalDomain::range(Bound::Int(value), Bound::Int(value))
    }

    /// The unbounded interval.
    pub fn unbounded() -> IntervalDomain {
        IntervalDomain::Range {
            low: Bound::NegInf,
            high: Bound::PosInf,
        }
    }

    /// The endpoints, if the interval is non-empty.
    pub fn bounds(&self) -> Option<(Bound, Bound)> {
        match self {
            IntervalDomain::Bottom => None,
            IntervalDomain::Range { low, high } => Some((*low, *high)),
        }
    }
}

impl Lattice for IntervalDomain {
    fn top(&self) -> Self {
        IntervalDomain::unbounded()
    }

    fn bottom(&self) -> Self {
        IntervalDomain::Bottom
    }

    fn is_top(&self) -> bool {
        matches!(
            self,
            IntervalDomain::Range {
                low: Bound::NegInf,
                high: Bound::PosInf
            }
        )
    }

    fn is_bottom(&self) -> bool {
        matches!(self, IntervalDomain::Bottom)
    }

    fn less_or_equal(&self, other: &Self) -> bool {
        match (self.bounds(), other.bounds()) {
            (None, _) => true,
            (_, None) => false,
            (Some((l1, h1)), Some((l2, h2))) => l2 <= l1 && h1 <= h2,
        }
    }

    fn lub(&self, other: &Self) -> Self {
        match (self.bounds(), other.bounds()) {
            (None, _) => *other,
            (_, None) => *self,
            (Some((l1, h1)), Some((l2, h2))) => IntervalDomain::Range {
                low: l1.min(l2),
                high: h1.max(h2),
            },
        }
    }

    fn glb(&self, other: &Self) -> Self {
        match (self.bounds(), other.bounds()) {
            (None, _) | (_, None) => IntervalDomain::Bottom,
            (Some((l1, h1)), Some((l2, h2))) => IntervalDomain::range(l1.max(l2), h1.min(h2)),
        }
    }

    fn widening(&self, other: &Self) -> Self {
        match (self.bounds(), other.bounds()) {
            (None, _) => *other,
            (_, None) => *self,
            (Some((l1, h1)), Some((l2, h2))) => IntervalDomain::Range {
                low: if l2 < l1 { Bound::NegInf } else { l1 },
                high: if h2 > h1 { Bound::PosInf } else { h1 },
            },
        }
    }

    fn narrowing(&self, other: &Self) -> Self {
        match (self.bounds(), other.bounds()) {
            (None, _) | (_, None) => IntervalDomain::Bottom,
            (Some((l1, h1)), Some((l2, h2))) => IntervalDomain::range(
                if l1 == Bound::NegInf { l2 } else { l1 },
                if h1 == Bound::PosInf { h2 } else { h1 },
            ),
        }
    }
}

impl NonRelationalValue for IntervalDomain {
    fn top_element() -> Self {
        IntervalDomain::unbounded()
    }

    fn bottom_element() -> Self {
        IntervalDomain::Bottom
    }

    fn eval_constant(constant: &Constant) -> Self {
        match constant {
            Constant::Int(value) => IntervalDomain::singleton(*value),
            _ => IntervalDomain::unbounded(),
        }
    }

    fn eval_unary(op: UnaryOperator, arg: &Self) -> Self {
        match (op, arg.bounds()) {
            (_, None) => IntervalDomain::Bottom,
            (UnaryOperator::Negation, Some((low, high))) => {
                IntervalDomain::range(high.negate(), low.negate())
            }
            (UnaryOperator::LogicalNot, Some(_)) => IntervalDomain::unbounded(),
        }
    }

    fn eval_binary(op: BinaryOperator, left: &Self, right: &Self) -> Self {
        use BinaryOperator::*;
        let (Some((l1, h1)), Some((l2, h2))) = (left.bounds(), right.bounds()) else {
            return IntervalDomain::Bottom;
        };
        match op {
            Add => IntervalDomain::range(l1.add(&l2), h1.add(&h2)),
            Sub => IntervalDomain::range(l1.add(&h2.negate()), h1.add(&l2.negate())),
            Mul => {
                let products = [l1.mul(&l2), l1.mul(&h2), h1.mul(&l2), h1.mul(&h2)];
                IntervalDomain::range(
                    *products.iter().min().expect("products are non-empty"),
                    *products.iter().max().expect("products are non-empty"),
                )
            }
            Div => {
                // keep only the easy precise case: division by a constant
                // away from zero
                match (l2.as_int(), h2.as_int()) {
                    (Some(divisor_low), Some(divisor_high))
                        if divisor_low == divisor_high && divisor_low != 0 =>
                    {
                        let divide = |bound: Bound| match bound {
                            Bound::Int(value) => Bound::Int(value / divisor_low),
                            infinite if divisor_low > 0 => infinite,
                            Bound::NegInf => Bound::PosInf,
                            Bound::PosInf => Bound::NegInf,
                        };
                        let quotients = [divide(l1), divide(h1)];
                        IntervalDomain::range(
                            *quotients.iter().min().expect("quotients are non-empty"),
                            *quotients.iter().max().expect("quotients are non-empty"),
                        )
                    }
                    _ => IntervalDomain::unbounded(),
                }
            }
            _ => IntervalDomain::unbounded(),
        }
    }

    fn satisfies_binary(op: BinaryOperator, left: &Self, right: &Self) -> Satisfiability {
        use BinaryOperator::*;
        let (Some((l1, h1)), Some((l2, h2))) = (left.bounds(), right.bounds()) else {
            return Satisfiability::Unknown;
        };
        match op {
            Lt => {
                if h1 < l2 {
                    Satisfiability::Satisfied
                } else if l1 >= h2 {
                    Satisfiability::NotSatisfied
                } else {
                    Satisfiability::Unknown
                }
            }
            Le => {
                if h1 <= l2 {
                    Satisfiability::Satisfied
                } else if l1 > h2 {
                    Satisfiability::NotSatisfied
                } else {
                    Satisfiability::Unknown
                }
            }
            Gt => Self::satisfies_binary(Lt, right, left),
            Ge => Self::satisfies_binary(Le, right, left),
            Eq => {
                if l1 == h1 && (l1, h1) == (l2, h2) {
                    Satisfiability::Satisfied
                } else if left.glb(right).is_bottom() {
                    Satisfiability::NotSatisfied
                } else {
                    Satisfiability::Unknown
                }
            }
            Ne => Self::satisfies_binary(Eq, left, right).negate(),
            _ => Satisfiability::Unknown,
        }
    }

    fn refine_comparison(op: BinaryOperator, left: &Self, right: &Self) -> (Self, Self) {
        use BinaryOperator::*;
        let (Some((l1, h1)), Some((l2, h2))) = (left.bounds(), right.bounds()) else {
            return (IntervalDomain::Bottom, IntervalDomain::Bottom);
        };
        let decrement = |bound: Bound| match bound {
            Bound::Int(value) => Bound::Int(value.saturating_sub(1)),
            infinite => infinite,
        };
        let increment = |bound: Bound| match bound {
            Bound::Int(value) => Bound::Int(value.saturating_add(1)),
            infinite => infinite,
        };
        match op {
            Lt => (
                left.glb(&IntervalDomain::range(Bound::NegInf, decrement(h2))),
                right.glb(&IntervalDomain::range(increment(l1), Bound::PosInf)),
            ),
            Le => (
                left.glb(&IntervalDomain::range(Bound::NegInf, h2)),
                right.glb(&IntervalDomain::range(l1, Bound::PosInf)),
            ),
            Gt => {
                let (right_refined, left_refined) = Self::refine_comparison(Lt, right, left);
                (left_refined, right_refined)
            }
            Ge => {
                let (right_refined, left_refined) = Self::refine_comparison(Le, right, left);
                (left_refined, right_refined)
            }
            Eq => (left.glb(right), left.glb(right)),
            Ne => {
                // only singleton equality can be refuted
                if l1 == h1 && (l1, h1) == (l2, h2) {
                    (IntervalDomain::Bottom, IntervalDomain::Bottom)
                } else {
                    (*left, *right)
                }
            }
            _ => (*left, *right),
        }
    }
}

impl std::fmt::Display for IntervalDomain {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            IntervalDomain::Bottom => write!(formatter, "BOTTOM"),
            IntervalDomain::Range { low, high } => write!(formatter, "[{low}, {high}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(low: i64, high: i64) -> IntervalDomain {
        IntervalDomain::range(Bound::Int(low), Bound::Int(high))
    }

    #[test]
    fn lattice_laws() {
        let samples = [
            IntervalDomain::Bottom,
            IntervalDomain::unbounded(),
            interval(0, 0),
            interval(-3, 5),
            interval(1, 1),
            IntervalDomain::range(Bound::Int(1), Bound::PosInf),
            IntervalDomain::range(Bound::NegInf, Bound::Int(7)),
        ];
        crate::abstract_domain::tests::assert_lattice_laws(&samples);
    }

    #[test]
    fn widening_stabilizes_ascending_chains() {
        let chain: Vec<IntervalDomain> = (0..100).map(|i| interval(0, i)).collect();
        crate::abstract_domain::tests::assert_widening_stabilizes(&chain, 3);
    }

    #[test]
    fn narrowing_refines_infinite_bounds() {
        let widened = IntervalDomain::range(Bound::Int(0), Bound::PosInf);
        let refined = interval(0, 999);
        assert_eq!(widened.narrowing(&refined), refined);
        // finite bounds are kept
        assert_eq!(interval(0, 10).narrowing(&interval(2, 8)), interval(0, 10));
    }

    #[test]
    fn arithmetic() {
        use BinaryOperator::*;
        assert_eq!(
            IntervalDomain::eval_binary(Add, &interval(1, 2), &interval(10, 20)),
            interval(11, 22)
        );
        assert_eq!(
            IntervalDomain::eval_binary(Mul, &interval(-2, 3), &interval(4, 5)),
            interval(-10, 15)
        );
        assert_eq!(
            IntervalDomain::eval_binary(
                Mul,
                &IntervalDomain::range(Bound::Int(1), Bound::PosInf),
                &interval(1, 1)
            ),
            IntervalDomain::range(Bound::Int(1), Bound::PosInf)
        );
        assert_eq!(
            IntervalDomain::eval_unary(UnaryOperator::Negation, &interval(1, 5)),
            interval(-5, -1)
        );
    }

    #[test]
    fn refinement() {
        let (left, _) = IntervalDomain::refine_comparison(
            BinaryOperator::Lt,
            &IntervalDomain::unbounded(),
            &interval(1000, 1000),
        );
        assert_eq!(left, IntervalDomain::range(Bound::NegInf, Bound::Int(999)));
        let (left, _) = IntervalDomain::refine_comparison(
            BinaryOperator::Gt,
            &IntervalDomain::unbounded(),
            &interval(0, 0),
        );
        assert_eq!(left, IntervalDomain::range(Bound::Int(1), Bound::PosInf));
    }
}
