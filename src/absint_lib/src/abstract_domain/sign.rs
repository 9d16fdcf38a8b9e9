//! The sign domain over mathematical integers.

use super::Lattice;
use crate::analysis::{NonRelationalValue, Satisfiability};
use crate::intermediate_representation::{BinaryOperator, Constant, UnaryOperator};
use crate::prelude::*;

/// The classic five-element sign lattice.
///
/// Non-integer values are abstracted to `Top`.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum Sign {
    /// Any value.
    Top,
    /// A strictly positive integer.
    Positive,
    /// A strictly negative integer.
    Negative,
    /// The integer zero.
    Zero,
    /// No value.
    Bottom,
}

impl Sign {
    fn of(value: i64) -> Sign {
        match value {
            0 => Sign::Zero,
            v if v > 0 => Sign::Positive,
            _ => Sign::Negative,
        }
    }

    fn flip(&self) -> Sign {
        match self {
            Sign::Positive => Sign::Negative,
            Sign::Negative => Sign::Positive,
            other => *other,
        }
    }
}

impl Lattice for Sign {
    fn top(&self) -> Self {
        Sign::Top
    }

    fn bottom(&self) -> Self {
        Sign::Bottom
    }

    fn is_top(&self) -> bool {
        matches!(self, Sign::Top)
    }

    fn is_bottom(&self) -> bool {
        matches!(self, Sign::Bottom)
    }

    fn less_or_equal(&self, other: &Self) -> bool {
        self == other || matches!(self, Sign::Bottom) || matches!(other, Sign::Top)
    }

    fn lub(&self, other: &Self) -> Self {
        if self == other || other.is_bottom() {
            *self
        } else if self.is_bottom() {
            *other
        } else {
            Sign::Top
        }
    }

    fn glb(&self, other: &Self) -> Self {
        if self == other || other.is_top() {
            *self
        } else if self.is_top() {
            *other
        } else {
            Sign::Bottom
        }
    }
}

impl NonRelationalValue for Sign {
    fn top_element() -> Self {
        Sign::Top
    }

    fn bottom_element() -> Self {
        Sign::Bottom
    }

    fn eval_constant(constant: &Constant) -> Self {
        match constant {
            Constant::Int(value) => Sign::of(*value),
            _ => Sign::Top,
        }
    }

    fn eval_unary(op: UnaryOperator, arg: &Self) -> Self {
        if arg.is_bottom() {
            return Sign::Bottom;
        }
        match op {
            UnaryOperator::Negation => arg.flip(),
            UnaryOperator::LogicalNot => Sign::Top,
        }
    }

    fn eval_binary(op: BinaryOperator, left: &Self, right: &Self) -> Self {
        use BinaryOperator::*;
        use Sign::*;
        if left.is_bottom() || right.is_bottom() {
            return Bottom;
        }
        match op {
            Add => match (left, right) {
                (Zero, other) | (other, Zero) => *other,
                (Positive, Positive) => Positive,
                (Negative, Negative) => Negative,
                _ => Top,
            },
            Sub => Self::eval_binary(Add, left, &right.flip()),
            Mul => match (left, right) {
                (Zero, _) | (_, Zero) => Zero,
                (Top, _) | (_, Top) => Top,
                (l, r) if l == r => Positive,
                _ => Negative,
            },
            Div => match (left, right) {
                // division by zero yields no integer; any sound
                // over-approximation must include the error case
                (_, Zero) => Top,
                // integer division truncates towards zero
                (Zero, _) => Zero,
                (Top, _) | (_, Top) => Top,
                _ => Top,
            },
            Rem => Top,
            _ => Top,
        }
    }

    fn satisfies_binary(op: BinaryOperator, left: &Self, right: &Self) -> Satisfiability {
        use BinaryOperator::*;
        use Sign::*;
        if left.is_bottom() || right.is_bottom() {
            return Satisfiability::Unknown;
        }
        match op {
            Eq => match (left, right) {
                (Zero, Zero) => Satisfiability::Satisfied,
                (Positive, Negative)
                | (Negative, Positive)
                | (Zero, Positive)
                | (Positive, Zero)
                | (Zero, Negative)
                | (Negative, Zero) => Satisfiability::NotSatisfied,
                _ => Satisfiability::Unknown,
            },
            Ne => Self::satisfies_binary(Eq, left, right).negate(),
            Lt => match (left, right) {
                (Negative, Zero) | (Negative, Positive) | (Zero, Positive) => {
                    Satisfiability::Satisfied
                }
                (Zero, Zero) | (Positive, Zero) | (Positive, Negative) | (Zero, Negative) => {
                    Satisfiability::NotSatisfied
                }
                _ => Satisfiability::Unknown,
            },
            Ge => Self::satisfies_binary(Lt, left, right).negate(),
            Gt => Self::satisfies_binary(Lt, right, left),
            Le => Self::satisfies_binary(Lt, right, left).negate(),
            _ => Satisfiability::Unknown,
        }
    }

    fn refine_comparison(op: BinaryOperator, left: &Self, right: &Self) -> (Self, Self) {
        use BinaryOperator::*;
        use Sign::*;
        match op {
            Eq => (left.glb(right), left.glb(right)),
            Lt | Le => {
                let refined_left = match right {
                    // anything below a non-positive value is negative
                    Negative => left.glb(&Negative),
                    Zero if op == Lt => left.glb(&Negative),
                    _ => *left,
                };
                let refined_right = match left {
                    Positive => right.glb(&Positive),
                    Zero if op == Lt => right.glb(&Positive),
                    _ => *right,
                };
                (refined_left, refined_right)
            }
            Gt | Ge => {
                let (right_refined, left_refined) = Self::refine_comparison(
                    if op == Gt { Lt } else { Le },
                    right,
                    left,
                );
                (left_refined, right_refined)
            }
            _ => (*left, *right),
        }
    }
}

impl std::fmt::Display for Sign {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Sign::Top => write!(formatter, "TOP"),
            Sign::Positive => write!(formatter, "positive"),
            Sign::Negative => write!(formatter, "negative"),
            Sign::Zero => write!(formatter, "zero"),
            Sign::Bottom => write!(formatter, "BOTTOM"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Sign; 5] = [
        Sign::Top,
        Sign::Positive,
        Sign::Negative,
        Sign::Zero,
        Sign::Bottom,
    ];

    #[test]
    fn lattice_laws() {
        crate::abstract_domain::tests::assert_lattice_laws(&ALL);
    }

    #[test]
    fn arithmetic() {
        use BinaryOperator::*;
        assert_eq!(
            Sign::eval_binary(Add, &Sign::Positive, &Sign::Positive),
            Sign::Positive
        );
        assert_eq!(
            Sign::eval_binary(Add, &Sign::Positive, &Sign::Negative),
            Sign::Top
        );
        assert_eq!(
            Sign::eval_binary(Mul, &Sign::Negative, &Sign::Negative),
            Sign::Positive
        );
        assert_eq!(
            Sign::eval_binary(Mul, &Sign::Zero, &Sign::Top),
            Sign::Zero
        );
        assert_eq!(
            Sign::eval_unary(UnaryOperator::Negation, &Sign::Positive),
            Sign::Negative
        );
    }

    #[test]
    fn comparisons() {
        assert_eq!(
            Sign::satisfies_binary(BinaryOperator::Lt, &Sign::Negative, &Sign::Positive),
            Satisfiability::Satisfied
        );
        assert_eq!(
            Sign::satisfies_binary(BinaryOperator::Lt, &Sign::Positive, &Sign::Zero),
            Satisfiability::NotSatisfied
        );
        assert_eq!(
            Sign::satisfies_binary(BinaryOperator::Lt, &Sign::Top, &Sign::Zero),
            Satisfiability::Unknown
        );
    }

    #[test]
    fn refinement() {
        let (left, _) = Sign::refine_comparison(BinaryOperator::Gt, &Sign::Top, &Sign::Zero);
        assert_eq!(left, Sign::Positive);
        let (left, _) = Sign::refine_comparison(BinaryOperator::Lt, &Sign::Top, &Sign::Zero);
        assert_eq!(left, Sign::Negative);
    }
}
