//! The constant-propagation domain.

use super::Lattice;
use crate::analysis::{NonRelationalValue, Satisfiability};
use crate::intermediate_representation::{BinaryOperator, Constant, UnaryOperator};
use crate::prelude::*;

/// A flat lattice of literal values: either nothing is known about a
/// value, or it is exactly one constant, or the value is unreachable.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum ConstantDomain {
    /// Any value.
    Top,
    /// Exactly the contained constant.
    Value(Constant),
    /// No value.
    Bottom,
}

impl ConstantDomain {
    /// The contained integer, if the element is an integer constant.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConstantDomain::Value(Constant::Int(value)) => Some(*value),
            _ => None,
        }
    }

    /// The contained boolean, if the element is a boolean constant.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstantDomain::Value(Constant::Bool(value)) => Some(*value),
            _ => None,
        }
    }
}

impl Lattice for ConstantDomain {
    fn top(&self) -> Self {
        ConstantDomain::Top
    }

    fn bottom(&self) -> Self {
        ConstantDomain::Bottom
    }

    fn is_top(&self) -> bool {
        matches!(self, ConstantDomain::Top)
    }

    fn is_bottom(&self) -> bool {
        matches!(self, ConstantDomain::Bottom)
    }

    fn less_or_equal(&self, other: &Self) -> bool {
        self == other || self.is_bottom() || other.is_top()
    }

    fn lub(&self, other: &Self) -> Self {
        if self == other || other.is_bottom() {
            self.clone()
        } else if self.is_bottom() {
            other.clone()
        } else {
            ConstantDomain::Top
        }
    }

    fn glb(&self, other: &Self) -> Self {
        if self == other || other.is_top() {
            self.clone()
        } else if self.is_top() {
            other.clone()
        } else {
            ConstantDomain::Bottom
        }
    }
}

impl NonRelationalValue for ConstantDomain {
    fn top_element() -> Self {
        ConstantDomain::Top
    }

    fn bottom_element() -> Self {
        ConstantDomain::Bottom
    }

    fn eval_constant(constant: &Constant) -> Self {
        ConstantDomain::Value(constant.clone())
    }

    fn eval_unary(op: UnaryOperator, arg: &Self) -> Self {
        if arg.is_bottom() {
            return ConstantDomain::Bottom;
        }
        match (op, arg) {
            (UnaryOperator::Negation, ConstantDomain::Value(Constant::Int(value))) => value
                .checked_neg()
                .map(|negated| ConstantDomain::Value(Constant::Int(negated)))
                .unwrap_or(ConstantDomain::Top),
            (UnaryOperator::LogicalNot, ConstantDomain::Value(Constant::Bool(value))) => {
                ConstantDomain::Value(Constant::Bool(!value))
            }
            _ => ConstantDomain::Top,
        }
    }

    fn eval_binary(op: BinaryOperator, left: &Self, right: &Self) -> Self {
        use BinaryOperator::*;
        if left.is_bottom() || right.is_bottom() {
            return ConstantDomain::Bottom;
        }
        if let (Some(l), Some(r)) = (left.as_int(), right.as_int()) {
            let computed = match op {
                Add => l.checked_add(r),
                Sub => l.checked_sub(r),
                Mul => l.checked_mul(r),
                Div => l.checked_div(r),
                Rem => l.checked_rem(r),
                Eq => return ConstantDomain::Value(Constant::Bool(l == r)),
                Ne => return ConstantDomain::Value(Constant::Bool(l != r)),
                Lt => return ConstantDomain::Value(Constant::Bool(l < r)),
                Le => return ConstantDomain::Value(Constant::Bool(l <= r)),
                Gt => return ConstantDomain::Value(Constant::Bool(l > r)),
                Ge => return ConstantDomain::Value(Constant::Bool(l >= r)),
                _ => None,
            };
            return computed
                .map(|value| ConstantDomain::Value(Constant::Int(value)))
                .unwrap_or(ConstantDomain::Top);
        }
        if let (Some(l), Some(r)) = (left.as_bool(), right.as_bool()) {
            return match op {
                And => ConstantDomain::Value(Constant::Bool(l && r)),
                Or => ConstantDomain::Value(Constant::Bool(l || r)),
                Eq => ConstantDomain::Value(Constant::Bool(l == r)),
                Ne => ConstantDomain::Value(Constant::Bool(l != r)),
                _ => ConstantDomain::Top,
            };
        }
        if let (
            ConstantDomain::Value(Constant::Str(l)),
            ConstantDomain::Value(Constant::Str(r)),
        ) = (left, right)
        {
            return match op {
                StrConcat => ConstantDomain::Value(Constant::Str(format!("{l}{r}"))),
                Eq => ConstantDomain::Value(Constant::Bool(l == r)),
                Ne => ConstantDomain::Value(Constant::Bool(l != r)),
                _ => ConstantDomain::Top,
            };
        }
        ConstantDomain::Top
    }

    fn satisfies_binary(op: BinaryOperator, left: &Self, right: &Self) -> Satisfiability {
        match Self::eval_binary(op, left, right) {
            ConstantDomain::Value(Constant::Bool(true)) => Satisfiability::Satisfied,
            ConstantDomain::Value(Constant::Bool(false)) => Satisfiability::NotSatisfied,
            _ => Satisfiability::Unknown,
        }
    }

    fn refine_comparison(op: BinaryOperator, left: &Self, right: &Self) -> (Self, Self) {
        match op {
            BinaryOperator::Eq => (left.glb(right), left.glb(right)),
            _ => (left.clone(), right.clone()),
        }
    }
}

impl std::fmt::Display for ConstantDomain {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ConstantDomain::Top => write!(formatter, "TOP"),
            ConstantDomain::Value(constant) => write!(formatter, "{constant}"),
            ConstantDomain::Bottom => write!(formatter, "BOTTOM"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(value: i64) -> ConstantDomain {
        ConstantDomain::Value(Constant::Int(value))
    }

    #[test]
    fn lattice_laws() {
        let samples = [
            ConstantDomain::Top,
            ConstantDomain::Bottom,
            int(0),
            int(3),
            int(-7),
            ConstantDomain::Value(Constant::Bool(true)),
        ];
        crate::abstract_domain::tests::assert_lattice_laws(&samples);
    }

    #[test]
    fn arithmetic_folds() {
        assert_eq!(
            ConstantDomain::eval_binary(BinaryOperator::Add, &int(3), &int(4)),
            int(7)
        );
        assert_eq!(
            ConstantDomain::eval_binary(BinaryOperator::Mul, &int(7), &int(2)),
            int(14)
        );
        assert_eq!(
            ConstantDomain::eval_binary(BinaryOperator::Div, &int(1), &int(0)),
            ConstantDomain::Top
        );
        assert_eq!(
            ConstantDomain::eval_binary(BinaryOperator::Add, &int(3), &ConstantDomain::Top),
            ConstantDomain::Top
        );
    }

    #[test]
    fn comparison_satisfiability() {
        assert_eq!(
            ConstantDomain::satisfies_binary(BinaryOperator::Lt, &int(1), &int(2)),
            Satisfiability::Satisfied
        );
        assert_eq!(
            ConstantDomain::satisfies_binary(BinaryOperator::Eq, &int(1), &int(2)),
            Satisfiability::NotSatisfied
        );
        assert_eq!(
            ConstantDomain::satisfies_binary(BinaryOperator::Lt, &ConstantDomain::Top, &int(2)),
            Satisfiability::Unknown
        );
    }
}
