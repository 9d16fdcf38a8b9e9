//! The composite abstract state: heap, value and type domains acting as a
//! single lattice and semantic domain.

use super::{
    AbstractState, HeapDomain, Satisfiability, SemanticDomain, TypeDomain, ValueDomain,
};
use crate::abstract_domain::Lattice;
use crate::error::SemanticError;
use crate::intermediate_representation::{
    ExpressionSet, Identifier, ScopeToken, SymbolicExpression,
};
use crate::prelude::*;

/// The product of a heap domain, a value domain and a type domain.
///
/// Every transition runs on the heap first, since it may rename
/// identifiers; the produced replacements are then threaded into the value
/// and type domains before they interpret the rewritten expressions.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct SimpleAbstractState<H, V, T>
where
    H: HeapDomain,
    V: ValueDomain,
    T: TypeDomain,
{
    /// The heap component.
    pub heap: H,
    /// The value component.
    pub value: V,
    /// The type component.
    pub types: T,
}

impl<H: HeapDomain, V: ValueDomain, T: TypeDomain> SimpleAbstractState<H, V, T> {
    /// Create a composite state from its components.
    pub fn new(heap: H, value: V, types: T) -> SimpleAbstractState<H, V, T> {
        SimpleAbstractState { heap, value, types }
    }

    /// Thread the heap's pending replacements into the value and type
    /// components.
    fn apply_replacements(&self, heap: &H) -> (V, T) {
        let mut value = self.value.clone();
        let mut types = self.types.clone();
        for replacement in heap.substitution() {
            if replacement.is_identity() {
                continue;
            }
            value = value.apply_replacement(replacement);
            types = TypeDomain::apply_replacement(&types, replacement);
        }
        (value, types)
    }
}

impl<H: HeapDomain, V: ValueDomain, T: TypeDomain> Lattice for SimpleAbstractState<H, V, T> {
    fn top(&self) -> Self {
        SimpleAbstractState {
            heap: self.heap.top(),
            value: self.value.top(),
            types: self.types.top(),
        }
    }

    fn bottom(&self) -> Self {
        SimpleAbstractState {
            heap: self.heap.bottom(),
            value: self.value.bottom(),
            types: self.types.bottom(),
        }
    }

    fn is_top(&self) -> bool {
        self.heap.is_top() && self.value.is_top() && self.types.is_top()
    }

    fn is_bottom(&self) -> bool {
        self.heap.is_bottom() && self.value.is_bottom() && self.types.is_bottom()
    }

    fn less_or_equal(&self, other: &Self) -> bool {
        self.heap.less_or_equal(&other.heap)
            && self.value.less_or_equal(&other.value)
            && self.types.less_or_equal(&other.types)
    }

    fn lub(&self, other: &Self) -> Self {
        SimpleAbstractState {
            heap: self.heap.lub(&other.heap),
            value: self.value.lub(&other.value),
            types: self.types.lub(&other.types),
        }
    }

    fn glb(&self, other: &Self) -> Self {
        SimpleAbstractState {
            heap: self.heap.glb(&other.heap),
            value: self.value.glb(&other.value),
            types: self.types.glb(&other.types),
        }
    }

    fn widening(&self, other: &Self) -> Self {
        SimpleAbstractState {
            heap: self.heap.widening(&other.heap),
            value: self.value.widening(&other.value),
            types: self.types.widening(&other.types),
        }
    }

    fn narrowing(&self, other: &Self) -> Self {
        SimpleAbstractState {
            heap: self.heap.narrowing(&other.heap),
            value: self.value.narrowing(&other.value),
            types: self.types.narrowing(&other.types),
        }
    }
}

impl<H: HeapDomain, V: ValueDomain, T: TypeDomain> SemanticDomain
    for SimpleAbstractState<H, V, T>
{
    fn assign(
        &self,
        id: &Identifier,
        expr: &SymbolicExpression,
        pp: &ProgramPoint,
    ) -> Result<Self, SemanticError> {
        let heap = self.heap.assign(id, expr, pp)?;
        let rewritten = heap.rewrite(expr, pp)?;
        let (value, types) = self.apply_replacements(&heap);
        let mut new_value = value.bottom();
        let mut new_types = types.bottom();
        for candidate in rewritten.iter() {
            new_value = new_value.lub(&value.assign(id, candidate, pp)?);
            new_types = new_types.lub(&types.assign(id, candidate, pp)?);
        }
        Ok(SimpleAbstractState {
            heap,
            value: new_value,
            types: new_types,
        })
    }

    fn small_step_semantics(
        &self,
        expr: &SymbolicExpression,
        pp: &ProgramPoint,
    ) -> Result<Self, SemanticError> {
        let heap = self.heap.small_step_semantics(expr, pp)?;
        let rewritten = heap.rewrite(expr, pp)?;
        let (value, types) = self.apply_replacements(&heap);
        let mut new_value = value.bottom();
        let mut new_types = types.bottom();
        for candidate in rewritten.iter() {
            new_value = new_value.lub(&value.small_step_semantics(candidate, pp)?);
            new_types = new_types.lub(&types.small_step_semantics(candidate, pp)?);
        }
        Ok(SimpleAbstractState {
            heap,
            value: new_value,
            types: new_types,
        })
    }

    fn assume(
        &self,
        expr: &SymbolicExpression,
        src: &ProgramPoint,
        dest: &ProgramPoint,
    ) -> Result<Self, SemanticError> {
        let heap = self.heap.assume(expr, src, dest)?;
        let rewritten = heap.rewrite(expr, src)?;
        let (value, types) = self.apply_replacements(&heap);
        let mut new_value = value.bottom();
        let mut new_types = types.bottom();
        for candidate in rewritten.iter() {
            new_value = new_value.lub(&value.assume(candidate, src, dest)?);
            new_types = new_types.lub(&types.assume(candidate, src, dest)?);
        }
        if new_value.is_bottom() {
            return Ok(self.bottom());
        }
        Ok(SimpleAbstractState {
            heap,
            value: new_value,
            types: new_types,
        })
    }

    fn satisfies(
        &self,
        expr: &SymbolicExpression,
        pp: &ProgramPoint,
    ) -> Result<Satisfiability, SemanticError> {
        let heap_verdict = self.heap.satisfies(expr, pp)?;
        let rewritten = self.heap.rewrite(expr, pp)?;
        let mut value_verdict: Option<Satisfiability> = None;
        for candidate in rewritten.iter() {
            let verdict = self.value.satisfies(candidate, pp)?;
            value_verdict = Some(match value_verdict {
                Some(previous) => previous.lub(&verdict),
                None => verdict,
            });
        }
        Ok(match value_verdict {
            Some(verdict) => heap_verdict.glb(&verdict),
            None => heap_verdict,
        })
    }

    fn forget_identifier(&self, id: &Identifier) -> Self {
        SimpleAbstractState {
            heap: self.heap.forget_identifier(id),
            value: self.value.forget_identifier(id),
            types: self.types.forget_identifier(id),
        }
    }

    fn forget_identifiers_if(&self, predicate: &dyn Fn(&Identifier) -> bool) -> Self {
        SimpleAbstractState {
            heap: self.heap.forget_identifiers_if(predicate),
            value: self.value.forget_identifiers_if(predicate),
            types: self.types.forget_identifiers_if(predicate),
        }
    }

    fn push_scope(&self, token: &ScopeToken) -> Result<Self, SemanticError> {
        Ok(SimpleAbstractState {
            heap: self.heap.push_scope(token)?,
            value: self.value.push_scope(token)?,
            types: self.types.push_scope(token)?,
        })
    }

    fn pop_scope(&self, token: &ScopeToken) -> Result<Self, SemanticError> {
        Ok(SimpleAbstractState {
            heap: self.heap.pop_scope(token)?,
            value: self.value.pop_scope(token)?,
            types: self.types.pop_scope(token)?,
        })
    }
}

impl<H: HeapDomain, V: ValueDomain, T: TypeDomain> AbstractState for SimpleAbstractState<H, V, T> {
    fn rewrite(
        &self,
        expr: &SymbolicExpression,
        pp: &ProgramPoint,
    ) -> Result<ExpressionSet, SemanticError> {
        self.heap.rewrite(expr, pp)
    }
}

impl<H, V, T> std::fmt::Display for SimpleAbstractState<H, V, T>
where
    H: HeapDomain + std::fmt::Display,
    V: ValueDomain + std::fmt::Display,
    T: TypeDomain + std::fmt::Display,
{
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            formatter,
            "heap: {} | value: {} | type: {}",
            self.heap, self.value, self.types
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstract_domain::IntervalDomain;
    use crate::analysis::{
        type_environment, value_environment, PointBasedHeap, ValueEnvironment,
    };
    use crate::intermediate_representation::{CodeLocation, TypeSet, Variable};

    use crate::analysis::TypeEnvironment;

    type State =
        SimpleAbstractState<PointBasedHeap, ValueEnvironment<IntervalDomain>, TypeEnvironment>;

    fn state() -> State {
        SimpleAbstractState::new(
            PointBasedHeap::new(),
            value_environment::<IntervalDomain>(),
            type_environment(),
        )
    }

    fn var(name: &str) -> Identifier {
        Identifier::Variable(Variable::new(name, TypeSet::of("int")))
    }

    fn pp(line: u32) -> ProgramPoint {
        ProgramPoint::new("test", CodeLocation::new("test.src", line, 0))
    }

    #[test]
    fn assign_through_heap_weakens_value() {
        let obj = Variable::new("p", TypeSet::of("T"));
        let p = Identifier::Variable(obj);
        let allocation = SymbolicExpression::HeapReference {
            inner: Box::new(SymbolicExpression::HeapAllocation {
                types: TypeSet::of("T"),
            }),
        };
        let state = state().assign(&p, &allocation, &pp(4)).unwrap();
        let site = state.heap.sites_of(&p).iter().next().unwrap().clone();
        // write 1 through the (weakened) site, as `p.f = 1` does
        let target = Identifier::HeapLocation(site.with_weakness(true));
        let written = state
            .assign(&target, &SymbolicExpression::int(1), &pp(5))
            .unwrap();
        assert_eq!(
            written.value.get_state(&target),
            IntervalDomain::singleton(1)
        );
        // a second write joins instead of replacing
        let written_again = written
            .assign(&target, &SymbolicExpression::int(5), &pp(6))
            .unwrap();
        assert_eq!(
            written_again.value.get_state(&target),
            IntervalDomain::range(
                crate::abstract_domain::Bound::Int(1),
                crate::abstract_domain::Bound::Int(5)
            )
        );
    }

    #[test]
    fn assume_to_bottom() {
        let state = state()
            .assign(&var("x"), &SymbolicExpression::int(3), &pp(1))
            .unwrap();
        let guard = SymbolicExpression::binary(
            crate::intermediate_representation::BinaryOperator::Gt,
            SymbolicExpression::Identifier(var("x")),
            SymbolicExpression::int(10),
        );
        let refined = state.assume(&guard, &pp(2), &pp(3)).unwrap();
        assert!(refined.value.is_bottom());
    }
}
