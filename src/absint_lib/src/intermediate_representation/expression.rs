//! Symbolic expressions: the typed trees that statements root and that
//! abstract domains interpret.
//!
//! Expressions are immutable. Scope handling does not mutate an expression
//! but produces a rescoped copy, so expressions can be shared freely
//! between abstract states.

use super::{BinaryOperator, CodeLocation, Constant, TernaryOperator, TypeSet, UnaryOperator};
use crate::abstract_domain::Lattice;
use crate::prelude::*;
use itertools::Itertools;
use std::collections::BTreeSet;

/// A token identifying one scope level, derived from the call site that
/// opened the scope.
///
/// Pushing a token onto a variable hides it behind the scope of the callee;
/// popping the token restores it. Identifiers that do not carry the popped
/// token are local to the closing scope and are dropped.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct ScopeToken {
    call_site: CodeLocation,
}

impl ScopeToken {
    /// Create a scope token for the given call site.
    pub fn new(call_site: CodeLocation) -> ScopeToken {
        ScopeToken { call_site }
    }

    /// The call site that opened the scope.
    pub fn call_site(&self) -> &CodeLocation {
        &self.call_site
    }
}

impl std::fmt::Display for ScopeToken {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "{}", self.call_site)
    }
}

/// A program variable.
///
/// The scope stack records the calls that are currently hiding the
/// variable; the innermost scope comes first. A variable with an empty
/// scope stack is visible in the frame under analysis.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct Variable {
    /// The name of the variable.
    pub name: String,
    /// The static types of the variable.
    pub types: TypeSet,
    /// The scopes the variable is currently hidden behind, innermost first.
    pub scopes: Vec<ScopeToken>,
}

impl Variable {
    /// Create a variable with the given name and types, visible in the
    /// current frame.
    pub fn new(name: impl ToString, types: TypeSet) -> Variable {
        Variable {
            name: name.to_string(),
            types,
            scopes: Vec::new(),
        }
    }

    /// Hide the variable behind the given scope.
    pub fn push_scope(&self, token: &ScopeToken) -> Variable {
        let mut scopes = Vec::with_capacity(self.scopes.len() + 1);
        scopes.push(token.clone());
        scopes.extend(self.scopes.iter().cloned());
        Variable {
            name: self.name.clone(),
            types: self.types.clone(),
            scopes,
        }
    }

    /// Restore the variable by removing the given scope.
    ///
    /// Returns `None` if the variable does not carry the token as its
    /// innermost scope, i.e. it is local to the closing scope.
    pub fn pop_scope(&self, token: &ScopeToken) -> Option<Variable> {
        match self.scopes.first() {
            Some(innermost) if innermost == token => Some(Variable {
                name: self.name.clone(),
                types: self.types.clone(),
                scopes: self.scopes[1..].to_vec(),
            }),
            _ => None,
        }
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "{}", self.name)?;
        for scope in &self.scopes {
            write!(formatter, "'{scope}")?;
        }
        Ok(())
    }
}

/// The abstract identity of all objects created at a single program
/// location.
///
/// A strong site represents exactly one concrete location and admits
/// strong updates; a weak site represents one or more locations and only
/// admits joining updates.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct AllocationSite {
    /// The static types of the values allocated at the site.
    pub types: TypeSet,
    /// The program location of the allocation.
    pub location: CodeLocation,
    /// Whether the site abstracts more than one concrete location.
    pub weak: bool,
}

impl AllocationSite {
    /// Create a strong allocation site.
    pub fn new(types: TypeSet, location: CodeLocation) -> AllocationSite {
        AllocationSite {
            types,
            location,
            weak: false,
        }
    }

    /// A copy of this site with the given strength.
    pub fn with_weakness(&self, weak: bool) -> AllocationSite {
        AllocationSite {
            types: self.types.clone(),
            location: self.location.clone(),
            weak,
        }
    }
}

impl std::fmt::Display for AllocationSite {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            formatter,
            "{}{}",
            self.location,
            if self.weak { "(w)" } else { "" }
        )
    }
}

/// An identifier denoting a pointer to an allocation site.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct PointerIdentifier {
    /// The static types of the pointer value.
    pub types: TypeSet,
    /// The site the pointer refers to.
    pub target: AllocationSite,
}

impl PointerIdentifier {
    /// Create a pointer identifier referring to the given site.
    pub fn new(types: TypeSet, target: AllocationSite) -> PointerIdentifier {
        PointerIdentifier { types, target }
    }
}

impl std::fmt::Display for PointerIdentifier {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "&{}", self.target)
    }
}

/// An expression with a stable name that abstract states can map to
/// values: program variables, heap locations and pointers to them.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum Identifier {
    /// A program variable.
    Variable(Variable),
    /// A heap location abstracted by its allocation site.
    HeapLocation(AllocationSite),
    /// A pointer to a heap location.
    Pointer(PointerIdentifier),
}

impl Identifier {
    /// Returns whether the identifier may represent more than one concrete
    /// entity. Weak identifiers only admit joining updates.
    pub fn is_weak(&self) -> bool {
        match self {
            Identifier::Variable(_) => false,
            Identifier::HeapLocation(site) => site.weak,
            Identifier::Pointer(pointer) => pointer.target.weak,
        }
    }

    /// The static types of the identifier.
    pub fn types(&self) -> &TypeSet {
        match self {
            Identifier::Variable(variable) => &variable.types,
            Identifier::HeapLocation(site) => &site.types,
            Identifier::Pointer(pointer) => &pointer.types,
        }
    }

    /// Hide the identifier behind the given scope.
    ///
    /// Heap identifiers are global and unaffected by scoping.
    pub fn push_scope(&self, token: &ScopeToken) -> Identifier {
        match self {
            Identifier::Variable(variable) => Identifier::Variable(variable.push_scope(token)),
            other => other.clone(),
        }
    }

    /// Restore the identifier by removing the given scope.
    ///
    /// Returns `None` for variables local to the closing scope. Heap
    /// identifiers are global and survive unchanged.
    pub fn pop_scope(&self, token: &ScopeToken) -> Option<Identifier> {
        match self {
            Identifier::Variable(variable) => variable.pop_scope(token).map(Identifier::Variable),
            other => Some(other.clone()),
        }
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Identifier::Variable(variable) => write!(formatter, "{variable}"),
            Identifier::HeapLocation(site) => write!(formatter, "{site}"),
            Identifier::Pointer(pointer) => write!(formatter, "{pointer}"),
        }
    }
}

/// An algebraic tree of values, operations and heap forms.
///
/// Value domains interpret the subset of expressions free of heap forms;
/// the heap domain's rewriter turns arbitrary expressions into that subset
/// before the value domain sees them.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum SymbolicExpression {
    /// A no-op placeholder carrying no value.
    Skip,
    /// A literal value.
    Constant(Constant),
    /// A named entity of the abstract state.
    Identifier(Identifier),
    /// The application of a unary operator.
    Unary {
        /// The operator.
        op: UnaryOperator,
        /// The operand.
        inner: Box<SymbolicExpression>,
    },
    /// The application of a binary operator.
    Binary {
        /// The operator.
        op: BinaryOperator,
        /// The left operand.
        left: Box<SymbolicExpression>,
        /// The right operand.
        right: Box<SymbolicExpression>,
    },
    /// The application of a ternary operator.
    Ternary {
        /// The operator.
        op: TernaryOperator,
        /// The first operand.
        first: Box<SymbolicExpression>,
        /// The second operand.
        second: Box<SymbolicExpression>,
        /// The third operand.
        third: Box<SymbolicExpression>,
    },
    /// The allocation of a fresh heap region.
    HeapAllocation {
        /// The static types of the allocated region.
        types: TypeSet,
    },
    /// A reference to the memory region computed by the inner expression.
    HeapReference {
        /// The expression computing the referenced region.
        inner: Box<SymbolicExpression>,
    },
    /// The dereference of the pointer computed by the inner expression.
    HeapDereference {
        /// The expression computing the pointer.
        inner: Box<SymbolicExpression>,
    },
    /// The access to a child region (field, element, ...) of a container.
    AccessChild {
        /// The expression computing the container.
        container: Box<SymbolicExpression>,
        /// The expression identifying the child.
        child: Box<SymbolicExpression>,
        /// The static types of the accessed child.
        types: TypeSet,
    },
}

impl SymbolicExpression {
    /// A variable reference.
    pub fn var(variable: Variable) -> SymbolicExpression {
        SymbolicExpression::Identifier(Identifier::Variable(variable))
    }

    /// An integer constant.
    pub fn int(value: i64) -> SymbolicExpression {
        SymbolicExpression::Constant(Constant::Int(value))
    }

    /// A boolean constant.
    pub fn bool(value: bool) -> SymbolicExpression {
        SymbolicExpression::Constant(Constant::Bool(value))
    }

    /// A unary expression.
    pub fn unary(op: UnaryOperator, inner: SymbolicExpression) -> SymbolicExpression {
        SymbolicExpression::Unary {
            op,
            inner: Box::new(inner),
        }
    }

    /// A binary expression.
    pub fn binary(
        op: BinaryOperator,
        left: SymbolicExpression,
        right: SymbolicExpression,
    ) -> SymbolicExpression {
        SymbolicExpression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// A ternary expression.
    pub fn ternary(
        op: TernaryOperator,
        first: SymbolicExpression,
        second: SymbolicExpression,
        third: SymbolicExpression,
    ) -> SymbolicExpression {
        SymbolicExpression::Ternary {
            op,
            first: Box::new(first),
            second: Box::new(second),
            third: Box::new(third),
        }
    }

    /// The boolean negation of this expression.
    pub fn negated(&self) -> SymbolicExpression {
        SymbolicExpression::unary(UnaryOperator::LogicalNot, self.clone())
    }

    /// The static types of the expression.
    pub fn static_types(&self) -> TypeSet {
        use SymbolicExpression::*;
        match self {
            Skip => TypeSet::empty(),
            Constant(constant) => constant.static_types(),
            Identifier(id) => id.types().clone(),
            Unary { op, .. } => match op {
                UnaryOperator::Negation => TypeSet::of("int"),
                UnaryOperator::LogicalNot => TypeSet::of("bool"),
            },
            Binary { op, .. } => {
                if op.is_comparison() {
                    TypeSet::of("bool")
                } else {
                    match op {
                        BinaryOperator::And | BinaryOperator::Or => TypeSet::of("bool"),
                        BinaryOperator::StrConcat => TypeSet::of("string"),
                        _ => TypeSet::of("int"),
                    }
                }
            }
            Ternary { second, third, .. } => second.static_types().union(&third.static_types()),
            HeapAllocation { types } => types.clone(),
            HeapReference { inner } => inner.static_types(),
            HeapDereference { inner } => inner.static_types(),
            AccessChild { types, .. } => types.clone(),
        }
    }

    /// Returns whether the expression contains no heap forms, i.e. whether
    /// it can be interpreted by a value domain directly.
    pub fn is_value_expression(&self) -> bool {
        use SymbolicExpression::*;
        match self {
            Skip | Constant(_) | Identifier(_) => true,
            Unary { inner, .. } => inner.is_value_expression(),
            Binary { left, right, .. } => left.is_value_expression() && right.is_value_expression(),
            Ternary {
                first,
                second,
                third,
                ..
            } => {
                first.is_value_expression()
                    && second.is_value_expression()
                    && third.is_value_expression()
            }
            HeapAllocation { .. }
            | HeapReference { .. }
            | HeapDereference { .. }
            | AccessChild { .. } => false,
        }
    }

    /// A rescoped copy of the expression where all contained variables are
    /// hidden behind the given scope.
    pub fn push_scope(&self, token: &ScopeToken) -> SymbolicExpression {
        self.map_identifiers(&|id| Some(id.push_scope(token)))
            .expect("pushing a scope cannot drop identifiers")
    }

    /// A rescoped copy of the expression where the given scope has been
    /// removed from all contained variables.
    ///
    /// Returns `None` if the expression mentions a variable local to the
    /// closing scope: such an expression has no meaning outside of it.
    pub fn pop_scope(&self, token: &ScopeToken) -> Option<SymbolicExpression> {
        self.map_identifiers(&|id| id.pop_scope(token))
    }

    fn map_identifiers(
        &self,
        map: &impl Fn(&Identifier) -> Option<Identifier>,
    ) -> Option<SymbolicExpression> {
        use SymbolicExpression::*;
        let mapped = match self {
            Skip => Skip,
            Constant(constant) => Constant(constant.clone()),
            Identifier(id) => Identifier(map(id)?),
            Unary { op, inner } => Unary {
                op: *op,
                inner: Box::new(inner.map_identifiers(map)?),
            },
            Binary { op, left, right } => Binary {
                op: *op,
                left: Box::new(left.map_identifiers(map)?),
                right: Box::new(right.map_identifiers(map)?),
            },
            Ternary {
                op,
                first,
                second,
                third,
            } => Ternary {
                op: *op,
                first: Box::new(first.map_identifiers(map)?),
                second: Box::new(second.map_identifiers(map)?),
                third: Box::new(third.map_identifiers(map)?),
            },
            HeapAllocation { types } => HeapAllocation {
                types: types.clone(),
            },
            HeapReference { inner } => HeapReference {
                inner: Box::new(inner.map_identifiers(map)?),
            },
            HeapDereference { inner } => HeapDereference {
                inner: Box::new(inner.map_identifiers(map)?),
            },
            AccessChild {
                container,
                child,
                types,
            } => AccessChild {
                container: Box::new(container.map_identifiers(map)?),
                child: Box::new(child.map_identifiers(map)?),
                types: types.clone(),
            },
        };
        Some(mapped)
    }
}

impl std::fmt::Display for SymbolicExpression {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        use SymbolicExpression::*;
        match self {
            Skip => write!(formatter, "skip"),
            Constant(constant) => write!(formatter, "{constant}"),
            Identifier(id) => write!(formatter, "{id}"),
            Unary { op, inner } => write!(formatter, "{op}({inner})"),
            Binary { op, left, right } => write!(formatter, "({left} {op} {right})"),
            Ternary {
                first,
                second,
                third,
                ..
            } => write!(formatter, "({first} ? {second} : {third})"),
            HeapAllocation { types } => write!(formatter, "new {types}"),
            HeapReference { inner } => write!(formatter, "ref({inner})"),
            HeapDereference { inner } => write!(formatter, "deref({inner})"),
            AccessChild {
                container, child, ..
            } => write!(formatter, "{container}.{child}"),
        }
    }
}

impl From<Identifier> for SymbolicExpression {
    fn from(id: Identifier) -> SymbolicExpression {
        SymbolicExpression::Identifier(id)
    }
}

/// A set of symbolic expressions forming a lattice.
///
/// The empty set is the bottom element; the top element represents the set
/// of all expressions and is tracked with an explicit flag.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct ExpressionSet {
    exprs: BTreeSet<SymbolicExpression>,
    is_top: bool,
}

impl ExpressionSet {
    /// The empty (bottom) expression set.
    pub fn empty() -> ExpressionSet {
        ExpressionSet {
            exprs: BTreeSet::new(),
            is_top: false,
        }
    }

    /// The set containing exactly the given expression.
    pub fn singleton(expr: SymbolicExpression) -> ExpressionSet {
        ExpressionSet {
            exprs: std::iter::once(expr).collect(),
            is_top: false,
        }
    }

    /// The set of all expressions.
    pub fn universe() -> ExpressionSet {
        ExpressionSet {
            exprs: BTreeSet::new(),
            is_top: true,
        }
    }

    /// Iterate over the contained expressions.
    pub fn iter(&self) -> impl Iterator<Item = &SymbolicExpression> {
        self.exprs.iter()
    }

    /// The number of contained expressions.
    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    /// Returns whether the set contains no expressions.
    pub fn is_empty(&self) -> bool {
        !self.is_top && self.exprs.is_empty()
    }

    /// Transform the contained expressions, dropping those mapped to
    /// `None`.
    pub fn filter_map(
        &self,
        map: impl Fn(&SymbolicExpression) -> Option<SymbolicExpression>,
    ) -> ExpressionSet {
        ExpressionSet {
            exprs: self.exprs.iter().filter_map(map).collect(),
            is_top: self.is_top,
        }
    }
}

impl FromIterator<SymbolicExpression> for ExpressionSet {
    fn from_iter<I: IntoIterator<Item = SymbolicExpression>>(iter: I) -> ExpressionSet {
        ExpressionSet {
            exprs: iter.into_iter().collect(),
            is_top: false,
        }
    }
}

impl Lattice for ExpressionSet {
    fn top(&self) -> Self {
        ExpressionSet::universe()
    }

    fn bottom(&self) -> Self {
        ExpressionSet::empty()
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
        self.exprs.is_subset(&other.exprs)
    }

    fn lub(&self, other: &Self) -> Self {
        if self.is_top || other.is_top {
            return ExpressionSet::universe();
        }
        ExpressionSet {
            exprs: self.exprs.union(&other.exprs).cloned().collect(),
            is_top: false,
        }
    }

    fn glb(&self, other: &Self) -> Self {
        if self.is_top {
            return other.clone();
        }
        if other.is_top {
            return self.clone();
        }
        ExpressionSet {
            exprs: self.exprs.intersection(&other.exprs).cloned().collect(),
            is_top: false,
        }
    }
}

impl std::fmt::Display for ExpressionSet {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.is_top {
            return write!(formatter, "TOP");
        }
        write!(formatter, "[{}]", self.exprs.iter().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scoped_var() -> (Variable, ScopeToken) {
        let variable = Variable::new("x", TypeSet::of("int"));
        let token = ScopeToken::new(CodeLocation::new("test.src", 3, 0));
        (variable, token)
    }

    #[test]
    fn scope_round_trip() {
        let (variable, token) = scoped_var();
        let expr = SymbolicExpression::binary(
            BinaryOperator::Add,
            SymbolicExpression::var(variable),
            SymbolicExpression::int(4),
        );
        let pushed = expr.push_scope(&token);
        assert_ne!(pushed, expr);
        assert_eq!(pushed.pop_scope(&token), Some(expr));
    }

    #[test]
    fn pop_drops_locals() {
        let (variable, token) = scoped_var();
        // `x` was never pushed, so popping must drop the expression.
        let expr = SymbolicExpression::var(variable);
        assert_eq!(expr.pop_scope(&token), None);
    }

    #[test]
    fn expression_set_lattice() {
        let left = ExpressionSet::singleton(SymbolicExpression::int(1));
        let right = ExpressionSet::singleton(SymbolicExpression::int(2));
        let joined = left.lub(&right);
        assert_eq!(joined.len(), 2);
        assert!(left.less_or_equal(&joined));
        assert!(right.less_or_equal(&joined));
        assert!(joined.glb(&left).less_or_equal(&left));
        assert!(ExpressionSet::empty().less_or_equal(&left));
        assert!(left.less_or_equal(&ExpressionSet::universe()));
    }
}
