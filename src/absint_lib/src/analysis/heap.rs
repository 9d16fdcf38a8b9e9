//! A field-insensitive point-based heap abstraction.
//!
//! Heap locations are abstracted by their allocation sites, i.e. the
//! position of the code where they are created. All heap locations created
//! at the same site are collapsed into a single abstract identifier. The
//! rewriter resolves heap forms of symbolic expressions into allocation
//! sites and pointers to them, so that value domains only ever see
//! heap-free expressions.

use super::{HeapDomain, HeapReplacement, Satisfiability, SemanticDomain};
use crate::abstract_domain::{AllocationSites, Environment, Lattice, NonRedundantPowerset};
use crate::error::SemanticError;
use crate::intermediate_representation::{
    AllocationSite, ExpressionSet, Identifier, PointerIdentifier, ScopeToken, SymbolicExpression,
};
use crate::prelude::*;

/// The point-based heap domain.
///
/// Tracks which allocation sites each identifier may point to, plus the
/// list of replacements produced by the latest transition. Substitutions
/// are transient: they concatenate on joins and do not partake in the
/// partial order.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct PointBasedHeap {
    heap_env: Environment<AllocationSites>,
    substitutions: Vec<HeapReplacement>,
}

impl PointBasedHeap {
    /// Create an empty heap.
    pub fn new() -> PointBasedHeap {
        PointBasedHeap {
            heap_env: Environment::new(NonRedundantPowerset::empty()),
            substitutions: Vec::new(),
        }
    }

    fn with_env(&self, heap_env: Environment<AllocationSites>) -> PointBasedHeap {
        PointBasedHeap {
            heap_env,
            substitutions: self.substitutions.clone(),
        }
    }

    /// The tracked environment from identifiers to allocation sites.
    pub fn environment(&self) -> &Environment<AllocationSites> {
        &self.heap_env
    }

    /// The sites the given identifier may point to.
    pub fn sites_of(&self, id: &Identifier) -> AllocationSites {
        self.heap_env.get_state(id)
    }

    /// Looks up a site with the given location among all tracked pointer
    /// targets.
    fn already_allocated(&self, site: &AllocationSite) -> Option<AllocationSite> {
        self.heap_env
            .iter()
            .flat_map(|(_, sites)| sites.iter())
            .find(|existing| existing.location == site.location)
            .cloned()
    }

    /// Apply a list of replacements to a heap environment: sites named as
    /// sources are substituted by the corresponding targets.
    fn apply_substitutions(
        env: &Environment<AllocationSites>,
        substitutions: &[HeapReplacement],
    ) -> Environment<AllocationSites> {
        if env.is_bottom() || substitutions.is_empty() {
            return env.clone();
        }
        let mut result = env.clone();
        for (id, sites) in env.iter() {
            let mut changed = false;
            let mut new_sites = Vec::new();
            for site in sites.iter() {
                let site_id = Identifier::HeapLocation(site.clone());
                let mut replaced = false;
                for replacement in substitutions {
                    if replacement.sources().contains(&site_id) {
                        replaced = true;
                        for target in replacement.targets() {
                            if let Identifier::HeapLocation(target_site) = target {
                                // preserve the original types, only the
                                // weakness changes
                                new_sites.push(AllocationSite {
                                    types: site.types.clone(),
                                    location: target_site.location.clone(),
                                    weak: target_site.weak,
                                });
                            }
                        }
                    }
                }
                if replaced {
                    changed = true;
                } else {
                    new_sites.push(site.clone());
                }
            }
            if changed {
                let collected: AllocationSites = new_sites.into_iter().collect();
                result = result.forget(id).assign(id, collected);
            }
        }
        result
    }

    /// The replacement weakening a strong site into its weak counterpart.
    fn replace_strong(site: &AllocationSite) -> HeapReplacement {
        let mut replacement = HeapReplacement::new();
        replacement.add_source(Identifier::HeapLocation(site.with_weakness(false)));
        replacement.add_target(Identifier::HeapLocation(site.with_weakness(true)));
        replacement
    }

    /// The rewriter: resolve an expression into the set of heap-free
    /// expressions the value domain interprets in its place.
    fn rewrite_expression(
        &self,
        expr: &SymbolicExpression,
        pp: &ProgramPoint,
    ) -> Result<ExpressionSet, SemanticError> {
        use SymbolicExpression as E;
        let rewritten = match expr {
            E::HeapAllocation { types } => {
                let site = AllocationSite::new(types.clone(), pp.location.clone());
                // a site reachable along this path is re-allocated: it no
                // longer represents a single concrete location
                let weak = self.already_allocated(&site).is_some();
                ExpressionSet::singleton(
                    Identifier::HeapLocation(site.with_weakness(weak)).into(),
                )
            }
            E::HeapReference { inner } => self
                .rewrite_expression(inner, pp)?
                .filter_map(|rewritten| match rewritten {
                    E::Identifier(Identifier::HeapLocation(site)) => Some(
                        Identifier::Pointer(PointerIdentifier::new(
                            site.types.clone(),
                            site.clone(),
                        ))
                        .into(),
                    ),
                    other => Some(other.clone()),
                }),
            E::HeapDereference { inner } => {
                if let E::Identifier(id @ Identifier::Variable(_)) = inner.as_ref() {
                    if self.heap_env.contains(id) {
                        return Ok(self.pointers_of(id));
                    }
                }
                self.rewrite_expression(inner, pp)?
            }
            E::AccessChild {
                container, types, ..
            } => self
                .rewrite_expression(container, pp)?
                .filter_map(|rewritten| match rewritten {
                    E::Identifier(Identifier::Pointer(pointer)) => {
                        // field-insensitive: accessing a child collapses
                        // onto the weakened receiver site
                        let site = AllocationSite {
                            types: types.clone(),
                            location: pointer.target.location.clone(),
                            weak: true,
                        };
                        Some(Identifier::HeapLocation(site).into())
                    }
                    other => Some(other.clone()),
                }),
            E::Identifier(id) => {
                if matches!(id, Identifier::Variable(_)) && self.heap_env.contains(id) {
                    self.pointers_of(id)
                } else {
                    ExpressionSet::singleton(expr.clone())
                }
            }
            E::Unary { op, inner } => self
                .rewrite_expression(inner, pp)?
                .filter_map(|rewritten| Some(SymbolicExpression::unary(*op, rewritten.clone()))),
            E::Binary { op, left, right } => {
                let left_set = self.rewrite_expression(left, pp)?;
                let right_set = self.rewrite_expression(right, pp)?;
                let mut product = ExpressionSet::empty();
                for l in left_set.iter() {
                    for r in right_set.iter() {
                        product = product.lub(&ExpressionSet::singleton(
                            SymbolicExpression::binary(*op, l.clone(), r.clone()),
                        ));
                    }
                }
                product
            }
            E::Ternary {
                op,
                first,
                second,
                third,
            } => {
                let first_set = self.rewrite_expression(first, pp)?;
                let second_set = self.rewrite_expression(second, pp)?;
                let third_set = self.rewrite_expression(third, pp)?;
                let mut product = ExpressionSet::empty();
                for f in first_set.iter() {
                    for s in second_set.iter() {
                        for t in third_set.iter() {
                            product = product.lub(&ExpressionSet::singleton(
                                SymbolicExpression::ternary(
                                    *op,
                                    f.clone(),
                                    s.clone(),
                                    t.clone(),
                                ),
                            ));
                        }
                    }
                }
                product
            }
            E::Skip | E::Constant(_) => ExpressionSet::singleton(expr.clone()),
        };
        if rewritten.is_empty() {
            return Err(SemanticError::EmptyRewrite {
                expression: expr.to_string(),
            });
        }
        Ok(rewritten)
    }

    /// The pointer identifiers for all sites the given identifier maps to.
    fn pointers_of(&self, id: &Identifier) -> ExpressionSet {
        self.heap_env
            .get_state(id)
            .iter()
            .map(|site| {
                Identifier::Pointer(PointerIdentifier::new(site.types.clone(), site.clone()))
                    .into()
            })
            .collect()
    }
}

impl Default for PointBasedHeap {
    fn default() -> PointBasedHeap {
        PointBasedHeap::new()
    }
}

impl Lattice for PointBasedHeap {
    fn top(&self) -> Self {
        PointBasedHeap {
            heap_env: self.heap_env.top(),
            substitutions: Vec::new(),
        }
    }

    fn bottom(&self) -> Self {
        PointBasedHeap {
            heap_env: self.heap_env.bottom(),
            substitutions: Vec::new(),
        }
    }

    fn is_top(&self) -> bool {
        self.heap_env.is_top()
    }

    fn is_bottom(&self) -> bool {
        self.heap_env.is_bottom()
    }

    fn less_or_equal(&self, other: &Self) -> bool {
        // substitutions are transient and do not partake in the order
        self.heap_env.less_or_equal(&other.heap_env)
    }

    fn lub(&self, other: &Self) -> Self {
        let mut substitutions = self.substitutions.clone();
        substitutions.extend(other.substitutions.iter().cloned());
        PointBasedHeap {
            heap_env: self.heap_env.lub(&other.heap_env),
            substitutions,
        }
    }

    fn glb(&self, other: &Self) -> Self {
        let mut substitutions = self.substitutions.clone();
        substitutions.extend(other.substitutions.iter().cloned());
        PointBasedHeap {
            heap_env: self.heap_env.glb(&other.heap_env),
            substitutions,
        }
    }

    fn widening(&self, other: &Self) -> Self {
        // the allocation-site universe is finite for any program, so the
        // join terminates ascending chains
        self.lub(other)
    }
}

impl SemanticDomain for PointBasedHeap {
    fn assign(
        &self,
        id: &Identifier,
        expr: &SymbolicExpression,
        pp: &ProgramPoint,
    ) -> Result<Self, SemanticError> {
        let rewritten = self.rewrite_expression(expr, pp)?;
        let sites: Vec<AllocationSite> = rewritten
            .iter()
            .filter_map(|candidate| match candidate {
                SymbolicExpression::Identifier(Identifier::Pointer(pointer)) => {
                    Some(pointer.target.clone())
                }
                _ => None,
            })
            .collect();

        if sites.len() == rewritten.len() {
            // the assigned expression evaluates to pointers: update the
            // points-to set of the assigned identifier
            let collected: AllocationSites = sites.into_iter().collect();
            let assigned = self.heap_env.assign(id, collected);
            return Ok(self.with_env(Self::apply_substitutions(&assigned, &self.substitutions)));
        }

        if let Identifier::HeapLocation(site) = id {
            // writing through a heap location: the site no longer admits
            // strong updates along this path
            let stepped = self.small_step_semantics(expr, pp)?;
            let mut substitutions = stepped.substitutions.clone();
            substitutions.push(Self::replace_strong(site));
            let env = Self::apply_substitutions(&stepped.heap_env, &substitutions);
            return Ok(PointBasedHeap {
                heap_env: env,
                substitutions,
            });
        }

        self.small_step_semantics(expr, pp)
    }

    fn small_step_semantics(
        &self,
        expr: &SymbolicExpression,
        pp: &ProgramPoint,
    ) -> Result<Self, SemanticError> {
        use SymbolicExpression::*;
        match expr {
            AccessChild { child, .. } => self.small_step_semantics(child, pp),
            _ => Ok(self.clone()),
        }
    }

    fn assume(
        &self,
        expr: &SymbolicExpression,
        src: &ProgramPoint,
        _dest: &ProgramPoint,
    ) -> Result<Self, SemanticError> {
        // the expression is only rewritten; the decision is left to the
        // value domain
        self.small_step_semantics(expr, src)
    }

    fn satisfies(
        &self,
        _expr: &SymbolicExpression,
        _pp: &ProgramPoint,
    ) -> Result<Satisfiability, SemanticError> {
        Ok(Satisfiability::Unknown)
    }

    fn forget_identifier(&self, id: &Identifier) -> Self {
        self.with_env(self.heap_env.forget(id))
    }

    fn forget_identifiers_if(&self, predicate: &dyn Fn(&Identifier) -> bool) -> Self {
        self.with_env(self.heap_env.forget_if(predicate))
    }

    fn push_scope(&self, token: &ScopeToken) -> Result<Self, SemanticError> {
        Ok(self.with_env(self.heap_env.push_scope(token)))
    }

    fn pop_scope(&self, token: &ScopeToken) -> Result<Self, SemanticError> {
        Ok(self.with_env(self.heap_env.pop_scope(token)))
    }
}

impl HeapDomain for PointBasedHeap {
    fn rewrite(
        &self,
        expr: &SymbolicExpression,
        pp: &ProgramPoint,
    ) -> Result<ExpressionSet, SemanticError> {
        self.rewrite_expression(expr, pp)
    }

    fn substitution(&self) -> &[HeapReplacement] {
        &self.substitutions
    }
}

impl std::fmt::Display for PointBasedHeap {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "{}", self.heap_env)
    }
}
