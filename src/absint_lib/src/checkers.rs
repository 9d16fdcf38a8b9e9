//! The check tool: visitors over analyzed CFGs emitting warnings.

use crate::analysis::interprocedural::ContextBasedAnalysis;
use crate::analysis::{AbstractState, AnalysisState, AnalyzedCfg, Satisfiability};
use crate::intermediate_representation::{
    BinaryOperator, Cfg, Program, Statement, StatementKind, SymbolicExpression,
};
use crate::prelude::*;
use petgraph::graph::NodeIndex;
use std::collections::BTreeMap;

/// A warning emitted by a check.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct Warning {
    /// The location the warning refers to.
    pub location: CodeLocation,
    /// The name of the check that generated the warning.
    pub check: String,
    /// A short description of the warning that is presented to the user.
    pub message: String,
}

impl Warning {
    /// Create a new warning.
    pub fn new(
        location: CodeLocation,
        check: impl ToString,
        message: impl ToString,
    ) -> Warning {
        Warning {
            location,
            check: check.to_string(),
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "[{}] {}: {}",
            self.check, self.location, self.message
        )
    }
}

/// A check that only inspects the syntax of statements.
pub trait SyntacticCheck {
    /// The name of the check, used in emitted warnings.
    fn name(&self) -> &str;

    /// Visit one statement of a CFG.
    fn visit_statement(&self, tool: &mut Warnings, cfg: &Cfg, statement: &Statement);
}

/// A check that inspects statements together with the abstract states
/// computed for them.
pub trait SemanticCheck<A: AbstractState> {
    /// The name of the check, used in emitted warnings.
    fn name(&self) -> &str;

    /// Visit one statement of a CFG, with access to the per-context
    /// analysis results.
    fn visit_statement(
        &self,
        tool: &mut CheckTool<A>,
        cfg: &Cfg,
        node: NodeIndex,
        statement: &Statement,
    );
}

/// The warning collection handed to syntactic checks.
#[derive(Debug, Default)]
pub struct Warnings {
    warnings: Vec<Warning>,
}

impl Warnings {
    /// Emit a warning.
    pub fn warn(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    /// The collected warnings.
    pub fn into_inner(self) -> Vec<Warning> {
        self.warnings
    }
}

/// The harness dispatching semantic checks over analysis results.
///
/// Checks are executed in registration order; each registered check
/// visits every statement of every CFG of the program.
pub struct CheckTool<A: AbstractState> {
    results: BTreeMap<String, Vec<AnalyzedCfg<A>>>,
    warnings: Vec<Warning>,
}

impl<A: AbstractState> CheckTool<A> {
    /// Create a tool over the results of an interprocedural analysis.
    pub fn new(analysis: &ContextBasedAnalysis<A>, program: &Program) -> CheckTool<A> {
        let mut results: BTreeMap<String, Vec<AnalyzedCfg<A>>> = BTreeMap::new();
        for cfg in program.cfgs() {
            let analyzed = analysis
                .analysis_results_of(cfg.name())
                .into_iter()
                .cloned()
                .collect();
            results.insert(cfg.name().to_string(), analyzed);
        }
        CheckTool {
            results,
            warnings: Vec::new(),
        }
    }

    /// The analysis states holding after the given statement, one per
    /// context the enclosing CFG was analyzed under.
    pub fn analysis_results_at(&self, cfg: &Cfg, node: NodeIndex) -> Vec<AnalysisState<A>> {
        match self.results.get(cfg.name()) {
            Some(analyzed) => analyzed
                .iter()
                .filter_map(|result| result.unwinded_state_after(cfg, node).ok())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Emit a warning.
    pub fn warn(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    /// Run the registered checks over all statements of the program, in
    /// registration order, and return the collected warnings.
    pub fn run(
        mut self,
        program: &Program,
        syntactic: &[Box<dyn SyntacticCheck>],
        semantic: &[Box<dyn SemanticCheck<A>>],
    ) -> Vec<Warning> {
        let mut syntactic_warnings = Warnings::default();
        for check in syntactic {
            for cfg in program.cfgs() {
                for node in cfg.nodes() {
                    check.visit_statement(&mut syntactic_warnings, cfg, cfg.statement(node));
                }
            }
        }
        for check in semantic {
            for cfg in program.cfgs() {
                for node in cfg.nodes() {
                    let statement = cfg.statement(node).clone();
                    check.visit_statement(&mut self, cfg, node, &statement);
                }
            }
        }
        let mut warnings = syntactic_warnings.into_inner();
        warnings.append(&mut self.warnings);
        warnings.sort();
        warnings.dedup();
        warnings
    }
}

/// A syntactic check reporting literal divisions by the constant zero.
#[derive(Debug, Default)]
pub struct LiteralDivisionByZero;

impl LiteralDivisionByZero {
    fn visit_expression(&self, tool: &mut Warnings, statement: &Statement, expr: &SymbolicExpression) {
        use SymbolicExpression::*;
        match expr {
            Binary { op, left, right } => {
                if *op == BinaryOperator::Div
                    && matches!(
                        right.as_ref(),
                        Constant(crate::intermediate_representation::Constant::Int(0))
                    )
                {
                    tool.warn(Warning::new(
                        statement.location.clone(),
                        self.name(),
                        "division by the literal constant zero",
                    ));
                }
                self.visit_expression(tool, statement, left);
                self.visit_expression(tool, statement, right);
            }
            Unary { inner, .. } | HeapReference { inner } | HeapDereference { inner } => {
                self.visit_expression(tool, statement, inner)
            }
            Ternary {
                first,
                second,
                third,
                ..
            } => {
                self.visit_expression(tool, statement, first);
                self.visit_expression(tool, statement, second);
                self.visit_expression(tool, statement, third);
            }
            AccessChild {
                container, child, ..
            } => {
                self.visit_expression(tool, statement, container);
                self.visit_expression(tool, statement, child);
            }
            Skip | Constant(_) | Identifier(_) | HeapAllocation { .. } => {}
        }
    }
}

impl SyntacticCheck for LiteralDivisionByZero {
    fn name(&self) -> &str {
        "literal-div-by-zero"
    }

    fn visit_statement(&self, tool: &mut Warnings, _cfg: &Cfg, statement: &Statement) {
        match &statement.kind {
            StatementKind::Assignment { target, value } => {
                self.visit_expression(tool, statement, target);
                self.visit_expression(tool, statement, value);
            }
            StatementKind::Expression(expr) | StatementKind::Return(Some(expr)) => {
                self.visit_expression(tool, statement, expr)
            }
            StatementKind::Call(call) => {
                for argument in &call.arguments {
                    self.visit_expression(tool, statement, argument);
                }
            }
            StatementKind::Return(None) => {}
        }
    }
}

/// A semantic check reporting divisions whose divisor may be zero
/// according to the computed abstract states.
#[derive(Debug, Default)]
pub struct PossibleDivisionByZero;

impl PossibleDivisionByZero {
    fn divisors(expr: &SymbolicExpression, found: &mut Vec<SymbolicExpression>) {
        use SymbolicExpression::*;
        match expr {
            Binary { op, left, right } => {
                if *op == BinaryOperator::Div {
                    found.push((**right).clone());
                }
                Self::divisors(left, found);
                Self::divisors(right, found);
            }
            Unary { inner, .. } | HeapReference { inner } | HeapDereference { inner } => {
                Self::divisors(inner, found)
            }
            Ternary {
                first,
                second,
                third,
                ..
            } => {
                Self::divisors(first, found);
                Self::divisors(second, found);
                Self::divisors(third, found);
            }
            AccessChild {
                container, child, ..
            } => {
                Self::divisors(container, found);
                Self::divisors(child, found);
            }
            Skip | Constant(_) | Identifier(_) | HeapAllocation { .. } => {}
        }
    }
}

impl<A: AbstractState> SemanticCheck<A> for PossibleDivisionByZero {
    fn name(&self) -> &str {
        "div-by-zero"
    }

    fn visit_statement(
        &self,
        tool: &mut CheckTool<A>,
        cfg: &Cfg,
        node: NodeIndex,
        statement: &Statement,
    ) {
        let mut divisors = Vec::new();
        match &statement.kind {
            StatementKind::Assignment { value, .. } => Self::divisors(value, &mut divisors),
            StatementKind::Expression(expr) | StatementKind::Return(Some(expr)) => {
                Self::divisors(expr, &mut divisors)
            }
            StatementKind::Call(call) => {
                for argument in &call.arguments {
                    Self::divisors(argument, &mut divisors);
                }
            }
            StatementKind::Return(None) => {}
        }
        if divisors.is_empty() {
            return;
        }
        let pp = cfg.program_point(node);
        let states = tool.analysis_results_at(cfg, node);
        for divisor in divisors {
            let nonzero =
                SymbolicExpression::binary(BinaryOperator::Ne, divisor, SymbolicExpression::int(0));
            let may_be_zero = states.iter().any(|state| {
                !matches!(
                    state.satisfies(&nonzero, &pp),
                    Ok(Satisfiability::Satisfied)
                )
            });
            if may_be_zero && !states.is_empty() {
                tool.warn(Warning::new(
                    statement.location.clone(),
                    SemanticCheck::<A>::name(self),
                    "the divisor may be zero",
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intermediate_representation::{CfgDescriptor, StatementKind};

    #[test]
    fn literal_division_is_reported() {
        let mut cfg = Cfg::new(CfgDescriptor::new(
            "main",
            Vec::new(),
            None,
            CodeLocation::new("test.src", 1, 0),
        ));
        let division = SymbolicExpression::binary(
            BinaryOperator::Div,
            SymbolicExpression::int(1),
            SymbolicExpression::int(0),
        );
        let node = cfg.add_statement(Statement {
            location: CodeLocation::new("test.src", 1, 0),
            kind: StatementKind::Expression(division),
        });
        cfg.add_entry(node);
        cfg.add_exit(node);
        let mut program = Program::new();
        program.add_cfg(cfg);
        program.add_entry_point("main");

        let check = LiteralDivisionByZero;
        let mut warnings = Warnings::default();
        for cfg in program.cfgs() {
            for node in cfg.nodes() {
                check.visit_statement(&mut warnings, cfg, cfg.statement(node));
            }
        }
        let warnings = warnings.into_inner();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].check, "literal-div-by-zero");
    }
}
