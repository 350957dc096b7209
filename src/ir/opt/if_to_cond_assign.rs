//! Flattening of `if` statements into conditional assignments.
//!
//! `if (c) { x = a; } else { y = b; }` becomes
//!
//! ```text
//! then = c;
//! (then) x = a;
//! else = !then;
//! (else) y = b;
//! ```
//!
//! Nested ifs are flattened innermost first. When an enclosing `if` is flattened later, the
//! assignments to the inner guard variables get the outer guard ANDed into their value, and
//! the assignments already guarded by an inner guard are left alone: the inner guard is false
//! whenever the outer one is.

use std::collections::BTreeMap;

use crate::{
    ir::{
        builder,
        visit::{referenced_variables, walk_statements, VisitAction, VisitCx, Visitor},
        Assignment, Call, Deref, Expression, IfStatement, LoopJump, Rvalue, Shader, Statement, Texture,
        VarRef,
    },
    symbol::meta::{ShaderStage, VariableMode},
};

/// What a branch contains, as far as flattening is concerned.
struct BranchCheck {
    stage: ShaderStage,
    unsupported: bool,
    expensive: bool,
    dynamic_index: bool,
    cost: u32,
}
impl BranchCheck {
    fn run(shader: &Shader, stage: ShaderStage, stmts: &[Statement]) -> Self {
        let mut check = Self {
            stage,
            unsupported: false,
            expensive: false,
            dynamic_index: false,
            cost: 0,
        };
        walk_statements(&mut check, stmts, VisitCx::new(shader));
        check
    }

    fn unsupported(&mut self) -> VisitAction {
        self.unsupported = true;
        VisitAction::Stop
    }
}
impl Visitor for BranchCheck {
    fn enter_call(&mut self, _: &Call, _: VisitCx) -> VisitAction {
        self.unsupported()
    }
    fn enter_discard(&mut self, _: Option<&Rvalue>, _: VisitCx) -> VisitAction {
        self.unsupported()
    }
    fn enter_return(&mut self, _: Option<&Rvalue>, _: VisitCx) -> VisitAction {
        self.unsupported()
    }
    fn enter_loop(&mut self, _: &[Statement], _: VisitCx) -> VisitAction {
        self.unsupported()
    }
    fn visit_loop_jump(&mut self, _: LoopJump, _: VisitCx) -> VisitAction {
        self.unsupported()
    }
    fn visit_emit_vertex(&mut self, _: VisitCx) -> VisitAction {
        self.unsupported()
    }
    fn visit_end_primitive(&mut self, _: VisitCx) -> VisitAction {
        self.unsupported()
    }
    // left behind by a declined inner flattening
    fn enter_if(&mut self, _: &IfStatement, _: VisitCx) -> VisitAction {
        self.unsupported()
    }

    fn visit_variable(&mut self, var: VarRef, cx: VisitCx) -> VisitAction {
        // control invocations share their outputs, so writes must stay unconditional
        if self.stage == ShaderStage::TessControl
            && cx.in_assignee
            && cx.shader.var(var).mode == VariableMode::ShaderOut
        {
            return self.unsupported();
        }
        VisitAction::Continue
    }

    fn enter_texture(&mut self, _: &Texture, _: VisitCx) -> VisitAction {
        self.expensive = true;
        VisitAction::Continue
    }

    fn enter_expression(&mut self, _: &Expression, _: VisitCx) -> VisitAction {
        self.cost += 1;
        VisitAction::Continue
    }

    fn enter_array_deref(&mut self, d: &Deref, _: VisitCx) -> VisitAction {
        if let Deref::Array { index, .. } = d {
            if !matches!(**index, Rvalue::Constant(_)) {
                self.dynamic_index = true;
            }
        }
        self.cost += 1;
        VisitAction::Continue
    }

    fn enter_record_deref(&mut self, _: &Deref, _: VisitCx) -> VisitAction {
        self.cost += 1;
        VisitAction::Continue
    }
}

struct IfToCondAssign {
    stage: ShaderStage,
    max_depth: u32,
    min_branch_cost: u32,
    depth: u32,
    /// Guard temporaries introduced so far, each with whether an enclosing guard was already
    /// ANDed into its value.
    guards: BTreeMap<VarRef, bool>,
}
impl IfToCondAssign {
    fn block(&mut self, shader: &mut Shader, stmts: &mut Vec<Statement>) -> bool {
        let mut modified = false;
        for s in core::mem::take(stmts) {
            match s {
                Statement::If(mut i) => {
                    self.depth += 1;
                    modified |= self.block(shader, &mut i.then_instructions);
                    modified |= self.block(shader, &mut i.else_instructions);
                    let must_lower = self.depth > self.max_depth;
                    self.depth -= 1;

                    if self.should_flatten(shader, &i, must_lower) {
                        self.flatten(shader, i, stmts);
                        modified = true;
                    } else {
                        stmts.push(Statement::If(i));
                    }
                }
                Statement::Loop(mut body) => {
                    modified |= self.block(shader, &mut body);
                    stmts.push(Statement::Loop(body));
                }
                other => stmts.push(other),
            }
        }

        modified
    }

    fn should_flatten(&self, shader: &Shader, i: &IfStatement, must_lower: bool) -> bool {
        if !must_lower && self.min_branch_cost == 0 {
            return false;
        }

        let then_check = BranchCheck::run(shader, self.stage, &i.then_instructions);
        let else_check = BranchCheck::run(shader, self.stage, &i.else_instructions);
        if then_check.unsupported || else_check.unsupported {
            log::trace!("[if_to_cond_assign] branch holds an unsupported statement");
            return false;
        }
        if then_check.expensive || else_check.expensive {
            log::trace!("[if_to_cond_assign] branch samples a texture");
            return false;
        }
        if then_check.dynamic_index || else_check.dynamic_index {
            log::trace!("[if_to_cond_assign] branch indexes dynamically");
            return false;
        }

        let cost = then_check.cost.max(else_check.cost);
        if must_lower {
            true
        } else if cost >= self.min_branch_cost {
            log::trace!(
                "[if_to_cond_assign] branch cost {cost} reaches the limit {}",
                self.min_branch_cost
            );
            false
        } else {
            true
        }
    }

    fn flatten(&mut self, shader: &mut Shader, i: IfStatement, out: &mut Vec<Statement>) {
        log::debug!("[if_to_cond_assign] flattening if at depth {}", self.depth + 1);

        let then_var = builder::store_temporary(shader, "if_to_cond_assign_then", i.condition, out);
        self.move_block(shader, i.then_instructions, then_var, out);
        self.guards.insert(then_var, false);

        if !i.else_instructions.is_empty() {
            let inverse = builder::logic_not(Rvalue::var(then_var));
            let else_var = builder::store_temporary(shader, "if_to_cond_assign_else", inverse, out);
            self.move_block(shader, i.else_instructions, else_var, out);
            self.guards.insert(else_var, false);
        }
    }

    fn move_block(&mut self, shader: &Shader, stmts: Vec<Statement>, guard: VarRef, out: &mut Vec<Statement>) {
        for mut s in stmts {
            if let Statement::Assign(a) = &mut s {
                self.guard_assignment(shader, a, guard);
            }
            out.push(s);
        }
    }

    fn guard_assignment(&mut self, shader: &Shader, a: &mut Assignment, guard: VarRef) {
        if let Some(anded) = a.lhs.as_variable().and_then(|v| self.guards.get_mut(&v)) {
            if !*anded {
                let rhs = core::mem::replace(&mut a.rhs, Rvalue::var(guard));
                a.rhs = builder::logic_and(Rvalue::var(guard), rhs);
                *anded = true;
            }
            return;
        }

        // moved out of an inner flattened if already
        if a.condition.as_ref().is_some_and(|c| {
            referenced_variables(c, shader)
                .iter()
                .any(|v| self.guards.contains_key(v))
        }) {
            return;
        }

        a.condition = Some(match a.condition.take() {
            None => Rvalue::var(guard),
            Some(c) => builder::logic_and(Rvalue::var(guard), c),
        });
    }
}

/// Flattens every `if` nested deeper than `max_depth`, and every other `if` whose branches
/// each cost less than `min_branch_cost` and hold no texture lookup or dynamic index.
/// A `min_branch_cost` of 0 restricts flattening to the depth rule; a `max_depth` of
/// `u32::MAX` disables the depth rule.
pub fn lower_if_to_cond_assign(
    shader: &mut Shader,
    stage: ShaderStage,
    max_depth: u32,
    min_branch_cost: u32,
) -> bool {
    let mut lowering = IfToCondAssign {
        stage,
        max_depth,
        min_branch_cost,
        depth: 0,
        guards: BTreeMap::new(),
    };
    shader.for_each_body(|shader, _, body| lowering.block(shader, body))
}
