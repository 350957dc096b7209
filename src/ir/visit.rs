//! Traversal over IR trees.
//!
//! [`Visitor`] is the read-only hierarchical visitor: every composite node kind gets an
//! `enter_*`/`leave_*` pair, every leaf a single `visit_*` hook. [`RvalueRewriter`] is the
//! mutating counterpart, replacing r-values bottom-up and letting the rewrite emit statements
//! that land before the statement being rewritten.

use std::sync::Arc;

use crate::glsl_type::StructType;

use super::{
    constant::Constant, Assignment, Call, Deref, Expression, FunctionRef, IfStatement, LodInfo,
    LoopJump, Rvalue, Shader, SignatureRef, Statement, Swizzle, Texture, VarRef,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitAction {
    /// Descend into children and keep going.
    Continue,
    /// From an `enter_*` hook: skip the children and the matching `leave_*`.
    /// From a leaf or `leave_*` hook: skip the remaining siblings and resume at the parent.
    ContinueWithParent,
    /// Abort the whole traversal.
    Stop,
}

/// Traversal state handed to every hook.
#[derive(Clone, Copy)]
pub struct VisitCx<'s> {
    pub shader: &'s Shader,
    /// The node being visited is (part of) a location being written.
    ///
    /// Array indices inside a written dereference chain are always visited with this unset.
    pub in_assignee: bool,
}
impl<'s> VisitCx<'s> {
    pub const fn new(shader: &'s Shader) -> Self {
        Self {
            shader,
            in_assignee: false,
        }
    }

    #[inline(always)]
    const fn assignee(self, in_assignee: bool) -> Self {
        Self {
            shader: self.shader,
            in_assignee,
        }
    }
}

#[allow(unused_variables)]
pub trait Visitor {
    fn visit_declaration(&mut self, var: VarRef, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    /// A dereference of a whole variable.
    fn visit_variable(&mut self, var: VarRef, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn visit_constant(&mut self, c: &Constant, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn visit_loop_jump(&mut self, jump: LoopJump, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn visit_emit_vertex(&mut self, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn visit_end_primitive(&mut self, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn visit_type_decl(&mut self, ty: &Arc<StructType>, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn visit_precision(&mut self, text: &str, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }

    fn enter_expression(&mut self, e: &Expression, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn leave_expression(&mut self, e: &Expression, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn enter_swizzle(&mut self, s: &Swizzle, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn leave_swizzle(&mut self, s: &Swizzle, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn enter_texture(&mut self, t: &Texture, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn leave_texture(&mut self, t: &Texture, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    /// `d` is always [`Deref::Array`].
    fn enter_array_deref(&mut self, d: &Deref, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn leave_array_deref(&mut self, d: &Deref, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    /// `d` is always [`Deref::Record`].
    fn enter_record_deref(&mut self, d: &Deref, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn leave_record_deref(&mut self, d: &Deref, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }

    fn enter_assignment(&mut self, a: &Assignment, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn leave_assignment(&mut self, a: &Assignment, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn enter_call(&mut self, c: &Call, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn leave_call(&mut self, c: &Call, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn enter_return(&mut self, value: Option<&Rvalue>, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn leave_return(&mut self, value: Option<&Rvalue>, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn enter_discard(&mut self, condition: Option<&Rvalue>, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn leave_discard(&mut self, condition: Option<&Rvalue>, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn enter_if(&mut self, s: &IfStatement, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn leave_if(&mut self, s: &IfStatement, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn enter_loop(&mut self, body: &[Statement], cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn leave_loop(&mut self, body: &[Statement], cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn enter_function(&mut self, f: FunctionRef, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn leave_function(&mut self, f: FunctionRef, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    /// Parameters are not visited, only the body.
    fn enter_signature(&mut self, sig: SignatureRef, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
    fn leave_signature(&mut self, sig: SignatureRef, cx: VisitCx) -> VisitAction {
        VisitAction::Continue
    }
}

/// Runs each child walk in order; `ContinueWithParent` from a child skips the rest,
/// `Stop` returns from the enclosing function.
macro_rules! walk_children {
    ($($e:expr),* $(,)?) => {
        'children: {
            $(
                match $e {
                    VisitAction::Stop => return VisitAction::Stop,
                    VisitAction::ContinueWithParent => break 'children,
                    VisitAction::Continue => (),
                }
            )*
        }
    };
}

/// Handles the result of an `enter_*` hook.
macro_rules! enter {
    ($e:expr) => {
        match $e {
            VisitAction::Stop => return VisitAction::Stop,
            VisitAction::ContinueWithParent => return VisitAction::Continue,
            VisitAction::Continue => (),
        }
    };
}

/// Walks every global and every function body of `shader`.
pub fn walk_shader<V: Visitor + ?Sized>(v: &mut V, shader: &Shader) -> VisitAction {
    walk_statements(v, &shader.instructions, VisitCx::new(shader))
}

pub fn walk_statements<V: Visitor + ?Sized>(
    v: &mut V,
    stmts: &[Statement],
    cx: VisitCx,
) -> VisitAction {
    for s in stmts {
        match walk_statement(v, s, cx) {
            VisitAction::Continue => (),
            a => return a,
        }
    }

    VisitAction::Continue
}

fn walk_optional<V: Visitor + ?Sized>(v: &mut V, rv: Option<&Rvalue>, cx: VisitCx) -> VisitAction {
    rv.map_or(VisitAction::Continue, |rv| walk_rvalue(v, rv, cx))
}

fn walk_rvalues<V: Visitor + ?Sized>(v: &mut V, rvs: &[Rvalue], cx: VisitCx) -> VisitAction {
    for rv in rvs {
        match walk_rvalue(v, rv, cx) {
            VisitAction::Continue => (),
            a => return a,
        }
    }

    VisitAction::Continue
}

pub fn walk_statement<V: Visitor + ?Sized>(v: &mut V, s: &Statement, cx: VisitCx) -> VisitAction {
    let cx = cx.assignee(false);

    match s {
        &Statement::Declaration(var) => v.visit_declaration(var, cx),
        &Statement::LoopJump(j) => v.visit_loop_jump(j, cx),
        Statement::EmitVertex => v.visit_emit_vertex(cx),
        Statement::EndPrimitive => v.visit_end_primitive(cx),
        Statement::TypeDecl(t) => v.visit_type_decl(t, cx),
        Statement::Precision(p) => v.visit_precision(p, cx),
        Statement::Assign(a) => {
            enter!(v.enter_assignment(a, cx));
            walk_children!(
                walk_deref(v, &a.lhs, cx.assignee(true)),
                walk_rvalue(v, &a.rhs, cx),
                walk_optional(v, a.condition.as_ref(), cx),
            );
            v.leave_assignment(a, cx)
        }
        Statement::Call(c) => {
            enter!(v.enter_call(c, cx));
            walk_children!(
                walk_call_arguments(v, c, cx),
                c.return_deref
                    .as_ref()
                    .map_or(VisitAction::Continue, |d| walk_deref(v, d, cx.assignee(true))),
                c.sub_var
                    .as_ref()
                    .map_or(VisitAction::Continue, |d| walk_deref(v, d, cx)),
            );
            v.leave_call(c, cx)
        }
        Statement::Return(value) => {
            enter!(v.enter_return(value.as_ref(), cx));
            walk_children!(walk_optional(v, value.as_ref(), cx));
            v.leave_return(value.as_ref(), cx)
        }
        Statement::Discard(cond) => {
            enter!(v.enter_discard(cond.as_ref(), cx));
            walk_children!(walk_optional(v, cond.as_ref(), cx));
            v.leave_discard(cond.as_ref(), cx)
        }
        Statement::If(i) => {
            enter!(v.enter_if(i, cx));
            walk_children!(
                walk_rvalue(v, &i.condition, cx),
                walk_statements(v, &i.then_instructions, cx),
                walk_statements(v, &i.else_instructions, cx),
            );
            v.leave_if(i, cx)
        }
        Statement::Loop(body) => {
            enter!(v.enter_loop(body, cx));
            walk_children!(walk_statements(v, body, cx));
            v.leave_loop(body, cx)
        }
        &Statement::Function(f) => {
            enter!(v.enter_function(f, cx));
            walk_children!(walk_signatures(v, f, cx));
            v.leave_function(f, cx)
        }
    }
}

fn walk_signatures<V: Visitor + ?Sized>(v: &mut V, f: FunctionRef, cx: VisitCx) -> VisitAction {
    for &sig in &cx.shader.function(f).signatures {
        match walk_signature(v, sig, cx) {
            VisitAction::Continue => (),
            a => return a,
        }
    }

    VisitAction::Continue
}

fn walk_signature<V: Visitor + ?Sized>(v: &mut V, sig: SignatureRef, cx: VisitCx) -> VisitAction {
    enter!(v.enter_signature(sig, cx));
    walk_children!(walk_statements(v, &cx.shader.signature(sig).body, cx));
    v.leave_signature(sig, cx)
}

fn walk_call_arguments<V: Visitor + ?Sized>(v: &mut V, c: &Call, cx: VisitCx) -> VisitAction {
    let params = &cx.shader.signature(c.callee).parameters;
    for (arg, &param) in c.actual_parameters.iter().zip(params) {
        let written = cx.shader.var(param).mode.writes_back();
        match walk_rvalue(v, arg, cx.assignee(written)) {
            VisitAction::Continue => (),
            a => return a,
        }
    }

    VisitAction::Continue
}

pub fn walk_rvalue<V: Visitor + ?Sized>(v: &mut V, rv: &Rvalue, cx: VisitCx) -> VisitAction {
    match rv {
        Rvalue::Constant(c) => v.visit_constant(c, cx),
        Rvalue::Deref(d) => walk_deref(v, d, cx),
        Rvalue::Expression(e) => {
            enter!(v.enter_expression(e, cx));
            walk_children!(walk_rvalues(v, &e.operands, cx));
            v.leave_expression(e, cx)
        }
        Rvalue::Swizzle(s) => {
            enter!(v.enter_swizzle(s, cx));
            walk_children!(walk_rvalue(v, &s.val, cx));
            v.leave_swizzle(s, cx)
        }
        Rvalue::Texture(t) => {
            let cx = cx.assignee(false);
            enter!(v.enter_texture(t, cx));
            walk_children!(
                walk_deref(v, &t.sampler, cx),
                walk_optional(v, t.coordinate.as_ref(), cx),
                walk_optional(v, t.projector.as_ref(), cx),
                walk_optional(v, t.shadow_comparator.as_ref(), cx),
                walk_optional(v, t.offset.as_ref(), cx),
                walk_lod(v, &t.lod_info, cx),
            );
            v.leave_texture(t, cx)
        }
    }
}

fn walk_lod<V: Visitor + ?Sized>(v: &mut V, lod: &LodInfo, cx: VisitCx) -> VisitAction {
    match lod {
        LodInfo::None => VisitAction::Continue,
        LodInfo::Bias(x) | LodInfo::Lod(x) => walk_rvalue(v, x, cx),
        LodInfo::Grad { dpdx, dpdy } => match walk_rvalue(v, dpdx, cx) {
            VisitAction::Continue => walk_rvalue(v, dpdy, cx),
            a => a,
        },
    }
}

pub fn walk_deref<V: Visitor + ?Sized>(v: &mut V, d: &Deref, cx: VisitCx) -> VisitAction {
    match d {
        &Deref::Variable(var) => v.visit_variable(var, cx),
        Deref::Array { array, index, .. } => {
            enter!(v.enter_array_deref(d, cx));
            walk_children!(
                walk_rvalue(v, array, cx),
                walk_rvalue(v, index, cx.assignee(false)),
            );
            v.leave_array_deref(d, cx)
        }
        Deref::Record { record, .. } => {
            enter!(v.enter_record_deref(d, cx));
            walk_children!(walk_rvalue(v, record, cx));
            v.leave_record_deref(d, cx)
        }
    }
}

/// Mutating r-value traversal.
///
/// [`RvalueRewriter::rewrite`] sees every r-value after its children, including the
/// dereferences on the written side of assignments and calls (wrapped as [`Rvalue::Deref`]
/// for the duration of the call; they must stay dereferences). Statements pushed to `pending`
/// are inserted before the statement currently being rewritten.
#[allow(unused_variables)]
pub trait RvalueRewriter {
    /// Whether to descend into the children of `rv`.
    fn descend(&mut self, rv: &Rvalue, shader: &Shader, in_assignee: bool) -> bool {
        true
    }

    fn rewrite(
        &mut self,
        shader: &mut Shader,
        rv: &mut Rvalue,
        in_assignee: bool,
        pending: &mut Vec<Statement>,
    ) -> bool;

    /// Called for a statement after its r-values were rewritten, before its nested blocks.
    fn after_statement(&mut self, shader: &mut Shader, s: &mut Statement) -> bool {
        false
    }
}

/// Rewrites every r-value of every function body.
pub fn rewrite_shader<R: RvalueRewriter + ?Sized>(shader: &mut Shader, r: &mut R) -> bool {
    shader.for_each_body(|shader, _, body| rewrite_statements(body, shader, r))
}

pub fn rewrite_statements<R: RvalueRewriter + ?Sized>(
    stmts: &mut Vec<Statement>,
    shader: &mut Shader,
    r: &mut R,
) -> bool {
    let mut modified = false;
    for mut s in core::mem::take(stmts) {
        let mut pending = Vec::new();
        modified |= rewrite_statement(&mut s, shader, r, &mut pending);
        stmts.append(&mut pending);
        stmts.push(s);
    }

    modified
}

fn rewrite_statement<R: RvalueRewriter + ?Sized>(
    s: &mut Statement,
    shader: &mut Shader,
    r: &mut R,
    pending: &mut Vec<Statement>,
) -> bool {
    let mut modified = match s {
        Statement::Assign(a) => {
            let mut m = rewrite_lvalue(&mut a.lhs, shader, r, true, pending);
            m |= rewrite_rvalue(&mut a.rhs, shader, r, false, pending);
            if let Some(c) = a.condition.as_mut() {
                m |= rewrite_rvalue(c, shader, r, false, pending);
            }
            m
        }
        Statement::Call(c) => {
            let mut m = false;
            let params = shader.signature(c.callee).parameters.clone();
            for (arg, param) in c.actual_parameters.iter_mut().zip(params) {
                let written = shader.var(param).mode.writes_back();
                m |= rewrite_rvalue(arg, shader, r, written, pending);
            }
            if let Some(d) = c.return_deref.as_mut() {
                m |= rewrite_lvalue(d, shader, r, true, pending);
            }
            if let Some(d) = c.sub_var.as_mut() {
                m |= rewrite_lvalue(d, shader, r, false, pending);
            }
            m
        }
        Statement::Return(Some(v)) | Statement::Discard(Some(v)) => {
            rewrite_rvalue(v, shader, r, false, pending)
        }
        Statement::If(i) => rewrite_rvalue(&mut i.condition, shader, r, false, pending),
        _ => false,
    };

    modified |= r.after_statement(shader, s);
    match s {
        Statement::If(i) => {
            modified |= rewrite_statements(&mut i.then_instructions, shader, r);
            modified |= rewrite_statements(&mut i.else_instructions, shader, r);
        }
        Statement::Loop(body) => modified |= rewrite_statements(body, shader, r),
        _ => (),
    }

    modified
}

/// Rewrites a dereference in a context that requires a dereference back.
pub fn rewrite_lvalue<R: RvalueRewriter + ?Sized>(
    d: &mut Deref,
    shader: &mut Shader,
    r: &mut R,
    in_assignee: bool,
    pending: &mut Vec<Statement>,
) -> bool {
    let mut rv = Rvalue::Deref(core::mem::replace(d, Deref::Variable(VarRef(usize::MAX))));
    let modified = rewrite_rvalue(&mut rv, shader, r, in_assignee, pending);
    match rv {
        Rvalue::Deref(x) => *d = x,
        other => panic!("l-value rewritten into a non-dereference: {other:?}"),
    }

    modified
}

pub fn rewrite_rvalue<R: RvalueRewriter + ?Sized>(
    rv: &mut Rvalue,
    shader: &mut Shader,
    r: &mut R,
    in_assignee: bool,
    pending: &mut Vec<Statement>,
) -> bool {
    let mut modified = false;
    if r.descend(rv, shader, in_assignee) {
        match rv {
            Rvalue::Constant(_) | Rvalue::Deref(Deref::Variable(_)) => (),
            Rvalue::Deref(Deref::Array { array, index, .. }) => {
                modified |= rewrite_rvalue(array, shader, r, in_assignee, pending);
                modified |= rewrite_rvalue(index, shader, r, false, pending);
            }
            Rvalue::Deref(Deref::Record { record, .. }) => {
                modified |= rewrite_rvalue(record, shader, r, in_assignee, pending);
            }
            Rvalue::Expression(e) => {
                for x in &mut e.operands {
                    modified |= rewrite_rvalue(x, shader, r, false, pending);
                }
            }
            Rvalue::Swizzle(s) => {
                modified |= rewrite_rvalue(&mut s.val, shader, r, in_assignee, pending);
            }
            Rvalue::Texture(t) => {
                modified |= rewrite_lvalue(&mut t.sampler, shader, r, false, pending);
                for x in [
                    &mut t.coordinate,
                    &mut t.projector,
                    &mut t.shadow_comparator,
                    &mut t.offset,
                ]
                .into_iter()
                .flatten()
                {
                    modified |= rewrite_rvalue(x, shader, r, false, pending);
                }
                match &mut t.lod_info {
                    LodInfo::None => (),
                    LodInfo::Bias(x) | LodInfo::Lod(x) => {
                        modified |= rewrite_rvalue(x, shader, r, false, pending);
                    }
                    LodInfo::Grad { dpdx, dpdy } => {
                        modified |= rewrite_rvalue(dpdx, shader, r, false, pending);
                        modified |= rewrite_rvalue(dpdy, shader, r, false, pending);
                    }
                }
            }
        }
    }

    modified | r.rewrite(shader, rv, in_assignee, pending)
}

/// Applies `f` to every statement list nested in `stmts` (innermost first), then to `stmts`.
pub fn for_each_block<F: FnMut(&mut Vec<Statement>) -> bool>(
    stmts: &mut Vec<Statement>,
    f: &mut F,
) -> bool {
    let mut modified = false;
    for s in stmts.iter_mut() {
        match s {
            Statement::If(i) => {
                modified |= for_each_block(&mut i.then_instructions, f);
                modified |= for_each_block(&mut i.else_instructions, f);
            }
            Statement::Loop(body) => modified |= for_each_block(body, f),
            _ => (),
        }
    }

    modified | f(stmts)
}

/// Collects every variable read or written inside `rv`.
pub fn referenced_variables(rv: &Rvalue, shader: &Shader) -> Vec<VarRef> {
    struct Collect(Vec<VarRef>);
    impl Visitor for Collect {
        fn visit_variable(&mut self, var: VarRef, _: VisitCx) -> VisitAction {
            self.0.push(var);
            VisitAction::Continue
        }
    }

    let mut c = Collect(Vec::new());
    walk_rvalue(&mut c, rv, VisitCx::new(shader));
    c.0
}
