//! Scalar replacement of aggregates, shared by structure and array splitting.
//!
//! A candidate is declared where the pass can see it and is only ever accessed one
//! statically known component at a time, or copied whole to or from another variable. Each
//! candidate is replaced by one variable per component.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    glsl_type::GlslType,
    ir::{
        visit::{rewrite_shader, walk_shader, RvalueRewriter, VisitAction, VisitCx, Visitor},
        Assignment, Deref, Rvalue, Shader, SignatureRef, Statement, VarRef, Variable,
    },
    symbol::meta::VariableMode,
};

/// The kind of aggregate a splitting pass takes apart.
pub(super) trait Aggregate {
    /// Log prefix of the pass.
    const PASS: &'static str;

    /// Whether a variable may be split, judging by its type alone.
    fn splittable_type(ty: &GlslType) -> bool;

    /// The variable and component number `d` accesses, if `d` accesses a single statically
    /// known component of a whole variable.
    fn component_access(shader: &Shader, d: &Deref) -> Option<(VarRef, i64)>;

    /// Name suffix and type of every component of `ty`.
    fn components(ty: &GlslType) -> Vec<(String, GlslType)>;

    /// Component `i` of an aggregate that is not split.
    fn component(shader: &Shader, value: Deref, i: usize) -> Deref;
}

fn splittable<A: Aggregate>(var: &Variable) -> bool {
    matches!(var.mode, VariableMode::Auto | VariableMode::Temporary) && A::splittable_type(&var.ty)
}

struct Candidates<A> {
    linked: bool,
    in_signature: bool,
    declared: BTreeSet<VarRef>,
    whole: BTreeSet<VarRef>,
    _kind: core::marker::PhantomData<A>,
}
impl<A: Aggregate> Visitor for Candidates<A> {
    fn visit_declaration(&mut self, var: VarRef, cx: VisitCx) -> VisitAction {
        if (self.linked || self.in_signature) && splittable::<A>(cx.shader.var(var)) {
            self.declared.insert(var);
        }
        VisitAction::Continue
    }

    fn enter_signature(&mut self, _sig: SignatureRef, _cx: VisitCx) -> VisitAction {
        self.in_signature = true;
        VisitAction::Continue
    }

    fn leave_signature(&mut self, _sig: SignatureRef, _cx: VisitCx) -> VisitAction {
        self.in_signature = false;
        VisitAction::Continue
    }

    fn visit_variable(&mut self, var: VarRef, _cx: VisitCx) -> VisitAction {
        self.whole.insert(var);
        VisitAction::Continue
    }

    fn enter_array_deref(&mut self, d: &Deref, cx: VisitCx) -> VisitAction {
        self.component(d, cx)
    }

    fn enter_record_deref(&mut self, d: &Deref, cx: VisitCx) -> VisitAction {
        self.component(d, cx)
    }

    fn enter_assignment(&mut self, a: &Assignment, _cx: VisitCx) -> VisitAction {
        // whole copies between variables are unrolled component-wise
        match (&a.lhs, &a.rhs, &a.condition) {
            (Deref::Variable(_), Rvalue::Deref(Deref::Variable(_)), None) => {
                VisitAction::ContinueWithParent
            }
            _ => VisitAction::Continue,
        }
    }
}
impl<A: Aggregate> Candidates<A> {
    fn component(&mut self, d: &Deref, cx: VisitCx) -> VisitAction {
        match A::component_access(cx.shader, d) {
            Some(_) => VisitAction::ContinueWithParent,
            None => VisitAction::Continue,
        }
    }
}

type Split = BTreeMap<VarRef, Vec<VarRef>>;

/// Declares the components in place of the aggregate and unrolls whole copies.
fn expand<A: Aggregate>(shader: &Shader, stmts: &mut Vec<Statement>, split: &Split) {
    for mut s in core::mem::take(stmts) {
        match &mut s {
            Statement::Declaration(v) if split.contains_key(v) => {
                stmts.extend(split[v].iter().map(|&c| Statement::Declaration(c)));
                continue;
            }
            Statement::Assign(a) => {
                if let (&Deref::Variable(l), Rvalue::Deref(Deref::Variable(r))) = (&a.lhs, &a.rhs) {
                    let r = *r;
                    let count = split.get(&l).or_else(|| split.get(&r)).map(Vec::len);
                    if let Some(count) = count {
                        let side = |v: VarRef, i: usize| match split.get(&v) {
                            Some(components) => Deref::Variable(components[i]),
                            None => A::component(shader, Deref::Variable(v), i),
                        };
                        for i in 0..count {
                            let mut unrolled =
                                Assignment::new(side(l, i), Rvalue::Deref(side(r, i)), shader);
                            unrolled.condition = a.condition.clone();
                            stmts.push(Statement::Assign(unrolled));
                        }
                        continue;
                    }
                }
            }
            Statement::If(i) => {
                expand::<A>(shader, &mut i.then_instructions, split);
                expand::<A>(shader, &mut i.else_instructions, split);
            }
            Statement::Loop(body) => expand::<A>(shader, body, split),
            _ => (),
        }
        stmts.push(s);
    }
}

struct Replace<'s, A> {
    split: &'s Split,
    _kind: core::marker::PhantomData<A>,
}
impl<A: Aggregate> RvalueRewriter for Replace<'_, A> {
    fn rewrite(
        &mut self,
        shader: &mut Shader,
        rv: &mut Rvalue,
        _in_assignee: bool,
        pending: &mut Vec<Statement>,
    ) -> bool {
        let Rvalue::Deref(d) = rv else {
            return false;
        };
        let Some((v, i)) = A::component_access(shader, d) else {
            return false;
        };
        let Some(components) = self.split.get(&v) else {
            return false;
        };

        let replacement = match usize::try_from(i).ok().and_then(|i| components.get(i)) {
            Some(&c) => c,
            None => {
                // out of bounds: reads an undefined value, writes go nowhere
                let ty = d.ty(shader);
                let undef = shader.new_temporary("undef", ty);
                pending.push(Statement::Declaration(undef));
                undef
            }
        };
        *rv = Rvalue::var(replacement);
        true
    }
}

/// Splits every candidate of kind `A`. Global variables are only considered when `linked`.
pub(super) fn split_aggregates<A: Aggregate>(shader: &mut Shader, linked: bool) -> bool {
    let mut candidates = Candidates::<A> {
        linked,
        in_signature: false,
        declared: BTreeSet::new(),
        whole: BTreeSet::new(),
        _kind: core::marker::PhantomData,
    };
    walk_shader(&mut candidates, shader);

    let mut split = Split::new();
    for v in candidates.declared.difference(&candidates.whole).copied() {
        let var = shader.var(v).clone();
        log::debug!("[{}] splitting {}", A::PASS, var.name);
        let components = A::components(&var.ty)
            .into_iter()
            .map(|(suffix, ty)| {
                shader.add_variable(Variable::new(format!("{}_{suffix}", var.name), ty, var.mode))
            })
            .collect();
        split.insert(v, components);
    }
    if split.is_empty() {
        return false;
    }

    let mut globals = core::mem::take(&mut shader.instructions);
    expand::<A>(shader, &mut globals, &split);
    shader.instructions = globals;
    shader.for_each_body(|shader, _, body| {
        expand::<A>(shader, body, &split);
        false
    });
    rewrite_shader(
        shader,
        &mut Replace::<A> {
            split: &split,
            _kind: core::marker::PhantomData,
        },
    );

    true
}
