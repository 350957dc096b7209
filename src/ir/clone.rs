//! Deep copies with variable remapping, and structural comparison.

use std::collections::HashMap;

use super::{
    Assignment, Call, Deref, IfStatement, LodInfo, Rvalue, Shader, Statement, Texture, VarRef,
};

/// Deep-copies IR, giving every declaration inside the copied tree a fresh variable.
///
/// Dereferences of a variable found in `var_map` are redirected to its mapped variable;
/// any other variable is shared with the original. Callers may seed the map (the inliner maps
/// callee parameters to their temporaries this way).
#[derive(Debug, Default)]
pub struct Cloner {
    pub var_map: HashMap<VarRef, VarRef>,
}
impl Cloner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_map(var_map: HashMap<VarRef, VarRef>) -> Self {
        Self { var_map }
    }

    fn map(&self, v: VarRef) -> VarRef {
        self.var_map.get(&v).copied().unwrap_or(v)
    }

    pub fn clone_statements(&mut self, shader: &mut Shader, stmts: &[Statement]) -> Vec<Statement> {
        stmts.iter().map(|s| self.clone_statement(shader, s)).collect()
    }

    pub fn clone_statement(&mut self, shader: &mut Shader, s: &Statement) -> Statement {
        match s {
            &Statement::Declaration(v) => {
                let copy = shader.var(v).clone();
                let nv = shader.add_variable(copy);
                self.var_map.insert(v, nv);
                Statement::Declaration(nv)
            }
            Statement::Assign(a) => Statement::Assign(Assignment {
                lhs: self.clone_deref(&a.lhs),
                rhs: self.clone_rvalue(&a.rhs),
                write_mask: a.write_mask,
                condition: a.condition.as_ref().map(|c| self.clone_rvalue(c)),
            }),
            Statement::Call(c) => Statement::Call(Call {
                callee: c.callee,
                actual_parameters: c
                    .actual_parameters
                    .iter()
                    .map(|x| self.clone_rvalue(x))
                    .collect(),
                return_deref: c.return_deref.as_ref().map(|d| self.clone_deref(d)),
                sub_var: c.sub_var.as_ref().map(|d| self.clone_deref(d)),
            }),
            Statement::Return(v) => Statement::Return(v.as_ref().map(|x| self.clone_rvalue(x))),
            Statement::Discard(c) => Statement::Discard(c.as_ref().map(|x| self.clone_rvalue(x))),
            Statement::If(i) => Statement::If(IfStatement {
                condition: self.clone_rvalue(&i.condition),
                then_instructions: self.clone_statements(shader, &i.then_instructions),
                else_instructions: self.clone_statements(shader, &i.else_instructions),
            }),
            Statement::Loop(body) => Statement::Loop(self.clone_statements(shader, body)),
            Statement::LoopJump(_)
            | Statement::EmitVertex
            | Statement::EndPrimitive
            | Statement::Function(_)
            | Statement::TypeDecl(_)
            | Statement::Precision(_) => s.clone(),
        }
    }

    pub fn clone_rvalue(&self, rv: &Rvalue) -> Rvalue {
        let mut x = rv.clone();
        substitute_rvalue(&mut x, &mut |v| {
            self.var_map.get(&v).map(|&nv| Deref::Variable(nv))
        });
        x
    }

    pub fn clone_deref(&self, d: &Deref) -> Deref {
        match d {
            &Deref::Variable(v) => Deref::Variable(self.map(v)),
            Deref::Array { array, index, ty } => Deref::Array {
                array: Box::new(self.clone_rvalue(array)),
                index: Box::new(self.clone_rvalue(index)),
                ty: ty.clone(),
            },
            Deref::Record { record, field, ty } => Deref::Record {
                record: Box::new(self.clone_rvalue(record)),
                field: field.clone(),
                ty: ty.clone(),
            },
        }
    }
}

/// Replaces dereferences of whole variables for which `f` returns a replacement.
pub fn substitute_rvalue(rv: &mut Rvalue, f: &mut impl FnMut(VarRef) -> Option<Deref>) -> bool {
    match rv {
        Rvalue::Constant(_) => false,
        Rvalue::Deref(d) => substitute_deref(d, f),
        Rvalue::Expression(e) => e
            .operands
            .iter_mut()
            .fold(false, |m, x| substitute_rvalue(x, f) | m),
        Rvalue::Swizzle(s) => substitute_rvalue(&mut s.val, f),
        Rvalue::Texture(t) => substitute_texture(t, f),
    }
}

fn substitute_texture(t: &mut Texture, f: &mut impl FnMut(VarRef) -> Option<Deref>) -> bool {
    let mut m = substitute_deref(&mut t.sampler, f);
    for x in [
        &mut t.coordinate,
        &mut t.projector,
        &mut t.shadow_comparator,
        &mut t.offset,
    ]
    .into_iter()
    .flatten()
    {
        m |= substitute_rvalue(x, f);
    }
    match &mut t.lod_info {
        LodInfo::None => (),
        LodInfo::Bias(x) | LodInfo::Lod(x) => m |= substitute_rvalue(x, f),
        LodInfo::Grad { dpdx, dpdy } => {
            m |= substitute_rvalue(dpdx, f);
            m |= substitute_rvalue(dpdy, f);
        }
    }

    m
}

pub fn substitute_deref(d: &mut Deref, f: &mut impl FnMut(VarRef) -> Option<Deref>) -> bool {
    match d {
        &mut Deref::Variable(v) => match f(v) {
            Some(replacement) => {
                *d = replacement;
                true
            }
            None => false,
        },
        Deref::Array { array, index, .. } => {
            substitute_rvalue(array, f) | substitute_rvalue(index, f)
        }
        Deref::Record { record, .. } => substitute_rvalue(record, f),
    }
}

/// Substitutes variable dereferences throughout a statement list.
pub fn substitute_statements(
    stmts: &mut [Statement],
    f: &mut impl FnMut(VarRef) -> Option<Deref>,
) -> bool {
    let mut m = false;
    for s in stmts {
        m |= match s {
            Statement::Assign(a) => {
                let mut m = substitute_deref(&mut a.lhs, f) | substitute_rvalue(&mut a.rhs, f);
                if let Some(c) = a.condition.as_mut() {
                    m |= substitute_rvalue(c, f);
                }
                m
            }
            Statement::Call(c) => {
                let mut m = c
                    .actual_parameters
                    .iter_mut()
                    .fold(false, |m, x| substitute_rvalue(x, f) | m);
                for d in [c.return_deref.as_mut(), c.sub_var.as_mut()].into_iter().flatten() {
                    m |= substitute_deref(d, f);
                }
                m
            }
            Statement::Return(Some(v)) | Statement::Discard(Some(v)) => substitute_rvalue(v, f),
            Statement::If(i) => {
                substitute_rvalue(&mut i.condition, f)
                    | substitute_statements(&mut i.then_instructions, f)
                    | substitute_statements(&mut i.else_instructions, f)
            }
            Statement::Loop(body) => substitute_statements(body, f),
            _ => false,
        };
    }

    m
}

/// Detail that [`equals`](Rvalue::equals) may be told to disregard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Swizzle component selection.
    Swizzle,
    /// Texture sampling operation kind.
    Texture,
    /// Assignment write mask.
    Assignment,
}

/// Structural comparison state. Declarations met at the same position on both sides are
/// paired, so a tree compares equal to its [`Cloner`] copy.
struct Equality<'s> {
    shader: Option<&'s Shader>,
    ignore: Option<NodeKind>,
    pairs: HashMap<VarRef, VarRef>,
}
impl Equality<'_> {
    fn same_var(&self, a: VarRef, b: VarRef) -> bool {
        a == b || self.pairs.get(&a) == Some(&b)
    }

    fn rvalue(&self, a: &Rvalue, b: &Rvalue) -> bool {
        match (a, b) {
            (Rvalue::Constant(x), Rvalue::Constant(y)) => x == y,
            (Rvalue::Deref(x), Rvalue::Deref(y)) => self.deref(x, y),
            (Rvalue::Expression(x), Rvalue::Expression(y)) => {
                x.op == y.op && x.ty == y.ty && self.rvalues(&x.operands, &y.operands)
            }
            (Rvalue::Swizzle(x), Rvalue::Swizzle(y)) => {
                (self.ignore == Some(NodeKind::Swizzle) || x.components() == y.components())
                    && self.rvalue(&x.val, &y.val)
            }
            (Rvalue::Texture(x), Rvalue::Texture(y)) => self.texture(x, y),
            _ => false,
        }
    }

    fn rvalues(&self, a: &[Rvalue], b: &[Rvalue]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.rvalue(x, y))
    }

    fn optional(&self, a: Option<&Rvalue>, b: Option<&Rvalue>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(x), Some(y)) => self.rvalue(x, y),
            _ => false,
        }
    }

    fn deref(&self, a: &Deref, b: &Deref) -> bool {
        match (a, b) {
            (&Deref::Variable(x), &Deref::Variable(y)) => self.same_var(x, y),
            (
                Deref::Array {
                    array: a0,
                    index: i0,
                    ty: t0,
                },
                Deref::Array {
                    array: a1,
                    index: i1,
                    ty: t1,
                },
            ) => t0 == t1 && self.rvalue(a0, a1) && self.rvalue(i0, i1),
            (
                Deref::Record {
                    record: r0,
                    field: f0,
                    ..
                },
                Deref::Record {
                    record: r1,
                    field: f1,
                    ..
                },
            ) => f0 == f1 && self.rvalue(r0, r1),
            _ => false,
        }
    }

    fn texture(&self, a: &Texture, b: &Texture) -> bool {
        if self.ignore != Some(NodeKind::Texture) && a.op != b.op {
            return false;
        }

        let lod = match (&a.lod_info, &b.lod_info) {
            (LodInfo::None, LodInfo::None) => true,
            (LodInfo::Bias(x), LodInfo::Bias(y)) | (LodInfo::Lod(x), LodInfo::Lod(y)) => {
                self.rvalue(x, y)
            }
            (
                LodInfo::Grad { dpdx: x0, dpdy: y0 },
                LodInfo::Grad { dpdx: x1, dpdy: y1 },
            ) => self.rvalue(x0, x1) && self.rvalue(y0, y1),
            _ => false,
        };

        lod && a.ty == b.ty
            && self.deref(&a.sampler, &b.sampler)
            && self.optional(a.coordinate.as_ref(), b.coordinate.as_ref())
            && self.optional(a.projector.as_ref(), b.projector.as_ref())
            && self.optional(a.shadow_comparator.as_ref(), b.shadow_comparator.as_ref())
            && self.optional(a.offset.as_ref(), b.offset.as_ref())
    }

    fn statements(&mut self, a: &[Statement], b: &[Statement]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.statement(x, y))
    }

    fn statement(&mut self, a: &Statement, b: &Statement) -> bool {
        match (a, b) {
            (&Statement::Declaration(x), &Statement::Declaration(y)) => {
                let Some(shader) = self.shader else {
                    return x == y;
                };
                if x != y && shader.var(x) != shader.var(y) {
                    return false;
                }
                self.pairs.insert(x, y);
                true
            }
            (Statement::Assign(x), Statement::Assign(y)) => {
                (self.ignore == Some(NodeKind::Assignment) || x.write_mask == y.write_mask)
                    && self.deref(&x.lhs, &y.lhs)
                    && self.rvalue(&x.rhs, &y.rhs)
                    && self.optional(x.condition.as_ref(), y.condition.as_ref())
            }
            (Statement::Call(x), Statement::Call(y)) => {
                let derefs = |e: &Self, p: Option<&Deref>, q: Option<&Deref>| match (p, q) {
                    (None, None) => true,
                    (Some(p), Some(q)) => e.deref(p, q),
                    _ => false,
                };
                x.callee == y.callee
                    && self.rvalues(&x.actual_parameters, &y.actual_parameters)
                    && derefs(self, x.return_deref.as_ref(), y.return_deref.as_ref())
                    && derefs(self, x.sub_var.as_ref(), y.sub_var.as_ref())
            }
            (Statement::Return(x), Statement::Return(y))
            | (Statement::Discard(x), Statement::Discard(y)) => {
                self.optional(x.as_ref(), y.as_ref())
            }
            (Statement::If(x), Statement::If(y)) => {
                self.rvalue(&x.condition, &y.condition)
                    && self.statements(&x.then_instructions, &y.then_instructions)
                    && self.statements(&x.else_instructions, &y.else_instructions)
            }
            (Statement::Loop(x), Statement::Loop(y)) => self.statements(x, y),
            _ => a == b,
        }
    }
}

impl Rvalue {
    /// Structural equality; variables compare by identity.
    pub fn equals(&self, other: &Rvalue, ignore: Option<NodeKind>) -> bool {
        Equality {
            shader: None,
            ignore,
            pairs: HashMap::new(),
        }
        .rvalue(self, other)
    }
}

impl Deref {
    pub fn equals(&self, other: &Deref, ignore: Option<NodeKind>) -> bool {
        Equality {
            shader: None,
            ignore,
            pairs: HashMap::new(),
        }
        .deref(self, other)
    }
}

/// Structural equality of statement lists. Variables declared inside the lists are matched
/// by position and compared by their attributes rather than identity.
pub fn statements_equal(
    shader: &Shader,
    a: &[Statement],
    b: &[Statement],
    ignore: Option<NodeKind>,
) -> bool {
    Equality {
        shader: Some(shader),
        ignore,
        pairs: HashMap::new(),
    }
    .statements(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::reader::read_shader;

    const SOURCE: &str = r#"
        (declare (uniform) vec4 u)
        (declare (uniform) sampler2D s)
        (function main (signature void (parameters) (
            (declare () vec4 a)
            (declare () float b)
            (assign (xyzw) (var_ref a) (tex vec4 (var_ref s) (swiz xy (var_ref u)) () () ()))
            (if (expression bool < (swiz x (var_ref a)) (constant float (0.5)))
                ((assign (x) (var_ref b) (swiz y (var_ref a))))
                ((assign (x) (var_ref b) (expression float neg (swiz z (var_ref a))))))
        )))
    "#;

    #[test]
    fn clone_is_equal_and_independent() {
        let mut shader = read_shader(SOURCE).expect("valid source");
        let main = shader.main_signature().expect("main");
        let body = shader.signature(main).body.clone();

        let mut cloner = Cloner::new();
        let mut copy = cloner.clone_statements(&mut shader, &body);
        assert!(statements_equal(&shader, &body, &copy, None));
        assert_eq!(cloner.var_map.len(), 2);
        for (old, new) in &cloner.var_map {
            assert_ne!(old, new);
        }

        if let Statement::If(i) = &mut copy[3] {
            i.then_instructions.clear();
        }
        assert!(!statements_equal(&shader, &body, &copy, None));
        assert!(matches!(&shader.signature(main).body[3], Statement::If(i) if i.then_instructions.len() == 1));
    }

    #[test]
    fn ignore_swizzle_detail() {
        let shader = read_shader(SOURCE).expect("valid source");
        let main = shader.main_signature().expect("main");
        let Statement::If(i) = &shader.signature(main).body[3] else {
            panic!("expected if");
        };
        let (Statement::Assign(x), Statement::Assign(y)) =
            (&i.then_instructions[0], &i.else_instructions[0])
        else {
            panic!("expected assignments");
        };
        let Rvalue::Expression(neg) = &y.rhs else {
            panic!("expected negation");
        };

        assert!(!x.rhs.equals(&neg.operands[0], None));
        assert!(x.rhs.equals(&neg.operands[0], Some(NodeKind::Swizzle)));
    }
}
