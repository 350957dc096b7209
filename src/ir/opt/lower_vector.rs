//! Lowering of `vector` expressions into per-component writes.

use crate::{
    glsl_type::{BaseType, GlslType},
    ir::{
        builder,
        constant::Constant,
        visit::{rewrite_shader, RvalueRewriter},
        Deref, ExprOp, Expression, Rvalue, Shader, Statement, VarRef,
    },
};

/// Every operand is built from one variable through swizzles and negation, or is a
/// constant 0, 1 or -1: a form some targets encode directly.
fn is_extended_swizzle(e: &Expression) -> bool {
    let mut var: Option<VarRef> = None;
    for operand in &e.operands {
        let mut op = operand;
        loop {
            match op {
                Rvalue::Constant(c) => {
                    if !c.is_zero() && !c.is_one() && !c.is_negative_one() {
                        return false;
                    }
                    break;
                }
                &Rvalue::Deref(Deref::Variable(v)) => {
                    if var.is_some_and(|x| x != v) {
                        return false;
                    }
                    var = Some(v);
                    break;
                }
                Rvalue::Expression(x) if x.op == ExprOp::Neg => op = &x.operands[0],
                Rvalue::Swizzle(s) => op = &s.val,
                _ => return false,
            }
        }
    }

    true
}

struct VectorLowering {
    native_extended_swizzle: bool,
}
impl RvalueRewriter for VectorLowering {
    fn rewrite(
        &mut self,
        shader: &mut Shader,
        rv: &mut Rvalue,
        _in_assignee: bool,
        pending: &mut Vec<Statement>,
    ) -> bool {
        let Rvalue::Expression(e) = rv else {
            return false;
        };
        if e.op != ExprOp::Vector || (self.native_extended_swizzle && is_extended_swizzle(e)) {
            return false;
        }
        debug_assert_eq!(e.ty.vector_elements() as usize, e.operands.len());

        let base = e.ty.base_type().unwrap_or(BaseType::Float);
        let tmp = builder::declare_temporary(shader, "vecop_tmp", e.ty.clone(), pending);

        // constants are gathered into a single write
        let mut scalars = Vec::new();
        let mut write_mask = 0u8;
        for (i, operand) in e.operands.iter().enumerate() {
            if let Some(x) = operand.as_constant().and_then(|c| c.component(0)) {
                scalars.push(x.convert(base));
                write_mask |= 1 << i;
            }
        }
        if !scalars.is_empty() {
            let ty = GlslType::vector(base, scalars.len() as u8);
            pending.push(builder::assign_masked(
                Deref::Variable(tmp),
                Rvalue::Constant(Constant::from_scalars(ty, scalars)),
                write_mask,
            ));
        }

        for (i, operand) in core::mem::take(&mut e.operands).into_iter().enumerate() {
            if !matches!(operand, Rvalue::Constant(_)) {
                pending.push(builder::assign_masked(Deref::Variable(tmp), operand, 1 << i));
            }
        }

        *rv = Rvalue::var(tmp);
        true
    }
}

/// Replaces each `vector` expression with a `vecop_tmp` filled one component at a time.
/// With `native_extended_swizzle`, expressions that are extended swizzles stay as they are.
pub fn lower_quadop_vector(shader: &mut Shader, native_extended_swizzle: bool) -> bool {
    let modified = rewrite_shader(
        shader,
        &mut VectorLowering {
            native_extended_swizzle,
        },
    );
    if modified {
        log::debug!("[lower_vector] lowered vector constructors");
    }

    modified
}
