//! Shorthands for building IR inside passes.

use crate::glsl_type::GlslType;

use super::{
    constant::Constant, Assignment, Deref, ExprOp, Expression, Rvalue, Shader, Statement, Swizzle,
    VarRef,
};

pub fn expr(shader: &Shader, op: ExprOp, operands: Vec<Rvalue>) -> Rvalue {
    let types = operands.iter().map(|x| x.ty(shader)).collect::<Vec<_>>();
    let ty = op.result_type(&types.iter().collect::<Vec<_>>());
    Rvalue::Expression(Box::new(Expression { op, ty, operands }))
}

#[inline]
pub fn unop(shader: &Shader, op: ExprOp, a: Rvalue) -> Rvalue {
    expr(shader, op, vec![a])
}

#[inline]
pub fn binop(shader: &Shader, op: ExprOp, a: Rvalue, b: Rvalue) -> Rvalue {
    expr(shader, op, vec![a, b])
}

pub fn logic_and(a: Rvalue, b: Rvalue) -> Rvalue {
    Rvalue::Expression(Box::new(Expression {
        op: ExprOp::LogicAnd,
        ty: GlslType::BOOL,
        operands: vec![a, b],
    }))
}

pub fn logic_not(a: Rvalue) -> Rvalue {
    Rvalue::Expression(Box::new(Expression {
        op: ExprOp::LogicNot,
        ty: GlslType::BOOL,
        operands: vec![a],
    }))
}

pub fn swizzle(val: Rvalue, components: &[u8]) -> Rvalue {
    debug_assert!((1..=4).contains(&components.len()));
    let mut mask = [0u8; 4];
    mask[..components.len()].copy_from_slice(components);
    Rvalue::Swizzle(Box::new(Swizzle {
        val,
        mask,
        count: components.len() as u8,
    }))
}

/// Array element, matrix column or vector component `index` of `value`.
pub fn element(shader: &Shader, value: Rvalue, index: u32) -> Rvalue {
    let ty = value
        .ty(shader)
        .element_type()
        .unwrap_or_else(|| panic!("indexing a non-indexable value"));
    Rvalue::Deref(Deref::Array {
        array: Box::new(value),
        index: Box::new(Rvalue::Constant(Constant::int(index as i32))),
        ty,
    })
}

pub fn element_deref(shader: &Shader, value: Deref, index: u32) -> Deref {
    match element(shader, Rvalue::Deref(value), index) {
        Rvalue::Deref(d) => d,
        _ => unreachable!(),
    }
}

pub fn record(shader: &Shader, value: Rvalue, field: &str) -> Rvalue {
    let ty = value
        .ty(shader)
        .field(field)
        .unwrap_or_else(|| panic!("no field `{field}`"))
        .ty
        .clone();
    Rvalue::Deref(Deref::Record {
        record: Box::new(value),
        field: field.to_owned(),
        ty,
    })
}

pub fn record_deref(shader: &Shader, value: Deref, field: &str) -> Deref {
    match record(shader, Rvalue::Deref(value), field) {
        Rvalue::Deref(d) => d,
        _ => unreachable!(),
    }
}

/// Writes all of `rhs` into `lhs`.
pub fn assign(shader: &Shader, lhs: Deref, rhs: Rvalue) -> Statement {
    Statement::Assign(Assignment::new(lhs, rhs, shader))
}

pub fn assign_masked(lhs: Deref, rhs: Rvalue, write_mask: u8) -> Statement {
    Statement::Assign(Assignment::with_mask(lhs, rhs, write_mask))
}

/// Declares a fresh temporary at the end of `out`.
pub fn declare_temporary(
    shader: &mut Shader,
    name: &str,
    ty: GlslType,
    out: &mut Vec<Statement>,
) -> VarRef {
    let v = shader.new_temporary(name, ty);
    out.push(Statement::Declaration(v));
    v
}

/// Declares a temporary initialized with `value`, appending both statements to `out`.
pub fn store_temporary(
    shader: &mut Shader,
    name: &str,
    value: Rvalue,
    out: &mut Vec<Statement>,
) -> VarRef {
    let ty = value.ty(shader);
    let v = declare_temporary(shader, name, ty, out);
    out.push(assign(shader, Deref::Variable(v), value));
    v
}
