//! Breaks matrix arithmetic down into column-vector operations.

use super::expression_flattening::do_expression_flattening;
use crate::{
    glsl_type::{BaseType, GlslType},
    ir::{
        builder,
        constant::{Constant, Scalar},
        Assignment, Deref, ExprOp, Expression, Rvalue, Shader, Statement, VarRef,
    },
};

const LOWERED_OPS: &[ExprOp] = &[
    ExprOp::Neg,
    ExprOp::D2f,
    ExprOp::F2d,
    ExprOp::Add,
    ExprOp::Sub,
    ExprOp::Mul,
    ExprOp::Div,
    ExprOp::Mod,
    ExprOp::AllEqual,
    ExprOp::AnyNequal,
];

fn is_lowered(e: &Expression, shader: &Shader) -> bool {
    LOWERED_OPS.contains(&e.op) && e.operands.iter().any(|x| x.ty(shader).is_matrix())
}

fn is_matrix_op(rv: &Rvalue, shader: &Shader) -> bool {
    matches!(rv, Rvalue::Expression(e) if is_lowered(e, shader))
}

/// Column `i` of a matrix; anything else stands for every column.
fn column(shader: &Shader, value: &Rvalue, i: u32) -> Rvalue {
    if value.ty(shader).is_matrix() {
        builder::element(shader, value.clone(), i)
    } else {
        value.clone()
    }
}

fn element(shader: &Shader, value: &Rvalue, col: u32, row: u8) -> Rvalue {
    builder::swizzle(column(shader, value, col), &[row])
}

struct Lowering<'a> {
    result: VarRef,
    condition: Option<Rvalue>,
    out: &'a mut Vec<Statement>,
}
impl Lowering<'_> {
    fn push(&mut self, mut s: Statement) {
        if let Statement::Assign(a) = &mut s {
            a.condition = self.condition.clone();
        }
        self.out.push(s);
    }

    fn result_column(&self, shader: &Shader, i: u32) -> Deref {
        builder::element_deref(shader, Deref::Variable(self.result), i)
    }

    fn columns(&self, shader: &Shader) -> u32 {
        shader.var(self.result).ty.matrix_columns() as u32
    }

    fn unop(&mut self, shader: &Shader, op: ExprOp, a: &Rvalue) {
        for i in 0..self.columns(shader) {
            let rhs = builder::unop(shader, op, column(shader, a, i));
            self.push(builder::assign(shader, self.result_column(shader, i), rhs));
        }
    }

    fn binop(&mut self, shader: &Shader, op: ExprOp, a: &Rvalue, b: &Rvalue) {
        for i in 0..self.columns(shader) {
            let rhs = builder::binop(shader, op, column(shader, a, i), column(shader, b, i));
            self.push(builder::assign(shader, self.result_column(shader, i), rhs));
        }
    }

    fn mul_mat_mat(&mut self, shader: &Shader, a: &Rvalue, b: &Rvalue) {
        let a_columns = a.ty(shader).matrix_columns() as u32;
        for b_col in 0..b.ty(shader).matrix_columns() as u32 {
            let mut sum = builder::binop(shader, ExprOp::Mul, column(shader, a, 0), element(shader, b, b_col, 0));
            for i in 1..a_columns {
                let product = builder::binop(
                    shader,
                    ExprOp::Mul,
                    column(shader, a, i),
                    element(shader, b, b_col, i as u8),
                );
                sum = builder::binop(shader, ExprOp::Add, sum, product);
            }
            self.push(builder::assign(shader, self.result_column(shader, b_col), sum));
        }
    }

    fn mul_mat_vec(&mut self, shader: &Shader, a: &Rvalue, b: &Rvalue) {
        let mut sum = builder::binop(shader, ExprOp::Mul, column(shader, a, 0), element(shader, b, 0, 0));
        for i in 1..a.ty(shader).matrix_columns() as u32 {
            let product = builder::binop(shader, ExprOp::Mul, column(shader, a, i), element(shader, b, 0, i as u8));
            sum = builder::binop(shader, ExprOp::Add, sum, product);
        }
        self.push(builder::assign(shader, Deref::Variable(self.result), sum));
    }

    fn mul_vec_mat(&mut self, shader: &Shader, a: &Rvalue, b: &Rvalue) {
        for i in 0..b.ty(shader).matrix_columns() as u32 {
            let dot = builder::binop(shader, ExprOp::Dot, a.clone(), column(shader, b, i));
            self.push(builder::assign_masked(Deref::Variable(self.result), dot, 1 << i));
        }
    }

    fn mul_mat_scalar(&mut self, shader: &Shader, m: &Rvalue, s: &Rvalue) {
        for i in 0..self.columns(shader) {
            let rhs = builder::binop(shader, ExprOp::Mul, column(shader, m, i), s.clone());
            self.push(builder::assign(shader, self.result_column(shader, i), rhs));
        }
    }

    /// Compares column by column into a bool vector, then reduces it.
    fn equal_mat_mat(&mut self, shader: &mut Shader, a: &Rvalue, b: &Rvalue, test_equal: bool) {
        let columns = a.ty(shader).matrix_columns();
        let bvec_type = GlslType::vector(BaseType::Bool, columns);
        let bvec = builder::declare_temporary(shader, "mat_cmp_bvec", bvec_type.clone(), self.out);
        for i in 0..columns as u32 {
            let cmp = builder::binop(shader, ExprOp::AnyNequal, column(shader, a, i), column(shader, b, i));
            self.push(builder::assign_masked(Deref::Variable(bvec), cmp, 1 << i));
        }

        let all_false = Constant::splat(bvec_type, Scalar::Bool(false));
        let mut any = builder::binop(shader, ExprOp::AnyNequal, Rvalue::var(bvec), Rvalue::Constant(all_false));
        if test_equal {
            any = builder::logic_not(any);
        }
        self.push(builder::assign(shader, Deref::Variable(self.result), any));
    }

    fn lower(&mut self, shader: &mut Shader, e: Expression) {
        // operands aliasing the result are read before the first column is written
        let ops = e
            .operands
            .into_iter()
            .map(|x| match x {
                Rvalue::Deref(d) if d.variable_referenced() != Some(self.result) => Rvalue::Deref(d),
                other => Rvalue::var(builder::store_temporary(shader, "mat_op_to_vec", other, self.out)),
            })
            .collect::<Vec<_>>();

        match e.op {
            ExprOp::Neg | ExprOp::D2f | ExprOp::F2d => self.unop(shader, e.op, &ops[0]),
            ExprOp::Add | ExprOp::Sub | ExprOp::Div | ExprOp::Mod => {
                self.binop(shader, e.op, &ops[0], &ops[1]);
            }
            ExprOp::Mul => {
                let (a, b) = (&ops[0], &ops[1]);
                let (at, bt) = (a.ty(shader), b.ty(shader));
                match (at.is_matrix(), bt.is_matrix()) {
                    (true, true) => self.mul_mat_mat(shader, a, b),
                    (true, false) if bt.is_vector() => self.mul_mat_vec(shader, a, b),
                    (true, false) => self.mul_mat_scalar(shader, a, b),
                    (false, _) if at.is_vector() => self.mul_vec_mat(shader, a, b),
                    (false, _) => self.mul_mat_scalar(shader, b, a),
                }
            }
            ExprOp::AllEqual | ExprOp::AnyNequal => {
                self.equal_mat_mat(shader, &ops[1], &ops[0], e.op == ExprOp::AllEqual);
            }
            other => unreachable!("{other:?} is not lowered"),
        }
    }
}

fn lower_block(shader: &mut Shader, stmts: &mut Vec<Statement>) -> bool {
    let mut modified = false;
    for s in core::mem::take(stmts) {
        match s {
            Statement::Assign(Assignment {
                lhs: Deref::Variable(result),
                rhs: Rvalue::Expression(e),
                condition,
                ..
            }) if is_lowered(&e, shader) => {
                log::debug!(
                    "[mat_op_to_vec] lowering {} into {}",
                    e.op.name(),
                    shader.var(result).name
                );
                let mut lowering = Lowering {
                    result,
                    condition,
                    out: stmts,
                };
                lowering.lower(shader, *e);
                modified = true;
            }
            Statement::If(mut i) => {
                modified |= lower_block(shader, &mut i.then_instructions);
                modified |= lower_block(shader, &mut i.else_instructions);
                stmts.push(Statement::If(i));
            }
            Statement::Loop(mut body) => {
                modified |= lower_block(shader, &mut body);
                stmts.push(Statement::Loop(body));
            }
            other => stmts.push(other),
        }
    }

    modified
}

/// Every matrix operation first moves into an assignment of its own to a temporary, which
/// is then replaced by per-column (or per-component) vector assignments.
pub fn do_mat_op_to_vec(shader: &mut Shader) -> bool {
    let mut modified = do_expression_flattening(shader, is_matrix_op);
    modified |= shader.for_each_body(|shader, _, body| lower_block(shader, body));

    modified
}
