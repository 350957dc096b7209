//! Folds texture projectors into the coordinate.

use crate::{
    ir::{
        builder,
        visit::{rewrite_shader, RvalueRewriter},
        Deref, ExprOp, Rvalue, Shader, Statement, Variable,
    },
    symbol::meta::VariableMode,
};

struct Projection;
impl RvalueRewriter for Projection {
    fn rewrite(
        &mut self,
        shader: &mut Shader,
        rv: &mut Rvalue,
        _in_assignee: bool,
        pending: &mut Vec<Statement>,
    ) -> bool {
        let Rvalue::Texture(t) = rv else {
            return false;
        };
        let Some(projector) = t.projector.take() else {
            return false;
        };

        let ty = projector.ty(shader);
        let v = shader.add_variable(Variable::new("projector", ty, VariableMode::Auto));
        pending.push(Statement::Declaration(v));
        let rcp = builder::unop(shader, ExprOp::Rcp, projector);
        pending.push(builder::assign(shader, Deref::Variable(v), rcp));

        if let Some(c) = t.coordinate.take() {
            t.coordinate = Some(builder::binop(shader, ExprOp::Mul, c, Rvalue::var(v)));
        }
        if let Some(c) = t.shadow_comparator.take() {
            t.shadow_comparator = Some(builder::binop(shader, ExprOp::Mul, c, Rvalue::var(v)));
        }
        true
    }
}

/// `texture(s, coord, proj)` becomes a lookup at `coord * (1 / proj)`, the shadow comparator
/// scaled alike.
pub fn do_lower_texture_projection(shader: &mut Shader) -> bool {
    let modified = rewrite_shader(shader, &mut Projection);
    if modified {
        log::debug!("[tex_projection] lowered projective lookups");
    }

    modified
}
