//! S-expression form of the IR, readable back by [`reader`](super::reader).

use std::{
    cell::RefCell,
    collections::HashMap,
    fmt::{self, Write},
};

use crate::{
    symbol::meta::{VariableFlags, VariableMode},
    utils::{swizzle_to_string, write_mask_to_string},
};

use super::{
    constant::{Constant, ConstantData},
    Deref, FunctionRef, LodInfo, LoopJump, Rvalue, Shader, SignatureRef, Statement, Texture,
    VarRef,
};

/// Display adapter printing a whole shader.
pub struct PrintShader<'s>(pub &'s Shader);
impl fmt::Display for PrintShader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut p = Printer::new(self.0);
        for s in &self.0.instructions {
            p.statement(f, s, 0)?;
        }

        Ok(())
    }
}

pub fn print_shader(shader: &Shader) -> String {
    PrintShader(shader).to_string()
}

/// Prints a statement list on its own, e.g. for diagnostics.
pub fn print_statements(shader: &Shader, stmts: &[Statement]) -> String {
    let mut p = Printer::new(shader);
    let mut out = String::new();
    for s in stmts {
        // writing into a String never fails
        let _ = p.statement(&mut out, s, 0);
    }

    out
}

/// Gives every variable a unique printed name, `name@N` on collision.
struct Printer<'s> {
    shader: &'s Shader,
    names: RefCell<HashMap<VarRef, String>>,
    used: RefCell<HashMap<String, usize>>,
}
impl<'s> Printer<'s> {
    fn new(shader: &'s Shader) -> Self {
        Self {
            shader,
            names: RefCell::new(HashMap::new()),
            used: RefCell::new(HashMap::new()),
        }
    }

    fn name(&self, v: VarRef) -> String {
        if let Some(n) = self.names.borrow().get(&v) {
            return n.clone();
        }

        let base = &self.shader.var(v).name;
        let mut used = self.used.borrow_mut();
        let count = used.entry(base.clone()).or_insert(0);
        let name = if *count == 0 {
            base.clone()
        } else {
            format!("{base}@{count}")
        };
        *count += 1;
        self.names.borrow_mut().insert(v, name.clone());
        name
    }

    fn indent(w: &mut impl Write, depth: usize) -> fmt::Result {
        for _ in 0..depth {
            w.write_str("  ")?;
        }

        Ok(())
    }

    fn block(&mut self, w: &mut impl Write, stmts: &[Statement], depth: usize) -> fmt::Result {
        if stmts.is_empty() {
            return w.write_str("()");
        }

        w.write_str("(\n")?;
        for s in stmts {
            self.statement(w, s, depth + 1)?;
        }
        Self::indent(w, depth)?;
        w.write_char(')')
    }

    fn declaration(&mut self, w: &mut impl Write, v: VarRef) -> fmt::Result {
        let var = self.shader.var(v);
        let mut quals = Vec::new();
        if var.constant_value.is_some() {
            quals.push("const".to_owned());
        }
        if var.mode != VariableMode::Auto {
            quals.push(var.mode.keyword().to_owned());
        }
        for (k, flag) in VariableFlags::KEYWORDS {
            if var.flags.contains(flag) {
                quals.push(k.to_owned());
            }
        }
        if let Some(p) = var.attribute.interface_packing {
            quals.push(p.keyword().to_owned());
        }
        if let Some(l) = var.attribute.location {
            quals.push(format!("location={l}"));
        }
        if let Some(b) = var.attribute.binding {
            quals.push(format!("binding={b}"));
        }

        write!(w, "(declare ({}) {} {}", quals.join(" "), var.ty, self.name(v))?;
        if let Some(c) = var
            .constant_initializer
            .as_ref()
            .or(var.constant_value.as_ref())
        {
            w.write_char(' ')?;
            self.constant(w, c)?;
        }
        w.write_char(')')
    }

    fn statement(&mut self, w: &mut impl Write, s: &Statement, depth: usize) -> fmt::Result {
        Self::indent(w, depth)?;
        match s {
            &Statement::Declaration(v) => self.declaration(w, v)?,
            Statement::Assign(a) => {
                w.write_str("(assign ")?;
                if let Some(c) = &a.condition {
                    self.rvalue(w, c)?;
                    w.write_char(' ')?;
                }
                write!(w, "({}) ", write_mask_to_string(a.write_mask))?;
                self.deref(w, &a.lhs)?;
                w.write_char(' ')?;
                self.rvalue(w, &a.rhs)?;
                w.write_char(')')?;
            }
            Statement::Call(c) => {
                write!(w, "(call {} ", self.shader.signature_name(c.callee))?;
                if let Some(d) = &c.sub_var {
                    w.write_str("(subroutine_var ")?;
                    self.deref(w, d)?;
                    w.write_str(") ")?;
                }
                if let Some(d) = &c.return_deref {
                    self.deref(w, d)?;
                    w.write_char(' ')?;
                }
                w.write_char('(')?;
                for (n, a) in c.actual_parameters.iter().enumerate() {
                    if n > 0 {
                        w.write_char(' ')?;
                    }
                    self.rvalue(w, a)?;
                }
                w.write_str("))")?;
            }
            Statement::Return(v) | Statement::Discard(v) => {
                w.write_str(if matches!(s, Statement::Return(_)) {
                    "(return"
                } else {
                    "(discard"
                })?;
                if let Some(v) = v {
                    w.write_char(' ')?;
                    self.rvalue(w, v)?;
                }
                w.write_char(')')?;
            }
            Statement::If(i) => {
                w.write_str("(if ")?;
                self.rvalue(w, &i.condition)?;
                w.write_char(' ')?;
                self.block(w, &i.then_instructions, depth)?;
                w.write_char(' ')?;
                self.block(w, &i.else_instructions, depth)?;
                w.write_char(')')?;
            }
            Statement::Loop(body) => {
                w.write_str("(loop ")?;
                self.block(w, body, depth)?;
                w.write_char(')')?;
            }
            Statement::LoopJump(LoopJump::Break) => w.write_str("break")?,
            Statement::LoopJump(LoopJump::Continue) => w.write_str("continue")?,
            Statement::EmitVertex => w.write_str("(emit-vertex)")?,
            Statement::EndPrimitive => w.write_str("(end-primitive)")?,
            &Statement::Function(f) => self.function(w, f, depth)?,
            Statement::TypeDecl(t) => {
                write!(w, "(typedecl {} (", t.name)?;
                for (n, field) in t.fields.iter().enumerate() {
                    if n > 0 {
                        w.write_char(' ')?;
                    }
                    write!(w, "({} {})", field.ty, field.name)?;
                }
                w.write_str("))")?;
            }
            Statement::Precision(p) => write!(w, "(precision {p})")?,
        }
        w.write_char('\n')
    }

    fn function(&mut self, w: &mut impl Write, f: FunctionRef, depth: usize) -> fmt::Result {
        let func = self.shader.function(f);
        write!(w, "(function {}", func.name)?;
        if func.is_subroutine {
            w.write_str(" (subroutine)")?;
        }
        if let Some(i) = func.subroutine_index {
            write!(w, " (subroutine_index {i})")?;
        }
        if !func.subroutine_types.is_empty() {
            write!(w, " (subroutine_types {})", func.subroutine_types.join(" "))?;
        }
        w.write_char('\n')?;
        for &sig in &func.signatures {
            if self.shader.signature(sig).is_builtin() {
                continue;
            }
            self.signature(w, sig, depth + 1)?;
        }
        Self::indent(w, depth)?;
        w.write_char(')')
    }

    fn signature(&mut self, w: &mut impl Write, sig: SignatureRef, depth: usize) -> fmt::Result {
        let s = self.shader.signature(sig);
        Self::indent(w, depth)?;
        write!(w, "(signature {} (parameters", s.return_type)?;
        for &p in &s.parameters {
            w.write_char(' ')?;
            self.declaration(w, p)?;
        }
        w.write_char(')')?;
        if s.is_defined {
            w.write_char(' ')?;
            self.block(w, &s.body, depth)?;
        }
        w.write_str(")\n")
    }

    fn constant(&self, w: &mut impl Write, c: &Constant) -> fmt::Result {
        write!(w, "(constant {} ", c.ty)?;
        match &c.data {
            ConstantData::Basic(xs) => {
                w.write_char('(')?;
                for (n, x) in xs.iter().enumerate() {
                    if n > 0 {
                        w.write_char(' ')?;
                    }
                    write!(w, "{x}")?;
                }
                w.write_char(')')?;
            }
            ConstantData::Array(xs) | ConstantData::Struct(xs) => {
                w.write_char('(')?;
                for (n, x) in xs.iter().enumerate() {
                    if n > 0 {
                        w.write_char(' ')?;
                    }
                    self.constant(w, x)?;
                }
                w.write_char(')')?;
            }
        }
        w.write_char(')')
    }

    fn rvalue(&self, w: &mut impl Write, rv: &Rvalue) -> fmt::Result {
        match rv {
            Rvalue::Constant(c) => self.constant(w, c),
            Rvalue::Deref(d) => self.deref(w, d),
            Rvalue::Expression(e) => {
                write!(w, "(expression {} {}", e.ty, e.op.name())?;
                for x in &e.operands {
                    w.write_char(' ')?;
                    self.rvalue(w, x)?;
                }
                w.write_char(')')
            }
            Rvalue::Swizzle(s) => {
                write!(w, "(swiz {} ", swizzle_to_string(s.components()))?;
                self.rvalue(w, &s.val)?;
                w.write_char(')')
            }
            Rvalue::Texture(t) => self.texture(w, t),
        }
    }

    fn optional(&self, w: &mut impl Write, rv: Option<&Rvalue>) -> fmt::Result {
        w.write_char(' ')?;
        match rv {
            Some(x) => self.rvalue(w, x),
            None => w.write_str("()"),
        }
    }

    fn texture(&self, w: &mut impl Write, t: &Texture) -> fmt::Result {
        write!(w, "({} {} ", t.op.name(), t.ty)?;
        self.deref(w, &t.sampler)?;
        self.optional(w, t.coordinate.as_ref())?;
        self.optional(w, t.offset.as_ref())?;
        self.optional(w, t.projector.as_ref())?;
        self.optional(w, t.shadow_comparator.as_ref())?;
        match &t.lod_info {
            LodInfo::None => (),
            LodInfo::Bias(x) | LodInfo::Lod(x) => self.optional(w, Some(x))?,
            LodInfo::Grad { dpdx, dpdy } => {
                w.write_str(" (")?;
                self.rvalue(w, dpdx)?;
                w.write_char(' ')?;
                self.rvalue(w, dpdy)?;
                w.write_char(')')?;
            }
        }
        w.write_char(')')
    }

    fn deref(&self, w: &mut impl Write, d: &Deref) -> fmt::Result {
        match d {
            &Deref::Variable(v) => write!(w, "(var_ref {})", self.name(v)),
            Deref::Array { array, index, .. } => {
                w.write_str("(array_ref ")?;
                self.rvalue(w, array)?;
                w.write_char(' ')?;
                self.rvalue(w, index)?;
                w.write_char(')')
            }
            Deref::Record { record, field, .. } => {
                w.write_str("(record_ref ")?;
                self.rvalue(w, record)?;
                write!(w, " {field})")
            }
        }
    }
}
