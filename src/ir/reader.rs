//! Reads the S-expression form produced by [`print`](super::print) back into a [`Shader`].
//!
//! Top-level globals and function prototypes are read first so bodies may call functions
//! declared further down. Calls resolve through the symbol table, falling back to the
//! built-in table, and pick a signature with ordinary overload resolution.

pub mod tokenizer;

use std::sync::Arc;

use typed_arena::Arena;

use crate::{
    error::{ReadError, ReadErrorKind},
    glsl_type::{BaseType, GlslType, StructField, StructType},
    overload::matching_signature,
    scope::SymbolTable,
    symbol::{
        meta::{
            Extensions, InterfacePacking, LanguageState, ShaderStage, VariableFlags, VariableMode,
        },
        Variable,
    },
    utils::{swizzle_indices, write_mask_from_str, BoolToErrorHelper},
};

use self::tokenizer::{parse_all, SExpr};
use super::{
    constant::{Constant, ConstantData, Scalar},
    full_write_mask, Assignment, Call, Deref, ExprOp, Expression, Function, FunctionRef,
    FunctionSignature,
    IfStatement, LodInfo, LoopJump, Rvalue, Shader, SignatureRef, Statement, Swizzle, TexOp,
    Texture, VarRef,
};

/// Reads a fragment shader at the default language version unless the source carries
/// `(stage ..)` or `(version ..)` directives.
pub fn read_shader(source: &str) -> Result<Shader, ReadError> {
    read_shader_with(source, ShaderStage::Fragment, LanguageState::default())
}

pub fn read_shader_with(
    source: &str,
    stage: ShaderStage,
    language: LanguageState,
) -> Result<Shader, ReadError> {
    let exprs = parse_all(source)?;
    let arena = Arena::new();
    let mut reader = Reader {
        shader: Shader::new(stage, language),
        symbols: SymbolTable::new(&arena),
    };

    let mut pending = Vec::new();
    for e in &exprs {
        reader.global(e, &mut pending)?;
    }
    for body in pending {
        reader.body(body)?;
    }

    Ok(reader.shader)
}

/// A signature whose body is read once every prototype is known.
struct PendingBody<'e, 's> {
    signature: SignatureRef,
    parameters: Vec<(&'s str, VarRef)>,
    body: &'e SExpr<'s>,
}

struct Reader<'a> {
    shader: Shader,
    symbols: SymbolTable<'a>,
}

fn items<'e, 's>(e: &'e SExpr<'s>, what: &'static str) -> Result<&'e [SExpr<'s>], ReadError> {
    e.list().ok_or_else(|| e.error(ReadErrorKind::Expected(what)))
}

fn atom<'s>(e: &SExpr<'s>, what: &'static str) -> Result<&'s str, ReadError> {
    e.atom().ok_or_else(|| e.error(ReadErrorKind::Expected(what)))
}

fn number<T: std::str::FromStr>(e: &SExpr, x: &str) -> Result<T, ReadError> {
    x.parse()
        .map_err(|_| e.error(ReadErrorKind::BadConstant(x.to_owned())))
}

fn scalar(e: &SExpr, base: BaseType) -> Result<Scalar, ReadError> {
    let x = atom(e, "constant component")?;
    Ok(match base {
        BaseType::Bool => match x {
            "0" | "false" => Scalar::Bool(false),
            "1" | "true" => Scalar::Bool(true),
            _ => return Err(e.error(ReadErrorKind::BadConstant(x.to_owned()))),
        },
        BaseType::Int => Scalar::Int(number(e, x)?),
        BaseType::Uint => Scalar::Uint(number(e, x)?),
        BaseType::Float => Scalar::Float(number(e, x)?),
        BaseType::Double => Scalar::Double(number(e, x)?),
    })
}

/// `()` in an optional slot.
fn is_empty_list(e: &SExpr) -> bool {
    e.list().is_some_and(|xs| xs.is_empty())
}

impl<'a> Reader<'a> {
    fn global<'e, 's>(
        &mut self,
        e: &'e SExpr<'s>,
        pending: &mut Vec<PendingBody<'e, 's>>,
    ) -> Result<(), ReadError> {
        let xs = items(e, "top-level declaration")?;
        match e.head() {
            Some("stage") => {
                let name = atom(xs.get(1).unwrap_or(e), "stage name")?;
                self.shader.stage = ShaderStage::from_name(name)
                    .ok_or_else(|| e.error(ReadErrorKind::UnknownQualifier(name.to_owned())))?;
            }
            Some("version") => {
                let v = xs.get(1).ok_or_else(|| e.error(ReadErrorKind::Expected("version")))?;
                let version = number(v, atom(v, "version")?)?;
                let es = match xs.get(2).map(|x| x.atom()) {
                    None => false,
                    Some(Some("es")) => true,
                    Some(_) => return Err(e.error(ReadErrorKind::Expected("`es`"))),
                };
                let extensions = self.shader.language.extensions;
                self.shader.language = LanguageState {
                    extensions,
                    ..LanguageState::new(version, es)
                };
            }
            Some("extension") => {
                for x in &xs[1..] {
                    let name = atom(x, "extension name")?;
                    let ext = Extensions::from_extension_name(name)
                        .ok_or_else(|| x.error(ReadErrorKind::UnknownQualifier(name.to_owned())))?;
                    self.shader.language.extensions |= ext;
                }
            }
            Some("declare") => {
                let v = self.declare(e)?;
                self.shader.instructions.push(Statement::Declaration(v));
            }
            Some("typedecl") => {
                let t = self.typedecl(e)?;
                self.shader.instructions.push(Statement::TypeDecl(t));
            }
            Some("precision") => {
                let text = xs[1..]
                    .iter()
                    .map(|x| atom(x, "precision statement"))
                    .collect::<Result<Vec<_>, _>>()?;
                self.shader
                    .instructions
                    .push(Statement::Precision(text.join(" ")));
            }
            Some("function") => self.function(e, pending)?,
            _ => return Err(e.error(ReadErrorKind::Expected("top-level declaration"))),
        }

        Ok(())
    }

    fn ty(&self, e: &SExpr) -> Result<GlslType, ReadError> {
        if let Some(name) = e.atom() {
            return GlslType::from_name(name)
                .or_else(|| self.symbols.get_type(name))
                .ok_or_else(|| e.error(ReadErrorKind::UnknownType(name.to_owned())));
        }

        match (e.head(), items(e, "type")?) {
            (Some("array"), [_, element]) => Ok(GlslType::Array {
                element: Box::new(self.ty(element)?),
                length: None,
            }),
            (Some("array"), [_, element, n]) => Ok(GlslType::array_of(
                self.ty(element)?,
                number(n, atom(n, "array length")?)?,
            )),
            (Some("subroutine"), [_, name]) => {
                Ok(GlslType::Subroutine(atom(name, "subroutine type")?.to_owned()))
            }
            _ => Err(e.error(ReadErrorKind::Expected("type"))),
        }
    }

    fn typedecl(&mut self, e: &SExpr) -> Result<Arc<StructType>, ReadError> {
        let [_, name, fields] = items(e, "(typedecl name (fields))")? else {
            return Err(e.error(ReadErrorKind::Expected("(typedecl name (fields))")));
        };
        let name = atom(name, "struct name")?;
        let fields = items(fields, "struct fields")?
            .iter()
            .map(|f| match items(f, "(type field)")? {
                [ty, field] => Ok(StructField {
                    ty: self.ty(ty)?,
                    name: atom(field, "field name")?.to_owned(),
                }),
                _ => Err(f.error(ReadErrorKind::Expected("(type field)"))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let t = Arc::new(StructType {
            name: name.to_owned(),
            fields,
        });
        self.symbols
            .add_type(name, GlslType::Struct(t.clone()))
            .map_err(|err| e.error(err.into()))?;
        Ok(t)
    }

    /// Creates the variable of a `(declare ...)` without making it visible. Returns the
    /// printed name, which may carry an `@N` disambiguation suffix.
    fn variable<'s>(&mut self, e: &SExpr<'s>) -> Result<(&'s str, VarRef), ReadError> {
        const SHAPE: &str = "(declare (qualifiers) type name [constant])";
        let xs = items(e, SHAPE)?;
        if !matches!(xs.len(), 4 | 5) {
            return Err(e.error(ReadErrorKind::Expected(SHAPE)));
        }

        let printed = atom(&xs[3], "variable name")?;
        let name = printed.split_once('@').map_or(printed, |(n, _)| n);
        let mut var = Variable::new(name, self.ty(&xs[2])?, VariableMode::Auto);
        let mut is_const = false;
        for q in items(&xs[1], "qualifier list")? {
            let a = atom(q, "qualifier")?;
            if a == "const" {
                is_const = true;
            } else if let Some(m) = VariableMode::from_keyword(a) {
                var.mode = m;
            } else if let Some(&(_, f)) = VariableFlags::KEYWORDS.iter().find(|(k, _)| *k == a) {
                var.flags |= f;
            } else if let Some(p) = InterfacePacking::from_keyword(a) {
                var.attribute.interface_packing = Some(p);
            } else if let Some(n) = a.strip_prefix("location=") {
                var.attribute.location = Some(number(q, n)?);
            } else if let Some(n) = a.strip_prefix("binding=") {
                var.attribute.binding = Some(number(q, n)?);
            } else {
                return Err(q.error(ReadErrorKind::UnknownQualifier(a.to_owned())));
            }
        }

        match xs.get(4) {
            Some(init) => {
                let c = self.constant(init)?;
                if c.ty != var.ty {
                    return Err(init.error(ReadErrorKind::BadConstant(format!(
                        "{} initializer for {} variable",
                        c.ty, var.ty
                    ))));
                }
                if is_const {
                    var.constant_value = Some(c.clone());
                }
                var.constant_initializer = Some(c);
            }
            None if is_const => {
                return Err(e.error(ReadErrorKind::Expected("initializer of const variable")))
            }
            None => (),
        }

        Ok((printed, self.shader.add_variable(var)))
    }

    /// Creates the variable and declares it in the current scope.
    fn declare(&mut self, e: &SExpr) -> Result<VarRef, ReadError> {
        let (name, v) = self.variable(e)?;
        self.symbols
            .add_variable(name, v)
            .map_err(|err| e.error(err.into()))?;
        Ok(v)
    }

    fn function<'e, 's>(
        &mut self,
        e: &'e SExpr<'s>,
        pending: &mut Vec<PendingBody<'e, 's>>,
    ) -> Result<(), ReadError> {
        let xs = items(e, "function")?;
        let name = atom(xs.get(1).unwrap_or(e), "function name")?;
        let f = match self.symbols.get_function(name) {
            Some(f) => f,
            None => {
                let f = self.shader.add_function(Function::new(name));
                self.symbols
                    .add_function(name, f)
                    .map_err(|err| e.error(err.into()))?;
                self.shader.instructions.push(Statement::Function(f));
                f
            }
        };

        for x in &xs[2..] {
            let ys = items(x, "function part")?;
            match x.head() {
                Some("subroutine") => self.shader.function_mut(f).is_subroutine = true,
                Some("subroutine_index") => {
                    let n = ys
                        .get(1)
                        .ok_or_else(|| x.error(ReadErrorKind::Expected("subroutine index")))?;
                    self.shader.function_mut(f).subroutine_index =
                        Some(number(n, atom(n, "subroutine index")?)?);
                }
                Some("subroutine_types") => {
                    let types = ys[1..]
                        .iter()
                        .map(|t| atom(t, "subroutine type").map(str::to_owned))
                        .collect::<Result<Vec<_>, _>>()?;
                    self.shader.function_mut(f).subroutine_types = types;
                }
                Some("signature") => {
                    let p = self.signature(x, f)?;
                    pending.extend(p);
                }
                _ => return Err(x.error(ReadErrorKind::Expected("signature"))),
            }
        }

        Ok(())
    }

    fn signature<'e, 's>(
        &mut self,
        e: &'e SExpr<'s>,
        f: FunctionRef,
    ) -> Result<Option<PendingBody<'e, 's>>, ReadError> {
        const SHAPE: &str = "(signature type (parameters ...) [body])";
        let xs = items(e, SHAPE)?;
        if !matches!(xs.len(), 3 | 4) || xs[2].head() != Some("parameters") {
            return Err(e.error(ReadErrorKind::Expected(SHAPE)));
        }

        let return_type = self.ty(&xs[1])?;
        let mut parameters = Vec::new();
        for p in &items(&xs[2], SHAPE)?[1..] {
            let (name, v) = self.variable(p)?;
            if !self.shader.var(v).mode.is_parameter() {
                return Err(p.error(ReadErrorKind::Expected("parameter mode")));
            }
            parameters.push((name, v));
        }

        let types = parameters
            .iter()
            .map(|&(_, v)| self.shader.var(v).ty.clone())
            .collect::<Vec<_>>();
        let prototype = self.shader.function(f).signatures.iter().copied().find(|&s| {
            let sig = self.shader.signature(s);
            sig.parameters.len() == types.len()
                && sig
                    .parameters
                    .iter()
                    .zip(&types)
                    .all(|(&p, t)| &self.shader.var(p).ty == t)
        });

        let body = xs.get(3);
        let sig = match prototype {
            // a definition completing an earlier prototype
            Some(s) if body.is_some() && !self.shader.signature(s).is_defined => {
                let sig = self.shader.signature_mut(s);
                sig.parameters = parameters.iter().map(|&(_, v)| v).collect();
                sig.is_defined = true;
                s
            }
            Some(_) if body.is_none() => return Ok(None),
            Some(_) => {
                return Err(e.error(ReadErrorKind::Symbol(
                    crate::error::SymbolError::AlreadyDeclared {
                        name: self.shader.function(f).name.clone(),
                        kind: crate::error::SymbolKind::Function,
                    },
                )))
            }
            None => self.shader.add_signature(FunctionSignature {
                function: f,
                return_type,
                parameters: parameters.iter().map(|&(_, v)| v).collect(),
                body: Vec::new(),
                is_defined: body.is_some(),
                builtin: None,
            }),
        };

        Ok(body.map(|body| PendingBody {
            signature: sig,
            parameters,
            body,
        }))
    }

    fn body(&mut self, p: PendingBody) -> Result<(), ReadError> {
        self.symbols.push_scope();
        for &(name, v) in &p.parameters {
            self.symbols
                .add_variable(name, v)
                .map_err(|err| p.body.error(err.into()))?;
        }
        let stmts = self.block(p.body)?;
        self.symbols.pop_scope();

        self.shader.signature_mut(p.signature).body = stmts;
        Ok(())
    }

    fn block(&mut self, e: &SExpr) -> Result<Vec<Statement>, ReadError> {
        let xs = items(e, "statement list")?;
        self.symbols.push_scope();
        let stmts = xs
            .iter()
            .map(|s| self.statement(s))
            .collect::<Result<Vec<_>, _>>()?;
        self.symbols.pop_scope();

        Ok(stmts)
    }

    fn statement(&mut self, e: &SExpr) -> Result<Statement, ReadError> {
        match e.atom() {
            Some("break") => return Ok(Statement::LoopJump(LoopJump::Break)),
            Some("continue") => return Ok(Statement::LoopJump(LoopJump::Continue)),
            Some(_) => return Err(e.error(ReadErrorKind::Expected("statement"))),
            None => (),
        }

        let xs = items(e, "statement")?;
        Ok(match (e.head(), xs) {
            (Some("declare"), _) => Statement::Declaration(self.declare(e)?),
            (Some("assign"), _) => Statement::Assign(self.assignment(e)?),
            (Some("call"), _) => Statement::Call(self.call(e)?),
            (Some("if"), [_, cond, then, els]) => Statement::If(IfStatement {
                condition: self.rvalue(cond)?,
                then_instructions: self.block(then)?,
                else_instructions: self.block(els)?,
            }),
            (Some("loop"), [_, body]) => Statement::Loop(self.block(body)?),
            (Some("return"), [_]) => Statement::Return(None),
            (Some("return"), [_, v]) => Statement::Return(Some(self.rvalue(v)?)),
            (Some("discard"), [_]) => Statement::Discard(None),
            (Some("discard"), [_, c]) => Statement::Discard(Some(self.rvalue(c)?)),
            (Some("emit-vertex"), [_]) => Statement::EmitVertex,
            (Some("end-primitive"), [_]) => Statement::EndPrimitive,
            _ => return Err(e.error(ReadErrorKind::Expected("statement"))),
        })
    }

    fn assignment(&mut self, e: &SExpr) -> Result<Assignment, ReadError> {
        const SHAPE: &str = "(assign [condition] (mask) lhs rhs)";
        let xs = items(e, SHAPE)?;
        let (condition, rest) = match xs.len() {
            4 => (None, &xs[1..]),
            5 => (Some(self.rvalue(&xs[1])?), &xs[2..]),
            _ => return Err(e.error(ReadErrorKind::Expected(SHAPE))),
        };

        let lhs = self.deref(&rest[1])?;
        let rhs = self.rvalue(&rest[2])?;
        let write_mask = match items(&rest[0], "write mask")? {
            [] => full_write_mask(&lhs.ty(&self.shader)),
            [m] => {
                let text = atom(m, "write mask")?;
                write_mask_from_str(text)
                    .ok_or_else(|| m.error(ReadErrorKind::BadSwizzle(text.to_owned())))?
            }
            _ => return Err(rest[0].error(ReadErrorKind::Expected("write mask"))),
        };

        Ok(Assignment {
            condition,
            ..Assignment::with_mask(lhs, rhs, write_mask)
        })
    }

    fn call(&mut self, e: &SExpr) -> Result<Call, ReadError> {
        const SHAPE: &str = "(call name [(subroutine_var deref)] [return] (arguments))";
        let xs = items(e, SHAPE)?;
        let name = atom(xs.get(1).unwrap_or(e), "function name")?;
        let (sub_var, rest) = match xs.get(2) {
            Some(s) if s.head() == Some("subroutine_var") => match items(s, SHAPE)? {
                [_, d] => (Some(self.deref(d)?), &xs[3..]),
                _ => return Err(s.error(ReadErrorKind::Expected(SHAPE))),
            },
            _ => (None, xs.get(2..).unwrap_or_default()),
        };
        let (return_deref, args) = match rest {
            [args] => (None, args),
            [ret, args] => (Some(self.deref(ret)?), args),
            _ => return Err(e.error(ReadErrorKind::Expected(SHAPE))),
        };
        let arg_exprs = items(args, "argument list")?;
        let actual_parameters = arg_exprs
            .iter()
            .map(|a| self.rvalue(a))
            .collect::<Result<Vec<_>, _>>()?;

        let f = match self.symbols.get_function(name) {
            Some(f) => f,
            None => self
                .shader
                .import_builtin(name, &mut self.symbols)
                .map_err(|err| e.error(err.into()))?
                .ok_or_else(|| e.error(ReadErrorKind::UndeclaredIdentifier(name.to_owned())))?,
        };
        let types = actual_parameters
            .iter()
            .map(|a| a.ty(&self.shader))
            .collect::<Vec<_>>();
        let state = self.shader.language.clone();
        let m = matching_signature(&self.shader, &state, f, &types, true)
            .map_err(|err| e.error(err.into()))?
            .ok_or_else(|| e.error(ReadErrorKind::NoMatchingSignature(name.to_owned())))?;

        // `out` and `inout` actuals are stored to on return
        let params = &self.shader.signature(m.signature).parameters;
        for (index, ((arg, expr), &param)) in actual_parameters
            .iter()
            .zip(arg_exprs)
            .zip(params)
            .enumerate()
        {
            if self.shader.var(param).mode.writes_back() && !matches!(arg, Rvalue::Deref(_)) {
                return Err(expr.error(ReadErrorKind::NotAnLvalue {
                    function: name.to_owned(),
                    index,
                }));
            }
        }

        Ok(Call {
            callee: m.signature,
            actual_parameters,
            return_deref,
            sub_var,
        })
    }

    fn rvalue(&mut self, e: &SExpr) -> Result<Rvalue, ReadError> {
        let op = e.head();
        match op {
            Some("constant") => Ok(Rvalue::Constant(self.constant(e)?)),
            Some("var_ref" | "array_ref" | "record_ref") => Ok(Rvalue::Deref(self.deref(e)?)),
            Some("expression") => self.expression(e),
            Some("swiz") => {
                let [_, s, val] = items(e, "(swiz components value)")? else {
                    return Err(e.error(ReadErrorKind::Expected("(swiz components value)")));
                };
                let val = self.rvalue(val)?;
                let text = atom(s, "swizzle")?;
                let (mask, count) = swizzle_indices(text, val.ty(&self.shader).vector_elements())
                    .ok_or_else(|| s.error(ReadErrorKind::BadSwizzle(text.to_owned())))?;
                Ok(Rvalue::Swizzle(Box::new(Swizzle { val, mask, count })))
            }
            Some(name) => match TexOp::from_name(name) {
                Some(op) => self.texture(e, op),
                None => Err(e.error(ReadErrorKind::UnknownOperator(name.to_owned()))),
            },
            None => Err(e.error(ReadErrorKind::Expected("rvalue"))),
        }
    }

    fn expression(&mut self, e: &SExpr) -> Result<Rvalue, ReadError> {
        const SHAPE: &str = "(expression type operator operands...)";
        let xs = items(e, SHAPE)?;
        if xs.len() < 4 {
            return Err(e.error(ReadErrorKind::Expected(SHAPE)));
        }

        let ty = self.ty(&xs[1])?;
        let name = atom(&xs[2], "operator")?;
        let op = ExprOp::from_name(name)
            .ok_or_else(|| xs[2].error(ReadErrorKind::UnknownOperator(name.to_owned())))?;
        let operands = xs[3..]
            .iter()
            .map(|x| self.rvalue(x))
            .collect::<Result<Vec<_>, _>>()?;

        let found = operands.len();
        let expected = match op.operand_count() {
            Some(n) => n,
            None if (2..=4).contains(&found) => found,
            None => 4,
        };
        if found != expected {
            return Err(e.error(ReadErrorKind::OperandCount {
                op: op.name(),
                expected,
                found,
            }));
        }

        Ok(Rvalue::Expression(Box::new(Expression { op, ty, operands })))
    }

    fn optional(&mut self, e: &SExpr) -> Result<Option<Rvalue>, ReadError> {
        if is_empty_list(e) {
            return Ok(None);
        }

        self.rvalue(e).map(Some)
    }

    fn texture(&mut self, e: &SExpr, op: TexOp) -> Result<Rvalue, ReadError> {
        const SHAPE: &str = "(op type sampler coordinate offset projector comparator [lod])";
        let xs = items(e, SHAPE)?;
        if !matches!(xs.len(), 7 | 8) {
            return Err(e.error(ReadErrorKind::Expected(SHAPE)));
        }

        let ty = self.ty(&xs[1])?;
        let sampler = self.deref(&xs[2])?;
        let coordinate = self.optional(&xs[3])?;
        let offset = self.optional(&xs[4])?;
        let projector = self.optional(&xs[5])?;
        let shadow_comparator = self.optional(&xs[6])?;
        let lod_info = match (op, xs.get(7)) {
            (_, None) => LodInfo::None,
            (_, Some(l)) if is_empty_list(l) => LodInfo::None,
            (TexOp::Txb, Some(l)) => LodInfo::Bias(self.rvalue(l)?),
            (TexOp::Txl | TexOp::Txf | TexOp::Txs, Some(l)) => LodInfo::Lod(self.rvalue(l)?),
            (TexOp::Txd, Some(l)) => match items(l, "(dPdx dPdy)")? {
                [dpdx, dpdy] => LodInfo::Grad {
                    dpdx: self.rvalue(dpdx)?,
                    dpdy: self.rvalue(dpdy)?,
                },
                _ => return Err(l.error(ReadErrorKind::Expected("(dPdx dPdy)"))),
            },
            (TexOp::Tex | TexOp::Lod, Some(l)) => {
                return Err(l.error(ReadErrorKind::Expected("`)` after comparator")))
            }
        };

        Ok(Rvalue::Texture(Box::new(Texture {
            op,
            ty,
            sampler,
            coordinate,
            projector,
            shadow_comparator,
            offset,
            lod_info,
        })))
    }

    fn deref(&mut self, e: &SExpr) -> Result<Deref, ReadError> {
        match (e.head(), items(e, "dereference")?) {
            (Some("var_ref"), [_, name]) => {
                let name = atom(name, "variable name")?;
                self.symbols
                    .get_variable(name)
                    .map(Deref::Variable)
                    .ok_or_else(|| e.error(ReadErrorKind::UndeclaredIdentifier(name.to_owned())))
            }
            (Some("array_ref"), [_, array, index]) => {
                let array = self.rvalue(array)?;
                let index = self.rvalue(index)?;
                let ty = array
                    .ty(&self.shader)
                    .element_type()
                    .ok_or_else(|| e.error(ReadErrorKind::Expected("indexable value")))?;
                Ok(Deref::Array {
                    array: Box::new(array),
                    index: Box::new(index),
                    ty,
                })
            }
            (Some("record_ref"), [_, record, field]) => {
                let record = self.rvalue(record)?;
                let field = atom(field, "field name")?;
                let ty = record
                    .ty(&self.shader)
                    .field(field)
                    .map(|f| f.ty.clone())
                    .ok_or_else(|| e.error(ReadErrorKind::UndeclaredIdentifier(field.to_owned())))?;
                Ok(Deref::Record {
                    record: Box::new(record),
                    field: field.to_owned(),
                    ty,
                })
            }
            _ => Err(e.error(ReadErrorKind::Expected("dereference"))),
        }
    }

    fn constant(&self, e: &SExpr) -> Result<Constant, ReadError> {
        const SHAPE: &str = "(constant type (values))";
        let [_, ty, values] = items(e, SHAPE)? else {
            return Err(e.error(ReadErrorKind::Expected(SHAPE)));
        };
        if e.head() != Some("constant") {
            return Err(e.error(ReadErrorKind::Expected(SHAPE)));
        }

        let ty = self.ty(ty)?;
        let values = items(values, "constant values")?;
        let bad = |what: &str| e.error(ReadErrorKind::BadConstant(format!("{what} for {ty}")));
        let data = match &ty {
            GlslType::Basic { base, .. } => {
                (values.len() == ty.components() as usize).or_err(|| bad("wrong component count"))?;
                ConstantData::Basic(
                    values
                        .iter()
                        .map(|v| scalar(v, *base))
                        .collect::<Result<_, _>>()?,
                )
            }
            GlslType::Array {
                element,
                length: Some(n),
            } => {
                let elements = values
                    .iter()
                    .map(|v| self.constant(v))
                    .collect::<Result<Vec<_>, _>>()?;
                (elements.len() == *n as usize && elements.iter().all(|c| c.ty == **element))
                    .or_err(|| bad("mismatched elements"))?;
                ConstantData::Array(elements)
            }
            GlslType::Struct(s) => {
                let fields = values
                    .iter()
                    .map(|v| self.constant(v))
                    .collect::<Result<Vec<_>, _>>()?;
                if fields.len() != s.fields.len()
                    || fields.iter().zip(&s.fields).any(|(c, f)| c.ty != f.ty)
                {
                    return Err(bad("mismatched fields"));
                }
                ConstantData::Struct(fields)
            }
            _ => return Err(bad("no constant form")),
        };

        Ok(Constant { ty, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::print::print_shader;

    const SOURCE: &str = "
(version 400)
(typedecl Light ((vec3 dir) (float power)))
(declare (uniform location=2) Light light)
(declare (shader_out) vec4 color)
(function scale
  (signature float (parameters (declare (in) float x) (declare (out) float y))
    ((assign (x) (var_ref y) (expression float * (var_ref x) (constant float (2.0))))
     (return (var_ref x)))))
(function main
  (signature void (parameters)
    ((declare () float t)
     (declare () float u)
     (call scale (var_ref t) ((record_ref (var_ref light) power) (var_ref u)))
     (call max (var_ref t) ((var_ref t) (constant int (1))))
     (if (expression bool < (var_ref t) (var_ref u))
       ((assign (xyz) (var_ref color) (record_ref (var_ref light) dir)))
       ())
     (loop (break)))))
";

    #[test]
    fn reads_globals_functions_and_builtin_calls() {
        let s = read_shader(SOURCE).unwrap();
        assert_eq!(s.language.version, 400);
        assert_eq!(s.global_variables().len(), 2);
        let light = s.global_variables()[0];
        assert_eq!(s.var(light).attribute.location, Some(2));
        assert!(s.var(light).ty.is_struct());

        let main = s.main_signature().unwrap();
        let body = &s.signature(main).body;
        assert_eq!(body.len(), 6);
        let Statement::Call(c) = &body[3] else {
            panic!("expected call, got {:?}", body[3]);
        };
        // the int argument converts to the float overload
        assert_eq!(s.signature_name(c.callee), "max");
        assert_eq!(s.signature(c.callee).return_type, GlslType::FLOAT);
        assert!(s.signature(c.callee).is_builtin());
    }

    #[test]
    fn printed_form_reads_back_identically() {
        let s = read_shader(SOURCE).unwrap();
        let text = print_shader(&s);
        let again = read_shader(&text).unwrap();
        assert_eq!(print_shader(&again), text);
    }

    #[test]
    fn shadowed_names_resolve_through_suffixes() {
        let src = "
(declare (uniform) float a)
(function main
  (signature void (parameters)
    ((declare () float a@1)
     (assign (x) (var_ref a@1) (var_ref a)))))";
        let s = read_shader(src).unwrap();
        let body = &s.signature(s.main_signature().unwrap()).body;
        let Statement::Assign(a) = &body[1] else {
            panic!()
        };
        let local = a.lhs.as_variable().unwrap();
        assert_eq!(s.var(local).name, "a");
        assert_ne!(Some(local), a.rhs.variable_referenced());
    }

    #[test]
    fn errors_carry_locations() {
        let err = read_shader("(function main\n  (signature void (parameters)\n    ((assign (x) (var_ref nope) (constant float (1.0))))))").unwrap_err();
        assert_eq!(
            err.t,
            ReadErrorKind::UndeclaredIdentifier("nope".to_owned())
        );
        assert_eq!(err.line, 2);

        let err = read_shader("(declare () vec2 v (constant vec2 (1.0)))").unwrap_err();
        assert!(matches!(err.t, ReadErrorKind::BadConstant(_)));

        let err = read_shader(
            "(function main (signature void (parameters) ((call nosuch ()))))",
        )
        .unwrap_err();
        assert_eq!(
            err.t,
            ReadErrorKind::UndeclaredIdentifier("nosuch".to_owned())
        );
    }

    #[test]
    fn written_back_arguments_must_be_lvalues() {
        let callee = "
(function f
  (signature void (parameters (declare (in) float x) (declare (out) float y))
    ((assign (x) (var_ref y) (var_ref x)))))";
        let err = read_shader(&format!(
            "{callee}
(function main
  (signature void (parameters)
    ((call f ((constant float (1.0)) (constant float (2.0)))))))"
        ))
        .unwrap_err();
        assert_eq!(
            err.t,
            ReadErrorKind::NotAnLvalue {
                function: "f".to_owned(),
                index: 1,
            }
        );
        assert_eq!(err.line, 6);

        // `in` parameters take any rvalue
        read_shader(&format!(
            "{callee}
(function main
  (signature void (parameters)
    ((declare () float r)
     (call f ((constant float (1.0)) (var_ref r))))))"
        ))
        .unwrap();
    }
}
