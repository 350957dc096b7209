//! Shared helpers for the integration tests: a small interpreter to compare a shader's
//! behavior before and after optimization, and readable IR diffs.

#![allow(dead_code)]

use std::collections::HashMap;

use similar::TextDiff;

use glsl_ir_opt::ir::{
    constant::{evaluate_expression, Constant, ConstantData},
    print::print_statements,
    reader::read_shader,
    Deref, LoopJump, Rvalue, Shader, SignatureRef, Statement, VarRef,
};

pub fn parse(source: &str) -> Shader {
    match read_shader(source) {
        Ok(shader) => shader,
        Err(e) => panic!("invalid test source: {e}"),
    }
}

pub fn main_text(shader: &Shader) -> String {
    let main = shader.main_signature().expect("main");
    print_statements(shader, &shader.signature(main).body)
}

/// Fails with a unified diff when the two IR listings differ.
pub fn assert_ir_eq(expected: &str, actual: &str) {
    if expected != actual {
        let diff = TextDiff::from_lines(expected, actual);
        panic!(
            "IR differs:\n{}",
            diff.unified_diff().header("expected", "actual")
        );
    }
}

pub fn global(shader: &Shader, name: &str) -> VarRef {
    shader
        .global_variables()
        .into_iter()
        .find(|&v| shader.var(v).name == name)
        .unwrap_or_else(|| panic!("no global named {name}"))
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Index(usize),
    Field(usize),
}

struct Location {
    var: VarRef,
    path: Vec<Step>,
}

enum Flow {
    Normal,
    Jump(LoopJump),
    Return(Option<Constant>),
    Discard,
}

/// Executes straight-line code, branches, loops and calls over [`Constant`] values.
///
/// Variables start out zeroed unless they carry an initializer; texture sampling is not
/// supported.
pub struct Interpreter<'s> {
    shader: &'s Shader,
    values: HashMap<VarRef, Constant>,
    pub discarded: bool,
}
impl<'s> Interpreter<'s> {
    pub fn new(shader: &'s Shader) -> Self {
        Self {
            shader,
            values: HashMap::new(),
            discarded: false,
        }
    }

    pub fn set(&mut self, name: &str, value: Constant) {
        let v = global(self.shader, name);
        self.values.insert(v, value);
    }

    pub fn get(&self, name: &str) -> Constant {
        self.value(global(self.shader, name))
    }

    pub fn run_main(&mut self) {
        let shader = self.shader;
        let main = shader.main_signature().expect("main");
        if let Flow::Discard = self.exec_block(&shader.signature(main).body) {
            self.discarded = true;
        }
    }

    fn value(&self, v: VarRef) -> Constant {
        let var = self.shader.var(v);
        self.values
            .get(&v)
            .or(var.constant_value.as_ref())
            .or(var.constant_initializer.as_ref())
            .cloned()
            .or_else(|| Constant::zero(&var.ty))
            .unwrap_or_else(|| panic!("no value for {}", var.name))
    }

    fn exec_block(&mut self, stmts: &[Statement]) -> Flow {
        for s in stmts {
            match self.exec(s) {
                Flow::Normal => (),
                other => return other,
            }
        }
        Flow::Normal
    }

    fn exec(&mut self, s: &Statement) -> Flow {
        match s {
            &Statement::Declaration(v) => {
                let var = self.shader.var(v);
                match var.constant_initializer.clone().or_else(|| Constant::zero(&var.ty)) {
                    Some(c) => {
                        self.values.insert(v, c);
                    }
                    None => {
                        self.values.remove(&v);
                    }
                }
            }
            Statement::Assign(a) => {
                let enabled = match &a.condition {
                    Some(c) => self.condition(c),
                    None => true,
                };
                if enabled {
                    let value = self.eval(&a.rhs);
                    let location = self.location(&a.lhs);
                    self.write(&location, value, a.write_mask);
                }
            }
            Statement::Call(c) => self.call(c.callee, &c.actual_parameters, c.return_deref.as_ref()),
            Statement::Return(v) => return Flow::Return(v.as_ref().map(|v| self.eval(v))),
            Statement::Discard(c) => {
                if c.as_ref().map_or(true, |c| self.condition(c)) {
                    return Flow::Discard;
                }
            }
            Statement::If(i) => {
                let branch = if self.condition(&i.condition) {
                    &i.then_instructions
                } else {
                    &i.else_instructions
                };
                return self.exec_block(branch);
            }
            Statement::Loop(body) => loop {
                match self.exec_block(body) {
                    Flow::Normal | Flow::Jump(LoopJump::Continue) => (),
                    Flow::Jump(LoopJump::Break) => break,
                    other => return other,
                }
            },
            &Statement::LoopJump(j) => return Flow::Jump(j),
            Statement::EmitVertex
            | Statement::EndPrimitive
            | Statement::Function(_)
            | Statement::TypeDecl(_)
            | Statement::Precision(_) => (),
        }
        Flow::Normal
    }

    fn call(&mut self, callee: SignatureRef, args: &[Rvalue], result: Option<&Deref>) {
        let shader = self.shader;
        let sig = shader.signature(callee);
        let params = &sig.parameters;

        // argument values and written-back locations are both taken before the body runs
        let mut write_back = Vec::new();
        let mut inputs = Vec::new();
        for (&p, arg) in params.iter().zip(args) {
            let mode = shader.var(p).mode;
            let value = if mode.reads_in() {
                self.eval(arg)
            } else {
                Constant::zero(&shader.var(p).ty).expect("out parameter of plain type")
            };
            inputs.push((p, value));
            if mode.writes_back() {
                let d = arg.as_deref().expect("out argument is an l-value");
                write_back.push((p, self.location(d)));
            }
        }
        for (p, value) in inputs {
            self.values.insert(p, value);
        }

        let returned = match self.exec_block(&sig.body) {
            Flow::Return(v) => v,
            Flow::Discard => {
                self.discarded = true;
                None
            }
            _ => None,
        };
        for (p, location) in write_back {
            let value = self.value(p);
            self.write(&location, value, 0);
        }
        if let (Some(d), Some(v)) = (result, returned) {
            let location = self.location(d);
            self.write(&location, v, 0);
        }
    }

    fn condition(&self, rv: &Rvalue) -> bool {
        self.eval(rv).as_bool().expect("boolean condition")
    }

    fn eval(&self, rv: &Rvalue) -> Constant {
        match rv {
            Rvalue::Constant(c) => c.clone(),
            Rvalue::Deref(d) => {
                let location = self.location(d);
                read(self.value(location.var), &location.path)
            }
            Rvalue::Expression(e) => {
                let operands = e.operands.iter().map(|o| self.eval(o)).collect::<Vec<_>>();
                evaluate_expression(e.op, &e.ty, &operands)
                    .unwrap_or_else(|| panic!("cannot evaluate {}", e.op.name()))
            }
            Rvalue::Swizzle(s) => self
                .eval(&s.val)
                .swizzle(s.components())
                .expect("swizzle of a vector"),
            Rvalue::Texture(_) => panic!("texture sampling is not interpreted"),
        }
    }

    fn location(&self, d: &Deref) -> Location {
        match d {
            &Deref::Variable(var) => Location {
                var,
                path: Vec::new(),
            },
            Deref::Array { array, index, .. } => {
                let mut location = self.location(array.as_deref().expect("indexed l-value"));
                let i = self.eval(index).as_index().expect("integer index");
                let i = usize::try_from(i).expect("index in bounds");
                location.path.push(Step::Index(i));
                location
            }
            Deref::Record { record, field, .. } => {
                let inner = record.as_deref().expect("record l-value");
                let ty = inner.ty(self.shader);
                let i = ty
                    .struct_type()
                    .and_then(|s| s.field_index(field))
                    .expect("known field");
                let mut location = self.location(inner);
                location.path.push(Step::Field(i));
                location
            }
        }
    }

    fn write(&mut self, location: &Location, value: Constant, write_mask: u8) {
        let mut root = self.value(location.var);
        update(&mut root, &location.path, &mut |target| {
            store(target, &value, write_mask)
        });
        self.values.insert(location.var, root);
    }
}

fn child(c: &Constant, step: Step) -> Constant {
    match step {
        Step::Index(i) => c.element(i as i64).expect("element in bounds"),
        Step::Field(i) => match &c.data {
            ConstantData::Struct(fields) => fields[i].clone(),
            _ => panic!("field of a non-struct value"),
        },
    }
}

fn read(root: Constant, path: &[Step]) -> Constant {
    path.iter().fold(root, |c, &step| child(&c, step))
}

fn update(c: &mut Constant, path: &[Step], f: &mut impl FnMut(&mut Constant)) {
    let Some((&step, rest)) = path.split_first() else {
        f(c);
        return;
    };

    let mut inner = child(c, step);
    update(&mut inner, rest, f);
    match (&mut c.data, step) {
        (ConstantData::Array(xs), Step::Index(i)) | (ConstantData::Struct(xs), Step::Field(i)) => {
            xs[i] = inner;
        }
        (ConstantData::Basic(xs), Step::Index(i)) => {
            let ConstantData::Basic(ys) = inner.data else {
                panic!("column of a non-basic value");
            };
            let width = ys.len();
            xs[i * width..(i + 1) * width].copy_from_slice(&ys);
        }
        _ => panic!("mismatched location"),
    }
}

/// Writes `value` into the enabled channels of `target`, packed in channel order; a zero
/// mask replaces the whole value.
fn store(target: &mut Constant, value: &Constant, write_mask: u8) {
    let (ConstantData::Basic(xs), ConstantData::Basic(ys), true) =
        (&mut target.data, &value.data, write_mask != 0)
    else {
        *target = value.clone();
        return;
    };

    let mut next = ys.iter();
    for (channel, x) in xs.iter_mut().enumerate() {
        if write_mask & (1 << channel) != 0 {
            *x = *next.next().expect("one component per enabled channel");
        }
    }
}

/// Runs `main` with the given uniform values and returns the values of the named globals.
pub fn run(shader: &Shader, inputs: &[(&str, Constant)], outputs: &[&str]) -> Vec<Constant> {
    let mut interpreter = Interpreter::new(shader);
    for (name, value) in inputs {
        interpreter.set(name, value.clone());
    }
    interpreter.run_main();
    outputs.iter().map(|name| interpreter.get(name)).collect()
}
