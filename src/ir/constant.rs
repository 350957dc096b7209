//! Constant values and compile-time evaluation of IR expressions.

use crate::glsl_type::{BaseType, GlslType};

use super::{expression::ExprOp, Deref, Rvalue, Shader};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i32),
    Uint(u32),
    Float(f32),
    Double(f64),
}
impl Scalar {
    pub const fn base_type(self) -> BaseType {
        match self {
            Self::Bool(_) => BaseType::Bool,
            Self::Int(_) => BaseType::Int,
            Self::Uint(_) => BaseType::Uint,
            Self::Float(_) => BaseType::Float,
            Self::Double(_) => BaseType::Double,
        }
    }

    pub const fn zero(base: BaseType) -> Self {
        match base {
            BaseType::Bool => Self::Bool(false),
            BaseType::Int => Self::Int(0),
            BaseType::Uint => Self::Uint(0),
            BaseType::Float => Self::Float(0.0),
            BaseType::Double => Self::Double(0.0),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Self::Bool(b) => b as u8 as f64,
            Self::Int(x) => x as f64,
            Self::Uint(x) => x as f64,
            Self::Float(x) => x as f64,
            Self::Double(x) => x,
        }
    }

    pub fn as_bool(self) -> bool {
        match self {
            Self::Bool(b) => b,
            Self::Int(x) => x != 0,
            Self::Uint(x) => x != 0,
            Self::Float(x) => x != 0.0,
            Self::Double(x) => x != 0.0,
        }
    }

    /// Value converted to another base type with GLSL constructor semantics.
    pub fn convert(self, base: BaseType) -> Self {
        match base {
            BaseType::Bool => Self::Bool(self.as_bool()),
            BaseType::Int => Self::Int(match self {
                Self::Uint(x) => x as i32,
                Self::Int(x) => x,
                other => other.as_f64() as i32,
            }),
            BaseType::Uint => Self::Uint(match self {
                Self::Int(x) => x as u32,
                Self::Uint(x) => x,
                other => other.as_f64() as u32,
            }),
            BaseType::Float => Self::Float(self.as_f64() as f32),
            BaseType::Double => Self::Double(self.as_f64()),
        }
    }

    fn map_float(self, f: impl Fn(f64) -> f64) -> Option<Self> {
        match self {
            Self::Float(x) => Some(Self::Float(f(x as f64) as f32)),
            Self::Double(x) => Some(Self::Double(f(x))),
            _ => None,
        }
    }
}
impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", *b as u8),
            Self::Int(x) => write!(f, "{x}"),
            Self::Uint(x) => write!(f, "{x}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Double(x) => write!(f, "{x:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstantData {
    /// Components of a scalar, vector or column-major matrix.
    Basic(Vec<Scalar>),
    Array(Vec<Constant>),
    Struct(Vec<Constant>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub ty: GlslType,
    pub data: ConstantData,
}
impl Constant {
    pub fn from_scalars(ty: GlslType, components: Vec<Scalar>) -> Self {
        debug_assert_eq!(ty.components() as usize, components.len());

        Self {
            ty,
            data: ConstantData::Basic(components),
        }
    }

    pub fn scalar(x: Scalar) -> Self {
        Self::from_scalars(GlslType::vector(x.base_type(), 1), vec![x])
    }

    pub fn float(x: f32) -> Self {
        Self::scalar(Scalar::Float(x))
    }

    pub fn int(x: i32) -> Self {
        Self::scalar(Scalar::Int(x))
    }

    pub fn uint(x: u32) -> Self {
        Self::scalar(Scalar::Uint(x))
    }

    pub fn bool(x: bool) -> Self {
        Self::scalar(Scalar::Bool(x))
    }

    /// A basic-typed constant with every component set to `x` (converted).
    pub fn splat(ty: GlslType, x: Scalar) -> Self {
        let base = ty.base_type().unwrap_or_else(|| panic!("cannot splat into {ty}"));
        let n = ty.components() as usize;
        Self::from_scalars(ty, vec![x.convert(base); n])
    }

    /// All-zero value of any non-opaque type.
    pub fn zero(ty: &GlslType) -> Option<Self> {
        let data = match ty {
            &GlslType::Basic { base, .. } => {
                ConstantData::Basic(vec![Scalar::zero(base); ty.components() as usize])
            }
            GlslType::Array {
                element,
                length: Some(n),
            } => ConstantData::Array(
                (0..*n)
                    .map(|_| Self::zero(element))
                    .collect::<Option<_>>()?,
            ),
            GlslType::Struct(s) => ConstantData::Struct(
                s.fields
                    .iter()
                    .map(|f| Self::zero(&f.ty))
                    .collect::<Option<_>>()?,
            ),
            _ => return None,
        };

        Some(Self {
            ty: ty.clone(),
            data,
        })
    }

    pub fn scalars(&self) -> Option<&[Scalar]> {
        match &self.data {
            ConstantData::Basic(xs) => Some(xs),
            _ => None,
        }
    }

    pub fn component(&self, n: usize) -> Option<Scalar> {
        self.scalars().and_then(|xs| xs.get(n).copied())
    }

    /// Truth value of a scalar boolean constant.
    pub fn as_bool(&self) -> Option<bool> {
        match (self.ty.is_boolean() && self.ty.is_scalar(), self.component(0)) {
            (true, Some(x)) => Some(x.as_bool()),
            _ => None,
        }
    }

    /// Value of a scalar integer constant used as an index.
    pub fn as_index(&self) -> Option<i64> {
        match (self.ty.is_scalar(), self.component(0)?) {
            (true, Scalar::Int(x)) => Some(x as i64),
            (true, Scalar::Uint(x)) => Some(x as i64),
            _ => None,
        }
    }

    fn all_components(&self, pred: impl Fn(f64) -> bool) -> bool {
        self.scalars()
            .is_some_and(|xs| !xs.is_empty() && xs.iter().all(|x| pred(x.as_f64())))
    }

    pub fn is_zero(&self) -> bool {
        self.all_components(|x| x == 0.0)
    }

    pub fn is_one(&self) -> bool {
        self.all_components(|x| x == 1.0)
    }

    pub fn is_negative_one(&self) -> bool {
        !self.ty.is_boolean() && self.all_components(|x| x == -1.0)
    }

    /// Array element, matrix column or vector component.
    pub fn element(&self, index: i64) -> Option<Constant> {
        let element_ty = self.ty.element_type()?;
        let len = self.ty.indexable_length()? as i64;
        if index < 0 || index >= len {
            return None;
        }
        let index = index as usize;

        match &self.data {
            ConstantData::Array(xs) => xs.get(index).cloned(),
            ConstantData::Basic(xs) => {
                let width = element_ty.components() as usize;
                Some(Self::from_scalars(
                    element_ty,
                    xs[index * width..(index + 1) * width].to_vec(),
                ))
            }
            ConstantData::Struct(_) => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<Constant> {
        let index = self.ty.struct_type()?.field_index(name)?;
        match &self.data {
            ConstantData::Struct(xs) => xs.get(index).cloned(),
            _ => None,
        }
    }

    pub fn swizzle(&self, components: &[u8]) -> Option<Constant> {
        let base = self.ty.base_type()?;
        let xs = self.scalars()?;
        let picked = components
            .iter()
            .map(|&c| xs.get(c as usize).copied())
            .collect::<Option<Vec<_>>>()?;

        Some(Self::from_scalars(
            GlslType::vector(base, picked.len() as u8),
            picked,
        ))
    }
}

/// Component `n` of a basic constant, broadcasting scalars.
fn broadcast(c: &Constant, n: usize) -> Option<Scalar> {
    let xs = c.scalars()?;
    if xs.len() == 1 {
        xs.first().copied()
    } else {
        xs.get(n).copied()
    }
}

fn unary_scalar(op: ExprOp, x: Scalar) -> Option<Scalar> {
    use ExprOp::*;

    if let Some(target) = op.conversion_target() {
        return Some(x.convert(target));
    }
    match (op, x) {
        (BitNot, Scalar::Int(v)) => Some(Scalar::Int(!v)),
        (BitNot, Scalar::Uint(v)) => Some(Scalar::Uint(!v)),
        (LogicNot, Scalar::Bool(v)) => Some(Scalar::Bool(!v)),
        (Neg, Scalar::Int(v)) => Some(Scalar::Int(v.wrapping_neg())),
        (Neg, Scalar::Uint(v)) => Some(Scalar::Uint(v.wrapping_neg())),
        (Neg, _) => x.map_float(|v| -v),
        (Abs, Scalar::Int(v)) => Some(Scalar::Int(v.wrapping_abs())),
        (Abs, _) => x.map_float(f64::abs),
        (Sign, Scalar::Int(v)) => Some(Scalar::Int(v.signum())),
        (Sign, _) => x.map_float(|v| if v == 0.0 { 0.0 } else { v.signum() }),
        (Rcp, _) => x.map_float(|v| 1.0 / v),
        (Rsq, _) => x.map_float(|v| 1.0 / v.sqrt()),
        (Sqrt, _) => x.map_float(f64::sqrt),
        (Exp, _) => x.map_float(f64::exp),
        (Log, _) => x.map_float(f64::ln),
        (Exp2, _) => x.map_float(f64::exp2),
        (Log2, _) => x.map_float(f64::log2),
        (Trunc, _) => x.map_float(f64::trunc),
        (Ceil, _) => x.map_float(f64::ceil),
        (Floor, _) => x.map_float(f64::floor),
        (Fract, _) => x.map_float(|v| v - v.floor()),
        (RoundEven, _) => x.map_float(round_half_even),
        (Sin, _) => x.map_float(f64::sin),
        (Cos, _) => x.map_float(f64::cos),
        // derivatives are zero for constants
        (Dfdx | Dfdy, _) => x.map_float(|_| 0.0),
        _ => None,
    }
}

fn round_half_even(v: f64) -> f64 {
    let r = v.round();
    if (v - v.trunc()).abs() == 0.5 && r % 2.0 != 0.0 {
        r - v.signum()
    } else {
        r
    }
}

fn binary_scalar(op: ExprOp, a: Scalar, b: Scalar) -> Option<Scalar> {
    use ExprOp::*;
    use Scalar::*;

    Some(match (op, a, b) {
        (Add, Int(x), Int(y)) => Int(x.wrapping_add(y)),
        (Add, Uint(x), Uint(y)) => Uint(x.wrapping_add(y)),
        (Add, Float(x), Float(y)) => Float(x + y),
        (Add, Double(x), Double(y)) => Double(x + y),
        (Sub, Int(x), Int(y)) => Int(x.wrapping_sub(y)),
        (Sub, Uint(x), Uint(y)) => Uint(x.wrapping_sub(y)),
        (Sub, Float(x), Float(y)) => Float(x - y),
        (Sub, Double(x), Double(y)) => Double(x - y),
        (Mul, Int(x), Int(y)) => Int(x.wrapping_mul(y)),
        (Mul, Uint(x), Uint(y)) => Uint(x.wrapping_mul(y)),
        (Mul, Float(x), Float(y)) => Float(x * y),
        (Mul, Double(x), Double(y)) => Double(x * y),
        (Div, Int(x), Int(y)) => Int(x.checked_div(y)?),
        (Div, Uint(x), Uint(y)) => Uint(x.checked_div(y)?),
        (Div, Float(x), Float(y)) => Float(x / y),
        (Div, Double(x), Double(y)) => Double(x / y),
        (Mod, Int(x), Int(y)) => Int(x.checked_rem(y)?),
        (Mod, Uint(x), Uint(y)) => Uint(x.checked_rem(y)?),
        (Mod, Float(x), Float(y)) => Float(x - y * (x / y).floor()),
        (Mod, Double(x), Double(y)) => Double(x - y * (x / y).floor()),
        (Min, Int(x), Int(y)) => Int(x.min(y)),
        (Min, Uint(x), Uint(y)) => Uint(x.min(y)),
        (Min, Float(x), Float(y)) => Float(x.min(y)),
        (Min, Double(x), Double(y)) => Double(x.min(y)),
        (Max, Int(x), Int(y)) => Int(x.max(y)),
        (Max, Uint(x), Uint(y)) => Uint(x.max(y)),
        (Max, Float(x), Float(y)) => Float(x.max(y)),
        (Max, Double(x), Double(y)) => Double(x.max(y)),
        (Pow, Float(x), Float(y)) => Float(x.powf(y)),
        (Pow, Double(x), Double(y)) => Double(x.powf(y)),
        (Lshift, Int(x), s) => Int(x.wrapping_shl(shift_amount(s)?)),
        (Lshift, Uint(x), s) => Uint(x.wrapping_shl(shift_amount(s)?)),
        (Rshift, Int(x), s) => Int(x.wrapping_shr(shift_amount(s)?)),
        (Rshift, Uint(x), s) => Uint(x.wrapping_shr(shift_amount(s)?)),
        (BitAnd, Int(x), Int(y)) => Int(x & y),
        (BitAnd, Uint(x), Uint(y)) => Uint(x & y),
        (BitXor, Int(x), Int(y)) => Int(x ^ y),
        (BitXor, Uint(x), Uint(y)) => Uint(x ^ y),
        (BitOr, Int(x), Int(y)) => Int(x | y),
        (BitOr, Uint(x), Uint(y)) => Uint(x | y),
        (LogicAnd, Bool(x), Bool(y)) => Bool(x && y),
        (LogicOr, Bool(x), Bool(y)) => Bool(x || y),
        (LogicXor, Bool(x), Bool(y)) => Bool(x != y),
        (Less, x, y) => Bool(x.as_f64() < y.as_f64()),
        (Greater, x, y) => Bool(x.as_f64() > y.as_f64()),
        (Lequal, x, y) => Bool(x.as_f64() <= y.as_f64()),
        (Gequal, x, y) => Bool(x.as_f64() >= y.as_f64()),
        (Equal, x, y) => Bool(x == y),
        (Nequal, x, y) => Bool(x != y),
        _ => return None,
    })
}

fn shift_amount(s: Scalar) -> Option<u32> {
    match s {
        Scalar::Int(y) => Some(y as u32),
        Scalar::Uint(y) => Some(y),
        _ => None,
    }
}

fn mul_add(acc: Scalar, a: Scalar, b: Scalar) -> Option<Scalar> {
    binary_scalar(ExprOp::Add, acc, binary_scalar(ExprOp::Mul, a, b)?)
}

/// Matrix products; everything else multiplies component-wise.
fn matrix_multiply(ty: &GlslType, a: &Constant, b: &Constant) -> Option<Constant> {
    let base = ty.base_type()?;
    let (xa, xb) = (a.scalars()?, b.scalars()?);
    let zero = Scalar::zero(base);
    let mut out = Vec::with_capacity(ty.components() as usize);

    match (a.ty.is_matrix(), b.ty.is_matrix()) {
        (true, true) => {
            let (rows, inner) = (a.ty.vector_elements() as usize, a.ty.matrix_columns() as usize);
            for c in 0..b.ty.matrix_columns() as usize {
                for r in 0..rows {
                    let mut acc = zero;
                    for k in 0..inner {
                        acc = mul_add(acc, xa[k * rows + r], xb[c * inner + k])?;
                    }
                    out.push(acc);
                }
            }
        }
        (true, false) => {
            let rows = a.ty.vector_elements() as usize;
            for r in 0..rows {
                let mut acc = zero;
                for (k, &v) in xb.iter().enumerate() {
                    acc = mul_add(acc, xa[k * rows + r], v)?;
                }
                out.push(acc);
            }
        }
        (false, true) => {
            let rows = b.ty.vector_elements() as usize;
            for c in 0..b.ty.matrix_columns() as usize {
                let mut acc = zero;
                for (k, &v) in xa.iter().enumerate() {
                    acc = mul_add(acc, v, xb[c * rows + k])?;
                }
                out.push(acc);
            }
        }
        (false, false) => return None,
    }

    Some(Constant::from_scalars(ty.clone(), out))
}

/// Evaluates `op` over constant operands producing a value of type `ty`.
///
/// Returns `None` when the result is not defined at compile time (integer division by zero,
/// subroutine selectors, mismatched shapes).
pub fn evaluate_expression(op: ExprOp, ty: &GlslType, operands: &[Constant]) -> Option<Constant> {
    use ExprOp::*;

    let n = ty.components() as usize;
    let scalars = match op {
        SubroutineToInt => return None,
        Mul if operands[0].ty.is_matrix() && operands[1].ty.is_vector()
            || operands[1].ty.is_matrix() && operands[0].ty.is_vector()
            || operands[0].ty.is_matrix() && operands[1].ty.is_matrix() =>
        {
            return matrix_multiply(ty, &operands[0], &operands[1]);
        }
        AllEqual | AnyNequal => {
            let equal = operands[0] == operands[1];
            return Some(Constant::bool(if op == AllEqual { equal } else { !equal }));
        }
        Dot => {
            let (a, b) = (operands[0].scalars()?, operands[1].scalars()?);
            let base = ty.base_type()?;
            let mut acc = Scalar::zero(base);
            for (&x, &y) in a.iter().zip(b) {
                acc = mul_add(acc, x, y)?;
            }
            vec![acc]
        }
        Vector => operands
            .iter()
            .map(|c| c.component(0))
            .collect::<Option<Vec<_>>>()?,
        Fma => (0..n)
            .map(|i| {
                mul_add(
                    broadcast(&operands[2], i)?,
                    broadcast(&operands[0], i)?,
                    broadcast(&operands[1], i)?,
                )
            })
            .collect::<Option<Vec<_>>>()?,
        Lrp => (0..n)
            .map(|i| {
                let (x, y, a) = (
                    broadcast(&operands[0], i)?,
                    broadcast(&operands[1], i)?,
                    broadcast(&operands[2], i)?,
                );
                // x * (1 - a) + y * a
                let one_minus = binary_scalar(Sub, Scalar::Float(1.0).convert(a.base_type()), a)?;
                mul_add(binary_scalar(Mul, x, one_minus)?, y, a)
            })
            .collect::<Option<Vec<_>>>()?,
        Csel => (0..n)
            .map(|i| {
                if broadcast(&operands[0], i)?.as_bool() {
                    broadcast(&operands[1], i)
                } else {
                    broadcast(&operands[2], i)
                }
            })
            .collect::<Option<Vec<_>>>()?,
        _ if operands.len() == 1 => (0..n)
            .map(|i| unary_scalar(op, broadcast(&operands[0], i)?))
            .collect::<Option<Vec<_>>>()?,
        _ => (0..n)
            .map(|i| binary_scalar(op, broadcast(&operands[0], i)?, broadcast(&operands[1], i)?))
            .collect::<Option<Vec<_>>>()?,
    };

    (scalars.len() == n).then(|| Constant::from_scalars(ty.clone(), scalars))
}

impl Rvalue {
    /// Value of this rvalue if it can be computed without running the shader.
    pub fn constant_expression_value(&self, shader: &Shader) -> Option<Constant> {
        match self {
            Self::Constant(c) => Some(c.clone()),
            Self::Expression(e) => {
                let operands = e
                    .operands
                    .iter()
                    .map(|x| x.constant_expression_value(shader))
                    .collect::<Option<Vec<_>>>()?;
                evaluate_expression(e.op, &e.ty, &operands)
            }
            Self::Swizzle(s) => s
                .val
                .constant_expression_value(shader)?
                .swizzle(s.components()),
            Self::Deref(d) => d.constant_expression_value(shader),
            Self::Texture(_) => None,
        }
    }
}

impl Deref {
    pub fn constant_expression_value(&self, shader: &Shader) -> Option<Constant> {
        match self {
            Self::Variable(v) => shader.var(*v).foldable_value().cloned(),
            Self::Array { array, index, .. } => {
                let index = index.constant_expression_value(shader)?.as_index()?;
                array.constant_expression_value(shader)?.element(index)
            }
            Self::Record { record, field, .. } => {
                record.constant_expression_value(shader)?.field(field)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floats(ty: GlslType, xs: &[f32]) -> Constant {
        Constant::from_scalars(ty, xs.iter().map(|&x| Scalar::Float(x)).collect())
    }

    #[test]
    fn arithmetic_broadcasts_scalars() {
        let vec3 = GlslType::vector(BaseType::Float, 3);
        let v = floats(vec3.clone(), &[1.0, 2.0, 3.0]);
        let r = evaluate_expression(ExprOp::Mul, &vec3, &[v, Constant::float(2.0)]).unwrap();
        assert_eq!(r, floats(vec3, &[2.0, 4.0, 6.0]));
    }

    #[test]
    fn matrix_vector_product() {
        let mat2 = GlslType::matrix(BaseType::Float, 2, 2);
        let vec2 = GlslType::vector(BaseType::Float, 2);
        // columns (1,2) and (3,4)
        let m = floats(mat2, &[1.0, 2.0, 3.0, 4.0]);
        let v = floats(vec2.clone(), &[5.0, 6.0]);
        let r = evaluate_expression(ExprOp::Mul, &vec2, &[m.clone(), v.clone()]).unwrap();
        assert_eq!(r, floats(vec2.clone(), &[23.0, 34.0]));
        let r = evaluate_expression(ExprOp::Mul, &vec2, &[v, m]).unwrap();
        assert_eq!(r, floats(vec2, &[17.0, 39.0]));
    }

    #[test]
    fn integer_division_by_zero_is_not_folded() {
        assert_eq!(
            evaluate_expression(ExprOp::Div, &GlslType::INT, &[Constant::int(1), Constant::int(0)]),
            None
        );
        assert_eq!(
            evaluate_expression(ExprOp::Mod, &GlslType::INT, &[Constant::int(7), Constant::int(3)]),
            Some(Constant::int(1))
        );
    }

    #[test]
    fn whole_value_comparisons() {
        let vec2 = GlslType::vector(BaseType::Float, 2);
        let a = floats(vec2.clone(), &[1.0, 2.0]);
        let b = floats(vec2, &[1.0, 3.0]);
        assert_eq!(
            evaluate_expression(ExprOp::AnyNequal, &GlslType::BOOL, &[a.clone(), b.clone()]),
            Some(Constant::bool(true))
        );
        assert_eq!(
            evaluate_expression(ExprOp::AllEqual, &GlslType::BOOL, &[a.clone(), a]),
            Some(Constant::bool(true))
        );
    }

    #[test]
    fn elements_of_matrices_and_arrays() {
        let mat2 = GlslType::matrix(BaseType::Float, 2, 2);
        let m = floats(mat2, &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(
            m.element(1),
            Some(floats(GlslType::vector(BaseType::Float, 2), &[3.0, 4.0]))
        );
        assert_eq!(m.element(2), None);
        assert_eq!(
            m.element(0).unwrap().swizzle(&[1, 1, 0]),
            Some(floats(GlslType::vector(BaseType::Float, 3), &[2.0, 2.0, 1.0]))
        );
    }

    #[test]
    fn round_even_ties_to_even() {
        assert_eq!(round_half_even(2.5), 2.0);
        assert_eq!(round_half_even(3.5), 4.0);
        assert_eq!(round_half_even(-2.5), -2.0);
        assert_eq!(round_half_even(1.2), 1.0);
    }
}
