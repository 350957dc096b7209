use crate::glsl_type::{BaseType, GlslType};

/// Operator of an [`Expression`](super::Expression).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprOp {
    BitNot,
    LogicNot,
    Neg,
    Abs,
    Sign,
    Rcp,
    Rsq,
    Sqrt,
    Exp,
    Log,
    Exp2,
    Log2,
    F2i,
    F2u,
    I2f,
    F2b,
    B2f,
    I2b,
    B2i,
    U2f,
    I2u,
    U2i,
    D2f,
    F2d,
    D2i,
    I2d,
    D2u,
    U2d,
    Trunc,
    Ceil,
    Floor,
    Fract,
    RoundEven,
    Sin,
    Cos,
    Dfdx,
    Dfdy,
    SubroutineToInt,

    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Less,
    Greater,
    Lequal,
    Gequal,
    Equal,
    Nequal,
    /// Whole-value equality, a single bool.
    AllEqual,
    /// Whole-value inequality, a single bool.
    AnyNequal,
    Lshift,
    Rshift,
    BitAnd,
    BitXor,
    BitOr,
    LogicAnd,
    LogicXor,
    LogicOr,
    Dot,
    Min,
    Max,
    Pow,

    Fma,
    Lrp,
    Csel,

    /// Builds a vector from 2 to 4 scalar operands.
    Vector,
}

const OPERATOR_NAMES: &[(ExprOp, &str)] = &[
    (ExprOp::BitNot, "~"),
    (ExprOp::LogicNot, "!"),
    (ExprOp::Neg, "neg"),
    (ExprOp::Abs, "abs"),
    (ExprOp::Sign, "sign"),
    (ExprOp::Rcp, "rcp"),
    (ExprOp::Rsq, "rsq"),
    (ExprOp::Sqrt, "sqrt"),
    (ExprOp::Exp, "exp"),
    (ExprOp::Log, "log"),
    (ExprOp::Exp2, "exp2"),
    (ExprOp::Log2, "log2"),
    (ExprOp::F2i, "f2i"),
    (ExprOp::F2u, "f2u"),
    (ExprOp::I2f, "i2f"),
    (ExprOp::F2b, "f2b"),
    (ExprOp::B2f, "b2f"),
    (ExprOp::I2b, "i2b"),
    (ExprOp::B2i, "b2i"),
    (ExprOp::U2f, "u2f"),
    (ExprOp::I2u, "i2u"),
    (ExprOp::U2i, "u2i"),
    (ExprOp::D2f, "d2f"),
    (ExprOp::F2d, "f2d"),
    (ExprOp::D2i, "d2i"),
    (ExprOp::I2d, "i2d"),
    (ExprOp::D2u, "d2u"),
    (ExprOp::U2d, "u2d"),
    (ExprOp::Trunc, "trunc"),
    (ExprOp::Ceil, "ceil"),
    (ExprOp::Floor, "floor"),
    (ExprOp::Fract, "fract"),
    (ExprOp::RoundEven, "round_even"),
    (ExprOp::Sin, "sin"),
    (ExprOp::Cos, "cos"),
    (ExprOp::Dfdx, "dFdx"),
    (ExprOp::Dfdy, "dFdy"),
    (ExprOp::SubroutineToInt, "subroutine_to_int"),
    (ExprOp::Add, "+"),
    (ExprOp::Sub, "-"),
    (ExprOp::Mul, "*"),
    (ExprOp::Div, "/"),
    (ExprOp::Mod, "%"),
    (ExprOp::Less, "<"),
    (ExprOp::Greater, ">"),
    (ExprOp::Lequal, "<="),
    (ExprOp::Gequal, ">="),
    (ExprOp::Equal, "=="),
    (ExprOp::Nequal, "!="),
    (ExprOp::AllEqual, "all_equal"),
    (ExprOp::AnyNequal, "any_nequal"),
    (ExprOp::Lshift, "<<"),
    (ExprOp::Rshift, ">>"),
    (ExprOp::BitAnd, "&"),
    (ExprOp::BitXor, "^"),
    (ExprOp::BitOr, "|"),
    (ExprOp::LogicAnd, "&&"),
    (ExprOp::LogicXor, "^^"),
    (ExprOp::LogicOr, "||"),
    (ExprOp::Dot, "dot"),
    (ExprOp::Min, "min"),
    (ExprOp::Max, "max"),
    (ExprOp::Pow, "pow"),
    (ExprOp::Fma, "fma"),
    (ExprOp::Lrp, "lrp"),
    (ExprOp::Csel, "csel"),
    (ExprOp::Vector, "vector"),
];

impl ExprOp {
    pub fn name(self) -> &'static str {
        OPERATOR_NAMES
            .iter()
            .find(|(op, _)| *op == self)
            .map(|(_, n)| *n)
            .unwrap_or("?")
    }

    pub fn from_name(name: &str) -> Option<Self> {
        OPERATOR_NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(op, _)| *op)
    }

    /// Operand count; `None` for [`ExprOp::Vector`], which takes 2 to 4.
    pub const fn operand_count(self) -> Option<usize> {
        use ExprOp::*;

        match self {
            BitNot | LogicNot | Neg | Abs | Sign | Rcp | Rsq | Sqrt | Exp | Log | Exp2 | Log2
            | F2i | F2u | I2f | F2b | B2f | I2b | B2i | U2f | I2u | U2i | D2f | F2d | D2i
            | I2d | D2u | U2d | Trunc | Ceil | Floor | Fract | RoundEven | Sin | Cos | Dfdx
            | Dfdy | SubroutineToInt => Some(1),
            Add | Sub | Mul | Div | Mod | Less | Greater | Lequal | Gequal | Equal | Nequal
            | AllEqual | AnyNequal | Lshift | Rshift | BitAnd | BitXor | BitOr | LogicAnd
            | LogicXor | LogicOr | Dot | Min | Max | Pow => Some(2),
            Fma | Lrp | Csel => Some(3),
            Vector => None,
        }
    }

    /// Target base type of a conversion operator.
    pub const fn conversion_target(self) -> Option<BaseType> {
        use ExprOp::*;

        match self {
            F2i | B2i | U2i | D2i => Some(BaseType::Int),
            F2u | I2u | D2u => Some(BaseType::Uint),
            I2f | B2f | U2f | D2f => Some(BaseType::Float),
            F2b | I2b => Some(BaseType::Bool),
            F2d | I2d | U2d => Some(BaseType::Double),
            _ => None,
        }
    }

    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Less | Self::Greater | Self::Lequal | Self::Gequal | Self::Equal | Self::Nequal
        )
    }

    /// Type of `op(operands...)` under the usual GLSL rules.
    ///
    /// Panics when the operand shapes are not valid for the operator; callers only build
    /// expressions from already type-checked pieces.
    pub fn result_type(self, operands: &[&GlslType]) -> GlslType {
        use ExprOp::*;

        let first = operands[0];
        match self {
            _ if self.operand_count() == Some(1) => {
                if let Some(base) = self.conversion_target() {
                    return first
                        .with_base(base)
                        .unwrap_or_else(|| panic!("cannot convert {first}"));
                }
                match self {
                    SubroutineToInt => GlslType::INT,
                    _ => first.clone(),
                }
            }
            Less | Greater | Lequal | Gequal | Equal | Nequal => {
                let width = operands
                    .iter()
                    .map(|t| t.vector_elements())
                    .max()
                    .unwrap_or(1);
                GlslType::vector(BaseType::Bool, width)
            }
            AllEqual | AnyNequal | LogicAnd | LogicXor | LogicOr => GlslType::BOOL,
            Dot => GlslType::vector(
                first
                    .base_type()
                    .unwrap_or_else(|| panic!("dot of {first}")),
                1,
            ),
            Mul if first.is_matrix() || operands[1].is_matrix() => {
                let (a, b) = (first, operands[1]);
                let base = a.base_type().or(b.base_type()).unwrap_or(BaseType::Float);
                match (a.is_matrix(), b.is_matrix()) {
                    (true, true) => GlslType::matrix(base, b.matrix_columns(), a.vector_elements()),
                    (true, false) if b.is_vector() => GlslType::vector(base, a.vector_elements()),
                    (false, true) if a.is_vector() => GlslType::vector(base, b.matrix_columns()),
                    (true, false) => a.clone(),
                    _ => b.clone(),
                }
            }
            Fma | Lrp => first.clone(),
            Csel => operands[1].clone(),
            Vector => GlslType::vector(
                first.base_type().unwrap_or(BaseType::Float),
                operands.len() as u8,
            ),
            // component-wise with scalar broadcast
            _ => {
                if first.is_scalar() && operands.len() > 1 {
                    operands[1].clone()
                } else {
                    first.clone()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_names_are_unique_and_reversible() {
        for (op, name) in OPERATOR_NAMES {
            assert_eq!(ExprOp::from_name(name), Some(*op));
            assert_eq!(op.name(), *name);
        }
    }

    #[test]
    fn matrix_product_shapes() {
        let mat3x4 = GlslType::matrix(BaseType::Float, 3, 4);
        let mat2x3 = GlslType::matrix(BaseType::Float, 2, 3);
        let vec3 = GlslType::vector(BaseType::Float, 3);
        let vec4 = GlslType::vector(BaseType::Float, 4);
        assert_eq!(
            ExprOp::Mul.result_type(&[&mat3x4, &mat2x3]),
            GlslType::matrix(BaseType::Float, 2, 4)
        );
        assert_eq!(ExprOp::Mul.result_type(&[&mat3x4, &vec3]), vec4);
        assert_eq!(ExprOp::Mul.result_type(&[&vec4, &mat3x4]), vec3);
        assert_eq!(ExprOp::Mul.result_type(&[&GlslType::FLOAT, &mat3x4]), mat3x4);
    }

    #[test]
    fn comparisons_produce_boolean_vectors() {
        let vec3 = GlslType::vector(BaseType::Float, 3);
        assert_eq!(
            ExprOp::Less.result_type(&[&vec3, &vec3]),
            GlslType::vector(BaseType::Bool, 3)
        );
        assert_eq!(ExprOp::AnyNequal.result_type(&[&vec3, &vec3]), GlslType::BOOL);
        assert_eq!(
            ExprOp::F2i.result_type(&[&vec3]),
            GlslType::vector(BaseType::Int, 3)
        );
    }
}
