//! Implicit conversion rules used by call resolution.

use crate::symbol::meta::LanguageState;

use super::{BaseType, GlslType};

/// How an argument reaches a parameter type, best first.
///
/// [`ParameterMatch::Other`] (int to uint and similar) only loses against an exact match or
/// float to double; it is neither better nor worse than the int conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParameterMatch {
    Exact,
    FloatToDouble,
    IntToFloat,
    IntToDouble,
    Other,
}
impl ParameterMatch {
    pub fn classify(from: &GlslType, to: &GlslType) -> Self {
        if from == to {
            return Self::Exact;
        }
        if to.is_double() {
            return if from.is_float() {
                Self::FloatToDouble
            } else {
                Self::IntToDouble
            };
        }
        if to.is_float() {
            return Self::IntToFloat;
        }

        Self::Other
    }

    /// Strictly better for one parameter.
    pub fn is_better_than(self, other: Self) -> bool {
        if self >= Self::IntToFloat && other == Self::Other {
            return false;
        }

        self < other
    }
}

impl GlslType {
    pub fn can_implicitly_convert_to(&self, desired: &GlslType, state: &LanguageState) -> bool {
        if self == desired {
            return true;
        }
        if !state.has_implicit_conversions() {
            return false;
        }

        let (
            &GlslType::Basic {
                base: from,
                vector_elements: from_elements,
                matrix_columns: from_columns,
            },
            &GlslType::Basic {
                base: to,
                vector_elements: to_elements,
                matrix_columns: to_columns,
            },
        ) = (self, desired)
        else {
            return false;
        };
        // no conversion among matrix types
        if from_columns > 1 || to_columns > 1 {
            return false;
        }
        if from_elements != to_elements {
            return false;
        }

        match (from, to) {
            (BaseType::Int | BaseType::Uint, BaseType::Float) => true,
            (BaseType::Int, BaseType::Uint) => state.has_implicit_int_to_uint_conversion(),
            (BaseType::Double, _) => false,
            (BaseType::Float | BaseType::Int | BaseType::Uint, BaseType::Double) => {
                state.has_double()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::meta::Extensions;

    fn glsl(version: u32) -> LanguageState {
        LanguageState::new(version, false)
    }

    #[test]
    fn legacy_and_es_have_no_conversions() {
        let vec2 = GlslType::vector(BaseType::Float, 2);
        let ivec2 = GlslType::vector(BaseType::Int, 2);
        assert!(!ivec2.can_implicitly_convert_to(&vec2, &glsl(110)));
        assert!(!ivec2.can_implicitly_convert_to(&vec2, &LanguageState::new(310, true)));
        assert!(ivec2.can_implicitly_convert_to(&vec2, &glsl(120)));
        assert!(!vec2.can_implicitly_convert_to(&ivec2, &glsl(460)));
    }

    #[test]
    fn int_to_uint_needs_gpu_shader5() {
        let mut state = glsl(330);
        assert!(!GlslType::INT.can_implicitly_convert_to(&GlslType::UINT, &state));
        state.extensions |= Extensions::GPU_SHADER5;
        assert!(GlslType::INT.can_implicitly_convert_to(&GlslType::UINT, &state));
        assert!(GlslType::INT.can_implicitly_convert_to(&GlslType::UINT, &glsl(400)));
    }

    #[test]
    fn doubles_never_narrow() {
        let state = glsl(400);
        assert!(GlslType::FLOAT.can_implicitly_convert_to(&GlslType::DOUBLE, &state));
        assert!(!GlslType::DOUBLE.can_implicitly_convert_to(&GlslType::FLOAT, &state));
        assert!(!GlslType::FLOAT.can_implicitly_convert_to(&GlslType::DOUBLE, &glsl(330)));
    }

    #[test]
    fn matrices_do_not_convert() {
        let mat2 = GlslType::matrix(BaseType::Float, 2, 2);
        let dmat2 = GlslType::matrix(BaseType::Double, 2, 2);
        assert!(!mat2.can_implicitly_convert_to(&dmat2, &glsl(450)));
    }

    #[test]
    fn other_conversions_are_unordered() {
        assert!(ParameterMatch::Exact.is_better_than(ParameterMatch::IntToFloat));
        assert!(ParameterMatch::FloatToDouble.is_better_than(ParameterMatch::IntToDouble));
        assert!(ParameterMatch::Exact.is_better_than(ParameterMatch::Other));
        assert!(!ParameterMatch::IntToFloat.is_better_than(ParameterMatch::Other));
        assert!(!ParameterMatch::Other.is_better_than(ParameterMatch::IntToDouble));
    }
}
