//! Call-site to signature matching.

use crate::{
    error::OverloadError,
    glsl_type::{conversion_rules::ParameterMatch, GlslType},
    ir::{FunctionRef, Shader, SignatureRef, VarRef},
    symbol::meta::{LanguageState, VariableFlags, VariableMode},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterListMatch {
    Exact,
    Inexact,
    None,
}

/// Result of a successful lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureMatch {
    pub signature: SignatureRef,
    pub is_exact: bool,
}

/// Whether the arguments fit `params` without conversions, with implicit conversions, or not
/// at all.
pub fn parameter_lists_match(
    shader: &Shader,
    state: &LanguageState,
    params: &[VarRef],
    actuals: &[GlslType],
) -> ParameterListMatch {
    if params.len() != actuals.len() {
        return ParameterListMatch::None;
    }

    let mut inexact = false;
    for (&p, actual) in params.iter().zip(actuals) {
        let param = shader.var(p);
        if &param.ty == actual {
            continue;
        }

        inexact = true;
        match param.mode {
            VariableMode::FunctionIn | VariableMode::ConstIn => {
                if param
                    .flags
                    .contains(VariableFlags::IMPLICIT_CONVERSION_PROHIBITED)
                    || !actual.can_implicitly_convert_to(&param.ty, state)
                {
                    return ParameterListMatch::None;
                }
            }
            VariableMode::FunctionOut => {
                if !param.ty.can_implicitly_convert_to(actual, state) {
                    return ParameterListMatch::None;
                }
            }
            // no conversion works in both directions
            VariableMode::FunctionInout => return ParameterListMatch::None,
            mode => panic!("parameter `{}` declared as {}", param.name, mode.keyword()),
        }
    }

    if inexact {
        ParameterListMatch::Inexact
    } else {
        ParameterListMatch::Exact
    }
}

fn parameter_match(shader: &Shader, p: VarRef, actual: &GlslType) -> ParameterMatch {
    let param = shader.var(p);
    if param.mode == VariableMode::FunctionOut {
        ParameterMatch::classify(&param.ty, actual)
    } else {
        ParameterMatch::classify(actual, &param.ty)
    }
}

/// `sig` beats every other candidate: better on some parameter, worse on none.
fn is_best_inexact_overload(
    shader: &Shader,
    actuals: &[GlslType],
    candidates: &[SignatureRef],
    sig: SignatureRef,
) -> bool {
    candidates.iter().filter(|&&o| o != sig).all(|&other| {
        let mut better_somewhere = false;
        let pairs = shader
            .signature(sig)
            .parameters
            .iter()
            .zip(&shader.signature(other).parameters)
            .zip(actuals);
        for ((&a, &b), actual) in pairs {
            let (ma, mb) = (
                parameter_match(shader, a, actual),
                parameter_match(shader, b, actual),
            );
            if ma.is_better_than(mb) {
                better_somewhere = true;
            }
            if mb.is_better_than(ma) {
                return false;
            }
        }

        better_somewhere
    })
}

fn choose_best_inexact_overload(
    shader: &Shader,
    state: &LanguageState,
    actuals: &[GlslType],
    candidates: &[SignatureRef],
) -> Option<SignatureRef> {
    match candidates {
        [] => None,
        &[only] => Some(only),
        _ if state.ranks_inexact_overloads() => candidates
            .iter()
            .copied()
            .find(|&c| is_best_inexact_overload(shader, actuals, candidates, c)),
        _ => None,
    }
}

/// Finds the signature of `f` a call with argument types `actuals` resolves to.
///
/// An exact match wins immediately. Otherwise the single inexact candidate, or the one that
/// is at least as good on every parameter and better on some than every other candidate, is
/// chosen; without such a candidate the call is ambiguous. Built-in signatures take part only
/// when `allow_builtins` is set and they are available under `state`.
pub fn matching_signature(
    shader: &Shader,
    state: &LanguageState,
    f: FunctionRef,
    actuals: &[GlslType],
    allow_builtins: bool,
) -> Result<Option<SignatureMatch>, OverloadError> {
    let function = shader.function(f);
    let mut inexact = Vec::new();

    for &sig in &function.signatures {
        let s = shader.signature(sig);
        if s.is_builtin() && (!allow_builtins || !s.is_builtin_available(state)) {
            continue;
        }

        match parameter_lists_match(shader, state, &s.parameters, actuals) {
            ParameterListMatch::Exact => {
                return Ok(Some(SignatureMatch {
                    signature: sig,
                    is_exact: true,
                }));
            }
            // subroutine signatures must match exactly
            ParameterListMatch::Inexact if function.is_subroutine => (),
            ParameterListMatch::Inexact => {
                inexact
                    .try_reserve(1)
                    .map_err(|_| OverloadError::OutOfMemory {
                        name: function.name.clone(),
                    })?;
                inexact.push(sig);
            }
            ParameterListMatch::None => (),
        }
    }

    if inexact.len() > 1 {
        log::trace!(
            "[overload] {} inexact candidates for {}",
            inexact.len(),
            function.name
        );
    }
    match choose_best_inexact_overload(shader, state, actuals, &inexact) {
        Some(signature) => Ok(Some(SignatureMatch {
            signature,
            is_exact: false,
        })),
        None if inexact.len() > 1 => Err(OverloadError::AmbiguousCall {
            name: function.name.clone(),
        }),
        None => Ok(None),
    }
}

/// Exact match only, never considering conversions.
pub fn exact_matching_signature(
    shader: &Shader,
    state: &LanguageState,
    f: FunctionRef,
    actuals: &[GlslType],
) -> Option<SignatureRef> {
    shader.function(f).signatures.iter().copied().find(|&sig| {
        parameter_lists_match(shader, state, &shader.signature(sig).parameters, actuals)
            == ParameterListMatch::Exact
    })
}

#[cfg(test)]
mod tests {
    use typed_arena::Arena;

    use super::*;
    use crate::{
        glsl_type::BaseType,
        ir::{Function, FunctionSignature},
        scope::SymbolTable,
        symbol::Variable,
    };

    fn declare(shader: &mut Shader, f: FunctionRef, params: &[(VariableMode, GlslType)]) -> SignatureRef {
        let parameters = params
            .iter()
            .map(|(m, t)| shader.add_variable(Variable::new("p", t.clone(), *m)))
            .collect();
        shader.add_signature(FunctionSignature {
            function: f,
            return_type: GlslType::Void,
            parameters,
            body: Vec::new(),
            is_defined: true,
            builtin: None,
        })
    }

    fn shader() -> Shader {
        Shader::new(
            crate::symbol::meta::ShaderStage::Fragment,
            LanguageState::new(460, false),
        )
    }

    #[test]
    fn exact_match_short_circuits() {
        let mut s = shader();
        let f = s.add_function(Function::new("f"));
        let _float = declare(&mut s, f, &[(VariableMode::FunctionIn, GlslType::FLOAT)]);
        let int = declare(&mut s, f, &[(VariableMode::FunctionIn, GlslType::INT)]);
        let state = s.language.clone();

        let m = matching_signature(&s, &state, f, &[GlslType::INT], false).unwrap();
        assert_eq!(
            m,
            Some(SignatureMatch {
                signature: int,
                is_exact: true
            })
        );
    }

    #[test]
    fn better_conversion_wins_independent_of_order() {
        for reversed in [false, true] {
            let mut s = shader();
            let f = s.add_function(Function::new("f"));
            let float2 = [
                (VariableMode::FunctionIn, GlslType::FLOAT),
                (VariableMode::FunctionIn, GlslType::FLOAT),
            ];
            let double2 = [
                (VariableMode::FunctionIn, GlslType::DOUBLE),
                (VariableMode::FunctionIn, GlslType::DOUBLE),
            ];
            let (first, second): (&[_], &[_]) = if reversed {
                (&double2, &float2)
            } else {
                (&float2, &double2)
            };
            let a = declare(&mut s, f, first);
            let b = declare(&mut s, f, second);
            let floats = if reversed { b } else { a };
            let state = s.language.clone();

            for _ in 0..3 {
                let m = matching_signature(&s, &state, f, &[GlslType::INT, GlslType::FLOAT], false)
                    .unwrap();
                assert_eq!(
                    m,
                    Some(SignatureMatch {
                        signature: floats,
                        is_exact: false
                    })
                );
            }
        }
    }

    #[test]
    fn mutually_non_dominating_candidates_are_ambiguous() {
        let mut s = shader();
        let f = s.add_function(Function::new("f"));
        declare(
            &mut s,
            f,
            &[
                (VariableMode::FunctionIn, GlslType::FLOAT),
                (VariableMode::FunctionIn, GlslType::DOUBLE),
            ],
        );
        declare(
            &mut s,
            f,
            &[
                (VariableMode::FunctionIn, GlslType::DOUBLE),
                (VariableMode::FunctionIn, GlslType::FLOAT),
            ],
        );
        let state = s.language.clone();

        for _ in 0..2 {
            assert_eq!(
                matching_signature(&s, &state, f, &[GlslType::INT, GlslType::INT], false),
                Err(OverloadError::AmbiguousCall {
                    name: "f".to_owned()
                })
            );
        }
    }

    #[test]
    fn old_versions_do_not_rank_inexact_candidates() {
        let mut s = shader();
        let f = s.add_function(Function::new("f"));
        declare(&mut s, f, &[(VariableMode::FunctionIn, GlslType::FLOAT)]);
        declare(&mut s, f, &[(VariableMode::FunctionIn, GlslType::DOUBLE)]);
        let mut state = LanguageState::new(330, false);
        state.extensions |= crate::symbol::meta::Extensions::GPU_SHADER_FP64;

        assert!(matches!(
            matching_signature(&s, &state, f, &[GlslType::INT], false),
            Err(OverloadError::AmbiguousCall { .. })
        ));
    }

    #[test]
    fn out_and_inout_parameters_convert_in_their_direction() {
        let mut s = shader();
        let f = s.add_function(Function::new("f"));
        let out = declare(&mut s, f, &[(VariableMode::FunctionOut, GlslType::INT)]);
        let g = s.add_function(Function::new("g"));
        declare(&mut s, g, &[(VariableMode::FunctionInout, GlslType::INT)]);
        let state = s.language.clone();

        assert_eq!(
            matching_signature(&s, &state, f, &[GlslType::FLOAT], false)
                .unwrap()
                .map(|m| m.signature),
            Some(out)
        );
        assert_eq!(
            matching_signature(&s, &state, f, &[GlslType::BOOL], false),
            Ok(None)
        );
        assert_eq!(
            matching_signature(&s, &state, g, &[GlslType::FLOAT], false),
            Ok(None)
        );
    }

    #[test]
    fn builtins_need_permission_and_availability() {
        let arena = Arena::new();
        let mut symbols = SymbolTable::new(&arena);
        let mut s = shader();
        let fma = s.import_builtin("fma", &mut symbols).unwrap().unwrap();
        let vec3 = GlslType::vector(BaseType::Float, 3);
        let args = [vec3.clone(), vec3.clone(), vec3];

        assert_eq!(
            matching_signature(&s, &s.language.clone(), fma, &args, false),
            Ok(None)
        );
        assert!(matching_signature(&s, &s.language.clone(), fma, &args, true)
            .unwrap()
            .is_some_and(|m| m.is_exact));
        assert_eq!(
            matching_signature(&s, &LanguageState::new(330, false), fma, &args, true),
            Ok(None)
        );
    }
}
