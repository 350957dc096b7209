//! Fixed-point pass scheduling.
//!
//! [`Optimizer`] applies its passes in a fixed order, over and over, until a whole sequence
//! changes nothing or the iteration budget runs out.

use crate::{
    ir::{opt, Shader},
    symbol::meta::ShaderStage,
};

/// One IR-to-IR rewrite.
pub trait Pass {
    /// Name used in logs and iteration reports.
    fn name(&self) -> &str;

    /// Runs the pass once. Returns `true` if anything was modified.
    fn run(&self, shader: &mut Shader) -> bool;
}

/// A pass given as a function.
pub struct FnPass<F> {
    name: &'static str,
    run: F,
}
impl<F: Fn(&mut Shader) -> bool> FnPass<F> {
    pub const fn new(name: &'static str, run: F) -> Self {
        Self { name, run }
    }
}
impl<F: Fn(&mut Shader) -> bool> Pass for FnPass<F> {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, shader: &mut Shader) -> bool {
        (self.run)(shader)
    }
}

/// Configuration of one optimizer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizerOptions {
    /// Overrides the stage recorded in the shader.
    pub stage: Option<ShaderStage>,
    /// `if`s nested deeper than this are flattened regardless of cost. `u32::MAX` disables.
    pub max_if_depth: u32,
    /// `if`s whose branches each cost less than this are flattened. 0 disables.
    pub min_branch_cost: u32,
    /// Keep vector constructors the target evaluates as a single extended swizzle.
    pub native_extended_swizzle: bool,
    /// The shader is a whole linked program rather than one compilation unit.
    pub linked: bool,
    /// Uniform slots available for constant arrays. `None` keeps constant arrays in place.
    pub max_uniform_components: Option<u32>,
    /// Uniform locations are final, so unused uniforms are still part of the interface.
    pub uniform_locations_assigned: bool,
    pub max_iterations: u32,
    pub lower_matrix_ops: bool,
    pub lower_texture_projection: bool,
    pub lower_vector_constructors: bool,
    pub lower_output_reads: bool,
    pub lower_subroutines: bool,
}
impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            stage: None,
            max_if_depth: u32::MAX,
            min_branch_cost: 0,
            native_extended_swizzle: false,
            linked: false,
            max_uniform_components: None,
            uniform_locations_assigned: false,
            max_iterations: 100,
            lower_matrix_ops: false,
            lower_texture_projection: false,
            lower_vector_constructors: false,
            lower_output_reads: false,
            lower_subroutines: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerState {
    Running,
    /// A whole pass sequence made no change.
    Converged,
    /// The iteration budget ran out while passes still made progress. The IR is valid but
    /// possibly not fully reduced.
    Bailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizeOutcome {
    pub state: OptimizerState,
    pub iterations: u32,
    /// Some pass made progress at least once.
    pub progress: bool,
    /// Names of the passes that made progress, per iteration.
    pub reports: Vec<Vec<String>>,
}

/// Runs passes in sequence until a fixed point is reached or the iteration limit.
pub struct Optimizer {
    stage: Option<ShaderStage>,
    max_iterations: u32,
    passes: Vec<Box<dyn Pass>>,
}
impl Optimizer {
    /// An optimizer without passes.
    pub fn empty(max_iterations: u32) -> Self {
        Self {
            stage: None,
            max_iterations,
            passes: Vec::new(),
        }
    }

    /// The full pass sequence configured by `options`.
    pub fn new(options: &OptimizerOptions) -> Self {
        let mut o = Self::empty(options.max_iterations);
        o.stage = options.stage;

        if options.lower_subroutines {
            o.add(FnPass::new("lower_subroutine", opt::lower_subroutine));
        }
        o.add(FnPass::new("inline", opt::do_function_inlining));
        if options.linked {
            o.add(FnPass::new("dead_functions", opt::do_dead_functions));
        }
        let linked = options.linked;
        o.add(FnPass::new("structure_splitting", move |s: &mut Shader| {
            opt::do_structure_splitting(s, linked)
        }));
        o.add(FnPass::new("if_simplification", opt::do_if_simplification));
        o.add(FnPass::new("nested_if", opt::opt_flatten_nested_if_blocks));
        if options.lower_matrix_ops {
            o.add(FnPass::new("mat_op_to_vec", opt::do_mat_op_to_vec));
        }
        if options.lower_texture_projection {
            o.add(FnPass::new("tex_projection", opt::do_lower_texture_projection));
        }
        if options.lower_vector_constructors {
            let native = options.native_extended_swizzle;
            o.add(FnPass::new("lower_vector", move |s: &mut Shader| {
                opt::lower_quadop_vector(s, native)
            }));
        }
        let (max_depth, min_cost) = (options.max_if_depth, options.min_branch_cost);
        o.add(FnPass::new("if_to_cond_assign", move |s: &mut Shader| {
            let stage = s.stage;
            opt::lower_if_to_cond_assign(s, stage, max_depth, min_cost)
        }));
        if options.lower_output_reads {
            o.add(FnPass::new("output_reads", opt::lower_output_reads));
        }
        if options.linked {
            let assigned = options.uniform_locations_assigned;
            o.add(FnPass::new("dead_code", move |s: &mut Shader| {
                opt::do_dead_code(s, assigned)
            }));
        } else {
            o.add(FnPass::new("dead_code", opt::do_dead_code_unlinked));
        }
        o.add(FnPass::new("constant_folding", opt::do_constant_folding));
        if let Some(max) = options.max_uniform_components {
            o.add(FnPass::new("const_arrays", move |s: &mut Shader| {
                opt::lower_const_arrays_to_uniforms(s, max)
            }));
        }
        o.add(FnPass::new("array_splitting", move |s: &mut Shader| {
            opt::optimize_split_arrays(s, linked)
        }));
        o.add(FnPass::new("redundant_jumps", opt::optimize_redundant_jumps));
        o.add(FnPass::new("unused_typedecls", opt::do_remove_unused_typedecls));

        o
    }

    pub fn add(&mut self, pass: impl Pass + 'static) {
        self.passes.push(Box::new(pass));
    }

    pub fn pass_names(&self) -> impl Iterator<Item = &str> {
        self.passes.iter().map(|p| p.name())
    }

    pub fn run(&self, shader: &mut Shader) -> OptimizeOutcome {
        if let Some(stage) = self.stage {
            shader.stage = stage;
        }

        let mut outcome = OptimizeOutcome {
            state: OptimizerState::Running,
            iterations: 0,
            progress: false,
            reports: Vec::new(),
        };
        while outcome.state == OptimizerState::Running {
            if outcome.iterations == self.max_iterations {
                log::warn!(
                    "optimizer gave up after {} iterations without reaching a fixed point",
                    outcome.iterations
                );
                outcome.state = OptimizerState::Bailed;
                break;
            }

            outcome.iterations += 1;
            let changed = self
                .passes
                .iter()
                .filter(|p| p.run(shader))
                .map(|p| p.name().to_owned())
                .collect::<Vec<_>>();
            log::debug!("iteration {}: progress in {:?}", outcome.iterations, changed);

            if changed.is_empty() {
                log::info!("optimizer converged after {} iterations", outcome.iterations);
                outcome.state = OptimizerState::Converged;
            } else {
                outcome.progress = true;
            }
            outcome.reports.push(changed);
        }

        outcome
    }
}

/// Optimizes `shader` in place with the pass sequence `options` configures.
pub fn optimize(shader: &mut Shader, options: &OptimizerOptions) -> OptimizeOutcome {
    Optimizer::new(options).run(shader)
}
