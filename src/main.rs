use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use similar::TextDiff;

use glsl_ir_opt::{
    ir::{print::print_shader, reader::read_shader},
    symbol::meta::ShaderStage,
    OptimizerOptions, OptimizerState,
};

/// Optimizes GLSL IR given in S-expression form.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Input IR file
    input: PathBuf,

    /// Output path (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print a unified diff of the IR before and after optimization to stderr
    #[arg(long)]
    diff: bool,

    /// Print the passes that made progress in each iteration to stderr
    #[arg(long)]
    stats: bool,

    /// -v for debug logs, -vv for trace logs
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Shader stage, overriding a `(stage ..)` directive in the input
    #[arg(long, value_parser = parse_stage)]
    stage: Option<ShaderStage>,

    /// Treat the input as a whole linked program
    #[arg(long)]
    linked: bool,

    /// Flatten every `if` nested deeper than this
    #[arg(long, default_value_t = u32::MAX)]
    max_if_depth: u32,

    /// Flatten `if`s whose branches each cost less than this (0 disables)
    #[arg(long, default_value_t = 0)]
    min_branch_cost: u32,

    /// Keep vector constructors that are a single extended swizzle
    #[arg(long)]
    native_extended_swizzle: bool,

    /// Move constant arrays into uniforms within this many uniform slots
    #[arg(long)]
    max_uniform_components: Option<u32>,

    /// Uniform locations are final; keep unused uniforms
    #[arg(long)]
    uniform_locations_assigned: bool,

    #[arg(long, default_value_t = 100)]
    max_iterations: u32,

    #[arg(long)]
    lower_matrix_ops: bool,

    #[arg(long)]
    lower_texture_projection: bool,

    #[arg(long)]
    lower_vector_constructors: bool,

    #[arg(long)]
    lower_output_reads: bool,

    #[arg(long)]
    lower_subroutines: bool,
}
impl Cli {
    fn options(&self) -> OptimizerOptions {
        OptimizerOptions {
            stage: self.stage,
            max_if_depth: self.max_if_depth,
            min_branch_cost: self.min_branch_cost,
            native_extended_swizzle: self.native_extended_swizzle,
            linked: self.linked,
            max_uniform_components: self.max_uniform_components,
            uniform_locations_assigned: self.uniform_locations_assigned,
            max_iterations: self.max_iterations,
            lower_matrix_ops: self.lower_matrix_ops,
            lower_texture_projection: self.lower_texture_projection,
            lower_vector_constructors: self.lower_vector_constructors,
            lower_output_reads: self.lower_output_reads,
            lower_subroutines: self.lower_subroutines,
        }
    }
}

fn parse_stage(s: &str) -> Result<ShaderStage, String> {
    ShaderStage::from_name(s).ok_or_else(|| {
        format!("invalid stage '{s}', expected vertex, tess_ctrl, tess_eval, geometry, fragment or compute")
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_module("glsl_ir_opt", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .init();

    let source = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let mut shader = read_shader(&source)
        .with_context(|| format!("failed to read IR from {}", cli.input.display()))?;
    let before = cli.diff.then(|| print_shader(&shader));

    let outcome = glsl_ir_opt::optimize(&mut shader, &cli.options());
    let after = print_shader(&shader);

    if cli.stats {
        for (n, changed) in outcome.reports.iter().enumerate() {
            eprintln!("iteration {}: {}", n + 1, changed.join(", "));
        }
        eprintln!(
            "{} after {} iteration(s)",
            match outcome.state {
                OptimizerState::Converged => "converged",
                _ => "gave up",
            },
            outcome.iterations
        );
    }
    if let Some(before) = before {
        let diff = TextDiff::from_lines(&before, &after);
        eprint!(
            "{}",
            diff.unified_diff()
                .header(&cli.input.display().to_string(), "optimized")
        );
    }

    match &cli.output {
        Some(path) => std::fs::write(path, &after)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{after}"),
    }

    Ok(())
}
