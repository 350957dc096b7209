//! Middle-end optimizer for GLSL intermediate representation.
//!
//! A [`Shader`](ir::Shader) owns every variable, function and signature of one compilation
//! unit. Passes in [`ir::opt`] rewrite it in place and report whether they changed anything;
//! [`driver::Optimizer`] applies them repeatedly until nothing changes.

pub mod builtins;
pub mod driver;
pub mod error;
pub mod glsl_type;
pub mod ir;
pub mod overload;
pub mod scope;
pub mod symbol;
pub mod utils;

pub use driver::{optimize, OptimizeOutcome, Optimizer, OptimizerOptions, OptimizerState};
pub use ir::Shader;
