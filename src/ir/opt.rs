//! IR-to-IR rewrites. Every pass takes the shader and returns whether it changed anything.

pub mod array_splitting;
pub mod const_arrays;
pub mod constant_folding;
pub mod dead_code;
pub mod dead_functions;
pub mod expression_flattening;
pub mod if_simplification;
pub mod if_to_cond_assign;
pub mod inline;
pub mod lower_subroutine;
pub mod lower_vector;
pub mod mat_op_to_vec;
pub mod nested_if;
pub mod output_reads;
pub mod redundant_jumps;
mod splitting;
pub mod structure_splitting;
pub mod tex_projection;
pub mod unused_typedecls;
pub mod variable_refcount;

pub use array_splitting::optimize_split_arrays;
pub use const_arrays::lower_const_arrays_to_uniforms;
pub use constant_folding::do_constant_folding;
pub use dead_code::{do_dead_code, do_dead_code_unlinked};
pub use dead_functions::do_dead_functions;
pub use expression_flattening::do_expression_flattening;
pub use if_simplification::do_if_simplification;
pub use if_to_cond_assign::lower_if_to_cond_assign;
pub use inline::do_function_inlining;
pub use lower_subroutine::lower_subroutine;
pub use lower_vector::lower_quadop_vector;
pub use mat_op_to_vec::do_mat_op_to_vec;
pub use nested_if::opt_flatten_nested_if_blocks;
pub use output_reads::lower_output_reads;
pub use redundant_jumps::optimize_redundant_jumps;
pub use structure_splitting::do_structure_splitting;
pub use tex_projection::do_lower_texture_projection;
pub use unused_typedecls::do_remove_unused_typedecls;
