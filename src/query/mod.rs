//! Querystring language: directives (`_order`, `_limit`, `_include`, ...) and attribute filters.

mod compiler;
mod descriptor;
pub use compiler::*;
pub use descriptor::*;
