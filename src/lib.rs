//! Structural model of Java class files: constant pools, members,
//! attributes and decoded method bodies, aggregated over directories and
//! archives.

pub mod class;
pub mod code;
pub mod consts;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod options;
pub mod signature;

pub use class::StructClass;
pub use context::StructContext;
pub use error::{ClassFormatError, Error, Result};
pub use options::DecompilerOptions;
