//! Transformation module.
//!
//! This module turns extracted entries into the delivered result:
//! - Assembler: validated entries to schedule + rejection report
//! - Catalog: schedule to the class-oriented designation view
//! - Pipeline: the staged orchestrator tying every step together

pub mod assembler;
pub mod catalog;
pub mod pipeline;

pub use assembler::{assemble, ResultAssembler};
pub use catalog::{Designation, DivisionCatalog, SubjectDesignation};
pub use pipeline::*;
