// Production-quality lints
#![warn(
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
// Deny truly dangerous patterns
#![deny(clippy::mem_forget)]
// Allow common patterns in library code
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! # schemalign
//!
//! Compiles schema alignments into app-schema mapping documents.
//!
//! ## Core Concept
//!
//! An **alignment** is a set of rules ("cells") relating a source schema
//! (tables and columns) to a target schema (nested GML application schema).
//! Each cell names a transformation function. schemalign compiles the
//! alignment into a **mapping document** a feature-access layer uses to
//! project stored records into target features:
//!
//! - **Type cells** (`retype`, `join`) establish one feature type mapping per
//!   target feature type
//! - **Property cells** (`rename`, `classification`, `formatted_string`, ...)
//!   fill in attribute mappings with query expressions
//! - **Joins** chain nested feature types into their container through a
//!   shared link field
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use schemalign::{compile, Alignment, CompilerConfig, Schema, SchemaIndex};
//!
//! let source = SchemaIndex::new(Schema::from_yaml(&source_yaml)?);
//! let target = SchemaIndex::new(Schema::from_yaml(&target_yaml)?);
//! let alignment = Alignment::from_yaml(&alignment_yaml)?;
//!
//! let output = compile(&alignment, &source, &target, &CompilerConfig::default());
//! if !output.report.success {
//!     eprintln!("{}", output.report.to_report());
//! }
//! println!("{}", output.document.to_xml()?);
//! ```
//!
//! ## Alignment Format
//!
//! ```yaml
//! id: landcover
//! cells:
//!   - id: unit_type
//!     function: retype
//!     source:
//!       - type: landcover_norm
//!     target:
//!       - type: "{http://inspire.ec.europa.eu/schemas/lcv/3.0}LandCoverUnitType"
//!   - id: unit_geometry
//!     function: rename
//!     source:
//!       - type: landcover_norm
//!         path: [{ name: geom }]
//!     target:
//!       - type: "{http://inspire.ec.europa.eu/schemas/lcv/3.0}LandCoverUnitType"
//!         path:
//!           - name: "{http://inspire.ec.europa.eu/schemas/lcv/3.0}geometry"
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Alignment ──► Compiler ──► FunctionHandler ──► MappingContext ──► MappingDocument
//!                               │    │                                  │
//!                               │    └── PathResolver (target paths)    ├── XML (templates)
//!                               └── JoinPlanner (feature chaining)      └── JSON / YAML
//!
//! Alignment ──► rif::translate ──► RifDocument
//! ```

pub mod alignment;
pub mod compiler;
pub mod condition;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod expression;
pub mod handlers;
pub mod join;
pub mod path;
pub mod report;
pub mod rif;
pub mod schema;
pub mod templates;

// Re-exports
pub use alignment::{
    Alignment, Cell, ComplexValue, EntityRef, JoinCondition, JoinParameter, LookupTable,
    ParameterValue, Parameters, PathStep, Severity, ValidationIssue,
};
pub use compiler::{compile, CompileOutput, Compiler};
pub use condition::{ComparisonOp, ConditionNode, LiteralKind, LiteralValue, LogicalOp, Operand};
pub use config::{CompilerConfig, OutputFormat};
pub use context::{FeatureLink, MappingContext};
pub use document::{AttributeMapping, ClientProperty, FeatureTypeMapping, MappingDocument, Namespace};
pub use error::{Error, Result};
pub use expression::{Expr, FormatPattern, NIL};
pub use handlers::{Capability, FunctionHandler, NotClassifiedAction};
pub use join::{JoinPlan, JoinPlanner};
pub use path::{PathResolver, PathSegment, Placement, ResolvedPath};
pub use report::{CellFailure, CompileReport, FailureKind};
pub use rif::{translate, RifDocument, RifFormula, RifRule};
pub use schema::{QName, Schema, SchemaIndex, TypeDefinition};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
