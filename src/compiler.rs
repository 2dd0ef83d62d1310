//! Alignment compiler
//!
//! Drives the handlers over an alignment in two phases: type cells first,
//! establishing the feature type mappings, then property cells, which are
//! matched to the type cell that owns them. Failures stay local to the
//! cell that caused them unless a type cell fails, in which case every
//! property cell depending on it is reported as well.

use crate::alignment::{Alignment, Cell};
use crate::config::CompilerConfig;
use crate::context::MappingContext;
use crate::document::MappingDocument;
use crate::error::{Error, Result};
use crate::handlers::{Capability, FunctionHandler};
use crate::report::{CellFailure, CompileReport};
use crate::schema::SchemaIndex;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Document plus the report describing how it was built
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub document: MappingDocument,
    pub report: CompileReport,
}

/// Outcome of a type cell, tracked for its dependents
#[derive(Debug, Default)]
struct TypeCellStates {
    established: HashSet<String>,
    failed: HashSet<String>,
}

/// Compiles alignments against one pair of schemas
pub struct Compiler<'a> {
    source: &'a SchemaIndex,
    target: &'a SchemaIndex,
    config: &'a CompilerConfig,
}

impl<'a> Compiler<'a> {
    pub fn new(
        source: &'a SchemaIndex,
        target: &'a SchemaIndex,
        config: &'a CompilerConfig,
    ) -> Self {
        Self {
            source,
            target,
            config,
        }
    }

    /// Compile with type cells moved ahead of property cells
    pub fn compile(&self, alignment: &Alignment) -> CompileOutput {
        let (types, properties): (Vec<&Cell>, Vec<&Cell>) =
            alignment.cells.iter().partition(|c| c.is_type_cell());
        let order: Vec<&Cell> = types.into_iter().chain(properties).collect();
        self.run(alignment, &order)
    }

    /// Compile in the order the cells appear
    ///
    /// A property cell reached before its type cell fails with
    /// `MissingTypeCell`.
    pub fn compile_in_order(&self, alignment: &Alignment) -> CompileOutput {
        let order: Vec<&Cell> = alignment.cells.iter().collect();
        self.run(alignment, &order)
    }

    fn run(&self, alignment: &Alignment, order: &[&Cell]) -> CompileOutput {
        let mut ctx =
            MappingContext::new(self.source, self.target, self.config).with_alignment(alignment);
        let mut report = CompileReport::new();
        let mut states = TypeCellStates::default();

        for cell in order {
            let outcome = if cell.is_type_cell() {
                let outcome = compile_type_cell(cell, &mut ctx);
                match &outcome {
                    Ok(()) => states.established.insert(cell.id.clone()),
                    Err(_) => states.failed.insert(cell.id.clone()),
                };
                outcome
            } else {
                compile_property_cell(alignment, cell, &states, &mut ctx)
            };

            match outcome {
                Ok(()) => {
                    debug!(cell = %cell.id, function = %cell.function, "compiled cell");
                    report.compiled_cells.push(cell.id.clone());
                }
                Err(err) => {
                    warn!(cell = %cell.id, function = %cell.function, "{}", err);
                    report.record_failure(CellFailure {
                        cell_id: cell.id.clone(),
                        function: cell.function.clone(),
                        kind: err.kind(),
                        message: err.to_string(),
                    });
                    if self.config.fail_fast {
                        break;
                    }
                }
            }
        }

        let (document, warnings) = ctx.into_document();
        report.warnings = warnings;
        report.document_hash = document.hash();
        info!(
            compiled = report.compiled_cells.len(),
            failed = report.failure_count(),
            type_mappings = document.type_mappings.len(),
            hash = %report.document_hash,
            "compilation finished"
        );
        CompileOutput { document, report }
    }
}

/// Compile `alignment` against `source` and `target` in one call
pub fn compile(
    alignment: &Alignment,
    source: &SchemaIndex,
    target: &SchemaIndex,
    config: &CompilerConfig,
) -> CompileOutput {
    Compiler::new(source, target, config).compile(alignment)
}

fn compile_type_cell(cell: &Cell, ctx: &mut MappingContext<'_>) -> Result<()> {
    let handler = FunctionHandler::require(&cell.function)?;
    handler.handle_type_transformation(cell, ctx)?;
    Ok(())
}

fn compile_property_cell(
    alignment: &Alignment,
    cell: &Cell,
    states: &TypeCellStates,
    ctx: &mut MappingContext<'_>,
) -> Result<()> {
    let handler = FunctionHandler::require(&cell.function)?;
    if !handler.supports(Capability::PropertyTransformation) {
        return Err(Error::UnsupportedCapability {
            function: cell.function.clone(),
            capability: Capability::PropertyTransformation.to_string(),
        });
    }

    let type_cell = owning_type_cell(alignment, cell)?;
    if states.failed.contains(&type_cell.id) {
        return Err(Error::DependencyFailed {
            cell: cell.id.clone(),
            type_cell: type_cell.id.clone(),
        });
    }
    if !states.established.contains(&type_cell.id) {
        return Err(Error::MissingTypeCell {
            cell: cell.id.clone(),
        });
    }

    handler.handle_property_transformation(type_cell, cell, ctx)?;
    Ok(())
}

/// First type cell with the same target type whose sources cover the cell's
pub(crate) fn owning_type_cell<'c>(alignment: &'c Alignment, cell: &Cell) -> Result<&'c Cell> {
    let target = cell.target_entity()?;
    let needed = cell.source_types();
    alignment
        .cells
        .iter()
        .filter(|c| c.is_type_cell())
        .find(|c| {
            let covers = c.source_types();
            c.target_entity()
                .map(|t| t.type_name == target.type_name)
                .unwrap_or(false)
                && needed.iter().all(|n| covers.contains(n))
        })
        .ok_or_else(|| Error::MissingTypeCell {
            cell: cell.id.clone(),
        })
}
