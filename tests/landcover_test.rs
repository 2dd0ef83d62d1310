//! End-to-end compilation of the LandCover alignment cells

mod common;

use common::*;
use pretty_assertions::assert_eq;
use schemalign::{
    compile, Alignment, AttributeMapping, Cell, CompileOutput, CompilerConfig, EntityRef,
    FailureKind, FeatureTypeMapping, FunctionHandler, LiteralValue, LookupTable, MappingContext,
    PathStep,
};

fn run(cells: Vec<Cell>) -> CompileOutput {
    run_with(cells, &CompilerConfig::default())
}

fn run_with(cells: Vec<Cell>, config: &CompilerConfig) -> CompileOutput {
    let source = source_index();
    let target = target_index();
    compile(&Alignment::new(cells), &source, &target, config)
}

fn type_mapping<'a>(output: &'a CompileOutput, element: &str) -> &'a FeatureTypeMapping {
    output
        .document
        .type_mapping(element)
        .unwrap_or_else(|| panic!("no type mapping for {}", element))
}

fn attribute<'a>(output: &'a CompileOutput, element: &str, target: &str) -> &'a AttributeMapping {
    type_mapping(output, element)
        .attribute(target)
        .unwrap_or_else(|| panic!("no attribute {} on {}", target, element))
}

fn assert_success(output: &CompileOutput) {
    assert!(
        output.report.success,
        "compilation failed:\n{}",
        output.report.to_report()
    );
}

// ---------------------------------------------------------------
// Type cells
// ---------------------------------------------------------------

#[test]
fn test_retype() {
    let output = run(vec![unit_retype()]);
    assert_success(&output);
    assert_eq!(output.document.type_mappings.len(), 1);
    let mapping = &output.document.type_mappings[0];
    assert_eq!(mapping.source_type, "landcover_norm");
    assert_eq!(mapping.target_element, "lcv:LandCoverUnit");
    assert!(mapping.attribute_mappings.is_empty());
}

#[test]
fn test_nested_join_links_container_and_nested_type() {
    let source = source_index();
    let target = target_index();
    let config = CompilerConfig::default();
    let rename = Cell::new("local-id", "rename")
        .with_source(column_of(unit_type(), "uuid_v1"))
        .with_target(target_path(lcd_type(), nested_local_id_path()));
    let alignment = Alignment::new(vec![join_cell(), rename]);
    let mut ctx = MappingContext::new(&source, &target, &config).with_alignment(&alignment);

    FunctionHandler::Join
        .handle_type_transformation(&alignment.cells[0], &mut ctx)
        .unwrap();
    let document = ctx.document();
    assert_eq!(document.type_mappings.len(), 2);

    let lcd = document.type_mapping("lcv:LandCoverDataset").unwrap();
    let lcu = document.type_mapping("lcv:LandCoverUnit").unwrap();
    assert_eq!(lcd.source_type, "dataset_norm");
    assert_eq!(lcu.source_type, "landcover_norm");
    assert_eq!(lcd.attribute_mappings.len(), 1);
    assert_eq!(lcu.attribute_mappings.len(), 1);

    let container = &lcd.attribute_mappings[0];
    assert_eq!(container.target_attribute, "lcv:member");
    assert_eq!(container.link_element.as_deref(), Some("lcv:LandCoverUnit"));
    assert_eq!(container.link_field.as_deref(), Some("FEATURE_LINK[1]"));
    assert_eq!(container.source_expression.as_deref(), Some("dataset_id"));
    assert!(container.is_multiple);
    assert!(container.client_properties.is_empty());

    let nested = &lcu.attribute_mappings[0];
    assert_eq!(nested.target_attribute, "FEATURE_LINK[1]");
    assert_eq!(nested.source_expression.as_deref(), Some("dataset_id"));
    assert_eq!(nested.link_element, None);
    assert_eq!(nested.link_field, None);
}

#[test]
fn test_xref_join_takes_href_from_referencing_cell() {
    let source = source_index();
    let target = target_index();
    let config = CompilerConfig::default();
    let href = Cell::new("member-href", "rename")
        .with_source(column_of(unit_type(), "unit_id"))
        .with_target(target_path(lcd_type(), vec![lcv("member"), xlink("href")]));
    let alignment = Alignment::new(vec![join_cell(), href]);
    let mut ctx = MappingContext::new(&source, &target, &config).with_alignment(&alignment);

    FunctionHandler::Join
        .handle_type_transformation(&alignment.cells[0], &mut ctx)
        .unwrap();
    FunctionHandler::Rename
        .handle_property_transformation(&alignment.cells[0], &alignment.cells[1], &mut ctx)
        .unwrap();

    let document = ctx.document();
    assert_eq!(document.type_mappings.len(), 2);
    let lcd = document.type_mapping("lcv:LandCoverDataset").unwrap();
    let lcu = document.type_mapping("lcv:LandCoverUnit").unwrap();
    assert_eq!(lcd.attribute_mappings.len(), 1);
    assert_eq!(lcu.attribute_mappings.len(), 1);

    let container = &lcd.attribute_mappings[0];
    assert_eq!(container.target_attribute, "lcv:member");
    assert_eq!(container.link_element.as_deref(), Some("lcv:LandCoverUnit"));
    assert_eq!(container.link_field.as_deref(), Some("FEATURE_LINK[1]"));
    assert_eq!(container.source_expression.as_deref(), Some("dataset_id"));
    assert!(container.is_multiple);
    assert_eq!(container.client_properties.len(), 1);
    assert_eq!(container.client_properties[0].name, "xlink:href");
    assert_eq!(container.client_properties[0].value, "unit_id");

    let nested = &lcu.attribute_mappings[0];
    assert_eq!(nested.target_attribute, "FEATURE_LINK[1]");
    assert_eq!(nested.source_expression.as_deref(), Some("dataset_id"));
}

#[test]
fn test_full_compile_of_nested_join() {
    let rename = Cell::new("local-id", "rename")
        .with_source(column_of(unit_type(), "uuid_v1"))
        .with_target(target_path(lcd_type(), nested_local_id_path()));
    let output = run(vec![rename, join_cell()]);
    assert_success(&output);

    assert_eq!(output.report.compiled_cells, vec!["join", "local-id"]);
    let local_id = attribute(&output, "lcv:LandCoverUnit", TARGET_LOCAL_ID);
    assert_eq!(local_id.source_expression.as_deref(), Some("uuid_v1"));
    let lcu = type_mapping(&output, "lcv:LandCoverUnit");
    assert_eq!(lcu.attribute_mappings.len(), 2);
}

// ---------------------------------------------------------------
// Property cells
// ---------------------------------------------------------------

#[test]
fn test_rename() {
    let cell = Cell::new("local-id", "rename")
        .with_source(column_of(unit_type(), "uuid_v1"))
        .with_target(target_path(lcu_type(), local_id_path()));
    let output = run(vec![unit_retype(), cell]);
    assert_success(&output);

    let mapping = attribute(&output, "lcv:LandCoverUnit", TARGET_LOCAL_ID);
    assert_eq!(mapping.source_expression.as_deref(), Some("uuid_v1"));
    assert!(!mapping.is_multiple);
}

#[test]
fn test_date_extraction_on_indexed_step() {
    let cell = Cell::new("observation-date", "date_extraction")
        .with_source(column_of(unit_type(), "uuid_v1"))
        .with_target(EntityRef::property(
            lcu_type(),
            vec![
                PathStep::indexed(lcv("landCoverObservation"), 0),
                PathStep::new(lcv("LandCoverObservation")),
                PathStep::new(lcv("observationDate")),
            ],
        ))
        .with_parameter("dateFormat", "yyyy-MM-dd hh:mm:ss");
    let output = run(vec![unit_retype(), cell]);
    assert_success(&output);

    let mapping = attribute(&output, "lcv:LandCoverUnit", TARGET_FIRST_OBSERVATION_DATE);
    assert_eq!(
        mapping.source_expression.as_deref(),
        Some("dateParse(uuid_v1, 'yyyy-MM-dd hh:mm:ss')")
    );
    assert!(!mapping.is_multiple);
}

#[test]
fn test_formatted_string() {
    let cell = Cell::new("description", "formatted_string")
        .with_source(column_of(unit_type(), "ucs2007").with_role("var"))
        .with_source(column_of(unit_type(), "ucs2013").with_role("var"))
        .with_target(target_path(lcu_type(), vec![gml("description")]))
        .with_parameter("pattern", "Class 2007: {ucs2007}; Class 2013: {ucs2013}");
    let output = run(vec![unit_retype(), cell]);
    assert_success(&output);

    let mapping = attribute(&output, "lcv:LandCoverUnit", TARGET_DESCRIPTION);
    assert_eq!(
        mapping.source_expression.as_deref(),
        Some("strConcat(strConcat(strConcat('Class 2007: ', ucs2007), '; Class 2013: '), ucs2013)")
    );
}

#[test]
fn test_formatted_string_with_unbound_variable_fails() {
    let cell = Cell::new("description", "formatted_string")
        .with_source(column_of(unit_type(), "ucs2007").with_role("var"))
        .with_target(target_path(lcu_type(), vec![gml("description")]))
        .with_parameter("pattern", "{ucs2007} / {ucs2020}");
    let output = run(vec![unit_retype(), cell]);

    let failure = output.report.failure("description").unwrap();
    assert_eq!(failure.kind, FailureKind::Configuration);
    assert!(type_mapping(&output, "lcv:LandCoverUnit")
        .attribute(TARGET_DESCRIPTION)
        .is_none());
}

#[test]
fn test_math_expression_is_verbatim() {
    let cell = Cell::new("local-id", "math_expression")
        .with_source(column_of(unit_type(), "unit_id").with_role("var"))
        .with_target(target_path(lcu_type(), local_id_path()))
        .with_parameter("expression", "100 * unit_id / 2");
    let output = run(vec![unit_retype(), cell]);
    assert_success(&output);

    let mapping = attribute(&output, "lcv:LandCoverUnit", TARGET_LOCAL_ID);
    assert_eq!(mapping.source_expression.as_deref(), Some("100 * unit_id / 2"));
}

#[test]
fn test_assign_and_bound_assign() {
    let plain = Cell::new("local-id", "assign")
        .with_target(target_path(lcu_type(), local_id_path()))
        .with_parameter("value", "LCU_1234");
    let output = run(vec![unit_retype(), plain]);
    assert_success(&output);
    assert_eq!(
        attribute(&output, "lcv:LandCoverUnit", TARGET_LOCAL_ID)
            .source_expression
            .as_deref(),
        Some("'LCU_1234'")
    );

    let bound = Cell::new("local-id", "assign_bound")
        .with_source(column_of(unit_type(), "uuid_v1").with_role("anchor"))
        .with_target(target_path(lcu_type(), local_id_path()))
        .with_parameter("value", "LCU_1234");
    let output = run(vec![unit_retype(), bound]);
    assert_success(&output);
    assert_eq!(
        attribute(&output, "lcv:LandCoverUnit", TARGET_LOCAL_ID)
            .source_expression
            .as_deref(),
        Some("if_then_else(isNull(uuid_v1), Expression.NIL, 'LCU_1234')")
    );
}

fn classification_cell(action: Option<&str>) -> Cell {
    let table: LookupTable = [
        ("1000", "http://www.example.com/first"),
        ("2000", "http://www.example.com/second"),
        ("3000", "http://www.example.com/third"),
    ]
    .into_iter()
    .collect();
    classification_cell_with(table, action)
}

fn classification_cell_with(table: LookupTable, action: Option<&str>) -> Cell {
    let mut cell = Cell::new("metadata", "classification")
        .with_source(column_of(unit_type(), "unit_id"))
        .with_target(target_path(
            lcu_type(),
            vec![gml("metaDataProperty"), xlink("href")],
        ))
        .with_parameter("lookupTable", table);
    if let Some(action) = action {
        cell = cell.with_parameter("notClassifiedAction", action);
    }
    cell
}

#[rstest::rstest]
#[case(Some("source"), "unit_id")]
#[case(Some("null"), "Expression.NIL")]
#[case(None, "Expression.NIL")]
#[case(Some("fixed:http://www.example.com/unknown"), "'http://www.example.com/unknown'")]
fn test_classification(#[case] action: Option<&str>, #[case] fallback: &str) {
    let output = run(vec![unit_retype(), classification_cell(action)]);
    assert_success(&output);

    let mapping = attribute(&output, "lcv:LandCoverUnit", TARGET_METADATA);
    assert_eq!(mapping.source_expression, None);
    assert_eq!(mapping.client_properties.len(), 1);
    assert_eq!(mapping.client_properties[0].name, "xlink:href");
    assert_eq!(
        mapping.client_properties[0].value,
        format!(
            "if_then_else(in(unit_id,1000,2000,3000), Recode(unit_id,1000,'http://www.example.com/first',2000,'http://www.example.com/second',3000,'http://www.example.com/third'), {})",
            fallback
        )
    );
}

#[test]
fn test_classification_quotes_non_numeric_keys() {
    let table: LookupTable = [("inf", "a"), ("NaN", "b"), ("forest", "c"), ("1000", "d")]
        .into_iter()
        .collect();
    let output = run(vec![unit_retype(), classification_cell_with(table, None)]);
    assert_success(&output);

    let mapping = attribute(&output, "lcv:LandCoverUnit", TARGET_METADATA);
    assert_eq!(
        mapping.client_properties[0].value,
        "if_then_else(in(unit_id,'inf','NaN','forest',1000), Recode(unit_id,'inf','a','NaN','b','forest','c',1000,'d'), Expression.NIL)"
    );
}

#[test]
fn test_classification_rejects_non_finite_key() {
    let mut table = LookupTable::new();
    table.insert(LiteralValue::Double(f64::INFINITY), "a");
    let output = run(vec![unit_retype(), classification_cell_with(table, None)]);
    assert_eq!(
        output.report.failure("metadata").unwrap().kind,
        FailureKind::Configuration
    );
}

#[test]
fn test_classification_rejects_unknown_action() {
    let output = run(vec![unit_retype(), classification_cell(Some("drop"))]);
    assert_eq!(
        output.report.failure("metadata").unwrap().kind,
        FailureKind::Configuration
    );
}

// ---------------------------------------------------------------
// Geometry and identifiers
// ---------------------------------------------------------------

#[test]
fn test_geometry_through_choice_renders_head_and_node() {
    let dataset_geometry = Cell::new("geometry", "rename")
        .with_source(column_of(dataset_type(), "geom"))
        .with_target(target_path(lcd_type(), lcd_geometry_path()));
    let output = run(vec![dataset_retype(), dataset_geometry]);
    assert_success(&output);

    let mapping = attribute(&output, "lcv:LandCoverDataset", TARGET_GEOMETRY_LCD);
    assert_eq!(mapping.source_expression.as_deref(), Some("geom"));
    assert_eq!(
        mapping.target_attribute_node.as_deref(),
        Some("gml:MultiSurfaceType")
    );
    assert_eq!(output.report.warnings.len(), 1);
}

#[test]
fn test_geometry_carries_configured_crs() {
    let config = CompilerConfig {
        target_crs: Some("EPSG:3035".into()),
        ..CompilerConfig::default()
    };
    let dataset_geometry = Cell::new("geometry", "rename")
        .with_source(column_of(dataset_type(), "geom"))
        .with_target(target_path(lcd_type(), lcd_geometry_path()));
    let output = run_with(vec![dataset_retype(), dataset_geometry], &config);
    assert_success(&output);

    let mapping = attribute(&output, "lcv:LandCoverDataset", TARGET_GEOMETRY_LCD);
    assert_eq!(mapping.client_property("srsName"), Some("'EPSG:3035'"));
    assert!(output.report.warnings.is_empty());
}

fn unit_geometry_cells() -> (Cell, Cell) {
    let geometry = Cell::new("geometry", "rename")
        .with_source(column_of(unit_type(), "geom"))
        .with_target(target_path(lcu_type(), vec![lcv("geometry")]));
    let geometry_id = Cell::new("geometry-id", "formatted_string")
        .with_source(column_of(unit_type(), "dataset_id").with_role("var"))
        .with_source(column_of(unit_type(), "unit_id").with_role("var"))
        .with_target(target_path(lcu_type(), lcu_geometry_id_path()))
        .with_parameter("pattern", "geom.{dataset_id}.{unit_id}");
    (geometry, geometry_id)
}

#[rstest::rstest]
#[case(false)]
#[case(true)]
fn test_gml_geometry_property_id_in_any_order(#[case] id_first: bool) {
    let (geometry, geometry_id) = unit_geometry_cells();
    let cells = if id_first {
        vec![unit_retype(), geometry_id, geometry]
    } else {
        vec![unit_retype(), geometry, geometry_id]
    };
    let output = run(cells);
    assert_success(&output);

    let lcu = type_mapping(&output, "lcv:LandCoverUnit");
    assert_eq!(lcu.attribute_mappings.len(), 1);
    let mapping = &lcu.attribute_mappings[0];
    assert_eq!(mapping.target_attribute, TARGET_GEOMETRY_LCU);
    assert_eq!(mapping.source_expression.as_deref(), Some("geom"));
    assert_eq!(mapping.target_attribute_node, None);
    assert_eq!(
        mapping.id_expression.as_deref(),
        Some("strConcat(strConcat(strConcat('geom.', dataset_id), '.'), unit_id)")
    );
}

#[rstest::rstest]
#[case(false)]
#[case(true)]
fn test_generic_geometry_property_id_in_any_order(#[case] id_first: bool) {
    let geometry = Cell::new("geometry", "rename")
        .with_source(column_of(dataset_type(), "geom"))
        .with_target(target_path(lcd_type(), lcd_geometry_path()));
    let mut id_path = lcd_geometry_path();
    id_path.push(gml("id"));
    let geometry_id = Cell::new("geometry-id", "formatted_string")
        .with_source(column_of(dataset_type(), "dataset_id").with_role("var"))
        .with_target(target_path(lcd_type(), id_path))
        .with_parameter("pattern", "geom.{dataset_id}");
    let cells = if id_first {
        vec![dataset_retype(), geometry_id, geometry]
    } else {
        vec![dataset_retype(), geometry, geometry_id]
    };
    let output = run(cells);
    assert_success(&output);

    let lcd = type_mapping(&output, "lcv:LandCoverDataset");
    assert_eq!(lcd.attribute_mappings.len(), 1);
    let mapping = &lcd.attribute_mappings[0];
    assert_eq!(mapping.target_attribute, TARGET_GEOMETRY_LCD);
    assert_eq!(mapping.source_expression.as_deref(), Some("geom"));
    assert_eq!(
        mapping.target_attribute_node.as_deref(),
        Some("gml:MultiSurfaceType")
    );
    assert_eq!(
        mapping.id_expression.as_deref(),
        Some("strConcat('geom.', dataset_id)")
    );
}

#[test]
fn test_feature_gml_id() {
    let cell = Cell::new("feature-id", "rename")
        .with_source(column_of(unit_type(), "unit_id"))
        .with_target(target_path(lcu_type(), vec![gml("id")]));
    let output = run(vec![unit_retype(), cell]);
    assert_success(&output);

    let mapping = attribute(&output, "lcv:LandCoverUnit", "lcv:LandCoverUnit");
    assert_eq!(mapping.source_expression, None);
    assert_eq!(mapping.id_expression.as_deref(), Some("unit_id"));
}

#[test]
fn test_unqualified_xml_attribute() {
    let cell = Cell::new("code-space", "assign")
        .with_target(target_path(
            lcd_type(),
            vec![gml("name"), schemalign::QName::unqualified("codeSpace")],
        ))
        .with_parameter("value", "http://www.example.com/codespace");
    let output = run(vec![dataset_retype(), cell]);
    assert_success(&output);

    let mapping = attribute(&output, "lcv:LandCoverDataset", "gml:name");
    assert_eq!(mapping.source_expression, None);
    assert_eq!(mapping.client_properties.len(), 1);
    assert_eq!(mapping.client_properties[0].name, "codeSpace");
    assert_eq!(
        mapping.client_properties[0].value,
        "'http://www.example.com/codespace'"
    );
}

#[test]
fn test_qualified_xml_attribute_on_non_geometry_substitution() {
    let cell = Cell::new("time-instant-id", "assign")
        .with_target(target_path(lcd_type(), time_instant_id_path()))
        .with_parameter("value", "ti.ds.landcover");
    let output = run(vec![dataset_retype(), cell]);
    assert_success(&output);

    let mapping = attribute(
        &output,
        "lcv:LandCoverDataset",
        "lcv:extent/gmd:EX_Extent/gmd:temporalElement/gmd:EX_TemporalExtent/gmd:extent/gml:TimeInstant",
    );
    assert_eq!(mapping.source_expression, None);
    assert_eq!(mapping.id_expression, None);
    assert_eq!(mapping.client_properties.len(), 1);
    assert_eq!(mapping.client_properties[0].name, "gml:id");
    assert_eq!(mapping.client_properties[0].value, "'ti.ds.landcover'");
}

// ---------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------

#[test]
fn test_source_condition_guards_expression() {
    let cell = Cell::new("local-id", "rename")
        .with_source(
            column_of(unit_type(), "uuid_v1")
                .with_condition(schemalign::ConditionNode::property_equals("ucs2007", "A1")),
        )
        .with_target(target_path(lcu_type(), local_id_path()));
    let output = run(vec![unit_retype(), cell]);
    assert_success(&output);

    let mapping = attribute(&output, "lcv:LandCoverUnit", TARGET_LOCAL_ID);
    let expression = mapping.source_expression.as_deref().unwrap();
    assert!(expression.starts_with("if_then_else("), "{}", expression);
    assert!(expression.contains("uuid_v1"));
    assert!(expression.ends_with(", uuid_v1, Expression.NIL)"), "{}", expression);
}

// ---------------------------------------------------------------
// Failures
// ---------------------------------------------------------------

#[test]
fn test_property_cell_without_covering_type_cell() {
    // The dataset retype does not read landcover_norm
    let cell = Cell::new("description", "rename")
        .with_source(column_of(unit_type(), "ucs2007"))
        .with_target(target_path(lcd_type(), vec![gml("description")]));
    let output = run(vec![dataset_retype(), cell]);

    assert_eq!(
        output.report.failure("description").unwrap().kind,
        FailureKind::Ordering
    );
    assert_eq!(output.report.compiled_cells, vec!["retype-dataset"]);
}

#[test]
fn test_crossing_without_join_is_unlinked() {
    let retype_units_as_dataset = retype("retype", unit_type(), lcd_type());
    let cell = Cell::new("local-id", "rename")
        .with_source(column_of(unit_type(), "uuid_v1"))
        .with_target(target_path(lcd_type(), nested_local_id_path()));
    let output = run(vec![retype_units_as_dataset, cell]);

    assert_eq!(
        output.report.failure("local-id").unwrap().kind,
        FailureKind::UnlinkedFeatureType
    );
}

#[test]
fn test_unresolved_target_step() {
    let cell = Cell::new("local-id", "rename")
        .with_source(column_of(unit_type(), "uuid_v1"))
        .with_target(target_path(
            lcu_type(),
            vec![lcv("inspireId"), base("Identifier"), base("versionId")],
        ));
    let output = run(vec![unit_retype(), cell]);

    let failure = output.report.failure("local-id").unwrap();
    assert_eq!(failure.kind, FailureKind::UnresolvedPath);
    assert!(failure.message.contains("versionId"), "{}", failure.message);
}

#[test]
fn test_unresolved_join_key_fails_join_and_dependents() {
    let mut join = join_cell();
    join.parameters = Default::default();
    let join = join.with_parameter(
        "join",
        schemalign::JoinParameter {
            types: vec![dataset_type(), unit_type()],
            conditions: vec![schemalign::JoinCondition {
                base: column_of(dataset_type(), "dataset_id"),
                join: column_of(unit_type(), "dataset_fk"),
            }],
        },
    );
    let rename = Cell::new("local-id", "rename")
        .with_source(column_of(unit_type(), "uuid_v1"))
        .with_target(target_path(lcd_type(), nested_local_id_path()));
    let output = run(vec![join, rename]);

    assert_eq!(
        output.report.failure("join").unwrap().kind,
        FailureKind::UnresolvedJoinKey
    );
    assert_eq!(
        output.report.failure("local-id").unwrap().kind,
        FailureKind::DependencyFailed
    );
    assert!(output.document.type_mappings.is_empty());
}
