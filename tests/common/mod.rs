//! Shared LandCover fixture
//!
//! A relational source (`dataset_norm`, `landcover_norm`) and a trimmed
//! INSPIRE LandCoverVector target with the GML, GMD and base pieces the
//! tests walk through.

#![allow(dead_code)]

use schemalign::schema::{
    ChildDefinition, GroupDefinition, PropertyDefinition, QName, Schema, SchemaIndex,
    TypeDefinition,
};
use schemalign::{Cell, EntityRef, JoinCondition, JoinParameter, PathStep};

pub const SOURCE_NS: &str = "jdbc:postgresql:lamma:public";
pub const LCV_NS: &str = "http://inspire.ec.europa.eu/schemas/lcv/3.0";
pub const BASE_NS: &str = "http://inspire.ec.europa.eu/schemas/base/3.3";
pub const GML_NS: &str = "http://www.opengis.net/gml/3.2";
pub const GMD_NS: &str = "http://www.isotc211.org/2005/gmd";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

pub const TARGET_LOCAL_ID: &str = "lcv:inspireId/base:Identifier/base:localId";
pub const TARGET_FIRST_OBSERVATION_DATE: &str =
    "lcv:landCoverObservation[1]/lcv:LandCoverObservation/lcv:observationDate";
pub const TARGET_DESCRIPTION: &str = "gml:description";
pub const TARGET_GEOMETRY_LCD: &str = "lcv:extent/gmd:EX_Extent/gmd:geographicElement/gmd:EX_BoundingPolygon/gmd:polygon/gml:AbstractGeometry";
pub const TARGET_GEOMETRY_LCU: &str = "lcv:geometry";
pub const TARGET_METADATA: &str = "gml:metaDataProperty";

pub fn lcv(local: &str) -> QName {
    QName::new(LCV_NS, local)
}

pub fn base(local: &str) -> QName {
    QName::new(BASE_NS, local)
}

pub fn gml(local: &str) -> QName {
    QName::new(GML_NS, local)
}

pub fn gmd(local: &str) -> QName {
    QName::new(GMD_NS, local)
}

pub fn xlink(local: &str) -> QName {
    QName::new(XLINK_NS, local)
}

pub fn src(local: &str) -> QName {
    QName::new(SOURCE_NS, local)
}

/// Choice group named after its substitution head
fn choice_name(head: &QName) -> QName {
    QName::new(&format!("{}/{}", head.namespace(), head.local_name()), "choice")
}

pub fn dataset_type() -> QName {
    src("dataset_norm")
}

pub fn unit_type() -> QName {
    src("landcover_norm")
}

pub fn lcd_type() -> QName {
    lcv("LandCoverDatasetType")
}

pub fn lcu_type() -> QName {
    lcv("LandCoverUnitType")
}

// ---------------------------------------------------------------
// Schema builders
// ---------------------------------------------------------------

fn element(name: QName, type_name: Option<QName>) -> ChildDefinition {
    ChildDefinition::Property(PropertyDefinition {
        name,
        type_name,
        repeatable: false,
        attribute: false,
    })
}

fn repeated(name: QName, type_name: Option<QName>) -> ChildDefinition {
    ChildDefinition::Property(PropertyDefinition {
        name,
        type_name,
        repeatable: true,
        attribute: false,
    })
}

fn attribute(name: QName) -> ChildDefinition {
    ChildDefinition::Property(PropertyDefinition {
        name,
        type_name: None,
        repeatable: false,
        attribute: true,
    })
}

fn choice(head: Option<QName>, group_name: QName, children: Vec<ChildDefinition>) -> ChildDefinition {
    ChildDefinition::Group(GroupDefinition {
        name: group_name,
        choice: true,
        repeatable: false,
        substitution_head: head,
        children,
    })
}

fn complex(name: QName, children: Vec<ChildDefinition>) -> TypeDefinition {
    let mut t = TypeDefinition::new(name);
    t.children = children;
    t
}

fn column(name: &str) -> ChildDefinition {
    element(QName::unqualified(name), None)
}

pub fn source_schema() -> Schema {
    let dataset = complex(
        dataset_type(),
        vec![column("dataset_id"), column("name"), column("geom")],
    );
    let unit = complex(
        unit_type(),
        vec![
            column("unit_id"),
            column("dataset_id"),
            column("uuid_v1"),
            column("ucs2007"),
            column("ucs2013"),
            column("geom"),
        ],
    );
    Schema {
        prefixes: Default::default(),
        types: vec![dataset, unit],
    }
}

pub fn source_index() -> SchemaIndex {
    SchemaIndex::new(source_schema())
}

pub fn target_schema() -> Schema {
    let abstract_geometry = gml("AbstractGeometry");
    let geometry_choice = || {
        choice(
            Some(abstract_geometry.clone()),
            choice_name(&abstract_geometry),
            vec![
                element(gml("MultiSurface"), Some(gml("MultiSurfaceType"))),
                element(gml("Polygon"), Some(gml("PolygonType"))),
            ],
        )
    };

    // Feature types
    let mut lcd = complex(
        lcd_type(),
        vec![
            attribute(gml("id")),
            element(gml("description"), None),
            repeated(gml("name"), Some(gml("CodeType"))),
            element(lcv("inspireId"), Some(base("IdentifierPropertyType"))),
            element(lcv("extent"), Some(gmd("EX_Extent_PropertyType"))),
            repeated(lcv("member"), Some(lcv("LandCoverUnitPropertyType"))),
        ],
    );
    lcd.element = Some(lcv("LandCoverDataset"));
    lcd.feature_type = true;

    let mut lcu = complex(
        lcu_type(),
        vec![
            attribute(gml("id")),
            element(gml("description"), None),
            element(gml("metaDataProperty"), Some(gml("MetaDataPropertyType"))),
            element(lcv("inspireId"), Some(base("IdentifierPropertyType"))),
            element(lcv("geometry"), Some(gml("GeometryPropertyType"))),
            repeated(
                lcv("landCoverObservation"),
                Some(lcv("LandCoverObservationPropertyType")),
            ),
        ],
    );
    lcu.element = Some(lcv("LandCoverUnit"));
    lcu.feature_type = true;

    // lcv
    let member = complex(
        lcv("LandCoverUnitPropertyType"),
        vec![
            element(lcv("LandCoverUnit"), Some(lcu_type())),
            attribute(xlink("href")),
        ],
    );
    let observation_property = complex(
        lcv("LandCoverObservationPropertyType"),
        vec![element(
            lcv("LandCoverObservation"),
            Some(lcv("LandCoverObservationType")),
        )],
    );
    let observation = complex(
        lcv("LandCoverObservationType"),
        vec![
            element(lcv("class"), None),
            element(lcv("observationDate"), None),
        ],
    );

    // base
    let identifier_property = complex(
        base("IdentifierPropertyType"),
        vec![element(base("Identifier"), Some(base("IdentifierType")))],
    );
    let identifier = complex(
        base("IdentifierType"),
        vec![
            element(base("localId"), None),
            element(base("namespace"), None),
        ],
    );

    // gmd
    let extent_property = complex(
        gmd("EX_Extent_PropertyType"),
        vec![element(gmd("EX_Extent"), Some(gmd("EX_Extent_Type")))],
    );
    let extent = complex(
        gmd("EX_Extent_Type"),
        vec![
            element(gmd("description"), None),
            repeated(
                gmd("geographicElement"),
                Some(gmd("EX_GeographicExtent_PropertyType")),
            ),
            repeated(
                gmd("temporalElement"),
                Some(gmd("EX_TemporalExtent_PropertyType")),
            ),
        ],
    );
    let geographic_property = complex(
        gmd("EX_GeographicExtent_PropertyType"),
        vec![choice(
            None,
            QName::new(&format!("{}/AbstractEX_GeographicExtent", GMD_NS), "choice"),
            vec![element(
                gmd("EX_BoundingPolygon"),
                Some(gmd("EX_BoundingPolygon_Type")),
            )],
        )],
    );
    let bounding_polygon = complex(
        gmd("EX_BoundingPolygon_Type"),
        vec![repeated(gmd("polygon"), Some(gmd("GM_Object_PropertyType")))],
    );
    let gm_object = complex(gmd("GM_Object_PropertyType"), vec![geometry_choice()]);
    let temporal_property = complex(
        gmd("EX_TemporalExtent_PropertyType"),
        vec![choice(
            None,
            QName::new(&format!("{}/EX_TemporalExtent", GMD_NS), "choice"),
            vec![element(
                gmd("EX_TemporalExtent"),
                Some(gmd("EX_TemporalExtent_Type")),
            )],
        )],
    );
    let temporal = complex(
        gmd("EX_TemporalExtent_Type"),
        vec![element(gmd("extent"), Some(gmd("TM_Primitive_PropertyType")))],
    );
    let time_head = gml("AbstractTimePrimitive");
    let tm_primitive = complex(
        gmd("TM_Primitive_PropertyType"),
        vec![choice(
            Some(time_head.clone()),
            choice_name(&time_head),
            vec![
                element(gml("TimeInstant"), Some(gml("TimeInstantType"))),
                element(gml("TimePeriod"), Some(gml("TimePeriodType"))),
            ],
        )],
    );

    // gml
    let code = complex(gml("CodeType"), vec![attribute(QName::unqualified("codeSpace"))]);
    let metadata = complex(
        gml("MetaDataPropertyType"),
        vec![attribute(xlink("href")), attribute(xlink("title"))],
    );
    let geometry_property = complex(gml("GeometryPropertyType"), vec![geometry_choice()]);
    let mut multi_surface = complex(
        gml("MultiSurfaceType"),
        vec![attribute(gml("id")), attribute(QName::unqualified("srsName"))],
    );
    multi_surface.geometry = true;
    let mut polygon = complex(gml("PolygonType"), vec![attribute(gml("id"))]);
    polygon.geometry = true;
    let time_instant = complex(
        gml("TimeInstantType"),
        vec![attribute(gml("id")), element(gml("timePosition"), None)],
    );
    let time_period = complex(
        gml("TimePeriodType"),
        vec![
            attribute(gml("id")),
            element(gml("beginPosition"), None),
            element(gml("endPosition"), None),
        ],
    );

    let mut schema = Schema::default();
    for (prefix, uri) in [
        ("lcv", LCV_NS),
        ("base", BASE_NS),
        ("gml", GML_NS),
        ("gmd", GMD_NS),
        ("xlink", XLINK_NS),
    ] {
        schema.prefixes.insert(prefix.into(), uri.into());
    }
    schema.types = vec![
        lcd,
        lcu,
        member,
        observation_property,
        observation,
        identifier_property,
        identifier,
        extent_property,
        extent,
        geographic_property,
        bounding_polygon,
        gm_object,
        temporal_property,
        temporal,
        tm_primitive,
        code,
        metadata,
        geometry_property,
        multi_surface,
        polygon,
        time_instant,
        time_period,
    ];
    schema
}

pub fn target_index() -> SchemaIndex {
    SchemaIndex::new(target_schema())
}

// ---------------------------------------------------------------
// Entity and cell helpers
// ---------------------------------------------------------------

/// Source column of `type_name`
pub fn column_of(type_name: QName, name: &str) -> EntityRef {
    EntityRef::property(type_name, vec![PathStep::new(QName::unqualified(name))])
}

/// Target property of `type_name` along plain steps
pub fn target_path(type_name: QName, steps: Vec<QName>) -> EntityRef {
    EntityRef::property(type_name, steps.into_iter().map(PathStep::new).collect())
}

pub fn retype(id: &str, source: QName, target: QName) -> Cell {
    Cell::new(id, "retype")
        .with_source(EntityRef::type_entity(source))
        .with_target(EntityRef::type_entity(target))
}

pub fn unit_retype() -> Cell {
    retype("retype-unit", unit_type(), lcu_type())
}

pub fn dataset_retype() -> Cell {
    retype("retype-dataset", dataset_type(), lcd_type())
}

/// dataset_norm.dataset_id = landcover_norm.dataset_id, targeting the dataset
pub fn join_cell() -> Cell {
    Cell::new("join", "join")
        .with_source(EntityRef::type_entity(dataset_type()).with_role("types"))
        .with_source(EntityRef::type_entity(unit_type()).with_role("types"))
        .with_target(EntityRef::type_entity(lcd_type()))
        .with_parameter(
            "join",
            JoinParameter {
                types: vec![dataset_type(), unit_type()],
                conditions: vec![JoinCondition {
                    base: column_of(dataset_type(), "dataset_id"),
                    join: column_of(unit_type(), "dataset_id"),
                }],
            },
        )
}

pub fn local_id_path() -> Vec<QName> {
    vec![lcv("inspireId"), base("Identifier"), base("localId")]
}

pub fn nested_local_id_path() -> Vec<QName> {
    let mut path = vec![lcv("member"), lcv("LandCoverUnit")];
    path.extend(local_id_path());
    path
}

pub fn lcd_geometry_path() -> Vec<QName> {
    vec![
        lcv("extent"),
        gmd("EX_Extent"),
        gmd("geographicElement"),
        QName::new(&format!("{}/AbstractEX_GeographicExtent", GMD_NS), "choice"),
        gmd("EX_BoundingPolygon"),
        gmd("polygon"),
        choice_name(&gml("AbstractGeometry")),
        gml("MultiSurface"),
    ]
}

pub fn lcu_geometry_id_path() -> Vec<QName> {
    vec![
        lcv("geometry"),
        choice_name(&gml("AbstractGeometry")),
        gml("MultiSurface"),
        gml("id"),
    ]
}

pub fn time_instant_id_path() -> Vec<QName> {
    vec![
        lcv("extent"),
        gmd("EX_Extent"),
        gmd("temporalElement"),
        QName::new(&format!("{}/EX_TemporalExtent", GMD_NS), "choice"),
        gmd("EX_TemporalExtent"),
        gmd("extent"),
        choice_name(&gml("AbstractTimePrimitive")),
        gml("TimeInstant"),
        gml("id"),
    ]
}
