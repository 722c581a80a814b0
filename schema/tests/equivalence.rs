use sg_schema::{cue, jsonschema, Config, File, TypeId};

const DASHBOARD_CUE: &str = r#"
package dashboard

#Dashboard: {
    // Shown in the header.
    title:   string
    version: int & >=1
    note?:   string | null
    tags?:   [...string]
    status?: #Status
    labels?: {[string]: string}
    coords?: [float64, float64]
}

#Status: "ok" | "warning" | "critical" @cuetsy(kind="enum")
"#;

const DASHBOARD_JSON: &str = r##"{
    "$ref": "#/definitions/Dashboard",
    "definitions": {
        "Dashboard": {
            "type": "object",
            "required": ["title", "version"],
            "properties": {
                "title": {"type": "string", "description": "Shown in the header."},
                "version": {"type": "integer", "minimum": 1},
                "note": {"type": ["string", "null"]},
                "tags": {"type": "array", "items": {"type": "string"}},
                "status": {"$ref": "#/definitions/Status"},
                "labels": {"type": "object", "additionalProperties": {"type": "string"}},
                "coords": {"type": "array", "items": [{"type": "number"}, {"type": "number"}]}
            }
        },
        "Status": {"type": "string", "enum": ["ok", "warning", "critical"]}
    }
}"##;

fn from_cue(source: &str) -> File {
    let instance = cue::load(source, Some("dashboard.cue")).unwrap();
    cue::generate_ast(&instance.root, &Config::new("dashboard")).unwrap()
}

fn from_json(source: &str) -> File {
    jsonschema::generate_ast(source.as_bytes(), &Config::new("dashboard")).unwrap()
}

#[test]
fn front_ends_agree_on_equivalent_schemas() {
    let cue = from_cue(DASHBOARD_CUE);
    let json = from_json(DASHBOARD_JSON);
    assert_eq!(cue, json);
    assert!(cue.validate().is_ok());
}

#[test]
fn entry_point_is_selected_by_both() {
    let cue = from_cue(DASHBOARD_CUE);
    assert_eq!(cue.entry_point().map(|d| d.name.as_str()), Some("Dashboard"));
    assert_eq!(cue.types.iter().filter(|d| d.is_entry_point).count(), 1);

    let json = from_json(DASHBOARD_JSON);
    assert_eq!(json.entry_point().map(|d| d.name.as_str()), Some("Dashboard"));
}

#[test]
fn field_order_follows_the_source() {
    let names: Vec<_> = from_json(DASHBOARD_JSON).types[0]
        .fields
        .iter()
        .map(|f| f.name.clone())
        .collect();
    assert_eq!(
        names,
        ["title", "version", "note", "tags", "status", "labels", "coords"]
    );
}

#[test]
fn empty_schema_has_no_types() {
    let cue = from_cue("package dashboard\n");
    assert!(cue.types.is_empty());
    assert_eq!(cue.package, "dashboard");

    let json = from_json("{}");
    assert!(json.types.is_empty());
}

#[test]
fn kind_envelope_translates_like_a_plain_schema() {
    let source = r#"
name: "Dashboard"
lineage: schemas: [{
    version: [0, 0]
    schema: {
        title: string
        status?: #Status
        #Status: "ok" | "warning" | "critical" @cuetsy(kind="enum")
    }
}]
"#;
    let instance = cue::load(source, None).unwrap();
    let (meta, file) = sg_schema::kindsys::generate_ast(&instance.root, &Config::new("dashboard")).unwrap();
    assert_eq!(meta.name, "Dashboard");

    let plain = from_cue(
        "#Dashboard: {\n  title: string\n  status?: #Status\n}\n#Status: \"ok\" | \"warning\" | \"critical\" @cuetsy(kind=\"enum\")",
    );
    assert_eq!(file, plain);
    assert_eq!(file.types[1].type_, TypeId::Enum);
}
