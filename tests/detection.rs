//! End-to-end detection over models built from literal sources.

use declump::analysis::FullAnalysis;
use declump::config::DeclumpConfig;
use declump::detect::ClumpKind;
use declump::edit::Span;
use declump::model::{
    span_of, ClassDecl, ClassId, FieldDecl, FunctionDecl, FunctionId, SourceModel,
};
use declump::property::{Classfield, Modifier, Parameter, Visibility};

fn class_decl(name: &str, file: &str, text: &str) -> ClassDecl {
    ClassDecl {
        id: ClassId(0),
        name: name.to_string(),
        qualified_name: name.to_string(),
        file: file.to_string(),
        span: Span::new(0, text.len()),
        is_interface: false,
        is_exported: false,
        is_abstract: false,
        fields: Vec::new(),
        constructor: None,
        methods: Vec::new(),
        accessors: Vec::new(),
        superclasses: Vec::new(),
        interfaces: Vec::new(),
        header_offset: 0,
        body_insert_offset: 0,
    }
}

fn field(text: &str, decl: &str, name: &str, ty: &str) -> FieldDecl {
    FieldDecl {
        field: Classfield::public(name, ty),
        span: span_of(text, decl).expect("field text present"),
        initializer: None,
        usages: Vec::new(),
    }
}

fn function_decl(name: &str, file: &str, params: &[(&str, &str)]) -> FunctionDecl {
    FunctionDecl {
        id: FunctionId(0),
        name: name.to_string(),
        qualified_name: name.to_string(),
        file: file.to_string(),
        span: Span::new(0, 0),
        param_list_span: Span::new(0, 0),
        params: params
            .iter()
            .map(|(n, t)| declump::model::ParamDecl {
                param: Parameter::new(n, t),
                text: format!("{}: {}", n, t),
                promoted: None,
                initializer: None,
                usages: Vec::new(),
            })
            .collect(),
        is_constructor: false,
        containing_class: None,
        body: None,
        call_sites: Vec::new(),
    }
}

fn point_like_classes() -> SourceModel {
    let a_text = "class A {\n    x: number;\n    y: number;\n    z: number;\n}\n";
    let b_text = "class B {\n    x: number;\n    y: number;\n    z: number;\n}\n";
    let mut model = SourceModel::new();
    model.add_file("a.ts", a_text);
    model.add_file("b.ts", b_text);

    let mut a = class_decl("A", "a.ts", a_text);
    a.fields = vec![
        field(a_text, "x: number;", "x", "number"),
        field(a_text, "y: number;", "y", "number"),
        field(a_text, "z: number;", "z", "number"),
    ];
    model.add_class(a);

    let mut b = class_decl("B", "b.ts", b_text);
    b.fields = vec![
        field(b_text, "x: number;", "x", "number"),
        field(b_text, "y: number;", "y", "number"),
        field(b_text, "z: number;", "z", "number"),
    ];
    model.add_class(b);
    model
}

#[test]
fn two_classes_with_three_shared_fields_clump() {
    let model = point_like_classes();
    let analysis = FullAnalysis::new(&model, DeclumpConfig::default()).expect("valid config");
    let clumps = analysis.detect_all();

    assert_eq!(clumps.len(), 1);
    let clump = &clumps[0];
    assert_eq!(clump.kind, ClumpKind::FieldsToFields);
    assert!(clump.auto_refactorable);
    let names: Vec<&str> = clump.properties.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["x", "y", "z"]);
}

#[test]
fn two_shared_fields_stay_below_the_default_threshold() {
    let mut model = point_like_classes();
    model.classes[1].fields.pop();
    let analysis = FullAnalysis::new(&model, DeclumpConfig::default()).expect("valid config");
    assert!(analysis.detect_all().is_empty());
}

#[test]
fn lowered_threshold_admits_smaller_clumps() {
    let mut model = point_like_classes();
    model.classes[1].fields.pop();
    let config = DeclumpConfig {
        min_properties: 2,
        ..DeclumpConfig::default()
    };
    let analysis = FullAnalysis::new(&model, config).expect("valid config");
    assert_eq!(analysis.detect_all().len(), 1);
}

#[test]
fn underscore_prefix_and_union_order_do_not_break_matching() {
    let mut model = point_like_classes();
    model.classes[0].fields[0].field = Classfield::public("_x", "number");
    model.classes[1].fields[1].field = Classfield::public("y", "number");
    model.classes[0].fields[1].field = Classfield::public("y", "number | string");
    model.classes[1].fields[1].field = Classfield::public("y", "string | number");
    let analysis = FullAnalysis::new(&model, DeclumpConfig::default()).expect("valid config");
    assert_eq!(analysis.detect_all().len(), 1);
}

#[test]
fn static_fields_do_not_participate() {
    let mut model = point_like_classes();
    model.classes[0].fields[2].field =
        Classfield::new("z", "number", Visibility::Public, vec![Modifier::Static]);
    let analysis = FullAnalysis::new(&model, DeclumpConfig::default()).expect("valid config");
    assert!(analysis.detect_all().is_empty());
}

#[test]
fn fields_redeclared_from_an_ancestor_are_suppressed() {
    let mut model = point_like_classes();
    model.classes[1].name = "Sub".to_string();
    model.classes[1].qualified_name = "Sub".to_string();
    model.classes[1].superclasses = vec!["A".to_string()];
    let analysis = FullAnalysis::new(&model, DeclumpConfig::default()).expect("valid config");
    assert!(analysis.detect_all().is_empty());
}

#[test]
fn interface_participation_blocks_auto_refactoring() {
    let mut model = point_like_classes();
    model.classes[1].is_interface = true;
    let analysis = FullAnalysis::new(&model, DeclumpConfig::default()).expect("valid config");
    let clumps = analysis.detect_all();
    assert_eq!(clumps.len(), 1);
    assert!(!clumps[0].auto_refactorable);
}

#[test]
fn free_functions_clump_on_shared_parameters() {
    let mut model = SourceModel::new();
    model.add_file("util.ts", "");
    let params = [("x", "number"), ("y", "number"), ("z", "number")];
    model.add_function(function_decl("move", "util.ts", &params));
    model.add_function(function_decl("scale", "util.ts", &params));

    let analysis = FullAnalysis::new(&model, DeclumpConfig::default()).expect("valid config");
    let clumps = analysis.detect_all();
    assert_eq!(clumps.len(), 1);
    assert_eq!(clumps[0].kind, ClumpKind::ParametersToParameters);
    assert!(clumps[0].auto_refactorable);
}

#[test]
fn function_parameters_clump_against_class_fields() {
    let mut model = point_like_classes();
    model.classes.pop();
    model.add_function(function_decl(
        "translate",
        "a.ts",
        &[("x", "number"), ("y", "number"), ("z", "number")],
    ));

    let analysis = FullAnalysis::new(&model, DeclumpConfig::default()).expect("valid config");
    let clumps = analysis.detect_all();
    assert_eq!(clumps.len(), 1);
    assert_eq!(clumps[0].kind, ClumpKind::ParametersToFields);
}

#[test]
fn overriding_method_pairs_are_suppressed() {
    let mut model = SourceModel::new();
    model.add_file("a.ts", "");
    let base_text = "class Base {}";
    let sub_text = "class Sub extends Base {}";
    let base_id = model.add_class(class_decl("Base", "a.ts", base_text));
    let mut sub = class_decl("Sub", "a.ts", sub_text);
    sub.superclasses = vec!["Base".to_string()];
    let sub_id = model.add_class(sub);

    let params = [("x", "number"), ("y", "number"), ("z", "number")];
    let mut base_m = function_decl("resize", "a.ts", &params);
    base_m.qualified_name = "Base.resize".to_string();
    base_m.containing_class = Some(base_id);
    model.add_function(base_m);
    let mut sub_m = function_decl("resize", "a.ts", &params);
    sub_m.qualified_name = "Sub.resize".to_string();
    sub_m.containing_class = Some(sub_id);
    model.add_function(sub_m);

    let analysis = FullAnalysis::new(&model, DeclumpConfig::default()).expect("valid config");
    assert!(analysis.detect_all().is_empty());
}

#[test]
fn clumps_involving_an_overridden_method_are_not_auto_refactorable() {
    let mut model = SourceModel::new();
    model.add_file("a.ts", "");
    let base_id = model.add_class(class_decl("Base", "a.ts", "class Base {}"));
    let mut sub = class_decl("Sub", "a.ts", "class Sub extends Base {}");
    sub.superclasses = vec!["Base".to_string()];
    let sub_id = model.add_class(sub);
    let other_id = model.add_class(class_decl("C", "a.ts", "class C {}"));

    let params = [("x", "number"), ("y", "number"), ("z", "number")];
    let mut base_m = function_decl("resize", "a.ts", &params);
    base_m.qualified_name = "Base.resize".to_string();
    base_m.containing_class = Some(base_id);
    model.add_function(base_m);
    let mut sub_m = function_decl("resize", "a.ts", &params);
    sub_m.qualified_name = "Sub.resize".to_string();
    sub_m.containing_class = Some(sub_id);
    model.add_function(sub_m);
    let mut other_m = function_decl("reshape", "a.ts", &params);
    other_m.qualified_name = "C.reshape".to_string();
    other_m.containing_class = Some(other_id);
    model.add_function(other_m);

    let analysis = FullAnalysis::new(&model, DeclumpConfig::default()).expect("valid config");
    let clumps = analysis.detect_all();
    assert_eq!(
        clumps.len(),
        2,
        "Base.resize and Sub.resize each clump with C.reshape"
    );
    assert!(clumps.iter().all(|c| !c.auto_refactorable));
}

#[test]
fn same_method_name_in_unrelated_classes_still_clumps() {
    let mut model = SourceModel::new();
    model.add_file("a.ts", "");
    let a_id = model.add_class(class_decl("A", "a.ts", "class A {}"));
    let b_id = model.add_class(class_decl("B", "a.ts", "class B {}"));

    let params = [("x", "number"), ("y", "number"), ("z", "number")];
    let mut a_m = function_decl("resize", "a.ts", &params);
    a_m.qualified_name = "A.resize".to_string();
    a_m.containing_class = Some(a_id);
    model.add_function(a_m);
    let mut b_m = function_decl("resize", "a.ts", &params);
    b_m.qualified_name = "B.resize".to_string();
    b_m.containing_class = Some(b_id);
    model.add_function(b_m);

    let analysis = FullAnalysis::new(&model, DeclumpConfig::default()).expect("valid config");
    assert_eq!(analysis.detect_all().len(), 1);
}

#[test]
fn report_envelope_carries_findings_and_counts() {
    let model = point_like_classes();
    let analysis = FullAnalysis::new(&model, DeclumpConfig::default()).expect("valid config");
    let report = analysis.report(Some("geometry".to_string()));

    assert_eq!(report.report_summary.amount_data_clumps, 1);
    assert_eq!(report.report_summary.fields_to_fields, 1);
    assert_eq!(report.report_summary.amount_files_with_data_clumps, 2);
    assert_eq!(report.project_info.number_of_classes, 2);

    let entry = report
        .data_clumps
        .get("A-B-fields_to_fields_data_clump")
        .expect("clump entry present");
    assert_eq!(entry.from_file_path, "a.ts");
    assert_eq!(entry.to_file_path, "b.ts");
    assert_eq!(entry.data_clump_data.len(), 3);
    let x = entry.data_clump_data.get("x").expect("x present");
    assert_eq!(x.position.start_line, 2);

    let json = report.to_json_pretty().expect("serializes");
    assert!(json.contains("\"data_clump_type\": \"fields_to_fields_data_clump\""));
}

#[test]
fn model_round_trips_through_disk() {
    let model = point_like_classes();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("model.json");
    let json = serde_json::to_string_pretty(&model).expect("serializes");
    std::fs::write(&path, json).expect("write");

    let text = std::fs::read_to_string(&path).expect("read");
    let loaded = SourceModel::from_json(&text).expect("parses");
    assert_eq!(loaded.classes.len(), 2);

    let analysis = FullAnalysis::new(&loaded, DeclumpConfig::default()).expect("valid config");
    assert_eq!(analysis.detect_all().len(), 1);
}

#[test]
fn invalidated_declarations_are_skipped() {
    let mut model = point_like_classes();
    let b_id = model.classes[1].id;
    model.invalidate(declump::model::DeclRef::Class(b_id));
    let analysis = FullAnalysis::new(&model, DeclumpConfig::default()).expect("valid config");
    assert!(analysis.detect_all().is_empty());
}
