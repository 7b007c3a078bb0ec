use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use dimlabel_core::document::{AlignedDimension, Document, Entity, EntityId};
use dimlabel_core::geometry::{Point3, Vector3};
use dimlabel_core::object_data::{
    FieldDefinition, FieldKind, FieldValue, ObjectDataRecord, ObjectDataTable,
};
use predicates::prelude::*;
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
    config: PathBuf,
    drawing: PathBuf,
    dimension: EntityId,
    feature: EntityId,
    bare_feature: EntityId,
}

impl Workspace {
    fn journal(&self) -> String {
        fs::read_to_string(self.dir.path().join("dimlabel.log")).unwrap_or_default()
    }
}

fn sample_document() -> (Document, EntityId, EntityId, EntityId) {
    let mut document = Document::new();
    document.add_dim_style("Standard", 2.0);
    let feature = document.add_polyline(
        [Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0)],
        false,
        "PIPE",
    );
    let bare_feature = document.add_polyline(
        [Point3::new(0.0, 8.0, 0.0), Point3::new(10.0, 8.0, 0.0)],
        false,
        "PIPE",
    );
    let dimension = document.add_aligned_dimension(AlignedDimension {
        x_line1: Point3::new(0.0, 0.0, 0.0),
        x_line2: Point3::new(10.0, 0.0, 0.0),
        dimension_line_point: Point3::new(5.0, 4.0, 0.0),
        text_position: Point3::new(5.0, 4.0, 0.0),
        normal: Vector3::Z,
        measurement: 12.3,
        text: String::new(),
        style: "Standard".to_string(),
        layer: "DIM".to_string(),
    });

    let data = document.object_data_mut();
    data.add_table(ObjectDataTable::new(
        "PIPES",
        vec![
            FieldDefinition::new("DISP_NUM", FieldKind::Character),
            FieldDefinition::new("COMPANY", FieldKind::Character),
            FieldDefinition::new("PURPCD", FieldKind::Character),
        ],
    ));
    data.attach(
        feature,
        ObjectDataRecord::new(
            "PIPES",
            vec![
                FieldValue::from("loc4821"),
                FieldValue::from("ACME"),
                FieldValue::from("PL"),
            ],
        ),
    );
    (document, dimension, feature, bare_feature)
}

fn workspace() -> Workspace {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let root = dir.path();
    fs::write(root.join("CompanyLookup.csv"), "ACME,ACME CORP\n").expect("写入公司表失败");
    fs::write(root.join("PurposeLookup.csv"), "PL,Pipeline\n").expect("写入用途表失败");

    let config = root.join("dimlabel.toml");
    let journal = root.join("dimlabel.log");
    fs::write(
        &config,
        format!(
            "[logging]\nlevel = \"warn\"\njournal_file = {journal:?}\n\n\
             [lookups]\ndirectory = {root:?}\n\n\
             [dimension]\nmeasurement = \"palette\"\n",
            journal = journal.display().to_string(),
            root = root.display().to_string(),
        ),
    )
    .expect("写入配置失败");

    let (document, dimension, feature, bare_feature) = sample_document();
    let drawing = root.join("drawing.json");
    fs::write(
        &drawing,
        serde_json::to_string_pretty(&document).expect("序列化快照失败"),
    )
    .expect("写入快照失败");

    Workspace {
        dir,
        config,
        drawing,
        dimension,
        feature,
        bare_feature,
    }
}

fn dimlabel(ws: &Workspace) -> Command {
    let mut cmd = Command::cargo_bin("dimlabel").expect("找不到 dimlabel 可执行文件");
    cmd.current_dir(ws.dir.path())
        .env_remove("DIMLABEL_CONFIG")
        .arg("--config")
        .arg(&ws.config);
    cmd
}

fn read_document(path: &Path) -> Document {
    let data = fs::read_to_string(path).expect("读取快照失败");
    serde_json::from_str(&data).expect("解析快照失败")
}

#[test]
fn commands_lists_label_commands() {
    let ws = workspace();
    dimlabel(&ws)
        .arg("commands")
        .assert()
        .success()
        .stdout(predicate::str::contains("UPC, UPD, UPM"));
}

#[test]
fn upd_rewrites_dimension_into_output_snapshot() {
    let ws = workspace();
    let output = ws.dir.path().join("labelled.json");

    dimlabel(&ws)
        .arg("--drawing")
        .arg(&ws.drawing)
        .arg("--output")
        .arg(&output)
        .args(["upd".to_string(), ws.dimension.to_string(), ws.feature.to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains(r"ACME CORP\X12.00 Pipeline\PLOC 4821"));

    let document = read_document(&output);
    let Some(Entity::AlignedDimension(dimension)) = document.entity(ws.dimension) else {
        panic!("输出中缺少标注实体");
    };
    assert_eq!(dimension.text, r"ACME CORP\X12.00 Pipeline\PLOC 4821");
    assert!((dimension.text_position.y() - 6.0).abs() < 1e-9);

    let untouched = read_document(&ws.drawing);
    let Some(Entity::AlignedDimension(original)) = untouched.entity(ws.dimension) else {
        panic!("原快照中缺少标注实体");
    };
    assert!(original.text.is_empty());

    let journal = ws.journal();
    assert!(journal.contains("Initialize: SUCCESS"));
    assert!(journal.contains(&format!("UPD success ({})  →  ", ws.dimension)));
}

#[test]
fn upc_creates_label_in_place() {
    let ws = workspace();
    dimlabel(&ws)
        .arg("--drawing")
        .arg(&ws.drawing)
        .args([
            "upc".to_string(),
            ws.feature.to_string(),
            "-3".to_string(),
            "2.5".to_string(),
        ])
        .assert()
        .success();

    let document = read_document(&ws.drawing);
    let created = document
        .entities()
        .filter_map(|(_, entity)| match entity {
            Entity::MText(mtext) => Some(mtext),
            _ => None,
        })
        .next()
        .expect("应新建一个多行文字");
    assert_eq!(created.contents, r"ACME CORP\PPipeline\PLOC 4821");
    assert_eq!(created.layer, "PIPE");
    assert!((created.location.x() + 3.0).abs() < 1e-9);
}

#[test]
fn skipped_feature_leaves_snapshot_unchanged() {
    let ws = workspace();
    let before = fs::read_to_string(&ws.drawing).expect("读取快照失败");

    dimlabel(&ws)
        .arg("--drawing")
        .arg(&ws.drawing)
        .args([
            "upd".to_string(),
            ws.dimension.to_string(),
            ws.bare_feature.to_string(),
        ])
        .assert()
        .failure();

    assert_eq!(fs::read_to_string(&ws.drawing).expect("读取快照失败"), before);
    assert!(
        ws.journal()
            .contains(&format!("UPD skipped ({}): nothing to annotate", ws.bare_feature))
    );
}

#[test]
fn missing_drawing_is_an_error() {
    let ws = workspace();
    dimlabel(&ws)
        .args(["upm", "1", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--drawing"));
}

#[test]
fn unreadable_explicit_config_stops_before_labelling() {
    let ws = workspace();
    fs::write(&ws.config, "[dimension]\nmeasurement = \"metric\"\n").expect("写入配置失败");
    let before = fs::read_to_string(&ws.drawing).expect("读取快照失败");

    dimlabel(&ws)
        .arg("--drawing")
        .arg(&ws.drawing)
        .args([
            "upd".to_string(),
            ws.dimension.to_string(),
            ws.feature.to_string(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("无法加载标注配置"));

    assert_eq!(fs::read_to_string(&ws.drawing).expect("读取快照失败"), before);
    assert!(ws.journal().is_empty());
}
