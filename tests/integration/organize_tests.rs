use drivetidy::actions::organize::GlobOverride;
use drivetidy::actions::tags::{plan_move_by_tags, read_tags, tag_tree, write_tags, TagOptions, TagRule};
use drivetidy::actions::{
    plan_organize, undo_log, CategoryOverrides, CategoryRouter, ConflictPolicy, MutationConfig,
    MutationEngine, OrganizeOptions, UndoOptions,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(path: &Path, body: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

#[test]
fn test_organize_routes_and_undoes() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("inbox");
    let dest = dir.path().join("sorted");
    let log_path = dir.path().join("undo.jsonl");
    write(&source.join("report.PDF"), "pdf");
    write(&source.join("song.mp3"), "mp3");
    write(&source.join("invoices").join("march.pdf"), "invoice");
    write(&source.join("weird.xyz"), "?");
    write(&source.join("scan.heic"), "heic");

    let overrides = CategoryOverrides {
        by_glob: vec![GlobOverride {
            pattern: "invoices/".to_string(),
            target: "Finance/Invoices".to_string(),
        }],
        by_exif_camera: Vec::new(),
        by_extension: BTreeMap::from([("heic".to_string(), "Photos".to_string())]),
    };
    let router = CategoryRouter::from_overrides(&overrides, &source);
    let plan = plan_organize(&source, &dest, &router, &OrganizeOptions::default()).unwrap();
    assert_eq!(plan.mutations.len(), 5);

    let report = MutationEngine::open(MutationConfig::default(), &log_path)
        .unwrap()
        .execute(&plan.mutations)
        .unwrap();
    assert!(report.all_succeeded());

    assert!(dest.join("Documents").join("report.PDF").exists());
    assert!(dest.join("Audio").join("song.mp3").exists());
    assert!(dest.join("Finance").join("Invoices").join("march.pdf").exists());
    assert!(dest.join("Other").join("weird.xyz").exists());
    assert!(dest.join("Photos").join("scan.heic").exists());

    let undo = undo_log(&log_path, &UndoOptions::default()).unwrap();
    assert_eq!(undo.restored.len(), 5);
    assert_eq!(fs::read_to_string(source.join("invoices").join("march.pdf")).unwrap(), "invoice");
    assert!(!dest.join("Audio").join("song.mp3").exists());
}

#[test]
fn test_organize_preserve_tree_and_dest_inside_source() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("drive");
    let dest = source.join("_sorted");
    write(&source.join("a").join("b").join("notes.txt"), "n");

    let plan = plan_organize(
        &source,
        &dest,
        &CategoryRouter::default(),
        &OrganizeOptions {
            preserve_tree: true,
            ..OrganizeOptions::default()
        },
    )
    .unwrap();
    assert_eq!(plan.mutations.len(), 1);
    assert_eq!(
        plan.mutations[0].destination,
        dest.join("Documents").join("a").join("b").join("notes.txt")
    );

    MutationEngine::preview(MutationConfig::default())
        .execute(&plan.mutations)
        .unwrap();
    // Planning again over the preview finds the same single file, never the destination tree.
    let again = plan_organize(&source, &dest, &CategoryRouter::default(), &OrganizeOptions::default()).unwrap();
    assert_eq!(again.mutations.len(), 1);
}

#[test]
fn test_name_clash_gets_hash_suffix() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("inbox");
    let dest = dir.path().join("sorted");
    write(&source.join("one").join("photo.png"), "first");
    write(&source.join("two").join("photo.png"), "second");

    let plan = plan_organize(&source, &dest, &CategoryRouter::default(), &OrganizeOptions::default()).unwrap();
    assert_eq!(plan.mutations.len(), 2);

    let config = MutationConfig::default().with_conflict(ConflictPolicy::Rename);
    let report = MutationEngine::open(config, &dir.path().join("undo.jsonl"))
        .unwrap()
        .execute(&plan.mutations)
        .unwrap();
    assert_eq!(report.success_count(), 2);

    let names: Vec<String> = fs::read_dir(dest.join("Images"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"photo.png".to_string()));
    assert!(names
        .iter()
        .any(|n| n.starts_with("photo-") && n.ends_with(".png") && n.len() == "photo-".len() + 10 + 4));
}

#[test]
fn test_tag_then_move_by_tags() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("docs");
    write(&root.join("2023").join("receipt-01.pdf"), "r1");
    write(&root.join("2023").join("letter.pdf"), "l");
    write(&root.join("drafts").join("receipt-02.pdf"), "r2");

    let rules = vec![
        TagRule {
            name: "receipts".to_string(),
            include: vec!["**/receipt*".to_string()],
            exclude: vec!["drafts/".to_string()],
            tags: vec!["finance".to_string()],
        },
        TagRule {
            name: "pdf".to_string(),
            include: vec!["*.pdf".to_string()],
            exclude: Vec::new(),
            tags: vec!["pdf".to_string()],
        },
    ];
    let records = tag_tree(&root, &rules, &TagOptions::default()).unwrap();
    assert_eq!(records.len(), 3);

    let tags_file = dir.path().join("tags.jsonl");
    write_tags(&tags_file, &records).unwrap();
    let loaded = read_tags(&tags_file).unwrap();

    let dest = dir.path().join("finance");
    let plan = plan_move_by_tags(&loaded, &dest, &["finance", "pdf"], &[]);
    assert_eq!(plan.len(), 1);

    let log_path = dir.path().join("undo.jsonl");
    MutationEngine::open(MutationConfig::default(), &log_path)
        .unwrap()
        .execute(&plan)
        .unwrap();
    assert!(dest.join("receipt-01.pdf").exists());
    assert!(root.join("drafts").join("receipt-02.pdf").exists());

    undo_log(&log_path, &UndoOptions::default()).unwrap();
    assert!(root.join("2023").join("receipt-01.pdf").exists());
}
