//! Build Invariant Tests
//!
//! End-to-end checks of scanning and building against throwaway project trees.

use std::fs;
use std::path::Path;

use buildthis_core::{
    registry::{self, RegistryError},
    sanitize_name, compute_manifest_hash, BuildContext, BuildLayout, BuildManifest, BuildPipeline,
    FormRecord, Step, StepEvent,
};
use tempfile::TempDir;

const RENDERER: &str = "<?php /* preview renderer */ echo $form['name'];\n";

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Project tree with a renderer, all optional assets and no forms.
fn create_project() -> (TempDir, BuildLayout) {
    let dir = TempDir::new().unwrap();
    let layout = BuildLayout::from_root(dir.path());
    fs::create_dir_all(&layout.forms_dir).unwrap();
    write(&layout.src_dir.join("builder/preview.php"), RENDERER);
    write(&layout.assets_dir.join("css/main.css"), "body { margin: 0; }\n");
    write(&layout.assets_dir.join("js/quote.js"), "console.log('quote');\n");
    write(&layout.assets_dir.join("favicon.png"), "\u{89}PNG");
    (dir, layout)
}

fn save_form(layout: &BuildLayout, id: &str, name: &str, updated_at: i64) -> String {
    let doc = serde_json::json!({
        "id": id,
        "name": name,
        "updated_at": updated_at,
        "steps": [{"title": "Contact", "fields": [{"label": "Don't \\ skip", "type": "text"}]}],
    });
    let content = serde_json::to_string_pretty(&doc).unwrap();
    write(&layout.forms_dir.join(format!("{id}.json")), &content);
    content
}

fn pipeline(layout: &BuildLayout) -> BuildPipeline {
    BuildPipeline::new(layout.clone(), BuildContext::now())
}

fn only(layout: &BuildLayout) -> FormRecord {
    registry::discover(&layout.forms_dir).unwrap().remove(0)
}

#[test]
fn invariant_sanitizer_output_is_clean() {
    for name in ["My Form!!", "", "!!!", "  Ünïcödé / 2024  ", &"Long name ".repeat(20)] {
        let slug = sanitize_name(name);
        assert!(!slug.is_empty());
        assert!(slug.len() <= 50);
        assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        assert_eq!(sanitize_name(&slug), slug);
    }
    assert_eq!(sanitize_name("?!?"), "untitled");
}

#[test]
fn invariant_scan_keeps_only_valid_records_newest_first() {
    let (_dir, layout) = create_project();
    save_form(&layout, "form_a", "Alpha", 10);
    save_form(&layout, "form_c", "Gamma", 30);
    save_form(&layout, "form_b", "", 20);
    write(&layout.forms_dir.join("torn.json"), r#"{"id": "torn", "name": "#);
    write(&layout.forms_dir.join("list.json"), "[1, 2, 3]");

    let records = registry::scan(&layout.forms_dir).unwrap();
    let ids: Vec<_> = records.iter().map(|r| r.id()).collect();
    assert_eq!(ids, ["form_c", "form_b", "form_a"]);
    assert_eq!(records[1].name(), "Untitled");
}

#[test]
fn invariant_empty_registry_builds_nothing() {
    let (_dir, layout) = create_project();
    write(&layout.forms_dir.join("broken.json"), "{");

    let result = registry::discover(&layout.forms_dir);
    assert!(matches!(result, Err(RegistryError::Empty { .. })));
    assert!(!layout.deploy_base.exists());
}

#[test]
fn invariant_unreadable_registry_is_distinct_from_empty() {
    let dir = TempDir::new().unwrap();
    let layout = BuildLayout::from_root(dir.path());
    let result = registry::discover(&layout.forms_dir);
    assert!(matches!(result, Err(RegistryError::Unreadable { .. })));
}

#[test]
fn invariant_target_named_from_display_name() {
    let (_dir, layout) = create_project();
    save_form(&layout, "form_1", "My Form!!", 1);

    let summary = pipeline(&layout).build(&only(&layout)).unwrap();
    assert_eq!(summary.target, layout.deploy_base.join("this_my_form"));
    assert!(summary.target.is_dir());
    assert!(summary.skipped_assets.is_empty());
}

#[test]
fn invariant_package_contents() {
    let (_dir, layout) = create_project();
    let payload = save_form(&layout, "form_1", "Pricing", 1);

    let summary = pipeline(&layout).build(&only(&layout)).unwrap();
    let target = &summary.target;

    for file in [
        "index.php",
        "src/builder/preview.php",
        "assets/css/main.css",
        "assets/js/quote.js",
        "assets/favicon.png",
        ".htaccess",
        "sw.js",
        "README.md",
        "build-manifest.json",
    ] {
        assert!(target.join(file).is_file(), "missing {file}");
    }
    assert_eq!(fs::read_to_string(target.join("src/builder/preview.php")).unwrap(), RENDERER);

    // The embedded literal decodes back to the saved payload
    let index = fs::read_to_string(target.join("index.php")).unwrap();
    let start = index.find("json_decode('").unwrap() + "json_decode('".len();
    let end = index.find("', true);").unwrap();
    let decoded = index[start..end].replace("\\'", "'").replace("\\\\", "\\");
    assert_eq!(decoded, payload);

    let readme = fs::read_to_string(target.join("README.md")).unwrap();
    assert!(readme.contains("**Form**: Pricing (ID: form_1)"));
}

#[test]
fn invariant_rebuild_resets_target_and_refreshes_cache() {
    let (_dir, layout) = create_project();
    save_form(&layout, "form_1", "Pricing", 1);
    let record = only(&layout);
    let pipeline = pipeline(&layout);

    let first = pipeline.build(&record).unwrap();
    let stale = first.target.join("leftover.txt");
    fs::write(&stale, "old").unwrap();

    let second = pipeline.build(&record).unwrap();
    assert_eq!(first.target, second.target);
    assert!(!stale.exists());
    assert_ne!(first.cache_token, second.cache_token);

    let sw = fs::read_to_string(second.target.join("sw.js")).unwrap();
    assert!(sw.contains(&format!("const CACHE_NAME = 'xcm-cache-{}';", second.cache_token)));
}

#[test]
fn invariant_missing_renderer_stops_build() {
    let (_dir, layout) = create_project();
    save_form(&layout, "form_1", "Pricing", 1);
    fs::remove_file(layout.src_dir.join("builder/preview.php")).unwrap();

    let mut started = vec![];
    let err = pipeline(&layout)
        .build_with(&only(&layout), |event| {
            if let StepEvent::Started(step) = event {
                started.push(step);
            }
        })
        .unwrap_err();

    assert_eq!(err.step, Step::CopyRenderer);
    assert!(err.to_string().contains("Copy preview renderer"));
    assert_eq!(started, [Step::PrepareOutput, Step::GenerateEntry, Step::CopyRenderer]);

    // Earlier output stays, later steps never ran
    let target = layout.deploy_base.join("this_pricing");
    assert!(target.join("index.php").is_file());
    for file in [".htaccess", "sw.js", "README.md", "build-manifest.json"] {
        assert!(!target.join(file).exists(), "{file} should not exist");
    }
}

#[test]
fn invariant_missing_optional_asset_is_not_fatal() {
    let (_dir, layout) = create_project();
    save_form(&layout, "form_1", "Pricing", 1);
    fs::remove_file(layout.assets_dir.join("favicon.png")).unwrap();

    let mut skipped_seen = 0;
    let summary = pipeline(&layout)
        .build_with(&only(&layout), |event| {
            if let StepEvent::Completed { step: Step::CopyAssets, skipped } = event {
                skipped_seen = skipped.len();
            }
        })
        .unwrap();

    assert_eq!(skipped_seen, 1);
    assert_eq!(summary.skipped_assets, [layout.assets_dir.join("favicon.png")]);
    for file in ["index.php", "src/builder/preview.php", ".htaccess", "sw.js", "README.md"] {
        assert!(summary.target.join(file).is_file(), "missing {file}");
    }
    assert!(!summary.target.join("assets/favicon.png").exists());
    assert!(summary.target.join("assets/css/main.css").is_file());
}

#[test]
fn invariant_manifest_covers_package() {
    let (_dir, layout) = create_project();
    save_form(&layout, "form_1", "Pricing", 1);

    let summary = pipeline(&layout).build(&only(&layout)).unwrap();
    let json = fs::read_to_string(summary.target.join("build-manifest.json")).unwrap();
    let mut manifest: BuildManifest = serde_json::from_str(&json).unwrap();

    assert_eq!(manifest.form_id, "form_1");
    assert_eq!(manifest.cache_token, summary.cache_token);
    assert_eq!(manifest.manifest_hash, summary.manifest_hash);

    let paths: Vec<_> = manifest.files.iter().map(|f| f.path.as_str()).collect();
    assert!(paths.contains(&"index.php"));
    assert!(paths.contains(&"src/builder/preview.php"));
    assert!(!paths.contains(&"build-manifest.json"));
    let mut sorted = paths.clone();
    sorted.sort();
    assert_eq!(paths, sorted);

    let renderer = manifest.files.iter().find(|f| f.path == "src/builder/preview.php").unwrap();
    assert_eq!(renderer.sha256, buildthis_core::sha256_hex(RENDERER.as_bytes()));

    let recorded = std::mem::take(&mut manifest.manifest_hash);
    assert_eq!(compute_manifest_hash(&manifest).unwrap(), recorded);
}

#[test]
fn invariant_build_all_stops_at_first_failure() {
    let (_dir, layout) = create_project();
    save_form(&layout, "form_a", "Alpha", 30);
    save_form(&layout, "form_b", "Beta", 20);
    save_form(&layout, "form_c", "Gamma", 10);
    let records = registry::discover(&layout.forms_dir).unwrap();

    // Beta's backing file disappears between scan and build
    fs::remove_file(layout.forms_dir.join("form_b.json")).unwrap();

    let err = pipeline(&layout).build_all(&records, |_, _| {}).unwrap_err();
    assert_eq!(err.form, "Beta");
    assert_eq!(err.step, Step::GenerateEntry);

    assert!(layout.deploy_base.join("this_alpha/build-manifest.json").is_file());
    assert!(!layout.deploy_base.join("this_gamma").exists());
}

#[test]
fn invariant_non_utf8_payload_is_embedded_verbatim() {
    let (_dir, layout) = create_project();
    let mut raw = br#"{"id": "form_l1", "name": "Caf"#.to_vec();
    raw.push(0xE9);
    raw.extend_from_slice(br#"", "updated_at": 3}"#);
    fs::write(layout.forms_dir.join("form_l1.json"), &raw).unwrap();

    let record = only(&layout);
    assert_eq!(record.id(), "form_l1");

    let summary = pipeline(&layout).build(&record).unwrap();
    let index = fs::read(summary.target.join("index.php")).unwrap();
    assert!(index.windows(raw.len()).any(|w| w == raw.as_slice()));
}
