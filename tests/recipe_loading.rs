// tests/recipe_loading.rs

//! Loading the recipes shipped in `recipes/`

use pantry::recipe::{parse_recipe_file, validate_recipe, Action, BuildMode, Provenance};
use pantry::{Error, Stage};
use std::path::Path;

fn shipped(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("recipes").join(name)
}

#[test]
fn test_quote_recipe_loads() {
    let recipe = parse_recipe_file(&shipped("quote.toml")).unwrap();

    assert_eq!(recipe.name, "quote");
    assert_eq!(recipe.version.as_deref(), Some("0.0.3"));
    assert_eq!(recipe.depends_on, vec!["curl"]);
    assert_eq!(recipe.install.len(), 2);
    assert!(matches!(&recipe.install[1], Action::CopyArtifact { .. }));
    assert_eq!(recipe.artifact_names(), vec!["quote"]);
    assert_eq!(recipe.test.len(), 1);

    match recipe.provenance(BuildMode::Stable).unwrap() {
        Provenance::Archive { url, checksum } => {
            assert!(url.ends_with("v0.0.3.tar.gz"));
            assert!(!checksum.is_verified());
        }
        other => panic!("unexpected provenance: {other:?}"),
    }
    assert!(matches!(
        recipe.provenance(BuildMode::Head).unwrap(),
        Provenance::Head { .. }
    ));
}

#[test]
fn test_quote_recipe_warns_about_missing_checksum() {
    let recipe = parse_recipe_file(&shipped("quote.toml")).unwrap();
    let warnings = validate_recipe(&recipe);

    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("No sha256"));
}

#[test]
fn test_missing_recipe_file() {
    let err = parse_recipe_file(&shipped("no-such-recipe.toml")).unwrap_err();
    assert!(matches!(err, Error::IoError(_)));
}

#[test]
fn test_unsupported_directive_in_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("patched.toml");
    let content = std::fs::read_to_string(shipped("quote.toml"))
        .unwrap()
        .replace(
            r#"install = ["make", { bin = "quote" }]"#,
            r#"install = ["make", { patch = "fix.diff" }]"#,
        );
    std::fs::write(&path, content).unwrap();

    let err = parse_recipe_file(&path).unwrap_err();
    assert!(matches!(err, Error::UnsupportedDirective { index: 1, .. }));
    assert_eq!(err.stage(), Stage::Load);
    assert_eq!(err.exit_code(), 11);
}
