// src/recipe/parser.rs

//! Recipe file parsing and validation

use crate::error::{Error, Result};
use crate::hash::Checksum;
use crate::recipe::action::{parse_install_step, parse_test_step, Action};
use crate::recipe::format::{infer_version, is_contained, normalize_tag, HeadRef, Recipe};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;
use url::Url;

/// Source URL schemes the fetcher understands
const SOURCE_SCHEMES: &[&str] = &["http", "https", "file"];

/// On-disk shape of a recipe before validation
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRecipe {
    name: String,
    desc: String,
    homepage: String,
    #[serde(default)]
    url: Option<String>,
    sha256: String,
    license: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    head: Option<HeadRef>,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    workdir: Option<String>,
    install: Vec<toml::Value>,
    test: Vec<toml::Value>,
}

/// Parse and validate a recipe from TOML text
pub fn parse_recipe(content: &str) -> Result<Recipe> {
    let raw: RawRecipe = toml::from_str(content)
        .map_err(|e| Error::MalformedRecipe(e.message().to_string()))?;

    build_recipe(raw)
}

/// Parse and validate a recipe file
pub fn parse_recipe_file(path: &Path) -> Result<Recipe> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::IoError(format!("Failed to read recipe file {}: {}", path.display(), e))
    })?;

    debug!("Parsing recipe {}", path.display());
    parse_recipe(&content)
}

fn required(field: &str, value: String) -> Result<String> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(Error::MalformedRecipe(format!("`{}` cannot be empty", field)));
    }
    Ok(value)
}

fn is_valid_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+-._@".contains(c))
}

fn build_recipe(raw: RawRecipe) -> Result<Recipe> {
    let name = required("name", raw.name)?;
    if !is_valid_name(&name) {
        return Err(Error::MalformedRecipe(format!(
            "invalid name `{}`: use lowercase letters, digits and + - . _ @",
            name
        )));
    }

    let desc = required("desc", raw.desc)?;
    let license = required("license", raw.license)?;

    let homepage = required("homepage", raw.homepage)?;
    Url::parse(&homepage)
        .map_err(|e| Error::MalformedRecipe(format!("invalid homepage `{}`: {}", homepage, e)))?;

    let sha256 = Checksum::parse(&raw.sha256)
        .map_err(|e| Error::MalformedRecipe(format!("invalid sha256: {}", e)))?;

    let url = match raw.url {
        Some(url) => {
            let url = required("url", url)?;
            let parsed = Url::parse(&url)
                .map_err(|e| Error::MalformedRecipe(format!("invalid url `{}`: {}", url, e)))?;
            if !SOURCE_SCHEMES.contains(&parsed.scheme()) {
                return Err(Error::MalformedRecipe(format!(
                    "unsupported url scheme `{}` (expected one of: {})",
                    parsed.scheme(),
                    SOURCE_SCHEMES.join(", ")
                )));
            }
            Some(url)
        }
        None => None,
    };

    let head = match raw.head {
        Some(head) => Some(HeadRef {
            url: required("head.url", head.url)?,
            branch: head.branch.map(|b| required("head.branch", b)).transpose()?,
            tag: head.tag.map(|t| required("head.tag", t)).transpose()?,
        }),
        None => None,
    };

    if url.is_none() && head.is_none() {
        return Err(Error::AmbiguousProvenance(format!(
            "{} declares neither url nor head",
            name
        )));
    }

    let version = match raw.version {
        Some(v) => Some(required("version", v)?),
        None => url.as_deref().and_then(infer_version),
    };
    if url.is_some() && version.is_none() {
        return Err(Error::MalformedRecipe(format!(
            "cannot infer a version from url of {}; declare `version`",
            name
        )));
    }

    if let (Some(version), Some(tag)) = (&version, head.as_ref().and_then(|h| h.tag.as_deref())) {
        if url.is_some() && normalize_tag(tag) != version {
            return Err(Error::AmbiguousProvenance(format!(
                "archive version {} conflicts with head tag {}",
                version, tag
            )));
        }
    }

    if let Some(workdir) = &raw.workdir {
        if !is_contained(workdir) {
            return Err(Error::MalformedRecipe(format!(
                "workdir `{}` must be a relative path inside the source tree",
                workdir
            )));
        }
    }

    let depends_on = raw
        .depends_on
        .into_iter()
        .map(|d| required("depends_on", d))
        .collect::<Result<Vec<_>>>()?;

    if raw.install.is_empty() {
        return Err(Error::MalformedRecipe(
            "`install` must contain at least one step".to_string(),
        ));
    }
    let install = raw
        .install
        .iter()
        .enumerate()
        .map(|(i, v)| parse_install_step(v, i))
        .collect::<Result<Vec<_>>>()?;

    let test = raw
        .test
        .iter()
        .enumerate()
        .map(|(i, v)| parse_test_step(v, i))
        .collect::<Result<Vec<_>>>()?;

    Ok(Recipe {
        name,
        desc,
        homepage,
        url,
        sha256,
        license,
        version,
        head,
        depends_on,
        env: raw.env,
        workdir: raw.workdir,
        install,
        test,
    })
}

/// Check a parsed recipe for problems that do not prevent processing
///
/// Returns human readable warnings; hard errors are caught by the parser.
pub fn validate_recipe(recipe: &Recipe) -> Vec<String> {
    let mut warnings = Vec::new();

    if recipe.url.is_some() && !recipe.sha256.is_verified() {
        warnings.push(format!(
            "No sha256 declared for {}: the source archive will not be verified",
            recipe.name
        ));
    }

    for url in recipe.url.iter().chain(std::iter::once(&recipe.homepage)) {
        if url.starts_with("http://") {
            warnings.push(format!("Insecure http URL: {}", url));
        }
    }

    if recipe.desc.ends_with('.') {
        warnings.push("Description should not end with a full stop".to_string());
    }
    if recipe
        .desc
        .to_lowercase()
        .starts_with(&recipe.name.to_lowercase())
    {
        warnings.push("Description should not start with the recipe name".to_string());
    }

    if !recipe
        .install
        .iter()
        .any(|a| matches!(a, Action::CopyArtifact { .. }))
    {
        warnings.push("No `bin` step: nothing will be installed".to_string());
    }

    let names = recipe.artifact_names();
    for (i, name) in names.iter().enumerate() {
        if names[..i].contains(name) {
            warnings.push(format!("Executable {} is installed more than once", name));
        }
    }

    if recipe.test.is_empty() {
        warnings.push("No test steps: the installed binary will not be smoke-tested".to_string());
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::format::BuildMode;

    const QUOTE: &str = r#"
name = "quote"
desc = "Fast, real-time stock quotes in your terminal"
homepage = "https://github.com/Khurdhula-Harshavardhan/quote"
url = "https://github.com/Khurdhula-Harshavardhan/quote/archive/refs/tags/v0.0.3.tar.gz"
sha256 = ""
license = "MIT"
depends_on = ["curl"]
install = ["make", { bin = "quote" }]

[head]
url = "https://github.com/Khurdhula-Harshavardhan/quote.git"
branch = "main"

[[test]]
run = "%(bin)s/quote --help"
expect = "Usage:"
"#;

    #[test]
    fn test_parse_quote_recipe() {
        let recipe = parse_recipe(QUOTE).unwrap();

        assert_eq!(recipe.name, "quote");
        assert_eq!(recipe.version.as_deref(), Some("0.0.3"));
        assert_eq!(recipe.license, "MIT");
        assert_eq!(recipe.sha256, Checksum::Unverified);
        assert_eq!(recipe.depends_on, vec!["curl"]);
        assert_eq!(recipe.install.len(), 2);
        assert_eq!(recipe.artifact_names(), vec!["quote"]);
        assert_eq!(recipe.test.len(), 1);

        let head = recipe.head.as_ref().unwrap();
        assert_eq!(head.branch.as_deref(), Some("main"));
        assert!(!recipe.provenance(BuildMode::Stable).unwrap().is_head());
    }

    #[test]
    fn test_missing_required_field() {
        let content = QUOTE.replace("desc = \"Fast, real-time stock quotes in your terminal\"\n", "");
        let err = parse_recipe(&content).unwrap_err();
        match err {
            Error::MalformedRecipe(msg) => assert!(msg.contains("desc"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_required_field() {
        let content = QUOTE.replace("license = \"MIT\"", "license = \"  \"");
        assert!(matches!(parse_recipe(&content), Err(Error::MalformedRecipe(_))));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            parse_recipe("this is not valid toml at all {}"),
            Err(Error::MalformedRecipe(_))
        ));
    }

    #[test]
    fn test_unknown_top_level_field() {
        let content = format!("build_system = \"cmake\"\n{}", QUOTE);
        assert!(matches!(parse_recipe(&content), Err(Error::MalformedRecipe(_))));
    }

    #[test]
    fn test_bad_checksum() {
        let content = QUOTE.replace("sha256 = \"\"", "sha256 = \"abc123\"");
        assert!(matches!(parse_recipe(&content), Err(Error::MalformedRecipe(_))));

        let good = format!("sha256:{}", "a".repeat(64));
        let content = QUOTE.replace("sha256 = \"\"", &format!("sha256 = \"{}\"", good));
        let recipe = parse_recipe(&content).unwrap();
        assert!(recipe.sha256.is_verified());
    }

    #[test]
    fn test_unsupported_directive() {
        let content = QUOTE.replace(
            "install = [\"make\", { bin = \"quote\" }]",
            "install = [\"make\", { patch = \"fix.diff\" }]",
        );
        assert!(matches!(
            parse_recipe(&content),
            Err(Error::UnsupportedDirective { index: 1, .. })
        ));
    }

    #[test]
    fn test_no_provenance() {
        let content = QUOTE
            .replace(
                "url = \"https://github.com/Khurdhula-Harshavardhan/quote/archive/refs/tags/v0.0.3.tar.gz\"\n",
                "",
            )
            .replace(
                "[head]\nurl = \"https://github.com/Khurdhula-Harshavardhan/quote.git\"\nbranch = \"main\"\n",
                "",
            );
        assert!(matches!(
            parse_recipe(&content),
            Err(Error::AmbiguousProvenance(_))
        ));
    }

    #[test]
    fn test_head_only_recipe() {
        let content = QUOTE.replace(
            "url = \"https://github.com/Khurdhula-Harshavardhan/quote/archive/refs/tags/v0.0.3.tar.gz\"\n",
            "",
        );
        let recipe = parse_recipe(&content).unwrap();
        assert!(recipe.url.is_none());
        assert!(recipe.version.is_none());
        assert!(recipe.provenance(BuildMode::Stable).unwrap().is_head());
    }

    #[test]
    fn test_conflicting_version_pins() {
        let content = QUOTE.replace("branch = \"main\"", "branch = \"main\"\ntag = \"v0.0.4\"");
        assert!(matches!(
            parse_recipe(&content),
            Err(Error::AmbiguousProvenance(_))
        ));

        let content = QUOTE.replace("branch = \"main\"", "branch = \"main\"\ntag = \"v0.0.3\"");
        assert!(parse_recipe(&content).is_ok());
    }

    #[test]
    fn test_version_not_inferable() {
        let content = QUOTE.replace("refs/tags/v0.0.3.tar.gz", "refs/tags/latest.tar.gz");
        assert!(matches!(parse_recipe(&content), Err(Error::MalformedRecipe(_))));

        let content = format!("version = \"1.0\"\n{}", content);
        assert_eq!(parse_recipe(&content).unwrap().version.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_unsupported_scheme() {
        let content = QUOTE.replace("url = \"https://", "url = \"ftp://");
        assert!(matches!(parse_recipe(&content), Err(Error::MalformedRecipe(_))));
    }

    #[test]
    fn test_invalid_name() {
        let content = QUOTE.replace("name = \"quote\"", "name = \"Quote Tool\"");
        assert!(matches!(parse_recipe(&content), Err(Error::MalformedRecipe(_))));
    }

    #[test]
    fn test_workdir_must_be_contained() {
        let content = format!("workdir = \"../elsewhere\"\n{}", QUOTE);
        assert!(matches!(parse_recipe(&content), Err(Error::MalformedRecipe(_))));
    }

    #[test]
    fn test_empty_install() {
        let content = QUOTE.replace("install = [\"make\", { bin = \"quote\" }]", "install = []");
        assert!(matches!(parse_recipe(&content), Err(Error::MalformedRecipe(_))));
    }

    #[test]
    fn test_parse_recipe_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quote.toml");
        std::fs::write(&path, QUOTE).unwrap();
        assert_eq!(parse_recipe_file(&path).unwrap().name, "quote");

        assert!(matches!(
            parse_recipe_file(&dir.path().join("missing.toml")),
            Err(Error::IoError(_))
        ));
    }

    #[test]
    fn test_validate_warnings() {
        let recipe = parse_recipe(QUOTE).unwrap();
        let warnings = validate_recipe(&recipe);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("sha256"));

        let content = QUOTE
            .replace("install = [\"make\", { bin = \"quote\" }]", "install = [\"make\"]")
            .replace(
                "homepage = \"https://github.com",
                "homepage = \"http://github.com",
            )
            .replace(
                "desc = \"Fast, real-time stock quotes in your terminal\"",
                "desc = \"Quote: stock quotes.\"",
            );
        let warnings = validate_recipe(&parse_recipe(&content).unwrap());
        assert!(warnings.iter().any(|w| w.contains("http URL")));
        assert!(warnings.iter().any(|w| w.contains("full stop")));
        assert!(warnings.iter().any(|w| w.contains("recipe name")));
        assert!(warnings.iter().any(|w| w.contains("`bin`")));
    }
}
