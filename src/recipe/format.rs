// src/recipe/format.rs

//! Recipe data model
//!
//! A recipe is loaded once per invocation and never mutated afterwards.
//! All fields are validated by the parser, so code downstream can rely on
//! required strings being non-empty and on at least one provenance source.

use crate::error::{Error, Result};
use crate::hash::Checksum;
use crate::recipe::action::Action;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

/// Archive suffixes stripped before inferring a version from a file name
const ARCHIVE_SUFFIXES: &[&str] = &[
    ".tar.gz", ".tgz", ".tar.xz", ".txz", ".tar.bz2", ".tbz2", ".tar.zst", ".tar", ".zip",
];

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[-_])v?(\d+(?:\.\d+)*(?:[-.]?(?:alpha|beta|rc|pre)\.?\d*)?)$")
        .expect("version regex is valid")
});

/// A validated package recipe
#[derive(Debug, Clone, Serialize)]
pub struct Recipe {
    /// Identifier, unique within a recipe repository
    pub name: String,
    /// One-line human readable summary
    pub desc: String,
    /// Project homepage (informational)
    pub homepage: String,
    /// Versioned source archive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Declared archive checksum
    #[serde(serialize_with = "serialize_checksum")]
    pub sha256: Checksum,
    /// SPDX license identifier
    pub license: String,
    /// Version of the archive, explicit or inferred from `url`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Alternate source for building unreleased code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<HeadRef>,
    /// Named prerequisites resolved before the build
    pub depends_on: Vec<String>,
    /// Extra environment for install and test steps
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Directory inside the source tree where steps run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
    /// Ordered build actions
    pub install: Vec<Action>,
    /// Ordered smoke-test assertions
    pub test: Vec<Action>,
}

fn serialize_checksum<S: Serializer>(checksum: &Checksum, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&checksum.to_string())
}

/// Version-control source for head builds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeadRef {
    /// Repository URL
    pub url: String,
    /// Branch to build (remote default when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Version pin for the head source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Which source the operator asked to build from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// Pinned archive (falls back to head only when no archive exists)
    #[default]
    Stable,
    /// Latest unreleased source from `head`
    Head,
}

/// The concrete source a build will use
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    Archive { url: String, checksum: Checksum },
    Head { url: String, branch: Option<String> },
    /// Operator-supplied source tree (`--source-dir`)
    Local { path: String },
}

impl Provenance {
    pub fn url(&self) -> &str {
        match self {
            Provenance::Archive { url, .. } | Provenance::Head { url, .. } => url,
            Provenance::Local { path } => path,
        }
    }

    pub fn is_head(&self) -> bool {
        matches!(self, Provenance::Head { .. })
    }
}

/// Values substituted into step commands
#[derive(Debug, Clone)]
pub struct BuildVars {
    pub version: String,
    pub bin_dir: String,
    pub prefix: String,
    pub jobs: u32,
}

impl Recipe {
    /// Substitute variables in a step command
    ///
    /// Replaces `%(name)s`, `%(version)s`, `%(bin)s`, `%(prefix)s` and
    /// `%(jobs)s`.
    pub fn substitute(&self, template: &str, vars: &BuildVars) -> String {
        template
            .replace("%(name)s", &self.name)
            .replace("%(version)s", &vars.version)
            .replace("%(bin)s", &vars.bin_dir)
            .replace("%(prefix)s", &vars.prefix)
            .replace("%(jobs)s", &vars.jobs.to_string())
    }

    /// Choose the source to build from
    ///
    /// Stable mode prefers the pinned archive; head mode requires a head
    /// reference to be declared.
    pub fn provenance(&self, mode: BuildMode) -> Result<Provenance> {
        match (mode, &self.url, &self.head) {
            (BuildMode::Stable, Some(url), _) => Ok(Provenance::Archive {
                url: url.clone(),
                checksum: self.sha256.clone(),
            }),
            (_, _, Some(head)) => Ok(Provenance::Head {
                url: head.url.clone(),
                branch: head.branch.clone(),
            }),
            (BuildMode::Head, Some(_), None) => Err(Error::AmbiguousProvenance(format!(
                "head build requested but {} declares no head source",
                self.name
            ))),
            (_, None, None) => Err(Error::AmbiguousProvenance(format!(
                "{} declares neither url nor head",
                self.name
            ))),
        }
    }

    /// File name of the source archive
    pub fn archive_filename(&self) -> Option<String> {
        self.url.as_deref().map(archive_filename)
    }

    /// Names the built executables will have in the bin directory
    pub fn artifact_names(&self) -> Vec<String> {
        self.install
            .iter()
            .filter_map(|a| a.installed_name())
            .collect()
    }
}

/// Last path segment of a URL, without query or fragment
pub fn archive_filename(url: &str) -> String {
    let trimmed = url.split(['?', '#']).next().unwrap_or(url);
    trimmed
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("source.tar.gz")
        .to_string()
}

/// Infer a version from an archive URL
///
/// `.../archive/refs/tags/v0.0.3.tar.gz` gives `0.0.3`,
/// `.../nginx-1.24.0.tar.gz` gives `1.24.0`.
pub fn infer_version(url: &str) -> Option<String> {
    let filename = archive_filename(url);
    let stem = ARCHIVE_SUFFIXES
        .iter()
        .find_map(|suffix| filename.strip_suffix(suffix))
        .unwrap_or(&filename);

    VERSION_RE
        .captures(stem)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Strip a leading `v` from a tag so it compares with archive versions
pub fn normalize_tag(tag: &str) -> &str {
    tag.strip_prefix('v')
        .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        .unwrap_or(tag)
}

/// Check that a path stays inside its root (no absolute paths, no `..`)
pub(crate) fn is_contained(path: &str) -> bool {
    let path = Path::new(path);
    !path.is_absolute()
        && path
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_) | std::path::Component::CurDir))
}
