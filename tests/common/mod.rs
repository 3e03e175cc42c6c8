// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.
//!
//! Each test gets a [`Workspace`]: a temp directory with a `tools/` dir for
//! fake build tools, a `bin/` install target, a cache root and a source
//! tarball served over `file://`. Recipes put `tools/` first on their own
//! PATH, so a fake `make` stands in for the real one.

#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use pantry::recipe::{parse_recipe, Kitchen, KitchenConfig, Recipe};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;

/// `make` that builds a working `quote`
pub const MAKE_OK: &str = r#"#!/bin/sh
printf '#!/bin/sh\necho "Usage: quote [SYMBOL]"\n' > quote
chmod +x quote
"#;

/// `make` that fails like a broken compile
pub const MAKE_FAIL: &str = r#"#!/bin/sh
echo "quote.c:12: error: expected ';'" >&2
exit 2
"#;

/// `make` that succeeds without producing anything
pub const MAKE_NOTHING: &str = "#!/bin/sh\necho nothing to do\n";

/// `make` that builds a `quote` with the wrong help text
pub const MAKE_WRONG_HELP: &str = r#"#!/bin/sh
printf '#!/bin/sh\necho "usage: quote"\n' > quote
chmod +x quote
"#;

pub struct Workspace {
    pub tmp: TempDir,
    pub tools: PathBuf,
    pub bin: PathBuf,
    pub cache: PathBuf,
    pub tarball: PathBuf,
}

impl Workspace {
    /// Create a workspace whose fake `make` runs `make_script`
    pub fn new(make_script: &str) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let tools = tmp.path().join("tools");
        let bin = tmp.path().join("bin");
        let cache = tmp.path().join("cache");
        fs::create_dir_all(&tools).unwrap();
        fs::create_dir_all(&bin).unwrap();

        write_tool(&tools, "make", make_script);

        let tarball = tmp.path().join("v0.0.3.tar.gz");
        write_tarball(
            &tarball,
            "quote-0.0.3",
            &[("Makefile", "all:\n\tcc -o quote quote.c\n"), ("quote.c", "int main(void) { return 0; }\n")],
        );

        Self {
            tmp,
            tools,
            bin,
            cache,
            tarball,
        }
    }

    /// Replace the fake `make`
    pub fn set_make(&self, script: &str) {
        write_tool(&self.tools, "make", script);
    }

    pub fn tarball_url(&self) -> String {
        url::Url::from_file_path(&self.tarball).unwrap().to_string()
    }

    pub fn tarball_sha256(&self) -> String {
        pantry::hash::sha256_file(&self.tarball).unwrap()
    }

    /// PATH with the fake tools first
    pub fn path_env(&self) -> String {
        let system = std::env::var("PATH").unwrap_or_else(|_| "/usr/bin:/bin".to_string());
        format!("{}:{}", self.tools.display(), system)
    }

    /// The quote recipe pointing at this workspace's tarball
    pub fn recipe_toml(&self, sha256: &str) -> String {
        format!(
            r#"
name = "quote"
desc = "Fast, real-time stock quotes in your terminal"
homepage = "https://github.com/Khurdhula-Harshavardhan/quote"
url = "{url}"
version = "0.0.3"
sha256 = "{sha256}"
license = "MIT"
install = ["make", {{ bin = "quote" }}]

[env]
PATH = "{path}"

[[test]]
run = "%(bin)s/quote --help"
expect = "Usage:"
"#,
            url = self.tarball_url(),
            sha256 = sha256,
            path = self.path_env(),
        )
    }

    /// A head-only quote recipe checking out `repo_url` on `main`
    pub fn head_recipe(&self, repo_url: &str) -> Recipe {
        parse_recipe(&format!(
            r#"
name = "quote"
desc = "Fast, real-time stock quotes in your terminal"
homepage = "https://github.com/Khurdhula-Harshavardhan/quote"
sha256 = ""
license = "MIT"
install = ["make", {{ bin = "quote" }}]

[head]
url = "{url}"
branch = "main"

[env]
PATH = "{path}"

[[test]]
run = "%(bin)s/quote --help"
expect = "Usage:"
"#,
            url = repo_url,
            path = self.path_env(),
        ))
        .unwrap()
    }

    /// Commit a small source tree to a local git repository on `main`
    ///
    /// Returns its `file://` URL, or None when git is not installed.
    pub fn git_repo(&self) -> Option<String> {
        which::which("git").ok()?;

        let repo = self.tmp.path().join("quote-git");
        fs::create_dir_all(&repo).unwrap();
        fs::write(repo.join("Makefile"), "all:\n\tcc -o quote quote.c\n").unwrap();
        fs::write(repo.join("quote.c"), "int main(void) { return 0; }\n").unwrap();

        git(&repo, &["init", "-q"]);
        git(&repo, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(&repo, &["add", "."]);
        git(
            &repo,
            &[
                "-c",
                "user.name=pantry",
                "-c",
                "user.email=pantry@example.com",
                "-c",
                "commit.gpgsign=false",
                "commit",
                "-q",
                "-m",
                "initial",
            ],
        );

        Some(url::Url::from_file_path(&repo).unwrap().to_string())
    }

    pub fn recipe(&self, sha256: &str) -> Recipe {
        parse_recipe(&self.recipe_toml(sha256)).unwrap()
    }

    pub fn config(&self) -> KitchenConfig {
        let mut config = KitchenConfig::with_cache_dir(&self.cache);
        config.jobs = 2;
        config.timeout = Duration::from_secs(30);
        config.test_timeout = Duration::from_secs(10);
        config
    }

    pub fn kitchen(&self) -> Kitchen {
        Kitchen::new(self.config()).unwrap()
    }

    /// Sorted file names in the bin directory
    pub fn bin_entries(&self) -> Vec<String> {
        list_dir(&self.bin)
    }

    /// Build directories left under the build root
    pub fn leftover_build_dirs(&self) -> Vec<String> {
        list_dir(&self.config().build_root)
            .into_iter()
            .filter(|n| n.starts_with("pantry-build-"))
            .collect()
    }
}

/// Run git in `dir`, panicking on failure
pub fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdout(Stdio::null())
        .status()
        .unwrap();
    assert!(status.success(), "git {:?} failed", args);
}

/// Write an executable shell script
pub fn write_tool(dir: &Path, name: &str, script: &str) {
    let path = dir.join(name);
    fs::write(&path, script).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }
}

/// Write a .tar.gz with every file under a single top-level directory
pub fn write_tarball(path: &Path, top: &str, files: &[(&str, &str)]) {
    let file = File::create(path).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{}/{}", top, name), content.as_bytes())
            .unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap();
}

/// Sorted entry names of a directory (empty if it does not exist)
pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
