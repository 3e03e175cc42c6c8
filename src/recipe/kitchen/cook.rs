// src/recipe/kitchen/cook.rs

//! Cook: the build execution for a single recipe
//!
//! A `Cook` owns one temporary build directory:
//!
//! ```text
//! pantry-build-XXXXXX/
//!   .active      flock held while the build runs
//!   source/      extracted archive, head checkout or copied tree
//!   destdir/     %(prefix)s and $PREFIX for `make install`
//!   stage/       artifacts waiting to be committed to the bin directory
//!   displaced/   executables replaced by plating, restored if tests fail
//!   .kept        present when the directory was kept for inspection
//! ```
//!
//! Nothing outside the build directory is touched until [`Cook::plate`]
//! commits the staged artifacts, so a failing step leaves the bin directory
//! exactly as it was. A failing smoke test after plating is undone with
//! [`Cook::unplate`].

use crate::error::{Error, Result};
use crate::recipe::action::{Action, Section};
use crate::recipe::format::{BuildVars, Recipe};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use super::archive::{copy_tree, extract_archive, source_root};
use super::process::{run_shell, tail};
use super::Kitchen;

/// Name prefix of build directories under the build root
pub(super) const BUILD_DIR_PREFIX: &str = "pantry-build-";

/// Marker file locked for the lifetime of a build directory
const ACTIVE_MARKER: &str = ".active";

/// Marker file that exempts a kept build directory from sweeping
const KEPT_MARKER: &str = ".kept";

/// Mode given to installed executables
#[cfg(unix)]
const EXECUTABLE_MODE: u32 = 0o755;

/// A single cook operation
pub struct Cook<'a> {
    kitchen: &'a Kitchen,
    recipe: &'a Recipe,
    /// Temporary build directory
    build_dir: TempDir,
    /// Held open (and locked) so sweeps from other runs skip this directory
    _active: File,
    /// Source tree root within build_dir
    source_dir: PathBuf,
    /// Install prefix within build_dir
    dest_dir: PathBuf,
    /// Staging area for artifacts
    stage_dir: PathBuf,
    /// Staged artifacts and their installed names, in step order
    staged: Vec<(PathBuf, String)>,
    /// What plating did to the bin directory, in commit order
    plated: Vec<Plated>,
    /// Version being built
    pub(super) version: String,
    /// Build log accumulator
    pub(super) log: String,
    /// Warnings
    pub(super) warnings: Vec<String>,
}

impl<'a> Cook<'a> {
    pub(super) fn new(kitchen: &'a Kitchen, recipe: &'a Recipe) -> Result<Self> {
        let root = &kitchen.config.build_root;
        fs::create_dir_all(root)?;

        let build_dir = tempfile::Builder::new()
            .prefix(BUILD_DIR_PREFIX)
            .tempdir_in(root)
            .map_err(|e| Error::IoError(format!("Failed to create build directory: {}", e)))?;

        let active = File::create(build_dir.path().join(ACTIVE_MARKER))?;
        active.try_lock_exclusive()?;

        let source_dir = build_dir.path().join("source");
        let dest_dir = build_dir.path().join("destdir");
        let stage_dir = build_dir.path().join("stage");

        fs::create_dir_all(&source_dir)?;
        fs::create_dir_all(&dest_dir)?;
        fs::create_dir_all(&stage_dir)?;

        debug!("Build directory: {}", build_dir.path().display());

        Ok(Self {
            kitchen,
            recipe,
            build_dir,
            _active: active,
            source_dir,
            dest_dir,
            stage_dir,
            staged: Vec::new(),
            plated: Vec::new(),
            version: recipe.version.clone().unwrap_or_else(|| "HEAD".to_string()),
            log: String::new(),
            warnings: Vec::new(),
        })
    }

    /// Root of the build tree (empty until sources are placed)
    pub(super) fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Unpack a verified archive into the build tree
    pub(super) fn unpack(&mut self, archive: &Path) -> Result<()> {
        extract_archive(archive, &self.source_dir)?;
        self.log_line(&format!(
            "Extracted {} to {}",
            archive.display(),
            self.source_dir.display()
        ));

        // Most archives wrap their tree in a single top-level directory
        self.source_dir = source_root(&self.source_dir)?;
        Ok(())
    }

    /// Copy an operator-supplied source tree into the build tree
    pub(super) fn copy_source(&mut self, src: &Path) -> Result<()> {
        copy_tree(src, &self.source_dir)?;
        self.log_line(&format!("Copied source tree from {}", src.display()));
        Ok(())
    }

    /// Substitution values for steps that install into `bin_dir`
    pub(super) fn vars(&self, bin_dir: &Path) -> BuildVars {
        BuildVars {
            version: self.version.clone(),
            bin_dir: bin_dir.display().to_string(),
            prefix: self.dest_dir.display().to_string(),
            jobs: self.kitchen.config.jobs,
        }
    }

    fn step_env(&self, vars: &BuildVars) -> Vec<(String, String)> {
        let mut env = vec![
            ("PREFIX".to_string(), vars.prefix.clone()),
            ("MAKEFLAGS".to_string(), format!("-j{}", vars.jobs)),
        ];
        env.extend(self.kitchen.recipe_env(self.recipe, vars));
        env
    }

    /// Phase 3: Simmer - run the install steps in order
    ///
    /// Stops at the first failing step. `bin` steps only stage their
    /// artifact here; see [`Cook::plate`].
    pub(super) fn simmer(&mut self, bin_dir: &Path) -> Result<()> {
        let workdir = match &self.recipe.workdir {
            Some(wd) => self.source_dir.join(wd),
            None => self.source_dir.clone(),
        };
        if !workdir.is_dir() {
            return Err(Error::IoError(format!(
                "Working directory not found in source tree: {}",
                workdir.display()
            )));
        }

        let vars = self.vars(bin_dir);
        let env = self.step_env(&vars);
        let recipe = self.recipe;

        for (index, action) in recipe.install.iter().enumerate() {
            match action {
                Action::RunCommand { command } => {
                    let cmd = recipe.substitute(command, &vars);
                    self.run_build_step(command, &cmd, &workdir, &env)?;
                }
                Action::CopyArtifact { path, .. } => {
                    let name = action.installed_name().ok_or_else(|| {
                        Error::MalformedRecipe(format!("`bin` step has no file name: {}", path))
                    })?;
                    self.stage_artifact(&workdir, path, &name)?;
                }
                // Reachable only through a hand-built Recipe; the parser rejects it
                Action::AssertOutputContains { .. } => {
                    return Err(Error::UnsupportedDirective {
                        section: Section::Install.as_str().to_string(),
                        index,
                        directive: "assertion".to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Run one build step, failing with the step's output tail
    fn run_build_step(
        &mut self,
        step: &str,
        command: &str,
        workdir: &Path,
        env: &[(String, String)],
    ) -> Result<()> {
        info!("Running: {}", command);

        let out = run_shell(command, workdir, env, self.kitchen.config.timeout)?;
        self.log_build_output(command, &out.output);

        if !out.success() {
            if out.timed_out() {
                self.log_line(&format!(
                    "Step timed out after {}s",
                    self.kitchen.config.timeout.as_secs()
                ));
            }
            return Err(Error::BuildFailed {
                step: step.to_string(),
                exit_code: out.exit_code(),
                timed_out: out.timed_out(),
                output: tail(&out.output),
            });
        }

        Ok(())
    }

    /// Copy a built file into the staging area
    ///
    /// The path is looked up in the working directory first, then in the
    /// install prefix for recipes that `make install PREFIX=%(prefix)s`.
    fn stage_artifact(&mut self, workdir: &Path, path: &str, name: &str) -> Result<()> {
        let source = [workdir.join(path), self.dest_dir.join(path)]
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| Error::ArtifactNotFound {
                path: PathBuf::from(path),
            })?;

        let staged = self.stage_dir.join(name);
        fs::copy(&source, &staged)?;
        debug!("Staged {} as {}", source.display(), name);
        self.log_line(&format!("Staged artifact: {} -> {}", path, name));

        self.staged.retain(|(_, n)| n != name);
        self.staged.push((staged, name.to_string()));
        Ok(())
    }

    /// Phase 4: Plate - commit staged artifacts into the bin directory
    ///
    /// Each file is written to a temporary name inside `bin_dir` and renamed
    /// over the destination, so readers never see a partial executable.
    /// Executables being replaced are saved first so [`Cook::unplate`] can
    /// put them back. A failure part way through undoes what was committed.
    pub(super) fn plate(&mut self, bin_dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(bin_dir)?;
        let displaced_dir = self.build_dir.path().join("displaced");
        let mut installed = Vec::with_capacity(self.staged.len());

        for (staged, name) in self.staged.clone() {
            let target = bin_dir.join(&name);

            let saved = target.is_file().then(|| displaced_dir.join(&name));
            let committed = (|| -> std::io::Result<()> {
                if let Some(saved) = &saved {
                    fs::create_dir_all(&displaced_dir)?;
                    fs::copy(&target, saved)?;
                }
                commit_file(&staged, &target, true)
            })();

            if let Err(e) = committed {
                self.unplate();
                return Err(Error::IoError(format!(
                    "Failed to install {}: {}",
                    target.display(),
                    e
                )));
            }

            info!("Installed {}", target.display());
            self.log_line(&format!("Installed: {}", target.display()));
            self.plated.push(Plated { target: target.clone(), saved });
            installed.push(target);
        }

        Ok(installed)
    }

    /// Undo [`Cook::plate`]: restore replaced executables, remove new ones
    ///
    /// Best effort; anything that cannot be restored is logged.
    pub(super) fn unplate(&mut self) {
        for plated in std::mem::take(&mut self.plated).into_iter().rev() {
            let restored = match &plated.saved {
                Some(saved) => commit_file(saved, &plated.target, false),
                None => fs::remove_file(&plated.target),
            };
            match restored {
                Ok(()) => debug!("Rolled back {}", plated.target.display()),
                Err(e) => warn!("Failed to roll back {}: {}", plated.target.display(), e),
            }
        }
    }

    /// Keep the build directory on disk and return its path
    ///
    /// The directory is marked so later runs do not sweep it away.
    pub(super) fn keep(self) -> PathBuf {
        let marker = self.build_dir.path().join(KEPT_MARKER);
        if let Err(e) = File::create(&marker) {
            warn!("Failed to mark {} as kept: {}", marker.display(), e);
        }
        self.build_dir.keep()
    }

    fn log_line(&mut self, line: &str) {
        self.log.push_str(line);
        self.log.push('\n');
    }

    /// Log build step output with a step header
    fn log_build_output(&mut self, step: &str, output: &str) {
        self.log_line(&format!("=== {} ===", step));
        if !output.is_empty() {
            self.log.push_str(output);
            if !output.ends_with('\n') {
                self.log.push('\n');
            }
        }
    }
}

/// An executable committed by [`Cook::plate`]
struct Plated {
    target: PathBuf,
    /// Copy of the executable it replaced, if any
    saved: Option<PathBuf>,
}

/// Copy `src` next to `target` and rename it into place
///
/// The copy keeps the mode of `src` unless `executable` forces 0755.
fn commit_file(src: &Path, target: &Path, executable: bool) -> std::io::Result<()> {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = target.with_file_name(format!(".{}.pantry-tmp", name));

    let result = (|| {
        fs::copy(src, &tmp)?;
        #[cfg(unix)]
        if executable {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(EXECUTABLE_MODE))?;
        }
        fs::rename(&tmp, target)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Remove build directories abandoned by interrupted runs
///
/// A directory is abandoned when nobody holds the lock on its marker file
/// and it was not kept on request. Errors are logged and otherwise ignored.
pub(super) fn sweep_stale_build_dirs(root: &Path) {
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };

    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let is_build_dir = entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with(BUILD_DIR_PREFIX))
            && path.is_dir();
        if !is_build_dir || path.join(KEPT_MARKER).exists() {
            continue;
        }

        let in_use = File::open(path.join(ACTIVE_MARKER))
            .map(|f| f.try_lock_exclusive().is_err())
            .unwrap_or(false);
        if in_use {
            continue;
        }

        match fs::remove_dir_all(&path) {
            Ok(()) => debug!("Removed stale build directory {}", path.display()),
            Err(e) => warn!("Failed to remove stale build directory {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::kitchen::KitchenConfig;
    use crate::recipe::parser::parse_recipe;

    fn recipe(install: &str) -> Recipe {
        parse_recipe(&format!(
            r#"
name = "quote"
desc = "Fast, real-time stock quotes in your terminal"
homepage = "https://github.com/Khurdhula-Harshavardhan/quote"
url = "https://github.com/Khurdhula-Harshavardhan/quote/archive/refs/tags/v0.0.3.tar.gz"
sha256 = ""
license = "MIT"
install = {}
test = []
"#,
            install
        ))
        .unwrap()
    }

    fn kitchen(root: &Path) -> Kitchen {
        Kitchen::new(KitchenConfig::with_cache_dir(root)).unwrap()
    }

    #[test]
    fn test_simmer_and_plate() {
        let tmp = tempfile::tempdir().unwrap();
        let kitchen = kitchen(&tmp.path().join("cache"));
        let recipe = recipe(
            r#"["printf '#!/bin/sh\necho %(name)s %(version)s\n' > quote", { bin = "quote" }]"#,
        );
        let bin = tmp.path().join("bin");

        let mut cook = Cook::new(&kitchen, &recipe).unwrap();
        cook.simmer(&bin).unwrap();
        // Nothing is installed before plating
        assert!(!bin.join("quote").exists());

        let installed = cook.plate(&bin).unwrap();
        assert_eq!(installed, vec![bin.join("quote")]);
        let content = fs::read_to_string(bin.join("quote")).unwrap();
        assert!(content.contains("echo quote 0.0.3"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(bin.join("quote")).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_failing_step_stops_build() {
        let tmp = tempfile::tempdir().unwrap();
        let kitchen = kitchen(&tmp.path().join("cache"));
        let recipe = recipe(r#"["echo compiling; exit 2", "touch later", { bin = "later" }]"#);

        let mut cook = Cook::new(&kitchen, &recipe).unwrap();
        let err = cook.simmer(&tmp.path().join("bin")).unwrap_err();
        match err {
            Error::BuildFailed {
                step,
                exit_code,
                timed_out,
                output,
            } => {
                assert_eq!(step, "echo compiling; exit 2");
                assert_eq!(exit_code, Some(2));
                assert!(!timed_out);
                assert!(output.contains("compiling"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!cook.source_dir().join("later").exists());
    }

    #[test]
    fn test_missing_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let kitchen = kitchen(&tmp.path().join("cache"));
        let recipe = recipe(r#"["true", { bin = "quote" }]"#);

        let mut cook = Cook::new(&kitchen, &recipe).unwrap();
        let err = cook.simmer(&tmp.path().join("bin")).unwrap_err();
        assert!(matches!(err, Error::ArtifactNotFound { .. }));
    }

    #[test]
    fn test_artifact_from_prefix_with_rename() {
        let tmp = tempfile::tempdir().unwrap();
        let kitchen = kitchen(&tmp.path().join("cache"));
        let recipe = recipe(
            r#"["mkdir -p %(prefix)s/bin && echo built > $PREFIX/bin/quote", { bin = "bin/quote", as = "qt" }]"#,
        );
        let bin = tmp.path().join("bin");

        let mut cook = Cook::new(&kitchen, &recipe).unwrap();
        cook.simmer(&bin).unwrap();
        cook.plate(&bin).unwrap();
        assert_eq!(fs::read_to_string(bin.join("qt")).unwrap(), "built\n");
    }

    #[test]
    fn test_sweep_skips_active_build_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let kitchen = kitchen(&tmp.path().join("cache"));
        let recipe = recipe(r#"["true"]"#);
        let root = kitchen.config.build_root.clone();

        let stale = root.join(format!("{}stale", BUILD_DIR_PREFIX));
        fs::create_dir_all(stale.join("source")).unwrap();
        let unrelated = root.join("keep-me");
        fs::create_dir_all(&unrelated).unwrap();

        let cook = Cook::new(&kitchen, &recipe).unwrap();
        sweep_stale_build_dirs(&root);

        assert!(!stale.exists());
        assert!(unrelated.exists());
        assert!(cook.build_dir.path().exists());
    }

    #[test]
    fn test_build_dir_removed_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let kitchen = kitchen(&tmp.path().join("cache"));
        let recipe = recipe(r#"["true"]"#);

        let cook = Cook::new(&kitchen, &recipe).unwrap();
        let path = cook.build_dir.path().to_path_buf();
        drop(cook);
        assert!(!path.exists());
    }

    #[test]
    fn test_assertion_in_install_steps_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let kitchen = kitchen(&tmp.path().join("cache"));
        let mut recipe = recipe(r#"["true"]"#);
        recipe.install.push(Action::AssertOutputContains {
            command: "quote --help".to_string(),
            expected: "Usage:".to_string(),
        });

        let mut cook = Cook::new(&kitchen, &recipe).unwrap();
        let err = cook.simmer(&tmp.path().join("bin")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedDirective { index: 1, .. }));
    }

    #[test]
    fn test_unplate_restores_replaced_and_removes_new() {
        let tmp = tempfile::tempdir().unwrap();
        let kitchen = kitchen(&tmp.path().join("cache"));
        let recipe = recipe(
            r#"["echo new > quote && echo new > qt", { bin = "quote" }, { bin = "qt" }]"#,
        );
        let bin = tmp.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("quote"), "old\n").unwrap();

        let mut cook = Cook::new(&kitchen, &recipe).unwrap();
        cook.simmer(&bin).unwrap();
        cook.plate(&bin).unwrap();
        assert_eq!(fs::read_to_string(bin.join("quote")).unwrap(), "new\n");
        assert!(bin.join("qt").exists());

        cook.unplate();
        assert_eq!(fs::read_to_string(bin.join("quote")).unwrap(), "old\n");
        assert!(!bin.join("qt").exists());
    }

    #[test]
    fn test_sweep_skips_kept_build_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let kitchen = kitchen(&tmp.path().join("cache"));
        let recipe = recipe(r#"["true"]"#);
        let root = kitchen.config.build_root.clone();

        let kept = Cook::new(&kitchen, &recipe).unwrap().keep();
        sweep_stale_build_dirs(&root);

        assert!(kept.exists());
        assert!(kept.join(KEPT_MARKER).exists());
    }
}
