//! Locating, naming and placing the built wheel.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::builder::detect::BuildBackend;
use crate::core::errors::PipelineError;
use crate::core::interpreter::InterpreterDescriptor;
use crate::core::target::TargetDescriptor;
use crate::core::wheel::{normalize_distribution_name, Artifact, WheelFileName, WHEEL_EXTENSION};
use crate::util::fs::{find_files_with_extension, glob_files, move_file, Exclusions};

/// What the caller knows about the wheel it expects.
#[derive(Debug, Clone)]
pub struct ArtifactRequest<'a> {
    /// Distribution name as given by the user (normalized here).
    pub distribution: &'a str,
    /// Explicit version; otherwise taken from the file name.
    pub version: Option<&'a str>,
    /// Interpreter the build targeted, for the fallback tags.
    pub interpreter: &'a InterpreterDescriptor,
    pub target: &'a TargetDescriptor,
}

/// Finds the build tool's wheel and renames it for the Android target.
#[derive(Debug, Clone)]
pub struct ArtifactResolver {
    backend: BuildBackend,
    /// Directory holding the build descriptor.
    project_dir: PathBuf,
    /// Root of the recursive fallback; the descriptor may sit below it.
    search_root: PathBuf,
    excluded: Vec<PathBuf>,
}

impl ArtifactResolver {
    pub fn new(backend: BuildBackend, project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        ArtifactResolver {
            backend,
            search_root: project_dir.clone(),
            project_dir,
            excluded: Vec::new(),
        }
    }

    /// Run the recursive fallback from `root` instead of the descriptor dir.
    pub fn with_search_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.search_root = root.into();
        self
    }

    /// Never pick up wheels below `dir` (typically the output directory).
    pub fn excluding(mut self, dir: impl Into<PathBuf>) -> Self {
        self.excluded.push(dir.into());
        self
    }

    /// Backend-specific output directory, then the whole search root.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        vec![
            self.project_dir.join(self.backend.output_subdir()),
            self.search_root.clone(),
        ]
    }

    /// Find the wheel built for `distribution`.
    ///
    /// The primary directory is checked first; the recursive fallback is
    /// only used when it holds no match. Wheels that already carry an
    /// Android platform tag are never candidates. Several matches resolve
    /// to the first in name order.
    pub fn locate(&self, distribution: &str) -> Result<PathBuf, PipelineError> {
        let search_paths = self.search_paths();
        let primary = &search_paths[0];
        let pattern = format!("*.{}", WHEEL_EXTENSION);

        let mut matches = matching(glob_files(primary, &pattern).unwrap_or_default(), distribution);
        if matches.is_empty() {
            tracing::debug!(
                "no wheel in {}, searching {}",
                primary.display(),
                self.search_root.display()
            );
            let excluded = Exclusions::new(self.excluded.as_slice());
            matches = matching(
                find_files_with_extension(&self.search_root, WHEEL_EXTENSION, &excluded),
                distribution,
            );
        }

        let mut matches = matches.into_iter();
        let Some(first) = matches.next() else {
            return Err(PipelineError::ArtifactNotFound {
                distribution: distribution.to_string(),
                searched: search_paths,
            });
        };

        let others: Vec<String> = matches.map(|p| p.display().to_string()).collect();
        if !others.is_empty() {
            tracing::warn!(
                "several wheels match `{}`; using {} (also found: {})",
                distribution,
                first.display(),
                others.join(", ")
            );
        }
        Ok(first)
    }

    /// Parse the wheel's name into an [`Artifact`] with Android tags.
    ///
    /// Unparseable tags fall back to the interpreter's `cpXY` tag for both
    /// fields. A missing version with no explicit one is fatal, since the
    /// name cannot be completed without inventing it.
    pub fn resolve(&self, path: &Path, request: &ArtifactRequest<'_>) -> Result<Artifact, PipelineError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parsed = WheelFileName::parse(&file_name);

        let (interpreter_tag, abi_tag) = match parsed.tags {
            Some(tags) => tags,
            None => {
                let fallback = request.interpreter.fallback_tag();
                let warning = PipelineError::MalformedArtifactName {
                    file_name: file_name.clone(),
                    reason: format!("no interpreter/ABI tags; using `{}`", fallback),
                };
                tracing::warn!("{}", warning);
                (fallback.clone(), fallback)
            }
        };

        let version = request
            .version
            .map(str::to_string)
            .or(parsed.version)
            .ok_or_else(|| PipelineError::MalformedArtifactName {
                file_name: file_name.clone(),
                reason: "no version field and no version was supplied".to_string(),
            })?;

        let extension = if parsed.extension.is_empty() {
            WHEEL_EXTENSION.to_string()
        } else {
            parsed.extension
        };

        Ok(Artifact {
            path: path.to_path_buf(),
            distribution_name: normalize_distribution_name(request.distribution),
            version,
            interpreter_tag,
            abi_tag,
            platform_tag: request.target.platform_tag(),
            extension,
        })
    }

    /// Move the artifact into `output_dir` under its Android name,
    /// replacing any previous file. Returns the new path.
    pub fn place(&self, artifact: Artifact, output_dir: &Path) -> Result<PathBuf> {
        let destination = artifact.destination(output_dir);
        if artifact.path != destination {
            move_file(&artifact.path, &destination)?;
        }
        tracing::info!("wrote {}", destination.display());
        Ok(destination)
    }

    /// Locate, name and place the wheel in one step.
    pub fn finalize(&self, request: &ArtifactRequest<'_>, output_dir: &Path) -> Result<PathBuf> {
        let path = self.locate(request.distribution)?;
        let artifact = self.resolve(&path, request)?;
        self.place(artifact, output_dir)
    }
}

fn matching(candidates: Vec<PathBuf>, distribution: &str) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = candidates
        .into_iter()
        .filter(|path| {
            path.file_name()
                .map(|n| {
                    let name = WheelFileName::parse(&n.to_string_lossy());
                    name.matches_distribution(distribution) && !name.is_android()
                })
                .unwrap_or(false)
        })
        .collect();
    found.sort();
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::target::AndroidAbi;
    use std::fs;
    use tempfile::TempDir;

    fn interpreter() -> InterpreterDescriptor {
        InterpreterDescriptor::from_profile("python3.13").unwrap()
    }

    fn write_wheel(dir: &Path, name: &str) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, b"PK\x03\x04").unwrap();
        path
    }

    #[test]
    fn test_scenario_standard_name() {
        let tmp = TempDir::new().unwrap();
        write_wheel(
            &tmp.path().join("target/wheels"),
            "examplelib-1.2.3-cp313-cp313-linux_x86_64.whl",
        );
        let out = tmp.path().join("output");
        let interp = interpreter();
        let target = TargetDescriptor::new(AndroidAbi::X86_64, 24);
        let request = ArtifactRequest {
            distribution: "examplelib",
            version: None,
            interpreter: &interp,
            target: &target,
        };

        let resolver = ArtifactResolver::new(BuildBackend::NativeExtension, tmp.path());
        let placed = resolver.finalize(&request, &out).unwrap();

        assert_eq!(
            placed.file_name().unwrap(),
            "examplelib-1.2.3-cp313-cp313-android_24_x86_64.whl"
        );
        assert!(placed.is_file());
        assert!(!tmp
            .path()
            .join("target/wheels/examplelib-1.2.3-cp313-cp313-linux_x86_64.whl")
            .exists());
    }

    #[test]
    fn test_scenario_fallback_tags() {
        let tmp = TempDir::new().unwrap();
        let path = write_wheel(&tmp.path().join("dist"), "examplelib-1.2.3.whl");
        let interp = interpreter();
        let target = TargetDescriptor::new(AndroidAbi::Arm64V8a, 24);
        let request = ArtifactRequest {
            distribution: "examplelib",
            version: None,
            interpreter: &interp,
            target: &target,
        };

        let resolver = ArtifactResolver::new(BuildBackend::Standard, tmp.path());
        let artifact = resolver.resolve(&path, &request).unwrap();

        assert_eq!(artifact.interpreter_tag, "cp313");
        assert_eq!(artifact.abi_tag, "cp313");
        assert_eq!(
            artifact.file_name(),
            "examplelib-1.2.3-cp313-cp313-android_24_arm64_v8a.whl"
        );
    }

    #[test]
    fn test_abi3_tag_is_kept() {
        let tmp = TempDir::new().unwrap();
        let path = write_wheel(
            &tmp.path().join("target/wheels"),
            "pydantic_core-2.27.1-cp38-abi3-linux_aarch64.whl",
        );
        let interp = interpreter();
        let target = TargetDescriptor::new(AndroidAbi::Arm64V8a, 24);
        let request = ArtifactRequest {
            distribution: "pydantic-core",
            version: None,
            interpreter: &interp,
            target: &target,
        };

        let resolver = ArtifactResolver::new(BuildBackend::NativeExtension, tmp.path());
        let artifact = resolver.resolve(&path, &request).unwrap();
        assert_eq!(
            artifact.file_name(),
            "pydantic_core-2.27.1-cp38-abi3-android_24_arm64_v8a.whl"
        );
    }

    #[test]
    fn test_explicit_version_and_build_tag() {
        let tmp = TempDir::new().unwrap();
        let path = write_wheel(
            &tmp.path().join("target/wheels"),
            "examplelib-1.2.3-1-cp313-cp313-linux_x86_64.whl",
        );
        let interp = interpreter();
        let target = TargetDescriptor::new(AndroidAbi::X86_64, 28);
        let request = ArtifactRequest {
            distribution: "examplelib",
            version: Some("1.2.4"),
            interpreter: &interp,
            target: &target,
        };

        let resolver = ArtifactResolver::new(BuildBackend::NativeExtension, tmp.path());
        let artifact = resolver.resolve(&path, &request).unwrap();
        assert_eq!(
            artifact.file_name(),
            "examplelib-1.2.4-cp313-cp313-android_28_x86_64.whl"
        );
    }

    #[test]
    fn test_missing_version_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let path = write_wheel(&tmp.path().join("dist"), "examplelib.whl");
        let interp = interpreter();
        let target = TargetDescriptor::new(AndroidAbi::X86_64, 24);
        let request = ArtifactRequest {
            distribution: "examplelib",
            version: None,
            interpreter: &interp,
            target: &target,
        };

        let err = ArtifactResolver::new(BuildBackend::Standard, tmp.path())
            .resolve(&path, &request)
            .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedArtifactName { .. }));
    }

    #[test]
    fn test_not_found_lists_search_paths() {
        let tmp = TempDir::new().unwrap();
        write_wheel(
            &tmp.path().join("target/wheels"),
            "otherlib-1.0-cp313-cp313-linux_x86_64.whl",
        );

        let err = ArtifactResolver::new(BuildBackend::NativeExtension, tmp.path())
            .locate("examplelib")
            .unwrap_err();
        match err {
            PipelineError::ArtifactNotFound { searched, .. } => {
                assert_eq!(searched.len(), 2);
                assert!(searched[0].ends_with("target/wheels"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_recursive_fallback() {
        let tmp = TempDir::new().unwrap();
        let nested = write_wheel(
            &tmp.path().join("bindings/python/target/wheels"),
            "examplelib-1.2.3-cp313-cp313-linux_x86_64.whl",
        );

        let found = ArtifactResolver::new(BuildBackend::NativeExtension, tmp.path())
            .locate("examplelib")
            .unwrap();
        assert_eq!(found, nested);
    }

    #[test]
    fn test_fallback_starts_at_search_root() {
        let tmp = TempDir::new().unwrap();
        let descriptor_dir = tmp.path().join("bindings/python");
        fs::create_dir_all(&descriptor_dir).unwrap();
        let built = write_wheel(
            &tmp.path().join("target/wheels"),
            "examplelib-1.2.3-cp313-cp313-linux_x86_64.whl",
        );

        let resolver = ArtifactResolver::new(BuildBackend::NativeExtension, &descriptor_dir);
        assert!(resolver.locate("examplelib").is_err());

        let found = resolver.with_search_root(tmp.path()).locate("examplelib").unwrap();
        assert_eq!(found, built);
    }

    #[test]
    fn test_finished_outputs_are_not_candidates() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("output");
        write_wheel(&out, "examplelib-1.2.3-cp313-cp313-android_24_x86_64.whl");
        write_wheel(
            &out.join("x86_64"),
            "examplelib-1.2.3-cp313-cp313-linux_x86_64.whl",
        );
        write_wheel(
            &tmp.path().join("vendor"),
            "examplelib-1.2.3-cp313-cp313-android_24_arm64_v8a.whl",
        );

        let err = ArtifactResolver::new(BuildBackend::NativeExtension, tmp.path())
            .excluding(&out)
            .locate("examplelib")
            .unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactNotFound { .. }));
    }

    #[test]
    fn test_multiple_matches_pick_first_sorted() {
        let tmp = TempDir::new().unwrap();
        let wheels = tmp.path().join("target/wheels");
        write_wheel(&wheels, "examplelib-1.2.3-cp313-cp313-linux_x86_64.whl");
        write_wheel(&wheels, "examplelib-1.2.3-cp312-cp312-linux_x86_64.whl");

        let found = ArtifactResolver::new(BuildBackend::NativeExtension, tmp.path())
            .locate("ExampleLib")
            .unwrap();
        assert!(found.ends_with("examplelib-1.2.3-cp312-cp312-linux_x86_64.whl"));
    }

    #[test]
    fn test_naming_is_idempotent() {
        let names: Vec<String> = (0..2)
            .map(|_| {
                let tmp = TempDir::new().unwrap();
                write_wheel(
                    &tmp.path().join("target/wheels"),
                    "examplelib-1.2.3-cp313-cp313-linux_x86_64.whl",
                );
                let interp = interpreter();
                let target = TargetDescriptor::new(AndroidAbi::X86_64, 24);
                let request = ArtifactRequest {
                    distribution: "examplelib",
                    version: None,
                    interpreter: &interp,
                    target: &target,
                };
                let placed = ArtifactResolver::new(BuildBackend::NativeExtension, tmp.path())
                    .finalize(&request, &tmp.path().join("output"))
                    .unwrap();
                placed.file_name().unwrap().to_string_lossy().into_owned()
            })
            .collect();

        assert_eq!(names[0], names[1]);
    }

    #[test]
    fn test_place_replaces_existing_output() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("output");
        write_wheel(&out, "examplelib-1.2.3-cp313-cp313-android_24_x86_64.whl");
        fs::write(
            out.join("examplelib-1.2.3-cp313-cp313-android_24_x86_64.whl"),
            "stale",
        )
        .unwrap();
        let path = write_wheel(
            &tmp.path().join("target/wheels"),
            "examplelib-1.2.3-cp313-cp313-linux_x86_64.whl",
        );
        let interp = interpreter();
        let target = TargetDescriptor::new(AndroidAbi::X86_64, 24);
        let request = ArtifactRequest {
            distribution: "examplelib",
            version: None,
            interpreter: &interp,
            target: &target,
        };

        let resolver = ArtifactResolver::new(BuildBackend::NativeExtension, tmp.path());
        let artifact = resolver.resolve(&path, &request).unwrap();
        let placed = resolver.place(artifact, &out).unwrap();

        assert_eq!(fs::read(&placed).unwrap(), b"PK\x03\x04");
    }
}
