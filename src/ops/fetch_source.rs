//! Fetching project sources from git.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use git2::build::RepoBuilder;
use git2::{FetchOptions, Repository};
use regex::Regex;
use url::Url;

const GITHUB: &str = "https://github.com/";

static GITHUB_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://github\.com/").expect("valid regex"));

/// Reduce a GitHub URL or `owner/repo` shorthand to `owner/repo`.
pub fn normalize_repo_input(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('/');
    let stripped = GITHUB_PREFIX.replace(trimmed, "");
    stripped
        .strip_suffix(".git")
        .unwrap_or(&*stripped)
        .to_string()
}

/// Clone URL for a repository argument.
///
/// GitHub URLs and `owner/repo` shorthands map to
/// `https://github.com/<owner>/<repo>.git`; any other URL is used as is.
pub fn source_url(input: &str) -> Result<Url> {
    let trimmed = input.trim();
    if trimmed.contains("://") && !GITHUB_PREFIX.is_match(trimmed) {
        return Url::parse(trimmed).with_context(|| format!("invalid repository URL `{}`", input));
    }

    let repo = normalize_repo_input(trimmed);
    Url::parse(GITHUB)
        .and_then(|base| base.join(&format!("{}.git", repo)))
        .with_context(|| format!("invalid repository `{}`", input))
}

/// Clone `url` into `dest`, checking out `reference` (branch or tag) when
/// given, then bring submodules up to date. An existing `dest` is reused
/// untouched.
pub fn clone_source(url: &Url, reference: Option<&str>, dest: &Path) -> Result<()> {
    if dest.exists() {
        tracing::info!("{} already exists, skipping clone", dest.display());
        return Ok(());
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let repo = match shallow_clone(url, reference, dest) {
        Ok(repo) => repo,
        Err(e) => {
            tracing::debug!("shallow clone failed ({}), retrying with full history", e);
            if dest.exists() {
                std::fs::remove_dir_all(dest)
                    .with_context(|| format!("failed to clean up {}", dest.display()))?;
            }
            full_clone(url, reference, dest)?
        }
    };

    update_submodules(&repo)?;
    Ok(())
}

fn shallow_clone(url: &Url, reference: Option<&str>, dest: &Path) -> Result<Repository> {
    tracing::info!("cloning {}", url);

    let mut fetch = FetchOptions::new();
    fetch.depth(1);
    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch);
    if let Some(reference) = reference {
        builder.branch(reference);
    }

    Ok(builder.clone(url.as_str(), dest)?)
}

fn full_clone(url: &Url, reference: Option<&str>, dest: &Path) -> Result<Repository> {
    let repo = Repository::clone(url.as_str(), dest)
        .with_context(|| format!("failed to clone {}", url))?;

    if let Some(reference) = reference {
        checkout_reference(&repo, reference)?;
    }
    Ok(repo)
}

fn checkout_reference(repo: &Repository, reference: &str) -> Result<()> {
    let object = repo
        .revparse_single(reference)
        .or_else(|_| repo.revparse_single(&format!("origin/{}", reference)))
        .with_context(|| format!("reference `{}` not found", reference))?;
    let commit = object.peel_to_commit()?;

    repo.checkout_tree(commit.as_object(), None)?;
    repo.set_head_detached(commit.id())?;
    tracing::debug!("checked out {} at {}", reference, commit.id());
    Ok(())
}

fn update_submodules(repo: &Repository) -> Result<()> {
    for mut submodule in repo.submodules()? {
        let name = submodule.name().unwrap_or("<unnamed>").to_string();
        tracing::debug!("updating submodule {}", name);
        submodule
            .update(true, None)
            .with_context(|| format!("failed to update submodule {}", name))?;
        let sub_repo = submodule.open()?;
        update_submodules(&sub_repo)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use tempfile::TempDir;

    fn upstream(dir: &Path) -> Url {
        let repo = Repository::init(dir).unwrap();
        let sig = Signature::now("test", "test@example.com").unwrap();

        let commit = |message: &str, contents: &str| {
            std::fs::write(dir.join("pyproject.toml"), contents).unwrap();
            let mut index = repo.index().unwrap();
            index.add_path(Path::new("pyproject.toml")).unwrap();
            index.write().unwrap();
            let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
            let parents = match repo.head() {
                Ok(head) => vec![head.peel_to_commit().unwrap()],
                Err(_) => vec![],
            };
            let parents: Vec<_> = parents.iter().collect();
            repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
                .unwrap()
        };

        let first = commit("v1", "# one\n");
        let object = repo.find_object(first, None).unwrap();
        repo.tag_lightweight("v1.0", &object, false).unwrap();
        commit("v2", "# two\n");

        Url::from_directory_path(dir).unwrap()
    }

    #[test]
    fn test_normalize_repo_input() {
        assert_eq!(normalize_repo_input("owner/repo"), "owner/repo");
        assert_eq!(normalize_repo_input("https://github.com/owner/repo"), "owner/repo");
        assert_eq!(normalize_repo_input("HTTP://GitHub.com/owner/repo.git"), "owner/repo");
        assert_eq!(normalize_repo_input("owner/repo.git/"), "owner/repo");
    }

    #[test]
    fn test_source_url() {
        assert_eq!(
            source_url("owner/repo").unwrap().as_str(),
            "https://github.com/owner/repo.git"
        );
        assert_eq!(
            source_url("https://github.com/owner/repo.git").unwrap().as_str(),
            "https://github.com/owner/repo.git"
        );
        assert_eq!(
            source_url("https://gitlab.com/owner/repo.git").unwrap().as_str(),
            "https://gitlab.com/owner/repo.git"
        );
    }

    #[test]
    fn test_clone_checks_out_tag() {
        let tmp = TempDir::new().unwrap();
        let url = upstream(&tmp.path().join("upstream"));
        let dest = tmp.path().join("sources/repo");

        clone_source(&url, Some("v1.0"), &dest).unwrap();
        let contents = std::fs::read_to_string(dest.join("pyproject.toml")).unwrap();
        assert_eq!(contents, "# one\n");
    }

    #[test]
    fn test_clone_default_branch() {
        let tmp = TempDir::new().unwrap();
        let url = upstream(&tmp.path().join("upstream"));
        let dest = tmp.path().join("repo");

        clone_source(&url, None, &dest).unwrap();
        let contents = std::fs::read_to_string(dest.join("pyproject.toml")).unwrap();
        assert_eq!(contents, "# two\n");
    }

    #[test]
    fn test_existing_destination_is_kept() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("repo");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("marker"), "").unwrap();

        let url = Url::parse("https://invalid.example/none.git").unwrap();
        clone_source(&url, None, &dest).unwrap();
        assert!(dest.join("marker").exists());
    }
}
