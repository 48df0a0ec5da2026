//! Repository name derivation.

use anyhow::{Result, bail};

/// Derive the short repository name from a clone URL.
///
/// Takes the last `/`-separated segment after trimming trailing slashes and
/// strips a trailing `.git`. Names that cannot serve as a directory name
/// (empty, `.`, `..`) are rejected.
pub fn repo_name_from_url(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let segment = trimmed.rsplit('/').next().unwrap_or_default();
    let name = segment.strip_suffix(".git").unwrap_or(segment);

    if name.is_empty() || name == "." || name == ".." {
        bail!("cannot derive a repository name from '{url}'");
    }
    if name.contains('\\') {
        bail!("repository name '{name}' contains a path separator");
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_git_suffix() {
        let name = repo_name_from_url("https://github.com/org/repo.git").expect("name");
        assert_eq!(name, "repo");
    }

    #[test]
    fn strips_trailing_slash() {
        let name = repo_name_from_url("https://github.com/org/repo/").expect("name");
        assert_eq!(name, "repo");
    }

    #[test]
    fn keeps_inner_git_text() {
        let name = repo_name_from_url("https://github.com/org/my.github.io").expect("name");
        assert_eq!(name, "my.github.io");
    }

    #[test]
    fn accepts_scp_style_and_local_paths() {
        assert_eq!(
            repo_name_from_url("git@github.com:org/tool.git").expect("name"),
            "tool"
        );
        assert_eq!(repo_name_from_url("/srv/git/local").expect("name"), "local");
    }

    #[test]
    fn rejects_unusable_names() {
        assert!(repo_name_from_url("").is_err());
        assert!(repo_name_from_url("///").is_err());
        assert!(repo_name_from_url("https://example.com/..").is_err());
        assert!(repo_name_from_url("https://example.com/.git").is_err());
    }
}
