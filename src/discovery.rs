use std::path::Path;

use git2::Repository;

use crate::error::PublishError;

/// Resolves the commit checked out in the Git repository enclosing `repo_path`.
///
/// Used when the pipeline did not supply a commit id. The repository is found
/// by searching upward from `repo_path`, and `HEAD` is peeled to a commit, so
/// both branch checkouts and detached heads work.
///
/// # Returns
///
/// The full hexadecimal object id of the `HEAD` commit.
///
/// # Errors
///
/// Returns an error if:
/// - No Git repository is found at or above the given path
/// - `HEAD` is unborn or does not point at a commit
pub fn head_commit(repo_path: &Path) -> Result<String, PublishError> {
    let repo = Repository::discover(repo_path).map_err(|_| PublishError::RepoNotFound {
        path: repo_path.to_path_buf(),
    })?;

    let commit = repo.head()?.peel_to_commit()?;

    Ok(commit.id().to_string())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn setup_test_repo() -> (TempDir, git2::Oid) {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();

        let test_file = temp_dir.path().join("test.txt");
        fs::write(&test_file, "test content").unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new("test.txt")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();

        let signature = git2::Signature::now("Release Bot", "release@example.com").unwrap();
        let commit_id = repo
            .commit(Some("HEAD"), &signature, &signature, "initial", &tree, &[])
            .unwrap();

        (temp_dir, commit_id)
    }

    #[test]
    fn test_head_commit() {
        let (temp_dir, commit_id) = setup_test_repo();

        let head = head_commit(temp_dir.path()).unwrap();
        assert_eq!(head, commit_id.to_string());
        assert!(crate::record::is_commit_id(&head));
    }

    #[test]
    fn test_head_commit_from_subdirectory() {
        let (temp_dir, commit_id) = setup_test_repo();
        let subdir = temp_dir.path().join("nested/dir");
        fs::create_dir_all(&subdir).unwrap();

        assert_eq!(head_commit(&subdir).unwrap(), commit_id.to_string());
    }

    #[test]
    fn test_unborn_head() {
        let temp_dir = TempDir::new().unwrap();
        Repository::init(temp_dir.path()).unwrap();

        let result = head_commit(temp_dir.path());
        assert!(matches!(result, Err(PublishError::GitError(_))));
    }

    #[test]
    fn test_repo_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let result = head_commit(temp_dir.path());
        assert!(matches!(result, Err(PublishError::RepoNotFound { .. })));
    }
}
