use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::backup::backup_path_for;
use crate::error::{CopierError, CopierResult};
use crate::input_validation::validate_network_host;
use crate::network_probe::NetworkProbe;

/// Resolve a path to an absolute form without requiring it to exist.
///
/// `.` and `..` are folded lexically, then the longest existing ancestor is
/// canonicalized (resolving symlinks) and the missing tail is appended again.
pub fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let normalized = normalize_lexically(&absolute);

    let mut existing = normalized.as_path();
    let mut tail: Vec<OsString> = Vec::new();

    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut resolved = canonical;
            for name in tail.iter().rev() {
                resolved.push(name);
            }
            return Ok(resolved);
        }

        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(normalized),
        }
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Validate that the source exists and is a directory.
pub fn verify_source(source: &Path) -> CopierResult<()> {
    match std::fs::metadata(source) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(CopierError::SourceNotDirectory {
            path: source.to_path_buf(),
        }),
        Err(_) => Err(CopierError::SourceNotFound {
            path: source.to_path_buf(),
        }),
    }
}

/// Check a (source, target) pair before any mutation.
///
/// Checks run in order and the first violation wins: source exists and is a
/// directory, the two paths differ, neither contains the other, and the
/// source does not sit in the `_old` slot that staging would delete.
///
/// Returns the resolved target. Staging and copying must use this path, not
/// the caller's spelling, so the checks cover the paths actually mutated.
pub fn validate_paths(source: &Path, target: &Path) -> CopierResult<PathBuf> {
    verify_source(source)?;

    let resolved_source = resolve_path(source).map_err(|_| CopierError::SourceNotFound {
        path: source.to_path_buf(),
    })?;
    let resolved_target = resolve_path(target).map_err(|_| CopierError::InvalidInput {
        field: "destination",
        reason: "cannot be resolved to an absolute path",
    })?;

    if resolved_source == resolved_target {
        return Err(CopierError::SameFolder {
            path: resolved_source,
        });
    }

    // Path::starts_with compares whole components, so /data/a is not inside /data/ab.
    if resolved_source.starts_with(&resolved_target) || resolved_target.starts_with(&resolved_source)
    {
        return Err(CopierError::NestedPaths {
            source_path: resolved_source,
            destination: resolved_target,
        });
    }

    let backup = backup_path_for(&resolved_target);
    if resolved_source.starts_with(&backup) {
        return Err(CopierError::BackupOverlap {
            source_path: resolved_source,
            backup,
        });
    }

    debug!(source = %resolved_source.display(), target = %resolved_target.display(), "paths validated");
    Ok(resolved_target)
}

/// Full validation including the network precondition.
///
/// `network_host` is `Some` only when the operation targets a network volume.
/// The probe is consulted once, after the path checks pass. Returns the
/// resolved target like [`validate_paths`].
pub async fn validate<P: NetworkProbe>(
    source: &Path,
    target: &Path,
    network_host: Option<&str>,
    network_mode: bool,
    probe: &P,
) -> CopierResult<PathBuf> {
    let resolved_target = validate_paths(source, target)?;

    if !network_mode {
        return Ok(resolved_target);
    }

    let host = network_host
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(CopierError::MissingNetworkHost)?;
    validate_network_host(host)?;

    if !probe.is_reachable(host).await {
        return Err(CopierError::NetworkUnreachable {
            host: host.to_string(),
        });
    }

    Ok(resolved_target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::future::Future;
    use tempfile::TempDir;

    struct FixedProbe(bool);

    impl NetworkProbe for FixedProbe {
        fn is_reachable(&self, _host: &str) -> impl Future<Output = bool> + Send {
            std::future::ready(self.0)
        }
    }

    #[test]
    fn test_missing_source_is_rejected() {
        let temp = TempDir::new().unwrap();
        let result = validate_paths(&temp.path().join("missing"), &temp.path().join("dst"));
        assert!(matches!(result, Err(CopierError::SourceNotFound { .. })));
    }

    #[test]
    fn test_source_file_is_rejected() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        let result = validate_paths(&file, &temp.path().join("dst"));
        assert!(matches!(result, Err(CopierError::SourceNotDirectory { .. })));
    }

    #[test]
    fn test_same_folder_through_dot_segments() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir(&src).unwrap();

        let alias = temp.path().join("src").join("..").join("src");
        let result = validate_paths(&src, &alias);
        assert!(matches!(result, Err(CopierError::SameFolder { .. })));
    }

    #[test]
    fn test_nested_paths_both_directions() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("inner")).unwrap();

        let inside = validate_paths(&src, &src.join("inner").join("copy"));
        assert!(matches!(inside, Err(CopierError::NestedPaths { .. })));

        let around = validate_paths(&src.join("inner"), &src);
        assert!(matches!(around, Err(CopierError::NestedPaths { .. })));
    }

    #[test]
    fn test_sibling_with_common_prefix_is_not_nested() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("data");
        fs::create_dir(&src).unwrap();

        assert!(validate_paths(&src, &temp.path().join("data2")).is_ok());
    }

    #[test]
    fn test_returns_resolved_target_for_dot_segments() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().canonicalize().unwrap();
        let src = base.join("src");
        fs::create_dir(&src).unwrap();
        fs::create_dir_all(base.join("dst").join("sub")).unwrap();

        let target = validate_paths(&src, &base.join("dst").join("sub").join("..")).unwrap();
        assert_eq!(target, base.join("dst"));
        assert_eq!(backup_path_for(&target), base.join("dst_old"));
    }

    #[test]
    fn test_source_inside_backup_slot_is_rejected() {
        let temp = TempDir::new().unwrap();
        let backup = temp.path().join("dst_old");
        fs::create_dir(&backup).unwrap();

        let result = validate_paths(&backup, &temp.path().join("dst"));
        assert!(matches!(result, Err(CopierError::BackupOverlap { .. })));
    }

    #[test]
    fn test_validation_is_repeatable() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir(&src).unwrap();
        let dst = temp.path().join("dst");

        let first = validate_paths(&src, &dst).map_err(|e| e.code());
        let second = validate_paths(&src, &dst).map_err(|e| e.code());
        assert_eq!(first, second);
        assert!(!dst.exists());
    }

    #[tokio::test]
    async fn test_network_checks() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir(&src).unwrap();
        let dst = temp.path().join("dst");

        let down = validate(&src, &dst, Some("10.0.0.9"), true, &FixedProbe(false)).await;
        assert!(matches!(down, Err(CopierError::NetworkUnreachable { .. })));

        let missing = validate(&src, &dst, None, true, &FixedProbe(true)).await;
        assert!(matches!(missing, Err(CopierError::MissingNetworkHost)));

        let up = validate(&src, &dst, Some("10.0.0.9"), true, &FixedProbe(true)).await;
        assert!(up.is_ok());

        // Host is ignored outside network mode.
        let local = validate(&src, &dst, Some("10.0.0.9"), false, &FixedProbe(false)).await;
        assert!(local.is_ok());
    }
}
