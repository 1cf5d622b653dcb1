//! Dependency staging
//!
//! Copies the declared dependency artifacts into the staging `lib` directory
//! and removes anything left over from a previous, larger dependency set.
//! After a pass the files under the directory are exactly the declared
//! destinations.

use crate::error::{DepImageError, DepImageResult};
use crate::resolve::DependencyEntry;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// A file that exists inside the staging directory
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StagedFile {
    /// Absolute path inside the staging tree
    pub path: PathBuf,
}

/// Copy `entries` into `root` and delete stale files.
///
/// Any copy failure aborts the pass. Returns the staged files sorted by path.
pub fn stage(entries: &[DependencyEntry], root: &Path) -> DepImageResult<Vec<StagedFile>> {
    fs::create_dir_all(root)
        .map_err(|e| DepImageError::staging(format!("creating {}", root.display()), e))?;

    let plan = plan_copies(entries, root)?;

    let mut copied = 0;
    for (destination, source) in &plan {
        clear_path_conflicts(root, destination)?;
        if copy_entry(source, destination)? {
            copied += 1;
        }
    }

    let declared: BTreeSet<PathBuf> = plan.into_keys().collect();
    let present = present_files(root)?;
    let stale = stale_files(&present, &declared);
    remove_stale(root, &stale)?;

    info!(
        "Staged {} dependencies into {} ({} copied, {} stale removed)",
        declared.len(),
        root.display(),
        copied,
        stale.len()
    );

    Ok(declared
        .into_iter()
        .map(|path| StagedFile { path })
        .collect())
}

/// Files present under `root` that are not in `declared`
pub fn stale_files(present: &BTreeSet<PathBuf>, declared: &BTreeSet<PathBuf>) -> Vec<PathBuf> {
    present.difference(declared).cloned().collect()
}

/// All non-directory entries under `root`
pub fn present_files(root: &Path) -> DepImageResult<BTreeSet<PathBuf>> {
    let mut files = BTreeSet::new();

    if !root.exists() {
        return Ok(files);
    }

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            DepImageError::staging(format!("scanning {}", root.display()), e.into())
        })?;
        if !entry.file_type().is_dir() {
            files.insert(entry.into_path());
        }
    }

    Ok(files)
}

/// Delete `stale` files, then any directories under `root` left empty
fn remove_stale(root: &Path, stale: &[PathBuf]) -> DepImageResult<()> {
    for path in stale {
        debug!("Removing stale dependency: {}", path.display());
        fs::remove_file(path)
            .map_err(|e| DepImageError::staging(format!("removing {}", path.display()), e))?;
    }

    if !stale.is_empty() {
        prune_empty_dirs(root)?;
    }

    Ok(())
}

fn prune_empty_dirs(root: &Path) -> DepImageResult<()> {
    let dirs: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect();

    for dir in dirs {
        let is_empty = fs::read_dir(&dir)
            .map_err(|e| DepImageError::staging(format!("reading {}", dir.display()), e))?
            .next()
            .is_none();
        if is_empty {
            fs::remove_dir(&dir)
                .map_err(|e| DepImageError::staging(format!("removing {}", dir.display()), e))?;
        }
    }

    Ok(())
}

/// Map of absolute destination to source, validated and de-duplicated
fn plan_copies(
    entries: &[DependencyEntry],
    root: &Path,
) -> DepImageResult<BTreeMap<PathBuf, PathBuf>> {
    let mut plan: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();

    for entry in entries {
        let destination = root.join(normalize_destination(&entry.destination)?);

        if let Some(existing) = plan.get(&destination) {
            if existing != &entry.source {
                return Err(DepImageError::InvalidDestination {
                    destination: entry.destination.clone(),
                    reason: format!(
                        "declared by both {} and {}",
                        existing.display(),
                        entry.source.display()
                    ),
                });
            }
            continue;
        }

        plan.insert(destination, entry.source.clone());
    }

    for destination in plan.keys() {
        let enclosing = destination
            .ancestors()
            .skip(1)
            .take_while(|dir| *dir != root)
            .find(|dir| plan.contains_key(*dir));
        if let Some(file) = enclosing {
            return Err(DepImageError::InvalidDestination {
                destination: relative_to(destination, root),
                reason: format!(
                    "nested under declared file {}",
                    relative_to(file, root).display()
                ),
            });
        }
    }

    Ok(plan)
}

fn relative_to(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

/// Remove leftovers that block `destination`: files (or links) sitting where
/// one of its parent directories must go, and a directory at its own path.
fn clear_path_conflicts(root: &Path, destination: &Path) -> DepImageResult<()> {
    for dir in destination.ancestors().skip(1) {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        match fs::symlink_metadata(dir) {
            Ok(meta) if !meta.is_dir() => {
                debug!("Removing stale file in the way of {}", destination.display());
                fs::remove_file(dir)
                    .map_err(|e| DepImageError::staging(format!("removing {}", dir.display()), e))?;
            }
            _ => {}
        }
    }

    if let Ok(meta) = fs::symlink_metadata(destination) {
        if meta.is_dir() {
            debug!("Removing stale directory {}", destination.display());
            fs::remove_dir_all(destination).map_err(|e| {
                DepImageError::staging(format!("removing {}", destination.display()), e)
            })?;
        }
    }

    Ok(())
}

/// Reduce a destination to plain components, rejecting anything that could
/// escape the staging directory.
fn normalize_destination(destination: &Path) -> DepImageResult<PathBuf> {
    let mut normalized = PathBuf::new();

    for component in destination.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(DepImageError::InvalidDestination {
                    destination: destination.to_path_buf(),
                    reason: "must not contain '..'".to_string(),
                })
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(DepImageError::InvalidDestination {
                    destination: destination.to_path_buf(),
                    reason: "must be relative".to_string(),
                })
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(DepImageError::InvalidDestination {
            destination: destination.to_path_buf(),
            reason: "must name a file".to_string(),
        });
    }

    Ok(normalized)
}

/// Copy `source` over `destination` unless the staged copy already matches
/// its size and modification time. Returns whether a copy happened.
fn copy_entry(source: &Path, destination: &Path) -> DepImageResult<bool> {
    let source_meta = fs::metadata(source)
        .map_err(|e| DepImageError::staging(format!("reading {}", source.display()), e))?;

    if is_current(&source_meta, destination) {
        return Ok(false);
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| DepImageError::staging(format!("creating {}", parent.display()), e))?;
    }

    // replace rather than write into: the old copy may be a symlink or read-only
    if fs::symlink_metadata(destination).is_ok() {
        fs::remove_file(destination).map_err(|e| {
            DepImageError::staging(format!("removing {}", destination.display()), e)
        })?;
    }

    fs::copy(source, destination).map_err(|e| {
        DepImageError::staging(
            format!("copying {} to {}", source.display(), destination.display()),
            e,
        )
    })?;

    // without a matching mtime the next pass simply copies again
    if let Ok(modified) = source_meta.modified() {
        if let Err(e) = fs::File::open(destination).and_then(|f| f.set_modified(modified)) {
            debug!("Could not set mtime of {}: {}", destination.display(), e);
        }
    }

    Ok(true)
}

/// Staged regular file with the same length and mtime as the source
fn is_current(source_meta: &fs::Metadata, destination: &Path) -> bool {
    let Ok(staged) = fs::symlink_metadata(destination) else {
        return false;
    };
    if !staged.is_file() || staged.len() != source_meta.len() {
        return false;
    }
    match (staged.modified(), source_meta.modified()) {
        (Ok(staged), Ok(source)) => staged == source,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        sources: PathBuf,
        root: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let sources = dir.path().join("sources");
            fs::create_dir_all(&sources).unwrap();
            let root = dir.path().join("staging").join("lib");
            Self {
                _dir: dir,
                sources,
                root,
            }
        }

        fn source(&self, name: &str, contents: &[u8]) -> DependencyEntry {
            let path = self.sources.join(name);
            fs::write(&path, contents).unwrap();
            DependencyEntry::new(path, name)
        }

        fn staged_names(&self) -> Vec<String> {
            present_files(&self.root)
                .unwrap()
                .iter()
                .map(|p| {
                    p.strip_prefix(&self.root)
                        .unwrap()
                        .to_string_lossy()
                        .replace('\\', "/")
                })
                .collect()
        }
    }

    #[test]
    fn stage_creates_root_and_copies() {
        let fx = Fixture::new();
        let entries = vec![fx.source("a.jar", b"A"), fx.source("b.jar", b"B")];

        let staged = stage(&entries, &fx.root).unwrap();

        assert_eq!(staged.len(), 2);
        assert_eq!(fs::read(fx.root.join("a.jar")).unwrap(), b"A");
        assert_eq!(fs::read(fx.root.join("b.jar")).unwrap(), b"B");
        assert_eq!(fx.staged_names(), vec!["a.jar", "b.jar"]);
    }

    #[test]
    fn stage_nested_destination() {
        let fx = Fixture::new();
        let mut entry = fx.source("a.jar", b"A");
        entry.destination = PathBuf::from("org/example/./a.jar");

        let staged = stage(&[entry], &fx.root).unwrap();

        assert_eq!(staged[0].path, fx.root.join("org/example/a.jar"));
        assert_eq!(fs::read(fx.root.join("org/example/a.jar")).unwrap(), b"A");
    }

    #[test]
    fn stage_overwrites_changed_content() {
        let fx = Fixture::new();
        stage(&[fx.source("b.jar", b"B")], &fx.root).unwrap();
        stage(&[fx.source("b.jar", b"BB")], &fx.root).unwrap();

        assert_eq!(fs::read(fx.root.join("b.jar")).unwrap(), b"BB");
    }

    #[test]
    fn stage_removes_stale_files() {
        let fx = Fixture::new();
        let a = fx.source("a.jar", b"A");
        let b = fx.source("b.jar", b"B");
        let mut nested = fx.source("c.jar", b"C");
        nested.destination = PathBuf::from("nested/c.jar");

        stage(&[a.clone(), b, nested], &fx.root).unwrap();
        stage(&[a], &fx.root).unwrap();

        assert_eq!(fx.staged_names(), vec!["a.jar"]);
        assert!(!fx.root.join("nested").exists());
    }

    #[test]
    fn stale_file_replaced_by_directory() {
        let fx = Fixture::new();
        let mut entry = fx.source("a.jar", b"A");

        entry.destination = PathBuf::from("org");
        stage(&[entry.clone()], &fx.root).unwrap();
        entry.destination = PathBuf::from("org/a.jar");
        stage(&[entry], &fx.root).unwrap();

        assert_eq!(fx.staged_names(), vec!["org/a.jar"]);
    }

    #[test]
    fn stale_directory_replaced_by_file() {
        let fx = Fixture::new();
        let mut entry = fx.source("a.jar", b"A");

        entry.destination = PathBuf::from("org/a.jar");
        stage(&[entry.clone()], &fx.root).unwrap();
        entry.destination = PathBuf::from("org");
        stage(&[entry], &fx.root).unwrap();

        assert_eq!(fx.staged_names(), vec!["org"]);
        assert_eq!(fs::read(fx.root.join("org")).unwrap(), b"A");
    }

    #[test]
    fn stage_rejects_destination_nested_under_file() {
        let fx = Fixture::new();
        let mut a = fx.source("a.jar", b"A");
        a.destination = PathBuf::from("org");
        let mut b = fx.source("b.jar", b"B");
        b.destination = PathBuf::from("org/b.jar");

        let err = stage(&[a, b], &fx.root).unwrap_err();
        assert!(matches!(err, DepImageError::InvalidDestination { .. }));
    }

    #[test]
    fn unchanged_files_are_not_copied_again() {
        let fx = Fixture::new();
        let entry = fx.source("a.jar", b"A");
        stage(&[entry.clone()], &fx.root).unwrap();

        // same size and mtime as the source, different bytes: only a skipped
        // copy leaves this in place
        let staged = fx.root.join("a.jar");
        let mtime = fs::metadata(&entry.source).unwrap().modified().unwrap();
        fs::write(&staged, b"Z").unwrap();
        fs::File::open(&staged).unwrap().set_modified(mtime).unwrap();

        stage(&[entry], &fx.root).unwrap();
        assert_eq!(fs::read(&staged).unwrap(), b"Z");
    }

    #[cfg(unix)]
    #[test]
    fn read_only_staged_copy_is_replaced() {
        use std::os::unix::fs::PermissionsExt;

        let fx = Fixture::new();
        let entry = fx.source("a.jar", b"A");
        fs::set_permissions(&entry.source, fs::Permissions::from_mode(0o444)).unwrap();
        stage(&[entry.clone()], &fx.root).unwrap();

        fs::set_permissions(&entry.source, fs::Permissions::from_mode(0o644)).unwrap();
        fs::write(&entry.source, b"AA").unwrap();
        stage(&[entry], &fx.root).unwrap();

        assert_eq!(fs::read(fx.root.join("a.jar")).unwrap(), b"AA");
    }

    #[test]
    fn stage_twice_is_idempotent() {
        let fx = Fixture::new();
        let entries = vec![fx.source("a.jar", b"A"), fx.source("b.jar", b"B")];

        let first = stage(&entries, &fx.root).unwrap();
        let names = fx.staged_names();
        let second = stage(&entries, &fx.root).unwrap();

        assert_eq!(first, second);
        assert_eq!(names, fx.staged_names());
    }

    #[test]
    fn stage_missing_source_is_fatal() {
        let fx = Fixture::new();
        let entries = vec![
            fx.source("a.jar", b"A"),
            DependencyEntry::new(fx.sources.join("missing.jar"), "missing.jar"),
        ];

        let err = stage(&entries, &fx.root).unwrap_err();
        assert!(matches!(err, DepImageError::Staging { .. }));
    }

    #[test]
    fn stage_rejects_escaping_destinations() {
        let fx = Fixture::new();
        let mut entry = fx.source("a.jar", b"A");

        entry.destination = PathBuf::from("../a.jar");
        assert!(matches!(
            stage(&[entry.clone()], &fx.root).unwrap_err(),
            DepImageError::InvalidDestination { .. }
        ));

        entry.destination = fx.sources.join("abs.jar");
        assert!(matches!(
            stage(&[entry.clone()], &fx.root).unwrap_err(),
            DepImageError::InvalidDestination { .. }
        ));

        entry.destination = PathBuf::from(".");
        assert!(matches!(
            stage(&[entry], &fx.root).unwrap_err(),
            DepImageError::InvalidDestination { .. }
        ));
    }

    #[test]
    fn stage_conflicting_destinations_rejected() {
        let fx = Fixture::new();
        let a = fx.source("a.jar", b"A");
        let mut b = fx.source("b.jar", b"B");
        b.destination = a.destination.clone();

        let err = stage(&[a, b], &fx.root).unwrap_err();
        assert!(matches!(err, DepImageError::InvalidDestination { .. }));
    }

    #[test]
    fn stage_duplicate_identical_entries_collapse() {
        let fx = Fixture::new();
        let a = fx.source("a.jar", b"A");

        let staged = stage(&[a.clone(), a], &fx.root).unwrap();
        assert_eq!(staged.len(), 1);
    }

    #[test]
    fn stale_files_is_set_difference() {
        let present: BTreeSet<PathBuf> = ["/s/a.jar", "/s/b.jar", "/s/c.jar"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let declared: BTreeSet<PathBuf> = ["/s/a.jar", "/s/d.jar"].iter().map(PathBuf::from).collect();

        assert_eq!(
            stale_files(&present, &declared),
            vec![PathBuf::from("/s/b.jar"), PathBuf::from("/s/c.jar")]
        );
    }

    #[test]
    fn present_files_missing_root_is_empty() {
        let fx = Fixture::new();
        assert!(present_files(&fx.root).unwrap().is_empty());
    }
}
