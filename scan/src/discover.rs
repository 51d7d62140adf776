//! Gathering the files to decode from the command line paths.
use std::path::PathBuf;
use tracing::warn;
use walkdir::WalkDir;

/// Expand the given paths into a list of files.
///
/// Directories are walked recursively in name order,
/// keeping only files with the `.dcm` extension
/// unless `all_files` is set.
/// Other paths are kept as given.
pub fn collect_files<I>(paths: I, all_files: bool) -> Vec<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path);
            continue;
        }

        for entry in WalkDir::new(&path).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping entry under {}: {}", path.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if all_files || has_dcm_extension(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }
    files
}

fn has_dcm_extension(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("dcm"))
}
