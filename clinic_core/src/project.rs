use std::path::Path;
use std::path::PathBuf;

use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;
use tracing::trace;

use crate::ClinicError;
use crate::ClinicResult;

/// Directories never entered by the tree walk.
pub const IGNORED_DIRECTORIES: [&str; 5] = [".svn", ".git", ".hg", "build", "externals"];

/// Collect every file under `srcdir` with one of `extensions`, sorted.
///
/// `excludes` are concrete paths (relative paths are joined to `srcdir`);
/// `patterns` use gitignore syntax relative to `srcdir`.
pub fn collect_sources(
	srcdir: &Path,
	excludes: &[PathBuf],
	patterns: &[String],
	extensions: &[String],
) -> ClinicResult<Vec<PathBuf>> {
	let excludes = excludes
		.iter()
		.map(|path| {
			if path.is_absolute() {
				path.clone()
			} else {
				srcdir.join(path)
			}
		})
		.collect::<Vec<_>>();
	let matcher = build_exclude_matcher(srcdir, patterns)?;

	let mut files = Vec::new();
	walk_dir(srcdir, &mut files, &matcher, &excludes, extensions)?;
	files.sort();

	Ok(files)
}

/// Build a `Gitignore` matcher from exclude patterns.
fn build_exclude_matcher(root: &Path, patterns: &[String]) -> ClinicResult<Gitignore> {
	let mut builder = GitignoreBuilder::new(root);
	for pattern in patterns {
		builder.add_line(None, pattern).map_err(|e| {
			ClinicError::ConfigParse(format!("invalid exclude pattern `{pattern}`: {e}"))
		})?;
	}
	builder
		.build()
		.map_err(|e| ClinicError::ConfigParse(format!("failed to build exclude rules: {e}")))
}

fn walk_dir(
	dir: &Path,
	files: &mut Vec<PathBuf>,
	matcher: &Gitignore,
	excludes: &[PathBuf],
	extensions: &[String],
) -> ClinicResult<()> {
	let mut entries = std::fs::read_dir(dir)?
		.map(|entry| entry.map(|entry| entry.path()))
		.collect::<Result<Vec<_>, _>>()?;
	entries.sort();

	for path in entries {
		let is_dir = path.is_dir();

		if is_dir {
			let ignored = path
				.file_name()
				.and_then(|name| name.to_str())
				.is_some_and(|name| IGNORED_DIRECTORIES.contains(&name));
			if ignored || matcher.matched(&path, true).is_ignore() {
				continue;
			}
			walk_dir(&path, files, matcher, excludes, extensions)?;
			continue;
		}

		let matches_extension = path
			.extension()
			.and_then(|extension| extension.to_str())
			.is_some_and(|extension| extensions.iter().any(|candidate| candidate == extension));
		if !matches_extension {
			continue;
		}

		if excludes.contains(&path) || matcher.matched(&path, false).is_ignore() {
			trace!(path = %path.display(), "excluded");
			continue;
		}

		files.push(path);
	}

	Ok(())
}
