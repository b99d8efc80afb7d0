use std::path::Path;
use std::time::UNIX_EPOCH;

use tracing::debug;
use tracing::trace;

use crate::ClinicError;
use crate::ClinicResult;
use crate::converters::ConverterRegistry;
use crate::language::Language;
use crate::language::language_for_path;
use crate::parser::DslParser;
use crate::renderer::RenderOptions;
use crate::renderer::Renderer;
use crate::scanner::BlockState;
use crate::scanner::scan;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClinicOptions {
	/// Refuse to overwrite generated output that was edited by hand.
	pub verify: bool,
	/// Only generate code for the limited C API. Files that define
	/// `Py_LIMITED_API` switch this on by themselves.
	pub limited_capi: bool,
}

impl Default for ClinicOptions {
	fn default() -> Self {
		Self {
			verify: true,
			limited_capi: false,
		}
	}
}

/// The result of processing one file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Processed {
	/// No start marker appeared, so the text was never scanned.
	NoBlocks,
	/// Every block already held its current output.
	Unchanged,
	/// The new text of the file.
	Rewritten(String),
}

impl Processed {
	pub fn is_rewritten(&self) -> bool {
		matches!(self, Self::Rewritten(_))
	}
}

/// Regenerate the output of every block in `text`.
///
/// Any failing block aborts the whole text. Text with `\r\n` line endings is
/// processed as `\n` and rewritten with `\r\n`.
pub fn process(
	text: &str,
	language: &dyn Language,
	registry: &ConverterRegistry,
	options: ClinicOptions,
) -> ClinicResult<Processed> {
	if !language.find_start(text) {
		debug!(language = language.name(), "no clinic markers");
		return Ok(Processed::NoBlocks);
	}

	if !text.contains("\r\n") {
		return process_blocks(text, language, registry, options);
	}

	trace!("normalizing crlf line endings");
	let normalized = text.replace("\r\n", "\n");
	match process_blocks(&normalized, language, registry, options)? {
		Processed::Rewritten(printed) => {
			let printed = printed.replace('\n', "\r\n");
			if printed == text {
				Ok(Processed::Unchanged)
			} else {
				Ok(Processed::Rewritten(printed))
			}
		}
		processed => Ok(processed),
	}
}

fn process_blocks(
	text: &str,
	language: &dyn Language,
	registry: &ConverterRegistry,
	options: ClinicOptions,
) -> ClinicResult<Processed> {
	let limited_capi = options.limited_capi || defines_limited_api(text);
	let renderer = Renderer::new(RenderOptions { limited_capi });
	let mut parser = DslParser::new(registry);
	let mut document = scan(text, language, options.verify)?;

	for block in document.blocks_mut() {
		match block.dsl_name.as_str() {
			"clinic" => {
				let function = parser.parse(&block.input, block.input_line())?;
				block.state = BlockState::Parsed;
				block.output = Some(renderer.render(&function)?);
				block.state = BlockState::Rendered;
			}
			"raw" => {
				block.output = Some(block.input.clone());
				block.state = BlockState::Rendered;
			}
			"python" => {
				return Err(ClinicError::parse(
					"`python` blocks are not executed, use a `raw` block for literal output",
				)
				.at_line(block.start_line));
			}
			other => {
				return Err(ClinicError::parse(format!("unknown block kind `{other}`"))
					.at_line(block.start_line));
			}
		}
		trace!(dsl_name = %block.dsl_name, line = block.start_line, "rendered block");
	}

	let printed = document.print(language);
	if printed == text {
		Ok(Processed::Unchanged)
	} else {
		Ok(Processed::Rewritten(printed))
	}
}

/// Process the file at `path`, writing the result to `output` (or back to
/// `path`) only when something changed. Errors are tagged with the file.
pub fn parse_file(
	path: &Path,
	output: Option<&Path>,
	registry: &ConverterRegistry,
	options: ClinicOptions,
) -> ClinicResult<Processed> {
	let run = || -> ClinicResult<Processed> {
		let language = language_for_path(path)?;
		let text = std::fs::read_to_string(path)?;
		let processed = process(&text, language, registry, options)?;

		match (&processed, output) {
			(Processed::NoBlocks, _) | (Processed::Unchanged, None) => {}
			(Processed::Rewritten(text), target) => write_file(target.unwrap_or(path), text)?,
			(Processed::Unchanged, Some(target)) => write_file(target, &text)?,
		}

		Ok(processed)
	};

	let processed = run().map_err(|e| e.in_file(path))?;
	debug!(path = %path.display(), rewritten = processed.is_rewritten(), "processed file");

	Ok(processed)
}

/// Replace the contents of `path` through a temporary file and a rename.
/// Identical contents are left alone.
pub fn write_file(path: &Path, contents: &str) -> ClinicResult<()> {
	if std::fs::read_to_string(path).is_ok_and(|existing| existing == contents) {
		return Ok(());
	}

	let file_name = path
		.file_name()
		.map(|name| name.to_string_lossy().into_owned())
		.unwrap_or_default();
	let temp_path = path.with_file_name(format!(
		".{file_name}.tmp-{}-{}",
		std::process::id(),
		std::time::SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map_or(0, |duration| duration.as_nanos())
	));

	std::fs::write(&temp_path, contents)?;
	if let Err(e) = std::fs::rename(&temp_path, path) {
		let _ = std::fs::remove_file(&temp_path);
		return Err(e.into());
	}

	Ok(())
}

/// Whether the text contains a `#define Py_LIMITED_API` line.
pub fn defines_limited_api(text: &str) -> bool {
	text.lines().any(|line| {
		line.trim_start()
			.strip_prefix("#define")
			.is_some_and(|rest| {
				rest.starts_with([' ', '\t']) && rest.trim_start().starts_with("Py_LIMITED_API")
			})
	})
}
