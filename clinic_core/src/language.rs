use std::path::Path;

use crate::ClinicError;
use crate::ClinicResult;

/// Marker syntax of a host language.
///
/// Every marker is built from the same three shapes:
///
/// ```text
/// {prefix}/*[{dsl} input]
/// {prefix}[{dsl} start generated code]*/
/// {prefix}/*[{dsl} end generated code: {arguments}]*/
/// ```
pub trait Language {
	fn name(&self) -> &'static str;

	/// Text placed before every marker.
	fn marker_prefix(&self) -> &'static str;

	/// Text placed before every line of block input.
	fn body_prefix(&self) -> &'static str;

	fn start_line(&self, dsl_name: &str) -> String {
		format!("{}/*[{dsl_name} input]", self.marker_prefix())
	}

	fn stop_line(&self, dsl_name: &str) -> String {
		format!("{}[{dsl_name} start generated code]*/", self.marker_prefix())
	}

	fn checksum_line(&self, dsl_name: &str, arguments: &str) -> String {
		format!(
			"{}/*[{dsl_name} end generated code: {arguments}]*/",
			self.marker_prefix()
		)
	}

	/// Whether a start marker appears anywhere in `text`.
	fn find_start(&self, text: &str) -> bool {
		let opener = format!("{}/*[", self.marker_prefix());
		text.match_indices(&opener).any(|(index, _)| {
			let rest = &text[index + opener.len()..];
			let name_length = rest
				.find(|c: char| !is_word_char(c))
				.unwrap_or(rest.len());
			name_length > 0 && rest[name_length..].starts_with(" input]")
		})
	}

	/// The dsl name of a start line, if `line` is one. The marker must start
	/// in the first column.
	fn match_start_line<'a>(&self, line: &'a str) -> Option<&'a str> {
		let line = strip_newline(line);
		let name = line
			.strip_prefix(self.marker_prefix())?
			.strip_prefix("/*[")?
			.strip_suffix(" input]")?;

		(!name.is_empty() && name.chars().all(is_word_char)).then_some(name)
	}

	/// The arguments of an end marker for `dsl_name`, if `line` is one.
	fn match_checksum_line<'a>(&self, line: &'a str, dsl_name: &str) -> Option<&'a str> {
		let line = strip_newline(line.trim_start());
		let arguments = line
			.strip_prefix(self.marker_prefix())?
			.strip_prefix("/*[")?
			.strip_prefix(dsl_name)?
			.strip_prefix(" end generated code: ")?
			.strip_suffix("]*/")?;

		(!arguments.is_empty()).then_some(arguments)
	}
}

fn is_word_char(c: char) -> bool {
	c.is_alphanumeric() || c == '_'
}

fn strip_newline(line: &str) -> &str {
	let line = line.strip_suffix('\n').unwrap_or(line);
	line.strip_suffix('\r').unwrap_or(line)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CLanguage;

impl Language for CLanguage {
	fn name(&self) -> &'static str {
		"C"
	}

	fn marker_prefix(&self) -> &'static str {
		""
	}

	fn body_prefix(&self) -> &'static str {
		""
	}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PythonLanguage;

impl Language for PythonLanguage {
	fn name(&self) -> &'static str {
		"Python"
	}

	fn marker_prefix(&self) -> &'static str {
		"#"
	}

	fn body_prefix(&self) -> &'static str {
		"#"
	}
}

/// Extensions handled by [`CLanguage`].
pub const C_EXTENSIONS: [&str; 8] = ["c", "cc", "cpp", "cxx", "h", "hh", "hpp", "hxx"];

/// Pick the language adapter for a file from its extension.
pub fn language_for_path(path: &Path) -> ClinicResult<&'static dyn Language> {
	let extension = path
		.extension()
		.and_then(|extension| extension.to_str())
		.unwrap_or_default();

	if C_EXTENSIONS.contains(&extension) {
		Ok(&CLanguage)
	} else if extension == "py" {
		Ok(&PythonLanguage)
	} else {
		Err(ClinicError::UnknownFileType(path.display().to_string()))
	}
}
