use std::path::Path;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum ClinicError {
	#[error(transparent)]
	#[diagnostic(code(clinic::io_error))]
	Io(#[from] std::io::Error),

	#[error("line {line}: {message}")]
	#[diagnostic(code(clinic::parse))]
	Parse { message: String, line: usize },

	#[error("line {line}: unknown {kind} `{name}`")]
	#[diagnostic(
		code(clinic::converter_not_found),
		help("run `clinic --converters` to list every available converter")
	)]
	ConverterNotFound {
		name: String,
		kind: &'static str,
		line: usize,
	},

	#[error("line {line}: {message}")]
	#[diagnostic(code(clinic::structural))]
	Structural { message: String, line: usize },

	#[error("line {line}: checksum mismatch, expected `{expected}` but computed `{computed}`")]
	#[diagnostic(
		code(clinic::checksum_mismatch),
		help("remove all generated code including the end marker, or use `--force`")
	)]
	ChecksumMismatch {
		expected: String,
		computed: String,
		line: usize,
	},

	#[error("invalid version string `{input}`: {reason}")]
	#[diagnostic(code(clinic::version_parse))]
	VersionParse { input: String, reason: String },

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(clinic::config_parse),
		help("check that clinic.toml is valid TOML with [make] and/or [converters] sections")
	)]
	ConfigParse(String),

	#[error("can't identify file type for `{0}`")]
	#[diagnostic(
		code(clinic::unknown_file_type),
		help("supported extensions: c, cc, cpp, cxx, h, hh, hpp, hxx, py")
	)]
	UnknownFileType(String),

	#[error("{file}: {error}")]
	#[diagnostic(code(clinic::file))]
	InFile {
		file: String,
		error: Box<ClinicError>,
	},
}

impl ClinicError {
	pub fn parse(message: impl Into<String>) -> Self {
		Self::Parse {
			message: message.into(),
			line: 0,
		}
	}

	pub fn structural(message: impl Into<String>) -> Self {
		Self::Structural {
			message: message.into(),
			line: 0,
		}
	}

	pub fn converter_not_found(kind: &'static str, name: impl Into<String>) -> Self {
		Self::ConverterNotFound {
			name: name.into(),
			kind,
			line: 0,
		}
	}

	/// Attach a line number to an error created without one. Errors that
	/// already carry a location keep it.
	#[must_use]
	pub fn at_line(mut self, at: usize) -> Self {
		match &mut self {
			Self::Parse { line, .. }
			| Self::ConverterNotFound { line, .. }
			| Self::Structural { line, .. }
			| Self::ChecksumMismatch { line, .. }
				if *line == 0 =>
			{
				*line = at;
			}
			_ => {}
		}

		self
	}

	/// Wrap the error with the path of the file being processed.
	#[must_use]
	pub fn in_file(self, path: &Path) -> Self {
		match self {
			Self::InFile { .. } => self,
			error => {
				Self::InFile {
					file: path.display().to_string(),
					error: Box::new(error),
				}
			}
		}
	}

	/// The line the error points at, when it has one.
	pub fn line(&self) -> Option<usize> {
		match self {
			Self::Parse { line, .. }
			| Self::ConverterNotFound { line, .. }
			| Self::Structural { line, .. }
			| Self::ChecksumMismatch { line, .. } => Some(*line),
			Self::InFile { error, .. } => error.line(),
			_ => None,
		}
	}

	/// Strip any file wrapper and return the underlying error.
	pub fn root(&self) -> &Self {
		match self {
			Self::InFile { error, .. } => error.root(),
			error => error,
		}
	}
}

pub type ClinicResult<T> = Result<T, ClinicError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
