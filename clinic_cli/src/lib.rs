use std::path::PathBuf;

use clap::CommandFactory;
use clap::Parser;
use clap::error::ErrorKind;

#[derive(Debug, Parser)]
#[command(
	name = "clinic",
	author,
	version,
	about = "Preprocessor for CPython C files.",
	long_about = "Preprocessor for CPython C files.\n\nThe purpose of the Argument Clinic is \
	              automating all the boilerplate involved with writing argument parsing code \
	              for builtins and providing introspection signatures (\"docstrings\") for \
	              CPython builtins.\n\nFor more information see \
	              https://devguide.python.org/development-tools/clinic/"
)]
#[allow(clippy::struct_excessive_bools)]
pub struct ClinicCli {
	/// Force output regeneration, even when generated code was edited by
	/// hand.
	#[arg(long, short, default_value_t = false)]
	pub force: bool,

	/// Redirect file output to OUTPUT.
	#[arg(long, short, value_name = "OUTPUT", conflicts_with = "make")]
	pub output: Option<PathBuf>,

	/// Enable verbose mode.
	#[arg(long, short, default_value_t = false)]
	pub verbose: bool,

	/// Print a list of all supported converters and return converters.
	#[arg(
		long,
		default_value_t = false,
		conflicts_with_all = ["files", "make", "output"]
	)]
	pub converters: bool,

	/// Walk --srcdir to run over all relevant files.
	#[arg(long, default_value_t = false, conflicts_with = "files")]
	pub make: bool,

	/// The directory tree to walk in --make mode.
	#[arg(long, value_name = "SRCDIR", default_value = ".")]
	pub srcdir: PathBuf,

	/// A file to exclude in --make mode. Can be given multiple times.
	#[arg(long, value_name = "EXCLUDE")]
	pub exclude: Vec<PathBuf>,

	/// Use the Limited C API.
	#[arg(long = "limited", default_value_t = false)]
	pub limited_capi: bool,

	/// The list of files to process.
	#[arg(value_name = "FILE", required_unless_present_any = ["converters", "make"])]
	pub files: Vec<PathBuf>,
}

impl ClinicCli {
	/// Reject combinations clap cannot express on its own.
	pub fn validate(&self) -> Result<(), clap::Error> {
		if self.output.is_some() && self.files.len() > 1 {
			return Err(Self::command().error(
				ErrorKind::ArgumentConflict,
				"can't use -o with multiple filenames",
			));
		}

		Ok(())
	}
}
