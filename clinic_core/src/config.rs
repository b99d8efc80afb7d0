use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::ClinicError;
use crate::ClinicResult;
use crate::converters::ConverterRegistry;

/// Config file names searched for, in order.
pub const CONFIG_FILE_CANDIDATES: [&str; 3] =
	["clinic.toml", ".clinic.toml", ".config/clinic.toml"];

/// Extensions visited by `--make` when the config does not override them.
pub const DEFAULT_MAKE_EXTENSIONS: [&str; 3] = ["c", "cpp", "h"];

/// Configuration loaded from `clinic.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClinicConfig {
	/// Generate limited C API code for every file.
	#[serde(default)]
	pub limited_capi: bool,
	#[serde(default)]
	pub make: MakeConfig,
	/// Extra legacy converter names, e.g. `my_int = "int"`.
	#[serde(default)]
	pub converters: BTreeMap<String, ConverterAlias>,
}

/// Settings for the `--make` tree walk.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MakeConfig {
	/// Files to skip, relative to the source directory. Gitignore syntax.
	#[serde(default)]
	pub exclude: Vec<String>,
	/// File extensions to visit.
	#[serde(default = "default_make_extensions")]
	pub extensions: Vec<String>,
}

impl Default for MakeConfig {
	fn default() -> Self {
		Self {
			exclude: vec![],
			extensions: default_make_extensions(),
		}
	}
}

fn default_make_extensions() -> Vec<String> {
	DEFAULT_MAKE_EXTENSIONS
		.iter()
		.map(ToString::to_string)
		.collect()
}

/// A converter alias: either a bare converter name or a converter with preset
/// arguments.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ConverterAlias {
	Name(String),
	Preset {
		converter: String,
		#[serde(default)]
		args: String,
	},
}

impl ClinicConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if the file does not exist.
	pub fn load(root: &Path) -> ClinicResult<Option<ClinicConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)?;
		let config: ClinicConfig =
			toml::from_str(&content).map_err(|e| ClinicError::ConfigParse(e.to_string()))?;

		Ok(Some(config))
	}

	/// Add the `[converters]` aliases to `registry`.
	pub fn register_converters(&self, registry: &mut ConverterRegistry) -> ClinicResult<()> {
		for (name, alias) in &self.converters {
			let (converter, args) = match alias {
				ConverterAlias::Name(converter) => (converter.as_str(), ""),
				ConverterAlias::Preset { converter, args } => (converter.as_str(), args.as_str()),
			};

			registry
				.register_legacy(name, converter, args)
				.map_err(|e| ClinicError::ConfigParse(format!("converter alias `{name}`: {e}")))?;
		}

		Ok(())
	}
}
