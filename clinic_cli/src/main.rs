use std::path::Path;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use clap::Parser;
use clinic_cli::ClinicCli;
use clinic_core::ClinicError;
use clinic_core::ClinicOptions;
use clinic_core::ConverterRegistry;
use clinic_core::config::ClinicConfig;
use clinic_core::config::MakeConfig;
use clinic_core::parse_file;
use clinic_core::project::collect_sources;
use owo_colors::OwoColorize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

static USE_COLOR: AtomicBool = AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(Ordering::Relaxed)
}

fn main() {
	let args = ClinicCli::parse();
	if let Err(e) = args.validate() {
		e.exit();
	}

	// Respect the NO_COLOR env var.
	let use_color = std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, Ordering::Relaxed);
	}

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_tracing(args.verbose);

	let code = match run(&args) {
		Ok(true) => 0,
		Ok(false) => 1,
		Err(e) => {
			report(e, args.verbose);
			1
		}
	};

	process::exit(code);
}

/// Logs go to stderr. `RUST_LOG` wins over the defaults.
fn init_tracing(verbose: bool) {
	let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
	if verbose && std::env::var_os(EnvFilter::DEFAULT_ENV).is_none() {
		if let Ok(directive) = "clinic_core=debug".parse() {
			filter = filter.add_directive(directive);
		}
	}

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(color_enabled())
		.try_init()
		.ok();
}

/// Process every requested file. Returns `false` when any file failed.
fn run(args: &ClinicCli) -> Result<bool, ClinicError> {
	let root = if args.make {
		args.srcdir.as_path()
	} else {
		Path::new(".")
	};
	let config = ClinicConfig::load(root)?;

	let mut registry = ConverterRegistry::builtin();
	if let Some(config) = &config {
		config.register_converters(&mut registry)?;
	}

	if args.converters {
		print!("{}", registry.describe());
		return Ok(true);
	}

	let options = ClinicOptions {
		verify: !args.force,
		limited_capi: args.limited_capi || config.as_ref().is_some_and(|config| config.limited_capi),
	};

	let files = if args.make {
		let default_make = MakeConfig::default();
		let make = config.as_ref().map_or(&default_make, |config| &config.make);
		let files = collect_sources(&args.srcdir, &args.exclude, &make.exclude, &make.extensions)?;
		debug!(srcdir = %args.srcdir.display(), count = files.len(), "collected sources");
		files
	} else {
		args.files.clone()
	};

	let mut succeeded = true;
	for path in &files {
		if args.verbose {
			println!("{}", path.display());
		}

		if let Err(e) = parse_file(path, args.output.as_deref(), &registry, options) {
			report(e, args.verbose);
			succeeded = false;
		}
	}

	Ok(succeeded)
}

/// One line per failure, or the full miette report in verbose mode.
fn report(error: ClinicError, verbose: bool) {
	if verbose {
		let report = miette::Report::new(error);
		eprintln!("{report:?}");
	} else if color_enabled() {
		eprintln!("{} {error}", "error:".red());
	} else {
		eprintln!("error: {error}");
	}
}
