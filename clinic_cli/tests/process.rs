mod common;

use clap::Parser;
use clinic_cli::ClinicCli;
use clinic_core::AnyEmptyResult;
use predicates::prelude::PredicateBooleanExt;
use rstest::rstest;
use similar_asserts::assert_eq;

#[test]
fn rewrites_file_once() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let path = tmp.path().join("posixmodule.c");
	std::fs::write(&path, common::GETPID_FILE)?;

	common::clinic_cmd().arg(&path).assert().success();
	let generated = std::fs::read_to_string(&path)?;
	assert!(generated.contains("#define OS_GETPID_METHODDEF"));
	assert!(generated.contains("/*[clinic end generated code: output="));

	common::clinic_cmd().arg(&path).assert().success();
	assert_eq!(std::fs::read_to_string(&path)?, generated);

	Ok(())
}

#[test]
fn failing_file_does_not_stop_others() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let broken = tmp.path().join("broken.c");
	let good = tmp.path().join("good.c");
	std::fs::write(&broken, common::BROKEN_FILE)?;
	std::fs::write(&good, common::GETPID_FILE)?;

	common::clinic_cmd()
		.arg(&broken)
		.arg(&good)
		.assert()
		.code(1)
		.stderr(predicates::str::contains("error:"))
		.stderr(predicates::str::contains("line 3: unknown converter `nope`"));

	assert_eq!(std::fs::read_to_string(&broken)?, common::BROKEN_FILE);
	assert!(std::fs::read_to_string(&good)?.contains("OS_GETPID_METHODDEF"));

	Ok(())
}

#[test]
fn edited_output_requires_force() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let path = tmp.path().join("posixmodule.c");
	std::fs::write(&path, common::GETPID_FILE)?;
	common::clinic_cmd().arg(&path).assert().success();

	let generated = std::fs::read_to_string(&path)?;
	let edited = generated.replace("METH_NOARGS", "METH_O");
	std::fs::write(&path, &edited)?;

	common::clinic_cmd()
		.arg(&path)
		.assert()
		.code(1)
		.stderr(predicates::str::contains("checksum mismatch"));
	assert_eq!(std::fs::read_to_string(&path)?, edited);

	common::clinic_cmd().arg("--force").arg(&path).assert().success();
	assert_eq!(std::fs::read_to_string(&path)?, generated);

	Ok(())
}

#[test]
fn output_redirects_the_write() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let path = tmp.path().join("posixmodule.c");
	let output = tmp.path().join("posixmodule.out.c");
	std::fs::write(&path, common::GETPID_FILE)?;

	common::clinic_cmd()
		.arg("-o")
		.arg(&output)
		.arg(&path)
		.assert()
		.success();

	assert_eq!(std::fs::read_to_string(&path)?, common::GETPID_FILE);
	assert!(std::fs::read_to_string(&output)?.contains("OS_GETPID_METHODDEF"));

	Ok(())
}

#[test]
fn limited_uses_format_strings() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let path = tmp.path().join("module.c");
	std::fs::write(
		&path,
		"/*[clinic input]\nmod.add\n    a: int\n    b: int = 0\n    /\n[clinic start generated \
		 code]*/\n",
	)?;

	common::clinic_cmd()
		.arg("--limited")
		.arg(&path)
		.assert()
		.success();

	let generated = std::fs::read_to_string(&path)?;
	assert!(generated.contains("PyArg_ParseTuple(args, \"i|i:add\", &a, &b)"));
	assert!(!generated.contains("METH_FASTCALL"));

	Ok(())
}

#[test]
fn verbose_prints_file_names() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let path = tmp.path().join("posixmodule.c");
	std::fs::write(&path, common::GETPID_FILE)?;

	common::clinic_cmd()
		.arg("--verbose")
		.arg(&path)
		.assert()
		.success()
		.stdout(predicates::str::contains("posixmodule.c"));

	Ok(())
}

#[test]
fn verbose_reports_diagnostics() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let path = tmp.path().join("broken.c");
	std::fs::write(&path, common::BROKEN_FILE)?;

	common::clinic_cmd()
		.arg("-v")
		.arg(&path)
		.assert()
		.code(1)
		.stderr(predicates::str::contains("unknown converter `nope`"))
		.stderr(predicates::str::starts_with("error:").not());

	Ok(())
}

#[test]
fn unknown_extension_fails() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let path = tmp.path().join("notes.txt");
	std::fs::write(&path, "")?;

	common::clinic_cmd()
		.arg(&path)
		.assert()
		.code(1)
		.stderr(predicates::str::contains("can't identify file type"));

	Ok(())
}

#[rstest]
#[case::no_files(&[])]
#[case::converters_with_files(&["--converters", "a.c"])]
#[case::make_with_files(&["--make", "a.c"])]
#[case::make_with_output(&["--make", "-o", "out.c"])]
#[case::converters_with_make(&["--converters", "--make"])]
fn usage_errors(#[case] args: &[&str]) {
	common::clinic_cmd().args(args).assert().code(2);
}

#[test]
fn output_with_several_files_is_a_usage_error() {
	common::clinic_cmd()
		.args(["-o", "out.c", "a.c", "b.c"])
		.assert()
		.code(2)
		.stderr(predicates::str::contains("can't use -o with multiple filenames"));
}

#[test]
fn parses_flags() {
	let cli = ClinicCli::parse_from([
		"clinic",
		"-f",
		"--limited",
		"--make",
		"--srcdir",
		"Modules",
		"--exclude",
		"a.c",
		"--exclude",
		"b.c",
	]);

	assert!(cli.force);
	assert!(cli.limited_capi);
	assert!(cli.make);
	assert_eq!(cli.srcdir, std::path::PathBuf::from("Modules"));
	assert_eq!(cli.exclude.len(), 2);
	assert!(cli.files.is_empty());
	assert!(cli.validate().is_ok());
}

#[test]
fn missing_file_reports_io_error() {
	common::clinic_cmd()
		.arg("does-not-exist.c")
		.assert()
		.code(1)
		.stderr(predicates::str::contains("does-not-exist.c").and(predicates::str::contains("error:")));
}
