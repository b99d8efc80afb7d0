mod common;

use clinic_core::AnyEmptyResult;

#[test]
fn lists_builtin_converters() {
	common::clinic_cmd()
		.arg("--converters")
		.assert()
		.success()
		.stdout(predicates::str::contains("Legacy converters:\n    O U d f i l n p s z\n"))
		.stdout(predicates::str::contains("    object(subclass_of=None, type=None)"))
		.stdout(predicates::str::contains("Return converters:"))
		.stdout(predicates::str::contains(
			"All converters also accept (c_default=None, py_default=None, annotation=None).",
		));
}

#[test]
fn lists_configured_aliases() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(
		tmp.path().join("clinic.toml"),
		"[converters]\npath_t = { converter = \"str\", args = \"accept={str, NoneType}\" }\n",
	)?;

	common::clinic_cmd()
		.current_dir(tmp.path())
		.arg("--converters")
		.assert()
		.success()
		.stdout(predicates::str::contains("    O U d f i l n p path_t s z\n"));

	Ok(())
}

#[test]
fn configured_alias_is_usable() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("clinic.toml"), "[converters]\nfd = \"int\"\n")?;
	std::fs::write(
		tmp.path().join("module.c"),
		"/*[clinic input]\nos.close\n    fd: fd\n    /\n[clinic start generated code]*/\n",
	)?;

	common::clinic_cmd()
		.current_dir(tmp.path())
		.arg("module.c")
		.assert()
		.success();

	let generated = std::fs::read_to_string(tmp.path().join("module.c"))?;
	assert!(generated.contains("fd = PyLong_AsInt(arg);"));

	Ok(())
}

#[test]
fn invalid_alias_fails() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("clinic.toml"), "[converters]\nbad = \"nope\"\n")?;

	common::clinic_cmd()
		.current_dir(tmp.path())
		.arg("--converters")
		.assert()
		.code(1)
		.stderr(predicates::str::contains("converter alias `bad`"));

	Ok(())
}
