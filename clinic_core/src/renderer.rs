//! Generates the C code that replaces a block's output.
//!
//! The output of one function is, in order: the docstring, the
//! `*_METHODDEF` macro, the impl prototype, the parser function and the impl
//! definition header. The user's impl body follows the end marker.

use std::collections::BTreeSet;

use crate::ClinicResult;
use crate::converters::ArgContext;
use crate::function::Function;
use crate::function::Parameter;
use crate::function::ParameterKind;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderOptions {
	/// Only use the limited C API.
	pub limited_capi: bool,
}

/// How the generated parser function receives its arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
	/// `METH_NOARGS`
	NoArgs,
	/// `METH_O`: a single required positional-only argument.
	SingleArg,
	/// `METH_VARARGS` with one `PyArg_ParseTuple` call per arity.
	OptionalGroups,
	/// `METH_FASTCALL` with inline conversions.
	Fastcall,
	/// `METH_VARARGS` with `PyArg_ParseTuple`.
	Varargs,
	/// `METH_VARARGS|METH_KEYWORDS` with `PyArg_ParseTupleAndKeywords`.
	VarargsKeywords,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Renderer {
	options: RenderOptions,
}

/// The pieces of a parser function body.
#[derive(Default)]
struct ParserBody {
	declarations: Vec<String>,
	statements: Vec<String>,
	cleanup: Vec<String>,
}

impl Renderer {
	pub fn new(options: RenderOptions) -> Self {
		Self { options }
	}

	pub fn strategy(&self, function: &Function) -> Strategy {
		let parameters = &function.parameters;

		if parameters.is_empty() {
			Strategy::NoArgs
		} else if function.has_groups() {
			Strategy::OptionalGroups
		} else if parameters.len() == 1
			&& parameters[0].is_positional_only()
			&& !parameters[0].is_optional()
		{
			Strategy::SingleArg
		} else if !self.options.limited_capi && parameters.iter().all(Parameter::is_positional_only)
		{
			Strategy::Fastcall
		} else if parameters.iter().any(|parameter| {
			matches!(
				parameter.kind,
				ParameterKind::PositionalOrKeyword | ParameterKind::KeywordOnly
			)
		}) {
			Strategy::VarargsKeywords
		} else {
			Strategy::Varargs
		}
	}

	/// Render the complete output for `function`.
	pub fn render(&self, function: &Function) -> ClinicResult<String> {
		let strategy = self.strategy(function);
		let sections = [
			render_docstring(function),
			self.render_methoddef(function, strategy),
			format!("{};", impl_signature(function)),
			self.render_parser(function, strategy)?,
			impl_signature(function),
		];

		Ok(sections.join("\n\n") + "\n")
	}

	fn render_methoddef(&self, function: &Function, strategy: Strategy) -> String {
		let c_basename = function.c_basename();
		let (cast, flags) = match strategy {
			Strategy::NoArgs => (format!("(PyCFunction){c_basename}"), "METH_NOARGS"),
			Strategy::SingleArg => (format!("(PyCFunction){c_basename}"), "METH_O"),
			Strategy::OptionalGroups | Strategy::Varargs => {
				(format!("(PyCFunction){c_basename}"), "METH_VARARGS")
			}
			Strategy::VarargsKeywords if self.options.limited_capi => {
				(
					format!("(PyCFunction)(void(*)(void)){c_basename}"),
					"METH_VARARGS|METH_KEYWORDS",
				)
			}
			Strategy::VarargsKeywords => {
				(
					format!("_PyCFunction_CAST({c_basename})"),
					"METH_VARARGS|METH_KEYWORDS",
				)
			}
			Strategy::Fastcall => (format!("_PyCFunction_CAST({c_basename})"), "METH_FASTCALL"),
		};

		format!(
			"#define {}_METHODDEF    \\\n    {{\"{}\", {cast}, {flags}, {c_basename}__doc__}},",
			c_basename.to_uppercase(),
			function.name
		)
	}

	fn render_parser(&self, function: &Function, strategy: Strategy) -> ClinicResult<String> {
		let c_basename = function.c_basename();
		let mut body = ParserBody::default();

		let arguments = match strategy {
			Strategy::NoArgs => {
				if function.return_converter.returns_object() {
					return Ok(format!(
						"static PyObject *\n{c_basename}(PyObject *module, PyObject \
						 *Py_UNUSED(ignored))\n{{\n    return {};\n}}",
						impl_call(function)
					));
				}
				"PyObject *module, PyObject *Py_UNUSED(ignored)"
			}
			Strategy::SingleArg => {
				self.parse_single_arg(function, &mut body);
				"PyObject *module, PyObject *arg"
			}
			Strategy::OptionalGroups => {
				self.parse_optional_groups(function, &mut body)?;
				"PyObject *module, PyObject *args"
			}
			Strategy::Fastcall => {
				parse_fastcall(function, &mut body)?;
				"PyObject *module, PyObject *const *args, Py_ssize_t nargs"
			}
			Strategy::Varargs => {
				parse_format_string(function, &mut body, false)?;
				"PyObject *module, PyObject *args"
			}
			Strategy::VarargsKeywords => {
				parse_format_string(function, &mut body, true)?;
				"PyObject *module, PyObject *args, PyObject *kwargs"
			}
		};

		let return_converter = &function.return_converter;
		let conversion = return_converter.conversion();
		if conversion.is_empty() {
			body.statements
				.push(format!("return_value = {};", impl_call(function)));
		} else {
			body.declarations
				.push(format!("{} _return_value", return_converter.c_type()));
			body.statements
				.push(format!("_return_value = {};", impl_call(function)));
			body.statements.extend(conversion);
		}

		let uses_exit = body
			.statements
			.iter()
			.any(|line| line.contains("goto exit;"));

		let mut lines = vec![
			"static PyObject *".to_string(),
			format!("{c_basename}({arguments})"),
			"{".to_string(),
			"    PyObject *return_value = NULL;".to_string(),
		];
		lines.extend(
			body.declarations
				.iter()
				.map(|declaration| format!("    {declaration};")),
		);
		lines.push(String::new());
		lines.extend(body.statements.iter().map(|line| indent(line)));
		lines.push(String::new());
		if uses_exit {
			lines.push("exit:".to_string());
		}
		lines.extend(body.cleanup.iter().map(|line| indent(line)));
		lines.push("    return return_value;".to_string());
		lines.push("}".to_string());

		Ok(lines.join("\n"))
	}

	fn parse_single_arg(&self, function: &Function, body: &mut ParserBody) {
		let parameter = &function.parameters[0];
		let c_name = parameter.c_name();
		let converter = &parameter.converter;
		body.declarations.push(converter.declaration(&c_name, None));

		if self.options.limited_capi && converter.format_unit() != "O" {
			body.statements.push(format!(
				"if (!PyArg_Parse(arg, \"{}:{}\", {})) {{",
				converter.format_unit(),
				function.name,
				converter.parse_arguments(&c_name).join(", ")
			));
			body.statements.push("    goto exit;".to_string());
			body.statements.push("}".to_string());
		} else {
			body.statements.extend(converter.parse_arg(&ArgContext {
				function: &function.name,
				display: "argument",
				argument: "arg",
				c_name: &c_name,
			}));
		}
	}

	fn parse_optional_groups(&self, function: &Function, body: &mut ParserBody) -> ClinicResult<()> {
		let mut current = 0;
		for parameter in &function.parameters {
			if parameter.group != 0 && parameter.group != current {
				body.declarations
					.push(format!("int {} = 0", group_flag(parameter.group)));
			}
			current = parameter.group;

			let c_name = parameter.c_name();
			let declaration = if parameter.group == 0 {
				parameter.converter.declaration(&c_name, None)
			} else {
				parameter
					.converter
					.declaration(&c_name, Some(parameter.converter.zero_value()))
			};
			body.declarations.push(declaration);
		}

		let arities = function.arities()?;
		let size = if self.options.limited_capi {
			"PyTuple_Size"
		} else {
			"PyTuple_GET_SIZE"
		};
		let statements = &mut body.statements;
		statements.push(format!("switch ({size}(args)) {{"));

		for arity in &arities {
			statements.push(format!("    case {}:", arity.len()));
			if !arity.is_empty() {
				let units = arity
					.iter()
					.map(|parameter| parameter.converter.format_unit())
					.collect::<String>();
				let addresses = arity
					.iter()
					.flat_map(|parameter| parameter.converter.parse_arguments(&parameter.c_name()))
					.collect::<Vec<_>>();
				statements.push(format!(
					"        if (!PyArg_ParseTuple(args, \"{units}:{}\", {})) {{",
					function.name,
					addresses.join(", ")
				));
				statements.push("            goto exit;".to_string());
				statements.push("        }".to_string());
			}

			let groups = arity
				.iter()
				.map(|parameter| parameter.group)
				.filter(|group| *group != 0)
				.collect::<BTreeSet<_>>();
			for group in groups {
				statements.push(format!("        {} = 1;", group_flag(group)));
			}
			statements.push("        break;".to_string());
		}

		let minimum = arities.first().map_or(0, Vec::len);
		let maximum = arities.last().map_or(0, Vec::len);
		statements.push("    default:".to_string());
		statements.push(format!(
			"        PyErr_SetString(PyExc_TypeError, \"{} requires {minimum} to {maximum} \
			 arguments\");",
			function.full_name
		));
		statements.push("        goto exit;".to_string());
		statements.push("}".to_string());

		Ok(())
	}
}

fn parse_fastcall(function: &Function, body: &mut ParserBody) -> ClinicResult<()> {
	let parameters = &function.parameters;
	let required = parameters
		.iter()
		.filter(|parameter| !parameter.is_optional())
		.count();

	body.statements.push(format!(
		"if (!_PyArg_CheckPositional(\"{}\", nargs, {required}, {})) {{",
		function.name,
		parameters.len()
	));
	body.statements.push("    goto exit;".to_string());
	body.statements.push("}".to_string());

	for (index, parameter) in parameters.iter().enumerate() {
		let c_name = parameter.c_name();
		let c_default = parameter.c_default()?;
		body.declarations.push(
			parameter
				.converter
				.declaration(&c_name, c_default.as_deref()),
		);

		if parameter.is_optional() {
			body.statements.push(format!("if (nargs < {}) {{", index + 1));
			body.statements.push("    goto skip_optional;".to_string());
			body.statements.push("}".to_string());
		}

		let argument = format!("args[{index}]");
		let display = format!("argument {}", index + 1);
		body.statements.extend(parameter.converter.parse_arg(&ArgContext {
			function: &function.name,
			display: &display,
			argument: &argument,
			c_name: &c_name,
		}));
	}

	if parameters.iter().any(Parameter::is_optional) {
		body.statements.push("skip_optional:".to_string());
	}

	Ok(())
}

fn parse_format_string(
	function: &Function,
	body: &mut ParserBody,
	keywords: bool,
) -> ClinicResult<()> {
	let fixed = function
		.parameters
		.iter()
		.filter(|parameter| !parameter.is_vararg())
		.collect::<Vec<_>>();
	let vararg = function.parameters.iter().find(|parameter| parameter.is_vararg());

	if keywords {
		let names = fixed
			.iter()
			.map(|parameter| {
				if parameter.is_positional_only() {
					"\"\"".to_string()
				} else {
					format!("\"{}\"", parameter.name)
				}
			})
			.collect::<Vec<_>>();
		body.declarations.push(format!(
			"static char *_keywords[] = {{{}, NULL}}",
			names.join(", ")
		));
	}

	for parameter in &fixed {
		let c_default = parameter.c_default()?;
		body.declarations.push(
			parameter
				.converter
				.declaration(&parameter.c_name(), c_default.as_deref()),
		);
	}

	let mut source = "args";
	if let Some(vararg) = vararg {
		let positional = fixed
			.iter()
			.filter(|parameter| !parameter.is_keyword_only())
			.count();
		let c_name = vararg.c_name();
		body.declarations.push("PyObject *fastargs = NULL".to_string());
		body.declarations.push(format!("PyObject *{c_name} = NULL"));
		body.statements
			.push(format!("fastargs = PyTuple_GetSlice(args, 0, {positional});"));
		body.statements.push("if (fastargs == NULL) {".to_string());
		body.statements.push("    goto exit;".to_string());
		body.statements.push("}".to_string());
		body.cleanup.push("/* Cleanup for fastargs */".to_string());
		body.cleanup.push("Py_XDECREF(fastargs);".to_string());
		body.cleanup.push(format!("/* Cleanup for {} */", vararg.name));
		body.cleanup.push(format!("Py_XDECREF({c_name});"));
		source = "fastargs";
	}

	let format = format_string(function, &fixed);
	let addresses = fixed
		.iter()
		.flat_map(|parameter| parameter.converter.parse_arguments(&parameter.c_name()))
		.collect::<Vec<_>>();

	if keywords {
		if addresses.is_empty() {
			body.statements.push(format!(
				"if (!PyArg_ParseTupleAndKeywords({source}, kwargs, \"{format}\", _keywords)) {{"
			));
		} else {
			body.statements.push(format!(
				"if (!PyArg_ParseTupleAndKeywords({source}, kwargs, \"{format}\", _keywords,"
			));
			body.statements
				.push(format!("    {})) {{", addresses.join(", ")));
		}
	} else if addresses.is_empty() {
		body.statements
			.push(format!("if (!PyArg_ParseTuple({source}, \"{format}\")) {{"));
	} else {
		body.statements.push(format!(
			"if (!PyArg_ParseTuple({source}, \"{format}\", {})) {{",
			addresses.join(", ")
		));
	}
	body.statements.push("    goto exit;".to_string());
	body.statements.push("}".to_string());

	if let Some(vararg) = vararg {
		let positional = fixed
			.iter()
			.filter(|parameter| !parameter.is_keyword_only())
			.count();
		let c_name = vararg.c_name();
		body.statements.push(format!(
			"{c_name} = PyTuple_GetSlice(args, {positional}, PY_SSIZE_T_MAX);"
		));
		body.statements.push(format!("if ({c_name} == NULL) {{"));
		body.statements.push("    goto exit;".to_string());
		body.statements.push("}".to_string());
	}

	Ok(())
}

/// `PyArg_Parse*` format string: `|` before the first optional parameter, `$`
/// before the first keyword-only one.
fn format_string(function: &Function, parameters: &[&Parameter]) -> String {
	let mut format = String::new();
	let mut optional = false;
	let mut keyword_only = false;

	for parameter in parameters {
		if parameter.is_keyword_only() && !keyword_only {
			if !optional {
				format.push('|');
				optional = true;
			}
			format.push('$');
			keyword_only = true;
		} else if parameter.is_optional() && !optional {
			format.push('|');
			optional = true;
		}
		format.push_str(parameter.converter.format_unit());
	}

	format.push(':');
	format.push_str(&function.name);

	format
}

fn group_flag(group: i32) -> String {
	if group < 0 {
		format!("group_left_{}", -group)
	} else {
		format!("group_right_{group}")
	}
}

/// C names passed to the impl, with group flags ahead of each group.
fn impl_arguments(function: &Function) -> Vec<String> {
	let mut arguments = vec![];
	let mut current = 0;

	for parameter in &function.parameters {
		if parameter.group != 0 && parameter.group != current {
			arguments.push((None, group_flag(parameter.group)));
		}
		current = parameter.group;
		arguments.push((Some(parameter), parameter.c_name()));
	}

	arguments
		.into_iter()
		.map(|(parameter, name)| {
			match parameter {
				Some(parameter) => parameter.converter.declaration(&name, None),
				None => format!("int {name}"),
			}
		})
		.collect()
}

fn impl_signature(function: &Function) -> String {
	let mut parameters = vec!["PyObject *module".to_string()];
	parameters.extend(impl_arguments(function));

	format!(
		"static {}\n{}_impl({})",
		function.return_converter.c_type(),
		function.c_basename(),
		parameters.join(", ")
	)
}

fn impl_call(function: &Function) -> String {
	let mut arguments = vec!["module".to_string()];
	let mut current = 0;
	for parameter in &function.parameters {
		if parameter.group != 0 && parameter.group != current {
			arguments.push(group_flag(parameter.group));
		}
		current = parameter.group;
		arguments.push(parameter.c_name());
	}

	format!("{}_impl({})", function.c_basename(), arguments.join(", "))
}

/// Indent a statement by one level. Labels stay in the first column.
fn indent(line: &str) -> String {
	if line.is_empty() || (line.ends_with(':') && !line.contains(' ')) {
		line.to_string()
	} else {
		format!("    {line}")
	}
}

/// The Python-visible signature, e.g. `stat($module, /, path, *,
/// dir_fd=None)`.
pub fn signature(function: &Function) -> String {
	if function.has_groups() {
		return group_signature(function);
	}

	let parameters = &function.parameters;
	let mut parts = vec!["$module".to_string()];
	if !parameters.iter().any(Parameter::is_positional_only) {
		parts.push("/".to_string());
	}

	let mut star = false;
	for (index, parameter) in parameters.iter().enumerate() {
		match parameter.kind {
			ParameterKind::VarPositional => {
				parts.push(format!("*{}", parameter.name));
				star = true;
			}
			ParameterKind::KeywordOnly => {
				if !star {
					parts.push("*".to_string());
					star = true;
				}
				parts.push(parameter_text(parameter));
			}
			ParameterKind::PositionalOnly | ParameterKind::PositionalOrKeyword => {
				parts.push(parameter_text(parameter));
			}
		}

		let next_positional_only = parameters
			.get(index + 1)
			.is_some_and(Parameter::is_positional_only);
		if parameter.is_positional_only() && !next_positional_only {
			parts.push("/".to_string());
		}
	}

	format!("{}({})", function.name, parts.join(", "))
}

fn parameter_text(parameter: &Parameter) -> String {
	match parameter.py_default() {
		Some(default) => format!("{}={default}", parameter.name),
		None => parameter.name.clone(),
	}
}

/// Bracketed signature of a function with optional groups, e.g.
/// `addch([y, x,] ch, [attr])`.
fn group_signature(function: &Function) -> String {
	let mut text = String::new();
	let mut depth = 0;
	let mut first = true;

	for parameter in &function.parameters {
		let target = parameter.group.unsigned_abs() as usize;

		if parameter.group <= 0 {
			if first {
				text.push_str(&"[".repeat(target));
			} else if target < depth {
				text.push_str(&"]".repeat(depth - target));
				text.push(' ');
			} else {
				text.push(' ');
			}
			text.push_str(&parameter.name);
			if parameter.group < 0 {
				text.push(',');
			}
		} else {
			if !first {
				text.push_str(", ");
			}
			text.push_str(&"[".repeat(target.saturating_sub(depth)));
			text.push_str(&parameter.name);
		}

		depth = target;
		first = false;
	}
	text.push_str(&"]".repeat(depth));

	format!("{}({text})", function.name)
}

fn render_docstring(function: &Function) -> String {
	let mut text = signature(function);
	text.push('\n');
	if !function.has_groups() {
		text.push_str("--\n\n");
	}

	let (summary, rest) = match function.docstring.split_once("\n\n") {
		Some((summary, rest)) => (summary, Some(rest)),
		None => (function.docstring.as_str(), None),
	};
	text.push_str(summary);

	let documented = function
		.parameters
		.iter()
		.filter(|parameter| {
			!parameter.docstring.is_empty() || parameter.converter.options().annotation.is_some()
		})
		.collect::<Vec<_>>();
	if !documented.is_empty() {
		text.push_str("\n\n");
		let mut section = vec![];
		for parameter in documented {
			match &parameter.converter.options().annotation {
				Some(annotation) => section.push(format!("  {}: {annotation}", parameter.name)),
				None => section.push(format!("  {}", parameter.name)),
			}
			for line in parameter.docstring.lines() {
				if line.is_empty() {
					section.push(String::new());
				} else {
					section.push(format!("    {line}"));
				}
			}
		}
		text.push_str(&section.join("\n"));
	}

	if let Some(rest) = rest {
		text.push_str("\n\n");
		text.push_str(rest);
	}

	let literal = text
		.split_inclusive('\n')
		.map(|line| {
			let escaped = line
				.replace('\\', "\\\\")
				.replace('"', "\\\"")
				.replace('\n', "\\n");
			format!("\"{escaped}\"")
		})
		.collect::<Vec<_>>();

	format!(
		"PyDoc_STRVAR({}__doc__,\n{});",
		function.c_basename(),
		literal.join("\n")
	)
}
