//! Converters translate one declared parameter or return type into C
//! declarations and parsing code.
//!
//! The [`ConverterRegistry`] maps converter names to constructors. It is
//! built once, optionally extended with custom registrations and legacy
//! aliases, and then shared by reference.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::fmt::Write;
use std::rc::Rc;

use derive_more::Deref;

use crate::ClinicError;
use crate::ClinicResult;
use crate::function::DefaultValue;
use crate::function::c_string_literal;

/// Type names accepted inside `accept={...}`.
pub const ACCEPT_TYPES: [&str; 4] = ["object", "int", "str", "NoneType"];

/// Keyword arguments every converter accepts.
pub const COMMON_KEYWORDS: [&str; 3] = ["c_default", "py_default", "annotation"];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConverterOptions {
	/// Overrides the C expression the variable is initialised with.
	pub c_default: Option<String>,
	/// Overrides the default shown in the docstring signature.
	pub py_default: Option<String>,
	/// Shown next to the parameter in the docstring.
	pub annotation: Option<String>,
}

/// Keyword arguments written inside a converter's parentheses.
#[derive(Clone, Debug, Default, Deref, PartialEq, Eq)]
pub struct ConverterArgs(BTreeMap<String, String>);

impl ConverterArgs {
	/// Parse the text between the parentheses of `conv(key=value, ...)`.
	pub fn parse(text: &str) -> ClinicResult<Self> {
		let mut args = BTreeMap::new();

		for piece in split_top_level(text) {
			let piece = piece.trim();
			if piece.is_empty() {
				continue;
			}

			let Some((key, value)) = piece.split_once('=') else {
				return Err(ClinicError::parse(format!(
					"converter arguments must be `key=value` pairs, got `{piece}`"
				)));
			};
			let key = key.trim();
			if !is_identifier(key) {
				return Err(ClinicError::parse(format!(
					"converter arguments must be `key=value` pairs, got `{piece}`"
				)));
			}

			let value = unquote_value(value.trim())?;
			if args.insert(key.to_string(), value).is_some() {
				return Err(ClinicError::parse(format!(
					"converter argument `{key}` given more than once"
				)));
			}
		}

		Ok(Self(args))
	}

	pub fn take(&mut self, key: &str) -> Option<String> {
		self.0.remove(key)
	}

	fn take_options(&mut self) -> ConverterOptions {
		ConverterOptions {
			c_default: self.take("c_default"),
			py_default: self.take("py_default"),
			annotation: self.take("annotation"),
		}
	}

	/// Fail on any argument the converter did not consume.
	fn finish(self, converter: &str) -> ClinicResult<()> {
		match self.0.keys().next() {
			Some(key) => {
				Err(ClinicError::parse(format!(
					"unknown argument `{key}` for converter `{converter}`"
				)))
			}
			None => Ok(()),
		}
	}
}

fn unquote_value(value: &str) -> ClinicResult<String> {
	let quoted = value.len() >= 2
		&& ((value.starts_with('"') && value.ends_with('"'))
			|| (value.starts_with('\'') && value.ends_with('\'')));

	if !quoted {
		return Ok(value.to_string());
	}

	snailquote::unescape(value)
		.map_err(|e| ClinicError::parse(format!("invalid string `{value}`: {e}")))
}

/// Split on commas that are not nested in brackets or quotes.
fn split_top_level(text: &str) -> Vec<&str> {
	let mut pieces = vec![];
	let mut depth = 0usize;
	let mut quote = None;
	let mut escaped = false;
	let mut start = 0;

	for (index, c) in text.char_indices() {
		if let Some(open) = quote {
			if escaped {
				escaped = false;
			} else if c == '\\' {
				escaped = true;
			} else if c == open {
				quote = None;
			}
			continue;
		}

		match c {
			'"' | '\'' => quote = Some(c),
			'(' | '[' | '{' => depth += 1,
			')' | ']' | '}' => depth = depth.saturating_sub(1),
			',' if depth == 0 => {
				pieces.push(&text[start..index]);
				start = index + 1;
			}
			_ => {}
		}
	}
	pieces.push(&text[start..]);

	pieces
}

pub(crate) fn is_identifier(text: &str) -> bool {
	let mut chars = text.chars();
	chars
		.next()
		.is_some_and(|c| c.is_alphabetic() || c == '_')
		&& chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Parse `{str, NoneType}` into its member names.
fn parse_accept(value: &str) -> ClinicResult<BTreeSet<String>> {
	let Some(inner) = value
		.trim()
		.strip_prefix('{')
		.and_then(|rest| rest.strip_suffix('}'))
	else {
		return Err(ClinicError::parse(format!(
			"`accept` must be a set such as `{{str, NoneType}}`, got `{value}`"
		)));
	};

	let mut names = BTreeSet::new();
	for name in inner.split(',').map(str::trim).filter(|name| !name.is_empty()) {
		if !ACCEPT_TYPES.contains(&name) {
			return Err(ClinicError::converter_not_found("type", name));
		}
		names.insert(name.to_string());
	}

	Ok(names)
}

fn accepts(names: &BTreeSet<String>, expected: &[&str]) -> bool {
	names.len() == expected.len() && expected.iter().all(|name| names.contains(*name))
}

/// Everything a converter needs to emit the code parsing one argument.
pub struct ArgContext<'a> {
	/// Python-visible function name used in error messages.
	pub function: &'a str,
	/// How the argument is described in error messages, e.g. `argument 1`.
	pub display: &'a str,
	/// C expression holding the incoming `PyObject *`.
	pub argument: &'a str,
	/// C variable receiving the converted value.
	pub c_name: &'a str,
}

pub trait Converter: fmt::Debug {
	/// The name the converter is registered under.
	fn name(&self) -> &str;

	/// C type of the variable holding the converted value.
	fn c_type(&self) -> &str;

	/// Format unit understood by the `PyArg_Parse*` family.
	fn format_unit(&self) -> &str;

	fn options(&self) -> &ConverterOptions;

	/// C expression for a Python default, or `None` when this converter
	/// cannot represent it.
	fn convert_default(&self, default: &DefaultValue) -> Option<String>;

	/// Statements converting `context.argument` into `context.c_name`,
	/// jumping to `exit` on failure.
	fn parse_arg(&self, context: &ArgContext<'_>) -> Vec<String>;

	fn is_pointer(&self) -> bool {
		self.c_type().ends_with('*')
	}

	/// Value used to initialise variables of optional groups.
	fn zero_value(&self) -> &'static str {
		if self.is_pointer() { "NULL" } else { "0" }
	}

	/// `type name` or `type name = value`, without the trailing semicolon.
	fn declaration(&self, c_name: &str, initializer: Option<&str>) -> String {
		let c_type = self.c_type();
		let mut declaration = if self.is_pointer() {
			format!("{c_type}{c_name}")
		} else {
			format!("{c_type} {c_name}")
		};

		if let Some(value) = initializer {
			let _ = write!(declaration, " = {value}");
		}

		declaration
	}

	/// Arguments passed to `PyArg_Parse*` after the format string.
	fn parse_arguments(&self, c_name: &str) -> Vec<String> {
		vec![format!("&{c_name}")]
	}

	/// C expression for the parameter's default value.
	fn render_default(&self, default: &DefaultValue) -> ClinicResult<String> {
		if let Some(c_default) = &self.options().c_default {
			return Ok(c_default.clone());
		}

		if matches!(default, DefaultValue::Null) && self.is_pointer() {
			return Ok("NULL".to_string());
		}

		if let DefaultValue::Expr(expression) = default {
			return Err(ClinicError::parse(format!(
				"when you specify an expression (`{expression}`) as your default value, you MUST \
				 specify a valid c_default"
			)));
		}

		self.convert_default(default).ok_or_else(|| {
			ClinicError::parse(format!(
				"the `{}` converter does not accept the default value `{default}`",
				self.name()
			))
		})
	}
}

fn check_failure(c_name: &str, sentinel: &str) -> Vec<String> {
	vec![
		format!("if ({c_name} == {sentinel} && PyErr_Occurred()) {{"),
		"    goto exit;".to_string(),
		"}".to_string(),
	]
}

fn bad_argument(context: &ArgContext<'_>, expected: &str) -> Vec<String> {
	vec![
		format!(
			"    _PyArg_BadArgument(\"{}\", \"{}\", \"{expected}\", {});",
			context.function, context.display, context.argument
		),
		"    goto exit;".to_string(),
	]
}

#[derive(Debug)]
struct ObjectConverter {
	c_type: String,
	subclass_of: Option<String>,
	options: ConverterOptions,
}

impl Converter for ObjectConverter {
	fn name(&self) -> &str {
		"object"
	}

	fn c_type(&self) -> &str {
		&self.c_type
	}

	fn format_unit(&self) -> &str {
		if self.subclass_of.is_some() { "O!" } else { "O" }
	}

	fn options(&self) -> &ConverterOptions {
		&self.options
	}

	fn convert_default(&self, default: &DefaultValue) -> Option<String> {
		matches!(default, DefaultValue::None).then(|| "Py_None".to_string())
	}

	fn parse_arguments(&self, c_name: &str) -> Vec<String> {
		match &self.subclass_of {
			Some(subclass_of) => vec![subclass_of.clone(), format!("&{c_name}")],
			None => vec![format!("&{c_name}")],
		}
	}

	fn parse_arg(&self, context: &ArgContext<'_>) -> Vec<String> {
		let mut lines = vec![];
		if let Some(subclass_of) = &self.subclass_of {
			lines.push(format!(
				"if (!PyObject_TypeCheck({}, {subclass_of})) {{",
				context.argument
			));
			lines.push(format!(
				"    _PyArg_BadArgument(\"{}\", \"{}\", ({subclass_of})->tp_name, {});",
				context.function, context.display, context.argument
			));
			lines.push("    goto exit;".to_string());
			lines.push("}".to_string());
		}

		if self.c_type == "PyObject *" {
			lines.push(format!("{} = {};", context.c_name, context.argument));
		} else {
			lines.push(format!(
				"{} = ({}){};",
				context.c_name, self.c_type, context.argument
			));
		}

		lines
	}
}

fn object_converter(
	options: ConverterOptions,
	args: &mut ConverterArgs,
) -> ClinicResult<Rc<dyn Converter>> {
	Ok(Rc::new(ObjectConverter {
		c_type: args.take("type").unwrap_or_else(|| "PyObject *".to_string()),
		subclass_of: args.take("subclass_of"),
		options,
	}))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IntegerKind {
	Int,
	Long,
	Ssize,
}

#[derive(Debug)]
struct IntegerConverter {
	kind: IntegerKind,
	options: ConverterOptions,
}

impl Converter for IntegerConverter {
	fn name(&self) -> &str {
		match self.kind {
			IntegerKind::Int => "int",
			IntegerKind::Long => "long",
			IntegerKind::Ssize => "Py_ssize_t",
		}
	}

	fn c_type(&self) -> &str {
		self.name()
	}

	fn format_unit(&self) -> &str {
		match self.kind {
			IntegerKind::Int => "i",
			IntegerKind::Long => "l",
			IntegerKind::Ssize => "n",
		}
	}

	fn options(&self) -> &ConverterOptions {
		&self.options
	}

	fn convert_default(&self, default: &DefaultValue) -> Option<String> {
		match default {
			DefaultValue::Int(text) => Some(text.clone()),
			DefaultValue::Bool(value) => Some(u8::from(*value).to_string()),
			_ => None,
		}
	}

	fn parse_arg(&self, context: &ArgContext<'_>) -> Vec<String> {
		let (c_name, argument) = (context.c_name, context.argument);
		match self.kind {
			IntegerKind::Int => {
				let mut lines = vec![format!("{c_name} = PyLong_AsInt({argument});")];
				lines.extend(check_failure(c_name, "-1"));
				lines
			}
			IntegerKind::Long => {
				let mut lines = vec![format!("{c_name} = PyLong_AsLong({argument});")];
				lines.extend(check_failure(c_name, "-1"));
				lines
			}
			IntegerKind::Ssize => {
				vec![
					"{".to_string(),
					"    Py_ssize_t ival = -1;".to_string(),
					format!("    PyObject *iobj = _PyNumber_Index({argument});"),
					"    if (iobj != NULL) {".to_string(),
					"        ival = PyLong_AsSsize_t(iobj);".to_string(),
					"        Py_DECREF(iobj);".to_string(),
					"    }".to_string(),
					"    if (ival == -1 && PyErr_Occurred()) {".to_string(),
					"        goto exit;".to_string(),
					"    }".to_string(),
					format!("    {c_name} = ival;"),
					"}".to_string(),
				]
			}
		}
	}
}

fn int_converter(
	options: ConverterOptions,
	_args: &mut ConverterArgs,
) -> ClinicResult<Rc<dyn Converter>> {
	Ok(Rc::new(IntegerConverter {
		kind: IntegerKind::Int,
		options,
	}))
}

fn long_converter(
	options: ConverterOptions,
	_args: &mut ConverterArgs,
) -> ClinicResult<Rc<dyn Converter>> {
	Ok(Rc::new(IntegerConverter {
		kind: IntegerKind::Long,
		options,
	}))
}

fn ssize_converter(
	options: ConverterOptions,
	_args: &mut ConverterArgs,
) -> ClinicResult<Rc<dyn Converter>> {
	Ok(Rc::new(IntegerConverter {
		kind: IntegerKind::Ssize,
		options,
	}))
}

#[derive(Debug)]
struct FloatingConverter {
	single: bool,
	options: ConverterOptions,
}

impl Converter for FloatingConverter {
	fn name(&self) -> &str {
		if self.single { "float" } else { "double" }
	}

	fn c_type(&self) -> &str {
		self.name()
	}

	fn format_unit(&self) -> &str {
		if self.single { "f" } else { "d" }
	}

	fn options(&self) -> &ConverterOptions {
		&self.options
	}

	fn convert_default(&self, default: &DefaultValue) -> Option<String> {
		match default {
			DefaultValue::Int(text) | DefaultValue::Float(text) => Some(text.clone()),
			_ => None,
		}
	}

	fn parse_arg(&self, context: &ArgContext<'_>) -> Vec<String> {
		let (c_name, argument) = (context.c_name, context.argument);
		let cast = if self.single { "(float) " } else { "" };
		vec![
			format!("if (PyFloat_CheckExact({argument})) {{"),
			format!("    {c_name} = {cast}(PyFloat_AS_DOUBLE({argument}));"),
			"}".to_string(),
			"else".to_string(),
			"{".to_string(),
			format!("    {c_name} = {cast}PyFloat_AsDouble({argument});"),
			format!("    if ({c_name} == -1.0 && PyErr_Occurred()) {{"),
			"        goto exit;".to_string(),
			"    }".to_string(),
			"}".to_string(),
		]
	}
}

fn double_converter(
	options: ConverterOptions,
	_args: &mut ConverterArgs,
) -> ClinicResult<Rc<dyn Converter>> {
	Ok(Rc::new(FloatingConverter {
		single: false,
		options,
	}))
}

fn float_converter(
	options: ConverterOptions,
	_args: &mut ConverterArgs,
) -> ClinicResult<Rc<dyn Converter>> {
	Ok(Rc::new(FloatingConverter {
		single: true,
		options,
	}))
}

#[derive(Debug)]
struct BoolConverter {
	accept_int: bool,
	options: ConverterOptions,
}

impl Converter for BoolConverter {
	fn name(&self) -> &str {
		"bool"
	}

	fn c_type(&self) -> &str {
		"int"
	}

	fn format_unit(&self) -> &str {
		if self.accept_int { "i" } else { "p" }
	}

	fn options(&self) -> &ConverterOptions {
		&self.options
	}

	fn convert_default(&self, default: &DefaultValue) -> Option<String> {
		match default {
			DefaultValue::Bool(value) => Some(u8::from(*value).to_string()),
			DefaultValue::Int(text) => Some(text.clone()),
			_ => None,
		}
	}

	fn parse_arg(&self, context: &ArgContext<'_>) -> Vec<String> {
		let (c_name, argument) = (context.c_name, context.argument);
		if self.accept_int {
			let mut lines = vec![format!("{c_name} = PyLong_AsInt({argument});")];
			lines.extend(check_failure(c_name, "-1"));
			lines
		} else {
			vec![
				format!("{c_name} = PyObject_IsTrue({argument});"),
				format!("if ({c_name} < 0) {{"),
				"    goto exit;".to_string(),
				"}".to_string(),
			]
		}
	}
}

fn bool_converter(
	options: ConverterOptions,
	args: &mut ConverterArgs,
) -> ClinicResult<Rc<dyn Converter>> {
	let accept_int = match args.take("accept") {
		None => false,
		Some(value) => {
			let names = parse_accept(&value)?;
			if accepts(&names, &["int"]) {
				true
			} else if accepts(&names, &["object"]) {
				false
			} else {
				return Err(ClinicError::parse(format!(
					"the `bool` converter does not support accept={value}"
				)));
			}
		}
	};

	Ok(Rc::new(BoolConverter {
		accept_int,
		options,
	}))
}

#[derive(Debug)]
struct StrConverter {
	nullable: bool,
	options: ConverterOptions,
}

impl Converter for StrConverter {
	fn name(&self) -> &str {
		"str"
	}

	fn c_type(&self) -> &str {
		"const char *"
	}

	fn format_unit(&self) -> &str {
		if self.nullable { "z" } else { "s" }
	}

	fn options(&self) -> &ConverterOptions {
		&self.options
	}

	fn convert_default(&self, default: &DefaultValue) -> Option<String> {
		match default {
			DefaultValue::Str(value) => Some(c_string_literal(value)),
			DefaultValue::None if self.nullable => Some("NULL".to_string()),
			_ => None,
		}
	}

	fn parse_arg(&self, context: &ArgContext<'_>) -> Vec<String> {
		let (c_name, argument) = (context.c_name, context.argument);
		let mut lines = vec![];
		let indent = if self.nullable {
			lines.push(format!("if ({argument} == Py_None) {{"));
			lines.push(format!("    {c_name} = NULL;"));
			lines.push("}".to_string());
			lines.push(format!("else if (PyUnicode_Check({argument})) {{"));
			"    "
		} else {
			lines.push(format!("if (!PyUnicode_Check({argument})) {{"));
			lines.extend(bad_argument(context, "str"));
			lines.push("}".to_string());
			""
		};

		lines.push(format!("{indent}Py_ssize_t {c_name}_length;"));
		lines.push(format!(
			"{indent}{c_name} = PyUnicode_AsUTF8AndSize({argument}, &{c_name}_length);"
		));
		lines.push(format!("{indent}if ({c_name} == NULL) {{"));
		lines.push(format!("{indent}    goto exit;"));
		lines.push(format!("{indent}}}"));
		lines.push(format!(
			"{indent}if (strlen({c_name}) != (size_t){c_name}_length) {{"
		));
		lines.push(format!(
			"{indent}    PyErr_SetString(PyExc_ValueError, \"embedded null character\");"
		));
		lines.push(format!("{indent}    goto exit;"));
		lines.push(format!("{indent}}}"));

		if self.nullable {
			lines.push("}".to_string());
			lines.push("else {".to_string());
			lines.extend(bad_argument(context, "str or None"));
			lines.push("}".to_string());
		}

		lines
	}
}

fn str_converter(
	options: ConverterOptions,
	args: &mut ConverterArgs,
) -> ClinicResult<Rc<dyn Converter>> {
	let nullable = match args.take("accept") {
		None => false,
		Some(value) => {
			let names = parse_accept(&value)?;
			if accepts(&names, &["str"]) {
				false
			} else if accepts(&names, &["str", "NoneType"]) {
				true
			} else {
				return Err(ClinicError::parse(format!(
					"the `str` converter does not support accept={value}"
				)));
			}
		}
	};

	Ok(Rc::new(StrConverter { nullable, options }))
}

#[derive(Debug)]
struct UnicodeConverter {
	options: ConverterOptions,
}

impl Converter for UnicodeConverter {
	fn name(&self) -> &str {
		"unicode"
	}

	fn c_type(&self) -> &str {
		"PyObject *"
	}

	fn format_unit(&self) -> &str {
		"U"
	}

	fn options(&self) -> &ConverterOptions {
		&self.options
	}

	fn convert_default(&self, _default: &DefaultValue) -> Option<String> {
		None
	}

	fn parse_arg(&self, context: &ArgContext<'_>) -> Vec<String> {
		let mut lines = vec![format!("if (!PyUnicode_Check({})) {{", context.argument)];
		lines.extend(bad_argument(context, "str"));
		lines.push("}".to_string());
		lines.push(format!("{} = {};", context.c_name, context.argument));
		lines
	}
}

fn unicode_converter(
	options: ConverterOptions,
	_args: &mut ConverterArgs,
) -> ClinicResult<Rc<dyn Converter>> {
	Ok(Rc::new(UnicodeConverter { options }))
}

pub trait ReturnConverter: fmt::Debug {
	fn name(&self) -> &str;

	/// C return type of the impl function.
	fn c_type(&self) -> &str;

	/// Statements turning `_return_value` into `return_value`. Empty when
	/// the impl returns the Python object itself.
	fn conversion(&self) -> Vec<String>;

	fn returns_object(&self) -> bool {
		self.conversion().is_empty()
	}
}

#[derive(Debug)]
struct ObjectReturnConverter;

impl ReturnConverter for ObjectReturnConverter {
	fn name(&self) -> &str {
		"object"
	}

	fn c_type(&self) -> &str {
		"PyObject *"
	}

	fn conversion(&self) -> Vec<String> {
		vec![]
	}
}

#[derive(Debug)]
struct ValueReturnConverter {
	name: &'static str,
	c_type: &'static str,
	error_value: &'static str,
	/// Expression building the Python object; `{}` is replaced by the value.
	build: &'static str,
}

impl ReturnConverter for ValueReturnConverter {
	fn name(&self) -> &str {
		self.name
	}

	fn c_type(&self) -> &str {
		self.c_type
	}

	fn conversion(&self) -> Vec<String> {
		vec![
			format!(
				"if ((_return_value == {}) && PyErr_Occurred()) {{",
				self.error_value
			),
			"    goto exit;".to_string(),
			"}".to_string(),
			format!(
				"return_value = {};",
				self.build.replace("{}", "_return_value")
			),
		]
	}
}

fn object_return_converter() -> Rc<dyn ReturnConverter> {
	Rc::new(ObjectReturnConverter)
}

fn int_return_converter() -> Rc<dyn ReturnConverter> {
	Rc::new(ValueReturnConverter {
		name: "int",
		c_type: "int",
		error_value: "-1",
		build: "PyLong_FromLong((long){})",
	})
}

fn long_return_converter() -> Rc<dyn ReturnConverter> {
	Rc::new(ValueReturnConverter {
		name: "long",
		c_type: "long",
		error_value: "-1",
		build: "PyLong_FromLong({})",
	})
}

fn ssize_return_converter() -> Rc<dyn ReturnConverter> {
	Rc::new(ValueReturnConverter {
		name: "Py_ssize_t",
		c_type: "Py_ssize_t",
		error_value: "-1",
		build: "PyLong_FromSsize_t({})",
	})
}

fn bool_return_converter() -> Rc<dyn ReturnConverter> {
	Rc::new(ValueReturnConverter {
		name: "bool",
		c_type: "int",
		error_value: "-1",
		build: "PyBool_FromLong((long){})",
	})
}

fn double_return_converter() -> Rc<dyn ReturnConverter> {
	Rc::new(ValueReturnConverter {
		name: "double",
		c_type: "double",
		error_value: "-1.0",
		build: "PyFloat_FromDouble({})",
	})
}

fn float_return_converter() -> Rc<dyn ReturnConverter> {
	Rc::new(ValueReturnConverter {
		name: "float",
		c_type: "float",
		error_value: "-1.0",
		build: "PyFloat_FromDouble((double){})",
	})
}

/// Builds a converter from its common options and the remaining keyword
/// arguments. Arguments the constructor does not take are reported by the
/// registry afterwards.
pub type ConverterConstructor =
	fn(ConverterOptions, &mut ConverterArgs) -> ClinicResult<Rc<dyn Converter>>;

pub type ReturnConverterConstructor = fn() -> Rc<dyn ReturnConverter>;

#[derive(Clone, Debug)]
pub struct ConverterEntry {
	pub name: String,
	/// Converter-specific keywords with the default shown by `--converters`.
	pub keywords: &'static [(&'static str, &'static str)],
	pub constructor: ConverterConstructor,
}

/// A format-unit style name standing for a converter with preset arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyConverter {
	pub name: String,
	pub converter: String,
	pub preset: String,
}

#[derive(Clone, Debug, Default)]
pub struct ConverterRegistry {
	converters: BTreeMap<String, ConverterEntry>,
	legacy: BTreeMap<String, LegacyConverter>,
	returns: BTreeMap<String, ReturnConverterConstructor>,
}

impl ConverterRegistry {
	/// An empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// A registry holding every built-in converter, legacy alias and return
	/// converter.
	pub fn builtin() -> Self {
		let mut registry = Self::new();

		registry.register(
			"object",
			&[("subclass_of", "None"), ("type", "None")],
			object_converter,
		);
		registry.register("int", &[], int_converter);
		registry.register("long", &[], long_converter);
		registry.register("Py_ssize_t", &[], ssize_converter);
		registry.register("bool", &[("accept", "{object}")], bool_converter);
		registry.register("double", &[], double_converter);
		registry.register("float", &[], float_converter);
		registry.register("str", &[("accept", "{str}")], str_converter);
		registry.register("unicode", &[], unicode_converter);

		for (alias, converter, preset) in [
			("O", "object", ""),
			("i", "int", ""),
			("l", "long", ""),
			("n", "Py_ssize_t", ""),
			("p", "bool", ""),
			("d", "double", ""),
			("f", "float", ""),
			("s", "str", ""),
			("U", "unicode", ""),
			("z", "str", "accept={str, NoneType}"),
		] {
			registry.legacy.insert(alias.to_string(), LegacyConverter {
				name: alias.to_string(),
				converter: converter.to_string(),
				preset: preset.to_string(),
			});
		}

		registry.register_return("object", object_return_converter);
		registry.register_return("int", int_return_converter);
		registry.register_return("long", long_return_converter);
		registry.register_return("Py_ssize_t", ssize_return_converter);
		registry.register_return("bool", bool_return_converter);
		registry.register_return("double", double_return_converter);
		registry.register_return("float", float_return_converter);

		registry
	}

	/// Register a converter, replacing any previous one with the same name.
	pub fn register(
		&mut self,
		name: &str,
		keywords: &'static [(&'static str, &'static str)],
		constructor: ConverterConstructor,
	) {
		self.converters.insert(name.to_string(), ConverterEntry {
			name: name.to_string(),
			keywords,
			constructor,
		});
	}

	/// Register `name` as shorthand for `converter(preset)`. The preset is
	/// validated immediately.
	pub fn register_legacy(&mut self, name: &str, converter: &str, preset: &str) -> ClinicResult<()> {
		let (converter, preset) = match self.legacy.get(converter) {
			Some(target) if preset.trim().is_empty() => {
				(target.converter.clone(), target.preset.clone())
			}
			Some(target) => (target.converter.clone(), preset.to_string()),
			None => (converter.to_string(), preset.to_string()),
		};

		self.build(&converter, &preset)?;
		self.legacy.insert(name.to_string(), LegacyConverter {
			name: name.to_string(),
			converter,
			preset,
		});

		Ok(())
	}

	pub fn register_return(&mut self, name: &str, constructor: ReturnConverterConstructor) {
		self.returns.insert(name.to_string(), constructor);
	}

	/// Resolve a converter name, following legacy aliases.
	pub fn lookup(&self, name: &str) -> ClinicResult<&ConverterEntry> {
		self.converters
			.get(name)
			.or_else(|| {
				self.legacy
					.get(name)
					.and_then(|legacy| self.converters.get(&legacy.converter))
			})
			.ok_or_else(|| ClinicError::converter_not_found("converter", name))
	}

	pub fn lookup_return(&self, name: &str) -> ClinicResult<Rc<dyn ReturnConverter>> {
		self.returns
			.get(name)
			.map(|constructor| constructor())
			.ok_or_else(|| ClinicError::converter_not_found("return converter", name))
	}

	/// Build a converter instance for one parameter. `args` is the text
	/// between the parentheses, if any were written.
	pub fn construct(&self, name: &str, args: Option<&str>) -> ClinicResult<Rc<dyn Converter>> {
		if let Some(legacy) = self.legacy.get(name) {
			if args.is_some_and(|args| !args.trim().is_empty()) {
				return Err(ClinicError::parse(format!(
					"legacy converter `{name}` does not take arguments"
				)));
			}

			return self.build(&legacy.converter, &legacy.preset);
		}

		self.build(name, args.unwrap_or_default())
	}

	fn build(&self, name: &str, args: &str) -> ClinicResult<Rc<dyn Converter>> {
		let entry = self.lookup(name)?;
		let mut args = ConverterArgs::parse(args)?;
		let options = args.take_options();
		let converter = (entry.constructor)(options, &mut args)?;
		args.finish(name)?;

		Ok(converter)
	}

	/// Human readable listing of every registered converter.
	pub fn describe(&self) -> String {
		let mut output = String::new();

		output.push_str("Legacy converters:\n");
		let legacy = self.legacy.keys().map(String::as_str).collect::<Vec<_>>();
		let _ = writeln!(output, "    {}", legacy.join(" "));
		output.push('\n');

		output.push_str("Converters:\n");
		for entry in self.converters.values() {
			let keywords = entry
				.keywords
				.iter()
				.map(|(keyword, default)| format!("{keyword}={default}"))
				.collect::<Vec<_>>();
			let _ = writeln!(output, "    {}({})", entry.name, keywords.join(", "));
		}
		output.push('\n');

		output.push_str("Return converters:\n");
		for name in self.returns.keys() {
			let _ = writeln!(output, "    {name}()");
		}
		output.push('\n');

		let common = COMMON_KEYWORDS
			.iter()
			.map(|keyword| format!("{keyword}=None"))
			.collect::<Vec<_>>();
		let _ = writeln!(
			output,
			"All converters also accept ({}).",
			common.join(", ")
		);

		output
	}
}
