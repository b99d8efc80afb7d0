use std::fmt;
use std::rc::Rc;

use crate::ClinicResult;
use crate::converters::Converter;
use crate::converters::ReturnConverter;
use crate::option_groups::permute_optional_groups;

/// Prefix given to parameter names that clash with locals of the generated
/// parser function.
pub const CLINIC_PREFIX: &str = "__clinic_";

/// Parameter names that clash with locals of the generated parser function.
pub const CLINIC_PREFIXED_ARGS: [&str; 13] = [
	"_keywords",
	"_parser",
	"arg",
	"args",
	"argsbuf",
	"fastargs",
	"kwargs",
	"kwnames",
	"module",
	"nargs",
	"noptargs",
	"return_value",
	"skip_optional",
];

const C_KEYWORDS: [&str; 36] = [
	"asm", "auto", "break", "case", "char", "const", "continue", "default", "do", "double",
	"else", "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
	"restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef",
	"typeof", "union", "unsigned", "void", "volatile", "while",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterKind {
	PositionalOnly,
	PositionalOrKeyword,
	KeywordOnly,
	VarPositional,
}

/// A default value written after `=` on a parameter line.
#[derive(Clone, Debug, PartialEq)]
pub enum DefaultValue {
	None,
	Bool(bool),
	/// Integer literal, kept as written.
	Int(String),
	/// Float literal, kept as written.
	Float(String),
	/// Unescaped contents of a string literal.
	Str(String),
	/// `NULL`: the parameter is optional but has no Python-level default.
	Null,
	/// Any other expression. Only usable together with an explicit
	/// `c_default`.
	Expr(String),
}

impl DefaultValue {
	/// Classify the text of a default expression.
	pub fn classify(text: &str) -> Self {
		let text = text.trim();

		match text {
			"None" => return Self::None,
			"True" => return Self::Bool(true),
			"False" => return Self::Bool(false),
			"NULL" => return Self::Null,
			_ => {}
		}

		if let Some(value) = unquote(text) {
			return Self::Str(value);
		}

		if is_int_literal(text) {
			return Self::Int(text.to_string());
		}

		if is_float_literal(text) {
			return Self::Float(text.to_string());
		}

		Self::Expr(text.to_string())
	}

	/// The default as it appears in the Python-visible signature.
	pub fn py_repr(&self) -> String {
		match self {
			Self::None => "None".to_string(),
			Self::Bool(true) => "True".to_string(),
			Self::Bool(false) => "False".to_string(),
			Self::Int(text) | Self::Float(text) | Self::Expr(text) => text.clone(),
			Self::Str(value) => python_string_repr(value),
			Self::Null => "<unrepresentable>".to_string(),
		}
	}
}

impl fmt::Display for DefaultValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.py_repr())
	}
}

fn unquote(text: &str) -> Option<String> {
	let quote = text.chars().next().filter(|c| *c == '"' || *c == '\'')?;
	if text.len() < 2 || !text.ends_with(quote) {
		return None;
	}

	snailquote::unescape(text).ok()
}

fn is_int_literal(text: &str) -> bool {
	let digits = text.strip_prefix('-').unwrap_or(text);
	if let Some(hex) = digits
		.strip_prefix("0x")
		.or_else(|| digits.strip_prefix("0X"))
	{
		return !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit());
	}

	!digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_float_literal(text: &str) -> bool {
	let digits = text.strip_prefix('-').unwrap_or(text);
	digits.starts_with(|c: char| c.is_ascii_digit() || c == '.')
		&& digits
			.chars()
			.all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
		&& digits.parse::<f64>().is_ok()
}

/// Python's `repr()` of a string: single quoted unless the value contains a
/// single quote and no double quote.
pub fn python_string_repr(value: &str) -> String {
	let quote = if value.contains('\'') && !value.contains('"') {
		'"'
	} else {
		'\''
	};
	let mut repr = String::with_capacity(value.len() + 2);
	repr.push(quote);
	for c in value.chars() {
		match c {
			'\\' => repr.push_str("\\\\"),
			'\n' => repr.push_str("\\n"),
			'\t' => repr.push_str("\\t"),
			'\r' => repr.push_str("\\r"),
			c if c == quote => {
				repr.push('\\');
				repr.push(c);
			}
			c => repr.push(c),
		}
	}
	repr.push(quote);

	repr
}

/// A C string literal holding `value`.
pub fn c_string_literal(value: &str) -> String {
	let mut literal = String::with_capacity(value.len() + 2);
	literal.push('"');
	for c in value.chars() {
		match c {
			'\\' => literal.push_str("\\\\"),
			'"' => literal.push_str("\\\""),
			'\n' => literal.push_str("\\n"),
			'\t' => literal.push_str("\\t"),
			'\r' => literal.push_str("\\r"),
			c => literal.push(c),
		}
	}
	literal.push('"');

	literal
}

#[derive(Clone, Debug)]
pub struct Parameter {
	pub name: String,
	pub converter: Rc<dyn Converter>,
	pub default: Option<DefaultValue>,
	pub kind: ParameterKind,
	/// 0 for required parameters, `-depth` inside left groups and `depth`
	/// inside right groups.
	pub group: i32,
	pub docstring: String,
	pub line: usize,
}

impl Parameter {
	/// Name of the C variable holding the parsed value.
	pub fn c_name(&self) -> String {
		if CLINIC_PREFIXED_ARGS.contains(&self.name.as_str()) {
			format!("{CLINIC_PREFIX}{}", self.name)
		} else if C_KEYWORDS.contains(&self.name.as_str()) {
			format!("{}_value", self.name)
		} else {
			self.name.clone()
		}
	}

	pub fn is_optional(&self) -> bool {
		self.default.is_some()
	}

	pub fn is_positional_only(&self) -> bool {
		self.kind == ParameterKind::PositionalOnly
	}

	pub fn is_keyword_only(&self) -> bool {
		self.kind == ParameterKind::KeywordOnly
	}

	pub fn is_vararg(&self) -> bool {
		self.kind == ParameterKind::VarPositional
	}

	/// The C default the variable is initialised with, if any.
	pub fn c_default(&self) -> ClinicResult<Option<String>> {
		let Some(default) = &self.default else {
			return Ok(None);
		};

		self.converter
			.render_default(default)
			.map(Some)
			.map_err(|e| e.at_line(self.line))
	}

	/// The default as it appears in the docstring signature.
	pub fn py_default(&self) -> Option<String> {
		let default = self.default.as_ref()?;
		Some(
			self.converter
				.options()
				.py_default
				.clone()
				.unwrap_or_else(|| default.py_repr()),
		)
	}
}

#[derive(Clone, Debug)]
pub struct Function {
	pub module: Option<String>,
	pub name: String,
	pub full_name: String,
	pub parameters: Vec<Parameter>,
	pub return_converter: Rc<dyn ReturnConverter>,
	pub docstring: String,
	pub line: usize,
}

/// Parameters of a grouped function split into left groups, the required
/// block and right groups. Each group list is in declaration order.
pub struct GroupLayout<'a> {
	pub left: Vec<Vec<&'a Parameter>>,
	pub required: Vec<&'a Parameter>,
	pub right: Vec<Vec<&'a Parameter>>,
}

impl Function {
	/// Base name for the generated C symbols: the full name with dots
	/// replaced by underscores.
	pub fn c_basename(&self) -> String {
		self.full_name.replace('.', "_")
	}

	pub fn has_groups(&self) -> bool {
		self.parameters.iter().any(|parameter| parameter.group != 0)
	}

	pub fn group_layout(&self) -> GroupLayout<'_> {
		let mut layout = GroupLayout {
			left: vec![],
			required: vec![],
			right: vec![],
		};
		let mut current = 0;

		for parameter in &self.parameters {
			let groups = match parameter.group {
				0 => {
					layout.required.push(parameter);
					current = 0;
					continue;
				}
				group if group < 0 => &mut layout.left,
				_ => &mut layout.right,
			};

			if current != parameter.group || groups.is_empty() {
				groups.push(vec![]);
			}
			current = parameter.group;

			if let Some(group) = groups.last_mut() {
				group.push(parameter);
			}
		}

		layout
	}

	/// Every argument list the function accepts, shortest first.
	pub fn arities(&self) -> ClinicResult<Vec<Vec<&Parameter>>> {
		let layout = self.group_layout();
		permute_optional_groups(&layout.left, &layout.required, &layout.right)
			.map_err(|e| e.at_line(self.line))
	}
}
