use std::collections::HashMap;
use std::collections::HashSet;

use tracing::debug;

use crate::ClinicError;
use crate::ClinicResult;
use crate::converters::ConverterRegistry;
use crate::converters::is_identifier;
use crate::function::DefaultValue;
use crate::function::Function;
use crate::function::Parameter;
use crate::function::ParameterKind;
use crate::lexer::tokenize;
use crate::tokens::TokenKind;

/// One meaningful line of the parameter section.
enum Item {
	Parameter(Parameter),
	Slash(usize),
	Star(usize),
	Open(usize),
	Close(usize),
}

/// The parsed function declaration line.
struct Header<'a> {
	full_name: &'a str,
	clone_from: Option<&'a str>,
	return_converter: Option<(&'a str, Option<&'a str>)>,
	line: usize,
}

/// Parses the input of `clinic` blocks into [`Function`]s.
///
/// A parser is used for a single file: functions parsed earlier are
/// remembered so later blocks can clone them.
pub struct DslParser<'r> {
	registry: &'r ConverterRegistry,
	functions: HashMap<String, Function>,
}

impl<'r> DslParser<'r> {
	pub fn new(registry: &'r ConverterRegistry) -> Self {
		Self {
			registry,
			functions: HashMap::new(),
		}
	}

	/// Parse one block of DSL input. `first_line` is the file line number of
	/// the first input line.
	pub fn parse(&mut self, input: &str, first_line: usize) -> ClinicResult<Function> {
		let mut header = None;
		let mut items: Vec<Item> = vec![];
		let mut names = HashSet::new();
		let mut parameter_indent = None;
		let mut docstring_indent = None;
		let mut docstring: Vec<&str> = vec![];
		let mut in_docstring = false;

		for (index, raw) in input.lines().enumerate() {
			let line_number = first_line + index;
			if raw.contains('\t') {
				return Err(ClinicError::parse("tab characters are not allowed in clinic input")
					.at_line(line_number));
			}

			let line = raw.trim_end();
			let stripped = line.trim_start();
			if stripped.starts_with('#') {
				continue;
			}

			if in_docstring {
				docstring.push(line);
				continue;
			}

			if header.is_none() {
				if stripped.is_empty() {
					continue;
				}
				if stripped.len() != line.len() {
					return Err(ClinicError::parse(
						"the function declaration must start at column 0",
					)
					.at_line(line_number));
				}
				let mut parsed = parse_header(line).map_err(|e| e.at_line(line_number))?;
				parsed.line = line_number;
				header = Some(parsed);
				continue;
			}

			if stripped.is_empty() {
				if let Some(Item::Parameter(parameter)) = items.last_mut() {
					if !parameter.docstring.is_empty() {
						parameter.docstring.push('\n');
					}
				}
				continue;
			}

			let indent = line.len() - stripped.len();
			if indent == 0 {
				in_docstring = true;
				docstring.push(line);
				continue;
			}

			let expected = *parameter_indent.get_or_insert(indent);
			if indent == expected {
				docstring_indent = None;
				let item = self.parse_item(stripped, line_number)?;
				if let Item::Parameter(parameter) = &item {
					if !names.insert(parameter.name.clone()) {
						return Err(ClinicError::parse(format!(
							"duplicate parameter name `{}`",
							parameter.name
						))
						.at_line(line_number));
					}
				}
				items.push(item);
			} else if indent > expected {
				let Some(Item::Parameter(parameter)) = items.last_mut() else {
					return Err(ClinicError::parse(
						"docstring lines must follow a parameter declaration",
					)
					.at_line(line_number));
				};
				let dedent = *docstring_indent.get_or_insert(indent);
				if !parameter.docstring.is_empty() {
					parameter.docstring.push('\n');
				}
				parameter.docstring.push_str(&line[dedent.min(indent)..]);
			} else {
				return Err(ClinicError::parse(format!(
					"inconsistent indentation, expected {expected} spaces but found {indent}"
				))
				.at_line(line_number));
			}
		}

		let Some(header) = header else {
			return Err(ClinicError::parse("missing function declaration").at_line(first_line));
		};
		for item in &mut items {
			if let Item::Parameter(parameter) = item {
				let length = parameter.docstring.trim_end().len();
				parameter.docstring.truncate(length);
			}
		}

		let function = self
			.build_function(&header, items, &docstring)
			.map_err(|e| e.at_line(header.line))?;
		debug!(
			function = %function.full_name,
			parameters = function.parameters.len(),
			"parsed function"
		);
		self.functions
			.insert(function.full_name.clone(), function.clone());

		Ok(function)
	}

	/// Functions parsed so far, by full name.
	pub fn functions(&self) -> &HashMap<String, Function> {
		&self.functions
	}

	fn build_function(
		&self,
		header: &Header<'_>,
		items: Vec<Item>,
		docstring: &[&str],
	) -> ClinicResult<Function> {
		let full_name = header.full_name;
		let (module, name) = match full_name.rsplit_once('.') {
			Some((module, name)) => (Some(module.to_string()), name.to_string()),
			None => (None, full_name.to_string()),
		};
		let mut docstring = docstring.join("\n").trim_matches('\n').to_string();

		let (parameters, mut return_converter) = match header.clone_from {
			Some(source) => {
				let Some(existing) = self.functions.get(source) else {
					return Err(ClinicError::structural(format!(
						"couldn't find existing function `{source}` to clone"
					)));
				};
				if !items.is_empty() {
					return Err(ClinicError::structural(format!(
						"function `{full_name}` is cloned from `{source}` and cannot declare its \
						 own parameters"
					)));
				}
				if docstring.is_empty() {
					docstring.clone_from(&existing.docstring);
				}
				(
					existing.parameters.clone(),
					existing.return_converter.clone(),
				)
			}
			None => {
				(
					resolve_parameters(items)?,
					self.registry.lookup_return("object")?,
				)
			}
		};

		if let Some((converter, args)) = header.return_converter {
			if args.is_some_and(|args| !args[1..args.len() - 1].trim().is_empty()) {
				return Err(ClinicError::parse(format!(
					"return converter `{converter}` does not take arguments"
				)));
			}
			return_converter = self.registry.lookup_return(converter)?;
		}

		let function = Function {
			module,
			name,
			full_name: full_name.to_string(),
			parameters,
			return_converter,
			docstring,
			line: header.line,
		};

		for parameter in &function.parameters {
			parameter.c_default()?;
		}
		if function.has_groups() {
			function.arities()?;
		}

		Ok(function)
	}

	fn parse_item(&self, text: &str, line: usize) -> ClinicResult<Item> {
		match text {
			"/" => return Ok(Item::Slash(line)),
			"*" => return Ok(Item::Star(line)),
			"[" => return Ok(Item::Open(line)),
			"]" => return Ok(Item::Close(line)),
			_ => {}
		}

		self.parse_parameter(text, line)
			.map(Item::Parameter)
			.map_err(|e| e.at_line(line))
	}

	fn parse_parameter(&self, text: &str, line: usize) -> ClinicResult<Parameter> {
		let (vararg, declaration) = match text.strip_prefix('*') {
			Some(rest) => (true, rest),
			None => (false, text),
		};

		let Some((name, annotation)) = declaration.split_once(':') else {
			return Err(ClinicError::parse(format!(
				"expected a parameter of the form `name: converter`, got `{text}`"
			)));
		};
		let name = name.trim();
		if !is_identifier(name) {
			return Err(ClinicError::parse(format!("invalid parameter name `{name}`")));
		}

		let mut tokens = tokenize(annotation).at_line(line);
		let converter_name = match tokens.next().transpose()? {
			Some(token) if token.is(TokenKind::Word) => token.value,
			_ => {
				return Err(ClinicError::parse(format!(
					"expected a converter name after `{name}:`"
				)));
			}
		};

		let mut next = tokens.next().transpose()?;
		let mut args = None;
		if let Some(token) = next.clone().filter(|token| token.is(TokenKind::Args)) {
			let length = balanced_length(token.value)?;
			args = Some(&token.value[1..length - 1]);

			if length == token.value.len() {
				next = tokens.next().transpose()?;
			} else {
				// The greedy match ran into a default expression that holds
				// parentheses of its own.
				tokens = tokenize(&annotation[token.offset + length..]).at_line(line);
				next = tokens.next().transpose()?;
			}
		}

		let default = match next {
			None => None,
			Some(token) if token.is(TokenKind::Clone) => {
				let expression = tokens.remainder().trim();
				if expression.is_empty() {
					return Err(ClinicError::parse(format!(
						"missing default value for `{name}` after `=`"
					)));
				}
				Some(DefaultValue::classify(expression))
			}
			Some(token) => {
				return Err(ClinicError::parse(format!(
					"unexpected {token} after converter `{converter_name}`"
				)));
			}
		};

		if vararg && default.is_some() {
			return Err(ClinicError::parse(format!(
				"`*{name}` cannot have a default value"
			)));
		}

		let converter = self.registry.construct(converter_name, args)?;

		Ok(Parameter {
			name: name.to_string(),
			converter,
			default,
			kind: if vararg {
				ParameterKind::VarPositional
			} else {
				ParameterKind::PositionalOrKeyword
			},
			group: 0,
			docstring: String::new(),
			line,
		})
	}
}

fn parse_header(line: &str) -> ClinicResult<Header<'_>> {
	let mut tokens = tokenize(line);
	let full_name = match tokens.next().transpose()? {
		Some(token) if token.is(TokenKind::Word) => token.value,
		_ => return Err(ClinicError::parse("expected a function name")),
	};
	if !full_name.split('.').all(is_identifier) {
		return Err(ClinicError::parse(format!(
			"invalid function name `{full_name}`"
		)));
	}

	let mut next = tokens.next().transpose()?;

	let mut clone_from = None;
	if next.as_ref().is_some_and(|token| token.is(TokenKind::Clone)) {
		match tokens.next().transpose()? {
			Some(token) if token.is(TokenKind::Word) => clone_from = Some(token.value),
			_ => {
				return Err(ClinicError::parse(
					"expected the name of an existing function after `=`",
				));
			}
		}
		next = tokens.next().transpose()?;
	}

	let mut return_converter = None;
	if next.as_ref().is_some_and(|token| token.is(TokenKind::Arrow)) {
		let converter = match tokens.next().transpose()? {
			Some(token) if token.is(TokenKind::Word) => token.value,
			_ => return Err(ClinicError::parse("expected a return converter after `->`")),
		};
		next = tokens.next().transpose()?;

		let mut args = None;
		if next.as_ref().is_some_and(|token| token.is(TokenKind::Args)) {
			args = next.map(|token| token.value);
			next = tokens.next().transpose()?;
		}
		return_converter = Some((converter, args));
	}

	if let Some(token) = next {
		return Err(ClinicError::parse(format!(
			"unexpected {token} in function declaration"
		)));
	}

	Ok(Header {
		full_name,
		clone_from,
		return_converter,
		line: 0,
	})
}

/// Length of the leading balanced `( ... )` group of `args`.
fn balanced_length(args: &str) -> ClinicResult<usize> {
	let mut depth = 0usize;
	let mut quote = None;
	let mut escaped = false;

	for (index, c) in args.char_indices() {
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
			'(' => depth += 1,
			')' => {
				depth -= 1;
				if depth == 0 {
					return Ok(index + 1);
				}
			}
			_ => {}
		}
	}

	Err(ClinicError::parse(
		"unbalanced parentheses in converter arguments",
	))
}

fn resolve_parameters(items: Vec<Item>) -> ClinicResult<Vec<Parameter>> {
	if items
		.iter()
		.any(|item| matches!(item, Item::Open(_) | Item::Close(_)))
	{
		resolve_groups(items)
	} else {
		resolve_kinds(items)
	}
}

/// Apply `/` and `*` markers to a function without optional groups.
fn resolve_kinds(items: Vec<Item>) -> ClinicResult<Vec<Parameter>> {
	let mut parameters: Vec<Parameter> = vec![];
	let mut slash_seen = false;
	let mut star_line = None;
	let mut vararg_seen = false;

	for item in items {
		match item {
			Item::Slash(line) => {
				let message = if slash_seen {
					"`/` may only appear once"
				} else if star_line.is_some() || vararg_seen {
					"`/` must come before `*`"
				} else if parameters.is_empty() {
					"`/` must follow at least one parameter"
				} else {
					for parameter in &mut parameters {
						parameter.kind = ParameterKind::PositionalOnly;
					}
					slash_seen = true;
					continue;
				};
				return Err(ClinicError::parse(message).at_line(line));
			}
			Item::Star(line) => {
				if star_line.is_some() || vararg_seen {
					return Err(ClinicError::parse("`*` may only appear once").at_line(line));
				}
				star_line = Some(line);
			}
			Item::Parameter(mut parameter) => {
				if parameter.is_vararg() {
					if star_line.is_some() || vararg_seen {
						return Err(ClinicError::parse(format!(
							"`*{}` may only appear once and must come before `*`",
							parameter.name
						))
						.at_line(parameter.line));
					}
					if parameter.converter.name() != "object" {
						return Err(ClinicError::parse(format!(
							"`*{}` must use the `object` converter",
							parameter.name
						))
						.at_line(parameter.line));
					}
					vararg_seen = true;
				} else if star_line.is_some() || vararg_seen {
					parameter.kind = ParameterKind::KeywordOnly;
				}
				parameters.push(parameter);
			}
			Item::Open(_) | Item::Close(_) => {}
		}
	}

	if let Some(line) = star_line {
		if !parameters.iter().any(Parameter::is_keyword_only) {
			return Err(
				ClinicError::parse("`*` must be followed by at least one parameter").at_line(line),
			);
		}
	}

	let mut default_seen = false;
	for parameter in &parameters {
		match parameter.kind {
			ParameterKind::KeywordOnly if parameter.default.is_none() => {
				return Err(ClinicError::parse(format!(
					"keyword-only parameter `{}` must have a default value",
					parameter.name
				))
				.at_line(parameter.line));
			}
			ParameterKind::PositionalOnly | ParameterKind::PositionalOrKeyword => {
				if parameter.is_optional() {
					default_seen = true;
				} else if default_seen {
					return Err(ClinicError::parse(format!(
						"non-default parameter `{}` follows a default parameter",
						parameter.name
					))
					.at_line(parameter.line));
				}
			}
			_ => {}
		}
	}

	Ok(parameters)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Region {
	Left,
	Required,
	Right,
}

/// Assign group ids from bracket nesting. Grouped functions are positional
/// only and take no defaults, `*` or varargs.
fn resolve_groups(items: Vec<Item>) -> ClinicResult<Vec<Parameter>> {
	let mut open_groups: Vec<(usize, usize)> = vec![];
	for item in &items {
		match item {
			Item::Open(line) => open_groups.push((*line, 0)),
			Item::Close(line) => {
				let Some((open_line, count)) = open_groups.pop() else {
					return Err(
						ClinicError::structural("`]` without a matching `[`").at_line(*line),
					);
				};
				if count == 0 {
					return Err(ClinicError::structural(
						"empty optional group, every group must contain at least one parameter",
					)
					.at_line(open_line));
				}
			}
			Item::Parameter(_) => {
				if let Some(group) = open_groups.last_mut() {
					group.1 += 1;
				}
			}
			Item::Slash(_) | Item::Star(_) => {}
		}
	}
	if let Some((line, _)) = open_groups.last() {
		return Err(ClinicError::structural("`[` without a matching `]`").at_line(*line));
	}

	let has_required = {
		let mut depth = 0;
		items.iter().any(|item| {
			match item {
				Item::Open(_) => depth += 1,
				Item::Close(_) => depth -= 1,
				Item::Parameter(_) => return depth == 0,
				Item::Slash(_) | Item::Star(_) => {}
			}
			false
		})
	};

	let last_parameter = items
		.iter()
		.rposition(|item| matches!(item, Item::Parameter(_)));
	let mut region = if has_required {
		Region::Left
	} else {
		Region::Right
	};
	let mut depth = 0i32;
	let mut left_started = false;
	let mut right_closed = false;
	let mut parameters = vec![];

	for (index, item) in items.into_iter().enumerate() {
		match item {
			Item::Star(line) => {
				return Err(ClinicError::structural(
					"keyword-only parameters cannot be combined with optional groups",
				)
				.at_line(line));
			}
			Item::Slash(line) => {
				if last_parameter.is_some_and(|last| last > index) {
					return Err(ClinicError::structural(
						"`/` must follow every parameter in a function with optional groups",
					)
					.at_line(line));
				}
			}
			Item::Open(line) => {
				match region {
					Region::Left if left_started => {
						return Err(ClinicError::structural(
							"optional groups before the required parameters must nest outward, \
							 like `[ [ a ] b ] c`",
						)
						.at_line(line));
					}
					Region::Required => region = Region::Right,
					Region::Right if right_closed => {
						return Err(ClinicError::structural(
							"optional groups after the required parameters must nest inward, like \
							 `a [ b [ c ] ]`",
						)
						.at_line(line));
					}
					Region::Left | Region::Right => {}
				}
				depth += 1;
			}
			Item::Close(_) => {
				depth -= 1;
				match region {
					Region::Left => left_started = true,
					Region::Right => right_closed = true,
					Region::Required => {}
				}
			}
			Item::Parameter(mut parameter) => {
				let line = parameter.line;
				if parameter.is_vararg() {
					return Err(ClinicError::structural(format!(
						"`*{}` cannot be combined with optional groups",
						parameter.name
					))
					.at_line(line));
				}
				if parameter.is_optional() {
					return Err(ClinicError::structural(format!(
						"parameter `{}` has a default value, which cannot be combined with \
						 optional groups",
						parameter.name
					))
					.at_line(line));
				}

				parameter.group = match region {
					Region::Left if depth > 0 => {
						left_started = true;
						-depth
					}
					Region::Left | Region::Required => {
						region = Region::Required;
						0
					}
					Region::Right if depth == 0 => {
						return Err(ClinicError::structural(
							"optional groups are not allowed between required parameters",
						)
						.at_line(line));
					}
					Region::Right if right_closed => {
						return Err(ClinicError::structural(
							"optional groups after the required parameters must nest inward, like \
							 `a [ b [ c ] ]`",
						)
						.at_line(line));
					}
					Region::Right => depth,
				};
				parameter.kind = ParameterKind::PositionalOnly;
				parameters.push(parameter);
			}
		}
	}

	Ok(parameters)
}
