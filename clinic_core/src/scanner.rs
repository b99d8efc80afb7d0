use std::collections::HashMap;
use std::ops::Range;

use tracing::trace;

use crate::ClinicError;
use crate::ClinicResult;
use crate::checksum::CHECKSUM_LENGTH;
use crate::checksum::compute_checksum;
use crate::language::Language;

/// Where a block is in its processing lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlockState {
	/// Just scanned from the source text.
	#[default]
	New,
	/// Its input was parsed into a function.
	Parsed,
	/// New output was produced for it.
	Rendered,
	/// It was printed back into a document.
	Written,
}

/// A marker-delimited region of a host file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
	pub dsl_name: String,
	/// The block input with any body prefix removed.
	pub input: String,
	/// Output found in the file from a previous run.
	pub prior_output: Option<String>,
	/// Output checksum recorded in the end marker.
	pub prior_checksum: Option<String>,
	/// Newly produced output.
	pub output: Option<String>,
	/// 1-indexed line of the start marker.
	pub start_line: usize,
	/// Byte range of the whole block in the scanned text.
	pub span: Range<usize>,
	pub state: BlockState,
}

impl Block {
	/// 1-indexed line of the first line of input.
	pub fn input_line(&self) -> usize {
		self.start_line + 1
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
	Text(String),
	Block(Block),
}

/// A scanned file: literal text interleaved with blocks, in file order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Document {
	pub segments: Vec<Segment>,
}

impl Document {
	pub fn blocks(&self) -> impl Iterator<Item = &Block> {
		self.segments.iter().filter_map(|segment| {
			match segment {
				Segment::Block(block) => Some(block),
				Segment::Text(_) => None,
			}
		})
	}

	pub fn blocks_mut(&mut self) -> impl Iterator<Item = &mut Block> {
		self.segments.iter_mut().filter_map(|segment| {
			match segment {
				Segment::Block(block) => Some(block),
				Segment::Text(_) => None,
			}
		})
	}

	/// Reassemble the document, printing every block with fresh markers and
	/// checksums.
	pub fn print(&mut self, language: &dyn Language) -> String {
		let mut text = String::new();

		for segment in &mut self.segments {
			match segment {
				Segment::Text(literal) => text.push_str(literal),
				Segment::Block(block) => {
					print_block(language, block, &mut text);
					block.state = BlockState::Written;
				}
			}
		}

		text
	}
}

/// Append the printed form of `block` to `text`. Blocks without new output
/// keep their prior output.
pub fn print_block(language: &dyn Language, block: &Block, text: &mut String) {
	let dsl_name = block.dsl_name.as_str();
	let body_prefix = language.body_prefix();

	text.push_str(&language.start_line(dsl_name));
	text.push('\n');

	if body_prefix.is_empty() {
		text.push_str(&block.input);
	} else {
		for line in block.input.split_inclusive('\n') {
			text.push_str(body_prefix);
			text.push_str(line);
		}
	}
	if !block.input.is_empty() && !block.input.ends_with('\n') {
		text.push('\n');
	}

	text.push_str(&language.stop_line(dsl_name));
	text.push('\n');

	let mut output = block
		.output
		.as_deref()
		.or(block.prior_output.as_deref())
		.unwrap_or_default()
		.to_string();
	if !output.is_empty() && !output.ends_with('\n') {
		output.push('\n');
	}
	text.push_str(&output);

	let arguments = format!(
		"output={} input={}",
		compute_checksum(&output, CHECKSUM_LENGTH),
		compute_checksum(&block.input, CHECKSUM_LENGTH)
	);
	text.push_str(&language.checksum_line(dsl_name, &arguments));
	text.push('\n');
}

/// Split `text` into literal text and blocks.
///
/// With `verify` set, a block whose prior output no longer matches the
/// checksum in its end marker fails with [`ClinicError::ChecksumMismatch`].
pub fn scan(text: &str, language: &dyn Language, verify: bool) -> ClinicResult<Document> {
	Scanner::new(text, language, verify).run()
}

struct Scanner<'a> {
	lines: Vec<&'a str>,
	offsets: Vec<usize>,
	cursor: usize,
	language: &'a dyn Language,
	verify: bool,
}

impl<'a> Scanner<'a> {
	fn new(text: &'a str, language: &'a dyn Language, verify: bool) -> Self {
		let lines: Vec<&str> = text.split_inclusive('\n').collect();
		let mut offsets = Vec::with_capacity(lines.len() + 1);
		let mut offset = 0;
		for line in &lines {
			offsets.push(offset);
			offset += line.len();
		}
		offsets.push(offset);

		Self {
			lines,
			offsets,
			cursor: 0,
			language,
			verify,
		}
	}

	fn run(mut self) -> ClinicResult<Document> {
		let mut document = Document::default();
		let mut literal = String::new();

		while let Some(&line) = self.lines.get(self.cursor) {
			self.cursor += 1;

			let Some(dsl_name) = self.language.match_start_line(line) else {
				literal.push_str(line);
				continue;
			};

			if !literal.is_empty() {
				document
					.segments
					.push(Segment::Text(std::mem::take(&mut literal)));
			}

			let block = self.scan_block(dsl_name)?;
			trace!(dsl_name, line = block.start_line, "scanned block");
			document.segments.push(Segment::Block(block));
		}

		if !literal.is_empty() {
			document.segments.push(Segment::Text(literal));
		}

		Ok(document)
	}

	/// Scan a block whose start line was just consumed.
	fn scan_block(&mut self, dsl_name: &str) -> ClinicResult<Block> {
		let start_index = self.cursor - 1;
		let start_line = self.cursor;
		let stop_line = self.language.stop_line(dsl_name);
		let body_prefix = self.language.body_prefix();
		let mut input = String::new();

		loop {
			let Some(&line) = self.lines.get(self.cursor) else {
				return Err(ClinicError::structural(format!(
					"unterminated `{dsl_name}` block, expected `{stop_line}`"
				))
				.at_line(start_line));
			};
			self.cursor += 1;

			if let Some(remainder) = line.strip_prefix(stop_line.as_str()) {
				if !remainder.trim().is_empty() {
					return Err(ClinicError::parse(format!(
						"garbage after stop line: {remainder:?}"
					))
					.at_line(self.cursor));
				}
				break;
			}

			if line.trim_start().starts_with(stop_line.as_str()) {
				return Err(ClinicError::parse(format!(
					"whitespace is not allowed before the stop line: {line:?}"
				))
				.at_line(self.cursor));
			}

			if self.language.match_start_line(line).is_some() {
				return Err(ClinicError::structural(format!(
					"unterminated `{dsl_name}` block, found a new start line before `{stop_line}`"
				))
				.at_line(start_line));
			}

			if body_prefix.is_empty() {
				input.push_str(line);
			} else {
				let Some(body) = line.trim_start().strip_prefix(body_prefix) else {
					return Err(ClinicError::parse(format!(
						"block input lines must start with `{body_prefix}`"
					))
					.at_line(self.cursor));
				};
				input.push_str(body);
			}
		}

		let output_start = self.cursor;
		let mut end_marker = None;
		for index in output_start..self.lines.len() {
			let line = self.lines[index];
			if let Some(arguments) = self.language.match_checksum_line(line, dsl_name) {
				end_marker = Some((index, arguments));
				break;
			}
			if self.language.match_start_line(line).is_some() {
				break;
			}
		}

		// Without an end marker the lines after the stop line stay literal text.
		let (prior_output, prior_checksum) = match end_marker {
			Some((index, arguments)) => {
				let output = self.lines[output_start..index].concat();
				self.cursor = index + 1;
				let checksum = self.verify_checksum(&output, arguments, index + 1)?;
				(Some(output), Some(checksum))
			}
			None => (None, None),
		};

		Ok(Block {
			dsl_name: dsl_name.to_string(),
			input,
			prior_output,
			prior_checksum,
			output: None,
			start_line,
			span: self.offsets[start_index]..self.offsets[self.cursor],
			state: BlockState::New,
		})
	}

	fn verify_checksum(&self, output: &str, arguments: &str, line: usize) -> ClinicResult<String> {
		let mut fields = HashMap::new();
		for field in arguments.split_whitespace() {
			let Some((name, value)) = field.split_once('=') else {
				return Err(ClinicError::parse(format!(
					"mangled end marker, expected `name=value` but found `{field}`"
				))
				.at_line(line));
			};
			fields.insert(name.trim(), value.trim());
		}

		let key = if fields.contains_key("input") {
			"output"
		} else {
			"checksum"
		};
		let Some(&expected) = fields.get(key) else {
			return Err(
				ClinicError::parse(format!("mangled end marker, missing `{key}=`")).at_line(line),
			);
		};

		if self.verify {
			let computed = compute_checksum(output, expected.len());
			if computed != expected {
				return Err(ClinicError::ChecksumMismatch {
					expected: expected.to_string(),
					computed,
					line,
				});
			}
		}

		Ok(expected.to_string())
	}
}
