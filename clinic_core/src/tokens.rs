use std::fmt;

/// The kinds of token a clinic DSL line is made of. Runs of spaces separate
/// tokens but are never emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
	/// `->`
	Arrow,
	/// `=`
	Clone,
	/// Everything from the first `(` to the last `)` on the line.
	Args,
	/// A run of word characters and dots.
	Word,
}

impl fmt::Display for TokenKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Arrow => "ARROW",
			Self::Clone => "CLONE",
			Self::Args => "ARGS",
			Self::Word => "WORD",
		};

		f.write_str(name)
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
	pub kind: TokenKind,
	pub value: &'a str,
	/// Byte offset of the token inside the lexed line.
	pub offset: usize,
}

impl<'a> Token<'a> {
	pub fn new(kind: TokenKind, value: &'a str, offset: usize) -> Self {
		Self {
			kind,
			value,
			offset,
		}
	}

	pub fn is(&self, kind: TokenKind) -> bool {
		self.kind == kind
	}
}

impl fmt::Display for Token<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}({})", self.kind, self.value)
	}
}
