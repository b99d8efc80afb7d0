use std::iter::FusedIterator;

use logos::Logos;

use crate::ClinicError;
use crate::ClinicResult;
use crate::tokens::Token;
use crate::tokens::TokenKind;

/// Raw tokens produced by logos for a single DSL line. The variant order
/// mirrors the priority the alternatives are tried in.
#[derive(Logos, Clone, Copy, Debug, PartialEq)]
#[logos(skip r"[ ]+")]
enum RawToken {
	#[token("->")]
	Arrow,
	#[token("=")]
	Clone,
	#[token("(", greedy_args)]
	Args,
	#[regex(r"[A-Za-z0-9_.]+")]
	Word,
}

/// Extend an opening parenthesis to the last closing parenthesis on the line.
/// Without one the `(` is a stray character.
fn greedy_args(lex: &mut logos::Lexer<RawToken>) -> bool {
	match lex.remainder().rfind(')') {
		Some(index) => {
			lex.bump(index + 1);
			true
		}
		None => false,
	}
}

impl From<RawToken> for TokenKind {
	fn from(value: RawToken) -> Self {
		match value {
			RawToken::Arrow => Self::Arrow,
			RawToken::Clone => Self::Clone,
			RawToken::Args => Self::Args,
			RawToken::Word => Self::Word,
		}
	}
}

/// Lazy token stream over one line of DSL input.
///
/// Yields tokens until the line is exhausted or a character outside every
/// alternative is found. The error is yielded once and the stream is then
/// finished.
pub struct Tokens<'a> {
	inner: logos::Lexer<'a, RawToken>,
	line: usize,
	done: bool,
}

impl<'a> Tokens<'a> {
	/// Record the line number reported by lexing errors.
	#[must_use]
	pub fn at_line(mut self, line: usize) -> Self {
		self.line = line;
		self
	}

	/// The unlexed rest of the line.
	pub fn remainder(&self) -> &'a str {
		self.inner.remainder()
	}
}

impl<'a> Iterator for Tokens<'a> {
	type Item = ClinicResult<Token<'a>>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done {
			return None;
		}

		let Some(raw) = self.inner.next() else {
			self.done = true;
			return None;
		};
		let span = self.inner.span();

		match raw {
			Ok(kind) => Some(Ok(Token::new(kind.into(), self.inner.slice(), span.start))),
			Err(()) => {
				self.done = true;
				let source = self.inner.source();
				let stray = source[span.start..].chars().next().unwrap_or(' ');
				let column = source[..span.start].chars().count() + 1;

				Some(Err(ClinicError::parse(format!(
					"{stray:?} stray character in input at column {column}"
				))
				.at_line(self.line)))
			}
		}
	}
}

impl FusedIterator for Tokens<'_> {}

/// Tokenize a single line of clinic DSL.
pub fn tokenize(line: &str) -> Tokens<'_> {
	Tokens {
		inner: RawToken::lexer(line),
		line: 0,
		done: false,
	}
}
