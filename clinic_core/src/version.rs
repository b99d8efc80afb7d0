use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use derive_more::Deref;

use crate::ClinicError;
use crate::ClinicResult;

/// A dotted version number. Pre-release letters sort below zero: `a` is -3,
/// `b` is -2 and `c` (or `rc`) is -1, so `1.4b3` is `[1, 4, -2, 3]`.
#[derive(Clone, Debug, Deref, Eq)]
pub struct Version(Vec<i64>);

impl Version {
	pub fn components(&self) -> &[i64] {
		&self.0
	}
}

impl FromStr for Version {
	type Err = ClinicError;

	fn from_str(input: &str) -> ClinicResult<Self> {
		version_splitter(input).map(Self)
	}
}

impl fmt::Display for Version {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut first = true;
		for component in &self.0 {
			match component {
				-3 => write!(f, "a")?,
				-2 => write!(f, "b")?,
				-1 => write!(f, "rc")?,
				number => {
					if !first {
						write!(f, ".")?;
					}
					write!(f, "{number}")?;
				}
			}
			first = *component < 0;
		}

		Ok(())
	}
}

impl Ord for Version {
	/// Missing trailing components count as zero.
	fn cmp(&self, other: &Self) -> Ordering {
		let length = self.0.len().max(other.0.len());
		(0..length)
			.map(|index| {
				let left = self.0.get(index).copied().unwrap_or(0);
				let right = other.0.get(index).copied().unwrap_or(0);
				left.cmp(&right)
			})
			.find(|ordering| ordering.is_ne())
			.unwrap_or(Ordering::Equal)
	}
}

impl PartialOrd for Version {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl PartialEq for Version {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other).is_eq()
	}
}

/// Split a version string such as `3.12.0rc1` into comparable integers.
pub fn version_splitter(input: &str) -> ClinicResult<Vec<i64>> {
	let error = |reason: String| {
		ClinicError::VersionParse {
			input: input.to_string(),
			reason,
		}
	};

	let mut components = vec![];
	let mut digits = String::new();
	let mut chars = input.chars().peekable();

	while let Some(c) = chars.next() {
		let marker = match c {
			'0'..='9' => {
				digits.push(c);
				continue;
			}
			'.' => None,
			'a' => Some(-3),
			'b' => Some(-2),
			'c' => Some(-1),
			'r' if chars.peek() == Some(&'c') => {
				chars.next();
				Some(-1)
			}
			other => return Err(error(format!("illegal character {other:?}"))),
		};

		if digits.is_empty() {
			return Err(error("unsupported version string".to_string()));
		}
		let number = digits
			.parse()
			.map_err(|_| error(format!("component `{digits}` is too large")))?;
		components.push(number);
		digits.clear();

		if let Some(marker) = marker {
			components.push(marker);
		}
	}

	if digits.is_empty() {
		return Err(error("unsupported version string".to_string()));
	}
	let number = digits
		.parse()
		.map_err(|_| error(format!("component `{digits}` is too large")))?;
	components.push(number);

	Ok(components)
}

/// Compare two version strings.
pub fn version_comparator(left: &str, right: &str) -> ClinicResult<Ordering> {
	let left: Version = left.parse()?;
	let right: Version = right.parse()?;

	Ok(left.cmp(&right))
}
