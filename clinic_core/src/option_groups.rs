//! Enumeration of the argument lists accepted by functions with optional
//! parameter groups.
//!
//! Left groups sit before the required parameters and are dropped from the
//! outside in, so the group closest to the required block is the last to go.
//! Right groups sit after the required parameters and are added from the
//! inside out.

use std::collections::HashSet;

use crate::ClinicError;
use crate::ClinicResult;

/// Yield every legal combination of left groups, shortest first.
///
/// For groups `[G1, G2, G3]` this yields `[]`, `G3`, `G2 + G3`,
/// `G1 + G2 + G3`.
pub fn permute_left_option_groups<T: Clone>(
	groups: &[Vec<T>],
) -> impl Iterator<Item = Vec<T>> + '_ {
	(0..=groups.len()).map(move |count| {
		groups[groups.len() - count..]
			.iter()
			.flatten()
			.cloned()
			.collect()
	})
}

/// Yield every legal combination of right groups, shortest first.
///
/// For groups `[G1, G2, G3]` this yields `[]`, `G1`, `G1 + G2`,
/// `G1 + G2 + G3`.
pub fn permute_right_option_groups<T: Clone>(
	groups: &[Vec<T>],
) -> impl Iterator<Item = Vec<T>> + '_ {
	(0..=groups.len()).map(move |count| groups[..count].iter().flatten().cloned().collect())
}

/// Every distinct argument list made of some left groups, the required
/// parameters and some right groups, sorted by length.
///
/// When two combinations have the same length the first one generated wins:
/// right groups are iterated in the outer loop, left groups in the inner one.
pub fn permute_optional_groups<T: Clone>(
	left: &[Vec<T>],
	required: &[T],
	right: &[Vec<T>],
) -> ClinicResult<Vec<Vec<T>>> {
	if required.is_empty() && !left.is_empty() {
		return Err(ClinicError::structural(
			"optional groups on the left require at least one required parameter",
		));
	}

	let mut lengths = HashSet::new();
	let mut result = Vec::new();

	for right_variant in permute_right_option_groups(right) {
		for left_variant in permute_left_option_groups(left) {
			let length = left_variant.len() + required.len() + right_variant.len();
			if !lengths.insert(length) {
				continue;
			}

			let mut variant = left_variant;
			variant.extend_from_slice(required);
			variant.extend_from_slice(&right_variant);
			result.push(variant);
		}
	}

	result.sort_by_key(Vec::len);

	Ok(result)
}
