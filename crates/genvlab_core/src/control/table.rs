//! Header-less CSV reader for registry output.
//!
//! Rows are split on `,` without quoting support; the registry never emits
//! quoted fields. Field arity is checked by the caller through [`fields`].

use crate::control::{ControlError, ControlResult};
use std::str::FromStr;

/// Splits text into non-empty lines and each line into its comma fields.
pub fn parse_rows(text: &str) -> Vec<Vec<&str>> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(|line| line.split(',').collect())
        .collect()
}

/// Binds a row to a fixed arity, failing on any mismatch.
pub fn fields<'a, const N: usize>(
    row: &[&'a str],
    context: &'static str,
) -> ControlResult<[&'a str; N]> {
    <[&str; N]>::try_from(row).map_err(|_| {
        ControlError::malformed(
            context,
            format!("expected {N} fields, got {} in `{}`", row.len(), row.join(",")),
        )
    })
}

/// Splits an inner list field and parses each non-empty token.
///
/// Used for the space-joined pid list and the comma-joined index list.
pub fn split_list<T: FromStr>(
    field: &str,
    delimiter: char,
    context: &'static str,
) -> ControlResult<Vec<T>> {
    field
        .split(delimiter)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<T>()
                .map_err(|_| ControlError::malformed(context, format!("invalid number `{token}`")))
        })
        .collect()
}

/// Returns the only non-empty line of a single-value response.
///
/// `Ok(None)` is the legitimate "no records" answer.
pub fn single_line<'a>(text: &'a str, context: &'static str) -> ControlResult<Option<&'a str>> {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty());
    let first = lines.next();
    if lines.next().is_some() {
        return Err(ControlError::malformed(
            context,
            "expected at most one line of output",
        ));
    }
    Ok(first)
}

/// Optional field: an empty column means "absent".
pub fn optional_field(field: &str) -> Option<String> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{fields, optional_field, parse_rows, single_line, split_list};
    use crate::control::ControlError;

    #[test]
    fn parse_rows_drops_blank_lines_and_keeps_empty_fields() {
        let rows = parse_rows("0,e1,foo,t1\n\n2,,,\r\n");
        assert_eq!(rows, vec![vec!["0", "e1", "foo", "t1"], vec!["2", "", "", ""]]);
    }

    #[test]
    fn parse_rows_of_empty_text_is_empty() {
        assert!(parse_rows("").is_empty());
    }

    #[test]
    fn fields_rejects_wrong_arity() {
        let row = vec!["0", "e1"];
        let err = fields::<4>(&row, "devices ps").expect_err("arity mismatch must fail");
        assert!(matches!(
            err,
            ControlError::MalformedOutput {
                context: "devices ps",
                ..
            }
        ));
    }

    #[test]
    fn split_list_tolerates_extra_delimiters() {
        let pids: Vec<u32> = split_list("12  34 ", ' ', "pids").expect("pids parse");
        assert_eq!(pids, vec![12, 34]);

        let empty: Vec<u32> = split_list("", ' ', "pids").expect("empty parse");
        assert!(empty.is_empty());
    }

    #[test]
    fn split_list_rejects_non_numeric_tokens() {
        let err = split_list::<u32>("3,x", ',', "indices").expect_err("bad token must fail");
        assert!(err.to_string().contains("`x`"));
    }

    #[test]
    fn single_line_handles_empty_and_multi_line_output() {
        assert_eq!(single_line("", "find").expect("empty is valid"), None);
        assert_eq!(single_line("e1\n", "find").expect("one line"), Some("e1"));
        assert!(single_line("e1\ne2", "find").is_err());
    }

    #[test]
    fn optional_field_maps_blank_to_none() {
        assert_eq!(optional_field(""), None);
        assert_eq!(optional_field(" e1 "), Some("e1".to_string()));
    }
}
