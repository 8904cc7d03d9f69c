///
/// Makes a user supplied label safe to use as part of a file name.
/// Letters and digits are kept as typed, everything else becomes `_`.
///
pub fn pathify_string(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pathify_string() {
        assert_eq!(pathify_string("Default"), "Default");
        assert_eq!(pathify_string("run 2/hot bath"), "run_2_hot_bath");
        assert_eq!(pathify_string("üb"), "_b");
        assert_eq!(pathify_string(""), "");
    }
}
