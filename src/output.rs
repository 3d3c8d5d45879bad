//! Wording helpers for console progress lines.

/// `1 file`, `3 files`
pub(crate) fn quantity(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity() {
        assert_eq!(quantity(1, "package"), "1 package");
        assert_eq!(quantity(3, "package"), "3 packages");
        assert_eq!(quantity(0, "file"), "0 files");
    }
}
