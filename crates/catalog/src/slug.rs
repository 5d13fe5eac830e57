/// Build a URL/code friendly slug from free text.
///
/// ASCII letters and digits are kept (lowercased); every other run of
/// characters collapses into a single `separator`. Leading and trailing
/// separators are dropped.
pub fn slugify(input: &str, separator: char) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_sep = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push(separator);
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn collapses_punctuation_and_whitespace() {
        assert_eq!(slugify("  Acme & Sons, North Storage ", '-'), "acme-sons-north-storage");
        assert_eq!(slugify("Blue T-Shirt (XL)", '_'), "blue_t_shirt_xl");
    }

    #[test]
    fn empty_when_nothing_alphanumeric() {
        assert_eq!(slugify("--- !!", '-'), "");
    }

    proptest! {
        #[test]
        fn never_starts_or_ends_with_separator(s in ".{0,40}") {
            let slug = slugify(&s, '-');
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
        }
    }
}
