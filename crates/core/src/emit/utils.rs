//! Identifier and string helpers for TypeScript output.

/// Check if an identifier needs quoting as an object key.
///
/// Returns true if the name is empty, doesn't start with a letter,
/// underscore or dollar sign, or contains other characters.
pub fn needs_quoting(name: &str) -> bool {
    name.is_empty()
        || !name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Escape a string for use in a double-quoted TypeScript literal.
pub fn escape_js_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Quote a property key if it is not a valid identifier.
pub fn quote_if_needed(name: &str) -> String {
    if needs_quoting(name) {
        format!("\"{}\"", escape_js_string(name))
    } else {
        name.to_string()
    }
}

/// Capitalize the first letter of a string.
pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
    }
}

/// PascalCase type name from an arbitrary identifier.
///
/// Splits on anything that is not an ASCII letter or digit and capitalizes
/// each part; the rest of each part is kept as written. A leading digit
/// gets an underscore prefix.
pub fn type_name(identifier: &str) -> String {
    let mut result: String = identifier
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(capitalize_first)
        .collect();

    if result.is_empty() {
        return "Unnamed".to_string();
    }
    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, '_');
    }
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_quoting() {
        assert!(!needs_quoting("foo"));
        assert!(!needs_quoting("_type"));
        assert!(!needs_quoting("$foo"));
        assert!(needs_quoting(""));
        assert!(needs_quoting("123foo"));
        assert!(needs_quoting("foo-bar"));
        assert!(needs_quoting("foo bar"));
    }

    #[test]
    fn test_quote_if_needed() {
        assert_eq!(quote_if_needed("foo"), "foo");
        assert_eq!(quote_if_needed("foo-bar"), "\"foo-bar\"");
        assert_eq!(quote_if_needed("say\"hi"), "\"say\\\"hi\"");
    }

    #[test]
    fn test_type_name() {
        assert_eq!(type_name("book"), "Book");
        assert_eq!(type_name("allBooks"), "AllBooks");
        assert_eq!(type_name("sanity.imageAsset"), "SanityImageAsset");
        assert_eq!(type_name("blog-post list"), "BlogPostList");
        assert_eq!(type_name("2024 posts"), "_2024Posts");
        assert_eq!(type_name("--"), "Unnamed");
    }
}
