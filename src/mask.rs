//! IRC wildcard mask conversion.

use regex::Regex;

/// Convert an IRC-style mask into an anchored [`Regex`].
///
/// `*` matches any run of characters, `?` matches exactly one, and a
/// backslash escapes the next wildcard (`\*`, `\?`, `\\`). A backslash
/// before any other character, or at the end of the mask, stays a literal
/// backslash.
///
/// ```
/// use slirc_client::mask_to_regex;
///
/// let re = mask_to_regex("*!*@*.example.com").unwrap();
/// assert!(re.is_match("nick!user@irc.example.com"));
/// assert!(!re.is_match("nick!user@example.org"));
/// ```
pub fn mask_to_regex(mask: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::with_capacity(mask.len() * 2 + 2);
    pattern.push('^');

    let mut chars = mask.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped @ ('?' | '*' | '\\')) => {
                    pattern.push_str(&regex::escape(&escaped.to_string()));
                }
                Some(other) => {
                    pattern.push_str(&regex::escape("\\"));
                    pattern.push_str(&regex::escape(&other.to_string()));
                }
                None => pattern.push_str(&regex::escape("\\")),
            },
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }

    pattern.push('$');
    Regex::new(&pattern)
}
