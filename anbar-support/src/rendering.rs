//! Text rendering utilities for human-friendly error messages.
//!
//! Provides helpers to shorten type names, list registered components,
//! and produce "did you mean?" suggestions in error output.

/// Renders a list of names as a single comma-separated line.
///
/// # Examples
/// ```
/// use anbar_support::rendering::render_list;
///
/// let names = vec!["logger", "database", "mailer"];
/// assert_eq!(render_list(&names), "logger, database, mailer");
/// ```
pub fn render_list(names: &[impl AsRef<str>]) -> String {
    names
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders suggestions as indented bullet lines.
///
/// ```text
///     - alloc::sync::Arc<dyn Logger>
///     - my_app::ConsoleLogger
/// ```
pub fn render_suggestions(suggestions: &[impl AsRef<str>]) -> String {
    let mut result = String::new();
    for suggestion in suggestions {
        result.push_str("\n    - ");
        result.push_str(suggestion.as_ref());
    }
    result
}

/// Shortens a fully qualified type name for display.
///
/// ```
/// use anbar_support::rendering::shorten_type_name;
///
/// let short = shorten_type_name("my_app::services::user::UserService");
/// assert_eq!(short, "UserService");
///
/// let short = shorten_type_name("alloc::sync::Arc<dyn my_app::traits::Logger>");
/// assert_eq!(short, "Arc<dyn Logger>");
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    // Strategy: keep the last segment of each `::` path component,
    // preserving generic punctuation.
    let mut result = String::with_capacity(full_name.len());
    let mut chars = full_name.chars().peekable();
    let mut current_segment = String::new();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next(); // consume second ':'
                current_segment.clear(); // discard path prefix
            }
            '<' | '>' | ',' | ' ' => {
                result.push_str(&current_segment);
                result.push(ch);
                current_segment.clear();
            }
            _ => {
                current_segment.push(ch);
            }
        }
    }

    result.push_str(&current_segment);
    result
}

/// Generates "did you mean?" suggestions for a requested type name.
///
/// Compares the requested name against the available registrations and
/// returns the closest matches, best first.
pub fn suggest_similar(
    requested: &str,
    available: &[&str],
    max_suggestions: usize,
) -> Vec<String> {
    let requested_lower = requested.to_lowercase();
    let requested_short = shorten_type_name(requested).to_lowercase();

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .filter_map(|&name| {
            let name_lower = name.to_lowercase();
            let name_short = shorten_type_name(name).to_lowercase();

            // Exact substring match (highest priority)
            if name_lower.contains(&requested_lower)
                || requested_lower.contains(&name_lower)
            {
                return Some((name, 100));
            }

            // Short name match
            if name_short.contains(&requested_short)
                || requested_short.contains(&name_short)
            {
                return Some((name, 80));
            }

            // Common prefix
            let common = name_short
                .chars()
                .zip(requested_short.chars())
                .take_while(|(a, b)| a == b)
                .count();

            if common >= 3 {
                return Some((name, common * 10));
            }

            None
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_simple_list() {
        let names = vec!["a", "b", "c"];
        assert_eq!(render_list(&names), "a, b, c");
    }

    #[test]
    fn render_empty_list() {
        let names: Vec<&str> = vec![];
        assert_eq!(render_list(&names), "");
    }

    #[test]
    fn render_suggestion_bullets() {
        let rendered = render_suggestions(&["Foo", "Bar"]);
        assert_eq!(rendered, "\n    - Foo\n    - Bar");
    }

    #[test]
    fn shorten_simple_path() {
        assert_eq!(
            shorten_type_name("my_app::services::UserService"),
            "UserService"
        );
    }

    #[test]
    fn shorten_generic_path() {
        assert_eq!(
            shorten_type_name("alloc::sync::Arc<dyn my_app::Logger>"),
            "Arc<dyn Logger>"
        );
    }

    #[test]
    fn shorten_plain_name() {
        assert_eq!(shorten_type_name("UserService"), "UserService");
    }

    #[test]
    fn suggest_substring_match() {
        let available = vec!["my_app::UserService", "my_app::Database"];
        let suggestions = suggest_similar("UserServise", &available, 3);
        assert_eq!(suggestions, vec!["my_app::UserService".to_string()]);
    }

    #[test]
    fn suggest_nothing_for_unrelated() {
        let available = vec!["my_app::Database"];
        let suggestions = suggest_similar("Zzz", &available, 3);
        assert!(suggestions.is_empty());
    }

    #[test]
    fn suggest_respects_limit() {
        let available = vec!["user_a", "user_b", "user_c"];
        let suggestions = suggest_similar("user", &available, 2);
        assert_eq!(suggestions.len(), 2);
    }
}
