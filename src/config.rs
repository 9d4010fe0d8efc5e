//! Per-run options for resolution and schema synthesis.

use clap::ValueEnum;

/// How declared field names are turned into property names when no explicit
/// rename is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum NamingStrategy {
    /// Keep the declared name
    #[default]
    Verbatim,
    /// lowerCamelCase
    Camel,
    /// snake_case
    Snake,
    /// PascalCase
    Pascal,
}

impl NamingStrategy {
    /// Maps a serde `rename_all` value onto a strategy, if it is one we model.
    pub fn from_serde(rule: &str) -> Option<Self> {
        match rule {
            "camelCase" => Some(NamingStrategy::Camel),
            "snake_case" => Some(NamingStrategy::Snake),
            "PascalCase" => Some(NamingStrategy::Pascal),
            _ => None,
        }
    }

    pub fn apply(&self, name: &str) -> String {
        match self {
            NamingStrategy::Verbatim => name.to_string(),
            NamingStrategy::Camel => to_camel(name, false),
            NamingStrategy::Pascal => to_camel(name, true),
            NamingStrategy::Snake => to_snake(name),
        }
    }
}

/// Applies a serde `rename_all` rule. Unknown rules yield `None`.
pub fn apply_rename_rule(rule: &str, name: &str) -> Option<String> {
    if let Some(strategy) = NamingStrategy::from_serde(rule) {
        return Some(strategy.apply(name));
    }
    let snake = to_snake(name);
    match rule {
        "lowercase" => Some(name.to_lowercase()),
        "UPPERCASE" => Some(name.to_uppercase()),
        "SCREAMING_SNAKE_CASE" => Some(snake.to_uppercase()),
        "kebab-case" => Some(snake.replace('_', "-")),
        "SCREAMING-KEBAB-CASE" => Some(snake.replace('_', "-").to_uppercase()),
        _ => None,
    }
}

fn to_camel(name: &str, upper_first: bool) -> String {
    let mut result = String::with_capacity(name.len());
    let mut capitalize_next = upper_first;
    for (i, ch) in name.chars().enumerate() {
        if ch == '_' || ch == '-' {
            capitalize_next = !result.is_empty() || upper_first;
            continue;
        }
        if capitalize_next {
            result.extend(ch.to_uppercase());
            capitalize_next = false;
        } else if i == 0 || result.is_empty() {
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}

fn to_snake(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();
    for (i, &ch) in chars.iter().enumerate() {
        if ch == '-' {
            result.push('_');
        } else if ch.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if i > 0 && !result.ends_with('_') && (prev_lower || (prev_upper && next_lower)) {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}

/// Options consulted by the resolver, the field parser and the synthesizer.
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    pub naming: NamingStrategy,
    /// Treat every non-`Option` field as required
    pub required_by_default: bool,
    /// Composite nesting depth above which a declaration is always emitted as a
    /// named definition
    pub max_inline_depth: usize,
    /// Allow the resolver to load packages from outside the indexed tree
    pub parse_dependencies: bool,
    /// Exclude fields that are not `pub`
    pub skip_private_fields: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            naming: NamingStrategy::Verbatim,
            required_by_default: false,
            max_inline_depth: 2,
            parse_dependencies: false,
            skip_private_fields: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case() {
        assert_eq!(NamingStrategy::Camel.apply("created_at"), "createdAt");
        assert_eq!(NamingStrategy::Camel.apply("id"), "id");
        assert_eq!(NamingStrategy::Camel.apply("UserName"), "userName");
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(NamingStrategy::Pascal.apply("created_at"), "CreatedAt");
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(NamingStrategy::Snake.apply("createdAt"), "created_at");
        assert_eq!(NamingStrategy::Snake.apply("HTTPServer"), "http_server");
        assert_eq!(NamingStrategy::Snake.apply("already_snake"), "already_snake");
    }

    #[test]
    fn test_verbatim() {
        assert_eq!(NamingStrategy::Verbatim.apply("Some_Name"), "Some_Name");
    }

    #[test]
    fn test_rename_rules() {
        assert_eq!(apply_rename_rule("camelCase", "user_id").as_deref(), Some("userId"));
        assert_eq!(apply_rename_rule("SCREAMING_SNAKE_CASE", "user_id").as_deref(), Some("USER_ID"));
        assert_eq!(apply_rename_rule("kebab-case", "NotFound").as_deref(), Some("not-found"));
        assert_eq!(apply_rename_rule("lowercase", "NotFound").as_deref(), Some("notfound"));
        assert_eq!(apply_rename_rule("snake_case", "NotFound").as_deref(), Some("not_found"));
        assert_eq!(apply_rename_rule("Title Case", "x"), None);
    }

    #[test]
    fn test_from_serde() {
        assert_eq!(NamingStrategy::from_serde("camelCase"), Some(NamingStrategy::Camel));
        assert_eq!(NamingStrategy::from_serde("kebab-case"), None);
    }
}
