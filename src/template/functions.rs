//! Transformation functions usable after `|` in a template expression.

use std::collections::HashMap;

use once_cell::sync::Lazy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFunction {
    Singularize,
    Pluralize,
    UpperCase,
    LowerCase,
    LowerCamelCase,
    UpperCamelCase,
    LowerUnderscoreCase,
    UpperUnderscoreCase,
    LowerHyphenCase,
    UpperHyphenCase,
}

static FUNCTIONS: Lazy<HashMap<&'static str, TemplateFunction>> = Lazy::new(|| {
    use TemplateFunction::*;
    HashMap::from([
        ("singularize", Singularize),
        ("pluralize", Pluralize),
        ("uppercase", UpperCase),
        ("lowercase", LowerCase),
        ("lowercamelcase", LowerCamelCase),
        ("uppercamelcase", UpperCamelCase),
        ("lowerunderscorecase", LowerUnderscoreCase),
        ("upperunderscorecase", UpperUnderscoreCase),
        ("lowerhyphencase", LowerHyphenCase),
        ("upperhyphencase", UpperHyphenCase),
    ])
});

impl TemplateFunction {
    pub fn lookup(name: &str) -> Option<TemplateFunction> {
        FUNCTIONS.get(name).copied()
    }

    /// Every function name, sorted.
    pub fn names() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = FUNCTIONS.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn apply(&self, value: &str) -> String {
        match self {
            TemplateFunction::Singularize => singularize(value),
            TemplateFunction::Pluralize => pluralize(value),
            TemplateFunction::UpperCase => value.to_uppercase(),
            TemplateFunction::LowerCase => value.to_lowercase(),
            TemplateFunction::LowerCamelCase => camel(value, false),
            TemplateFunction::UpperCamelCase => camel(value, true),
            TemplateFunction::LowerUnderscoreCase => words(value).join("_").to_lowercase(),
            TemplateFunction::UpperUnderscoreCase => words(value).join("_").to_uppercase(),
            TemplateFunction::LowerHyphenCase => words(value).join("-").to_lowercase(),
            TemplateFunction::UpperHyphenCase => words(value).join("-").to_uppercase(),
        }
    }
}

/// Splits on separators and lower-to-upper case boundaries.
fn words(value: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut previous_lower = false;
    for c in value.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                result.push(std::mem::take(&mut current));
            }
            previous_lower = false;
            continue;
        }
        if c.is_uppercase() && previous_lower && !current.is_empty() {
            result.push(std::mem::take(&mut current));
        }
        previous_lower = c.is_lowercase() || c.is_numeric();
        current.push(c);
    }
    if !current.is_empty() {
        result.push(current);
    }
    result
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn camel(value: &str, upper_first: bool) -> String {
    words(value)
        .iter()
        .enumerate()
        .map(|(i, w)| {
            if i == 0 && !upper_first {
                w.to_lowercase()
            } else {
                capitalize(w)
            }
        })
        .collect()
}

fn ends_with_consonant_y(value: &str) -> bool {
    let mut chars = value.chars().rev();
    matches!(chars.next(), Some('y' | 'Y'))
        && chars
            .next()
            .map_or(false, |c| !"aeiouAEIOU".contains(c))
}

fn pluralize(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    if ends_with_consonant_y(value) {
        return format!("{}ies", &value[..value.len() - 1]);
    }
    let lower = value.to_lowercase();
    if ["s", "x", "z", "ch", "sh"].iter().any(|s| lower.ends_with(s)) {
        return format!("{}es", value);
    }
    format!("{}s", value)
}

fn singularize(value: &str) -> String {
    let lower = value.to_lowercase();
    if lower.ends_with("ies") && value.len() > 3 {
        return format!("{}y", &value[..value.len() - 3]);
    }
    if ["ses", "xes", "zes", "ches", "shes"].iter().any(|s| lower.ends_with(s)) {
        return value[..value.len() - 2].to_string();
    }
    if lower.ends_with('s') && !lower.ends_with("ss") {
        return value[..value.len() - 1].to_string();
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(name: &str, value: &str) -> String {
        TemplateFunction::lookup(name).unwrap().apply(value)
    }

    #[test]
    fn inflection() {
        assert_eq!(apply("singularize", "users"), "user");
        assert_eq!(apply("singularize", "categories"), "category");
        assert_eq!(apply("singularize", "boxes"), "box");
        assert_eq!(apply("pluralize", "user"), "users");
        assert_eq!(apply("pluralize", "category"), "categories");
        assert_eq!(apply("pluralize", "day"), "days");
        assert_eq!(apply("pluralize", "box"), "boxes");
    }

    #[test]
    fn case_conversion() {
        assert_eq!(apply("uppercase", "userId"), "USERID");
        assert_eq!(apply("lowercamelcase", "user-name"), "userName");
        assert_eq!(apply("uppercamelcase", "user_name"), "UserName");
        assert_eq!(apply("lowerunderscorecase", "userName"), "user_name");
        assert_eq!(apply("upperunderscorecase", "user-name"), "USER_NAME");
        assert_eq!(apply("lowerhyphencase", "UserName"), "user-name");
        assert_eq!(apply("upperhyphencase", "user name"), "USER-NAME");
    }

    #[test]
    fn unknown_names_are_absent() {
        assert!(TemplateFunction::lookup("reverse").is_none());
        assert_eq!(TemplateFunction::names().len(), 10);
    }
}
