use sg_schema::{Definition, TypeId};

pub fn convert<F: NamingConvention, T: NamingConvention>(source: &str) -> String {
    T::concatenate(&F::split(source))
}

pub trait NamingConvention {
    fn split(name: &str) -> Vec<&str>;
    fn concatenate(words: &[&str]) -> String;
}

pub struct SnakeCase;

impl NamingConvention for SnakeCase {
    fn split(name: &str) -> Vec<&str> {
        name.split('_').filter(|w| !w.is_empty()).collect()
    }

    fn concatenate(words: &[&str]) -> String {
        words
            .iter()
            .map(|w| w.to_lowercase())
            .collect::<Vec<_>>()
            .join("_")
    }
}

pub struct CamelCase;

impl NamingConvention for CamelCase {
    fn split(name: &str) -> Vec<&str> {
        if name.is_empty() {
            return vec![];
        }
        let mut words = vec![];
        let mut start = 0;
        for (i, c) in name.char_indices().skip(1) {
            if c.is_uppercase() {
                words.push(&name[start..i]);
                start = i;
            }
        }
        words.push(&name[start..]);
        words
    }

    fn concatenate(words: &[&str]) -> String {
        let Some((first, rest)) = words.split_first() else {
            return String::new();
        };
        let mut result = first.to_lowercase();
        for word in rest {
            push_capitalized(&mut result, word);
        }
        result
    }
}

pub struct PascalCase;

impl NamingConvention for PascalCase {
    fn split(name: &str) -> Vec<&str> {
        CamelCase::split(name)
    }

    fn concatenate(words: &[&str]) -> String {
        let mut result = String::new();
        for word in words {
            push_capitalized(&mut result, word);
        }
        result
    }
}

/// Words separated by anything that cannot appear in an identifier, e.g.
/// `panel-id`, `panel id` or `panel.id`.
pub struct Separated;

impl NamingConvention for Separated {
    fn split(name: &str) -> Vec<&str> {
        name.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect()
    }

    fn concatenate(words: &[&str]) -> String {
        words.join("_")
    }
}

fn push_capitalized(result: &mut String, word: &str) {
    let mut chars = word.chars();
    if let Some(first) = chars.next() {
        result.extend(first.to_uppercase());
        result.extend(chars.flat_map(char::to_lowercase));
    }
}

/// Uppercases the first character and keeps the rest as written.
pub fn title(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// An exported identifier for targets where capitalization controls
/// visibility: every separated word title-cased, inner casing kept.
///
/// `panelIDs` stays `PanelIDs`, `time-range` becomes `TimeRange`.
pub fn exported(name: &str) -> String {
    let joined: String = Separated::split(name).into_iter().map(title).collect();
    match joined.chars().next() {
        None => "_".to_owned(),
        Some(c) if c.is_ascii_digit() => format!("_{joined}"),
        Some(_) => joined,
    }
}

/// Name of a disjunction branch inside a variant holder.
pub fn variant_name(branch: &Definition) -> String {
    match &branch.type_ {
        TypeId::Ref(name) => title(name),
        TypeId::Int64 => "Int".to_owned(),
        TypeId::Float64 => "Float".to_owned(),
        other => title(other.as_str()),
    }
}

/// Deterministic name of the holder synthesized for `branches`.
pub fn holder_name<'a>(branches: impl IntoIterator<Item = &'a Definition>) -> String {
    let names: Vec<String> = branches.into_iter().map(variant_name).collect();
    title(&names.join("Or"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_splits_correctly() {
        let source = "helloWorld";
        let words = CamelCase::split(source);
        assert_eq!(words, vec!["hello", "World"]);
    }

    #[test]
    fn camel_case_split_noop() {
        let source = "hello";
        let words = CamelCase::split(source);
        assert_eq!(words, vec!["hello"]);
    }

    #[test]
    fn camel_case_split_single_letter() {
        assert_eq!(CamelCase::split("i"), vec!["i"]);
        assert_eq!(CamelCase::split("inI"), vec!["in", "I"]);
        assert!(CamelCase::split("").is_empty());
    }

    #[test]
    fn camel_case_concatenates_correctly() {
        let name = CamelCase::concatenate(&["HElLo", "wOrLd"]);
        assert_eq!(name, "helloWorld")
    }

    #[test]
    fn snake_case_roundtrip() {
        let source = "hello_world";
        let name = SnakeCase::split(source);
        assert_eq!(name, vec!["hello", "world"]);
        let concat = SnakeCase::concatenate(&name);
        assert_eq!(concat, source);
    }

    #[test]
    fn pascal_case_concat_works() {
        let name = PascalCase::concatenate(&["HElLo", "wOrLd", ""]);
        assert_eq!(name, "HelloWorld")
    }

    #[test]
    fn converts_between_conventions() {
        assert_eq!(convert::<SnakeCase, PascalCase>("time_range"), "TimeRange");
        assert_eq!(convert::<CamelCase, SnakeCase>("refreshInterval"), "refresh_interval");
    }

    #[test]
    fn exported_names() {
        assert_eq!(exported("title"), "Title");
        assert_eq!(exported("panelIDs"), "PanelIDs");
        assert_eq!(exported("time-range"), "TimeRange");
        assert_eq!(exported("1x"), "_1x");
        assert_eq!(exported("--"), "_");
    }

    #[test]
    fn holder_names_follow_the_branches() {
        let branches = [
            Definition::new(TypeId::String),
            Definition::new(TypeId::Int64),
            Definition::reference("panel"),
            Definition::new(TypeId::Float32),
        ];
        assert_eq!(holder_name(&branches), "StringOrIntOrPanelOrFloat32");
        assert_eq!(variant_name(&Definition::array(Definition::new(TypeId::Any))), "Array");
    }
}
