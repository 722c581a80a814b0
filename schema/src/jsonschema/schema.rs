//! Typed model of the draft-7 vocabulary the front end understands.
//! Unknown keywords are ignored.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "$ref")]
    pub reference: Option<String>,
    #[serde(rename = "$comment")]
    pub comment: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,

    #[serde(rename = "type")]
    pub type_: Option<TypeSet>,
    pub format: Option<String>,
    #[serde(rename = "enum")]
    pub enum_: Option<Vec<Value>>,
    #[serde(rename = "const")]
    pub const_: Option<Value>,
    pub default: Option<Value>,
    /// Member names for integer enums, as used by several code generators.
    #[serde(rename = "x-enum-varnames")]
    pub enum_varnames: Option<Vec<String>>,

    #[serde(default)]
    pub properties: IndexMap<String, Schema>,
    #[serde(default)]
    pub required: Vec<String>,
    pub additional_properties: Option<BoolOrSchema>,
    pub items: Option<Items>,

    pub minimum: Option<serde_json::Number>,
    pub maximum: Option<serde_json::Number>,
    /// A number since draft 6; draft 4 used a boolean modifier instead.
    pub exclusive_minimum: Option<Value>,
    pub exclusive_maximum: Option<Value>,
    pub multiple_of: Option<serde_json::Number>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,

    #[serde(default)]
    pub all_of: Vec<Schema>,
    #[serde(default)]
    pub any_of: Vec<Schema>,
    #[serde(default)]
    pub one_of: Vec<Schema>,

    #[serde(default)]
    pub definitions: IndexMap<String, Schema>,
    #[serde(default, rename = "$defs")]
    pub defs: IndexMap<String, Schema>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum TypeSet {
    Single(String),
    Many(Vec<String>),
}

impl TypeSet {
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Single(name) => vec![name.as_str()],
            Self::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum BoolOrSchema {
    Bool(bool),
    Schema(Box<Schema>),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum Items {
    Single(Box<Schema>),
    Tuple(Vec<Schema>),
}

impl Schema {
    pub fn is_object(&self) -> bool {
        self.type_
            .as_ref()
            .is_some_and(|t| t.names() == ["object"])
            || !self.properties.is_empty()
    }

    /// Documentation lines: `$comment`, falling back to `description`.
    pub fn comments(&self) -> Vec<String> {
        self.comment
            .as_deref()
            .or(self.description.as_deref())
            .map(|text| {
                text.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Both definition tables, `definitions` first.
    pub fn all_definitions(&self) -> impl Iterator<Item = (&String, &Schema)> {
        self.definitions.iter().chain(self.defs.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_keep_document_order() {
        let schema: Schema = serde_json::from_str(
            r#"{"type": "object", "properties": {"zeta": {"type": "string"}, "alpha": {"type": ["integer", "null"]}}}"#,
        )
        .unwrap();
        let names: Vec<_> = schema.properties.keys().map(String::as_str).collect();
        assert_eq!(names, ["zeta", "alpha"]);
        assert!(matches!(schema.properties["alpha"].type_, Some(TypeSet::Many(ref t)) if t.len() == 2));
        assert!(schema.is_object());
    }

    #[test]
    fn comment_wins_over_description() {
        let schema: Schema =
            serde_json::from_str(r#"{"$comment": "first\n\nsecond", "description": "ignored"}"#).unwrap();
        assert_eq!(schema.comments(), vec!["first", "second"]);
    }

    #[test]
    fn additional_properties_and_tuples() {
        let schema: Schema = serde_json::from_str(
            r#"{"additionalProperties": {"type": "string"}, "items": [{"type": "number"}, {"type": "number"}]}"#,
        )
        .unwrap();
        assert!(matches!(schema.additional_properties, Some(BoolOrSchema::Schema(_))));
        assert!(matches!(schema.items, Some(Items::Tuple(ref v)) if v.len() == 2));
    }
}
