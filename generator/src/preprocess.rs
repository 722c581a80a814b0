//! Disjunction flattening.
//!
//! Rewrites a [`File`] so emitters only meet disjunctions they can render:
//! `T | null` collapses into a nullable `T`, every other disjunction is
//! replaced by a reference to a synthesized *variant holder* struct with one
//! optional, nullable `Val<Branch>` field per branch. Arrays of scalar leaves
//! keep their union for targets that have one.
//!
//! The holder registry lives for one call of [`preprocess`]; running the pass
//! on its own output changes nothing.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use sg_schema::{Definition, Field, File, TypeId};
use tracing::{debug, trace};

use crate::error::Error;
use crate::naming::{holder_name, variant_name};

pub fn preprocess(file: &mut File) -> Result<(), Error> {
    let existing: HashMap<String, Definition> = file
        .types
        .iter()
        .map(|def| (def.name.clone(), def.clone()))
        .collect();
    let mut flattener = Flattener {
        existing,
        holders: IndexMap::new(),
    };

    let types = std::mem::take(&mut file.types);
    let mut flattened = Vec::with_capacity(types.len());
    for def in types {
        trace!(type_name = %def.name, "flattening");
        flattened.push(flattener.top_level(def)?);
    }
    flattened.extend(flattener.holders.into_values());
    file.types = flattened;
    Ok(())
}

struct Flattener {
    existing: HashMap<String, Definition>,
    holders: IndexMap<String, Definition>,
}

impl Flattener {
    fn top_level(&mut self, mut def: Definition) -> Result<Definition, Error> {
        match def.type_ {
            TypeId::Struct => {
                for field in &mut def.fields {
                    let type_ = std::mem::replace(&mut field.type_, Definition::new(TypeId::Any));
                    field.type_ = self.flatten(type_)?;
                }
                Ok(def)
            }
            TypeId::Enum => Ok(def),
            TypeId::Disjunction => {
                let branches = self.flatten_all(std::mem::take(&mut def.branches))?;
                def.branches = branches;
                if def.non_null_branches().count() <= 1 {
                    let collapsed = collapse(def);
                    // The surviving branch may itself need flattening.
                    return self.top_level(collapsed);
                }
                let holder = holder(&def.name, &def.branches)?;
                Ok(Definition {
                    nullable: def.has_null_branch(),
                    is_entry_point: def.is_entry_point,
                    comments: def.comments,
                    ..holder
                })
            }
            _ => self.flatten(def),
        }
    }

    fn flatten_all(&mut self, defs: Vec<Definition>) -> Result<Vec<Definition>, Error> {
        defs.into_iter().map(|d| self.flatten(d)).collect()
    }

    fn flatten(&mut self, mut def: Definition) -> Result<Definition, Error> {
        match def.type_ {
            TypeId::Disjunction => {
                let branches = self.flatten_all(std::mem::take(&mut def.branches))?;
                def.branches = branches;
                if def.non_null_branches().count() <= 1 {
                    return Ok(collapse(def));
                }
                let name = self.register(&def.branches)?;
                Ok(Definition {
                    nullable: def.has_null_branch(),
                    comments: def.comments,
                    ..Definition::reference(name)
                })
            }
            TypeId::Array => {
                if let Some(value_type) = def.value_type.take() {
                    def.value_type = Some(Box::new(self.flatten_element(*value_type)?));
                }
                Ok(def)
            }
            TypeId::Map => {
                if let Some(value_type) = def.value_type.take() {
                    def.value_type = Some(Box::new(self.flatten(*value_type)?));
                }
                Ok(def)
            }
            _ => Ok(def),
        }
    }

    fn flatten_element(&mut self, def: Definition) -> Result<Definition, Error> {
        if def.is_leaf_union() {
            if def.non_null_branches().count() <= 1 {
                return Ok(collapse(def));
            }
            return Ok(def);
        }
        self.flatten(def)
    }

    /// Returns the name of the holder standing in for `branches`.
    fn register(&mut self, branches: &[Definition]) -> Result<String, Error> {
        let name = holder_name(branches.iter().filter(|b| b.type_ != TypeId::Null));
        let holder = holder(&name, branches)?;

        let reusable = match self.holders.get(&name) {
            Some(known) => Some(*known == holder),
            None => match self.existing.get(&name).cloned() {
                Some(declared) => Some(self.same_shape(declared, &holder)?),
                None => None,
            },
        };
        match reusable {
            Some(true) => Ok(name),
            Some(false) => Err(Error::PreprocessCollision {
                type_name: name,
                message: "synthesized variant holder clashes with an existing definition".into(),
            }),
            None => {
                debug!(holder = %name, "synthesized variant holder");
                self.holders.insert(name.clone(), holder);
                Ok(name)
            }
        }
    }

    /// Whether a declared top-level definition flattens to the same fields as
    /// `holder`, so references can point at it instead.
    fn same_shape(&mut self, declared: Definition, holder: &Definition) -> Result<bool, Error> {
        match declared.type_ {
            TypeId::Struct => Ok(declared.fields == holder.fields),
            TypeId::Disjunction => {
                let branches = self.flatten_all(declared.branches)?;
                if branches.iter().filter(|b| b.type_ != TypeId::Null).count() <= 1 {
                    return Ok(false);
                }
                Ok(self::holder(&declared.name, &branches)?.fields == holder.fields)
            }
            _ => Ok(false),
        }
    }
}

/// A `T | null` (or a disjunction deduplicated down to one branch) as the
/// branch itself.
fn collapse(def: Definition) -> Definition {
    let nullable = def.has_null_branch();
    let Definition {
        name,
        comments,
        branches,
        is_entry_point,
        constraints,
        default,
        ..
    } = def;

    let Some(mut branch) = branches.into_iter().find(|b| b.type_ != TypeId::Null) else {
        // Only `null` is left.
        return Definition {
            name,
            comments,
            is_entry_point,
            default,
            ..Definition::new(TypeId::Null)
        };
    };
    branch.name = name;
    branch.is_entry_point = is_entry_point;
    branch.nullable |= nullable;
    branch.constraints.extend(constraints);
    if default.is_some() {
        branch.default = default;
    }
    if !comments.is_empty() {
        branch.comments = comments;
    }
    branch
}

/// The variant holder struct for `branches`; `null` branches only surface as
/// nullability of the reference to it.
fn holder(name: &str, branches: &[Definition]) -> Result<Definition, Error> {
    let mut seen = HashSet::new();
    let mut fields = Vec::new();
    for branch in branches.iter().filter(|b| b.type_ != TypeId::Null) {
        let field_name = format!("Val{}", variant_name(branch));
        if !seen.insert(field_name.clone()) {
            return Err(Error::PreprocessCollision {
                type_name: name.to_owned(),
                message: format!("two branches map to the field {field_name}"),
            });
        }
        let mut type_ = branch.clone();
        type_.nullable = true;
        fields.push(Field::new(field_name, type_, false));
    }
    Ok(Definition::structure(name, fields))
}

#[cfg(test)]
mod tests {
    use sg_schema::{ConstraintOp, Scalar, TypeConstraint};

    use super::*;
    use crate::ErrorKind;

    fn leaf(type_: TypeId) -> Definition {
        Definition::new(type_)
    }

    fn file_with_fields(fields: Vec<Field>) -> File {
        let mut dashboard = Definition::structure("Dashboard", fields);
        dashboard.is_entry_point = true;
        File {
            package: "dashboard".into(),
            types: vec![dashboard],
        }
    }

    fn field<'a>(file: &'a File, name: &str) -> &'a Field {
        file.types[0].fields.iter().find(|f| f.name == name).unwrap()
    }

    #[test]
    fn nullable_scalar_collapses() {
        let note = Definition::disjunction(vec![
            leaf(TypeId::String).with_constraints(vec![TypeConstraint::new(
                ConstraintOp::MaxLength,
                Scalar::Int(10),
            )]),
            leaf(TypeId::Null),
        ]);
        let mut file = file_with_fields(vec![Field::new("note", note, false)]);
        preprocess(&mut file).unwrap();

        let note = field(&file, "note");
        assert_eq!(note.type_.type_, TypeId::String);
        assert!(note.type_.nullable);
        assert!(!note.required);
        assert_eq!(note.type_.constraints.len(), 1);
        assert_eq!(file.types.len(), 1);
    }

    #[test]
    fn general_disjunction_synthesizes_a_holder() {
        let value = Definition::disjunction(vec![
            leaf(TypeId::String),
            leaf(TypeId::Int64),
            leaf(TypeId::Null),
        ]);
        let mut file = file_with_fields(vec![Field::new("value", value, true)]);
        preprocess(&mut file).unwrap();

        let value = field(&file, "value");
        assert_eq!(value.type_.reference_name(), Some("StringOrInt"));
        assert!(value.type_.nullable);

        let holder = file.get("StringOrInt").unwrap();
        assert_eq!(holder.type_, TypeId::Struct);
        let names: Vec<_> = holder.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["ValString", "ValInt"]);
        assert!(holder.fields.iter().all(|f| !f.required && f.type_.nullable));
        assert!(file.validate().is_ok());
    }

    #[test]
    fn identical_disjunctions_share_one_holder() {
        let union = || Definition::disjunction(vec![leaf(TypeId::Bool), Definition::reference("Dashboard")]);
        let mut file = file_with_fields(vec![
            Field::new("a", union(), true),
            Field::new("b", Definition::map(TypeId::String, union()), true),
        ]);
        preprocess(&mut file).unwrap();
        assert_eq!(file.types.len(), 2);
        assert_eq!(file.types[1].name, "BoolOrDashboard");
        let b = &field(&file, "b").type_;
        assert_eq!(b.value_type().and_then(Definition::reference_name), Some("BoolOrDashboard"));
    }

    #[test]
    fn leaf_unions_survive_in_arrays() {
        let tags = Definition::array(Definition::disjunction(vec![
            leaf(TypeId::String),
            leaf(TypeId::Int64),
        ]));
        let ids = Definition::array(Definition::disjunction(vec![leaf(TypeId::Int32), leaf(TypeId::Null)]));
        let panels = Definition::array(Definition::disjunction(vec![
            Definition::reference("Dashboard"),
            leaf(TypeId::String),
        ]));
        let mut file = file_with_fields(vec![
            Field::new("tags", tags, true),
            Field::new("ids", ids, true),
            Field::new("panels", panels, true),
        ]);
        preprocess(&mut file).unwrap();

        let tags = field(&file, "tags").type_.value_type().unwrap();
        assert!(tags.is_leaf_union());
        assert_eq!(tags.branches.len(), 2);

        let ids = field(&file, "ids").type_.value_type().unwrap();
        assert_eq!(ids.type_, TypeId::Int32);
        assert!(ids.nullable);

        let panels = field(&file, "panels").type_.value_type().unwrap();
        assert_eq!(panels.reference_name(), Some("DashboardOrString"));
    }

    #[test]
    fn top_level_disjunctions() {
        let mut file = File {
            package: "p".into(),
            types: vec![
                Definition {
                    name: "MaybeName".into(),
                    ..Definition::disjunction(vec![leaf(TypeId::String), leaf(TypeId::Null)])
                },
                Definition {
                    name: "Value".into(),
                    ..Definition::disjunction(vec![leaf(TypeId::String), leaf(TypeId::Bool)])
                },
            ],
        };
        preprocess(&mut file).unwrap();
        assert_eq!(file.types.len(), 2);
        assert_eq!(file.types[0].type_, TypeId::String);
        assert!(file.types[0].nullable);
        assert_eq!(file.types[0].name, "MaybeName");
        assert_eq!(file.types[1].type_, TypeId::Struct);
        assert_eq!(file.types[1].fields[1].name, "ValBool");
    }

    #[test]
    fn holder_name_clash_is_a_collision() {
        let mut file = file_with_fields(vec![Field::new(
            "value",
            Definition::disjunction(vec![leaf(TypeId::String), leaf(TypeId::Bool)]),
            true,
        )]);
        file.types.push(Definition::structure("StringOrBool", vec![]));
        let err = preprocess(&mut file).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreprocessCollision);
    }

    #[test]
    fn declared_holder_is_reused() {
        let union = || Definition::disjunction(vec![leaf(TypeId::String), leaf(TypeId::Bool)]);
        let mut file = file_with_fields(vec![Field::new("value", union(), true)]);
        file.types.push(Definition {
            name: "StringOrBool".into(),
            comments: vec!["Either form.".into()],
            ..union()
        });
        preprocess(&mut file).unwrap();

        assert_eq!(file.types.len(), 2);
        assert_eq!(field(&file, "value").type_.reference_name(), Some("StringOrBool"));
        let declared = file.get("StringOrBool").unwrap();
        assert_eq!(declared.type_, TypeId::Struct);
        assert_eq!(declared.comments, ["Either form."]);
        assert!(file.validate().is_ok());
    }

    #[test]
    fn same_named_branches_are_a_collision() {
        let arrays = Definition::disjunction(vec![
            Definition::array(leaf(TypeId::String)),
            Definition::array(leaf(TypeId::Int64)),
        ]);
        let mut file = file_with_fields(vec![Field::new("value", arrays, true)]);
        let err = preprocess(&mut file).unwrap_err();
        assert!(err.to_string().contains("ValArray"));
    }

    #[test]
    fn second_run_changes_nothing() {
        let mut file = file_with_fields(vec![
            Field::new(
                "value",
                Definition::disjunction(vec![leaf(TypeId::String), leaf(TypeId::Int64), leaf(TypeId::Null)]),
                false,
            ),
            Field::new(
                "note",
                Definition::disjunction(vec![leaf(TypeId::String), leaf(TypeId::Null)]),
                false,
            ),
        ]);
        preprocess(&mut file).unwrap();
        let once = file.clone();
        preprocess(&mut file).unwrap();
        assert_eq!(file, once);
    }

    #[test]
    fn scalars_and_references_need_no_holders() {
        let mut file = file_with_fields(vec![
            Field::new("title", leaf(TypeId::String), true),
            Field::new("self", Definition::reference("Dashboard"), false),
        ]);
        let before = file.clone();
        preprocess(&mut file).unwrap();
        assert_eq!(file, before);
    }
}
