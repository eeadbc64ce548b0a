// This file is part of the terraform-provider-ibm-iam-policy project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::borrow::Cow;
use std::cell::RefCell;

use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType, Block, Description};
use tf_provider::value::{Value, ValueList, ValueString};
use tf_provider::{AttributePath, Diagnostics};

pub(crate) trait WithValidate {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath);
}

impl<T: WithValidate> WithValidate for Value<T> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        if let Value::Value(value) = self {
            value.validate(diags, attr_path);
        }
    }
}

pub(crate) fn attribute(
    attr_type: AttributeType,
    constraint: AttributeConstraint,
    description: &str,
) -> Attribute {
    Attribute {
        attr_type,
        description: Description::plain(description),
        constraint,
        sensitive: false,
        deprecated: false,
    }
}

pub(crate) fn string_list_type() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::String))
}

/// Attribute type holding the same values as `block` when used as a single or list nested block.
///
/// Data sources cannot fill nested blocks, they expose computed attributes of this type instead.
pub(crate) fn block_as_list_type(block: &Block) -> AttributeType {
    use tf_provider::schema::NestedBlock;

    let attributes = block
        .attributes
        .iter()
        .map(|(name, attribute)| (name.clone(), attribute.attr_type.clone()));
    let blocks = block.blocks.iter().map(|(name, nested)| {
        let attr_type = match nested {
            NestedBlock::List(inner) | NestedBlock::Optional(inner) => block_as_list_type(inner),
            _ => AttributeType::Any,
        };
        (name.clone(), attr_type)
    });
    AttributeType::List(Box::new(AttributeType::Object(attributes.chain(blocks).collect())))
}

/// Known value, if any
pub(crate) fn known<T>(value: &Value<T>) -> Option<&T> {
    match value {
        Value::Value(value) => Some(value),
        _ => None,
    }
}

pub(crate) fn as_str<'b>(value: &'b ValueString<'_>) -> Option<&'b str> {
    known(value).map(|value| value.as_ref())
}

pub(crate) fn to_string(value: &ValueString<'_>) -> Option<String> {
    as_str(value).map(str::to_owned)
}

pub(crate) fn value<'a>(value: impl Into<String>) -> ValueString<'a> {
    Value::Value(Cow::Owned(value.into()))
}

/// Empty or missing strings are null
pub(crate) fn value_or_null<'a>(value: Option<String>) -> ValueString<'a> {
    match value {
        Some(value) if !value.is_empty() => Value::Value(Cow::Owned(value)),
        _ => Value::Null,
    }
}

pub(crate) fn strings(list: &ValueList<ValueString<'_>>) -> Vec<String> {
    known(list)
        .into_iter()
        .flatten()
        .filter_map(to_string)
        .collect()
}

/// Empty lists are null
pub(crate) fn string_list<'a>(items: Vec<String>) -> ValueList<ValueString<'a>> {
    if items.is_empty() {
        Value::Null
    } else {
        Value::Value(items.into_iter().map(value).collect())
    }
}

/// Empty strings read back as null, reject them instead of planning a diff forever
pub(crate) fn reject_empty(
    value: &ValueString<'_>,
    diags: &mut Diagnostics,
    attr_path: AttributePath,
) {
    if as_str(value).is_some_and(str::is_empty) {
        diags.error_short(
            "Value cannot be empty, omit the attribute instead",
            attr_path,
        );
    }
}

/// Empty lists read back as null, reject them instead of planning a diff forever
pub(crate) fn reject_empty_list<T>(
    list: &ValueList<T>,
    diags: &mut Diagnostics,
    attr_path: AttributePath,
) {
    if known(list).is_some_and(Vec::is_empty) {
        diags.error_short(
            "List cannot be empty, omit the attribute instead",
            attr_path,
        );
    }
}

pub(crate) fn blocks<'b, T>(list: &'b ValueList<Value<T>>) -> impl Iterator<Item = &'b T> {
    known(list).into_iter().flatten().filter_map(known)
}

/// Mark a computed attribute unknown, unless the configuration already provides it
pub(crate) fn unknown_if_null<T>(value: &mut Value<T>) {
    if let Value::Null = value {
        *value = Value::Unknown;
    }
}

pub struct DisplayJoiner<'a, T, I>
where
    T: Iterator<Item = I>,
    I: std::fmt::Display,
{
    iter: RefCell<T>,
    sep: &'a str,
}

pub trait DisplayJoinable {
    type Joiner<'a>;
    fn join_with(self, sep: &str) -> Self::Joiner<'_>;
}

impl<T, I> DisplayJoinable for T
where
    T: Iterator<Item = I>,
    I: std::fmt::Display,
{
    type Joiner<'a> = DisplayJoiner<'a, T, I>;

    fn join_with(self, sep: &str) -> Self::Joiner<'_> {
        DisplayJoiner {
            iter: RefCell::new(self),
            sep,
        }
    }
}

impl<'a, T, I> std::fmt::Display for DisplayJoiner<'a, T, I>
where
    T: Iterator<Item = I>,
    I: std::fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sep = "";
        let mut iter = self.iter.try_borrow_mut().or(Err(std::fmt::Error))?;
        for elt in iter.by_ref() {
            f.write_str(sep)?;
            f.write_fmt(format_args!("{elt}"))?;
            sep = self.sep;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_with_separator() {
        let names = ["Viewer", "Editor", "Administrator"];
        assert_eq!(
            names.iter().join_with(", ").to_string(),
            "Viewer, Editor, Administrator"
        );
        assert_eq!(std::iter::empty::<&str>().join_with(", ").to_string(), "");
    }

    #[test]
    fn empty_values_are_rejected() {
        let mut diags = Diagnostics::default();
        reject_empty(&value(""), &mut diags, AttributePath::new("description"));
        reject_empty(&value("kms"), &mut diags, AttributePath::new("description"));
        reject_empty(&Value::Null, &mut diags, AttributePath::new("description"));
        assert_eq!(diags.errors.len(), 1);

        let mut diags = Diagnostics::default();
        let unset = string_list(Vec::new());
        reject_empty_list(&unset, &mut diags, AttributePath::new("roles"));
        reject_empty_list::<ValueString>(
            &Value::Value(vec![]),
            &mut diags,
            AttributePath::new("roles"),
        );
        reject_empty_list(
            &string_list(vec!["Viewer".into()]),
            &mut diags,
            AttributePath::new("roles"),
        );
        assert_eq!(diags.errors.len(), 1);
    }

    #[test]
    fn empty_strings_are_null() {
        assert_eq!(value_or_null(Some(String::new())), Value::Null);
        assert_eq!(value_or_null(None), Value::Null);
        assert_eq!(as_str(&value_or_null(Some("a".into()))), Some("a"));
    }

    #[test]
    fn string_lists_skip_unset_items() {
        let list: ValueList<ValueString> = Value::Value(vec![
            value("am.read"),
            Value::Null,
            Value::Unknown,
            value("am.write"),
        ]);
        assert_eq!(strings(&list), ["am.read", "am.write"]);
        assert_eq!(string_list(vec![]), Value::Null);
        assert_eq!(strings(&string_list(vec!["a".into()])), ["a"]);
    }
}
