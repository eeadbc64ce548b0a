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

use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeType, Block, Description, NestedBlock};
use tf_provider::value::{Value, ValueBool, ValueString};
use tf_provider::map;

use crate::client::Template;
use crate::utils::{attribute, block_as_list_type, value, value_or_null};

/// Which object a template schema describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateSchema {
    /// A template, created with its first version
    Template,
    /// A new version of an existing template
    Version,
    /// Read-only lookup of a template version
    DataSource,
}

/// Fields shared by every template kind, whatever the name of its body block
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TemplateFields<'a, B> {
    pub id: ValueString<'a>,
    pub template_id: ValueString<'a>,
    pub version: ValueString<'a>,
    pub account_id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub committed: ValueBool,
    pub state: ValueString<'a>,
    pub href: ValueString<'a>,
    pub created_at: ValueString<'a>,
    pub created_by_id: ValueString<'a>,
    pub last_modified_at: ValueString<'a>,
    pub last_modified_by_id: ValueString<'a>,
    pub body: Value<B>,
}

/// Terraform state of a template kind.
///
/// Each kind names its body block differently, so every kind has its own
/// state struct, generated by [`template_state!`](crate::template_state).
pub trait WithTemplateFields<'a>:
    Debug + Default + Clone + PartialEq + Send + Sync + Serialize + for<'de> Deserialize<'de>
{
    type Body;

    fn into_fields(self) -> TemplateFields<'a, Self::Body>;
    fn from_fields(fields: TemplateFields<'a, Self::Body>) -> Self;
}

#[macro_export]
macro_rules! template_state {
    ($state:ident, $body:ident, $field:ident) => {
        #[derive(
            Debug, Default, Clone, PartialEq, Eq, ::serde::Serialize, ::serde::Deserialize,
        )]
        pub struct $state<'a> {
            pub id: ::tf_provider::value::ValueString<'a>,
            pub template_id: ::tf_provider::value::ValueString<'a>,
            pub version: ::tf_provider::value::ValueString<'a>,
            pub account_id: ::tf_provider::value::ValueString<'a>,
            pub name: ::tf_provider::value::ValueString<'a>,
            pub description: ::tf_provider::value::ValueString<'a>,
            pub committed: ::tf_provider::value::ValueBool,
            pub state: ::tf_provider::value::ValueString<'a>,
            pub href: ::tf_provider::value::ValueString<'a>,
            pub created_at: ::tf_provider::value::ValueString<'a>,
            pub created_by_id: ::tf_provider::value::ValueString<'a>,
            pub last_modified_at: ::tf_provider::value::ValueString<'a>,
            pub last_modified_by_id: ::tf_provider::value::ValueString<'a>,
            #[serde(with = "tf_provider::value::serde_as_vec")]
            pub $field: ::tf_provider::value::Value<$body<'a>>,
        }

        impl<'a> $crate::template::state::WithTemplateFields<'a> for $state<'a> {
            type Body = $body<'a>;

            fn into_fields(self) -> $crate::template::state::TemplateFields<'a, $body<'a>> {
                $crate::template::state::TemplateFields {
                    id: self.id,
                    template_id: self.template_id,
                    version: self.version,
                    account_id: self.account_id,
                    name: self.name,
                    description: self.description,
                    committed: self.committed,
                    state: self.state,
                    href: self.href,
                    created_at: self.created_at,
                    created_by_id: self.created_by_id,
                    last_modified_at: self.last_modified_at,
                    last_modified_by_id: self.last_modified_by_id,
                    body: self.$field,
                }
            }

            fn from_fields(fields: $crate::template::state::TemplateFields<'a, $body<'a>>) -> Self {
                Self {
                    id: fields.id,
                    template_id: fields.template_id,
                    version: fields.version,
                    account_id: fields.account_id,
                    name: fields.name,
                    description: fields.description,
                    committed: fields.committed,
                    state: fields.state,
                    href: fields.href,
                    created_at: fields.created_at,
                    created_by_id: fields.created_by_id,
                    last_modified_at: fields.last_modified_at,
                    last_modified_by_id: fields.last_modified_by_id,
                    $field: fields.body,
                }
            }
        }
    };
}

/// Terraform id of a template version
pub fn template_version_id(template_id: &str, version: &str) -> String {
    format!("{template_id}/{version}")
}

/// Split a `<template_id>/<version>` id
pub fn parse_template_version_id(id: &str) -> Option<(&str, &str)> {
    match id.split_once('/') {
        Some((template_id, version))
            if !template_id.is_empty() && !version.is_empty() && !version.contains('/') =>
        {
            Some((template_id, version))
        }
        _ => None,
    }
}

impl<'a, B> TemplateFields<'a, B> {
    /// Fill the attributes computed by the API from `template`
    pub fn set_computed(&mut self, template: &Template) {
        self.id = value(template_version_id(&template.id, &template.version));
        self.template_id = value(template.id.as_str());
        self.version = value(template.version.as_str());
        self.committed = Value::Value(template.committed);
        self.state = value_or_null(template.state.clone());
        self.href = value_or_null(template.href.clone());
        self.created_at = value_or_null(template.created_at.clone());
        self.created_by_id = value_or_null(template.created_by_id.clone());
        self.last_modified_at = value_or_null(template.last_modified_at.clone());
        self.last_modified_by_id = value_or_null(template.last_modified_by_id.clone());
        match template.account_id.clone() {
            Some(account_id) => self.account_id = value(account_id),
            None if self.account_id == Value::Unknown => self.account_id = Value::Null,
            None => (),
        }
    }

    /// Refresh every attribute from `template`, except the body
    pub fn set_all(&mut self, template: &Template) {
        self.set_computed(template);
        self.account_id = value_or_null(template.account_id.clone());
        self.name = value_or_null(template.name.clone());
        self.description = value_or_null(template.description.clone());
    }

    /// Attributes the API recomputes on every write
    pub fn mark_modified(&mut self) {
        self.state = Value::Unknown;
        self.last_modified_at = Value::Unknown;
        self.last_modified_by_id = Value::Unknown;
    }

    /// Id and version of the template version, falling back to the Terraform id after import
    pub fn version_key(&self) -> Option<(String, String)> {
        use crate::utils::as_str;

        match (as_str(&self.template_id), as_str(&self.version)) {
            (Some(template_id), Some(version)) => {
                Some((template_id.to_owned(), version.to_owned()))
            }
            _ => as_str(&self.id)
                .and_then(parse_template_version_id)
                .map(|(template_id, version)| (template_id.to_owned(), version.to_owned())),
        }
    }
}

/// Schema of a template kind, `body_block` being the schema of its body under `body_field`
pub fn template_schema(
    kind: &str,
    mode: TemplateSchema,
    body_field: &str,
    body_block: Block,
) -> Block {
    use tf_provider::schema::AttributeConstraint::{Computed, Optional, OptionalComputed, Required};

    let computed = |description: &str| attribute(AttributeType::String, Computed, description);
    let pick = |template, version, data_source| match mode {
        TemplateSchema::Template => template,
        TemplateSchema::Version => version,
        TemplateSchema::DataSource => data_source,
    };

    let mut block = Block {
        attributes: tf_provider::map! {
            "id" => computed("Terraform id: `<template_id>/<version>`"),
            "template_id" => attribute(
                AttributeType::String,
                pick(Computed, Required, Required),
                "Id of the template",
            ),
            "version" => attribute(
                AttributeType::String,
                pick(Computed, Computed, OptionalComputed),
                "Version of the template",
            ),
            "account_id" => attribute(
                AttributeType::String,
                pick(OptionalComputed, Computed, Computed),
                "Account owning the template (default: provider account_id)",
            ),
            "name" => attribute(
                AttributeType::String,
                pick(Required, Computed, Computed),
                "Name of the template, unique in the account",
            ),
            "description" => attribute(
                AttributeType::String,
                pick(Optional, Optional, Computed),
                "Description of the template version",
            ),
            "committed" => attribute(
                AttributeType::Bool,
                pick(OptionalComputed, OptionalComputed, Computed),
                "Whether the template version is committed and can no longer be modified",
            ),
            "state" => computed("State of the template version"),
            "href" => computed("Link to the template version"),
            "created_at" => computed("Creation time"),
            "created_by_id" => computed("Creator"),
            "last_modified_at" => computed("Last modification time"),
            "last_modified_by_id" => computed("Last modifier"),
        },
        description: Description::plain(match mode {
            TemplateSchema::Template => {
                format!("IAM {kind} template, created with its first version")
            }
            TemplateSchema::Version => format!("New version of an existing IAM {kind} template"),
            TemplateSchema::DataSource => format!("Look up a version of an IAM {kind} template"),
        }),
        ..Default::default()
    };

    if mode == TemplateSchema::DataSource {
        block.attributes.insert(
            body_field.to_owned(),
            attribute(
                block_as_list_type(&body_block),
                Computed,
                "Body of the template version",
            ),
        );
    } else {
        block
            .blocks
            .insert(body_field.to_owned(), NestedBlock::Optional(body_block));
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct DummyBody<'a> {
        pub service_name: ValueString<'a>,
    }

    crate::template_state!(DummyState, DummyBody, dummy);

    #[test]
    fn template_ids() {
        assert_eq!(template_version_id("tmpl-1", "3"), "tmpl-1/3");
        assert_eq!(parse_template_version_id("tmpl-1/3"), Some(("tmpl-1", "3")));
        assert_eq!(parse_template_version_id("tmpl-1"), None);
        assert_eq!(parse_template_version_id("/3"), None);
        assert_eq!(parse_template_version_id("tmpl-1/"), None);
        assert_eq!(parse_template_version_id("a/b/c"), None);
    }

    #[test]
    fn fields_round_trip_through_state() {
        let fields = TemplateFields {
            id: value("tmpl-1/1"),
            name: value("viewer"),
            body: Value::Value(DummyBody {
                service_name: value("am"),
            }),
            ..Default::default()
        };
        let state = DummyState::from_fields(fields.clone());
        assert_eq!(state.dummy, fields.body);
        assert_eq!(state.into_fields(), fields);
    }

    #[test]
    fn version_key_falls_back_to_id() {
        let mut fields = TemplateFields::<DummyBody> {
            id: value("tmpl-1/2"),
            ..Default::default()
        };
        assert_eq!(
            fields.version_key(),
            Some(("tmpl-1".to_owned(), "2".to_owned()))
        );
        fields.template_id = value("tmpl-9");
        fields.version = value("4");
        assert_eq!(
            fields.version_key(),
            Some(("tmpl-9".to_owned(), "4".to_owned()))
        );
    }

    #[test]
    fn computed_fields_come_from_the_api() {
        let mut fields = TemplateFields::<DummyBody> {
            name: value("viewer"),
            description: value("kept"),
            ..Default::default()
        };
        let template = Template {
            id: "tmpl-1".into(),
            version: "2".into(),
            account_id: Some("acct-1".into()),
            committed: true,
            description: Some("remote".into()),
            state: Some("active".into()),
            ..Default::default()
        };
        fields.set_computed(&template);
        assert_eq!(fields.id, value("tmpl-1/2"));
        assert_eq!(fields.committed, Value::Value(true));
        assert_eq!(fields.description, value("kept"));
        assert_eq!(fields.account_id, value("acct-1"));
        assert_eq!(fields.href, Value::Null);

        fields.set_all(&template);
        assert_eq!(fields.description, value("remote"));
        assert_eq!(fields.name, Value::Null);
    }
}
