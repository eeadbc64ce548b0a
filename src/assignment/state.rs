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

use serde::{Deserialize, Serialize};
use tf_provider::schema::{
    AttributeConstraint, AttributeType, Block, Description, NestedBlock, Schema,
};
use tf_provider::value::{Value, ValueList, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::client::models::{Target, TemplateRef};
use crate::client::Assignment;
use crate::timeouts::TimeoutsBlock;
use crate::utils::{
    as_str, attribute, block_as_list_type, to_string, value, value_or_null, WithValidate,
};

use super::AssignmentKind;

const TARGET_TYPES: [&str; 3] = ["Account", "AccountGroup", "Enterprise"];

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetBlock<'a> {
    #[serde(rename = "type")]
    pub target_type: ValueString<'a>,
    pub id: ValueString<'a>,
}

impl<'a> TargetBlock<'a> {
    fn schema() -> Block {
        Block {
            attributes: map! {
                "type" => attribute(
                    AttributeType::String,
                    AttributeConstraint::Required,
                    "Type of the target: `Account`, `AccountGroup` or `Enterprise`",
                ),
                "id" => attribute(
                    AttributeType::String,
                    AttributeConstraint::Required,
                    "Id of the target",
                ),
            },
            description: Description::plain("Where the template is assigned"),
            ..Default::default()
        }
    }

    pub fn to_model(&self) -> Option<Target> {
        Some(Target {
            target_type: to_string(&self.target_type)?,
            id: to_string(&self.id)?,
        })
    }

    pub fn from_model(target: &Target) -> Self {
        Self {
            target_type: value(target.target_type.as_str()),
            id: value(target.id.as_str()),
        }
    }
}

impl<'a> WithValidate for TargetBlock<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        if let Some(target_type) = as_str(&self.target_type) {
            if !TARGET_TYPES.contains(&target_type) {
                diags.warning(
                    "Unusual target type",
                    format!("`{target_type}` is not a known target type, it is sent as is"),
                    attr_path.attribute("type"),
                );
            }
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRefBlock<'a> {
    pub id: ValueString<'a>,
    pub version: ValueString<'a>,
}

impl<'a> TemplateRefBlock<'a> {
    fn schema() -> Block {
        Block {
            attributes: map! {
                "id" => attribute(
                    AttributeType::String,
                    AttributeConstraint::Required,
                    "Id of the template",
                ),
                "version" => attribute(
                    AttributeType::String,
                    AttributeConstraint::Required,
                    "Version of the template, updated in place",
                ),
            },
            description: Description::plain("Template version to assign"),
            ..Default::default()
        }
    }

    pub fn to_model(&self) -> Option<TemplateRef> {
        Some(TemplateRef {
            id: to_string(&self.id)?,
            version: to_string(&self.version)?,
        })
    }

    pub fn from_model(template: &TemplateRef) -> Self {
        Self {
            id: value(template.id.as_str()),
            version: value(template.version.as_str()),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentState<'a> {
    pub id: ValueString<'a>,
    pub account_id: ValueString<'a>,
    pub status: ValueString<'a>,
    pub operation: ValueString<'a>,
    pub href: ValueString<'a>,
    pub created_at: ValueString<'a>,
    pub created_by_id: ValueString<'a>,
    pub last_modified_at: ValueString<'a>,
    pub last_modified_by_id: ValueString<'a>,
    #[serde(with = "tf_provider::value::serde_as_vec")]
    pub target: Value<TargetBlock<'a>>,
    #[serde(with = "tf_provider::value::serde_as_vec")]
    pub template: Value<TemplateRefBlock<'a>>,
    #[serde(with = "tf_provider::value::serde_as_vec")]
    pub timeouts: Value<TimeoutsBlock<'a>>,
}

impl<'a> AssignmentState<'a> {
    pub fn schema(kind: AssignmentKind) -> Schema {
        let computed = |description: &str| {
            attribute(
                AttributeType::String,
                AttributeConstraint::Computed,
                description,
            )
        };
        Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => computed("Id of the assignment"),
                    "account_id" => computed("Enterprise account the assignment belongs to"),
                    "status" => computed("Status of the last operation: `accepted`, `in_progress`, `succeeded` or `failed`"),
                    "operation" => computed("Last operation performed on the assignment"),
                    "href" => computed("Link to the assignment"),
                    "created_at" => computed("Creation time"),
                    "created_by_id" => computed("Creator"),
                    "last_modified_at" => computed("Last modification time"),
                    "last_modified_by_id" => computed("Last modifier"),
                },
                blocks: map! {
                    "target" => NestedBlock::Optional(TargetBlock::schema()),
                    "template" => NestedBlock::Optional(TemplateRefBlock::schema()),
                    "timeouts" => NestedBlock::Optional(TimeoutsBlock::schema()),
                },
                description: Description::plain(format!(
                    "Assignment of an IAM {} template to an account, account group or enterprise",
                    kind.name()
                )),
                ..Default::default()
            },
        }
    }

    /// Refresh the attributes computed by the API
    pub fn set_computed(&mut self, assignment: &Assignment) {
        self.id = value(assignment.id.as_str());
        self.account_id = value_or_null(assignment.account_id.clone());
        self.status = value_or_null(assignment.status.clone());
        self.operation = value_or_null(assignment.operation.clone());
        self.href = value_or_null(assignment.href.clone());
        self.created_at = value_or_null(assignment.created_at.clone());
        self.created_by_id = value_or_null(assignment.created_by_id.clone());
        self.last_modified_at = value_or_null(assignment.last_modified_at.clone());
        self.last_modified_by_id = value_or_null(assignment.last_modified_by_id.clone());
    }

    /// Refresh everything the API knows about, keeping the timeouts
    pub fn set_all(&mut self, assignment: &Assignment) {
        self.set_computed(assignment);
        if let Some(target) = &assignment.target {
            self.target = Value::Value(TargetBlock::from_model(target));
        }
        if let Some(template) = &assignment.template {
            self.template = Value::Value(TemplateRefBlock::from_model(template));
        }
    }

    /// Attributes recomputed by every operation
    pub fn mark_computed(&mut self) {
        self.status = Value::Unknown;
        self.operation = Value::Unknown;
        self.last_modified_at = Value::Unknown;
        self.last_modified_by_id = Value::Unknown;
    }
}

/// One entry of the assignments data source
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentSummary<'a> {
    pub id: ValueString<'a>,
    pub account_id: ValueString<'a>,
    pub status: ValueString<'a>,
    pub operation: ValueString<'a>,
    pub href: ValueString<'a>,
    pub created_at: ValueString<'a>,
    pub last_modified_at: ValueString<'a>,
    pub target: ValueList<Value<TargetBlock<'a>>>,
    pub template: ValueList<Value<TemplateRefBlock<'a>>>,
}

impl<'a> AssignmentSummary<'a> {
    pub fn attr_type() -> AttributeType {
        let string = || AttributeType::String;
        AttributeType::List(Box::new(AttributeType::Object(map! {
            "id" => string(),
            "account_id" => string(),
            "status" => string(),
            "operation" => string(),
            "href" => string(),
            "created_at" => string(),
            "last_modified_at" => string(),
            "target" => block_as_list_type(&TargetBlock::schema()),
            "template" => block_as_list_type(&TemplateRefBlock::schema()),
        })))
    }

    pub fn from_model(assignment: &Assignment) -> Self {
        Self {
            id: value(assignment.id.as_str()),
            account_id: value_or_null(assignment.account_id.clone()),
            status: value_or_null(assignment.status.clone()),
            operation: value_or_null(assignment.operation.clone()),
            href: value_or_null(assignment.href.clone()),
            created_at: value_or_null(assignment.created_at.clone()),
            last_modified_at: value_or_null(assignment.last_modified_at.clone()),
            target: Value::Value(
                assignment
                    .target
                    .iter()
                    .map(|target| Value::Value(TargetBlock::from_model(target)))
                    .collect(),
            ),
            template: Value::Value(
                assignment
                    .template
                    .iter()
                    .map(|template| Value::Value(TemplateRefBlock::from_model(template)))
                    .collect(),
            ),
        }
    }
}
