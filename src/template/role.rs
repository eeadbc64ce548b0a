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

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeConstraint, AttributeType, Block, Description};
use tf_provider::value::{ValueList, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::client::TemplateRoute;
use crate::roles::RoleCatalog;
use crate::utils::{
    as_str, attribute, known, reject_empty, string_list, string_list_type, strings, to_string,
    value, value_or_null,
};

use super::TemplateKind;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RoleTemplate;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBody<'a> {
    pub name: ValueString<'a>,
    pub display_name: ValueString<'a>,
    pub service_name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub actions: ValueList<ValueString<'a>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleModel {
    pub name: String,
    pub display_name: String,
    pub service_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub actions: Vec<String>,
}

crate::template_state!(RoleTemplateState, RoleBody, role);

fn required(value: &ValueString<'_>, name: &str) -> Result<String> {
    to_string(value).ok_or_else(|| anyhow!("`{name}` is required in the role block"))
}

impl TemplateKind for RoleTemplate {
    const NAME: &'static str = "role";
    const ROUTE: TemplateRoute = TemplateRoute {
        collection: "role_templates",
        body_field: "role",
    };

    type Body<'a> = RoleBody<'a>;
    type Model = RoleModel;
    type State<'a> = RoleTemplateState<'a>;

    fn body_schema() -> Block {
        Block {
            attributes: map! {
                "name" => attribute(
                    AttributeType::String,
                    AttributeConstraint::Required,
                    "Name of the custom role, starting with an upper case letter",
                ),
                "display_name" => attribute(
                    AttributeType::String,
                    AttributeConstraint::Required,
                    "Name shown in the console",
                ),
                "service_name" => attribute(
                    AttributeType::String,
                    AttributeConstraint::Required,
                    "Service the role applies to",
                ),
                "description" => attribute(
                    AttributeType::String,
                    AttributeConstraint::Optional,
                    "Description of the role",
                ),
                "actions" => attribute(
                    string_list_type(),
                    AttributeConstraint::Required,
                    "Actions granted by the role",
                ),
            },
            description: Description::plain("Custom role created in every target account"),
            ..Default::default()
        }
    }

    fn validate_body(body: &Self::Body<'_>, diags: &mut Diagnostics, attr_path: AttributePath) {
        if let Some(name) = as_str(&body.name) {
            let valid = name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
                && name.chars().all(|c| c.is_ascii_alphanumeric());
            if !valid {
                diags.error(
                    "Invalid role name",
                    format!("`{name}` must be an upper case letter followed by letters or digits"),
                    attr_path.clone().attribute("name"),
                );
            }
        }
        reject_empty(
            &body.display_name,
            diags,
            attr_path.clone().attribute("display_name"),
        );
        reject_empty(
            &body.description,
            diags,
            attr_path.clone().attribute("description"),
        );
        if let Some(actions) = known(&body.actions) {
            if actions.is_empty() {
                diags.error_short(
                    "At least one action is required",
                    attr_path.attribute("actions"),
                );
            }
        }
    }

    fn to_model(body: &Self::Body<'_>, _roles: &RoleCatalog) -> Result<Self::Model> {
        Ok(RoleModel {
            name: required(&body.name, "name")?,
            display_name: required(&body.display_name, "display_name")?,
            service_name: required(&body.service_name, "service_name")?,
            description: to_string(&body.description),
            actions: strings(&body.actions),
        })
    }

    fn from_model<'a>(model: &Self::Model, _roles: &RoleCatalog) -> Self::Body<'a> {
        RoleBody {
            name: value(model.name.as_str()),
            display_name: value(model.display_name.as_str()),
            service_name: value(model.service_name.as_str()),
            description: value_or_null(model.description.clone()),
            actions: string_list(model.actions.clone()),
        }
    }
}
