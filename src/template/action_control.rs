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

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeConstraint, AttributeType, Block, Description};
use tf_provider::value::{ValueList, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::client::TemplateRoute;
use crate::roles::RoleCatalog;
use crate::utils::{
    attribute, known, reject_empty, string_list, string_list_type, strings, to_string, value,
    value_or_null,
};

use super::TemplateKind;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ActionControlTemplate;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionControlBody<'a> {
    pub service_name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub actions: ValueList<ValueString<'a>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionControlModel {
    pub service_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub actions: Vec<String>,
}

crate::template_state!(
    ActionControlTemplateState,
    ActionControlBody,
    action_control
);

impl TemplateKind for ActionControlTemplate {
    const NAME: &'static str = "action control";
    const ROUTE: TemplateRoute = TemplateRoute {
        collection: "action_control_templates",
        body_field: "action_control",
    };

    type Body<'a> = ActionControlBody<'a>;
    type Model = ActionControlModel;
    type State<'a> = ActionControlTemplateState<'a>;

    fn body_schema() -> Block {
        Block {
            attributes: map! {
                "service_name" => attribute(
                    AttributeType::String,
                    AttributeConstraint::Required,
                    "Service the actions belong to",
                ),
                "description" => attribute(
                    AttributeType::String,
                    AttributeConstraint::Optional,
                    "Description of the action control",
                ),
                "actions" => attribute(
                    string_list_type(),
                    AttributeConstraint::Required,
                    "Actions allowed by the template, eg: `am.read`",
                ),
            },
            description: Description::plain("Actions that assigned policies may grant"),
            ..Default::default()
        }
    }

    fn validate_body(body: &Self::Body<'_>, diags: &mut Diagnostics, attr_path: AttributePath) {
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
        let Some(service_name) = to_string(&body.service_name) else {
            bail!("`service_name` is required in the action_control block");
        };
        Ok(ActionControlModel {
            service_name,
            description: to_string(&body.description),
            actions: strings(&body.actions),
        })
    }

    fn from_model<'a>(model: &Self::Model, _roles: &RoleCatalog) -> Self::Body<'a> {
        ActionControlBody {
            service_name: value(model.service_name.as_str()),
            description: value_or_null(model.description.clone()),
            actions: string_list(model.actions.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_round_trips() {
        let body = ActionControlBody {
            service_name: value("am"),
            description: value("read only"),
            actions: string_list(vec!["am.read".into(), "am.list".into()]),
        };
        let catalog = RoleCatalog::default();
        let model = ActionControlTemplate::to_model(&body, &catalog).unwrap();
        assert_eq!(
            serde_json::to_value(&model).unwrap(),
            serde_json::json!({
                "service_name": "am",
                "description": "read only",
                "actions": ["am.read", "am.list"],
            })
        );
        assert_eq!(ActionControlTemplate::from_model(&model, &catalog), body);
    }

    #[test]
    fn missing_service_is_an_error() {
        let body = ActionControlBody::default();
        assert!(ActionControlTemplate::to_model(&body, &RoleCatalog::default()).is_err());
    }

    #[test]
    fn empty_actions_are_rejected() {
        let body = ActionControlBody {
            service_name: value("am"),
            actions: tf_provider::value::Value::Value(vec![]),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        ActionControlTemplate::validate_body(
            &body,
            &mut diags,
            AttributePath::new("action_control").index(0),
        );
        assert_eq!(diags.errors.len(), 1);
    }

    #[test]
    fn empty_description_is_rejected() {
        let body = ActionControlBody {
            service_name: value("am"),
            description: value(""),
            actions: string_list(vec!["am.read".into()]),
        };
        let mut diags = Diagnostics::default();
        ActionControlTemplate::validate_body(
            &body,
            &mut diags,
            AttributePath::new("action_control").index(0),
        );
        assert_eq!(diags.errors.len(), 1);
    }
}
