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

//! Policy templates: the policy every target account receives.
//!
//! Roles are written by display name in Terraform and by CRN on the wire.
//! Attribute values are strings, except for the `stringExists` operator which
//! takes a boolean.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeConstraint, AttributeType, Block, Description, NestedBlock};
use tf_provider::value::{Value, ValueList, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::client::models::PolicyRole;
use crate::client::TemplateRoute;
use crate::roles::RoleCatalog;
use crate::utils::{
    as_str, attribute, blocks, reject_empty, reject_empty_list, string_list, string_list_type,
    strings, to_string, value, value_or_null,
};

use super::{require_block, TemplateKind};

const STRING_EXISTS: &str = "stringExists";
const SERVICE_NAME: &str = "serviceName";
const POLICY_TYPES: [&str; 2] = ["access", "authorization"];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PolicyTemplate;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyAttributeBlock<'a> {
    pub key: ValueString<'a>,
    pub operator: ValueString<'a>,
    pub value: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyResourceBlock<'a> {
    pub attributes: ValueList<Value<PolicyAttributeBlock<'a>>>,
    pub tags: ValueList<Value<PolicyAttributeBlock<'a>>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySubjectBlock<'a> {
    pub attributes: ValueList<Value<PolicyAttributeBlock<'a>>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRuleBlock<'a> {
    pub key: ValueString<'a>,
    pub operator: ValueString<'a>,
    pub value: ValueString<'a>,
    pub conditions: ValueList<Value<PolicyAttributeBlock<'a>>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyBody<'a> {
    #[serde(rename = "type")]
    pub policy_type: ValueString<'a>,
    pub description: ValueString<'a>,
    pub pattern: ValueString<'a>,
    pub roles: ValueList<ValueString<'a>>,
    #[serde(with = "tf_provider::value::serde_as_vec")]
    pub resource: Value<PolicyResourceBlock<'a>>,
    #[serde(with = "tf_provider::value::serde_as_vec")]
    pub subject: Value<PolicySubjectBlock<'a>>,
    #[serde(with = "tf_provider::value::serde_as_vec")]
    pub rule: Value<PolicyRuleBlock<'a>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeModel {
    pub key: String,
    pub operator: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceModel {
    #[serde(default)]
    pub attributes: Vec<AttributeModel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<AttributeModel>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectModel {
    #[serde(default)]
    pub attributes: Vec<AttributeModel>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<AttributeModel>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantModel {
    #[serde(default)]
    pub roles: Vec<PolicyRole>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlModel {
    #[serde(default)]
    pub grant: GrantModel,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyModel {
    #[serde(rename = "type")]
    pub policy_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<SubjectModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<RuleModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<ControlModel>,
}

crate::template_state!(PolicyTemplateState, PolicyBody, policy);

/// JSON value sent for `value` under `operator`
fn attribute_value(operator: &str, value: &str) -> Result<serde_json::Value> {
    if operator == STRING_EXISTS {
        let exists = value
            .parse::<bool>()
            .with_context(|| {
                format!("`{STRING_EXISTS}` expects `true` or `false`, got `{value}`")
            })?;
        Ok(serde_json::Value::Bool(exists))
    } else {
        Ok(serde_json::Value::String(value.to_owned()))
    }
}

fn attribute_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn attribute_to_model(attr: &PolicyAttributeBlock<'_>) -> Result<AttributeModel> {
    let key = to_string(&attr.key).ok_or_else(|| anyhow!("attribute `key` is required"))?;
    let operator = to_string(&attr.operator)
        .ok_or_else(|| anyhow!("attribute `{key}` has no `operator`"))?;
    let text = as_str(&attr.value).ok_or_else(|| anyhow!("attribute `{key}` has no `value`"))?;
    let value = attribute_value(&operator, text)?;
    Ok(AttributeModel {
        key,
        operator,
        value,
    })
}

fn attributes_to_model(
    list: &ValueList<Value<PolicyAttributeBlock<'_>>>,
) -> Result<Vec<AttributeModel>> {
    blocks(list).map(attribute_to_model).collect()
}

fn attribute_from_model<'a>(model: &AttributeModel) -> Value<PolicyAttributeBlock<'a>> {
    Value::Value(PolicyAttributeBlock {
        key: value(model.key.as_str()),
        operator: value(model.operator.as_str()),
        value: value(attribute_text(&model.value)),
    })
}

fn attributes_from_model<'a>(
    models: &[AttributeModel],
) -> ValueList<Value<PolicyAttributeBlock<'a>>> {
    Value::Value(models.iter().map(attribute_from_model).collect())
}

fn attribute_block() -> Block {
    Block {
        attributes: map! {
            "key" => attribute(
                AttributeType::String,
                AttributeConstraint::Required,
                "Name of the attribute",
            ),
            "operator" => attribute(
                AttributeType::String,
                AttributeConstraint::Required,
                "Operator of the attribute, eg: `stringEquals`, `stringMatch`, `stringExists`",
            ),
            "value" => attribute(
                AttributeType::String,
                AttributeConstraint::Required,
                "Value of the attribute (`true` or `false` with `stringExists`)",
            ),
        },
        ..Default::default()
    }
}

fn validate_attributes(
    list: &ValueList<Value<PolicyAttributeBlock<'_>>>,
    diags: &mut Diagnostics,
    attr_path: AttributePath,
) {
    let Value::Value(list) = list else {
        return;
    };
    for (i, attr) in list.iter().enumerate() {
        let Value::Value(attr) = attr else {
            continue;
        };
        if let (Some(operator), Some(text)) = (as_str(&attr.operator), as_str(&attr.value)) {
            if let Err(err) = attribute_value(operator, text) {
                diags.error(
                    "Invalid attribute value",
                    format!("{err:#}"),
                    attr_path.clone().index(i as i64).attribute("value"),
                );
            }
        }
    }
}

impl TemplateKind for PolicyTemplate {
    const NAME: &'static str = "policy";
    const ROUTE: TemplateRoute = TemplateRoute {
        collection: "policy_templates",
        body_field: "policy",
    };
    const RESOLVES_ROLES: bool = true;

    type Body<'a> = PolicyBody<'a>;
    type Model = PolicyModel;
    type State<'a> = PolicyTemplateState<'a>;

    fn body_schema() -> Block {
        Block {
            attributes: map! {
                "type" => attribute(
                    AttributeType::String,
                    AttributeConstraint::Required,
                    "Type of the policy: `access` or `authorization`",
                ),
                "description" => attribute(
                    AttributeType::String,
                    AttributeConstraint::Optional,
                    "Description of the policy",
                ),
                "pattern" => attribute(
                    AttributeType::String,
                    AttributeConstraint::Optional,
                    "Pattern of the rule, eg: `time-based-conditions:weekly:custom-hours`",
                ),
                "roles" => attribute(
                    string_list_type(),
                    AttributeConstraint::Required,
                    "Display names of the roles granted by the policy",
                ),
            },
            blocks: map! {
                "resource" => NestedBlock::Optional(Block {
                    blocks: map! {
                        "attributes" => NestedBlock::List(attribute_block()),
                        "tags" => NestedBlock::List(attribute_block()),
                    },
                    description: Description::plain("Resources the policy applies to"),
                    ..Default::default()
                }),
                "subject" => NestedBlock::Optional(Block {
                    blocks: map! {
                        "attributes" => NestedBlock::List(attribute_block()),
                    },
                    description: Description::plain("Subject of an authorization policy"),
                    ..Default::default()
                }),
                "rule" => NestedBlock::Optional(Block {
                    attributes: map! {
                        "key" => attribute(
                            AttributeType::String,
                            AttributeConstraint::Optional,
                            "Key of a single condition",
                        ),
                        "operator" => attribute(
                            AttributeType::String,
                            AttributeConstraint::Optional,
                            "Operator of the condition, or `and` / `or` to combine `conditions`",
                        ),
                        "value" => attribute(
                            AttributeType::String,
                            AttributeConstraint::Optional,
                            "Value of a single condition",
                        ),
                    },
                    blocks: map! {
                        "conditions" => NestedBlock::List(attribute_block()),
                    },
                    description: Description::plain("Condition restricting the policy"),
                    ..Default::default()
                }),
            },
            description: Description::plain("Policy granted by the template"),
            ..Default::default()
        }
    }

    fn validate_body(body: &Self::Body<'_>, diags: &mut Diagnostics, attr_path: AttributePath) {
        if let Some(policy_type) = as_str(&body.policy_type) {
            if !POLICY_TYPES.contains(&policy_type) {
                diags.error(
                    "Invalid policy type",
                    format!("`{policy_type}` is neither `access` nor `authorization`"),
                    attr_path.clone().attribute("type"),
                );
            }
        }
        reject_empty(
            &body.description,
            diags,
            attr_path.clone().attribute("description"),
        );
        reject_empty_list(&body.roles, diags, attr_path.clone().attribute("roles"));
        require_block(
            &body.resource,
            "resource",
            diags,
            attr_path.clone().attribute("resource"),
        );
        if let Value::Value(resource) = &body.resource {
            let path = attr_path.clone().attribute("resource").index(0);
            validate_attributes(
                &resource.attributes,
                diags,
                path.clone().attribute("attributes"),
            );
            validate_attributes(&resource.tags, diags, path.attribute("tags"));
        }
        if let Value::Value(subject) = &body.subject {
            let path = attr_path.clone().attribute("subject").index(0);
            validate_attributes(&subject.attributes, diags, path.attribute("attributes"));
        }
        if let Value::Value(rule) = &body.rule {
            let path = attr_path.attribute("rule").index(0);
            validate_attributes(&rule.conditions, diags, path.attribute("conditions"));
        }
    }

    fn role_service(body: &Self::Body<'_>) -> Option<String> {
        let Value::Value(resource) = &body.resource else {
            return None;
        };
        blocks(&resource.attributes)
            .find(|attr| as_str(&attr.key) == Some(SERVICE_NAME))
            .and_then(|attr| to_string(&attr.value))
    }

    fn model_role_service(model: &Self::Model) -> Option<String> {
        model
            .resource
            .as_ref()?
            .attributes
            .iter()
            .find(|attr| attr.key == SERVICE_NAME)
            .map(|attr| attribute_text(&attr.value))
    }

    fn to_model(body: &Self::Body<'_>, roles: &RoleCatalog) -> Result<Self::Model> {
        let Some(policy_type) = to_string(&body.policy_type) else {
            bail!("`type` is required in the policy block");
        };
        let role_names = strings(&body.roles);
        let grant = GrantModel {
            roles: roles
                .crns_for(role_names.iter().map(String::as_str))?
                .into_iter()
                .map(|role_id| PolicyRole {
                    role_id,
                    display_name: None,
                })
                .collect(),
        };

        let resource = match &body.resource {
            Value::Value(resource) => Some(ResourceModel {
                attributes: attributes_to_model(&resource.attributes)
                    .context("invalid resource attribute")?,
                tags: attributes_to_model(&resource.tags).context("invalid resource tag")?,
            }),
            _ => None,
        };
        let subject = match &body.subject {
            Value::Value(subject) => Some(SubjectModel {
                attributes: attributes_to_model(&subject.attributes)
                    .context("invalid subject attribute")?,
            }),
            _ => None,
        };
        let rule = match &body.rule {
            Value::Value(rule) => {
                let operator = to_string(&rule.operator);
                let value = match (&operator, as_str(&rule.value)) {
                    (Some(operator), Some(text)) => Some(attribute_value(operator, text)?),
                    (None, Some(text)) => Some(serde_json::Value::String(text.to_owned())),
                    (_, None) => None,
                };
                Some(RuleModel {
                    key: to_string(&rule.key),
                    operator,
                    value,
                    conditions: attributes_to_model(&rule.conditions)
                        .context("invalid rule condition")?,
                })
            }
            _ => None,
        };

        Ok(PolicyModel {
            policy_type,
            description: to_string(&body.description),
            resource,
            subject,
            pattern: to_string(&body.pattern),
            rule,
            control: Some(ControlModel { grant }),
        })
    }

    fn from_model<'a>(model: &Self::Model, roles: &RoleCatalog) -> Self::Body<'a> {
        let role_names = model
            .control
            .iter()
            .flat_map(|control| &control.grant.roles)
            .map(|role| roles.name_for(&role.role_id))
            .collect();

        PolicyBody {
            policy_type: value(model.policy_type.as_str()),
            description: value_or_null(model.description.clone()),
            pattern: value_or_null(model.pattern.clone()),
            roles: string_list(role_names),
            resource: match &model.resource {
                Some(resource) => Value::Value(PolicyResourceBlock {
                    attributes: attributes_from_model(&resource.attributes),
                    tags: attributes_from_model(&resource.tags),
                }),
                None => Value::Null,
            },
            subject: match &model.subject {
                Some(subject) => Value::Value(PolicySubjectBlock {
                    attributes: attributes_from_model(&subject.attributes),
                }),
                None => Value::Null,
            },
            rule: match &model.rule {
                Some(rule) => Value::Value(PolicyRuleBlock {
                    key: value_or_null(rule.key.clone()),
                    operator: value_or_null(rule.operator.clone()),
                    value: value_or_null(rule.value.as_ref().map(attribute_text)),
                    conditions: attributes_from_model(&rule.conditions),
                }),
                None => Value::Null,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::client::Role;

    const VIEWER: &str = "crn:v1:bluemix:public:iam::::role:Viewer";

    fn catalog() -> RoleCatalog {
        RoleCatalog::new(vec![Role {
            display_name: "Viewer".into(),
            crn: VIEWER.into(),
            description: None,
        }])
    }

    fn attr<'a>(key: &str, operator: &str, text: &str) -> Value<PolicyAttributeBlock<'a>> {
        Value::Value(PolicyAttributeBlock {
            key: value(key),
            operator: value(operator),
            value: value(text),
        })
    }

    fn body<'a>() -> PolicyBody<'a> {
        PolicyBody {
            policy_type: value("access"),
            description: value("viewer on identity"),
            pattern: Value::Null,
            roles: string_list(vec!["Viewer".into()]),
            resource: Value::Value(PolicyResourceBlock {
                attributes: Value::Value(vec![
                    attr("serviceName", "stringEquals", "iam-identity"),
                    attr("serviceInstance", "stringExists", "true"),
                ]),
                tags: Value::Value(vec![attr("team", "stringEquals", "platform")]),
            }),
            subject: Value::Null,
            rule: Value::Value(PolicyRuleBlock {
                key: Value::Null,
                operator: value("and"),
                value: Value::Null,
                conditions: Value::Value(vec![attr(
                    "{{environment.attributes.day_of_week}}",
                    "dayOfWeekAnyOf",
                    "1+00:00",
                )]),
            }),
        }
    }

    #[test]
    fn wire_shape() {
        let model = PolicyTemplate::to_model(&body(), &catalog()).unwrap();
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["type"], "access");
        assert_eq!(
            json["control"]["grant"]["roles"],
            json!([{"role_id": VIEWER}])
        );
        assert_eq!(
            json["resource"]["attributes"][1],
            json!({"key": "serviceInstance", "operator": "stringExists", "value": true})
        );
        assert_eq!(json["resource"]["tags"][0]["value"], "platform");
        assert_eq!(json["rule"]["operator"], "and");
        assert!(json.get("subject").is_none());
        assert!(json.get("pattern").is_none());
    }

    #[test]
    fn body_round_trips() {
        let catalog = catalog();
        let model = PolicyTemplate::to_model(&body(), &catalog).unwrap();
        assert_eq!(PolicyTemplate::from_model(&model, &catalog), body());
    }

    #[test]
    fn role_service_is_read_from_resource_attributes() {
        assert_eq!(
            PolicyTemplate::role_service(&body()).as_deref(),
            Some("iam-identity")
        );
        let model = PolicyTemplate::to_model(&body(), &catalog()).unwrap();
        assert_eq!(
            PolicyTemplate::model_role_service(&model).as_deref(),
            Some("iam-identity")
        );
        assert_eq!(PolicyTemplate::role_service(&PolicyBody::default()), None);
    }

    #[test]
    fn unknown_role_fails_the_conversion() {
        let body = PolicyBody {
            roles: string_list(vec!["Writer".into()]),
            ..body()
        };
        let err = PolicyTemplate::to_model(&body, &catalog()).unwrap_err();
        assert!(err.to_string().contains("Writer"));
    }

    #[test]
    fn unknown_crn_is_surfaced_as_is() {
        let model: PolicyModel = serde_json::from_value(json!({
            "type": "access",
            "resource": {"attributes": [
                {"key": "serviceName", "operator": "stringEquals", "value": "kms"}
            ]},
            "control": {"grant": {"roles": [{"role_id": "crn:custom:Role"}]}},
        }))
        .unwrap();
        let body = PolicyTemplate::from_model(&model, &catalog());
        assert_eq!(strings(&body.roles), ["crn:custom:Role"]);
        assert_eq!(body.rule, Value::Null);
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut diags = Diagnostics::default();
        PolicyTemplate::validate_body(&body(), &mut diags, AttributePath::new("policy").index(0));
        assert!(diags.errors.is_empty());

        let invalid = PolicyBody {
            policy_type: value("admin"),
            resource: Value::Value(PolicyResourceBlock {
                attributes: Value::Value(vec![attr("serviceInstance", "stringExists", "maybe")]),
                tags: Value::Null,
            }),
            ..body()
        };
        PolicyTemplate::validate_body(&invalid, &mut diags, AttributePath::new("policy").index(0));
        assert_eq!(diags.errors.len(), 2);

        let mut diags = Diagnostics::default();
        let missing = PolicyBody {
            resource: Value::Null,
            ..body()
        };
        PolicyTemplate::validate_body(&missing, &mut diags, AttributePath::new("policy").index(0));
        assert_eq!(diags.errors.len(), 1);

        let mut diags = Diagnostics::default();
        let empty = PolicyBody {
            description: value(""),
            roles: Value::Value(vec![]),
            ..body()
        };
        PolicyTemplate::validate_body(&empty, &mut diags, AttributePath::new("policy").index(0));
        assert_eq!(diags.errors.len(), 2);
    }
}
