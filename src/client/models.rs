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

//! Wire models of the IAM Policy Management API.
//!
//! Template bodies are kept as raw JSON here: each template kind owns the
//! typed model of its body and converts it on its own.

use serde::{Deserialize, Serialize};

/// Target type for which assignments settle synchronously
pub const ACCOUNT_TARGET: &str = "Account";

/// A response decoded from the API, along with what is needed to act on it later
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub value: T,
    /// `ETag` header, required as `If-Match` by every replace/commit/patch call
    pub etag: Option<String>,
    /// Undecoded response body, kept for diagnostics
    pub raw: String,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committed: Option<bool>,
    #[serde(skip)]
    pub body: serde_json::Value,
}

impl TemplateRequest {
    /// Encode the request, with the body stored under the kind's field
    pub fn to_json(&self, body_field: &str) -> serde_json::Value {
        let mut json = serde_json::to_value(self).unwrap_or_default();
        if let serde_json::Value::Object(map) = &mut json {
            map.insert(body_field.to_owned(), self.body.clone());
        }
        json
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub committed: bool,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub created_by_id: Option<String>,
    #[serde(default)]
    pub last_modified_at: Option<String>,
    #[serde(default)]
    pub last_modified_by_id: Option<String>,
    #[serde(skip)]
    pub body: Option<serde_json::Value>,
}

impl Template {
    /// Decode a template, extracting the kind-specific body from `body_field`
    pub fn from_json(
        mut json: serde_json::Value,
        body_field: &str,
    ) -> Result<Self, serde_json::Error> {
        let body = json
            .as_object_mut()
            .and_then(|map| map.remove(body_field))
            .filter(|body| !body.is_null());
        let mut template: Template = serde_json::from_value(json)?;
        template.body = body;
        Ok(template)
    }

    /// Encode a template, storing the body under `body_field`
    pub fn to_json(&self, body_field: &str) -> serde_json::Value {
        let mut json = serde_json::to_value(self).unwrap_or_default();
        if let (serde_json::Value::Object(map), Some(body)) = (&mut json, &self.body) {
            map.insert(body_field.to_owned(), body.clone());
        }
        json
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "type")]
    pub target_type: String,
    pub id: String,
}

impl Target {
    pub fn is_account(&self) -> bool {
        self.target_type == ACCOUNT_TARGET
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRef {
    pub id: String,
    pub version: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRequest {
    pub target: Target,
    pub templates: Vec<TemplateRef>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub target: Option<Target>,
    #[serde(default)]
    pub template: Option<TemplateRef>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub created_by_id: Option<String>,
    #[serde(default)]
    pub last_modified_at: Option<String>,
    #[serde(default)]
    pub last_modified_by_id: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentList {
    #[serde(default, alias = "policy_assignments")]
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TemplateVersions {
    #[serde(default)]
    pub versions: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub display_name: String,
    pub crn: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RoleList {
    #[serde(default)]
    pub custom_roles: Vec<Role>,
    #[serde(default)]
    pub service_roles: Vec<Role>,
    #[serde(default)]
    pub system_roles: Vec<Role>,
}

impl RoleList {
    pub fn into_roles(self) -> Vec<Role> {
        let mut roles = self.custom_roles;
        roles.extend(self.service_roles);
        roles.extend(self.system_roles);
        roles
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyAttribute {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
}

impl PolicyAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            operator: None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyAttributes {
    #[serde(default)]
    pub attributes: Vec<PolicyAttribute>,
}

impl PolicyAttributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRole {
    pub role_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRequest {
    #[serde(rename = "type")]
    pub policy_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub subjects: Vec<PolicyAttributes>,
    pub roles: Vec<PolicyRole>,
    pub resources: Vec<PolicyAttributes>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    #[serde(rename = "type", default)]
    pub policy_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subjects: Vec<PolicyAttributes>,
    #[serde(default)]
    pub roles: Vec<PolicyRole>,
    #[serde(default)]
    pub resources: Vec<PolicyAttributes>,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub created_by_id: Option<String>,
    #[serde(default)]
    pub last_modified_at: Option<String>,
    #[serde(default)]
    pub last_modified_by_id: Option<String>,
}
