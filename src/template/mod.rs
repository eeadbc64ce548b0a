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

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tf_provider::schema::Block;
use tf_provider::{AttributePath, Diagnostics};

use crate::client::TemplateRoute;
use crate::roles::RoleCatalog;

pub mod action_control;
mod data_source;
pub mod policy;
mod resource;
pub mod role;
pub mod state;

pub use action_control::ActionControlTemplate;
pub use data_source::TemplateDataSource;
pub use policy::PolicyTemplate;
pub use resource::TemplateResource;
pub use role::RoleTemplate;
pub use state::{TemplateFields, TemplateSchema, WithTemplateFields};

/// One family of IAM templates.
///
/// A kind owns the Terraform schema of its body block and the conversion of
/// that block to and from the body the API stores under `ROUTE.body_field`.
pub trait TemplateKind: Debug + Send + Sync + 'static {
    /// Human readable name, used in descriptions and diagnostics
    const NAME: &'static str;
    const ROUTE: TemplateRoute;
    /// Whether the body references roles by display name
    const RESOLVES_ROLES: bool = false;

    type Body<'a>: Debug
        + Default
        + Clone
        + PartialEq
        + Send
        + Sync
        + Serialize
        + for<'de> Deserialize<'de>;
    type Model: Debug + Clone + Send + Sync + Serialize + DeserializeOwned;
    type State<'a>: WithTemplateFields<'a, Body = Self::Body<'a>>;

    fn body_schema() -> Block;

    fn validate_body(body: &Self::Body<'_>, diags: &mut Diagnostics, attr_path: AttributePath);

    /// Service whose roles the body references
    fn role_service(_body: &Self::Body<'_>) -> Option<String> {
        None
    }

    /// Service whose roles the model references
    fn model_role_service(_model: &Self::Model) -> Option<String> {
        None
    }

    fn to_model(body: &Self::Body<'_>, roles: &RoleCatalog) -> Result<Self::Model>;

    fn from_model<'a>(model: &Self::Model, roles: &RoleCatalog) -> Self::Body<'a>;
}

/// Check that a required nested block is present
pub(crate) fn require_block<T>(
    block: &tf_provider::value::Value<T>,
    name: &str,
    diags: &mut Diagnostics,
    attr_path: AttributePath,
) {
    if let tf_provider::value::Value::Null = block {
        diags.error(
            format!("Missing `{name}` block"),
            format!("The `{name}` block is required."),
            attr_path,
        );
    }
}
