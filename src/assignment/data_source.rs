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

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tf_provider::schema::{AttributeConstraint, AttributeType, Block, Description};
use tf_provider::value::{ValueList, ValueString};
use tf_provider::{map, AttributePath, DataSource, Diagnostics, Schema, Value, ValueEmpty};

use crate::session::SessionHandle;
use crate::utils::{as_str, attribute, value};

use super::state::AssignmentSummary;
use super::AssignmentKind;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentsState<'a> {
    pub id: ValueString<'a>,
    pub account_id: ValueString<'a>,
    pub template_id: ValueString<'a>,
    pub assignments: ValueList<Value<AssignmentSummary<'a>>>,
}

/// `ibm_iam_<kind>_assignments` data source
#[derive(Debug, Clone)]
pub struct AssignmentsDataSource {
    session: SessionHandle,
    kind: AssignmentKind,
}

impl AssignmentsDataSource {
    pub fn new(session: SessionHandle, kind: AssignmentKind) -> Self {
        Self { session, kind }
    }
}

#[async_trait]
impl DataSource for AssignmentsDataSource {
    type State<'a> = AssignmentsState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => attribute(
                        AttributeType::String,
                        AttributeConstraint::Computed,
                        "Id of the listing",
                    ),
                    "account_id" => attribute(
                        AttributeType::String,
                        AttributeConstraint::OptionalComputed,
                        "Account owning the assignments, defaults to the provider account",
                    ),
                    "template_id" => attribute(
                        AttributeType::String,
                        AttributeConstraint::Optional,
                        "Only list the assignments of this template",
                    ),
                    "assignments" => attribute(
                        AssignmentSummary::attr_type(),
                        AttributeConstraint::Computed,
                        "Assignments found",
                    ),
                },
                description: Description::plain(format!(
                    "List the IAM {} template assignments of an account",
                    self.kind.name()
                )),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if as_str(&config.template_id).is_some_and(str::is_empty) {
            diags.error_short(
                "`template_id` cannot be empty",
                AttributePath::new("template_id"),
            );
            return None;
        }
        Some(())
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let session = self.session.get(diags)?;
        let account_id = session.account_id(as_str(&config.account_id));
        let Some(account_id) = account_id.map(str::to_owned) else {
            diags.error(
                "Missing account",
                "Set `account_id` here or in the provider configuration.",
                AttributePath::new("account_id"),
            );
            return None;
        };
        let template_id = as_str(&config.template_id);

        let assignments = match session
            .api
            .list_assignments(self.kind.route(), &account_id, template_id)
            .await
        {
            Ok(assignments) => assignments,
            Err(err) => {
                diags.root_error(
                    format!("Failed to list {} assignments", self.kind.name()),
                    err.to_string(),
                );
                return None;
            }
        };
        debug!(
            account = %account_id,
            count = assignments.len(),
            "listed {} assignments",
            self.kind.name()
        );

        let id = match template_id {
            Some(template_id) => format!("{account_id}/{template_id}"),
            None => account_id.clone(),
        };
        Some(AssignmentsState {
            id: value(id),
            account_id: value(account_id),
            template_id: config.template_id.clone(),
            assignments: Value::Value(
                assignments
                    .iter()
                    .map(|assignment| Value::Value(AssignmentSummary::from_model(assignment)))
                    .collect(),
            ),
        })
    }
}
