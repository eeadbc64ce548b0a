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

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{schema::Schema, AttributePath, Diagnostics, Resource};

use crate::client::models::{Target, TemplateRef};
use crate::client::AssignmentRequest;
use crate::session::{IamSession, SessionHandle};
use crate::timeouts::{timeout_for, Operation};
use crate::utils::{as_str, known, value, WithValidate};

use super::poller::{wait_for_assignment, wait_for_removal};
use super::state::{AssignmentState, TargetBlock};
use super::AssignmentKind;

/// `ibm_iam_<kind>_assignment`
#[derive(Debug, Clone)]
pub struct AssignmentResource {
    session: SessionHandle,
    kind: AssignmentKind,
}

impl AssignmentResource {
    pub fn new(session: SessionHandle, kind: AssignmentKind) -> Self {
        Self { session, kind }
    }

    fn timeout(
        &self,
        diags: &mut Diagnostics,
        state: &AssignmentState<'_>,
        operation: Operation,
    ) -> Option<Duration> {
        match timeout_for(&state.timeouts, operation) {
            Ok(timeout) => Some(timeout),
            Err(err) => {
                diags.error(
                    "Invalid timeout",
                    format!("{err:#}"),
                    AttributePath::new("timeouts").index(0),
                );
                None
            }
        }
    }

    fn target(&self, diags: &mut Diagnostics, state: &AssignmentState<'_>) -> Option<Target> {
        let target = known(&state.target).and_then(|target| target.to_model());
        if target.is_none() {
            diags.error_short("Missing `target` block", AttributePath::new("target"));
        }
        target
    }

    fn template(
        &self,
        diags: &mut Diagnostics,
        state: &AssignmentState<'_>,
    ) -> Option<TemplateRef> {
        let template = known(&state.template).and_then(|template| template.to_model());
        if template.is_none() {
            diags.error_short("Missing `template` block", AttributePath::new("template"));
        }
        template
    }

    /// Wait for the assignment to settle after a creation or an update, then refresh `state`
    async fn settle(
        &self,
        diags: &mut Diagnostics,
        session: &IamSession,
        state: &mut AssignmentState<'_>,
        target: &Target,
        timeout: Duration,
    ) {
        let Some(id) = as_str(&state.id).map(str::to_owned) else {
            return;
        };
        if target.is_account() {
            info!(
                assignment = %id,
                target = %target.id,
                "target is an account, not waiting for the {} assignment",
                self.kind.name()
            );
            return;
        }

        match wait_for_assignment(
            session.api.as_ref(),
            self.kind.route(),
            &id,
            &session.poll,
            timeout,
        )
        .await
        {
            Ok(assignment) => state.set_computed(&assignment),
            Err(err) => diags.root_error(
                format!("Error assigning {} template", self.kind.name()),
                err.to_string(),
            ),
        }
    }
}

#[async_trait]
impl Resource for AssignmentResource {
    type State<'a> = AssignmentState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(AssignmentState::schema(self.kind))
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        for (block, present) in [
            ("target", !matches!(config.target, Value::Null)),
            ("template", !matches!(config.template, Value::Null)),
        ] {
            if !present {
                diags.error_short(
                    format!("Missing `{block}` block"),
                    AttributePath::new(block),
                );
            }
        }
        config
            .target
            .validate(diags, AttributePath::new("target").index(0));
        config
            .timeouts
            .validate(diags, AttributePath::new("timeouts").index(0));

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let session = self.session.get(diags)?;
        let Some(id) = as_str(&state.id).map(str::to_owned) else {
            diags.error_short("Assignment has no id", AttributePath::new("id"));
            return None;
        };

        match session.api.get_assignment(self.kind.route(), &id).await {
            Ok(fetched) => {
                let mut state = state;
                state.set_all(&fetched.value);
                Some((state, private_state))
            }
            Err(err) if err.is_not_found() => {
                diags.root_warning(
                    format!("{} assignment not found", self.kind.name()),
                    format!("Assignment {id} no longer exists, it is removed from the state."),
                );
                None
            }
            Err(err) => {
                diags.root_error(
                    format!("Failed to read {} assignment", self.kind.name()),
                    err.to_string(),
                );
                None
            }
        }
    }

    async fn plan_create<'a>(
        &self,
        _diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        state.id = Value::Unknown;
        state.account_id = Value::Unknown;
        state.href = Value::Unknown;
        state.created_at = Value::Unknown;
        state.created_by_id = Value::Unknown;
        state.mark_computed();

        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(
        Self::State<'a>,
        Self::PrivateState<'a>,
        Vec<tf_provider::AttributePath>,
    )> {
        let mut state = proposed_state;
        let mut trigger_replace = Vec::new();

        if state.target != prior_state.target {
            trigger_replace.push(AttributePath::new("target"));
        }
        let template_id =
            |state: &AssignmentState<'a>| known(&state.template).map(|t| t.id.clone());
        if template_id(&state) != template_id(&prior_state) {
            trigger_replace.push(AttributePath::new("template").index(0).attribute("id"));
        }

        if !trigger_replace.is_empty() {
            state.id = Value::Unknown;
            state.account_id = Value::Unknown;
            state.href = Value::Unknown;
            state.created_at = Value::Unknown;
            state.created_by_id = Value::Unknown;
            state.mark_computed();
        } else if state.template != prior_state.template {
            state.mark_computed();
        }

        Some((state, prior_private_state, trigger_replace))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        _prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        Some(())
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let session = self.session.get(diags)?;
        let mut state = planned_state;
        let target = self.target(diags, &state)?;
        let template = self.template(diags, &state)?;
        let timeout = self.timeout(diags, &state, Operation::Create)?;

        let request = AssignmentRequest {
            target: target.clone(),
            templates: vec![template],
        };
        let created = match session
            .api
            .create_assignment(self.kind.route(), &request)
            .await
        {
            Ok(created) => created.value,
            Err(err) => {
                diags.root_error(
                    format!("Error assigning {} template", self.kind.name()),
                    err.to_string(),
                );
                return None;
            }
        };
        info!(
            assignment = %created.id,
            target = %target.id,
            "created {} assignment",
            self.kind.name()
        );
        state.set_computed(&created);

        // The assignment exists from now on: errors are reported along with the state
        self.settle(diags, session, &mut state, &target, timeout)
            .await;

        Some((state, private_state))
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let session = self.session.get(diags)?;
        let mut state = planned_state;
        if state.template == prior_state.template {
            // Only the timeouts changed
            return Some((state, private_state));
        }

        let Some(id) = as_str(&prior_state.id).map(str::to_owned) else {
            diags.error_short("Assignment has no id", AttributePath::new("id"));
            return None;
        };
        let target = self.target(diags, &state)?;
        let template = self.template(diags, &state)?;
        let timeout = self.timeout(diags, &state, Operation::Update)?;
        let route = self.kind.route();

        let etag = match session.api.get_assignment(route, &id).await {
            Ok(fetched) => fetched.etag,
            Err(err) => {
                diags.root_error(
                    format!("Failed to read {} assignment", self.kind.name()),
                    err.to_string(),
                );
                return None;
            }
        };
        let Some(etag) = etag else {
            diags.root_error(
                format!("Failed to update {} assignment", self.kind.name()),
                "The API did not return an ETag for the assignment.",
            );
            return None;
        };

        let updated = match session
            .api
            .update_assignment(route, &id, &etag, &template.version)
            .await
        {
            Ok(updated) => updated.value,
            Err(err) => {
                diags.root_error(
                    format!("Error assigning {} template", self.kind.name()),
                    err.to_string(),
                );
                return None;
            }
        };
        debug!(
            assignment = %id,
            version = %template.version,
            "updated {} assignment",
            self.kind.name()
        );
        state.set_computed(&updated);

        self.settle(diags, session, &mut state, &target, timeout)
            .await;

        Some((state, private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let session = self.session.get(diags)?;
        let Some(id) = as_str(&state.id) else {
            diags.error_short("Assignment has no id", AttributePath::new("id"));
            return None;
        };
        let timeout = self.timeout(diags, &state, Operation::Delete)?;
        let route = self.kind.route();

        match session.api.delete_assignment(route, id).await {
            Ok(()) => (),
            Err(err) if err.is_not_found() => {
                debug!(assignment = %id, "{} assignment already removed", self.kind.name());
                return Some(());
            }
            Err(err) => {
                diags.root_error(
                    format!("Error removing {} template assignment", self.kind.name()),
                    err.to_string(),
                );
                return None;
            }
        }

        let is_account = known(&state.target)
            .and_then(TargetBlock::to_model)
            .is_some_and(|target| target.is_account());
        if is_account {
            info!(
                assignment = %id,
                "target is an account, not waiting for the {} assignment removal",
                self.kind.name()
            );
            return Some(());
        }

        let removed = wait_for_removal(session.api.as_ref(), route, id, &session.poll, timeout);
        if let Err(err) = removed.await {
            diags.root_error(
                format!("Error removing {} template assignment", self.kind.name()),
                err.to_string(),
            );
            return None;
        }
        info!(assignment = %id, "removed {} assignment", self.kind.name());
        Some(())
    }

    async fn import<'a>(
        &self,
        _diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = AssignmentState {
            id: value(id),
            ..Default::default()
        };
        Some((state, Default::default()))
    }
}
