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
use tracing::info;

use tf_provider::schema::{AttributeConstraint, AttributeType, Block, Description};
use tf_provider::value::{ValueList, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource, Schema, Value, ValueEmpty};

use crate::client::{Policy, PolicyAttribute, PolicyAttributes, PolicyRequest, PolicyRole};
use crate::roles::RoleCatalog;
use crate::session::{IamSession, SessionHandle};
use crate::utils::{
    as_str, attribute, string_list, string_list_type, strings, to_string, value, value_or_null,
};

const POLICY_TYPE: &str = "authorization";

const SERVICE_NAME: &str = "serviceName";
const SERVICE_INSTANCE: &str = "serviceInstance";
const RESOURCE_GROUP: &str = "resourceGroupId";
const ACCOUNT: &str = "accountId";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationPolicyState<'a> {
    pub id: ValueString<'a>,
    pub source_service_name: ValueString<'a>,
    pub source_resource_instance_id: ValueString<'a>,
    pub source_resource_group_id: ValueString<'a>,
    pub source_service_account: ValueString<'a>,
    pub target_service_name: ValueString<'a>,
    pub target_resource_instance_id: ValueString<'a>,
    pub target_resource_group_id: ValueString<'a>,
    pub roles: ValueList<ValueString<'a>>,
    pub description: ValueString<'a>,
    pub href: ValueString<'a>,
    pub state: ValueString<'a>,
    pub created_at: ValueString<'a>,
    pub created_by_id: ValueString<'a>,
    pub last_modified_at: ValueString<'a>,
    pub last_modified_by_id: ValueString<'a>,
}

impl<'a> AuthorizationPolicyState<'a> {
    /// Attributes set by the user, any change replaces the policy
    fn user_attributes(&self) -> [(&'static str, &ValueString<'a>); 8] {
        [
            ("source_service_name", &self.source_service_name),
            (
                "source_resource_instance_id",
                &self.source_resource_instance_id,
            ),
            ("source_resource_group_id", &self.source_resource_group_id),
            ("source_service_account", &self.source_service_account),
            ("target_service_name", &self.target_service_name),
            (
                "target_resource_instance_id",
                &self.target_resource_instance_id,
            ),
            ("target_resource_group_id", &self.target_resource_group_id),
            ("description", &self.description),
        ]
    }

    fn mark_computed(&mut self) {
        self.id = Value::Unknown;
        self.href = Value::Unknown;
        self.state = Value::Unknown;
        self.created_at = Value::Unknown;
        self.created_by_id = Value::Unknown;
        self.last_modified_at = Value::Unknown;
        self.last_modified_by_id = Value::Unknown;
    }

    fn set_computed(&mut self, policy: &Policy) {
        self.id = value(policy.id.as_str());
        self.href = value_or_null(policy.href.clone());
        self.state = value_or_null(policy.state.clone());
        self.created_at = value_or_null(policy.created_at.clone());
        self.created_by_id = value_or_null(policy.created_by_id.clone());
        self.last_modified_at = value_or_null(policy.last_modified_at.clone());
        self.last_modified_by_id = value_or_null(policy.last_modified_by_id.clone());
    }

    fn set_all(&mut self, policy: &Policy, catalog: &RoleCatalog) {
        self.set_computed(policy);
        let subject = policy.subjects.first();
        let resource = policy.resources.first();
        let get = |attributes: Option<&PolicyAttributes>, name: &str| {
            let attribute = attributes.and_then(|attributes| attributes.get(name));
            value_or_null(attribute.map(str::to_owned))
        };

        self.source_service_name = get(subject, SERVICE_NAME);
        self.source_resource_instance_id = get(subject, SERVICE_INSTANCE);
        self.source_resource_group_id = get(subject, RESOURCE_GROUP);
        self.source_service_account = get(subject, ACCOUNT);
        self.target_service_name = get(resource, SERVICE_NAME);
        self.target_resource_instance_id = get(resource, SERVICE_INSTANCE);
        self.target_resource_group_id = get(resource, RESOURCE_GROUP);
        self.roles = string_list(
            policy
                .roles
                .iter()
                .map(|role| role_name(catalog, role))
                .collect(),
        );
        self.description = value_or_null(policy.description.clone());
    }

    fn request(&self, catalog: &RoleCatalog, account_id: &str) -> anyhow::Result<PolicyRequest> {
        let account = value(account_id);
        let source_account = match self.source_service_account {
            Value::Value(_) => &self.source_service_account,
            _ => &account,
        };

        Ok(PolicyRequest {
            policy_type: POLICY_TYPE.to_owned(),
            description: to_string(&self.description),
            subjects: vec![attributes([
                (SERVICE_NAME, &self.source_service_name),
                (SERVICE_INSTANCE, &self.source_resource_instance_id),
                (RESOURCE_GROUP, &self.source_resource_group_id),
                (ACCOUNT, source_account),
            ])],
            roles: catalog
                .crns_for(strings(&self.roles).iter().map(String::as_str))?
                .into_iter()
                .map(|role_id| PolicyRole {
                    role_id,
                    display_name: None,
                })
                .collect(),
            resources: vec![attributes([
                (SERVICE_NAME, &self.target_service_name),
                (SERVICE_INSTANCE, &self.target_resource_instance_id),
                (RESOURCE_GROUP, &self.target_resource_group_id),
                (ACCOUNT, &account),
            ])],
        })
    }
}

/// Display name of a policy role, preferring the catalog over the name sent by the API
fn role_name(catalog: &RoleCatalog, role: &PolicyRole) -> String {
    let name = catalog.name_for(&role.role_id);
    if name == role.role_id {
        role.display_name.clone().unwrap_or(name)
    } else {
        name
    }
}

fn attributes(entries: [(&str, &ValueString<'_>); 4]) -> PolicyAttributes {
    PolicyAttributes {
        attributes: entries
            .into_iter()
            .filter_map(|(name, attr)| to_string(attr).map(|attr| PolicyAttribute::new(name, attr)))
            .collect(),
    }
}

/// `ibm_iam_authorization_policy`
#[derive(Debug, Default, Clone)]
pub struct AuthorizationPolicyResource {
    session: SessionHandle,
}

impl AuthorizationPolicyResource {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }

    /// Account owning the target resources, where the policy and its roles live
    fn provider_account<'s>(
        &self,
        diags: &mut Diagnostics,
        session: &'s IamSession,
    ) -> Option<&'s str> {
        let account_id = session.account_id(None);
        if account_id.is_none() {
            diags.root_error(
                "Missing account",
                "Set `account_id` in the provider configuration, policies are created there.",
            );
        }
        account_id
    }

    async fn catalog(
        &self,
        diags: &mut Diagnostics,
        session: &IamSession,
        state: &AuthorizationPolicyState<'_>,
        account_id: &str,
    ) -> Option<RoleCatalog> {
        let service = as_str(&state.target_service_name);
        match RoleCatalog::load(session.api.as_ref(), service, account_id).await {
            Ok(catalog) => Some(catalog),
            Err(err) => {
                diags.root_error("Failed to list roles", err.to_string());
                None
            }
        }
    }
}

#[async_trait]
impl Resource for AuthorizationPolicyResource {
    type State<'a> = AuthorizationPolicyState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        let computed = |description: &str| {
            attribute(
                AttributeType::String,
                AttributeConstraint::Computed,
                description,
            )
        };
        let optional = |description: &str| {
            attribute(
                AttributeType::String,
                AttributeConstraint::Optional,
                description,
            )
        };
        let required = |description: &str| {
            attribute(
                AttributeType::String,
                AttributeConstraint::Required,
                description,
            )
        };
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => computed("Id of the policy"),
                    "source_service_name" => required("Service granted the access"),
                    "source_resource_instance_id" => optional("Instance of the source service"),
                    "source_resource_group_id" => optional("Resource group of the source service"),
                    "source_service_account" => attribute(
                        AttributeType::String,
                        AttributeConstraint::OptionalComputed,
                        "Account of the source service, defaults to the provider account",
                    ),
                    "target_service_name" => required("Service the source is granted access to"),
                    "target_resource_instance_id" => optional("Instance of the target service"),
                    "target_resource_group_id" => optional("Resource group of the target service"),
                    "roles" => attribute(
                        string_list_type(),
                        AttributeConstraint::Required,
                        "Display names of the roles granted on the target service",
                    ),
                    "description" => optional("Description of the policy"),
                    "href" => computed("Link to the policy"),
                    "state" => computed("State of the policy"),
                    "created_at" => computed("Creation time"),
                    "created_by_id" => computed("Creator"),
                    "last_modified_at" => computed("Last modification time"),
                    "last_modified_by_id" => computed("Last modifier"),
                },
                description: Description::plain("Service to service authorization policy"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if let Value::Value(roles) = &config.roles {
            if roles.is_empty() {
                diags.error_short("At least one role is required", AttributePath::new("roles"));
            }
        }
        for (name, attr) in config.user_attributes() {
            if as_str(attr).is_some_and(str::is_empty) {
                diags.error_short(
                    format!("`{name}` cannot be empty"),
                    AttributePath::new(name),
                );
            }
        }

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
            diags.error_short("Policy has no id", AttributePath::new("id"));
            return None;
        };

        let policy = match session.api.get_policy(&id).await {
            Ok(fetched) => fetched.value,
            Err(err) if err.is_not_found() => {
                diags.root_warning(
                    "Authorization policy not found",
                    format!("Policy {id} no longer exists, it is removed from the state."),
                );
                return None;
            }
            Err(err) => {
                diags.root_error("Failed to read authorization policy", err.to_string());
                return None;
            }
        };

        let mut state = state;
        let target = policy.resources.first();
        let target_service = target.and_then(|resource| resource.get(SERVICE_NAME));
        // Roles are defined in the account of the target resources
        let account_id = target
            .and_then(|resource| resource.get(ACCOUNT))
            .or(session.account_id(None));
        let catalog = match account_id {
            Some(account_id) => {
                let api = session.api.as_ref();
                match RoleCatalog::load(api, target_service, account_id).await {
                    Ok(catalog) => catalog,
                    Err(err) => {
                        diags.root_error("Failed to list roles", err.to_string());
                        return None;
                    }
                }
            }
            None => RoleCatalog::default(),
        };
        state.set_all(&policy, &catalog);

        Some((state, private_state))
    }

    async fn plan_create<'a>(
        &self,
        _diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        state.mark_computed();
        if let Value::Null = state.source_service_account {
            state.source_service_account = match self.session.try_get() {
                Some(session) => value_or_null(session.account_id(None).map(str::to_owned)),
                None => Value::Unknown,
            };
        }
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
        let mut trigger_replace = prior_state
            .user_attributes()
            .into_iter()
            .zip(state.user_attributes())
            .filter(|((_, prior), (_, proposed))| prior != proposed)
            .map(|((name, _), _)| AttributePath::new(name))
            .collect::<Vec<_>>();
        if prior_state.roles != state.roles {
            trigger_replace.push(AttributePath::new("roles"));
        }

        if !trigger_replace.is_empty() {
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
        let account_id = self.provider_account(diags, session)?.to_owned();
        if let Value::Unknown = state.source_service_account {
            state.source_service_account = value(account_id.as_str());
        }
        let catalog = self.catalog(diags, session, &state, &account_id).await?;

        let request = match state.request(&catalog, &account_id) {
            Ok(request) => request,
            Err(err) => {
                diags.error(
                    "Invalid roles",
                    format!("{err:#}"),
                    AttributePath::new("roles"),
                );
                return None;
            }
        };
        let policy = match session.api.create_policy(&request).await {
            Ok(created) => created.value,
            Err(err) => {
                diags.root_error("Failed to create authorization policy", err.to_string());
                return None;
            }
        };
        info!(
            policy = %policy.id,
            source = request.subjects.first().and_then(|s| s.get(SERVICE_NAME)).unwrap_or_default(),
            "created authorization policy"
        );
        state.set_computed(&policy);

        Some((state, private_state))
    }

    async fn update<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        // Every user change replaces the policy, nothing is sent
        Some((planned_state, private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let session = self.session.get(diags)?;
        let Some(id) = as_str(&state.id) else {
            diags.error_short("Policy has no id", AttributePath::new("id"));
            return None;
        };

        match session.api.delete_policy(id).await {
            Ok(()) => Some(()),
            Err(err) if err.is_not_found() => Some(()),
            Err(err) => {
                diags.root_error("Failed to delete authorization policy", err.to_string());
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        _diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = AuthorizationPolicyState {
            id: value(id),
            ..Default::default()
        };
        Some((state, Default::default()))
    }
}
