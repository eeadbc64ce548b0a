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

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType};
use tf_provider::value::ValueString;
use tf_provider::{
    map, AttributePath, Block, Description, Diagnostics, Provider, Schema, ValueEmpty,
};

use crate::assignment::{AssignmentKind, AssignmentResource, AssignmentsDataSource, PollSettings};
use crate::authorization::AuthorizationPolicyResource;
use crate::client::http::DEFAULT_ENDPOINT;
use crate::client::HttpClient;
use crate::session::{IamSession, SessionHandle};
use crate::template::{
    ActionControlTemplate, PolicyTemplate, RoleTemplate, TemplateDataSource, TemplateResource,
};
use crate::timeouts::parse_duration;
use crate::utils::{as_str, attribute};

const API_KEY_VARS: [&str; 2] = ["IC_API_KEY", "IBMCLOUD_API_KEY"];
const ENDPOINT_VAR: &str = "IBMCLOUD_IAM_API_ENDPOINT";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig<'a> {
    pub api_key: ValueString<'a>,
    pub iam_endpoint: ValueString<'a>,
    pub account_id: ValueString<'a>,
    pub poll_interval: ValueString<'a>,
}

/// First non empty value among the configuration and the environment variables
fn setting(config: &ValueString<'_>, vars: &[&str]) -> Option<String> {
    as_str(config)
        .map(str::to_owned)
        .or_else(|| vars.iter().find_map(|var| std::env::var(var).ok()))
        .filter(|setting| !setting.is_empty())
}

#[derive(Debug, Default, Clone)]
pub struct IamPolicyProvider {
    session: SessionHandle,
}

#[async_trait]
impl Provider for IamPolicyProvider {
    type Config<'a> = ProviderConfig<'a>;
    type MetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        let optional = |description: &str| {
            attribute(
                AttributeType::String,
                AttributeConstraint::Optional,
                description,
            )
        };
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "api_key" => Attribute {
                        sensitive: true,
                        ..optional("IBM Cloud API key, defaults to `IC_API_KEY` or `IBMCLOUD_API_KEY`")
                    },
                    "iam_endpoint" => optional("IAM endpoint, defaults to `IBMCLOUD_IAM_API_ENDPOINT` or the public endpoint"),
                    "account_id" => optional("Account used by templates, policies and listings that do not name one"),
                    "poll_interval" => optional("Maximum delay between two status fetches of an assignment (default: 10s)"),
                },
                description: Description::plain(
                    "IBM Cloud IAM policy templates, assignments and authorization policies",
                ),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::Config<'a>) -> Option<()> {
        if let Some(interval) = as_str(&config.poll_interval) {
            match parse_duration(interval) {
                Ok(interval) if interval.is_zero() => diags.error_short(
                    "`poll_interval` must be positive",
                    AttributePath::new("poll_interval"),
                ),
                Ok(_) => (),
                Err(err) => diags.error(
                    "Invalid `poll_interval`",
                    format!("{err:#}"),
                    AttributePath::new("poll_interval"),
                ),
            }
        }
        if as_str(&config.account_id).is_some_and(str::is_empty) {
            diags.error_short(
                "`account_id` cannot be empty",
                AttributePath::new("account_id"),
            );
        }

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn configure<'a>(
        &self,
        diags: &mut Diagnostics,
        terraform_version: String,
        config: Self::Config<'a>,
    ) -> Option<()> {
        let Some(api_key) = setting(&config.api_key, &API_KEY_VARS) else {
            diags.error(
                "Missing API key",
                "Set `api_key` in the provider configuration, or the `IC_API_KEY` variable.",
                AttributePath::new("api_key"),
            );
            return None;
        };
        let endpoint = setting(&config.iam_endpoint, &[ENDPOINT_VAR])
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned());

        let mut poll = PollSettings::default();
        if let Some(interval) = as_str(&config.poll_interval) {
            match parse_duration(interval) {
                Ok(interval) => {
                    poll.max_delay = interval;
                    poll.initial_delay = poll.initial_delay.min(interval);
                }
                Err(err) => {
                    diags.error(
                        "Invalid `poll_interval`",
                        format!("{err:#}"),
                        AttributePath::new("poll_interval"),
                    );
                    return None;
                }
            }
        }

        let client = match HttpClient::new(&endpoint, api_key) {
            Ok(client) => client,
            Err(err) => {
                diags.root_error("Failed to create the IAM client", format!("{err:#}"));
                return None;
            }
        };
        debug!(%endpoint, %terraform_version, "configured IAM client");

        let session = IamSession {
            api: Arc::new(client),
            account_id: as_str(&config.account_id).map(str::to_owned),
            poll,
        };
        if !self.session.set(session) {
            warn!("provider configured twice, keeping the first configuration");
        }
        Some(())
    }

    fn get_resources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<std::collections::HashMap<String, Box<dyn tf_provider::resource::DynamicResource>>>
    {
        let session = &self.session;
        Some(map! {
            "iam_policy_template" => TemplateResource::<PolicyTemplate>::new(session.clone(), false),
            "iam_policy_template_version" => TemplateResource::<PolicyTemplate>::new(session.clone(), true),
            "iam_action_control_template" => TemplateResource::<ActionControlTemplate>::new(session.clone(), false),
            "iam_action_control_template_version" => TemplateResource::<ActionControlTemplate>::new(session.clone(), true),
            "iam_role_template" => TemplateResource::<RoleTemplate>::new(session.clone(), false),
            "iam_role_template_version" => TemplateResource::<RoleTemplate>::new(session.clone(), true),
            "iam_policy_assignment" => AssignmentResource::new(session.clone(), AssignmentKind::Policy),
            "iam_action_control_assignment" => AssignmentResource::new(session.clone(), AssignmentKind::ActionControl),
            "iam_role_assignment" => AssignmentResource::new(session.clone(), AssignmentKind::Role),
            "iam_authorization_policy" => AuthorizationPolicyResource::new(session.clone()),
        })
    }

    fn get_data_sources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<
        std::collections::HashMap<String, Box<dyn tf_provider::data_source::DynamicDataSource>>,
    > {
        let session = &self.session;
        Some(map! {
            "iam_policy_template" => TemplateDataSource::<PolicyTemplate>::new(session.clone()),
            "iam_action_control_template" => TemplateDataSource::<ActionControlTemplate>::new(session.clone()),
            "iam_role_template" => TemplateDataSource::<RoleTemplate>::new(session.clone()),
            "iam_policy_assignments" => AssignmentsDataSource::new(session.clone(), AssignmentKind::Policy),
            "iam_action_control_assignments" => AssignmentsDataSource::new(session.clone(), AssignmentKind::ActionControl),
            "iam_role_assignments" => AssignmentsDataSource::new(session.clone(), AssignmentKind::Role),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tf_provider::Value;

    use super::*;
    use crate::utils::value;

    #[tokio::test]
    async fn validate_checks_poll_interval() {
        let provider = IamPolicyProvider::default();
        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            poll_interval: value("soon"),
            ..Default::default()
        };
        assert!(provider.validate(&mut diags, config).await.is_none());
        assert_eq!(diags.errors.len(), 1);

        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            poll_interval: value("30s"),
            account_id: Value::Unknown,
            ..Default::default()
        };
        assert!(provider.validate(&mut diags, config).await.is_some());
    }

    #[tokio::test]
    async fn configure_fills_the_session() {
        let provider = IamPolicyProvider::default();
        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            api_key: value("secret"),
            iam_endpoint: value("http://127.0.0.1:1"),
            account_id: value("acct-1"),
            poll_interval: value("1s"),
        };
        provider
            .configure(&mut diags, "1.9.0".into(), config)
            .await
            .unwrap();

        let session = provider.session.try_get().unwrap();
        assert_eq!(session.account_id(None), Some("acct-1"));
        assert_eq!(session.poll.max_delay, Duration::from_secs(1));
        assert_eq!(session.poll.initial_delay, Duration::from_secs(1));
    }

    #[test]
    fn registers_every_resource() {
        let provider = IamPolicyProvider::default();
        let mut diags = Diagnostics::default();
        let resources = provider.get_resources(&mut diags).unwrap();
        assert_eq!(resources.len(), 10);
        assert!(resources.contains_key("iam_authorization_policy"));
        let data_sources = provider.get_data_sources(&mut diags).unwrap();
        assert_eq!(data_sources.len(), 6);
    }
}
