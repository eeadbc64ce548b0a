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

use std::marker::PhantomData;

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{schema::Schema, AttributePath, Diagnostics, Resource};

use crate::client::{ApiResult, Template, TemplateRequest};
use crate::roles::RoleCatalog;
use crate::session::{IamSession, SessionHandle};
use crate::utils::{
    as_str, known, reject_empty, to_string, unknown_if_null, value, value_or_null,
};

use super::state::{parse_template_version_id, template_schema};
use super::{require_block, TemplateFields, TemplateKind, TemplateSchema, WithTemplateFields};

/// `ibm_iam_<kind>_template` and `ibm_iam_<kind>_template_version`
#[derive(Debug)]
pub struct TemplateResource<K: TemplateKind> {
    session: SessionHandle,
    mode: TemplateSchema,
    kind: PhantomData<fn() -> K>,
}

impl<K: TemplateKind> TemplateResource<K> {
    pub fn new(session: SessionHandle, versioned: bool) -> Self {
        Self {
            session,
            mode: if versioned {
                TemplateSchema::Version
            } else {
                TemplateSchema::Template
            },
            kind: PhantomData,
        }
    }

    fn body_path() -> AttributePath {
        AttributePath::new(K::ROUTE.body_field)
    }

    /// Account of the template: explicit, provider default, or the parent template's one
    async fn account_for<B>(
        &self,
        session: &IamSession,
        fields: &TemplateFields<'_, B>,
    ) -> ApiResult<Option<String>> {
        if let Some(account_id) = session.account_id(as_str(&fields.account_id)) {
            return Ok(Some(account_id.to_owned()));
        }
        match (self.mode, as_str(&fields.template_id)) {
            (TemplateSchema::Version, Some(template_id)) => Ok(session
                .api
                .list_template_versions(K::ROUTE, template_id)
                .await?
                .into_iter()
                .find_map(|template| template.account_id)),
            _ => Ok(None),
        }
    }

    /// Build the request for `fields`, resolving role names if the kind needs it
    fn request(
        &self,
        diags: &mut Diagnostics,
        fields: &TemplateFields<'_, K::Body<'_>>,
        catalog: &RoleCatalog,
        account_id: Option<String>,
    ) -> Option<TemplateRequest> {
        let Value::Value(body) = &fields.body else {
            diags.error_short(
                format!("Missing `{}` block", K::ROUTE.body_field),
                Self::body_path(),
            );
            return None;
        };
        let model = match K::to_model(body, catalog)
            .and_then(|model| serde_json::to_value(model).context("could not encode the body"))
        {
            Ok(model) => model,
            Err(err) => {
                diags.error(
                    format!("Invalid `{}` block", K::ROUTE.body_field),
                    format!("{err:#}"),
                    Self::body_path().index(0),
                );
                return None;
            }
        };
        Some(TemplateRequest {
            name: if self.mode == TemplateSchema::Template {
                to_string(&fields.name)
            } else {
                None
            },
            description: to_string(&fields.description),
            account_id,
            committed: None,
            body: model,
        })
    }

    fn plan_new<B>(&self, diags: &mut Diagnostics, fields: &mut TemplateFields<'_, B>) {
        fields.id = Value::Unknown;
        fields.version = Value::Unknown;
        match self.mode {
            TemplateSchema::Version => {
                fields.name = Value::Unknown;
                fields.account_id = Value::Unknown;
            }
            _ => {
                fields.template_id = Value::Unknown;
                if let Value::Null = fields.account_id {
                    match self.session.get(diags).and_then(|s| s.account_id.clone()) {
                        Some(account_id) => fields.account_id = value(account_id),
                        None => diags.error(
                            "Missing account id",
                            "Either set `account_id` on the template or on the provider.",
                            AttributePath::new("account_id"),
                        ),
                    }
                }
            }
        }
        unknown_if_null(&mut fields.committed);
        fields.href = Value::Unknown;
        fields.created_at = Value::Unknown;
        fields.created_by_id = Value::Unknown;
        fields.mark_modified();
    }
}

async fn catalog_for<K: TemplateKind>(
    session: &IamSession,
    account_id: Option<&str>,
    body: &Value<K::Body<'_>>,
) -> ApiResult<RoleCatalog> {
    match body {
        Value::Value(body) if K::RESOLVES_ROLES => {
            RoleCatalog::load(
                session.api.as_ref(),
                K::role_service(body).as_deref(),
                account_id.unwrap_or_default(),
            )
            .await
        }
        _ => Ok(RoleCatalog::default()),
    }
}

/// Decode the body stored in `template`, translating role CRNs back to names
pub(super) async fn read_body<'a, K: TemplateKind>(
    session: &IamSession,
    template: &Template,
) -> anyhow::Result<Value<K::Body<'a>>> {
    let Some(raw) = &template.body else {
        return Ok(Value::Null);
    };
    let field = K::ROUTE.body_field;
    let model: K::Model = serde_json::from_value(raw.clone())
        .with_context(|| format!("could not decode the {field} of {}", template.id))?;
    let catalog = if K::RESOLVES_ROLES {
        let account_id = template
            .account_id
            .as_deref()
            .or(session.account_id.as_deref())
            .unwrap_or_default();
        RoleCatalog::load(
            session.api.as_ref(),
            K::model_role_service(&model).as_deref(),
            account_id,
        )
        .await?
    } else {
        RoleCatalog::default()
    };
    Ok(Value::Value(K::from_model(&model, &catalog)))
}

#[async_trait]
impl<K: TemplateKind> Resource for TemplateResource<K> {
    type State<'a> = K::State<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: template_schema(K::NAME, self.mode, K::ROUTE.body_field, K::body_schema()),
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        let fields = config.into_fields();
        let description = AttributePath::new("description");
        reject_empty(&fields.description, diags, description);
        require_block(&fields.body, K::ROUTE.body_field, diags, Self::body_path());
        if let Value::Value(body) = &fields.body {
            K::validate_body(body, diags, Self::body_path().index(0));
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
        let mut fields = state.into_fields();
        let Some((template_id, version)) = fields.version_key() else {
            diags.root_error(
                "Invalid template id",
                "The id of a template must be `<template_id>/<version>`.",
            );
            return None;
        };

        let template = match session
            .api
            .get_template_version(K::ROUTE, &template_id, &version)
            .await
        {
            Ok(fetched) => fetched.value,
            Err(err) if err.is_not_found() => {
                diags.root_warning(
                    format!("{} template version not found", K::NAME),
                    format!("Version {version} of {template_id} no longer exists, it is removed."),
                );
                return None;
            }
            Err(err) => {
                diags.root_error(
                    format!("Failed to read {} template", K::NAME),
                    err.to_string(),
                );
                return None;
            }
        };

        fields.set_all(&template);
        match read_body::<K>(session, &template).await {
            Ok(body) => fields.body = body,
            Err(err) => {
                diags.error(
                    format!("Failed to read {} template", K::NAME),
                    format!("{err:#}"),
                    Self::body_path(),
                );
                return None;
            }
        }

        Some((WithTemplateFields::from_fields(fields), private_state))
    }

    async fn plan_create<'a>(
        &self,
        diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut fields = proposed_state.into_fields();
        self.plan_new(diags, &mut fields);

        Some((WithTemplateFields::from_fields(fields), Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        diags: &mut Diagnostics,
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
        let prior = prior_state.into_fields();
        let mut fields = proposed_state.into_fields();
        let mut trigger_replace = Vec::new();

        match self.mode {
            TemplateSchema::Template if fields.account_id != prior.account_id => {
                trigger_replace.push(AttributePath::new("account_id"));
            }
            TemplateSchema::Version if fields.template_id != prior.template_id => {
                trigger_replace.push(AttributePath::new("template_id"));
            }
            _ => (),
        }
        // A committed version cannot be uncommitted
        if known(&prior.committed) == Some(&true) && known(&fields.committed) == Some(&false) {
            trigger_replace.push(AttributePath::new("committed"));
        }

        if !trigger_replace.is_empty() {
            self.plan_new(diags, &mut fields);
        } else if fields != prior {
            fields.mark_modified();
        }

        Some((
            WithTemplateFields::from_fields(fields),
            prior_private_state,
            trigger_replace,
        ))
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
        let mut fields = planned_state.into_fields();

        let account_id = match self.account_for(session, &fields).await {
            Ok(account_id) => account_id,
            Err(err) => {
                diags.root_error("Failed to find the template account", err.to_string());
                return None;
            }
        };
        if self.mode == TemplateSchema::Template && account_id.is_none() {
            diags.error_short("Missing account id", AttributePath::new("account_id"));
            return None;
        }
        let catalog = match catalog_for::<K>(session, account_id.as_deref(), &fields.body).await {
            Ok(catalog) => catalog,
            Err(err) => {
                diags.root_error("Failed to list roles", err.to_string());
                return None;
            }
        };
        let account_id = if self.mode == TemplateSchema::Template {
            account_id
        } else {
            None
        };
        let mut request = self.request(diags, &fields, &catalog, account_id)?;
        if known(&fields.committed) == Some(&true) {
            request.committed = Some(true);
        }

        let created = match self.mode {
            TemplateSchema::Version => {
                let Some(template_id) = as_str(&fields.template_id) else {
                    diags.error_short("Missing template id", AttributePath::new("template_id"));
                    return None;
                };
                session
                    .api
                    .create_template_version(K::ROUTE, template_id, &request)
                    .await
            }
            _ => session.api.create_template(K::ROUTE, &request).await,
        };
        let created = match created {
            Ok(fetched) => fetched.value,
            Err(err) => {
                diags.root_error(
                    format!("Failed to create {} template", K::NAME),
                    err.to_string(),
                );
                return None;
            }
        };
        info!(
            template = %created.id,
            version = %created.version,
            "created {} template version",
            K::NAME
        );

        fields.set_computed(&created);
        if self.mode == TemplateSchema::Version {
            fields.name = value_or_null(created.name.clone());
        }

        Some((WithTemplateFields::from_fields(fields), private_state))
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
        let prior = prior_state.into_fields();
        let mut fields = planned_state.into_fields();
        let Some((template_id, version)) = prior.version_key() else {
            diags.root_error(
                "Invalid template id",
                "The id of a template must be `<template_id>/<version>`.",
            );
            return None;
        };

        let account_id = match self.account_for(session, &fields).await {
            Ok(account_id) => account_id,
            Err(err) => {
                diags.root_error("Failed to find the template account", err.to_string());
                return None;
            }
        };
        let (current, catalog) = match futures::future::try_join(
            session
                .api
                .get_template_version(K::ROUTE, &template_id, &version),
            catalog_for::<K>(session, account_id.as_deref(), &fields.body),
        )
        .await
        {
            Ok(fetched) => fetched,
            Err(err) => {
                diags.root_error(
                    format!("Failed to read {} template", K::NAME),
                    err.to_string(),
                );
                return None;
            }
        };
        let Some(etag) = current.etag else {
            diags.root_error(
                format!("Failed to update {} template", K::NAME),
                "The API did not return an ETag for the template version.",
            );
            return None;
        };
        let request = self.request(diags, &fields, &catalog, None)?;

        let replaced = match session
            .api
            .replace_template_version(K::ROUTE, &template_id, &version, &etag, &request)
            .await
        {
            Ok(replaced) => replaced,
            Err(err) => {
                diags.root_error(
                    format!("Failed to update {} template", K::NAME),
                    err.to_string(),
                );
                return None;
            }
        };
        debug!(template = %template_id, %version, "replaced {} template version", K::NAME);

        let mut template = replaced.value;
        if known(&fields.committed) == Some(&true) && !template.committed {
            let committed = match replaced.etag {
                Some(etag) => session
                    .api
                    .commit_template_version(K::ROUTE, &template_id, &version, &etag)
                    .await
                    .map(|()| true),
                None => Ok(false),
            };
            match committed {
                Ok(true) => {
                    info!(
                        template = %template_id,
                        %version,
                        "committed {} template version",
                        K::NAME
                    );
                    template.committed = true;
                    match session
                        .api
                        .get_template_version(K::ROUTE, &template_id, &version)
                        .await
                    {
                        Ok(fetched) => template = fetched.value,
                        Err(err) => {
                            warn!(
                                template = %template_id,
                                %version,
                                error = %err,
                                "could not read back the committed {} template version",
                                K::NAME
                            );
                            diags.root_warning(
                                format!("Failed to read back the committed {} template", K::NAME),
                                format!("The next refresh reads it again: {err}"),
                            );
                        }
                    }
                }
                Ok(false) => diags.root_error(
                    format!("Failed to commit {} template", K::NAME),
                    "The API did not return an ETag for the template version.",
                ),
                Err(err) => diags.root_error(
                    format!("Failed to commit {} template", K::NAME),
                    err.to_string(),
                ),
            }
        }

        fields.set_computed(&template);
        if self.mode == TemplateSchema::Version {
            fields.name = value_or_null(template.name.clone());
        }

        Some((WithTemplateFields::from_fields(fields), private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let session = self.session.get(diags)?;
        let fields = state.into_fields();
        let Some((template_id, version)) = fields.version_key() else {
            diags.root_error(
                "Invalid template id",
                "The id of a template must be `<template_id>/<version>`.",
            );
            return None;
        };

        let deleted = match self.mode {
            TemplateSchema::Version => {
                session
                    .api
                    .delete_template_version(K::ROUTE, &template_id, &version)
                    .await
            }
            _ => session.api.delete_template(K::ROUTE, &template_id).await,
        };
        match deleted {
            Ok(()) => info!(template = %template_id, %version, "deleted {} template", K::NAME),
            Err(err) if err.is_not_found() => {
                debug!(template = %template_id, %version, "{} template already deleted", K::NAME)
            }
            Err(err) => {
                diags.root_error(
                    format!("Failed to delete {} template", K::NAME),
                    err.to_string(),
                );
                return None;
            }
        }
        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let Some((template_id, version)) = parse_template_version_id(&id) else {
            diags.root_error(
                "Invalid import id",
                format!("`{id}` is not of the form `<template_id>/<version>`"),
            );
            return None;
        };
        let fields = TemplateFields {
            id: value(id.as_str()),
            template_id: value(template_id),
            version: value(version),
            ..Default::default()
        };
        Some((WithTemplateFields::from_fields(fields), Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::fake::FakeApi;
    use crate::template::action_control::{ActionControlBody, ActionControlTemplateState};
    use crate::template::policy::{PolicyAttributeBlock, PolicyBody, PolicyResourceBlock};
    use crate::template::{ActionControlTemplate, PolicyTemplate};
    use crate::utils::{string_list, strings};

    const VIEWER: &str = "crn:v1:bluemix:public:iam::::role:Viewer";

    fn action_control<'a>(description: &str) -> ActionControlTemplateState<'a> {
        ActionControlTemplateState {
            name: value("readers"),
            description: value(description),
            action_control: Value::Value(ActionControlBody {
                service_name: value("am"),
                description: Value::Null,
                actions: string_list(vec!["am.read".into()]),
            }),
            ..Default::default()
        }
    }

    fn resource<K: TemplateKind>(api: &Arc<FakeApi>, versioned: bool) -> TemplateResource<K> {
        let session = SessionHandle::configured(api.clone(), Some("acct-1"));
        TemplateResource::new(session, versioned)
    }

    async fn create<'a>(
        resource: &TemplateResource<ActionControlTemplate>,
        state: ActionControlTemplateState<'a>,
    ) -> ActionControlTemplateState<'a> {
        let mut diags = Diagnostics::default();
        let (planned, private) = resource
            .plan_create(&mut diags, state.clone(), state.clone(), Value::Null)
            .await
            .unwrap();
        assert_eq!(planned.id, Value::Unknown);
        assert_eq!(planned.account_id, value("acct-1"));
        let (created, _) = resource
            .create(&mut diags, planned, state, private, Value::Null)
            .await
            .unwrap();
        assert!(diags.errors.is_empty());
        created
    }

    #[tokio::test]
    async fn template_lifecycle() {
        let api = Arc::new(FakeApi::default());
        let resource = resource::<ActionControlTemplate>(&api, false);
        let created = create(&resource, action_control("first")).await;
        assert_eq!(created.id, value("tmpl-1/1"));
        assert_eq!(created.committed, Value::Value(false));
        assert_eq!(created.state, value("active"));

        let mut diags = Diagnostics::default();
        let (read, _) = resource
            .read(&mut diags, created.clone(), Value::Null, Value::Null)
            .await
            .unwrap();
        assert_eq!(read.action_control, created.action_control);
        assert_eq!(read.description, value("first"));

        let mut proposed = action_control("second");
        proposed.committed = Value::Value(true);
        let proposed = ActionControlTemplateState {
            id: read.id.clone(),
            template_id: read.template_id.clone(),
            version: read.version.clone(),
            account_id: read.account_id.clone(),
            ..proposed
        };
        let (planned, private, replace) = resource
            .plan_update(
                &mut diags,
                read.clone(),
                proposed.clone(),
                proposed,
                Value::Null,
                Value::Null,
            )
            .await
            .unwrap();
        assert!(replace.is_empty());
        assert_eq!(planned.last_modified_at, Value::Unknown);

        let (updated, _) = resource
            .update(
                &mut diags,
                read,
                planned.clone(),
                planned,
                private,
                Value::Null,
            )
            .await
            .unwrap();
        assert!(diags.errors.is_empty());
        assert_eq!(updated.committed, Value::Value(true));
        assert_eq!(updated.description, value("second"));
        let stored = api
            .template(ActionControlTemplate::ROUTE, "tmpl-1", "1")
            .unwrap();
        assert!(stored.committed);
        assert_eq!(stored.description.as_deref(), Some("second"));
        assert!(api
            .calls()
            .contains(&"POST action_control_templates/tmpl-1/versions/1/commit".to_owned()));

        resource
            .destroy(&mut diags, updated, Value::Null)
            .await
            .unwrap();
        assert!(api
            .template(ActionControlTemplate::ROUTE, "tmpl-1", "1")
            .is_none());
    }

    #[tokio::test]
    async fn failed_read_back_after_commit_is_reported() {
        let api = Arc::new(FakeApi::default());
        let resource = resource::<ActionControlTemplate>(&api, false);
        let created = create(&resource, action_control("first")).await;

        let mut planned = created.clone();
        planned.committed = Value::Value(true);
        planned.last_modified_at = Value::Unknown;
        // The first GET fetches the ETag, the second one follows the commit
        api.fail_call("GET action_control_templates/tmpl-1/versions/1", 1);

        let mut diags = Diagnostics::default();
        let (updated, _) = resource
            .update(
                &mut diags,
                created,
                planned.clone(),
                planned,
                Default::default(),
                Value::Null,
            )
            .await
            .unwrap();
        assert!(diags.errors.is_empty());
        assert_eq!(diags.warnings.len(), 1);
        assert_eq!(updated.committed, Value::Value(true));
        assert!(api
            .template(ActionControlTemplate::ROUTE, "tmpl-1", "1")
            .unwrap()
            .committed);
        assert_eq!(
            api.count_calls("GET action_control_templates/tmpl-1/versions/1"),
            2
        );
    }

    #[tokio::test]
    async fn version_resource_deletes_only_its_version() {
        let api = Arc::new(FakeApi::default());
        let template = resource::<ActionControlTemplate>(&api, false);
        create(&template, action_control("first")).await;

        let versions = resource::<ActionControlTemplate>(&api, true);
        let state = ActionControlTemplateState {
            template_id: value("tmpl-1"),
            ..action_control("second")
        };
        let mut diags = Diagnostics::default();
        let (planned, private) = versions
            .plan_create(&mut diags, state.clone(), state.clone(), Value::Null)
            .await
            .unwrap();
        assert_eq!(planned.name, Value::Unknown);
        let (created, _) = versions
            .create(&mut diags, planned, state, private, Value::Null)
            .await
            .unwrap();
        assert_eq!(created.id, value("tmpl-1/2"));
        assert_eq!(created.name, value("readers"));
        assert_eq!(created.account_id, value("acct-1"));

        versions
            .destroy(&mut diags, created, Value::Null)
            .await
            .unwrap();
        assert!(diags.errors.is_empty());
        assert!(api
            .template(ActionControlTemplate::ROUTE, "tmpl-1", "2")
            .is_none());
        assert!(api
            .template(ActionControlTemplate::ROUTE, "tmpl-1", "1")
            .is_some());
    }

    #[tokio::test]
    async fn missing_template_is_removed_from_state() {
        let api = Arc::new(FakeApi::default());
        let resource = resource::<ActionControlTemplate>(&api, false);
        let mut diags = Diagnostics::default();
        let (imported, private) = resource
            .import(&mut diags, "tmpl-404/1".to_owned())
            .await
            .unwrap();
        assert_eq!(imported.template_id, value("tmpl-404"));

        let read = resource
            .read(&mut diags, imported, private, Value::Null)
            .await;
        assert!(read.is_none());
        assert!(diags.errors.is_empty());
        assert_eq!(diags.warnings.len(), 1);
    }

    #[tokio::test]
    async fn replacement_triggers() {
        let api = Arc::new(FakeApi::default());
        let resource = resource::<ActionControlTemplate>(&api, false);
        let prior = ActionControlTemplateState {
            id: value("tmpl-1/1"),
            account_id: value("acct-1"),
            committed: Value::Value(true),
            ..action_control("first")
        };
        let proposed = ActionControlTemplateState {
            account_id: value("acct-2"),
            committed: Value::Value(false),
            ..prior.clone()
        };
        let mut diags = Diagnostics::default();
        let (planned, _, replace) = resource
            .plan_update(
                &mut diags,
                prior,
                proposed.clone(),
                proposed,
                Value::Null,
                Value::Null,
            )
            .await
            .unwrap();
        assert_eq!(replace.len(), 2);
        assert_eq!(planned.id, Value::Unknown);
    }

    #[tokio::test]
    async fn policy_roles_are_resolved_by_name() {
        let api = Arc::new(FakeApi::with_roles(&[("Viewer", VIEWER)]));
        let resource = resource::<PolicyTemplate>(&api, false);
        let state = crate::template::policy::PolicyTemplateState {
            name: value("viewers"),
            policy: Value::Value(PolicyBody {
                policy_type: value("access"),
                roles: string_list(vec!["Viewer".into()]),
                resource: Value::Value(PolicyResourceBlock {
                    attributes: Value::Value(vec![Value::Value(PolicyAttributeBlock {
                        key: value("serviceName"),
                        operator: value("stringEquals"),
                        value: value("iam-identity"),
                    })]),
                    tags: Value::Value(vec![]),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        let mut diags = Diagnostics::default();
        let (planned, private) = resource
            .plan_create(&mut diags, state.clone(), state.clone(), Value::Null)
            .await
            .unwrap();
        let (created, private) = resource
            .create(&mut diags, planned, state, private, Value::Null)
            .await
            .unwrap();
        assert!(diags.errors.is_empty());

        let stored = api.template(PolicyTemplate::ROUTE, "tmpl-1", "1").unwrap();
        assert_eq!(
            stored.body.unwrap()["control"]["grant"]["roles"][0]["role_id"],
            VIEWER
        );

        let (read, _) = resource
            .read(&mut diags, created, private, Value::Null)
            .await
            .unwrap();
        let Value::Value(body) = &read.policy else {
            panic!("policy block was not read back");
        };
        assert_eq!(strings(&body.roles), ["Viewer"]);
        assert_eq!(
            api.count_calls("GET roles?account_id=acct-1&service_name=iam-identity"),
            2
        );
    }

    #[tokio::test]
    async fn unknown_role_is_reported_on_the_body() {
        let api = Arc::new(FakeApi::with_roles(&[("Viewer", VIEWER)]));
        let resource = resource::<PolicyTemplate>(&api, false);
        let state = crate::template::policy::PolicyTemplateState {
            name: value("writers"),
            account_id: value("acct-1"),
            policy: Value::Value(PolicyBody {
                policy_type: value("access"),
                roles: string_list(vec!["Writer".into()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        let created = resource
            .create(&mut diags, state.clone(), state, Value::Null, Value::Null)
            .await;
        assert!(created.is_none());
        assert_eq!(diags.errors.len(), 1);
        assert_eq!(api.count_calls("POST policy_templates"), 0);
    }
}
