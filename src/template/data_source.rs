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

use async_trait::async_trait;

use tf_provider::{AttributePath, DataSource, Diagnostics, Schema, Value, ValueEmpty};

use crate::client::Template;
use crate::session::SessionHandle;
use crate::utils::as_str;

use super::resource::read_body;
use super::state::template_schema;
use super::{TemplateKind, TemplateSchema, WithTemplateFields};

/// `ibm_iam_<kind>_template` data source
#[derive(Debug)]
pub struct TemplateDataSource<K: TemplateKind> {
    session: SessionHandle,
    kind: PhantomData<fn() -> K>,
}

impl<K: TemplateKind> TemplateDataSource<K> {
    pub fn new(session: SessionHandle) -> Self {
        Self {
            session,
            kind: PhantomData,
        }
    }
}

/// Version numbers are compared numerically when they are numbers
fn latest(versions: Vec<Template>) -> Option<Template> {
    versions.into_iter().max_by(|a, b| {
        match (a.version.parse::<u64>(), b.version.parse::<u64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            _ => a.version.cmp(&b.version),
        }
    })
}

#[async_trait]
impl<K: TemplateKind> DataSource for TemplateDataSource<K> {
    type State<'a> = K::State<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: template_schema(
                K::NAME,
                TemplateSchema::DataSource,
                K::ROUTE.body_field,
                K::body_schema(),
            ),
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        let fields = config.into_fields();
        if let Some(version) = as_str(&fields.version) {
            if version.is_empty() {
                diags.error_short("`version` cannot be empty", AttributePath::new("version"));
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
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let session = self.session.get(diags)?;
        let mut fields = config.into_fields();
        let Some(template_id) = as_str(&fields.template_id).map(str::to_owned) else {
            diags.error_short(
                "`template_id` is required",
                AttributePath::new("template_id"),
            );
            return None;
        };

        let template = match as_str(&fields.version) {
            Some(version) => session
                .api
                .get_template_version(K::ROUTE, &template_id, version)
                .await
                .map(|fetched| Some(fetched.value)),
            None => session
                .api
                .list_template_versions(K::ROUTE, &template_id)
                .await
                .map(latest),
        };
        let template = match template {
            Ok(Some(template)) => template,
            Ok(None) => {
                diags.error_short(
                    format!("{} template {template_id} has no version", K::NAME),
                    AttributePath::new("template_id"),
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
                diags.root_error(
                    format!("Failed to read {} template", K::NAME),
                    format!("{err:#}"),
                );
                return None;
            }
        }

        Some(WithTemplateFields::from_fields(fields))
    }
}
