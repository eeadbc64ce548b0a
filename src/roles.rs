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

use anyhow::{anyhow, Result};
use tracing::debug;

use crate::client::{ApiResult, IamPolicyApi, Role};
use crate::utils::DisplayJoinable;

/// Roles known for one service, to translate display names to CRNs and back
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RoleCatalog {
    roles: Vec<Role>,
}

impl RoleCatalog {
    pub fn new(roles: Vec<Role>) -> Self {
        Self { roles }
    }

    pub async fn load(
        api: &dyn IamPolicyApi,
        service_name: Option<&str>,
        account_id: &str,
    ) -> ApiResult<Self> {
        let roles = api.list_roles(service_name, account_id).await?;
        debug!(
            service = service_name.unwrap_or_default(),
            count = roles.len(),
            "loaded role catalog"
        );
        Ok(Self::new(roles))
    }

    /// CRN of the role displayed as `name`. CRNs are accepted as is.
    pub fn crn_for(&self, name: &str) -> Result<String> {
        if name.starts_with("crn:") {
            return Ok(name.to_owned());
        }
        self.roles
            .iter()
            .find(|role| role.display_name == name)
            .map(|role| role.crn.clone())
            .ok_or_else(|| {
                anyhow!(
                    "role `{name}` does not exist, available roles are: {}",
                    self.roles
                        .iter()
                        .map(|role| &role.display_name)
                        .join_with(", ")
                )
            })
    }

    /// Display name of the role `crn`, or the CRN itself when the catalog does not know it
    pub fn name_for(&self, crn: &str) -> String {
        self.roles
            .iter()
            .find(|role| role.crn == crn)
            .map_or_else(|| crn.to_owned(), |role| role.display_name.clone())
    }

    pub fn crns_for<'b>(&self, names: impl IntoIterator<Item = &'b str>) -> Result<Vec<String>> {
        names.into_iter().map(|name| self.crn_for(name)).collect()
    }
}
