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

use std::sync::{Arc, OnceLock};

use tf_provider::Diagnostics;

use crate::assignment::PollSettings;
use crate::client::IamPolicyApi;

/// Everything resources need once the provider has been configured
#[derive(Debug)]
pub struct IamSession {
    pub api: Arc<dyn IamPolicyApi>,
    /// Account used when a resource does not name one
    pub account_id: Option<String>,
    pub poll: PollSettings,
}

impl IamSession {
    pub fn account_id<'b>(&'b self, explicit: Option<&'b str>) -> Option<&'b str> {
        explicit.or(self.account_id.as_deref())
    }
}

/// Shared between the provider and all its resources and data sources.
///
/// Resources are registered before Terraform configures the provider, so the
/// session is filled in later, exactly once.
#[derive(Debug, Default, Clone)]
pub struct SessionHandle(Arc<OnceLock<IamSession>>);

impl SessionHandle {
    pub fn set(&self, session: IamSession) -> bool {
        self.0.set(session).is_ok()
    }

    pub fn get(&self, diags: &mut Diagnostics) -> Option<&IamSession> {
        let session = self.0.get();
        if session.is_none() {
            diags.root_error(
                "Provider is not configured",
                "The IBM IAM policy provider must be configured before its resources can be used.",
            );
        }
        session
    }

    /// The session, if the provider is already configured
    pub fn try_get(&self) -> Option<&IamSession> {
        self.0.get()
    }

    #[cfg(test)]
    pub fn configured(api: Arc<dyn IamPolicyApi>, account_id: Option<&str>) -> Self {
        let handle = Self::default();
        handle.set(IamSession {
            api,
            account_id: account_id.map(str::to_owned),
            poll: PollSettings::default(),
        });
        handle
    }
}
