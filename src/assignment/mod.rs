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

use crate::client::AssignmentRoute;

mod data_source;
pub mod poller;
mod resource;
mod state;

pub use data_source::AssignmentsDataSource;
pub use poller::PollSettings;
pub use resource::AssignmentResource;

/// Template family an assignment distributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKind {
    ActionControl,
    Policy,
    Role,
}

impl AssignmentKind {
    pub fn name(self) -> &'static str {
        match self {
            AssignmentKind::ActionControl => "action control",
            AssignmentKind::Policy => "policy",
            AssignmentKind::Role => "role",
        }
    }

    pub fn route(self) -> AssignmentRoute {
        match self {
            AssignmentKind::ActionControl => AssignmentRoute {
                collection: "action_control_assignments",
                api_version: None,
            },
            AssignmentKind::Policy => AssignmentRoute {
                collection: "policy_assignments",
                api_version: Some("1.0"),
            },
            AssignmentKind::Role => AssignmentRoute {
                collection: "role_assignments",
                api_version: None,
            },
        }
    }
}
