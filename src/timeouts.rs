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

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeConstraint, AttributeType, Block, Description};
use tf_provider::value::{Value, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::utils::{as_str, attribute, known, WithValidate};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutsBlock<'a> {
    pub create: ValueString<'a>,
    pub update: ValueString<'a>,
    pub delete: ValueString<'a>,
}

impl<'a> TimeoutsBlock<'a> {
    pub fn schema() -> Block {
        let duration = |operation: &str| {
            attribute(
                AttributeType::String,
                AttributeConstraint::Optional,
                &format!("Maximum time to wait for the {operation} to settle (default: 30m)"),
            )
        };
        Block {
            attributes: map! {
                "create" => duration("creation"),
                "update" => duration("update"),
                "delete" => duration("removal"),
            },
            description: Description::plain("Operation timeouts"),
            ..Default::default()
        }
    }

    fn get(&self, operation: Operation) -> &ValueString<'a> {
        match operation {
            Operation::Create => &self.create,
            Operation::Update => &self.update,
            Operation::Delete => &self.delete,
        }
    }
}

impl<'a> WithValidate for TimeoutsBlock<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        for operation in [Operation::Create, Operation::Update, Operation::Delete] {
            if let Some(text) = as_str(self.get(operation)) {
                if let Err(err) = parse_duration(text) {
                    diags.error(
                        "Invalid timeout",
                        format!("{err:#}"),
                        attr_path.clone().attribute(operation.name()),
                    );
                }
            }
        }
    }
}

pub fn parse_duration(text: &str) -> Result<Duration> {
    humantime::parse_duration(text.trim())
        .with_context(|| format!("`{text}` is not a duration (expected something like `30m`)"))
}

/// Timeout configured for `operation`, or the default one
pub fn timeout_for(timeouts: &Value<TimeoutsBlock<'_>>, operation: Operation) -> Result<Duration> {
    match known(timeouts).and_then(|timeouts| as_str(timeouts.get(operation))) {
        Some(text) => parse_duration(text),
        None => Ok(DEFAULT_TIMEOUT),
    }
}
