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

//! Waiting for assignments to settle.
//!
//! Assignment operations are asynchronous on the server side: the API accepts
//! the request and the assignment then moves through `accepted` and
//! `in_progress` before reaching `succeeded` or `failed`. [`wait_until`] polls
//! a status check until it reports [`Poll::Done`], and the classifiers map one
//! status fetch to a poll outcome.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::client::{ApiError, ApiResult, Assignment, AssignmentRoute, Fetched, IamPolicyApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay before the second status fetch
    pub initial_delay: Duration,
    /// Upper bound of the delay between two fetches
    pub max_delay: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentStatus {
    Accepted,
    InProgress,
    Succeeded,
    Failed,
    Other(String),
}

impl AssignmentStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "accepted" => Self::Accepted,
            "in_progress" => Self::InProgress,
            "succeeded" => Self::Succeeded,
            "failed" | "failure" => Self::Failed,
            other => Self::Other(other.to_owned()),
        }
    }

    fn of(assignment: &Assignment) -> Self {
        Self::parse(assignment.status.as_deref().unwrap_or_default())
    }
}

impl Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Accepted => "accepted",
            Self::InProgress => "in_progress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Other(other) => other.as_str(),
        })
    }
}

/// Outcome of one status check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll<T> {
    /// Not settled yet; carries the observed status
    Pending(AssignmentStatus),
    Done(T),
}

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("assignment {id} failed: {raw}")]
    Failed { id: String, raw: String },
    #[error("assignment {id} reached the unexpected status `{status}`: {raw}")]
    Unexpected {
        id: String,
        status: String,
        raw: String,
    },
    #[error("assignment {id} did not settle within {timeout:?} (last status: {last})")]
    Timeout {
        id: String,
        timeout: Duration,
        last: String,
    },
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Run `check` until it reports [`Poll::Done`], an error, or `timeout` elapses.
///
/// The first check runs immediately. The delay between checks starts at
/// `settings.initial_delay` and doubles up to `settings.max_delay`.
pub async fn wait_until<T, F, Fut>(
    settings: &PollSettings,
    id: &str,
    timeout: Duration,
    mut check: F,
) -> Result<T, WaitError>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Poll<T>, WaitError>> + Send,
    T: Send,
{
    let mut last = None;

    let poll_loop = async {
        let mut delay = settings.initial_delay;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match check().await {
                Ok(Poll::Done(value)) => {
                    debug!(assignment = id, attempt, "assignment settled");
                    return Ok(value);
                }
                Ok(Poll::Pending(status)) => {
                    debug!(assignment = id, attempt, %status, "assignment not settled yet");
                    last = Some(status);
                }
                Err(err) => return Err(err),
            }

            let jitter = rand::thread_rng().gen_range(0.9..1.1);
            tokio::time::sleep(delay.mul_f64(jitter)).await;
            delay = (delay * 2).min(settings.max_delay);
        }
    };

    let outcome = tokio::time::timeout(timeout, poll_loop).await;
    match outcome {
        Ok(result) => result,
        Err(_) => Err(WaitError::Timeout {
            id: id.to_owned(),
            timeout,
            last: last.map_or_else(|| "unknown".to_owned(), |status| status.to_string()),
        }),
    }
}

/// Classify a status fetch made while waiting for a creation or an update
pub fn classify_assigned(
    id: &str,
    fetched: ApiResult<Fetched<Assignment>>,
) -> Result<Poll<Assignment>, WaitError> {
    let fetched = fetched?;
    match AssignmentStatus::of(&fetched.value) {
        status @ (AssignmentStatus::Accepted | AssignmentStatus::InProgress) => {
            Ok(Poll::Pending(status))
        }
        AssignmentStatus::Succeeded => Ok(Poll::Done(fetched.value)),
        AssignmentStatus::Failed => Err(WaitError::Failed {
            id: id.to_owned(),
            raw: fetched.raw,
        }),
        AssignmentStatus::Other(status) => Err(WaitError::Unexpected {
            id: id.to_owned(),
            status,
            raw: fetched.raw,
        }),
    }
}

/// Classify a status fetch made while waiting for a removal.
///
/// The assignment disappearing (404) is what signals the end of the removal.
pub fn classify_removed(
    id: &str,
    fetched: ApiResult<Fetched<Assignment>>,
) -> Result<Poll<()>, WaitError> {
    let fetched = match fetched {
        Ok(fetched) => fetched,
        Err(err) if err.is_not_found() => return Ok(Poll::Done(())),
        Err(err) => return Err(err.into()),
    };
    match AssignmentStatus::of(&fetched.value) {
        status @ (AssignmentStatus::Accepted
        | AssignmentStatus::InProgress
        | AssignmentStatus::Succeeded) => Ok(Poll::Pending(status)),
        AssignmentStatus::Failed => Err(WaitError::Failed {
            id: id.to_owned(),
            raw: fetched.raw,
        }),
        AssignmentStatus::Other(status) => Err(WaitError::Unexpected {
            id: id.to_owned(),
            status,
            raw: fetched.raw,
        }),
    }
}

pub async fn wait_for_assignment(
    api: &dyn IamPolicyApi,
    route: AssignmentRoute,
    id: &str,
    settings: &PollSettings,
    timeout: Duration,
) -> Result<Assignment, WaitError> {
    wait_until(settings, id, timeout, || async move {
        classify_assigned(id, api.get_assignment(route, id).await)
    })
    .await
}

pub async fn wait_for_removal(
    api: &dyn IamPolicyApi,
    route: AssignmentRoute,
    id: &str,
    settings: &PollSettings,
    timeout: Duration,
) -> Result<(), WaitError> {
    wait_until(settings, id, timeout, || async move {
        classify_removed(id, api.get_assignment(route, id).await)
    })
    .await
}
