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

//! In-memory IAM Policy Management service used by the resource tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use super::models::PolicyRole;
use super::{
    ApiError, ApiResult, Assignment, AssignmentRequest, AssignmentRoute, Fetched, IamPolicyApi,
    Policy, PolicyRequest, Role, Template, TemplateRequest, TemplateRoute,
};

const TIMESTAMP: &str = "2024-01-01T00:00:00Z";

#[derive(Debug)]
struct StoredTemplate {
    template: Template,
    revision: u64,
}

#[derive(Debug)]
struct StoredAssignment {
    assignment: Assignment,
    statuses: VecDeque<String>,
    revision: u64,
    /// Status fetches left before a deleted assignment disappears
    removal: Option<usize>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    templates: BTreeMap<(String, String), Vec<StoredTemplate>>,
    assignments: BTreeMap<String, StoredAssignment>,
    policies: BTreeMap<String, Policy>,
    roles: Vec<Role>,
    script: Vec<String>,
    removal_polls: usize,
    /// Calls to fail, with the number of matching calls to let through first
    failures: Vec<(String, usize)>,
    calls: Vec<String>,
}

impl Inner {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn injected_failure(&mut self, method: &str, url: &str) -> Option<ApiError> {
        let call = format!("{method} {url}");
        let index = self
            .failures
            .iter()
            .position(|(failing, _)| *failing == call)?;
        let (_, skip) = &mut self.failures[index];
        if *skip > 0 {
            *skip -= 1;
            return None;
        }
        self.failures.remove(index);
        Some(ApiError::Status {
            method: method.to_owned(),
            url: url.to_owned(),
            status: 500,
            body: "{\"errors\":[{\"code\":\"internal_error\"}]}".to_owned(),
        })
    }
}

#[derive(Debug, Default)]
pub struct FakeApi {
    inner: Mutex<Inner>,
}

fn not_found(method: &str, url: String) -> ApiError {
    ApiError::Status {
        method: method.to_owned(),
        url,
        status: 404,
        body: "{\"errors\":[{\"code\":\"not_found\"}]}".to_owned(),
    }
}

fn precondition_failed(method: &str, url: String) -> ApiError {
    ApiError::Status {
        method: method.to_owned(),
        url,
        status: 412,
        body: "{\"errors\":[{\"code\":\"precondition_failed\"}]}".to_owned(),
    }
}

fn fetched_template(stored: &StoredTemplate, route: TemplateRoute) -> Fetched<Template> {
    Fetched {
        value: stored.template.clone(),
        etag: Some(format!("rev-{}", stored.revision)),
        raw: stored.template.to_json(route.body_field).to_string(),
    }
}

fn fetched_assignment(stored: &StoredAssignment) -> Fetched<Assignment> {
    Fetched {
        value: stored.assignment.clone(),
        etag: Some(format!("rev-{}", stored.revision)),
        raw: serde_json::to_string(&stored.assignment).unwrap_or_default(),
    }
}

impl FakeApi {
    pub fn with_roles(roles: &[(&str, &str)]) -> Self {
        let api = Self::default();
        api.lock().roles = roles
            .iter()
            .map(|(display_name, crn)| Role {
                display_name: display_name.to_string(),
                crn: crn.to_string(),
                description: None,
            })
            .collect();
        api
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Statuses reported by the status fetches of the next created or updated assignment.
    /// The last one sticks.
    pub fn script_statuses(&self, statuses: &[&str]) {
        self.lock().script = statuses.iter().map(|s| s.to_string()).collect();
    }

    /// Number of status fetches during which a deleted assignment is still reported
    pub fn set_removal_polls(&self, polls: usize) {
        self.lock().removal_polls = polls;
    }

    /// Fails `call` with a 500 once `skip` matching calls have gone through
    pub fn fail_call(&self, call: &str, skip: usize) {
        self.lock().failures.push((call.to_owned(), skip));
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub fn assignment(&self, id: &str) -> Option<Assignment> {
        self.lock()
            .assignments
            .get(id)
            .map(|stored| stored.assignment.clone())
    }

    pub fn template(&self, route: TemplateRoute, id: &str, version: &str) -> Option<Template> {
        self.lock()
            .templates
            .get(&(route.collection.to_owned(), id.to_owned()))
            .and_then(|versions| {
                versions
                    .iter()
                    .find(|stored| stored.template.version == version)
            })
            .map(|stored| stored.template.clone())
    }

    pub fn policy(&self, id: &str) -> Option<Policy> {
        self.lock().policies.get(id).cloned()
    }

    fn take_script(inner: &mut Inner) -> VecDeque<String> {
        let script = std::mem::take(&mut inner.script);
        if script.is_empty() {
            VecDeque::from(["succeeded".to_owned()])
        } else {
            script.into()
        }
    }
}

fn new_template(
    inner: &mut Inner,
    id: String,
    version: String,
    request: &TemplateRequest,
) -> Template {
    Template {
        href: Some(format!("https://iam.test/templates/{id}/versions/{version}")),
        id,
        version,
        name: request.name.clone(),
        description: request.description.clone(),
        account_id: request.account_id.clone(),
        committed: request.committed.unwrap_or_default(),
        state: Some("active".to_owned()),
        created_at: Some(TIMESTAMP.to_owned()),
        created_by_id: Some("IBMid-tester".to_owned()),
        last_modified_at: Some(TIMESTAMP.to_owned()),
        last_modified_by_id: Some(format!("IBMid-tester-{}", inner.next_id)),
        body: Some(request.body.clone()),
    }
}

#[async_trait]
impl IamPolicyApi for FakeApi {
    async fn create_template(
        &self,
        route: TemplateRoute,
        request: &TemplateRequest,
    ) -> ApiResult<Fetched<Template>> {
        let mut inner = self.lock();
        inner.calls.push(format!("POST {}", route.collection));
        let id = inner.next_id("tmpl");
        let template = new_template(&mut inner, id.clone(), "1".to_owned(), request);
        let stored = StoredTemplate {
            template,
            revision: 1,
        };
        let fetched = fetched_template(&stored, route);
        inner
            .templates
            .insert((route.collection.to_owned(), id), vec![stored]);
        Ok(fetched)
    }

    async fn create_template_version(
        &self,
        route: TemplateRoute,
        template_id: &str,
        request: &TemplateRequest,
    ) -> ApiResult<Fetched<Template>> {
        let mut inner = self.lock();
        inner
            .calls
            .push(format!("POST {}/{template_id}/versions", route.collection));
        let key = (route.collection.to_owned(), template_id.to_owned());
        let Some(count) = inner.templates.get(&key).map(Vec::len) else {
            return Err(not_found("POST", format!("{}/{template_id}", route.collection)));
        };
        let mut template = new_template(
            &mut inner,
            template_id.to_owned(),
            (count + 1).to_string(),
            request,
        );
        if let Some(first) = inner.templates.get(&key).and_then(|v| v.first()) {
            template.name = first.template.name.clone();
            template.account_id = first.template.account_id.clone();
        }
        let stored = StoredTemplate {
            template,
            revision: 1,
        };
        let fetched = fetched_template(&stored, route);
        if let Some(versions) = inner.templates.get_mut(&key) {
            versions.push(stored);
        }
        Ok(fetched)
    }

    async fn get_template_version(
        &self,
        route: TemplateRoute,
        template_id: &str,
        version: &str,
    ) -> ApiResult<Fetched<Template>> {
        let mut inner = self.lock();
        let url = format!("{}/{template_id}/versions/{version}", route.collection);
        inner.calls.push(format!("GET {url}"));
        if let Some(err) = inner.injected_failure("GET", &url) {
            return Err(err);
        }
        inner
            .templates
            .get(&(route.collection.to_owned(), template_id.to_owned()))
            .and_then(|versions| {
                versions
                    .iter()
                    .find(|stored| stored.template.version == version)
            })
            .map(|stored| fetched_template(stored, route))
            .ok_or_else(|| not_found("GET", url))
    }

    async fn list_template_versions(
        &self,
        route: TemplateRoute,
        template_id: &str,
    ) -> ApiResult<Vec<Template>> {
        let mut inner = self.lock();
        let url = format!("{}/{template_id}/versions", route.collection);
        inner.calls.push(format!("GET {url}"));
        inner
            .templates
            .get(&(route.collection.to_owned(), template_id.to_owned()))
            .map(|versions| {
                versions
                    .iter()
                    .map(|stored| stored.template.clone())
                    .collect()
            })
            .ok_or_else(|| not_found("GET", url))
    }

    async fn replace_template_version(
        &self,
        route: TemplateRoute,
        template_id: &str,
        version: &str,
        etag: &str,
        request: &TemplateRequest,
    ) -> ApiResult<Fetched<Template>> {
        let mut inner = self.lock();
        let url = format!("{}/{template_id}/versions/{version}", route.collection);
        inner.calls.push(format!("PUT {url}"));
        let stored = inner
            .templates
            .get_mut(&(route.collection.to_owned(), template_id.to_owned()))
            .and_then(|versions| {
                versions
                    .iter_mut()
                    .find(|stored| stored.template.version == version)
            })
            .ok_or_else(|| not_found("PUT", url.clone()))?;
        if etag != format!("rev-{}", stored.revision) {
            return Err(precondition_failed("PUT", url));
        }
        if request.name.is_some() {
            stored.template.name = request.name.clone();
        }
        stored.template.description = request.description.clone();
        stored.template.body = Some(request.body.clone());
        stored.revision += 1;
        stored.template.last_modified_at = Some(format!("rev-{}", stored.revision));
        Ok(fetched_template(stored, route))
    }

    async fn commit_template_version(
        &self,
        route: TemplateRoute,
        template_id: &str,
        version: &str,
        etag: &str,
    ) -> ApiResult<()> {
        let mut inner = self.lock();
        let url = format!(
            "{}/{template_id}/versions/{version}/commit",
            route.collection
        );
        inner.calls.push(format!("POST {url}"));
        let stored = inner
            .templates
            .get_mut(&(route.collection.to_owned(), template_id.to_owned()))
            .and_then(|versions| {
                versions
                    .iter_mut()
                    .find(|stored| stored.template.version == version)
            })
            .ok_or_else(|| not_found("POST", url.clone()))?;
        if etag != format!("rev-{}", stored.revision) {
            return Err(precondition_failed("POST", url));
        }
        stored.template.committed = true;
        stored.revision += 1;
        Ok(())
    }

    async fn delete_template_version(
        &self,
        route: TemplateRoute,
        template_id: &str,
        version: &str,
    ) -> ApiResult<()> {
        let mut inner = self.lock();
        let url = format!("{}/{template_id}/versions/{version}", route.collection);
        inner.calls.push(format!("DELETE {url}"));
        let versions = inner
            .templates
            .get_mut(&(route.collection.to_owned(), template_id.to_owned()))
            .ok_or_else(|| not_found("DELETE", url.clone()))?;
        let before = versions.len();
        versions.retain(|stored| stored.template.version != version);
        if versions.len() == before {
            return Err(not_found("DELETE", url));
        }
        Ok(())
    }

    async fn delete_template(&self, route: TemplateRoute, template_id: &str) -> ApiResult<()> {
        let mut inner = self.lock();
        let url = format!("{}/{template_id}", route.collection);
        inner.calls.push(format!("DELETE {url}"));
        inner
            .templates
            .remove(&(route.collection.to_owned(), template_id.to_owned()))
            .map(|_| ())
            .ok_or_else(|| not_found("DELETE", url))
    }

    async fn create_assignment(
        &self,
        route: AssignmentRoute,
        request: &AssignmentRequest,
    ) -> ApiResult<Fetched<Assignment>> {
        let mut inner = self.lock();
        inner.calls.push(format!("POST {}", route.collection));
        let id = inner.next_id("assignment");
        let statuses = Self::take_script(&mut inner);
        let assignment = Assignment {
            id: id.clone(),
            account_id: Some("acct-1".to_owned()),
            target: Some(request.target.clone()),
            template: request.templates.first().cloned(),
            status: Some(if statuses.len() > 1 {
                "accepted".to_owned()
            } else {
                statuses[0].clone()
            }),
            operation: Some("create".to_owned()),
            href: Some(format!("https://iam.test/{}/{id}", route.collection)),
            created_at: Some(TIMESTAMP.to_owned()),
            created_by_id: Some("IBMid-tester".to_owned()),
            last_modified_at: Some(TIMESTAMP.to_owned()),
            last_modified_by_id: Some("IBMid-tester".to_owned()),
        };
        let stored = StoredAssignment {
            assignment,
            statuses,
            revision: 1,
            removal: None,
        };
        let fetched = fetched_assignment(&stored);
        inner.assignments.insert(id, stored);
        Ok(fetched)
    }

    async fn get_assignment(
        &self,
        route: AssignmentRoute,
        id: &str,
    ) -> ApiResult<Fetched<Assignment>> {
        let mut inner = self.lock();
        let url = format!("{}/{id}", route.collection);
        inner.calls.push(format!("GET {url}"));
        let Some(stored) = inner.assignments.get_mut(id) else {
            return Err(not_found("GET", url));
        };
        let removal = stored.removal;
        match removal {
            Some(0) => {
                inner.assignments.remove(id);
                return Err(not_found("GET", url));
            }
            Some(left) => {
                stored.removal = Some(left - 1);
                stored.assignment.status = Some("in_progress".to_owned());
            }
            None => {
                let status = if stored.statuses.len() > 1 {
                    stored.statuses.pop_front()
                } else {
                    stored.statuses.front().cloned()
                };
                stored.assignment.status = status;
            }
        }
        Ok(fetched_assignment(stored))
    }

    async fn list_assignments(
        &self,
        route: AssignmentRoute,
        account_id: &str,
        template_id: Option<&str>,
    ) -> ApiResult<Vec<Assignment>> {
        let mut inner = self.lock();
        inner
            .calls
            .push(format!("GET {}?account_id={account_id}", route.collection));
        Ok(inner
            .assignments
            .values()
            .map(|stored| &stored.assignment)
            .filter(|assignment| assignment.account_id.as_deref() == Some(account_id))
            .filter(|assignment| match (template_id, &assignment.template) {
                (Some(wanted), Some(template)) => template.id == wanted,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .cloned()
            .collect())
    }

    async fn update_assignment(
        &self,
        route: AssignmentRoute,
        id: &str,
        etag: &str,
        template_version: &str,
    ) -> ApiResult<Fetched<Assignment>> {
        let mut inner = self.lock();
        let url = format!("{}/{id}", route.collection);
        inner.calls.push(format!("PATCH {url}"));
        let statuses = Self::take_script(&mut inner);
        let stored = inner
            .assignments
            .get_mut(id)
            .ok_or_else(|| not_found("PATCH", url.clone()))?;
        if etag != format!("rev-{}", stored.revision) {
            return Err(precondition_failed("PATCH", url));
        }
        if let Some(template) = &mut stored.assignment.template {
            template.version = template_version.to_owned();
        }
        stored.statuses = statuses;
        stored.revision += 1;
        stored.assignment.operation = Some("update".to_owned());
        stored.assignment.last_modified_at = Some(format!("rev-{}", stored.revision));
        Ok(fetched_assignment(stored))
    }

    async fn delete_assignment(&self, route: AssignmentRoute, id: &str) -> ApiResult<()> {
        let mut inner = self.lock();
        let url = format!("{}/{id}", route.collection);
        inner.calls.push(format!("DELETE {url}"));
        let removal_polls = inner.removal_polls;
        let stored = inner
            .assignments
            .get_mut(id)
            .ok_or_else(|| not_found("DELETE", url))?;
        stored.removal = Some(removal_polls);
        stored.assignment.operation = Some("remove".to_owned());
        Ok(())
    }

    async fn list_roles(
        &self,
        service_name: Option<&str>,
        account_id: &str,
    ) -> ApiResult<Vec<Role>> {
        let mut inner = self.lock();
        inner.calls.push(format!(
            "GET roles?account_id={account_id}&service_name={}",
            service_name.unwrap_or_default()
        ));
        Ok(inner.roles.clone())
    }

    async fn create_policy(&self, request: &PolicyRequest) -> ApiResult<Fetched<Policy>> {
        let mut inner = self.lock();
        inner.calls.push("POST policies".to_owned());
        let id = inner.next_id("policy");
        let roles = request
            .roles
            .iter()
            .map(|role| PolicyRole {
                role_id: role.role_id.clone(),
                display_name: inner
                    .roles
                    .iter()
                    .find(|known| known.crn == role.role_id)
                    .map(|known| known.display_name.clone()),
            })
            .collect();
        let policy = Policy {
            id: id.clone(),
            policy_type: request.policy_type.clone(),
            description: request.description.clone(),
            subjects: request.subjects.clone(),
            roles,
            resources: request.resources.clone(),
            href: Some(format!("https://iam.test/v1/policies/{id}")),
            state: Some("active".to_owned()),
            created_at: Some(TIMESTAMP.to_owned()),
            created_by_id: Some("IBMid-tester".to_owned()),
            last_modified_at: Some(TIMESTAMP.to_owned()),
            last_modified_by_id: Some("IBMid-tester".to_owned()),
        };
        inner.policies.insert(id, policy.clone());
        Ok(Fetched {
            raw: serde_json::to_string(&policy).unwrap_or_default(),
            value: policy,
            etag: Some("rev-1".to_owned()),
        })
    }

    async fn get_policy(&self, id: &str) -> ApiResult<Fetched<Policy>> {
        let mut inner = self.lock();
        inner.calls.push(format!("GET policies/{id}"));
        let policy = inner
            .policies
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("GET", format!("policies/{id}")))?;
        Ok(Fetched {
            raw: serde_json::to_string(&policy).unwrap_or_default(),
            value: policy,
            etag: Some("rev-1".to_owned()),
        })
    }

    async fn delete_policy(&self, id: &str) -> ApiResult<()> {
        let mut inner = self.lock();
        inner.calls.push(format!("DELETE policies/{id}"));
        inner
            .policies
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("DELETE", format!("policies/{id}")))
    }
}
