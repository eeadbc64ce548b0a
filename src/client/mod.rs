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

use std::fmt::Debug;

use async_trait::async_trait;

mod error;
#[cfg(test)]
pub mod fake;
pub mod http;
pub mod models;

pub use error::ApiError;
pub use http::HttpClient;
pub use models::{
    Assignment, AssignmentRequest, Fetched, Policy, PolicyAttribute, PolicyAttributes,
    PolicyRequest, PolicyRole, Role, Template, TemplateRequest,
};

pub type ApiResult<T> = Result<T, ApiError>;

/// Collection of one template kind, and where its body lives in the payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateRoute {
    pub collection: &'static str,
    pub body_field: &'static str,
}

/// Collection of one assignment kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentRoute {
    pub collection: &'static str,
    /// Value of the `version` query parameter, when the collection requires one
    pub api_version: Option<&'static str>,
}

#[async_trait]
pub trait IamPolicyApi: Debug + Send + Sync + 'static {
    /// Create a template, along with its first version
    async fn create_template(
        &self,
        route: TemplateRoute,
        request: &TemplateRequest,
    ) -> ApiResult<Fetched<Template>>;

    /// Create a new version of an existing template
    async fn create_template_version(
        &self,
        route: TemplateRoute,
        template_id: &str,
        request: &TemplateRequest,
    ) -> ApiResult<Fetched<Template>>;

    async fn get_template_version(
        &self,
        route: TemplateRoute,
        template_id: &str,
        version: &str,
    ) -> ApiResult<Fetched<Template>>;

    async fn list_template_versions(
        &self,
        route: TemplateRoute,
        template_id: &str,
    ) -> ApiResult<Vec<Template>>;

    async fn replace_template_version(
        &self,
        route: TemplateRoute,
        template_id: &str,
        version: &str,
        etag: &str,
        request: &TemplateRequest,
    ) -> ApiResult<Fetched<Template>>;

    async fn commit_template_version(
        &self,
        route: TemplateRoute,
        template_id: &str,
        version: &str,
        etag: &str,
    ) -> ApiResult<()>;

    async fn delete_template_version(
        &self,
        route: TemplateRoute,
        template_id: &str,
        version: &str,
    ) -> ApiResult<()>;

    /// Delete a template with all its versions
    async fn delete_template(&self, route: TemplateRoute, template_id: &str) -> ApiResult<()>;

    /// Create an assignment, returning the first assignment of the response
    async fn create_assignment(
        &self,
        route: AssignmentRoute,
        request: &AssignmentRequest,
    ) -> ApiResult<Fetched<Assignment>>;

    async fn get_assignment(
        &self,
        route: AssignmentRoute,
        id: &str,
    ) -> ApiResult<Fetched<Assignment>>;

    async fn list_assignments(
        &self,
        route: AssignmentRoute,
        account_id: &str,
        template_id: Option<&str>,
    ) -> ApiResult<Vec<Assignment>>;

    async fn update_assignment(
        &self,
        route: AssignmentRoute,
        id: &str,
        etag: &str,
        template_version: &str,
    ) -> ApiResult<Fetched<Assignment>>;

    async fn delete_assignment(&self, route: AssignmentRoute, id: &str) -> ApiResult<()>;

    /// List the roles usable in `account_id`, restricted to a service if given
    async fn list_roles(&self, service_name: Option<&str>, account_id: &str)
        -> ApiResult<Vec<Role>>;

    async fn create_policy(&self, request: &PolicyRequest) -> ApiResult<Fetched<Policy>>;

    async fn get_policy(&self, id: &str) -> ApiResult<Fetched<Policy>>;

    async fn delete_policy(&self, id: &str) -> ApiResult<()>;
}
