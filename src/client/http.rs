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

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ETAG, IF_MATCH};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::models::{AssignmentList, RoleList, TemplateVersions};
use super::{
    ApiError, ApiResult, Assignment, AssignmentRequest, AssignmentRoute, Fetched, IamPolicyApi,
    Policy, PolicyRequest, Role, Template, TemplateRequest, TemplateRoute,
};

pub const DEFAULT_ENDPOINT: &str = "https://iam.cloud.ibm.com";
const APIKEY_GRANT: &str = "urn:ibm:params:oauth:grant-type:apikey";
/// Tokens are refreshed this long before they expire
const TOKEN_MARGIN: u64 = 60;

#[derive(Debug, Clone)]
struct Token {
    access_token: String,
    expiration: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expiration: Option<u64>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// IAM Policy Management client, authenticated with an API key
pub struct HttpClient {
    http: reqwest::Client,
    endpoint: String,
    token_url: String,
    api_key: String,
    token: Mutex<Option<Token>>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("endpoint", &self.endpoint)
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

struct Response {
    url: String,
    etag: Option<String>,
    raw: String,
}

impl Response {
    fn decode<T: DeserializeOwned>(&self) -> ApiResult<T> {
        serde_json::from_str(&self.raw).map_err(|source| ApiError::Decode {
            url: self.url.clone(),
            source,
        })
    }

    fn template(self, route: TemplateRoute) -> ApiResult<Fetched<Template>> {
        let json = self.decode()?;
        let value = Template::from_json(json, route.body_field).map_err(|source| {
            ApiError::Decode {
                url: self.url.clone(),
                source,
            }
        })?;
        Ok(self.fetched(value))
    }

    fn fetched<T>(self, value: T) -> Fetched<T> {
        Fetched {
            value,
            etag: self.etag,
            raw: self.raw,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

fn api_version(route: AssignmentRoute) -> Vec<(&'static str, &'static str)> {
    route
        .api_version
        .map(|version| ("version", version))
        .into_iter()
        .collect()
}

impl HttpClient {
    pub fn new(endpoint: &str, api_key: impl Into<String>) -> anyhow::Result<Self> {
        let endpoint = endpoint.trim_end_matches('/').to_owned();
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            token_url: format!("{endpoint}/identity/token"),
            endpoint,
            api_key: api_key.into(),
            token: Mutex::new(None),
        })
    }

    async fn token(&self) -> ApiResult<String> {
        let mut cached = self.token.lock().await;
        let now = unix_now();
        if let Some(token) = cached.as_ref() {
            if token.expiration > now + TOKEN_MARGIN {
                return Ok(token.access_token.clone());
            }
        }

        debug!(url = %self.token_url, "requesting an IAM access token");
        let response = self
            .http
            .post(&self.token_url)
            .header(ACCEPT, "application/json")
            .form(&[
                ("grant_type", APIKEY_GRANT),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                method: "POST".to_owned(),
                url: self.token_url.clone(),
                source,
            })?;
        let status = response.status();
        let body = response.text().await.map_err(|source| ApiError::Transport {
            method: "POST".to_owned(),
            url: self.token_url.clone(),
            source,
        })?;
        if !status.is_success() {
            return Err(ApiError::Auth(format!("HTTP {status}: {body}")));
        }

        let fresh: TokenResponse =
            serde_json::from_str(&body).map_err(|source| ApiError::Decode {
                url: self.token_url.clone(),
                source,
            })?;
        let expiration = fresh
            .expiration
            .unwrap_or_else(|| now + fresh.expires_in.unwrap_or_default());
        *cached = Some(Token {
            access_token: fresh.access_token.clone(),
            expiration,
        });
        Ok(fresh.access_token)
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        etag: Option<&str>,
        body: Option<&serde_json::Value>,
    ) -> ApiResult<Response> {
        let url = format!("{}{}", self.endpoint, path);
        let token = self.token().await?;

        let mut request = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .query(query);
        if let Some(etag) = etag {
            request = request.header(IF_MATCH, etag);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%method, %url, "calling the IAM policy API");
        let transport = |source: reqwest::Error| ApiError::Transport {
            method: method.to_string(),
            url: url.clone(),
            source,
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let raw = response.text().await.map_err(transport)?;

        if !status.is_success() {
            debug!(%method, %url, status = status.as_u16(), "IAM policy API call failed");
            return Err(ApiError::Status {
                method: method.to_string(),
                url,
                status: status.as_u16(),
                body: raw,
            });
        }
        Ok(Response { url, etag, raw })
    }

    fn first_assignment(response: Response) -> ApiResult<Fetched<Assignment>> {
        let list: AssignmentList = response.decode()?;
        match list.assignments.into_iter().next() {
            Some(assignment) => Ok(response.fetched(assignment)),
            None => Err(ApiError::Missing {
                url: response.url,
                field: "assignments",
            }),
        }
    }
}

#[async_trait]
impl IamPolicyApi for HttpClient {
    async fn create_template(
        &self,
        route: TemplateRoute,
        request: &TemplateRequest,
    ) -> ApiResult<Fetched<Template>> {
        let body = request.to_json(route.body_field);
        self.call(
            Method::POST,
            &format!("/v1/{}", route.collection),
            &[],
            None,
            Some(&body),
        )
        .await?
        .template(route)
    }

    async fn create_template_version(
        &self,
        route: TemplateRoute,
        template_id: &str,
        request: &TemplateRequest,
    ) -> ApiResult<Fetched<Template>> {
        let body = request.to_json(route.body_field);
        self.call(
            Method::POST,
            &format!("/v1/{}/{template_id}/versions", route.collection),
            &[],
            None,
            Some(&body),
        )
        .await?
        .template(route)
    }

    async fn get_template_version(
        &self,
        route: TemplateRoute,
        template_id: &str,
        version: &str,
    ) -> ApiResult<Fetched<Template>> {
        self.call(
            Method::GET,
            &format!("/v1/{}/{template_id}/versions/{version}", route.collection),
            &[],
            None,
            None,
        )
        .await?
        .template(route)
    }

    async fn list_template_versions(
        &self,
        route: TemplateRoute,
        template_id: &str,
    ) -> ApiResult<Vec<Template>> {
        let response = self
            .call(
                Method::GET,
                &format!("/v1/{}/{template_id}/versions", route.collection),
                &[],
                None,
                None,
            )
            .await?;
        let versions: TemplateVersions = response.decode()?;
        versions
            .versions
            .into_iter()
            .map(|json| Template::from_json(json, route.body_field))
            .collect::<Result<_, _>>()
            .map_err(|source| ApiError::Decode {
                url: response.url.clone(),
                source,
            })
    }

    async fn replace_template_version(
        &self,
        route: TemplateRoute,
        template_id: &str,
        version: &str,
        etag: &str,
        request: &TemplateRequest,
    ) -> ApiResult<Fetched<Template>> {
        let body = request.to_json(route.body_field);
        self.call(
            Method::PUT,
            &format!("/v1/{}/{template_id}/versions/{version}", route.collection),
            &[],
            Some(etag),
            Some(&body),
        )
        .await?
        .template(route)
    }

    async fn commit_template_version(
        &self,
        route: TemplateRoute,
        template_id: &str,
        version: &str,
        etag: &str,
    ) -> ApiResult<()> {
        self.call(
            Method::POST,
            &format!(
                "/v1/{}/{template_id}/versions/{version}/commit",
                route.collection
            ),
            &[],
            Some(etag),
            None,
        )
        .await?;
        Ok(())
    }

    async fn delete_template_version(
        &self,
        route: TemplateRoute,
        template_id: &str,
        version: &str,
    ) -> ApiResult<()> {
        self.call(
            Method::DELETE,
            &format!("/v1/{}/{template_id}/versions/{version}", route.collection),
            &[],
            None,
            None,
        )
        .await?;
        Ok(())
    }

    async fn delete_template(&self, route: TemplateRoute, template_id: &str) -> ApiResult<()> {
        self.call(
            Method::DELETE,
            &format!("/v1/{}/{template_id}", route.collection),
            &[],
            None,
            None,
        )
        .await?;
        Ok(())
    }

    async fn create_assignment(
        &self,
        route: AssignmentRoute,
        request: &AssignmentRequest,
    ) -> ApiResult<Fetched<Assignment>> {
        let body = serde_json::to_value(request).map_err(|source| ApiError::Decode {
            url: route.collection.to_owned(),
            source,
        })?;
        let response = self
            .call(
                Method::POST,
                &format!("/v1/{}", route.collection),
                &api_version(route),
                None,
                Some(&body),
            )
            .await?;
        Self::first_assignment(response)
    }

    async fn get_assignment(
        &self,
        route: AssignmentRoute,
        id: &str,
    ) -> ApiResult<Fetched<Assignment>> {
        let response = self
            .call(
                Method::GET,
                &format!("/v1/{}/{id}", route.collection),
                &api_version(route),
                None,
                None,
            )
            .await?;
        let assignment = response.decode()?;
        Ok(response.fetched(assignment))
    }

    async fn list_assignments(
        &self,
        route: AssignmentRoute,
        account_id: &str,
        template_id: Option<&str>,
    ) -> ApiResult<Vec<Assignment>> {
        let mut query = api_version(route);
        query.push(("account_id", account_id));
        if let Some(template_id) = template_id {
            query.push(("template_id", template_id));
        }
        let response = self
            .call(
                Method::GET,
                &format!("/v1/{}", route.collection),
                &query,
                None,
                None,
            )
            .await?;
        let list: AssignmentList = response.decode()?;
        Ok(list.assignments)
    }

    async fn update_assignment(
        &self,
        route: AssignmentRoute,
        id: &str,
        etag: &str,
        template_version: &str,
    ) -> ApiResult<Fetched<Assignment>> {
        let body = serde_json::json!({ "template_version": template_version });
        let response = self
            .call(
                Method::PATCH,
                &format!("/v1/{}/{id}", route.collection),
                &api_version(route),
                Some(etag),
                Some(&body),
            )
            .await?;
        let assignment = response.decode()?;
        Ok(response.fetched(assignment))
    }

    async fn delete_assignment(&self, route: AssignmentRoute, id: &str) -> ApiResult<()> {
        self.call(
            Method::DELETE,
            &format!("/v1/{}/{id}", route.collection),
            &api_version(route),
            None,
            None,
        )
        .await?;
        Ok(())
    }

    async fn list_roles(
        &self,
        service_name: Option<&str>,
        account_id: &str,
    ) -> ApiResult<Vec<Role>> {
        let mut query = vec![("account_id", account_id)];
        if let Some(service_name) = service_name {
            query.push(("service_name", service_name));
        }
        let response = self
            .call(Method::GET, "/v2/roles", &query, None, None)
            .await?;
        let roles: RoleList = response.decode()?;
        Ok(roles.into_roles())
    }

    async fn create_policy(&self, request: &PolicyRequest) -> ApiResult<Fetched<Policy>> {
        let body = serde_json::to_value(request).map_err(|source| ApiError::Decode {
            url: "/v1/policies".to_owned(),
            source,
        })?;
        let response = self
            .call(Method::POST, "/v1/policies", &[], None, Some(&body))
            .await?;
        let policy = response.decode()?;
        Ok(response.fetched(policy))
    }

    async fn get_policy(&self, id: &str) -> ApiResult<Fetched<Policy>> {
        let response = self
            .call(Method::GET, &format!("/v1/policies/{id}"), &[], None, None)
            .await?;
        let policy = response.decode()?;
        Ok(response.fetched(policy))
    }

    async fn delete_policy(&self, id: &str) -> ApiResult<()> {
        let path = format!("/v1/policies/{id}");
        self.call(Method::DELETE, &path, &[], None, None).await?;
        Ok(())
    }
}
