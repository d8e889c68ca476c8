//! Microsoft Graph adapter for the grant directory port.
//!
//! Talks to the unified role management API: role definitions and
//! assignments live under `roleManagement/directory`, principals under
//! `users`. Authentication is an OAuth2 client-credentials token cached
//! until shortly before expiry.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use grantshift_application::GrantDirectory;
use grantshift_core::{MigrationError, MigrationResult};
use grantshift_domain::{
    GrantAssignment, GrantDefinition, GrantDefinitionId, Principal, PrincipalId, PrincipalType,
};

const TOKEN_SCOPE: &str = "https://graph.microsoft.com/.default";
const TOKEN_EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// Connection settings for the Graph directory.
#[derive(Debug, Clone)]
pub struct GraphDirectoryConfig {
    /// Directory tenant identifier.
    pub tenant_id: String,
    /// Application (client) identifier of the app registration.
    pub client_id: String,
    /// Client secret of the app registration.
    pub client_secret: String,
    /// Graph API base URL including version segment.
    pub graph_base_url: String,
    /// Token authority base URL.
    pub login_base_url: String,
}

impl GraphDirectoryConfig {
    /// Creates a configuration against the public Graph endpoints.
    #[must_use]
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            graph_base_url: "https://graph.microsoft.com/v1.0".to_owned(),
            login_base_url: "https://login.microsoftonline.com".to_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct ODataPage {
    value: Vec<serde_json::Value>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserResource {
    id: String,
    display_name: Option<String>,
    user_principal_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoleAssignment<'a> {
    principal_id: &'a str,
    role_definition_id: &'a str,
    /// Tenant-wide scope.
    directory_scope_id: &'a str,
}

/// Grant directory backed by Microsoft Graph.
pub struct GraphDirectoryClient {
    http_client: reqwest::Client,
    config: GraphDirectoryConfig,
    token: Mutex<Option<CachedToken>>,
}

impl GraphDirectoryClient {
    /// Creates a client from connection settings.
    pub fn new(config: GraphDirectoryConfig) -> MigrationResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|error| {
                MigrationError::Internal(format!("failed to build HTTP client: {error}"))
            })?;

        Ok(Self {
            http_client,
            config,
            token: Mutex::new(None),
        })
    }

    /// Returns a valid bearer token, fetching a fresh one when the cached
    /// token is absent or close to expiry.
    async fn bearer_token(&self) -> MigrationResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.access_token.clone());
            }
        }

        let endpoint = format!(
            "{}/{}/oauth2/v2.0/token",
            self.config.login_base_url, self.config.tenant_id
        );
        let response = self
            .http_client
            .post(endpoint)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("scope", TOKEN_SCOPE),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let token: TokenResponse = parse_response(response).await?;
        let lifetime = Duration::from_secs(token.expires_in)
            .saturating_sub(TOKEN_EXPIRY_SKEW);
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + lifetime,
        });

        debug!("acquired directory access token");
        Ok(access_token)
    }

    /// Fetches every page of an OData collection, following
    /// `@odata.nextLink` until exhausted.
    async fn get_all_pages(&self, first_url: String) -> MigrationResult<Vec<serde_json::Value>> {
        let mut values = Vec::new();
        let mut next = Some(first_url);

        while let Some(url) = next {
            let token = self.bearer_token().await?;
            let response = self
                .http_client
                .get(&url)
                .bearer_auth(token)
                .send()
                .await
                .map_err(transport_error)?;
            let page: ODataPage = parse_response(response).await?;
            values.extend(page.value);
            next = page.next_link;
        }

        Ok(values)
    }

    /// Finds the assignment resource id binding a principal to a grant.
    async fn find_assignment_id(
        &self,
        grant_id: &GrantDefinitionId,
        principal_id: &PrincipalId,
    ) -> MigrationResult<Option<String>> {
        let url = format!(
            "{}/roleManagement/directory/roleAssignments?$filter=principalId eq '{}' and roleDefinitionId eq '{}'",
            self.config.graph_base_url, principal_id, grant_id
        );
        let values = self.get_all_pages(url).await?;

        Ok(values
            .first()
            .and_then(|value| value.get("id"))
            .and_then(|value| value.as_str())
            .map(str::to_owned))
    }
}

#[async_trait]
impl GrantDirectory for GraphDirectoryClient {
    async fn list_grant_definitions(&self) -> MigrationResult<Vec<GrantDefinition>> {
        let url = format!(
            "{}/roleManagement/directory/roleDefinitions?$select=id,displayName",
            self.config.graph_base_url
        );
        let values = self.get_all_pages(url).await?;

        Ok(values.iter().filter_map(definition_from_value).collect())
    }

    async fn list_grant_assignments(&self) -> MigrationResult<Vec<GrantAssignment>> {
        let url = format!(
            "{}/roleManagement/directory/roleAssignments?$expand=principal",
            self.config.graph_base_url
        );
        let values = self.get_all_pages(url).await?;

        Ok(values.iter().filter_map(assignment_from_value).collect())
    }

    async fn get_principal(
        &self,
        principal_id: &PrincipalId,
    ) -> MigrationResult<Option<Principal>> {
        let url = format!(
            "{}/users/{}?$select=id,displayName,userPrincipalName",
            self.config.graph_base_url, principal_id
        );
        let token = self.bearer_token().await?;
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let user: UserResource = parse_response(response).await?;
        Ok(Some(Principal {
            id: PrincipalId::new(user.id),
            display_name: user.display_name.unwrap_or_default(),
            user_principal_name: user.user_principal_name,
        }))
    }

    async fn apply_grant(
        &self,
        grant_id: &GrantDefinitionId,
        principal_id: &PrincipalId,
    ) -> MigrationResult<()> {
        let url = format!(
            "{}/roleManagement/directory/roleAssignments",
            self.config.graph_base_url
        );
        let token = self.bearer_token().await?;
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .json(&CreateRoleAssignment {
                principal_id: principal_id.as_str(),
                role_definition_id: grant_id.as_str(),
                directory_scope_id: "/",
            })
            .send()
            .await
            .map_err(transport_error)?;

        check_response(response).await
    }

    async fn revoke_grant(
        &self,
        grant_id: &GrantDefinitionId,
        principal_id: &PrincipalId,
    ) -> MigrationResult<()> {
        let Some(assignment_id) = self.find_assignment_id(grant_id, principal_id).await? else {
            // Repeat revoke: the binding is already gone.
            debug!(%principal_id, %grant_id, "assignment already absent on revoke");
            return Ok(());
        };

        let url = format!(
            "{}/roleManagement/directory/roleAssignments/{assignment_id}",
            self.config.graph_base_url
        );
        let token = self.bearer_token().await?;
        let response = self
            .http_client
            .delete(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }

        check_response(response).await
    }
}

fn definition_from_value(value: &serde_json::Value) -> Option<GrantDefinition> {
    let id = value.get("id")?.as_str()?;
    let display_name = value.get("displayName")?.as_str()?;

    Some(GrantDefinition {
        id: GrantDefinitionId::new(id),
        display_name: display_name.to_owned(),
    })
}

fn assignment_from_value(value: &serde_json::Value) -> Option<GrantAssignment> {
    let principal_id = value.get("principalId")?.as_str()?;
    let grant_definition_id = value.get("roleDefinitionId")?.as_str()?;
    let discriminator = value
        .get("principal")
        .and_then(|principal| principal.get("@odata.type"))
        .and_then(|discriminator| discriminator.as_str());
    let principal_type = match discriminator {
        Some(discriminator) => PrincipalType::from_directory_type(discriminator),
        None => PrincipalType::Other("unknown".to_owned()),
    };

    Some(GrantAssignment {
        principal_id: PrincipalId::new(principal_id),
        grant_definition_id: GrantDefinitionId::new(grant_definition_id),
        principal_type,
    })
}

fn transport_error(error: reqwest::Error) -> MigrationError {
    MigrationError::DirectoryUnavailable(format!("directory request failed: {error}"))
}

/// Maps a non-success status to the error taxonomy: auth, throttling and
/// server failures are unavailability; everything else is a rejection of
/// this one request.
fn classify_status(status: StatusCode, body: &str) -> MigrationError {
    let detail = format!("directory returned status {}: {body}", status.as_u16());
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        MigrationError::DirectoryUnavailable(detail)
    } else {
        MigrationError::DirectoryRejected(detail)
    }
}

async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> MigrationResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_owned());
        return Err(classify_status(status, body.as_str()));
    }

    response.json::<T>().await.map_err(|error| {
        MigrationError::Internal(format!("failed to parse directory response body: {error}"))
    })
}

async fn check_response(response: reqwest::Response) -> MigrationResult<()> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_owned());
        return Err(classify_status(status, body.as_str()));
    }

    Ok(())
}
