//! HTTP client for the NFTRainbow minting API

use std::path::Path;
use std::time::Duration;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::config::ApiConfig;
use crate::error::{ApiError, AuthError};
use super::{
    AddressBook, AuthClient, ContractClient, FileClient, ContractDeployRequest, ContractSnapshot, Credential,
    CustomMintRequest, EasyMintRequest, MetadataClient, MetadataRef, MintClient,
    MintTaskSnapshot, TaskHandle,
};

#[derive(Serialize)]
struct LoginRequest<'a> {
    app_id: &'a str,
    app_secret: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: String,
}

#[derive(Serialize)]
struct MetadataRequest<'a> {
    name: &'a str,
    description: &'a str,
    image: &'a str,
}

#[derive(Deserialize)]
struct MetadataResponse {
    metadata_uri: String,
}

#[derive(Serialize)]
struct BindAddressRequest<'a> {
    user_id: &'a str,
    user_address: &'a str,
}

#[derive(Deserialize)]
struct BoundAddressResponse {
    #[serde(default)]
    cfx_address: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    file_url: String,
}

/// Any task-creating response; only the id matters
#[derive(Deserialize)]
struct CreatedTask {
    id: u64,
}

/// Client for every collaborator interface over one HTTP connection pool
#[derive(Debug, Clone)]
pub struct RainbowClient {
    http: reqwest::Client,
    config: ApiConfig,
}

impl RainbowClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.host.trim_end_matches('/'), path)
    }

    async fn post_json<B, R>(&self, url: &str, credential: Option<&Credential>, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!(%url, "POST");
        let mut request = self.http.post(url).json(body);
        if let Some(credential) = credential {
            request = request.bearer_auth(credential.token());
        }
        decode(request.send().await?).await
    }

    async fn get_json<R: DeserializeOwned>(&self, url: &str, credential: Option<&Credential>) -> Result<R, ApiError> {
        debug!(%url, "GET");
        let mut request = self.http.get(url);
        if let Some(credential) = credential {
            request = request.bearer_auth(credential.token());
        }
        decode(request.send().await?).await
    }
}

/// Decode a service response, surfacing `{code, message}` bodies as errors
async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, ApiError> {
    let status = response.status();
    let body = response.text().await?;

    let parsed = if body.trim().is_empty() {
        Ok(serde_json::Value::Null)
    } else {
        serde_json::from_str(&body)
    };
    let value: serde_json::Value = match parsed {
        Ok(value) => value,
        Err(_) if !status.is_success() => {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            })
        }
        Err(err) => return Err(err.into()),
    };

    if let Some(code) = value.get("code").filter(|code| !code.is_null()) {
        let message = value
            .get("message")
            .and_then(|message| message.as_str())
            .unwrap_or_default()
            .to_string();
        return Err(ApiError::Remote {
            code: code.as_i64().unwrap_or(-1),
            message,
        });
    }

    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }

    Ok(serde_json::from_value(value)?)
}

impl AuthClient for RainbowClient {
    async fn login(&self) -> Result<Credential, AuthError> {
        let request = LoginRequest {
            app_id: &self.config.app_id,
            app_secret: &self.config.app_secret,
        };
        let response: LoginResponse = self
            .post_json(&self.config.login_url, None, &request)
            .await
            .map_err(|err| match err {
                ApiError::Transport { message } => AuthError::Transport { message },
                ApiError::Remote { message, .. } => AuthError::Rejected { message },
                other => AuthError::Rejected {
                    message: other.to_string(),
                },
            })?;

        if response.token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        Ok(Credential::new(response.token))
    }
}

impl MetadataClient for RainbowClient {
    async fn create_metadata(
        &self,
        credential: &Credential,
        asset_url: &str,
        name: &str,
        description: &str,
    ) -> Result<MetadataRef, ApiError> {
        let request = MetadataRequest {
            name,
            description,
            image: asset_url,
        };
        let response: MetadataResponse = self
            .post_json(&self.url("v1/metadata/"), Some(credential), &request)
            .await?;
        Ok(MetadataRef(response.metadata_uri))
    }
}

impl MintClient for RainbowClient {
    async fn submit_easy_mint(
        &self,
        credential: &Credential,
        request: &EasyMintRequest,
    ) -> Result<TaskHandle, ApiError> {
        let created: CreatedTask = self
            .post_json(&self.url("v1/mints/easy/urls"), Some(credential), request)
            .await?;
        Ok(TaskHandle::new(created.id))
    }

    async fn submit_custom_mint(
        &self,
        credential: &Credential,
        request: &CustomMintRequest,
    ) -> Result<TaskHandle, ApiError> {
        let created: CreatedTask = self
            .post_json(&self.url("v1/mints/"), Some(credential), request)
            .await?;
        Ok(TaskHandle::new(created.id))
    }

    async fn fetch_task_snapshot(
        &self,
        task: &TaskHandle,
        credential: &Credential,
    ) -> Result<MintTaskSnapshot, ApiError> {
        self.get_json(&self.url(&format!("v1/mints/{}", task.id())), Some(credential))
            .await
    }
}

impl ContractClient for RainbowClient {
    async fn submit_contract_deploy(
        &self,
        credential: &Credential,
        request: &ContractDeployRequest,
    ) -> Result<TaskHandle, ApiError> {
        let created: CreatedTask = self
            .post_json(&self.url("v1/contracts/"), Some(credential), request)
            .await?;
        Ok(TaskHandle::new(created.id))
    }

    async fn fetch_contract_snapshot(
        &self,
        task: &TaskHandle,
        credential: &Credential,
    ) -> Result<ContractSnapshot, ApiError> {
        self.get_json(&self.url(&format!("v1/contracts/{}", task.id())), Some(credential))
            .await
    }
}

impl AddressBook for RainbowClient {
    async fn bind_address(&self, user_id: &str, address: &str) -> Result<(), ApiError> {
        let request = BindAddressRequest {
            user_id,
            user_address: address,
        };
        let _: serde_json::Value = self.post_json(&self.url("user/address"), None, &request).await?;
        Ok(())
    }

    async fn bound_address(&self, user_id: &str) -> Result<Option<String>, ApiError> {
        let response: BoundAddressResponse = match self
            .get_json(&self.url(&format!("user/address/{}", user_id)), None)
            .await
        {
            Ok(response) => response,
            Err(ApiError::Status { status: 404, .. }) => return Ok(None),
            Err(err) => return Err(err),
        };
        Ok(Some(response.cfx_address).filter(|address| !address.is_empty()))
    }
}

impl FileClient for RainbowClient {
    async fn upload_file(&self, credential: &Credential, path: &Path) -> Result<String, ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| ApiError::File {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let url = self.url("v1/files/");
        debug!(%url, %file_name, size = bytes.len(), "POST multipart");
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));
        let response = self
            .http
            .post(&url)
            .bearer_auth(credential.token())
            .multipart(form)
            .send()
            .await?;

        let uploaded: UploadResponse = decode(response).await?;
        Ok(uploaded.file_url)
    }
}
