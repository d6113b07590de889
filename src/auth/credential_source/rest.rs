use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::auth::credential_source::{CredentialExchange, CredentialSource};
use crate::auth::error::{AuthKitError, AuthKitResult, ExchangeError, ExchangeErrorCode};
use crate::auth::logger::LOGGER;
use crate::auth::model::{IdentityProvider, SessionIdentity};
use crate::auth::oauth::{AuthCredential, OAuthCredential};

const DEFAULT_IDENTITY_TOOLKIT_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_OAUTH_REQUEST_URI: &str = "http://localhost";

#[derive(Clone)]
struct StoredSession {
    identity: SessionIdentity,
    id_token: String,
    refresh_token: Option<String>,
}

/// [`CredentialSource`] backed by the Identity Toolkit REST API.
///
/// The current session (identity plus its ID and refresh tokens) is kept in
/// memory only and is lost when the value is dropped.
pub struct RestCredentialSource {
    api_key: String,
    identity_toolkit_endpoint: String,
    oauth_request_uri: String,
    client: Client,
    session: Mutex<Option<StoredSession>>,
}

impl std::fmt::Debug for RestCredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestCredentialSource")
            .field("identity_toolkit_endpoint", &self.identity_toolkit_endpoint)
            .field("oauth_request_uri", &self.oauth_request_uri)
            .finish()
    }
}

pub struct RestCredentialSourceBuilder {
    api_key: String,
    identity_toolkit_endpoint: Option<String>,
    oauth_request_uri: Option<String>,
    client: Option<Client>,
}

impl RestCredentialSourceBuilder {
    fn new(api_key: String) -> Self {
        Self {
            api_key,
            identity_toolkit_endpoint: None,
            oauth_request_uri: None,
            client: None,
        }
    }

    pub fn with_identity_toolkit_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.identity_toolkit_endpoint = Some(endpoint.into());
        self
    }

    /// `requestUri` sent with `signInWithIdp`; defaults to `http://localhost`.
    pub fn with_oauth_request_uri(mut self, request_uri: impl Into<String>) -> Self {
        self.oauth_request_uri = Some(request_uri.into());
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> AuthKitResult<RestCredentialSource> {
        let api_key = self.api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(AuthKitError::Configuration("Missing API key".into()));
        }
        let identity_toolkit_endpoint = self
            .identity_toolkit_endpoint
            .unwrap_or_else(|| DEFAULT_IDENTITY_TOOLKIT_ENDPOINT.to_string());
        Url::parse(&identity_toolkit_endpoint).map_err(|err| {
            AuthKitError::Configuration(format!(
                "Invalid identity toolkit endpoint {identity_toolkit_endpoint}: {err}"
            ))
        })?;

        Ok(RestCredentialSource {
            api_key,
            identity_toolkit_endpoint,
            oauth_request_uri: self
                .oauth_request_uri
                .unwrap_or_else(|| DEFAULT_OAUTH_REQUEST_URI.to_string()),
            client: self.client.unwrap_or_default(),
            session: Mutex::new(None),
        })
    }
}

impl RestCredentialSource {
    pub fn builder(api_key: impl Into<String>) -> RestCredentialSourceBuilder {
        RestCredentialSourceBuilder::new(api_key.into())
    }

    fn endpoint_url(&self, path: &str) -> Result<Url, ExchangeError> {
        let endpoint = format!(
            "{}/{}?key={}",
            self.identity_toolkit_endpoint.trim_end_matches('/'),
            path,
            self.api_key
        );
        Url::parse(&endpoint)
            .map_err(|err| ExchangeError::new(ExchangeErrorCode::Backend, err.to_string()))
    }

    async fn execute_request<TRequest, TResponse>(
        &self,
        path: &str,
        request: &TRequest,
    ) -> Result<TResponse, ExchangeError>
    where
        TRequest: Serialize,
        TResponse: DeserializeOwned,
    {
        let url = self.endpoint_url(path)?;
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|err| ExchangeError::network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(parse_error_body(status.as_u16(), &body));
        }

        response.json().await.map_err(|err| {
            ExchangeError::new(
                ExchangeErrorCode::Backend,
                format!("Malformed {path} response: {err}"),
            )
        })
    }

    fn current_session(&self) -> Option<StoredSession> {
        self.session.lock().unwrap().clone()
    }

    fn store_session(&self, session: StoredSession) -> SessionIdentity {
        let identity = session.identity.clone();
        *self.session.lock().unwrap() = Some(session);
        identity
    }

    async fn sign_in_with_idp(
        &self,
        credential: &OAuthCredential,
        id_token: Option<String>,
    ) -> Result<SignInWithIdpResponse, ExchangeError> {
        let request = SignInWithIdpRequest {
            post_body: credential.build_post_body()?,
            request_uri: self.oauth_request_uri.clone(),
            return_idp_credential: true,
            return_secure_token: true,
            id_token,
        };
        let response: SignInWithIdpResponse = self
            .execute_request("accounts:signInWithIdp", &request)
            .await?;

        if response.need_confirmation.unwrap_or(false) {
            return Err(ExchangeError::new(
                ExchangeErrorCode::AccountExistsWithDifferentCredential,
                "NEED_CONFIRMATION",
            ));
        }
        if let Some(message) = response.error_message.as_deref() {
            return Err(ExchangeError::from_backend_message(message));
        }
        Ok(response)
    }

    fn idp_session(
        &self,
        response: SignInWithIdpResponse,
        provider_id: &str,
        previous: Option<&StoredSession>,
    ) -> Result<StoredSession, ExchangeError> {
        let uid = response
            .local_id
            .or_else(|| previous.map(|session| session.identity.uid.clone()))
            .ok_or_else(|| missing_field("localId"))?;
        let id_token = response
            .id_token
            .or_else(|| previous.map(|session| session.id_token.clone()))
            .ok_or_else(|| missing_field("idToken"))?;
        Ok(StoredSession {
            identity: SessionIdentity {
                uid,
                email: response.email,
                display_name: response.display_name,
                photo_url: response.photo_url,
                provider_user_id: None,
                provider_id: Some(
                    response
                        .provider_id
                        .unwrap_or_else(|| provider_id.to_string()),
                ),
                is_anonymous: false,
            },
            id_token,
            refresh_token: response
                .refresh_token
                .or_else(|| previous.and_then(|session| session.refresh_token.clone())),
        })
    }
}

#[async_trait]
impl CredentialSource for RestCredentialSource {
    async fn exchange_and_link(
        &self,
        credential: &AuthCredential,
    ) -> Result<CredentialExchange, ExchangeError> {
        let current = self
            .current_session()
            .ok_or_else(ExchangeError::no_current_session)?;

        match credential {
            AuthCredential::OAuth(oauth) => {
                let response = self
                    .sign_in_with_idp(oauth, Some(current.id_token.clone()))
                    .await?;
                let is_new_account = response.is_new_user.unwrap_or(false);
                let session = self.idp_session(response, oauth.provider_id(), Some(&current))?;
                let identity = self.store_session(session);
                LOGGER.debug(format!(
                    "Linked {} to session {}",
                    oauth.provider_id(),
                    identity.uid
                ));
                Ok(CredentialExchange {
                    identity,
                    is_new_account,
                })
            }
            AuthCredential::EmailPassword { email, password } => {
                let request = SignUpRequest {
                    email: Some(email.clone()),
                    password: Some(password.clone()),
                    id_token: Some(current.id_token.clone()),
                    return_secure_token: true,
                };
                let response: SignUpResponse =
                    self.execute_request("accounts:signUp", &request).await?;
                let session = StoredSession {
                    identity: SessionIdentity {
                        uid: response.local_id.unwrap_or(current.identity.uid.clone()),
                        email: response.email.or_else(|| Some(email.clone())),
                        provider_id: Some(IdentityProvider::Email.provider_id().to_string()),
                        is_anonymous: false,
                        ..current.identity.clone()
                    },
                    id_token: response.id_token.unwrap_or(current.id_token),
                    refresh_token: response.refresh_token.or(current.refresh_token),
                };
                let identity = self.store_session(session);
                LOGGER.debug(format!("Linked password credential to session {}", identity.uid));
                Ok(CredentialExchange {
                    identity,
                    is_new_account: true,
                })
            }
        }
    }

    async fn exchange_and_sign_in(
        &self,
        credential: &AuthCredential,
    ) -> Result<SessionIdentity, ExchangeError> {
        let session = match credential {
            AuthCredential::OAuth(oauth) => {
                let response = self.sign_in_with_idp(oauth, None).await?;
                self.idp_session(response, oauth.provider_id(), None)?
            }
            AuthCredential::EmailPassword { email, password } => {
                let request = SignInWithPasswordRequest {
                    email: email.clone(),
                    password: password.clone(),
                    return_secure_token: true,
                };
                let response: SignInWithPasswordResponse = self
                    .execute_request("accounts:signInWithPassword", &request)
                    .await?;
                StoredSession {
                    identity: SessionIdentity {
                        uid: response.local_id,
                        email: response.email.or_else(|| Some(email.clone())),
                        display_name: response.display_name,
                        provider_id: Some(IdentityProvider::Email.provider_id().to_string()),
                        ..Default::default()
                    },
                    id_token: response.id_token,
                    refresh_token: response.refresh_token,
                }
            }
        };
        let identity = self.store_session(session);
        LOGGER.debug(format!(
            "Signed in to {} with {}",
            identity.uid,
            credential.provider_id()
        ));
        Ok(identity)
    }

    async fn create_anonymous_session(&self) -> Result<SessionIdentity, ExchangeError> {
        let request = SignUpRequest {
            return_secure_token: true,
            ..Default::default()
        };
        let response: SignUpResponse = self.execute_request("accounts:signUp", &request).await?;
        let session = StoredSession {
            identity: SessionIdentity::anonymous(
                response.local_id.ok_or_else(|| missing_field("localId"))?,
            ),
            id_token: response.id_token.ok_or_else(|| missing_field("idToken"))?,
            refresh_token: response.refresh_token,
        };
        Ok(self.store_session(session))
    }

    async fn end_session(&self) -> Result<(), ExchangeError> {
        self.session.lock().unwrap().take();
        Ok(())
    }

    fn current_identity(&self) -> Option<SessionIdentity> {
        self.current_session().map(|session| session.identity)
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), ExchangeError> {
        let request = SendOobCodeRequest {
            request_type: "PASSWORD_RESET",
            email: email.to_string(),
        };
        let _: serde_json::Value = self
            .execute_request("accounts:sendOobCode", &request)
            .await?;
        Ok(())
    }
}

fn missing_field(field: &str) -> ExchangeError {
    ExchangeError::new(
        ExchangeErrorCode::Backend,
        format!("Response is missing {field}"),
    )
}

fn parse_error_body(status: u16, body: &str) -> ExchangeError {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|parsed| parsed.error.message)
        .map(ExchangeError::from_backend_message)
        .unwrap_or_else(|| {
            ExchangeError::new(
                ExchangeErrorCode::Backend,
                format!("Request failed with status {status}: {body}"),
            )
        })
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignUpRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id_token: Option<String>,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    local_id: Option<String>,
    email: Option<String>,
    id_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithIdpRequest {
    post_body: String,
    request_uri: String,
    return_idp_credential: bool,
    return_secure_token: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithIdpResponse {
    id_token: Option<String>,
    refresh_token: Option<String>,
    local_id: Option<String>,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
    provider_id: Option<String>,
    is_new_user: Option<bool>,
    need_confirmation: Option<bool>,
    error_message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithPasswordRequest {
    email: String,
    password: String,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithPasswordResponse {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    id_token: String,
    refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendOobCodeRequest {
    request_type: &'static str,
    email: String,
}
