//! Account connection through OAuth2 authorization code with PKCE.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{TimeDelta, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::social::{http_client, TokenResponse, XSettings};
use super::CredentialVault;
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::{NewAccount, OAuthState};

const OAUTH_SCOPE: &str = "tweet.read tweet.write users.read offline.access";
const STATE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Deserialize)]
struct MeResponse {
    data: Option<XUser>,
}

#[derive(Debug, Deserialize)]
struct XUser {
    id: String,
    username: String,
    name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedAccount {
    pub account_id: i64,
    pub username: String,
}

pub struct OAuthService {
    client: Client,
    store: Arc<dyn Store>,
    vault: CredentialVault,
    settings: XSettings,
}

impl OAuthService {
    pub fn new(store: Arc<dyn Store>, vault: CredentialVault, settings: XSettings) -> Self {
        Self {
            client: http_client(),
            store,
            vault,
            settings,
        }
    }

    /// Persist a single-use PKCE state and build the consent URL.
    pub async fn authorization_url(&self, user_id: &str) -> Result<AuthorizationRequest> {
        let (verifier, challenge) = pkce_pair();
        let state = uuid::Uuid::new_v4().to_string();

        self.store
            .insert_oauth_state(OAuthState {
                id: state.clone(),
                user_id: user_id.to_string(),
                code_verifier: verifier,
                expires_at: Utc::now() + TimeDelta::minutes(STATE_TTL_MINUTES),
            })
            .await?;

        let params = [
            ("response_type", "code"),
            ("client_id", self.settings.client_id.as_str()),
            ("redirect_uri", self.settings.callback_url.as_str()),
            ("scope", OAUTH_SCOPE),
            ("state", state.as_str()),
            ("code_challenge", challenge.as_str()),
            ("code_challenge_method", "S256"),
        ];
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        Ok(AuthorizationRequest {
            url: format!("{}?{}", self.settings.authorize_url, query),
            state,
        })
    }

    /// Complete the flow: validate state, exchange the code, look up the
    /// user and store the account with encrypted tokens.
    pub async fn handle_callback(&self, code: &str, state: &str) -> Result<ConnectedAccount> {
        let stored = self
            .store
            .oauth_state(state)
            .await?
            .ok_or_else(|| AppError::OAuth("invalid OAuth state".to_string()))?;

        if stored.expires_at < Utc::now() {
            self.store.delete_oauth_state(state).await?;
            return Err(AppError::OAuth("OAuth state expired".to_string()));
        }

        let tokens = self.exchange_code(code, &stored.code_verifier).await?;
        let refresh_token = tokens
            .refresh_token
            .as_deref()
            .ok_or_else(|| AppError::OAuth("missing refresh token in OAuth callback".to_string()))?;

        let user = self.fetch_user(&tokens.access_token).await?;

        let account_id = self
            .store
            .upsert_account(NewAccount {
                user_id: stored.user_id.clone(),
                platform_user_id: user.id,
                username: user.username.clone(),
                display_name: user.name,
                access_token_enc: self.vault.encrypt(&tokens.access_token)?,
                refresh_token_enc: self.vault.encrypt(refresh_token)?,
                token_expires_at: tokens.expires_at(),
            })
            .await?;

        self.store.delete_oauth_state(state).await?;

        tracing::info!(account_id, username = %user.username, "Connected X account");
        Ok(ConnectedAccount {
            account_id,
            username: user.username,
        })
    }

    /// Revoke the access token, then delete the account. A failed
    /// revocation is logged and does not keep the account.
    pub async fn disconnect(&self, account_id: i64) -> Result<()> {
        let account = self
            .store
            .account(account_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("account {account_id}")))?;

        match self.vault.decrypt(&account.access_token_enc) {
            Ok(access_token) => {
                if let Err(e) = self.revoke(&access_token).await {
                    tracing::warn!(account_id, error = %e, "Token revocation failed");
                }
            }
            Err(e) => tracing::warn!(account_id, error = %e, "Could not decrypt token for revocation"),
        }

        self.store.delete_account(account_id).await?;
        tracing::info!(account_id, "Disconnected X account");
        Ok(())
    }

    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<TokenResponse> {
        let response = self
            .client
            .post(self.settings.token_url())
            .basic_auth(&self.settings.client_id, Some(&self.settings.client_secret))
            .form(&[
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.settings.callback_url.as_str()),
                ("code_verifier", verifier),
                ("client_id", self.settings.client_id.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::OAuth(format!(
                "token exchange failed with status {}",
                response.status().as_u16()
            )));
        }
        Ok(response.json().await?)
    }

    async fn fetch_user(&self, access_token: &str) -> Result<XUser> {
        let response = self
            .client
            .get(format!(
                "{}/2/users/me?user.fields=profile_image_url,name,username",
                self.settings.api_base
            ))
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::OAuth(format!(
                "failed to fetch X user profile with status {}",
                response.status().as_u16()
            )));
        }

        let me: MeResponse = response.json().await?;
        me.data
            .ok_or_else(|| AppError::OAuth("X user response is missing data".to_string()))
    }

    async fn revoke(&self, access_token: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/2/oauth2/revoke", self.settings.api_base))
            .basic_auth(&self.settings.client_id, Some(&self.settings.client_secret))
            .form(&[
                ("token", access_token),
                ("token_type_hint", "access_token"),
                ("client_id", self.settings.client_id.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::OAuth(format!(
                "token revocation failed with status {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}

/// Random verifier (64 bytes, base64url) and its S256 challenge.
fn pkce_pair() -> (String, String) {
    let mut bytes = [0u8; 64];
    OsRng.fill_bytes(&mut bytes);
    let verifier = URL_SAFE_NO_PAD.encode(bytes);
    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
    (verifier, challenge)
}
