//! Authenticated iCloud web session
//!
//! Sign-in is a two-step exchange: the Apple ID service validates the
//! password and returns a session token in response headers, then the iCloud
//! setup service exchanges that token for account information, including
//! whether a verification code is still required and where the photos
//! database lives.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::auth::trust_store::{TrustStore, TrustToken};
use crate::config::ICloudConfig;
use crate::error::{PhotosweepError, Result};
use crate::photos::ICloudPhotoLibrary;

/// OAuth widget key of the iCloud web client
const WIDGET_KEY: &str = "d39ba9916b7251055b22c7f910e2ea796ee65e98b2ddecea8f5dde8d9d1a815d";
const HOME_ENDPOINT: &str = "https://www.icloud.com";
const CLIENT_BUILD_NUMBER: &str = "2021Project52";
const CLIENT_MASTERING_NUMBER: &str = "2021B29";

const HEADER_ACCOUNT_COUNTRY: &str = "X-Apple-ID-Account-Country";
const HEADER_SESSION_ID: &str = "X-Apple-ID-Session-Id";
const HEADER_SESSION_TOKEN: &str = "X-Apple-Session-Token";
const HEADER_TRUST_TOKEN: &str = "X-Apple-TwoSV-Trust-Token";
const HEADER_SCNT: &str = "scnt";

/// Verification still required before the account can be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Challenge {
    /// Two-factor authentication: a code is pushed to trusted devices
    TwoFactor,
    /// Legacy two-step verification: a code is sent to a trusted device on request
    TwoStep,
}

impl Challenge {
    /// Short name used in prompts (`2FA` / `2SA`)
    pub fn label(&self) -> &'static str {
        match self {
            Self::TwoFactor => "2FA",
            Self::TwoStep => "2SA",
        }
    }

    /// Message shown before asking for the code
    pub fn notice(&self) -> &'static str {
        match self {
            Self::TwoFactor => {
                "Two-factor authentication required. A code has been sent to your devices."
            }
            Self::TwoStep => {
                "Two-step authentication required. A code has been sent to your trusted devices."
            }
        }
    }

    /// Prompt text for the code
    pub fn prompt(&self) -> String {
        format!("Enter the {} code: ", self.label())
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TwoFactor => write!(f, "two-factor authentication"),
            Self::TwoStep => write!(f, "two-step authentication"),
        }
    }
}

/// Session identifiers echoed back by the Apple ID service
#[derive(Debug, Default, Clone)]
struct SessionData {
    account_country: Option<String>,
    session_id: Option<String>,
    session_token: Option<String>,
    trust_token: Option<String>,
    scnt: Option<String>,
}

impl SessionData {
    fn capture(&mut self, headers: &HeaderMap) {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        if let Some(v) = read(HEADER_ACCOUNT_COUNTRY) {
            self.account_country = Some(v);
        }
        if let Some(v) = read(HEADER_SESSION_ID) {
            self.session_id = Some(v);
        }
        if let Some(v) = read(HEADER_SESSION_TOKEN) {
            self.session_token = Some(v);
        }
        if let Some(v) = read(HEADER_TRUST_TOKEN) {
            self.trust_token = Some(v);
        }
        if let Some(v) = read(HEADER_SCNT) {
            self.scnt = Some(v);
        }
    }
}

/// Response of the setup service's `accountLogin`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    #[serde(default)]
    ds_info: DsInfo,
    #[serde(default)]
    hsa_challenge_required: bool,
    #[serde(default)]
    hsa_trusted_browser: bool,
    #[serde(default)]
    webservices: HashMap<String, WebService>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DsInfo {
    #[serde(default)]
    dsid: Option<serde_json::Value>,
    #[serde(default)]
    hsa_version: u8,
}

#[derive(Debug, Clone, Deserialize)]
struct WebService {
    url: String,
}

#[derive(Debug, Deserialize)]
struct DeviceList {
    #[serde(default)]
    devices: Vec<serde_json::Value>,
}

/// An iCloud web session for one Apple ID
///
/// Created by [`ICloudSession::login`]. When [`ICloudSession::challenge`]
/// reports a pending verification, the caller obtains a code from the
/// operator and passes it to [`ICloudSession::resolve_challenge`]. Only then
/// does [`ICloudSession::photos`] hand out the photo library.
pub struct ICloudSession {
    client: Client,
    config: ICloudConfig,
    account_name: String,
    client_id: String,
    data: SessionData,
    account: AccountInfo,
    trusted_device: Option<serde_json::Value>,
    verified: bool,
    trust_store: Option<TrustStore>,
}

impl ICloudSession {
    /// Sign in with the credentials from `config`
    ///
    /// # Errors
    ///
    /// Returns `MissingCredentials` if the configuration lacks a username or
    /// password and `Authentication` if the service rejects them.
    pub async fn login(config: &ICloudConfig) -> Result<Self> {
        let (username, password) = config.credentials()?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ORIGIN, HeaderValue::from_static(HOME_ENDPOINT));
        default_headers.insert(REFERER, HeaderValue::from_static("https://www.icloud.com/"));

        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("photosweep/", env!("CARGO_PKG_VERSION")))
            .default_headers(default_headers)
            .build()
            .map_err(PhotosweepError::Http)?;

        let mut session = Self {
            client,
            config: config.clone(),
            account_name: username.to_string(),
            client_id: format!("auth-{}", uuid::Uuid::new_v4()),
            data: SessionData::default(),
            account: AccountInfo::default(),
            trusted_device: None,
            verified: false,
            trust_store: config.remember_session.then_some(TrustStore),
        };

        let mut replayed_token = false;
        if let Some(store) = &session.trust_store {
            match store.load(username) {
                Ok(Some(cached)) => {
                    tracing::debug!(saved_at = %cached.saved_at, "Using cached trust token");
                    session.data.trust_token = Some(cached.token);
                    replayed_token = true;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Failed to read cached trust token: {}", e),
            }
        }

        session.sign_in(password).await?;
        session.account_login().await?;

        // A replayed token that still leaves a challenge has expired
        if replayed_token && session.challenge().is_some() {
            session.forget_trust();
        }

        tracing::info!(
            account = %session.account_name,
            challenge = ?session.challenge(),
            "Signed in to iCloud"
        );
        Ok(session)
    }

    /// Apple ID this session belongs to
    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    /// Verification still required, if any
    pub fn challenge(&self) -> Option<Challenge> {
        if self.verified {
            return None;
        }
        let untrusted = self.account.hsa_challenge_required || !self.account.hsa_trusted_browser;
        match self.account.ds_info.hsa_version {
            2 if untrusted => Some(Challenge::TwoFactor),
            v if v >= 1 && untrusted => Some(Challenge::TwoStep),
            _ => None,
        }
    }

    /// Make sure a verification code has been sent to the operator
    ///
    /// Two-factor codes are pushed by the service at sign-in, so this only
    /// does work for two-step verification, where a code must be requested
    /// for a trusted device. Calling it more than once sends one code.
    ///
    /// # Errors
    ///
    /// Returns `Authentication` if no trusted device is available or the
    /// code cannot be sent.
    pub async fn prepare_challenge(&mut self) -> Result<()> {
        if self.challenge() != Some(Challenge::TwoStep) || self.trusted_device.is_some() {
            return Ok(());
        }

        let response = self
            .client
            .get(format!("{}/listDevices", self.setup_base()))
            .query(&self.setup_params())
            .send()
            .await
            .map_err(|e| {
                PhotosweepError::Authentication(format!("Failed to list trusted devices: {}", e))
            })?;
        if !response.status().is_success() {
            return Err(PhotosweepError::Authentication(format!(
                "Listing trusted devices returned {}",
                response.status()
            ))
            .into());
        }
        let devices: DeviceList = response.json().await.map_err(|e| {
            PhotosweepError::Authentication(format!("Failed to parse trusted devices: {}", e))
        })?;

        let device = devices.devices.into_iter().next().ok_or_else(|| {
            PhotosweepError::Authentication(
                "No trusted devices available for two-step authentication".to_string(),
            )
        })?;

        let response = self
            .client
            .post(format!("{}/sendVerificationCode", self.setup_base()))
            .query(&self.setup_params())
            .json(&device)
            .send()
            .await
            .map_err(|e| {
                PhotosweepError::Authentication(format!("Failed to send verification code: {}", e))
            })?;
        if !response.status().is_success() {
            return Err(PhotosweepError::Authentication(format!(
                "Sending verification code returned {}",
                response.status()
            ))
            .into());
        }

        tracing::debug!("Verification code sent to trusted device");
        self.trusted_device = Some(device);
        Ok(())
    }

    /// Submit the verification code entered by the operator
    ///
    /// On success the session is trusted and account information is
    /// refreshed. Does nothing when no challenge is pending.
    ///
    /// # Errors
    ///
    /// Returns `Authentication` if the code is empty or rejected.
    pub async fn resolve_challenge(&mut self, code: &str) -> Result<()> {
        let challenge = match self.challenge() {
            Some(challenge) => challenge,
            None => return Ok(()),
        };

        let code = code.trim();
        if code.is_empty() {
            return Err(
                PhotosweepError::Authentication("No verification code entered".to_string()).into(),
            );
        }

        let accepted = match challenge {
            Challenge::TwoFactor => {
                let response = self
                    .auth_request(
                        self.client
                            .post(format!("{}/verify/trusteddevice/securitycode", self.auth_base())),
                    )
                    .json(&json!({"securityCode": {"code": code}}))
                    .send()
                    .await
                    .map_err(|e| {
                        PhotosweepError::Authentication(format!("Code verification failed: {}", e))
                    })?;
                self.data.capture(response.headers());
                response.status().is_success()
            }
            Challenge::TwoStep => {
                let mut device = self.trusted_device.clone().ok_or_else(|| {
                    PhotosweepError::Authentication(
                        "No verification code was requested".to_string(),
                    )
                })?;
                if let Some(fields) = device.as_object_mut() {
                    fields.insert("verificationCode".to_string(), json!(code));
                    fields.insert("trustBrowser".to_string(), json!(true));
                }
                let response = self
                    .client
                    .post(format!("{}/validateVerificationCode", self.setup_base()))
                    .query(&self.setup_params())
                    .json(&device)
                    .send()
                    .await
                    .map_err(|e| {
                        PhotosweepError::Authentication(format!("Code verification failed: {}", e))
                    })?;
                response.status().is_success()
            }
        };

        if !accepted {
            return Err(PhotosweepError::Authentication(format!(
                "Failed to verify the {} code",
                challenge.label()
            ))
            .into());
        }

        self.trust_session().await?;
        self.account_login().await?;
        self.verified = true;
        self.remember_trust();

        tracing::info!(challenge = %challenge, "Verification code accepted");
        Ok(())
    }

    /// The account's photo library
    ///
    /// # Errors
    ///
    /// Returns `Authentication` while a challenge is pending and `Service`
    /// if the account has no photos web service.
    pub fn photos(&self) -> Result<ICloudPhotoLibrary> {
        if let Some(challenge) = self.challenge() {
            return Err(PhotosweepError::Authentication(format!(
                "{} has not been completed",
                challenge
            ))
            .into());
        }

        let service = self.account.webservices.get("ckdatabasews").ok_or_else(|| {
            PhotosweepError::Service("Photos service is not available for this account".to_string())
        })?;

        Ok(ICloudPhotoLibrary::new(
            self.client.clone(),
            &service.url,
            self.setup_params(),
            self.config.page_size,
        ))
    }

    fn auth_base(&self) -> &str {
        self.config.auth_endpoint.trim_end_matches('/')
    }

    fn setup_base(&self) -> &str {
        self.config.setup_endpoint.trim_end_matches('/')
    }

    fn setup_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("clientBuildNumber", CLIENT_BUILD_NUMBER.to_string()),
            ("clientMasteringNumber", CLIENT_MASTERING_NUMBER.to_string()),
            ("clientId", self.client_id.clone()),
        ];
        match &self.account.ds_info.dsid {
            Some(serde_json::Value::String(dsid)) => params.push(("dsid", dsid.clone())),
            Some(serde_json::Value::Number(dsid)) => params.push(("dsid", dsid.to_string())),
            _ => {}
        }
        params
    }

    /// Attach the headers the Apple ID service expects on every request
    fn auth_request(&self, builder: RequestBuilder) -> RequestBuilder {
        let mut builder = builder
            .header("Accept", "application/json")
            .header("X-Apple-OAuth-Client-Id", WIDGET_KEY)
            .header("X-Apple-OAuth-Client-Type", "firstPartyAuth")
            .header("X-Apple-OAuth-Redirect-URI", HOME_ENDPOINT)
            .header("X-Apple-OAuth-Require-Grant-Code", "true")
            .header("X-Apple-OAuth-Response-Mode", "web_message")
            .header("X-Apple-OAuth-Response-Type", "code")
            .header("X-Apple-OAuth-State", self.client_id.as_str())
            .header("X-Apple-Widget-Key", WIDGET_KEY);
        if let Some(session_id) = &self.data.session_id {
            builder = builder.header(HEADER_SESSION_ID, session_id.as_str());
        }
        if let Some(scnt) = &self.data.scnt {
            builder = builder.header(HEADER_SCNT, scnt.as_str());
        }
        builder
    }

    async fn sign_in(&mut self, password: &str) -> Result<()> {
        let trust_tokens: Vec<&str> = self.data.trust_token.iter().map(String::as_str).collect();
        let body = json!({
            "accountName": self.account_name,
            "password": password,
            "rememberMe": true,
            "trustTokens": trust_tokens,
        });

        let response = self
            .auth_request(self.client.post(format!("{}/signin", self.auth_base())))
            .query(&[("isRememberMeEnabled", "true")])
            .json(&body)
            .send()
            .await
            .map_err(|e| PhotosweepError::Authentication(format!("Sign-in request failed: {}", e)))?;
        self.data.capture(response.headers());

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => {
                tracing::debug!("Sign-in accepted; additional verification required");
                Ok(())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
                PhotosweepError::Authentication("Invalid email/password combination".to_string())
                    .into(),
            ),
            status => {
                let text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<failed to read error body>".to_string());
                Err(PhotosweepError::Authentication(format!(
                    "Sign-in returned {}: {}",
                    status, text
                ))
                .into())
            }
        }
    }

    async fn account_login(&mut self) -> Result<()> {
        let session_token = self.data.session_token.clone().ok_or_else(|| {
            PhotosweepError::Authentication("Sign-in did not return a session token".to_string())
        })?;
        let body = json!({
            "accountCountryCode": self.data.account_country.clone().unwrap_or_default(),
            "dsWebAuthToken": session_token,
            "extended_login": true,
            "trustToken": self.data.trust_token.clone().unwrap_or_default(),
        });

        let response = self
            .client
            .post(format!("{}/accountLogin", self.setup_base()))
            .query(&self.setup_params())
            .json(&body)
            .send()
            .await
            .map_err(|e| PhotosweepError::Authentication(format!("Account login failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            return Err(PhotosweepError::Authentication(format!(
                "Account login returned {}: {}",
                status, text
            ))
            .into());
        }

        self.account = response.json().await.map_err(|e| {
            PhotosweepError::Service(format!("Failed to parse account login response: {}", e))
        })?;
        Ok(())
    }

    /// Ask the Apple ID service to trust this session, refreshing the
    /// session and trust tokens
    async fn trust_session(&mut self) -> Result<()> {
        let response = self
            .auth_request(self.client.get(format!("{}/2sv/trust", self.auth_base())))
            .send()
            .await
            .map_err(|e| PhotosweepError::Authentication(format!("Session trust failed: {}", e)))?;
        self.data.capture(response.headers());

        if !response.status().is_success() {
            return Err(PhotosweepError::Authentication(format!(
                "Session trust returned {}",
                response.status()
            ))
            .into());
        }
        Ok(())
    }

    fn forget_trust(&self) {
        if let Some(store) = &self.trust_store {
            tracing::debug!("Cached trust token was not accepted; removing it");
            if let Err(e) = store.delete(&self.account_name) {
                tracing::warn!("Failed to remove cached trust token: {}", e);
            }
        }
    }

    fn remember_trust(&self) {
        if let (Some(store), Some(token)) = (&self.trust_store, &self.data.trust_token) {
            if let Err(e) = store.save(&self.account_name, &TrustToken::new(token.clone())) {
                tracing::warn!("Failed to cache trust token: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderName;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(HeaderName::from_static(*k), HeaderValue::from_static(*v));
        }
        map
    }

    #[test]
    fn test_capture_keeps_previous_values() {
        let mut data = SessionData::default();
        data.capture(&headers(&[
            ("x-apple-id-session-id", "sess-1"),
            ("scnt", "scnt-1"),
            ("x-apple-session-token", "token-1"),
        ]));
        data.capture(&headers(&[("x-apple-session-token", "token-2")]));

        assert_eq!(data.session_id.as_deref(), Some("sess-1"));
        assert_eq!(data.scnt.as_deref(), Some("scnt-1"));
        assert_eq!(data.session_token.as_deref(), Some("token-2"));
        assert!(data.trust_token.is_none());
    }

    #[test]
    fn test_account_info_deserialization() {
        let info: AccountInfo = serde_json::from_value(json!({
            "dsInfo": {"dsid": "12345", "hsaVersion": 2},
            "hsaChallengeRequired": true,
            "hsaTrustedBrowser": false,
            "webservices": {"ckdatabasews": {"url": "https://p01-ckdatabasews.icloud.com", "status": "active"}}
        }))
        .unwrap();
        assert_eq!(info.ds_info.hsa_version, 2);
        assert!(info.hsa_challenge_required);
        assert_eq!(
            info.webservices["ckdatabasews"].url,
            "https://p01-ckdatabasews.icloud.com"
        );
    }

    #[test]
    fn test_challenge_labels() {
        assert_eq!(Challenge::TwoFactor.label(), "2FA");
        assert_eq!(Challenge::TwoStep.label(), "2SA");
        assert_eq!(Challenge::TwoFactor.to_string(), "two-factor authentication");
    }
}
