//! Identity Toolkit auth client.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use folio_core::{StoreError, StoreResult};

use super::read_json;
use crate::provider::{AuthClient, AuthSession};

const LIVE_BASE: &str = "https://identitytoolkit.googleapis.com";

pub struct RestAuthClient {
    http: reqwest::Client,
    api_key: String,
    emulator: Mutex<Option<String>>,
    used: AtomicBool,
}

impl RestAuthClient {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self {
            http,
            api_key,
            emulator: Mutex::new(None),
            used: AtomicBool::new(false),
        }
    }

    fn base(&self) -> String {
        match self.emulator_url() {
            Some(url) => format!("{}/identitytoolkit.googleapis.com", url.trim_end_matches('/')),
            None => LIVE_BASE.to_string(),
        }
    }
}

#[async_trait]
impl AuthClient for RestAuthClient {
    fn connect_emulator(&self, url: &str) -> StoreResult<()> {
        if self.used.load(Ordering::SeqCst) {
            return Err(StoreError::Configuration(
                "auth has already issued requests; connect the emulator before first use"
                    .to_string(),
            ));
        }
        let mut emulator = self
            .emulator
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(existing) = emulator.as_ref() {
            return Err(StoreError::Configuration(format!(
                "auth already connected to emulator at {}",
                existing
            )));
        }
        *emulator = Some(url.to_string());
        Ok(())
    }

    fn emulator_url(&self) -> Option<String> {
        self.emulator
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn sign_in_anonymously(&self) -> StoreResult<AuthSession> {
        self.used.store(true, Ordering::SeqCst);
        let url = format!("{}/v1/accounts:signUp", self.base());
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "returnSecureToken": true }))
            .send()
            .await;
        let body = read_json(response, "anonymous sign-up").await?;

        let field = |name: &str| {
            body.get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| StoreError::Backend(format!("sign-up response missing {}", name)))
        };
        let session = AuthSession {
            uid: field("localId")?,
            id_token: field("idToken")?,
        };
        tracing::debug!(uid = %session.uid, "signed in anonymously");
        Ok(session)
    }
}
