//! HTTP implementation of the vault-provider client.
//!
//! This is the single adapter boundary where provider responses (HTTP
//! status codes and application error codes) are mapped onto the
//! [`ProviderError`] taxonomy. Classification happens here and nowhere else.

use std::time::Duration;

use bitcoin::Txid;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tbv_lamport::LamportPublicKey;
use tbv_primitives::DepositorPubkey;
use tracing::debug;

use crate::{
    errors::ProviderError,
    types::{PayoutSignature, PresignBundle},
    VaultProviderClient,
};

/// Per-request timeout for provider calls. Long waits are the polling
/// engine's job; individual requests should fail fast.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for a vault provider endpoint.
#[derive(Debug, Clone)]
pub struct HttpVaultProvider {
    base_url: String,
    client: reqwest::Client,
}

/// Application-level error envelope the provider returns on failures.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
struct DepositRef<'a> {
    pegin_txid: &'a Txid,
    depositor_pk: &'a str,
}

#[derive(Debug, Serialize)]
struct LamportKeyRequest<'a> {
    pegin_txid: &'a Txid,
    depositor_pk: &'a str,
    lamport_public_key: &'a LamportPublicKey,
}

#[derive(Debug, Serialize)]
struct SignaturesRequest<'a> {
    pegin_txid: &'a Txid,
    depositor_pk: &'a str,
    signatures: &'a [PayoutSignature],
}

/// Empty acknowledgment body for submission endpoints.
#[derive(Debug, Deserialize)]
struct Ack {}

impl HttpVaultProvider {
    /// Creates a client for the provider at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let url = format!("{}/{path}", self.base_url.trim_end_matches('/'));
        debug!(%url, "calling vault provider");

        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| ProviderError::Protocol(e.to_string()));
        }

        let error: ErrorBody = response.json().await.unwrap_or(ErrorBody {
            code: String::new(),
            message: format!("http status {status}"),
        });
        Err(classify_failure(status, error))
    }
}

/// Maps a failed provider response to the error taxonomy.
///
/// Application codes take precedence over the HTTP status: the provider
/// signals "not indexed yet" with a 404 and an explicit code, and signals
/// key mismatches with 403 plus a code, but older deployments omit the code
/// so the status alone must classify sensibly too.
fn classify_failure(status: reqwest::StatusCode, error: ErrorBody) -> ProviderError {
    match error.code.as_str() {
        "DEPOSIT_NOT_FOUND" | "NO_TRANSACTION_GRAPHS" | "STILL_PROCESSING" => {
            return ProviderError::NotReady(error.message)
        }
        "DEPOSITOR_KEY_MISMATCH" | "UNAUTHORIZED_DEPOSITOR" => {
            return ProviderError::Unauthorized(error.message)
        }
        _ => {}
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        ProviderError::NotReady(error.message)
    } else if status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN
    {
        ProviderError::Unauthorized(error.message)
    } else if status.is_server_error() {
        ProviderError::Unavailable(error.message)
    } else {
        ProviderError::Protocol(format!("http status {status}: {}", error.message))
    }
}

#[async_trait::async_trait]
impl VaultProviderClient for HttpVaultProvider {
    async fn request_depositor_presign_transactions(
        &self,
        pegin_txid: &Txid,
        depositor_pk: &DepositorPubkey,
    ) -> Result<PresignBundle, ProviderError> {
        self.post(
            "v1/depositor/presign-transactions",
            &DepositRef {
                pegin_txid,
                depositor_pk: &depositor_pk.0,
            },
        )
        .await
    }

    async fn submit_depositor_lamport_key(
        &self,
        pegin_txid: &Txid,
        depositor_pk: &DepositorPubkey,
        public_key: &LamportPublicKey,
    ) -> Result<(), ProviderError> {
        let _: Ack = self
            .post(
                "v1/depositor/lamport-key",
                &LamportKeyRequest {
                    pegin_txid,
                    depositor_pk: &depositor_pk.0,
                    lamport_public_key: public_key,
                },
            )
            .await?;
        Ok(())
    }

    async fn submit_signatures(
        &self,
        pegin_txid: &Txid,
        depositor_pk: &DepositorPubkey,
        signatures: &[PayoutSignature],
    ) -> Result<(), ProviderError> {
        let _: Ack = self
            .post(
                "v1/depositor/signatures",
                &SignaturesRequest {
                    pegin_txid,
                    depositor_pk: &depositor_pk.0,
                    signatures,
                },
            )
            .await?;
        Ok(())
    }
}
