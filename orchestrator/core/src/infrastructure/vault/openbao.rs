// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenBao / Vault Adapter
//
// Speaks the OpenBao (and HashiCorp Vault) HTTP API:
// - Transit engine for encrypt/decrypt of pool secrets
// - KV v2 for persisting rotated secrets
// - sys/seal-status and sys/unseal for startup checks

use crate::domain::config::{resolve_secret, VaultConfig};
use crate::domain::vault::{SecretVault, VaultError};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct OpenBaoVault {
    client: reqwest::Client,
    address: String,
    token: String,
    transit_mount: String,
}

#[derive(Serialize)]
struct EncryptRequest<'a> {
    plaintext: &'a str,
}

#[derive(Serialize)]
struct DecryptRequest<'a> {
    ciphertext: &'a str,
}

#[derive(Serialize)]
struct UnsealRequest<'a> {
    key: &'a str,
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct EncryptResponse {
    ciphertext: String,
}

#[derive(Deserialize)]
struct DecryptResponse {
    plaintext: String,
}

#[derive(Deserialize)]
struct SealStatusResponse {
    sealed: bool,
}

impl OpenBaoVault {
    pub fn new(address: String, token: String, transit_mount: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            address,
            token,
            transit_mount,
        }
    }

    /// Builds the adapter from `spec.vault`, resolving `env:` token references.
    pub fn from_config(config: &VaultConfig) -> anyhow::Result<Self> {
        let token = resolve_secret(&config.token)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            address: config.address.clone(),
            token,
            transit_mount: config.transit_mount.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address.trim_end_matches('/'), path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, VaultError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(if status == 503 && message.contains("sealed") {
            VaultError::Sealed
        } else if status.is_server_error() {
            VaultError::Unavailable(format!("HTTP {}: {}", status, message))
        } else {
            VaultError::Rejected {
                status: status.as_u16(),
                message,
            }
        })
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, VaultError> {
        let response = self
            .client
            .post(self.url(path))
            .header("X-Vault-Token", &self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| VaultError::Unavailable(e.to_string()))?;
        Self::check(response).await
    }
}

#[async_trait]
impl SecretVault for OpenBaoVault {
    async fn encrypt(&self, namespace: &str, plaintext: &[u8]) -> Result<String, VaultError> {
        let encoded = STANDARD.encode(plaintext);
        let path = format!("{}/encrypt/{}", self.transit_mount, namespace);
        let response = self
            .post_json(&path, &EncryptRequest {
                plaintext: &encoded,
            })
            .await?;

        let body: DataEnvelope<EncryptResponse> = response
            .json()
            .await
            .map_err(|e| VaultError::InvalidResponse(e.to_string()))?;
        Ok(body.data.ciphertext)
    }

    async fn decrypt(&self, namespace: &str, ciphertext: &str) -> Result<Vec<u8>, VaultError> {
        let path = format!("{}/decrypt/{}", self.transit_mount, namespace);
        let response = self.post_json(&path, &DecryptRequest { ciphertext }).await?;

        let body: DataEnvelope<DecryptResponse> = response
            .json()
            .await
            .map_err(|e| VaultError::InvalidResponse(e.to_string()))?;
        STANDARD
            .decode(body.data.plaintext)
            .map_err(|e| VaultError::InvalidResponse(format!("plaintext is not base64: {}", e)))
    }

    /// `path` is "{mount}/{key path}"; KV v2 inserts `data/` after the mount.
    async fn put(&self, path: &str, payload: serde_json::Value) -> Result<(), VaultError> {
        let (mount, key_path) = path.split_once('/').ok_or_else(|| VaultError::Rejected {
            status: 400,
            message: format!("KV path '{}' has no mount", path),
        })?;
        let api_path = format!("{}/data/{}", mount, key_path);
        self.post_json(&api_path, &serde_json::json!({ "data": payload }))
            .await?;
        Ok(())
    }

    async fn seal_status(&self) -> Result<bool, VaultError> {
        let response = self
            .client
            .get(self.url("sys/seal-status"))
            .send()
            .await
            .map_err(|e| VaultError::Unavailable(e.to_string()))?;
        let response = Self::check(response).await?;

        let body: SealStatusResponse = response
            .json()
            .await
            .map_err(|e| VaultError::InvalidResponse(e.to_string()))?;
        Ok(body.sealed)
    }

    async fn unseal(&self, key: &str) -> Result<bool, VaultError> {
        let response = self
            .client
            .put(self.url("sys/unseal"))
            .json(&UnsealRequest { key })
            .send()
            .await
            .map_err(|e| VaultError::Unavailable(e.to_string()))?;
        let response = Self::check(response).await?;

        let body: SealStatusResponse = response
            .json()
            .await
            .map_err(|e| VaultError::InvalidResponse(e.to_string()))?;
        Ok(!body.sealed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault_for(server: &mockito::ServerGuard) -> OpenBaoVault {
        OpenBaoVault::new(server.url(), "root".to_string(), "transit".to_string())
    }

    #[tokio::test]
    async fn test_encrypt_sends_base64_plaintext() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/transit/encrypt/swarm-keys")
            .match_header("x-vault-token", "root")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "plaintext": STANDARD.encode("sk_abc"),
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"ciphertext":"vault:v1:XYZ"}}"#)
            .create_async()
            .await;

        let ciphertext = vault_for(&server)
            .encrypt("swarm-keys", b"sk_abc")
            .await
            .unwrap();
        assert_eq!(ciphertext, "vault:v1:XYZ");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_decrypt_decodes_plaintext() {
        let mut server = mockito::Server::new_async().await;
        let body = format!(r#"{{"data":{{"plaintext":"{}"}}}}"#, STANDARD.encode("sk_abc"));
        server
            .mock("POST", "/v1/transit/decrypt/swarm-keys")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let plaintext = vault_for(&server)
            .decrypt("swarm-keys", "vault:v1:XYZ")
            .await
            .unwrap();
        assert_eq!(plaintext, b"sk_abc");
    }

    #[tokio::test]
    async fn test_put_targets_kv_v2_data_path() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/secret/data/swarm-keys/key-0")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "data": {"key": "sk_new"}
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        vault_for(&server)
            .put(
                "secret/swarm-keys/key-0",
                serde_json::json!({"key": "sk_new", "last_rotated": "2026-01-01T00:00:00Z"}),
            )
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_sealed_response_maps_to_sealed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/transit/decrypt/swarm-keys")
            .with_status(503)
            .with_body(r#"{"errors":["Vault is sealed"]}"#)
            .create_async()
            .await;

        let result = vault_for(&server).decrypt("swarm-keys", "vault:v1:XYZ").await;
        assert!(matches!(result, Err(VaultError::Sealed)));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/transit/encrypt/swarm-keys")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let result = vault_for(&server).encrypt("swarm-keys", b"x").await;
        assert!(matches!(result, Err(VaultError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_forbidden_maps_to_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/transit/encrypt/swarm-keys")
            .with_status(403)
            .with_body(r#"{"errors":["permission denied"]}"#)
            .create_async()
            .await;

        let result = vault_for(&server).encrypt("swarm-keys", b"x").await;
        assert!(matches!(result, Err(VaultError::Rejected { status: 403, .. })));
    }

    #[tokio::test]
    async fn test_seal_status_and_unseal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/sys/seal-status")
            .with_status(200)
            .with_body(r#"{"sealed":true,"t":1,"n":1,"progress":0}"#)
            .create_async()
            .await;
        server
            .mock("PUT", "/v1/sys/unseal")
            .match_body(mockito::Matcher::Json(serde_json::json!({"key": "share-1"})))
            .with_status(200)
            .with_body(r#"{"sealed":false,"t":1,"n":1,"progress":0}"#)
            .create_async()
            .await;

        let vault = vault_for(&server);
        assert!(vault.seal_status().await.unwrap());
        assert!(vault.unseal("share-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_unreachable_vault() {
        let vault = OpenBaoVault::new(
            "http://127.0.0.1:1".to_string(),
            "root".to_string(),
            "transit".to_string(),
        );
        assert!(matches!(
            vault.seal_status().await,
            Err(VaultError::Unavailable(_))
        ));
    }
}
