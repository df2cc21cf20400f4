use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{ClientInfo, GatewayError, GatewayFile};

const SECRET_ENV_PREFIX: &str = "GROCER_SECRET_";

/// Looks up a named secret; `Ok(None)` means the store has no such secret.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<Option<String>, GatewayError>;
}

/// Reads secrets from `GROCER_SECRET_<NAME>`, where the name is upper-cased
/// and every non-alphanumeric character becomes `_`.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvSecretResolver;

pub fn secret_env_var(name: &str) -> String {
    let mut var = String::from(SECRET_ENV_PREFIX);
    var.extend(name.chars().map(|ch| if ch.is_ascii_alphanumeric() { ch.to_ascii_uppercase() } else { '_' }));
    var
}

#[async_trait]
impl SecretResolver for EnvSecretResolver {
    async fn resolve(&self, name: &str) -> Result<Option<String>, GatewayError> {
        Ok(std::env::var(secret_env_var(name)).ok().filter(|value| !value.trim().is_empty()))
    }
}

/// Secret store first, then the `client_info` block of the config file.
pub async fn resolve_client_info(
    resolver: &dyn SecretResolver,
    file: &GatewayFile,
) -> Result<ClientInfo, GatewayError> {
    let secret_name = file.secret_name();
    match resolver.resolve(&secret_name).await {
        Ok(Some(raw)) => match serde_json::from_str::<ClientInfo>(&raw) {
            Ok(info) => {
                info!(event_name = "gateway.credentials.resolved", source = "secret", "resolved gateway client credentials");
                return Ok(info);
            }
            Err(error) => warn!(
                event_name = "gateway.credentials.invalid_secret",
                secret = %secret_name,
                error = %error,
                "secret is not a valid client_info document, using config file"
            ),
        },
        Ok(None) => debug!(secret = %secret_name, "no stored secret, using config file"),
        Err(error) => warn!(
            event_name = "gateway.credentials.lookup_failed",
            secret = %secret_name,
            error = %error,
            "could not read secret, using config file"
        ),
    }

    file.client_info.clone().ok_or_else(|| {
        GatewayError::MissingCredentials(format!(
            "no secret `{secret_name}` and no `client_info` in the gateway config"
        ))
    })
}

#[derive(Clone, Debug)]
pub struct AccessToken {
    pub value: SecretString,
    pub token_type: String,
    pub expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// OAuth client-credentials grant against the identity provider's token endpoint.
pub async fn exchange_client_credentials(
    http: &reqwest::Client,
    info: &ClientInfo,
    region: &str,
) -> Result<AccessToken, GatewayError> {
    let url = info.token_url(region)?;
    let mut form = vec![("grant_type", "client_credentials")];
    if let Some(scope) = info.scope.as_deref() {
        form.push(("scope", scope));
    }

    let response = http
        .post(&url)
        .basic_auth(&info.client_id, Some(info.client_secret.expose_secret()))
        .form(&form)
        .send()
        .await
        .map_err(|error| GatewayError::TokenExchange(format!("request to {url} failed: {error}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::TokenExchange(format!("{url} returned {status}: {body}")));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|error| GatewayError::TokenExchange(format!("invalid token response: {error}")))?;

    Ok(AccessToken {
        value: token.access_token.into(),
        token_type: token.token_type.unwrap_or_else(|| "Bearer".to_string()),
        expires_in: token.expires_in,
    })
}
