use catalog_common::credentials::Credentials;

/// Environment-variable names the secret store is queried for, keyed by
/// provider key.
const STORE_KEYS: [(&str, &str); 4] = [
    ("google", "GOOGLE_API_KEY"),
    ("openrouter", "OPENROUTER_API_KEY"),
    ("groq", "GROQ_API_KEY"),
    ("huggingface", "HUGGINGFACE_API_KEY"),
];

/// Fill in API keys missing from the environment from the secret store
/// (`GET {store}/rest/v1/secrets?select=value&name=eq.{NAME}`). Store
/// failures degrade to whatever the environment provided.
pub async fn resolve_api_keys(credentials: &mut Credentials) {
    let (Some(store_url), Some(store_key)) = (
        credentials.secret_store_url.clone(),
        credentials.secret_store_key.clone(),
    ) else {
        tracing::debug!("Secret store not configured, using environment keys only");
        return;
    };

    let http = match reqwest::Client::builder().build() {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "Could not build secret-store HTTP client");
            return;
        }
    };

    for (provider_key, env_name) in STORE_KEYS {
        if credentials.api_key_for(provider_key).is_some() {
            continue;
        }

        match fetch_secret(&http, &store_url, &store_key, env_name).await {
            Ok(Some(value)) => {
                tracing::info!(key = env_name, "API key retrieved from secret store");
                credentials.set_api_key(provider_key, value);
            }
            Ok(None) => {
                tracing::debug!(key = env_name, "Secret store has no entry");
            }
            Err(e) => {
                tracing::warn!(key = env_name, error = %e, "Secret store lookup failed");
            }
        }
    }
}

#[derive(serde::Deserialize)]
struct SecretRow {
    value: String,
}

async fn fetch_secret(
    http: &reqwest::Client,
    store_url: &str,
    store_key: &str,
    name: &str,
) -> Result<Option<String>, String> {
    let url = format!(
        "{}/rest/v1/secrets?select=value&name=eq.{name}",
        store_url.trim_end_matches('/')
    );

    let response = http
        .get(&url)
        .header("apikey", store_key)
        .bearer_auth(store_key)
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status().as_u16()));
    }

    let rows: Vec<SecretRow> = response.json().await.map_err(|e| e.to_string())?;
    Ok(rows
        .into_iter()
        .next()
        .map(|row| row.value)
        .filter(|value| !value.is_empty()))
}
