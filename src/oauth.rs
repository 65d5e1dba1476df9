use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Duration, Utc};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// The credential handle handed to the mailbox client.
#[derive(Clone, Debug)]
pub struct TokenBundle {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_token: Option<String>,
}

/// Google "installed app" client secrets, as downloaded from the console.
#[derive(Debug, Clone, Deserialize)]
pub struct InstalledCreds {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<InstalledCreds>,
    web: Option<InstalledCreds>,
}

/// Returns a usable token, prompting on the terminal only when no token file
/// exists. `Ok(None)` means the client secrets file is missing and the run
/// should stop without failing.
pub async fn authorize(
    credentials_path: &Path,
    token_path: &Path,
) -> AppResult<Option<TokenBundle>> {
    let creds = match load_credentials(credentials_path)? {
        Some(creds) => creds,
        None => return Ok(None),
    };
    let client = build_client(&creds)?;
    let store = TokenStore::new(token_path);

    if let Some(stored) = store.load() {
        if !stored.is_expired(Utc::now()) {
            return Ok(Some(stored.into_bundle()));
        }
        if let Some(refresh) = stored.refresh_token.clone() {
            if let Some(bundle) = try_refresh(&client, refresh).await? {
                store.save(&StoredToken::from_bundle(&bundle))?;
                return Ok(Some(bundle));
            }
            warn!(path = %token_path.display(), "Stored refresh token failed; re-authenticating");
        } else {
            // No way to renew it; let the API decide whether it still works.
            return Ok(Some(stored.into_bundle()));
        }
    }

    let bundle = interactive_flow(&client).await?;
    store.save(&StoredToken::from_bundle(&bundle))?;
    info!(path = %token_path.display(), "Token stored");
    Ok(Some(bundle))
}

pub fn load_credentials(path: &Path) -> AppResult<Option<InstalledCreds>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            error!(path = %path.display(), "Error loading client secret file");
            return Ok(None);
        }
        Err(e) => {
            return Err(AppError::Config(format!(
                "reading {}: {e}",
                path.display()
            )))
        }
    };
    parse_credentials(&raw).map(Some)
}

fn parse_credentials(raw: &str) -> AppResult<InstalledCreds> {
    let file: CredentialsFile = serde_json::from_str(raw)
        .map_err(|e| AppError::Config(format!("parsing client secrets: {e}")))?;
    file.installed
        .or(file.web)
        .ok_or_else(|| AppError::Config("client secrets have no installed/web section".into()))
}

fn build_client(creds: &InstalledCreds) -> AppResult<BasicClient> {
    let auth_url = AuthUrl::new(creds.auth_uri.clone().unwrap_or_else(|| AUTH_URL.into()))
        .map_err(|e| AppError::Config(format!("invalid auth uri: {e}")))?;
    let token_url = TokenUrl::new(creds.token_uri.clone().unwrap_or_else(|| TOKEN_URL.into()))
        .map_err(|e| AppError::Config(format!("invalid token uri: {e}")))?;
    let redirect = creds
        .redirect_uris
        .first()
        .cloned()
        .unwrap_or_else(|| "http://localhost".to_string());

    let client = BasicClient::new(
        ClientId::new(creds.client_id.clone()),
        Some(ClientSecret::new(creds.client_secret.clone())),
        auth_url,
        Some(token_url),
    )
    .set_redirect_uri(
        RedirectUrl::new(redirect.clone())
            .map_err(|e| AppError::Config(format!("invalid redirect uri {redirect}: {e}")))?,
    )
    .set_auth_type(oauth2::AuthType::RequestBody);

    Ok(client)
}

fn build_auth_url(client: &BasicClient) -> (String, PkceCodeVerifier) {
    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let (url, _csrf) = client
        .authorize_url(CsrfToken::new_random)
        .add_extra_param("access_type", "offline")
        .add_scope(Scope::new(GMAIL_READONLY_SCOPE.to_string()))
        .set_pkce_challenge(challenge)
        .url();
    (url.to_string(), verifier)
}

async fn interactive_flow(client: &BasicClient) -> AppResult<TokenBundle> {
    let (auth_url, verifier) = build_auth_url(client);
    println!("Authorize this app by visiting this url: {auth_url}");
    let code = prompt_for_code().await?;

    let token_res = client
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(verifier)
        .request_async(async_http_client)
        .await
        .map_err(|e| AppError::Auth(format!("Error retrieving access token: {e}")))?;

    Ok(bundle_from_response(&token_res, None))
}

async fn prompt_for_code() -> AppResult<String> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(b"Enter the code from that page here: ")
        .await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;
    let code = line.trim().to_string();
    if code.is_empty() {
        return Err(AppError::Auth("no authorization code entered".into()));
    }
    Ok(code)
}

async fn try_refresh(
    client: &BasicClient,
    refresh_token: String,
) -> AppResult<Option<TokenBundle>> {
    let refresh = RefreshToken::new(refresh_token.clone());
    let res = client
        .exchange_refresh_token(&refresh)
        .request_async(async_http_client)
        .await;
    match res {
        Ok(token_res) => Ok(Some(bundle_from_response(&token_res, Some(refresh_token)))),
        Err(err) => {
            warn!("Refresh token invalid or expired: {err}");
            Ok(None)
        }
    }
}

fn bundle_from_response(
    res: &BasicTokenResponse,
    previous_refresh: Option<String>,
) -> TokenBundle {
    TokenBundle {
        access_token: res.access_token().secret().to_string(),
        expires_at: res
            .expires_in()
            .map(|d| Utc::now() + Duration::from_std(d).unwrap_or_else(|_| Duration::seconds(0))),
        refresh_token: res
            .refresh_token()
            .map(|r| r.secret().to_string())
            .or(previous_refresh),
    }
}

/// Serialized form of the token file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    fn from_bundle(bundle: &TokenBundle) -> Self {
        Self {
            access_token: bundle.access_token.clone(),
            refresh_token: bundle.refresh_token.clone(),
            expires_at: bundle.expires_at,
        }
    }

    fn into_bundle(self) -> TokenBundle {
        TokenBundle {
            access_token: self.access_token,
            expires_at: self.expires_at,
            refresh_token: self.refresh_token,
        }
    }

    /// Tokens without a recorded expiry are treated as valid.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

#[derive(Clone, Debug)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// A missing or unreadable token file both mean "authorize again".
    pub fn load(&self) -> Option<StoredToken> {
        let raw = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable token file");
                None
            }
        }
    }

    pub fn save(&self, token: &StoredToken) -> AppResult<()> {
        let serialized =
            serde_json::to_string(token).map_err(|e| AppError::Unexpected(format!("{e}")))?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = file.set_permissions(fs::Permissions::from_mode(0o600));
        }

        file.write_all(serialized.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}
