use std::{
    io::{BufRead, BufReader, Write},
    net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream},
    sync::{mpsc, Arc},
    thread,
    time::{Duration, Instant},
};

use oauth2::{
    basic::BasicClient, reqwest::http_client, AuthUrl, AuthorizationCode, ClientId, CsrfToken,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use parking_lot::Mutex;
use url::Url;

use crate::error::Error;

// Client ID of the registered Spotify application.
const CLIENT_ID: &str = "9ab38df44e60464fbfc5589cf5115a03";

// Scopes requested during authorization.
const ACCESS_SCOPES: &str =
    "user-read-playback-state,user-modify-playback-state,user-read-currently-playing";

const AUTH_URL: &str = "https://accounts.spotify.com/authorize";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

// Consider a token expired slightly before its reported lifetime runs out,
// so no request leaves with a token about to lapse.
const EXPIRATION_TIME_THRESHOLD: Duration = Duration::from_secs(60);

// How long the redirect listener waits for the browser round trip.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Token acquisition seam of the sync controller.
pub trait AuthProvider: Send + Sync {
    /// A stored token that is still valid, if there is one.
    fn cached_token(&self) -> Option<String>;

    /// Run the authorization flow, blocking until the user finishes in the
    /// browser or the redirect listener times out.
    fn authorize(&self) -> Result<String, Error>;
}

#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires: Instant,
}

impl AccessToken {
    fn is_expired(&self) -> bool {
        self.expires.saturating_duration_since(Instant::now()) < EXPIRATION_TIME_THRESHOLD
    }
}

pub type TokenStoreHandle = Arc<TokenStore>;

/// Shared store for the bearer token, written by the auth flow and read by
/// the playback and artwork clients.
pub struct TokenStore {
    token: Mutex<Option<AccessToken>>,
}

impl TokenStore {
    pub fn new() -> TokenStoreHandle {
        Arc::new(TokenStore {
            token: Mutex::new(None),
        })
    }

    pub fn get(&self) -> Option<String> {
        match self.token.lock().as_ref() {
            Some(token) if !token.is_expired() => Some(token.token.clone()),
            _ => None,
        }
    }

    pub fn put(&self, token: String, expires_in: Option<Duration>) {
        // The token endpoint reports 3600 s; assume that when it is omitted.
        let expires = Instant::now() + expires_in.unwrap_or(Duration::from_secs(3600));
        *self.token.lock() = Some(AccessToken { token, expires });
    }
}

/// Authorization-code + PKCE flow against the Spotify account service, with
/// the redirect received on a loopback listener.
pub struct SpotifyAuth {
    store: TokenStoreHandle,
    redirect_port: u16,
}

impl SpotifyAuth {
    pub fn new(store: TokenStoreHandle, redirect_port: u16) -> Self {
        Self {
            store,
            redirect_port,
        }
    }
}

impl AuthProvider for SpotifyAuth {
    fn cached_token(&self) -> Option<String> {
        self.store.get()
    }

    fn authorize(&self) -> Result<String, Error> {
        let (auth_url, pkce_verifier) = generate_auth_url(self.redirect_port);
        if open::that(&auth_url).is_err() {
            log::warn!("could not open a browser, visit {} manually", auth_url);
        }

        let socket_address =
            SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), self.redirect_port);
        let code = listen_for_code(socket_address, CALLBACK_TIMEOUT)?;
        let (token, expires_in) = exchange_code_for_token(self.redirect_port, code, pkce_verifier)?;
        self.store.put(token.clone(), expires_in);
        Ok(token)
    }
}

fn create_oauth_client(redirect_port: u16) -> BasicClient {
    let redirect_address = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), redirect_port);
    let redirect_uri = format!("http://{redirect_address}/callback");

    BasicClient::new(
        ClientId::new(CLIENT_ID.to_string()),
        None,
        AuthUrl::new(AUTH_URL.to_string()).unwrap(),
        Some(TokenUrl::new(TOKEN_URL.to_string()).unwrap()),
    )
    .set_redirect_uri(RedirectUrl::new(redirect_uri).expect("Invalid redirect URL"))
}

pub fn generate_auth_url(redirect_port: u16) -> (String, PkceCodeVerifier) {
    let client = create_oauth_client(redirect_port);
    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (auth_url, _) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(scopes())
        .set_pkce_challenge(pkce_challenge)
        .url();

    (auth_url.to_string(), pkce_verifier)
}

fn exchange_code_for_token(
    redirect_port: u16,
    code: AuthorizationCode,
    pkce_verifier: PkceCodeVerifier,
) -> Result<(String, Option<Duration>), Error> {
    let client = create_oauth_client(redirect_port);

    let token_response = client
        .exchange_code(code)
        .set_pkce_verifier(pkce_verifier)
        .request(http_client)
        .map_err(|err| Error::OAuthError(err.to_string()))?;

    Ok((
        token_response.access_token().secret().to_string(),
        token_response.expires_in(),
    ))
}

fn scopes() -> Vec<Scope> {
    ACCESS_SCOPES
        .split(',')
        .map(|scope| Scope::new(scope.trim().to_string()))
        .collect()
}

/// Wait for the authorization redirect on a loopback listener and pull the
/// code out of the request line.
fn listen_for_code(
    socket_address: SocketAddr,
    timeout: Duration,
) -> Result<AuthorizationCode, Error> {
    log::info!("waiting for the authorization redirect on {:?}", socket_address);
    let listener = TcpListener::bind(socket_address)?;

    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || {
        let result = match listener.accept() {
            Ok((mut stream, _)) => read_code_from_redirect(&mut stream),
            Err(err) => Err(Error::IoError(err)),
        };
        let _ = tx.send(result);
    });

    let result = rx.recv_timeout(timeout);
    if result.is_err() {
        // Unblock the pending accept with a throwaway connection, so the
        // worker exits and releases the port for the next attempt.
        let _ = TcpStream::connect(socket_address);
    }
    if worker.join().is_err() {
        log::warn!("redirect listener thread panicked");
    }
    result?.map(AuthorizationCode::new)
}

fn read_code_from_redirect(stream: &mut TcpStream) -> Result<String, Error> {
    let mut reader = BufReader::new(&mut *stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    match extract_query_parameter(&request_line, "code") {
        Some(code) => {
            log::info!("authorization code received");
            send_success_response(stream);
            Ok(code)
        }
        None => Err(Error::OAuthError(format!(
            "no authorization code in request: {}",
            request_line.trim_end()
        ))),
    }
}

fn extract_query_parameter(request_line: &str, name: &str) -> Option<String> {
    request_line
        .split_whitespace()
        .nth(1)
        .and_then(|path| Url::parse(&format!("http://localhost{path}")).ok())
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        })
}

fn send_success_response(stream: &mut TcpStream) {
    let response = "HTTP/1.1 200 OK\r\n\r\n\
        <html>\
        <head>\
            <style>\
                body {\
                    background-color: #101010;\
                    color: #eeeeee;\
                    font-family: sans-serif;\
                    display: flex;\
                    justify-content: center;\
                    align-items: center;\
                    height: 100vh;\
                    margin: 0;\
                }\
            </style>\
        </head>\
        <body>\
            <div>Authorized. You can close this window now.</div>\
        </body>\
        </html>";
    let _ = stream.write_all(response.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parameter_is_extracted_from_the_request_line() {
        let line = "GET /callback?code=AQDnz4x&state=abc HTTP/1.1\r\n";
        assert_eq!(
            extract_query_parameter(line, "code").as_deref(),
            Some("AQDnz4x")
        );
        assert_eq!(
            extract_query_parameter(line, "state").as_deref(),
            Some("abc")
        );
        assert_eq!(extract_query_parameter(line, "error"), None);
    }

    #[test]
    fn request_line_without_a_code_yields_none() {
        assert_eq!(
            extract_query_parameter("GET /callback?error=access_denied HTTP/1.1\r\n", "code"),
            None
        );
        assert_eq!(extract_query_parameter("nonsense", "code"), None);
    }

    #[test]
    fn auth_url_carries_the_pkce_challenge() {
        let (auth_url, _verifier) = generate_auth_url(8888);
        let url = Url::parse(&auth_url).unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        assert!(pairs.iter().any(|(key, value)| key == "client_id" && value == CLIENT_ID));
        assert!(pairs
            .iter()
            .any(|(key, value)| key == "code_challenge_method" && value == "S256"));
        assert!(pairs.iter().any(|(key, _)| key == "code_challenge"));
        assert!(pairs
            .iter()
            .any(|(key, value)| key == "redirect_uri" && value.contains(":8888/callback")));
        assert!(pairs
            .iter()
            .any(|(key, value)| key == "scope" && value.contains("user-read-playback-state")));
    }

    #[test]
    fn token_store_expires_stored_tokens() {
        let store = TokenStore::new();
        assert_eq!(store.get(), None);

        store.put("fresh".into(), Some(Duration::from_secs(3600)));
        assert_eq!(store.get().as_deref(), Some("fresh"));

        // A lifetime below the threshold counts as already expired.
        store.put("stale".into(), Some(Duration::from_secs(10)));
        assert_eq!(store.get(), None);
    }

    #[test]
    fn timed_out_listener_releases_the_port_for_the_next_attempt() {
        let address = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 18652);
        let timeout = Duration::from_millis(50);

        let first = listen_for_code(address, timeout);
        assert!(matches!(first, Err(Error::OAuthError(_))));

        // A listener leaked by the first attempt would turn this into an
        // AddrInUse bind failure instead of a second timeout.
        let second = listen_for_code(address, timeout);
        assert!(
            matches!(second, Err(Error::OAuthError(_))),
            "expected a timeout, got {:?}",
            second
        );
    }
}
