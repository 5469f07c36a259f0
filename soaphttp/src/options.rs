//! Option translation table
//!
//! [`ClientOptions`] is the abstract options bag a SOAP client is created
//! with. [`TransportSettings::from_options`] turns it into the concrete
//! settings both transports understand.

use crate::error::{Error, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use http::header::{ACCEPT, ACCEPT_ENCODING, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// User agent sent when none is configured
pub const DEFAULT_USER_AGENT: &str = concat!("soaphttp/", env!("CARGO_PKG_VERSION"));

const DEFAULT_PROXY_HOST: &str = "127.0.0.1";
const DEFAULT_PROXY_SCHEME: &str = "http";
const DEFAULT_PROXY_PORT: u16 = 8080;

const TCP_KEEPALIVE_IDLE: Duration = Duration::from_secs(180);
const TCP_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Abstract client options
///
/// Every field is optional; absent fields leave the transport defaults in
/// place. Secret fields (`password`, `proxy_password`, `passphrase`,
/// `ssl_keypasswd`) are expected in clear text here: decryption happens when
/// the options are read from the configuration.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<Compression>,
    /// Connect timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_auth: Option<AuthScheme>,
    /// Client certificate (PEM)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_cert: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
    /// CA bundle used to verify the peer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_info: Option<PathBuf>,
    /// Directory of additional CA certificates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_path: Option<PathBuf>,
    /// Client private key (PEM), when not bundled with `local_cert`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_key: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_keypasswd: Option<String>,
}

impl ClientOptions {
    /// Names of the fields holding secrets
    pub const SECRET_FIELDS: [&'static str; 4] =
        ["password", "proxy_password", "passphrase", "ssl_keypasswd"];

    /// Mutable access to a secret field by name
    pub fn secret_mut(&mut self, field: &str) -> Option<&mut Option<String>> {
        match field {
            "password" => Some(&mut self.password),
            "proxy_password" => Some(&mut self.proxy_password),
            "passphrase" => Some(&mut self.passphrase),
            "ssl_keypasswd" => Some(&mut self.ssl_keypasswd),
            _ => None,
        }
    }
}

// Les secrets ne doivent jamais apparaître dans les logs
impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(value: &Option<String>) -> Option<&'static str> {
            value.as_ref().map(|_| "***")
        }

        f.debug_struct("ClientOptions")
            .field("user_agent", &self.user_agent)
            .field("compression", &self.compression)
            .field("connection_timeout", &self.connection_timeout)
            .field("proxy_host", &self.proxy_host)
            .field("proxy_port", &self.proxy_port)
            .field("proxy_login", &self.proxy_login)
            .field("proxy_password", &redact(&self.proxy_password))
            .field("login", &self.login)
            .field("password", &redact(&self.password))
            .field("http_auth", &self.http_auth)
            .field("local_cert", &self.local_cert)
            .field("passphrase", &redact(&self.passphrase))
            .field("ca_info", &self.ca_info)
            .field("ca_path", &self.ca_path)
            .field("ssl_key", &self.ssl_key)
            .field("ssl_keypasswd", &redact(&self.ssl_keypasswd))
            .finish()
    }
}

/// Response compression preference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Compression {
    /// Whether compressed responses are accepted
    pub accept: bool,
}

impl Compression {
    /// Flag bit meaning "accept compressed responses"
    pub const ACCEPT: u32 = 0x20;

    /// Builds the preference from a flag word
    pub fn from_flags(flags: u32) -> Self {
        Self {
            accept: flags & Self::ACCEPT != 0,
        }
    }
}

/// HTTP authentication scheme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AuthScheme {
    #[default]
    Basic,
    Digest,
    Ntlm,
}

impl AuthScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthScheme::Basic => "basic",
            AuthScheme::Digest => "digest",
            AuthScheme::Ntlm => "ntlm",
        }
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u32>() {
            return Self::try_from(code);
        }
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(AuthScheme::Basic),
            "digest" => Ok(AuthScheme::Digest),
            "ntlm" => Ok(AuthScheme::Ntlm),
            _ => Err(Error::UnsupportedAuthScheme(s.to_string())),
        }
    }
}

impl TryFrom<u32> for AuthScheme {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self> {
        match code {
            1 => Ok(AuthScheme::Basic),
            2 => Ok(AuthScheme::Digest),
            8 => Ok(AuthScheme::Ntlm),
            other => Err(Error::UnsupportedAuthScheme(other.to_string())),
        }
    }
}

impl Serialize for AuthScheme {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AuthScheme {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(u32),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Code(code) => AuthScheme::try_from(code),
            Raw::Name(name) => name.parse(),
        }
        .map_err(serde::de::Error::custom)
    }
}

/// Credentials for HTTP authentication
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
    pub scheme: AuthScheme,
}

impl Credentials {
    /// Value of a preemptive `Authorization` header (Basic only)
    pub fn basic_header(&self) -> Option<String> {
        (self.scheme == AuthScheme::Basic).then(|| {
            let token = BASE64.encode(format!("{}:{}", self.login, self.password));
            format!("Basic {}", token)
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"***")
            .field("scheme", &self.scheme)
            .finish()
    }
}

/// Peer verification mode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    #[default]
    Disabled,
    /// Verify the peer against this CA bundle
    CaBundle(PathBuf),
}

/// A PEM file with its optional passphrase
#[derive(Clone, PartialEq, Eq)]
pub struct PemFile {
    pub path: PathBuf,
    pub passphrase: Option<String>,
}

impl fmt::Debug for PemFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PemFile")
            .field("path", &self.path)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    pub verify: TlsVerification,
    /// Extra CA directory, only used when verification is enabled
    pub ca_path: Option<PathBuf>,
    pub client_cert: Option<PemFile>,
    pub client_key: Option<PemFile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpKeepalive {
    pub idle: Duration,
    pub interval: Duration,
}

impl Default for TcpKeepalive {
    fn default() -> Self {
        Self {
            idle: TCP_KEEPALIVE_IDLE,
            interval: TCP_KEEPALIVE_INTERVAL,
        }
    }
}

/// Concrete transport settings
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Headers sent with every request (per-call headers win)
    pub headers: HeaderMap,
    pub tls: TlsSettings,
    pub proxy: Option<Url>,
    pub connect_timeout: Option<Duration>,
    /// Transparently decode gzip/deflate response bodies
    pub decode_content: bool,
    pub tcp_keepalive: Option<TcpKeepalive>,
    pub credentials: Option<Credentials>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("deflate, gzip"));

        Self {
            headers,
            tls: TlsSettings::default(),
            proxy: None,
            connect_timeout: None,
            decode_content: true,
            tcp_keepalive: Some(TcpKeepalive::default()),
            credentials: None,
        }
    }
}

impl TransportSettings {
    /// Translates the abstract options into transport settings
    pub fn from_options(options: &ClientOptions) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(agent) = &options.user_agent {
            settings
                .headers
                .insert(USER_AGENT, HeaderValue::from_str(agent)?);
        }

        if options.compression.is_some_and(|c| !c.accept) {
            settings
                .headers
                .insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
            settings.decode_content = false;
        }

        if let Some(secs) = options.connection_timeout {
            settings.connect_timeout = Some(Duration::from_secs(secs));
        }

        if let Some(host) = &options.proxy_host {
            settings.proxy = Some(build_proxy_url(
                host,
                options.proxy_port,
                options.proxy_login.as_deref(),
                options.proxy_password.as_deref(),
            )?);
        }

        if let Some(login) = &options.login {
            let credentials = Credentials {
                login: login.clone(),
                password: options.password.clone().unwrap_or_default(),
                scheme: options.http_auth.unwrap_or_default(),
            };
            if let Some(value) = credentials.basic_header() {
                settings
                    .headers
                    .insert(AUTHORIZATION, HeaderValue::from_str(&value)?);
            }
            settings.credentials = Some(credentials);
        }

        if let Some(cert) = &options.local_cert {
            settings.tls.client_cert = Some(PemFile {
                path: cert.clone(),
                passphrase: options.passphrase.clone(),
            });
        }

        if let Some(ca) = &options.ca_info {
            settings.tls.verify = TlsVerification::CaBundle(ca.clone());
        }

        if let Some(dir) = &options.ca_path {
            if settings.tls.verify == TlsVerification::Disabled {
                warn!(
                    ca_path = %dir.display(),
                    "ca_path is ignored while peer verification is disabled (set ca_info)"
                );
            }
            settings.tls.ca_path = Some(dir.clone());
        }

        if let Some(key) = &options.ssl_key {
            settings.tls.client_key = Some(PemFile {
                path: key.clone(),
                passphrase: options.ssl_keypasswd.clone(),
            });
        }

        Ok(settings)
    }

    /// Rejects the features no transport can honour
    pub fn ensure_supported(&self) -> Result<()> {
        if let Some(credentials) = &self.credentials {
            if credentials.scheme != AuthScheme::Basic {
                return Err(Error::UnsupportedAuthScheme(credentials.scheme.to_string()));
            }
        }
        for pem in [&self.tls.client_cert, &self.tls.client_key]
            .into_iter()
            .flatten()
        {
            if pem.passphrase.as_deref().is_some_and(|p| !p.is_empty()) {
                return Err(Error::tls(format!(
                    "encrypted private keys are not supported ({})",
                    pem.path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Assembles the proxy URL from its parts
///
/// `host` may be a bare host, a `host:port` authority or a full URL.
pub fn build_proxy_url(
    host: &str,
    port: Option<u16>,
    login: Option<&str>,
    password: Option<&str>,
) -> Result<Url> {
    let raw = host.trim();
    let (scheme, rest) = match raw.split_once("://") {
        Some((scheme, rest)) if !scheme.is_empty() => (scheme, rest),
        Some((_, rest)) => (DEFAULT_PROXY_SCHEME, rest),
        None => (DEFAULT_PROXY_SCHEME, raw),
    };

    // Seule l'autorité compte, le chemin éventuel est ignoré
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let (userinfo, hostport) = match authority.rsplit_once('@') {
        Some((userinfo, hostport)) => (Some(userinfo), hostport),
        None => (None, authority),
    };
    let hostport = if hostport.is_empty() || hostport.starts_with(':') {
        format!("{}{}", DEFAULT_PROXY_HOST, hostport)
    } else {
        hostport.to_string()
    };
    let explicit_port = has_explicit_port(&hostport);

    let mut url = Url::parse(&format!("{}://{}", scheme, hostport))
        .map_err(|e| Error::InvalidProxy(format!("{}: {}", raw, e)))?;

    if let Some(userinfo) = userinfo {
        let (user, pass) = match userinfo.split_once(':') {
            Some((user, pass)) => (user, Some(pass)),
            None => (userinfo, None),
        };
        set_userinfo(&mut url, Some(user), pass)?;
    }

    match port {
        Some(port) => set_port(&mut url, port)?,
        None if !explicit_port => set_port(&mut url, DEFAULT_PROXY_PORT)?,
        None => {}
    }

    if login.is_some() || password.is_some() {
        set_userinfo(&mut url, login, password)?;
    }

    Ok(url)
}

fn set_port(url: &mut Url, port: u16) -> Result<()> {
    url.set_port(Some(port))
        .map_err(|_| Error::InvalidProxy(format!("cannot set port {} on {}", port, url)))
}

fn set_userinfo(url: &mut Url, user: Option<&str>, pass: Option<&str>) -> Result<()> {
    if let Some(user) = user {
        url.set_username(user)
            .map_err(|_| Error::InvalidProxy(format!("cannot set user info on {}", url)))?;
    }
    url.set_password(pass)
        .map_err(|_| Error::InvalidProxy(format!("cannot set user info on {}", url)))
}

/// `url` drops ports equal to the scheme default, so the raw text is checked
fn has_explicit_port(hostport: &str) -> bool {
    if hostport.ends_with(']') {
        return false;
    }
    match hostport.rsplit_once(':') {
        Some((host, port)) => {
            !port.is_empty()
                && port.bytes().all(|b| b.is_ascii_digit())
                && (!host.contains(':') || host.ends_with(']'))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy(host: &str, port: Option<u16>) -> String {
        build_proxy_url(host, port, None, None).unwrap().to_string()
    }

    #[test]
    fn test_default_headers() {
        let settings = TransportSettings::from_options(&ClientOptions::default()).unwrap();

        assert_eq!(settings.headers[USER_AGENT], DEFAULT_USER_AGENT);
        assert_eq!(settings.headers[ACCEPT], "*/*");
        assert_eq!(settings.headers[ACCEPT_ENCODING], "deflate, gzip");
        assert!(settings.decode_content);
        assert_eq!(settings.tls.verify, TlsVerification::Disabled);
        let keepalive = settings.tcp_keepalive.unwrap();
        assert_eq!(keepalive.idle, Duration::from_secs(180));
        assert_eq!(keepalive.interval, Duration::from_secs(60));
        assert!(settings.proxy.is_none());
    }

    #[test]
    fn test_compression_refused() {
        let options = ClientOptions {
            compression: Some(Compression::from_flags(0)),
            ..Default::default()
        };
        let settings = TransportSettings::from_options(&options).unwrap();

        assert_eq!(settings.headers[ACCEPT_ENCODING], "identity");
        assert!(!settings.decode_content);

        let options = ClientOptions {
            compression: Some(Compression::from_flags(Compression::ACCEPT)),
            ..Default::default()
        };
        let settings = TransportSettings::from_options(&options).unwrap();
        assert_eq!(settings.headers[ACCEPT_ENCODING], "deflate, gzip");
    }

    #[test]
    fn test_proxy_url_assembly() {
        assert_eq!(proxy("proxy.local", None), "http://proxy.local:8080/");
        assert_eq!(proxy("proxy.local:3128", None), "http://proxy.local:3128/");
        assert_eq!(proxy("proxy.local:3128", Some(9000)), "http://proxy.local:9000/");
        assert_eq!(proxy("https://proxy.local", None), "https://proxy.local:8080/");
        assert_eq!(proxy("", Some(3128)), "http://127.0.0.1:3128/");
        assert_eq!(proxy("http://", None), "http://127.0.0.1:8080/");
        // Le port 80 explicite n'est pas remplacé par 8080
        assert_eq!(proxy("proxy.local:80", None), "http://proxy.local/");
    }

    #[test]
    fn test_proxy_credentials_are_encoded() {
        let url = build_proxy_url("proxy.local", Some(3128), Some("dom\\user"), Some("p@ss:w"))
            .unwrap();

        assert_eq!(url.host_str(), Some("proxy.local"));
        assert_eq!(url.port(), Some(3128));
        assert_eq!(url.username(), "dom%5Cuser");
        assert_eq!(url.password(), Some("p%40ss%3Aw"));
    }

    #[test]
    fn test_basic_credentials_become_authorization_header() {
        let options = ClientOptions {
            login: Some("alice".into()),
            password: Some("secret".into()),
            ..Default::default()
        };
        let settings = TransportSettings::from_options(&options).unwrap();

        assert_eq!(settings.headers[AUTHORIZATION], "Basic YWxpY2U6c2VjcmV0");
        assert_eq!(settings.credentials.unwrap().scheme, AuthScheme::Basic);
    }

    #[test]
    fn test_missing_password_defaults_to_empty() {
        let options = ClientOptions {
            login: Some("bob".into()),
            ..Default::default()
        };
        let settings = TransportSettings::from_options(&options).unwrap();
        assert_eq!(settings.credentials.unwrap().password, "");
    }

    #[test]
    fn test_auth_scheme_parsing() {
        assert_eq!("Digest".parse::<AuthScheme>().unwrap(), AuthScheme::Digest);
        assert_eq!("8".parse::<AuthScheme>().unwrap(), AuthScheme::Ntlm);
        assert_eq!(AuthScheme::try_from(1).unwrap(), AuthScheme::Basic);
        assert!(matches!(
            "kerberos".parse::<AuthScheme>(),
            Err(Error::UnsupportedAuthScheme(_))
        ));
        assert!(AuthScheme::try_from(4).is_err());
    }

    #[test]
    fn test_unsupported_features_are_rejected() {
        let digest = ClientOptions {
            login: Some("u".into()),
            http_auth: Some(AuthScheme::Digest),
            ..Default::default()
        };
        let settings = TransportSettings::from_options(&digest).unwrap();
        assert!(!settings.headers.contains_key(AUTHORIZATION));
        assert!(settings.ensure_supported().is_err());

        let encrypted = ClientOptions {
            ssl_key: Some("/etc/client.key".into()),
            ssl_keypasswd: Some("pw".into()),
            ..Default::default()
        };
        let settings = TransportSettings::from_options(&encrypted).unwrap();
        assert!(matches!(settings.ensure_supported(), Err(Error::Tls(_))));
    }

    #[test]
    fn test_tls_options() {
        let options = ClientOptions {
            ca_info: Some("/etc/ca.pem".into()),
            ca_path: Some("/etc/certs".into()),
            local_cert: Some("/etc/client.pem".into()),
            ..Default::default()
        };
        let settings = TransportSettings::from_options(&options).unwrap();

        assert_eq!(
            settings.tls.verify,
            TlsVerification::CaBundle("/etc/ca.pem".into())
        );
        assert_eq!(settings.tls.ca_path, Some("/etc/certs".into()));
        assert_eq!(
            settings.tls.client_cert.as_ref().unwrap().path,
            PathBuf::from("/etc/client.pem")
        );
        assert!(settings.ensure_supported().is_ok());
    }

    #[test]
    fn test_options_from_yaml() {
        let yaml = r#"
connection_timeout: 5
http_auth: 2
compression:
  accept: false
proxy_host: "proxy.local"
"#;
        let options: ClientOptions = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(options.connection_timeout, Some(5));
        assert_eq!(options.http_auth, Some(AuthScheme::Digest));
        assert_eq!(options.compression, Some(Compression { accept: false }));

        let settings = TransportSettings::from_options(&options).unwrap();
        assert_eq!(settings.connect_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let options = ClientOptions {
            password: Some("hunter2".into()),
            ..Default::default()
        };
        assert!(!format!("{:?}", options).contains("hunter2"));
    }
}
