//! Extension pour lire les profils de client SOAP dans soapconfig
//!
//! Un profil vit sous `clients.<profile>` :
//!
//! ```yaml
//! clients:
//!   billing:
//!     transport: reqwest
//!     follow_location_max_redirects: 5
//!     options:
//!       login: api
//!       password: "encrypted:..."
//!       connection_timeout: 10
//! ```
//!
//! Les champs secrets (`password`, `proxy_password`, `passphrase`,
//! `ssl_keypasswd`) peuvent être stockés chiffrés ; ils sont déchiffrés à la
//! lecture.
//!
//! # Exemple
//!
//! ```no_run
//! use soapconfig::get_config;
//! use soaphttp::SoapClientConfigExt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = get_config();
//! config.set_client_secret("billing", "password", "s3cret")?;
//!
//! let http = config.create_http_client("billing")?;
//! # Ok(())
//! # }
//! ```

use crate::factory::{HttpClientFactory, HttpClientKind};
use crate::http_client::{DEFAULT_MAX_REDIRECTS, SoapHttpClient};
use crate::options::ClientOptions;
use anyhow::{Result, anyhow};
use serde_yaml::Value;
use soapconfig::Config;
use soapconfig::encryption;
use tracing::info;

/// Profile used when none is given
pub const DEFAULT_PROFILE: &str = "default";

/// Trait d'extension pour gérer les profils de client dans soapconfig
///
/// Comme pour les autres extensions, les getters persistent la valeur par
/// défaut quand elle est absente.
pub trait SoapClientConfigExt {
    /// Transport du profil (défaut : `ureq`)
    fn get_client_kind(&self, profile: &str) -> Result<HttpClientKind>;

    fn set_client_kind(&self, profile: &str, kind: HttpClientKind) -> Result<()>;

    /// Nombre maximal de redirections 307 suivies (défaut : 10)
    fn get_client_max_redirects(&self, profile: &str) -> Result<u32>;

    fn set_client_max_redirects(&self, profile: &str, max: u32) -> Result<()>;

    /// Options du profil, secrets déchiffrés
    fn get_client_options(&self, profile: &str) -> Result<ClientOptions>;

    /// Enregistre les options ; les secrets sont chiffrés avant écriture
    fn set_client_options(&self, profile: &str, options: &ClientOptions) -> Result<()>;

    /// Enregistre un seul secret, chiffré
    fn set_client_secret(&self, profile: &str, field: &str, plaintext: &str) -> Result<()>;

    /// Construit le client HTTP décrit par le profil
    fn create_http_client(&self, profile: &str) -> Result<Box<dyn SoapHttpClient>>;
}

impl SoapClientConfigExt for Config {
    fn get_client_kind(&self, profile: &str) -> Result<HttpClientKind> {
        match self.get_value(&["clients", profile, "transport"]) {
            Ok(Value::String(name)) => Ok(name.parse()?),
            _ => {
                self.set_client_kind(profile, HttpClientKind::default())?;
                Ok(HttpClientKind::default())
            }
        }
    }

    fn set_client_kind(&self, profile: &str, kind: HttpClientKind) -> Result<()> {
        self.set_value(
            &["clients", profile, "transport"],
            Value::String(kind.to_string()),
        )
    }

    fn get_client_max_redirects(&self, profile: &str) -> Result<u32> {
        match self.get_value(&["clients", profile, "follow_location_max_redirects"]) {
            Ok(Value::Number(n)) => match n.as_u64().and_then(|n| u32::try_from(n).ok()) {
                Some(max) => Ok(max),
                None => Err(anyhow!(
                    "clients.{}.follow_location_max_redirects is not a valid count: {}",
                    profile,
                    n
                )),
            },
            _ => {
                self.set_client_max_redirects(profile, DEFAULT_MAX_REDIRECTS)?;
                Ok(DEFAULT_MAX_REDIRECTS)
            }
        }
    }

    fn set_client_max_redirects(&self, profile: &str, max: u32) -> Result<()> {
        self.set_value(
            &["clients", profile, "follow_location_max_redirects"],
            Value::Number(serde_yaml::Number::from(max)),
        )
    }

    fn get_client_options(&self, profile: &str) -> Result<ClientOptions> {
        let mut options: ClientOptions = match self.get_value(&["clients", profile, "options"]) {
            Ok(Value::Null) | Err(_) => ClientOptions::default(),
            Ok(value) => serde_yaml::from_value(value)?,
        };

        for field in ClientOptions::SECRET_FIELDS {
            if let Some(secret) = options.secret_mut(field) {
                if let Some(stored) = secret.as_deref() {
                    *secret = Some(encryption::get_password(stored)?);
                }
            }
        }
        Ok(options)
    }

    fn set_client_options(&self, profile: &str, options: &ClientOptions) -> Result<()> {
        let mut stored = options.clone();
        for field in ClientOptions::SECRET_FIELDS {
            if let Some(secret) = stored.secret_mut(field) {
                if let Some(plain) = secret.as_deref() {
                    if !encryption::is_encrypted(plain) {
                        *secret = Some(encryption::encrypt_password(plain)?);
                    }
                }
            }
        }

        self.set_value(
            &["clients", profile, "options"],
            serde_yaml::to_value(&stored)?,
        )
    }

    fn set_client_secret(&self, profile: &str, field: &str, plaintext: &str) -> Result<()> {
        if !ClientOptions::SECRET_FIELDS.contains(&field) {
            return Err(anyhow!(
                "{} is not a secret field (expected one of {})",
                field,
                ClientOptions::SECRET_FIELDS.join(", ")
            ));
        }
        self.set_secret(&["clients", profile, "options", field], plaintext)
    }

    fn create_http_client(&self, profile: &str) -> Result<Box<dyn SoapHttpClient>> {
        let kind = self.get_client_kind(profile)?;
        let max_redirects = self.get_client_max_redirects(profile)?;
        let options = self.get_client_options(profile)?;

        info!(profile, client = %kind, max_redirects, "Creating HTTP client from configuration");
        let client = HttpClientFactory::new()
            .with_max_redirects(max_redirects)
            .create(kind, &options)?;
        Ok(client)
    }
}
