//! # soapcall configuration module
//!
//! This module provides configuration management for the SOAP HTTP tooling:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Encrypted storage of secrets (passwords, key passphrases)
//! - Thread-safe singleton access pattern
//!
//! ## Usage
//!
//! ```no_run
//! use soapconfig::get_config;
//!
//! let config = get_config();
//!
//! // Read a raw value from the YAML tree
//! let transport = config.get_value(&["clients", "default", "transport"])?;
//!
//! // Store a secret, encrypted with the machine key
//! config.set_secret(&["clients", "default", "options", "password"], "s3cret")?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::info;

// Module de chiffrement des secrets
pub mod encryption;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("soapcall.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load soapcall configuration"));
}

const ENV_CONFIG_DIR: &str = "SOAPCALL_CONFIG";
const ENV_PREFIX: &str = "SOAPCALL_CONFIG__";
const CONFIG_DIR_NAME: &str = ".soapcall";

// Default values for configuration
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => Ok(b),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Configuration manager
///
/// This structure manages the application configuration, including:
/// - Loading configuration from YAML files
/// - Merging with default configuration
/// - Handling environment variable overrides
/// - Providing typed getters/setters for configuration values
///
/// Client profiles live under `clients.<profile>`; the `soaphttp` crate
/// reads them through its `SoapClientConfigExt` extension trait.
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

// Implémentation manuelle de Clone
impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.lock_data().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    fn lock_data(&self) -> MutexGuard<'_, Value> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        // 1. Try provided directory
        if !directory.is_empty() {
            return directory.to_string();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var=ENV_CONFIG_DIR, path=%env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Try current directory
        if Path::new(CONFIG_DIR_NAME).exists() {
            return CONFIG_DIR_NAME.to_string();
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        // Default fallback
        CONFIG_DIR_NAME.to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        // Create if doesn't exist
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        // Verify it's a directory
        if !path.is_dir() {
            return Err(anyhow!("Le chemin spécifié n'est pas un répertoire"));
        }

        // Test write permission
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        // Test read permission
        fs::read_dir(path)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `SOAPCALL_CONFIG` environment variable
    /// 3. `.soapcall` in the current directory
    /// 4. `.soapcall` in the user's home directory
    ///
    /// The directory is created if it doesn't exist, and validated for read/write permissions.
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir_path = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&dir_path))
            .map_err(|e| anyhow!("Impossible de valider le répertoire {}: {}", dir_path, e))?;
        Ok(dir_path)
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies environment variable overrides
    /// 5. Saves the merged configuration
    ///
    /// # Arguments
    ///
    /// * `directory` - The directory containing the config.yaml file, or empty to use defaults
    pub fn load_config(directory: &str) -> Result<Self> {
        // Obtenir le répertoire de configuration
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir=%config_dir, "Using config directory");

        // Construire le chemin du fichier config.yaml
        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        // Charger la configuration par défaut
        let mut default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        // Essayer de charger le fichier de configuration
        let yaml_data = if let Ok(data) = fs::read(&path) {
            info!(config_file=%path, "Loaded config file");
            data
        } else {
            info!(config_file=%path, "Config file not found, using default embedded config");
            DEFAULT_CONFIG.as_bytes().to_vec()
        };

        // Merger avec la config par défaut
        let external_value: Value = serde_yaml::from_slice(&yaml_data)?;
        merge_yaml(&mut default_value, &external_value);
        let mut config_value = lower_keys_value(default_value);

        // Appliquer les overrides depuis les variables d'environnement
        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Directory holding `config.yaml`
    pub fn directory(&self) -> &str {
        &self.config_dir
    }

    /// Full path of the persisted `config.yaml`
    pub fn file_path(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let yaml = {
            let data = self.lock_data();
            serde_yaml::to_string(&*data)?
        };
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["clients", "default", "transport"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.lock_data();
            set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.lock_data();
        get_value_internal(&data, path)
    }

    /// Reads a secret, decrypting it when stored as `encrypted:...`
    ///
    /// Returns `Ok(None)` when the path is absent or null.
    pub fn get_secret(&self, path: &[&str]) -> Result<Option<String>> {
        match self.get_value(path) {
            Ok(Value::String(s)) => encryption::get_password(&s).map(Some),
            Ok(Value::Null) | Err(_) => Ok(None),
            Ok(other) => Err(anyhow!(
                "Secret at {} is not a string: {:?}",
                path.join("."),
                other
            )),
        }
    }

    /// Stores a secret encrypted with the machine key
    pub fn set_secret(&self, path: &[&str], plaintext: &str) -> Result<()> {
        let encrypted = encryption::encrypt_password(plaintext)?;
        self.set_value(path, Value::String(encrypted))
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = convert_env_value(&value);
                let _ = set_value_internal(config, &key_path, yaml_value);
            }
        }
    }

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    /// Récupère le niveau de log minimum depuis la configuration
    pub fn get_log_min_level(&self) -> Result<String> {
        match self.get_value(&["host", "logger", "min_level"]) {
            Ok(Value::String(s)) => Ok(s),
            _ => Ok(DEFAULT_LOG_MIN_LEVEL.to_string()),
        }
    }

    /// Définit le niveau de log minimum dans la configuration
    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(&["host", "logger", "min_level"], Value::String(level))
    }
}

fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    if path.is_empty() {
        *data = value;
        return Ok(());
    }
    if let Value::Mapping(map) = data {
        let key_value = Value::String(path[0].to_lowercase());
        if path.len() == 1 {
            map.insert(key_value, value);
        } else {
            let entry = map
                .entry(key_value)
                .or_insert(Value::Mapping(Mapping::new()));
            // Un noeud scalaire sur le chemin est remplacé par une map
            if !entry.is_mapping() {
                *entry = Value::Mapping(Mapping::new());
            }
            set_value_internal(entry, &path[1..], value)?;
        }
        Ok(())
    } else {
        Err(anyhow!("Current node is not a map"))
    }
}

fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
    let mut current = data;
    for (i, key) in path.iter().enumerate() {
        if let Value::Mapping(map) = current {
            let key = key.to_lowercase();

            if let Some(next) = map.get(Value::String(key)) {
                current = next;
            } else {
                return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
            }
        } else {
            return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
        }
    }
    Ok(current.clone())
}

fn convert_env_value(value: &str) -> Value {
    if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
        return parsed;
    }
    Value::String(value.to_string())
}

fn lower_keys_value(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut new_map = Mapping::new();
            for (k, v) in map {
                if let Value::String(s) = k {
                    new_map.insert(Value::String(s.to_lowercase()), lower_keys_value(v));
                } else {
                    new_map.insert(k, lower_keys_value(v));
                }
            }
            Value::Mapping(new_map)
        }
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys_value).collect()),
        _ => value,
    }
}

/// Returns the global configuration instance
///
/// The instance is lazily loaded on first access.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Merges external YAML configuration into default configuration
///
/// - For mappings (objects), it merges keys from external into default
/// - For scalars and sequences, external values replace default values
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(), // pour les scalaires ou séquences, on remplace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_in_tempdir() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_defaults_are_loaded_and_saved() {
        let (dir, config) = load_in_tempdir();

        assert!(dir.path().join("config.yaml").exists());
        assert_eq!(
            config.get_value(&["clients", "default", "transport"]).unwrap(),
            Value::String("ureq".to_string())
        );
        assert_eq!(config.get_log_min_level().unwrap(), "INFO");
        assert!(config.get_log_enable_console().unwrap());
    }

    #[test]
    fn test_external_file_is_merged() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "clients:\n  Legacy:\n    Transport: reqwest\n",
        )
        .unwrap();

        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();

        // Les clés sont passées en minuscules
        assert_eq!(
            config.get_value(&["clients", "legacy", "transport"]).unwrap(),
            Value::String("reqwest".to_string())
        );
        // Le profil par défaut est conservé
        assert!(config.get_value(&["clients", "default"]).is_ok());
    }

    #[test]
    fn test_set_value_persists() {
        let (dir, config) = load_in_tempdir();
        config
            .set_value(&["clients", "billing", "transport"], Value::String("reqwest".into()))
            .unwrap();

        let reloaded = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(
            reloaded.get_value(&["Clients", "Billing", "transport"]).unwrap(),
            Value::String("reqwest".to_string())
        );
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let (_dir, config) = load_in_tempdir();
        let err = config.get_value(&["clients", "nope", "transport"]).unwrap_err();
        assert!(err.to_string().contains("clients.nope"));
    }

    #[test]
    fn test_plain_secret_is_returned_as_is() {
        let (_dir, config) = load_in_tempdir();
        config
            .set_value(&["clients", "default", "options", "password"], Value::String("pw".into()))
            .unwrap();

        assert_eq!(
            config
                .get_secret(&["clients", "default", "options", "password"])
                .unwrap(),
            Some("pw".to_string())
        );
        assert_eq!(
            config
                .get_secret(&["clients", "default", "options", "proxy_password"])
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_merge_yaml_replaces_scalars_and_keeps_siblings() {
        let mut default: Value = serde_yaml::from_str("a: {b: 1, c: 2}\nd: [1, 2]").unwrap();
        let external: Value = serde_yaml::from_str("a: {b: 5}\nd: [3]").unwrap();

        merge_yaml(&mut default, &external);

        let expected: Value = serde_yaml::from_str("a: {b: 5, c: 2}\nd: [3]").unwrap();
        assert_eq!(default, expected);
    }

    #[test]
    fn test_set_value_through_scalar_node() {
        let mut data: Value = serde_yaml::from_str("a: 1").unwrap();
        set_value_internal(&mut data, &["a", "b"], Value::Bool(true)).unwrap();
        assert_eq!(get_value_internal(&data, &["a", "b"]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_convert_env_value() {
        assert_eq!(convert_env_value("12"), Value::Number(12.into()));
        assert_eq!(convert_env_value("true"), Value::Bool(true));
        assert_eq!(convert_env_value("ureq"), Value::String("ureq".to_string()));
    }
}
