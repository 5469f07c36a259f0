//! Module de chiffrement des secrets basé sur l'identifiant de la machine
//!
//! Les mots de passe (login HTTP, proxy, passphrase de clé TLS) peuvent être
//! stockés chiffrés dans `config.yaml`. La clé de chiffrement est dérivée de
//! l'identifiant matériel de la machine, ce qui rend le fichier non-portable
//! mais protégé.
//!
//! La variable d'environnement `SOAPCALL_SECRET_KEY`, si elle est définie,
//! remplace l'identifiant machine (conteneurs sans `/etc/machine-id`).

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Result};
use base64::Engine;
use sha2::{Digest, Sha256};
use std::env;

/// Préfixe pour identifier les secrets chiffrés
const ENCRYPTED_PREFIX: &str = "encrypted:";

const ENV_SECRET_KEY: &str = "SOAPCALL_SECRET_KEY";

/// Récupère l'identifiant matériel de la machine
///
/// Sur macOS, utilise `ioreg -d2 -c IOPlatformExpertDevice`
/// Sur Linux, utilise `/etc/machine-id` ou `/var/lib/dbus/machine-id`
/// Sur Windows, utilise `wmic csproduct get UUID`
fn get_machine_uuid() -> Result<String> {
    if let Ok(key) = env::var(ENV_SECRET_KEY) {
        if !key.is_empty() {
            return Ok(key);
        }
    }

    #[cfg(target_os = "macos")]
    {
        let output = std::process::Command::new("ioreg")
            .args(["-d2", "-c", "IOPlatformExpertDevice"])
            .output()?;

        let output_str = String::from_utf8_lossy(&output.stdout);

        // Format: "IOPlatformUUID" = "XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX"
        for line in output_str.lines() {
            if line.contains("IOPlatformUUID") {
                if let Some(uuid) = line.split('"').nth(3) {
                    return Ok(uuid.to_string());
                }
            }
        }

        Err(anyhow!("Failed to extract IOPlatformUUID from ioreg"))
    }

    #[cfg(target_os = "linux")]
    {
        use std::fs;

        if let Ok(uuid) = fs::read_to_string("/etc/machine-id") {
            return Ok(uuid.trim().to_string());
        }

        if let Ok(uuid) = fs::read_to_string("/var/lib/dbus/machine-id") {
            return Ok(uuid.trim().to_string());
        }

        Err(anyhow!(
            "Failed to read machine-id (set {} to provide a key)",
            ENV_SECRET_KEY
        ))
    }

    #[cfg(target_os = "windows")]
    {
        let output = std::process::Command::new("wmic")
            .args(["csproduct", "get", "UUID"])
            .output()?;

        let output_str = String::from_utf8_lossy(&output.stdout);

        // La deuxième ligne contient l'UUID
        if let Some(uuid) = output_str.lines().nth(1) {
            return Ok(uuid.trim().to_string());
        }

        Err(anyhow!("Failed to extract UUID from wmic"))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        Err(anyhow!("Unsupported platform for machine UUID extraction"))
    }
}

/// Dérive une clé AES-256 à partir d'une graine (identifiant machine)
fn derive_key(seed: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(b"soapcall-secret-encryption-v1");

    let mut key = [0u8; 32];
    key.copy_from_slice(&hasher.finalize());
    key
}

fn encrypt_with_seed(password: &str, seed: &str) -> Result<String> {
    let key = derive_key(seed);
    let cipher =
        Aes256Gcm::new_from_slice(&key).map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

    // Nonce dérivé du secret : même secret = même texte chiffré,
    // le fichier config n'est pas réécrit inutilement
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(b"soapcall-nonce-v1");
    let nonce_hash = hasher.finalize();
    let mut nonce_bytes = [0u8; 12];
    nonce_bytes.copy_from_slice(&nonce_hash[..12]);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, password.as_bytes())
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    // Format: nonce(12 bytes) + ciphertext
    let mut combined = Vec::with_capacity(12 + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    Ok(format!(
        "{}{}",
        ENCRYPTED_PREFIX,
        base64::engine::general_purpose::STANDARD.encode(&combined)
    ))
}

fn decrypt_with_seed(encrypted: &str, seed: &str) -> Result<String> {
    let base64_data = encrypted
        .strip_prefix(ENCRYPTED_PREFIX)
        .ok_or_else(|| anyhow!("Invalid encrypted secret format (missing prefix)"))?;

    let key = derive_key(seed);
    let cipher =
        Aes256Gcm::new_from_slice(&key).map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

    let combined = base64::engine::general_purpose::STANDARD
        .decode(base64_data)
        .map_err(|e| anyhow!("Invalid base64: {}", e))?;

    if combined.len() < 12 {
        return Err(anyhow!("Invalid ciphertext (too short)"));
    }

    let nonce = Nonce::from_slice(&combined[..12]);
    let plaintext = cipher
        .decrypt(nonce, &combined[12..])
        .map_err(|e| anyhow!("Decryption failed (wrong machine or corrupted data): {}", e))?;

    String::from_utf8(plaintext).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
}

/// Chiffre un secret avec la clé dérivée de la machine
///
/// # Returns
///
/// Le secret chiffré au format "encrypted:BASE64"
/// (nonce de 12 octets suivi du texte chiffré)
pub fn encrypt_password(password: &str) -> Result<String> {
    encrypt_with_seed(password, &get_machine_uuid()?)
}

/// Déchiffre un secret au format "encrypted:BASE64"
///
/// # Errors
///
/// Retourne une erreur si le format est invalide ou si le déchiffrement échoue
pub fn decrypt_password(encrypted: &str) -> Result<String> {
    decrypt_with_seed(encrypted, &get_machine_uuid()?)
}

/// Vérifie si une valeur est un secret chiffré
pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(ENCRYPTED_PREFIX)
}

/// Obtient le secret en clair, qu'il soit chiffré ou non
///
/// - Si la valeur commence par "encrypted:", elle est déchiffrée
/// - Sinon, elle est retournée telle quelle
pub fn get_password(value: &str) -> Result<String> {
    if is_encrypted(value) {
        decrypt_password(value)
    } else {
        Ok(value.to_string())
    }
}
