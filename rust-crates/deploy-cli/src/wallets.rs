use anyhow::{
    Context,
    Result,
};
use rpassword::prompt_password;
use solana_sdk::signature::{
    Keypair,
    keypair_from_seed_phrase_and_passphrase,
    read_keypair_file,
};
use std::path::{
    Path,
    PathBuf,
};

/// `--keypair prompt` reads a seed phrase instead of a file.
pub const PROMPT_KEYPAIR: &str = "prompt";

pub fn default_keypair_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("solana")
        .join("id.json"))
}

/// `None` means the keypair comes from a seed phrase prompt.
pub fn resolve_keypair_path(raw: Option<&str>) -> Result<Option<PathBuf>> {
    match raw {
        Some(PROMPT_KEYPAIR) => Ok(None),
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(Some(PathBuf::from(expanded.into_owned())))
        }
        None => default_keypair_path().map(Some),
    }
}

pub fn load_keypair(path: &Path) -> Result<Keypair> {
    read_keypair_file(path)
        .map_err(|e| anyhow::anyhow!("Failed to read keypair {}: {e}", path.display()))
}

pub fn unlock_owner(raw: Option<&str>) -> Result<Keypair> {
    match resolve_keypair_path(raw)? {
        Some(path) => load_keypair(&path),
        None => prompt_keypair(),
    }
}

fn prompt_keypair() -> Result<Keypair> {
    let phrase = prompt_password("Enter seed phrase: ").context("Failed to read seed phrase")?;
    let word_count = phrase.split_whitespace().count();
    if word_count < 12 {
        anyhow::bail!("Seed phrase has {word_count} words, expected at least 12");
    }
    let passphrase = prompt_password("Enter passphrase (empty for none): ")
        .context("Failed to read passphrase")?;
    keypair_from_seed_phrase_and_passphrase(phrase.trim(), &passphrase)
        .map_err(|e| anyhow::anyhow!("Seed phrase did not produce a keypair: {e}"))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use solana_sdk::signature::{
        Signer,
        write_keypair_file,
    };
    use tempdir::TempDir;

    #[test]
    fn resolve_keypair_path__prompt_has_no_path() {
        assert_eq!(resolve_keypair_path(Some(PROMPT_KEYPAIR)).unwrap(), None);
    }

    #[test]
    fn resolve_keypair_path__defaults_to_solana_config() {
        let path = resolve_keypair_path(None).unwrap().unwrap();
        assert!(path.ends_with(".config/solana/id.json"));
    }

    #[test]
    fn unlock_owner__reads_keypair_file() {
        // given
        let dir = TempDir::new("deploy-wallets").unwrap();
        let path = dir.path().join("owner.json");
        let keypair = Keypair::new();
        write_keypair_file(&keypair, &path).unwrap();

        // when
        let owner = unlock_owner(path.to_str()).unwrap();

        // then
        assert_eq!(owner.pubkey(), keypair.pubkey());
    }

    #[test]
    fn unlock_owner__missing_file_fails() {
        let dir = TempDir::new("deploy-wallets").unwrap();
        let path = dir.path().join("missing.json");
        assert!(unlock_owner(path.to_str()).is_err());
    }
}
