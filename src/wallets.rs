use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
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

/// Passing this instead of a path reads a seed phrase from the terminal.
pub const PROMPT_KEYPAIR: &str = "prompt";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum KeypairSource {
    File(PathBuf),
    Prompt,
}

impl KeypairSource {
    pub fn resolve(raw: Option<&str>) -> Result<Self> {
        match raw {
            Some(PROMPT_KEYPAIR) => Ok(KeypairSource::Prompt),
            Some(raw) => Ok(KeypairSource::File(expand_path(raw))),
            None => default_keypair_path().map(KeypairSource::File),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            KeypairSource::File(path) => path.display().to_string(),
            KeypairSource::Prompt => String::from("seed phrase"),
        }
    }

    /// Whether loading would find something. Prompts always can.
    pub fn is_available(&self) -> bool {
        match self {
            KeypairSource::File(path) => path.is_file(),
            KeypairSource::Prompt => true,
        }
    }

    pub fn load(&self) -> Result<Keypair> {
        match self {
            KeypairSource::File(path) => load_keypair_file(path),
            KeypairSource::Prompt => prompt_seed_phrase(),
        }
    }
}

pub fn default_keypair_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("solana")
        .join("id.json"))
}

pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

pub fn load_keypair_file(path: &Path) -> Result<Keypair> {
    read_keypair_file(path)
        .map_err(|e| eyre!("Failed to read keypair {}: {e}", path.display()))
}

fn prompt_seed_phrase() -> Result<Keypair> {
    let phrase = prompt_password("Enter seed phrase: ")
        .wrap_err("Failed to read seed phrase")?;
    let word_count = phrase.split_whitespace().count();
    if word_count < 12 {
        return Err(eyre!(
            "Seed phrase has {word_count} words, expected at least 12"
        ));
    }
    let passphrase = prompt_password("Enter passphrase (empty for none): ")
        .wrap_err("Failed to read passphrase")?;
    keypair_from_seed_phrase_and_passphrase(phrase.trim(), &passphrase)
        .map_err(|e| eyre!("Seed phrase did not produce a keypair: {e}"))
}
