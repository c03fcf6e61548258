use anyhow::{
    Context,
    Result,
    anyhow,
};
use chrono::Utc;
use serde::{
    Deserialize,
    Serialize,
};
use sha2::{
    Digest,
    Sha256,
};
use std::{
    fmt,
    fs,
    io::Write,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Dev,
    Test,
    Local,
}

impl DeploymentEnv {
    pub const ALL: [DeploymentEnv; 3] =
        [DeploymentEnv::Dev, DeploymentEnv::Test, DeploymentEnv::Local];

    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::Dev => "dev",
            DeploymentEnv::Test => "test",
            DeploymentEnv::Local => "local",
        }
    }

    /// Cluster query parameter understood by the Solana explorer.
    pub fn explorer_cluster(self) -> &'static str {
        match self {
            DeploymentEnv::Dev => "devnet",
            DeploymentEnv::Test => "testnet",
            DeploymentEnv::Local => "custom",
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::Dev => "Devnet",
            DeploymentEnv::Test => "Testnet",
            DeploymentEnv::Local => "Local",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub deployed_at: String,
    pub program_id: String,
    pub bytecode_hash: String,
    pub network_url: String,
    #[serde(default)]
    pub game_account: Option<String>,
    #[serde(default)]
    pub treasury_account: Option<String>,
    #[serde(default)]
    pub treasury_mint: Option<String>,
    #[serde(default)]
    pub deposit_signature: Option<String>,
}

impl DeploymentRecord {
    pub fn new(
        program_id: impl Into<String>,
        bytecode_hash: impl Into<String>,
        network_url: impl Into<String>,
    ) -> Self {
        Self {
            deployed_at: Utc::now().to_rfc3339(),
            program_id: program_id.into(),
            bytecode_hash: bytecode_hash.into(),
            network_url: network_url.into(),
            game_account: None,
            treasury_account: None,
            treasury_mint: None,
            deposit_signature: None,
        }
    }

    pub fn is_compatible_with_hash(&self, hash: &str) -> bool {
        self.bytecode_hash == hash
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(env: DeploymentEnv) -> Result<Self> {
        Self::in_root(DEPLOYMENTS_ROOT, env)
    }

    pub fn in_root(root: impl AsRef<Path>, env: DeploymentEnv) -> Result<Self> {
        let path = ensure_store(root.as_ref(), env)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<DeploymentRecord>> {
        read_records(&self.path)
    }

    pub fn latest(&self) -> Result<Option<DeploymentRecord>> {
        Ok(self.load()?.pop())
    }

    pub fn append(&self, record: DeploymentRecord) -> Result<()> {
        let mut records = self.load()?;
        records.push(record);
        write_records(&self.path, &records)
    }
}

/// Latest record for `env` without creating anything when no deployment has
/// been recorded yet.
pub fn read_latest(env: DeploymentEnv) -> Result<Option<DeploymentRecord>> {
    read_latest_in(DEPLOYMENTS_ROOT, env)
}

pub fn read_latest_in(
    root: impl AsRef<Path>,
    env: DeploymentEnv,
) -> Result<Option<DeploymentRecord>> {
    let path = root.as_ref().join(env.dir_name()).join(DEPLOYMENTS_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    Ok(read_records(&path)?.pop())
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn ensure_structure() -> Result<()> {
    for env in DeploymentEnv::ALL {
        let _ = ensure_store(Path::new(DEPLOYMENTS_ROOT), env)?;
    }
    Ok(())
}

fn ensure_store(root: &Path, env: DeploymentEnv) -> Result<PathBuf> {
    if !root.exists() {
        fs::create_dir_all(root).with_context(|| {
            format!("Failed to create deployments directory {}", root.display())
        })?;
    }

    let env_dir = root.join(env.dir_name());
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).with_context(|| {
            format!("Failed to create {}/{} directory", root.display(), env.dir_name())
        })?;
    }

    let file_path = env_dir.join(DEPLOYMENTS_FILE);
    if !file_path.exists() {
        let mut file = fs::File::create(&file_path).with_context(|| {
            format!(
                "Failed to create deployment record file for {} at {:?}",
                env, file_path
            )
        })?;
        file.write_all(b"[]").with_context(|| {
            format!("Failed to initialize deployment record file for {}", env)
        })?;
    }

    Ok(file_path)
}

fn read_records(path: impl AsRef<Path>) -> Result<Vec<DeploymentRecord>> {
    let data = fs::read(path.as_ref()).context("Failed to read deployment records")?;
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    if let Ok(records) = serde_json::from_slice::<Vec<DeploymentRecord>>(&data) {
        return Ok(records);
    }
    if let Ok(record) = serde_json::from_slice::<DeploymentRecord>(&data) {
        return Ok(vec![record]);
    }
    Err(anyhow!(
        "Failed to parse deployment records JSON; expected a list of deployments"
    ))
}

fn write_records(path: impl AsRef<Path>, records: &[DeploymentRecord]) -> Result<()> {
    let json = serde_json::to_vec_pretty(records)
        .context("Failed to serialize deployment records")?;
    fs::write(path.as_ref(), json).context("Failed to write deployment records")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn in_root__creates_empty_record_list() {
        // given
        let dir = TempDir::new("deployments").unwrap();

        // when
        let store = DeploymentStore::in_root(dir.path(), DeploymentEnv::Local).unwrap();

        // then
        assert!(store.path().ends_with("local/deployments.json"));
        assert_eq!(store.load().unwrap(), Vec::new());
        assert_eq!(store.latest().unwrap(), None);
    }

    #[test]
    fn append__latest_returns_most_recent_record() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::in_root(dir.path(), DeploymentEnv::Dev).unwrap();
        let first = DeploymentRecord::new("prog-a", "hash-a", "http://localhost:8899");
        let mut second = DeploymentRecord::new("prog-b", "hash-b", "http://localhost:8899");
        second.game_account = Some("game".to_string());

        // when
        store.append(first.clone()).unwrap();
        store.append(second.clone()).unwrap();

        // then
        assert_eq!(store.load().unwrap(), vec![first, second.clone()]);
        assert_eq!(store.latest().unwrap(), Some(second));
    }

    #[test]
    fn load__accepts_a_single_record_object() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::in_root(dir.path(), DeploymentEnv::Test).unwrap();
        let record = DeploymentRecord::new("prog", "hash", "https://api.testnet.solana.com");
        fs::write(store.path(), serde_json::to_vec(&record).unwrap()).unwrap();

        // when
        let loaded = store.load().unwrap();

        // then
        assert_eq!(loaded, vec![record]);
    }

    #[test]
    fn load__rejects_garbage() {
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::in_root(dir.path(), DeploymentEnv::Test).unwrap();
        fs::write(store.path(), b"{not json").unwrap();

        assert!(store.load().is_err());
    }

    #[test]
    fn read_latest_in__missing_store_is_empty_and_not_created() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let root = dir.path().join(DEPLOYMENTS_ROOT);

        // when
        let latest = read_latest_in(&root, DeploymentEnv::Dev).unwrap();

        // then
        assert_eq!(latest, None);
        assert!(!root.exists());
    }

    #[test]
    fn read_latest_in__returns_last_appended_record() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::in_root(dir.path(), DeploymentEnv::Local).unwrap();
        let record = DeploymentRecord::new("prog", "hash", "http://127.0.0.1:8899");
        store.append(record.clone()).unwrap();

        // when
        let latest = read_latest_in(dir.path(), DeploymentEnv::Local).unwrap();

        // then
        assert_eq!(latest, Some(record));
    }

    #[test]
    fn hash_bytes__is_sha256_hex() {
        // when
        let hash = hash_bytes(b"abc");

        // then
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        let record = DeploymentRecord::new("prog", hash.clone(), "url");
        assert!(record.is_compatible_with_hash(&hash));
    }
}
