//! Discovery and loading of deployable units from the build directory.
//!
//! Every unit consists of a deploy descriptor (`<name>.deploy.json`)
//! declaring its initial data and optional init message, and the compiled
//! code artifact (`<name>.compiled.json`) produced by the contract build.
//! Descriptors are plain data implementing [`InitStateSource`] instead of
//! executable modules, so a unit's init contract is validated up front,
//! before anything touches the network.

use {
    anyhow::{Context, Result, anyhow, bail},
    base64::{Engine, engine::general_purpose::STANDARD},
    serde::{Deserialize, Deserializer},
    std::{fs, path::Path, sync::Arc},
    ton::{Cell, boc},
};

/// The init-state capability every deployable unit has to provide.
pub trait InitStateSource {
    /// The contract's initial data cell.
    fn init_data(&self) -> Result<Arc<Cell>>;

    /// The optional message delivered along with the deployment.
    fn init_message(&self) -> Result<Option<Arc<Cell>>>;
}

/// One contract ready for deployment: its compiled code paired with the
/// initial state produced by its descriptor.
#[derive(Debug)]
pub struct DeployableUnit {
    pub name: String,
    pub code: Arc<Cell>,
    pub init_data: Arc<Cell>,
    pub init_message: Option<Arc<Cell>>,
}

impl DeployableUnit {
    pub fn load(
        name: impl Into<String>,
        code: Arc<Cell>,
        source: &dyn InitStateSource,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            code,
            init_data: source.init_data()?,
            init_message: source.init_message()?,
        })
    }
}

/// Enumerates all deployable units under `build_dir`, in sorted order.
///
/// Fails on the first descriptor that does not fulfill the init contract or
/// misses its compiled artifact; a broken build should stop the run before
/// any transaction goes out.
pub fn discover(build_dir: &Path) -> Result<Vec<DeployableUnit>> {
    let pattern = build_dir.join("*.deploy.json");
    let pattern = pattern
        .to_str()
        .with_context(|| format!("non-unicode build directory {build_dir:?}"))?;
    let mut units = Vec::new();
    for entry in glob::glob(pattern).context("listing deploy descriptors")? {
        units.push(load_unit(&entry?)?);
    }
    Ok(units)
}

fn load_unit(descriptor_path: &Path) -> Result<DeployableUnit> {
    let name = unit_name(descriptor_path)?;
    let raw = fs::read_to_string(descriptor_path)
        .with_context(|| format!("reading '{}'", descriptor_path.display()))?;
    let descriptor: DeployDescriptor = serde_json::from_str(&raw)
        .with_context(|| format!("parsing '{}'", descriptor_path.display()))?;
    if descriptor.init_data.is_none() {
        bail!(
            "'{}' does not define initData",
            descriptor_path.display()
        );
    }
    if descriptor.init_message.is_none() {
        bail!(
            "'{}' does not define initMessage",
            descriptor_path.display()
        );
    }

    let artifact_path = descriptor_path.with_file_name(format!("{name}.compiled.json"));
    if !artifact_path.exists() {
        bail!("'{}' not found, did you build?", artifact_path.display());
    }
    let raw = fs::read_to_string(&artifact_path)
        .with_context(|| format!("reading '{}'", artifact_path.display()))?;
    let artifact: CompiledArtifact = serde_json::from_str(&raw)
        .with_context(|| format!("parsing '{}'", artifact_path.display()))?;
    let code = hex::decode(&artifact.hex)
        .map_err(anyhow::Error::from)
        .and_then(|bytes| Ok(boc::read(&bytes)?))
        .with_context(|| format!("decoding code from '{}'", artifact_path.display()))?;

    DeployableUnit::load(&name, code, &descriptor)
        .with_context(|| format!("loading init state from '{}'", descriptor_path.display()))
}

/// `counter.deploy.json` names the unit `counter`.
fn unit_name(descriptor_path: &Path) -> Result<String> {
    descriptor_path
        .file_stem()
        .map(Path::new)
        .and_then(Path::file_stem)
        .and_then(|stem| stem.to_str())
        .map(str::to_owned)
        .with_context(|| format!("malformed descriptor name '{}'", descriptor_path.display()))
}

/// The on-disk deploy descriptor.
///
/// Both keys have to be present; `initMessage` may be explicitly `null` for
/// contracts deployed without an init payload.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeployDescriptor {
    init_data: Option<String>,
    #[serde(default, deserialize_with = "present")]
    init_message: Option<Option<String>>,
}

/// Wraps a present-but-possibly-null field so that it can be told apart
/// from a missing one.
fn present<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Option<String>>, D::Error> {
    Deserialize::deserialize(deserializer).map(Some)
}

impl InitStateSource for DeployDescriptor {
    fn init_data(&self) -> Result<Arc<Cell>> {
        let blob = self
            .init_data
            .as_ref()
            .ok_or_else(|| anyhow!("missing initData"))?;
        decode_cell(blob).context("decoding initData")
    }

    fn init_message(&self) -> Result<Option<Arc<Cell>>> {
        match self.init_message.as_ref().and_then(Option::as_ref) {
            Some(blob) => Ok(Some(decode_cell(blob).context("decoding initMessage")?)),
            None => Ok(None),
        }
    }
}

fn decode_cell(blob: &str) -> Result<Arc<Cell>> {
    let bytes = STANDARD.decode(blob).context("invalid base64")?;
    Ok(boc::read(&bytes)?)
}

/// The compiled-code artifact written by the contract build.
#[derive(Deserialize)]
struct CompiledArtifact {
    hex: String,
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::fs,
        tempfile::TempDir,
        ton::{CellBuilder, boc},
    };

    fn cell(value: u64) -> Arc<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_uint(value, 32).unwrap();
        Arc::new(builder.build().unwrap())
    }

    fn write_unit(dir: &Path, name: &str, init_message: &str) {
        let init_data = STANDARD.encode(boc::write(&cell(1)));
        fs::write(
            dir.join(format!("{name}.deploy.json")),
            format!(r#"{{"initData":"{init_data}","initMessage":{init_message}}}"#),
        )
        .unwrap();
        let code = hex::encode(boc::write(&cell(2)));
        fs::write(
            dir.join(format!("{name}.compiled.json")),
            format!(r#"{{"hex":"{code}"}}"#),
        )
        .unwrap();
    }

    #[test]
    fn discovers_units_in_sorted_order() {
        let dir = TempDir::new().unwrap();
        write_unit(dir.path(), "token", "null");
        write_unit(dir.path(), "counter", "null");

        let units = discover(dir.path()).unwrap();
        let names: Vec<_> = units.iter().map(|unit| unit.name.as_str()).collect();
        assert_eq!(names, ["counter", "token"]);
        assert_eq!(units[0].code.repr_hash(), cell(2).repr_hash());
        assert_eq!(units[0].init_data.repr_hash(), cell(1).repr_hash());
        assert!(units[0].init_message.is_none());
    }

    #[test]
    fn loads_init_messages_when_present() {
        let dir = TempDir::new().unwrap();
        let message = STANDARD.encode(boc::write(&cell(3)));
        write_unit(dir.path(), "counter", &format!(r#""{message}""#));

        let units = discover(dir.path()).unwrap();
        let init_message = units[0].init_message.as_ref().unwrap();
        assert_eq!(init_message.repr_hash(), cell(3).repr_hash());
    }

    #[test]
    fn missing_init_data_fails_naming_the_descriptor() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("broken.deploy.json"),
            r#"{"initMessage":null}"#,
        )
        .unwrap();

        let error = format!("{:#}", discover(dir.path()).unwrap_err());
        assert!(error.contains("initData"), "{error}");
        assert!(error.contains("broken.deploy.json"), "{error}");
    }

    #[test]
    fn missing_init_message_key_fails() {
        let dir = TempDir::new().unwrap();
        let init_data = STANDARD.encode(boc::write(&cell(1)));
        fs::write(
            dir.path().join("broken.deploy.json"),
            format!(r#"{{"initData":"{init_data}"}}"#),
        )
        .unwrap();

        let error = format!("{:#}", discover(dir.path()).unwrap_err());
        assert!(error.contains("initMessage"), "{error}");
    }

    #[test]
    fn missing_compiled_artifact_asks_for_a_build() {
        let dir = TempDir::new().unwrap();
        let init_data = STANDARD.encode(boc::write(&cell(1)));
        fs::write(
            dir.path().join("counter.deploy.json"),
            format!(r#"{{"initData":"{init_data}","initMessage":null}}"#),
        )
        .unwrap();

        let error = format!("{:#}", discover(dir.path()).unwrap_err());
        assert!(error.contains("did you build?"), "{error}");
        assert!(error.contains("counter.compiled.json"), "{error}");
    }

    #[test]
    fn empty_build_directories_yield_no_units() {
        let dir = TempDir::new().unwrap();
        assert!(discover(dir.path()).unwrap().is_empty());
    }
}
