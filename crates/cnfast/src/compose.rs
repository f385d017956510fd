//! `docker-compose` / `docker compose`: pull every service image of a
//! compose file through the image builder.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::ActionError;

/// Compose file names probed in order when `-f` is not given.
const DEFAULT_FILES: &[&str] = &[
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("no compose file found (looked for {})", DEFAULT_FILES.join(", "))]
    NotFound,

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{0} declares no images")]
    NoImages(PathBuf),

    #[error(transparent)]
    Action(#[from] ActionError),
}

/// Pick the compose file: the value of `-f`/`--file`, else the first
/// default name that exists under `dir`.
pub fn locate(dir: &Path, args: &[String]) -> Result<PathBuf, ComposeError> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "-f" || arg == "--file" {
            let value = iter
                .next()
                .ok_or(ActionError::MissingArgument("<compose file>"))?;
            return Ok(dir.join(value));
        }
        if let Some(value) = arg.strip_prefix("--file=") {
            return Ok(dir.join(value));
        }
    }

    DEFAULT_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
        .ok_or(ComposeError::NotFound)
}

/// Top-level compose document. Only `services` matters here.
#[derive(Debug, Deserialize)]
struct ComposeFile {
    #[serde(default)]
    services: Option<Mapping>,
}

#[derive(Debug, Deserialize)]
struct Service {
    #[serde(default)]
    image: Option<String>,
}

/// Read `path` and collect its images.
pub fn load_images(path: &Path) -> Result<Vec<String>, ComposeError> {
    let text = std::fs::read_to_string(path).map_err(|source| ComposeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let images = extract_images(&text).map_err(|source| ComposeError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if images.is_empty() {
        return Err(ComposeError::NoImages(path.to_path_buf()));
    }
    Ok(images)
}

/// Distinct service images in file order.
///
/// Anchors, aliases and `<<` merge keys are resolved before the services are
/// read. Values with `${…}` interpolation are skipped since they cannot be
/// pulled as written.
pub fn extract_images(text: &str) -> Result<Vec<String>, serde_yaml::Error> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut document: Value = serde_yaml::from_str(text)?;
    document.apply_merge()?;

    let services = serde_yaml::from_value::<Option<ComposeFile>>(document)?
        .and_then(|file| file.services)
        .unwrap_or_default();

    let mut images: Vec<String> = Vec::new();
    for (name, service) in services {
        let Some(service) = serde_yaml::from_value::<Option<Service>>(service)? else {
            continue;
        };
        let Some(image) = service.image.filter(|i| !i.is_empty()) else {
            tracing::debug!(service = ?name, "Service has no image");
            continue;
        };
        if image.contains("${") {
            tracing::warn!(image = %image, "Skipping interpolated image reference");
            continue;
        }
        if !images.contains(&image) {
            images.push(image);
        }
    }
    Ok(images)
}
