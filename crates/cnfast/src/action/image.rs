//! Image action builder: `docker pull|push|build` with the image reference
//! routed through the endpoint's registry mapping.

use super::{ensure_supported, redaction_token, ActionBuilder, Invocation, Retag};
use crate::endpoint::Endpoint;
use crate::error::ActionError;
use crate::rewrite::RewriteTable;
use crate::runner::CommandSpec;

pub const SUPPORTED: &[&str] = &["pull", "push", "build"];

/// The image-management CLI.
pub const IMAGE_TOOL: &str = "docker";

/// Flags of `pull`/`push` that consume the following argument.
const VALUE_FLAGS: &[&str] = &["--platform"];

/// A validated `cnfast docker …` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAction {
    subcommand: String,
    args: Vec<String>,
    /// Position of the image reference in `args`; `None` for `build`.
    image_index: Option<usize>,
}

impl ImageAction {
    pub fn new(subcommand: &str, args: &[String]) -> Result<Self, ActionError> {
        ensure_supported("docker", subcommand, SUPPORTED)?;

        let image_index = match subcommand {
            "pull" | "push" => {
                Some(image_position(args).ok_or(ActionError::MissingArgument("<image>"))?)
            }
            _ => None,
        };

        Ok(Self {
            subcommand: subcommand.to_string(),
            args: args.to_vec(),
            image_index,
        })
    }

    /// Shorthand for `docker pull <image>`.
    pub fn pull(image: &str) -> Self {
        Self {
            subcommand: "pull".to_string(),
            args: vec![image.to_string()],
            image_index: Some(0),
        }
    }

    /// The image reference as the user wrote it.
    pub fn image(&self) -> Option<&str> {
        self.image_index.map(|i| self.args[i].as_str())
    }
}

/// Index of the first positional argument, skipping flags and flag values.
fn image_position(args: &[String]) -> Option<usize> {
    let mut skip_value = false;
    for (i, arg) in args.iter().enumerate() {
        if skip_value {
            skip_value = false;
            continue;
        }
        if arg.starts_with('-') {
            skip_value = VALUE_FLAGS.contains(&arg.as_str());
            continue;
        }
        return Some(i);
    }
    None
}

fn docker(args: Vec<String>) -> CommandSpec {
    CommandSpec::new(IMAGE_TOOL, args)
}

impl ActionBuilder for ImageAction {
    fn label(&self) -> String {
        match self.image() {
            Some(image) => format!("docker {} {image}", self.subcommand),
            None => format!("docker {}", self.subcommand),
        }
    }

    fn build(&self, endpoint: &Endpoint) -> Result<Invocation, ActionError> {
        let mut args = self.args.clone();
        let mut retag = None;

        if let Some(index) = self.image_index {
            let table = RewriteTable::new(endpoint.host());
            let original = &self.args[index];
            let routed = table.rewrite_image(original);

            if routed != *original {
                tracing::debug!(original = %original, "Routing image reference");
                if self.subcommand == "pull" {
                    retag = Some(Retag {
                        tag: docker(vec!["tag".to_string(), routed.clone(), original.clone()]),
                        cleanup: docker(vec!["rmi".to_string(), routed.clone()]),
                    });
                }
            }
            args[index] = routed;
        }

        args.insert(0, self.subcommand.clone());

        Ok(Invocation {
            command: docker(args),
            redact: redaction_token(endpoint),
            retag,
        })
    }
}
