use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::specialists::SpecialistKind;

const ORCHESTRATOR: &str = include_str!("../prompts/orchestrator.md");
const CATALOG: &str = include_str!("../prompts/catalog.md");
const ORDER: &str = include_str!("../prompts/order.md");
const WM: &str = include_str!("../prompts/wm.md");
const IMAGE_PROCESSOR: &str = include_str!("../prompts/image_processor.md");

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("failed to read prompt `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("prompt `{0}` is empty")]
    Empty(PathBuf),
}

/// System prompts for the orchestrator and each specialist.
///
/// Defaults are compiled in. A prompts directory may override any of them
/// with a `<name>.md` file; files that are absent keep the default.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptLibrary {
    orchestrator: String,
    catalog: String,
    order: String,
    wm: String,
    image_processor: String,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self {
            orchestrator: ORCHESTRATOR.to_string(),
            catalog: CATALOG.to_string(),
            order: ORDER.to_string(),
            wm: WM.to_string(),
            image_processor: IMAGE_PROCESSOR.to_string(),
        }
    }
}

impl PromptLibrary {
    pub async fn load(dir: Option<&Path>) -> Result<Self, PromptError> {
        let mut library = Self::default();
        let Some(dir) = dir else {
            return Ok(library);
        };

        for (name, slot) in [
            ("orchestrator", &mut library.orchestrator),
            ("catalog", &mut library.catalog),
            ("order", &mut library.order),
            ("wm", &mut library.wm),
            ("image_processor", &mut library.image_processor),
        ] {
            let path = dir.join(format!("{name}.md"));
            match tokio::fs::read_to_string(&path).await {
                Ok(text) if text.trim().is_empty() => return Err(PromptError::Empty(path)),
                Ok(text) => {
                    info!(event_name = "prompts.override", prompt = name, path = %path.display(), "using prompt override");
                    *slot = text;
                }
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(PromptError::Read { path, source }),
            }
        }

        Ok(library)
    }

    pub fn orchestrator(&self) -> &str {
        &self.orchestrator
    }

    pub fn for_specialist(&self, kind: SpecialistKind) -> &str {
        match kind {
            SpecialistKind::Catalog => &self.catalog,
            SpecialistKind::Order => &self.order,
            SpecialistKind::Warehouse => &self.wm,
            SpecialistKind::ImageProcessor => &self.image_processor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PromptError, PromptLibrary};
    use crate::specialists::SpecialistKind;

    #[test]
    fn embedded_prompts_are_distinct() {
        let library = PromptLibrary::default();
        let mut prompts: Vec<&str> =
            SpecialistKind::ALL.iter().map(|kind| library.for_specialist(*kind)).collect();
        prompts.push(library.orchestrator());
        prompts.sort_unstable();
        prompts.dedup();

        assert_eq!(prompts.len(), 5);
        assert!(library.orchestrator().contains("order proposal"));
    }

    #[tokio::test]
    async fn directory_overrides_only_present_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("wm.md"), "Only Tuesday deliveries.").expect("write");

        let library = PromptLibrary::load(Some(dir.path())).await.expect("load");
        assert_eq!(library.for_specialist(SpecialistKind::Warehouse), "Only Tuesday deliveries.");
        assert_eq!(
            library.for_specialist(SpecialistKind::Catalog),
            PromptLibrary::default().for_specialist(SpecialistKind::Catalog)
        );
    }

    #[tokio::test]
    async fn blank_override_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("catalog.md"), "  \n").expect("write");

        let error = PromptLibrary::load(Some(dir.path())).await.expect_err("blank prompt");
        assert!(matches!(error, PromptError::Empty(_)));
    }
}
