//! Host application workflows

use crate::error::{RegistryError, Result};
use crate::registry::{Registry, SharedEntity};
use shotpath_entity::{Entity, HostApplication, WorkFile};
use std::sync::Arc;

/// Shared entity of the document open in `host`
///
/// # Errors
/// Returns error if nothing is open or the path is not recognised
pub fn current_entity(registry: &mut Registry, host: &dyn HostApplication) -> Result<SharedEntity> {
    let path = host.current_path()?;
    registry.resolve(&path)
}

/// Work file the open document belongs to
///
/// An open increment maps to the work file it was saved from.
///
/// # Errors
/// `NotAWorkFile` if the document is some other kind
pub fn current_work_file(
    registry: &mut Registry,
    host: &dyn HostApplication,
) -> Result<Arc<WorkFile>> {
    match current_entity(registry, host)? {
        SharedEntity::WorkFile(work) => Ok(work),
        SharedEntity::Increment(increment) => registry.work_of(&increment),
        other => Err(RegistryError::NotAWorkFile {
            kind: other.kind(),
            path: other.path().clone(),
        }),
    }
}

/// Save the open document as the next version of its work file
///
/// Only the path is computed here; writing the artifact is the host's job.
///
/// # Errors
/// Returns error if the document is not a work file, the next version does
/// not fit the grammar, or the host fails to save
pub fn save_next_version(
    registry: &mut Registry,
    host: &mut dyn HostApplication,
) -> Result<Arc<WorkFile>> {
    let work = current_work_file(registry, host)?;
    let next = registry.next(work.as_ref())?;
    host.save_as(next.path())?;
    tracing::info!(from = %work.path(), to = %next.path(), "saved next version");
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CatalogueConfig;
    use shotpath_entity::HostError;
    use shotpath_template::{CanonicalPath, EntityKind};
    use shotpath_test_utils::{ProjectFixture, SHOT};

    /// Host that records saves and creates the saved file
    struct FakeHost {
        current: Option<CanonicalPath>,
        saved: Vec<CanonicalPath>,
    }

    impl HostApplication for FakeHost {
        fn current_path(&self) -> std::result::Result<CanonicalPath, HostError> {
            self.current.clone().ok_or(HostError::NoDocument)
        }

        fn save_as(&mut self, path: &CanonicalPath) -> std::result::Result<(), HostError> {
            std::fs::write(path.to_path_buf(), "").map_err(|e| HostError::SaveFailed {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            self.saved.push(path.clone());
            self.current = Some(path.clone());
            Ok(())
        }
    }

    fn setup() -> (ProjectFixture, Registry) {
        let fx = ProjectFixture::new();
        let registry = Registry::new(CatalogueConfig::new().with_root(fx.root().clone())).unwrap();
        (fx, registry)
    }

    #[test]
    fn save_next_version_advances_the_host() {
        let (fx, mut registry) = setup();
        let v1 = fx.shot_work_file("blocking", 1);
        fx.shot_work_file("blocking", 4);
        let mut host = FakeHost {
            current: Some(v1),
            saved: Vec::new(),
        };

        let next = save_next_version(&mut registry, &mut host).unwrap();
        assert_eq!(next.version(), 5);
        assert!(next.exists());
        assert_eq!(host.saved, vec![next.path().clone()]);

        let again = save_next_version(&mut registry, &mut host).unwrap();
        assert_eq!(again.version(), 6);
    }

    #[test]
    fn open_increment_saves_next_work_version() {
        let (fx, mut registry) = setup();
        fx.shot_work_file("blocking", 2);
        let increment = fx.touch(&format!("{SHOT}/anim/work/maya/sh010_anim_blocking_v002.0003.ma"));
        let mut host = FakeHost {
            current: Some(increment),
            saved: Vec::new(),
        };

        let next = save_next_version(&mut registry, &mut host).unwrap();
        assert_eq!(next.version(), 3);
    }

    #[test]
    fn other_documents_are_rejected() {
        let (fx, mut registry) = setup();
        let mut host = FakeHost {
            current: Some(fx.path(SHOT)),
            saved: Vec::new(),
        };
        assert!(matches!(
            save_next_version(&mut registry, &mut host),
            Err(RegistryError::NotAWorkFile {
                kind: EntityKind::EntityRoot,
                ..
            })
        ));
        assert!(host.saved.is_empty());

        host.current = None;
        assert!(matches!(
            current_entity(&mut registry, &host),
            Err(RegistryError::Host(HostError::NoDocument))
        ));
    }
}
