//! Institution registry: read-only lookup from `schacHome` to [`Institution`].

use crate::error::BrokerError;
use crate::models::{Institution, InstitutionConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    institutions: Vec<InstitutionConfig>,
}

/// In-memory registry, built once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    institutions: HashMap<String, Institution>,
}

impl ServiceRegistry {
    /// Read and validate the registry file. Any unreadable file, unparseable
    /// document or invalid record fails the whole load.
    pub fn load(path: &Path) -> Result<Self, BrokerError> {
        let document: RegistryDocument =
            service_core::config::load_document(path).map_err(|e| {
                BrokerError::Configuration(format!(
                    "Unable to read service registry {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let registry = Self::from_configs(document.institutions)?;
        tracing::info!(
            path = %path.display(),
            institutions = registry.institutions.len(),
            "Service registry loaded"
        );
        Ok(registry)
    }

    pub fn from_configs(configs: Vec<InstitutionConfig>) -> Result<Self, BrokerError> {
        let mut institutions = HashMap::with_capacity(configs.len());
        for config in configs {
            let institution = Institution::try_from(config)?;
            if institutions.contains_key(&institution.schac_home) {
                return Err(BrokerError::Configuration(format!(
                    "Duplicate institution {} in service registry",
                    institution.schac_home
                )));
            }
            institutions.insert(institution.schac_home.clone(), institution);
        }
        Ok(Self { institutions })
    }

    /// Case-sensitive exact match on `schacHome`.
    pub fn find_institution_by_schac_home(&self, schac_home: &str) -> Option<&Institution> {
        self.institutions.get(schac_home)
    }

    pub fn lookup(&self, schac_home: &str) -> Result<&Institution, BrokerError> {
        tracing::debug!(schac_home = %schac_home, "Lookup institution in service registry");
        self.find_institution_by_schac_home(schac_home)
            .ok_or_else(|| {
                let err = BrokerError::NotFound(schac_home.to_string());
                tracing::error!("{}", err);
                err
            })
    }

    /// All institutions, ordered by `schacHome`.
    pub fn institutions(&self) -> Vec<&Institution> {
        let mut all: Vec<&Institution> = self.institutions.values().collect();
        all.sort_by(|a, b| a.schac_home.cmp(&b.schac_home));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::institution::test_config;
    use crate::models::CourseAuthenticationMode;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name)
    }

    #[test]
    fn test_load_fixture() {
        let registry = ServiceRegistry::load(&fixture("service-registry.yaml")).unwrap();

        let utrecht = registry.lookup("utrecht.nl").unwrap();
        assert_eq!(utrecht.name, "University of Utrecht");
        assert_eq!(
            utrecht.course_authentication.mode(),
            CourseAuthenticationMode::Basic
        );
        assert_eq!(registry.institutions().len(), 3);
    }

    #[test]
    fn test_missing_file_fails() {
        let err = ServiceRegistry::load(&fixture("noop.yaml")).unwrap_err();
        assert!(matches!(err, BrokerError::Configuration(_)));
    }

    #[test]
    fn test_invalid_record_fails_whole_load() {
        let err = ServiceRegistry::load(&fixture("service-registry-invalid.yaml")).unwrap_err();
        assert!(matches!(err, BrokerError::Configuration(msg) if msg.contains("password")));
    }

    #[test]
    fn test_unknown_institution() {
        let registry = ServiceRegistry::from_configs(vec![test_config(
            "utrecht.nl",
            CourseAuthenticationMode::None,
        )])
        .unwrap();

        let err = registry.lookup("nope").unwrap_err();
        assert_eq!(err.to_string(), "Institution nope unknown");
        assert!(registry.lookup("Utrecht.nl").is_err());
    }

    #[test]
    fn test_duplicate_schac_home_rejected() {
        let result = ServiceRegistry::from_configs(vec![
            test_config("utrecht.nl", CourseAuthenticationMode::None),
            test_config("utrecht.nl", CourseAuthenticationMode::Oauth2),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_institutions_sorted() {
        let registry = ServiceRegistry::from_configs(vec![
            test_config("utrecht.nl", CourseAuthenticationMode::None),
            test_config("eindhoven.nl", CourseAuthenticationMode::None),
        ])
        .unwrap();

        let ids: Vec<&str> = registry
            .institutions()
            .iter()
            .map(|i| i.schac_home.as_str())
            .collect();
        assert_eq!(ids, vec!["eindhoven.nl", "utrecht.nl"]);
    }
}
