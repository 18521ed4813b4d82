//! Bootstrap planning
//!
//! Turns a cache snapshot and a declared environment into an ordered list of
//! actions. Planning is pure: the same inputs always give the same plan, and
//! nothing outside the two arguments influences it.
//!
//! The two bootstrap steps are skipped when the cache already holds what they
//! would create. Package installation and the editable install of the
//! package under test always run, because package lists and the working tree
//! can change between runs even when the environment itself is cached.

use crate::cache::CacheState;
use crate::config::schema::EnvironmentConfig;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::info;

/// Declared target environment, fixed for the duration of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    /// Named environment to create or reuse
    pub name: String,
    /// Interpreter version used when creating the environment
    pub interpreter_version: String,
    /// Packages for the environment manager's resolver
    pub core_packages: Vec<String>,
    /// Packages for pip, in install order
    pub pip_packages: Vec<String>,
}

impl EnvironmentSpec {
    /// Build a spec from the `[environment]` config section
    pub fn from_config(config: &EnvironmentConfig) -> Self {
        Self {
            name: config.name.clone(),
            interpreter_version: config.python.clone(),
            core_packages: config.core_packages.clone(),
            pip_packages: config.pip_packages.clone(),
        }
    }

    /// Short content hash identifying this spec (first 12 hex chars of SHA-256)
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update([0]);
        hasher.update(self.interpreter_version.as_bytes());
        for list in [&self.core_packages, &self.pip_packages] {
            hasher.update([1]);
            for package in list {
                hasher.update(package.as_bytes());
                hasher.update([0]);
            }
        }
        let result = hasher.finalize();
        hex::encode(&result[..6])
    }
}

/// One step of a bootstrap plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
    /// Fetch and install the base distribution into the cache
    InstallBaseDistribution,
    /// Create the named environment with the given interpreter
    CreateNamedEnvironment { name: String, interpreter_version: String },
    /// Install core packages into the named environment
    InstallCorePackages { packages: Vec<String> },
    /// Install pip-layer packages into the named environment
    InstallPipPackages { packages: Vec<String> },
    /// Install the working tree in editable mode
    InstallUnderTest,
}

impl Action {
    /// Stable step identifier used in logs and errors
    pub fn step_name(&self) -> &'static str {
        match self {
            Self::InstallBaseDistribution => "install-base-distribution",
            Self::CreateNamedEnvironment { .. } => "create-named-environment",
            Self::InstallCorePackages { .. } => "install-core-packages",
            Self::InstallPipPackages { .. } => "install-pip-packages",
            Self::InstallUnderTest => "install-under-test",
        }
    }

    /// Whether this step bootstraps the cache rather than installing packages
    pub fn is_bootstrap(&self) -> bool {
        matches!(
            self,
            Self::InstallBaseDistribution | Self::CreateNamedEnvironment { .. }
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InstallBaseDistribution => write!(f, "install base distribution"),
            Self::CreateNamedEnvironment {
                name,
                interpreter_version,
            } => write!(f, "create environment {} (python {})", name, interpreter_version),
            Self::InstallCorePackages { packages } => {
                write!(f, "install core packages [{}]", packages.join(", "))
            }
            Self::InstallPipPackages { packages } => {
                write!(f, "install pip packages [{}]", packages.join(", "))
            }
            Self::InstallUnderTest => write!(f, "install package under test (editable)"),
        }
    }
}

/// Ordered bootstrap plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPlan {
    actions: Vec<Action>,
}

impl ActionPlan {
    /// Steps in execution order
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Number of steps that would create something in the cache
    pub fn bootstrap_steps(&self) -> usize {
        self.actions.iter().filter(|a| a.is_bootstrap()).count()
    }
}

impl<'a> IntoIterator for &'a ActionPlan {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

/// Decide what a run must do to bring the cache up to `spec`
pub fn plan(cache: &CacheState, spec: &EnvironmentSpec) -> ActionPlan {
    let mut actions = Vec::with_capacity(5);

    if cache.base_distribution_present {
        info!("Base distribution present, skipping install");
    } else {
        actions.push(Action::InstallBaseDistribution);
    }

    if cache.has_environment(&spec.name) {
        info!("Environment {} exists, skipping creation", spec.name);
    } else {
        actions.push(Action::CreateNamedEnvironment {
            name: spec.name.clone(),
            interpreter_version: spec.interpreter_version.clone(),
        });
    }

    actions.push(Action::InstallCorePackages {
        packages: spec.core_packages.clone(),
    });
    actions.push(Action::InstallPipPackages {
        packages: spec.pip_packages.clone(),
    });
    actions.push(Action::InstallUnderTest);

    ActionPlan { actions }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circleenv() -> EnvironmentSpec {
        EnvironmentSpec {
            name: "circleenv".to_string(),
            interpreter_version: "3.6.0".to_string(),
            core_packages: vec!["numpy".into(), "scipy".into(), "pip".into()],
            pip_packages: vec!["pytest".into(), "mne".into()],
        }
    }

    fn all_caches() -> Vec<CacheState> {
        vec![
            CacheState::default(),
            CacheState::new(true, Vec::<String>::new()),
            CacheState::new(false, ["circleenv"]),
            CacheState::new(true, ["circleenv"]),
            CacheState::new(true, ["other", "circleenv"]),
            CacheState::new(false, ["other"]),
        ]
    }

    fn count(plan: &ActionPlan, step: &str) -> usize {
        plan.actions().iter().filter(|a| a.step_name() == step).count()
    }

    #[test]
    fn empty_cache_gets_full_plan() {
        let plan = plan(&CacheState::default(), &circleenv());

        assert_eq!(
            plan.actions(),
            &[
                Action::InstallBaseDistribution,
                Action::CreateNamedEnvironment {
                    name: "circleenv".to_string(),
                    interpreter_version: "3.6.0".to_string(),
                },
                Action::InstallCorePackages {
                    packages: vec!["numpy".into(), "scipy".into(), "pip".into()],
                },
                Action::InstallPipPackages {
                    packages: vec!["pytest".into(), "mne".into()],
                },
                Action::InstallUnderTest,
            ]
        );
        assert_eq!(plan.bootstrap_steps(), 2);
    }

    #[test]
    fn warm_cache_only_installs() {
        let cache = CacheState::new(true, ["circleenv"]);
        let plan = plan(&cache, &circleenv());

        let steps: Vec<_> = plan.actions().iter().map(Action::step_name).collect();
        assert_eq!(
            steps,
            vec![
                "install-core-packages",
                "install-pip-packages",
                "install-under-test"
            ]
        );
        assert_eq!(plan.bootstrap_steps(), 0);
    }

    #[test]
    fn base_present_never_reinstalls_base() {
        for cache in all_caches().into_iter().filter(|c| c.base_distribution_present) {
            let plan = plan(&cache, &circleenv());
            assert_eq!(count(&plan, "install-base-distribution"), 0, "{:?}", cache);
        }
    }

    #[test]
    fn existing_environment_never_recreated() {
        for cache in all_caches().into_iter().filter(|c| c.has_environment("circleenv")) {
            let plan = plan(&cache, &circleenv());
            assert_eq!(count(&plan, "create-named-environment"), 0, "{:?}", cache);
        }
    }

    #[test]
    fn other_environment_does_not_satisfy_spec() {
        let plan = plan(&CacheState::new(true, ["other"]), &circleenv());
        assert_eq!(count(&plan, "create-named-environment"), 1);
    }

    #[test]
    fn install_steps_always_present_and_last() {
        for cache in all_caches() {
            let plan = plan(&cache, &circleenv());
            assert_eq!(count(&plan, "install-core-packages"), 1);
            assert_eq!(count(&plan, "install-pip-packages"), 1);
            assert_eq!(count(&plan, "install-under-test"), 1);
            assert_eq!(plan.actions().last(), Some(&Action::InstallUnderTest));
        }
    }

    #[test]
    fn planning_is_deterministic() {
        let spec = circleenv();
        for cache in all_caches() {
            assert_eq!(plan(&cache, &spec), plan(&cache, &spec));
        }
    }

    #[test]
    fn pip_order_preserved() {
        let mut spec = circleenv();
        spec.pip_packages = vec![
            "git+https://github.com/mne-tools/mne-python.git".into(),
            "pytest".into(),
            "pytest-cov".into(),
        ];
        let plan = plan(&CacheState::new(true, ["circleenv"]), &spec);
        assert_eq!(
            plan.actions()[1],
            Action::InstallPipPackages {
                packages: spec.pip_packages.clone()
            }
        );
    }

    #[test]
    fn fingerprint_tracks_spec_contents() {
        let spec = circleenv();
        assert_eq!(spec.fingerprint(), circleenv().fingerprint());
        assert_eq!(spec.fingerprint().len(), 12);

        let mut changed = circleenv();
        changed.pip_packages.push("vispy".into());
        assert_ne!(spec.fingerprint(), changed.fingerprint());

        // Moving a package between layers changes the fingerprint
        let mut moved = circleenv();
        moved.core_packages.pop();
        moved.pip_packages.insert(0, "pip".into());
        assert_ne!(spec.fingerprint(), moved.fingerprint());
    }

    #[test]
    fn action_serializes_tagged() {
        let json = serde_json::to_string(&Action::InstallUnderTest).unwrap();
        assert_eq!(json, r#"{"action":"install-under-test"}"#);
    }
}
