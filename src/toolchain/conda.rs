//! Conda toolchain
//!
//! Implements `Toolchain` against a Miniconda-style distribution living in
//! the cache directory. Every command fails loudly: a non-zero exit is
//! turned into an error carrying the tail of the command output.

use crate::cache::BASE_MARKER;
use crate::error::{EnvbootError, EnvbootResult, PackageLayer};
use crate::toolchain::{error_output, Toolchain};
use async_trait::async_trait;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info};

/// Toolchain backed by the `conda` binary inside the cache directory
pub struct CondaToolchain {
    prefix: PathBuf,
    installer_url: String,
}

impl CondaToolchain {
    /// Create a toolchain rooted at the cache directory
    pub fn new(prefix: impl Into<PathBuf>, installer_url: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            installer_url: installer_url.into(),
        }
    }

    /// Path to the `conda` executable
    pub fn conda_bin(&self) -> PathBuf {
        self.prefix.join(BASE_MARKER)
    }

    /// Execute a command, capturing its output
    async fn exec(&self, program: &Path, args: &[String]) -> EnvbootResult<Output> {
        debug!("Executing: {} {:?}", program.display(), args);

        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| EnvbootError::command_failed(format!("{} {:?}", program.display(), args), e))
    }

    /// Run conda and return the combined output tail on failure
    async fn conda(&self, args: Vec<String>) -> Result<(), String> {
        let output = self
            .exec(&self.conda_bin(), &args)
            .await
            .map_err(|e| e.to_string())?;

        if output.status.success() {
            Ok(())
        } else {
            Err(failure_reason(&output))
        }
    }

    /// Download the installer script to `dest`
    async fn download_installer(&self, dest: &Path) -> EnvbootResult<()> {
        info!("Downloading installer from {}", self.installer_url);

        let url = self.installer_url.clone();
        let dest = dest.to_path_buf();
        let download_error = |reason: String| EnvbootError::InstallerDownload {
            url: self.installer_url.clone(),
            reason,
        };

        tokio::task::spawn_blocking(move || -> Result<u64, String> {
            let response = ureq::get(url.as_str()).call().map_err(|e| e.to_string())?;
            let mut reader = response.into_body().into_reader();
            let mut file = File::create(&dest)
                .map_err(|e| format!("creating {}: {}", dest.display(), e))?;
            std::io::copy(&mut reader, &mut file).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| download_error(format!("download task failed: {}", e)))?
        .map(|bytes| debug!("Downloaded {} bytes", bytes))
        .map_err(download_error)
    }
}

#[async_trait]
impl Toolchain for CondaToolchain {
    async fn install_distribution(&self, prefix: &Path) -> EnvbootResult<()> {
        let installer = std::env::temp_dir()
            .join(format!("envboot-installer-{}.sh", uuid::Uuid::new_v4()));
        self.download_installer(&installer).await?;

        info!("Installing base distribution into {}", prefix.display());
        let args = vec![
            installer.display().to_string(),
            "-b".to_string(),
            "-u".to_string(),
            "-p".to_string(),
            prefix.display().to_string(),
        ];
        let result = self.exec(Path::new("bash"), &args).await;

        if let Err(e) = tokio::fs::remove_file(&installer).await {
            debug!("Could not remove installer {}: {}", installer.display(), e);
        }

        let output = result?;
        if !output.status.success() {
            return Err(EnvbootError::DistributionInstall {
                path: prefix.to_path_buf(),
                reason: failure_reason(&output),
            });
        }

        // Installer exited cleanly but left no usable distribution
        if !prefix.join(BASE_MARKER).is_file() {
            return Err(EnvbootError::DistributionInstall {
                path: prefix.to_path_buf(),
                reason: format!("{} missing after install", BASE_MARKER),
            });
        }

        Ok(())
    }

    async fn create_environment(
        &self,
        name: &str,
        interpreter_version: &str,
    ) -> EnvbootResult<()> {
        info!("Creating environment {} (python {})", name, interpreter_version);

        self.conda(create_args(name, interpreter_version))
            .await
            .map_err(|reason| EnvbootError::EnvironmentCreate {
                name: name.to_string(),
                python: interpreter_version.to_string(),
                reason,
            })
    }

    async fn install_core_packages(&self, env: &str, packages: &[String]) -> EnvbootResult<()> {
        if packages.is_empty() {
            debug!("No core packages declared");
            return Ok(());
        }
        info!("Installing core packages into {}: {:?}", env, packages);

        self.conda(install_args(env, packages))
            .await
            .map_err(|reason| EnvbootError::PackageInstall {
                layer: PackageLayer::Core,
                env: env.to_string(),
                reason,
            })
    }

    async fn install_pip_packages(&self, env: &str, packages: &[String]) -> EnvbootResult<()> {
        if packages.is_empty() {
            debug!("No pip packages declared");
            return Ok(());
        }
        info!("Installing pip packages into {}: {:?}", env, packages);

        let mut pip = vec!["install".to_string()];
        pip.extend(packages.iter().cloned());

        self.conda(pip_args(env, &pip))
            .await
            .map_err(|reason| EnvbootError::PackageInstall {
                layer: PackageLayer::Pip,
                env: env.to_string(),
                reason,
            })
    }

    async fn install_editable(&self, env: &str, tree: &Path) -> EnvbootResult<()> {
        info!("Installing {} in editable mode", tree.display());

        let pip = vec![
            "install".to_string(),
            "-e".to_string(),
            tree.display().to_string(),
        ];

        self.conda(pip_args(env, &pip))
            .await
            .map_err(|reason| EnvbootError::PackageInstall {
                layer: PackageLayer::UnderTest,
                env: env.to_string(),
                reason,
            })
    }

    fn env_command(&self, env: &str, argv: &[String]) -> Command {
        let mut cmd = Command::new(self.conda_bin());
        cmd.args(run_args(env)).args(argv);
        cmd
    }

    fn name(&self) -> &'static str {
        "conda"
    }
}

fn failure_reason(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let tail = error_output(&stdout, &stderr);
    match output.status.code() {
        Some(code) => format!("exit code {}\n{}", code, tail),
        None => format!("terminated by signal\n{}", tail),
    }
}

fn create_args(name: &str, interpreter_version: &str) -> Vec<String> {
    vec![
        "create".to_string(),
        "--yes".to_string(),
        "--quiet".to_string(),
        "--name".to_string(),
        name.to_string(),
        format!("python={}", interpreter_version),
    ]
}

fn install_args(env: &str, packages: &[String]) -> Vec<String> {
    let mut args = vec![
        "install".to_string(),
        "--yes".to_string(),
        "--quiet".to_string(),
        "--name".to_string(),
        env.to_string(),
    ];
    args.extend(packages.iter().cloned());
    args
}

fn run_args(env: &str) -> Vec<String> {
    vec![
        "run".to_string(),
        "--no-capture-output".to_string(),
        "--name".to_string(),
        env.to_string(),
    ]
}

fn pip_args(env: &str, pip: &[String]) -> Vec<String> {
    let mut args = run_args(env);
    args.extend(["python".to_string(), "-m".to_string(), "pip".to_string()]);
    args.extend(pip.iter().cloned());
    args
}
