//! Integration tests for envboot

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Stand-in for `conda`: `run` executes the wrapped command, pip calls
    /// run `PIP_STEP`, everything else succeeds.
    const FAKE_CONDA: &str = r#"#!/bin/sh
if [ "$1" = "run" ]; then
    shift 4
    if [ "$1" = "python" ]; then
        case "$*" in
            *" -e "*) exit 0 ;;
        esac
        PIP_STEP
    fi
    exec "$@"
fi
exit 0
"#;

    struct Workspace {
        dir: TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            std::fs::create_dir_all(dir.path().join("project")).unwrap();
            Self { dir }
        }

        fn path(&self) -> &Path {
            self.dir.path()
        }

        fn cache(&self) -> PathBuf {
            self.path().join("miniconda")
        }

        fn project(&self) -> PathBuf {
            self.path().join("project")
        }

        fn config(&self) -> PathBuf {
            self.path().join("envboot.toml")
        }

        /// Populate the cache with a base distribution and `circleenv`
        fn warm(self, pip_step: &str) -> Self {
            let cache = self.cache();
            std::fs::create_dir_all(cache.join("bin")).unwrap();
            std::fs::create_dir_all(cache.join("envs/circleenv/conda-meta")).unwrap();

            let conda = cache.join("bin/conda");
            std::fs::write(&conda, FAKE_CONDA.replace("PIP_STEP", pip_step)).unwrap();
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&conda, std::fs::Permissions::from_mode(0o755)).unwrap();
            }
            self
        }

        fn with_tests(self, script: &str) -> Self {
            let config = format!(
                r#"[environment]
pip_packages = ["pytest", "mne"]

[display]
pid_file = '{}'

[tests]
command = ["sh", "-c", '{}']
"#,
                self.path().join("xvfb.pid").display(),
                script
            );
            std::fs::write(self.config(), config).unwrap();
            self
        }

        fn cmd(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("envboot");
            cmd.env_remove("ENVBOOT_CONFIG")
                .env_remove("ENVBOOT_CACHE_DIR")
                .env_remove("RUST_LOG")
                .arg("--cache-dir")
                .arg(self.cache())
                .arg("--project")
                .arg(self.project());
            if self.config().exists() {
                cmd.arg("--config").arg(self.config());
            }
            cmd
        }
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("envboot")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("cached CI environment bootstrap"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("envboot")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("envboot"));
    }

    #[test]
    fn plan_on_empty_cache_has_every_step() {
        let ws = Workspace::new();

        ws.cmd()
            .args(["plan", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("install-base-distribution"))
            .stdout(predicate::str::contains("create-named-environment"))
            .stdout(predicate::str::contains("install-under-test"));
    }

    #[test]
    fn plan_on_warm_cache_skips_bootstrap() {
        let ws = Workspace::new().warm("exit 0");

        ws.cmd()
            .args(["plan", "--format", "plain"])
            .assert()
            .success()
            .stdout("install-core-packages\ninstall-pip-packages\ninstall-under-test\n");
    }

    #[test]
    fn cache_lists_environments() {
        let ws = Workspace::new().warm("exit 0");

        ws.cmd()
            .args(["cache", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"target_present\": true"));
    }

    #[test]
    fn config_path_reports_explicit_file() {
        let ws = Workspace::new().with_tests("true");

        ws.cmd()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("envboot.toml"));
    }

    #[test]
    fn config_show() {
        let ws = Workspace::new().with_tests("true");

        ws.cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[environment]"))
            .stdout(predicate::str::contains("mne"));
    }

    #[test]
    fn missing_explicit_config_fails() {
        let ws = Workspace::new();

        ws.cmd()
            .args(["--config", "/nonexistent/envboot.toml", "cache"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Configuration file not found"));
    }

    #[test]
    fn config_init_refuses_overwrite() {
        let ws = Workspace::new();

        ws.cmd().args(["config", "init"]).assert().success();
        assert!(ws.project().join("envboot.toml").is_file());

        ws.cmd()
            .args(["config", "init"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));
    }

    #[test]
    fn display_stop_without_server() {
        let ws = Workspace::new().with_tests("true");

        ws.cmd()
            .args(["display", "stop"])
            .assert()
            .success()
            .stdout(predicate::str::contains("not running"));
    }

    #[test]
    fn bootstrap_warm_cache_writes_ledger() {
        let ws = Workspace::new().warm("exit 0").with_tests("true");

        ws.cmd()
            .arg("bootstrap")
            .assert()
            .success()
            .stdout(predicate::str::contains("[3/3]"));

        let ledger = std::fs::read_to_string(ws.cache().join("envboot-runs.log")).unwrap();
        assert!(ledger.contains("\"plan.created\""));
        assert_eq!(ledger.matches("\"step.completed\"").count(), 3);
    }

    #[test]
    fn bootstrap_pip_failure_names_step() {
        let ws = Workspace::new()
            .warm("echo 'ERROR: No matching distribution found for mne' >&2; exit 1")
            .with_tests("true");

        ws.cmd()
            .arg("bootstrap")
            .assert()
            .failure()
            .stderr(predicate::str::contains("install-pip-packages"))
            .stderr(predicate::str::contains("No matching distribution"))
            .stderr(predicate::str::contains("package"));
    }

    #[test]
    fn run_stops_before_tests_when_pip_fails() {
        let ws = Workspace::new().warm("exit 1");
        let marker = ws.path().join("tests-ran");
        let ws = ws.with_tests(&format!("touch {}", marker.display()));

        ws.cmd()
            .args(["run", "--no-display"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("install-pip-packages"));
        assert!(!marker.exists());
    }

    #[test]
    fn test_passes_without_display() {
        let ws = Workspace::new()
            .warm("exit 0")
            .with_tests("echo \"== 2 passed in 0.01s ==\"");

        ws.cmd()
            .args(["test", "--no-display"])
            .assert()
            .success()
            .stdout(predicate::str::contains("2 passed"));
    }

    #[test]
    fn failing_suite_reports_exit_code() {
        let ws = Workspace::new().warm("exit 0").with_tests("exit 1");

        ws.cmd()
            .args(["test", "--no-display"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("exit code 1"))
            .stderr(predicate::str::contains("test-failure"));
    }

    #[test]
    fn crashed_suite_is_a_test_failure() {
        let ws = Workspace::new()
            .warm("exit 0")
            .with_tests("echo collected 3 items; kill -SEGV $$");

        ws.cmd()
            .args(["test", "--no-display"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("Tests crashed"))
            .stderr(predicate::str::contains("killed by signal 11"))
            .stderr(predicate::str::contains("test-failure"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let ws = Workspace::new().warm("exit 0").with_tests("true");

        ws.cmd()
            .args(["test", "--no-display", "--timeout", "0"])
            .assert()
            .failure();
    }

    #[test]
    fn timeout_is_distinct_from_failure() {
        let ws = Workspace::new().warm("exit 0").with_tests("sleep 30");

        ws.cmd()
            .args(["test", "--no-display", "--timeout", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("timed out after 1s"))
            .stderr(predicate::str::contains("test-timeout"));
    }
}
