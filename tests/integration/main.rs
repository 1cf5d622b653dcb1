//! Integration tests for depimage

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    /// Command isolated from the user's global config, run inside `dir`
    fn depimage(dir: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("depimage");
        cmd.current_dir(dir)
            .env("DEPIMAGE_CONFIG", dir.join("no-such-global.toml"))
            .env_remove("DEPIMAGE_LOG");
        cmd
    }

    /// Project with two jars and a manifest listing them
    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("jars")).unwrap();
        std::fs::write(dir.path().join("jars/a.jar"), b"alpha").unwrap();
        std::fs::write(dir.path().join("jars/b.jar"), b"beta").unwrap();
        std::fs::write(
            dir.path().join("dependencies.toml"),
            r#"
[[dependency]]
source = "jars/a.jar"
destination = "a.jar"

[[dependency]]
source = "jars/b.jar"
destination = "org/b.jar"
"#,
        )
        .unwrap();
        dir
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        depimage(dir.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("build a cached base container image"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        depimage(dir.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("depimage"));
    }

    #[test]
    fn config_path_honors_env() {
        let dir = TempDir::new().unwrap();
        depimage(dir.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("no-such-global.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        depimage(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[image]"))
            .stdout(predicate::str::contains("eclipse-temurin:21-jre"));
    }

    #[test]
    fn config_init_writes_local_file_and_is_picked_up() {
        let dir = TempDir::new().unwrap();
        depimage(dir.path())
            .args(["-q", "config", "init"])
            .assert()
            .success();
        assert!(dir.path().join("depimage.toml").exists());

        std::fs::write(
            dir.path().join("depimage.toml"),
            "[image]\nname = \"my-deps\"\n",
        )
        .unwrap();
        depimage(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("my-deps"));
    }

    #[test]
    fn invalid_local_config_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("depimage.toml"),
            "[image]\nname = \"deps:latest\"\n",
        )
        .unwrap();
        depimage(dir.path())
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));

        depimage(dir.path())
            .args(["--no-local", "config", "show"])
            .assert()
            .success();
    }

    #[test]
    fn status_without_manifest_fails() {
        let dir = TempDir::new().unwrap();
        depimage(dir.path())
            .args(["-q", "status"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Dependency resolution failed"));
    }

    #[test]
    fn status_reports_miss_before_first_build() {
        let dir = project();
        depimage(dir.path())
            .args(["-q", "status"])
            .assert()
            .success()
            .stdout("miss\n");
        assert!(dir.path().join("target/depimage/lib/org/b.jar").exists());
    }

    #[test]
    fn status_json() {
        let dir = project();
        let output = depimage(dir.path())
            .args(["status", "--format", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(json["cache"], "miss");
        assert_eq!(json["up_to_date"], false);
        assert_eq!(json["staged"], 2);
        assert!(json["previous"].is_null());
        assert_eq!(json["fingerprint"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn clean_without_staging_dir() {
        let dir = TempDir::new().unwrap();
        depimage(dir.path()).args(["-q", "clean"]).assert().success();
    }

    #[cfg(unix)]
    mod with_fake_builder {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Builder script that counts invocations in `builds.log`
        fn fake_builder(dir: &Path, exit_code: i32) -> String {
            let path = dir.join("fake-builder");
            let log = dir.join("builds.log");
            std::fs::write(
                &path,
                format!(
                    "#!/bin/sh\necho \"$@\" >> {}\necho 'STEP 1/2: FROM base'\nexit {}\n",
                    log.display(),
                    exit_code
                ),
            )
            .unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.display().to_string()
        }

        fn build_count(dir: &Path) -> usize {
            std::fs::read_to_string(dir.join("builds.log"))
                .map(|log| log.lines().count())
                .unwrap_or(0)
        }

        #[test]
        fn second_build_is_a_cache_hit() {
            let dir = project();
            let builder = fake_builder(dir.path(), 0);

            let first = depimage(dir.path())
                .args(["-q", "build", "--builder", &builder])
                .output()
                .unwrap();
            assert!(first.status.success());
            let fingerprint = String::from_utf8(first.stdout).unwrap();
            assert_eq!(fingerprint.trim().len(), 64);
            assert_eq!(build_count(dir.path()), 1);

            let record =
                std::fs::read_to_string(dir.path().join("target/depimage/dependencies.sha256"))
                    .unwrap();
            assert_eq!(record.trim(), fingerprint.trim());

            depimage(dir.path())
                .args(["-q", "build", "--builder", &builder])
                .assert()
                .success()
                .stdout(fingerprint.clone());
            assert_eq!(build_count(dir.path()), 1);

            depimage(dir.path())
                .args(["-q", "status"])
                .assert()
                .success()
                .stdout("hit\n");
        }

        #[test]
        fn build_tags_image_with_fingerprint() {
            let dir = project();
            let builder = fake_builder(dir.path(), 0);

            let output = depimage(dir.path())
                .args(["-q", "build", "--builder", &builder])
                .output()
                .unwrap();
            let fingerprint = String::from_utf8(output.stdout).unwrap();

            let log = std::fs::read_to_string(dir.path().join("builds.log")).unwrap();
            assert!(log.contains("--tag dependencies "));
            assert!(log.contains(&format!("--tag dependencies:{}", fingerprint.trim())));
        }

        #[test]
        fn changed_dependency_rebuilds() {
            let dir = project();
            let builder = fake_builder(dir.path(), 0);

            depimage(dir.path())
                .args(["-q", "build", "--builder", &builder])
                .assert()
                .success();
            std::fs::write(dir.path().join("jars/a.jar"), b"alpha-2").unwrap();
            depimage(dir.path())
                .args(["-q", "build", "--builder", &builder])
                .assert()
                .success();

            assert_eq!(build_count(dir.path()), 2);
        }

        #[test]
        fn failed_build_leaves_no_record() {
            let dir = project();
            let builder = fake_builder(dir.path(), 125);

            depimage(dir.path())
                .args(["-q", "build", "--builder", &builder])
                .assert()
                .failure()
                .stderr(predicate::str::contains("Image build failed"));

            assert!(!dir
                .path()
                .join("target/depimage/dependencies.sha256")
                .exists());
        }

        #[test]
        fn force_rebuilds_on_hit() {
            let dir = project();
            let builder = fake_builder(dir.path(), 0);

            for _ in 0..2 {
                depimage(dir.path())
                    .args(["-q", "build", "--force", "--builder", &builder])
                    .assert()
                    .success();
            }

            assert_eq!(build_count(dir.path()), 2);
        }

        #[test]
        fn clean_removes_record() {
            let dir = project();
            let builder = fake_builder(dir.path(), 0);

            depimage(dir.path())
                .args(["-q", "build", "--builder", &builder])
                .assert()
                .success();
            depimage(dir.path()).args(["-q", "clean"]).assert().success();

            assert!(!dir.path().join("target/depimage").exists());
            depimage(dir.path())
                .args(["-q", "status"])
                .assert()
                .success()
                .stdout("miss\n");
        }
    }
}
