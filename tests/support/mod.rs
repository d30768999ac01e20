#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// Scratch working directory with its own store, signed in as one owner.
pub struct TestWorkspace {
    dir: TempDir,
    owner: String,
}

impl TestWorkspace {
    pub fn new(owner: &str) -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self {
            dir,
            owner: owner.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn store_dir(&self) -> PathBuf {
        self.dir.path().join(".taskmirror")
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Command running in the workspace as this workspace's owner.
    pub fn cmd(&self) -> Command {
        self.cmd_as(&self.owner)
    }

    pub fn cmd_as(&self, owner: &str) -> Command {
        let mut cmd = bin();
        cmd.current_dir(self.path())
            .env("TASKMIRROR_OWNER", owner)
            .env_remove("TASKMIRROR_STORE")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Run with `--json` and return the `data` field of the envelope.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .args(args)
            .arg("--json")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let value: Value = serde_json::from_slice(&output).expect("json envelope");
        assert_eq!(value["status"], "success");
        value["data"].clone()
    }

    pub fn add(&self, args: &[&str]) -> String {
        let mut full = vec!["add"];
        full.extend_from_slice(args);
        self.json(&full)["id"]
            .as_str()
            .expect("task id")
            .to_string()
    }

    /// Titles of `list` output in display order.
    pub fn list_titles(&self, extra: &[&str]) -> Vec<String> {
        let mut args = vec!["list"];
        args.extend_from_slice(extra);
        self.json(&args)["tasks"]
            .as_array()
            .expect("tasks array")
            .iter()
            .map(|task| task["title"].as_str().expect("title").to_string())
            .collect()
    }
}

pub fn bin() -> Command {
    Command::cargo_bin("taskmirror").expect("binary")
}
