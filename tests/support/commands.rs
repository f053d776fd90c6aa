//! Command helper methods for Test.

use super::{Test, PASSPHRASE};
use assert_cmd::Command;
use std::process::Output;

impl Test {
    /// Create a secret-rotator command rooted in the test directory.
    ///
    /// The passphrase comes from the environment so no prompt is shown,
    /// and inherited config or log settings are cleared.
    pub fn cmd(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd =
            Command::cargo_bin("secret-rotator").expect("failed to find secret-rotator binary");
        cmd.current_dir(self.dir.path());
        cmd.env("NO_COLOR", "1");
        cmd.env("SECRET_ROTATOR_PASSPHRASE", PASSPHRASE);
        cmd.env_remove("SECRET_ROTATOR_CONFIG");
        cmd.env_remove("SECRET_ROTATOR_LOG");
        cmd
    }

    /// Run with the given arguments and capture output.
    pub fn run(&self, args: &[&str]) -> Output {
        self.cmd()
            .args(args)
            .output()
            .expect("failed to run secret-rotator")
    }

    pub fn init_cmd(&self) -> Output {
        self.run(&["init"])
    }

    pub fn rotate(&self) -> Output {
        self.run(&["rotate"])
    }

    pub fn rotate_job(&self, job: &str) -> Output {
        self.run(&["rotate", "--job", job])
    }

    /// Create the master key for a config written by hand.
    pub fn ensure_key(&self) -> Output {
        self.run(&["key", "status"])
    }
}
