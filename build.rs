//! Embeds the package version and git revision as `APP_VERSION`.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
    println!("cargo:rerun-if-env-changed=ARBOR_REVISION");

    let version = env::var("CARGO_PKG_VERSION").unwrap_or_default();
    // Source tarballs have no .git, so packagers can pass the revision in
    let revision = env::var("ARBOR_REVISION")
        .ok()
        .filter(|r| !r.is_empty())
        .or_else(describe_head)
        .unwrap_or_else(|| "unreleased".to_owned());

    println!("cargo:rustc-env=APP_VERSION={version} ({revision})");
}

/// `git describe` of the checkout, `None` outside a repository.
fn describe_head() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let described = String::from_utf8(output.stdout).ok()?;
    let described = described.trim();
    (!described.is_empty()).then(|| described.to_owned())
}
