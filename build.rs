use std::{
    process::Command,
    time::{SystemTime, UNIX_EPOCH},
};

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
    println!("cargo:rerun-if-env-changed=CLOCKWORK_VERSION_OVERRIDE");

    if let Ok(version) = std::env::var("CLOCKWORK_VERSION_OVERRIDE") {
        println!("cargo:rustc-env=CLOCKWORK_VERSION={}", version);
        return;
    }

    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output();

    let version = match output {
        Ok(o) if o.status.success() => {
            let git_output = String::from_utf8(o.stdout)
                .unwrap_or_default()
                .trim()
                .to_string();

            // Release tags are "v1.2.3"; the CLI reports "1.2.3"
            let version = git_output.strip_prefix('v').unwrap_or(&git_output);

            if version.ends_with("-dirty") || version.is_empty() {
                format!("{}-{}", version, timestamp())
            } else {
                version.to_string()
            }
        }
        _ => {
            // Not a git checkout (e.g. a source tarball): fall back to the manifest version
            format!("{}-{}", env!("CARGO_PKG_VERSION"), timestamp())
        }
    };

    println!("cargo:rustc-env=CLOCKWORK_VERSION={}", version);
}

fn timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
