// src/browser.rs

//! Browser-launch collaborator: open the dashboard URL with the platform's
//! opener command. Invoked once at startup when enabled.

use std::process::Command;

use anyhow::{Context, Result, bail};

pub fn open(url: &str) -> Result<()> {
    let (program, args): (&str, &[&str]) = if cfg!(target_os = "windows") {
        ("cmd", &["/C", "start"])
    } else if cfg!(target_os = "macos") {
        ("open", &[])
    } else if cfg!(unix) {
        ("xdg-open", &[])
    } else {
        bail!("opening a browser is not supported on this platform");
    };

    let status = Command::new(program)
        .args(args)
        .arg(url)
        .status()
        .with_context(|| format!("launching '{program}' to open {url}"))?;

    if !status.success() {
        bail!("'{program}' exited with {status} opening {url}");
    }
    Ok(())
}
