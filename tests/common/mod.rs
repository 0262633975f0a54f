#![allow(dead_code)]

use std::time::Duration;

use devloop::settings::model::StageToggle;

/// Poll a predicate until it holds or the timeout elapses.
pub async fn wait_until(timeout: Duration, mut pred: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if pred() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// Stage toggle that runs a shell command line instead of the default `go`
/// invocation.
pub fn sh_stage(command: &str) -> StageToggle {
    StageToggle {
        status: true,
        command: Some("sh".to_string()),
        args: vec!["-c".to_string(), command.to_string()],
    }
}
