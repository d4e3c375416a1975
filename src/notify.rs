//! Audible notification when a batch of pages is done.

use tokio::process::Command;

use crate::platform::Platform;

/// Program and arguments that play the system notification sound.
#[must_use]
pub fn chime_command(platform: Platform) -> (&'static str, Vec<&'static str>) {
    match platform {
        Platform::MacOs => ("afplay", vec!["/System/Library/Sounds/Glass.aiff"]),
        Platform::Windows => (
            "powershell",
            vec![
                "-NoProfile",
                "-Command",
                "[System.Media.SystemSounds]::Exclamation.Play(); Start-Sleep -Milliseconds 500",
            ],
        ),
        Platform::Linux => (
            "paplay",
            vec!["/usr/share/sounds/freedesktop/stereo/complete.oga"],
        ),
    }
}

/// Plays the chime in the background. The caller never waits for it and
/// failures are only logged.
pub fn play_chime(platform: Platform) {
    let (program, args) = chime_command(platform);
    tokio::spawn(async move {
        match Command::new(program).args(&args).output().await {
            Ok(output) if !output.status.success() => {
                log::debug!("{program} exited with {}", output.status);
            }
            Ok(_) => {}
            Err(e) => log::debug!("Could not play notification sound: {e}"),
        }
    });
}
