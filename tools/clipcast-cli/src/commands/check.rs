//! Check encoder availability.

use tokio::process::Command;

pub async fn run() -> anyhow::Result<()> {
    println!("Clipcast System Check");
    println!("{}", "=".repeat(50));

    match Command::new("ffmpeg").arg("-version").output().await {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let version = stdout.lines().next().unwrap_or("ffmpeg (unknown version)");
            println!("[OK] Encoder: {version}");
        }
        Ok(output) => {
            println!(
                "[WARN] ffmpeg found but returned status {}",
                output.status
            );
        }
        Err(_) => {
            println!("[FAIL] ffmpeg not found in PATH");
            println!("       Install ffmpeg to render videos.");
        }
    }

    let config_dir = std::env::var("XDG_CONFIG_HOME")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| {
            std::env::var("HOME")
                .map(|h| std::path::PathBuf::from(h).join(".config"))
                .unwrap_or_default()
        });
    println!(
        "[OK] Config: {}",
        config_dir.join("clipcast").join("config.json").display()
    );

    Ok(())
}
