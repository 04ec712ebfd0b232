//! Integration tests for the burn-style CLI.
//!
//! Runs the compiled binary on tiny generated images with a small backbone.

use std::path::{Path, PathBuf};
use std::process::Command;

use image::{Rgb, RgbImage};
use style::{DistanceKind, LossHistory};

fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir)
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

fn write_image(path: &Path, size: u32, seed: u32) {
    let img = RgbImage::from_fn(size, size, |x, y| {
        let v = (x * 31 + y * 17 + seed * 13) % 256;
        Rgb([v as u8, (255 - v) as u8, ((v * 7) % 256) as u8])
    });
    img.save(path).unwrap();
}

fn write_tiny_config(path: &Path, distance: &str) {
    let contents = format!(
        r#"
[transfer]
distance = "{distance}"
disc = "gram"
steps = 3
k = 16
style_layers = [0, 1]
content_layer = 1
critic_hidden = 8
seed = 11
image_size = 16

[backbone]
stage_channels = [4, 8]
convs_per_stage = 1
"#
    );
    std::fs::write(path, contents).unwrap();
}

fn burn_style() -> Command {
    Command::new(env!("CARGO_BIN_EXE_burn-style"))
}

/// Verify that configs/transfer.toml is valid TOML with a resolvable distance.
#[test]
fn test_real_transfer_toml_is_valid() {
    let toml_path = workspace_root().join("configs").join("transfer.toml");
    assert!(toml_path.exists(), "configs/transfer.toml not found");

    let contents = std::fs::read_to_string(&toml_path).unwrap();
    let value: toml::Value = toml::from_str(&contents).unwrap();
    let transfer = value.get("transfer").expect("[transfer] section");
    let distance = transfer.get("distance").and_then(|v| v.as_str()).unwrap();
    let disc = transfer.get("disc").and_then(|v| v.as_str()).unwrap();
    assert_eq!(
        DistanceKind::from_flags(distance, disc).unwrap(),
        DistanceKind::FirstMoment
    );
}

#[test]
fn test_transfer_writes_image_and_losses() {
    let tmp = tempfile::TempDir::new().unwrap();
    let style = tmp.path().join("style.png");
    let content = tmp.path().join("content.png");
    let output = tmp.path().join("out").join("result.png");
    let losses = tmp.path().join("losses.json");
    let config = tmp.path().join("transfer.toml");
    write_image(&style, 20, 1);
    write_image(&content, 16, 2);
    write_tiny_config(&config, "disc-wass");

    let status = burn_style()
        .arg("transfer")
        .arg("--style")
        .arg(&style)
        .arg("--content")
        .arg(&content)
        .arg("--output")
        .arg(&output)
        .arg("--config")
        .arg(&config)
        .arg("--losses")
        .arg(&losses)
        .arg("--no-progress")
        .status()
        .unwrap();
    assert!(status.success());

    let result = image::open(&output).unwrap();
    assert_eq!((result.width(), result.height()), (16, 16));

    let history: LossHistory =
        serde_json::from_reader(std::fs::File::open(&losses).unwrap()).unwrap();
    assert_eq!(history.style.len(), 3);
    assert_eq!(history.disc.len(), 3);

    let summary = burn_style()
        .arg("summary")
        .arg("--input")
        .arg(&losses)
        .arg("--json")
        .output()
        .unwrap();
    assert!(summary.status.success());
    let json: serde_json::Value = serde_json::from_slice(&summary.stdout).unwrap();
    assert_eq!(json["steps"], 3);
}

#[test]
fn test_dry_run_skips_output() {
    let tmp = tempfile::TempDir::new().unwrap();
    let style = tmp.path().join("style.png");
    let content = tmp.path().join("content.png");
    let output = tmp.path().join("result.png");
    let config = tmp.path().join("transfer.toml");
    write_image(&style, 16, 3);
    write_image(&content, 16, 4);
    write_tiny_config(&config, "kernel");

    let status = burn_style()
        .args(["transfer", "--dry-run", "--no-progress"])
        .arg("--style")
        .arg(&style)
        .arg("--content")
        .arg(&content)
        .arg("--output")
        .arg(&output)
        .arg("--config")
        .arg(&config)
        .status()
        .unwrap();
    assert!(status.success());
    assert!(!output.exists());
}

#[test]
fn test_unknown_distance_exits_with_error() {
    let tmp = tempfile::TempDir::new().unwrap();
    let style = tmp.path().join("style.png");
    write_image(&style, 8, 5);

    let out = burn_style()
        .arg("transfer")
        .arg("--style")
        .arg(&style)
        .arg("--content")
        .arg(&style)
        .arg("--output")
        .arg(tmp.path().join("result.png"))
        .args(["--distance", "disc-gp", "--steps", "1", "--image-size", "8"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("disc-gp"));
}
