use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

fn coversaver(root: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_coversaver"));
    command
        .env("COVERSAVER_CONFIG_DIR", root.join("config"))
        .env("COVERSAVER_DATA_DIR", root.join("data"))
        .env("RUST_LOG", "warn");
    command
}

fn write_covers(dir: &Path, count: u8) {
    fs::create_dir_all(dir).unwrap();
    for i in 0..count {
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([i * 20, 80, 160]));
        img.save_with_format(dir.join(format!("{}.jpg", i + 1)), image::ImageFormat::Jpeg)
            .unwrap();
    }
}

#[test]
fn layout_json_describes_reference_grid() {
    let root = TempDir::new().unwrap();
    let covers = root.path().join("covers");
    write_covers(&covers, 6);

    let output = coversaver(root.path())
        .args(["layout", "--width", "1024", "--height", "800", "--seed", "7", "--json"])
        .arg("--covers")
        .arg(&covers)
        .output()
        .expect("failed to run coversaver layout");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let grid: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows = grid["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 8);
    assert!(rows.iter().all(|row| row["tiles"].as_array().unwrap().len() == 36));
    assert_eq!(grid["metrics"]["cover_size"], 128.0);
    assert_eq!(rows[0]["direction"], "left");
    assert_eq!(rows[1]["direction"], "right");
    assert_eq!(rows[0]["scroll"]["key_path"], "position.x");
    assert_eq!(grid["vignette"]["z"], 100.0);
}

#[test]
fn layout_reads_covers_from_saver_bundle() {
    let root = TempDir::new().unwrap();
    let bundle = root.path().join("Test.saver");
    write_covers(&bundle.join("Contents/Resources/covers"), 3);

    let output = coversaver(root.path())
        .args(["layout", "--width", "500", "--height", "400"])
        .arg("--covers")
        .arg(&bundle)
        .output()
        .expect("failed to run coversaver layout");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Cover images:   3"), "{stdout}");
    assert!(stdout.contains("Tiles per row:  3"), "{stdout}");
}

#[test]
fn layout_without_covers_declines() {
    let root = TempDir::new().unwrap();
    let empty = root.path().join("empty");
    fs::create_dir_all(&empty).unwrap();

    let output = coversaver(root.path())
        .args(["layout", "--width", "1024", "--height", "800"])
        .arg("--covers")
        .arg(&empty)
        .output()
        .expect("failed to run coversaver layout");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("No grid"));
}

#[test]
fn invalid_config_is_rejected() {
    let root = TempDir::new().unwrap();
    let config = root.path().join("bad.toml");
    fs::write(&config, "version = 3\n").unwrap();

    let status = coversaver(root.path())
        .arg("--config")
        .arg(&config)
        .arg("where")
        .status()
        .expect("failed to run coversaver where");
    assert!(!status.success());
}
