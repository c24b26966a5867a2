use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use pothole_watch::config::WatchConfig;
use pothole_watch::ResizeFilter;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "POTHOLE_CONFIG",
        "POTHOLE_MODEL_PATH",
        "POTHOLE_SOURCE_URL",
        "POTHOLE_VIBRATE_MS",
        "POTHOLE_RESIZE_FILTER",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = WatchConfig::load().expect("load config");
    assert_eq!(cfg.model_path, PathBuf::from("best.onnx"));
    assert_eq!(cfg.source.url, "stub://rear_camera");
    assert_eq!(cfg.source.target_fps, 10);
    assert_eq!(cfg.vibrate, Duration::from_millis(200));
    assert_eq!(cfg.resize_filter, ResizeFilter::Nearest);
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "model_path": "models/pothole.onnx",
            "source": {
                "url": "http://10.0.0.7:81/stream",
                "target_fps": 15,
                "width": 800,
                "height": 600
            },
            "alert": { "vibrate_ms": 350 },
            "resize_filter": "triangle"
        }"#,
    );
    std::env::set_var("POTHOLE_CONFIG", file.path());
    std::env::set_var("POTHOLE_SOURCE_URL", "/dev/video2");
    std::env::set_var("POTHOLE_RESIZE_FILTER", "lanczos3");

    let cfg = WatchConfig::load().expect("load config");

    assert_eq!(cfg.model_path, PathBuf::from("models/pothole.onnx"));
    assert_eq!(cfg.source.url, "/dev/video2");
    assert_eq!(cfg.source.target_fps, 15);
    assert_eq!((cfg.source.width, cfg.source.height), (800, 600));
    assert_eq!(cfg.vibrate, Duration::from_millis(350));
    assert_eq!(cfg.resize_filter, ResizeFilter::Lanczos3);

    clear_env();
}

#[test]
fn invalid_values_are_load_errors() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("POTHOLE_VIBRATE_MS", "soon");
    assert!(WatchConfig::load().is_err());

    std::env::set_var("POTHOLE_VIBRATE_MS", "0");
    assert!(WatchConfig::load().is_err());
    clear_env();

    let file = write_config(r#"{ "source": { "target_fps": 0 } }"#);
    std::env::set_var("POTHOLE_CONFIG", file.path());
    assert!(WatchConfig::load().is_err());

    let file = write_config(r#"{ "resize_filter": "bicubic" }"#);
    std::env::set_var("POTHOLE_CONFIG", file.path());
    assert!(WatchConfig::load().is_err());

    std::env::set_var("POTHOLE_CONFIG", "/nonexistent/pothole.json");
    assert!(WatchConfig::load().is_err());

    clear_env();
}
