use nvoc::config::Config;
use nvoc::profiles::{Profile, ProfileManager, ProfileStore};
use nvoc::NvOcError;
use std::path::Path;
use std::process::Command;

fn write_config(dir: &Path) -> std::path::PathBuf {
    let config = Config {
        profiles_path: dir.join("profiles.json"),
        log_path: dir.join("nvoc.log"),
        ..Config::default()
    };
    let path = dir.join("config.toml");
    config.save_to(&path).unwrap();
    path
}

fn nvoc(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_nvoc"))
        .args(args)
        .output()
        .expect("Failed to execute nvoc")
}

// ============================================================================
// Profile Store
// ============================================================================

#[test]
fn test_profile_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profiles.json");
    let foo = Profile {
        fan_speed: 70,
        core_clock: 100,
        mem_clock: 500,
    };

    let mut manager = ProfileManager::load(&path);
    manager.save_profile("Foo", foo).unwrap();

    let reloaded = ProfileStore::load(&path);
    assert_eq!(reloaded.names(), vec!["Default", "Foo"]);
    assert_eq!(reloaded.get("Foo"), Some(&foo));
    assert_eq!(reloaded.get("Default"), Some(&Profile::default()));
}

#[test]
fn test_default_profile_is_protected_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profiles.json");
    let mut manager = ProfileManager::load(&path);
    let before = std::fs::read_to_string(&path).unwrap();

    let err = manager.delete_profile("Default").unwrap_err();
    assert!(matches!(err, NvOcError::ProtectedProfile(_)));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

// ============================================================================
// Binary
// ============================================================================

#[test]
fn test_nvoc_help() {
    let output = nvoc(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("--fan"));
    assert!(stdout.contains("--reset"));
}

#[test]
fn test_nvoc_rejects_out_of_range_fan() {
    let output = nvoc(&["--fan", "101"]);
    assert!(!output.status.success());
}

#[test]
fn test_nvoc_list_profiles() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = nvoc(&["--config", config.to_str().unwrap(), "--list-profiles"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Default"));
    assert!(dir.path().join("profiles.json").exists());
    assert!(dir.path().join("nvoc.log").exists());
}
