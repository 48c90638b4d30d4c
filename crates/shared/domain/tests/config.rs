use shelf_domain::config::{AdminConfig, AppConfig, ServerConfig, StorageConfig, UploadConfig};
use serde_json::json;
use std::path::PathBuf;

#[test]
fn config_defaults_are_sane() {
    let server = ServerConfig::default();
    assert_eq!(server.port, 8080);
    assert!(server.ssl.is_none());

    let storage = StorageConfig::default();
    assert_eq!(storage.data_dir, PathBuf::from("./data"));
    assert_eq!(storage.static_dir, PathBuf::from("../web/dist"));

    let admin = AdminConfig::default();
    assert_eq!(admin.username, "admin");
    assert!(!format!("{admin:?}").contains("password: \"admin\""));

    assert_eq!(UploadConfig::default().max_upload_bytes(), 50 * 1024 * 1024);

    let cfg = AppConfig::default();
    assert!(cfg.public_base_url.is_none());
    assert_eq!(cfg.log.level, "info");
}

#[test]
fn app_config_deserializes_partial_documents() {
    let raw = json!({
        "server": { "address": "::", "port": 9000 },
        "storage": { "data_dir": "/srv/casts" },
        "admin": { "password": "s3cret" },
        "upload": { "max_upload_mb": 5 },
        "public_base_url": "https://casts.example.org",
        "log": { "json": true }
    });

    let cfg: AppConfig = serde_json::from_value(raw).expect("config deserialize");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.storage.data_dir, PathBuf::from("/srv/casts"));
    assert_eq!(cfg.storage.static_dir, PathBuf::from("../web/dist"));
    assert_eq!(cfg.admin.username, "admin");
    assert_eq!(cfg.admin.password, "s3cret");
    assert_eq!(cfg.upload.max_upload_bytes(), 5 * 1024 * 1024);
    assert_eq!(cfg.public_base_url.as_deref(), Some("https://casts.example.org"));
    assert!(cfg.log.json);
    assert_eq!(cfg.log.level, "info");
}

#[test]
fn deref_mut_copies_on_write() {
    let original = AppConfig::default();
    let mut changed = original.clone();
    changed.upload.max_upload_mb = 1;

    assert_eq!(original.upload.max_upload_mb, 50);
    assert_eq!(changed.upload.max_upload_mb, 1);
}
