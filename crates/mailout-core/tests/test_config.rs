use mailout_core::config::MailoutConfig;
use mailout_types::{ContactListRef, ListStrategy};
use std::io::Write;
use std::path::PathBuf;

#[test]
fn test_parse_full_config() {
    let json = r#"{
        "constant_contact": {
            "base_url": "https://api.example.test/v3",
            "redirect_uri": "https://site.example/constant-contact/authorize"
        },
        "store_path": "/var/lib/mailout/connections.json",
        "site": {
            "base_url": "https://site.example",
            "timezone": "+02:00"
        },
        "debug": {
            "debug_render_template": false,
            "debug_sendto_contact_list": "main:999"
        },
        "content_types": {
            "event": {
                "contact_list_creation": "dynamic",
                "connection_id": "main",
                "contact_list_prefix": "Event: "
            },
            "article": {
                "subject": "[@type] @title",
                "contact_list_creation": "taxonomy",
                "terms": {"12": ["main:100", "partners:300"]}
            }
        }
    }"#;

    let config = MailoutConfig::from_json_str(json).expect("Failed to parse config");

    assert_eq!(config.provider.api_base_url, "https://api.example.test/v3", "base_url should map to api_base_url");
    assert_eq!(config.provider.timeout_secs, 30);
    assert!(config.provider.token_url.ends_with("/v1/token"), "token_url should have a default");
    assert_eq!(config.store_path, PathBuf::from("/var/lib/mailout/connections.json"));
    assert_eq!(config.site.offset().unwrap().local_minus_utc(), 7200);
    assert_eq!(config.debug.sendto_contact_list, Some(ContactListRef::new("main", "999")));

    assert_eq!(
        config.content_types["event"].strategy,
        ListStrategy::Dynamic {
            connection_id: "main".to_string(),
            prefix: Some("Event: ".to_string()),
        }
    );
    assert_eq!(config.content_types["article"].subject, "[@type] @title");
    match &config.content_types["article"].strategy {
        ListStrategy::Taxonomy { terms } => assert_eq!(terms["12"].len(), 2),
        other => panic!("unexpected strategy: {:?}", other),
    }
}

#[test]
fn test_minimal_config_uses_defaults() {
    let config = MailoutConfig::from_json_str(r#"{"provider": {"redirect_uri": "https://site.example/cb"}}"#).unwrap();

    assert_eq!(config.provider.api_base_url, "https://api.cc.email/v3");
    assert_eq!(config.store_path, PathBuf::from("./connections.json"));
    assert_eq!(config.site.utc_offset, "+00:00");
    assert!(!config.debug.render_template);
    assert_eq!(config.debug.sendto_contact_list, None);
    assert!(config.content_types.is_empty());
}

#[test]
fn test_blank_debug_list_means_no_override() {
    let config = MailoutConfig::from_json_str(r#"{
        "provider": {"redirect_uri": "https://site.example/cb"},
        "debug": {"sendto_contact_list": "  "}
    }"#).unwrap();

    assert_eq!(config.debug.sendto_contact_list, None);
}

#[test]
fn test_invalid_configs_are_rejected() {
    let missing_redirect = r#"{"provider": {"redirect_uri": ""}}"#;
    let err = MailoutConfig::from_json_str(missing_redirect).unwrap_err();
    assert!(err.to_string().contains("required"));

    let bad_ref = r#"{"provider": {"redirect_uri": "x"}, "debug": {"sendto_contact_list": "no-colon"}}"#;
    assert!(MailoutConfig::from_json_str(bad_ref).is_err());

    let bad_offset = r#"{"provider": {"redirect_uri": "x"}, "site": {"utc_offset": "Europe/Berlin"}}"#;
    assert!(MailoutConfig::from_json_str(bad_offset).is_err());

    let dynamic_without_connection = r#"{
        "provider": {"redirect_uri": "x"},
        "content_types": {"event": {"contact_list_creation": "dynamic", "connection_id": ""}}
    }"#;
    let err = MailoutConfig::from_json_str(dynamic_without_connection).unwrap_err();
    assert!(err.to_string().contains("required"));
}

#[test]
fn test_load_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"provider": {{"redirect_uri": "https://site.example/cb"}}}}"#).unwrap();

    let config = MailoutConfig::from_file(file.path()).unwrap();
    assert_eq!(config.provider.redirect_uri, "https://site.example/cb");

    assert!(MailoutConfig::from_file("/nonexistent/mailout.json").is_err());
}
