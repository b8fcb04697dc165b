use ftptool::ftp::{
    DirConflictPolicy, FtpConnectionConfig, FtpErrorKind, FtpHost, FtpTransport, MirrorOptions,
    SimulatedTransport,
};

fn walk_fixture() -> FtpHost<SimulatedTransport> {
    let mut sim = SimulatedTransport::new();
    sim.add_file("/test", "test contents")
        .add_file("/a_dir/foo", "foo")
        .add_file("/a_dir/bar", "bar")
        .add_file("/x_dir/gogolog", "gogolog")
        .add_file("/x_dir/foo", "foo");
    FtpHost::from_transport(sim)
}

#[tokio::test]
async fn test_walk_pruning() {
    let mut host = walk_fixture();
    let mut seen = Vec::new();
    let mut walk = host.walk("/");
    while let Some(entry) = walk.next(&mut host).await.unwrap() {
        entry.subdirs.retain(|d| !d.starts_with("x_"));
        seen.push((entry.path.clone(), entry.subdirs.clone(), entry.files.clone()));
    }

    assert_eq!(
        seen,
        vec![
            ("/".to_string(), vec!["a_dir".to_string()], vec!["test".to_string()]),
            (
                "/a_dir".to_string(),
                vec![],
                vec!["foo".to_string(), "bar".to_string()]
            ),
        ]
    );
    assert!(!host
        .transport()
        .commands()
        .iter()
        .any(|c| c.contains("x_dir")));
}

#[tokio::test]
async fn test_walk_is_not_cached() {
    let mut host = walk_fixture();
    for _ in 0..2 {
        let mut walk = host.walk("/a_dir");
        while walk.next(&mut host).await.unwrap().is_some() {}
    }
    assert_eq!(host.transport().commands(), ["LIST /a_dir", "LIST /a_dir"]);
}

#[tokio::test]
async fn test_cwd_laziness() {
    let mut host = walk_fixture();
    for _ in 0..5 {
        host.current_directory().await.unwrap();
    }
    host.set_current_directory("a_dir").await.unwrap();
    for _ in 0..5 {
        assert_eq!(host.current_directory().await.unwrap(), "/a_dir");
    }
    assert_eq!(host.transport().commands(), ["PWD", "CWD a_dir", "PWD"]);
}

#[tokio::test]
async fn test_cwd_resolution_follows_server() {
    let mut sim = SimulatedTransport::new();
    sim.add_dir("/home/ftp/foo").add_alias("/foo", "/home/ftp/foo");
    let mut host = FtpHost::from_transport(sim);

    host.set_current_directory("/foo").await.unwrap();
    assert_eq!(host.current_directory().await.unwrap(), "/home/ftp/foo");

    let err = host.set_current_directory("/nowhere").await.unwrap_err();
    assert_eq!(err.kind, FtpErrorKind::RemoteOperation);
    assert_eq!(err.code, Some(550));
    assert!(err.message.contains("No such directory"));
    assert_eq!(host.current_directory().await.unwrap(), "/home/ftp/foo");
}

#[tokio::test]
async fn test_makedirs_idempotence() {
    let mut host = walk_fixture();
    host.current_directory().await.unwrap();

    host.transport_mut().clear_commands();
    host.makedirs("/new/deeper/deepest").await.unwrap();
    let mkds: Vec<&str> = host
        .transport()
        .commands()
        .iter()
        .map(String::as_str)
        .filter(|c| c.starts_with("MKD"))
        .collect();
    assert_eq!(mkds, ["MKD /new", "MKD /new/deeper", "MKD /new/deeper/deepest"]);

    host.transport_mut().clear_commands();
    host.makedirs("/new/deeper/deepest").await.unwrap();
    assert_eq!(
        host.transport().commands(),
        ["CWD /new/deeper/deepest", "PWD", "CWD /", "PWD"]
    );
}

#[tokio::test]
async fn test_makedirs_policy() {
    let mut host = walk_fixture();
    // `/test` is a file, so every segment below it fails.
    host.makedirs("/test/sub").await.unwrap();
    let err = host
        .makedirs_with("/test/sub", DirConflictPolicy::Propagate)
        .await
        .unwrap_err();
    assert!(err.is_rejection());
}

#[tokio::test]
async fn test_file_proxy_rename_and_delete() {
    let mut host = walk_fixture();
    host.set_current_directory("/x_dir").await.unwrap();

    let proxy = host.file_proxy("/a_dir/foo").await.unwrap();
    let mut renamed = proxy.rename("foo.bak").await.unwrap();
    assert_eq!(renamed.path(), "/a_dir/foo.bak");
    assert_eq!(renamed.download_to_bytes().await.unwrap(), b"foo");
    renamed.delete().await.unwrap();

    assert!(!host.transport().exists("/a_dir/foo"));
    assert!(!host.transport().exists("/a_dir/foo.bak"));
    assert!(host.transport().exists("/x_dir/foo"));
}

#[tokio::test]
async fn test_path_transform_hook() {
    let mut host = walk_fixture().with_path_transform(|name| name.to_uppercase());
    host.set_current_directory("/a_dir").await.unwrap();
    let mut proxy = host.file_proxy("readme").await.unwrap();
    proxy.upload_from_bytes(b"hi").await.unwrap();
    assert!(host.transport().exists("/a_dir/README"));
}

#[tokio::test]
async fn test_quit_closes_session() {
    let mut host = walk_fixture();
    host.quit().await.unwrap();
    let err = host.current_directory().await.unwrap_err();
    assert_eq!(err.kind, FtpErrorKind::Transport);

    let mut sim = host.into_inner();
    assert!(sim.is_closed());
    assert!(sim.change_directory("/").await.is_err());
}

#[test]
fn test_config_json_round_trip() {
    let json = r#"{
        "host": "ftp.example.org",
        "username": "fbi",
        "password": "SecretPassword",
        "dataChannelMode": "extendedPassive",
        "extensionMap": { "html": "htm" }
    }"#;
    let config: FtpConnectionConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.port, 21);
    assert_eq!(config.connect_timeout_sec, 15);
    assert!(config.extension_map.is_some());

    let back: FtpConnectionConfig =
        serde_json::from_str(&serde_json::to_string(&config).unwrap()).unwrap();
    assert_eq!(back, config);
}

#[test]
fn test_mirror_options_json() {
    let options: MirrorOptions =
        serde_json::from_str(r#"{ "createDestination": true, "onDirectoryError": "propagate" }"#)
            .unwrap();
    assert!(options.create_destination);
    assert!(options.ignore_dotfiles);
    assert_eq!(options.on_directory_error, DirConflictPolicy::Propagate);
}
