//! REST transport against an in-process server backed by the direct store.

use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

use bifrost::client::RestClient;
use bifrost::connection::Connection;
use bifrost::direct::DirectConnection;
use bifrost::error::CatalogError;
use bifrost::models::{IndexKey, MediaType};
use bifrost::profile::{DirectEndpoint, Endpoint, ServerProfile};
use bifrost::register::register_single;
use bifrost::section::resolve_section;
use bifrost::server;

const MP4_HEADER: &[u8] = &[
    0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm', 0x00, 0x00, 0x02, 0x00,
    b'i', b's', b'o', b'm', b'm', b'p', b'4', b'1',
];

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

/// Start a server over a fresh store and return a client profile for it.
async fn start_server(tmp: &TempDir) -> (ServerProfile, u16) {
    let mut store = DirectConnection::new(DirectEndpoint {
        database: tmp.path().join("catalog.sqlite"),
        media_index: None,
    });
    store.connect().await.unwrap();

    let port = find_free_port();
    let bind = format!("127.0.0.1:{}", port);
    tokio::spawn(async move {
        server::run_server(Arc::new(store), &bind).await.unwrap();
    });
    wait_for_server(port).await;

    let profile = ServerProfile {
        name: "home1".into(),
        home: true,
        token: Some("secret".into()),
        rest: Some(Endpoint {
            host: "127.0.0.1".into(),
            port,
        }),
        direct: None,
    };
    (profile, port)
}

#[tokio::test]
async fn test_health() {
    let tmp = TempDir::new().unwrap();
    let (_, port) = start_server(&tmp).await;

    let resp = reqwest::get(format!("http://127.0.0.1:{}/health", port))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_sections_over_rest() {
    let tmp = TempDir::new().unwrap();
    let (profile, _) = start_server(&tmp).await;
    let client = RestClient::new(&profile, None).unwrap();
    assert_eq!(client.transport(), "rest");

    assert!(client.get_section("movies").await.unwrap().is_none());
    let created = client
        .create_section("movies", "/mnt/movies", MediaType::Video)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(created.collection, "files_movies");

    let again = client
        .create_section("movies", "/other", MediaType::Video)
        .await
        .unwrap();
    assert!(again.is_none());

    let sections = client.get_sections().await.unwrap();
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].name, "movies");

    assert!(matches!(
        resolve_section(&client, "books").await,
        Err(CatalogError::SectionNotFound { .. })
    ));
}

#[tokio::test]
async fn test_registration_over_rest() {
    let tmp = TempDir::new().unwrap();
    let (profile, _) = start_server(&tmp).await;
    let client = RestClient::new(&profile, None).unwrap();

    client
        .create_section("movies", "/mnt/movies", MediaType::Video)
        .await
        .unwrap();
    let section = resolve_section(&client, "movies").await.unwrap();

    let clip = tmp.path().join("clip.mp4");
    fs::write(&clip, MP4_HEADER).unwrap();
    let stored = register_single(&client, &section, &clip, "default-user")
        .await
        .unwrap();
    assert_eq!(stored.file_location, "/mnt/movies/clip.mp4");
    assert!(stored.id.is_some());

    let notes = tmp.path().join("notes.txt");
    fs::write(&notes, "text").unwrap();
    assert!(matches!(
        register_single(&client, &section, &notes, "default-user").await,
        Err(CatalogError::TypeMismatch { .. })
    ));

    let mut changed = MP4_HEADER.to_vec();
    changed.push(0xff);
    fs::write(&clip, changed).unwrap();
    match register_single(&client, &section, &clip, "default-user").await {
        Err(CatalogError::DuplicateLocation { existing_sha, .. }) => {
            assert_eq!(existing_sha, stored.file_sha)
        }
        other => panic!("expected DuplicateLocation, got {:?}", other),
    }

    let found = client
        .get_file(&stored.file_sha, Some(&section))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.file_name, "clip.mp4");
    assert!(client.get_file("absent", None).await.unwrap().is_none());

    let names = client.index(Some(&section), IndexKey::FileName).await.unwrap();
    assert_eq!(names, vec!["clip.mp4"]);
    let shas = client.search("CLIP", None, IndexKey::FileSha).await.unwrap();
    assert_eq!(shas, vec![stored.file_sha.clone()]);
}

#[tokio::test]
async fn test_unknown_scope_section_is_reported() {
    let tmp = TempDir::new().unwrap();
    let (profile, port) = start_server(&tmp).await;
    let client = RestClient::new(&profile, None).unwrap();

    let resp = reqwest::get(format!(
        "http://127.0.0.1:{}/index?section=ghost&key=file_name",
        port
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "section_not_found");

    assert!(matches!(
        client.get_file("x", None).await,
        Ok(None)
    ));
}
