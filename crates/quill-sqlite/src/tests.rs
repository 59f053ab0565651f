use chrono::{Duration, Utc};

use quill_core::{
    EntityId, Error, NewUser, NoteInput, NoteQuery, QuillService, Session, Store, Tag, User,
};

use crate::SqliteStore;

fn test_user(username: &str) -> User {
    User {
        id: EntityId::generate(),
        username: username.to_string(),
        full_name: None,
        // ownership tests never verify passwords, so skip the real hash
        password_hash: "unused".to_string(),
    }
}

/// A service over an in-memory store with two accounts already present.
async fn seeded() -> (QuillService<SqliteStore>, EntityId, EntityId) {
    let store = SqliteStore::open_in_memory().unwrap();
    let shuri = store.insert_user(test_user("shuri")).await.unwrap().id;
    let okoye = store.insert_user(test_user("okoye")).await.unwrap().id;
    (QuillService::new(store), shuri, okoye)
}

fn note_input(title: &str, content: &str) -> NoteInput {
    NoteInput {
        title: Some(title.to_string()),
        content: Some(content.to_string()),
        ..Default::default()
    }
}

fn assert_validation(err: Error, expected_location: &str) {
    match err {
        Error::Validation { location, .. } => {
            assert_eq!(location.as_deref(), Some(expected_location))
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

// --- users & authentication ---

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.insert_user(test_user("shuri")).await.unwrap();
    let err = store.insert_user(test_user("shuri")).await.unwrap_err();
    match err {
        Error::Conflict { location, .. } => assert_eq!(location.as_deref(), Some("username")),
        other => panic!("expected Conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn register_authenticate_round_trip() {
    let service = QuillService::new(SqliteStore::open_in_memory().unwrap());
    let profile = service
        .register(NewUser {
            username: Some("shuri".into()),
            password: Some("wakandaforever".into()),
            full_name: Some("  Shuri  ".into()),
        })
        .await
        .unwrap();
    assert_eq!(profile.username, "shuri");
    assert_eq!(profile.full_name.as_deref(), Some("Shuri"));

    let user = service.authenticate("shuri", "wakandaforever").await.unwrap();
    assert_eq!(user.id, profile.id);
    // the stored representation never contains the plaintext
    assert!(!user.password_hash.contains("wakandaforever"));

    let err = service.authenticate("shuri", "wrong-password").await.unwrap_err();
    assert!(matches!(err, Error::Authentication(_)));
    let err = service.authenticate("nobody", "wakandaforever").await.unwrap_err();
    assert!(matches!(err, Error::Authentication(_)));
}

#[tokio::test]
async fn register_validates_fields() {
    let service = QuillService::new(SqliteStore::open_in_memory().unwrap());

    let missing = NewUser {
        username: Some("shuri".into()),
        password: None,
        full_name: None,
    };
    assert_validation(service.register(missing).await.unwrap_err(), "password");

    let padded = NewUser {
        username: Some(" shuri".into()),
        password: Some("wakandaforever".into()),
        full_name: None,
    };
    assert_validation(service.register(padded).await.unwrap_err(), "username");

    let short = NewUser {
        username: Some("shuri".into()),
        password: Some("short".into()),
        full_name: None,
    };
    assert_validation(service.register(short).await.unwrap_err(), "password");

    let long = NewUser {
        username: Some("shuri".into()),
        password: Some("x".repeat(73)),
        full_name: None,
    };
    assert_validation(service.register(long).await.unwrap_err(), "password");
}

#[tokio::test]
async fn tokens_resolve_to_their_owner_until_expiry() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = store.insert_user(test_user("shuri")).await.unwrap();
    let service = QuillService::new(store);

    let session = service.issue_token(&user).await.unwrap();
    assert_eq!(service.verify_token(&session.token).await.unwrap(), user.id);

    let err = service.verify_token("not-a-token").await.unwrap_err();
    assert!(matches!(err, Error::Authentication(_)));
}

#[tokio::test]
async fn expired_token_is_rejected_and_removed() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = store.insert_user(test_user("shuri")).await.unwrap();
    let service =
        QuillService::new(store).with_token_ttl(Duration::seconds(-1));

    let session = service.issue_token(&user).await.unwrap();
    let err = service.verify_token(&session.token).await.unwrap_err();
    assert!(matches!(err, Error::TokenExpired));
    // the session was deleted on sight, so a retry is just an unknown token
    let err = service.verify_token(&session.token).await.unwrap_err();
    assert!(matches!(err, Error::Authentication(_)));
}

// --- folders ---

#[tokio::test]
async fn folder_names_are_unique_per_owner_not_globally() {
    let (service, shuri, okoye) = seeded().await;

    service.create_folder(&shuri, "Work").await.unwrap();
    // a different owner may reuse the name
    service.create_folder(&okoye, "Work").await.unwrap();

    let err = service.create_folder(&shuri, "Work").await.unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));
}

#[tokio::test]
async fn rename_folder_collision_is_a_conflict() {
    let (service, shuri, _) = seeded().await;
    service.create_folder(&shuri, "Work").await.unwrap();
    let personal = service.create_folder(&shuri, "Personal").await.unwrap();

    let err = service
        .rename_folder(&shuri, personal.id.as_str(), "Work")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));

    let renamed = service
        .rename_folder(&shuri, personal.id.as_str(), "Projects")
        .await
        .unwrap();
    assert_eq!(renamed.name, "Projects");
}

#[tokio::test]
async fn non_owned_folder_behaves_like_a_missing_one() {
    let (service, shuri, okoye) = seeded().await;
    let folder = service.create_folder(&shuri, "Work").await.unwrap();
    let id = folder.id.as_str();

    assert!(matches!(
        service.get_folder(&okoye, id).await.unwrap_err(),
        Error::NotFound(_)
    ));
    assert!(matches!(
        service.rename_folder(&okoye, id, "Stolen").await.unwrap_err(),
        Error::NotFound(_)
    ));
    assert!(matches!(
        service.delete_folder(&okoye, id).await.unwrap_err(),
        Error::NotFound(_)
    ));

    // the owner still sees it untouched
    let kept = service.get_folder(&shuri, id).await.unwrap();
    assert_eq!(kept.name, "Work");
}

#[tokio::test]
async fn folders_list_in_name_order() {
    let (service, shuri, _) = seeded().await;
    service.create_folder(&shuri, "Work").await.unwrap();
    service.create_folder(&shuri, "Archive").await.unwrap();
    service.create_folder(&shuri, "Personal").await.unwrap();

    let names: Vec<String> = service
        .list_folders(&shuri)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(names, vec!["Archive", "Personal", "Work"]);
}

#[tokio::test]
async fn deleting_a_folder_clears_exactly_its_references() {
    let (service, shuri, okoye) = seeded().await;
    let wakanda = service.create_folder(&shuri, "Wakanda").await.unwrap();
    let lab = service.create_folder(&shuri, "Lab").await.unwrap();
    let okoye_folder = service.create_folder(&okoye, "Wakanda").await.unwrap();

    let mut in_wakanda = note_input("Vibranium", "strongest metal");
    in_wakanda.folder_id = Some(wakanda.id.to_string());
    let n1 = service.create_note(&shuri, in_wakanda.clone()).await.unwrap();
    let n2 = service.create_note(&shuri, in_wakanda).await.unwrap();

    let mut in_lab = note_input("Gauntlets", "prototype v3");
    in_lab.folder_id = Some(lab.id.to_string());
    let n3 = service.create_note(&shuri, in_lab).await.unwrap();

    let mut okoye_input = note_input("Patrol", "border rotation");
    okoye_input.folder_id = Some(okoye_folder.id.to_string());
    let n4 = service.create_note(&okoye, okoye_input).await.unwrap();

    service.delete_folder(&shuri, wakanda.id.as_str()).await.unwrap();

    // both referencing notes survive with the folder cleared
    for note in [&n1, &n2] {
        let got = service.get_note(&shuri, note.id.as_str()).await.unwrap();
        assert!(got.folder.is_none());
        assert_eq!(got.title, note.title);
    }
    // a note in a different folder is untouched
    let got = service.get_note(&shuri, n3.id.as_str()).await.unwrap();
    assert_eq!(got.folder.as_ref().map(|f| f.id.clone()), Some(lab.id));
    // another owner's notes are untouched
    let got = service.get_note(&okoye, n4.id.as_str()).await.unwrap();
    assert_eq!(got.folder.as_ref().map(|f| f.id.clone()), Some(okoye_folder.id));
}

// --- tags ---

#[tokio::test]
async fn deleting_a_tag_pulls_only_that_tag() {
    let (service, shuri, _) = seeded().await;
    let science = service.create_tag(&shuri, "science").await.unwrap();
    let metals = service.create_tag(&shuri, "metals").await.unwrap();
    let lab = service.create_tag(&shuri, "lab").await.unwrap();

    let mut tagged_all = note_input("Vibranium", "strongest metal");
    tagged_all.tags = vec![
        science.id.to_string(),
        metals.id.to_string(),
        lab.id.to_string(),
    ];
    let n1 = service.create_note(&shuri, tagged_all).await.unwrap();

    let mut tagged_one = note_input("Herbs", "heart-shaped");
    tagged_one.tags = vec![science.id.to_string()];
    let n2 = service.create_note(&shuri, tagged_one).await.unwrap();

    service.delete_tag(&shuri, metals.id.as_str()).await.unwrap();

    let got = service.get_note(&shuri, n1.id.as_str()).await.unwrap();
    let mut names: Vec<String> = got.tags.iter().map(|t| t.name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["lab", "science"]);

    let got = service.get_note(&shuri, n2.id.as_str()).await.unwrap();
    let names: Vec<String> = got.tags.iter().map(|t| t.name.clone()).collect();
    assert_eq!(names, vec!["science"]);
}

#[tokio::test]
async fn tag_names_are_unique_per_owner() {
    let (service, shuri, okoye) = seeded().await;
    service.create_tag(&shuri, "science").await.unwrap();
    service.create_tag(&okoye, "science").await.unwrap();
    let err = service.create_tag(&shuri, "science").await.unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));
}

#[tokio::test]
async fn non_owned_tag_behaves_like_a_missing_one() {
    let (service, shuri, okoye) = seeded().await;
    let tag = service.create_tag(&shuri, "science").await.unwrap();
    assert!(matches!(
        service.get_tag(&okoye, tag.id.as_str()).await.unwrap_err(),
        Error::NotFound(_)
    ));
    assert!(matches!(
        service.delete_tag(&okoye, tag.id.as_str()).await.unwrap_err(),
        Error::NotFound(_)
    ));
}

// --- notes ---

#[tokio::test]
async fn note_round_trip_preserves_fields() {
    let (service, shuri, _) = seeded().await;
    let folder = service.create_folder(&shuri, "Wakanda").await.unwrap();
    let tag = service.create_tag(&shuri, "metals").await.unwrap();

    let mut input = note_input("Vibranium", "strongest metal");
    input.folder_id = Some(folder.id.to_string());
    input.tags = vec![tag.id.to_string()];

    let created = service.create_note(&shuri, input).await.unwrap();
    let got = service.get_note(&shuri, created.id.as_str()).await.unwrap();

    assert_eq!(got.title, "Vibranium");
    assert_eq!(got.content, "strongest metal");
    assert_eq!(got.folder.as_ref().map(|f| f.id.clone()), Some(folder.id));
    assert_eq!(got.tags.len(), 1);
    assert_eq!(got.tags[0].id, tag.id);
    assert_eq!(got.created_at, created.created_at);
}

#[tokio::test]
async fn note_requires_title_and_content() {
    let (service, shuri, _) = seeded().await;

    let err = service
        .create_note(&shuri, note_input("", "some content"))
        .await
        .unwrap_err();
    assert_validation(err, "title");

    let err = service
        .create_note(&shuri, note_input("A title", "  "))
        .await
        .unwrap_err();
    assert_validation(err, "content");
}

#[tokio::test]
async fn note_rejects_foreign_and_malformed_references() {
    let (service, shuri, okoye) = seeded().await;
    let foreign_folder = service.create_folder(&okoye, "Theirs").await.unwrap();
    let foreign_tag = service.create_tag(&okoye, "theirs").await.unwrap();

    let mut input = note_input("Vibranium", "strongest metal");
    input.folder_id = Some(foreign_folder.id.to_string());
    assert_validation(
        service.create_note(&shuri, input).await.unwrap_err(),
        "folderId",
    );

    let mut input = note_input("Vibranium", "strongest metal");
    input.folder_id = Some("no-such-id".to_string());
    assert_validation(
        service.create_note(&shuri, input).await.unwrap_err(),
        "folderId",
    );

    let mut input = note_input("Vibranium", "strongest metal");
    input.tags = vec![foreign_tag.id.to_string()];
    assert_validation(
        service.create_note(&shuri, input).await.unwrap_err(),
        "tags",
    );
}

#[tokio::test]
async fn duplicate_tag_references_collapse_to_a_set() {
    let (service, shuri, _) = seeded().await;
    let tag = service.create_tag(&shuri, "metals").await.unwrap();

    let mut input = note_input("Vibranium", "strongest metal");
    input.tags = vec![tag.id.to_string(), tag.id.to_string()];
    let created = service.create_note(&shuri, input).await.unwrap();
    assert_eq!(created.tags.len(), 1);
}

#[tokio::test]
async fn update_replaces_title_content_folder_and_tags() {
    let (service, shuri, _) = seeded().await;
    let folder = service.create_folder(&shuri, "Wakanda").await.unwrap();
    let old_tag = service.create_tag(&shuri, "draft").await.unwrap();
    let new_tag = service.create_tag(&shuri, "final").await.unwrap();

    let mut input = note_input("Vibranium", "strongest metal");
    input.folder_id = Some(folder.id.to_string());
    input.tags = vec![old_tag.id.to_string()];
    let created = service.create_note(&shuri, input).await.unwrap();

    let mut replacement = note_input("Vibranium, revised", "even stronger");
    replacement.tags = vec![new_tag.id.to_string()];
    let updated = service
        .update_note(&shuri, created.id.as_str(), replacement)
        .await
        .unwrap();

    assert_eq!(updated.title, "Vibranium, revised");
    assert_eq!(updated.content, "even stronger");
    assert!(updated.folder.is_none());
    let names: Vec<String> = updated.tags.iter().map(|t| t.name.clone()).collect();
    assert_eq!(names, vec!["final"]);
}

#[tokio::test]
async fn non_owned_note_behaves_like_a_missing_one() {
    let (service, shuri, okoye) = seeded().await;
    let note = service
        .create_note(&shuri, note_input("Vibranium", "strongest metal"))
        .await
        .unwrap();
    let id = note.id.as_str();

    assert!(matches!(
        service.get_note(&okoye, id).await.unwrap_err(),
        Error::NotFound(_)
    ));
    assert!(matches!(
        service
            .update_note(&okoye, id, note_input("Mine", "now"))
            .await
            .unwrap_err(),
        Error::NotFound(_)
    ));
    assert!(matches!(
        service.delete_note(&okoye, id).await.unwrap_err(),
        Error::NotFound(_)
    ));
}

#[tokio::test]
async fn malformed_note_id_is_rejected_before_the_store() {
    let (service, shuri, _) = seeded().await;
    for raw in ["", "xyz", "UPPERCASE0123456789abcdef0123456"] {
        assert!(matches!(
            service.get_note(&shuri, raw).await.unwrap_err(),
            Error::Validation { .. }
        ));
        assert!(matches!(
            service.delete_note(&shuri, raw).await.unwrap_err(),
            Error::Validation { .. }
        ));
    }
}

#[tokio::test]
async fn notes_list_newest_first_and_filter_by_folder() {
    let (service, shuri, _) = seeded().await;
    let folder = service.create_folder(&shuri, "Wakanda").await.unwrap();

    let first = service
        .create_note(&shuri, note_input("First", "one"))
        .await
        .unwrap();
    let mut input = note_input("Second", "two");
    input.folder_id = Some(folder.id.to_string());
    let second = service.create_note(&shuri, input).await.unwrap();

    let all = service.list_notes(&shuri, NoteQuery::default()).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    // created_at descending; ties broken by id, so just check membership
    assert!(ids.contains(&first.id.as_str()));
    assert!(ids.contains(&second.id.as_str()));

    let filtered = service
        .list_notes(
            &shuri,
            NoteQuery {
                folder_id: Some(folder.id.to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].id, second.id);
}

// --- search ---

#[tokio::test]
async fn search_finds_content_only_matches_and_stays_owner_scoped() {
    let (service, shuri, okoye) = seeded().await;
    service
        .create_note(&shuri, note_input("Field notes", "vibranium deposits"))
        .await
        .unwrap();
    service
        .create_note(&okoye, note_input("Stolen research", "vibranium deposits"))
        .await
        .unwrap();
    service
        .create_note(&shuri, note_input("Unrelated", "gardening tips"))
        .await
        .unwrap();

    let results = service
        .list_notes(
            &shuri,
            NoteQuery {
                search_term: Some("vibranium".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "Field notes");
    assert_eq!(results[0].owner_id, shuri);
}

#[tokio::test]
async fn search_ranks_title_matches_above_content_matches() {
    let (service, shuri, _) = seeded().await;
    service
        .create_note(&shuri, note_input("Archive", "mentions vibranium once"))
        .await
        .unwrap();
    service
        .create_note(&shuri, note_input("Vibranium", "the metal itself"))
        .await
        .unwrap();

    let results = service
        .list_notes(
            &shuri,
            NoteQuery {
                search_term: Some("vibranium".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].title, "Vibranium");
}

// --- projection ---

#[tokio::test]
async fn list_projection_populates_folder_and_tags() {
    let (service, shuri, _) = seeded().await;
    let folder = service.create_folder(&shuri, "Wakanda").await.unwrap();
    let tag = service.create_tag(&shuri, "metals").await.unwrap();

    let mut input = note_input("Vibranium", "strongest metal");
    input.folder_id = Some(folder.id.to_string());
    input.tags = vec![tag.id.to_string()];
    service.create_note(&shuri, input).await.unwrap();

    let notes = service.list_notes(&shuri, NoteQuery::default()).await.unwrap();
    assert_eq!(notes.len(), 1);
    let note = &notes[0];
    assert_eq!(note.folder.as_ref().map(|f| f.name.as_str()), Some("Wakanda"));
    assert_eq!(
        note.tags.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        vec!["metals"]
    );
}

#[tokio::test]
async fn populated_tags_come_back_sorted_by_name() {
    let (service, shuri, _) = seeded().await;
    let zebra = service.create_tag(&shuri, "zebra").await.unwrap();
    let alpha = service.create_tag(&shuri, "alpha").await.unwrap();

    let mut input = note_input("Vibranium", "strongest metal");
    input.tags = vec![zebra.id.to_string(), alpha.id.to_string()];
    let created = service.create_note(&shuri, input).await.unwrap();

    let names: Vec<&str> = created.tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "zebra"]);
}

// --- store-level details ---

#[tokio::test]
async fn tag_store_rows_are_owner_scoped() {
    let store = SqliteStore::open_in_memory().unwrap();
    let shuri = store.insert_user(test_user("shuri")).await.unwrap().id;
    let okoye = store.insert_user(test_user("okoye")).await.unwrap().id;

    store
        .insert_tag(Tag {
            id: EntityId::generate(),
            name: "science".into(),
            owner_id: shuri.clone(),
        })
        .await
        .unwrap();

    assert_eq!(store.list_tags(&shuri).await.unwrap().len(), 1);
    assert!(store.list_tags(&okoye).await.unwrap().is_empty());
}

#[tokio::test]
async fn sessions_can_be_deleted() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = store.insert_user(test_user("shuri")).await.unwrap();

    store
        .insert_session(Session {
            token: "session-token".into(),
            user_id: user.id.clone(),
            expires_at: Utc::now() + Duration::hours(1),
        })
        .await
        .unwrap();

    assert!(store.delete_session("session-token").await.unwrap());
    assert!(store.find_session("session-token").await.unwrap().is_none());
    // deleting again reports that nothing was there
    assert!(!store.delete_session("session-token").await.unwrap());
}
