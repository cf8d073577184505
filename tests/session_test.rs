use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread,
    time::Duration,
};

use drive_script_sync::{
    auth::{Credential, CredentialProvider, TokenCredentials},
    commands,
    drive::{
        DriveQuery, FileMetadata, MemoryStore, RemoteFileLister, RemoteStore, FOLDER_MIME_TYPE,
        PROJECT_MIME_TYPE, SCRIPT_MIME_TYPE,
    },
    error::{SyncError, VALIDATION_DETAILS_UNAVAILABLE},
    script::{ScriptInfo, ScriptProject, WireFile},
    session::SyncSession,
    workspace::{FileStatus, LocalWorkspace},
};
use tempfile::TempDir;

const PROJECT_ID: &str = "p1";

fn wire(id: &str, name: &str, tag: &str, source: &str) -> WireFile {
    WireFile {
        id: Some(id.to_string()),
        name: Some(name.to_string()),
        file_type: tag.to_string(),
        source: Some(source.to_string()),
    }
}

/// Store holding one project with a single `Code.gs`
fn project_store() -> Arc<MemoryStore> {
    let store = MemoryStore::new("root");
    store.insert_project(
        FileMetadata::new(PROJECT_ID, "Mailer", SCRIPT_MIME_TYPE).with_parent("root"),
        vec![wire("A", "Code", "server_js", "function main() {}")],
    );
    Arc::new(store)
}

/// Session connected to `store`, counting how often it connects
fn session_for(store: Arc<MemoryStore>, dir: &TempDir) -> (SyncSession, Arc<AtomicUsize>) {
    let connects = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connects);
    let connector = move |_: &Credential| -> Result<Arc<dyn RemoteStore>, SyncError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(store.clone())
    };

    let session = SyncSession::new(
        Box::new(TokenCredentials::with_token(dir.path().join("token"), "tok")),
        Box::new(connector),
        PROJECT_MIME_TYPE,
    );
    (session, connects)
}

fn names(items: &[FileMetadata]) -> Vec<&str> {
    items.iter().map(|m| m.id.as_str()).collect()
}

#[test]
fn test_write_reconciles_new_file_ids() {
    let temp = TempDir::new().unwrap();
    let store = project_store();
    store.set_next_id(42);
    let (session, _) = session_for(store.clone(), &temp);

    let mut project = session.read_project(PROJECT_ID).unwrap();
    project.files.insert(
        "foo.html".to_string(),
        ScriptInfo::unsynced("foo", "html", "<p>hi</p>"),
    );

    let assigned = session.write_project(&project, &BTreeSet::new()).unwrap();

    let expected: BTreeMap<String, ScriptInfo> = [(
        "foo.html".to_string(),
        ScriptInfo::new(
            Some("foo".to_string()),
            Some("X42".to_string()),
            "html",
            Some("<p>hi</p>".to_string()),
        ),
    )]
    .into_iter()
    .collect();
    assert_eq!(assigned, expected);

    // Code.gs was sent by id only, so its source is untouched
    let stored = store.project_files(PROJECT_ID).unwrap();
    assert_eq!(stored[0], wire("A", "Code", "server_js", "function main() {}"));
    assert_eq!(stored[1], wire("X42", "foo", "html", "<p>hi</p>"));
}

#[test]
fn test_write_sends_modified_sources() {
    let temp = TempDir::new().unwrap();
    let store = project_store();
    let (session, _) = session_for(store.clone(), &temp);

    let mut project = session.read_project(PROJECT_ID).unwrap();
    project.files.insert(
        "Code.gs".to_string(),
        ScriptInfo::new(
            Some("Code".to_string()),
            Some("A".to_string()),
            "server_js",
            Some("function main() { return 1; }".to_string()),
        ),
    );
    let modified: BTreeSet<String> = ["Code".to_string()].into_iter().collect();

    let assigned = session.write_project(&project, &modified).unwrap();
    assert!(assigned.is_empty());

    let reread = session.read_project(PROJECT_ID).unwrap();
    assert_eq!(
        reread.files["Code.gs"].contents(),
        Some("function main() { return 1; }")
    );
}

#[test]
fn test_omitted_file_is_deleted() {
    let temp = TempDir::new().unwrap();
    let store = MemoryStore::new("root");
    store.insert_project(
        FileMetadata::new(PROJECT_ID, "Mailer", SCRIPT_MIME_TYPE),
        vec![
            wire("A", "Code", "server_js", "a"),
            wire("B", "Old", "server_js", "b"),
        ],
    );
    let store = Arc::new(store);
    let (session, _) = session_for(store.clone(), &temp);

    let mut project = session.read_project(PROJECT_ID).unwrap();
    project.files.remove("Old.gs");
    session.write_project(&project, &BTreeSet::new()).unwrap();

    let stored = store.project_files(PROJECT_ID).unwrap();
    assert_eq!(stored, vec![wire("A", "Code", "server_js", "a")]);
}

#[test]
fn test_unchanged_write_keeps_nameless_files() {
    let temp = TempDir::new().unwrap();
    let store = MemoryStore::new("root");
    store.insert_project(
        FileMetadata::new(PROJECT_ID, "Mailer", SCRIPT_MIME_TYPE),
        vec![
            wire("A", "Code", "server_js", "a"),
            WireFile {
                id: Some("B".to_string()),
                name: None,
                file_type: "server_js".to_string(),
                source: Some("b".to_string()),
            },
        ],
    );
    let store = Arc::new(store);
    let (session, _) = session_for(store.clone(), &temp);

    let by_id = |mut files: Vec<WireFile>| {
        files.sort_by(|a, b| a.id.cmp(&b.id));
        files
    };
    let before = by_id(store.project_files(PROJECT_ID).unwrap());
    let project = session.read_project(PROJECT_ID).unwrap();
    assert_eq!(project.files.len(), 2);
    assert_eq!(project.files["B.gs"].document_id(), Some("B"));

    session.write_project(&project, &BTreeSet::new()).unwrap();
    assert_eq!(by_id(store.project_files(PROJECT_ID).unwrap()), before);
}

#[test]
fn test_content_rejection_is_remote_validation() {
    let temp = TempDir::new().unwrap();
    let store = project_store();
    store.fail_updates_with(400, "Syntax error: missing ; before statement line: 3");
    let (session, _) = session_for(store, &temp);

    let project = session.read_project(PROJECT_ID).unwrap();
    match session.write_project(&project, &BTreeSet::new()) {
        Err(SyncError::RemoteValidation { details, cause }) => {
            assert_eq!(details, VALIDATION_DETAILS_UNAVAILABLE);
            assert_eq!(cause.status(), Some(400));
        }
        other => panic!("expected RemoteValidation, got {:?}", other),
    }
}

#[test]
fn test_other_write_failure_stays_transport() {
    let temp = TempDir::new().unwrap();
    let store = project_store();
    store.fail_updates_with(503, "Backend Error");
    let (session, _) = session_for(store, &temp);

    let project = session.read_project(PROJECT_ID).unwrap();
    let err = session
        .write_project(&project, &BTreeSet::new())
        .unwrap_err();
    assert!(err.is_transport());
    assert!(!err.is_remote_validation());
}

#[test]
fn test_new_file_missing_after_write_is_protocol_violation() {
    let temp = TempDir::new().unwrap();
    let store = project_store();
    store.drop_created_files();
    let (session, _) = session_for(store, &temp);

    let mut project = session.read_project(PROJECT_ID).unwrap();
    project
        .files
        .insert("foo.html".to_string(), ScriptInfo::unsynced("foo", "html", "x"));

    let err = session
        .write_project(&project, &BTreeSet::new())
        .unwrap_err();
    assert!(matches!(err, SyncError::ProtocolViolation(_)));
}

#[test]
fn test_malformed_project_degrades_to_empty() {
    let temp = TempDir::new().unwrap();
    let store = project_store();
    store.corrupt_exports();
    let (session, _) = session_for(store, &temp);

    let project = session.read_project(PROJECT_ID).unwrap();
    assert_eq!(project.file_id, PROJECT_ID);
    assert!(project.files.is_empty());

    assert!(matches!(
        session.read_project_strict(PROJECT_ID),
        Err(SyncError::MalformedResponse(_))
    ));
}

#[test]
fn test_corrupt_echo_after_write_is_malformed() {
    let temp = TempDir::new().unwrap();
    let store = project_store();
    let (session, _) = session_for(store.clone(), &temp);

    let project = ScriptProject::new(
        PROJECT_ID,
        [(
            "foo.html".to_string(),
            ScriptInfo::unsynced("foo", "html", "x"),
        )]
        .into_iter()
        .collect(),
    );
    store.corrupt_exports();

    assert!(matches!(
        session.write_project(&project, &BTreeSet::new()),
        Err(SyncError::MalformedResponse(_))
    ));
}

#[test]
fn test_lister_collects_every_page() {
    let store = MemoryStore::new("root").with_page_size(3);
    for i in 0..8 {
        store.insert_file(FileMetadata::new(format!("s{}", i), "script", SCRIPT_MIME_TYPE));
    }
    store.insert_file(FileMetadata::new("f", "folder", FOLDER_MIME_TYPE));

    let query = DriveQuery::mime_type(SCRIPT_MIME_TYPE).to_string();
    let items = RemoteFileLister::new(&store).list(&query).unwrap();

    assert_eq!(
        names(&items),
        vec!["s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7"]
    );
    assert_eq!(store.list_calls(), 3);
}

#[test]
fn test_folder_cache_leaves_and_folders() {
    let temp = TempDir::new().unwrap();
    let store = MemoryStore::new("root").with_page_size(2);
    store.insert_file(FileMetadata::new("f1", "Work", FOLDER_MIME_TYPE).with_parent("root"));
    store.insert_file(FileMetadata::new("f2", "Archive", FOLDER_MIME_TYPE).with_parent("f1"));
    store.insert_file(FileMetadata::new("s1", "Mailer", SCRIPT_MIME_TYPE).with_parent("f1"));
    store.insert_file(FileMetadata::new("s2", "Report", SCRIPT_MIME_TYPE).with_parent("f2"));
    store.insert_file(FileMetadata::new("s3", "Loose", SCRIPT_MIME_TYPE).with_parent("root"));
    let mut trashed = FileMetadata::new("f3", "Trash", FOLDER_MIME_TYPE).with_parent("root");
    trashed.labels.trashed = true;
    store.insert_file(trashed);
    let (session, _) = session_for(Arc::new(store), &temp);

    let query = DriveQuery::mime_type(SCRIPT_MIME_TYPE).not_trashed().to_string();
    let cache = session.build_folder_cache(&query).unwrap();

    assert_eq!(cache.root_id(), "root");
    assert_eq!(cache.len(), 5);
    for leaf in ["s1", "s2", "s3"] {
        assert!(cache.is_leaf(leaf), "{} should be a leaf", leaf);
    }
    for folder in ["f1", "f2"] {
        assert!(!cache.is_leaf(folder), "{} should not be a leaf", folder);
    }
    assert!(cache.metadata("f3").is_none());

    let root_children: Vec<&str> = cache.children_of("root").iter().map(String::as_str).collect();
    assert_eq!(root_children, vec!["f1", "s3"]);
    let work_children: Vec<&str> = cache.children_of("f1").iter().map(String::as_str).collect();
    assert_eq!(work_children, vec!["f2", "s1"]);

    assert!(cache.children_of("unknown").is_empty());
    assert!(!cache.is_leaf("unknown"));
}

#[test]
fn test_folder_cache_uses_session_folder_type() {
    let temp = TempDir::new().unwrap();
    let store = MemoryStore::new("root");
    store.insert_file(FileMetadata::new("f1", "Work", FOLDER_MIME_TYPE).with_parent("root"));
    store.insert_file(FileMetadata::new("t1", "Team", "application/x-team-folder").with_parent("root"));
    store.insert_file(FileMetadata::new("s1", "Mailer", SCRIPT_MIME_TYPE).with_parent("t1"));
    let (session, _) = session_for(Arc::new(store), &temp);
    let session = session.with_folder_mime_type("application/x-team-folder");

    let query = DriveQuery::mime_type(SCRIPT_MIME_TYPE).not_trashed().to_string();
    let cache = session.build_folder_cache(&query).unwrap();

    assert!(cache.metadata("f1").is_none());
    assert!(cache.children_of("t1").contains("s1"));
}

#[test]
fn test_folder_cache_listing_failure_aborts() {
    let temp = TempDir::new().unwrap();
    let store = MemoryStore::new("root").with_page_size(1);
    store.insert_file(FileMetadata::new("s1", "a", SCRIPT_MIME_TYPE));
    store.insert_file(FileMetadata::new("s2", "b", SCRIPT_MIME_TYPE));
    store.fail_list_page(1);
    let (session, _) = session_for(Arc::new(store), &temp);

    let query = DriveQuery::mime_type(SCRIPT_MIME_TYPE).to_string();
    assert!(session.build_folder_cache(&query).unwrap_err().is_transport());
}

#[test]
fn test_connection_is_reused_until_logout() {
    let temp = TempDir::new().unwrap();
    let (session, connects) = session_for(project_store(), &temp);

    assert!(!session.is_connected());
    session.read_project(PROJECT_ID).unwrap();
    session.read_project(PROJECT_ID).unwrap();
    assert!(session.is_connected());
    assert_eq!(connects.load(Ordering::SeqCst), 1);

    session.on_logout();
    assert!(!session.is_connected());

    session.ensure_connection().unwrap();
    assert_eq!(connects.load(Ordering::SeqCst), 2);
}

#[test]
fn test_concurrent_callers_share_one_connection() {
    const CALLERS: usize = 8;

    let temp = TempDir::new().unwrap();
    let store = project_store();
    let connects = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connects);
    let connector = move |_: &Credential| -> Result<Arc<dyn RemoteStore>, SyncError> {
        counter.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        Ok(store.clone())
    };
    let session = Arc::new(SyncSession::new(
        Box::new(TokenCredentials::with_token(temp.path().join("token"), "tok")),
        Box::new(connector),
        PROJECT_MIME_TYPE,
    ));

    let barrier = Arc::new(Barrier::new(CALLERS));
    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let session = Arc::clone(&session);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                session.ensure_connection().map(|_| ())
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    assert!(session.is_connected());
    assert_eq!(connects.load(Ordering::SeqCst), 1);
}

/// Provider that only hands out a credential after `log_in`
#[derive(Default)]
struct FakeCredentials {
    logged_in: AtomicBool,
    refuse_login: bool,
    login_attempts: AtomicUsize,
}

impl CredentialProvider for FakeCredentials {
    fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    fn log_in(&self, _prompt: bool) -> Result<(), SyncError> {
        self.login_attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse_login {
            return Err(SyncError::Auth("login cancelled".to_string()));
        }
        self.logged_in.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn credential(&self) -> Result<Credential, SyncError> {
        if self.is_logged_in() {
            Ok(Credential::new("fake"))
        } else {
            Err(SyncError::Auth("not logged in".to_string()))
        }
    }

    fn log_out(&self) -> Result<(), SyncError> {
        self.logged_in.store(false, Ordering::SeqCst);
        Ok(())
    }
}

fn fake_session(credentials: FakeCredentials, store: Arc<MemoryStore>) -> SyncSession {
    let connector = move |credential: &Credential| -> Result<Arc<dyn RemoteStore>, SyncError> {
        assert_eq!(credential.access_token(), "fake");
        Ok(store.clone())
    };
    SyncSession::new(Box::new(credentials), Box::new(connector), PROJECT_MIME_TYPE)
}

#[test]
fn test_connect_logs_in_first() {
    let session = fake_session(FakeCredentials::default(), project_store());

    session.ensure_connection().unwrap();
    assert!(session.is_connected());

    session.log_out().unwrap();
    assert!(!session.is_connected());
}

#[test]
fn test_failed_login_leaves_session_disconnected() {
    let credentials = FakeCredentials {
        refuse_login: true,
        ..FakeCredentials::default()
    };
    let session = fake_session(credentials, project_store());

    assert!(matches!(
        session.read_project(PROJECT_ID),
        Err(SyncError::Auth(_))
    ));
    assert!(!session.is_connected());
}

#[test]
fn test_pull_edit_push_round() {
    let temp = TempDir::new().unwrap();
    let workdir = temp.path().join("mailer");
    let store = project_store();
    store.set_next_id(42);
    let (session, _) = session_for(store.clone(), &temp);
    let workspace = LocalWorkspace::new(&workdir);

    let mut out = Vec::new();
    commands::pull::handle(&session, &workspace, PROJECT_ID, &mut out).unwrap();
    assert_eq!(
        fs::read_to_string(workdir.join("Code.gs")).unwrap(),
        "function main() {}"
    );

    fs::write(workdir.join("page.html"), "<p>hi</p>").unwrap();
    let statuses = workspace.status().unwrap();
    assert_eq!(
        statuses,
        vec![
            ("Code.gs".to_string(), FileStatus::Unchanged),
            ("page.html".to_string(), FileStatus::New),
        ]
    );

    let mut out = Vec::new();
    commands::push::handle(&session, &workspace, &mut out).unwrap();
    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("created page.html (X42)"), "{}", printed);

    let state = workspace.read_state().unwrap();
    assert_eq!(state.files["page.html"].document_id.as_deref(), Some("X42"));
    assert_eq!(store.update_calls(), 1);

    // Nothing changed since the push
    let mut out = Vec::new();
    commands::push::handle(&session, &workspace, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "Nothing to push\n");
    assert_eq!(store.update_calls(), 1);
}

#[test]
fn test_push_reports_rejected_content() {
    let temp = TempDir::new().unwrap();
    let workdir = temp.path().join("mailer");
    let store = project_store();
    let (session, _) = session_for(store.clone(), &temp);
    let workspace = LocalWorkspace::new(&workdir);

    commands::pull::handle(&session, &workspace, PROJECT_ID, &mut Vec::new()).unwrap();
    fs::write(workdir.join("Code.gs"), "function main( {").unwrap();
    store.fail_updates_with(400, "Syntax error. line: 1");

    let err = commands::push::handle(&session, &workspace, &mut Vec::new()).unwrap_err();
    assert!(err.to_string().contains("rejected the script content"));
    assert!(err
        .downcast_ref::<SyncError>()
        .is_some_and(SyncError::is_remote_validation));

    // State still describes the last successful sync
    assert_eq!(
        workspace.status().unwrap(),
        vec![("Code.gs".to_string(), FileStatus::Modified)]
    );
}
