use anyhow::Result;

use super::parse_session_document;
use super::ImportError;
use super::SessionStore;
use crate::domain::models::Message;
use crate::domain::models::Role;
use crate::domain::models::Session;
use crate::domain::models::SessionCollection;
use crate::infrastructure::storage::MemoryStorage;

async fn new_store() -> Result<(SessionStore, MemoryStorage)> {
    let storage = MemoryStorage::default();
    let store = SessionStore::load(Box::new(storage.clone())).await?;
    return Ok((store, storage));
}

#[test]
fn it_creates_ids_from_a_timestamp_and_suffix() {
    let id = SessionStore::create_id();
    let parts = id.split('-').collect::<Vec<&str>>();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "session");
    assert!(parts[1].parse::<i64>().is_ok());
    assert_eq!(parts[2].len(), 8);
}

#[tokio::test]
async fn it_loads_persisted_sessions() -> Result<()> {
    let mut sessions = SessionCollection::new();
    sessions.insert("session-1-aaaa".to_string(), Session::new("llama3"));
    let storage = MemoryStorage::with_sessions(sessions);

    let store = SessionStore::load(Box::new(storage.clone())).await?;
    assert_eq!(store.list().len(), 1);
    assert_eq!(store.get("session-1-aaaa").unwrap().llm, "llama3");
    assert!(store.active().is_none());
    assert_eq!(storage.writes(), 0);

    return Ok(());
}

#[tokio::test]
async fn it_creates_and_selects_sessions() -> Result<()> {
    let (mut store, storage) = new_store().await?;

    let id = store.create_session("llama3").await?;
    assert_eq!(store.active_id(), Some(id.as_str()));
    assert_eq!(store.active().unwrap(), &Session::new("llama3"));
    assert_eq!(storage.writes(), 1);
    assert_eq!(storage.saved().get(&id).unwrap().llm, "llama3");

    return Ok(());
}

#[tokio::test]
async fn it_persists_every_appended_message() -> Result<()> {
    let (mut store, storage) = new_store().await?;
    let id = store.create_session("llama3").await?;

    store.append_message(&id, Role::User, "Hi").await?;
    assert_eq!(storage.writes(), 2);
    store.append_message(&id, Role::Assistant, "Hello!").await?;
    assert_eq!(storage.writes(), 3);

    let saved = storage.saved();
    assert_eq!(
        saved.get(&id).unwrap().messages,
        vec![Message::user("Hi"), Message::assistant("Hello!")]
    );

    return Ok(());
}

#[tokio::test]
async fn it_fails_to_append_to_unknown_sessions() -> Result<()> {
    let (mut store, storage) = new_store().await?;

    let res = store.append_message("missing", Role::User, "Hi").await;
    assert!(res.is_err());
    assert!(store.list().is_empty());
    assert_eq!(storage.writes(), 0);

    return Ok(());
}

#[tokio::test]
async fn it_reconstructs_the_prompt_from_stored_messages() -> Result<()> {
    let (mut store, _) = new_store().await?;
    let id = store.create_session("llama3").await?;

    let turns = [
        (Role::Assistant, "Hello! How can I help?"),
        (Role::User, "Hi"),
        (Role::Assistant, "Hey there."),
        (Role::User, "Tell me a joke"),
    ];
    for (role, content) in turns {
        store.append_message(&id, role, content).await?;
    }

    let prompt = store.render_prompt(&id)?;
    assert_eq!(
        prompt.as_str(),
        "Assistente: Hello! How can I help?\nUsuário: Hi\nAssistente: Hey there.\nUsuário: Tell me a joke\nAssistente: "
    );

    return Ok(());
}

#[tokio::test]
async fn it_deletes_the_active_session() -> Result<()> {
    let (mut store, storage) = new_store().await?;
    let first = store.create_session("llama3").await?;
    let second = store.create_session("mistral").await?;
    assert_eq!(store.active_id(), Some(second.as_str()));

    store.delete_session(&second).await?;
    assert!(store.active_id().is_none());
    assert!(store.active().is_none());
    assert!(store.get(&second).is_none());
    assert!(store.get(&first).is_some());
    assert!(!storage.saved().contains_key(&second));

    return Ok(());
}

#[tokio::test]
async fn it_keeps_the_selection_when_deleting_another_session() -> Result<()> {
    let (mut store, _) = new_store().await?;
    let first = store.create_session("llama3").await?;
    let second = store.create_session("mistral").await?;

    store.select_session(&first)?;
    store.delete_session(&second).await?;
    assert_eq!(store.active_id(), Some(first.as_str()));

    return Ok(());
}

#[tokio::test]
async fn it_fails_to_select_unknown_sessions() -> Result<()> {
    let (mut store, _) = new_store().await?;
    assert!(store.select_session("missing").is_err());
    assert!(store.active_id().is_none());
    return Ok(());
}

#[tokio::test]
async fn it_imports_sessions_under_fresh_ids() -> Result<()> {
    let (mut store, storage) = new_store().await?;
    let payload = r#"{"llm":"llama3","messages":[{"role":"user","content":"Hi"}]}"#;

    let first = store.import_session(payload).await?;
    let second = store.import_session(payload).await?;

    assert_ne!(first, second);
    assert_eq!(store.list().len(), 2);
    assert_eq!(store.get(&first), store.get(&second));
    assert_eq!(store.active_id(), Some(second.as_str()));
    assert_eq!(storage.saved().len(), 2);

    return Ok(());
}

#[tokio::test]
async fn it_imports_sessions_with_empty_messages() -> Result<()> {
    let (mut store, _) = new_store().await?;
    let existing = store.create_session("llama3").await?;

    let id = store
        .import_session(r#"{"llm":"llama3","messages":[]}"#)
        .await?;
    assert_ne!(id, existing);
    assert_eq!(store.get(&id).unwrap(), &Session::new("llama3"));

    return Ok(());
}

#[tokio::test]
async fn it_rejects_invalid_imports_without_mutating() -> Result<()> {
    let (mut store, storage) = new_store().await?;
    let id = store.create_session("llama3").await?;
    let before = store.list().clone();
    let writes = storage.writes();

    let payloads = [
        r#"{"messages":[]}"#,
        r#"{"llm":"","messages":[]}"#,
        r#"{"llm":"llama3"}"#,
        r#"{"llm":"llama3","messages":"Hi"}"#,
        r#"{"llm":"llama3","messages":{"role":"user"}}"#,
        r#"{"llm":"llama3","messages":[{"role":"robot","content":"Hi"}]}"#,
        "not json",
    ];
    for payload in payloads {
        assert!(store.import_session(payload).await.is_err(), "{payload}");
    }

    assert_eq!(store.list(), &before);
    assert_eq!(store.active_id(), Some(id.as_str()));
    assert_eq!(storage.writes(), writes);

    return Ok(());
}

#[test]
fn it_reports_why_a_document_is_invalid() {
    assert!(matches!(
        parse_session_document("{"),
        Err(ImportError::InvalidJson(_))
    ));
    assert!(matches!(
        parse_session_document(r#"{"llm":5,"messages":[]}"#),
        Err(ImportError::MissingModel)
    ));
    assert!(matches!(
        parse_session_document(r#"{"llm":"llama3","messages":null}"#),
        Err(ImportError::MessagesNotArray)
    ));
    assert!(matches!(
        parse_session_document(r#"{"llm":"llama3","messages":[{"content":"Hi"}]}"#),
        Err(ImportError::InvalidMessage(_))
    ));
}

#[tokio::test]
async fn it_exports_sessions_in_the_import_format() -> Result<()> {
    let (mut store, _) = new_store().await?;
    let id = store.create_session("llama3").await?;
    store.append_message(&id, Role::User, "Hi").await?;
    store.append_message(&id, Role::Assistant, "Hello!").await?;

    let exported = store.export_session(&id)?;
    let session = parse_session_document(&exported)?;
    assert_eq!(store.get(&id), Some(&session));

    assert!(store.export_session("missing").is_err());

    return Ok(());
}

#[tokio::test]
async fn it_clears_all_sessions() -> Result<()> {
    let (mut store, storage) = new_store().await?;
    store.create_session("llama3").await?;
    store.create_session("mistral").await?;

    store.clear().await?;
    assert!(store.list().is_empty());
    assert!(store.active_id().is_none());
    assert!(storage.saved().is_empty());

    return Ok(());
}

#[tokio::test]
async fn it_keeps_memory_unchanged_when_writes_fail() -> Result<()> {
    let (mut store, storage) = new_store().await?;
    let first = store.create_session("llama3").await?;
    store.append_message(&first, Role::User, "Hi").await?;
    let second = store.create_session("mistral").await?;
    let before = store.list().clone();

    storage.fail_writes(true);

    assert!(store.create_session("codellama").await.is_err());
    assert!(store
        .append_message(&first, Role::Assistant, "Hello!")
        .await
        .is_err());
    assert!(store.delete_session(&second).await.is_err());
    assert!(store.clear().await.is_err());
    assert!(store
        .import_session(r#"{"llm":"llama3","messages":[]}"#)
        .await
        .is_err());

    assert_eq!(store.list(), &before);
    assert_eq!(store.active_id(), Some(second.as_str()));
    assert_eq!(storage.saved(), before);

    // A later successful write must not carry any of the failed changes.
    storage.fail_writes(false);
    store.append_message(&second, Role::User, "Hey").await?;
    assert_eq!(storage.saved().len(), 2);
    assert_eq!(storage.saved().get(&first).unwrap().messages.len(), 1);

    return Ok(());
}
