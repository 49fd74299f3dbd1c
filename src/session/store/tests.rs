use super::*;

#[test]
fn create_and_read() {
    let store = InMemorySessionStore::new();
    assert!(store.is_empty());

    let id = store.create(Dosha::Pitta);
    let state = store.read(id).expect("session should exist");

    assert_eq!(state.dosha, Dosha::Pitta);
    assert!(state.transcript.is_empty());
    assert_eq!(state.created_at, state.last_active);
    assert_eq!(store.len(), 1);
}

#[test]
fn ids_are_unique() {
    let store = InMemorySessionStore::new();
    let first = store.create(Dosha::Vata);
    let second = store.create(Dosha::Vata);
    assert_ne!(first, second);
    assert_eq!(store.len(), 2);
}

#[test]
fn update_replaces_state() {
    let store = InMemorySessionStore::new();
    let id = store.create(Dosha::Vata);

    let mut state = store.read(id).expect("session should exist");
    state.dosha = Dosha::Kapha;
    store.update(id, state).expect("update should succeed");

    assert_eq!(store.read(id).expect("session should exist").dosha, Dosha::Kapha);
}

#[test]
fn update_unknown_session_fails() {
    let store = InMemorySessionStore::new();
    let id = SessionId::new();

    let result = store.update(id, SessionState::new(Dosha::Vata));
    assert!(matches!(result, Err(AyurbotError::SessionNotFound(missing)) if missing == id));
    assert!(store.read(id).is_none());
}

#[test]
fn conditional_update_applies_to_current_generation() {
    let store = InMemorySessionStore::new();
    let id = store.create(Dosha::Vata);

    let mut state = store.read(id).expect("session should exist");
    state.touch();
    store
        .update_if_current(id, state.clone())
        .expect("same generation should be accepted");

    assert_eq!(store.read(id).expect("session should exist"), state);
}

#[test]
fn conditional_update_rejects_stale_generation() {
    let store = InMemorySessionStore::new();
    let id = store.create(Dosha::Vata);
    let stale = store.read(id).expect("session should exist");

    let fresh = stale.reset(Dosha::Kapha);
    assert_eq!(fresh.generation, stale.generation + 1);
    store.update(id, fresh).expect("reset should succeed");

    let result = store.update_if_current(id, stale);
    assert!(matches!(result, Err(AyurbotError::SessionReset(reset)) if reset == id));
    assert_eq!(store.read(id).expect("session should exist").dosha, Dosha::Kapha);
}

#[test]
fn conditional_update_of_expired_session_fails() {
    let store = InMemorySessionStore::new();
    let id = store.create(Dosha::Pitta);
    let state = store.read(id).expect("session should exist");
    store.expire(id);

    let result = store.update_if_current(id, state);
    assert!(matches!(result, Err(AyurbotError::SessionNotFound(_))));
    assert!(store.is_empty());
}

#[test]
fn expire_removes_session() {
    let store = InMemorySessionStore::new();
    let id = store.create(Dosha::Vata);

    assert!(store.expire(id));
    assert!(!store.expire(id));
    assert!(store.read(id).is_none());
}

#[test]
fn expire_idle_keeps_recent_sessions() {
    let store = InMemorySessionStore::new();
    let stale = store.create(Dosha::Vata);
    let fresh = store.create(Dosha::Pitta);

    let mut state = store.read(stale).expect("session should exist");
    state.last_active = Utc::now() - Duration::hours(3);
    store.update(stale, state).expect("update should succeed");

    let removed = store.expire_idle(Duration::hours(1));

    assert_eq!(removed, 1);
    assert!(store.read(stale).is_none());
    assert!(store.read(fresh).is_some());
}

#[test]
fn session_id_round_trips_through_text() {
    let id = SessionId::new();
    let parsed: SessionId = id.to_string().parse().expect("should parse");
    assert_eq!(parsed, id);
    assert!("not-a-uuid".parse::<SessionId>().is_err());
}

#[test]
fn touch_moves_last_active_forward() {
    let mut state = SessionState::new(Dosha::Kapha);
    state.last_active = state.created_at - Duration::minutes(5);
    state.touch();
    assert!(state.last_active >= state.created_at);
}
