//! Multiplayer session lifecycle over a shared [`Store`].
//!
//! Every client runs its own [`SessionCoordinator`]; there is no server-side
//! authority. Transitions that must happen once per round (starting,
//! finishing, crediting the winner, restarting) are store transactions over
//! the whole session record, so concurrent clients racing on them commit
//! exactly once.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use eggdash_core::player::{PlayerEntry, PlayerId, RosterPlayer, UNKNOWN_PLAYER_NAME};
use eggdash_core::session::{
    self, ChatMessage, ScoreEntry, SessionRecord, SessionStatus, WinEntry, roster_from_map,
};
use eggdash_core::store::{
    self, Store, StoreChanges, StoreValue, Subscription, SubscriptionId, TransactionDecision,
};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::readiness::StartReadiness;
use crate::results::{SessionResults, rank_scores};

/// Key of the chat log inside a session record.
const CHAT_KEY: &str = "chat";

/// Attempts at finding an unused session id before giving up.
const MAX_SESSION_ID_ATTEMPTS: usize = 8;

/// Notifications pushed to the client as the shared session changes.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    RosterChanged {
        players: Vec<RosterPlayer>,
        readiness: StartReadiness,
    },
    StatusChanged(SessionStatus),
    /// Ranking and win table, sent once the round is finished and its winner
    /// credited.
    Results(SessionResults),
    Chat(ChatMessage),
    /// The session record was removed (the host left).
    SessionClosed,
}

/// A fresh random player id.
pub fn new_player_id() -> PlayerId {
    Uuid::new_v4().simple().to_string()
}

fn normalize_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        UNKNOWN_PLAYER_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

pub struct SessionCoordinator {
    store: Arc<dyn Store>,
    config: SessionConfig,
    player_id: PlayerId,
    player_name: String,
    session_id: Option<String>,
    is_host: bool,
    events: mpsc::Sender<SessionEvent>,
    subscriptions: Vec<SubscriptionId>,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionCoordinator {
    pub fn new(
        store: Arc<dyn Store>,
        config: SessionConfig,
        player_id: PlayerId,
        name: &str,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (events, rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let coordinator = Self {
            store,
            config,
            player_id,
            player_name: normalize_name(name),
            session_id: None,
            is_host: false,
            events,
            subscriptions: Vec::new(),
            tasks: Vec::new(),
        };
        (coordinator, rx)
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn require_session(&self) -> Result<String, SessionError> {
        self.session_id.clone().ok_or(SessionError::NotInSession)
    }

    /// Create a session hosted by this client. The host joins ready.
    pub async fn create_session(&mut self) -> Result<String, SessionError> {
        self.leave_current(None).await?;

        let mut record = SessionRecord::new(self.player_id.clone());
        record.players.insert(
            self.player_id.clone(),
            PlayerEntry::new(self.player_name.clone(), true),
        );
        let value = store::to_value(&record)?;

        for _ in 0..MAX_SESSION_ID_ATTEMPTS {
            let id = session::generate_session_id();
            let candidate = value.clone();
            let outcome = self
                .store
                .transaction(
                    &session::session_path(&id),
                    Box::new(move |current: Option<&StoreValue>| match current {
                        Some(_) => TransactionDecision::Abort,
                        None => TransactionDecision::Commit(Some(candidate.clone())),
                    }),
                )
                .await?;
            if !outcome.committed {
                tracing::debug!(session = %id, "Session id taken, retrying");
                continue;
            }

            self.session_id = Some(id.clone());
            self.is_host = true;
            self.attach(&id).await?;
            tracing::info!(session = %id, player = %self.player_id, "Session created");
            return Ok(id);
        }

        Err(SessionError::StoreUnavailable(
            "no free session id".to_string(),
        ))
    }

    /// Join an existing session. Refused while a round is in progress.
    pub async fn join_session(&mut self, session_id: &str) -> Result<(), SessionError> {
        let session_id = session_id.trim();
        if !session::is_valid_session_id(session_id) {
            return Err(SessionError::SessionNotFound(session_id.to_string()));
        }

        let record: Option<SessionRecord> =
            store::read(&*self.store, &session::session_path(session_id)).await?;
        let Some(record) = record else {
            return Err(SessionError::SessionNotFound(session_id.to_string()));
        };
        if record.status == SessionStatus::InProgress {
            return Err(SessionError::SessionInProgress(session_id.to_string()));
        }

        self.leave_current(Some(session_id)).await?;

        let is_host = record.host == self.player_id;
        store::write(
            &*self.store,
            &session::player_path(session_id, &self.player_id),
            &PlayerEntry::new(self.player_name.clone(), is_host),
        )
        .await?;

        self.session_id = Some(session_id.to_string());
        self.is_host = is_host;
        self.attach(session_id).await?;
        tracing::info!(
            session = %session_id,
            player = %self.player_id,
            is_host,
            "Joined session"
        );
        Ok(())
    }

    /// Drop out of the current session before entering `next`. Re-entering
    /// the same session only detaches listeners so a host does not delete
    /// the record it is about to rejoin.
    async fn leave_current(&mut self, next: Option<&str>) -> Result<(), SessionError> {
        if self.session_id.is_none() {
            return Ok(());
        }
        if next.is_some() && self.session_id.as_deref() == next {
            self.detach().await;
            self.session_id = None;
            self.is_host = false;
            return Ok(());
        }
        self.cleanup().await
    }

    /// Change the display name. The roster entry is rewritten, so a guest
    /// has to ready up again; the host stays ready.
    pub async fn set_player_name(&mut self, name: &str) -> Result<(), SessionError> {
        self.player_name = normalize_name(name);
        let Some(id) = self.session_id.clone() else {
            return Ok(());
        };
        let mut changes = StoreChanges::new();
        changes.insert("name".into(), StoreValue::from(self.player_name.clone()));
        changes.insert("ready".into(), StoreValue::from(self.is_host));
        self.store
            .update(&session::player_path(&id, &self.player_id), changes)
            .await?;
        Ok(())
    }

    pub async fn set_ready(&self, ready: bool) -> Result<(), SessionError> {
        let id = self.require_session()?;
        let mut changes = StoreChanges::new();
        changes.insert("ready".into(), StoreValue::from(ready));
        self.store
            .update(&session::player_path(&id, &self.player_id), changes)
            .await?;
        tracing::debug!(session = %id, player = %self.player_id, ready, "Ready flag set");
        Ok(())
    }

    /// Evaluate the start predicate against the current roster.
    pub async fn start_readiness(&self) -> Result<StartReadiness, SessionError> {
        let id = self.require_session()?;
        let players: BTreeMap<PlayerId, PlayerEntry> =
            store::read(&*self.store, &session::players_path(&id))
                .await?
                .unwrap_or_default();
        Ok(StartReadiness::evaluate(&players, self.config.min_players))
    }

    /// Host only: move a waiting session into play. The readiness check and
    /// the status change happen in one transaction.
    pub async fn start_game(&self) -> Result<(), SessionError> {
        let id = self.require_session()?;
        if !self.is_host {
            return Err(SessionError::NotHost);
        }

        let now = self.store.server_timestamp().await?;
        let min_players = self.config.min_players;
        let txn = transact_record(&*self.store, &id, move |record| {
            if !record.status.can_transition_to(SessionStatus::InProgress)
                || !StartReadiness::evaluate(&record.players, min_players).can_start()
            {
                return false;
            }
            record.status = SessionStatus::InProgress;
            record.start_time = Some(now);
            record.end_time = None;
            true
        })
        .await?;

        if txn.committed {
            tracing::info!(session = %id, "Round started");
            return Ok(());
        }
        match txn.record {
            None => Err(SessionError::SessionNotFound(id)),
            Some(r) => match r.status {
                SessionStatus::InProgress => Err(SessionError::SessionInProgress(id)),
                SessionStatus::Finished => Err(SessionError::WrongStatus(r.status)),
                SessionStatus::Waiting => Err(SessionError::NotReady(StartReadiness::evaluate(
                    &r.players,
                    min_players,
                ))),
            },
        }
    }

    /// Record this client's final score, then try to finish the round.
    /// Returns whether this call finished it.
    pub async fn submit_score(&self, score: u32) -> Result<bool, SessionError> {
        let id = self.require_session()?;
        let timestamp = self.store.server_timestamp().await?;
        let player_id = self.player_id.clone();
        let entry = ScoreEntry {
            name: self.player_name.clone(),
            score,
            timestamp,
        };

        let txn = transact_record(&*self.store, &id, move |record| {
            if record.status != SessionStatus::InProgress
                || !record.players.contains_key(&player_id)
            {
                return false;
            }
            record.scores.insert(player_id.clone(), entry.clone());
            true
        })
        .await?;

        if !txn.committed {
            return Err(match txn.record {
                None => SessionError::SessionNotFound(id),
                Some(r) if r.status != SessionStatus::InProgress => {
                    SessionError::WrongStatus(r.status)
                },
                Some(_) => SessionError::NotInSession,
            });
        }
        tracing::info!(session = %id, player = %self.player_id, score, "Score submitted");

        self.check_completion().await
    }

    /// Finish the round if every rostered player has a score, crediting the
    /// winner in the same write. Safe to call from any number of clients;
    /// only one call returns `true`.
    pub async fn check_completion(&self) -> Result<bool, SessionError> {
        let id = self.require_session()?;
        let now = self.store.server_timestamp().await?;
        let txn = transact_record(&*self.store, &id, move |record| {
            if !record.status.can_transition_to(SessionStatus::Finished)
                || !record.all_scores_submitted()
            {
                return false;
            }
            record.status = SessionStatus::Finished;
            record.end_time = Some(now);
            credit_round_winner(record);
            true
        })
        .await?;

        if txn.committed {
            tracing::info!(session = %id, "Round finished");
        } else if txn.record.is_none() {
            return Err(SessionError::SessionNotFound(id));
        }
        Ok(txn.committed)
    }

    /// Credit the round winner (at most once per round) and return the
    /// ranking with the cumulative win table.
    pub async fn compute_results(&self) -> Result<SessionResults, SessionError> {
        let id = self.require_session()?;
        finish_round(&*self.store, &id).await
    }

    /// Host only: reset a finished session for another round. Back to
    /// waiting, scores cleared, only the host ready. Wins and chat are kept;
    /// a round finished without its winner credited is credited first.
    pub async fn restart_session(&self) -> Result<(), SessionError> {
        let id = self.require_session()?;
        if !self.is_host {
            return Err(SessionError::NotHost);
        }
        let txn = transact_record(&*self.store, &id, |record| {
            if !record.status.can_transition_to(SessionStatus::Waiting) {
                return false;
            }
            credit_round_winner(record);
            record.status = SessionStatus::Waiting;
            record.start_time = None;
            record.end_time = None;
            record.scores.clear();
            let host = record.host.clone();
            for (player_id, entry) in record.players.iter_mut() {
                entry.ready = *player_id == host;
            }
            record.round += 1;
            true
        })
        .await?;

        if txn.committed {
            tracing::info!(session = %id, "Session restarted");
            return Ok(());
        }
        match txn.record {
            None => Err(SessionError::SessionNotFound(id)),
            Some(r) if r.status == SessionStatus::InProgress => {
                Err(SessionError::SessionInProgress(id))
            },
            Some(r) => Err(SessionError::WrongStatus(r.status)),
        }
    }

    /// Post to the session chat. Blank messages are dropped (`Ok(None)`);
    /// long ones are truncated. Returns the message key.
    pub async fn send_message(&self, text: &str) -> Result<Option<String>, SessionError> {
        let id = self.require_session()?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let message = ChatMessage {
            sender_id: self.player_id.clone(),
            sender_name: self.player_name.clone(),
            message: text.chars().take(self.config.chat_max_len).collect(),
            timestamp: self.store.server_timestamp().await?,
        };
        let key = self
            .store
            .push(&session::chat_path(&id), store::to_value(&message)?)
            .await?;
        Ok(Some(key))
    }

    /// Stop listening and leave the session. A host also deletes the record.
    pub async fn cleanup(&mut self) -> Result<(), SessionError> {
        self.detach().await;
        let Some(id) = self.session_id.take() else {
            return Ok(());
        };
        if std::mem::take(&mut self.is_host) {
            self.store.remove(&session::session_path(&id)).await?;
            tracing::info!(session = %id, "Host left, session removed");
        } else {
            tracing::info!(session = %id, player = %self.player_id, "Left session");
        }
        Ok(())
    }

    async fn attach(&mut self, session_id: &str) -> Result<(), SessionError> {
        let players = self
            .store
            .subscribe(&session::players_path(session_id))
            .await?;
        let status = self
            .store
            .subscribe(&session::status_path(session_id))
            .await?;
        let chat = self.store.subscribe(&session::chat_path(session_id)).await?;
        self.subscriptions.extend([players.id, status.id, chat.id]);

        self.tasks.push(tokio::spawn(forward_roster(
            players,
            self.config.min_players,
            self.events.clone(),
        )));
        self.tasks.push(tokio::spawn(forward_status(
            Arc::clone(&self.store),
            session_id.to_string(),
            status,
            self.events.clone(),
        )));
        self.tasks
            .push(tokio::spawn(forward_chat(chat, self.events.clone())));
        Ok(())
    }

    async fn detach(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        for id in self.subscriptions.drain(..) {
            self.store.unsubscribe(id).await;
        }
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

struct RecordTxn {
    committed: bool,
    /// The record after the transaction, committed or not.
    record: Option<SessionRecord>,
}

/// Typed read-modify-write of a session record. `apply` returns `false` to
/// abort; a missing or undecodable record always aborts. The chat log under
/// the same path is neither decoded nor rewritten.
async fn transact_record<F>(
    store: &dyn Store,
    session_id: &str,
    mut apply: F,
) -> Result<RecordTxn, SessionError>
where
    F: FnMut(&mut SessionRecord) -> bool + Send + 'static,
{
    let outcome = store
        .transaction(
            &session::session_path(session_id),
            Box::new(move |current: Option<&StoreValue>| {
                let Some(value) = current else {
                    return TransactionDecision::Abort;
                };
                let Some(fields) = value.as_object() else {
                    return TransactionDecision::Abort;
                };
                let fields: StoreChanges = fields
                    .iter()
                    .filter(|(key, _)| key.as_str() != CHAT_KEY)
                    .map(|(key, v)| (key.clone(), v.clone()))
                    .collect();
                let Ok(mut record) = store::from_value::<SessionRecord>(StoreValue::Object(fields))
                else {
                    return TransactionDecision::Abort;
                };
                if !apply(&mut record) {
                    return TransactionDecision::Abort;
                }
                match store::to_value(&record) {
                    Ok(StoreValue::Object(next)) => TransactionDecision::Update(next),
                    _ => TransactionDecision::Abort,
                }
            }),
        )
        .await?;

    let record = outcome
        .value
        .map(store::from_value::<SessionRecord>)
        .transpose()?;
    Ok(RecordTxn {
        committed: outcome.committed,
        record,
    })
}

/// Add one win for the top of a finished round's ranking unless this round
/// is already credited. Returns whether a win was added.
fn credit_round_winner(record: &mut SessionRecord) -> bool {
    if record.status != SessionStatus::Finished || record.round_awarded() {
        return false;
    }
    let ranking = rank_scores(&record.scores);
    let Some(winner) = ranking.first() else {
        return false;
    };
    let entry = record
        .wins
        .entry(winner.player_id.clone())
        .or_insert_with(|| WinEntry {
            name: winner.name.clone(),
            wins: 0,
        });
    entry.name = winner.name.clone();
    entry.wins += 1;
    record.awarded_round = Some(record.round);
    true
}

/// Credit the current round's winner if completion did not already.
/// Returns whether this call did the increment.
pub async fn award_round_winner(store: &dyn Store, session_id: &str) -> Result<bool, SessionError> {
    let txn = transact_record(store, session_id, credit_round_winner).await?;

    if txn.committed {
        tracing::info!(session = %session_id, "Round winner credited");
    }
    Ok(txn.committed)
}

async fn finish_round(store: &dyn Store, session_id: &str) -> Result<SessionResults, SessionError> {
    award_round_winner(store, session_id).await?;
    let record: Option<SessionRecord> =
        store::read(store, &session::session_path(session_id)).await?;
    record
        .map(|r| SessionResults::from_record(&r))
        .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))
}

async fn forward_roster(
    mut sub: Subscription,
    min_players: usize,
    events: mpsc::Sender<SessionEvent>,
) {
    while let Some(value) = sub.changes.recv().await {
        let players: BTreeMap<PlayerId, PlayerEntry> = match value {
            None => BTreeMap::new(),
            Some(v) => match store::from_value(v) {
                Ok(players) => players,
                Err(e) => {
                    tracing::warn!(path = %sub.path, error = %e, "Undecodable roster");
                    continue;
                },
            },
        };
        let event = SessionEvent::RosterChanged {
            players: roster_from_map(&players),
            readiness: StartReadiness::evaluate(&players, min_players),
        };
        if events.send(event).await.is_err() {
            break;
        }
    }
}

async fn forward_status(
    store: Arc<dyn Store>,
    session_id: String,
    mut sub: Subscription,
    events: mpsc::Sender<SessionEvent>,
) {
    let mut last = None;
    while let Some(value) = sub.changes.recv().await {
        let Some(value) = value else {
            let _ = events.send(SessionEvent::SessionClosed).await;
            break;
        };
        let status: SessionStatus = match store::from_value(value) {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(session = %session_id, error = %e, "Undecodable status");
                continue;
            },
        };
        if last == Some(status) {
            continue;
        }
        last = Some(status);
        if events.send(SessionEvent::StatusChanged(status)).await.is_err() {
            break;
        }

        if status == SessionStatus::Finished {
            match finish_round(&*store, &session_id).await {
                Ok(results) => {
                    if events.send(SessionEvent::Results(results)).await.is_err() {
                        break;
                    }
                },
                Err(e) => {
                    tracing::warn!(session = %session_id, error = %e, "Failed to load results");
                },
            }
        }
    }
}

async fn forward_chat(mut sub: Subscription, events: mpsc::Sender<SessionEvent>) {
    let mut seen = BTreeSet::new();
    while let Some(value) = sub.changes.recv().await {
        let Some(value) = value else {
            continue;
        };
        let messages: BTreeMap<String, ChatMessage> = match store::from_value(value) {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(path = %sub.path, error = %e, "Undecodable chat log");
                continue;
            },
        };
        for (key, message) in messages {
            if seen.insert(key) && events.send(SessionEvent::Chat(message)).await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_ids_are_unique_path_segments() {
        let a = new_player_id();
        let b = new_player_id();
        assert_ne!(a, b);
        assert!(store::split_path(&a).is_ok());
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn blank_names_become_unknown() {
        assert_eq!(normalize_name("  "), UNKNOWN_PLAYER_NAME);
        assert_eq!(normalize_name(" Hop "), "Hop");
    }
}
