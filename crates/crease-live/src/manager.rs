//! Session manager: routes scorer commands and viewer subscriptions to the
//! right match, and reclaims closed matches.
//!
//! ```text
//! CommandEnvelope ──► authority ──► session (writer lock) ──► ledger
//!                                        │
//!                                        └──► topic ──► viewers
//! ```
//!
//! Matches are independent: each has its own session, writer lock, and
//! topic, so one match's traffic never waits on another's.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak},
    time::Instant,
};

use crease_engine::LedgerStore;
use crease_types::{
    CommandEnvelope, CommandReply, LiveConfig, MatchId, MatchSetup, MatchSnapshot, ResumePoint,
    Result, ScoringError, SequenceNumber, SubscriberId,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    ScoringAuthority,
    hub::{BroadcastHub, HubLimits, LiveSubscription},
    session::MatchSession,
};

/// Registry of resident match sessions.
pub struct SessionManager {
    config: LiveConfig,
    ledger: Arc<dyn LedgerStore>,
    authority: Arc<dyn ScoringAuthority>,
    hub: BroadcastHub,
    sessions: RwLock<HashMap<MatchId, Arc<MatchSession>>>,
}

impl SessionManager {
    pub fn new(
        config: LiveConfig,
        ledger: Arc<dyn LedgerStore>,
        authority: Arc<dyn ScoringAuthority>,
    ) -> Result<Self> {
        config.validate()?;
        let hub = BroadcastHub::new(HubLimits::from_config(&config));
        Ok(Self {
            config,
            ledger,
            authority,
            hub,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    #[must_use]
    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// The match's session, opened (and restored from the ledger) on first use.
    pub fn get_or_create(&self, setup: MatchSetup) -> Result<Arc<MatchSession>> {
        if let Some(session) = self.read_sessions()?.get(&setup.match_id) {
            return Ok(Arc::clone(session));
        }

        let mut sessions = self.write_sessions()?;
        if let Some(session) = sessions.get(&setup.match_id) {
            return Ok(Arc::clone(session));
        }
        let match_id = setup.match_id;
        let session = Arc::new(MatchSession::open(
            setup,
            Arc::clone(&self.ledger),
            &self.hub,
            &self.config,
        )?);
        sessions.insert(match_id, Arc::clone(&session));
        Ok(session)
    }

    pub fn get(&self, match_id: MatchId) -> Result<Arc<MatchSession>> {
        self.read_sessions()?
            .get(&match_id)
            .cloned()
            .ok_or(ScoringError::SessionNotFound(match_id))
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.read_sessions().map(|s| s.len()).unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Scorer surface
    // -----------------------------------------------------------------------

    /// Authorize and apply a scorer command.
    pub async fn execute(&self, envelope: CommandEnvelope) -> Result<CommandReply> {
        let CommandEnvelope {
            command_id,
            scorer,
            match_id,
            command,
        } = envelope;
        if !self.authority.can_score(scorer, match_id) {
            warn!(
                match_id = %match_id,
                scorer = %scorer,
                command = command.name(),
                "Unauthorized scoring command"
            );
            return Err(ScoringError::Unauthorized { scorer, match_id });
        }
        let session = self.get(match_id)?;
        session.execute(command_id, command).await
    }

    // -----------------------------------------------------------------------
    // Viewer surface
    // -----------------------------------------------------------------------

    pub fn subscribe(
        &self,
        match_id: MatchId,
        resume: Option<ResumePoint>,
    ) -> Result<LiveSubscription> {
        self.hub.subscribe(match_id, resume)
    }

    pub fn unsubscribe(&self, match_id: MatchId, subscriber: SubscriberId) -> bool {
        self.hub.unsubscribe(match_id, subscriber)
    }

    pub fn snapshot(&self, match_id: MatchId) -> Result<MatchSnapshot> {
        self.get(match_id)?.snapshot()
    }

    /// Attach commentary to a committed ball.
    pub fn annotate(
        &self,
        match_id: MatchId,
        sequence: SequenceNumber,
        text: &str,
        language: &str,
    ) -> Result<()> {
        self.get(match_id)?.annotate(sequence, text, language)
    }

    // -----------------------------------------------------------------------
    // Reclamation
    // -----------------------------------------------------------------------

    /// Dispose a session if it is closed, unwatched, and past retention.
    pub fn dispose(&self, match_id: MatchId) -> Result<()> {
        self.dispose_at(match_id, Instant::now())
    }

    /// [`Self::dispose`] against an explicit clock reading.
    ///
    /// # Errors
    /// [`ScoringError::SessionNotFound`] for an unknown match and
    /// [`ScoringError::SessionBusy`] when the session must stay resident.
    pub fn dispose_at(&self, match_id: MatchId, now: Instant) -> Result<()> {
        let mut sessions = self.write_sessions()?;
        let session = sessions
            .get(&match_id)
            .ok_or(ScoringError::SessionNotFound(match_id))?;
        if let Some(reason) = self.retention_blocker(session, now) {
            return Err(ScoringError::SessionBusy { reason });
        }
        sessions.remove(&match_id);
        self.hub.close(match_id);
        info!(match_id = %match_id, "Session disposed");
        Ok(())
    }

    /// Dispose every eligible session; returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let Ok(mut sessions) = self.write_sessions() else {
            return 0;
        };
        let expired: Vec<MatchId> = sessions
            .iter()
            .filter(|(_, session)| self.retention_blocker(session, now).is_none())
            .map(|(match_id, _)| *match_id)
            .collect();
        for match_id in &expired {
            sessions.remove(match_id);
            self.hub.close(*match_id);
        }
        if !expired.is_empty() {
            info!(disposed = expired.len(), resident = sessions.len(), "Sweep complete");
        }
        expired.len()
    }

    /// Run [`Self::sweep`] every `sweep_interval` until the manager is dropped.
    pub fn spawn_janitor(self: &Arc<Self>) -> JoinHandle<()> {
        let manager: Weak<Self> = Arc::downgrade(self);
        let period = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    debug!("Session manager gone; janitor stopping");
                    break;
                };
                manager.sweep();
            }
        })
    }

    /// Why a session must stay, or `None` if it may go.
    fn retention_blocker(&self, session: &MatchSession, now: Instant) -> Option<String> {
        let Some(closed_at) = session.closed_at() else {
            return Some(format!("match is {}", session.phase()));
        };
        let viewers = session.subscriber_count();
        if viewers > 0 {
            return Some(format!("{viewers} viewer(s) still subscribed"));
        }
        if now.saturating_duration_since(closed_at) < self.config.retention {
            return Some("retention window has not elapsed".to_string());
        }
        None
    }

    fn read_sessions(&self) -> Result<RwLockReadGuard<'_, HashMap<MatchId, Arc<MatchSession>>>> {
        self.sessions
            .read()
            .map_err(|_| ScoringError::Internal("session registry poisoned".to_string()))
    }

    fn write_sessions(&self) -> Result<RwLockWriteGuard<'_, HashMap<MatchId, Arc<MatchSession>>>> {
        self.sessions
            .write()
            .map_err(|_| ScoringError::Internal("session registry poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AllowAll, ScorerRoster};
    use crease_engine::InMemoryLedger;
    use crease_types::{ScorerId, ScoringCommand, TeamId};
    use std::time::Duration;

    fn manager_with(authority: Arc<dyn ScoringAuthority>) -> SessionManager {
        let config = LiveConfig {
            retention: Duration::from_secs(60),
            ..LiveConfig::default()
        };
        SessionManager::new(config, Arc::new(InMemoryLedger::new()), authority).unwrap()
    }

    fn setup() -> MatchSetup {
        MatchSetup::new(MatchId::new(), TeamId::new(), TeamId::new())
    }

    fn envelope(match_id: MatchId, scorer: ScorerId, command: ScoringCommand) -> CommandEnvelope {
        CommandEnvelope {
            command_id: None,
            scorer,
            match_id,
            command,
        }
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let manager = manager_with(Arc::new(AllowAll));
        let setup = setup();
        let a = manager.get_or_create(setup.clone()).unwrap();
        let b = manager.get_or_create(setup).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(manager.session_count(), 1);
    }

    #[test]
    fn unknown_match_not_found() {
        let manager = manager_with(Arc::new(AllowAll));
        assert!(matches!(
            manager.get(MatchId::new()),
            Err(ScoringError::SessionNotFound(_))
        ));
        assert!(matches!(
            manager.subscribe(MatchId::new(), None),
            Err(ScoringError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn unauthorized_scorer_rejected_before_routing() {
        let roster = Arc::new(ScorerRoster::new());
        let manager = manager_with(roster.clone());
        let setup = setup();
        let match_id = setup.match_id;
        manager.get_or_create(setup).unwrap();

        let intruder = ScorerId::new();
        let err = manager
            .execute(envelope(match_id, intruder, ScoringCommand::StartInnings))
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::Unauthorized { .. }));
        assert_eq!(manager.get(match_id).unwrap().phase(), crease_types::MatchPhase::NotStarted);

        let scorer = ScorerId::new();
        roster.assign(match_id, scorer);
        manager
            .execute(envelope(match_id, scorer, ScoringCommand::StartInnings))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn dispose_requires_closed_unwatched_and_retention() {
        let manager = manager_with(Arc::new(AllowAll));
        let setup = setup();
        let match_id = setup.match_id;
        manager.get_or_create(setup).unwrap();
        let scorer = ScorerId::new();

        let far_future = Instant::now() + Duration::from_secs(3_600);
        assert!(matches!(
            manager.dispose_at(match_id, far_future),
            Err(ScoringError::SessionBusy { .. })
        ));

        manager
            .execute(envelope(match_id, scorer, ScoringCommand::StartInnings))
            .await
            .unwrap();
        manager
            .execute(envelope(
                match_id,
                scorer,
                ScoringCommand::Abandon {
                    reason: "bad light".to_string(),
                },
            ))
            .await
            .unwrap();

        let viewer = manager.subscribe(match_id, None).unwrap();
        assert!(manager.dispose_at(match_id, far_future).is_err());
        drop(viewer);

        assert!(manager.dispose_at(match_id, Instant::now()).is_err());
        manager.dispose_at(match_id, far_future).unwrap();
        assert_eq!(manager.session_count(), 0);
        assert_eq!(manager.hub().topic_count(), 0);
        assert!(matches!(
            manager.dispose(match_id),
            Err(ScoringError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn sweep_only_takes_eligible_sessions() {
        let manager = manager_with(Arc::new(AllowAll));
        let scorer = ScorerId::new();
        let open = setup();
        let closed = setup();
        manager.get_or_create(open.clone()).unwrap();
        manager.get_or_create(closed.clone()).unwrap();
        manager
            .execute(envelope(closed.match_id, scorer, ScoringCommand::StartInnings))
            .await
            .unwrap();
        manager
            .execute(envelope(
                closed.match_id,
                scorer,
                ScoringCommand::EndMatch {
                    winner: None,
                    summary: "No result".to_string(),
                },
            ))
            .await
            .unwrap();

        let later = Instant::now() + Duration::from_secs(120);
        assert_eq!(manager.sweep_at(later), 1);
        assert!(manager.get(open.match_id).is_ok());
        assert!(manager.get(closed.match_id).is_err());
    }
}
