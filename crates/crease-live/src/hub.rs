//! Broadcast hub: per-match fan-out of live messages to viewers.
//!
//! Each match owns a [`MatchTopic`]. The topic assigns every published
//! message a strictly increasing `revision`, keeps a bounded tail for
//! resuming viewers, and pushes into one bounded queue per viewer.
//! Revisions are scoped to the topic's [`StreamId`]: a reopened topic starts
//! a new stream, and resume points from an old one get a snapshot.
//!
//! Publishing never waits on a viewer: a full queue drops that viewer
//! ([`DropReason::Lagged`]) and the viewer must resubscribe. Subscription
//! and publication share the topic lock, so a new viewer sees its snapshot
//! followed by exactly the messages published after it.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, RwLock, Weak},
};

use crease_types::{
    BallEvent, LiveConfig, LiveMessage, LivePayload, MatchId, MatchSnapshot, ResumePoint, Result,
    ScoringError, SequenceNumber, SnapshotReason, StreamId, SubscriberId,
};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::{debug, info, warn};

/// Why the hub stopped feeding a viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The viewer's queue was full when a message was published.
    Lagged,
    /// The match session was disposed.
    Closed,
}

/// Per-topic bounds, taken from [`LiveConfig`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HubLimits {
    pub queue_capacity: usize,
    pub max_subscribers: usize,
    pub replay_tail_len: usize,
}

impl HubLimits {
    #[must_use]
    pub fn from_config(config: &LiveConfig) -> Self {
        Self {
            queue_capacity: config.subscriber_queue_capacity.max(1),
            max_subscribers: config.max_subscribers_per_match,
            replay_tail_len: config.replay_tail_len,
        }
    }
}

impl Default for HubLimits {
    fn default() -> Self {
        Self::from_config(&LiveConfig::default())
    }
}

/// A message waiting for a revision.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub sequence_number: Option<SequenceNumber>,
    pub payload: LivePayload,
}

impl Outbound {
    /// Snapshot message positioned at the snapshot's last ball.
    #[must_use]
    pub fn snapshot(snapshot: MatchSnapshot) -> Self {
        Self {
            sequence_number: snapshot.state.last_sequence,
            payload: LivePayload::Snapshot(snapshot),
        }
    }
}

// ---------------------------------------------------------------------------
// LiveSubscription
// ---------------------------------------------------------------------------

/// A viewer's ordered stream for one match.
///
/// Dropping the subscription unsubscribes it.
#[derive(Debug)]
pub struct LiveSubscription {
    id: SubscriberId,
    match_id: MatchId,
    receiver: mpsc::Receiver<LiveMessage>,
    drop_reason: Arc<Mutex<Option<DropReason>>>,
    topic: Weak<MatchTopic>,
}

impl LiveSubscription {
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    #[must_use]
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Next message; `None` once the hub dropped this viewer and the queue
    /// is drained.
    pub async fn recv(&mut self) -> Option<LiveMessage> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> std::result::Result<LiveMessage, TryRecvError> {
        self.receiver.try_recv()
    }

    #[must_use]
    pub fn drop_reason(&self) -> Option<DropReason> {
        self.drop_reason.lock().ok().and_then(|guard| *guard)
    }

    /// Leave the stream explicitly.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        if let Some(topic) = self.topic.upgrade() {
            topic.unsubscribe(self.id);
        }
    }
}

// ---------------------------------------------------------------------------
// MatchTopic
// ---------------------------------------------------------------------------

/// Fan-out state for one match.
pub struct MatchTopic {
    match_id: MatchId,
    stream: StreamId,
    limits: HubLimits,
    inner: Mutex<TopicState>,
}

impl MatchTopic {
    fn new(limits: HubLimits, initial: MatchSnapshot) -> Self {
        Self {
            match_id: initial.match_id,
            stream: StreamId::new(),
            limits,
            inner: Mutex::new(TopicState {
                last_revision: 0,
                tail: VecDeque::with_capacity(limits.replay_tail_len),
                latest: initial,
                next_subscriber_id: 1,
                subscribers: BTreeMap::new(),
            }),
        }
    }

    #[must_use]
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    #[must_use]
    pub fn stream(&self) -> StreamId {
        self.stream
    }

    /// Publish a batch in order and record the state it leaves viewers in.
    ///
    /// A retraction snapshot invalidates the resume tail. Returns the last
    /// revision assigned.
    pub fn publish(&self, batch: Vec<Outbound>, latest: MatchSnapshot) -> Result<u64> {
        let mut state = self.lock_state()?;
        for outbound in batch {
            if matches!(
                &outbound.payload,
                LivePayload::Snapshot(snapshot) if snapshot.reason == SnapshotReason::Retraction
            ) {
                state.tail.clear();
            }
            state.last_revision = state.last_revision.saturating_add(1);
            let message = LiveMessage {
                match_id: self.match_id,
                stream: self.stream,
                sequence_number: outbound.sequence_number,
                revision: state.last_revision,
                payload: outbound.payload,
            };
            state.push_tail(message.clone(), self.limits.replay_tail_len);
            state.fan_out(&message);
        }
        state.latest = latest;
        Ok(state.last_revision)
    }

    /// Announce an annotation attached to a committed ball.
    ///
    /// The ball must still be the one viewers were last shown at that
    /// sequence; a ball retracted (or replaced) since is not announced.
    pub fn publish_commentary(&self, event: &BallEvent) -> Result<u64> {
        let Some(annotation) = event.annotation.clone() else {
            return Err(ScoringError::InvalidAnnotation {
                reason: format!("ball {} carries no annotation", event.sequence),
            });
        };
        let mut state = self.lock_state()?;
        let beyond_ledger = state
            .latest
            .state
            .last_sequence
            .is_none_or(|last| event.sequence > last);
        let current = state
            .latest
            .recent_balls
            .iter_mut()
            .find(|ball| ball.sequence == event.sequence);
        if beyond_ledger
            || current
                .as_ref()
                .is_some_and(|ball| ball.recorded_at != event.recorded_at)
        {
            warn!(
                match_id = %self.match_id,
                sequence = %event.sequence,
                "Commentary for a retracted ball dropped"
            );
            return Err(ScoringError::InvalidAnnotation {
                reason: format!("ball {} was retracted", event.sequence),
            });
        }
        if let Some(ball) = current {
            ball.annotation = Some(annotation.clone());
        }
        state.last_revision = state.last_revision.saturating_add(1);
        let message = LiveMessage {
            match_id: self.match_id,
            stream: self.stream,
            sequence_number: Some(event.sequence),
            revision: state.last_revision,
            payload: LivePayload::Commentary {
                sequence: event.sequence,
                annotation,
            },
        };
        state.push_tail(message.clone(), self.limits.replay_tail_len);
        state.fan_out(&message);
        Ok(state.last_revision)
    }

    /// Open a viewer stream.
    ///
    /// A fresh viewer gets a snapshot first. A resuming viewer gets the
    /// missed messages from the tail when they are all still retained and fit
    /// its queue, and a snapshot otherwise.
    pub fn subscribe(self: &Arc<Self>, resume: Option<ResumePoint>) -> Result<LiveSubscription> {
        let mut state = self.lock_state()?;
        if state.subscribers.len() >= self.limits.max_subscribers {
            return Err(ScoringError::SubscriberLimitReached {
                max_subscribers: self.limits.max_subscribers,
            });
        }

        let backlog = resume
            .and_then(|point| state.replay_since(self.stream, point))
            .filter(|missed| missed.len() <= self.limits.queue_capacity)
            .unwrap_or_else(|| vec![state.snapshot_message(self.stream)]);

        let (sender, receiver) = mpsc::channel(self.limits.queue_capacity);
        for message in backlog {
            sender
                .try_send(message)
                .map_err(|err| ScoringError::Internal(format!("subscriber backlog: {err}")))?;
        }

        let id = SubscriberId(state.next_subscriber_id);
        state.next_subscriber_id = state.next_subscriber_id.saturating_add(1);
        let drop_reason = Arc::new(Mutex::new(None));
        state.subscribers.insert(
            id,
            SubscriberState {
                sender,
                drop_reason: Arc::clone(&drop_reason),
            },
        );
        debug!(
            match_id = %self.match_id,
            subscriber = %id,
            resumed = resume.is_some(),
            viewers = state.subscribers.len(),
            "Viewer subscribed"
        );

        Ok(LiveSubscription {
            id,
            match_id: self.match_id,
            receiver,
            drop_reason,
            topic: Arc::downgrade(self),
        })
    }

    /// Returns whether the viewer was still subscribed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let Ok(mut state) = self.lock_state() else {
            return false;
        };
        let removed = state.subscribers.remove(&id).is_some();
        if removed {
            debug!(match_id = %self.match_id, subscriber = %id, "Viewer unsubscribed");
        }
        removed
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock_state()
            .map(|state| state.subscribers.len())
            .unwrap_or_default()
    }

    /// State a new viewer would be shown.
    pub fn latest_snapshot(&self) -> Result<MatchSnapshot> {
        Ok(self.lock_state()?.latest.clone())
    }

    pub fn last_revision(&self) -> Result<u64> {
        Ok(self.lock_state()?.last_revision)
    }

    /// Disconnect every viewer.
    fn close(&self) {
        if let Ok(mut state) = self.lock_state() {
            for subscriber in state.subscribers.values() {
                subscriber.set_drop_reason(DropReason::Closed);
            }
            state.subscribers.clear();
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, TopicState>> {
        self.inner
            .lock()
            .map_err(|_| ScoringError::Internal("topic lock poisoned".to_string()))
    }
}

#[cfg(test)]
impl MatchTopic {
    /// Poison the topic lock the way a panicking publisher would.
    pub(crate) fn poison_lock(self: &Arc<Self>) {
        let topic = Arc::clone(self);
        let outcome = std::thread::spawn(move || {
            let _state = topic.inner.lock();
            panic!("publisher panicked");
        })
        .join();
        assert!(outcome.is_err());
    }
}

struct TopicState {
    last_revision: u64,
    tail: VecDeque<LiveMessage>,
    latest: MatchSnapshot,
    next_subscriber_id: u64,
    subscribers: BTreeMap<SubscriberId, SubscriberState>,
}

impl TopicState {
    fn push_tail(&mut self, message: LiveMessage, limit: usize) {
        if limit == 0 {
            return;
        }
        self.tail.push_back(message);
        while self.tail.len() > limit {
            self.tail.pop_front();
        }
    }

    fn fan_out(&mut self, message: &LiveMessage) {
        let mut dropped = Vec::new();
        for (id, subscriber) in &self.subscribers {
            match subscriber.sender.try_send(message.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    subscriber.set_drop_reason(DropReason::Lagged);
                    dropped.push(*id);
                }
                Err(TrySendError::Closed(_)) => dropped.push(*id),
            }
        }
        for id in dropped {
            let lagged = self
                .subscribers
                .remove(&id)
                .is_some_and(|subscriber| subscriber.drop_reason() == Some(DropReason::Lagged));
            if lagged {
                warn!(
                    match_id = %message.match_id,
                    subscriber = %id,
                    revision = message.revision,
                    "Viewer queue full; dropped"
                );
            }
        }
    }

    /// Messages after `point`, if the tail still holds the message the
    /// viewer last saw, unchanged, and everything after it.
    fn replay_since(&self, stream: StreamId, point: ResumePoint) -> Option<Vec<LiveMessage>> {
        if point.stream != stream {
            return None;
        }
        let anchor = self
            .tail
            .iter()
            .find(|message| message.revision == point.revision)?;
        if anchor.sequence_number != point.sequence_number {
            return None;
        }
        Some(
            self.tail
                .iter()
                .filter(|message| message.revision > point.revision)
                .cloned()
                .collect(),
        )
    }

    fn snapshot_message(&self, stream: StreamId) -> LiveMessage {
        let mut snapshot = self.latest.clone();
        snapshot.reason = SnapshotReason::Subscribe;
        LiveMessage {
            match_id: snapshot.match_id,
            stream,
            sequence_number: snapshot.state.last_sequence,
            revision: self.last_revision,
            payload: LivePayload::Snapshot(snapshot),
        }
    }
}

struct SubscriberState {
    sender: mpsc::Sender<LiveMessage>,
    drop_reason: Arc<Mutex<Option<DropReason>>>,
}

impl SubscriberState {
    fn set_drop_reason(&self, reason: DropReason) {
        if let Ok(mut guard) = self.drop_reason.lock() {
            guard.get_or_insert(reason);
        }
    }

    fn drop_reason(&self) -> Option<DropReason> {
        self.drop_reason.lock().ok().and_then(|guard| *guard)
    }
}

// ---------------------------------------------------------------------------
// BroadcastHub
// ---------------------------------------------------------------------------

/// Registry of match topics.
pub struct BroadcastHub {
    limits: HubLimits,
    topics: RwLock<HashMap<MatchId, Arc<MatchTopic>>>,
}

impl BroadcastHub {
    #[must_use]
    pub fn new(limits: HubLimits) -> Self {
        Self {
            limits,
            topics: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn limits(&self) -> HubLimits {
        self.limits
    }

    /// Topic for the snapshot's match, created around it if absent.
    pub fn open(&self, initial: MatchSnapshot) -> Result<Arc<MatchTopic>> {
        let mut topics = self
            .topics
            .write()
            .map_err(|_| ScoringError::Internal("hub lock poisoned".to_string()))?;
        let match_id = initial.match_id;
        let topic = topics
            .entry(match_id)
            .or_insert_with(|| {
                info!(match_id = %match_id, "Topic opened");
                Arc::new(MatchTopic::new(self.limits, initial))
            })
            .clone();
        Ok(topic)
    }

    pub fn topic(&self, match_id: MatchId) -> Result<Arc<MatchTopic>> {
        self.topics
            .read()
            .map_err(|_| ScoringError::Internal("hub lock poisoned".to_string()))?
            .get(&match_id)
            .cloned()
            .ok_or(ScoringError::SessionNotFound(match_id))
    }

    pub fn subscribe(
        &self,
        match_id: MatchId,
        resume: Option<ResumePoint>,
    ) -> Result<LiveSubscription> {
        self.topic(match_id)?.subscribe(resume)
    }

    pub fn unsubscribe(&self, match_id: MatchId, id: SubscriberId) -> bool {
        self.topic(match_id)
            .is_ok_and(|topic| topic.unsubscribe(id))
    }

    #[must_use]
    pub fn subscriber_count(&self, match_id: MatchId) -> usize {
        self.topic(match_id)
            .map(|topic| topic.subscriber_count())
            .unwrap_or_default()
    }

    /// Remove a topic and disconnect its viewers.
    pub fn close(&self, match_id: MatchId) -> bool {
        let removed = self
            .topics
            .write()
            .ok()
            .and_then(|mut topics| topics.remove(&match_id));
        match removed {
            Some(topic) => {
                topic.close();
                info!(match_id = %match_id, "Topic closed");
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.read().map(|topics| topics.len()).unwrap_or_default()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(HubLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crease_scorecore::{DerivationContext, aggregate};
    use crease_types::{BallPosition, MatchPhase, MatchRules};

    fn snapshot_for(match_id: MatchId, events: &[BallEvent]) -> MatchSnapshot {
        let rules = MatchRules::t20();
        MatchSnapshot {
            match_id,
            phase: MatchPhase::Innings1InProgress,
            reason: SnapshotReason::PhaseChange,
            state: aggregate(events, &rules, DerivationContext::first_innings()),
            recent_balls: events.to_vec(),
            result: None,
        }
    }

    fn ball(sequence: u64, runs: u8) -> BallEvent {
        let position = BallPosition {
            innings: 1,
            over: u32::try_from(sequence / 6).unwrap(),
            ball_in_over: u8::try_from(sequence % 6 + 1).unwrap(),
        };
        BallEvent::dummy_runs(sequence, position, runs)
    }

    fn ball_outbound(event: &BallEvent, snapshot: &MatchSnapshot) -> Outbound {
        Outbound {
            sequence_number: Some(event.sequence),
            payload: LivePayload::Ball {
                event: event.clone(),
                phase: snapshot.phase,
                state: snapshot.state.clone(),
            },
        }
    }

    fn limits(queue_capacity: usize) -> HubLimits {
        HubLimits {
            queue_capacity,
            max_subscribers: 4,
            replay_tail_len: 8,
        }
    }

    fn topic(limits: HubLimits) -> (Arc<MatchTopic>, MatchId) {
        let match_id = MatchId::new();
        let hub = BroadcastHub::new(limits);
        let topic = hub.open(snapshot_for(match_id, &[])).unwrap();
        (topic, match_id)
    }

    fn publish_balls(topic: &MatchTopic, match_id: MatchId, events: &mut Vec<BallEvent>, n: u64) {
        for _ in 0..n {
            let event = ball(events.len() as u64, 1);
            events.push(event.clone());
            let latest = snapshot_for(match_id, events);
            topic
                .publish(vec![ball_outbound(&event, &latest)], latest)
                .unwrap();
        }
    }

    #[test]
    fn fresh_subscriber_starts_with_snapshot() {
        let (topic, match_id) = topic(limits(8));
        let mut events = Vec::new();
        publish_balls(&topic, match_id, &mut events, 2);

        let mut sub = topic.subscribe(None).unwrap();
        let first = sub.try_recv().unwrap();
        assert!(matches!(
            &first.payload,
            LivePayload::Snapshot(s) if s.reason == SnapshotReason::Subscribe
        ));
        assert_eq!(first.sequence_number, Some(SequenceNumber(1)));
        assert_eq!(first.revision, 2);
        assert!(sub.try_recv().is_err());

        publish_balls(&topic, match_id, &mut events, 1);
        let next = sub.try_recv().unwrap();
        assert_eq!(next.revision, 3);
        assert_eq!(next.sequence_number, Some(SequenceNumber(2)));
    }

    #[test]
    fn full_queue_drops_viewer_as_lagged() {
        let (topic, match_id) = topic(limits(2));
        let mut events = Vec::new();
        let mut slow = topic.subscribe(None).unwrap();
        publish_balls(&topic, match_id, &mut events, 3);

        assert_eq!(slow.drop_reason(), Some(DropReason::Lagged));
        assert_eq!(topic.subscriber_count(), 0);
        // Queued messages drain, then the stream ends.
        assert!(slow.try_recv().is_ok());
        assert!(slow.try_recv().is_ok());
        assert!(matches!(slow.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[test]
    fn resume_replays_missed_messages_only() {
        let (topic, match_id) = topic(limits(8));
        let mut events = Vec::new();
        publish_balls(&topic, match_id, &mut events, 3);

        let mut sub = topic
            .subscribe(Some(ResumePoint {
                stream: topic.stream(),
                sequence_number: Some(SequenceNumber(0)),
                revision: 1,
            }))
            .unwrap();
        let revisions: Vec<u64> = std::iter::from_fn(|| sub.try_recv().ok())
            .map(|m| m.revision)
            .collect();
        assert_eq!(revisions, vec![2, 3]);
    }

    #[test]
    fn resume_outside_tail_gets_snapshot() {
        let (topic, match_id) = topic(limits(8));
        let mut events = Vec::new();
        publish_balls(&topic, match_id, &mut events, 12);

        let mut sub = topic
            .subscribe(Some(ResumePoint {
                stream: topic.stream(),
                sequence_number: Some(SequenceNumber(0)),
                revision: 1,
            }))
            .unwrap();
        let first = sub.try_recv().unwrap();
        assert!(matches!(first.payload, LivePayload::Snapshot(_)));
        assert_eq!(first.revision, 12);
    }

    #[test]
    fn retraction_clears_resume_tail() {
        let (topic, match_id) = topic(limits(8));
        let mut events = Vec::new();
        publish_balls(&topic, match_id, &mut events, 3);
        events.pop();
        let mut retraction = snapshot_for(match_id, &events);
        retraction.reason = SnapshotReason::Retraction;
        topic
            .publish(vec![Outbound::snapshot(retraction.clone())], retraction)
            .unwrap();

        let mut sub = topic
            .subscribe(Some(ResumePoint {
                stream: topic.stream(),
                sequence_number: Some(SequenceNumber(1)),
                revision: 2,
            }))
            .unwrap();
        let first = sub.try_recv().unwrap();
        assert!(matches!(first.payload, LivePayload::Snapshot(_)));
        assert_eq!(first.sequence_number, Some(SequenceNumber(1)));
    }

    #[test]
    fn resume_from_another_stream_gets_snapshot() {
        let hub = BroadcastHub::new(limits(8));
        let match_id = MatchId::new();
        let mut events = Vec::new();
        let old = hub.open(snapshot_for(match_id, &[])).unwrap();
        publish_balls(&old, match_id, &mut events, 2);
        let mut viewer = old.subscribe(None).unwrap();
        let resume = viewer.try_recv().unwrap().resume_point();
        hub.close(match_id);

        // Reopened topic: revisions start again, on a new stream.
        let topic = hub.open(snapshot_for(match_id, &events)).unwrap();
        assert_ne!(topic.stream(), old.stream());
        publish_balls(&topic, match_id, &mut events, 4);
        assert!(topic.last_revision().unwrap() > resume.revision);

        let mut sub = topic.subscribe(Some(resume)).unwrap();
        let first = sub.try_recv().unwrap();
        assert!(matches!(first.payload, LivePayload::Snapshot(_)));
        assert_eq!(first.stream, topic.stream());
        assert_eq!(first.sequence_number, Some(SequenceNumber(5)));
        assert!(sub.try_recv().is_err());
    }

    #[test]
    fn resume_with_mismatched_sequence_gets_snapshot() {
        let (topic, match_id) = topic(limits(8));
        let mut events = Vec::new();
        publish_balls(&topic, match_id, &mut events, 3);

        let mut sub = topic
            .subscribe(Some(ResumePoint {
                stream: topic.stream(),
                sequence_number: Some(SequenceNumber(2)),
                revision: 1,
            }))
            .unwrap();
        let first = sub.try_recv().unwrap();
        assert!(matches!(first.payload, LivePayload::Snapshot(_)));
        assert_eq!(first.revision, 3);
    }

    #[test]
    fn subscriber_limit_enforced() {
        let (topic, _) = topic(HubLimits {
            queue_capacity: 4,
            max_subscribers: 1,
            replay_tail_len: 4,
        });
        let _first = topic.subscribe(None).unwrap();
        let err = topic.subscribe(None).unwrap_err();
        assert!(matches!(
            err,
            ScoringError::SubscriberLimitReached { max_subscribers: 1 }
        ));
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let (topic, _) = topic(limits(4));
        let sub = topic.subscribe(None).unwrap();
        assert_eq!(topic.subscriber_count(), 1);
        drop(sub);
        assert_eq!(topic.subscriber_count(), 0);
    }

    #[test]
    fn commentary_patches_latest_snapshot() {
        let (topic, match_id) = topic(limits(8));
        let mut events = Vec::new();
        publish_balls(&topic, match_id, &mut events, 2);
        let mut annotated = events[0].clone();
        annotated.annotation = Some(crease_types::Annotation {
            text: "Driven through the covers".to_string(),
            language: "en".to_string(),
            attached_at: chrono::Utc::now(),
        });
        let revision = topic.publish_commentary(&annotated).unwrap();
        assert_eq!(revision, 3);

        let latest = topic.latest_snapshot().unwrap();
        assert_eq!(latest.recent_balls[0].annotation, annotated.annotation);
    }

    #[test]
    fn commentary_for_retracted_ball_is_dropped() {
        let (topic, match_id) = topic(limits(8));
        let mut events = Vec::new();
        publish_balls(&topic, match_id, &mut events, 2);
        let mut annotated = events.pop().unwrap();
        annotated.annotation = Some(crease_types::Annotation {
            text: "Edged and gone".to_string(),
            language: "en".to_string(),
            attached_at: chrono::Utc::now(),
        });
        let mut retraction = snapshot_for(match_id, &events);
        retraction.reason = SnapshotReason::Retraction;
        topic
            .publish(vec![Outbound::snapshot(retraction.clone())], retraction)
            .unwrap();
        let mut sub = topic.subscribe(None).unwrap();
        let _snapshot = sub.try_recv().unwrap();

        let err = topic.publish_commentary(&annotated).unwrap_err();
        assert!(matches!(err, ScoringError::InvalidAnnotation { .. }));

        // Same sequence, different ball.
        let mut replacement = ball(1, 4);
        replacement.recorded_at = annotated.recorded_at + chrono::Duration::seconds(5);
        events.push(replacement.clone());
        let latest = snapshot_for(match_id, &events);
        topic
            .publish(vec![ball_outbound(&replacement, &latest)], latest)
            .unwrap();
        let _ball = sub.try_recv().unwrap();
        let err = topic.publish_commentary(&annotated).unwrap_err();
        assert!(matches!(err, ScoringError::InvalidAnnotation { .. }));

        assert!(sub.try_recv().is_err());
        assert_eq!(topic.last_revision().unwrap(), 4);
        assert!(topic.latest_snapshot().unwrap().recent_balls[1].annotation.is_none());
    }

    #[test]
    fn closing_hub_topic_ends_streams() {
        let hub = BroadcastHub::new(limits(4));
        let match_id = MatchId::new();
        hub.open(snapshot_for(match_id, &[])).unwrap();
        let mut sub = hub.subscribe(match_id, None).unwrap();
        assert!(hub.close(match_id));
        assert_eq!(sub.drop_reason(), Some(DropReason::Closed));
        assert!(sub.try_recv().is_ok());
        assert!(matches!(sub.try_recv(), Err(TryRecvError::Disconnected)));
        assert!(matches!(
            hub.subscribe(match_id, None).unwrap_err(),
            ScoringError::SessionNotFound(_)
        ));
    }
}
