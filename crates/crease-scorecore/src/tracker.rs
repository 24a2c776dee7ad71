//! Over and innings position tracking.
//!
//! The tracker folds ball events into "where are we": the position of the
//! last delivery, the position the next delivery will occupy, and whether
//! the innings has reached a natural end. Only legal deliveries advance the
//! ball count; a wide or no-ball repeats the same legal slot.

use crease_types::{BallEvent, BallPosition, InningsEnd, MatchRules, constants};

use crate::DerivationContext;

/// Position summary after folding a ledger prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerState {
    pub innings: u8,
    /// Over of the most recent delivery in `innings` (0-based).
    pub over: u32,
    /// Ball-in-over of the most recent delivery, 0 when none yet.
    pub ball_in_over: u8,
    pub legal_balls_in_over: u8,
    /// The most recent delivery completed its over.
    pub over_complete: bool,
    /// Natural end reached: all out, overs exhausted or target reached.
    pub innings_complete: Option<InningsEnd>,
    /// Position the next delivery will be recorded at.
    pub next: BallPosition,
}

#[derive(Debug, Clone, Copy, Default)]
struct InningsTally {
    runs: u32,
    wickets: u32,
    legal_balls: u32,
    over: u32,
    legal_in_over: u8,
    last: Option<BallPosition>,
}

impl InningsTally {
    fn over_full(&self) -> bool {
        self.legal_in_over >= constants::BALLS_PER_OVER
    }
}

/// Incremental over/innings tracker.
#[derive(Debug, Clone)]
pub struct OverTracker {
    all_out_wickets: u32,
    balls_per_innings: u32,
    tallies: [InningsTally; 2],
    last_over_complete: bool,
}

impl OverTracker {
    #[must_use]
    pub fn new(rules: &MatchRules) -> Self {
        Self {
            all_out_wickets: rules.all_out_wickets(),
            balls_per_innings: rules.balls_per_innings(),
            tallies: [InningsTally::default(); 2],
            last_over_complete: false,
        }
    }

    fn tally(&self, innings: u8) -> &InningsTally {
        &self.tallies[slot(innings)]
    }

    /// Fold one event. Events must arrive in ledger order.
    pub fn push(&mut self, event: &BallEvent) {
        let tally = &mut self.tallies[slot(event.position.innings)];
        if tally.over_full() {
            tally.over += 1;
            tally.legal_in_over = 0;
        }
        tally.runs += event.total_runs();
        if event.is_wicket() {
            tally.wickets += 1;
        }
        if event.is_legal() {
            tally.legal_in_over += 1;
            tally.legal_balls += 1;
        }
        tally.last = Some(event.position);
        self.last_over_complete = event.is_legal() && tally.over_full();
    }

    /// Where the next delivery of `innings` lands.
    #[must_use]
    pub fn next_position(&self, innings: u8) -> BallPosition {
        let tally = self.tally(innings);
        if tally.over_full() {
            BallPosition {
                innings,
                over: tally.over + 1,
                ball_in_over: 1,
            }
        } else {
            BallPosition {
                innings,
                over: tally.over,
                ball_in_over: tally.legal_in_over + 1,
            }
        }
    }

    /// Natural end of `innings`, if reached. Target is checked first: a
    /// winning hit on the last ball ends the chase, not the overs.
    #[must_use]
    pub fn completion(&self, innings: u8, target: Option<u32>) -> Option<InningsEnd> {
        let tally = self.tally(innings);
        if innings > 1 && target.is_some_and(|target| tally.runs >= target) {
            return Some(InningsEnd::TargetReached);
        }
        if tally.wickets >= self.all_out_wickets {
            return Some(InningsEnd::AllOut);
        }
        if tally.legal_balls >= self.balls_per_innings {
            return Some(InningsEnd::OversExhausted);
        }
        None
    }

    #[must_use]
    pub fn runs(&self, innings: u8) -> u32 {
        self.tally(innings).runs
    }

    #[must_use]
    pub fn wickets(&self, innings: u8) -> u32 {
        self.tally(innings).wickets
    }

    #[must_use]
    pub fn legal_balls(&self, innings: u8) -> u32 {
        self.tally(innings).legal_balls
    }

    /// Target for the second innings once the first is closed.
    #[must_use]
    pub fn target(&self, ctx: DerivationContext) -> Option<u32> {
        ctx.first_innings_closed.then(|| self.runs(1) + 1)
    }

    #[must_use]
    pub fn state(&self, ctx: DerivationContext) -> TrackerState {
        let innings = ctx.current_innings;
        let tally = self.tally(innings);
        let (over, ball_in_over) = tally
            .last
            .map_or((0, 0), |last| (last.over, last.ball_in_over));
        let target = if innings > 1 { self.target(ctx) } else { None };
        TrackerState {
            innings,
            over,
            ball_in_over,
            legal_balls_in_over: tally.legal_in_over,
            over_complete: tally.last.is_some() && self.last_over_complete,
            innings_complete: self.completion(innings, target),
            next: self.next_position(innings),
        }
    }
}

fn slot(innings: u8) -> usize {
    usize::from(innings.clamp(1, 2) - 1)
}

/// Fold a whole ledger prefix into a [`TrackerState`].
#[must_use]
pub fn track(events: &[BallEvent], rules: &MatchRules, ctx: DerivationContext) -> TrackerState {
    let mut tracker = OverTracker::new(rules);
    for event in events {
        tracker.push(event);
    }
    tracker.state(ctx)
}
