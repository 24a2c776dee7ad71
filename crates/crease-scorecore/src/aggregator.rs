//! Score aggregation: folds the ledger into a [`DerivedMatchState`].
//!
//! The [`Aggregator`] is incremental for the hot path (one `push` per
//! appended ball) and [`aggregate`] is the full replay used after a
//! retraction or a restore. Both walk the same code, so a replay of a prefix
//! always equals the incremental state after that prefix.

use crease_types::{
    BallEvent, BattingFigures, BowlingFigures, DerivedMatchState, DismissalKind, ExtraKind,
    ExtrasBreakdown, FallOfWicket, InningsScore, MatchRules, OverSummary, Partnership, PlayerId,
    SequenceNumber, constants, overs_notation,
};

use crate::{DerivationContext, LedgerDigest, OverTracker, rates};

#[derive(Debug, Clone)]
struct BatterBook {
    player: PlayerId,
    runs: u32,
    balls: u32,
    fours: u32,
    sixes: u32,
    dismissal: Option<DismissalKind>,
    dismissed_by: Option<PlayerId>,
}

impl BatterBook {
    fn new(player: PlayerId) -> Self {
        Self {
            player,
            runs: 0,
            balls: 0,
            fours: 0,
            sixes: 0,
            dismissal: None,
            dismissed_by: None,
        }
    }

    fn figures(&self) -> BattingFigures {
        BattingFigures {
            player: self.player,
            runs: self.runs,
            balls_faced: self.balls,
            fours: self.fours,
            sixes: self.sixes,
            strike_rate: rates::strike_rate(self.runs, self.balls),
            average: rates::batting_average(self.runs, u32::from(self.dismissal.is_some())),
            dismissal: self.dismissal,
            dismissed_by: self.dismissed_by,
        }
    }
}

#[derive(Debug, Clone)]
struct BowlerBook {
    player: PlayerId,
    legal_balls: u32,
    runs: u32,
    wickets: u32,
    wides: u32,
    no_balls: u32,
    maidens: u32,
}

impl BowlerBook {
    fn new(player: PlayerId) -> Self {
        Self {
            player,
            legal_balls: 0,
            runs: 0,
            wickets: 0,
            wides: 0,
            no_balls: 0,
            maidens: 0,
        }
    }

    fn figures(&self) -> BowlingFigures {
        BowlingFigures {
            player: self.player,
            legal_balls: self.legal_balls,
            overs: overs_notation(self.legal_balls),
            maidens: self.maidens,
            runs_conceded: self.runs,
            wickets: self.wickets,
            wides: self.wides,
            no_balls: self.no_balls,
            economy: rates::economy(self.runs, self.legal_balls),
        }
    }
}

#[derive(Debug, Clone)]
struct OverBook {
    over: u32,
    /// Bowler who opened the over.
    bowler: PlayerId,
    /// Bowler of the latest delivery; differs after a mid-over change.
    last_bowler: PlayerId,
    /// More than one bowler delivered in this over.
    shared: bool,
    runs: u32,
    /// Runs charged to the bowler; a maiden needs zero.
    conceded: u32,
    wickets: u32,
    extras: u32,
    legal: u8,
    deliveries: Vec<String>,
}

impl OverBook {
    fn new(over: u32, bowler: PlayerId) -> Self {
        Self {
            over,
            bowler,
            last_bowler: bowler,
            shared: false,
            runs: 0,
            conceded: 0,
            wickets: 0,
            extras: 0,
            legal: 0,
            deliveries: Vec::new(),
        }
    }

    fn complete(&self) -> bool {
        self.legal >= constants::BALLS_PER_OVER
    }

    /// A shared over is nobody's maiden.
    fn is_maiden(&self) -> bool {
        self.complete() && self.conceded == 0 && !self.shared
    }

    fn summary(&self, innings: u8) -> OverSummary {
        OverSummary {
            innings,
            over: self.over,
            bowler: Some(self.bowler),
            runs: self.runs,
            wickets: self.wickets,
            extras: self.extras,
            legal_balls: self.legal,
            deliveries: self.deliveries.clone(),
            complete: self.complete(),
            maiden: self.is_maiden(),
        }
    }
}

/// Scorecard label of one delivery: `"4"`, `"W"`, `"1wd"`, `"5nb"`.
#[must_use]
pub fn delivery_label(event: &BallEvent) -> String {
    if event.is_wicket() {
        return "W".to_string();
    }
    match event.extra {
        Some(extra) => format!("{}{}", event.total_runs(), extra.kind.short_label()),
        None => event.runs_off_bat.to_string(),
    }
}

#[derive(Debug, Clone)]
struct InningsBook {
    innings: u8,
    runs: u32,
    wickets: u32,
    legal_balls: u32,
    extras: ExtrasBreakdown,
    batters: Vec<BatterBook>,
    bowlers: Vec<BowlerBook>,
    striker: Option<PlayerId>,
    non_striker: Option<PlayerId>,
    bowler: Option<PlayerId>,
    partnership: Partnership,
    fall: Vec<FallOfWicket>,
    overs: Vec<OverBook>,
}

impl InningsBook {
    fn new(innings: u8) -> Self {
        Self {
            innings,
            runs: 0,
            wickets: 0,
            legal_balls: 0,
            extras: ExtrasBreakdown::default(),
            batters: Vec::new(),
            bowlers: Vec::new(),
            striker: None,
            non_striker: None,
            bowler: None,
            partnership: Partnership {
                for_wicket: 1,
                runs: 0,
                balls: 0,
            },
            fall: Vec::new(),
            overs: Vec::new(),
        }
    }

    fn batter_mut(&mut self, player: PlayerId) -> &mut BatterBook {
        let index = match self.batters.iter().position(|b| b.player == player) {
            Some(index) => index,
            None => {
                self.batters.push(BatterBook::new(player));
                self.batters.len() - 1
            }
        };
        &mut self.batters[index]
    }

    fn bowler_mut(&mut self, player: PlayerId) -> &mut BowlerBook {
        let index = match self.bowlers.iter().position(|b| b.player == player) {
            Some(index) => index,
            None => {
                self.bowlers.push(BowlerBook::new(player));
                self.bowlers.len() - 1
            }
        };
        &mut self.bowlers[index]
    }

    fn push(&mut self, event: &BallEvent) {
        let total = event.total_runs();
        let legal = event.is_legal();
        self.runs += total;
        if legal {
            self.legal_balls += 1;
        }
        if let Some(extra) = event.extra {
            let runs = u32::from(extra.runs);
            match extra.kind {
                ExtraKind::Wide => self.extras.wides += runs,
                ExtraKind::NoBall => self.extras.no_balls += runs,
                ExtraKind::Bye => self.extras.byes += runs,
                ExtraKind::LegBye => self.extras.leg_byes += runs,
            }
        }

        // Register both batters so the card lists them in order of arrival.
        self.batter_mut(event.striker);
        self.batter_mut(event.non_striker);
        let striker = self.batter_mut(event.striker);
        striker.runs += u32::from(event.runs_off_bat);
        if event.faced_by_striker() {
            striker.balls += 1;
        }
        match event.runs_off_bat {
            4 => striker.fours += 1,
            6 => striker.sixes += 1,
            _ => {}
        }

        let bowler = self.bowler_mut(event.bowler);
        if legal {
            bowler.legal_balls += 1;
        }
        bowler.runs += event.runs_conceded();
        if event.bowler_wicket() {
            bowler.wickets += 1;
        }
        match event.extra.map(|extra| extra.kind) {
            Some(ExtraKind::Wide) => bowler.wides += 1,
            Some(ExtraKind::NoBall) => bowler.no_balls += 1,
            _ => {}
        }

        if self
            .overs
            .last()
            .is_none_or(|over| over.over != event.position.over)
        {
            self.overs
                .push(OverBook::new(event.position.over, event.bowler));
        }
        let mut maiden_for = None;
        let mut over_closed = false;
        if let Some(over) = self.overs.last_mut() {
            over.shared |= event.bowler != over.bowler;
            over.last_bowler = event.bowler;
            over.runs += total;
            over.conceded += event.runs_conceded();
            over.extras += event.extra_runs();
            if event.is_wicket() {
                over.wickets += 1;
            }
            if legal {
                over.legal += 1;
            }
            over.deliveries.push(delivery_label(event));
            over_closed = legal && over.complete();
            if over_closed && over.is_maiden() {
                maiden_for = Some(over.bowler);
            }
        }
        if let Some(bowler) = maiden_for {
            self.bowler_mut(bowler).maidens += 1;
        }

        self.partnership.runs += total;
        self.partnership.balls += u32::from(legal);

        if let Some(wicket) = event.wicket {
            self.wickets += 1;
            let dismissed_by = event.bowler_wicket().then_some(event.bowler);
            let batter = self.batter_mut(wicket.batter);
            batter.dismissal = Some(wicket.kind);
            batter.dismissed_by = dismissed_by;
            self.fall.push(FallOfWicket {
                wicket_number: self.wickets,
                batter: wicket.batter,
                runs_at_fall: self.runs,
                overs: overs_notation(self.legal_balls),
                sequence: event.sequence,
            });
            self.partnership = Partnership {
                for_wicket: self.wickets + 1,
                runs: 0,
                balls: 0,
            };
        }

        // Suggested ends for the next ball; the scorer names the real ones.
        let mut striker = Some(event.striker);
        let mut non_striker = Some(event.non_striker);
        if event.runs_run() % 2 == 1 {
            std::mem::swap(&mut striker, &mut non_striker);
        }
        if let Some(wicket) = event.wicket {
            if striker == Some(wicket.batter) {
                striker = None;
            } else if non_striker == Some(wicket.batter) {
                non_striker = None;
            }
        }
        if over_closed {
            std::mem::swap(&mut striker, &mut non_striker);
        }
        self.striker = striker;
        self.non_striker = non_striker;
        self.bowler = Some(event.bowler);
    }

    fn score(&self) -> InningsScore {
        let completed_overs = self
            .overs
            .iter()
            .filter(|over| over.complete())
            .map(|over| over.summary(self.innings))
            .collect();
        let current_over = self
            .overs
            .last()
            .filter(|over| !over.complete())
            .map(|over| over.summary(self.innings));
        InningsScore {
            innings: self.innings,
            runs: self.runs,
            wickets: self.wickets,
            legal_balls: self.legal_balls,
            overs: overs_notation(self.legal_balls),
            extras: self.extras,
            run_rate: rates::run_rate(self.runs, self.legal_balls),
            striker: self.striker,
            non_striker: self.non_striker,
            bowler: self.bowler,
            partnership: self.partnership,
            batters: self.batters.iter().map(BatterBook::figures).collect(),
            bowlers: self.bowlers.iter().map(BowlerBook::figures).collect(),
            fall_of_wickets: self.fall.clone(),
            completed_overs,
            current_over,
        }
    }
}

/// Incremental score aggregator.
#[derive(Debug, Clone)]
pub struct Aggregator {
    rules: MatchRules,
    tracker: OverTracker,
    innings: Vec<InningsBook>,
    digest: LedgerDigest,
    last_sequence: Option<SequenceNumber>,
    ball_count: u64,
}

impl Aggregator {
    #[must_use]
    pub fn new(rules: &MatchRules) -> Self {
        Self {
            rules: rules.clone(),
            tracker: OverTracker::new(rules),
            innings: Vec::new(),
            digest: LedgerDigest::genesis(),
            last_sequence: None,
            ball_count: 0,
        }
    }

    /// Rebuild from a ledger prefix.
    #[must_use]
    pub fn from_events(rules: &MatchRules, events: &[BallEvent]) -> Self {
        let mut aggregator = Self::new(rules);
        for event in events {
            aggregator.push(event);
        }
        aggregator
    }

    /// Fold one event. Events must arrive in ledger order.
    pub fn push(&mut self, event: &BallEvent) {
        let innings = event.position.innings;
        while self.innings.len() < usize::from(innings) {
            let next = u8::try_from(self.innings.len() + 1).unwrap_or(u8::MAX);
            self.innings.push(InningsBook::new(next));
        }
        if let Some(book) = self.book_mut(innings) {
            book.push(event);
        }
        self.tracker.push(event);
        self.digest.push(event);
        self.last_sequence = Some(event.sequence);
        self.ball_count += 1;
        tracing::trace!(
            sequence = %event.sequence,
            position = %event.position,
            runs = event.total_runs(),
            "Ball folded"
        );
    }

    fn book(&self, innings: u8) -> Option<&InningsBook> {
        self.innings.iter().find(|book| book.innings == innings)
    }

    fn book_mut(&mut self, innings: u8) -> Option<&mut InningsBook> {
        self.innings.iter_mut().find(|book| book.innings == innings)
    }

    #[must_use]
    pub fn rules(&self) -> &MatchRules {
        &self.rules
    }

    #[must_use]
    pub fn tracker(&self) -> &OverTracker {
        &self.tracker
    }

    #[must_use]
    pub fn digest(&self) -> &LedgerDigest {
        &self.digest
    }

    #[must_use]
    pub fn ball_count(&self) -> u64 {
        self.ball_count
    }

    #[must_use]
    pub fn last_sequence(&self) -> Option<SequenceNumber> {
        self.last_sequence
    }

    /// Scoreboard for an innings; empty when no ball has been bowled in it.
    #[must_use]
    pub fn innings_score(&self, innings: u8) -> InningsScore {
        self.book(innings)
            .map_or_else(|| InningsBook::new(innings).score(), InningsBook::score)
    }

    /// Summary of a specific over, complete or not.
    #[must_use]
    pub fn over_summary(&self, innings: u8, over: u32) -> Option<OverSummary> {
        self.book(innings)?
            .overs
            .iter()
            .find(|book| book.over == over)
            .map(|book| book.summary(innings))
    }

    /// Suggested striker and non-striker for the next ball of `innings`.
    #[must_use]
    pub fn crease(&self, innings: u8) -> (Option<PlayerId>, Option<PlayerId>) {
        self.book(innings)
            .map_or((None, None), |book| (book.striker, book.non_striker))
    }

    #[must_use]
    pub fn is_dismissed(&self, innings: u8, player: PlayerId) -> bool {
        self.book(innings).is_some_and(|book| {
            book.batters
                .iter()
                .any(|b| b.player == player && b.dismissal.is_some())
        })
    }

    /// Legal balls delivered by `bowler` in `innings`, for over quotas.
    #[must_use]
    pub fn bowler_legal_balls(&self, innings: u8, bowler: PlayerId) -> u32 {
        self.book(innings)
            .and_then(|book| book.bowlers.iter().find(|b| b.player == bowler))
            .map_or(0, |b| b.legal_balls)
    }

    /// Bowler who finished the last completed over in `innings`.
    #[must_use]
    pub fn previous_over_bowler(&self, innings: u8) -> Option<PlayerId> {
        self.book(innings)?
            .overs
            .iter()
            .rev()
            .find(|over| over.complete())
            .map(|over| over.last_bowler)
    }

    /// Bowler of the over currently in progress, if one is open.
    #[must_use]
    pub fn open_over_bowler(&self, innings: u8) -> Option<PlayerId> {
        self.book(innings)?
            .overs
            .last()
            .filter(|over| !over.complete())
            .map(|over| over.bowler)
    }

    /// Project everything into a [`DerivedMatchState`].
    #[must_use]
    pub fn snapshot(&self, ctx: DerivationContext) -> DerivedMatchState {
        let current = ctx.current_innings;
        let highest = u8::try_from(self.innings.len())
            .unwrap_or(u8::MAX)
            .max(current);
        let innings: Vec<InningsScore> = (1..=highest).map(|n| self.innings_score(n)).collect();
        let tracked = self.tracker.state(ctx);

        let target = self.tracker.target(ctx);
        let chase = if current > 1 { target } else { None };
        let (runs_required, balls_remaining, required_run_rate) = match chase {
            Some(target) => {
                let runs = self.tracker.runs(current);
                let remaining = self
                    .rules
                    .balls_per_innings()
                    .saturating_sub(self.tracker.legal_balls(current));
                (
                    Some(target.saturating_sub(runs)),
                    Some(remaining),
                    Some(rates::required_run_rate(
                        target,
                        runs.min(target),
                        remaining,
                    )),
                )
            }
            None => (None, None, None),
        };

        DerivedMatchState {
            current_innings: current,
            next_ball: tracked.next,
            last_sequence: self.last_sequence,
            ball_count: self.ball_count,
            run_rate: rates::run_rate(self.tracker.runs(current), self.tracker.legal_balls(current)),
            innings,
            target,
            runs_required,
            balls_remaining,
            required_run_rate,
            innings_complete: tracked.innings_complete,
            over_complete: tracked.over_complete,
            ledger_digest: self.digest.to_hex(),
        }
    }
}

/// Full replay of a ledger prefix.
#[must_use]
pub fn aggregate(
    events: &[BallEvent],
    rules: &MatchRules,
    ctx: DerivationContext,
) -> DerivedMatchState {
    Aggregator::from_events(rules, events).snapshot(ctx)
}
