use crate::{
    coalescer::history::{GenerationRecord, History},
    error::Result,
    models::{GeneratedImage, GenerationRequest},
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    Debouncing,
    Fetching(String),
    Displaying(Arc<GeneratedImage>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchPlan {
    pub seq: u64,
    pub request: GenerationRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Adopted(usize),
    Failed(String),
    /// Superseded by a newer request, or the session was torn down.
    Stale,
}

#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub prompt: String,
    pub debounced_prompt: String,
    pub phase: Phase,
    pub history: Vec<GenerationRecord>,
    pub active_index: Option<usize>,
    pub busy: bool,
}

impl SessionSnapshot {
    /// Record on screen; nothing is shown while the prompt box is empty.
    pub fn displayed(&self) -> Option<&GenerationRecord> {
        if self.prompt.is_empty() {
            return None;
        }
        self.active_index.and_then(|i| self.history.get(i))
    }
}

/// Client-side state for one editing session. Time is passed in, so the
/// caller owns the debounce timer.
#[derive(Debug)]
pub struct Session {
    prompt: String,
    debounced: String,
    deadline: Option<Instant>,
    window: Duration,
    iterative_mode: bool,
    api_key: Option<String>,
    phase: Phase,
    // Phase to fall back to when a debounce settles on an unchanged prompt.
    resting: Phase,
    history: History,
    cache: HashMap<String, Arc<GeneratedImage>>,
    in_flight: HashMap<u64, String>,
    current: Option<u64>,
    next_seq: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEBOUNCE_WINDOW, History::default())
    }
}

impl Session {
    pub fn new(window: Duration, history: History) -> Self {
        Self {
            prompt: String::new(),
            debounced: String::new(),
            deadline: None,
            window,
            iterative_mode: false,
            api_key: None,
            phase: Phase::Idle,
            resting: Phase::Idle,
            history,
            cache: HashMap::new(),
            in_flight: HashMap::new(),
            current: None,
            next_seq: 0,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn debounced_prompt(&self) -> &str {
        &self.debounced
    }

    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn busy(&self) -> bool {
        matches!(self.phase, Phase::Debouncing | Phase::Fetching(_))
    }

    pub fn set_iterative_mode(&mut self, enabled: bool) {
        self.iterative_mode = enabled;
    }

    pub fn set_api_key(&mut self, key: Option<String>) {
        self.api_key = key.filter(|k| !k.trim().is_empty());
    }

    pub fn edit(&mut self, prompt: impl Into<String>, now: Instant) {
        self.prompt = prompt.into();
        self.deadline = Some(now + self.window);
        if self.phase != Phase::Debouncing {
            self.resting = std::mem::replace(&mut self.phase, Phase::Debouncing);
        }
    }

    /// Propagates the prompt once the window has elapsed. Returns the request
    /// to send, if the new key needs one.
    pub fn settle(&mut self, now: Instant) -> Option<FetchPlan> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.deadline = None,
            _ => return None,
        }

        if self.prompt == self.debounced {
            self.phase = std::mem::replace(&mut self.resting, Phase::Idle);
            return None;
        }
        self.debounced = self.prompt.clone();
        let key = self.debounced.clone();

        if key.trim().is_empty() {
            self.current = None;
            self.phase = Phase::Idle;
            return None;
        }

        if let Some(image) = self.cache.get(&key).cloned() {
            log::debug!("🐛 Cache hit for {:?}", key);
            self.current = None;
            self.history.adopt(&key, image.clone());
            self.prune_cache();
            self.phase = Phase::Displaying(image);
            return None;
        }

        let pending = self
            .in_flight
            .iter()
            .find(|(_, k)| **k == key)
            .map(|(seq, _)| *seq);
        if let Some(seq) = pending {
            self.current = Some(seq);
            self.phase = Phase::Fetching(key);
            return None;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight.insert(seq, key.clone());
        self.current = Some(seq);
        self.phase = Phase::Fetching(key.clone());

        let mut request = GenerationRequest::new(key).with_iterative_mode(self.iterative_mode);
        request.user_api_key = self.api_key.clone();
        Some(FetchPlan { seq, request })
    }

    pub fn complete(&mut self, seq: u64, outcome: Result<GeneratedImage>) -> Completion {
        let key = match self.in_flight.remove(&seq) {
            Some(key) => key,
            None => return Completion::Stale,
        };
        if self.current != Some(seq) {
            log::debug!("🐛 Dropping stale response #{} for {:?}", seq, key);
            return Completion::Stale;
        }
        self.current = None;

        match outcome {
            Ok(image) => {
                let image = Arc::new(image);
                self.cache.insert(key.clone(), image.clone());
                let index = self.history.adopt(&key, image.clone());
                self.prune_cache();
                self.rest_in(Phase::Displaying(image));
                Completion::Adopted(index)
            }
            Err(e) => {
                let message = e.to_string();
                self.rest_in(Phase::Failed(message.clone()));
                Completion::Failed(message)
            }
        }
    }

    // Only results still reachable from history stay cached.
    fn prune_cache(&mut self) {
        let history = &self.history;
        self.cache.retain(|key, image| {
            history
                .records()
                .any(|r| r.prompt == *key && Arc::ptr_eq(&r.image, image))
        });
    }

    pub fn cached_prompts(&self) -> usize {
        self.cache.len()
    }

    // While the user is still typing the spinner phase wins.
    fn rest_in(&mut self, phase: Phase) {
        if self.deadline.is_some() {
            self.resting = phase;
        } else {
            self.phase = phase;
        }
    }

    pub fn select(&mut self, index: usize) -> Result<()> {
        self.history.select(index)?;
        if matches!(self.phase, Phase::Displaying(_)) {
            if let Some(image) = self.history.active().map(|r| r.image.clone()) {
                self.phase = Phase::Displaying(image);
            }
        }
        Ok(())
    }

    /// Ends the session. Requests already sent keep running; their results
    /// will come back as `Stale`.
    pub fn teardown(&mut self) {
        self.history.clear();
        self.cache.clear();
        self.in_flight.clear();
        self.current = None;
        self.deadline = None;
        self.prompt.clear();
        self.debounced.clear();
        self.phase = Phase::Idle;
        self.resting = Phase::Idle;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            prompt: self.prompt.clone(),
            debounced_prompt: self.debounced.clone(),
            phase: self.phase.clone(),
            history: self.history.records().cloned().collect(),
            active_index: self.history.active_index(),
            busy: self.busy(),
        }
    }
}

impl From<&Session> for SessionSnapshot {
    fn from(session: &Session) -> Self {
        session.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coalescer::history::HISTORY_CAPACITY;
    use crate::error::PaintError;

    fn image(tag: &str) -> GeneratedImage {
        GeneratedImage::new(tag, 0.2)
    }

    fn settle_on(session: &mut Session, prompt: &str, now: &mut Instant) -> Option<FetchPlan> {
        session.edit(prompt, *now);
        *now += DEBOUNCE_WINDOW;
        session.settle(*now)
    }

    #[test]
    fn only_the_last_edit_inside_the_window_settles() {
        let mut session = Session::default();
        let start = Instant::now();

        session.edit("a", start);
        session.edit("a red", start + Duration::from_millis(100));
        session.edit("a red fox in snow", start + Duration::from_millis(200));

        assert!(session.busy());
        assert_eq!(session.settle(start + Duration::from_millis(400)), None);

        let plan = session.settle(start + Duration::from_millis(500)).unwrap();
        assert_eq!(plan.request.prompt, "a red fox in snow");
        assert_eq!(session.phase(), &Phase::Fetching("a red fox in snow".into()));
        assert_eq!(session.settle(start + Duration::from_secs(5)), None);
    }

    #[test]
    fn success_is_recorded_and_selected() {
        let mut session = Session::default();
        let mut now = Instant::now();
        session.set_iterative_mode(true);
        session.set_api_key(Some("sk-user".into()));

        let plan = settle_on(&mut session, "a red fox in snow", &mut now).unwrap();
        assert!(plan.request.iterative_mode);
        assert_eq!(plan.request.caller_key(), Some("sk-user"));

        assert_eq!(
            session.complete(plan.seq, Ok(image("fox"))),
            Completion::Adopted(0)
        );
        let snapshot = session.snapshot();
        assert_eq!(snapshot.displayed().unwrap().prompt, "a red fox in snow");
        assert!(matches!(snapshot.phase, Phase::Displaying(_)));
        assert!(!snapshot.busy);
    }

    #[test]
    fn blank_prompt_sends_nothing() {
        let mut session = Session::default();
        let mut now = Instant::now();
        assert_eq!(settle_on(&mut session, "   ", &mut now), None);
        assert_eq!(session.phase(), &Phase::Idle);
    }

    #[test]
    fn cached_prompt_is_not_refetched() {
        let mut session = Session::default();
        let mut now = Instant::now();

        let fox = settle_on(&mut session, "fox", &mut now).unwrap();
        session.complete(fox.seq, Ok(image("fox")));
        let cat = settle_on(&mut session, "cat", &mut now).unwrap();
        session.complete(cat.seq, Ok(image("cat")));

        assert_eq!(settle_on(&mut session, "fox", &mut now), None);
        assert_eq!(session.history().len(), 3);
        assert_eq!(session.history().active().unwrap().prompt, "fox");
    }

    #[test]
    fn superseded_response_is_discarded() {
        let mut session = Session::default();
        let mut now = Instant::now();

        let slow = settle_on(&mut session, "slow", &mut now).unwrap();
        let fast = settle_on(&mut session, "fast", &mut now).unwrap();
        assert!(fast.seq > slow.seq);

        assert_eq!(
            session.complete(fast.seq, Ok(image("fast"))),
            Completion::Adopted(0)
        );
        assert_eq!(
            session.complete(slow.seq, Ok(image("slow"))),
            Completion::Stale
        );
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history().active().unwrap().prompt, "fast");
    }

    #[test]
    fn returning_to_an_in_flight_prompt_reuses_it() {
        let mut session = Session::default();
        let mut now = Instant::now();

        let first = settle_on(&mut session, "a", &mut now).unwrap();
        let second = settle_on(&mut session, "b", &mut now).unwrap();
        assert_eq!(settle_on(&mut session, "a", &mut now), None);

        assert_eq!(session.complete(second.seq, Ok(image("b"))), Completion::Stale);
        assert_eq!(session.complete(first.seq, Ok(image("a"))), Completion::Adopted(0));
    }

    #[test]
    fn failure_leaves_history_alone() {
        let mut session = Session::default();
        let mut now = Instant::now();

        let ok = settle_on(&mut session, "fox", &mut now).unwrap();
        session.complete(ok.seq, Ok(image("fox")));
        let bad = settle_on(&mut session, "fox!", &mut now).unwrap();

        // Placeholder: the previous image stays selected while fetching.
        assert_eq!(session.snapshot().displayed().unwrap().prompt, "fox");

        let outcome = session.complete(
            bad.seq,
            Err(PaintError::Gateway {
                status: 429,
                message: "Rate limit exceeded".into(),
            }),
        );
        assert_eq!(outcome, Completion::Failed("Rate limit exceeded".into()));
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.snapshot().displayed().unwrap().prompt, "fox");
        assert_eq!(session.phase(), &Phase::Failed("Rate limit exceeded".into()));
    }

    #[test]
    fn result_arriving_mid_typing_keeps_spinner() {
        let mut session = Session::default();
        let mut now = Instant::now();

        let plan = settle_on(&mut session, "fox", &mut now).unwrap();
        session.edit("fox in", now);
        session.complete(plan.seq, Ok(image("fox")));
        assert_eq!(session.phase(), &Phase::Debouncing);
        assert_eq!(session.history().len(), 1);

        // Typing back to the settled prompt restores the displayed result.
        session.edit("fox", now);
        now += DEBOUNCE_WINDOW;
        assert_eq!(session.settle(now), None);
        assert!(matches!(session.phase(), Phase::Displaying(_)));
    }

    #[test]
    fn selection_and_teardown() {
        let mut session = Session::default();
        let mut now = Instant::now();
        for prompt in ["one", "two"] {
            let plan = settle_on(&mut session, prompt, &mut now).unwrap();
            session.complete(plan.seq, Ok(image(prompt)));
        }

        session.select(0).unwrap();
        assert_eq!(session.snapshot().displayed().unwrap().prompt, "one");
        assert!(session.select(5).is_err());

        let pending = settle_on(&mut session, "three", &mut now).unwrap();
        session.teardown();
        assert!(session.history().is_empty());
        assert_eq!(session.snapshot().active_index, None);
        assert_eq!(session.complete(pending.seq, Ok(image("three"))), Completion::Stale);
    }

    #[test]
    fn cache_never_outgrows_history() {
        let mut session = Session::default();
        let mut now = Instant::now();

        for i in 0..1000 {
            let prompt = format!("prompt {}", i);
            let plan = settle_on(&mut session, &prompt, &mut now).unwrap();
            session.complete(plan.seq, Ok(image(&prompt)));
            assert!(session.cached_prompts() <= HISTORY_CAPACITY);
        }
        assert_eq!(session.history().len(), HISTORY_CAPACITY);
        assert_eq!(session.cached_prompts(), HISTORY_CAPACITY);

        // Evicted prompts are fetched again; retained ones are not.
        assert!(settle_on(&mut session, "prompt 0", &mut now).is_some());
        assert_eq!(settle_on(&mut session, "prompt 995", &mut now), None);
    }
}
