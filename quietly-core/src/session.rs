//! Reading session timer
//!
//! A session moves through `Running -> {Paused <-> Running} -> Ended`. `Ended` is
//! terminal. Every transition takes the current instant explicitly and returns a
//! new [`ReadingSession`]; the input is never modified, so the caller decides
//! when (and whether) to persist the result.
//!
//! Elapsed time is recomputed from stored fields rather than accumulated in
//! memory:
//!
//! ```text
//! elapsed = trunc((now - started_at) - total_paused_seconds - (now - paused_at))
//! ```
//!
//! clamped to zero. The differences are taken at full precision and truncated
//! once, so a paused session reads `trunc(paused_at - started_at) - total`
//! no matter how far `now` moves. [`elapsed_seconds`] is the only implementation of this
//! formula; the live timer, the lock-screen countup and the final duration all
//! go through it.
//!
//! ## Example
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use quietly_core::session;
//!
//! let t0 = Utc.with_ymd_and_hms(2024, 1, 15, 20, 0, 0).unwrap();
//! let s = session::start(&[], "book-1", Some(10), t0).unwrap();
//! let s = session::pause(&s, t0 + Duration::seconds(600)).unwrap();
//! let s = session::resume(&s, t0 + Duration::seconds(900)).unwrap();
//! let s = session::end(&s, t0 + Duration::seconds(1500), Some(30), None).unwrap();
//!
//! assert_eq!(s.duration_seconds, Some(1200));
//! assert_eq!(s.pages_read, Some(20));
//! ```

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::types::{ReadingSession, SessionState};
use chrono::{DateTime, Duration, Utc};

/// Whole seconds from `from` to `to`, truncating any fractional part.
///
/// Negative when `to` precedes `from`.
fn whole_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    to.signed_duration_since(from).num_seconds()
}

fn validate_page(label: &str, page: Option<i32>) -> Result<()> {
    match page {
        Some(p) if p < 0 => Err(Error::invalid_input(format!(
            "{} must not be negative (got {})",
            label, p
        ))),
        _ => Ok(()),
    }
}

/// Net reading time of `session` at `now`, in whole seconds.
///
/// Usable at any point while the session is active. For an ended session the
/// recorded `duration_seconds` is returned, so the value stops growing.
pub fn elapsed_seconds(session: &ReadingSession, now: DateTime<Utc>) -> i64 {
    if session.ended_at.is_some() {
        if let Some(duration) = session.duration_seconds {
            return duration;
        }
    }

    let in_progress_pause = session
        .paused_at
        .map(|paused_at| (now - paused_at).max(Duration::zero()))
        .unwrap_or_else(Duration::zero);

    ((now - session.started_at)
        - Duration::seconds(session.total_paused_seconds)
        - in_progress_pause)
        .num_seconds()
        .max(0)
}

/// Start a new session for `book_id`.
///
/// `active` is whatever sessions the caller already knows about; if any of them
/// is an active session for the same book, the start is rejected.
pub fn start(
    active: &[ReadingSession],
    book_id: &str,
    start_page: Option<i32>,
    now: DateTime<Utc>,
) -> Result<ReadingSession> {
    if let Some(existing) = active
        .iter()
        .find(|s| s.book_id == book_id && s.is_active())
    {
        return Err(Error::invalid_state(format!(
            "book {} already has an active session ({})",
            book_id, existing.id
        )));
    }
    validate_page("start page", start_page)?;

    Ok(ReadingSession {
        id: uuid::Uuid::new_v4().to_string(),
        book_id: book_id.to_string(),
        started_at: now,
        ended_at: None,
        paused_at: None,
        total_paused_seconds: 0,
        start_page,
        end_page: None,
        pages_read: None,
        duration_seconds: None,
        notes: None,
    })
}

/// Pause a running session.
pub fn pause(session: &ReadingSession, now: DateTime<Utc>) -> Result<ReadingSession> {
    match session.state() {
        SessionState::Running => Ok(ReadingSession {
            paused_at: Some(now),
            ..session.clone()
        }),
        SessionState::Paused => Err(Error::invalid_state(format!(
            "session {} is already paused",
            session.id
        ))),
        SessionState::Ended => Err(Error::invalid_state(format!(
            "session {} has ended",
            session.id
        ))),
    }
}

/// Resume a paused session, folding the pause into `total_paused_seconds`.
pub fn resume(session: &ReadingSession, now: DateTime<Utc>) -> Result<ReadingSession> {
    match session.state() {
        SessionState::Paused => Ok(fold_pause(session, now)),
        SessionState::Running => Err(Error::invalid_state(format!(
            "session {} is not paused",
            session.id
        ))),
        SessionState::Ended => Err(Error::invalid_state(format!(
            "session {} has ended",
            session.id
        ))),
    }
}

/// End a running or paused session.
///
/// A paused session is pause-folded first, exactly as [`resume`] would, so
/// pausing and then ending yields the same duration as resuming and ending at
/// the same instant.
pub fn end(
    session: &ReadingSession,
    now: DateTime<Utc>,
    end_page: Option<i32>,
    notes: Option<String>,
) -> Result<ReadingSession> {
    if session.state() == SessionState::Ended {
        return Err(Error::invalid_state(format!(
            "session {} has already ended",
            session.id
        )));
    }
    validate_page("end page", end_page)?;
    if let (Some(start), Some(end)) = (session.start_page, end_page) {
        if end < start {
            return Err(Error::invalid_input(format!(
                "end page {} is before start page {}",
                end, start
            )));
        }
    }

    let mut ended = fold_pause(session, now);
    ended.duration_seconds = Some(elapsed_seconds(&ended, now));
    ended.ended_at = Some(now);
    ended.end_page = end_page;
    ended.pages_read = match (ended.start_page, end_page) {
        (Some(start), Some(end)) => Some((end - start).max(0)),
        _ => None,
    };
    ended.notes = notes;
    Ok(ended)
}

/// Fold an in-progress pause into the accumulated total. No-op when running.
///
/// The new total is whatever makes the running formula read exactly the
/// elapsed value the session showed while paused, so net time does not jump
/// across a resume even when the pause started mid-second.
fn fold_pause(session: &ReadingSession, now: DateTime<Utc>) -> ReadingSession {
    let mut folded = session.clone();
    if folded.paused_at.is_some() {
        let held = elapsed_seconds(session, now);
        folded.paused_at = None;
        // Clock skew must never shrink the total.
        folded.total_paused_seconds = (whole_seconds(session.started_at, now) - held)
            .max(session.total_paused_seconds);
    }
    folded
}

/// Look up a session by id among those the caller supplied.
pub fn find_session<'a>(sessions: &'a [ReadingSession], id: &str) -> Result<&'a ReadingSession> {
    sessions
        .iter()
        .find(|s| s.id == id)
        .ok_or_else(|| Error::not_found("session", id))
}

/// The active session for `book_id`, if any.
pub fn active_for_book<'a>(
    sessions: &'a [ReadingSession],
    book_id: &str,
) -> Option<&'a ReadingSession> {
    sessions
        .iter()
        .find(|s| s.book_id == book_id && s.is_active())
}

/// Session transitions driven by a [`Clock`].
///
/// Thin convenience over the free functions for callers that do not want to
/// thread `now` through every call.
#[derive(Debug, Clone)]
pub struct SessionTimer<C: Clock> {
    clock: C,
}

impl<C: Clock> SessionTimer<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    /// The clock this timer reads.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn start(
        &self,
        active: &[ReadingSession],
        book_id: &str,
        start_page: Option<i32>,
    ) -> Result<ReadingSession> {
        start(active, book_id, start_page, self.clock.now())
    }

    pub fn pause(&self, session: &ReadingSession) -> Result<ReadingSession> {
        pause(session, self.clock.now())
    }

    pub fn resume(&self, session: &ReadingSession) -> Result<ReadingSession> {
        resume(session, self.clock.now())
    }

    pub fn end(
        &self,
        session: &ReadingSession,
        end_page: Option<i32>,
        notes: Option<String>,
    ) -> Result<ReadingSession> {
        end(session, self.clock.now(), end_page, notes)
    }

    pub fn elapsed_seconds(&self, session: &ReadingSession) -> i64 {
        elapsed_seconds(session, self.clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 20, 0, 0).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(secs)
    }

    fn started() -> ReadingSession {
        start(&[], "book-1", Some(10), t0()).unwrap()
    }

    #[test]
    fn test_start_initializes_running_session() {
        let s = started();
        assert_eq!(s.state(), SessionState::Running);
        assert_eq!(s.started_at, t0());
        assert_eq!(s.total_paused_seconds, 0);
        assert!(s.paused_at.is_none());
        assert_eq!(s.start_page, Some(10));
        assert!(!s.id.is_empty());
    }

    #[test]
    fn test_start_rejects_second_active_session_for_book() {
        let existing = started();
        let err = start(&[existing.clone()], "book-1", None, at(5)).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));

        // Other books are unaffected
        assert!(start(&[existing.clone()], "book-2", None, at(5)).is_ok());

        // An ended session does not block a new one
        let ended = end(&existing, at(60), None, None).unwrap();
        assert!(start(&[ended], "book-1", None, at(120)).is_ok());
    }

    #[test]
    fn test_start_rejects_negative_page() {
        let err = start(&[], "book-1", Some(-3), t0()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_pause_twice_is_invalid() {
        let s = pause(&started(), at(10)).unwrap();
        assert_eq!(s.paused_at, Some(at(10)));
        assert!(matches!(pause(&s, at(20)), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_resume_requires_paused() {
        assert!(matches!(
            resume(&started(), at(10)),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_ended_is_terminal() {
        let s = end(&started(), at(100), None, None).unwrap();
        assert!(matches!(pause(&s, at(110)), Err(Error::InvalidState(_))));
        assert!(matches!(resume(&s, at(110)), Err(Error::InvalidState(_))));
        assert!(matches!(end(&s, at(110), None, None), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_pause_resume_end_scenario() {
        let s = started();
        let s = pause(&s, at(600)).unwrap();
        let s = resume(&s, at(900)).unwrap();
        assert_eq!(s.total_paused_seconds, 300);
        let s = end(&s, at(1500), Some(30), Some("good chapter".to_string())).unwrap();

        assert_eq!(s.state(), SessionState::Ended);
        assert_eq!(s.duration_seconds, Some(1200));
        assert_eq!(s.pages_read, Some(20));
        assert_eq!(s.ended_at, Some(at(1500)));
        assert_eq!(s.notes.as_deref(), Some("good chapter"));
    }

    #[test]
    fn test_end_while_paused_matches_resume_then_end() {
        let paused = pause(&started(), at(300)).unwrap();

        let direct = end(&paused, at(1000), None, None).unwrap();
        let resumed = resume(&paused, at(1000)).unwrap();
        let via_resume = end(&resumed, at(1000), None, None).unwrap();

        assert_eq!(direct.duration_seconds, via_resume.duration_seconds);
        assert_eq!(direct.duration_seconds, Some(300));
        assert_eq!(direct.total_paused_seconds, 700);
        assert!(direct.paused_at.is_none());
    }

    #[test]
    fn test_end_rejects_end_page_before_start_page() {
        let err = end(&started(), at(60), Some(5), None).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        let err = end(&started(), at(60), Some(-1), None).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_pages_read_requires_both_pages() {
        let no_start = start(&[], "book-1", None, t0()).unwrap();
        let s = end(&no_start, at(60), Some(40), None).unwrap();
        assert_eq!(s.pages_read, None);
        assert_eq!(s.end_page, Some(40));

        let s = end(&started(), at(60), None, None).unwrap();
        assert_eq!(s.pages_read, None);
    }

    #[test]
    fn test_elapsed_truncates_fractional_seconds() {
        let s = started();
        let now = t0() + Duration::milliseconds(59_999);
        assert_eq!(elapsed_seconds(&s, now), 59);
    }

    #[test]
    fn test_elapsed_constant_while_paused() {
        let s = pause(&started(), at(120)).unwrap();
        assert_eq!(elapsed_seconds(&s, at(120)), 120);
        assert_eq!(elapsed_seconds(&s, at(500)), 120);
        assert_eq!(elapsed_seconds(&s, at(5000)), 120);
    }

    fn at_ms(millis: i64) -> DateTime<Utc> {
        t0() + Duration::milliseconds(millis)
    }

    #[test]
    fn test_elapsed_constant_while_paused_mid_second() {
        let s = pause(&started(), at_ms(10_700)).unwrap();
        let readings: Vec<i64> = [10_700, 10_900, 11_000, 11_700, 12_000, 95_432]
            .iter()
            .map(|&ms| elapsed_seconds(&s, at_ms(ms)))
            .collect();
        assert_eq!(readings, vec![10; 6]);
    }

    #[test]
    fn test_resume_mid_second_does_not_jump() {
        let paused = pause(&started(), at_ms(10_700)).unwrap();
        let before = elapsed_seconds(&paused, at_ms(12_300));

        let resumed = resume(&paused, at_ms(12_300)).unwrap();
        assert_eq!(elapsed_seconds(&resumed, at_ms(12_300)), before);
        assert_eq!(elapsed_seconds(&resumed, at_ms(12_900)), 10);
        assert_eq!(elapsed_seconds(&resumed, at_ms(13_300)), 11);

        // Running again: never decreasing
        let mut previous = before;
        for ms in (12_300..20_000).step_by(130) {
            let elapsed = elapsed_seconds(&resumed, at_ms(ms));
            assert!(elapsed >= previous);
            previous = elapsed;
        }
    }

    #[test]
    fn test_end_while_paused_mid_second_matches_resume_then_end() {
        let s = start(&[], "book-1", None, at_ms(250)).unwrap();
        let s = pause(&s, at_ms(4_810)).unwrap();
        let s = resume(&s, at_ms(7_020)).unwrap();
        let s = pause(&s, at_ms(9_555)).unwrap();

        let direct = end(&s, at_ms(15_001), None, None).unwrap();
        let resumed = resume(&s, at_ms(15_001)).unwrap();
        let via_resume = end(&resumed, at_ms(15_001), None, None).unwrap();

        assert_eq!(direct.duration_seconds, via_resume.duration_seconds);
        assert_eq!(
            direct.duration_seconds,
            Some(elapsed_seconds(&s, at_ms(15_001)))
        );
    }

    #[test]
    fn test_elapsed_monotonic_while_running() {
        let s = started();
        let mut previous = 0;
        for secs in [0, 1, 59, 60, 61, 3600] {
            let elapsed = elapsed_seconds(&s, at(secs));
            assert!(elapsed >= previous);
            previous = elapsed;
        }
    }

    #[test]
    fn test_clock_skew_is_clamped() {
        let s = started();
        assert_eq!(elapsed_seconds(&s, at(-30)), 0);

        // Resume "before" the pause began adds nothing
        let paused = pause(&s, at(100)).unwrap();
        let resumed = resume(&paused, at(90)).unwrap();
        assert_eq!(resumed.total_paused_seconds, 0);
    }

    #[test]
    fn test_zero_length_pause_is_noop() {
        let paused = pause(&started(), at(50)).unwrap();
        let resumed = resume(&paused, at(50)).unwrap();
        assert_eq!(resumed.total_paused_seconds, 0);
        assert_eq!(elapsed_seconds(&resumed, at(80)), 80);
    }

    #[test]
    fn test_elapsed_of_ended_session_is_frozen() {
        let s = end(&started(), at(100), None, None).unwrap();
        assert_eq!(elapsed_seconds(&s, at(100_000)), 100);
    }

    #[test]
    fn test_find_session() {
        let s = started();
        let sessions = vec![s.clone()];
        assert_eq!(find_session(&sessions, &s.id).unwrap().id, s.id);
        assert!(matches!(
            find_session(&sessions, "missing"),
            Err(Error::NotFound { kind: "session", .. })
        ));
        assert!(active_for_book(&sessions, "book-1").is_some());
        assert!(active_for_book(&sessions, "book-2").is_none());
    }

    #[test]
    fn test_session_timer_uses_clock() {
        let clock = ManualClock::new(t0());
        let timer = SessionTimer::new(&clock);

        let s = timer.start(&[], "book-1", None).unwrap();
        clock.advance_secs(60);
        let s = timer.pause(&s).unwrap();
        clock.advance_secs(30);
        assert_eq!(timer.elapsed_seconds(&s), 60);
        let s = timer.resume(&s).unwrap();
        clock.advance_secs(15);
        let s = timer.end(&s, None, None).unwrap();
        assert_eq!(s.duration_seconds, Some(75));
    }
}
