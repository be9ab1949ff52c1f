use crate::error::RaceError;

/// Payload of the attempt that won a race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Won<P> {
    /// Position of the winning descriptor in the input.
    pub index: usize,
    pub payload: P,
}

/// What happened to one attempt's outcome once it reached the shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// First success: recorded as the winner.
    Won,
    /// Failure recorded as the most recent cause.
    Failed,
    /// Arrived after the race was closed and changed nothing.
    Discarded,
}

/// Why the racer stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// An attempt fired the shared token (winner recorded or all failed).
    Signal,
    /// The deadline elapsed.
    Deadline,
    /// The caller's own token fired.
    Cancelled,
}

/// Mutable state shared by the attempts of one race.
///
/// Once `closed` is set, [`RaceState::record`] discards everything, so the
/// winner and the last failure cause can no longer change.
#[derive(Debug)]
pub struct RaceState<P, E> {
    winner: Option<Won<P>>,
    last_error: Option<E>,
    pending: usize,
    closed: bool,
}

impl<P, E> RaceState<P, E> {
    pub fn new(attempts: usize) -> Self {
        Self {
            winner: None,
            last_error: None,
            pending: attempts,
            closed: false,
        }
    }

    /// Record the outcome of attempt `index`.
    pub fn record(&mut self, index: usize, outcome: Result<P, E>) -> Disposition {
        if self.closed {
            return Disposition::Discarded;
        }
        self.pending = self.pending.saturating_sub(1);

        match outcome {
            Ok(payload) => {
                self.winner = Some(Won { index, payload });
                self.closed = true;
                Disposition::Won
            }
            Err(cause) => {
                self.last_error = Some(cause);
                Disposition::Failed
            }
        }
    }

    /// Every attempt has reported a failure.
    pub fn exhausted(&self) -> bool {
        self.pending == 0 && self.winner.is_none()
    }

    /// Close the race and classify its result.
    ///
    /// A recorded winner beats everything else, including a deadline that
    /// fired at the same instant. Caller cancellation comes next: attempts
    /// answer a cancelled token with an error, so those failures never count
    /// as the race's cause.
    pub fn conclude(&mut self, wake: Wake) -> Result<Won<P>, RaceError<E>> {
        self.closed = true;

        if let Some(won) = self.winner.take() {
            return Ok(won);
        }
        if wake == Wake::Cancelled {
            return Err(RaceError::Cancelled);
        }
        if self.pending == 0 {
            if let Some(cause) = self.last_error.take() {
                return Err(RaceError::AllFailed(cause));
            }
        }
        match wake {
            Wake::Deadline => Err(RaceError::TimedOut),
            Wake::Signal | Wake::Cancelled => Err(RaceError::Cancelled),
        }
    }
}
