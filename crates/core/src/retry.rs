//! Second chances for missed questions.
//!
//! A question answered wrong comes back after a cooling-off period
//! measured in quiz opportunities, so the learner sees fresh material
//! in between rather than the same question twice in a row.

use std::collections::VecDeque;

use crate::model::QuizQuestion;

/// Opportunities to wait before a missed question is shown again.
pub const DEFAULT_RETRY_SKIP: u32 = 2;

/// FIFO of missed questions with a per-tab cooldown.
///
/// Recording a miss restarts the cooldown even when older misses are
/// already waiting, so a streak of wrong answers keeps pushing the
/// replays out.
#[derive(Debug, Clone, Default)]
pub struct RetryQueue {
    pending: VecDeque<QuizQuestion>,
    skip: u32,
    cooldown: u32,
}

impl RetryQueue {
    #[must_use]
    pub fn new(skip: u32) -> Self {
        RetryQueue {
            pending: VecDeque::new(),
            skip,
            cooldown: 0,
        }
    }

    /// Queues a missed question and restarts the cooldown.
    pub fn record_miss(&mut self, question: QuizQuestion) {
        self.pending.push_back(question);
        self.cooldown = self.skip;
    }

    /// True when the next opportunity should replay a missed question
    /// instead of requesting a fresh one.
    #[must_use]
    pub fn due(&self) -> bool {
        self.cooldown == 0 && !self.pending.is_empty()
    }

    /// Takes the oldest missed question, if one is due.
    pub fn pop_due(&mut self) -> Option<QuizQuestion> {
        if self.due() {
            return self.pending.pop_front();
        }
        None
    }

    /// Burns one opportunity off the cooldown. Call on opportunities
    /// that went to a fresh question.
    pub fn tick(&mut self) {
        self.cooldown = self.cooldown.saturating_sub(1);
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn cooldown(&self) -> u32 {
        self.cooldown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(prompt: &str) -> QuizQuestion {
        QuizQuestion::true_false(prompt, true, "because").unwrap()
    }

    #[test]
    fn empty_queue_is_never_due() {
        let mut queue = RetryQueue::new(DEFAULT_RETRY_SKIP);
        assert!(!queue.due());
        assert_eq!(queue.pop_due(), None);
        queue.tick();
        assert!(!queue.due());
    }

    #[test]
    fn missed_question_waits_out_the_cooldown() {
        let mut queue = RetryQueue::new(2);
        queue.record_miss(question("q1"));

        assert!(!queue.due());
        queue.tick();
        assert!(!queue.due());
        queue.tick();

        assert!(queue.due());
        assert_eq!(queue.pop_due().unwrap().prompt(), "q1");
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn replays_come_back_oldest_first() {
        let mut queue = RetryQueue::new(0);
        queue.record_miss(question("q1"));
        queue.record_miss(question("q2"));

        assert_eq!(queue.pop_due().unwrap().prompt(), "q1");
        assert_eq!(queue.pop_due().unwrap().prompt(), "q2");
        assert_eq!(queue.pop_due(), None);
    }

    #[test]
    fn a_new_miss_restarts_the_cooldown() {
        let mut queue = RetryQueue::new(2);
        queue.record_miss(question("q1"));
        queue.tick();
        queue.tick();
        assert!(queue.due());

        queue.record_miss(question("q2"));
        assert!(!queue.due());
        assert_eq!(queue.cooldown(), 2);
        assert_eq!(queue.pending(), 2);
    }

    #[test]
    fn pop_is_refused_while_cooling_down() {
        let mut queue = RetryQueue::new(1);
        queue.record_miss(question("q1"));
        assert_eq!(queue.pop_due(), None);
        assert_eq!(queue.pending(), 1);
    }
}
