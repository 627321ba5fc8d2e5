use std::collections::VecDeque;

use super::tools::ConsoleMessage;
use super::world::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameState {
    #[default]
    InGame,
    Console,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    GameStateChanged(GameState),
    Resized { width: u32, height: u32 },
    ConsoleMessage(ConsoleMessage),
    InspectEntity(EntityId),
    ListEntities,
}

/// Events queued during a frame and delivered together at the next flush.
#[derive(Debug)]
pub struct EventQueue<E> {
    pending: VecDeque<E>,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: E) {
        self.pending.push_back(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = E>) {
        self.pending.extend(events);
    }

    /// Takes everything queued so far. Events pushed while the returned
    /// batch is handled wait for the next flush.
    pub fn take_pending(&mut self) -> Vec<E> {
        self.pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
