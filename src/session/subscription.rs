//! Subscriptions that follow a session across groups

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::bus::{Message, Subscription};
use crate::error::{Error, Result};
use crate::group::GroupId;

use super::state::SessionId;

/// Subscription to a session's new group, sent when the session moves
pub(super) struct Handoff {
    pub(super) subscription: Subscription,
    /// When the session left its previous group
    pub(super) cutover: Instant,
}

/// Message feed for one session
///
/// Delivers the messages of whatever group the session is currently in.
/// When the session is reassigned, the new group is subscribed before the
/// session is admitted to it, so nothing sent there while it is a member is
/// missed. Messages the old group received before the session left are still
/// delivered; later ones are not. The feed ends with `SubscriptionClosed` once
/// the session leaves or times out.
pub struct SessionSubscription {
    session_id: SessionId,
    handoff: mpsc::UnboundedReceiver<Handoff>,
    current: Subscription,
    /// Old-group messages drained at a switch, not yet returned
    pending: VecDeque<Arc<Message>>,
}

enum Event {
    Moved(Handoff),
    Detached,
    Delivered(Result<Arc<Message>>),
}

impl SessionSubscription {
    pub(super) fn new(
        session_id: SessionId,
        handoff: mpsc::UnboundedReceiver<Handoff>,
        current: Subscription,
    ) -> Self {
        Self {
            session_id,
            handoff,
            current,
            pending: VecDeque::new(),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Group currently being followed
    pub fn group(&self) -> &GroupId {
        self.current.group()
    }

    /// Messages skipped on the current group because this reader fell behind
    pub fn dropped(&self) -> u64 {
        self.current.dropped()
    }

    /// Wait for the next message
    pub async fn recv(&mut self) -> Result<Arc<Message>> {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Ok(message);
            }

            let event = tokio::select! {
                biased;
                next = self.handoff.recv() => match next {
                    Some(handoff) => Event::Moved(handoff),
                    None => Event::Detached,
                },
                delivered = self.current.recv() => Event::Delivered(delivered),
            };

            match event {
                Event::Delivered(Ok(message)) => return Ok(message),
                // A group only closes once it is empty, so this session is
                // either moving (handoff on its way) or gone (sender dropped)
                Event::Delivered(Err(_)) => match self.handoff.recv().await {
                    Some(handoff) => self.switch(handoff),
                    None => return Err(Error::SubscriptionClosed),
                },
                Event::Moved(handoff) => self.switch(handoff),
                Event::Detached => return Err(Error::SubscriptionClosed),
            }
        }
    }

    fn switch(&mut self, handoff: Handoff) {
        let mut next = Some(handoff);
        // Several moves may have queued up; walk through each group in turn
        while let Some(handoff) = next {
            self.drain_until(handoff.cutover);

            tracing::debug!(
                session_id = %self.session_id,
                from = %self.current.group(),
                to = %handoff.subscription.group(),
                carried = self.pending.len(),
                "Subscription moved to new group"
            );
            self.current = handoff.subscription;
            next = self.handoff.try_recv().ok();
        }
    }

    fn drain_until(&mut self, cutover: Instant) {
        while let Ok(Some(message)) = self.current.try_recv() {
            if message.created_at() <= cutover {
                self.pending.push_back(message);
            }
        }
    }
}

impl std::fmt::Debug for SessionSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSubscription")
            .field("session_id", &self.session_id)
            .field("group", self.current.group())
            .finish()
    }
}
