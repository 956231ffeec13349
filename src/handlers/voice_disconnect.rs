use async_trait::async_trait;
use songbird::{Event, EventContext, EventHandler};

use crate::util::player::SessionHandle;

/// Global `DriverDisconnect` hook on a session's call. Fires when the bot is
/// kicked, the channel is deleted or the voice gateway drops for good.
pub struct VoiceDisconnectHandler {
    handle: SessionHandle,
}

impl VoiceDisconnectHandler {
    pub fn new(handle: SessionHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl EventHandler for VoiceDisconnectHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::DriverDisconnect(data) = ctx {
            tracing::info!(
                guild = %self.handle.guild_id(),
                kind = ?data.kind,
                reason = ?data.reason,
                "voice driver disconnected"
            );
            self.handle.voice_lost();
        }
        Some(Event::Cancel)
    }
}
