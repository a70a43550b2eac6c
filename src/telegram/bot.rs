use crate::core::engine::Engine;
use crate::core::extract::extract_batch;
use crate::core::model::TextSpan;
use crate::telegram::api::TelegramApi;
use crate::telegram::types::Message;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Long-poll update loop: allow-listing, the `/id` echo command, and
/// handing qualifying messages to the engine.
pub struct Bot {
    api: Arc<TelegramApi>,
    engine: Engine,
    allowed_chats: Vec<i64>,
}

impl Bot {
    pub fn new(api: Arc<TelegramApi>, engine: Engine, allowed_chats: Vec<i64>) -> Self {
        Self {
            api,
            engine,
            allowed_chats,
        }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        info!("polling for updates");
        let mut offset = 0i64;
        loop {
            let updates = match self.api.get_updates(offset).await {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(error = %e, "getUpdates failed, backing off");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                if let Some(message) = update.message {
                    self.handle_message(message).await;
                }
            }
        }
    }

    async fn handle_message(&self, message: Message) {
        let chat_id = message.chat.id;

        if let Some("/id") = message.text.as_deref().map(str::trim) {
            if self.allowed_chats.is_empty() || self.allowed_chats.contains(&chat_id) {
                info!(chat_id, "chat requested its id");
                if let Err(e) = self.api.send_message(chat_id, &chat_id.to_string()).await {
                    warn!(error = %e, "failed to answer /id");
                }
            }
            return;
        }

        if !self.allowed_chats.contains(&chat_id) {
            debug!(chat_id, "ignoring message from unlisted chat");
            return;
        }

        let Some((text, entities)) = message.content() else {
            return;
        };
        let spans: Vec<TextSpan> = entities.iter().map(|e| e.to_span()).collect();
        let batch = extract_batch(text, &spans);
        if batch.is_empty() {
            debug!(chat_id, "message yielded no folder jobs");
            return;
        }

        self.engine.dispatch(batch).await;
    }
}
