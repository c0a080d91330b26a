use super::{build_session, send_and_print};
use crate::render::{self, Transcript};
use anyhow::{Context, Result, bail};
use derma_application::ChatOutcome;
use derma_core::BackendConfig;
use derma_core::image::SelectedFile;
use std::path::Path;

/// Optionally analyzes `image`, then sends `message` with the result as context.
pub async fn run(config: BackendConfig, message: &str, image: Option<&Path>) -> Result<()> {
    let (session, notifications) = build_session(config);

    if let Some(image) = image {
        let file = SelectedFile::from_path(image)
            .await
            .with_context(|| format!("Failed to open {}", image.display()))?;
        let selected = session.select_image(file).await;
        render::print_notifications(&notifications);
        selected?;

        if let Some(result) = session.analyze().await {
            render::print_prediction(&result);
        }
    }

    let mut transcript = Transcript::new();
    match send_and_print(&session, &mut transcript, &notifications, message).await {
        ChatOutcome::Replied { .. } => Ok(()),
        ChatOutcome::Failed { error, .. } => bail!("Chat request failed: {}", error),
        ChatOutcome::Rejected(reason) => bail!("Message not sent: {:?}", reason),
        ChatOutcome::Discarded { .. } => bail!("Conversation was reset before the reply arrived"),
    }
}
