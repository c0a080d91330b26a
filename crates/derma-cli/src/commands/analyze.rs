use super::build_session;
use crate::render;
use anyhow::{Context, Result, bail};
use derma_core::BackendConfig;
use derma_core::image::SelectedFile;
use std::path::Path;

pub async fn run(config: BackendConfig, image: &Path) -> Result<()> {
    let (session, notifications) = build_session(config);

    let file = SelectedFile::from_path(image)
        .await
        .with_context(|| format!("Failed to open {}", image.display()))?;
    let selected = session.select_image(file).await;
    render::print_notifications(&notifications);
    selected?;

    let Some(result) = session.analyze().await else {
        bail!("Analysis did not start");
    };
    render::print_prediction(&result);

    if result.is_failure() {
        bail!("Analysis failed");
    }
    Ok(())
}
