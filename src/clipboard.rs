use anyhow::{bail, Context, Result};

/// Puts `text` on the system clipboard.
pub fn copy_text(text: &str) -> Result<()> {
    if text.is_empty() {
        bail!("nothing to copy");
    }
    let mut clipboard = arboard::Clipboard::new().context("failed to access clipboard")?;
    clipboard
        .set_text(text.to_string())
        .context("failed to set clipboard text")?;
    Ok(())
}
