pub mod downloader;
pub mod fzf_invoker;

use self::fzf_invoker::FzfInvoker;
use anyhow::Result;
use anyhow::bail;

/// Wrapper around the `termenu` picker. Items are rendered through `Display`,
/// and the chosen label is returned as an owned `String`.
pub fn choose_one<S: ToString>(title: &str, items: Vec<S>) -> Result<String> {
    let display_items: Vec<String> = items.into_iter().map(|s| s.to_string()).collect();
    if display_items.is_empty() {
        bail!("Nothing to choose from");
    }
    match FzfInvoker::new(title, display_items).invoke()? {
        Some(choice) => Ok(choice),
        None => bail!("No selection made"),
    }
}
