use std::fmt::Display;

use anyhow::{Context, Result};
use termenu::{Item, Menu};

/// Fuzzy-filterable terminal menu over displayable items.
pub struct FzfInvoker<T> {
    title: String,
    items: Vec<T>,
}

impl<T> FzfInvoker<T>
where
    T: Display + Clone,
{
    pub fn new(title: impl Into<String>, items: Vec<T>) -> Self {
        Self {
            title: title.into(),
            items,
        }
    }

    /// Show the menu and return a clone of the chosen item, or `None` if the
    /// user cancelled.
    pub fn invoke(&self) -> Result<Option<T>> {
        let mut menu = Menu::new().context("Failed to init menu")?;

        let list: Vec<Item<usize>> = self
            .items
            .iter()
            .enumerate()
            .map(|(idx, item)| Item::new(&item.to_string(), idx))
            .collect();

        let selected = menu
            .set_title(self.title.as_str())
            .add_list(list)
            .select()
            .context("Menu error")?;

        Ok(selected.and_then(|idx| self.items.get(*idx).cloned()))
    }
}
