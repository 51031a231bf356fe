use std::sync::RwLock;

/// Somewhere an agent can show a line of text (an in-world label, a console, ...)
pub trait TextDisplay: Send + Sync {
    fn set_text(&self, text: &str);
}

/// In-memory text panel; keeps the last line shown
#[derive(Debug, Default)]
pub struct TextPanel {
    text: RwLock<String>,
}

impl TextPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        match self.text.read() {
            Ok(t) => t.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl TextDisplay for TextPanel {
    fn set_text(&self, text: &str) {
        let mut guard = self
            .text
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = text.to_string();
    }
}
