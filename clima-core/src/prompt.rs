use std::fmt;

type Callback = Box<dyn FnOnce(String) + Send>;

/// Modal single-line city entry.
///
/// Confirming or cancelling consumes the prompt, so a closed prompt can't
/// call back twice.
pub struct CityPrompt {
    on_entered: Callback,
}

impl CityPrompt {
    pub fn new(on_entered: impl FnOnce(String) + Send + 'static) -> Self {
        Self {
            on_entered: Box::new(on_entered),
        }
    }

    /// Hand the raw text to the callback and close.
    pub fn confirm(self, text: String) {
        (self.on_entered)(text);
    }

    /// Close without calling back.
    pub fn cancel(self) {}
}

impl fmt::Debug for CityPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CityPrompt").finish_non_exhaustive()
    }
}
