use super::AppState;

/// One-shot notice shown on the next page render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FlashMessage {
    pub(crate) text: String,
    pub(crate) class: &'static str,
}

impl FlashMessage {
    pub(crate) fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            class: "success",
        }
    }

    pub(crate) fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            class: "error",
        }
    }
}

pub(crate) async fn set_flash(state: &AppState, message: FlashMessage) {
    *state.flash.write().await = Some(message);
}

pub(crate) async fn take_flash_message(state: &AppState) -> Option<FlashMessage> {
    state.flash.write().await.take()
}
