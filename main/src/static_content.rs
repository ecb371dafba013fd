use std::path::Path;

const BUILT_IN_CHAT_PAGE: &str = include_str!("chat.html");

/// Loads the chat page, preferring `override_path` when it can be read.
pub fn load_chat_page(override_path: Option<&Path>) -> String {
    let Some(path) = override_path else {
        return BUILT_IN_CHAT_PAGE.to_string();
    };
    match std::fs::read_to_string(path) {
        Ok(page) => {
            log::info!("Serving chat page from {}", path.display());
            page
        }
        Err(e) => {
            log::warn!(
                "Failed to read chat page at {}, using the built-in one: {}",
                path.display(),
                e
            );
            BUILT_IN_CHAT_PAGE.to_string()
        }
    }
}
