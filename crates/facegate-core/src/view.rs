//! Tab and section visibility.
//!
//! A click on a tab control activates exactly one panel within its scope
//! and deactivates the rest. Nothing here is persisted.

use std::collections::BTreeMap;
use thiserror::Error;

/// Element ids that views are rendered into.
pub mod targets {
    pub const USERS_CONTAINER: &str = "usersContainer";
    pub const PHOTO_USER_SELECT: &str = "photoUserId";
    pub const PHOTOS_CONTAINER: &str = "photosContainer";
    pub const CREATE_USER_MESSAGE: &str = "createUserMessage";
    pub const EDIT_USER_MESSAGE: &str = "editUserMessage";
    pub const EDIT_USER_MODAL: &str = "editUserModal";
    pub const USER_ACTION_MESSAGE: &str = "userActionMessage";
    pub const SINGLE_UPLOAD_MESSAGE: &str = "singleUploadMessage";
    pub const MULTIPLE_UPLOAD_MESSAGE: &str = "multipleUploadMessage";
    pub const PHOTO_ACTION_MESSAGE: &str = "photoActionMessage";
    pub const SINGLE_PREVIEW: &str = "singlePreview";
    pub const MULTIPLE_PREVIEW: &str = "multiplePreview";
    pub const TRAINING_MESSAGE: &str = "trainingMessage";
    pub const TRAINING_RESULT: &str = "trainingResult";
    pub const MODEL_INFO: &str = "modelInfo";
    pub const PREDICT_MESSAGE: &str = "predictMessage";
    pub const PREDICT_RESULT: &str = "predictResult";
    pub const VERIFY_MESSAGE: &str = "verifyMessage";
    pub const VERIFY_RESULT: &str = "verifyResult";
    pub const LOGIN_RESULT: &str = "loginResult";
    pub const TOKEN_RESULT: &str = "tokenResult";
    pub const CAMERA_UPLOAD_MESSAGE: &str = "cameraUploadMessage";
    pub const CAMERA_PREVIEW: &str = "cameraPreview";
    pub const PREDICT_CAMERA_PREVIEW: &str = "predictCameraPreview";
    pub const VERIFY_CAMERA_PREVIEW: &str = "verifyCameraPreview";
}

/// Global tab names, in display order.
pub const MAIN_TABS: [&str; 5] = ["users", "photos", "training", "predict", "verify"];

/// Upload-method tabs inside the upload card.
pub const UPLOAD_TABS: [&str; 3] = ["single", "multiple", "camera"];

/// Card id that hosts the upload-method tabs.
pub const UPLOAD_CARD: &str = "upload";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ViewError {
    #[error("unknown tab {tab:?} in scope {scope}")]
    UnknownTab { scope: String, tab: String },
    #[error("unknown tab scope: {0}")]
    UnknownScope(String),
}

/// Where a tab control lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TabScope {
    /// The page-wide tab bar.
    Global,
    /// Upload-method tabs within the named card.
    Card(String),
}

impl std::fmt::Display for TabScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TabScope::Global => f.write_str("global"),
            TabScope::Card(card) => write!(f, "card:{card}"),
        }
    }
}

/// A clicked tab control: its scope and its target tab attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabControl {
    pub scope: TabScope,
    pub tab: String,
}

impl TabControl {
    pub fn global(tab: impl Into<String>) -> Self {
        Self {
            scope: TabScope::Global,
            tab: tab.into(),
        }
    }

    pub fn upload(tab: impl Into<String>) -> Self {
        Self {
            scope: TabScope::Card(UPLOAD_CARD.to_string()),
            tab: tab.into(),
        }
    }
}

/// Panel element id for a tab in the given scope.
pub fn panel_id(scope: &TabScope, tab: &str) -> String {
    match scope {
        TabScope::Global => format!("{tab}-tab"),
        TabScope::Card(_) => format!("{tab}UploadTab"),
    }
}

/// One group of mutually exclusive tabs.
#[derive(Debug, Clone)]
pub struct TabSet {
    tabs: Vec<String>,
    active: usize,
}

impl TabSet {
    /// Build a tab set with the first tab active.
    pub fn new<I, S>(tabs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tabs: tabs.into_iter().map(Into::into).collect(),
            active: 0,
        }
    }

    pub fn active(&self) -> Option<&str> {
        self.tabs.get(self.active).map(String::as_str)
    }

    pub fn is_active(&self, tab: &str) -> bool {
        self.active() == Some(tab)
    }

    pub fn tabs(&self) -> &[String] {
        &self.tabs
    }

    fn activate(&mut self, tab: &str) -> Option<()> {
        self.active = self.tabs.iter().position(|t| t == tab)?;
        Some(())
    }
}

/// View state of the whole page.
#[derive(Debug, Clone)]
pub struct ViewState {
    global: TabSet,
    cards: BTreeMap<String, TabSet>,
    user_sections_visible: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        let mut cards = BTreeMap::new();
        cards.insert(UPLOAD_CARD.to_string(), TabSet::new(UPLOAD_TABS));
        Self {
            global: TabSet::new(MAIN_TABS),
            cards,
            user_sections_visible: false,
        }
    }
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate the clicked tab and deactivate its siblings.
    ///
    /// Unknown scopes or tabs leave the state untouched.
    pub fn click(&mut self, control: &TabControl) -> Result<(), ViewError> {
        let set = match &control.scope {
            TabScope::Global => &mut self.global,
            TabScope::Card(card) => self
                .cards
                .get_mut(card)
                .ok_or_else(|| ViewError::UnknownScope(card.clone()))?,
        };
        set.activate(&control.tab)
            .ok_or_else(|| ViewError::UnknownTab {
                scope: control.scope.to_string(),
                tab: control.tab.clone(),
            })?;
        tracing::debug!(scope = %control.scope, tab = %control.tab, "tab activated");
        Ok(())
    }

    pub fn tab_set(&self, scope: &TabScope) -> Option<&TabSet> {
        match scope {
            TabScope::Global => Some(&self.global),
            TabScope::Card(card) => self.cards.get(card),
        }
    }

    /// Element id of the active panel in a scope.
    pub fn active_panel(&self, scope: &TabScope) -> Option<String> {
        let set = self.tab_set(scope)?;
        set.active().map(|tab| panel_id(scope, tab))
    }

    /// Every panel id with its active flag, global panels first.
    pub fn panels(&self) -> Vec<(String, bool)> {
        let mut out: Vec<(String, bool)> = self
            .global
            .tabs()
            .iter()
            .map(|t| (panel_id(&TabScope::Global, t), self.global.is_active(t)))
            .collect();
        for (card, set) in &self.cards {
            let scope = TabScope::Card(card.clone());
            out.extend(
                set.tabs()
                    .iter()
                    .map(|t| (panel_id(&scope, t), set.is_active(t))),
            );
        }
        out
    }

    /// Show or hide the upload and photo sections.
    pub fn set_user_sections(&mut self, visible: bool) {
        self.user_sections_visible = visible;
    }

    pub fn user_sections_visible(&self) -> bool {
        self.user_sections_visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tab_active_by_default() {
        let state = ViewState::new();
        assert_eq!(
            state.active_panel(&TabScope::Global).as_deref(),
            Some("users-tab")
        );
        assert_eq!(
            state
                .active_panel(&TabScope::Card(UPLOAD_CARD.into()))
                .as_deref(),
            Some("singleUploadTab")
        );
    }

    #[test]
    fn test_click_deactivates_siblings() {
        let mut state = ViewState::new();
        state.click(&TabControl::global("training")).unwrap();

        let active: Vec<_> = state
            .panels()
            .into_iter()
            .filter(|(id, on)| *on && id.ends_with("-tab"))
            .collect();
        assert_eq!(active, vec![("training-tab".to_string(), true)]);
    }

    #[test]
    fn test_scopes_are_independent() {
        let mut state = ViewState::new();
        state.click(&TabControl::upload("camera")).unwrap();
        state.click(&TabControl::global("photos")).unwrap();

        assert_eq!(
            state
                .active_panel(&TabScope::Card(UPLOAD_CARD.into()))
                .as_deref(),
            Some("cameraUploadTab")
        );
        assert_eq!(
            state.active_panel(&TabScope::Global).as_deref(),
            Some("photos-tab")
        );
    }

    #[test]
    fn test_unknown_tab_keeps_state() {
        let mut state = ViewState::new();
        state.click(&TabControl::global("predict")).unwrap();
        let err = state.click(&TabControl::global("nope")).unwrap_err();
        assert!(matches!(err, ViewError::UnknownTab { .. }));
        assert_eq!(
            state.active_panel(&TabScope::Global).as_deref(),
            Some("predict-tab")
        );
    }

    #[test]
    fn test_unknown_card() {
        let mut state = ViewState::new();
        let control = TabControl {
            scope: TabScope::Card("missing".into()),
            tab: "single".into(),
        };
        assert_eq!(
            state.click(&control),
            Err(ViewError::UnknownScope("missing".into()))
        );
    }
}
