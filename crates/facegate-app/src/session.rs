//! Page session: all mutable interaction state in one place.

use crate::capture::{CaptureContext, CaptureController, CaptureState};
use crate::config::Config;
use facegate_client::{ApiClient, Transport};
use facegate_core::preview::FileInput;
use facegate_core::render::{Notice, View};
use facegate_core::types::{User, UserId};
use facegate_core::view::ViewState;
use facegate_hw::MediaDevices;
use std::sync::Arc;
use std::time::Duration;

/// What a handler changed: views to render, forms to reset and camera
/// panel states.
#[derive(Debug, Default, Clone)]
pub struct Update {
    pub views: Vec<View>,
    /// Form ids whose inputs should be cleared.
    pub reset_forms: Vec<&'static str>,
    pub camera: Vec<(CaptureContext, CaptureState)>,
}

impl Update {
    pub fn is_empty(&self) -> bool {
        self.views.is_empty() && self.reset_forms.is_empty() && self.camera.is_empty()
    }

    pub fn push(&mut self, view: View) -> &mut Self {
        self.views.push(view);
        self
    }

    pub fn extend(&mut self, other: Update) -> &mut Self {
        self.views.extend(other.views);
        self.reset_forms.extend(other.reset_forms);
        self.camera.extend(other.camera);
        self
    }

    /// The last view rendered into `target`.
    pub fn view(&self, target: &str) -> Option<&View> {
        self.views.iter().rev().find(|v| v.target == target)
    }

    /// The notice shown in `target`, if any.
    pub fn notice(&self, target: &str) -> Option<&Notice> {
        self.view(target).and_then(View::notice)
    }
}

impl From<View> for Update {
    fn from(view: View) -> Self {
        Self {
            views: vec![view],
            ..Self::default()
        }
    }
}

pub struct PageSession<T, D: MediaDevices> {
    pub(crate) client: ApiClient<T>,
    pub(crate) view: ViewState,
    pub(crate) selected_user: Option<UserId>,
    pub(crate) users: Vec<User>,
    pub(crate) editing: Option<UserId>,
    pub(crate) single_input: FileInput,
    pub(crate) multiple_input: FileInput,
    pub(crate) enrollment: CaptureController<D>,
    pub(crate) prediction: CaptureController<D>,
    pub(crate) verification: CaptureController<D>,
    pub(crate) dismiss_after: Duration,
}

impl<T: Transport, D: MediaDevices> PageSession<T, D> {
    pub fn new(client: ApiClient<T>, devices: D, config: &Config) -> Self {
        let devices = Arc::new(devices);
        let constraints = config.constraints();
        let controller = |ctx: CaptureContext| {
            CaptureController::new(ctx, Arc::clone(&devices), constraints.clone())
        };
        Self {
            client,
            view: ViewState::new(),
            selected_user: None,
            users: Vec::new(),
            editing: None,
            single_input: FileInput::single(),
            multiple_input: FileInput::multiple(),
            enrollment: controller(CaptureContext::Enrollment),
            prediction: controller(CaptureContext::Prediction),
            verification: controller(CaptureContext::Verification),
            dismiss_after: config.message_dismiss(),
        }
    }

    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    pub fn view_state(&self) -> &ViewState {
        &self.view
    }

    pub fn selected_user(&self) -> Option<UserId> {
        self.selected_user
    }

    /// Users from the most recent list fetch.
    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn editing(&self) -> Option<UserId> {
        self.editing
    }

    pub fn single_input(&self) -> &FileInput {
        &self.single_input
    }

    pub fn multiple_input(&self) -> &FileInput {
        &self.multiple_input
    }

    pub fn camera(&self, ctx: CaptureContext) -> &CaptureController<D> {
        match ctx {
            CaptureContext::Enrollment => &self.enrollment,
            CaptureContext::Prediction => &self.prediction,
            CaptureContext::Verification => &self.verification,
        }
    }

    pub(crate) fn camera_mut(&mut self, ctx: CaptureContext) -> &mut CaptureController<D> {
        match ctx {
            CaptureContext::Enrollment => &mut self.enrollment,
            CaptureContext::Prediction => &mut self.prediction,
            CaptureContext::Verification => &mut self.verification,
        }
    }

    /// Success notice that hides itself after the configured delay.
    pub(crate) fn transient(&self, text: impl Into<String>) -> Notice {
        Notice::success(text).dismiss_after(self.dismiss_after)
    }

    /// Stop every camera. Called when the session ends.
    pub async fn shutdown(&mut self) {
        for ctx in CaptureContext::ALL {
            self.camera_mut(ctx).stop().await;
        }
        tracing::debug!("page session closed");
    }
}
