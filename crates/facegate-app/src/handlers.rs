//! Form and control handlers.
//!
//! Each handler validates locally, issues at most one request for its
//! action (plus any follow-up reload) and reports everything as an
//! [`Update`]. Errors never leave the form's own message target.

use crate::capture::{CaptureContext, CaptureState};
use crate::session::{PageSession, Update};
use facegate_client::{FilePart, Transport};
use facegate_core::form;
use facegate_core::preview::{InputKind, SelectedFile};
use facegate_core::render::{self, Notice, View};
use facegate_core::types::{PhotoId, TrainingParams, UserId};
use facegate_core::view::{targets, TabControl};
use facegate_hw::MediaDevices;

/// Form element ids reset after a successful submission.
pub mod forms {
    pub const CREATE_USER: &str = "createUserForm";
    pub const UPLOAD_SINGLE: &str = "uploadSingleForm";
    pub const UPLOAD_MULTIPLE: &str = "uploadMultipleForm";
    pub const UPLOAD_CAMERA: &str = "uploadCameraForm";
}

/// One operator interaction.
pub enum Submission {
    ClickTab(TabControl),
    LoadUsers,
    CreateUser {
        name: String,
        email: String,
        password: Option<String>,
    },
    OpenEditUser(UserId),
    CloseEditUser,
    EditUser {
        name: String,
        email: String,
        password: Option<String>,
    },
    DeleteUser {
        user_id: UserId,
        confirmed: bool,
    },
    SelectUser(Option<UserId>),
    LoadPhotos,
    SelectFiles {
        input: InputKind,
        files: Vec<SelectedFile>,
    },
    RemovePreview(usize),
    UploadSingle,
    UploadMultiple,
    DeletePhoto {
        user_id: UserId,
        photo_id: PhotoId,
        confirmed: bool,
    },
    StartCamera(CaptureContext),
    StopCamera(CaptureContext),
    Capture(CaptureContext),
    Retake(CaptureContext),
    SubmitCapture {
        context: CaptureContext,
        claimed_user: Option<String>,
    },
    StartTraining(TrainingParams),
    TrainingStatus,
    ModelInfo,
    Predict(Vec<SelectedFile>),
    Verify {
        claimed_user: String,
        files: Vec<SelectedFile>,
    },
    FaceLogin(Vec<SelectedFile>),
    VerifyToken(String),
    Logout(String),
    ActiveTokens(String),
}

impl Submission {
    /// Short name for logs. Field values are never logged.
    pub fn name(&self) -> &'static str {
        match self {
            Submission::ClickTab(_) => "click_tab",
            Submission::LoadUsers => "load_users",
            Submission::CreateUser { .. } => "create_user",
            Submission::OpenEditUser(_) => "open_edit_user",
            Submission::CloseEditUser => "close_edit_user",
            Submission::EditUser { .. } => "edit_user",
            Submission::DeleteUser { .. } => "delete_user",
            Submission::SelectUser(_) => "select_user",
            Submission::LoadPhotos => "load_photos",
            Submission::SelectFiles { .. } => "select_files",
            Submission::RemovePreview(_) => "remove_preview",
            Submission::UploadSingle => "upload_single",
            Submission::UploadMultiple => "upload_multiple",
            Submission::DeletePhoto { .. } => "delete_photo",
            Submission::StartCamera(_) => "start_camera",
            Submission::StopCamera(_) => "stop_camera",
            Submission::Capture(_) => "capture",
            Submission::Retake(_) => "retake",
            Submission::SubmitCapture { .. } => "submit_capture",
            Submission::StartTraining(_) => "start_training",
            Submission::TrainingStatus => "training_status",
            Submission::ModelInfo => "model_info",
            Submission::Predict(_) => "predict",
            Submission::Verify { .. } => "verify",
            Submission::FaceLogin(_) => "face_login",
            Submission::VerifyToken(_) => "verify_token",
            Submission::Logout(_) => "logout",
            Submission::ActiveTokens(_) => "active_tokens",
        }
    }
}

fn error_at(target: &str, text: impl Into<String>) -> Update {
    render::message(target, Notice::error(text)).into()
}

impl<T: Transport, D: MediaDevices> PageSession<T, D> {
    pub async fn dispatch(&mut self, submission: Submission) -> Update {
        tracing::debug!(handler = submission.name(), "dispatch");
        match submission {
            Submission::ClickTab(control) => self.click_tab(&control),
            Submission::LoadUsers => self.refresh_users().await,
            Submission::CreateUser {
                name,
                email,
                password,
            } => self.create_user(&name, &email, password.as_deref()).await,
            Submission::OpenEditUser(id) => self.open_edit_user(id).await,
            Submission::CloseEditUser => self.close_edit_user(),
            Submission::EditUser {
                name,
                email,
                password,
            } => self.edit_user(&name, &email, password.as_deref()).await,
            Submission::DeleteUser { user_id, confirmed } => {
                self.delete_user(user_id, confirmed).await
            }
            Submission::SelectUser(id) => self.select_user(id).await,
            Submission::LoadPhotos => self.load_photos().await,
            Submission::SelectFiles { input, files } => self.select_files(input, files).await,
            Submission::RemovePreview(index) => self.remove_preview(index).await,
            Submission::UploadSingle => self.upload_single().await,
            Submission::UploadMultiple => self.upload_multiple().await,
            Submission::DeletePhoto {
                user_id,
                photo_id,
                confirmed,
            } => self.delete_photo(user_id, photo_id, confirmed).await,
            Submission::StartCamera(ctx) => self.start_camera(ctx).await,
            Submission::StopCamera(ctx) => self.stop_camera(ctx).await,
            Submission::Capture(ctx) => self.capture(ctx).await,
            Submission::Retake(ctx) => self.retake(ctx),
            Submission::SubmitCapture {
                context,
                claimed_user,
            } => self.submit_capture(context, claimed_user.as_deref()).await,
            Submission::StartTraining(params) => self.start_training(&params).await,
            Submission::TrainingStatus => self.training_status().await,
            Submission::ModelInfo => self.model_info().await,
            Submission::Predict(files) => self.predict(&files).await,
            Submission::Verify {
                claimed_user,
                files,
            } => self.verify(&claimed_user, &files).await,
            Submission::FaceLogin(files) => self.face_login(&files).await,
            Submission::VerifyToken(raw) => self.verify_token(&raw).await,
            Submission::Logout(raw) => self.logout(&raw).await,
            Submission::ActiveTokens(raw) => self.active_tokens(&raw).await,
        }
    }

    pub fn click_tab(&mut self, control: &TabControl) -> Update {
        if let Err(e) = self.view.click(control) {
            tracing::warn!(error = %e, "ignoring tab click");
        }
        Update::default()
    }

    // ---- users ----

    /// Fetch the user list once and render it into both the list and the
    /// photo-section dropdown.
    pub async fn refresh_users(&mut self) -> Update {
        match self.client.list_users().await {
            Ok(users) => {
                let mut update = Update::default();
                update
                    .push(render::user_list(&users))
                    .push(render::user_options(&users));
                self.users = users;
                update
            }
            Err(e) => error_at(targets::USERS_CONTAINER, e.user_message()),
        }
    }

    pub async fn create_user(&mut self, name: &str, email: &str, password: Option<&str>) -> Update {
        let target = targets::CREATE_USER_MESSAGE;
        let new_user = match form::user_fields(name, email, password) {
            Ok(u) => u,
            Err(e) => return error_at(target, e.to_string()),
        };

        match self.client.create_user(&new_user).await {
            Ok(user) => {
                tracing::info!(user_id = user.id, "user created");
                let notice = self.transient(format!("✅ User \"{}\" created successfully!", user.name));
                let mut update = Update::from(render::message(target, notice));
                update.reset_forms.push(forms::CREATE_USER);
                update.extend(self.refresh_users().await);
                update
            }
            Err(e) => error_at(target, e.user_message()),
        }
    }

    pub async fn open_edit_user(&mut self, id: UserId) -> Update {
        let user = match self.users.iter().find(|u| u.id == id) {
            Some(u) => u.clone(),
            None => match self.client.get_user(id).await {
                Ok(u) => u,
                Err(e) => return error_at(targets::USER_ACTION_MESSAGE, e.user_message()),
            },
        };
        self.editing = Some(id);
        let mut update = Update::from(render::edit_dialog(&user));
        update.push(View::clear(targets::EDIT_USER_MESSAGE));
        update
    }

    pub fn close_edit_user(&mut self) -> Update {
        self.editing = None;
        View::clear(targets::EDIT_USER_MODAL).into()
    }

    pub async fn edit_user(&mut self, name: &str, email: &str, password: Option<&str>) -> Update {
        let target = targets::EDIT_USER_MESSAGE;
        let Some(id) = self.editing else {
            return error_at(target, "❌ No user is being edited");
        };
        let changes = match form::user_fields(name, email, password) {
            Ok(u) => u,
            Err(e) => return error_at(target, e.to_string()),
        };

        match self.client.update_user(id, &changes).await {
            Ok(user) => {
                tracing::info!(user_id = user.id, "user updated");
                let mut update = Update::from(render::message(
                    targets::USER_ACTION_MESSAGE,
                    self.transient("✅ User updated successfully!"),
                ));
                update.extend(self.close_edit_user());
                update.extend(self.refresh_users().await);
                update
            }
            Err(e) => error_at(target, e.user_message()),
        }
    }

    /// Delete a user and all their photos. Unconfirmed requests do nothing.
    pub async fn delete_user(&mut self, id: UserId, confirmed: bool) -> Update {
        if !confirmed {
            return Update::default();
        }
        let target = targets::USER_ACTION_MESSAGE;
        match self.client.delete_user(id).await {
            Ok(_) => {
                tracing::info!(user_id = id, "user deleted");
                let mut update = Update::from(render::message(
                    target,
                    self.transient("✅ User deleted successfully!"),
                ));
                if self.editing == Some(id) {
                    update.extend(self.close_edit_user());
                }
                if self.selected_user == Some(id) {
                    update.extend(self.select_user(None).await);
                }
                update.extend(self.refresh_users().await);
                update
            }
            Err(e) => error_at(target, e.user_message()),
        }
    }

    // ---- photos ----

    pub async fn select_user(&mut self, id: Option<UserId>) -> Update {
        let changed = self.selected_user != id;
        self.selected_user = id;
        self.view.set_user_sections(id.is_some());

        // Files and frames picked for one user never carry over to another.
        let mut update = Update::default();
        if changed {
            self.single_input.clear();
            self.multiple_input.clear();
            self.enrollment.stop().await;
            update
                .push(View::clear(targets::SINGLE_PREVIEW))
                .push(View::clear(targets::MULTIPLE_PREVIEW))
                .push(View::clear(targets::CAMERA_PREVIEW));
            update
                .camera
                .push((CaptureContext::Enrollment, CaptureState::Closed));
        }
        match id {
            Some(_) => update.extend(self.load_photos().await),
            None => update.extend(render::no_user_selected().into()),
        };
        update
    }

    pub async fn load_photos(&mut self) -> Update {
        let Some(user_id) = self.selected_user else {
            return render::no_user_selected().into();
        };
        match self.client.list_photos(user_id).await {
            Ok(photos) => render::photo_grid(self.client.api_base(), user_id, &photos).into(),
            Err(e) => error_at(targets::PHOTOS_CONTAINER, e.user_message()),
        }
    }

    pub async fn select_files(&mut self, input: InputKind, files: Vec<SelectedFile>) -> Update {
        let (input, target) = match input {
            InputKind::Single => (&mut self.single_input, targets::SINGLE_PREVIEW),
            InputKind::Multiple => (&mut self.multiple_input, targets::MULTIPLE_PREVIEW),
        };
        input.select(files);
        render::preview_strip(target, &input.previews().await).into()
    }

    pub async fn remove_preview(&mut self, index: usize) -> Update {
        match self.multiple_input.remove_and_preview(index).await {
            Ok(thumbs) => render::preview_strip(targets::MULTIPLE_PREVIEW, &thumbs).into(),
            Err(e) => error_at(targets::MULTIPLE_UPLOAD_MESSAGE, format!("❌ {e}")),
        }
    }

    pub async fn upload_single(&mut self) -> Update {
        let target = targets::SINGLE_UPLOAD_MESSAGE;
        let checked = form::selected_user(self.selected_user).and_then(|uid| {
            let file = form::one_file(self.single_input.files())?;
            form::photo_file(file)?;
            Ok((uid, FilePart::from_selected("file", file)))
        });
        let (user_id, part) = match checked {
            Ok(v) => v,
            Err(e) => return error_at(target, e.to_string()),
        };

        match self.client.upload_photo(user_id, part).await {
            Ok(photo) => {
                tracing::info!(user_id, photo_id = photo.id, "photo uploaded");
                self.single_input.clear();
                let mut update = Update::from(render::message(
                    target,
                    self.transient("✅ Photo uploaded successfully!"),
                ));
                update.push(View::clear(targets::SINGLE_PREVIEW));
                update.reset_forms.push(forms::UPLOAD_SINGLE);
                update.extend(self.load_photos().await);
                update
            }
            Err(e) => error_at(target, e.user_message()),
        }
    }

    /// Upload the whole multi-file selection in one request. Per-file
    /// rejections come back from the server and are counted, not raised.
    pub async fn upload_multiple(&mut self) -> Update {
        let target = targets::MULTIPLE_UPLOAD_MESSAGE;
        let checked = form::selected_user(self.selected_user).and_then(|uid| {
            form::some_files(self.multiple_input.files())?;
            Ok(uid)
        });
        let user_id = match checked {
            Ok(v) => v,
            Err(e) => return error_at(target, e.to_string()),
        };
        let parts = self
            .multiple_input
            .files()
            .iter()
            .map(|f| FilePart::from_selected("files[]", f))
            .collect();

        match self.client.upload_photos(user_id, parts).await {
            Ok(report) => {
                let (ok, failed) = (report.files.len(), report.failed());
                tracing::info!(user_id, ok, failed, "photos uploaded");
                let mut text = format!("✅ {ok} photo(s) uploaded successfully!");
                if failed > 0 {
                    text.push_str(&format!(" ({failed} failed)"));
                }
                self.multiple_input.clear();
                let mut update = Update::from(render::message(target, self.transient(text)));
                update.push(View::clear(targets::MULTIPLE_PREVIEW));
                update.reset_forms.push(forms::UPLOAD_MULTIPLE);
                update.extend(self.load_photos().await);
                update
            }
            Err(e) => error_at(target, e.user_message()),
        }
    }

    pub async fn delete_photo(&mut self, user_id: UserId, photo_id: PhotoId, confirmed: bool) -> Update {
        if !confirmed {
            return Update::default();
        }
        let target = targets::PHOTO_ACTION_MESSAGE;
        match self.client.delete_photo(user_id, photo_id).await {
            Ok(_) => {
                tracing::info!(user_id, photo_id, "photo deleted");
                let mut update = Update::from(render::message(
                    target,
                    self.transient("✅ Photo deleted successfully!"),
                ));
                if self.selected_user == Some(user_id) {
                    update.extend(self.load_photos().await);
                }
                update
            }
            Err(e) => error_at(target, e.user_message()),
        }
    }

    // ---- camera ----

    fn camera_state(&self, ctx: CaptureContext) -> Update {
        Update {
            camera: vec![(ctx, self.camera(ctx).state())],
            ..Update::default()
        }
    }

    pub async fn start_camera(&mut self, ctx: CaptureContext) -> Update {
        let mut update = match self.camera_mut(ctx).start().await {
            Ok(()) => {
                let mut u = Update::from(View::clear(ctx.message_target()));
                u.push(View::clear(ctx.preview_target()));
                u
            }
            Err(e) => error_at(ctx.message_target(), e.user_message()),
        };
        update.extend(self.camera_state(ctx));
        update
    }

    pub async fn stop_camera(&mut self, ctx: CaptureContext) -> Update {
        self.camera_mut(ctx).stop().await;
        let mut update = Update::from(View::clear(ctx.preview_target()));
        update.extend(self.camera_state(ctx));
        update
    }

    pub async fn capture(&mut self, ctx: CaptureContext) -> Update {
        let mut update = match self.camera_mut(ctx).capture().await {
            Ok(image) => {
                let mut u = Update::from(render::captured_frame(ctx.preview_target(), &image.data_url));
                u.push(render::message(
                    ctx.message_target(),
                    Notice::success("✅ Photo captured! Ready to upload"),
                ));
                u
            }
            Err(e) => error_at(ctx.message_target(), e.user_message()),
        };
        update.extend(self.camera_state(ctx));
        update
    }

    pub fn retake(&mut self, ctx: CaptureContext) -> Update {
        let mut update = match self.camera_mut(ctx).retake() {
            Ok(()) => Update::from(View::clear(ctx.preview_target())),
            Err(e) => error_at(ctx.message_target(), e.user_message()),
        };
        update.extend(self.camera_state(ctx));
        update
    }

    /// Submit the captured frame to the context's endpoint.
    pub async fn submit_capture(&mut self, ctx: CaptureContext, claimed_user: Option<&str>) -> Update {
        let target = ctx.message_target();
        let client = &self.client;
        let result = match ctx {
            CaptureContext::Enrollment => {
                let user_id = match form::selected_user(self.selected_user) {
                    Ok(id) => id,
                    Err(e) => return error_at(target, e.to_string()),
                };
                self.enrollment
                    .submit(|part| client.upload_photo(user_id, part))
                    .await
                    .map(|_| {
                        Update::from(render::message(
                            target,
                            Notice::success("✅ Photo uploaded successfully!")
                                .dismiss_after(self.dismiss_after),
                        ))
                    })
            }
            CaptureContext::Prediction => self
                .prediction
                .submit(|part| client.predict(part))
                .await
                .map(|result| Update::from(render::prediction(&result))),
            CaptureContext::Verification => {
                let user_id = match form::claimed_user(claimed_user.unwrap_or_default()) {
                    Ok(id) => id,
                    Err(e) => return error_at(target, e.to_string()),
                };
                self.verification
                    .submit(|part| client.verify_face(user_id, part))
                    .await
                    .map(|outcome| Update::from(render::verification(&outcome)))
            }
        };

        let mut update = match result {
            Ok(mut u) => {
                u.push(View::clear(ctx.preview_target()));
                if ctx == CaptureContext::Enrollment {
                    u.reset_forms.push(forms::UPLOAD_CAMERA);
                    u.extend(self.load_photos().await);
                } else {
                    u.push(View::clear(target));
                }
                u
            }
            Err(e) => error_at(target, e.user_message()),
        };
        update.extend(self.camera_state(ctx));
        update
    }

    // ---- training ----

    pub async fn start_training(&mut self, params: &TrainingParams) -> Update {
        let target = targets::TRAINING_MESSAGE;
        if let Err(e) = form::training_params(params) {
            return error_at(target, format!("❌ {e}"));
        }
        tracing::info!(
            epochs = params.epochs,
            batch_size = params.batch_size,
            continue_training = params.continue_training,
            "starting training"
        );
        match self.client.start_training(params).await {
            Ok(stats) => {
                let mut update = Update::from(render::message(
                    target,
                    self.transient("✅ Training completed successfully!"),
                ));
                update.push(render::training_summary(&stats));
                update
            }
            Err(e) => error_at(target, e.user_message()),
        }
    }

    pub async fn training_status(&mut self) -> Update {
        match self.client.training_status().await {
            Ok(status) => render::training_status(&status).into(),
            Err(e) => error_at(targets::TRAINING_MESSAGE, e.user_message()),
        }
    }

    pub async fn model_info(&mut self) -> Update {
        match self.client.model_info().await {
            Ok(info) => render::model_info(&info).into(),
            Err(e) => error_at(targets::MODEL_INFO, e.user_message()),
        }
    }

    // ---- recognition ----

    fn probe(files: &[SelectedFile]) -> Result<FilePart, form::ValidationError> {
        let file = form::one_file(files)?;
        form::probe_file(file)?;
        Ok(FilePart::from_selected("file", file))
    }

    pub async fn predict(&mut self, files: &[SelectedFile]) -> Update {
        let target = targets::PREDICT_MESSAGE;
        let part = match Self::probe(files) {
            Ok(p) => p,
            Err(e) => return error_at(target, e.to_string()),
        };
        match self.client.predict(part).await {
            Ok(result) => {
                tracing::info!(user_id = result.user_id, confidence = result.confidence, "face identified");
                let mut update = Update::from(View::clear(target));
                update.push(render::prediction(&result));
                update
            }
            Err(e) => error_at(target, e.user_message()),
        }
    }

    pub async fn verify(&mut self, claimed_user: &str, files: &[SelectedFile]) -> Update {
        let target = targets::VERIFY_MESSAGE;
        let checked = form::claimed_user(claimed_user)
            .and_then(|uid| Ok((uid, Self::probe(files)?)));
        let (user_id, part) = match checked {
            Ok(v) => v,
            Err(e) => return error_at(target, e.to_string()),
        };
        match self.client.verify_face(user_id, part).await {
            Ok(outcome) => {
                let mut update = Update::from(View::clear(target));
                update.push(render::verification(&outcome));
                update
            }
            Err(e) => error_at(target, e.user_message()),
        }
    }

    pub async fn face_login(&mut self, files: &[SelectedFile]) -> Update {
        let target = targets::LOGIN_RESULT;
        let part = match Self::probe(files) {
            Ok(p) => p,
            Err(e) => return error_at(target, e.to_string()),
        };
        match self.client.login_face(part).await {
            Ok(session) => {
                tracing::info!(user_id = session.user_id, "face login succeeded");
                render::face_login(&session).into()
            }
            Err(e) => error_at(target, e.user_message()),
        }
    }

    // ---- tokens ----

    pub async fn verify_token(&mut self, raw: &str) -> Update {
        let target = targets::TOKEN_RESULT;
        let token = match form::token(raw) {
            Ok(t) => t,
            Err(e) => return error_at(target, e.to_string()),
        };
        match self.client.verify_token(token).await {
            Ok(info) => render::token_info(&info).into(),
            Err(e) => error_at(target, e.user_message()),
        }
    }

    pub async fn logout(&mut self, raw: &str) -> Update {
        let target = targets::TOKEN_RESULT;
        let token = match form::token(raw) {
            Ok(t) => t,
            Err(e) => return error_at(target, e.to_string()),
        };
        match self.client.logout(token).await {
            Ok(message) => {
                let text = if message.is_empty() {
                    "✅ Logged out".to_string()
                } else {
                    format!("✅ {message}")
                };
                render::message(target, Notice::success(text)).into()
            }
            Err(e) => error_at(target, e.user_message()),
        }
    }

    pub async fn active_tokens(&mut self, raw_user: &str) -> Update {
        let target = targets::TOKEN_RESULT;
        let user_id = match form::claimed_user(raw_user) {
            Ok(id) => id,
            Err(e) => return error_at(target, e.to_string()),
        };
        match self.client.active_tokens(user_id).await {
            Ok(tokens) => render::active_tokens(user_id, &tokens).into(),
            Err(e) => error_at(target, e.user_message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use facegate_client::mock::ScriptedTransport;
    use facegate_client::transport::Method;
    use facegate_client::ApiClient;
    use facegate_hw::mock::FakeDevices;
    use facegate_hw::ReadyState;
    use serde_json::json;
    use std::time::Duration;

    type Session = PageSession<ScriptedTransport, FakeDevices>;

    fn session_with(devices: FakeDevices) -> Session {
        PageSession::new(
            ApiClient::new(ScriptedTransport::new()),
            devices,
            &Config::default(),
        )
    }

    fn session() -> Session {
        session_with(FakeDevices::new())
    }

    fn transport(s: &Session) -> &ScriptedTransport {
        s.client().transport()
    }

    fn png(name: &str) -> SelectedFile {
        SelectedFile::new(name, "image/png", name.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_create_user_blank_sends_nothing() {
        let mut s = session();
        let update = s
            .dispatch(Submission::CreateUser {
                name: "   ".into(),
                email: "ana@example.com".into(),
                password: None,
            })
            .await;
        assert_eq!(transport(&s).request_count(), 0);
        let notice = update.notice(targets::CREATE_USER_MESSAGE).unwrap();
        assert_eq!(notice.text, "Please fill in all fields");
    }

    #[tokio::test]
    async fn test_create_user_refreshes_list_once() {
        let mut s = session();
        transport(&s).push_json(201, json!({"id": 7, "name": "Ana", "email": "ana@example.com"}));
        transport(&s).push_json(
            200,
            json!([{"id": 7, "name": "Ana", "email": "ana@example.com"},
                   {"id": 8, "name": "Bo", "email": "bo@example.com"}]),
        );

        let update = s.create_user("Ana", "ana@example.com", Some("pw")).await;

        let requests = transport(&s).requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].method, Method::Get);
        assert_eq!(requests[1].path, "/users");

        let notice = update.notice(targets::CREATE_USER_MESSAGE).unwrap();
        assert_eq!(notice.text, "✅ User \"Ana\" created successfully!");
        assert_eq!(notice.dismiss_after, Some(Duration::from_secs(3)));
        assert!(update.reset_forms.contains(&forms::CREATE_USER));
        assert!(update.view(targets::USERS_CONTAINER).is_some());
        let dropdown = update.view(targets::PHOTO_USER_SELECT).unwrap();
        assert!(dropdown.to_text().contains("Bo (bo@example.com)"));
        assert_eq!(s.users().len(), 2);
    }

    #[tokio::test]
    async fn test_create_user_server_error() {
        let mut s = session();
        transport(&s).push_json(400, json!({"message": "Email sudah terdaftar"}));
        let update = s.create_user("Ana", "ana@example.com", None).await;
        assert_eq!(transport(&s).request_count(), 1);
        assert_eq!(
            update.notice(targets::CREATE_USER_MESSAGE).unwrap().text,
            "❌ Error: Email sudah terdaftar"
        );
    }

    #[tokio::test]
    async fn test_unconfirmed_delete_is_noop() {
        let mut s = session();
        assert!(s.delete_user(3, false).await.is_empty());
        assert!(s.delete_photo(3, 1, false).await.is_empty());
        assert_eq!(transport(&s).request_count(), 0);
    }

    #[tokio::test]
    async fn test_edit_user_flow() {
        let mut s = session();
        transport(&s).push_json(200, json!({"id": 4, "name": "Cy", "email": "cy@example.com"}));
        let update = s.open_edit_user(4).await;
        assert_eq!(s.editing(), Some(4));
        assert!(update
            .view(targets::EDIT_USER_MODAL)
            .unwrap()
            .to_text()
            .contains("cy@example.com"));

        transport(&s).push_json(200, json!({"id": 4, "name": "Cyd", "email": "cy@example.com"}));
        transport(&s).push_json(200, json!([]));
        let update = s.edit_user("Cyd", "cy@example.com", None).await;
        assert_eq!(s.editing(), None);
        assert!(update.view(targets::EDIT_USER_MODAL).unwrap().is_empty());
        let requests = transport(&s).requests();
        assert_eq!(requests[1].method, Method::Put);
        assert_eq!(requests[1].path, "/users/4");
        assert_eq!(requests.len(), 3);
    }

    #[tokio::test]
    async fn test_deselect_hides_sections() {
        let mut s = session();
        transport(&s).push_json(200, json!([]));
        s.select_user(Some(2)).await;
        assert!(s.view_state().user_sections_visible());

        let update = s.select_user(None).await;
        assert!(!s.view_state().user_sections_visible());
        assert_eq!(
            update.view(targets::PHOTOS_CONTAINER).unwrap().to_text().trim(),
            "No user selected"
        );
    }

    #[tokio::test]
    async fn test_switching_user_discards_enrollment_capture() {
        let devices = FakeDevices::new();
        let mut s = session_with(devices.clone());
        transport(&s).push_json(200, json!([]));
        s.select_user(Some(1)).await;
        s.start_camera(CaptureContext::Enrollment).await;
        s.capture(CaptureContext::Enrollment).await;
        assert_eq!(
            s.camera(CaptureContext::Enrollment).state(),
            CaptureState::Captured
        );

        transport(&s).push_json(200, json!([]));
        let update = s.select_user(Some(2)).await;
        assert_eq!(
            s.camera(CaptureContext::Enrollment).state(),
            CaptureState::Closed
        );
        assert_eq!(devices.live_tracks(), 0);
        assert!(update
            .camera
            .contains(&(CaptureContext::Enrollment, CaptureState::Closed)));

        let sent = transport(&s).request_count();
        let update = s.submit_capture(CaptureContext::Enrollment, None).await;
        assert_eq!(transport(&s).request_count(), sent);
        assert_eq!(
            update.notice(targets::CAMERA_UPLOAD_MESSAGE).unwrap().text,
            "❌ No photo captured yet"
        );
    }

    #[tokio::test]
    async fn test_reselecting_same_user_keeps_capture() {
        let mut s = session();
        transport(&s).push_json(200, json!([]));
        s.select_user(Some(1)).await;
        s.start_camera(CaptureContext::Enrollment).await;
        s.capture(CaptureContext::Enrollment).await;

        transport(&s).push_json(200, json!([]));
        s.select_user(Some(1)).await;
        assert_eq!(
            s.camera(CaptureContext::Enrollment).state(),
            CaptureState::Captured
        );
    }

    #[tokio::test]
    async fn test_upload_requires_selected_user() {
        let mut s = session();
        s.select_files(InputKind::Single, vec![png("a.png")]).await;
        let update = s.upload_single().await;
        assert_eq!(transport(&s).request_count(), 0);
        assert_eq!(
            update.notice(targets::SINGLE_UPLOAD_MESSAGE).unwrap().text,
            "❌ Please select a user first"
        );
    }

    #[tokio::test]
    async fn test_upload_multiple_reports_failures() {
        let mut s = session();
        transport(&s).push_json(200, json!([]));
        s.select_user(Some(2)).await;
        s.select_files(InputKind::Multiple, vec![png("a.png"), png("b.png"), png("c.png")])
            .await;

        transport(&s).push_json(
            201,
            json!({"files": [{"id": 1, "filename": "a.png"}, {"id": 2, "filename": "b.png"}],
                   "total": 2, "errors": ["c.png: no face"]}),
        );
        transport(&s).push_json(200, json!([]));
        let update = s.upload_multiple().await;

        assert_eq!(
            update.notice(targets::MULTIPLE_UPLOAD_MESSAGE).unwrap().text,
            "✅ 2 photo(s) uploaded successfully! (1 failed)"
        );
        assert!(s.multiple_input().is_empty());
        assert!(update.view(targets::MULTIPLE_PREVIEW).unwrap().is_empty());
        assert_eq!(transport(&s).requests()[2].path, "/photos/2");
    }

    #[tokio::test]
    async fn test_remove_preview_rerenders_rest() {
        let mut s = session();
        let names = ["a.png", "b.png", "c.png", "d.png"];
        s.select_files(InputKind::Multiple, names.iter().map(|n| png(n)).collect())
            .await;

        let update = s.remove_preview(1).await;
        let left: Vec<&str> = s
            .multiple_input()
            .files()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(left, vec!["a.png", "c.png", "d.png"]);
        assert_eq!(update.view(targets::MULTIPLE_PREVIEW).unwrap().nodes.len(), 3);

        let update = s.remove_preview(9).await;
        assert!(update.notice(targets::MULTIPLE_UPLOAD_MESSAGE).is_some());
    }

    #[tokio::test]
    async fn test_camera_prediction_closes_stream() {
        let devices = FakeDevices::new();
        let mut s = session_with(devices.clone());
        let ctx = CaptureContext::Prediction;

        s.start_camera(ctx).await;
        let update = s.capture(ctx).await;
        assert!(update.view(ctx.preview_target()).is_some());
        assert_eq!(update.camera, vec![(ctx, CaptureState::Captured)]);

        transport(&s).push_json(
            200,
            json!({"success": true, "data": {"user_id": 3, "name": "Ana", "confidence": 92.5,
                   "all_predictions": [{"user_id": 3, "name": "Ana", "confidence": 92.5},
                                       {"user_id": 5, "name": "Bo", "confidence": 4.1}]}}),
        );
        let update = s.submit_capture(ctx, None).await;
        assert!(update
            .view(targets::PREDICT_RESULT)
            .unwrap()
            .to_text()
            .contains("Identified: Ana"));
        assert_eq!(update.camera, vec![(ctx, CaptureState::Closed)]);
        assert_eq!(devices.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_camera_verification_mismatch() {
        let mut s = session();
        let ctx = CaptureContext::Verification;
        s.start_camera(ctx).await;
        s.capture(ctx).await;

        let update = s.submit_capture(ctx, Some("")).await;
        assert_eq!(transport(&s).request_count(), 0);
        assert_eq!(s.camera(ctx).state(), CaptureState::Captured);
        assert!(update.notice(targets::VERIFY_MESSAGE).is_some());

        transport(&s).push_json(
            403,
            json!({"status": "error", "data": {"match": false, "claimed_user_id": 4,
                   "predicted_user_id": 9, "confidence": 80.0}}),
        );
        let update = s.submit_capture(ctx, Some("4")).await;
        let text = update.view(targets::VERIFY_RESULT).unwrap().to_text();
        assert!(text.contains("Face does not match"));
        assert!(text.contains("Claimed user ID: 4"));
        assert!(text.contains("Detected user ID: 9"));
    }

    #[tokio::test]
    async fn test_verify_low_confidence_without_match() {
        let mut s = session();
        transport(&s).push_json(
            401,
            json!({"status": "error", "data": {"confidence": 55.0, "required_confidence": 70.0}}),
        );
        let update = s.verify("4", &[png("probe.png")]).await;
        let text = update.view(targets::VERIFY_RESULT).unwrap().to_text();
        assert!(text.contains("Confidence too low"));
        assert!(!text.contains("does not match"));
    }

    #[tokio::test]
    async fn test_failed_camera_upload_stays_captured() {
        let mut s = session();
        transport(&s).push_json(200, json!([]));
        s.select_user(Some(2)).await;
        let ctx = CaptureContext::Enrollment;
        s.start_camera(ctx).await;
        s.capture(ctx).await;

        transport(&s).push_failure("connection reset");
        let update = s.submit_capture(ctx, None).await;
        assert_eq!(
            update.notice(targets::CAMERA_UPLOAD_MESSAGE).unwrap().text,
            "Error: connection reset"
        );
        assert_eq!(update.camera, vec![(ctx, CaptureState::Captured)]);
    }

    #[tokio::test]
    async fn test_capture_before_ready() {
        let devices = FakeDevices::new().with_ready_state(ReadyState::HaveNothing);
        let mut s = session_with(devices.clone());
        let ctx = CaptureContext::Enrollment;
        s.start_camera(ctx).await;
        let update = s.capture(ctx).await;
        assert_eq!(update.camera, vec![(ctx, CaptureState::Streaming)]);
        assert!(update.notice(ctx.message_target()).is_some());

        let update = s.stop_camera(ctx).await;
        assert_eq!(update.camera, vec![(ctx, CaptureState::Closed)]);
        assert_eq!(devices.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_unknown_tab_keeps_state() {
        let mut s = session();
        s.dispatch(Submission::ClickTab(TabControl::global("training")))
            .await;
        s.dispatch(Submission::ClickTab(TabControl::global("bogus")))
            .await;
        assert_eq!(
            s.view_state()
                .active_panel(&facegate_core::view::TabScope::Global)
                .as_deref(),
            Some("training-tab")
        );
    }

    #[tokio::test]
    async fn test_token_validation() {
        let mut s = session();
        let update = s.verify_token("not-a-token").await;
        assert_eq!(transport(&s).request_count(), 0);
        assert_eq!(
            update.notice(targets::TOKEN_RESULT).unwrap().text,
            "Invalid token format"
        );
    }
}
