//! Declarative views of API payloads.
//!
//! Every function here is a pure mapping from response data to a [`View`]:
//! a target element id plus a tree of [`Node`]s. Views render to an HTML
//! fragment (all text escaped) or to plain text for terminals.

use crate::preview::Thumbnail;
use crate::types::{
    ActiveToken, Candidate, FaceSession, ModelInfo, Photo, PredictionResult, TokenInfo,
    TrainingStats, TrainingStatus, User, UserId, VerificationOutcome,
};
use crate::view::targets;
use std::fmt::{self, Write as _};
use std::time::Duration;

/// Number of ranked candidates shown for a prediction.
pub const TOP_CANDIDATES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Error,
    Info,
}

impl Tone {
    fn class(self) -> &'static str {
        match self {
            Tone::Success => "success",
            Tone::Error => "error",
            Tone::Info => "info",
        }
    }
}

/// Inline status message shown next to a form.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub tone: Tone,
    pub text: String,
    /// Hide the message again after this long.
    pub dismiss_after: Option<Duration>,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            tone: Tone::Success,
            text: text.into(),
            dismiss_after: None,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            tone: Tone::Error,
            text: text.into(),
            dismiss_after: None,
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            tone: Tone::Info,
            text: text.into(),
            dismiss_after: None,
        }
    }

    pub fn dismiss_after(mut self, after: Duration) -> Self {
        self.dismiss_after = Some(after);
        self
    }
}

/// Operator action attached to a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    EditUser(UserId),
    DeleteUser(UserId),
    DeletePhoto { user_id: UserId, photo_id: i64 },
    RemovePreview(usize),
}

impl Action {
    fn data_attrs(&self) -> String {
        match self {
            Action::EditUser(id) => format!(r#"data-action="edit-user" data-user-id="{id}""#),
            Action::DeleteUser(id) => format!(r#"data-action="delete-user" data-user-id="{id}""#),
            Action::DeletePhoto { user_id, photo_id } => format!(
                r#"data-action="delete-photo" data-user-id="{user_id}" data-photo-id="{photo_id}""#
            ),
            Action::RemovePreview(index) => {
                format!(r#"data-action="remove-preview" data-index="{index}""#)
            }
        }
    }

    fn class(&self) -> &'static str {
        match self {
            Action::EditUser(_) => "btn btn-primary btn-small",
            Action::DeleteUser(_) => "btn btn-danger btn-small",
            Action::DeletePhoto { .. } => "delete",
            Action::RemovePreview(_) => "preview-remove",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub cells: Vec<String>,
    pub highlighted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Heading(String),
    Text(String),
    /// Empty-state or loading text.
    Placeholder(String),
    Field {
        label: String,
        value: String,
    },
    Table {
        headers: Vec<String>,
        rows: Vec<Row>,
    },
    Labels {
        title: String,
        items: Vec<String>,
    },
    Image {
        src: String,
        alt: String,
        class: &'static str,
    },
    Link {
        href: String,
        text: String,
    },
    Button {
        label: String,
        action: Action,
    },
    Options {
        placeholder: String,
        entries: Vec<(String, String)>,
    },
    Card {
        class: &'static str,
        children: Vec<Node>,
    },
    Notice(Notice),
}

/// Content destined for one element.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub target: String,
    pub nodes: Vec<Node>,
    pub scroll_into_view: bool,
}

impl View {
    pub fn new(target: impl Into<String>, nodes: Vec<Node>) -> Self {
        Self {
            target: target.into(),
            nodes,
            scroll_into_view: false,
        }
    }

    /// A view that empties its target.
    pub fn clear(target: impl Into<String>) -> Self {
        Self::new(target, Vec::new())
    }

    pub fn scrolled(mut self) -> Self {
        self.scroll_into_view = true;
        self
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.nodes.iter().find_map(|n| match n {
            Node::Notice(notice) => Some(notice),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Render as an HTML fragment suitable for `innerHTML`.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            node_html(node, &mut out);
        }
        out
    }

    /// Render as indented plain text.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            node_text(node, 0, &mut out);
        }
        out
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Escape text for safe inclusion in HTML content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

fn node_html(node: &Node, out: &mut String) {
    // Writing to a String cannot fail.
    let _ = match node {
        Node::Heading(text) => write!(out, "<h3>{}</h3>", escape_html(text)),
        Node::Text(text) => write!(out, "<p>{}</p>", escape_html(text)),
        Node::Placeholder(text) => {
            write!(out, r#"<div class="loading">{}</div>"#, escape_html(text))
        }
        Node::Field { label, value } => write!(
            out,
            r#"<div class="result-field"><span class="label">{}</span><span class="value">{}</span></div>"#,
            escape_html(label),
            escape_html(value)
        ),
        Node::Table { headers, rows } => {
            out.push_str(r#"<table class="result-table"><thead><tr>"#);
            for h in headers {
                let _ = write!(out, "<th>{}</th>", escape_html(h));
            }
            out.push_str("</tr></thead><tbody>");
            for row in rows {
                if row.highlighted {
                    out.push_str(r#"<tr class="highlight">"#);
                } else {
                    out.push_str("<tr>");
                }
                for cell in &row.cells {
                    let _ = write!(out, "<td>{}</td>", escape_html(cell));
                }
                out.push_str("</tr>");
            }
            write!(out, "</tbody></table>")
        }
        Node::Labels { title, items } => {
            let _ = write!(out, r#"<div class="labels"><h4>{}</h4><ul>"#, escape_html(title));
            for item in items {
                let _ = write!(out, "<li>{}</li>", escape_html(item));
            }
            write!(out, "</ul></div>")
        }
        Node::Image { src, alt, class } => write!(
            out,
            r#"<img src="{}" alt="{}" class="{class}">"#,
            escape_html(src),
            escape_html(alt)
        ),
        Node::Link { href, text } => write!(
            out,
            r#"<a href="{}" target="_blank">{}</a>"#,
            escape_html(href),
            escape_html(text)
        ),
        Node::Button { label, action } => write!(
            out,
            r#"<button type="button" class="{}" {}>{}</button>"#,
            action.class(),
            action.data_attrs(),
            escape_html(label)
        ),
        Node::Options {
            placeholder,
            entries,
        } => {
            let _ = write!(out, r#"<option value="">{}</option>"#, escape_html(placeholder));
            for (value, text) in entries {
                let _ = write!(
                    out,
                    r#"<option value="{}">{}</option>"#,
                    escape_html(value),
                    escape_html(text)
                );
            }
            Ok(())
        }
        Node::Card { class, children } => {
            let _ = write!(out, r#"<div class="{class}">"#);
            for child in children {
                node_html(child, out);
            }
            write!(out, "</div>")
        }
        Node::Notice(notice) => write!(
            out,
            r#"<div class="message show {}">{}</div>"#,
            notice.tone.class(),
            escape_html(&notice.text)
        ),
    };
}

fn node_text(node: &Node, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    let _ = match node {
        Node::Heading(text) => writeln!(out, "{pad}== {text} =="),
        Node::Text(text) | Node::Placeholder(text) => writeln!(out, "{pad}{text}"),
        Node::Field { label, value } => writeln!(out, "{pad}{label}: {value}"),
        Node::Table { headers, rows } => {
            let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
            for row in rows {
                for (i, cell) in row.cells.iter().enumerate() {
                    if let Some(w) = widths.get_mut(i) {
                        *w = (*w).max(cell.chars().count());
                    }
                }
            }
            let line = |cells: &[String], marker: &str| {
                let cols: Vec<String> = cells
                    .iter()
                    .enumerate()
                    .map(|(i, c)| format!("{c:<w$}", w = widths.get(i).copied().unwrap_or(0)))
                    .collect();
                format!("{pad}{marker}{}", cols.join("  "))
            };
            let _ = writeln!(out, "{}", line(headers.as_slice(), "  "));
            for row in rows {
                let marker = if row.highlighted { "* " } else { "  " };
                let _ = writeln!(out, "{}", line(row.cells.as_slice(), marker));
            }
            Ok(())
        }
        Node::Labels { title, items } => writeln!(out, "{pad}{title}: {}", items.join(", ")),
        Node::Image { src, alt, .. } => {
            if src.starts_with("data:") {
                writeln!(out, "{pad}[image: {alt}]")
            } else {
                writeln!(out, "{pad}[image: {alt}] {src}")
            }
        }
        Node::Link { href, text } => writeln!(out, "{pad}{text} <{href}>"),
        Node::Button { .. } => Ok(()),
        Node::Options {
            placeholder,
            entries,
        } => {
            let _ = writeln!(out, "{pad}{placeholder}");
            for (value, text) in entries {
                let _ = writeln!(out, "{pad}  [{value}] {text}");
            }
            Ok(())
        }
        Node::Card { children, .. } => {
            for child in children {
                node_text(child, depth + 1, out);
            }
            writeln!(out)
        }
        Node::Notice(notice) => writeln!(out, "{pad}{}", notice.text),
    };
}

fn percent(value: f64) -> String {
    format!("{value:.2}%")
}

fn fraction_percent(value: f64) -> String {
    percent(value * 100.0)
}

fn opt<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "–".to_string(), |v| v.to_string())
}

/// Format a backend timestamp for display; unparsable input is shown as-is.
pub fn local_timestamp(raw: &str) -> String {
    use chrono::{DateTime, Local, NaiveDateTime};

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return dt.format("%Y-%m-%d %H:%M:%S").to_string();
        }
    }
    raw.to_string()
}

/// `GET` URL that serves a stored photo.
pub fn photo_view_url(api_base: &str, user_id: UserId, photo_id: i64) -> String {
    format!(
        "{}/photos/{user_id}/{photo_id}/view",
        api_base.trim_end_matches('/')
    )
}

/// A single inline message.
pub fn message(target: &str, notice: Notice) -> View {
    View::new(target, vec![Node::Notice(notice)])
}

pub fn user_list(users: &[User]) -> View {
    if users.is_empty() {
        return View::new(
            targets::USERS_CONTAINER,
            vec![Node::Placeholder(
                "No users found. Create your first user!".into(),
            )],
        );
    }

    let cards = users
        .iter()
        .map(|user| Node::Card {
            class: "user-card",
            children: vec![
                Node::Card {
                    class: "user-info",
                    children: vec![
                        Node::Heading(user.name.clone()),
                        Node::Text(format!("📧 {}", user.email)),
                        Node::Text(format!("🆔 ID: {}", user.id)),
                    ],
                },
                Node::Card {
                    class: "user-actions",
                    children: vec![
                        Node::Button {
                            label: "✏️ Edit".into(),
                            action: Action::EditUser(user.id),
                        },
                        Node::Button {
                            label: "🗑️ Delete".into(),
                            action: Action::DeleteUser(user.id),
                        },
                    ],
                },
            ],
        })
        .collect();
    View::new(targets::USERS_CONTAINER, cards)
}

/// Options of the photo-section user dropdown.
pub fn user_options(users: &[User]) -> View {
    View::new(
        targets::PHOTO_USER_SELECT,
        vec![Node::Options {
            placeholder: "-- Select User --".into(),
            entries: users
                .iter()
                .map(|u| (u.id.to_string(), format!("{} ({})", u.name, u.email)))
                .collect(),
        }],
    )
}

pub fn no_user_selected() -> View {
    View::new(
        targets::PHOTOS_CONTAINER,
        vec![Node::Placeholder("No user selected".into())],
    )
}

/// Contents of the edit dialog, prefilled from the stored user.
pub fn edit_dialog(user: &User) -> View {
    View::new(
        targets::EDIT_USER_MODAL,
        vec![
            Node::Heading(format!("Edit user #{}", user.id)),
            Node::Field {
                label: "Name".into(),
                value: user.name.clone(),
            },
            Node::Field {
                label: "Email".into(),
                value: user.email.clone(),
            },
        ],
    )
}

pub fn photo_grid(api_base: &str, user_id: UserId, photos: &[Photo]) -> View {
    if photos.is_empty() {
        return View::new(
            targets::PHOTOS_CONTAINER,
            vec![Node::Placeholder(
                "No photos yet. Upload one to get started!".into(),
            )],
        );
    }

    let cards = photos
        .iter()
        .map(|photo| {
            let url = photo_view_url(api_base, user_id, photo.id);
            Node::Card {
                class: "photo-card",
                children: vec![
                    Node::Image {
                        src: url.clone(),
                        alt: photo.filename.clone(),
                        class: "photo-image",
                    },
                    Node::Card {
                        class: "photo-info",
                        children: vec![
                            Node::Heading(photo.filename.clone()),
                            Node::Text(format!("📏 {}×{}px", photo.width, photo.height)),
                            Node::Text(format!("📅 {}", local_timestamp(&photo.created_at))),
                            Node::Link {
                                href: url,
                                text: "👁️ View".into(),
                            },
                            Node::Button {
                                label: "🗑️ Delete".into(),
                                action: Action::DeletePhoto {
                                    user_id,
                                    photo_id: photo.id,
                                },
                            },
                        ],
                    },
                ],
            }
        })
        .collect();
    View::new(targets::PHOTOS_CONTAINER, cards)
}

/// Thumbnails of a file selection.
pub fn preview_strip(target: &str, thumbnails: &[Thumbnail]) -> View {
    let nodes = thumbnails
        .iter()
        .map(|thumb| {
            let img = Node::Image {
                src: thumb.data_url.clone(),
                alt: thumb.name.clone(),
                class: "preview-img",
            };
            if thumb.removable {
                Node::Card {
                    class: "preview-item",
                    children: vec![
                        img,
                        Node::Button {
                            label: "×".into(),
                            action: Action::RemovePreview(thumb.index),
                        },
                    ],
                }
            } else {
                img
            }
        })
        .collect();
    View::new(target, nodes)
}

/// Preview of a freshly captured camera frame.
pub fn captured_frame(target: &str, data_url: &str) -> View {
    View::new(
        target,
        vec![
            Node::Image {
                src: data_url.to_string(),
                alt: "Captured Photo".into(),
                class: "capture-img",
            },
            Node::Text("Photo captured successfully!".into()),
        ],
    )
}

pub fn training_summary(stats: &TrainingStats) -> View {
    let mut nodes = vec![
        Node::Heading("✅ Training completed".into()),
        Node::Field {
            label: "Test accuracy".into(),
            value: stats
                .test_accuracy
                .map_or_else(|| "–".into(), fraction_percent),
        },
        Node::Field {
            label: "Test loss".into(),
            value: stats
                .test_loss
                .map_or_else(|| "–".into(), |l| format!("{l:.4}")),
        },
        Node::Field {
            label: "Epochs trained".into(),
            value: opt(stats.epochs_trained),
        },
        Node::Field {
            label: "Training images".into(),
            value: opt(stats.num_data),
        },
        Node::Field {
            label: "Classes".into(),
            value: opt(stats.num_classes),
        },
    ];
    if let Some(secs) = stats.training_time_seconds {
        nodes.push(Node::Field {
            label: "Training time".into(),
            value: format!("{secs:.1}s"),
        });
    }
    if let Some(path) = &stats.model_path {
        nodes.push(Node::Field {
            label: "Model".into(),
            value: path.clone(),
        });
    }
    nodes.push(Node::Labels {
        title: "Recognized users".into(),
        items: stats.class_labels.iter().map(ToString::to_string).collect(),
    });
    View::new(targets::TRAINING_RESULT, nodes).scrolled()
}

pub fn training_status(status: &TrainingStatus) -> View {
    if !status.model_available {
        let text = status
            .message
            .clone()
            .unwrap_or_else(|| "No trained model found".into());
        return View::new(targets::TRAINING_RESULT, vec![Node::Placeholder(text)]);
    }

    let mut nodes = vec![Node::Heading("📊 Trained model".into())];
    if let Some(m) = &status.accuracy_metrics {
        let metrics = [
            ("Test accuracy", m.test_accuracy),
            ("Training accuracy", m.training_accuracy),
            ("Validation accuracy", m.validation_accuracy),
        ];
        for (label, value) in metrics {
            if let Some(v) = value {
                nodes.push(Node::Field {
                    label: label.into(),
                    value: fraction_percent(v),
                });
            }
        }
        let losses = [
            ("Test loss", m.test_loss),
            ("Training loss", m.training_loss),
            ("Validation loss", m.validation_loss),
        ];
        for (label, value) in losses {
            if let Some(v) = value {
                nodes.push(Node::Field {
                    label: label.into(),
                    value: format!("{v:.4}"),
                });
            }
        }
        nodes.push(Node::Field {
            label: "Epochs trained".into(),
            value: opt(m.epochs_trained),
        });
        if let Some(arch) = &m.model_architecture {
            nodes.push(Node::Field {
                label: "Architecture".into(),
                value: arch.clone(),
            });
        }
    }
    nodes.push(Node::Field {
        label: "Classes".into(),
        value: opt(status.num_classes),
    });
    nodes.push(Node::Labels {
        title: "Recognized users".into(),
        items: status.class_labels.iter().map(ToString::to_string).collect(),
    });
    View::new(targets::TRAINING_RESULT, nodes)
}

pub fn model_info(info: &ModelInfo) -> View {
    if !info.loaded {
        let mut nodes = vec![Node::Placeholder("⚠️ Model not loaded".into())];
        if let Some(err) = &info.error {
            nodes.push(Node::Text(err.clone()));
        }
        return View::new(targets::MODEL_INFO, nodes);
    }

    let mut nodes = vec![
        Node::Heading("🧠 Model ready".into()),
        Node::Field {
            label: "Model".into(),
            value: info.model.clone().unwrap_or_else(|| "–".into()),
        },
        Node::Field {
            label: "Enrolled users".into(),
            value: info.num_users.to_string(),
        },
        Node::Field {
            label: "Faces".into(),
            value: info.total_faces.to_string(),
        },
    ];
    if let Some(images) = info.total_images {
        nodes.push(Node::Field {
            label: "Images".into(),
            value: images.to_string(),
        });
    }
    if let Some(dim) = info.embedding_dim {
        nodes.push(Node::Field {
            label: "Embedding dimension".into(),
            value: dim.to_string(),
        });
    }
    if let Some(date) = &info.training_date {
        nodes.push(Node::Field {
            label: "Trained".into(),
            value: local_timestamp(date),
        });
    }
    nodes.push(Node::Labels {
        title: "Users".into(),
        items: info.users.iter().map(ToString::to_string).collect(),
    });
    View::new(targets::MODEL_INFO, nodes)
}

fn candidate_row(rank: usize, c: &Candidate) -> Row {
    Row {
        cells: vec![
            format!("#{}", rank + 1),
            c.name.clone(),
            c.user_id.to_string(),
            percent(c.confidence),
        ],
        highlighted: rank == 0,
    }
}

/// Ranked prediction: the identified user and the top candidates, the
/// first row highlighted.
pub fn prediction(result: &PredictionResult) -> View {
    let ranked = result.ranked();
    let mut nodes = vec![
        Node::Heading(format!("🎯 Identified: {}", result.name)),
        Node::Field {
            label: "User ID".into(),
            value: result.user_id.to_string(),
        },
        Node::Field {
            label: "Confidence".into(),
            value: percent(result.confidence),
        },
    ];
    if !result.email.is_empty() {
        nodes.push(Node::Field {
            label: "Email".into(),
            value: result.email.clone(),
        });
    }
    nodes.push(Node::Table {
        headers: vec![
            "Rank".into(),
            "Name".into(),
            "User ID".into(),
            "Confidence".into(),
        ],
        rows: ranked
            .iter()
            .take(TOP_CANDIDATES)
            .enumerate()
            .map(|(i, c)| candidate_row(i, c))
            .collect(),
    });
    if let Some(method) = &result.method {
        nodes.push(Node::Text(format!("Method: {method}")));
    }
    View::new(targets::PREDICT_RESULT, nodes).scrolled()
}

fn session_fields(session: &FaceSession) -> Vec<Node> {
    vec![
        Node::Field {
            label: "User".into(),
            value: format!("{} (ID {})", session.name, session.user_id),
        },
        Node::Field {
            label: "Email".into(),
            value: session.email.clone(),
        },
        Node::Field {
            label: "Confidence".into(),
            value: percent(session.confidence),
        },
        Node::Field {
            label: "Token".into(),
            value: session.token.to_string(),
        },
        Node::Field {
            label: "Expires".into(),
            value: local_timestamp(&session.expires_at),
        },
    ]
}

/// One of three exclusive branches: matched, mismatched, low confidence.
pub fn verification(outcome: &VerificationOutcome) -> View {
    let card = match outcome {
        VerificationOutcome::Matched(session) => {
            let mut children = vec![Node::Heading("✅ Identity verified".into())];
            children.extend(session_fields(session));
            Node::Card {
                class: "verify-result success",
                children,
            }
        }
        VerificationOutcome::Mismatched {
            claimed_user_id,
            predicted_user_id,
            confidence,
        } => Node::Card {
            class: "verify-result mismatch",
            children: vec![
                Node::Heading("❌ Face does not match".into()),
                Node::Field {
                    label: "Claimed user ID".into(),
                    value: opt(*claimed_user_id),
                },
                Node::Field {
                    label: "Detected user ID".into(),
                    value: opt(*predicted_user_id),
                },
                Node::Field {
                    label: "Confidence".into(),
                    value: confidence.map_or_else(|| "–".into(), percent),
                },
            ],
        },
        VerificationOutcome::LowConfidence {
            confidence,
            required_confidence,
        } => Node::Card {
            class: "verify-result low-confidence",
            children: vec![
                Node::Heading("⚠️ Confidence too low".into()),
                Node::Field {
                    label: "Confidence".into(),
                    value: percent(*confidence),
                },
                Node::Field {
                    label: "Required".into(),
                    value: percent(*required_confidence),
                },
            ],
        },
    };
    View::new(targets::VERIFY_RESULT, vec![card]).scrolled()
}

/// Result of a 1:N face login.
pub fn face_login(session: &FaceSession) -> View {
    let mut children = vec![Node::Heading(format!("🔓 Welcome, {}", session.name))];
    children.extend(session_fields(session));
    View::new(
        targets::LOGIN_RESULT,
        vec![Node::Card {
            class: "login-result",
            children,
        }],
    )
    .scrolled()
}

pub fn token_info(info: &TokenInfo) -> View {
    let mut nodes = vec![
        Node::Heading("🔑 Token is valid".into()),
        Node::Field {
            label: "User".into(),
            value: format!("{} (ID {})", info.name, info.user_id),
        },
        Node::Field {
            label: "Email".into(),
            value: info.email.clone(),
        },
    ];
    if let Some(c) = info.confidence {
        nodes.push(Node::Field {
            label: "Confidence".into(),
            value: percent(c),
        });
    }
    nodes.push(Node::Field {
        label: "Expires".into(),
        value: local_timestamp(&info.expires_at),
    });
    View::new(targets::TOKEN_RESULT, nodes)
}

pub fn active_tokens(user_id: UserId, tokens: &[ActiveToken]) -> View {
    if tokens.is_empty() {
        return View::new(
            targets::TOKEN_RESULT,
            vec![Node::Placeholder(format!(
                "No active tokens for user {user_id}"
            ))],
        );
    }
    View::new(
        targets::TOKEN_RESULT,
        vec![Node::Table {
            headers: vec![
                "Token".into(),
                "Confidence".into(),
                "Created".into(),
                "Expires".into(),
            ],
            rows: tokens
                .iter()
                .map(|t| Row {
                    cells: vec![
                        t.token.to_string(),
                        t.confidence.map_or_else(|| "–".into(), percent),
                        t.created_at
                            .as_deref()
                            .map_or_else(|| "–".into(), local_timestamp),
                        local_timestamp(&t.expires_at),
                    ],
                    highlighted: false,
                })
                .collect(),
        }],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(id: i64, name: &str) -> User {
        User {
            id,
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#039;Jerry&#039;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_empty_user_list() {
        let view = user_list(&[]);
        assert_eq!(view.target, targets::USERS_CONTAINER);
        assert!(view.to_html().contains("No users found. Create your first user!"));
    }

    #[test]
    fn test_user_list_escapes_names() {
        let view = user_list(&[user(1, "<script>")]);
        let html = view.to_html();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains(r#"data-action="edit-user" data-user-id="1""#));
    }

    #[test]
    fn test_user_options_placeholder_first() {
        let view = user_options(&[user(1, "Ana"), user(2, "Bo")]);
        let html = view.to_html();
        assert!(html.starts_with(r#"<option value="">-- Select User --</option>"#));
        assert!(html.contains(r#"<option value="2">Bo (bo@example.com)</option>"#));
    }

    #[test]
    fn test_photo_grid_links() {
        let photos = vec![Photo {
            id: 7,
            user_id: Some(3),
            filename: "a.png".into(),
            width: 224,
            height: 224,
            created_at: "2026-01-02T03:04:05".into(),
        }];
        let view = photo_grid("/api", 3, &photos);
        let html = view.to_html();
        assert!(html.contains(r#"src="/api/photos/3/7/view""#));
        assert!(html.contains("224×224px"));
        assert!(html.contains("2026-01-02 03:04:05"));
    }

    #[test]
    fn test_local_timestamp_passthrough() {
        assert_eq!(local_timestamp("yesterday"), "yesterday");
    }

    #[test]
    fn test_prediction_top_three_highlight_first() {
        let result: PredictionResult = serde_json::from_value(json!({
            "user_id": 1, "name": "Ana", "confidence": 92.5,
            "all_predictions": [
                {"user_id": 1, "name": "Ana", "confidence": 92.5},
                {"user_id": 2, "name": "Bo", "confidence": 4.0},
                {"user_id": 3, "name": "Cy", "confidence": 2.0},
                {"user_id": 4, "name": "Di", "confidence": 1.5}
            ]
        }))
        .unwrap();
        let view = prediction(&result);
        assert!(view.scroll_into_view);
        let rows = view
            .nodes
            .iter()
            .find_map(|n| match n {
                Node::Table { rows, .. } => Some(rows.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(rows.len(), TOP_CANDIDATES);
        assert!(rows[0].highlighted);
        assert!(!rows[1].highlighted && !rows[2].highlighted);
        assert_eq!(rows[0].cells[1], "Ana");
    }

    #[test]
    fn test_verification_mismatch_shows_both_ids() {
        let outcome = VerificationOutcome::classify(&json!({
            "match": false, "claimed_user_id": 4, "predicted_user_id": 9, "confidence": 80.0
        }))
        .unwrap();
        let text = verification(&outcome).to_text();
        assert!(text.contains("Face does not match"));
        assert!(text.contains("Claimed user ID: 4"));
        assert!(text.contains("Detected user ID: 9"));
    }

    #[test]
    fn test_verification_low_confidence_branch() {
        let outcome = VerificationOutcome::classify(&json!({
            "confidence": 55.5, "required_confidence": 70.0
        }))
        .unwrap();
        let text = verification(&outcome).to_text();
        assert!(text.contains("Confidence too low"));
        assert!(text.contains("Confidence: 55.50%"));
        assert!(text.contains("Required: 70.00%"));
        assert!(!text.contains("does not match"));
    }

    #[test]
    fn test_training_summary_labels() {
        let stats = TrainingStats {
            test_accuracy: Some(0.915),
            epochs_trained: Some(12),
            class_labels: vec![crate::types::Label::Id(1), crate::types::Label::Id(2)],
            ..Default::default()
        };
        let text = training_summary(&stats).to_text();
        assert!(text.contains("Test accuracy: 91.50%"));
        assert!(text.contains("Epochs trained: 12"));
        assert!(text.contains("Recognized users: 1, 2"));
    }

    #[test]
    fn test_model_not_loaded() {
        let info = ModelInfo {
            error: Some("no embeddings".into()),
            ..Default::default()
        };
        let text = model_info(&info).to_text();
        assert!(text.contains("Model not loaded"));
        assert!(text.contains("no embeddings"));
    }

    #[test]
    fn test_notice_html() {
        let view = message("createUserMessage", Notice::error("❌ Error: taken"));
        assert_eq!(
            view.to_html(),
            r#"<div class="message show error">❌ Error: taken</div>"#
        );
    }
}
