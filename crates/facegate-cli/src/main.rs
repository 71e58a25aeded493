use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use facegate_app::{CaptureContext, CaptureState, Config, PageSession, Submission, Update};
use facegate_client::{ApiClient, HttpTransport};
use facegate_core::preview::{InputKind, SelectedFile};
use facegate_core::render::Tone;
use facegate_core::types::{PhotoId, TrainingParams, UserId};
use facegate_hw::{Camera, SecureContext, V4l2Devices};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

type Session = PageSession<HttpTransport, SecureContext<V4l2Devices>>;

/// Capture attempts while the stream is still warming up.
const CAPTURE_ATTEMPTS: usize = 50;
const CAPTURE_RETRY: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "facegate", about = "facegate face recognition management CLI")]
struct Cli {
    /// Config file (defaults to $FACEGATE_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Backend origin, overrides the config file
    #[arg(long, global = true)]
    api: Option<String>,
    /// Print rendered HTML fragments instead of text
    #[arg(long, global = true)]
    html: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage users
    #[command(subcommand)]
    Users(UserCommand),
    /// Manage a user's training photos
    #[command(subcommand)]
    Photos(PhotoCommand),
    /// Train the recognition model
    #[command(subcommand)]
    Train(TrainCommand),
    /// Show the trained model's metadata
    ModelInfo,
    /// Identify the face in an image
    Predict(ImageSource),
    /// Check a face against a claimed user
    Verify {
        /// Claimed user ID
        #[arg(short, long)]
        user: String,
        #[command(flatten)]
        source: ImageSource,
    },
    /// Log in with a face image and receive a token
    Login {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Inspect or revoke session tokens
    #[command(subcommand)]
    Token(TokenCommand),
    /// Local camera utilities
    #[command(subcommand)]
    Camera(CameraCommand),
}

#[derive(Subcommand)]
enum UserCommand {
    /// List registered users
    List,
    /// Register a new user
    Create {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Change a user's name or email
    Edit {
        id: UserId,
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Delete a user and all of their photos
    Delete {
        id: UserId,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum PhotoCommand {
    /// List a user's photos
    List { user: UserId },
    /// Upload one or more image files
    Upload {
        user: UserId,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Delete one photo
    Delete {
        user: UserId,
        photo: PhotoId,
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum TrainCommand {
    /// Start a training run and wait for it to finish
    Start {
        #[arg(long, default_value_t = 50)]
        epochs: u32,
        #[arg(long, default_value_t = 16)]
        batch_size: u32,
        #[arg(long, default_value_t = 0.2)]
        validation_split: f32,
        /// Continue from the current model
        #[arg(long = "continue")]
        continue_training: bool,
    },
    /// Show training status and per-user readiness
    Status,
}

#[derive(Subcommand)]
enum TokenCommand {
    /// Check whether a token is valid
    Verify { token: String },
    /// Revoke a token
    Logout { token: String },
    /// List a user's active tokens
    List { user: String },
}

#[derive(Subcommand)]
enum CameraCommand {
    /// List V4L2 capture devices
    Devices,
    /// Open the camera, capture one frame and close it
    Test {
        /// Write the captured JPEG here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Capture a photo and enroll it for a user
    Upload {
        #[arg(short, long)]
        user: UserId,
    },
}

#[derive(Args)]
struct ImageSource {
    /// Image file to submit
    #[arg(short, long, conflicts_with = "camera", required_unless_present = "camera")]
    file: Option<PathBuf>,
    /// Capture from the camera instead
    #[arg(short, long)]
    camera: bool,
}

impl ImageSource {
    /// The file to read, or `None` to use the camera.
    fn into_file(self) -> Option<PathBuf> {
        if self.camera {
            None
        } else {
            self.file
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Commands::Camera(CameraCommand::Devices) = cli.command {
        return list_devices();
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(api) = cli.api {
        config.api_base_url = api;
    }
    tracing::debug!(api = %config.api_base_url, device = %config.camera_device, "starting");

    let transport = HttpTransport::new(&config.api_base_url)?;
    let devices = SecureContext::new(
        V4l2Devices::new(config.camera_device.clone(), config.warmup_frames),
        &config.api_base_url,
    );
    let mut session: Session = PageSession::new(ApiClient::new(transport), devices, &config);
    let out = Output { html: cli.html };

    let result = run(&mut session, &out, cli.command).await;
    session.shutdown().await;
    result
}

async fn run(session: &mut Session, out: &Output, command: Commands) -> Result<()> {
    match command {
        Commands::Users(cmd) => users(session, out, cmd).await,
        Commands::Photos(cmd) => photos(session, out, cmd).await,
        Commands::Train(TrainCommand::Start {
            epochs,
            batch_size,
            validation_split,
            continue_training,
        }) => {
            println!("Training... this can take several minutes.");
            let params = TrainingParams {
                epochs,
                batch_size,
                validation_split,
                continue_training,
            };
            out.show(session.dispatch(Submission::StartTraining(params)).await)
        }
        Commands::Train(TrainCommand::Status) => {
            out.show(session.dispatch(Submission::TrainingStatus).await)
        }
        Commands::ModelInfo => out.show(session.dispatch(Submission::ModelInfo).await),
        Commands::Predict(source) => match source.into_file() {
            Some(path) => {
                let files = vec![read_image(&path).await?];
                out.show(session.dispatch(Submission::Predict(files)).await)
            }
            None => camera_submit(session, out, CaptureContext::Prediction, None).await,
        },
        Commands::Verify { user, source } => match source.into_file() {
            Some(path) => {
                let files = vec![read_image(&path).await?];
                let submission = Submission::Verify {
                    claimed_user: user,
                    files,
                };
                out.show(session.dispatch(submission).await)
            }
            None => camera_submit(session, out, CaptureContext::Verification, Some(user)).await,
        },
        Commands::Login { file } => {
            let files = vec![read_image(&file).await?];
            out.show(session.dispatch(Submission::FaceLogin(files)).await)
        }
        Commands::Token(TokenCommand::Verify { token }) => {
            out.show(session.dispatch(Submission::VerifyToken(token)).await)
        }
        Commands::Token(TokenCommand::Logout { token }) => {
            out.show(session.dispatch(Submission::Logout(token)).await)
        }
        Commands::Token(TokenCommand::List { user }) => {
            out.show(session.dispatch(Submission::ActiveTokens(user)).await)
        }
        Commands::Camera(CameraCommand::Devices) => list_devices(),
        Commands::Camera(CameraCommand::Test { output }) => camera_test(session, out, output).await,
        Commands::Camera(CameraCommand::Upload { user }) => {
            out.show(session.dispatch(Submission::SelectUser(Some(user))).await)?;
            camera_submit(session, out, CaptureContext::Enrollment, None).await
        }
    }
}

async fn users(session: &mut Session, out: &Output, cmd: UserCommand) -> Result<()> {
    match cmd {
        UserCommand::List => out.show(session.dispatch(Submission::LoadUsers).await),
        UserCommand::Create {
            name,
            email,
            password,
        } => {
            let submission = Submission::CreateUser {
                name,
                email,
                password,
            };
            out.show(session.dispatch(submission).await)
        }
        UserCommand::Edit {
            id,
            name,
            email,
            password,
        } => {
            out.show(session.dispatch(Submission::OpenEditUser(id)).await)?;
            let submission = Submission::EditUser {
                name,
                email,
                password,
            };
            out.show(session.dispatch(submission).await)
        }
        UserCommand::Delete { id, yes } => {
            let confirmed = yes || confirm("Delete this user? All photos will be removed")?;
            let submission = Submission::DeleteUser {
                user_id: id,
                confirmed,
            };
            out.show(session.dispatch(submission).await)
        }
    }
}

async fn photos(session: &mut Session, out: &Output, cmd: PhotoCommand) -> Result<()> {
    match cmd {
        PhotoCommand::List { user } => {
            out.show(session.dispatch(Submission::SelectUser(Some(user))).await)
        }
        PhotoCommand::Upload { user, files } => {
            // Selecting the user also prints the current photo grid.
            session.dispatch(Submission::SelectUser(Some(user))).await;
            let mut selected = Vec::with_capacity(files.len());
            for path in &files {
                selected.push(read_image(path).await?);
            }
            let (input, upload) = if selected.len() == 1 {
                (InputKind::Single, Submission::UploadSingle)
            } else {
                (InputKind::Multiple, Submission::UploadMultiple)
            };
            session
                .dispatch(Submission::SelectFiles {
                    input,
                    files: selected,
                })
                .await;
            out.show(session.dispatch(upload).await)
        }
        PhotoCommand::Delete { user, photo, yes } => {
            let confirmed = yes || confirm("Delete this photo?")?;
            let submission = Submission::DeletePhoto {
                user_id: user,
                photo_id: photo,
                confirmed,
            };
            out.show(session.dispatch(submission).await)
        }
    }
}

/// Start the context's camera and capture once the stream has a frame.
async fn capture_when_ready(session: &mut Session, ctx: CaptureContext) -> Result<Update> {
    let started = session.dispatch(Submission::StartCamera(ctx)).await;
    if session.camera(ctx).state() == CaptureState::Closed {
        return Err(failure(&started).unwrap_or_else(|| anyhow::anyhow!("camera did not start")));
    }

    let mut attempt = 1;
    loop {
        let update = session.dispatch(Submission::Capture(ctx)).await;
        if session.camera(ctx).state() == CaptureState::Captured {
            return Ok(update);
        }
        if attempt >= CAPTURE_ATTEMPTS || session.camera(ctx).live_tracks() == 0 {
            return Err(failure(&update)
                .unwrap_or_else(|| anyhow::anyhow!("timed out waiting for a frame")));
        }
        tracing::trace!(attempt, "stream not ready yet");
        attempt += 1;
        tokio::time::sleep(CAPTURE_RETRY).await;
    }
}

async fn camera_submit(
    session: &mut Session,
    out: &Output,
    ctx: CaptureContext,
    claimed_user: Option<String>,
) -> Result<()> {
    let captured = capture_when_ready(session, ctx).await?;
    out.show(captured)?;
    let submission = Submission::SubmitCapture {
        context: ctx,
        claimed_user,
    };
    out.show(session.dispatch(submission).await)
}

async fn camera_test(session: &mut Session, out: &Output, output: Option<PathBuf>) -> Result<()> {
    let ctx = CaptureContext::Prediction;
    let captured = capture_when_ready(session, ctx).await?;
    if let Some(image) = session.camera(ctx).captured() {
        println!(
            "Captured {}x{} frame ({} bytes JPEG)",
            image.width,
            image.height,
            image.jpeg.len()
        );
        if let Some(path) = output {
            tokio::fs::write(&path, &image.jpeg[..])
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Saved to {}", path.display());
        }
    }
    if out.html {
        out.show(captured)?;
    }
    session.dispatch(Submission::StopCamera(ctx)).await;
    Ok(())
}

fn list_devices() -> Result<()> {
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("No V4L2 capture devices found");
    }
    for d in devices {
        println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
    }
    Ok(())
}

async fn read_image(path: &Path) -> Result<SelectedFile> {
    SelectedFile::from_path(path)
        .await
        .with_context(|| format!("cannot use {}", path.display()))
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

/// First error notice in an update.
fn failure(update: &Update) -> Option<anyhow::Error> {
    update
        .views
        .iter()
        .filter_map(|v| v.notice())
        .find(|n| n.tone == Tone::Error)
        .map(|n| anyhow::anyhow!(n.text.clone()))
}

struct Output {
    html: bool,
}

impl Output {
    /// Print every non-empty view; fail if any carries an error notice.
    fn show(&self, update: Update) -> Result<()> {
        for view in update.views.iter().filter(|v| !v.is_empty()) {
            if view.notice().is_some_and(|n| n.tone == Tone::Error) {
                continue;
            }
            if self.html {
                println!("<div id=\"{}\">{}</div>", view.target, view.to_html());
            } else {
                print!("{}", view.to_text());
            }
        }
        match failure(&update) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
