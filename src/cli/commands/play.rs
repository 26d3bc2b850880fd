//! The console round: load a queue, pick a backend, then drive the round
//! from single-key commands on stdin.

use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::PlayArgs;
use crate::backend::{
    BackendKind, LocalMediaBackend, PlaybackBackend, PlaybackError, RemoteDeviceBackend, WebApiDevice,
};
use crate::catalog::{CatalogApi, SpotifyClient};
use crate::config::{self, BackendChoice, Config, GameConfiguration, MusicSourceMode};
use crate::error::{Error, Result, ResultExt};
use crate::intake;
use crate::model::Track;
use crate::player::MediaEngine;
use crate::round::{MediaCue, Round, RoundError, RoundEvent, RoundState, RoundStatus, SilentCue, StopCue};
use crate::source;

const HELP: &str = "[s] start  [c] continue  [n] next track  [q] quit";

/// Start a round from the console
pub fn cmd_play(rt: &Runtime, args: &PlayArgs) -> anyhow::Result<()> {
    let mut config = config::load();
    apply_overrides(&mut config, args);

    rt.block_on(async {
        let round = match enter_round(&config).await {
            Ok(round) => round,
            Err(e) if e.is_auth_expired() => {
                anyhow::bail!("{}\nRun `beatstop login-url` to sign in again.", e)
            }
            Err(e) => return Err(e.into()),
        };
        drive(round).await;
        Ok::<(), anyhow::Error>(())
    })
}

/// Fold CLI flags and the token environment variable into `config`.
pub(crate) fn apply_overrides(config: &mut Config, args: &PlayArgs) {
    if let Some(playlist) = &args.playlist {
        config.source.playlist_url = playlist.clone();
        config.source.mode = MusicSourceMode::RemoteService;
    }
    if !args.local.is_empty() {
        config.source.local_paths = args.local.clone();
        config.source.mode = MusicSourceMode::LocalFiles;
    }
    if let Some(token) = &args.token {
        config.credentials.spotify_token = Some(token.clone());
    }
    if let Some(device) = &args.device {
        config.playback.device_name = Some(device.clone());
    }
    if let Some(backend) = args.backend {
        config.playback.backend = backend.into();
    }
    if args.no_shuffle {
        config.game.shuffle = false;
    }
    if let Some(seconds) = args.auto_resume {
        config.game.auto_resume = true;
        config.game.pause_duration = seconds;
    }
    if let Some(min) = args.min {
        config.game.min_stop_seconds = min;
    }
    if let Some(max) = args.max {
        config.game.max_stop_seconds = max;
    }
}

/// Which backend a round will use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BackendPlan {
    Local,
    Remote { device_name: String },
}

/// Decide the backend for a round.
///
/// Local files always use the local backend. Playlists use the remote
/// device when one is named (or explicitly asked for), preview clips
/// otherwise.
pub(crate) fn plan_backend(
    mode: MusicSourceMode,
    choice: BackendChoice,
    device_name: Option<&str>,
) -> std::result::Result<BackendPlan, PlaybackError> {
    let device_name = device_name.map(str::trim).filter(|n| !n.is_empty());
    match (mode, choice) {
        (MusicSourceMode::LocalFiles, _) | (_, BackendChoice::LocalMedia) => Ok(BackendPlan::Local),
        (MusicSourceMode::RemoteService, BackendChoice::Auto) => Ok(match device_name {
            Some(name) => BackendPlan::Remote {
                device_name: name.to_string(),
            },
            None => BackendPlan::Local,
        }),
        (MusicSourceMode::RemoteService, BackendChoice::RemoteDevice) => device_name
            .map(|name| BackendPlan::Remote {
                device_name: name.to_string(),
            })
            .ok_or_else(|| {
                PlaybackError::InitFailed("the remote backend needs a device name (--device)".into())
            }),
    }
}

/// Resolve the queue and build everything the round needs.
async fn enter_round(config: &Config) -> Result<Round> {
    let local_tracks: Vec<Track> = if config.source.mode == MusicSourceMode::LocalFiles {
        intake::intake_async(config.source.local_paths.clone()).await?
    } else {
        Vec::new()
    };
    let game = GameConfiguration::from_config(config, local_tracks);
    game.validate()?;

    let catalog: Arc<dyn CatalogApi> = Arc::new(
        SpotifyClient::new().with_fallback_preview(config.playback.fallback_preview()),
    );

    let mut rng = rand::rng();
    let queue = source::resolve_queue(&game, catalog.as_ref(), &mut rng)
        .await
        .with_context("Loading tracks")?;
    println!("Loaded {} tracks", queue.len());

    let plan = plan_backend(
        game.music_source_mode,
        game.backend,
        config.playback.device_name.as_deref(),
    )?;
    let backend = build_backend(&plan, config, &game, catalog)?;
    let cue = build_cue(config, &game);

    Ok(Round::new(game, queue, backend, cue)?)
}

fn build_backend(
    plan: &BackendPlan,
    config: &Config,
    game: &GameConfiguration,
    catalog: Arc<dyn CatalogApi>,
) -> Result<Box<dyn PlaybackBackend>> {
    match plan {
        BackendPlan::Local => {
            let engine = MediaEngine::new().map_err(|e| Error::from(e).context("Opening audio output"))?;
            info!("Using the local media backend");
            Ok(Box::new(LocalMediaBackend::new(engine)))
        }
        BackendPlan::Remote { device_name } => {
            let credential = game
                .session_credential()
                .ok_or(PlaybackError::AuthExpired)?
                .to_string();
            let (device, sdk_events) = WebApiDevice::connect(
                Arc::clone(&catalog),
                credential.clone(),
                device_name.clone(),
                config.playback.device_poll_interval(),
            );
            info!("Using remote device \"{}\"", device_name);
            Ok(Box::new(RemoteDeviceBackend::connect(
                Arc::new(device),
                sdk_events,
                catalog,
                credential,
                config.playback.ready_timeout(),
            )))
        }
    }
}

fn build_cue(config: &Config, game: &GameConfiguration) -> Box<dyn StopCue> {
    match MediaCue::new(game.theme, config.playback.cue_volume) {
        Ok(cue) => Box::new(cue),
        Err(e) => {
            warn!("Stop sound unavailable: {}", e);
            Box::new(SilentCue)
        }
    }
}

// ============================================================================
// Console driver
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Key {
    Start,
    Continue,
    Next,
    Quit,
}

pub(crate) fn parse_key(line: &str) -> Option<Key> {
    match line.trim().to_ascii_lowercase().as_str() {
        "s" | "start" => Some(Key::Start),
        "c" | "continue" => Some(Key::Continue),
        "n" | "next" | "skip" => Some(Key::Next),
        "q" | "quit" | "exit" => Some(Key::Quit),
        _ => None,
    }
}

/// One line describing the round.
pub(crate) fn describe(state: &RoundState, track: &Track) -> String {
    let now = format!(
        "#{} \"{}\" by {}",
        state.current_track_index + 1,
        track.display_name,
        track.display_artist
    );
    match state.status {
        RoundStatus::Idle => format!("Ready: {}", now),
        RoundStatus::Playing => format!("Playing: {}", now),
        RoundStatus::PausedManual => "STOP! Press [c] to continue".to_string(),
        RoundStatus::PausedAuto => format!(
            "STOP! Resuming in {}s",
            state.resume_countdown_seconds.unwrap_or(0)
        ),
    }
}

enum Input {
    Line(Option<String>),
    Event(Option<RoundEvent>),
    Interrupt,
}

/// Print the outcome of an action. Returns false when the round has to end.
fn report(result: std::result::Result<(), RoundError>) -> bool {
    let Err(err) = result else {
        return true;
    };
    println!("Error: {}", err);
    if err.requires_exit() {
        println!("Your session expired. Run `beatstop login-url` to sign in again.");
        return false;
    }
    if matches!(err, RoundError::Playback(PlaybackError::PremiumRequired)) {
        println!("Full tracks need Premium. Try `--backend local` to play preview clips.");
    }
    true
}

/// Start the round unless `interrupt` resolves first. Returns false when
/// interrupted or when the round has to end.
async fn start_or_interrupt<F: Future>(round: &mut Round, interrupt: F) -> bool {
    if round.backend_kind() == Some(BackendKind::RemoteDevice) {
        println!("Waiting for the player... (Ctrl-C to give up)");
    }
    tokio::select! {
        result = round.start() => report(result),
        _ = interrupt => false,
    }
}

fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn drive(mut round: Round) {
    let mut states = round.subscribe();
    let mut lines = spawn_stdin_reader();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    println!("{}", describe(&round.state(), round.current_track()));
    println!("{}", HELP);

    loop {
        let input = tokio::select! {
            line = lines.recv() => Input::Line(line),
            event = round.next_event() => Input::Event(event),
            _ = &mut ctrl_c => Input::Interrupt,
        };

        let keep_going = match input {
            Input::Line(None) | Input::Interrupt | Input::Event(None) => false,
            Input::Line(Some(line)) => match parse_key(&line) {
                Some(Key::Start) => start_or_interrupt(&mut round, ctrl_c.as_mut()).await,
                Some(Key::Continue) => report(round.continue_playing().await),
                Some(Key::Next) => report(round.skip().await),
                Some(Key::Quit) => false,
                None => {
                    println!("{}", HELP);
                    true
                }
            },
            Input::Event(Some(event)) => report(round.handle(event).await),
        };

        if states.has_changed().unwrap_or(false) {
            let state = states.borrow_and_update().clone();
            debug!("State changed: {:?}", state);
            println!("{}", describe(&state, round.queue().get(state.current_track_index)));
        }

        if !keep_going {
            break;
        }
    }

    round.exit().await;
    println!("Bye!");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SdkEvent;
    use crate::catalog::traits::mocks::MockCatalog;
    use crate::model::Queue;
    use crate::test_utils::{FakeDeviceSdk, mock_tracks, remote_tracks};
    use std::time::Duration;

    #[test]
    fn test_overrides_win_over_file() {
        let mut config = Config::default();
        let args = PlayArgs {
            playlist: Some("spotify:playlist:37i9dQZF1DXcBWIGoYBM5M".into()),
            token: Some("tok".into()),
            device: Some("Kitchen".into()),
            backend: Some(super::super::BackendArg::Remote),
            no_shuffle: true,
            auto_resume: Some(3),
            min: Some(2),
            max: Some(4),
            ..Default::default()
        };
        apply_overrides(&mut config, &args);

        assert_eq!(config.source.mode, MusicSourceMode::RemoteService);
        assert_eq!(config.credentials.spotify_token.as_deref(), Some("tok"));
        assert_eq!(config.playback.device_name.as_deref(), Some("Kitchen"));
        assert_eq!(config.playback.backend, BackendChoice::RemoteDevice);
        assert!(!config.game.shuffle);
        assert!(config.game.auto_resume);
        assert_eq!(config.game.pause_duration, 3);
        assert_eq!((config.game.min_stop_seconds, config.game.max_stop_seconds), (2, 4));
    }

    #[test]
    fn test_local_paths_switch_mode() {
        let mut config = Config::default();
        let args = PlayArgs {
            local: vec!["music".into()],
            ..Default::default()
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.source.mode, MusicSourceMode::LocalFiles);
        assert_eq!(config.source.local_paths, vec![std::path::PathBuf::from("music")]);
        // Untouched settings keep the file's values
        assert!(config.game.shuffle);
    }

    #[test]
    fn test_backend_plan() {
        use BackendChoice::*;
        use MusicSourceMode::*;

        assert_eq!(plan_backend(LocalFiles, RemoteDevice, Some("tv")), Ok(BackendPlan::Local));
        assert_eq!(plan_backend(RemoteService, Auto, None), Ok(BackendPlan::Local));
        assert_eq!(plan_backend(RemoteService, Auto, Some("  ")), Ok(BackendPlan::Local));
        assert_eq!(
            plan_backend(RemoteService, Auto, Some("tv")),
            Ok(BackendPlan::Remote {
                device_name: "tv".into()
            })
        );
        assert_eq!(plan_backend(RemoteService, LocalMedia, Some("tv")), Ok(BackendPlan::Local));
        assert!(matches!(
            plan_backend(RemoteService, RemoteDevice, None),
            Err(PlaybackError::InitFailed(_))
        ));
    }

    #[test]
    fn test_keys() {
        assert_eq!(parse_key("s\n"), Some(Key::Start));
        assert_eq!(parse_key(" C "), Some(Key::Continue));
        assert_eq!(parse_key("skip"), Some(Key::Next));
        assert_eq!(parse_key("q"), Some(Key::Quit));
        assert_eq!(parse_key("x"), None);
    }

    #[test]
    fn test_describe() {
        let track = &mock_tracks(1)[0];
        let mut state = RoundState::idle_at(0);
        assert_eq!(describe(&state, track), "Ready: #1 \"Song 0\" by Test Artist");

        state.status = RoundStatus::PausedAuto;
        state.resume_countdown_seconds = Some(3);
        assert_eq!(describe(&state, track), "STOP! Resuming in 3s");
    }

    fn remote_round(ready_id: Option<&str>) -> (Round, mpsc::UnboundedSender<SdkEvent>) {
        let (sdk_tx, sdk_rx) = mpsc::unbounded_channel();
        if let Some(id) = ready_id {
            sdk_tx
                .send(SdkEvent::Ready {
                    device_id: id.into(),
                })
                .unwrap();
        }
        let backend = RemoteDeviceBackend::connect(
            Arc::new(FakeDeviceSdk::default()),
            sdk_rx,
            Arc::new(MockCatalog::with_tracks(vec![])),
            "token",
            Duration::from_secs(15),
        );
        let queue = Queue::new(remote_tracks(2)).unwrap();
        let round = Round::new(
            GameConfiguration::default(),
            queue,
            Box::new(backend),
            Box::new(SilentCue),
        )
        .unwrap();
        // Callers keep the sender so the device stays "connecting"
        (round, sdk_tx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_while_waiting_for_device() {
        let (mut round, _sdk) = remote_round(None);
        let t0 = tokio::time::Instant::now();

        let keep_going =
            start_or_interrupt(&mut round, tokio::time::sleep(Duration::from_secs(1))).await;
        assert!(!keep_going);
        assert_eq!(t0.elapsed(), Duration::from_secs(1));
        assert_eq!(round.state().status, RoundStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_wins_when_not_interrupted() {
        let (mut round, _sdk) = remote_round(Some("dev-1"));

        let keep_going = start_or_interrupt(&mut round, std::future::pending::<()>()).await;
        assert!(keep_going);
        assert_eq!(round.state().status, RoundStatus::Playing);
    }

    #[test]
    fn test_report_ends_round_only_on_expired_session() {
        assert!(report(Ok(())));
        assert!(report(Err(RoundError::Playback(PlaybackError::PremiumRequired))));
        assert!(!report(Err(RoundError::Playback(PlaybackError::AuthExpired))));
    }
}
