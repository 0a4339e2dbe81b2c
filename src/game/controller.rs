//! Game state controller: the imperative shell around [`GameEngine`].
//!
//! The controller owns everything the engine must not touch: the ticker task,
//! the dialogue gateway, the catalog loader and the session recorder. All
//! mutations go through one synchronous `dispatch` that holds the engine lock
//! only while applying an event. Gateway and storage calls are awaited with
//! the lock released, and their results come back as events.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::engine::{Effect, GameEngine, GameEvent, Transition};
use super::timer::SessionTimer;
use super::types::GamePhase;
use super::view::GameView;
use crate::catalog::{CatalogLoader, Channel};
use crate::dialogue::{DialogueGateway, DialogueGenerator};
use crate::recorder::SessionRecorder;
use crate::storage::Storage;
use crate::tracks::TrackConfig;

/// Drives one player's games on one track.
#[derive(Clone)]
pub struct GameController {
    shared: Arc<Shared>,
}

struct Shared {
    engine: Mutex<GameEngine>,
    track: Arc<TrackConfig>,
    gateway: DialogueGateway,
    catalog: CatalogLoader,
    recorder: SessionRecorder,
    timer: Mutex<Option<SessionTimer>>,
    persist: Mutex<Vec<JoinHandle<()>>>,
    views: watch::Sender<GameView>,
}

impl GameController {
    /// Create a controller for `track`. `user_id` is the caller identity, if any.
    pub fn new(
        track: TrackConfig,
        user_id: Option<String>,
        generator: Arc<dyn DialogueGenerator>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let track = Arc::new(track);
        let engine = GameEngine::new(track.clone(), user_id);
        let (views, _) = watch::channel(engine.view());

        Self {
            shared: Arc::new(Shared {
                engine: Mutex::new(engine),
                track,
                gateway: DialogueGateway::new(generator),
                catalog: CatalogLoader::new(storage.clone()),
                recorder: SessionRecorder::new(storage),
                timer: Mutex::new(None),
                persist: Mutex::new(Vec::new()),
                views,
            }),
        }
    }

    /// Load the catalog for tracks without a channel choice.
    ///
    /// Channel-sensitive tracks load theirs on [`GameController::select_channel`].
    pub async fn mount(&self) {
        if self.shared.track.channel_sensitive {
            return;
        }
        Shared::drive(&self.shared, vec![Effect::LoadCatalog { channel: None }]).await;
    }

    /// Choose the outreach channel and load its catalog.
    pub async fn select_channel(&self, channel: Channel) -> Transition {
        Shared::run(&self.shared, GameEvent::SelectChannel(channel)).await
    }

    /// Start a game against a persona. Returns once the opening turn is ready.
    pub async fn start_game(&self, persona_id: &str, script_id: Option<&str>) -> Transition {
        let event = GameEvent::StartGame {
            persona_id: persona_id.to_string(),
            script_id: script_id.map(str::to_string),
        };
        Shared::run(&self.shared, event).await
    }

    /// Answer the current turn with the option at `index`. Returns once the
    /// next turn is ready or the game has ended.
    pub async fn handle_response(&self, index: usize) -> Transition {
        Shared::run(&self.shared, GameEvent::ChooseOption(index)).await
    }

    /// Advance the session clock by one second.
    ///
    /// The controller ticks itself while a game is playing; this is exposed for
    /// callers that drive time explicitly.
    pub fn tick(&self) -> Transition {
        Shared::dispatch(&self.shared, GameEvent::Tick).0
    }

    /// Return to the selection screens after a finished game.
    pub fn reset(&self) -> Transition {
        Shared::dispatch(&self.shared, GameEvent::Reset).0
    }

    /// Current state of the game.
    pub fn view(&self) -> GameView {
        self.shared.views.borrow().clone()
    }

    /// Receive every new view as the game changes.
    pub fn subscribe(&self) -> watch::Receiver<GameView> {
        self.shared.views.subscribe()
    }

    /// The track being played.
    pub fn track(&self) -> &TrackConfig {
        &self.shared.track
    }

    /// Access persisted sessions.
    pub fn recorder(&self) -> &SessionRecorder {
        &self.shared.recorder
    }

    /// True while the session clock is running.
    pub fn is_timer_running(&self) -> bool {
        lock(&self.shared.timer)
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Wait until every pending session write has finished.
    pub async fn wait_persisted(&self) {
        let handles: Vec<JoinHandle<()>> = lock(&self.shared.persist).drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                debug!(error = %e, "Session write task ended abnormally");
            }
        }
    }
}

impl Shared {
    /// Apply an event and perform its immediate effects.
    ///
    /// Returns the transition and the effects that must be awaited.
    fn dispatch(shared: &Arc<Shared>, event: GameEvent) -> (Transition, Vec<Effect>) {
        let name = event.name();
        let (transition, view) = {
            let mut engine = lock(&shared.engine);
            let transition = engine.handle(event);
            (transition, engine.view())
        };

        let effects = match &transition {
            Transition::Ignored(reason) => {
                debug!(event = name, reason = ?reason, "Event ignored");
                return (transition, Vec::new());
            }
            Transition::Applied(effects) => effects.clone(),
        };

        shared.views.send_replace(view);

        let mut deferred = Vec::new();
        for effect in effects {
            match effect {
                Effect::StartTimer => Shared::start_timer(shared),
                Effect::StopTimer => {
                    if let Some(timer) = lock(&shared.timer).take() {
                        timer.stop();
                    }
                }
                Effect::ScheduleFeedbackClear { seq, after } => {
                    let weak = Arc::downgrade(shared);
                    tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        if let Some(shared) = weak.upgrade() {
                            Shared::dispatch(&shared, GameEvent::ClearFeedback { seq });
                        }
                    });
                }
                Effect::FinalizeSession {
                    session_id,
                    outcome,
                } => {
                    let recorder = shared.recorder.clone();
                    let handle = tokio::spawn(async move {
                        recorder.finalize(session_id.as_deref(), &outcome).await;
                    });
                    lock(&shared.persist).push(handle);
                }
                other => deferred.push(other),
            }
        }

        (transition, deferred)
    }

    /// Dispatch an event, then await its deferred effects.
    async fn run(shared: &Arc<Shared>, event: GameEvent) -> Transition {
        let (transition, deferred) = Shared::dispatch(shared, event);
        Shared::drive(shared, deferred).await;
        transition
    }

    /// Perform awaited effects in order, feeding results back as events.
    async fn drive(shared: &Arc<Shared>, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();

        while let Some(effect) = queue.pop_front() {
            let event = match effect {
                Effect::LoadCatalog { channel } => {
                    let catalog = shared.catalog.load(&shared.track.key, channel).await;
                    GameEvent::CatalogLoaded { channel, catalog }
                }
                Effect::OpenSession {
                    play_id,
                    user_id,
                    persona_id,
                    track_key,
                } => {
                    let opened = shared
                        .recorder
                        .open(user_id.as_deref(), &persona_id, &track_key)
                        .await;
                    match opened {
                        Some(session_id) => GameEvent::SessionOpened {
                            play_id,
                            session_id,
                        },
                        None => continue,
                    }
                }
                Effect::RequestTurn { ticket, context } => {
                    if lock(&shared.engine).pending_ticket() != Some(ticket) {
                        debug!(turn = ticket.turn, "Skipping superseded dialogue request");
                        continue;
                    }
                    let reply = shared
                        .gateway
                        .request_turn(&context, &shared.track.fallback)
                        .await;
                    GameEvent::TurnResolved { ticket, reply }
                }
                other => {
                    debug!(effect = ?other, "Unexpected deferred effect");
                    continue;
                }
            };

            let (_, more) = Shared::dispatch(shared, event);
            queue.extend(more);
        }
    }

    fn start_timer(shared: &Arc<Shared>) {
        let weak: Weak<Shared> = Arc::downgrade(shared);
        let timer = SessionTimer::start(move || {
            let Some(shared) = weak.upgrade() else {
                return false;
            };
            Shared::dispatch(&shared, GameEvent::Tick);
            let phase = lock(&shared.engine).phase();
            phase == GamePhase::Playing
        });

        info!(
            track = %shared.track.key,
            duration_secs = shared.track.duration_secs,
            "Session timer started"
        );
        if let Some(previous) = lock(&shared.timer).replace(timer) {
            previous.stop();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Difficulty, Persona, Stage};
    use crate::dialogue::{
        DialogueReply, MockDialogueGenerator, ResponseOption, ResponseQuality,
    };
    use crate::error::DialogueError;
    use crate::game::EndReason;
    use crate::storage::MockStorage;
    use std::time::Duration;

    fn stages(track: &str, n: usize) -> Vec<Stage> {
        (0..n)
            .map(|i| Stage {
                id: format!("stage-{}", i),
                track_key: track.to_string(),
                key: format!("stage_{}", i),
                order: i as i32,
                label: format!("Stage {}", i),
                tips: None,
                channel: None,
            })
            .collect()
    }

    fn persona(track: &str) -> Persona {
        Persona {
            id: "p-1".to_string(),
            track_key: track.to_string(),
            name: "Dana Reyes".to_string(),
            personality: "skeptical".to_string(),
            role: "VP Operations".to_string(),
            company: "Northwind Freight".to_string(),
            pain_points: vec![],
            decision_factors: vec![],
            difficulty: Difficulty::Medium,
            channel: None,
            active: true,
        }
    }

    fn catalog_storage(track: &'static str, n: usize) -> MockStorage {
        let mut storage = MockStorage::new();
        storage
            .expect_list_stages()
            .returning(move |_, _| Ok(stages(track, n)));
        storage
            .expect_list_personas()
            .returning(move |_, _| Ok(vec![persona(track)]));
        storage.expect_list_scripts().returning(|_, _| Ok(vec![]));
        storage
    }

    fn good_generator() -> MockDialogueGenerator {
        let mut generator = MockDialogueGenerator::new();
        generator.expect_generate().returning(|_| {
            Ok(DialogueReply {
                utterance: "Tell me more.".to_string(),
                options: vec![
                    ResponseOption::new("Great question", ResponseQuality::Optimal, 10, 80)
                        .with_feedback("Nice"),
                    ResponseOption::new("Buy now", ResponseQuality::Poor, -10, 5),
                ],
                hint: None,
            })
        });
        generator
    }

    fn short_track() -> TrackConfig {
        let mut track = TrackConfig::sdr();
        track.duration_secs = 3;
        track.feedback_display_ms = 500;
        track
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_game_presents_opening_turn() {
        let mut storage = catalog_storage("sdr", 3);
        storage
            .expect_create_game_session()
            .times(1)
            .returning(|_| Ok(()));

        let controller = GameController::new(
            short_track(),
            Some("user-1".to_string()),
            Arc::new(good_generator()),
            Arc::new(storage),
        );
        controller.mount().await;
        assert_eq!(controller.view().personas.len(), 1);

        let transition = controller.start_game("p-1", None).await;
        assert!(transition.is_applied());

        let view = controller.view();
        assert_eq!(view.phase, GamePhase::Playing);
        assert_eq!(view.transcript.len(), 1);
        assert_eq!(view.options.len(), 2);
        assert!(!view.is_generating);
        assert!(view.session_id.is_some());
        assert!(controller.is_timer_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_generator_keeps_game_playable() {
        let mut generator = MockDialogueGenerator::new();
        generator
            .expect_generate()
            .returning(|_| Err(DialogueError::Timeout { timeout_ms: 30000 }));

        let controller = GameController::new(
            short_track(),
            None,
            Arc::new(generator),
            Arc::new(catalog_storage("sdr", 3)),
        );
        controller.mount().await;
        controller.start_game("p-1", None).await;

        let view = controller.view();
        assert!(!view.is_generating);
        assert!(!view.options.is_empty());
        assert_eq!(view.transcript[0].text, controller.track().fallback.opening);

        assert!(controller.handle_response(0).await.is_applied());
        assert_eq!(controller.view().stage_index, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_game_finalizes_once() {
        let mut storage = catalog_storage("sdr", 2);
        storage
            .expect_create_game_session()
            .times(1)
            .returning(|_| Ok(()));
        storage
            .expect_complete_game_session()
            .withf(|_, c| c.total_score == 160 && c.sale_closed && c.final_rapport == 60)
            .times(1)
            .returning(|_, _| Ok(()));

        let controller = GameController::new(
            short_track(),
            Some("user-1".to_string()),
            Arc::new(good_generator()),
            Arc::new(storage),
        );
        controller.mount().await;
        controller.start_game("p-1", None).await;
        controller.handle_response(0).await;
        controller.handle_response(0).await;

        let view = controller.view();
        assert_eq!(view.phase, GamePhase::Results);
        assert_eq!(view.end_reason, Some(EndReason::Completed));
        assert!(view.commitment);
        assert!(view.summary.is_some());
        assert!(!controller.is_timer_running());

        assert!(!controller.handle_response(0).await.is_applied());
        controller.wait_persisted().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_ends_game_and_stops() {
        let mut storage = catalog_storage("sdr", 3);
        storage
            .expect_create_game_session()
            .returning(|_| Ok(()));
        storage
            .expect_complete_game_session()
            .withf(|_, c| !c.sale_closed && c.time_spent_seconds == 3)
            .times(1)
            .returning(|_, _| Ok(()));

        let controller = GameController::new(
            short_track(),
            Some("user-1".to_string()),
            Arc::new(good_generator()),
            Arc::new(storage),
        );
        controller.mount().await;
        controller.start_game("p-1", None).await;

        tokio::time::sleep(Duration::from_millis(3500)).await;

        let view = controller.view();
        assert_eq!(view.phase, GamePhase::Results);
        assert_eq!(view.end_reason, Some(EndReason::TimedOut));
        assert_eq!(view.time_left, 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(controller.view().time_spent, 3);
        controller.wait_persisted().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_feedback_clears_after_display_time() {
        let controller = GameController::new(
            short_track(),
            None,
            Arc::new(good_generator()),
            Arc::new(catalog_storage("sdr", 3)),
        );
        controller.mount().await;
        controller.start_game("p-1", None).await;
        controller.handle_response(0).await;
        assert!(controller.view().feedback.is_some());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(controller.view().feedback.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_phase_changes() {
        let controller = GameController::new(
            TrackConfig::cold_outreach(),
            None,
            Arc::new(good_generator()),
            Arc::new(catalog_storage("cold_outreach", 2)),
        );
        let mut views = controller.subscribe();
        assert_eq!(views.borrow().phase, GamePhase::ChannelSelect);

        controller.select_channel(Channel::Linkedin).await;

        assert!(views.has_changed().unwrap());
        let view = views.borrow_and_update().clone();
        assert_eq!(view.phase, GamePhase::PersonaSelect);
        assert_eq!(view.channel, Some(Channel::Linkedin));
        assert_eq!(view.personas.len(), 1);
    }
}
