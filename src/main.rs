//! Tower Blocks entry point
//!
//! Web: wires the DOM to the game and runs the frame loop.
//! Native: plays scripted runs against the in-memory chain.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::spawn_local;
    use web_sys::{Document, Element};

    use tower_blocks::chain::client::RefreshScope;
    use tower_blocks::chain::{
        ChainClient, ScoreSigner, WalletProvider, format_address, format_avax,
    };
    use tower_blocks::platform::{self, AnyWallet, BridgeReader, HttpScoreSigner};
    use tower_blocks::{BestScore, FrameClock, Game, GamePhase, Settings};

    type Client = ChainClient<AnyWallet, HttpScoreSigner, BridgeReader>;

    /// Everything the frame loop and the DOM callbacks share
    struct App {
        game: Rc<RefCell<Game>>,
        clock: RefCell<FrameClock>,
        client: Rc<Client>,
        /// Last error shown under the choice buttons
        status: RefCell<Option<String>>,
    }

    fn document() -> Option<Document> {
        web_sys::window()?.document()
    }

    fn set_text(document: &Document, id: &str, text: &str) {
        if let Some(el) = document.get_element_by_id(id) {
            el.set_text_content(Some(text));
        }
    }

    fn set_visible(el: &Element, visible: bool) {
        let _ = el.class_list().toggle_with_force("hidden", !visible);
    }

    fn set_enabled(document: &Document, id: &str, enabled: bool) {
        if let Some(el) = document.get_element_by_id(id) {
            if enabled {
                let _ = el.remove_attribute("disabled");
            } else {
                let _ = el.set_attribute("disabled", "");
            }
        }
    }

    pub async fn run() {
        console_error_panic_hook::set_once();
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::error_1(&format!("Logger init failed: {}", e).into());
        }

        log::info!("Tower Blocks starting...");

        let settings = Settings::load();
        let seed = js_sys::Date::now() as u64;
        let game = Rc::new(RefCell::new(Game::new(seed, BestScore::load())));
        let client = Rc::new(ChainClient::new(
            AnyWallet::detect(),
            HttpScoreSigner::new(&settings),
            BridgeReader::detect(),
            settings.clone(),
        ));
        log::info!(
            "Game initialized with seed {} on {}",
            seed,
            settings.network_name()
        );

        let app = Rc::new(App {
            game,
            clock: RefCell::new(FrameClock::new()),
            client,
            status: RefCell::new(None),
        });

        {
            let client = app.client.clone();
            spawn_local(async move {
                if !client.signer().health().await {
                    log::warn!("Score signing service is not responding");
                }
            });
        }

        setup_input_handlers(app.clone());
        setup_choice_buttons(app.clone());
        setup_auto_pause(app.clone());
        spawn_refresh_loop(app.clone(), settings.refresh_interval_ms);

        if let Some(loading) = document().and_then(|d| d.get_element_by_id("loading")) {
            set_visible(&loading, false);
        }

        request_animation_frame(app);
        log::info!("Tower Blocks running!");
    }

    fn setup_input_handlers(app: Rc<App>) {
        let Some(document) = document() else {
            return;
        };

        // Space / Enter
        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: web_sys::KeyboardEvent| {
                if event.code() == "Space" || event.code() == "Enter" {
                    event.prevent_default();
                    app.game.borrow_mut().press();
                }
            });
            let _ = document
                .add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Tap / click on the canvas
        if let Some(canvas) = document.get_element_by_id("canvas") {
            let closure = Closure::<dyn FnMut(_)>::new(move |event: web_sys::PointerEvent| {
                event.prevent_default();
                app.game.borrow_mut().press();
            });
            let _ = canvas
                .add_event_listener_with_callback("pointerdown", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn on_click(document: &Document, id: &str, handler: impl FnMut(web_sys::MouseEvent) + 'static) {
        if let Some(btn) = document.get_element_by_id(id) {
            let closure = Closure::<dyn FnMut(_)>::new(handler);
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_choice_buttons(app: Rc<App>) {
        let Some(document) = document() else {
            return;
        };

        {
            let app = app.clone();
            on_click(&document, "buy-life-btn", move |_| {
                let app = app.clone();
                spawn_local(async move {
                    let result = app.client.buy_continuation(&app.game).await;
                    *app.status.borrow_mut() = result.err().map(|e| e.to_string());
                });
            });
        }

        {
            let app = app.clone();
            on_click(&document, "submit-score-btn", move |_| {
                let app = app.clone();
                spawn_local(async move {
                    let result = app.client.submit_score(&app.game).await;
                    *app.status.borrow_mut() = result.err().map(|e| e.to_string());
                });
            });
        }

        {
            let app = app.clone();
            // Never blocked by an outstanding intent; a late confirmation is dropped
            on_click(&document, "try-again-btn", move |_| {
                *app.status.borrow_mut() = None;
                app.game.borrow_mut().abandon();
            });
        }

        on_click(&document, "withdraw-prize-btn", move |_| {
            let app = app.clone();
            spawn_local(async move {
                match app.client.withdraw_prize(&app.game).await {
                    Ok(receipt) => log::info!("Prize withdrawn in {}", receipt.hash),
                    Err(e) => *app.status.borrow_mut() = Some(e.to_string()),
                }
            });
        });
    }

    fn setup_auto_pause(app: Rc<App>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let Some(document) = window.document() else {
            return;
        };

        // Visibility change (tab switch, minimize)
        {
            let app = app.clone();
            let document_clone = document.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                let mut clock = app.clock.borrow_mut();
                if document_clone.visibility_state() == web_sys::VisibilityState::Hidden {
                    clock.pause();
                    log::info!("Auto-paused (tab hidden)");
                } else {
                    clock.resume();
                }
            });
            let _ = document.add_event_listener_with_callback(
                "visibilitychange",
                closure.as_ref().unchecked_ref(),
            );
            closure.forget();
        }

        // Window blur / focus
        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::FocusEvent| {
                app.clock.borrow_mut().pause();
            });
            let _ = window.add_event_listener_with_callback("blur", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::FocusEvent| {
                app.clock.borrow_mut().resume();
            });
            let _ = window.add_event_listener_with_callback("focus", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn spawn_refresh_loop(app: Rc<App>, interval_ms: u32) {
        spawn_local(async move {
            loop {
                if app.client.wallet().address().is_some() {
                    if let Err(e) = app.client.refresh(&app.game, RefreshScope::All).await {
                        log::warn!("Background refresh failed: {}", e);
                    }
                }
                platform::sleep(interval_ms).await;
            }
        });
    }

    fn request_animation_frame(app: Rc<App>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |time: f64| {
            game_loop(app, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(app: Rc<App>, time: f64) {
        let dt = app.clock.borrow_mut().advance(time);
        if let Some(dt) = dt {
            app.game.borrow_mut().update(dt);
        }

        {
            let game = app.game.borrow();
            match serde_json::to_string(&game.snapshot()) {
                Ok(json) => platform::render(&json),
                Err(e) => log::error!("Snapshot serialization failed: {}", e),
            }
        }
        update_hud(&app);

        request_animation_frame(app);
    }

    /// Update HUD and choice modal in the DOM
    fn update_hud(app: &App) {
        let Some(document) = document() else {
            return;
        };
        let game = app.game.borrow();
        let client = &app.client;

        set_text(&document, "hud-score", &game.score().to_string());
        set_text(&document, "hud-best", &game.best().to_string());

        let account = client.wallet().address();
        set_text(
            &document,
            "hud-wallet",
            &account.map(|a| format_address(&a)).unwrap_or_default(),
        );

        let awaiting = game.phase() == GamePhase::AwaitingChoice;
        if let Some(modal) = document.get_element_by_id("choice-modal") {
            set_visible(&modal, awaiting);
        }
        if let Some(hint) = document.get_element_by_id("start-hint") {
            set_visible(&hint, game.phase() == GamePhase::Idle);
        }

        let pending = client.pending_intent();
        let idle = pending.is_none();
        set_enabled(&document, "buy-life-btn", awaiting && idle && account.is_some());
        set_enabled(&document, "submit-score-btn", awaiting && idle);
        set_enabled(&document, "try-again-btn", awaiting);
        set_text(
            &document,
            "choice-status",
            &match (pending, app.status.borrow().as_deref()) {
                (Some(kind), _) => format!("Waiting for {}...", kind),
                (None, Some(err)) => err.to_string(),
                (None, None) => String::new(),
            },
        );
        set_text(
            &document,
            "extra-life-price",
            &format!("{} AVAX", format_avax(client.settings().extra_life_price_wei)),
        );

        let view = client.view();
        if let Some(el) = document.get_element_by_id("withdraw-prize-btn") {
            set_visible(&el, view.has_pending_prize());
        }
        if let Some(board) = &view.leaderboard {
            let lines: Vec<String> = board
                .entries()
                .enumerate()
                .map(|(i, (player, score))| {
                    format!("{}. {} {}", i + 1, format_address(player), score)
                })
                .collect();
            set_text(&document, "leaderboard", &lines.join("\n"));
        }
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() {
    wasm_game::run().await;
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Tower Blocks (native) starting...");
    log::info!("Native mode plays against an in-memory chain - use `trunk serve` for the web version");

    if let Err(e) = pollster::block_on(demo::run()) {
        log::error!("Demo failed: {}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use std::cell::RefCell;

    use tower_blocks::chain::client::RefreshScope;
    use std::error::Error;

    use tower_blocks::chain::{Address, ChainClient, DevChain, format_address, format_avax};
    use tower_blocks::{BestScore, Game, GamePhase, Settings};

    const SEED: u64 = 0x70_3e_b1;

    /// Frames the bot may wait for one placement
    const MAX_FRAMES_PER_ROW: u32 = 10_000;

    /// Release whenever the mover passes `offset` px off the block below;
    /// the tower shrinks by `offset` per row until a drop misses
    fn play_until_game_over(game: &RefCell<Game>, offset: f32) -> u64 {
        let mut g = game.borrow_mut();
        if g.phase() == GamePhase::Idle {
            g.press();
        }
        let mut sign = 1.0;
        while g.phase() != GamePhase::AwaitingChoice {
            let session = g.session();
            let below = &session.blocks[session.blocks.len() - 2];
            let target = below.x + sign * offset;
            let mut frames = 0;
            while g.phase() == GamePhase::Running {
                let Some(mover) = g.session().mover() else {
                    break;
                };
                if (mover.x - target).abs() <= g.session().speed || frames > MAX_FRAMES_PER_ROW {
                    g.press();
                    break;
                }
                g.update(1.0);
                frames += 1;
            }
            while g.phase() == GamePhase::Dropping {
                g.update(1.0);
            }
            sign = -sign;
        }
        g.score()
    }

    pub async fn run() -> Result<(), Box<dyn Error>> {
        let player: Address = "0x42a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3".parse()?;
        let chain = DevChain::new(player);
        let settings = Settings {
            settle_delay_ms: 0,
            ..Settings::load()
        };
        let client = ChainClient::new(chain.clone(), chain.clone(), chain.clone(), settings);
        let game = RefCell::new(Game::new(SEED, BestScore::load()));

        let score = play_until_game_over(&game, 24.0);
        log::info!("First run ended at score {}", score);

        let outcome = client.buy_continuation(&game).await?;
        log::info!("Extra life: {:?}, resuming at score {}", outcome, game.borrow().score());

        let score = play_until_game_over(&game, 24.0);
        log::info!("Continued run ended at score {}", score);

        let outcome = client.submit_score(&game).await?;
        log::info!("Submission: {:?}", outcome);

        if let Err(e) = client.refresh(&game, RefreshScope::All).await {
            log::warn!("Refresh failed: {}", e);
        }
        let view = client.view();
        if let Some(board) = &view.leaderboard {
            for (rank, (address, score)) in board.entries().enumerate() {
                log::info!("#{} {} {}", rank + 1, format_address(address), score);
            }
        }
        log::info!(
            "Contract balance {} AVAX, best score {}",
            format_avax(view.balance.unwrap_or(0)),
            game.borrow().best()
        );
        Ok(())
    }
}
