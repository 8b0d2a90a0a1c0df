//! Distraction overlay: a coin-catching mini-game shown while a submission
//! is pending. Purely cosmetic; the score has no external effect and nothing
//! persists across opens.

use std::sync::Arc;

use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, Duration, Instant, MissedTickBehavior},
};
use tracing::debug;

/// Timing and geometry of the game. The defaults are the product behavior;
/// tests shrink the periods to keep runs fast.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    pub spawn_period: Duration,
    pub coin_lifetime: Duration,
    /// Coins spawn uniformly in `0..spawn_range` on each axis, leaving a
    /// margin inside the `board_size` square.
    pub spawn_range: f32,
    pub board_size: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            spawn_period: Duration::from_millis(600),
            coin_lifetime: Duration::from_millis(1500),
            spawn_range: 250.0,
            board_size: 300.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Coin {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub expires_at: Instant,
}

/// Volatile game state. All mutation goes through these operations; the
/// clock and RNG are arguments so the state machine runs without a ticker.
#[derive(Debug, Default)]
pub struct GameState {
    score: u32,
    coins: Vec<Coin>,
    next_coin_id: u64,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn coins(&self) -> &[Coin] {
        &self.coins
    }

    /// Places one coin at a pseudo-random position and returns a copy of it.
    pub fn spawn_coin(
        &mut self,
        rng: &mut impl Rng,
        now: Instant,
        config: &OverlayConfig,
    ) -> Coin {
        self.next_coin_id += 1;
        let coin = Coin {
            id: self.next_coin_id,
            x: rng.gen_range(0.0..config.spawn_range),
            y: rng.gen_range(0.0..config.spawn_range),
            expires_at: now + config.coin_lifetime,
        };
        self.coins.push(coin.clone());
        coin
    }

    /// Removes every coin whose deadline has passed, returning their ids.
    pub fn prune_expired(&mut self, now: Instant) -> Vec<u64> {
        let mut expired = Vec::new();
        self.coins.retain(|coin| {
            if coin.expires_at <= now {
                expired.push(coin.id);
                false
            } else {
                true
            }
        });
        expired
    }

    /// Click on a coin: score +1 and the coin is gone. A coin that was
    /// already removed yields `None` and leaves the score untouched.
    pub fn collect(&mut self, coin_id: u64) -> Option<u32> {
        let index = self.coins.iter().position(|coin| coin.id == coin_id)?;
        self.coins.remove(index);
        self.score += 1;
        Some(self.score)
    }

    /// Clears coins and score. The coin id counter keeps counting so ids
    /// never repeat within one process.
    pub fn reset(&mut self) {
        self.score = 0;
        self.coins.clear();
    }
}

#[derive(Debug, Clone)]
pub enum OverlayEvent {
    Opened,
    CoinSpawned { id: u64, x: f32, y: f32 },
    CoinExpired { id: u64 },
    CoinCollected { id: u64, score: u32 },
    Closed,
}

/// Point-in-time view for immediate-mode render layers.
#[derive(Debug, Clone)]
pub struct GameSnapshot {
    pub open: bool,
    pub score: u32,
    pub coins: Vec<Coin>,
}

#[derive(Debug)]
struct OverlayInner {
    config: OverlayConfig,
    state: Mutex<GameState>,
    events: broadcast::Sender<OverlayEvent>,
}

/// Async driver around [`GameState`]: owns the spawn ticker and fans state
/// changes out over a broadcast channel.
///
/// Lock order is always ticker before state.
#[derive(Debug)]
pub struct Overlay {
    inner: Arc<OverlayInner>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::with_config(OverlayConfig::default())
    }

    pub fn with_config(config: OverlayConfig) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(OverlayInner {
                config,
                state: Mutex::new(GameState::new()),
                events,
            }),
            ticker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.inner.config
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<OverlayEvent> {
        self.inner.events.subscribe()
    }

    /// Opens the overlay: score back to 0, no coins until the first spawn
    /// period elapses. Opening an already-open overlay only resets the state.
    pub async fn open(&self) {
        let mut ticker = self.ticker.lock().await;
        self.inner.state.lock().await.reset();
        if ticker.is_some() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        *ticker = Some(tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            let mut interval = time::interval(inner.config.spawn_period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval completes immediately;
            // consume it so no coin appears before one full period.
            interval.tick().await;
            loop {
                interval.tick().await;
                let coin = {
                    let mut state = inner.state.lock().await;
                    let now = Instant::now();
                    for id in state.prune_expired(now) {
                        let _ = inner.events.send(OverlayEvent::CoinExpired { id });
                    }
                    state.spawn_coin(&mut rng, now, &inner.config)
                };
                let _ = inner.events.send(OverlayEvent::CoinSpawned {
                    id: coin.id,
                    x: coin.x,
                    y: coin.y,
                });
                spawn_expiry_task(Arc::clone(&inner), coin.expires_at);
            }
        }));
        drop(ticker);

        debug!("overlay opened");
        let _ = self.inner.events.send(OverlayEvent::Opened);
    }

    /// Tears the overlay down: ticker cancelled, coins cleared, score reset.
    /// Safe to call when already closed; the redundant clearing is what makes
    /// a late response handler's close a no-op.
    pub async fn close(&self) {
        let handle = self.ticker.lock().await.take();
        if let Some(handle) = &handle {
            handle.abort();
        }
        self.inner.state.lock().await.reset();
        if handle.is_some() {
            debug!("overlay closed");
            let _ = self.inner.events.send(OverlayEvent::Closed);
        }
    }

    /// Click on a live coin. Returns the new score, or `None` when the coin
    /// already expired, was collected, or the overlay is closed.
    pub async fn collect(&self, coin_id: u64) -> Option<u32> {
        let collected = self.inner.state.lock().await.collect(coin_id);
        if let Some(score) = collected {
            let _ = self
                .inner
                .events
                .send(OverlayEvent::CoinCollected { id: coin_id, score });
        }
        collected
    }

    pub async fn is_open(&self) -> bool {
        self.ticker.lock().await.is_some()
    }

    pub async fn snapshot(&self) -> GameSnapshot {
        let open = self.ticker.lock().await.is_some();
        let state = self.inner.state.lock().await;
        GameSnapshot {
            open,
            score: state.score(),
            coins: state.coins().to_vec(),
        }
    }
}

impl Default for Overlay {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes the coin due at `deadline` once its lifetime elapses. After a
/// close the state holds no coins, so a late wakeup finds nothing to prune.
fn spawn_expiry_task(inner: Arc<OverlayInner>, deadline: Instant) {
    tokio::spawn(async move {
        time::sleep_until(deadline).await;
        let expired = {
            let mut state = inner.state.lock().await;
            state.prune_expired(Instant::now())
        };
        for id in expired {
            let _ = inner.events.send(OverlayEvent::CoinExpired { id });
        }
    });
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
